//! Values held by the bind store.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// A value stored under a bind key.
///
/// The `Display` form is what textual substitution emits: `Null` renders as an
/// empty string and lists render their elements comma-joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindValue {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
    /// Sequence of values
    List(Vec<BindValue>),
    /// Arbitrary JSON document
    Json(JsonValue),
}

impl BindValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Elements of a list whose items are all text, or `None`.
    pub fn as_text_list(&self) -> Option<Vec<&str>> {
        match self {
            Self::List(items) => items
                .iter()
                .map(|item| match item {
                    Self::Text(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// Elements of a list whose items are all integers, or `None`.
    pub fn as_int_list(&self) -> Option<Vec<i64>> {
        match self {
            Self::List(items) => items
                .iter()
                .map(|item| match item {
                    Self::Int(v) => Some(*v),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }
}

impl fmt::Display for BindValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Json(v) => write!(f, "{v}"),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for BindValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for BindValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&String> for BindValue {
    fn from(v: &String) -> Self {
        Self::Text(v.clone())
    }
}

impl From<bool> for BindValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for BindValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<JsonValue> for BindValue {
    fn from(v: JsonValue) -> Self {
        Self::Json(v)
    }
}

macro_rules! int_from {
    ($($t:ty),+) => {
        $(
            impl From<$t> for BindValue {
                fn from(v: $t) -> Self {
                    Self::Int(i64::from(v))
                }
            }
        )+
    };
}

int_from!(i8, i16, i32, i64, u8, u16, u32);

impl<T: Into<BindValue>> From<Option<T>> for BindValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<BindValue>> From<Vec<T>> for BindValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_forms() {
        assert_eq!(BindValue::Null.to_string(), "");
        assert_eq!(BindValue::from(42).to_string(), "42");
        assert_eq!(BindValue::from(true).to_string(), "true");
        assert_eq!(BindValue::from("ORDER BY id").to_string(), "ORDER BY id");
        assert_eq!(BindValue::from(vec![1, 2, 3]).to_string(), "1,2,3");
        assert_eq!(
            BindValue::from(serde_json::json!({"a": 1})).to_string(),
            r#"{"a":1}"#
        );
    }

    #[test]
    fn test_option_conversion() {
        assert!(BindValue::from(None::<i32>).is_null());
        assert_eq!(BindValue::from(Some("x")), BindValue::Text("x".into()));
    }

    #[test]
    fn test_list_views() {
        let ids = BindValue::from(vec!["a", "b"]);
        assert_eq!(ids.as_text_list(), Some(vec!["a", "b"]));
        assert_eq!(ids.as_int_list(), None);

        let mixed = BindValue::List(vec![BindValue::from("a"), BindValue::from(1)]);
        assert_eq!(mixed.as_text_list(), None);
        assert_eq!(BindValue::from(7).as_text_list(), None);
    }
}
