//! Statement variants a [`Selector`](crate::capability::Selector) is asked for.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation the dispatcher is performing. Ordinals are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Operation {
    #[default]
    #[serde(rename = "UNKNOWN")]
    None = 0,
    Get = 1,
    Insert = 2,
    Patch = 3,
    Delete = 4,
    List = 5,
}

impl Operation {
    /// Upper-case name used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Insert => "INSERT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::List => "LIST",
            Self::None => "UNKNOWN",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for Operation {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Get),
            2 => Ok(Self::Insert),
            3 => Ok(Self::Patch),
            4 => Ok(Self::Delete),
            5 => Ok(Self::List),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_are_stable() {
        assert_eq!(Operation::None as u8, 0);
        assert_eq!(Operation::Get as u8, 1);
        assert_eq!(Operation::Insert as u8, 2);
        assert_eq!(Operation::Patch as u8, 3);
        assert_eq!(Operation::Delete as u8, 4);
        assert_eq!(Operation::List as u8, 5);
    }

    #[test]
    fn test_display() {
        assert_eq!(Operation::Get.to_string(), "GET");
        assert_eq!(Operation::List.to_string(), "LIST");
        assert_eq!(Operation::None.to_string(), "UNKNOWN");
    }

    #[test]
    fn test_serde_matches_display() {
        for op in [
            Operation::None,
            Operation::Get,
            Operation::Insert,
            Operation::Patch,
            Operation::Delete,
            Operation::List,
        ] {
            let encoded = serde_json::to_string(&op).unwrap();
            assert_eq!(encoded, format!("\"{op}\""));
            assert_eq!(serde_json::from_str::<Operation>(&encoded).unwrap(), op);
        }
    }

    #[test]
    fn test_try_from_ordinal() {
        assert_eq!(Operation::try_from(3), Ok(Operation::Patch));
        assert_eq!(Operation::try_from(9), Err(9));
    }
}
