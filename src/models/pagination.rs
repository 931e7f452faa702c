//! Offset/limit pagination.
//!
//! [`OffsetLimit::bind`] turns an offset and an optional limit into a
//! `LIMIT .. OFFSET ..` fragment and stores it under [`OFFSET_LIMIT_KEY`],
//! which the dispatcher appends to every List statement.

use crate::bind::Vars;
use serde::{Deserialize, Serialize};

/// Reserved key holding the GROUP BY fragment of a List statement.
pub const GROUP_BY_KEY: &str = "_group_by";

/// Reserved key holding the ORDER BY fragment of a List statement.
pub const ORDER_BY_KEY: &str = "_order_by";

/// Reserved key holding the LIMIT/OFFSET fragment of a List statement.
pub const OFFSET_LIMIT_KEY: &str = "_offset_limit";

/// Pagination request. A missing limit means "as many as the server allows".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OffsetLimit {
    /// Rows to skip. Default: 0
    #[serde(default)]
    pub offset: u64,
    /// Maximum rows to return, clamped to the caller's maximum
    #[serde(default)]
    pub limit: Option<u64>,
}

impl OffsetLimit {
    pub fn new(offset: u64, limit: Option<u64>) -> Self {
        Self { offset, limit }
    }

    /// Clamp the limit to `max` (defaulting to it), then store the fragment.
    ///
    /// Returns the fragment that was stored.
    pub fn bind(&mut self, vars: &Vars, max: u64) -> String {
        self.limit = Some(self.limit.map_or(max, |limit| limit.min(max)));
        let fragment = self.fragment();
        vars.set(OFFSET_LIMIT_KEY, fragment.clone());
        fragment
    }

    /// Reduce the limit to at most `len`, e.g. the known size of a result set.
    pub fn clamp(&mut self, len: u64) {
        if let Some(limit) = self.limit {
            self.limit = Some(limit.min(len));
        }
    }

    /// SQL fragment for the current values.
    pub fn fragment(&self) -> String {
        match (self.limit, self.offset) {
            (Some(limit), 0) => format!("LIMIT {limit}"),
            (Some(limit), offset) => format!("LIMIT {limit} OFFSET {offset}"),
            (None, 0) => String::new(),
            (None, offset) => format!("OFFSET {offset}"),
        }
    }
}
