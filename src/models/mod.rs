//! Data models for pgbind.
//!
//! This module re-exports the value types that flow through the dispatcher
//! and the listener.

pub mod notification;
pub mod operation;
pub mod pagination;

pub use notification::Notification;
pub use operation::Operation;
pub use pagination::{GROUP_BY_KEY, OFFSET_LIMIT_KEY, ORDER_BY_KEY, OffsetLimit};
