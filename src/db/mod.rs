//! Database access layer.
//!
//! This module provides database access functionality:
//! - Connection pool construction
//! - Statement execution with native parameter binding
//! - The CRUD dispatcher and nested transactions
//! - LISTEN/NOTIFY subscriptions on a dedicated connection
//! - A dispatch macro for running statements on a pool or a transaction

pub mod connection;
pub mod executor;
pub(crate) mod macros;
pub(crate) mod params;
pub mod listener;
pub mod pool;

pub use connection::{Connection, ConnectionOptions};
pub use executor::QueryExecutor;
pub use listener::Listener;
pub use pool::connect;
