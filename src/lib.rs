//! pgbind library
//!
//! A small data-access layer for PostgreSQL: named bind variables, `${...}`
//! query templates, capability-driven CRUD dispatch with nested transactions,
//! offset/limit pagination and LISTEN/NOTIFY subscriptions.

pub mod bind;
pub mod capability;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use bind::{BindValue, Vars};
pub use capability::{ListReader, Reader, Selector, Writer};
pub use config::Config;
pub use db::{Connection, ConnectionOptions, Listener};
pub use error::{DalError, DalResult};
pub use models::{Notification, OffsetLimit, Operation};
