//! Capability roles a domain type implements to take part in CRUD dispatch.
//!
//! The roles are independent: a type may be a [`Selector`] and a [`Reader`]
//! without being a [`Writer`], or implement all four. The dispatcher only calls
//! what the operation needs. A role that cannot serve an operation returns
//! [`DalError::NotImplemented`] instead of producing SQL.

use crate::bind::Vars;
use crate::error::{DalError, DalResult};
use crate::models::Operation;
use sqlx::postgres::PgRow;

/// Produces the templated statement for an operation.
///
/// Implementations bind their selection variables (primary key, filters,
/// `_group_by`/`_order_by` fragments for List) into `vars` as a side effect.
pub trait Selector {
    fn select(&self, op: Operation, vars: &Vars) -> DalResult<String>;
}

/// Produces inserts and the mutation variables of a patch.
pub trait Writer {
    /// Return the INSERT statement, binding the values it references.
    fn insert(&self, vars: &Vars) -> DalResult<String> {
        let _ = vars;
        Err(DalError::not_implemented(Operation::Insert, std::any::type_name::<Self>()))
    }

    /// Bind the variables the Patch statement updates.
    ///
    /// Must fail (usually with [`DalError::EmptyPatch`]) when there is nothing
    /// to change.
    fn patch(&self, vars: &Vars) -> DalResult<()> {
        let _ = vars;
        Err(DalError::not_implemented(Operation::Patch, std::any::type_name::<Self>()))
    }
}

/// Decodes result rows into itself.
pub trait Reader {
    fn scan(&mut self, row: &PgRow) -> DalResult<()>;

    /// Capability probe used by List: readers that also count return `Some(self)`.
    fn as_list_reader(&mut self) -> Option<&mut dyn ListReader> {
        None
    }
}

/// A [`Reader`] that also decodes the row of the derived COUNT(*) statement.
pub trait ListReader: Reader {
    fn scan_count(&mut self, row: &PgRow) -> DalResult<()>;
}
