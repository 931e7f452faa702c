//! Named variables and template substitution.
//!
//! - `value`: values a bind key can hold
//! - `vars`: the lock-protected bind store
//! - `template`: `${...}` expansion and `@key` parameter binding

pub mod template;
pub mod value;
pub mod vars;

pub use template::{bind_parameters, expand, prepare, quote_identifier, quote_literal};
pub use value::BindValue;
pub use vars::Vars;
