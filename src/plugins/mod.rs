//! Bundled plugin commands
//!
//! Every command takes variable ids as positional arguments and reports
//! results only through those variables. Commands that call the platform
//! accept an optional trailing error variable: it is set to `0` on success
//! and to the error message when the call fails recoverably.

use crate::runtime::error::CallFailure;
use crate::runtime::registry::CommandCatalog;
use crate::runtime::value::{VariableId, Variables};

pub mod builtin;
pub mod scoreboard;
pub mod signal;

/// Register every bundled plugin in `catalog`.
pub fn register_all(catalog: &CommandCatalog) {
    builtin::register(catalog);
    signal::register(catalog);
    scoreboard::register(catalog);
}

pub(crate) fn clear_error(variables: &mut Variables, error_var: Option<VariableId>) {
    if let Some(id) = error_var {
        variables.set(id, 0_i64);
    }
}

pub(crate) fn report_error(
    variables: &mut Variables,
    error_var: Option<VariableId>,
    failure: &CallFailure,
) {
    if let Some(id) = error_var {
        variables.set(id, failure.error.message.clone());
    }
}
