//! Embedded SQLite host used to run the statement logger in-process.

mod catalog;
mod classify;
mod engine;
mod query_types;
mod statement_log;
mod values;

pub use classify::{classify_statement, detect_command_type, StatementKind};
pub use engine::{Engine, ExecOutcome, BOOTSTRAP_USER_ID, FIRST_NORMAL_XID};
pub use query_types::QUERY_TYPES_FUNCTION;
pub use statement_log::{LoggedParams, LoggedStatement};
