//! Interfaces the host engine exposes to the extension.
//!
//! The extension only sees the host through these traits: identity of the
//! running session, catalog lookups, relation access and the default
//! executor routines that terminate each hook chain.

use chrono::{DateTime, Utc};
use pg_grab_shared::{CmdType, Datum, Oid, ParamList};
use std::fmt;

use crate::error::Result;
use crate::monitoring::Instrumentation;
use crate::types::TypeRegistry;

#[cfg(test)]
pub(crate) mod mock;

/// Executor flags passed to the start routine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecFlags(u32);

impl ExecFlags {
    pub const NONE: Self = Self(0);

    pub fn bits(self) -> u32 {
        self.0
    }
}

/// Per-statement execution state threaded through start, run and end.
///
/// The timing instrument is owned here: whoever attaches it hands it to the
/// context, and it is freed together with the context.
#[derive(Debug)]
pub struct QueryDesc {
    pub operation: CmdType,
    pub source_text: String,
    pub params: Option<ParamList>,
    pub totaltime: Option<Instrumentation>,
    pub started: bool,
}

impl QueryDesc {
    pub fn new(operation: CmdType, source_text: impl Into<String>, params: Option<ParamList>) -> Self {
        Self {
            operation,
            source_text: source_text.into(),
            params,
            totaltime: None,
            started: false,
        }
    }
}

/// Table-level lock modes, weakest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LockMode {
    AccessShare,
    RowExclusive,
    AccessExclusive,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockMode::AccessShare => "AccessShareLock",
            LockMode::RowExclusive => "RowExclusiveLock",
            LockMode::AccessExclusive => "AccessExclusiveLock",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    pub declared_type: String,
}

/// An opened table. The lock taken by `Host::open_relation` is held until
/// the handle is dropped.
pub trait Relation {
    fn columns(&self) -> &[ColumnDesc];

    /// Appends one row as part of the current transaction.
    fn insert(&mut self, row: &[Option<Datum>]) -> Result<()>;
}

pub trait Host {
    fn transaction_id(&self) -> u32;
    fn command_id(&self) -> u32;
    fn process_id(&self) -> i32;
    fn user_id(&self) -> Oid;
    fn current_timestamp(&self) -> DateTime<Utc>;

    fn namespace_oid(&self, name: &str) -> Option<Oid>;
    fn relation_oid(&self, name: &str, namespace: Oid) -> Option<Oid>;
    fn open_relation(&self, relation: Oid, lock: LockMode) -> Result<Box<dyn Relation + '_>>;

    fn types(&self) -> &TypeRegistry;

    /// Default start routine, the terminal element of the start chain.
    fn standard_executor_start(&self, query: &mut QueryDesc, eflags: ExecFlags) -> Result<()>;
    /// Default teardown, the terminal element of the end chain.
    fn standard_executor_end(&self, query: &mut QueryDesc) -> Result<()>;
}
