use pg_grab_shared::{delimited_ddl, typed_arrays_ddl, Oid, DELIMITED_COLUMNS, TYPED_ARRAYS_COLUMNS};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::event::StatementEvent;
use crate::error::{GrabError, Result};
use crate::host::{Host, LockMode};

/// Shape of the log table. Also selects how parameters are serialized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLayout {
    /// 10 columns, parameters as parallel text[] / regtype[] arrays.
    #[default]
    TypedArrays,
    /// 8 columns, parameters joined into one delimited text.
    Delimited,
}

impl LogLayout {
    pub fn name(self) -> &'static str {
        match self {
            LogLayout::TypedArrays => "typed_arrays",
            LogLayout::Delimited => "delimited",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            LogLayout::TypedArrays => &TYPED_ARRAYS_COLUMNS,
            LogLayout::Delimited => &DELIMITED_COLUMNS,
        }
    }

    pub fn ddl(self, schema: &str, table: &str) -> String {
        match self {
            LogLayout::TypedArrays => typed_arrays_ddl(schema, table),
            LogLayout::Delimited => delimited_ddl(schema, table),
        }
    }
}

/// Writes statement events into the log table through the host.
pub struct LogSink<'a> {
    host: &'a dyn Host,
    schema: &'a str,
    table: &'a str,
    layout: LogLayout,
}

impl<'a> LogSink<'a> {
    pub fn new(host: &'a dyn Host, schema: &'a str, table: &'a str, layout: LogLayout) -> Self {
        Self {
            host,
            schema,
            table,
            layout,
        }
    }

    /// Looks up the log table. `None` when the schema or the table does not
    /// exist, which leaves the extension inert.
    pub fn resolve(&self) -> Option<Oid> {
        let Some(namespace) = self.host.namespace_oid(self.schema) else {
            debug!(schema = %self.schema, "Log schema not found, statement not logged");
            return None;
        };

        let relation = self.host.relation_oid(self.table, namespace);
        if relation.is_none() {
            debug!(
                schema = %self.schema,
                table = %self.table,
                "Log table not found, statement not logged"
            );
        }
        relation
    }

    /// Appends one row for `event` inside the current transaction. The row
    /// lock is held only for the insert.
    pub fn append(&self, relation: Oid, event: StatementEvent) -> Result<()> {
        let row = event.into_row(self.layout);

        let mut heap = self.host.open_relation(relation, LockMode::RowExclusive)?;
        trace!(relation = %relation, lock = %LockMode::RowExclusive, "Log table opened");

        let found = heap.columns().len();
        let expected = self.layout.columns().len();
        if found != expected {
            return Err(GrabError::LayoutMismatch {
                layout: self.layout.name(),
                expected,
                found,
            });
        }

        heap.insert(&row)?;
        drop(heap);
        trace!(relation = %relation, "Log table closed");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;
    use pg_grab_shared::CmdType;

    fn event() -> StatementEvent {
        StatementEvent {
            transaction_id: 1,
            command_id: 0,
            process_id: 1,
            user_id: Oid(10),
            timing: None,
            command_type: CmdType::Select,
            source_text: "SELECT 1".to_string(),
            params: None,
        }
    }

    #[test]
    fn test_resolve_absent_schema_and_table() {
        let host = MockHost::new();
        let sink = LogSink::new(&host, "grab", "statement_log", LogLayout::TypedArrays);
        assert_eq!(sink.resolve(), None);

        host.create_schema("grab");
        assert_eq!(sink.resolve(), None);

        host.create_table("grab", "statement_log", &TYPED_ARRAYS_COLUMNS);
        assert!(sink.resolve().is_some());
    }

    #[test]
    fn test_append_holds_lock_only_for_insert() {
        let host = MockHost::new();
        host.create_schema("grab");
        host.create_table("grab", "statement_log", &TYPED_ARRAYS_COLUMNS);

        let sink = LogSink::new(&host, "grab", "statement_log", LogLayout::TypedArrays);
        let relation = sink.resolve().unwrap();
        sink.append(relation, event()).unwrap();

        assert_eq!(host.calls(), vec!["lock RowExclusiveLock", "insert", "unlock"]);
        assert_eq!(host.rows("grab", "statement_log").len(), 1);
    }

    #[test]
    fn test_append_rejects_wrong_layout() {
        let host = MockHost::new();
        host.create_schema("grab");
        host.create_table("grab", "statement_log", &DELIMITED_COLUMNS);

        let sink = LogSink::new(&host, "grab", "statement_log", LogLayout::TypedArrays);
        let relation = sink.resolve().unwrap();
        let err = sink.append(relation, event()).unwrap_err();

        assert!(matches!(
            err,
            GrabError::LayoutMismatch { expected: 10, found: 8, .. }
        ));
        assert!(host.rows("grab", "statement_log").is_empty());
        // lock still released
        assert_eq!(host.calls(), vec!["lock RowExclusiveLock", "unlock"]);
    }
}
