//! Embedded SQLite engine acting as the extension's host: it owns the hook
//! registry, drives each statement through start, run and end, and wraps
//! every statement in a transaction it shares with the log insert.

use chrono::{DateTime, Utc};
use pg_grab_shared::{CmdType, Oid, Param, ParamList};
use rusqlite::types::Value;
use rusqlite::Connection;
use std::cell::RefCell;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use super::catalog::{self, quote_ident, RelationName, SqliteRelation, FIRST_RELATION_OID};
use super::classify::{classify_statement, StatementKind};
use super::query_types;
use super::statement_log::{read_statement_log, LoggedStatement};
use super::values::to_sql_value;
use crate::config::GrabConfig;
use crate::error::{GrabError, Result};
use crate::extension::GrabExtension;
use crate::hooks::HookRegistry;
use crate::host::{ExecFlags, Host, LockMode, QueryDesc, Relation};
use crate::types::TypeRegistry;

/// Session user until `set_session_user` is called.
pub const BOOTSTRAP_USER_ID: Oid = Oid(10);
/// First transaction id handed out; lower ids are reserved.
pub const FIRST_NORMAL_XID: u32 = 3;

#[derive(Debug)]
struct Transaction {
    xid: u32,
    command_id: u32,
    explicit: bool,
    /// A statement failed inside an explicit block; SQLite has already
    /// rolled back and only COMMIT/ROLLBACK are accepted.
    aborted: bool,
}

#[derive(Debug)]
struct Session {
    next_xid: u32,
    user_id: Oid,
    transaction: Option<Transaction>,
}

/// Result of one statement.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecOutcome {
    pub command_type: CmdType,
    /// Rows changed by a statement that returns no rows.
    pub rows_affected: usize,
    pub rows: Vec<Vec<Value>>,
}

impl ExecOutcome {
    fn empty(command_type: CmdType) -> Self {
        Self {
            command_type,
            rows_affected: 0,
            rows: Vec::new(),
        }
    }

    fn tuples(&self) -> f64 {
        if self.rows.is_empty() {
            self.rows_affected as f64
        } else {
            self.rows.len() as f64
        }
    }
}

pub struct Engine {
    conn: Connection,
    hooks: Arc<HookRegistry>,
    types: TypeRegistry,
    session: RefCell<Session>,
    // relation oid - FIRST_RELATION_OID -> name
    relations: RefCell<Vec<RelationName>>,
    extension: RefCell<Option<GrabExtension>>,
}

impl Engine {
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        // rollback journal keeps commits atomic across attached schemas
        conn.execute_batch(
            r#"
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        "#,
        )?;
        info!(path = %path.as_ref().display(), "SQLite engine opened");
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        query_types::register(&conn)?;
        Ok(Self {
            conn,
            hooks: Arc::new(HookRegistry::new()),
            types: TypeRegistry::builtin(),
            session: RefCell::new(Session {
                next_xid: FIRST_NORMAL_XID,
                user_id: BOOTSTRAP_USER_ID,
                transaction: None,
            }),
            relations: RefCell::new(Vec::new()),
            extension: RefCell::new(None),
        })
    }

    /// Registry other extensions install their hooks into.
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// Raw connection. Statements run here bypass the hooks.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn set_session_user(&self, user: Oid) {
        self.session.borrow_mut().user_id = user;
    }

    pub fn in_transaction(&self) -> bool {
        self.session.borrow().transaction.is_some()
    }

    fn transaction_aborted(&self) -> bool {
        self.session
            .borrow()
            .transaction
            .as_ref()
            .map_or(false, |tx| tx.aborted)
    }

    // ==================== schema provisioning ====================

    /// Attaches a database as schema `name`, in memory unless `path` is given.
    pub fn create_schema(&self, name: &str, path: Option<&Path>) -> Result<Oid> {
        if self.in_transaction() {
            return Err(GrabError::Transaction(
                "cannot create a schema inside a transaction block".to_string(),
            ));
        }

        let file = path.map_or_else(|| ":memory:".to_string(), |p| p.to_string_lossy().into_owned());
        self.conn
            .execute(&format!("ATTACH DATABASE ?1 AS {}", quote_ident(name)), [&file])?;
        info!(schema = %name, file = %file, "Schema created");

        self.namespace_oid(name)
            .ok_or_else(|| GrabError::Config(format!("schema '{}' not visible after attach", name)))
    }

    pub fn drop_schema(&self, name: &str) -> Result<()> {
        if self.in_transaction() {
            return Err(GrabError::Transaction(
                "cannot drop a schema inside a transaction block".to_string(),
            ));
        }
        self.conn
            .execute_batch(&format!("DETACH DATABASE {}", quote_ident(name)))?;
        info!(schema = %name, "Schema dropped");
        Ok(())
    }

    /// Creates the log table for `config.layout`. The schema must exist.
    pub fn create_statement_log(&self, config: &GrabConfig) -> Result<()> {
        config.validate()?;
        self.conn
            .execute_batch(&config.layout.ddl(&config.schema, &config.table))?;
        info!(
            schema = %config.schema,
            table = %config.table,
            layout = config.layout.name(),
            "Statement log created"
        );
        Ok(())
    }

    pub fn drop_statement_log(&self, config: &GrabConfig) -> Result<()> {
        self.conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {}.{}",
            quote_ident(&config.schema),
            quote_ident(&config.table)
        ))?;
        info!(schema = %config.schema, table = %config.table, "Statement log dropped");
        Ok(())
    }

    pub fn read_statement_log(&self, config: &GrabConfig) -> Result<Vec<LoggedStatement>> {
        read_statement_log(&self.conn, &self.types, config)
    }

    // ==================== extension lifecycle ====================

    pub fn load_extension(&self, config: GrabConfig) -> Result<()> {
        let mut slot = self.extension.borrow_mut();
        if slot.is_some() {
            return Err(GrabError::Config("statement logger is already loaded".to_string()));
        }
        *slot = Some(GrabExtension::on_load(&self.hooks, config)?);
        Ok(())
    }

    /// Returns false when nothing was loaded.
    pub fn unload_extension(&self) -> bool {
        match self.extension.borrow_mut().take() {
            Some(extension) => {
                extension.on_unload(&self.hooks);
                true
            }
            None => false,
        }
    }

    // ==================== transactions ====================

    pub fn begin(&self) -> Result<()> {
        if self.in_transaction() {
            warn!("there is already a transaction in progress");
            return Ok(());
        }
        self.start_transaction(true)
    }

    /// Commits the open block. An aborted block is rolled back instead.
    pub fn commit(&self) -> Result<()> {
        if !self.in_transaction() {
            warn!("there is no transaction in progress");
            return Ok(());
        }
        let aborted = self.transaction_aborted();
        self.finish_transaction(!aborted)
    }

    pub fn rollback(&self) -> Result<()> {
        if !self.in_transaction() {
            warn!("there is no transaction in progress");
            return Ok(());
        }
        self.finish_transaction(false)
    }

    fn start_transaction(&self, explicit: bool) -> Result<()> {
        self.conn.execute_batch("BEGIN")?;

        let mut session = self.session.borrow_mut();
        let xid = session.next_xid;
        session.next_xid = xid.checked_add(1).unwrap_or(FIRST_NORMAL_XID);
        session.transaction = Some(Transaction {
            xid,
            command_id: 0,
            explicit,
            aborted: false,
        });
        debug!(xid, explicit, "Transaction started");
        Ok(())
    }

    fn finish_transaction(&self, commit: bool) -> Result<()> {
        let Some(tx) = self.session.borrow_mut().transaction.take() else {
            return Ok(());
        };
        if tx.aborted {
            debug!(xid = tx.xid, "Aborted transaction closed");
            return Ok(());
        }

        let result = self
            .conn
            .execute_batch(if commit { "COMMIT" } else { "ROLLBACK" });
        if result.is_err() && !self.conn.is_autocommit() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(xid = tx.xid, error = %e, "Rollback after failed commit failed");
            }
        }
        result?;

        debug!(xid = tx.xid, explicit = tx.explicit, committed = commit, "Transaction finished");
        Ok(())
    }

    /// Rolls back the SQLite side of an explicit block after a failure and
    /// keeps the block open until the client ends it.
    fn abort_transaction(&self) {
        if !self.conn.is_autocommit() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %e, "Rollback of failed transaction block failed");
            }
        }
        if let Some(tx) = self.session.borrow_mut().transaction.as_mut() {
            tx.aborted = true;
        }
    }

    fn advance_command_id(&self) {
        if let Some(tx) = self.session.borrow_mut().transaction.as_mut() {
            tx.command_id += 1;
        }
    }

    // ==================== statements ====================

    /// Runs one statement. `$n` placeholders bind to `params[n - 1]`.
    pub fn execute(&self, sql: &str, params: &[Param]) -> Result<ExecOutcome> {
        match classify_statement(sql) {
            StatementKind::Begin => self.begin().map(|_| ExecOutcome::empty(CmdType::Utility)),
            StatementKind::Commit => self.commit().map(|_| ExecOutcome::empty(CmdType::Utility)),
            StatementKind::Rollback => self.rollback().map(|_| ExecOutcome::empty(CmdType::Utility)),
            // empty query string never reaches the executor
            StatementKind::Command(CmdType::Nothing) => Ok(ExecOutcome::empty(CmdType::Nothing)),
            StatementKind::Command(operation) => self.execute_command(operation, sql, params),
        }
    }

    fn execute_command(&self, operation: CmdType, sql: &str, params: &[Param]) -> Result<ExecOutcome> {
        if self.transaction_aborted() {
            return Err(GrabError::Transaction(
                "current transaction is aborted, commands ignored until end of transaction block".to_string(),
            ));
        }

        let implicit = !self.in_transaction();
        if implicit {
            self.start_transaction(false)?;
        }

        let result = self.run_executor(operation, sql, params);

        match (&result, implicit) {
            (Ok(_), true) => self.finish_transaction(true)?,
            (Err(e), true) => {
                debug!(error = %e, "Statement failed, rolling back");
                if let Err(rollback) = self.finish_transaction(false) {
                    warn!(error = %rollback, "Rollback failed");
                }
            }
            (Err(e), false) => {
                debug!(error = %e, "Statement failed inside transaction block");
                self.abort_transaction();
            }
            (Ok(_), false) => {}
        }

        result
    }

    fn run_executor(&self, operation: CmdType, sql: &str, params: &[Param]) -> Result<ExecOutcome> {
        let params = (!params.is_empty()).then(|| params.iter().cloned().collect::<ParamList>());
        let mut query = QueryDesc::new(operation, sql, params);

        self.hooks.run_executor_start(self, &mut query, ExecFlags::NONE)?;
        let outcome = self.executor_run(&mut query)?;
        self.hooks.run_executor_end(self, &mut query)?;

        self.advance_command_id();
        Ok(outcome)
    }

    fn executor_run(&self, query: &mut QueryDesc) -> Result<ExecOutcome> {
        if let Some(instr) = query.totaltime.as_mut() {
            instr.start();
        }

        let result = self.run_statement(query.operation, &query.source_text, query.params.as_ref());

        if let Some(instr) = query.totaltime.as_mut() {
            instr.stop(result.as_ref().map_or(0.0, ExecOutcome::tuples));
        }
        result
    }

    fn run_statement(&self, operation: CmdType, sql: &str, params: Option<&ParamList>) -> Result<ExecOutcome> {
        let mut stmt = self.conn.prepare_cached(sql)?;

        if let Some(params) = params {
            for (i, param) in params.iter().enumerate() {
                let position = i + 1;
                let index = stmt
                    .parameter_index(&format!("${}", position))?
                    .unwrap_or(position);
                let value = match &param.value {
                    Some(datum) => to_sql_value(datum, &self.types)?,
                    None => Value::Null,
                };
                stmt.raw_bind_parameter(index, value)?;
            }
        }

        let column_count = stmt.column_count();
        if column_count == 0 {
            let rows_affected = stmt.raw_execute()?;
            return Ok(ExecOutcome {
                command_type: operation,
                rows_affected,
                rows: Vec::new(),
            });
        }

        let mut rows = stmt.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..column_count)
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            out.push(values);
        }

        Ok(ExecOutcome {
            command_type: operation,
            rows_affected: 0,
            rows: out,
        })
    }

    fn namespace_name(&self, namespace: Oid) -> Option<String> {
        match catalog::namespaces(&self.conn) {
            Ok(namespaces) => namespaces
                .into_iter()
                .find(|(oid, _)| *oid == namespace)
                .map(|(_, name)| name),
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Namespace lookup failed");
                None
            }
        }
    }

    fn relation_for(&self, name: RelationName) -> Oid {
        let mut relations = self.relations.borrow_mut();
        let index = match relations.iter().position(|known| *known == name) {
            Some(index) => index,
            None => {
                relations.push(name);
                relations.len() - 1
            }
        };
        Oid(FIRST_RELATION_OID + index as u32)
    }
}

impl Host for Engine {
    fn transaction_id(&self) -> u32 {
        self.session.borrow().transaction.as_ref().map_or(0, |tx| tx.xid)
    }

    fn command_id(&self) -> u32 {
        self.session
            .borrow()
            .transaction
            .as_ref()
            .map_or(0, |tx| tx.command_id)
    }

    fn process_id(&self) -> i32 {
        std::process::id() as i32
    }

    fn user_id(&self) -> Oid {
        self.session.borrow().user_id
    }

    fn current_timestamp(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn namespace_oid(&self, name: &str) -> Option<Oid> {
        match catalog::namespaces(&self.conn) {
            Ok(namespaces) => namespaces
                .into_iter()
                .find(|(_, schema)| schema == name)
                .map(|(oid, _)| oid),
            Err(e) => {
                warn!(schema = %name, error = %e, "Namespace lookup failed");
                None
            }
        }
    }

    fn relation_oid(&self, name: &str, namespace: Oid) -> Option<Oid> {
        let schema = self.namespace_name(namespace)?;
        match catalog::table_exists(&self.conn, &schema, name) {
            Ok(true) => Some(self.relation_for(RelationName {
                schema,
                table: name.to_string(),
            })),
            Ok(false) => None,
            Err(e) => {
                warn!(schema = %schema, table = %name, error = %e, "Relation lookup failed");
                None
            }
        }
    }

    fn open_relation(&self, relation: Oid, lock: LockMode) -> Result<Box<dyn Relation + '_>> {
        let name = relation
            .0
            .checked_sub(FIRST_RELATION_OID)
            .and_then(|index| self.relations.borrow().get(index as usize).cloned())
            .ok_or(GrabError::RelationNotFound(relation))?;

        let opened = SqliteRelation::open(&self.conn, &self.types, relation, name, lock)?;
        Ok(Box::new(opened))
    }

    fn types(&self) -> &TypeRegistry {
        &self.types
    }

    fn standard_executor_start(&self, query: &mut QueryDesc, eflags: ExecFlags) -> Result<()> {
        // compile now so a bad statement fails before it runs
        self.conn.prepare_cached(&query.source_text)?;
        query.started = true;
        trace!(command_type = %query.operation, eflags = eflags.bits(), "Executor started");
        Ok(())
    }

    fn standard_executor_end(&self, query: &mut QueryDesc) -> Result<()> {
        query.started = false;
        trace!(command_type = %query.operation, "Executor finished");
        Ok(())
    }
}
