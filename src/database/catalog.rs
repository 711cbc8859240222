//! Catalog lookups over SQLite: attached databases act as schemas and
//! `sqlite_master` of each one lists its tables.

use pg_grab_shared::{Datum, Oid};
use rusqlite::types::Value;
use rusqlite::Connection;
use tracing::trace;

use super::values::to_sql_value;
use crate::error::{GrabError, Result};
use crate::host::{ColumnDesc, LockMode, Relation};
use crate::types::TypeRegistry;

/// Namespace oids are this base plus the `PRAGMA database_list` sequence.
pub(crate) const NAMESPACE_OID_BASE: u32 = 2200;
/// First oid handed out to a user table.
pub(crate) const FIRST_RELATION_OID: u32 = 16384;

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Attached databases as `(namespace oid, name)`, `main` first.
pub(crate) fn namespaces(conn: &Connection) -> rusqlite::Result<Vec<(Oid, String)>> {
    let mut stmt = conn.prepare_cached("PRAGMA database_list")?;
    let rows = stmt.query_map([], |row| {
        let seq: i64 = row.get(0)?;
        let name: String = row.get(1)?;
        Ok((Oid(NAMESPACE_OID_BASE + seq as u32), name))
    })?;
    rows.collect()
}

pub(crate) fn table_exists(conn: &Connection, schema: &str, table: &str) -> rusqlite::Result<bool> {
    let sql = format!(
        "SELECT count(*) FROM {}.sqlite_master WHERE type = 'table' AND name = ?1",
        quote_ident(schema)
    );
    let count: i64 = conn.query_row(&sql, [table], |row| row.get(0))?;
    Ok(count > 0)
}

pub(crate) fn table_columns(conn: &Connection, schema: &str, table: &str) -> rusqlite::Result<Vec<ColumnDesc>> {
    let sql = format!("PRAGMA {}.table_info({})", quote_ident(schema), quote_ident(table));
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(ColumnDesc {
            name: row.get(1)?,
            declared_type: row.get(2)?,
        })
    })?;
    rows.collect()
}

/// Schema-qualified name of a table known to the relation cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RelationName {
    pub schema: String,
    pub table: String,
}

/// An open table. SQLite locks at database level, so the mode is only
/// recorded; the write lock itself lasts until the transaction ends.
pub(crate) struct SqliteRelation<'a> {
    conn: &'a Connection,
    types: &'a TypeRegistry,
    oid: Oid,
    name: RelationName,
    columns: Vec<ColumnDesc>,
    lock: LockMode,
}

impl<'a> SqliteRelation<'a> {
    pub(crate) fn open(
        conn: &'a Connection,
        types: &'a TypeRegistry,
        oid: Oid,
        name: RelationName,
        lock: LockMode,
    ) -> Result<Self> {
        let columns = table_columns(conn, &name.schema, &name.table)?;
        // PRAGMA table_info is empty for a dropped table
        if columns.is_empty() {
            return Err(GrabError::RelationNotFound(oid));
        }
        trace!(relation = %oid, schema = %name.schema, table = %name.table, lock = %lock, "Relation opened");

        Ok(Self {
            conn,
            types,
            oid,
            name,
            columns,
            lock,
        })
    }
}

impl Relation for SqliteRelation<'_> {
    fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    fn insert(&mut self, row: &[Option<Datum>]) -> Result<()> {
        let values = row
            .iter()
            .map(|value| match value {
                Some(datum) => to_sql_value(datum, self.types),
                None => Ok(Value::Null),
            })
            .collect::<Result<Vec<_>>>()?;

        let placeholders = (1..=values.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {}.{} VALUES ({})",
            quote_ident(&self.name.schema),
            quote_ident(&self.name.table),
            placeholders
        );

        let mut stmt = self.conn.prepare_cached(&sql)?;
        stmt.execute(rusqlite::params_from_iter(values.iter()))?;
        Ok(())
    }
}

impl Drop for SqliteRelation<'_> {
    fn drop(&mut self) {
        trace!(relation = %self.oid, lock = %self.lock, "Relation closed");
    }
}
