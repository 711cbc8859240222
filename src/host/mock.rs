use chrono::{DateTime, TimeZone, Utc};
use pg_grab_shared::{Datum, Oid};
use std::cell::{Cell, RefCell};

use super::{ColumnDesc, ExecFlags, Host, LockMode, QueryDesc, Relation};
use crate::error::{GrabError, Result};
use crate::types::TypeRegistry;

pub(crate) struct MockTable {
    pub oid: Oid,
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnDesc>,
    pub rows: Vec<Vec<Option<Datum>>>,
}

/// In-memory host recording every default routine, lock and insert.
pub(crate) struct MockHost {
    pub types: TypeRegistry,
    pub now: Cell<DateTime<Utc>>,
    pub xid: Cell<u32>,
    pub fail_inserts: Cell<bool>,
    schemas: RefCell<Vec<String>>,
    tables: RefCell<Vec<MockTable>>,
    calls: RefCell<Vec<String>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            types: TypeRegistry::builtin(),
            now: Cell::new(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
            xid: Cell::new(731),
            fail_inserts: Cell::new(false),
            schemas: RefCell::new(vec!["main".to_string()]),
            tables: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn create_schema(&self, name: &str) {
        self.schemas.borrow_mut().push(name.to_string());
    }

    pub fn create_table(&self, schema: &str, name: &str, columns: &[&str]) {
        let mut tables = self.tables.borrow_mut();
        let oid = Oid(16_384 + tables.len() as u32);
        tables.push(MockTable {
            oid,
            schema: schema.to_string(),
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|c| ColumnDesc {
                    name: c.to_string(),
                    declared_type: String::new(),
                })
                .collect(),
            rows: Vec::new(),
        });
    }

    pub fn drop_table(&self, schema: &str, name: &str) {
        self.tables
            .borrow_mut()
            .retain(|t| !(t.schema == schema && t.name == name));
    }

    pub fn rows(&self, schema: &str, name: &str) -> Vec<Vec<Option<Datum>>> {
        self.tables
            .borrow()
            .iter()
            .find(|t| t.schema == schema && t.name == name)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

struct MockRelation<'a> {
    host: &'a MockHost,
    oid: Oid,
    columns: Vec<ColumnDesc>,
}

impl Relation for MockRelation<'_> {
    fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    fn insert(&mut self, row: &[Option<Datum>]) -> Result<()> {
        if self.host.fail_inserts.get() {
            return Err(GrabError::Transaction("insert rejected".to_string()));
        }
        let mut tables = self.host.tables.borrow_mut();
        let table = tables
            .iter_mut()
            .find(|t| t.oid == self.oid)
            .ok_or(GrabError::RelationNotFound(self.oid))?;
        table.rows.push(row.to_vec());
        self.host.calls.borrow_mut().push("insert".to_string());
        Ok(())
    }
}

impl Drop for MockRelation<'_> {
    fn drop(&mut self) {
        self.host.calls.borrow_mut().push("unlock".to_string());
    }
}

impl Host for MockHost {
    fn transaction_id(&self) -> u32 {
        self.xid.get()
    }

    fn command_id(&self) -> u32 {
        2
    }

    fn process_id(&self) -> i32 {
        4242
    }

    fn user_id(&self) -> Oid {
        Oid(10)
    }

    fn current_timestamp(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn namespace_oid(&self, name: &str) -> Option<Oid> {
        self.schemas
            .borrow()
            .iter()
            .position(|s| s == name)
            .map(|i| Oid(2_200 + i as u32))
    }

    fn relation_oid(&self, name: &str, namespace: Oid) -> Option<Oid> {
        let schemas = self.schemas.borrow();
        let schema = schemas.get(namespace.0.checked_sub(2_200)? as usize)?;
        self.tables
            .borrow()
            .iter()
            .find(|t| &t.schema == schema && t.name == name)
            .map(|t| t.oid)
    }

    fn open_relation(&self, relation: Oid, lock: LockMode) -> Result<Box<dyn Relation + '_>> {
        let columns = self
            .tables
            .borrow()
            .iter()
            .find(|t| t.oid == relation)
            .map(|t| t.columns.clone())
            .ok_or(GrabError::RelationNotFound(relation))?;
        self.calls.borrow_mut().push(format!("lock {}", lock));
        Ok(Box::new(MockRelation {
            host: self,
            oid: relation,
            columns,
        }))
    }

    fn types(&self) -> &TypeRegistry {
        &self.types
    }

    fn standard_executor_start(&self, query: &mut QueryDesc, _eflags: ExecFlags) -> Result<()> {
        query.started = true;
        self.calls.borrow_mut().push("standard_start".to_string());
        Ok(())
    }

    fn standard_executor_end(&self, query: &mut QueryDesc) -> Result<()> {
        query.started = false;
        self.calls.borrow_mut().push("standard_end".to_string());
        Ok(())
    }
}
