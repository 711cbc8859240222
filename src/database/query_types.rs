//! `grab_query_types`: the command-type catalog as a table-valued function,
//! `SELECT * FROM grab_query_types`.

use rusqlite::vtab::{eponymous_only_module, Context, IndexInfo, VTab, VTabConnection, VTabCursor, Values};
use rusqlite::{ffi, Connection};
use std::marker::PhantomData;
use std::os::raw::c_int;

use crate::command_types::{query_types, CommandTypeRow, QueryTypes};

pub const QUERY_TYPES_FUNCTION: &str = "grab_query_types";

pub(crate) fn register(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_module(QUERY_TYPES_FUNCTION, eponymous_only_module::<QueryTypesTab>(), None)
}

#[repr(C)]
struct QueryTypesTab {
    base: ffi::sqlite3_vtab,
}

unsafe impl<'vtab> VTab<'vtab> for QueryTypesTab {
    type Aux = ();
    type Cursor = QueryTypesCursor<'vtab>;

    fn connect(_db: &mut VTabConnection, _aux: Option<&()>, _args: &[&[u8]]) -> rusqlite::Result<(String, Self)> {
        let vtab = QueryTypesTab {
            base: ffi::sqlite3_vtab::default(),
        };
        Ok(("CREATE TABLE x(id INTEGER, modify INTEGER, name TEXT)".to_owned(), vtab))
    }

    fn best_index(&self, info: &mut IndexInfo) -> rusqlite::Result<()> {
        info.set_estimated_cost(query_types().len() as f64);
        Ok(())
    }

    fn open(&'vtab mut self) -> rusqlite::Result<QueryTypesCursor<'vtab>> {
        Ok(QueryTypesCursor {
            base: ffi::sqlite3_vtab_cursor::default(),
            rows: query_types(),
            current: None,
            row_id: 0,
            phantom: PhantomData,
        })
    }
}

#[repr(C)]
struct QueryTypesCursor<'vtab> {
    base: ffi::sqlite3_vtab_cursor,
    rows: QueryTypes,
    current: Option<CommandTypeRow>,
    row_id: i64,
    phantom: PhantomData<&'vtab QueryTypesTab>,
}

unsafe impl VTabCursor for QueryTypesCursor<'_> {
    fn filter(&mut self, _idx_num: c_int, _idx_str: Option<&str>, _args: &Values<'_>) -> rusqlite::Result<()> {
        self.rows = query_types();
        self.row_id = 0;
        self.current = self.rows.next();
        Ok(())
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        self.current = self.rows.next();
        self.row_id += 1;
        Ok(())
    }

    fn eof(&self) -> bool {
        self.current.is_none()
    }

    fn column(&self, ctx: &mut Context, i: c_int) -> rusqlite::Result<()> {
        let Some(row) = self.current else {
            return Ok(());
        };
        match i {
            0 => ctx.set_result(&row.id),
            1 => ctx.set_result(&row.modify),
            _ => ctx.set_result(&row.name),
        }
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        Ok(self.row_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_types_table_function() {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();

        let mut stmt = conn
            .prepare("SELECT id, modify, name FROM grab_query_types ORDER BY id")
            .unwrap();
        let rows: Vec<(i32, bool, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();

        assert_eq!(rows.len(), 7);
        assert_eq!(rows[1], (1, false, "SELECT".to_string()));
        assert_eq!(rows[3], (3, true, "INSERT".to_string()));
        assert_eq!(rows[6], (6, true, "NOTHING".to_string()));
    }

    #[test]
    fn test_rescan_restarts_iteration() {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();

        let count = |sql: &str| -> i64 { conn.query_row(sql, [], |row| row.get(0)).unwrap() };
        assert_eq!(count("SELECT count(*) FROM grab_query_types"), 7);
        assert_eq!(
            count("SELECT count(*) FROM grab_query_types a JOIN grab_query_types b ON a.id = b.id"),
            7
        );
        assert_eq!(count("SELECT count(*) FROM grab_query_types WHERE modify = 0"), 1);
    }
}
