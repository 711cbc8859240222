/// Schema the log table lives in unless configured otherwise.
pub const DEFAULT_LOG_SCHEMA: &str = "grab";
/// Log table name unless configured otherwise.
pub const DEFAULT_LOG_TABLE: &str = "statement_log";

/// Separator between rendered parameters in the delimited layout.
pub const PARAM_DELIMITER: &str = "\n---\n";

/// Column order of the 10-column layout (parameters as parallel arrays).
pub const TYPED_ARRAYS_COLUMNS: [&str; 10] = [
    "id",
    "command_id",
    "pid",
    "user_id",
    "start_timestamp",
    "elapsed_seconds",
    "command_type",
    "source_text",
    "param_values",
    "param_types",
];

/// Column order of the 8-column layout (parameters joined into one text).
pub const DELIMITED_COLUMNS: [&str; 8] = [
    "transaction_id",
    "command_id",
    "pid",
    "user_id",
    "start_timestamp",
    "elapsed_seconds",
    "source_text",
    "params",
];

// Array columns hold JSON arrays: text values (null per position) and
// regtype names.
pub fn typed_arrays_ddl(schema: &str, table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS "{schema}"."{table}" (
    id INTEGER NOT NULL,
    command_id INTEGER NOT NULL,
    pid INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    start_timestamp TEXT,
    elapsed_seconds REAL,
    command_type INTEGER NOT NULL,
    source_text TEXT NOT NULL,
    param_values TEXT,
    param_types TEXT
);
"#
    )
}

pub fn delimited_ddl(schema: &str, table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS "{schema}"."{table}" (
    transaction_id INTEGER NOT NULL,
    command_id INTEGER NOT NULL,
    pid INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    start_timestamp TEXT,
    elapsed_seconds REAL,
    source_text TEXT NOT NULL,
    params TEXT
);
"#
    )
}
