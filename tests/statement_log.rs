use chrono::{Duration, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use pg_grab::hooks::{EndChain, ExecutorEndHook, ExecutorStartHook, StartChain};
use pg_grab::host::{ExecFlags, Host, QueryDesc};
use pg_grab::{CaptureErrorPolicy, Engine, GrabConfig, GrabError, LogLayout, LoggedParams};
use pg_grab_shared::{type_oid, CmdType, Datum, Oid, Param};
use rusqlite::types::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn provisioned(config: &GrabConfig) -> Engine {
    init_tracing();
    let engine = Engine::open_in_memory().unwrap();
    engine.create_schema(&config.schema, None).unwrap();
    engine.create_statement_log(config).unwrap();
    engine.load_extension(config.clone()).unwrap();
    engine
}

fn count(engine: &Engine, sql: &str) -> i64 {
    engine
        .connection()
        .query_row(sql, [], |row| row.get(0))
        .unwrap()
}

#[test]
fn test_select_without_log_table() {
    init_tracing();
    let engine = Engine::open_in_memory().unwrap();
    engine.load_extension(GrabConfig::default()).unwrap();

    let outcome = engine.execute("SELECT 1", &[]).unwrap();
    assert_eq!(outcome.rows, vec![vec![Value::Integer(1)]]);

    // schema alone is not enough
    engine.create_schema("grab", None).unwrap();
    engine.execute("SELECT 1", &[]).unwrap();
    assert_eq!(count(&engine, "SELECT count(*) FROM grab.sqlite_master"), 0);
}

#[test]
fn test_parameterized_insert_is_logged() {
    let config = GrabConfig::default();
    let engine = provisioned(&config);
    engine
        .connection()
        .execute_batch("CREATE TABLE t (a INTEGER)")
        .unwrap();

    engine
        .execute("INSERT INTO t VALUES ($1)", &[Param::new(type_oid::INT4, Datum::Int4(42))])
        .unwrap();

    let rows = engine.read_statement_log(&config).unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert!(row.source_text.contains("INSERT INTO t VALUES ($1)"));
    assert_eq!(row.command_type, Some(CmdType::Insert));
    assert_eq!(
        row.params,
        Some(LoggedParams::Typed {
            values: vec![Some("42".to_string())],
            types: vec!["integer".to_string()],
        })
    );
    assert!(row.elapsed_seconds.unwrap() >= 0.0);
    assert!(row.start_timestamp.is_some());
    assert_eq!(row.pid, std::process::id() as i64);
    assert_eq!(row.user_id, 10);
    assert!(row.transaction_id >= 3);

    assert_eq!(count(&engine, "SELECT a FROM t"), 42);
}

#[test]
fn test_statement_without_params_logs_null() {
    let config = GrabConfig::default();
    let engine = provisioned(&config);

    engine.execute("SELECT 1", &[]).unwrap();

    let rows = engine.read_statement_log(&config).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].params, None);
    assert_eq!(rows[0].command_type, Some(CmdType::Select));
    assert_eq!(
        count(&engine, "SELECT count(*) FROM grab.statement_log WHERE param_values IS NULL AND param_types IS NULL"),
        1
    );
}

#[test]
fn test_delimited_layout_null_then_text() {
    let config = GrabConfig {
        layout: LogLayout::Delimited,
        ..GrabConfig::default()
    };
    let engine = provisioned(&config);
    engine
        .connection()
        .execute_batch("CREATE TABLE t (a TEXT, b TEXT)")
        .unwrap();

    engine
        .execute(
            "INSERT INTO t VALUES ($1, $2)",
            &[
                Param::null(type_oid::TEXT),
                Param::new(type_oid::TEXT, Datum::Text("abc".into())),
            ],
        )
        .unwrap();

    let rows = engine.read_statement_log(&config).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].params, Some(LoggedParams::Delimited("\n---\nabc".to_string())));
    assert_eq!(rows[0].command_type, None);
}

#[test]
fn test_dropping_table_toggles_logging() {
    let config = GrabConfig::default();
    let engine = provisioned(&config);

    engine.execute("SELECT 1", &[]).unwrap();
    engine.execute("SELECT 2", &[]).unwrap();
    assert_eq!(engine.read_statement_log(&config).unwrap().len(), 2);

    engine.execute("DROP TABLE grab.statement_log", &[]).unwrap();
    engine.execute("SELECT 3", &[]).unwrap();

    engine.create_statement_log(&config).unwrap();
    engine.execute("SELECT 4", &[]).unwrap();

    let rows = engine.read_statement_log(&config).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].source_text, "SELECT 4");
}

#[test]
fn test_log_row_shares_statement_transaction() {
    let config = GrabConfig::default();
    let engine = provisioned(&config);
    engine
        .connection()
        .execute_batch("CREATE TABLE t (a INTEGER)")
        .unwrap();

    engine.execute("BEGIN", &[]).unwrap();
    engine.execute("INSERT INTO t VALUES (1)", &[]).unwrap();
    engine.execute("ROLLBACK", &[]).unwrap();
    assert!(engine.read_statement_log(&config).unwrap().is_empty());

    engine.begin().unwrap();
    engine.execute("INSERT INTO t VALUES (1)", &[]).unwrap();
    engine.execute("INSERT INTO t VALUES (2)", &[]).unwrap();
    engine.commit().unwrap();

    let rows = engine.read_statement_log(&config).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].transaction_id, rows[1].transaction_id);
    assert_eq!(rows[0].command_id, 0);
    assert_eq!(rows[1].command_id, 1);
}

#[test]
fn test_failed_statement_is_not_logged() {
    let config = GrabConfig::default();
    let engine = provisioned(&config);

    assert!(engine.execute("SELECT * FROM missing", &[]).is_err());
    assert!(engine.read_statement_log(&config).unwrap().is_empty());
}

#[test]
fn test_logged_params_replay() {
    let config = GrabConfig::default();
    let engine = provisioned(&config);
    engine
        .connection()
        .execute_batch("CREATE TABLE t (a, b, c, d, e, f, g, h, i, j, k)")
        .unwrap();

    let params = vec![
        Param::new(type_oid::INT4, Datum::Int4(-7)),
        Param::new(type_oid::INT8, Datum::Int8(9_000_000_000)),
        Param::new(type_oid::TEXT, Datum::Text("it's \"quoted\"".into())),
        Param::new(type_oid::BOOL, Datum::Bool(true)),
        Param::new(type_oid::FLOAT8, Datum::Float8(0.1)),
        Param::new(type_oid::NUMERIC, Datum::Numeric("12.50".into())),
        Param::new(type_oid::DATE, Datum::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())),
        Param::new(
            type_oid::TIMESTAMPTZ,
            Datum::TimestampTz(Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()),
        ),
        Param::new(type_oid::BYTEA, Datum::Bytea(vec![0x00, 0xff, 0x10])),
        Param::new(type_oid::JSON, Datum::Json(serde_json::json!({"k": [1, 2]}))),
        Param::null(type_oid::INT4),
    ];

    engine
        .execute("INSERT INTO t VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)", &params)
        .unwrap();

    let rows = engine.read_statement_log(&config).unwrap();
    let decoded = rows[0].decode_params(engine.types()).unwrap().unwrap();
    let original: Vec<Option<Datum>> = params.into_iter().map(|p| p.value).collect();
    assert_eq!(decoded, original);
}

#[test]
fn test_start_plus_elapsed_is_end_of_statement() {
    let config = GrabConfig::default();
    let engine = provisioned(&config);

    let before = Utc::now();
    engine.execute("SELECT 1", &[]).unwrap();
    let after = Utc::now();

    let row = &engine.read_statement_log(&config).unwrap()[0];
    let end = row.end_timestamp().unwrap();
    let slack = Duration::milliseconds(2);
    assert!(end >= before - slack);
    assert!(end <= after + slack);
    assert!(row.start_timestamp.unwrap() <= end);
}

struct Observer {
    events: Arc<Mutex<Vec<String>>>,
}

impl ExecutorStartHook for Observer {
    fn executor_start(
        &self,
        host: &dyn Host,
        query: &mut QueryDesc,
        eflags: ExecFlags,
        next: StartChain<'_>,
    ) -> pg_grab::Result<()> {
        next.proceed(host, query, eflags)?;
        self.events.lock().push(format!("start:{}", query.source_text));
        Ok(())
    }
}

impl ExecutorEndHook for Observer {
    fn executor_end(&self, host: &dyn Host, query: &mut QueryDesc, next: EndChain<'_>) -> pg_grab::Result<()> {
        // the logger installed later already attached a timer
        let timed = query.totaltime.is_some();
        self.events.lock().push(format!("end:{}:{}", query.source_text, timed));
        next.proceed(host, query)
    }
}

#[test]
fn test_coexists_with_previously_installed_hooks() {
    init_tracing();
    let config = GrabConfig::default();
    let engine = Engine::open_in_memory().unwrap();
    engine.create_schema("grab", None).unwrap();
    engine.create_statement_log(&config).unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let observer = Arc::new(Observer {
        events: events.clone(),
    });
    engine.hooks().install_start(observer.clone());
    engine.hooks().install_end(observer);
    engine.load_extension(config.clone()).unwrap();

    engine.execute("SELECT 1", &[]).unwrap();
    engine.execute("SELECT 2", &[]).unwrap();

    assert_eq!(
        *events.lock(),
        vec![
            "start:SELECT 1".to_string(),
            "end:SELECT 1:true".to_string(),
            "start:SELECT 2".to_string(),
            "end:SELECT 2:true".to_string(),
        ]
    );
    assert_eq!(engine.read_statement_log(&config).unwrap().len(), 2);

    assert!(engine.unload_extension());
    engine.execute("SELECT 3", &[]).unwrap();
    assert_eq!(events.lock().len(), 6);
    assert_eq!(engine.read_statement_log(&config).unwrap().len(), 2);
}

#[test]
fn test_unknown_param_type_skip_and_abort() {
    let unknown = Param::new(Oid(99_999), Datum::Int4(1));

    let skip = GrabConfig::default();
    let engine = provisioned(&skip);
    engine
        .connection()
        .execute_batch("CREATE TABLE t (a INTEGER)")
        .unwrap();
    engine
        .execute("INSERT INTO t VALUES ($1)", &[unknown.clone()])
        .unwrap();
    assert_eq!(count(&engine, "SELECT count(*) FROM t"), 1);
    assert!(engine.read_statement_log(&skip).unwrap().is_empty());

    let abort = GrabConfig {
        on_error: CaptureErrorPolicy::Abort,
        ..GrabConfig::default()
    };
    let engine = provisioned(&abort);
    engine
        .connection()
        .execute_batch("CREATE TABLE t (a INTEGER)")
        .unwrap();
    let err = engine
        .execute("INSERT INTO t VALUES ($1)", &[unknown])
        .unwrap_err();
    assert!(matches!(err, GrabError::NoOutputFunction(Oid(99_999))));
    // the user's statement went down with its transaction
    assert_eq!(count(&engine, "SELECT count(*) FROM t"), 0);
}

#[test]
fn test_session_user_is_recorded() {
    let config = GrabConfig::default();
    let engine = provisioned(&config);
    engine.set_session_user(Oid(16_501));

    engine.execute("SELECT 1", &[]).unwrap();

    assert_eq!(engine.read_statement_log(&config).unwrap()[0].user_id, 16_501);
}

#[test]
fn test_query_types_function_through_engine() {
    let config = GrabConfig::default();
    let engine = provisioned(&config);

    let outcome = engine
        .execute("SELECT id, modify, name FROM grab_query_types ORDER BY id", &[])
        .unwrap();
    assert_eq!(outcome.rows.len(), 7);
    assert_eq!(
        outcome.rows[1],
        vec![Value::Integer(1), Value::Integer(0), Value::Text("SELECT".into())]
    );

    // decode the logged command type with the catalog
    let name: String = engine
        .connection()
        .query_row(
            "SELECT q.name FROM grab.statement_log l JOIN grab_query_types q ON q.id = l.command_type",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(name, "SELECT");
}

#[test]
fn test_file_backed_log_survives_reopen() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let main_path = temp_dir.path().join("main.db");
    let log_path = temp_dir.path().join("grab.db");
    let config = GrabConfig::default();

    {
        let engine = Engine::open(&main_path).unwrap();
        engine.create_schema("grab", Some(log_path.as_path())).unwrap();
        engine.create_statement_log(&config).unwrap();
        engine.load_extension(config.clone()).unwrap();
        engine.execute("CREATE TABLE t (a INTEGER)", &[]).unwrap();
        engine
            .execute("INSERT INTO t VALUES ($1)", &[Param::new(type_oid::INT4, Datum::Int4(5))])
            .unwrap();
    }

    let conn = rusqlite::Connection::open(&log_path).unwrap();
    let logged: i64 = conn
        .query_row("SELECT count(*) FROM statement_log", [], |row| row.get(0))
        .unwrap();
    assert_eq!(logged, 2);
    let command_type: i32 = conn
        .query_row("SELECT command_type FROM statement_log ORDER BY rowid LIMIT 1", [], |row| row.get(0))
        .unwrap();
    assert_eq!(command_type, CmdType::Utility.id());
}
