use pg_grab_shared::Oid;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GrabError {
    #[error("no output function registered for type {0}")]
    NoOutputFunction(Oid),

    #[error("no input function registered for type {0}")]
    NoInputFunction(Oid),

    #[error("value of type {found} cannot be rendered as type {expected}")]
    TypeMismatch { expected: Oid, found: Oid },

    #[error("invalid input syntax for type {type_name}: \"{input}\"")]
    InvalidInput { type_name: String, input: String },

    #[error("log table has {found} columns, layout {layout} expects {expected}")]
    LayoutMismatch {
        layout: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("relation {0} does not exist")]
    RelationNotFound(Oid),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transaction error: {0}")]
    Transaction(String),
}

pub type Result<T> = std::result::Result<T, GrabError>;
