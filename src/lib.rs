pub mod command_types;
pub mod config;
pub mod database;
pub mod error;
pub mod extension;
pub mod hooks;
pub mod host;
pub mod monitoring;
pub mod types;

// Re-exports for convenience
pub use command_types::{query_types, CommandTypeRow};
pub use config::{CaptureErrorPolicy, GrabConfig};
pub use database::{Engine, ExecOutcome, LoggedParams, LoggedStatement};
pub use error::{GrabError, Result};
pub use extension::GrabExtension;
pub use hooks::{EndChain, ExecutorEndHook, ExecutorStartHook, HookId, HookRegistry, StartChain};
pub use host::{Host, QueryDesc};
pub use monitoring::{CaptureOutcome, LogLayout};
pub use types::TypeRegistry;
