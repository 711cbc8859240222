mod capture;
mod event;
mod instrument;
mod logger;
mod params;

pub use capture::{capture_statement, CaptureOutcome};
pub use event::StatementEvent;
pub use instrument::{ensure_attached, finalize, Instrumentation, StatementTiming};
pub use logger::{LogLayout, LogSink};
pub use params::{render_params, RenderedParams};
