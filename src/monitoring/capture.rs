use tracing::debug;

use super::event::StatementEvent;
use super::instrument::finalize;
use super::logger::LogSink;
use super::params::render_params;
use crate::config::GrabConfig;
use crate::error::Result;
use crate::host::{Host, QueryDesc};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureOutcome {
    Logged,
    /// Log schema or table absent, nothing written.
    Inert,
}

/// Records `query` as one row of the configured log table.
pub fn capture_statement(host: &dyn Host, query: &mut QueryDesc, config: &GrabConfig) -> Result<CaptureOutcome> {
    let sink = LogSink::new(host, &config.schema, &config.table, config.layout);
    let Some(relation) = sink.resolve() else {
        return Ok(CaptureOutcome::Inert);
    };

    let timing = finalize(query.totaltime.as_mut(), host.current_timestamp());
    let params = render_params(query.params.as_ref(), host.types())?;

    let event = StatementEvent {
        transaction_id: host.transaction_id(),
        command_id: host.command_id(),
        process_id: host.process_id(),
        user_id: host.user_id(),
        timing,
        command_type: query.operation,
        source_text: query.source_text.clone(),
        params,
    };

    debug!(
        transaction_id = event.transaction_id,
        command_id = event.command_id,
        command_type = %event.command_type,
        params = event.params.as_ref().map_or(0, |p| p.len()),
        "Capturing statement"
    );

    sink.append(relation, event)?;
    Ok(CaptureOutcome::Logged)
}
