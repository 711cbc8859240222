//! Load/unload lifecycle and the executor hooks that drive statement capture.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{CaptureErrorPolicy, GrabConfig};
use crate::error::Result;
use crate::hooks::{EndChain, ExecutorEndHook, ExecutorStartHook, HookId, HookRegistry, StartChain};
use crate::host::{ExecFlags, Host, QueryDesc};
use crate::monitoring::{capture_statement, ensure_attached};

struct GrabInterceptor {
    config: Arc<GrabConfig>,
}

impl ExecutorStartHook for GrabInterceptor {
    fn executor_start(
        &self,
        host: &dyn Host,
        query: &mut QueryDesc,
        eflags: ExecFlags,
        next: StartChain<'_>,
    ) -> Result<()> {
        next.proceed(host, query, eflags)?;

        if ensure_attached(query) {
            debug!(command_type = %query.operation, "Attached statement timer");
        }
        Ok(())
    }
}

impl ExecutorEndHook for GrabInterceptor {
    fn executor_end(&self, host: &dyn Host, query: &mut QueryDesc, next: EndChain<'_>) -> Result<()> {
        let captured = capture_statement(host, query, &self.config);

        // teardown runs whatever happened to the capture
        let chained = next.proceed(host, query);

        match captured {
            Ok(_) => chained,
            Err(e) => match self.config.on_error {
                CaptureErrorPolicy::Skip => {
                    warn!(
                        error = %e,
                        schema = %self.config.schema,
                        table = %self.config.table,
                        "Failed to log statement, continuing without a log row"
                    );
                    chained
                }
                CaptureErrorPolicy::Abort => {
                    chained?;
                    Err(e)
                }
            },
        }
    }
}

/// A loaded statement logger. Dropping it without `on_unload` leaves its
/// hooks installed.
#[derive(Debug)]
pub struct GrabExtension {
    config: Arc<GrabConfig>,
    start_hook: HookId,
    end_hook: HookId,
}

impl GrabExtension {
    /// Installs the start and end hooks on top of whatever is registered.
    pub fn on_load(hooks: &HookRegistry, config: GrabConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let interceptor = Arc::new(GrabInterceptor {
            config: config.clone(),
        });

        let start_hook = hooks.install_start(interceptor.clone());
        let end_hook = hooks.install_end(interceptor);

        info!(
            schema = %config.schema,
            table = %config.table,
            layout = config.layout.name(),
            "Statement logger loaded"
        );

        Ok(Self {
            config,
            start_hook,
            end_hook,
        })
    }

    /// Removes this extension's hooks, leaving the others as they were.
    pub fn on_unload(self, hooks: &HookRegistry) {
        hooks.remove(self.start_hook);
        hooks.remove(self.end_hook);
        info!(schema = %self.config.schema, table = %self.config.table, "Statement logger unloaded");
    }

    pub fn config(&self) -> &GrabConfig {
        &self.config
    }
}
