//! Executor hook registry.
//!
//! Each extension point keeps an ordered list of installed hooks. Dispatch
//! starts at the most recently installed hook and hands it a chain for the
//! rest of the list; the host's default routine terminates the chain. A hook
//! that calls `proceed` before its own work observes events after every
//! earlier hook, one that works first observes them before.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::host::{ExecFlags, Host, QueryDesc};

pub trait ExecutorStartHook: Send + Sync {
    fn executor_start(
        &self,
        host: &dyn Host,
        query: &mut QueryDesc,
        eflags: ExecFlags,
        next: StartChain<'_>,
    ) -> Result<()>;
}

pub trait ExecutorEndHook: Send + Sync {
    fn executor_end(&self, host: &dyn Host, query: &mut QueryDesc, next: EndChain<'_>) -> Result<()>;
}

/// Remaining start hooks below the one currently running.
pub struct StartChain<'a> {
    hooks: &'a [Arc<dyn ExecutorStartHook>],
}

impl StartChain<'_> {
    pub fn proceed(self, host: &dyn Host, query: &mut QueryDesc, eflags: ExecFlags) -> Result<()> {
        match self.hooks.split_last() {
            Some((hook, rest)) => hook.executor_start(host, query, eflags, StartChain { hooks: rest }),
            None => host.standard_executor_start(query, eflags),
        }
    }
}

/// Remaining end hooks below the one currently running.
pub struct EndChain<'a> {
    hooks: &'a [Arc<dyn ExecutorEndHook>],
}

impl EndChain<'_> {
    pub fn proceed(self, host: &dyn Host, query: &mut QueryDesc) -> Result<()> {
        match self.hooks.split_last() {
            Some((hook, rest)) => hook.executor_end(host, query, EndChain { hooks: rest }),
            None => host.standard_executor_end(query),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HookId(u64);

pub struct HookRegistry {
    next_id: AtomicU64,
    start: RwLock<Vec<(HookId, Arc<dyn ExecutorStartHook>)>>,
    end: RwLock<Vec<(HookId, Arc<dyn ExecutorEndHook>)>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            start: RwLock::new(Vec::new()),
            end: RwLock::new(Vec::new()),
        }
    }

    fn allocate_id(&self) -> HookId {
        HookId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn install_start(&self, hook: Arc<dyn ExecutorStartHook>) -> HookId {
        let id = self.allocate_id();
        let mut start = self.start.write();
        start.push((id, hook));
        debug!(hook_id = id.0, depth = start.len(), "Installed executor start hook");
        id
    }

    pub fn install_end(&self, hook: Arc<dyn ExecutorEndHook>) -> HookId {
        let id = self.allocate_id();
        let mut end = self.end.write();
        end.push((id, hook));
        debug!(hook_id = id.0, depth = end.len(), "Installed executor end hook");
        id
    }

    /// Removes the hook registered under `id`, leaving every other hook in
    /// its original position. Returns false if nothing was registered.
    pub fn remove(&self, id: HookId) -> bool {
        let mut removed = false;

        {
            let mut start = self.start.write();
            let before = start.len();
            start.retain(|(hook_id, _)| *hook_id != id);
            removed |= start.len() != before;
        }
        {
            let mut end = self.end.write();
            let before = end.len();
            end.retain(|(hook_id, _)| *hook_id != id);
            removed |= end.len() != before;
        }

        if removed {
            debug!(hook_id = id.0, "Removed executor hook");
        }
        removed
    }

    pub fn start_hook_count(&self) -> usize {
        self.start.read().len()
    }

    pub fn end_hook_count(&self) -> usize {
        self.end.read().len()
    }

    pub fn run_executor_start(&self, host: &dyn Host, query: &mut QueryDesc, eflags: ExecFlags) -> Result<()> {
        // Snapshot so hooks can (un)install without holding the lock
        let hooks: Vec<Arc<dyn ExecutorStartHook>> =
            self.start.read().iter().map(|(_, h)| h.clone()).collect();
        StartChain { hooks: &hooks }.proceed(host, query, eflags)
    }

    pub fn run_executor_end(&self, host: &dyn Host, query: &mut QueryDesc) -> Result<()> {
        let hooks: Vec<Arc<dyn ExecutorEndHook>> =
            self.end.read().iter().map(|(_, h)| h.clone()).collect();
        EndChain { hooks: &hooks }.proceed(host, query)
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}
