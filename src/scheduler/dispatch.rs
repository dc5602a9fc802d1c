//! Boundary between the scheduler and whatever executes processes
//!
//! The scheduler decides; a [`Dispatcher`] carries the decision out. The
//! simulator in this crate is one implementation, tests use recording ones.

use crate::process::ProcessRef;
use super::cpu::CpuId;

/// Execution layer driven by the scheduler
pub trait Dispatcher: Send + Sync {
    /// Start `process` on `cpu`, or run the idle process when `None`.
    ///
    /// With `Some(slice)` the harness must raise a preemption on `cpu` once
    /// the process has run for `slice` ticks.
    fn context_switch(&self, cpu: CpuId, process: Option<ProcessRef>, time_slice: Option<u32>);

    /// Interrupt `cpu` so that it calls back into the scheduler's preempt
    /// handler. Must not call into the scheduler synchronously.
    fn force_preempt(&self, cpu: CpuId);
}

/// Dispatcher that discards every request
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDispatcher;

impl Dispatcher for NullDispatcher {
    fn context_switch(&self, _cpu: CpuId, _process: Option<ProcessRef>, _time_slice: Option<u32>) {}

    fn force_preempt(&self, _cpu: CpuId) {}
}
