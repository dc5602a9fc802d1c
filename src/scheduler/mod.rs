//! Scheduler core
//!
//! Ready structures, the CPU assignment table and the policy engine that
//! ties them together. Each [`Scheduler`] is an independent instance; there
//! is no global scheduler state.

pub mod core;
pub mod cpu;
pub mod dispatch;
pub mod feedback;
pub mod policy;
pub mod queue;

pub use self::core::{Scheduler, SchedulerStats};
pub use cpu::{CpuId, CpuTable};
pub use dispatch::{Dispatcher, NullDispatcher};
pub use feedback::{FeedbackQueues, Level, LEVEL_COUNT};
pub use policy::Policy;
pub use queue::{Placement, ReadyQueue};
