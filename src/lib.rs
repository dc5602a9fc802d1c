//! # os-sched
//!
//! The decision core of a multi-CPU process scheduler simulation.
//!
//! A [`Scheduler`](scheduler::Scheduler) receives lifecycle events from CPU
//! driver threads (arrival, I/O completion, timer expiry, I/O issuance,
//! termination) and decides which process runs on which CPU.
//!
//! ## Policies
//!
//! - **FIFO**: one ready queue, no preemption
//! - **Round Robin**: FIFO plus a time slice
//! - **Static Priority**: a waking process preempts the lowest-priority
//!   running process when every CPU is busy
//! - **MLFQ**: four feedback levels served in strict priority order
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use os_sched::prelude::*;
//!
//! let config = SchedulerConfig::new(2, Policy::RoundRobin { time_slice: 3 });
//! let report = Simulator::new(SimulatorConfig::new(config))
//!     .run(Workload::random(6, 42))
//!     .unwrap();
//! println!("finished in {} ticks", report.elapsed_ticks);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod process;
pub mod scheduler;
pub mod simulator;

/// Convenient re-exports for common functionality
pub mod prelude {
    pub use crate::config::{CommandLine, SchedulerConfig};
    pub use crate::error::{Error, Result};
    pub use crate::process::{Pid, Process, ProcessRef, ProcessState};
    pub use crate::scheduler::{CpuId, Dispatcher, Level, Placement, Policy, Scheduler, SchedulerStats};
    pub use crate::simulator::{Burst, Job, SimulationReport, Simulator, SimulatorConfig, Workload};
}

pub use prelude::*;
