//! Error types for os-sched
//!
//! Scheduling operations themselves never fail; these errors cover startup
//! configuration and the threads owned by the simulator.

use thiserror::Error;

/// Main error type for os-sched operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed command line
    #[error("Usage error: {reason}")]
    Usage {
        /// What was wrong with the arguments
        reason: String,
    },

    /// CPU count must be positive
    #[error("Invalid CPU count: {count}")]
    InvalidCpuCount {
        /// The rejected count
        count: usize,
    },

    /// Policy needs a time slice but none was given
    #[error("Policy {policy} requires a time slice")]
    MissingTimeSlice {
        /// Name of the policy
        policy: String,
    },

    /// Time slice must be a positive number of ticks
    #[error("Invalid time slice: {value}")]
    InvalidTimeSlice {
        /// The rejected value as given
        value: String,
    },

    /// Workload cannot be simulated
    #[error("Invalid workload: {reason}")]
    InvalidWorkload {
        /// What is wrong with the workload
        reason: String,
    },

    /// Runtime error (thread spawn/join failures)
    #[error("Runtime error: {reason}")]
    Runtime {
        /// Reason for the runtime error
        reason: String,
    },
}

impl Error {
    /// Whether this error should be reported together with the usage text
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Error::Usage { .. }
                | Error::InvalidCpuCount { .. }
                | Error::MissingTimeSlice { .. }
                | Error::InvalidTimeSlice { .. }
        )
    }
}

/// Convenient result type alias
pub type Result<T> = std::result::Result<T, Error>;
