//! Scheduling policies

use std::fmt;

/// Scheduling policy selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// First come, first served; no preemption
    #[default]
    Fifo,
    /// FIFO with a time slice after which the running process is preempted
    RoundRobin {
        /// Slice length in ticks
        time_slice: u32,
    },
    /// Waking processes preempt the lowest-priority running process
    StaticPriority,
    /// Multi-level feedback queues
    Mlfq {
        /// Slice length in ticks
        time_slice: u32,
    },
}

impl Policy {
    /// Slice passed to the dispatcher; `None` disables the timer
    pub fn time_slice(&self) -> Option<u32> {
        match *self {
            Policy::RoundRobin { time_slice } | Policy::Mlfq { time_slice } => Some(time_slice),
            Policy::Fifo | Policy::StaticPriority => None,
        }
    }

    /// Whether ready processes live in the feedback queues
    pub fn uses_feedback_queues(&self) -> bool {
        matches!(self, Policy::Mlfq { .. })
    }

    /// Whether wake-ups may force a preemption
    pub fn is_preemptive_on_wake(&self) -> bool {
        matches!(self, Policy::StaticPriority)
    }

    /// Short policy name
    pub fn name(&self) -> &'static str {
        match self {
            Policy::Fifo => "fifo",
            Policy::RoundRobin { .. } => "round-robin",
            Policy::StaticPriority => "static-priority",
            Policy::Mlfq { .. } => "mlfq",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.time_slice() {
            Some(slice) => write!(f, "{} (time slice = {})", self.name(), slice),
            None => f.write_str(self.name()),
        }
    }
}
