//! Process records
//!
//! A [`Process`] is the scheduler's view of a simulated process: identity,
//! static priority and lifecycle state. Records are shared as [`ProcessRef`]
//! between the queues, the CPU table and the harness.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use parking_lot::Mutex;

/// Shared handle to a process record
pub type ProcessRef = Arc<Process>;

/// Process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(pub usize);

impl Pid {
    /// Get the numeric ID
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Runnable, waiting for a CPU
    Ready,
    /// Bound to a CPU
    Running,
    /// Blocked on I/O
    Waiting,
    /// Finished; never scheduled again
    Terminated,
}

impl ProcessState {
    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, next),
            (Ready, Running)
                | (Ready, Ready)
                | (Running, Ready)
                | (Running, Waiting)
                | (Running, Terminated)
                | (Waiting, Ready)
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::Ready => "ready",
            ProcessState::Running => "running",
            ProcessState::Waiting => "waiting",
            ProcessState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// A process record
pub struct Process {
    pid: Pid,
    name: String,
    /// Larger values are more important
    static_priority: u32,
    state: Mutex<ProcessState>,
    /// Set while the record sits in a ready queue
    queued: AtomicBool,
}

impl Process {
    /// Create a new record in the `Ready` state
    pub fn new(pid: Pid, name: impl Into<String>, static_priority: u32) -> ProcessRef {
        Arc::new(Self {
            pid,
            name: name.into(),
            static_priority,
            state: Mutex::new(ProcessState::Ready),
            queued: AtomicBool::new(false),
        })
    }

    /// Get the process ID
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Get the process name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the static priority
    pub fn static_priority(&self) -> u32 {
        self.static_priority
    }

    /// Get the current state
    pub fn state(&self) -> ProcessState {
        *self.state.lock()
    }

    /// Move to `next`, returning the previous state.
    ///
    /// Panics on a transition the lifecycle does not allow; those are
    /// scheduler bugs, not runtime conditions.
    pub fn transition(&self, next: ProcessState) -> ProcessState {
        let mut state = self.state.lock();
        let prev = *state;
        assert!(
            prev.can_transition_to(next),
            "process {} ({}): illegal transition {} -> {}",
            self.pid,
            self.name,
            prev,
            next
        );
        *state = next;
        prev
    }

    /// Make an arriving or I/O-complete process runnable, returning the
    /// previous state.
    ///
    /// Panics unless the process is `Ready` (new) or `Waiting`; a running
    /// process is still bound to a CPU and must not be queued.
    pub fn wake(&self) -> ProcessState {
        let mut state = self.state.lock();
        let prev = *state;
        assert!(
            matches!(prev, ProcessState::Ready | ProcessState::Waiting),
            "process {} ({}): woken while {}",
            self.pid,
            self.name,
            prev
        );
        *state = ProcessState::Ready;
        prev
    }

    /// Whether the record is currently held by a ready queue
    pub fn is_queued(&self) -> bool {
        self.queued.load(Ordering::Acquire)
    }

    pub(crate) fn mark_queued(&self) {
        let was = self.queued.swap(true, Ordering::AcqRel);
        assert!(!was, "process {} enqueued twice", self.pid);
    }

    pub(crate) fn mark_dequeued(&self) {
        self.queued.store(false, Ordering::Release);
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("static_priority", &self.static_priority)
            .field("state", &self.state())
            .finish()
    }
}
