//! Multi-level feedback queues
//!
//! Four FIFO levels served in strict priority order: a process at a lower
//! level is only picked when every higher level is empty. All levels share
//! one lock and one condition variable, so an idle CPU wakes as soon as any
//! level receives a process.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use parking_lot::{Condvar, Mutex};
use crate::process::{Pid, ProcessRef, ProcessState};

/// Number of feedback levels
pub const LEVEL_COUNT: usize = 4;

/// Feedback level, `One` being the most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// New arrivals
    One,
    /// Processes that used up their time slice
    Two,
    /// Processes returning from I/O
    Three,
    /// Lowest level
    Four,
}

impl Level {
    /// All levels from highest to lowest priority
    pub const ALL: [Level; LEVEL_COUNT] = [Level::One, Level::Two, Level::Three, Level::Four];

    /// Zero-based index into the level array
    pub fn index(self) -> usize {
        match self {
            Level::One => 0,
            Level::Two => 1,
            Level::Three => 2,
            Level::Four => 3,
        }
    }

    /// Level number as shown to users (1 to 4)
    pub fn number(self) -> usize {
        self.index() + 1
    }

    /// Parse a 1-based level number
    pub fn from_number(number: usize) -> Option<Level> {
        Level::ALL.get(number.checked_sub(1)?).copied()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.number())
    }
}

/// The four-level queue set
pub struct FeedbackQueues {
    levels: Mutex<[VecDeque<ProcessRef>; LEVEL_COUNT]>,
    not_empty: Condvar,
}

impl FeedbackQueues {
    /// Create an empty queue set
    pub fn new() -> Self {
        Self {
            levels: Mutex::new(Default::default()),
            not_empty: Condvar::new(),
        }
    }

    /// Append a process to the tail of `level` and wake one idle waiter
    pub fn enqueue(&self, process: ProcessRef, level: Level) {
        assert_ne!(
            process.state(),
            ProcessState::Terminated,
            "terminated process {} enqueued",
            process.pid()
        );
        process.mark_queued();

        let mut levels = self.levels.lock();
        log::trace!("feedback queues: enqueue pid {} at {}", process.pid(), level);
        levels[level.index()].push_back(process);
        drop(levels);

        self.not_empty.notify_one();
    }

    /// Remove the head of the highest non-empty level
    pub fn dequeue(&self) -> Option<(ProcessRef, Level)> {
        let mut levels = self.levels.lock();
        let (process, level) = Level::ALL
            .iter()
            .find_map(|&level| levels[level.index()].pop_front().map(|p| (p, level)))?;
        drop(levels);

        process.mark_dequeued();
        log::trace!("feedback queues: dequeue pid {} from {}", process.pid(), level);
        Some((process, level))
    }

    /// Block until some level is non-empty or `shutdown` is set
    pub fn wait_for_work(&self, shutdown: &AtomicBool) {
        let mut levels = self.levels.lock();
        while levels.iter().all(VecDeque::is_empty) && !shutdown.load(Ordering::Acquire) {
            self.not_empty.wait(&mut levels);
        }
    }

    /// Bounded variant of [`wait_for_work`](Self::wait_for_work); returns
    /// `true` if work was observed
    pub fn wait_for_work_timeout(&self, shutdown: &AtomicBool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut levels = self.levels.lock();
        while levels.iter().all(VecDeque::is_empty) && !shutdown.load(Ordering::Acquire) {
            if self.not_empty.wait_until(&mut levels, deadline).timed_out() {
                break;
            }
        }
        levels.iter().any(|level| !level.is_empty())
    }

    /// Wake every waiter so it can re-check its predicate
    pub fn wake_all(&self) {
        let _levels = self.levels.lock();
        self.not_empty.notify_all();
    }

    /// Total number of queued processes
    pub fn len(&self) -> usize {
        self.levels.lock().iter().map(VecDeque::len).sum()
    }

    /// Number of processes waiting at `level`
    pub fn level_len(&self, level: Level) -> usize {
        self.levels.lock()[level.index()].len()
    }

    /// Check if every level is empty
    pub fn is_empty(&self) -> bool {
        self.levels.lock().iter().all(VecDeque::is_empty)
    }

    /// Pids waiting at `level`, in dequeue order
    pub fn snapshot(&self, level: Level) -> Vec<Pid> {
        self.levels.lock()[level.index()].iter().map(|p| p.pid()).collect()
    }
}

impl Default for FeedbackQueues {
    fn default() -> Self {
        Self::new()
    }
}
