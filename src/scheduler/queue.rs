//! Single-level ready queue
//!
//! FIFO list of runnable processes shared by the FIFO, round robin and static
//! priority policies. Idle CPUs park on the queue's condition variable until
//! a process is inserted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use parking_lot::{Condvar, Mutex};
use crate::process::{Pid, ProcessRef, ProcessState};

/// Where an enqueued process lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Tail of the queue (normal arrival)
    #[default]
    Back,
    /// Head of the queue, so the process is the very next one dequeued
    Front,
}

/// Ready queue with idle-waiter wakeup
pub struct ReadyQueue {
    processes: Mutex<VecDeque<ProcessRef>>,
    not_empty: Condvar,
}

impl ReadyQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            processes: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    /// Insert a process and wake one idle waiter
    pub fn enqueue(&self, process: ProcessRef, placement: Placement) {
        assert_ne!(
            process.state(),
            ProcessState::Terminated,
            "terminated process {} enqueued",
            process.pid()
        );
        process.mark_queued();

        let mut queue = self.processes.lock();
        log::trace!("ready queue: enqueue pid {} ({:?})", process.pid(), placement);
        match placement {
            Placement::Back => queue.push_back(process),
            Placement::Front => queue.push_front(process),
        }
        drop(queue);

        self.not_empty.notify_one();
    }

    /// Remove the head of the queue, or `None` when nothing is runnable
    pub fn dequeue(&self) -> Option<ProcessRef> {
        let process = self.processes.lock().pop_front()?;
        process.mark_dequeued();
        log::trace!("ready queue: dequeue pid {}", process.pid());
        Some(process)
    }

    /// Static priority of the process at the head
    pub fn peek_priority(&self) -> Option<u32> {
        self.processes.lock().front().map(|p| p.static_priority())
    }

    /// Block until the queue is non-empty or `shutdown` is set
    pub fn wait_for_work(&self, shutdown: &AtomicBool) {
        let mut queue = self.processes.lock();
        while queue.is_empty() && !shutdown.load(Ordering::Acquire) {
            self.not_empty.wait(&mut queue);
        }
    }

    /// Like [`wait_for_work`](Self::wait_for_work) but gives up after `timeout`.
    ///
    /// Returns `true` if work was observed.
    pub fn wait_for_work_timeout(&self, shutdown: &AtomicBool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut queue = self.processes.lock();
        while queue.is_empty() && !shutdown.load(Ordering::Acquire) {
            if self.not_empty.wait_until(&mut queue, deadline).timed_out() {
                break;
            }
        }
        !queue.is_empty()
    }

    /// Wake every waiter so it can re-check its predicate
    pub fn wake_all(&self) {
        // Taking the lock orders this after any waiter's predicate check.
        let _queue = self.processes.lock();
        self.not_empty.notify_all();
    }

    /// Number of queued processes
    pub fn len(&self) -> usize {
        self.processes.lock().len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.processes.lock().is_empty()
    }

    /// Pids in dequeue order
    pub fn snapshot(&self) -> Vec<Pid> {
        self.processes.lock().iter().map(|p| p.pid()).collect()
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}
