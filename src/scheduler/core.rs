//! Scheduling policy engine
//!
//! [`Scheduler`] owns the ready structures and the CPU table and exposes one
//! handler per lifecycle event. CPU driver threads call the handlers
//! concurrently; each handler takes at most one internal lock at a time and
//! calls the [`Dispatcher`] with no lock held.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::process::{ProcessRef, ProcessState};
use super::cpu::{CpuId, CpuTable};
use super::dispatch::Dispatcher;
use super::feedback::{FeedbackQueues, Level};
use super::policy::Policy;
use super::queue::{Placement, ReadyQueue};

/// Scheduler statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Dispatches of a real process
    pub context_switches: usize,
    /// Dispatches of the idle process
    pub idle_dispatches: usize,
    /// Preempt handler invocations (timer or forced)
    pub preemptions: usize,
    /// Forced preemptions requested from the dispatcher
    pub forced_preemptions: usize,
    /// Forced interrupts dropped because their victim had already left
    pub absorbed_preemptions: usize,
    /// Processes that blocked on I/O
    pub yields: usize,
    /// Processes that terminated
    pub terminations: usize,
    /// Wake-up events handled
    pub wake_ups: usize,
}

#[derive(Default)]
struct SchedulerStatsInternal {
    context_switches: AtomicUsize,
    idle_dispatches: AtomicUsize,
    preemptions: AtomicUsize,
    forced_preemptions: AtomicUsize,
    absorbed_preemptions: AtomicUsize,
    yields: AtomicUsize,
    terminations: AtomicUsize,
    wake_ups: AtomicUsize,
}

/// The scheduler instance shared by all CPU drivers
pub struct Scheduler {
    config: SchedulerConfig,
    cpus: CpuTable,
    ready: ReadyQueue,
    feedback: FeedbackQueues,
    dispatcher: Arc<dyn Dispatcher>,
    stats: SchedulerStatsInternal,
    shutdown: AtomicBool,
}

impl Scheduler {
    /// Create a scheduler; every CPU starts idle
    pub fn new(config: SchedulerConfig, dispatcher: Arc<dyn Dispatcher>) -> Result<Arc<Self>> {
        config.validate()?;

        log::info!(
            "Scheduler created with {} CPUs, policy {}",
            config.cpu_count,
            config.policy
        );

        Ok(Arc::new(Self {
            cpus: CpuTable::new(config.cpu_count),
            ready: ReadyQueue::new(),
            feedback: FeedbackQueues::new(),
            dispatcher,
            stats: SchedulerStatsInternal::default(),
            shutdown: AtomicBool::new(false),
            config,
        }))
    }

    /// Block until something is runnable, then dispatch onto `cpu`.
    ///
    /// May still dispatch the idle process if another CPU took the work
    /// first, or if the scheduler is shutting down.
    pub fn idle(&self, cpu: CpuId) {
        if self.config.policy.uses_feedback_queues() {
            self.feedback.wait_for_work(&self.shutdown);
        } else {
            self.ready.wait_for_work(&self.shutdown);
        }
        self.schedule(cpu);
    }

    /// Bounded [`idle`](Self::idle): waits at most `timeout` before
    /// dispatching whatever is runnable, possibly nothing
    pub fn idle_timeout(&self, cpu: CpuId, timeout: Duration) {
        if self.config.policy.uses_feedback_queues() {
            self.feedback.wait_for_work_timeout(&self.shutdown, timeout);
        } else {
            self.ready.wait_for_work_timeout(&self.shutdown, timeout);
        }
        self.schedule(cpu);
    }

    /// Time slice expiry or forced interrupt on `cpu`
    pub fn preempt(&self, cpu: CpuId) {
        self.stats.preemptions.fetch_add(1, Ordering::Relaxed);

        if let Some(victim) = self.cpus.settle_claim(cpu) {
            if !self.claim_still_valid(cpu, &victim) {
                self.stats.absorbed_preemptions.fetch_add(1, Ordering::Relaxed);
                log::debug!("{}: interrupt for departed pid {} absorbed", cpu, victim.pid());
                return;
            }
        }

        if let Some(process) = self.cpus.take(cpu) {
            process.transition(ProcessState::Ready);
            log::debug!("{}: preempting pid {}", cpu, process.pid());
            if self.config.policy.uses_feedback_queues() {
                self.feedback.enqueue(process, Level::Two);
            } else {
                self.ready.enqueue(process, Placement::Back);
            }
        }

        self.schedule(cpu);
    }

    /// Whether a forced interrupt raised against `victim` should still
    /// preempt `cpu`.
    ///
    /// If the victim left the CPU before the interrupt arrived, its
    /// replacement is preempted only when the queue head outranks it.
    fn claim_still_valid(&self, cpu: CpuId, victim: &ProcessRef) -> bool {
        let Some(current) = self.cpus.current(cpu) else {
            return true;
        };
        if Arc::ptr_eq(&current, victim) {
            return true;
        }
        self.ready
            .peek_priority()
            .is_some_and(|head| head > current.static_priority())
    }

    /// The process on `cpu` issued an I/O request
    pub fn yield_cpu(&self, cpu: CpuId) {
        let process = self.bound(cpu, "yield");
        process.transition(ProcessState::Waiting);
        self.stats.yields.fetch_add(1, Ordering::Relaxed);
        log::debug!("{}: pid {} waiting on I/O", cpu, process.pid());
        self.schedule(cpu);
    }

    /// The process on `cpu` finished
    pub fn terminate(&self, cpu: CpuId) {
        let process = self.bound(cpu, "terminate");
        process.transition(ProcessState::Terminated);
        self.stats.terminations.fetch_add(1, Ordering::Relaxed);
        log::debug!("{}: pid {} terminated", cpu, process.pid());
        self.schedule(cpu);
    }

    /// A process arrived or finished its I/O.
    ///
    /// Panics if `process` is running or terminated.
    pub fn wake_up(&self, process: ProcessRef) {
        self.stats.wake_ups.fetch_add(1, Ordering::Relaxed);
        let prev = process.wake();

        let policy = self.config.policy;
        if policy.is_preemptive_on_wake() {
            self.wake_up_priority(process);
        } else if policy.uses_feedback_queues() {
            let level = match prev {
                ProcessState::Waiting => self.config.mlfq_io_level,
                _ => Level::One,
            };
            log::debug!("wake-up: pid {} placed at {}", process.pid(), level);
            self.feedback.enqueue(process, level);
        } else {
            log::debug!("wake-up: pid {} queued", process.pid());
            self.ready.enqueue(process, Placement::Back);
        }
    }

    fn wake_up_priority(&self, process: ProcessRef) {
        // The table lock is released before the queue lock is taken.
        match self.cpus.claim_victim(process.static_priority()) {
            Some((cpu, running)) => {
                log::debug!(
                    "wake-up: pid {} (priority {}) preempts pid {} (priority {}) on {}",
                    process.pid(),
                    process.static_priority(),
                    running.pid(),
                    running.static_priority(),
                    cpu
                );
                self.ready.enqueue(process, Placement::Front);
                self.stats.forced_preemptions.fetch_add(1, Ordering::Relaxed);
                self.dispatcher.force_preempt(cpu);
            }
            None => {
                log::debug!("wake-up: pid {} queued", process.pid());
                self.ready.enqueue(process, Placement::Back);
            }
        }
    }

    /// Select the next process for `cpu` and hand it to the dispatcher
    fn schedule(&self, cpu: CpuId) {
        let next = if self.config.policy.uses_feedback_queues() {
            self.feedback.dequeue().map(|(process, _)| process)
        } else {
            self.ready.dequeue()
        };

        self.cpus.bind(cpu, next.clone());

        match &next {
            Some(process) => {
                process.transition(ProcessState::Running);
                self.stats.context_switches.fetch_add(1, Ordering::Relaxed);
                log::debug!("{}: running pid {}", cpu, process.pid());
            }
            None => {
                self.stats.idle_dispatches.fetch_add(1, Ordering::Relaxed);
                log::trace!("{}: idle", cpu);
            }
        }

        self.dispatcher.context_switch(cpu, next, self.config.policy.time_slice());
    }

    /// The process on `cpu`; it stays bound until `schedule` replaces it
    fn bound(&self, cpu: CpuId, event: &str) -> ProcessRef {
        match self.cpus.current(cpu) {
            Some(process) => process,
            None => panic!("{} on {} with no bound process", event, cpu),
        }
    }

    /// Stop blocking in the idle paths; handlers keep working
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.ready.wake_all();
        self.feedback.wake_all();
        log::info!("Scheduler shut down");
    }

    /// Check if the scheduler is shutting down
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Get a statistics snapshot
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            context_switches: self.stats.context_switches.load(Ordering::Relaxed),
            idle_dispatches: self.stats.idle_dispatches.load(Ordering::Relaxed),
            preemptions: self.stats.preemptions.load(Ordering::Relaxed),
            forced_preemptions: self.stats.forced_preemptions.load(Ordering::Relaxed),
            absorbed_preemptions: self.stats.absorbed_preemptions.load(Ordering::Relaxed),
            yields: self.stats.yields.load(Ordering::Relaxed),
            terminations: self.stats.terminations.load(Ordering::Relaxed),
            wake_ups: self.stats.wake_ups.load(Ordering::Relaxed),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Get the active policy
    pub fn policy(&self) -> Policy {
        self.config.policy
    }

    /// Get the number of CPUs
    pub fn num_cpus(&self) -> usize {
        self.config.cpu_count
    }

    /// Process currently bound to `cpu`
    pub fn running(&self, cpu: CpuId) -> Option<ProcessRef> {
        self.cpus.current(cpu)
    }

    /// The CPU assignment table
    pub fn cpus(&self) -> &CpuTable {
        &self.cpus
    }

    /// The single-level ready queue (FIFO, round robin, static priority)
    pub fn ready_queue(&self) -> &ReadyQueue {
        &self.ready
    }

    /// The feedback queues (MLFQ)
    pub fn feedback_queues(&self) -> &FeedbackQueues {
        &self.feedback
    }

    /// Number of runnable processes waiting under the active policy
    pub fn ready_len(&self) -> usize {
        if self.config.policy.uses_feedback_queues() {
            self.feedback.len()
        } else {
            self.ready.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{Pid, Process};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        switches: Mutex<Vec<(CpuId, Option<Pid>, Option<u32>)>>,
        interrupts: Mutex<Vec<CpuId>>,
    }

    impl Dispatcher for Recorder {
        fn context_switch(&self, cpu: CpuId, process: Option<ProcessRef>, time_slice: Option<u32>) {
            self.switches.lock().push((cpu, process.map(|p| p.pid()), time_slice));
        }

        fn force_preempt(&self, cpu: CpuId) {
            self.interrupts.lock().push(cpu);
        }
    }

    fn scheduler(cpus: usize, policy: Policy) -> (Arc<Scheduler>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let scheduler = Scheduler::new(SchedulerConfig::new(cpus, policy), recorder.clone()).unwrap();
        (scheduler, recorder)
    }

    fn proc(pid: usize, priority: u32) -> ProcessRef {
        Process::new(Pid(pid), format!("p{}", pid), priority)
    }

    #[test]
    fn test_rejects_zero_cpus() {
        let result = Scheduler::new(
            SchedulerConfig::new(0, Policy::Fifo),
            Arc::new(Recorder::default()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_idle_dispatches_woken_process() {
        let (sched, recorder) = scheduler(1, Policy::Fifo);
        let p = proc(1, 0);
        sched.wake_up(Arc::clone(&p));
        sched.idle(CpuId(0));

        assert_eq!(p.state(), ProcessState::Running);
        assert_eq!(sched.running(CpuId(0)).unwrap().pid(), Pid(1));
        assert_eq!(*recorder.switches.lock(), vec![(CpuId(0), Some(Pid(1)), None)]);
    }

    #[test]
    fn test_round_robin_passes_time_slice() {
        let (sched, recorder) = scheduler(1, Policy::RoundRobin { time_slice: 3 });
        sched.wake_up(proc(1, 0));
        sched.idle(CpuId(0));
        assert_eq!(recorder.switches.lock()[0].2, Some(3));
    }

    #[test]
    fn test_yield_and_terminate_leave_queues() {
        let (sched, _recorder) = scheduler(1, Policy::Fifo);
        let a = proc(1, 0);
        let b = proc(2, 0);
        sched.wake_up(Arc::clone(&a));
        sched.wake_up(Arc::clone(&b));
        sched.idle(CpuId(0));

        sched.yield_cpu(CpuId(0));
        assert_eq!(a.state(), ProcessState::Waiting);
        assert!(!a.is_queued());
        assert_eq!(sched.running(CpuId(0)).unwrap().pid(), Pid(2));

        sched.terminate(CpuId(0));
        assert_eq!(b.state(), ProcessState::Terminated);
        assert!(sched.running(CpuId(0)).is_none());
        assert_eq!(sched.ready_len(), 0);

        let stats = sched.stats();
        assert_eq!(stats.yields, 1);
        assert_eq!(stats.terminations, 1);
        assert_eq!(stats.context_switches, 2);
        assert_eq!(stats.idle_dispatches, 1);
    }

    #[test]
    fn test_preempt_on_idle_cpu_just_schedules() {
        let (sched, recorder) = scheduler(1, Policy::StaticPriority);
        sched.preempt(CpuId(0));
        assert_eq!(*recorder.switches.lock(), vec![(CpuId(0), None, None)]);
    }

    #[test]
    #[should_panic(expected = "no bound process")]
    fn test_yield_on_idle_cpu_panics() {
        let (sched, _recorder) = scheduler(1, Policy::Fifo);
        sched.yield_cpu(CpuId(0));
    }

    #[test]
    fn test_priority_wake_up_requests_preemption() {
        let (sched, recorder) = scheduler(1, Policy::StaticPriority);
        sched.wake_up(proc(1, 1));
        sched.idle(CpuId(0));

        sched.wake_up(proc(2, 9));
        assert_eq!(*recorder.interrupts.lock(), vec![CpuId(0)]);
        assert_eq!(sched.ready_queue().snapshot(), vec![Pid(2)]);

        sched.preempt(CpuId(0));
        assert_eq!(sched.running(CpuId(0)).unwrap().pid(), Pid(2));
        assert_eq!(sched.ready_queue().snapshot(), vec![Pid(1)]);
        assert_eq!(sched.stats().forced_preemptions, 1);
    }

    #[test]
    #[should_panic(expected = "woken while running")]
    fn test_wake_up_of_running_process_panics() {
        let (sched, _recorder) = scheduler(1, Policy::Fifo);
        let p = proc(1, 0);
        sched.wake_up(Arc::clone(&p));
        sched.idle(CpuId(0));
        sched.wake_up(p);
    }

    #[test]
    #[should_panic(expected = "woken while running")]
    fn test_mlfq_wake_up_of_running_process_panics() {
        let (sched, _recorder) = scheduler(1, Policy::Mlfq { time_slice: 2 });
        let p = proc(1, 0);
        sched.wake_up(Arc::clone(&p));
        sched.idle(CpuId(0));
        sched.wake_up(p);
    }

    #[test]
    fn test_yielding_cpu_stays_claimable() {
        let (sched, recorder) = scheduler(1, Policy::StaticPriority);
        sched.wake_up(proc(1, 5));
        sched.idle(CpuId(0));
        sched.wake_up(proc(2, 1));

        // The waker arrives first; the slot is occupied until rebound.
        sched.wake_up(proc(3, 9));
        assert_eq!(*recorder.interrupts.lock(), vec![CpuId(0)]);
        sched.yield_cpu(CpuId(0));
        assert_eq!(sched.running(CpuId(0)).unwrap().pid(), Pid(3));

        // The interrupt lands after its victim left; the waker keeps the CPU.
        sched.preempt(CpuId(0));
        assert_eq!(sched.running(CpuId(0)).unwrap().pid(), Pid(3));
        assert_eq!(sched.ready_queue().snapshot(), vec![Pid(2)]);
        assert_eq!(sched.stats().absorbed_preemptions, 1);
    }

    #[test]
    fn test_terminating_cpu_stays_claimable() {
        let (sched, _recorder) = scheduler(1, Policy::StaticPriority);
        sched.wake_up(proc(1, 5));
        sched.idle(CpuId(0));
        sched.wake_up(proc(2, 1));
        sched.wake_up(proc(3, 9));

        sched.terminate(CpuId(0));
        sched.preempt(CpuId(0));
        assert_eq!(sched.running(CpuId(0)).unwrap().pid(), Pid(3));
        assert_eq!(sched.stats().absorbed_preemptions, 1);
    }

    #[test]
    fn test_late_claim_preempts_replacement() {
        let (sched, _recorder) = scheduler(1, Policy::StaticPriority);
        sched.wake_up(proc(1, 5));
        sched.idle(CpuId(0));
        sched.wake_up(proc(2, 1));

        // Claim lands on the outgoing process; the yield then binds the
        // low-priority head before the waker reaches the queue.
        let waker = proc(3, 9);
        waker.wake();
        let (cpu, _) = sched.cpus.claim_victim(waker.static_priority()).unwrap();
        sched.yield_cpu(cpu);
        assert_eq!(sched.running(cpu).unwrap().pid(), Pid(2));
        sched.ready.enqueue(waker, Placement::Front);

        sched.preempt(cpu);
        assert_eq!(sched.running(cpu).unwrap().pid(), Pid(3));
        assert_eq!(sched.ready_queue().snapshot(), vec![Pid(2)]);
        assert_eq!(sched.stats().absorbed_preemptions, 0);
    }

    #[test]
    fn test_mlfq_placement() {
        let (sched, _recorder) = scheduler(1, Policy::Mlfq { time_slice: 2 });
        let p = proc(1, 0);
        sched.wake_up(Arc::clone(&p));
        assert_eq!(sched.feedback_queues().snapshot(Level::One), vec![Pid(1)]);

        sched.idle(CpuId(0));
        sched.preempt(CpuId(0));
        // Only process, so it is picked again straight from level 2.
        assert_eq!(sched.running(CpuId(0)).unwrap().pid(), Pid(1));

        sched.yield_cpu(CpuId(0));
        sched.wake_up(Arc::clone(&p));
        assert_eq!(sched.feedback_queues().snapshot(Level::Three), vec![Pid(1)]);
    }

    #[test]
    fn test_mlfq_configurable_io_level() {
        let recorder = Arc::new(Recorder::default());
        let config = SchedulerConfig {
            mlfq_io_level: Level::One,
            ..SchedulerConfig::new(1, Policy::Mlfq { time_slice: 2 })
        };
        let sched = Scheduler::new(config, recorder).unwrap();

        let p = proc(1, 0);
        sched.wake_up(Arc::clone(&p));
        sched.idle(CpuId(0));
        sched.yield_cpu(CpuId(0));
        sched.wake_up(p);
        assert_eq!(sched.feedback_queues().snapshot(Level::One), vec![Pid(1)]);
    }

    #[test]
    fn test_shutdown_releases_idle() {
        let (sched, recorder) = scheduler(1, Policy::Fifo);
        let handle = {
            let sched = Arc::clone(&sched);
            std::thread::spawn(move || sched.idle(CpuId(0)))
        };
        std::thread::sleep(Duration::from_millis(20));
        sched.shutdown();
        handle.join().unwrap();

        assert!(sched.is_shutting_down());
        assert_eq!(*recorder.switches.lock(), vec![(CpuId(0), None, None)]);
    }
}
