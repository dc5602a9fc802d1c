//! Common test harness for os-sched tests
//!
//! Provides a recording dispatcher and helpers for driving a scheduler by
//! hand, without the simulator's threads.

#![allow(dead_code)]

use std::sync::{Arc, Once};
use parking_lot::Mutex;
use os_sched::prelude::*;

static INIT: Once = Once::new();

/// Initialize test logging once per test binary
pub fn init_test_env() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// One `context_switch` call as seen by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Switch {
    pub cpu: CpuId,
    pub pid: Option<Pid>,
    pub time_slice: Option<u32>,
}

/// Dispatcher that only records what the scheduler asked for
#[derive(Default)]
pub struct RecordingDispatcher {
    switches: Mutex<Vec<Switch>>,
    interrupts: Mutex<Vec<CpuId>>,
}

impl RecordingDispatcher {
    pub fn switches(&self) -> Vec<Switch> {
        self.switches.lock().clone()
    }

    /// Pids dispatched so far, idle dispatches skipped
    pub fn dispatched_pids(&self) -> Vec<usize> {
        self.switches
            .lock()
            .iter()
            .filter_map(|s| s.pid.map(|p| p.as_usize()))
            .collect()
    }

    pub fn interrupts(&self) -> Vec<CpuId> {
        self.interrupts.lock().clone()
    }
}

impl Dispatcher for RecordingDispatcher {
    fn context_switch(&self, cpu: CpuId, process: Option<ProcessRef>, time_slice: Option<u32>) {
        self.switches.lock().push(Switch {
            cpu,
            pid: process.map(|p| p.pid()),
            time_slice,
        });
    }

    fn force_preempt(&self, cpu: CpuId) {
        self.interrupts.lock().push(cpu);
    }
}

/// Build a scheduler wired to a fresh recording dispatcher
pub fn scheduler(cpus: usize, policy: Policy) -> (Arc<Scheduler>, Arc<RecordingDispatcher>) {
    init_test_env();
    let recorder = Arc::new(RecordingDispatcher::default());
    let scheduler = Scheduler::new(SchedulerConfig::new(cpus, policy), recorder.clone())
        .expect("valid test configuration");
    (scheduler, recorder)
}

pub fn process(pid: usize, priority: u32) -> ProcessRef {
    Process::new(Pid(pid), format!("p{}", pid), priority)
}

/// Put one process of each priority on CPUs 0, 1, 2, ... in order
pub fn occupy_cpus(scheduler: &Scheduler, priorities: &[u32]) -> Vec<ProcessRef> {
    priorities
        .iter()
        .enumerate()
        .map(|(i, &priority)| {
            let p = process(100 + i, priority);
            scheduler.wake_up(Arc::clone(&p));
            scheduler.idle(CpuId(i));
            assert_eq!(scheduler.running(CpuId(i)).map(|r| r.pid()), Some(p.pid()));
            p
        })
        .collect()
}

/// Pid currently bound to `cpu`
pub fn running_pid(scheduler: &Scheduler, cpu: usize) -> Option<usize> {
    scheduler.running(CpuId(cpu)).map(|p| p.pid().as_usize())
}
