//! Simulated CPUs and clock
//!
//! [`Machine`] is the [`Dispatcher`] the scheduler talks to in a simulation.
//! It records what each CPU should run and latches forced interrupts; the
//! driver threads poll it between ticks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use parking_lot::Mutex;
use crate::process::{Pid, ProcessRef};
use crate::scheduler::{CpuId, Dispatcher};
use super::workload::{Burst, Job};

/// Wall-clock backed tick counter
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
    tick: Duration,
}

impl Clock {
    /// Start a clock ticking every `tick`
    pub fn start(tick: Duration) -> Self {
        Self {
            start: Instant::now(),
            tick,
        }
    }

    /// Ticks elapsed since start
    pub fn now(&self) -> u64 {
        (self.start.elapsed().as_nanos() / self.tick.as_nanos().max(1)) as u64
    }

    /// Duration of one tick
    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Wall-clock instant of tick `at`
    pub fn instant_of(&self, at: u64) -> Instant {
        let at = u32::try_from(at).unwrap_or(u32::MAX);
        self.start + self.tick * at
    }
}

#[derive(Default)]
struct CpuContext {
    process: Option<ProcessRef>,
    time_slice: Option<u32>,
    ran: u32,
}

struct CpuState {
    context: Mutex<CpuContext>,
    interrupt: AtomicBool,
}

/// Outcome of running a process for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Still inside its CPU burst
    Running {
        /// Whether the time slice has been used up
        slice_expired: bool,
    },
    /// CPU burst finished; the process now issues I/O for this many ticks
    Io(u32),
    /// Final CPU burst finished
    Done,
}

pub(crate) struct Progress {
    bursts: Vec<Burst>,
    index: usize,
    remaining: u32,
    arrival: u64,
    finish: Option<u64>,
}

impl Progress {
    pub(crate) fn new(job: &Job) -> Self {
        let remaining = match job.bursts.first() {
            Some(Burst::Cpu(ticks)) => *ticks,
            _ => 0,
        };
        Self {
            bursts: job.bursts.clone(),
            index: 0,
            remaining,
            arrival: job.arrival,
            finish: None,
        }
    }
}

/// The simulated machine: per-CPU contexts plus job progress
pub struct Machine {
    clock: Clock,
    cpus: Vec<CpuState>,
    progress: Mutex<HashMap<Pid, Progress>>,
    unfinished: AtomicUsize,
}

impl Machine {
    pub(crate) fn new(cpu_count: usize, clock: Clock, progress: HashMap<Pid, Progress>) -> Self {
        let cpus = (0..cpu_count)
            .map(|_| CpuState {
                context: Mutex::new(CpuContext::default()),
                interrupt: AtomicBool::new(false),
            })
            .collect();
        Self {
            clock,
            cpus,
            unfinished: AtomicUsize::new(progress.len()),
            progress: Mutex::new(progress),
        }
    }

    /// The simulation clock
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Process the scheduler last dispatched on `cpu`
    pub fn current(&self, cpu: CpuId) -> Option<ProcessRef> {
        self.cpus[cpu.0].context.lock().process.clone()
    }

    /// Consume a latched forced interrupt on `cpu`
    pub fn take_interrupt(&self, cpu: CpuId) -> bool {
        self.cpus[cpu.0].interrupt.swap(false, Ordering::AcqRel)
    }

    /// Account one tick of CPU time to the process on `cpu`
    pub fn run_tick(&self, cpu: CpuId, pid: Pid) -> Step {
        let (ran, time_slice) = {
            let mut context = self.cpus[cpu.0].context.lock();
            context.ran += 1;
            (context.ran, context.time_slice)
        };

        let mut progress = self.progress.lock();
        let Some(job) = progress.get_mut(&pid) else {
            return Step::Done;
        };

        job.remaining = job.remaining.saturating_sub(1);
        if job.remaining > 0 {
            return Step::Running {
                slice_expired: time_slice.is_some_and(|slice| ran >= slice),
            };
        }

        match (job.bursts.get(job.index + 1), job.bursts.get(job.index + 2)) {
            (Some(Burst::Io(io)), Some(Burst::Cpu(cpu_ticks))) => {
                job.index += 2;
                job.remaining = *cpu_ticks;
                Step::Io(*io)
            }
            _ => Step::Done,
        }
    }

    /// Record completion of `pid`; returns the number of jobs still running
    pub fn finish(&self, pid: Pid) -> usize {
        if let Some(job) = self.progress.lock().get_mut(&pid) {
            job.finish = Some(self.clock.now());
        }
        self.unfinished.fetch_sub(1, Ordering::AcqRel) - 1
    }

    /// `(arrival, finish)` tick of every job
    pub(crate) fn timings(&self) -> HashMap<Pid, (u64, Option<u64>)> {
        self.progress
            .lock()
            .iter()
            .map(|(pid, job)| (*pid, (job.arrival, job.finish)))
            .collect()
    }
}

impl Dispatcher for Machine {
    fn context_switch(&self, cpu: CpuId, process: Option<ProcessRef>, time_slice: Option<u32>) {
        let mut context = self.cpus[cpu.0].context.lock();
        context.process = process;
        context.time_slice = time_slice;
        context.ran = 0;
    }

    fn force_preempt(&self, cpu: CpuId) {
        log::debug!("{}: forced interrupt raised", cpu);
        self.cpus[cpu.0].interrupt.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;
    use std::sync::Arc;

    fn machine(job: Job) -> Machine {
        let mut progress = HashMap::new();
        progress.insert(Pid(0), Progress::new(&job));
        Machine::new(1, Clock::start(Duration::from_millis(1)), progress)
    }

    #[test]
    fn test_bursts_advance() {
        let m = machine(Job::new("j", 0, 0, vec![Burst::Cpu(2), Burst::Io(4), Burst::Cpu(1)]));
        let p = Process::new(Pid(0), "j", 0);
        m.context_switch(CpuId(0), Some(p), None);

        assert_eq!(m.run_tick(CpuId(0), Pid(0)), Step::Running { slice_expired: false });
        assert_eq!(m.run_tick(CpuId(0), Pid(0)), Step::Io(4));
        assert_eq!(m.run_tick(CpuId(0), Pid(0)), Step::Done);
        assert_eq!(m.finish(Pid(0)), 0);
    }

    #[test]
    fn test_slice_expiry() {
        let m = machine(Job::new("j", 0, 0, vec![Burst::Cpu(10)]));
        let p = Process::new(Pid(0), "j", 0);
        m.context_switch(CpuId(0), Some(Arc::clone(&p)), Some(2));

        assert_eq!(m.run_tick(CpuId(0), Pid(0)), Step::Running { slice_expired: false });
        assert_eq!(m.run_tick(CpuId(0), Pid(0)), Step::Running { slice_expired: true });

        // A new dispatch restarts the slice.
        m.context_switch(CpuId(0), Some(p), Some(2));
        assert_eq!(m.run_tick(CpuId(0), Pid(0)), Step::Running { slice_expired: false });
    }

    #[test]
    fn test_interrupt_latch() {
        let m = machine(Job::new("j", 0, 0, vec![Burst::Cpu(1)]));
        assert!(!m.take_interrupt(CpuId(0)));
        m.force_preempt(CpuId(0));
        assert!(m.take_interrupt(CpuId(0)));
        assert!(!m.take_interrupt(CpuId(0)));
    }

    #[test]
    fn test_clock_counts_ticks() {
        let clock = Clock::start(Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(12));
        assert!(clock.now() >= 2);
        assert!(clock.instant_of(3) > clock.instant_of(1));
    }
}
