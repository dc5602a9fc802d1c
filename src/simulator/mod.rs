//! Thread-per-CPU simulation harness
//!
//! Drives a [`Scheduler`] the way an operating system simulator would: one
//! driver thread per CPU executes ticks of whatever the scheduler dispatched,
//! an I/O device thread completes I/O requests in order, and an arrival
//! thread introduces jobs at their arrival tick. The run ends once every job
//! has terminated.

pub mod machine;
pub mod report;
pub mod workload;

pub use machine::{Clock, Machine, Step};
pub use report::{ProcessReport, SimulationReport};
pub use workload::{Burst, Job, Workload};

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use crossbeam::channel::{unbounded, Receiver, Sender};
use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::process::{Pid, Process, ProcessRef};
use crate::scheduler::{CpuId, Scheduler};
use machine::Progress;

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Scheduler under test
    pub scheduler: SchedulerConfig,
    /// Wall-clock length of one tick
    pub tick: Duration,
    /// Thread name prefix for CPU drivers
    pub thread_name_prefix: String,
}

impl SimulatorConfig {
    /// Default simulator settings around `scheduler`
    pub fn new(scheduler: SchedulerConfig) -> Self {
        Self {
            scheduler,
            ..Default::default()
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            tick: Duration::from_millis(1),
            thread_name_prefix: "sim-cpu".to_string(),
        }
    }
}

struct IoRequest {
    process: ProcessRef,
    ticks: u32,
}

/// Shuts the scheduler down if a simulator thread unwinds, so the other
/// threads stop waiting for work that will never come
struct ShutdownOnPanic<'a>(&'a Scheduler);

impl Drop for ShutdownOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.shutdown();
        }
    }
}

/// Runs workloads against a fresh scheduler instance
pub struct Simulator {
    config: SimulatorConfig,
}

impl Simulator {
    /// Create a simulator
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Simulate `workload` to completion
    pub fn run(&self, workload: Workload) -> Result<SimulationReport> {
        let cpu_count = self.config.scheduler.cpu_count;
        let processes: Vec<ProcessRef> = workload
            .jobs()
            .iter()
            .enumerate()
            .map(|(i, job)| Process::new(Pid(i), job.name.clone(), job.priority))
            .collect();
        let progress: HashMap<Pid, Progress> = workload
            .jobs()
            .iter()
            .enumerate()
            .map(|(i, job)| (Pid(i), Progress::new(job)))
            .collect();

        let clock = Clock::start(self.config.tick);
        let machine = Arc::new(Machine::new(cpu_count, clock, progress));
        let scheduler = Scheduler::new(self.config.scheduler.clone(), machine.clone())?;

        log::info!(
            "Simulating {} jobs on {} CPUs with {}",
            workload.len(),
            cpu_count,
            scheduler.policy()
        );

        if workload.is_empty() {
            scheduler.shutdown();
            return Ok(self.report(&workload, &scheduler, &machine));
        }

        let (io_tx, io_rx) = unbounded::<IoRequest>();
        let mut handles: Vec<(String, JoinHandle<()>)> = Vec::new();

        let spawned = self.spawn_threads(&scheduler, &machine, &workload, &processes, io_tx, io_rx, &mut handles);
        if spawned.is_err() {
            scheduler.shutdown();
        }

        let mut failure = spawned.err();
        for (name, handle) in handles {
            if handle.join().is_err() {
                log::error!("Simulator thread {} panicked", name);
                failure.get_or_insert(Error::Runtime {
                    reason: format!("thread {} panicked", name),
                });
            }
        }
        if let Some(err) = failure {
            return Err(err);
        }

        let report = self.report(&workload, &scheduler, &machine);
        log::info!(
            "Simulation finished after {} ticks, {} context switches",
            report.elapsed_ticks,
            report.stats.context_switches
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_threads(
        &self,
        scheduler: &Arc<Scheduler>,
        machine: &Arc<Machine>,
        workload: &Workload,
        processes: &[ProcessRef],
        io_tx: Sender<IoRequest>,
        io_rx: Receiver<IoRequest>,
        handles: &mut Vec<(String, JoinHandle<()>)>,
    ) -> Result<()> {
        let device = {
            let scheduler = Arc::clone(scheduler);
            let tick = machine.clock().tick();
            move || io_device_loop(&scheduler, io_rx, tick)
        };
        handles.push(spawn("sim-io".to_string(), device)?);

        let mut arrivals: Vec<(u64, ProcessRef)> = workload
            .jobs()
            .iter()
            .zip(processes)
            .map(|(job, process)| (job.arrival, Arc::clone(process)))
            .collect();
        arrivals.sort_by_key(|(arrival, _)| *arrival);
        let feeder = {
            let scheduler = Arc::clone(scheduler);
            let clock = *machine.clock();
            move || arrival_loop(&scheduler, &clock, arrivals)
        };
        handles.push(spawn("sim-arrivals".to_string(), feeder)?);

        for i in 0..scheduler.num_cpus() {
            let cpu = CpuId(i);
            let scheduler = Arc::clone(scheduler);
            let machine = Arc::clone(machine);
            let io_tx = io_tx.clone();
            let name = format!("{}-{}", self.config.thread_name_prefix, i);
            handles.push(spawn(name, move || drive_cpu(cpu, &scheduler, &machine, &io_tx))?);
        }

        Ok(())
    }

    fn report(&self, workload: &Workload, scheduler: &Scheduler, machine: &Machine) -> SimulationReport {
        let timings = machine.timings();
        let processes = workload
            .jobs()
            .iter()
            .enumerate()
            .map(|(i, job)| {
                let (arrival, finish) = timings.get(&Pid(i)).copied().unwrap_or((job.arrival, None));
                let finish = finish.unwrap_or(arrival);
                let turnaround = finish.saturating_sub(arrival);
                ProcessReport {
                    pid: Pid(i),
                    name: job.name.clone(),
                    priority: job.priority,
                    arrival,
                    finish,
                    turnaround,
                    waiting: turnaround.saturating_sub(job.cpu_ticks() + job.io_ticks()),
                }
            })
            .collect();

        SimulationReport {
            policy: scheduler.policy(),
            cpu_count: scheduler.num_cpus(),
            elapsed_ticks: machine.clock().now(),
            stats: scheduler.stats(),
            processes,
        }
    }
}

fn spawn<F>(name: String, body: F) -> Result<(String, JoinHandle<()>)>
where
    F: FnOnce() + Send + 'static,
{
    let handle = thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .map_err(|e| Error::Runtime {
            reason: format!("Failed to spawn thread {}: {}", name, e),
        })?;
    Ok((name, handle))
}

/// Main loop of one CPU driver
fn drive_cpu(cpu: CpuId, scheduler: &Scheduler, machine: &Machine, io: &Sender<IoRequest>) {
    let _guard = ShutdownOnPanic(scheduler);
    let tick = machine.clock().tick();

    while !scheduler.is_shutting_down() {
        let Some(process) = machine.current(cpu) else {
            if machine.take_interrupt(cpu) {
                scheduler.preempt(cpu);
            } else {
                scheduler.idle(cpu);
            }
            continue;
        };

        if machine.take_interrupt(cpu) {
            scheduler.preempt(cpu);
            continue;
        }

        thread::sleep(tick);

        match machine.run_tick(cpu, process.pid()) {
            Step::Running { slice_expired: false } => {}
            Step::Running { slice_expired: true } => scheduler.preempt(cpu),
            Step::Io(ticks) => {
                scheduler.yield_cpu(cpu);
                if io.send(IoRequest { process, ticks }).is_err() {
                    log::warn!("{}: I/O device gone, request dropped", cpu);
                }
            }
            Step::Done => {
                scheduler.terminate(cpu);
                if machine.finish(process.pid()) == 0 {
                    scheduler.shutdown();
                }
            }
        }
    }

    log::debug!("{}: driver stopped", cpu);
}

/// Serves I/O requests one at a time, in arrival order
fn io_device_loop(scheduler: &Scheduler, requests: Receiver<IoRequest>, tick: Duration) {
    let _guard = ShutdownOnPanic(scheduler);
    for request in requests {
        thread::sleep(tick * request.ticks);
        log::trace!("I/O complete for pid {}", request.process.pid());
        scheduler.wake_up(request.process);
    }
}

/// Wakes each process at its arrival tick
fn arrival_loop(scheduler: &Scheduler, clock: &Clock, arrivals: Vec<(u64, ProcessRef)>) {
    let _guard = ShutdownOnPanic(scheduler);
    for (arrival, process) in arrivals {
        if scheduler.is_shutting_down() {
            break;
        }
        let due = clock.instant_of(arrival);
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
        log::debug!("pid {} ({}) arrives at tick {}", process.pid(), process.name(), arrival);
        scheduler.wake_up(process);
    }
}
