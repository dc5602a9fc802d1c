//! Simulation results

use std::fmt;
use crate::process::Pid;
use crate::scheduler::{Policy, SchedulerStats};

/// Per-process outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    /// Process ID
    pub pid: Pid,
    /// Job name
    pub name: String,
    /// Static priority
    pub priority: u32,
    /// Arrival tick
    pub arrival: u64,
    /// Tick at which the process terminated
    pub finish: u64,
    /// `finish - arrival`
    pub turnaround: u64,
    /// Turnaround minus CPU and I/O demand: time spent waiting for a CPU
    pub waiting: u64,
}

/// Result of a full simulation run
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Policy the run used
    pub policy: Policy,
    /// Number of CPUs
    pub cpu_count: usize,
    /// Ticks from start until the last job terminated
    pub elapsed_ticks: u64,
    /// Scheduler counters at the end of the run
    pub stats: SchedulerStats,
    /// One entry per job, in pid order
    pub processes: Vec<ProcessReport>,
}

impl SimulationReport {
    /// Average turnaround in ticks
    pub fn mean_turnaround(&self) -> f64 {
        mean(self.processes.iter().map(|p| p.turnaround))
    }

    /// Average time spent in ready queues, in ticks
    pub fn mean_waiting(&self) -> f64 {
        mean(self.processes.iter().map(|p| p.waiting))
    }
}

fn mean(values: impl ExactSizeIterator<Item = u64>) -> f64 {
    let count = values.len();
    if count == 0 {
        return 0.0;
    }
    values.sum::<u64>() as f64 / count as f64
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "policy: {}, cpus: {}", self.policy, self.cpu_count)?;
        writeln!(f, "{:>4}  {:<10} {:>4} {:>8} {:>8} {:>10} {:>8}",
            "pid", "name", "prio", "arrival", "finish", "turnaround", "waiting")?;
        for p in &self.processes {
            writeln!(f, "{:>4}  {:<10} {:>4} {:>8} {:>8} {:>10} {:>8}",
                p.pid, p.name, p.priority, p.arrival, p.finish, p.turnaround, p.waiting)?;
        }
        writeln!(f)?;
        writeln!(f, "elapsed ticks:       {}", self.elapsed_ticks)?;
        writeln!(f, "context switches:    {}", self.stats.context_switches)?;
        writeln!(f, "preemptions:         {}", self.stats.preemptions)?;
        writeln!(f, "forced preemptions:  {}", self.stats.forced_preemptions)?;
        writeln!(f, "absorbed interrupts: {}", self.stats.absorbed_preemptions)?;
        writeln!(f, "mean turnaround:     {:.1}", self.mean_turnaround())?;
        write!(f, "mean waiting:        {:.1}", self.mean_waiting())
    }
}
