//! Startup configuration
//!
//! [`SchedulerConfig`] is fixed once a scheduler is built. [`CommandLine`]
//! parses the binary's arguments into it.

use crate::error::{Error, Result};
use crate::scheduler::{Level, Policy};

/// Usage text printed for malformed command lines
pub const USAGE: &str = "\
Usage: os-sched <# CPUs> [ -r <time slice> | -p | -m <time slice> ] [ -n <jobs> ] [ -s <seed> ]
    Default : FIFO Scheduler
         -r : Round-Robin Scheduler (must also give time slice)
         -p : Static Priority Scheduler
         -m : Multi-Level Feedback Scheduler (must also give time slice)
         -n : Number of simulated jobs (default 8)
         -s : Workload seed (default 42)
";

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Number of virtual CPUs
    pub cpu_count: usize,
    /// Active scheduling policy
    pub policy: Policy,
    /// Feedback level a process re-enters after I/O (MLFQ only)
    pub mlfq_io_level: Level,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cpu_count: num_cpus::get(),
            policy: Policy::Fifo,
            mlfq_io_level: Level::Three,
        }
    }
}

impl SchedulerConfig {
    /// Configuration with `cpu_count` CPUs and `policy`, other fields default
    pub fn new(cpu_count: usize, policy: Policy) -> Self {
        Self {
            cpu_count,
            policy,
            ..Default::default()
        }
    }

    /// Reject configurations the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cpu_count == 0 {
            return Err(Error::InvalidCpuCount { count: 0 });
        }
        if self.policy.time_slice() == Some(0) {
            return Err(Error::InvalidTimeSlice { value: "0".to_string() });
        }
        Ok(())
    }
}

/// Parsed command line of the `os-sched` binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Scheduler settings
    pub scheduler: SchedulerConfig,
    /// Number of jobs in the generated workload
    pub jobs: usize,
    /// Seed for the generated workload
    pub seed: u64,
}

impl CommandLine {
    /// Default workload size
    pub const DEFAULT_JOBS: usize = 8;
    /// Default workload seed
    pub const DEFAULT_SEED: u64 = 42;

    /// Parse arguments, excluding the program name
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        let mut iter = args.iter();

        let cpus = iter.next().ok_or_else(|| usage("missing CPU count"))?;
        let cpu_count: usize = cpus
            .parse()
            .map_err(|_| usage(format!("invalid CPU count '{}'", cpus)))?;
        if cpu_count == 0 {
            return Err(Error::InvalidCpuCount { count: 0 });
        }

        let mut policy = None;
        let mut jobs = Self::DEFAULT_JOBS;
        let mut seed = Self::DEFAULT_SEED;

        while let Some(flag) = iter.next() {
            match flag.as_str() {
                "-r" | "-p" | "-m" if policy.is_some() => {
                    return Err(usage("only one scheduling policy may be given"));
                }
                "-r" => {
                    let time_slice = parse_time_slice(iter.next(), "round-robin")?;
                    policy = Some(Policy::RoundRobin { time_slice });
                }
                "-m" => {
                    let time_slice = parse_time_slice(iter.next(), "mlfq")?;
                    policy = Some(Policy::Mlfq { time_slice });
                }
                "-p" => policy = Some(Policy::StaticPriority),
                "-n" => {
                    let value = iter.next().ok_or_else(|| usage("-n needs a job count"))?;
                    jobs = value
                        .parse()
                        .map_err(|_| usage(format!("invalid job count '{}'", value)))?;
                }
                "-s" => {
                    let value = iter.next().ok_or_else(|| usage("-s needs a seed"))?;
                    seed = value
                        .parse()
                        .map_err(|_| usage(format!("invalid seed '{}'", value)))?;
                }
                other => return Err(usage(format!("unrecognized argument '{}'", other))),
            }
        }

        let scheduler = SchedulerConfig::new(cpu_count, policy.unwrap_or_default());
        scheduler.validate()?;

        Ok(Self { scheduler, jobs, seed })
    }
}

fn usage(reason: impl Into<String>) -> Error {
    Error::Usage { reason: reason.into() }
}

fn parse_time_slice(value: Option<&String>, policy: &str) -> Result<u32> {
    let value = value.ok_or_else(|| Error::MissingTimeSlice { policy: policy.to_string() })?;
    match value.parse::<u32>() {
        Ok(slice) if slice > 0 => Ok(slice),
        _ => Err(Error::InvalidTimeSlice { value: value.clone() }),
    }
}
