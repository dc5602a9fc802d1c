//! Simulated jobs
//!
//! A job alternates CPU and I/O bursts, starting and ending on the CPU.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::error::{Error, Result};

/// One phase of a job, measured in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Burst {
    /// Needs a CPU for this many ticks
    Cpu(u32),
    /// Blocked on the I/O device for this many ticks
    Io(u32),
}

impl Burst {
    fn ticks(self) -> u32 {
        match self {
            Burst::Cpu(ticks) | Burst::Io(ticks) => ticks,
        }
    }
}

/// A job description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Display name
    pub name: String,
    /// Static priority; larger is more important
    pub priority: u32,
    /// Tick at which the job arrives
    pub arrival: u64,
    /// Alternating CPU and I/O bursts
    pub bursts: Vec<Burst>,
}

impl Job {
    /// Create a job description
    pub fn new(name: impl Into<String>, priority: u32, arrival: u64, bursts: Vec<Burst>) -> Self {
        Self {
            name: name.into(),
            priority,
            arrival,
            bursts,
        }
    }

    /// Total ticks of CPU demand
    pub fn cpu_ticks(&self) -> u64 {
        self.bursts
            .iter()
            .filter(|b| matches!(b, Burst::Cpu(_)))
            .map(|b| u64::from(b.ticks()))
            .sum()
    }

    /// Total ticks spent on I/O
    pub fn io_ticks(&self) -> u64 {
        self.bursts
            .iter()
            .filter(|b| matches!(b, Burst::Io(_)))
            .map(|b| u64::from(b.ticks()))
            .sum()
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidWorkload {
            reason: format!("job '{}': {}", self.name, reason),
        };

        if self.bursts.is_empty() {
            return Err(invalid("no bursts"));
        }
        for (i, burst) in self.bursts.iter().enumerate() {
            let expect_cpu = i % 2 == 0;
            match (burst, expect_cpu) {
                (Burst::Cpu(_), true) | (Burst::Io(_), false) => {}
                _ => return Err(invalid("bursts must alternate CPU and I/O, starting with CPU")),
            }
            if burst.ticks() == 0 {
                return Err(invalid("zero-length burst"));
            }
        }
        if !matches!(self.bursts.last(), Some(Burst::Cpu(_))) {
            return Err(invalid("last burst must be a CPU burst"));
        }
        Ok(())
    }
}

/// A validated set of jobs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workload {
    jobs: Vec<Job>,
}

impl Workload {
    /// Validate and wrap `jobs`
    pub fn new(jobs: Vec<Job>) -> Result<Self> {
        for job in &jobs {
            job.validate()?;
        }
        Ok(Self { jobs })
    }

    /// Deterministic pseudo-random workload of `count` jobs
    pub fn random(count: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let jobs = (0..count)
            .map(|i| {
                let cpu_bursts = rng.gen_range(1..=4);
                let mut bursts = Vec::with_capacity(cpu_bursts * 2 - 1);
                for n in 0..cpu_bursts {
                    if n > 0 {
                        bursts.push(Burst::Io(rng.gen_range(2..=10)));
                    }
                    bursts.push(Burst::Cpu(rng.gen_range(1..=8)));
                }
                Job::new(
                    format!("job-{}", i),
                    rng.gen_range(0..10),
                    rng.gen_range(0..20),
                    bursts,
                )
            })
            .collect();
        Self { jobs }
    }

    /// The jobs, in pid order
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Number of jobs
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Check if there are no jobs
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_totals() {
        let job = Job::new("a", 1, 0, vec![Burst::Cpu(3), Burst::Io(5), Burst::Cpu(2)]);
        assert_eq!(job.cpu_ticks(), 5);
        assert_eq!(job.io_ticks(), 5);
    }

    #[test]
    fn test_validation() {
        assert!(Workload::new(vec![Job::new("ok", 0, 0, vec![Burst::Cpu(1)])]).is_ok());

        let bad = [
            vec![],
            vec![Burst::Io(2)],
            vec![Burst::Cpu(2), Burst::Io(2)],
            vec![Burst::Cpu(2), Burst::Cpu(2)],
            vec![Burst::Cpu(0)],
        ];
        for bursts in bad {
            let result = Workload::new(vec![Job::new("bad", 0, 0, bursts)]);
            assert!(matches!(result, Err(Error::InvalidWorkload { .. })));
        }
    }

    #[test]
    fn test_random_workload_is_deterministic_and_valid() {
        let first = Workload::random(10, 7);
        let second = Workload::random(10, 7);
        assert_eq!(first, second);
        assert_eq!(first.len(), 10);
        for job in first.jobs() {
            assert!(job.validate().is_ok());
        }
        assert_ne!(first, Workload::random(10, 8));
    }
}
