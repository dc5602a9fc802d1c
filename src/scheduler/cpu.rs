//! CPU assignment table
//!
//! Authoritative record of which process runs on which CPU. The static
//! priority policy scans it to choose preemption victims.

use std::fmt;
use std::sync::Arc;
use parking_lot::Mutex;
use crate::process::ProcessRef;

/// Identifier of a virtual CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuId(pub usize);

impl CpuId {
    /// Get the numeric ID
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu{}", self.0)
    }
}

#[derive(Debug, Default)]
struct CpuSlot {
    process: Option<ProcessRef>,
    /// Victim of a forced preemption whose interrupt has not been delivered
    claimed: Option<ProcessRef>,
}

/// Fixed-size table of CPU slots
pub struct CpuTable {
    slots: Mutex<Vec<CpuSlot>>,
}

impl CpuTable {
    /// Create a table with `count` idle CPUs
    pub fn new(count: usize) -> Self {
        let slots = (0..count).map(|_| CpuSlot::default()).collect();
        Self {
            slots: Mutex::new(slots),
        }
    }

    /// Number of CPUs
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Check if the table has no CPUs
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Bind `process` (or idle) to `cpu`, returning the previous occupant.
    ///
    /// An outstanding claim survives the rebind; it is settled when the
    /// interrupt arrives.
    pub fn bind(&self, cpu: CpuId, process: Option<ProcessRef>) -> Option<ProcessRef> {
        std::mem::replace(&mut self.slots.lock()[cpu.0].process, process)
    }

    /// Vacate `cpu`, returning the process that was bound to it
    pub fn take(&self, cpu: CpuId) -> Option<ProcessRef> {
        self.slots.lock()[cpu.0].process.take()
    }

    /// Process currently bound to `cpu`
    pub fn current(&self, cpu: CpuId) -> Option<ProcessRef> {
        self.slots.lock()[cpu.0].process.clone()
    }

    /// CPU that `process` is bound to, if any
    pub fn cpu_of(&self, process: &ProcessRef) -> Option<CpuId> {
        self.slots
            .lock()
            .iter()
            .position(|slot| slot.process.as_ref().is_some_and(|p| Arc::ptr_eq(p, process)))
            .map(CpuId)
    }

    /// Whether a forced preemption is outstanding on `cpu`
    pub fn is_preempt_pending(&self, cpu: CpuId) -> bool {
        self.slots.lock()[cpu.0].claimed.is_some()
    }

    /// Clear the outstanding claim on `cpu`, returning the process it
    /// was raised against
    pub fn settle_claim(&self, cpu: CpuId) -> Option<ProcessRef> {
        self.slots.lock()[cpu.0].claimed.take()
    }

    /// Choose a CPU to preempt for a waking process of `priority`.
    ///
    /// Returns `None` when any CPU is idle or no eligible running process has
    /// a strictly lower priority. Among equal minimum priorities the lowest
    /// CPU index wins. The claim is recorded before the lock is released, so
    /// concurrent callers never claim the same CPU.
    pub fn claim_victim(&self, priority: u32) -> Option<(CpuId, ProcessRef)> {
        let mut slots = self.slots.lock();
        let mut victim: Option<(usize, u32)> = None;
        for (index, slot) in slots.iter().enumerate() {
            let Some(process) = slot.process.as_ref() else {
                return None;
            };
            if slot.claimed.is_some() {
                continue;
            }
            let running = process.static_priority();
            if victim.map_or(true, |(_, lowest)| running < lowest) {
                victim = Some((index, running));
            }
        }

        let (index, lowest) = victim?;
        if lowest >= priority {
            return None;
        }

        let slot = &mut slots[index];
        let process = slot.process.clone()?;
        slot.claimed = Some(Arc::clone(&process));
        Some((CpuId(index), process))
    }

    /// Snapshot of every slot as `(cpu, occupant)`
    pub fn snapshot(&self) -> Vec<(CpuId, Option<ProcessRef>)> {
        self.slots
            .lock()
            .iter()
            .enumerate()
            .map(|(i, slot)| (CpuId(i), slot.process.clone()))
            .collect()
    }
}
