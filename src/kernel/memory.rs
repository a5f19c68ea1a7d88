//! Residency management.
//!
//! Tracks which processes are resident in a capacity-bounded "physical" set
//! and which have been swapped to the unbounded "virtual" set. Eviction is
//! FIFO over admission order. Transfers advance a logical clock instead of
//! sleeping, so runs stay deterministic.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::types::{Error, MemoryConfig, ProcessId, Result};

/// Monotonic logical clock, in ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogicalClock {
    ticks: u64,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self { ticks: 0 }
    }

    pub fn now(&self) -> u64 {
        self.ticks
    }

    /// Advance by `ticks` and return the new time.
    pub fn advance(&mut self, ticks: u64) -> u64 {
        self.ticks = self.ticks.saturating_add(ticks);
        self.ticks
    }
}

/// Where an admitted process currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Residency {
    Physical,
    Virtual,
}

/// Result of an admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Admission {
    /// Admitted without displacing anyone (or already admitted).
    Resident,
    /// Admitted after `evicted` was moved to virtual memory.
    Swapped { evicted: ProcessId },
}

/// Bookkeeping for one admitted process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frame {
    /// Logical time of the last transfer into this set.
    since: u64,
}

/// Memory statistics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub resident: usize,
    pub swapped: usize,
    pub capacity: usize,
    pub evictions: u64,
    pub clock: u64,
}

/// Memory manager - bounded physical residency with FIFO eviction.
///
/// NOT a separate actor - owned by Kernel and called via &mut self.
#[derive(Debug)]
pub struct MemoryManager {
    max_physical: usize,
    transfer_delay_ticks: u64,
    physical: HashMap<ProcessId, Frame>,
    virtual_set: HashMap<ProcessId, Frame>,
    /// Admission order of `physical`; the front is evicted first.
    residency_order: VecDeque<ProcessId>,
    clock: LogicalClock,
    evictions: u64,
}

impl MemoryManager {
    pub fn new(max_physical: usize) -> Result<Self> {
        Self::with_config(&MemoryConfig {
            max_physical,
            ..MemoryConfig::default()
        })
    }

    /// Fails on a zero capacity; the resident set must hold the process
    /// being admitted.
    pub fn with_config(config: &MemoryConfig) -> Result<Self> {
        if config.max_physical == 0 {
            return Err(Error::config("max_physical must be positive"));
        }
        Ok(Self::build(config))
    }

    fn build(config: &MemoryConfig) -> Self {
        Self {
            max_physical: config.max_physical,
            transfer_delay_ticks: config.transfer_delay_ticks,
            physical: HashMap::new(),
            virtual_set: HashMap::new(),
            residency_order: VecDeque::new(),
            clock: LogicalClock::new(),
            evictions: 0,
        }
    }

    /// Admit a process into physical memory, evicting the oldest resident
    /// to virtual memory when full. Always succeeds.
    pub fn admit(&mut self, pid: ProcessId) -> Admission {
        if let Some(residency) = self.residency(pid) {
            tracing::debug!(pid = %pid, ?residency, "admit_ignored_already_admitted");
            return Admission::Resident;
        }

        let mut admission = Admission::Resident;
        if self.physical.len() >= self.max_physical {
            if let Some(evicted) = self.evict() {
                admission = Admission::Swapped { evicted };
            }
        }

        self.physical.insert(
            pid,
            Frame {
                since: self.clock.now(),
            },
        );
        self.residency_order.push_back(pid);
        tracing::info!(
            pid = %pid,
            resident = self.physical.len(),
            capacity = self.max_physical,
            "process_admitted"
        );
        admission
    }

    /// Move the oldest resident to virtual memory, charging the transfer.
    fn evict(&mut self) -> Option<ProcessId> {
        let victim = self.residency_order.pop_front()?;
        self.physical.remove(&victim);

        let now = self.clock.advance(self.transfer_delay_ticks);
        self.virtual_set.insert(victim, Frame { since: now });
        self.evictions += 1;

        tracing::info!(
            pid = %victim,
            delay_ticks = self.transfer_delay_ticks,
            clock = now,
            "process_swapped_out"
        );
        Some(victim)
    }

    /// Where `pid` lives, if admitted.
    pub fn residency(&self, pid: ProcessId) -> Option<Residency> {
        if self.physical.contains_key(&pid) {
            Some(Residency::Physical)
        } else if self.virtual_set.contains_key(&pid) {
            Some(Residency::Virtual)
        } else {
            None
        }
    }

    /// Logical time at which `pid` entered its current set.
    pub fn resident_since(&self, pid: ProcessId) -> Option<u64> {
        self.physical
            .get(&pid)
            .or_else(|| self.virtual_set.get(&pid))
            .map(|frame| frame.since)
    }

    /// Resident ids, oldest first.
    pub fn residency_order(&self) -> Vec<ProcessId> {
        self.residency_order.iter().copied().collect()
    }

    /// Resident ids in ascending order.
    pub fn physical_ids(&self) -> Vec<ProcessId> {
        let mut ids: Vec<_> = self.physical.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Swapped-out ids in ascending order.
    pub fn virtual_ids(&self) -> Vec<ProcessId> {
        let mut ids: Vec<_> = self.virtual_set.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn capacity(&self) -> usize {
        self.max_physical
    }

    pub fn clock(&self) -> LogicalClock {
        self.clock
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            resident: self.physical.len(),
            swapped: self.virtual_set.len(),
            capacity: self.max_physical,
            evictions: self.evictions,
            clock: self.clock.now(),
        }
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::build(&MemoryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn pid(raw: u64) -> ProcessId {
        ProcessId::new(raw)
    }

    #[test]
    fn test_admit_under_capacity() {
        let mut mm = MemoryManager::new(2).unwrap();
        assert_eq!(mm.admit(pid(1)), Admission::Resident);
        assert_eq!(mm.admit(pid(2)), Admission::Resident);

        assert_eq!(mm.physical_ids(), vec![pid(1), pid(2)]);
        assert!(mm.virtual_ids().is_empty());
        assert_eq!(mm.clock().now(), 0);
    }

    #[test]
    fn test_fifo_eviction_scenario() {
        let mut mm = MemoryManager::new(2).unwrap();
        mm.admit(pid(1));
        mm.admit(pid(2));
        let admission = mm.admit(pid(3));

        assert_eq!(admission, Admission::Swapped { evicted: pid(1) });
        assert_eq!(mm.physical_ids(), vec![pid(2), pid(3)]);
        assert_eq!(mm.virtual_ids(), vec![pid(1)]);
        assert_eq!(mm.residency_order(), vec![pid(2), pid(3)]);
        assert_eq!(mm.residency(pid(1)), Some(Residency::Virtual));
    }

    #[test]
    fn test_transfer_delay_is_logical() {
        let mut mm = MemoryManager::with_config(&MemoryConfig {
            max_physical: 1,
            transfer_delay_ticks: 5,
        })
        .unwrap();
        mm.admit(pid(1));
        mm.admit(pid(2));
        mm.admit(pid(3));

        let stats = mm.stats();
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.clock, 10);
        assert_eq!(mm.resident_since(pid(3)), Some(10));
        assert_eq!(mm.resident_since(pid(1)), Some(5));
    }

    #[test]
    fn test_readmit_is_noop() {
        let mut mm = MemoryManager::new(1).unwrap();
        mm.admit(pid(1));
        mm.admit(pid(2));

        assert_eq!(mm.admit(pid(1)), Admission::Resident);
        assert_eq!(mm.admit(pid(2)), Admission::Resident);
        assert_eq!(mm.residency(pid(1)), Some(Residency::Virtual));
        assert_eq!(mm.residency_order(), vec![pid(2)]);
        assert_eq!(mm.stats().evictions, 1);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(MemoryManager::new(0), Err(Error::Config(_))));
        assert_eq!(MemoryManager::new(1).unwrap().capacity(), 1);
    }

    #[test]
    fn test_unknown_pid_has_no_residency() {
        let mm = MemoryManager::default();
        assert_eq!(mm.residency(pid(9)), None);
        assert_eq!(mm.resident_since(pid(9)), None);
    }

    #[test]
    #[traced_test]
    fn test_eviction_is_logged() {
        let mut mm = MemoryManager::new(1).unwrap();
        mm.admit(pid(1));
        mm.admit(pid(2));
        assert!(logs_contain("process_swapped_out"));
    }
}
