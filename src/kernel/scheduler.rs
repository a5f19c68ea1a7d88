//! Multi-level ready queues.
//!
//! One queue per priority level (index 0 is served first), each bound to its
//! own selection algorithm:
//! - FIFO: the head of the queue.
//! - Round-robin: the head, run for at most one quantum through the
//!   executor, then requeued at the tail if it has not finished.
//! - SJF: the entry with the fewest remaining instructions, first in queue
//!   order on ties.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use super::process::ProcessManager;
use super::types::{Algorithm, ProcessRecord};
use super::vm::{Executor, Step};
use crate::types::{Error, ProcessId, Result, SchedulerConfig};

/// One priority tier.
#[derive(Debug, Clone)]
struct Level {
    algorithm: Algorithm,
    queue: VecDeque<ProcessId>,
}

/// Scheduler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub enqueued: u64,
    pub dispatched: u64,
    pub preempted: u64,
    pub completed: u64,
}

/// Multi-level queue scheduler.
///
/// NOT a separate actor - owned by Kernel and called via &mut self.
#[derive(Debug, Clone)]
pub struct Scheduler {
    levels: Vec<Level>,
    quantum: usize,
    /// Which level currently holds each queued pid.
    locations: HashMap<ProcessId, usize>,
    stats: SchedulerStats,
}

impl Scheduler {
    /// Create a scheduler with one level per algorithm.
    pub fn new(levels: Vec<Algorithm>, quantum: usize) -> Result<Self> {
        if levels.is_empty() {
            return Err(Error::config("scheduler needs at least one level"));
        }
        if quantum == 0 {
            return Err(Error::config("quantum must be positive"));
        }

        tracing::info!(?levels, quantum, "scheduler_initialized");
        Ok(Self {
            levels: levels
                .into_iter()
                .map(|algorithm| Level {
                    algorithm,
                    queue: VecDeque::new(),
                })
                .collect(),
            quantum,
            locations: HashMap::new(),
            stats: SchedulerStats::default(),
        })
    }

    pub fn with_config(config: &SchedulerConfig) -> Result<Self> {
        Self::new(config.levels.clone(), config.quantum)
    }

    /// Single-level scheduler.
    pub fn single(algorithm: Algorithm, quantum: usize) -> Result<Self> {
        Self::new(vec![algorithm], quantum)
    }

    /// Validate a priority without queueing anything.
    pub fn check_priority(&self, priority: usize) -> Result<()> {
        if priority >= self.levels.len() {
            return Err(Error::priority_range(priority, self.levels.len()));
        }
        Ok(())
    }

    /// Append `pid` to the queue of level `priority`.
    pub fn enqueue(&mut self, processes: &ProcessManager, pid: ProcessId, priority: usize) -> Result<()> {
        self.check_priority(priority)?;

        let record = processes
            .get(pid)
            .ok_or_else(|| Error::not_found(format!("unknown pid: {}", pid)))?;
        if record.is_terminated() {
            return Err(Error::state_transition(format!(
                "cannot enqueue pid {}: already terminated",
                pid
            )));
        }
        if let Some(level) = self.locations.get(&pid) {
            return Err(Error::state_transition(format!(
                "cannot enqueue pid {}: already queued at level {}",
                pid, level
            )));
        }

        self.levels[priority].queue.push_back(pid);
        self.locations.insert(pid, priority);
        self.stats.enqueued += 1;
        tracing::info!(
            pid = %pid,
            priority,
            algorithm = %self.levels[priority].algorithm,
            "process_enqueued"
        );
        Ok(())
    }

    /// Select and remove the next record, scanning levels in priority order.
    ///
    /// The selected record is marked RUNNING. Records already TERMINATED are
    /// returned untouched so the caller can skip them. Round-robin levels run
    /// the record for one quantum through `executor` before returning it:
    /// a record that still has work left is requeued and returned READY, one
    /// that finished is completed and returned TERMINATED.
    pub fn next(&mut self, processes: &mut ProcessManager, executor: &mut dyn Executor) -> Option<ProcessId> {
        loop {
            let index = self.levels.iter().position(|level| !level.queue.is_empty())?;
            let algorithm = self.levels[index].algorithm;
            let pid = self.select(index, processes)?;
            self.locations.remove(&pid);

            let Some(record) = processes.get_mut(pid) else {
                tracing::warn!(pid = %pid, "stale_queue_entry_dropped");
                continue;
            };
            if record.is_terminated() {
                return Some(pid);
            }

            record.start();
            self.stats.dispatched += 1;
            tracing::debug!(pid = %pid, level = index, %algorithm, "process_dispatched");

            if algorithm == Algorithm::RoundRobin {
                self.run_slice(index, record, executor);
            }
            return Some(pid);
        }
    }

    /// Remove the chosen entry from level `index`.
    fn select(&mut self, index: usize, processes: &ProcessManager) -> Option<ProcessId> {
        let level = &mut self.levels[index];
        match level.algorithm {
            Algorithm::Fifo | Algorithm::RoundRobin => level.queue.pop_front(),
            Algorithm::Sjf => {
                let position = level
                    .queue
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, pid)| {
                        processes
                            .get(**pid)
                            .map(ProcessRecord::remaining)
                            .unwrap_or(usize::MAX)
                    })
                    .map(|(position, _)| position)?;
                level.queue.remove(position)
            }
        }
    }

    /// Run one round-robin quantum and requeue or complete the record.
    fn run_slice(&mut self, index: usize, record: &mut ProcessRecord, executor: &mut dyn Executor) {
        let pid = record.id;
        let start = record.program_counter;

        for _ in 0..self.quantum {
            if executor.step(record) != Step::Continue {
                break;
            }
        }

        if record.is_terminated() {
            // Faulted inside the slice; the executor recorded the reason.
            return;
        }
        if record.is_finished() {
            record.complete();
            self.stats.completed += 1;
            tracing::info!(pid = %pid, "process_completed_within_quantum");
            return;
        }

        record.preempt();
        self.levels[index].queue.push_back(pid);
        self.locations.insert(pid, index);
        self.stats.preempted += 1;
        tracing::debug!(
            pid = %pid,
            from = start,
            to = record.program_counter,
            "process_preempted"
        );
    }

    /// Mark `pid` TERMINATED and drop it from whichever queue holds it.
    /// Idempotent.
    pub fn complete(&mut self, processes: &mut ProcessManager, pid: ProcessId) -> Result<()> {
        let record = processes
            .get_mut(pid)
            .ok_or_else(|| Error::not_found(format!("unknown pid: {}", pid)))?;

        let already = record.is_terminated() && !self.locations.contains_key(&pid);
        record.complete();
        self.dequeue(pid);

        if !already {
            self.stats.completed += 1;
        }
        tracing::info!(pid = %pid, "process_completed");
        Ok(())
    }

    /// Remove `pid` from its queue, if queued. Returns whether it was.
    pub fn dequeue(&mut self, pid: ProcessId) -> bool {
        let Some(index) = self.locations.remove(&pid) else {
            return false;
        };
        let queue = &mut self.levels[index].queue;
        if let Some(position) = queue.iter().position(|queued| *queued == pid) {
            queue.remove(position);
        }
        true
    }

    /// Level currently holding `pid`.
    pub fn level_of(&self, pid: ProcessId) -> Option<usize> {
        self.locations.get(&pid).copied()
    }

    /// Snapshot of the queue at `level`, head first.
    pub fn queued(&self, level: usize) -> Vec<ProcessId> {
        self.levels
            .get(level)
            .map(|level| level.queue.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Algorithms by level.
    pub fn levels(&self) -> Vec<Algorithm> {
        self.levels.iter().map(|level| level.algorithm).collect()
    }

    pub fn quantum(&self) -> usize {
        self.quantum
    }

    /// Total queued entries across levels.
    pub fn len(&self) -> usize {
        self.levels.iter().map(|level| level.queue.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(|level| level.queue.is_empty())
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}
