//! Kernel - the simulation actor.
//!
//! The Kernel owns all mutable state. Subsystems (process registry, memory
//! residency, scheduler, VM) are plain structs owned by the Kernel, not
//! separate actors, and every operation runs through `&mut self`.

use serde::Serialize;

use crate::types::{Config, ProcessId, Result};

pub mod instruction;
pub mod memory;
pub mod process;
pub mod scheduler;
pub mod types;
pub mod vm;

pub use instruction::{Instruction, InstructionError};
pub use memory::{Admission, LogicalClock, MemoryManager, MemoryStats, Residency};
pub use process::ProcessManager;
pub use scheduler::{Scheduler, SchedulerStats};
pub use types::{Algorithm, Fault, MemoryWrite, ProcessRecord, ProcessState, Registers, ACC};
pub use vm::{Cpu, Executor, FaultReport, RunReport, Step, Vm};

/// Kernel actor.
#[derive(Debug)]
pub struct Kernel {
    config: Config,
    processes: ProcessManager,
    memory: MemoryManager,
    scheduler: Scheduler,
    vm: Vm,
}

impl Kernel {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let scheduler = Scheduler::with_config(&config.scheduler)?;
        let memory = MemoryManager::with_config(&config.memory)?;
        Ok(Self {
            processes: ProcessManager::new(),
            memory,
            scheduler,
            vm: Vm::new(&config.vm),
            config,
        })
    }

    /// Create, admit and enqueue a process at `priority`.
    ///
    /// The priority and, under the reject policy, the program are checked
    /// before anything is registered, so a rejected submission leaves no trace.
    pub fn submit(&mut self, instructions: Vec<String>, priority: usize) -> Result<ProcessId> {
        self.scheduler.check_priority(priority)?;

        let pid = self
            .processes
            .create_with_policy(instructions, self.config.vm.decode_policy)?
            .id;
        if let Admission::Swapped { evicted } = self.memory.admit(pid) {
            tracing::debug!(pid = %pid, evicted = %evicted, "admission_required_swap");
        }
        self.scheduler.enqueue(&self.processes, pid, priority)?;
        Ok(pid)
    }

    /// Run every queued process to quiescence.
    pub fn run(&mut self) -> RunReport {
        self.vm.run(&mut self.scheduler, &mut self.processes)
    }

    /// Force a process to TERMINATED and drop it from the ready queues.
    pub fn terminate(&mut self, pid: ProcessId) -> Result<()> {
        self.processes.terminate(pid)?;
        self.scheduler.dequeue(pid);
        Ok(())
    }

    pub fn process(&self, pid: ProcessId) -> Option<&ProcessRecord> {
        self.processes.get(pid)
    }

    pub fn processes(&self) -> &ProcessManager {
        &self.processes
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Serializable view of the whole kernel.
    pub fn snapshot(&self) -> KernelSnapshot<'_> {
        KernelSnapshot {
            processes: self.processes.list(),
            memory: self.memory.stats(),
            physical: self.memory.physical_ids(),
            virtual_ids: self.memory.virtual_ids(),
            queues: (0..self.scheduler.levels().len())
                .map(|level| self.scheduler.queued(level))
                .collect(),
            scheduler: self.scheduler.stats(),
        }
    }
}

/// Point-in-time view returned by [`Kernel::snapshot`].
#[derive(Debug, Serialize)]
pub struct KernelSnapshot<'a> {
    pub processes: Vec<&'a ProcessRecord>,
    pub memory: MemoryStats,
    pub physical: Vec<ProcessId>,
    #[serde(rename = "virtual")]
    pub virtual_ids: Vec<ProcessId>,
    pub queues: Vec<Vec<ProcessId>>,
    pub scheduler: SchedulerStats,
}
