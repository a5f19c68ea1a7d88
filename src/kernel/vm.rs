//! Register machine and run loop.
//!
//! `Cpu` executes one decoded instruction at a time against a process
//! record. `Vm` drives the fetch-decode-execute loop: it repeatedly asks the
//! scheduler for work and runs the dispatched record until it completes,
//! faults, or is handed back preempted.

use serde::{Deserialize, Serialize};

use super::instruction::Instruction;
use super::process::ProcessManager;
use super::scheduler::Scheduler;
use super::types::{Fault, MemoryWrite, ProcessRecord, ProcessState};
use crate::types::{ProcessId, VmConfig};

/// Outcome of executing a single instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// More instructions remain.
    Continue,
    /// The program counter reached the end of the program.
    Finished,
    /// The record was terminated with a fault.
    Faulted(Fault),
}

/// Anything that can advance a record by exactly one instruction.
///
/// The scheduler charges round-robin slices through this seam.
pub trait Executor {
    fn step(&mut self, record: &mut ProcessRecord) -> Step;
}

/// Accumulator machine executing decoded instructions.
#[derive(Debug, Clone)]
pub struct Cpu {
    step_limit: u64,
    executed: u64,
}

impl Cpu {
    pub fn new(step_limit: u64) -> Self {
        Self {
            step_limit,
            executed: 0,
        }
    }

    /// Instructions executed by this CPU since creation.
    pub fn executed(&self) -> u64 {
        self.executed
    }

    fn execute(record: &mut ProcessRecord, pc: usize, instruction: Instruction) -> Result<(), Fault> {
        let acc = record.registers.acc();
        let overflow = |operand: i64| Fault::Overflow {
            pc,
            opcode: instruction.opcode().to_string(),
            acc,
            operand,
        };

        match &instruction {
            Instruction::Load(n) => record.registers.set_acc(*n),
            Instruction::Store(address) => record.memory_log.push(MemoryWrite {
                address: address.clone(),
                value: acc,
            }),
            Instruction::Add(n) => {
                record.registers.set_acc(acc.checked_add(*n).ok_or_else(|| overflow(*n))?)
            }
            Instruction::Sub(n) => {
                record.registers.set_acc(acc.checked_sub(*n).ok_or_else(|| overflow(*n))?)
            }
            Instruction::Mul(n) => {
                record.registers.set_acc(acc.checked_mul(*n).ok_or_else(|| overflow(*n))?)
            }
            Instruction::Jmp(target) => {
                // Lands exactly on the target; targets past the end finish the program.
                record.program_counter = (*target).min(record.len());
                return Ok(());
            }
            Instruction::Nop(mnemonic) => {
                tracing::debug!(pid = %record.id, pc, opcode = %mnemonic, "unknown_opcode_skipped");
            }
        }

        record.program_counter += 1;
        Ok(())
    }
}

impl Executor for Cpu {
    fn step(&mut self, record: &mut ProcessRecord) -> Step {
        if record.is_finished() {
            return Step::Finished;
        }
        if record.steps >= self.step_limit {
            let fault = Fault::StepLimit {
                limit: self.step_limit,
            };
            record.fail(fault.clone());
            return Step::Faulted(fault);
        }

        let pc = record.program_counter;
        let instruction = match record.current() {
            Some(Ok(instruction)) => instruction.clone(),
            Some(Err(error)) => {
                let fault = Fault::Decode {
                    pc,
                    error: error.clone(),
                };
                record.fail(fault.clone());
                return Step::Faulted(fault);
            }
            None => return Step::Finished,
        };

        tracing::trace!(pid = %record.id, pc, instruction = %instruction, "execute");
        record.steps += 1;
        self.executed += 1;

        if let Err(fault) = Self::execute(record, pc, instruction) {
            record.fail(fault.clone());
            return Step::Faulted(fault);
        }

        if record.is_finished() {
            Step::Finished
        } else {
            Step::Continue
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new(VmConfig::default().step_limit)
    }
}

/// A record that ended with a fault during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultReport {
    pub pid: ProcessId,
    pub fault: Fault,
}

/// Summary of one `Vm::run` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Records handed out by the scheduler.
    pub dispatches: u64,
    /// Instructions executed, including round-robin slices.
    pub instructions: u64,
    /// Round-robin turns that ended with the record requeued.
    pub preemptions: u64,
    /// Records that ran to the end of their program, in completion order.
    pub completed: Vec<ProcessId>,
    /// Records terminated by a fault.
    pub faulted: Vec<FaultReport>,
    /// Records that were dequeued after an external termination.
    pub skipped: Vec<ProcessId>,
}

/// Virtual machine driving the run loop.
#[derive(Debug, Default)]
pub struct Vm {
    cpu: Cpu,
}

impl Vm {
    pub fn new(config: &VmConfig) -> Self {
        Self {
            cpu: Cpu::new(config.step_limit),
        }
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Run until the scheduler has nothing left to dispatch.
    pub fn run(&mut self, scheduler: &mut Scheduler, processes: &mut ProcessManager) -> RunReport {
        let mut report = RunReport::default();
        let executed_before = self.cpu.executed();
        tracing::info!(queued = scheduler.len(), "vm_run_started");

        while let Some(pid) = scheduler.next(processes, &mut self.cpu) {
            report.dispatches += 1;
            let Some(record) = processes.get_mut(pid) else {
                continue;
            };

            if record.state == ProcessState::Ready {
                // Handed back after a round-robin slice; it is queued again.
                report.preemptions += 1;
                continue;
            }

            let mut stopped = false;
            while record.state == ProcessState::Running {
                if self.cpu.step(record) != Step::Continue {
                    stopped = true;
                    break;
                }
            }

            let (finished, fault) = (record.is_finished(), record.fault.clone());
            if stopped {
                if let Err(err) = scheduler.complete(processes, pid) {
                    tracing::warn!(pid = %pid, error = %err, "complete_failed");
                }
            }

            match fault {
                Some(fault) => {
                    tracing::warn!(pid = %pid, fault = %fault, "process_faulted");
                    report.faulted.push(FaultReport { pid, fault });
                }
                None if finished => report.completed.push(pid),
                None => {
                    tracing::debug!(pid = %pid, "terminated_process_skipped");
                    report.skipped.push(pid);
                }
            }
        }

        report.instructions = self.cpu.executed() - executed_before;
        tracing::info!(
            dispatches = report.dispatches,
            instructions = report.instructions,
            completed = report.completed.len(),
            faulted = report.faulted.len(),
            "vm_run_finished"
        );
        report
    }
}
