//! Kernel types: ProcessState, Algorithm, ProcessRecord and its register file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::instruction::{decode_program, Instruction, InstructionError};
use crate::types::{Error, ProcessId};

/// Name of the accumulator register.
pub const ACC: &str = "ACC";

/// Process lifecycle state.
///
/// State transitions:
/// ```text
/// READY → RUNNING → TERMINATED
///           ↓  ↑
///          READY   (round-robin preemption)
/// ```
/// `Waiting` is part of the state set but no instruction currently blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Ready,
    Running,
    Waiting,
    Terminated,
}

impl ProcessState {
    /// Check if this is a terminal state.
    pub fn is_terminal(self) -> bool {
        self == ProcessState::Terminated
    }

    /// Check if transition is valid.
    pub fn can_transition_to(self, to: ProcessState) -> bool {
        match (self, to) {
            (ProcessState::Ready, ProcessState::Running) => true,
            (ProcessState::Ready, ProcessState::Terminated) => true,
            (ProcessState::Running, ProcessState::Ready) => true, // Preempted
            (ProcessState::Running, ProcessState::Waiting) => true,
            (ProcessState::Running, ProcessState::Terminated) => true,
            (ProcessState::Waiting, ProcessState::Ready) => true,
            (ProcessState::Waiting, ProcessState::Terminated) => true,
            // TERMINATED is absorbing
            _ => false,
        }
    }
}

/// Selection discipline bound to one scheduler level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Fifo,
    RoundRobin,
    /// Shortest remaining instructions first.
    Sjf,
}

impl Algorithm {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fifo => "fifo",
            Self::RoundRobin => "round_robin",
            Self::Sjf => "sjf",
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fifo" | "fcfs" => Ok(Self::Fifo),
            "round_robin" | "roundrobin" | "rr" => Ok(Self::RoundRobin),
            "sjf" | "shortest_job_first" | "srt" => Ok(Self::Sjf),
            _ => Err(Error::config(format!(
                "invalid algorithm '{}'. Valid: fifo, round_robin, sjf",
                s
            ))),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named integer registers. Always holds `ACC`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registers(BTreeMap<String, i64>);

impl Registers {
    pub fn new() -> Self {
        let mut regs = BTreeMap::new();
        regs.insert(ACC.to_string(), 0);
        Self(regs)
    }

    pub fn acc(&self) -> i64 {
        self.get(ACC).unwrap_or(0)
    }

    pub fn set_acc(&mut self, value: i64) {
        self.set(ACC, value);
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.0.get(name).copied()
    }

    pub fn set(&mut self, name: &str, value: i64) {
        self.0.insert(name.to_string(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

/// One entry of a record's memory log, produced by `STORE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryWrite {
    pub address: String,
    pub value: i64,
}

/// Why a record was terminated abnormally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    /// The instruction at `pc` could not be decoded.
    Decode { pc: usize, error: InstructionError },
    /// Checked `i64` arithmetic overflowed.
    Overflow { pc: usize, opcode: String, acc: i64, operand: i64 },
    /// The record executed more instructions than allowed.
    StepLimit { limit: u64 },
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Decode { pc, error } => write!(f, "decode fault at pc {}: {}", pc, error),
            Fault::Overflow {
                pc,
                opcode,
                acc,
                operand,
            } => write!(
                f,
                "overflow at pc {}: {} {} with ACC={}",
                pc, opcode, operand, acc
            ),
            Fault::StepLimit { limit } => write!(f, "step limit of {} exceeded", limit),
        }
    }
}

/// Process record - the kernel's control block for one simulated process.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProcessRecord {
    // Identity
    pub id: ProcessId,
    pub name: String,

    // State
    pub state: ProcessState,
    pub program_counter: usize,
    pub registers: Registers,

    // Program (fixed at creation)
    instructions: Vec<String>,
    #[serde(skip)]
    decoded: Vec<Result<Instruction, InstructionError>>,

    // Results
    pub memory_log: Vec<MemoryWrite>,
    pub steps: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<Fault>,
}

impl ProcessRecord {
    pub fn new(id: ProcessId, instructions: Vec<String>) -> Self {
        let decoded = decode_program(&instructions);
        Self {
            id,
            name: format!("process-{}", id),
            state: ProcessState::Ready,
            program_counter: 0,
            registers: Registers::new(),
            instructions,
            decoded,
            memory_log: Vec::new(),
            steps: 0,
            fault: None,
        }
    }

    /// Instruction text as submitted.
    pub fn instructions(&self) -> &[String] {
        &self.instructions
    }

    /// Program length.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Instructions left before the program counter reaches the end.
    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.program_counter)
    }

    /// Decoded instruction at the program counter, if any.
    pub fn current(&self) -> Option<&Result<Instruction, InstructionError>> {
        self.decoded.get(self.program_counter)
    }

    /// First line that failed to decode, with its index.
    pub fn first_decode_error(&self) -> Option<(usize, &InstructionError)> {
        self.decoded
            .iter()
            .enumerate()
            .find_map(|(pc, decoded)| decoded.as_ref().err().map(|err| (pc, err)))
    }

    pub fn is_finished(&self) -> bool {
        self.program_counter >= self.len()
    }

    pub fn is_terminated(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to `to` if the lifecycle allows it. Returns whether it moved.
    fn transition(&mut self, to: ProcessState) -> bool {
        if !self.state.can_transition_to(to) {
            tracing::debug!(pid = %self.id, from = ?self.state, to = ?to, "transition_refused");
            return false;
        }
        self.state = to;
        true
    }

    /// Transition to RUNNING state.
    pub fn start(&mut self) -> bool {
        self.transition(ProcessState::Running)
    }

    /// Transition back to READY after a preempted slice.
    pub fn preempt(&mut self) -> bool {
        self.state == ProcessState::Running && self.transition(ProcessState::Ready)
    }

    /// Transition to TERMINATED state. No-op if already terminated.
    pub fn complete(&mut self) -> bool {
        self.transition(ProcessState::Terminated)
    }

    /// Terminate with a fault reason. A record that is already terminated
    /// keeps its original outcome.
    pub fn fail(&mut self, fault: Fault) -> bool {
        if !self.transition(ProcessState::Terminated) {
            return false;
        }
        self.fault = Some(fault);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn test_new_record_defaults() {
        let record = ProcessRecord::new(ProcessId::new(7), program(&["LOAD 1", "ADD 2"]));
        assert_eq!(record.name, "process-7");
        assert_eq!(record.state, ProcessState::Ready);
        assert_eq!(record.program_counter, 0);
        assert_eq!(record.registers.acc(), 0);
        assert_eq!(record.remaining(), 2);
        assert!(record.memory_log.is_empty());
        assert!(record.first_decode_error().is_none());
    }

    #[test]
    fn test_first_decode_error_reports_line() {
        let record = ProcessRecord::new(ProcessId::new(1), program(&["LOAD 1", "ADD", "SUB x"]));
        let (pc, err) = record.first_decode_error().unwrap();
        assert_eq!(pc, 1);
        assert!(matches!(err, InstructionError::MissingOperand { .. }));
    }

    #[test]
    fn test_state_validation() {
        assert!(ProcessState::Ready.can_transition_to(ProcessState::Running));
        assert!(ProcessState::Running.can_transition_to(ProcessState::Ready));
        assert!(ProcessState::Running.can_transition_to(ProcessState::Terminated));
        assert!(ProcessState::Waiting.can_transition_to(ProcessState::Ready));

        assert!(!ProcessState::Terminated.can_transition_to(ProcessState::Ready));
        assert!(!ProcessState::Terminated.can_transition_to(ProcessState::Running));
        assert!(!ProcessState::Ready.can_transition_to(ProcessState::Waiting));
    }

    #[test]
    fn test_fail_keeps_first_fault() {
        let mut record = ProcessRecord::new(ProcessId::new(1), program(&["LOAD 1"]));
        assert!(record.fail(Fault::StepLimit { limit: 3 }));
        assert!(!record.fail(Fault::StepLimit { limit: 9 }));
        assert_eq!(record.state, ProcessState::Terminated);
        assert_eq!(record.fault, Some(Fault::StepLimit { limit: 3 }));
    }

    #[test]
    fn test_preempt_only_from_running() {
        let mut record = ProcessRecord::new(ProcessId::new(1), program(&["LOAD 1"]));
        assert!(!record.preempt());
        assert!(record.start());
        assert!(record.preempt());
        assert_eq!(record.state, ProcessState::Ready);

        assert!(record.complete());
        assert!(!record.preempt());
        assert_eq!(record.state, ProcessState::Terminated);
    }

    #[test]
    fn test_terminated_record_cannot_restart() {
        let mut record = ProcessRecord::new(ProcessId::new(1), program(&["LOAD 1"]));
        assert!(record.complete());

        assert!(!record.start());
        assert!(!record.complete());
        assert!(!record.fail(Fault::StepLimit { limit: 1 }));
        assert_eq!(record.state, ProcessState::Terminated);
        assert_eq!(record.fault, None);
    }

    #[test]
    fn test_start_from_running_refused() {
        let mut record = ProcessRecord::new(ProcessId::new(1), program(&["LOAD 1"]));
        assert!(record.start());
        assert!(!record.start());
        assert_eq!(record.state, ProcessState::Running);
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("rr".parse::<Algorithm>().unwrap(), Algorithm::RoundRobin);
        assert_eq!("FIFO".parse::<Algorithm>().unwrap(), Algorithm::Fifo);
        assert_eq!(
            "shortest_job_first".parse::<Algorithm>().unwrap(),
            Algorithm::Sjf
        );
        assert!("lottery".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_registers_extensible() {
        let mut regs = Registers::new();
        regs.set_acc(4);
        regs.set("R1", 9);
        assert_eq!(regs.acc(), 4);
        assert_eq!(regs.get("R1"), Some(9));
        assert_eq!(regs.iter().count(), 2);
    }
}
