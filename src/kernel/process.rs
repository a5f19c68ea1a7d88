//! Process registry.
//!
//! Creates process records with unique ids and keeps them for inspection
//! after they terminate.

use std::collections::BTreeMap;

use super::types::{ProcessRecord, ProcessState};
use crate::types::{DecodePolicy, Error, ProcessId, Result};

/// Process manager - factory and registry of process records.
///
/// NOT a separate actor - owned by Kernel and called via &mut self.
#[derive(Debug)]
pub struct ProcessManager {
    processes: BTreeMap<ProcessId, ProcessRecord>,
    /// `None` once the id space is used up.
    next_pid: Option<ProcessId>,
}

impl ProcessManager {
    pub fn new() -> Self {
        Self::with_first_pid(ProcessId::new(1))
    }

    /// Start the id counter at `first`.
    pub fn with_first_pid(first: ProcessId) -> Self {
        Self {
            processes: BTreeMap::new(),
            next_pid: Some(first),
        }
    }

    /// Create and register a new process in READY state.
    ///
    /// Malformed lines are kept and fault the record when reached.
    pub fn create(&mut self, instructions: Vec<String>) -> Result<&ProcessRecord> {
        self.create_with_policy(instructions, DecodePolicy::FaultAtRuntime)
    }

    /// Like [`create`](Self::create), but under [`DecodePolicy::Reject`] a
    /// program with a malformed line is refused. A refused program consumes
    /// no pid.
    pub fn create_with_policy(
        &mut self,
        instructions: Vec<String>,
        policy: DecodePolicy,
    ) -> Result<&ProcessRecord> {
        if instructions.is_empty() {
            return Err(Error::creation("cannot create a process with no instructions"));
        }
        let pid = self
            .next_pid
            .ok_or_else(|| Error::creation("process id space exhausted"))?;

        let record = ProcessRecord::new(pid, instructions);
        if policy == DecodePolicy::Reject {
            if let Some((pc, error)) = record.first_decode_error() {
                tracing::warn!(pc, error = %error, "program_rejected");
                return Err(Error::InstructionFormat(error.clone()));
            }
        }

        self.next_pid = pid.next();
        tracing::info!(
            pid = %pid,
            name = %record.name,
            instructions = record.len(),
            "process_created"
        );
        Ok(&*self.processes.entry(pid).or_insert(record))
    }

    /// Force a process into TERMINATED. Idempotent.
    pub fn terminate(&mut self, pid: ProcessId) -> Result<()> {
        let record = self
            .processes
            .get_mut(&pid)
            .ok_or_else(|| Error::not_found(format!("unknown pid: {}", pid)))?;

        if record.is_terminated() {
            tracing::debug!(pid = %pid, "terminate_ignored_already_terminated");
            return Ok(());
        }

        record.complete();
        tracing::info!(pid = %pid, "process_terminated");
        Ok(())
    }

    /// Get process by PID.
    pub fn get(&self, pid: ProcessId) -> Option<&ProcessRecord> {
        self.processes.get(&pid)
    }

    /// Get mutable process by PID.
    pub fn get_mut(&mut self, pid: ProcessId) -> Option<&mut ProcessRecord> {
        self.processes.get_mut(&pid)
    }

    /// Current state of a process.
    pub fn state(&self, pid: ProcessId) -> Option<ProcessState> {
        self.processes.get(&pid).map(|record| record.state)
    }

    /// List all processes in id order.
    pub fn list(&self) -> Vec<&ProcessRecord> {
        self.processes.values().collect()
    }

    /// List processes by state.
    pub fn list_by_state(&self, state: ProcessState) -> Vec<&ProcessRecord> {
        self.processes
            .values()
            .filter(|record| record.state == state)
            .collect()
    }

    /// Count processes.
    pub fn count(&self) -> usize {
        self.processes.len()
    }

    /// Count processes by state.
    pub fn count_by_state(&self, state: ProcessState) -> usize {
        self.processes
            .values()
            .filter(|record| record.state == state)
            .count()
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn test_create_assigns_monotonic_ids() {
        let mut pm = ProcessManager::new();
        let a = pm.create(program(&["LOAD 1"])).unwrap().id;
        let b = pm.create(program(&["LOAD 2"])).unwrap().id;
        let c = pm.create(program(&["LOAD 3"])).unwrap().id;

        assert_eq!(a, ProcessId::new(1));
        assert_eq!(b, ProcessId::new(2));
        assert_eq!(c, ProcessId::new(3));
        assert_eq!(pm.count(), 3);
    }

    #[test]
    fn test_create_empty_program_fails() {
        let mut pm = ProcessManager::new();
        let result = pm.create(Vec::new());
        assert!(matches!(result, Err(Error::Creation(_))));
        assert_eq!(pm.count(), 0);

        // A rejected creation does not consume an id.
        let pid = pm.create(program(&["LOAD 1"])).unwrap().id;
        assert_eq!(pid, ProcessId::new(1));
    }

    #[test]
    fn test_counter_is_per_instance() {
        let mut first = ProcessManager::new();
        let mut second = ProcessManager::with_first_pid(ProcessId::new(100));
        first.create(program(&["LOAD 1"])).unwrap();

        assert_eq!(
            first.create(program(&["LOAD 1"])).unwrap().id,
            ProcessId::new(2)
        );
        assert_eq!(
            second.create(program(&["LOAD 1"])).unwrap().id,
            ProcessId::new(100)
        );
    }

    #[test]
    fn test_new_record_is_ready() {
        let mut pm = ProcessManager::new();
        let record = pm.create(program(&["LOAD 1", "STORE 10"])).unwrap();
        assert_eq!(record.state, ProcessState::Ready);
        assert_eq!(record.program_counter, 0);
        assert_eq!(record.instructions(), &["LOAD 1", "STORE 10"]);
    }

    #[test]
    fn test_terminate_idempotent() {
        let mut pm = ProcessManager::new();
        let pid = pm.create(program(&["LOAD 1"])).unwrap().id;

        pm.terminate(pid).unwrap();
        assert_eq!(pm.state(pid), Some(ProcessState::Terminated));

        assert!(pm.terminate(pid).is_ok());
        assert_eq!(pm.state(pid), Some(ProcessState::Terminated));

        // Terminated records are retained for inspection.
        assert!(pm.get(pid).is_some());
    }

    #[test]
    fn test_reject_policy_consumes_no_pid() {
        let mut pm = ProcessManager::new();
        let err = pm
            .create_with_policy(program(&["LOAD 1", "SUB x"]), DecodePolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, Error::InstructionFormat(_)));
        assert_eq!(pm.count(), 0);

        let pid = pm
            .create_with_policy(program(&["LOAD 1", "SUB x"]), DecodePolicy::FaultAtRuntime)
            .unwrap()
            .id;
        assert_eq!(pid, ProcessId::new(1));
    }

    #[test]
    fn test_last_pid_is_allocated_then_creation_fails() {
        let mut pm = ProcessManager::with_first_pid(ProcessId::new(u64::MAX));
        let pid = pm.create(program(&["LOAD 1"])).unwrap().id;
        assert_eq!(pid, ProcessId::new(u64::MAX));

        assert!(matches!(
            pm.create(program(&["LOAD 2"])),
            Err(Error::Creation(_))
        ));
        assert_eq!(pm.count(), 1);
    }

    #[test]
    fn test_terminate_unknown_pid() {
        let mut pm = ProcessManager::new();
        assert!(matches!(
            pm.terminate(ProcessId::new(42)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_list_by_state() {
        let mut pm = ProcessManager::new();
        let pid1 = pm.create(program(&["LOAD 1"])).unwrap().id;
        pm.create(program(&["LOAD 2"])).unwrap();
        pm.create(program(&["LOAD 3"])).unwrap();

        pm.terminate(pid1).unwrap();

        assert_eq!(pm.list_by_state(ProcessState::Ready).len(), 2);
        assert_eq!(pm.count_by_state(ProcessState::Terminated), 1);

        let ids: Vec<u64> = pm.list().iter().map(|record| record.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
