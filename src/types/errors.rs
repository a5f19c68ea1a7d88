//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context.

use thiserror::Error;

use crate::kernel::instruction::InstructionError;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the simulated kernel.
#[derive(Error, Debug)]
pub enum Error {
    /// Process creation rejected (empty program).
    #[error("creation error: {0}")]
    Creation(String),

    /// Malformed instruction text.
    #[error("instruction format error: {0}")]
    InstructionFormat(#[from] InstructionError),

    /// Enqueue with a priority outside the configured levels.
    #[error("priority {priority} out of range (scheduler has {levels} levels)")]
    PriorityRange { priority: usize, levels: usize },

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid state transition.
    #[error("state transition error: {0}")]
    StateTransition(String),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// Convenience constructors
impl Error {
    pub fn creation(msg: impl Into<String>) -> Self {
        Self::Creation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn state_transition(msg: impl Into<String>) -> Self {
        Self::StateTransition(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn priority_range(priority: usize, levels: usize) -> Self {
        Self::PriorityRange { priority, levels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::creation("empty program").to_string(),
            "creation error: empty program"
        );
        assert_eq!(
            Error::priority_range(4, 2).to_string(),
            "priority 4 out of range (scheduler has 2 levels)"
        );
    }

    #[test]
    fn test_instruction_error_converts() {
        let err: Error = InstructionError::MissingOperand {
            opcode: "LOAD".to_string(),
        }
        .into();
        assert!(matches!(err, Error::InstructionFormat(_)));
        assert_eq!(
            err.to_string(),
            "instruction format error: LOAD requires an operand"
        );
    }
}
