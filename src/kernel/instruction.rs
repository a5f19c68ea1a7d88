//! Instruction decoding.
//!
//! Programs arrive as text, one `OPCODE [OPERAND]` per line. Each line is
//! decoded once when the process is created; the VM only ever sees the
//! structured form.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opcodes with operand rules; everything else is a no-op.
const KNOWN_OPCODES: [&str; 6] = ["LOAD", "STORE", "ADD", "SUB", "MUL", "JMP"];

/// Decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "arg", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Instruction {
    /// `ACC := n`
    Load(i64),
    /// Append `(address, ACC)` to the memory log.
    Store(String),
    /// `ACC += n`
    Add(i64),
    /// `ACC -= n`
    Sub(i64),
    /// `ACC *= n`
    Mul(i64),
    /// Continue at the given instruction index.
    Jmp(usize),
    /// Unrecognised opcode or blank line; executes as a no-op.
    Nop(String),
}

impl Instruction {
    /// Decode one line of program text.
    ///
    /// Blank lines and unrecognised opcodes decode to `Nop` whatever follows
    /// them; only the known opcodes have their operands checked.
    pub fn parse(line: &str) -> Result<Self, InstructionError> {
        let mut tokens = line.split_whitespace();
        let Some(opcode) = tokens.next() else {
            return Ok(Self::Nop(String::new()));
        };
        if !KNOWN_OPCODES.contains(&opcode) {
            return Ok(Self::Nop(opcode.to_string()));
        }

        let operand = tokens.next();
        if let Some(extra) = tokens.next() {
            return Err(InstructionError::UnexpectedOperand {
                opcode: opcode.to_string(),
                operand: extra.to_string(),
            });
        }

        let instruction = match opcode {
            "LOAD" => Self::Load(integer(opcode, operand)?),
            "STORE" => Self::Store(required(opcode, operand)?.to_string()),
            "ADD" => Self::Add(integer(opcode, operand)?),
            "SUB" => Self::Sub(integer(opcode, operand)?),
            "MUL" => Self::Mul(integer(opcode, operand)?),
            "JMP" => {
                let raw = required(opcode, operand)?;
                let target = raw.parse::<usize>().map_err(|_| invalid_operand(opcode, raw))?;
                Self::Jmp(target)
            }
            other => Self::Nop(other.to_string()),
        };
        Ok(instruction)
    }

    /// Mnemonic as written in program text.
    pub fn opcode(&self) -> &str {
        match self {
            Self::Load(_) => "LOAD",
            Self::Store(_) => "STORE",
            Self::Add(_) => "ADD",
            Self::Sub(_) => "SUB",
            Self::Mul(_) => "MUL",
            Self::Jmp(_) => "JMP",
            Self::Nop(mnemonic) => mnemonic,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(n) | Self::Add(n) | Self::Sub(n) | Self::Mul(n) => {
                write!(f, "{} {}", self.opcode(), n)
            }
            Self::Store(address) => write!(f, "STORE {}", address),
            Self::Jmp(target) => write!(f, "JMP {}", target),
            Self::Nop(mnemonic) => write!(f, "{}", mnemonic),
        }
    }
}

/// Decoding failure for a single line.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstructionError {
    #[error("{opcode} requires an operand")]
    MissingOperand { opcode: String },

    #[error("{opcode} operand {operand:?} is not a valid number")]
    InvalidOperand { opcode: String, operand: String },

    #[error("{opcode} has unexpected trailing operand {operand:?}")]
    UnexpectedOperand { opcode: String, operand: String },
}

fn invalid_operand(opcode: &str, operand: &str) -> InstructionError {
    InstructionError::InvalidOperand {
        opcode: opcode.to_string(),
        operand: operand.to_string(),
    }
}

fn required<'a>(opcode: &str, operand: Option<&'a str>) -> Result<&'a str, InstructionError> {
    operand.ok_or_else(|| InstructionError::MissingOperand {
        opcode: opcode.to_string(),
    })
}

fn integer(opcode: &str, operand: Option<&str>) -> Result<i64, InstructionError> {
    let raw = required(opcode, operand)?;
    raw.parse::<i64>().map_err(|_| invalid_operand(opcode, raw))
}

/// Decode a whole program, keeping per-line results.
pub fn decode_program(lines: &[String]) -> Vec<Result<Instruction, InstructionError>> {
    lines.iter().map(|line| Instruction::parse(line)).collect()
}
