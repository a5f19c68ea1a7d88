//! # Simkernel - Simulated Operating System Kernel
//!
//! A deterministic, single-threaded model of a small OS kernel providing:
//! - Process records with a register file, program counter and memory log
//! - Multi-level ready queues, each level running FIFO, round-robin or SJF
//! - Capacity-bounded residency with FIFO eviction to virtual memory
//! - A register VM executing `LOAD/STORE/ADD/SUB/MUL/JMP` programs
//!
//! ## Architecture
//!
//! The kernel follows a single-actor model where the `Kernel` owns all mutable state:
//! ```text
//!                      ┌─────────────────────────────────┐
//!   submit(program) →  │          Kernel Actor           │
//!                      │  ┌─────────┐ ┌─────────┐        │
//!                      │  │ Process │ │ Memory  │        │
//!                      │  │ Manager │ │ Manager │        │
//!                      │  └─────────┘ └─────────┘        │
//!                      │  ┌─────────┐ ┌─────────┐        │
//!   run()          →   │  │Scheduler│◄┤   VM    │        │
//!                      │  └─────────┘ └─────────┘        │
//!                      └─────────────────────────────────┘
//! ```
//!
//! ```
//! use simkernel::{Config, Kernel};
//!
//! let mut kernel = Kernel::new(Config::default())?;
//! let program = ["LOAD 2", "MUL 3", "STORE 300"].map(String::from).to_vec();
//! let pid = kernel.submit(program, 0)?;
//! let report = kernel.run();
//!
//! assert_eq!(report.completed, vec![pid]);
//! assert_eq!(kernel.process(pid).unwrap().registers.acc(), 6);
//! # Ok::<(), simkernel::Error>(())
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod kernel;
pub mod types;

// Internal utilities
pub mod observability;

pub use kernel::{Kernel, ProcessRecord, ProcessState, RunReport};
pub use types::{Config, Error, ProcessId, Result};
