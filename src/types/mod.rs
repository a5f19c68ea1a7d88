//! Core types for the simulated kernel.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed process identifiers
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for scheduler, memory and VM

mod config;
mod errors;
mod ids;

pub use config::{
    Config, DecodePolicy, MemoryConfig, ObservabilityConfig, SchedulerConfig, VmConfig,
};
pub use errors::{Error, Result};
pub use ids::ProcessId;
