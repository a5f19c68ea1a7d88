//! Simkernel command-line runner - main entry point.
//!
//! Loads one program per file, submits them all at a single priority, runs
//! the kernel to quiescence and prints the run report and final kernel state
//! as JSON on stdout.

use clap::Parser;
use serde_json::json;
use std::path::{Path, PathBuf};

use simkernel::kernel::Algorithm;
use simkernel::{Config, Kernel};

#[derive(Debug, Parser)]
#[command(name = "simkernel", version, about = "Run programs on the simulated kernel")]
struct Args {
    /// JSON configuration file.
    #[arg(long, env = "SIMKERNEL_CONFIG")]
    config: Option<PathBuf>,

    /// Scheduler level algorithm; repeat for more levels (highest priority first).
    #[arg(long = "algorithm", short = 'a')]
    algorithms: Vec<Algorithm>,

    /// Round-robin quantum.
    #[arg(long)]
    quantum: Option<usize>,

    /// Physical residency capacity.
    #[arg(long)]
    max_physical: Option<usize>,

    /// Priority level every program is submitted at.
    #[arg(long, default_value_t = 0)]
    priority: usize,

    /// Program files, one instruction per line.
    #[arg(required = true)]
    programs: Vec<PathBuf>,
}

/// Read a program file, dropping blank lines.
fn load_program(path: &Path) -> std::io::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if !args.algorithms.is_empty() {
        config.scheduler.levels = args.algorithms.clone();
    }
    if let Some(quantum) = args.quantum {
        config.scheduler.quantum = quantum;
    }
    if let Some(max_physical) = args.max_physical {
        config.memory.max_physical = max_physical;
    }

    // Initialize observability
    simkernel::observability::init_tracing_with(&config.observability);

    let mut kernel = Kernel::new(config)?;
    let mut rejected = Vec::new();

    for path in &args.programs {
        let submitted = load_program(path)
            .map_err(simkernel::Error::from)
            .and_then(|program| kernel.submit(program, args.priority));
        match submitted {
            Ok(pid) => tracing::info!(pid = %pid, path = %path.display(), "program_submitted"),
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "program_rejected");
                rejected.push(json!({ "path": path.display().to_string(), "error": err.to_string() }));
            }
        }
    }

    let report = kernel.run();
    let output = json!({
        "report": report,
        "rejected": rejected,
        "kernel": kernel.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
