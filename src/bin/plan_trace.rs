use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use planforge::logging::init_logging_default;
use planforge::{AllocatorConfig, ArenaAllocator, HostRuntime, Trace};

#[derive(Parser, Debug)]
#[command(name = "plan_trace", version)]
#[command(about = "Replay an alloc/free trace through the arena planner", long_about = None)]
struct Cli {
    /// Path to the trace script
    #[arg(long)]
    trace: PathBuf,

    /// Allocation granularity in bytes (defaults to PLANFORGE_ARENA_ALIGNMENT or 8)
    #[arg(long)]
    alignment: Option<usize>,

    /// Plan name shown in the report
    #[arg(long)]
    label: Option<String>,

    /// Bind the arena to host memory after the trace finishes (counted in
    /// the report's binds)
    #[arg(long)]
    bind: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    init_logging_default();
    let cli = Cli::parse();

    let mut config = AllocatorConfig::from_env().context("reading allocator configuration")?;
    if let Some(alignment) = cli.alignment {
        config = config.with_alignment(alignment);
    }
    if let Some(label) = cli.label {
        config = config.with_label(label);
    }

    let trace = Trace::from_file(&cli.trace)
        .with_context(|| format!("loading trace {}", cli.trace.display()))?;

    let mut arena = ArenaAllocator::with_config(Arc::new(HostRuntime::new()), config)?;
    let mut report = trace.replay(&mut arena)?;

    // A final bind counts like a trailing `bind` instruction
    if cli.bind {
        arena.get_ptr().context("binding arena to host memory")?;
        report.binds += 1;
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
        println!("{}", arena.info());
        println!(
            "host runtime: {} reservation(s), {} bytes held",
            arena.runtime().reserve_count(),
            arena.runtime().reserved_bytes()
        );
    }

    Ok(())
}
