//! Allocation trace scripts
//!
//! A trace is a line-oriented record of what a graph executor asked of the
//! planner, replayable against any [`ArenaAllocator`]:
//!
//! ```text
//! # comment
//! alloc a 48      # reserve 48 bytes for buffer `a`
//! alloc b 48
//! free a
//! bind            # get_ptr()
//! info            # snapshot accounting
//! ```
//!
//! Names are buffer identifiers; a name can be reused once freed.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::backend::MemoryRuntime;
use crate::error::{PlanError, PlanResult};
use crate::memory::{ArenaAllocator, ArenaBlock, ArenaStats};

/// One trace instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceOp {
    Alloc { name: String, bytes: usize },
    Free { name: String },
    Bind,
    Info,
}

/// Instruction with its source line (1-based)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceStep {
    pub line: usize,
    pub op: TraceOp,
}

/// Parsed trace script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    steps: Vec<TraceStep>,
}

/// Where one buffer landed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub name: String,
    pub offset: usize,
    pub size: usize,
}

/// Outcome of replaying a trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceReport {
    pub label: String,
    /// Every allocation in trace order
    pub placements: Vec<Placement>,
    pub allocs: usize,
    pub frees: usize,
    pub binds: usize,
    pub final_peak: usize,
    pub max_peak: usize,
    /// Buffers still live when the trace ended, sorted by name
    pub live_at_end: Vec<String>,
    /// Accounting captured at each `info` instruction
    pub snapshots: Vec<ArenaStats>,
}

impl Trace {
    /// Parse a trace script
    ///
    /// # Errors
    /// - `InvalidTrace` on unknown instructions, missing operands or
    ///   malformed byte counts
    pub fn parse(text: &str) -> PlanResult<Self> {
        let mut steps = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let content = raw.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }

            let tokens: Vec<&str> = content.split_whitespace().collect();
            let op = match tokens.as_slice() {
                ["alloc", name, bytes] => {
                    let bytes = bytes.parse::<usize>().map_err(|e| {
                        PlanError::invalid_trace(line, format!("bad byte count '{}': {}", bytes, e))
                    })?;
                    TraceOp::Alloc {
                        name: name.to_string(),
                        bytes,
                    }
                }
                ["free", name] => TraceOp::Free {
                    name: name.to_string(),
                },
                ["bind"] => TraceOp::Bind,
                ["info"] => TraceOp::Info,
                [op @ ("alloc" | "free" | "bind" | "info"), ..] => {
                    return Err(PlanError::invalid_trace(
                        line,
                        format!("wrong number of operands for '{}'", op),
                    ));
                }
                [op, ..] => {
                    return Err(PlanError::invalid_trace(
                        line,
                        format!("unknown instruction '{}'", op),
                    ));
                }
                [] => continue,
            };
            steps.push(TraceStep { line, op });
        }

        Ok(Self { steps })
    }

    /// Read and parse a trace file
    pub fn from_file(path: impl AsRef<Path>) -> PlanResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded trace {} ({} bytes)", path.display(), text.len());
        Self::parse(&text)
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every instruction against `arena`
    ///
    /// Buffers still live at the end stay allocated in `arena`.
    ///
    /// # Errors
    /// - `InvalidTrace` for a double alloc or free of a name, or an
    ///   allocator rejection (reported with its line)
    /// - `OutOfMemory` from a `bind`, unchanged
    pub fn replay<R: MemoryRuntime>(
        &self,
        arena: &mut ArenaAllocator<R>,
    ) -> PlanResult<TraceReport> {
        let mut live: HashMap<&str, ArenaBlock> = HashMap::new();
        let mut report = TraceReport {
            label: arena.config().label.clone(),
            placements: Vec::new(),
            allocs: 0,
            frees: 0,
            binds: 0,
            final_peak: 0,
            max_peak: 0,
            live_at_end: Vec::new(),
            snapshots: Vec::new(),
        };

        for step in &self.steps {
            match &step.op {
                TraceOp::Alloc { name, bytes } => {
                    if live.contains_key(name.as_str()) {
                        return Err(PlanError::invalid_trace(
                            step.line,
                            format!("'{}' is already live", name),
                        ));
                    }
                    let block = arena
                        .alloc_block(*bytes)
                        .map_err(|e| PlanError::invalid_trace(step.line, e.to_string()))?;
                    report.placements.push(Placement {
                        name: name.clone(),
                        offset: block.offset(),
                        size: block.size(),
                    });
                    report.allocs += 1;
                    live.insert(name.as_str(), block);
                }
                TraceOp::Free { name } => {
                    let block = live.remove(name.as_str()).ok_or_else(|| {
                        PlanError::invalid_trace(step.line, format!("'{}' is not live", name))
                    })?;
                    arena
                        .free_block(block)
                        .map_err(|e| PlanError::invalid_trace(step.line, e.to_string()))?;
                    report.frees += 1;
                }
                TraceOp::Bind => {
                    arena.get_ptr()?;
                    report.binds += 1;
                }
                TraceOp::Info => {
                    arena.log_info();
                    report.snapshots.push(arena.stats());
                }
            }
        }

        report.final_peak = arena.peak();
        report.max_peak = arena.max_peak();
        report.live_at_end = live.keys().map(|name| name.to_string()).collect();
        report.live_at_end.sort();
        Ok(report)
    }
}

impl fmt::Display for TraceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "plan '{}'", self.label)?;
        for p in &self.placements {
            writeln!(f, "  {:<16} offset {:>10}  size {:>10}", p.name, p.offset, p.size)?;
        }
        writeln!(
            f,
            "  allocs: {}, frees: {}, binds: {}",
            self.allocs, self.frees, self.binds
        )?;
        write!(f, "  final peak: {} bytes, max peak: {} bytes", self.final_peak, self.max_peak)?;
        if !self.live_at_end.is_empty() {
            write!(f, "\n  live at end: {}", self.live_at_end.join(", "))?;
        }
        Ok(())
    }
}
