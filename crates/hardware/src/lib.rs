//! MIPS-32 out-of-order superscalar simulator library.
//!
//! This crate implements a cycle-accurate out-of-order, superscalar MIPS-32
//! pipeline with the following:
//! 1. **Core:** a five-phase pipeline (Commit, Memory-execute, Execute,
//!    Dispatch/Rename, Fetch) driving an instruction queue, predicative
//!    register file, scheduling queue (reservation stations), load-store
//!    buffer, and reorder buffer.
//! 2. **Memory:** a two-level, set-associative, write-back cache hierarchy
//!    with a non-blocking Miss Status Holding Register (MSHR).
//! 3. **ISA:** decoding and execution for the MIPS-32 integer subset.
//! 4. **Simulation:** `Simulator` (owns architectural state + pipeline),
//!    the program/data loader, configuration, and statistics.

/// Common types shared across the simulator (fault/event definitions).
pub mod common;
/// Simulator configuration (defaults, hierarchical config structures).
pub mod config;
/// CPU core: architectural register file, execution units, and pipeline.
pub mod core;
/// Instruction set (encoding, decode, control signals).
pub mod isa;
/// Simulation: `Simulator` and the program/data image loader.
pub mod sim;
/// Simulation statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Top-level simulator; owns architectural state, memory, and the pipeline.
pub use crate::sim::simulator::Simulator;
