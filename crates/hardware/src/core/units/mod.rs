//! Execution units and functional components.
//!
//! This module contains the ALU, the branch predictor (BHT + BTB), and the
//! two-level cache hierarchy with its non-blocking miss handling.

/// Arithmetic Logic Unit for integer operations.
pub mod alu;

/// Branch predictor: branch history table and branch target buffer.
pub mod bru;

/// Two-level set-associative write-back cache hierarchy with MSHR.
pub mod cache;
