//! ALU logical and comparison operations.
//!
//! Implements bitwise OR/AND/XOR/NOR and signed/unsigned set-less-than.
//! All operands and results are plain 32-bit words.

use crate::isa::decode::AluOp;

/// Executes a logical or comparison operation.
///
/// Returns `0` for non-logic opcodes.
#[must_use]
pub fn execute(op: AluOp, a: u32, b: u32) -> u32 {
    match op {
        AluOp::Or => a | b,
        AluOp::And => a & b,
        AluOp::Xor => a ^ b,
        AluOp::Nor => !(a | b),
        AluOp::Slt => u32::from((a as i32) < (b as i32)),
        AluOp::Sltu => u32::from(a < b),
        _ => 0,
    }
}
