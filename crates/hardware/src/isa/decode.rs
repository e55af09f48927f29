//! MIPS-32 instruction decoder.
//!
//! Turns a raw 32-bit instruction word into `ControlSignals`: the set of
//! flags and the resolved ALU operation the rest of the pipeline dispatches
//! on. This, and the ALU in [`crate::core::units::alu`], are the simulator's
//! two external collaborators — `decode` is pure (no pipeline state) and the
//! ALU it feeds is a pure combinational function of its inputs.

use crate::common::error::SimFault;
use crate::isa::instruction::{InstructionBits, sign_extend_imm16};

/// Opcode field values (`instr[31:26]`).
pub mod opcodes {
    /// R-type: operation selected by `funct`.
    pub const R_TYPE: u32 = 0x00;
    /// `j target`.
    pub const J: u32 = 0x02;
    /// `jal target`.
    pub const JAL: u32 = 0x03;
    /// `beq rs, rt, offset`.
    pub const BEQ: u32 = 0x04;
    /// `bne rs, rt, offset`.
    pub const BNE: u32 = 0x05;
    /// `addi rt, rs, imm`.
    pub const ADDI: u32 = 0x08;
    /// `addiu rt, rs, imm`.
    pub const ADDIU: u32 = 0x09;
    /// `slti rt, rs, imm`.
    pub const SLTI: u32 = 0x0A;
    /// `sltiu rt, rs, imm`.
    pub const SLTIU: u32 = 0x0B;
    /// `andi rt, rs, imm`.
    pub const ANDI: u32 = 0x0C;
    /// `ori rt, rs, imm`.
    pub const ORI: u32 = 0x0D;
    /// `xori rt, rs, imm`.
    pub const XORI: u32 = 0x0E;
    /// `lui rt, imm`.
    pub const LUI: u32 = 0x0F;
    /// `lb rt, offset(rs)`.
    pub const LB: u32 = 0x20;
    /// `lh rt, offset(rs)`.
    pub const LH: u32 = 0x21;
    /// `lw rt, offset(rs)`.
    pub const LW: u32 = 0x23;
    /// `sb rt, offset(rs)`.
    pub const SB: u32 = 0x28;
    /// `sh rt, offset(rs)`.
    pub const SH: u32 = 0x29;
    /// `sw rt, offset(rs)`.
    pub const SW: u32 = 0x2B;
}

/// Function-field values (`instr[5:0]`) for R-type (`opcode == 0`) instructions.
pub mod functs {
    /// `sll rd, rt, shamt`.
    pub const SLL: u32 = 0x00;
    /// `srl rd, rt, shamt`.
    pub const SRL: u32 = 0x02;
    /// `sra rd, rt, shamt`.
    pub const SRA: u32 = 0x03;
    /// `sllv rd, rt, rs`.
    pub const SLLV: u32 = 0x04;
    /// `srlv rd, rt, rs`.
    pub const SRLV: u32 = 0x06;
    /// `srav rd, rt, rs`.
    pub const SRAV: u32 = 0x07;
    /// `jr rs`.
    pub const JR: u32 = 0x08;
    /// `add rd, rs, rt`.
    pub const ADD: u32 = 0x20;
    /// `addu rd, rs, rt`.
    pub const ADDU: u32 = 0x21;
    /// `sub rd, rs, rt`.
    pub const SUB: u32 = 0x22;
    /// `subu rd, rs, rt`.
    pub const SUBU: u32 = 0x23;
    /// `and rd, rs, rt`.
    pub const AND: u32 = 0x24;
    /// `or rd, rs, rt`.
    pub const OR: u32 = 0x25;
    /// `xor rd, rs, rt`.
    pub const XOR: u32 = 0x26;
    /// `nor rd, rs, rt`.
    pub const NOR: u32 = 0x27;
    /// `slt rd, rs, rt`.
    pub const SLT: u32 = 0x2A;
    /// `sltu rd, rs, rt`.
    pub const SLTU: u32 = 0x2B;
}

/// ALU operation selected by the decoder for a given instruction.
///
/// Resolved entirely from `opcode`/`funct` at decode time so that the ALU
/// itself stays a pure function of `(op, a, b)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AluOp {
    /// `a + b`. Covers `add`/`addu`/`addi`/`addiu` and address computation.
    #[default]
    Add,
    /// `a - b`. Covers `sub`/`subu` and branch-comparison subtraction.
    Sub,
    /// `a & b`.
    And,
    /// `a | b`.
    Or,
    /// `a ^ b`.
    Xor,
    /// `!(a | b)`.
    Nor,
    /// Signed `a < b`.
    Slt,
    /// Unsigned `a < b`.
    Sltu,
    /// Fixed shift left logical: `a` is the value, `b` is `shamt`.
    Sll,
    /// Fixed shift right logical: `a` is the value, `b` is `shamt`.
    Srl,
    /// Fixed shift right arithmetic: `a` is the value, `b` is `shamt`.
    Sra,
    /// Variable shift left logical: `a` is `shamt` (from a register), `b` is the value.
    Sllv,
    /// Variable shift right logical: `a` is `shamt` (from a register), `b` is the value.
    Srlv,
    /// Variable shift right arithmetic: `a` is `shamt` (from a register), `b` is the value.
    Srav,
    /// `b << 16`; `a` is unused. Used by `lui`.
    Lui,
}

/// Decoded control signals for one instruction, per spec §6's `Decoder` collaborator.
#[derive(Clone, Copy, Debug, Default)]
pub struct ControlSignals {
    /// ALU operation to perform at execute.
    pub alu_op: AluOp,
    /// When true, the ALU's second operand is the (sign/zero-extended) immediate
    /// rather than `rt`'s value.
    pub alu_src: bool,
    /// Load: read memory at the computed address.
    pub mem_read: bool,
    /// Store: write memory at the computed address.
    pub mem_write: bool,
    /// Instruction writes an architectural register.
    pub reg_write: bool,
    /// When true, the destination register is `rd` (R-type); otherwise `rt`.
    pub reg_dest: bool,
    /// `beq`/`bne`.
    pub branch: bool,
    /// Branch is `bne` (not-equal) rather than `beq` (equal).
    pub bne: bool,
    /// `j`/`jal`: unconditional direct jump.
    pub jump: bool,
    /// `jr`: jump to the value in `rs`.
    pub jump_reg: bool,
    /// `jal`: link `pc+8` into register 31.
    pub link: bool,
    /// Immediate is zero-extended rather than sign-extended (`andi`/`ori`/`xori`/`lui`).
    pub zero_extend: bool,
    /// Memory access is halfword-wide.
    pub halfword: bool,
    /// Memory access is byte-wide.
    pub byte: bool,
    /// R-type shift with a fixed `shamt` operand (`sll`/`srl`/`sra`).
    pub shift: bool,
}

/// Decodes a 32-bit MIPS-32 instruction word into `ControlSignals`.
///
/// # Errors
///
/// Returns `SimFault::IllegalInstruction` if `opcode` (or `funct`, for
/// R-type) does not match any instruction in the supported integer subset.
pub fn decode(pc: u32, instr: u32) -> Result<ControlSignals, SimFault> {
    let opcode = instr.opcode();
    let mut ctrl = ControlSignals::default();

    match opcode {
        opcodes::R_TYPE => {
            let funct = instr.funct();
            ctrl.reg_dest = true;
            ctrl.reg_write = true;
            match funct {
                functs::SLL => {
                    ctrl.alu_op = AluOp::Sll;
                    ctrl.shift = true;
                }
                functs::SRL => {
                    ctrl.alu_op = AluOp::Srl;
                    ctrl.shift = true;
                }
                functs::SRA => {
                    ctrl.alu_op = AluOp::Sra;
                    ctrl.shift = true;
                }
                functs::SLLV => ctrl.alu_op = AluOp::Sllv,
                functs::SRLV => ctrl.alu_op = AluOp::Srlv,
                functs::SRAV => ctrl.alu_op = AluOp::Srav,
                functs::ADD | functs::ADDU => ctrl.alu_op = AluOp::Add,
                functs::SUB | functs::SUBU => ctrl.alu_op = AluOp::Sub,
                functs::AND => ctrl.alu_op = AluOp::And,
                functs::OR => ctrl.alu_op = AluOp::Or,
                functs::XOR => ctrl.alu_op = AluOp::Xor,
                functs::NOR => ctrl.alu_op = AluOp::Nor,
                functs::SLT => ctrl.alu_op = AluOp::Slt,
                functs::SLTU => ctrl.alu_op = AluOp::Sltu,
                functs::JR => {
                    ctrl.jump_reg = true;
                    ctrl.reg_write = false;
                }
                _ => {
                    return Err(SimFault::IllegalInstruction {
                        pc,
                        instruction: instr,
                    });
                }
            }
        }
        opcodes::J => ctrl.jump = true,
        opcodes::JAL => {
            ctrl.jump = true;
            ctrl.link = true;
            ctrl.reg_write = true;
        }
        opcodes::BEQ => ctrl.branch = true,
        opcodes::BNE => {
            ctrl.branch = true;
            ctrl.bne = true;
        }
        opcodes::ADDI | opcodes::ADDIU => {
            ctrl.alu_op = AluOp::Add;
            ctrl.alu_src = true;
            ctrl.reg_write = true;
        }
        opcodes::SLTI => {
            ctrl.alu_op = AluOp::Slt;
            ctrl.alu_src = true;
            ctrl.reg_write = true;
        }
        opcodes::SLTIU => {
            ctrl.alu_op = AluOp::Sltu;
            ctrl.alu_src = true;
            ctrl.reg_write = true;
        }
        opcodes::ANDI => {
            ctrl.alu_op = AluOp::And;
            ctrl.alu_src = true;
            ctrl.zero_extend = true;
            ctrl.reg_write = true;
        }
        opcodes::ORI => {
            ctrl.alu_op = AluOp::Or;
            ctrl.alu_src = true;
            ctrl.zero_extend = true;
            ctrl.reg_write = true;
        }
        opcodes::XORI => {
            ctrl.alu_op = AluOp::Xor;
            ctrl.alu_src = true;
            ctrl.zero_extend = true;
            ctrl.reg_write = true;
        }
        opcodes::LUI => {
            ctrl.alu_op = AluOp::Lui;
            ctrl.alu_src = true;
            ctrl.zero_extend = true;
            ctrl.reg_write = true;
        }
        opcodes::LW => {
            ctrl.alu_op = AluOp::Add;
            ctrl.alu_src = true;
            ctrl.mem_read = true;
            ctrl.reg_write = true;
        }
        opcodes::LH => {
            ctrl.alu_op = AluOp::Add;
            ctrl.alu_src = true;
            ctrl.mem_read = true;
            ctrl.reg_write = true;
            ctrl.halfword = true;
        }
        opcodes::LB => {
            ctrl.alu_op = AluOp::Add;
            ctrl.alu_src = true;
            ctrl.mem_read = true;
            ctrl.reg_write = true;
            ctrl.byte = true;
        }
        opcodes::SW => {
            ctrl.alu_op = AluOp::Add;
            ctrl.alu_src = true;
            ctrl.mem_write = true;
        }
        opcodes::SH => {
            ctrl.alu_op = AluOp::Add;
            ctrl.alu_src = true;
            ctrl.mem_write = true;
            ctrl.halfword = true;
        }
        opcodes::SB => {
            ctrl.alu_op = AluOp::Add;
            ctrl.alu_src = true;
            ctrl.mem_write = true;
            ctrl.byte = true;
        }
        _ => {
            return Err(SimFault::IllegalInstruction {
                pc,
                instruction: instr,
            });
        }
    }

    Ok(ctrl)
}

/// Resolves an I-type immediate per `zero_extend`: sign-extend by default,
/// zero-extend for `andi`/`ori`/`xori`/`lui`.
#[must_use]
pub fn resolve_immediate(instr: u32, zero_extend: bool) -> u32 {
    if zero_extend {
        instr.imm_raw()
    } else {
        sign_extend_imm16(instr.imm_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r_type(rs: u32, rt: u32, rd: u32, shamt: u32, funct: u32) -> u32 {
        (rs << 21) | (rt << 16) | (rd << 11) | (shamt << 6) | funct
    }

    fn i_type(opcode: u32, rs: u32, rt: u32, imm: u32) -> u32 {
        (opcode << 26) | (rs << 21) | (rt << 16) | (imm & 0xFFFF)
    }

    #[test]
    fn decodes_add() {
        let word = r_type(1, 2, 3, 0, functs::ADD);
        let ctrl = decode(0, word).unwrap();
        assert_eq!(ctrl.alu_op, AluOp::Add);
        assert!(ctrl.reg_write);
        assert!(ctrl.reg_dest);
        assert!(!ctrl.alu_src);
    }

    #[test]
    fn decodes_addi_sign_extends() {
        let word = i_type(opcodes::ADDI, 1, 2, 0xFFFF);
        let ctrl = decode(0, word).unwrap();
        assert_eq!(ctrl.alu_op, AluOp::Add);
        assert!(ctrl.alu_src);
        assert!(!ctrl.zero_extend);
        assert_eq!(resolve_immediate(word, ctrl.zero_extend), 0xFFFF_FFFF);
    }

    #[test]
    fn decodes_andi_zero_extends() {
        let word = i_type(opcodes::ANDI, 1, 2, 0xFFFF);
        let ctrl = decode(0, word).unwrap();
        assert!(ctrl.zero_extend);
        assert_eq!(resolve_immediate(word, ctrl.zero_extend), 0xFFFF);
    }

    #[test]
    fn decodes_lw_as_byte_or_halfword_or_word() {
        let lw = decode(0, i_type(opcodes::LW, 1, 2, 0)).unwrap();
        assert!(lw.mem_read && !lw.byte && !lw.halfword);
        let lh = decode(0, i_type(opcodes::LH, 1, 2, 0)).unwrap();
        assert!(lh.mem_read && lh.halfword);
        let lb = decode(0, i_type(opcodes::LB, 1, 2, 0)).unwrap();
        assert!(lb.mem_read && lb.byte);
    }

    #[test]
    fn decodes_jr_and_jal() {
        let jr = decode(0, r_type(5, 0, 0, 0, functs::JR)).unwrap();
        assert!(jr.jump_reg);
        assert!(!jr.reg_write);

        let jal = decode(0, (opcodes::JAL << 26) | 0x10).unwrap();
        assert!(jal.jump && jal.link && jal.reg_write);
    }

    #[test]
    fn rejects_unknown_opcode() {
        let word = (0x3F_u32) << 26;
        assert!(decode(0x1000, word).is_err());
    }

    #[test]
    fn rejects_unknown_r_type_funct() {
        let word = r_type(1, 2, 3, 0, 0x3F);
        assert!(decode(0x2000, word).is_err());
    }
}
