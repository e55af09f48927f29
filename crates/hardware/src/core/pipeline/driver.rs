//! Out-of-order engine: ties the instruction queue, scheduling queue,
//! load-store buffer, reorder buffer, predicative register file, and branch
//! predictor together into one cycle.
//!
//! Each [`O3Engine::tick`] runs five phases in a fixed order so that a
//! producer's result is visible to a same-cycle consumer in a later phase:
//! Commit, Memory-execute, Execute, Dispatch/Rename, Fetch. A sixth,
//! earlier step — [`crate::core::units::cache::Memory::tick`] plus draining
//! whatever it resolved into the instruction queue and load-store buffer —
//! runs before any of the five.

use crate::common::error::SimFault;
use crate::core::arch::ArchRegisterFile;
use crate::core::pipeline::iq::InstructionQueue;
use crate::core::pipeline::lsb::{LoadStoreBuffer, TagOrValue};
use crate::core::pipeline::predicative_rf::PredicativeRegisterFile;
use crate::core::pipeline::rob::{BranchInfo, ReorderBuffer, RobFlags};
use crate::core::pipeline::sq::{Operand, SchedulingQueue, SqControl};
use crate::core::units::alu::Alu;
use crate::core::units::bru::BranchPredictor;
use crate::core::units::cache::Memory;
use crate::isa::decode::{decode, resolve_immediate, AluOp};
use crate::isa::instruction::InstructionBits;

/// What happened during one [`O3Engine::tick`], for the simulator's
/// statistics to fold in.
#[derive(Clone, Copy, Debug, Default)]
pub struct CycleReport {
    /// Instructions that retired (committed) this cycle.
    pub committed: u32,
    /// Branches or jumps whose commit triggered a pipeline flush.
    pub mispredicts: u32,
}

/// The out-of-order pipeline core: every structural buffer plus the program
/// counter driving fetch.
pub struct O3Engine {
    width: usize,
    current_pc: u32,
    iq: InstructionQueue,
    sq: SchedulingQueue,
    lsb: LoadStoreBuffer,
    rob: ReorderBuffer,
    rf: PredicativeRegisterFile,
    predictor: BranchPredictor,
}

impl O3Engine {
    /// Builds the engine's buffers at the given sizes, fetch starting at `start_pc`.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        start_pc: u32,
        width: usize,
        iq_size: usize,
        sq_size: usize,
        lsb_size: usize,
        rob_size: usize,
        bht_size: usize,
        btb_size: usize,
    ) -> Self {
        Self {
            width,
            current_pc: start_pc,
            iq: InstructionQueue::new(iq_size),
            sq: SchedulingQueue::new(sq_size),
            lsb: LoadStoreBuffer::new(lsb_size),
            rob: ReorderBuffer::new(rob_size),
            rf: PredicativeRegisterFile::new(),
            predictor: BranchPredictor::new(bht_size, btb_size),
        }
    }

    /// True once every buffer has drained: no in-flight work remains.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.rob.len() == 0 && self.sq.len() == 0 && self.lsb.len() == 0 && self.iq.len() == 0
    }

    /// Applies a tag broadcast to every structure that renames against the
    /// shared tag namespace.
    fn broadcast(&mut self, tag: u32, value: u32) {
        self.rf.broadcast(tag, value);
        self.sq.broadcast(tag, value);
        self.lsb.broadcast(tag, value);
    }

    /// Reads register `reg` through the rename map, as an [`Operand`] ready
    /// to hand a scheduling-queue slot.
    fn read_operand(&self, reg: usize) -> Operand {
        let entry = self.rf.read(reg);
        if entry.valid {
            Operand::ready(entry.value)
        } else {
            Operand::pending(entry.tag)
        }
    }

    /// Advances the whole engine by one cycle. `memory` has already been
    /// ticked by the caller; this drains whatever it resolved before running
    /// the five ordered phases.
    ///
    /// # Errors
    ///
    /// Returns the decoder's [`SimFault`] if dispatch pops an instruction
    /// word it cannot decode. The caller should stop the run; pipeline state
    /// at that point is not rolled back to anything meaningful.
    pub fn tick(&mut self, memory: &mut Memory, arch: &mut ArchRegisterFile) -> Result<CycleReport, SimFault> {
        self.iq.poll_pending(memory);
        for completion in self.lsb.poll_pending(memory) {
            self.broadcast(completion.tag, completion.value);
            self.rob.complete_execution(completion.rob_id, completion.value);
        }

        let mut report = CycleReport::default();
        self.commit_phase(memory, arch, &mut report);
        self.memory_execute_phase(memory);
        self.execute_phase();
        self.dispatch_phase()?;
        self.fetch_phase(memory);

        Ok(report)
    }

    fn commit_phase(&mut self, memory: &mut Memory, arch: &mut ArchRegisterFile, report: &mut CycleReport) {
        let events = self.rob.commit(self.width, memory, arch);
        report.committed += events.len() as u32;
        for event in &events {
            self.lsb.complete_store(event.rob_id);
            if let Some((pc, taken, target)) = event.branch_update {
                self.predictor.update(pc, taken, target);
            }
            if let Some(flush_to) = event.flush_to {
                report.mispredicts += 1;
                self.iq.flush();
                self.rf.sync_from_architectural(arch);
                self.rob.flush();
                self.lsb.flush();
                self.sq.flush();
                self.current_pc = flush_to;
            }
        }
    }

    fn memory_execute_phase(&mut self, memory: &mut Memory) {
        for _ in 0..self.width {
            self.lsb.retire_completed();
            for (rob_id, address, value) in self.lsb.ready_stores() {
                self.rob.mark_store_ready(rob_id, address, value);
            }
            let Some(completion) = self.lsb.issue_ready_load(memory) else {
                continue;
            };
            self.broadcast(completion.tag, completion.value);
            self.rob.complete_execution(completion.rob_id, completion.value);
        }
    }

    fn execute_phase(&mut self) {
        for _ in 0..self.width {
            let Some(ready) = self.sq.take_ready() else {
                break;
            };
            let alu_result = Alu::execute(ready.ctrl.alu_op, ready.operand1, ready.operand2);
            self.broadcast(ready.tag, alu_result);

            if ready.ctrl.branch {
                // beq/bne resolve by equality, never by the ALU op the
                // decoder assigned them (which is the shared default, Add,
                // and irrelevant here).
                let zero = ready.operand1 == ready.operand2;
                let taken = if ready.ctrl.bne { !zero } else { zero };
                self.rob.resolve_branch(ready.rob_id, taken);
            } else if ready.ctrl.jump_reg {
                self.rob.resolve_jump_reg(ready.rob_id, alu_result);
            } else if !ready.ctrl.is_memory {
                self.rob.complete_execution(ready.rob_id, alu_result);
            }
            // Memory ops: `alu_result` is the computed address, already
            // broadcast above onto the load/store's address tag; the
            // reorder buffer learns about them later, via mark_store_ready
            // or a load completion.
        }
    }

    fn dispatch_phase(&mut self) -> Result<(), SimFault> {
        for _ in 0..self.width {
            if self.rob.is_full() || self.sq.is_full() || self.lsb.is_full() {
                break;
            }
            let Some(entry) = self.iq.pop() else {
                break;
            };
            self.dispatch_one(entry.instruction, entry.pc, entry.predicted_next_pc, entry.predicted_taken)?;
        }
        Ok(())
    }

    fn dispatch_one(
        &mut self,
        instruction: u32,
        pc: u32,
        predicted_next_pc: u32,
        predicted_taken: bool,
    ) -> Result<(), SimFault> {
        let ctrl = decode(pc, instruction)?;
        let rs = instruction.rs();
        let rt = instruction.rt();
        let rd = instruction.rd();
        let shamt = instruction.shamt();
        let addr26 = instruction.addr26();
        let imm = resolve_immediate(instruction, ctrl.zero_extend);
        let dest_reg = if ctrl.link {
            31
        } else if ctrl.reg_dest {
            rd
        } else {
            rt
        };

        // Direct jump target: MIPS-32's `j`/`jal` splice the top four bits
        // of the next sequential PC with the shifted 26-bit field.
        let direct_target = (pc.wrapping_add(4) & 0xF000_0000) | (addr26 << 2);

        if ctrl.jump && !ctrl.jump_reg {
            let flags = RobFlags {
                jump: predicted_taken,
                reg_write: ctrl.link,
                ..RobFlags::default()
            };
            let rob_id = self.rob.allocate(
                pc,
                31,
                flags,
                BranchInfo { is_branch_or_jump: true },
                pc.wrapping_add(8),
                direct_target,
                false,
            );
            if ctrl.link {
                // The link value is known outright; it never needs a
                // scheduling-queue producer.
                self.rf.write_resolved(31, pc.wrapping_add(8));
            }
            // Always actually taken: resolve immediately rather than wait
            // on an operand that doesn't exist.
            self.rob.resolve_branch(rob_id, true);
            return Ok(());
        }

        if ctrl.branch {
            let target = pc.wrapping_add(4).wrapping_add(imm << 2);
            let flags = RobFlags {
                jump: predicted_taken,
                ..RobFlags::default()
            };
            let rob_id = self.rob.allocate(
                pc,
                0,
                flags,
                BranchInfo { is_branch_or_jump: true },
                0,
                target,
                false,
            );
            let op1 = self.read_operand(rs);
            let op2 = self.read_operand(rt);
            let sq_ctrl = SqControl {
                alu_op: AluOp::Add,
                is_memory: false,
                jump_reg: false,
                branch: true,
                bne: ctrl.bne,
            };
            self.sq.allocate(op1, op2, rob_id, sq_ctrl);
            return Ok(());
        }

        if ctrl.jump_reg {
            let flags = RobFlags {
                jump: predicted_taken,
                ..RobFlags::default()
            };
            let rob_id = self.rob.allocate(
                pc,
                0,
                flags,
                BranchInfo { is_branch_or_jump: true },
                0,
                predicted_next_pc,
                false,
            );
            let op1 = self.read_operand(rs);
            let sq_ctrl = SqControl {
                alu_op: AluOp::Add,
                is_memory: false,
                jump_reg: true,
                branch: false,
                bne: false,
            };
            self.sq.allocate(op1, Operand::ready(0), rob_id, sq_ctrl);
            return Ok(());
        }

        if ctrl.mem_read {
            let op1 = self.read_operand(rs);
            let op2 = Operand::ready(imm);
            let flags = RobFlags {
                reg_write: true,
                halfword: ctrl.halfword,
                byte: ctrl.byte,
                ..RobFlags::default()
            };
            let rob_id = self.rob.allocate(pc, dest_reg, flags, BranchInfo::default(), 0, 0, false);
            let sq_ctrl = SqControl {
                alu_op: AluOp::Add,
                is_memory: true,
                jump_reg: false,
                branch: false,
                bne: false,
            };
            let addr_tag = self.sq.allocate(op1, op2, rob_id, sq_ctrl);
            let load_tag = self.lsb.allocate_load(
                TagOrValue { valid: false, tag: addr_tag, value: 0 },
                ctrl.byte,
                ctrl.halfword,
                rob_id,
            );
            self.rf.set_tag(dest_reg, load_tag);
            return Ok(());
        }

        if ctrl.mem_write {
            let op1 = self.read_operand(rs);
            let op2 = Operand::ready(imm);
            let flags = RobFlags {
                mem_write: true,
                halfword: ctrl.halfword,
                byte: ctrl.byte,
                ..RobFlags::default()
            };
            let rob_id = self.rob.allocate(pc, 0, flags, BranchInfo::default(), 0, 0, false);
            let sq_ctrl = SqControl {
                alu_op: AluOp::Add,
                is_memory: true,
                jump_reg: false,
                branch: false,
                bne: false,
            };
            let addr_tag = self.sq.allocate(op1, op2, rob_id, sq_ctrl);
            let value = self.read_operand(rt);
            self.lsb.allocate_store(
                TagOrValue { valid: false, tag: addr_tag, value: 0 },
                TagOrValue { valid: value.valid, tag: value.tag, value: value.value },
                ctrl.byte,
                ctrl.halfword,
                rob_id,
            );
            return Ok(());
        }

        // Ordinary ALU op: R-type register-register, or an I-type
        // arithmetic/logical immediate.
        let op1 = if ctrl.shift { Operand::ready(shamt) } else { self.read_operand(rs) };
        let op2 = if ctrl.alu_src { Operand::ready(imm) } else { self.read_operand(rt) };
        let flags = RobFlags {
            reg_write: ctrl.reg_write,
            ..RobFlags::default()
        };
        let rob_id = self.rob.allocate(pc, dest_reg, flags, BranchInfo::default(), 0, 0, false);
        let sq_ctrl = SqControl {
            alu_op: ctrl.alu_op,
            is_memory: false,
            jump_reg: false,
            branch: false,
            bne: false,
        };
        let tag = self.sq.allocate(op1, op2, rob_id, sq_ctrl);
        if ctrl.reg_write {
            self.rf.set_tag(dest_reg, tag);
        }
        Ok(())
    }

    fn fetch_phase(&mut self, memory: &mut Memory) {
        for _ in 0..self.width {
            if self.iq.is_full() {
                break;
            }
            let pc = self.current_pc;
            let (taken, target) = self.predictor.predict(pc);
            match memory.access(pc, false, 0) {
                Some(word) => self.iq.put(word, pc, false, target, taken),
                None => self.iq.put(0, pc, true, target, taken),
            }
            self.current_pc = if taken { target } else { pc.wrapping_add(4) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::isa::decode::{functs, opcodes};

    fn r_type(rs: u32, rt: u32, rd: u32, shamt: u32, funct: u32) -> u32 {
        (rs << 21) | (rt << 16) | (rd << 11) | (shamt << 6) | funct
    }

    fn i_type(opcode: u32, rs: u32, rt: u32, imm: u32) -> u32 {
        (opcode << 26) | (rs << 21) | (rt << 16) | (imm & 0xFFFF)
    }

    fn new_engine() -> O3Engine {
        O3Engine::new(0, 5, 30, 50, 20, 50, 1024, 1024)
    }

    fn new_memory() -> Memory {
        Memory::new(&CacheConfig::default(), &CacheConfig::default(), 1 << 16)
    }

    fn run_until_idle(engine: &mut O3Engine, memory: &mut Memory, arch: &mut ArchRegisterFile, max_cycles: u32) {
        for _ in 0..max_cycles {
            memory.tick();
            engine.tick(memory, arch).unwrap();
            if engine.is_idle() && arch.pc() != 0 {
                break;
            }
        }
    }

    #[test]
    fn runs_a_straight_line_add_sequence_to_completion() {
        let mut engine = new_engine();
        let mut memory = new_memory();
        let mut arch = ArchRegisterFile::new(0);

        // addi $1, $0, 5
        memory.words_mut()[0] = i_type(opcodes::ADDI, 0, 1, 5);
        // addi $2, $0, 7
        memory.words_mut()[1] = i_type(opcodes::ADDI, 0, 2, 7);
        // add $3, $1, $2
        memory.words_mut()[2] = r_type(1, 2, 3, 0, functs::ADD);
        // an illegal word past the program stops the run cleanly in caller code;
        // here we just run a fixed number of cycles and check commits happened.
        for _ in 0..200 {
            memory.tick();
            let _ = engine.tick(&mut memory, &mut arch);
        }
        assert_eq!(arch.read(1), 5);
        assert_eq!(arch.read(2), 7);
        assert_eq!(arch.read(3), 12);
    }

    #[test]
    fn stores_then_loads_the_same_address() {
        let mut engine = new_engine();
        let mut memory = new_memory();
        let mut arch = ArchRegisterFile::new(0);

        // addi $1, $0, 0x100   ; address
        memory.words_mut()[0] = i_type(opcodes::ADDI, 0, 1, 0x100);
        // addi $2, $0, 99      ; value
        memory.words_mut()[1] = i_type(opcodes::ADDI, 0, 2, 99);
        // sw $2, 0($1)
        memory.words_mut()[2] = i_type(opcodes::SW, 1, 2, 0);
        // lw $3, 0($1)
        memory.words_mut()[3] = i_type(opcodes::LW, 1, 3, 0);

        for _ in 0..400 {
            memory.tick();
            let _ = engine.tick(&mut memory, &mut arch);
        }
        assert_eq!(arch.read(3), 99);
    }

    #[test]
    fn mispredicted_branch_flushes_and_redirects() {
        let mut engine = new_engine();
        let mut memory = new_memory();
        let mut arch = ArchRegisterFile::new(0);

        // beq $0, $0, 2   ; always taken, target = pc+4+(2<<2) = pc+12
        memory.words_mut()[0] = i_type(opcodes::BEQ, 0, 0, 2);
        // addi $1, $0, 1  ; squashed, on the not-taken path
        memory.words_mut()[1] = i_type(opcodes::ADDI, 0, 1, 1);
        // addi $2, $0, 2  ; squashed, on the not-taken path
        memory.words_mut()[2] = i_type(opcodes::ADDI, 0, 2, 2);
        // addi $3, $0, 3  ; the actual branch target
        memory.words_mut()[3] = i_type(opcodes::ADDI, 0, 3, 3);

        for _ in 0..400 {
            memory.tick();
            let _ = engine.tick(&mut memory, &mut arch);
        }
        assert_eq!(arch.read(1), 0);
        assert_eq!(arch.read(2), 0);
        assert_eq!(arch.read(3), 3);
    }

    #[test]
    fn jal_links_return_address_without_a_scheduling_queue_wait() {
        let mut engine = new_engine();
        let mut memory = new_memory();
        let mut arch = ArchRegisterFile::new(0);

        // jal 4  (target = ((0+4)&0xF0000000)|(4<<2) = 16)
        memory.words_mut()[0] = i_type(opcodes::JAL, 0, 0, 0) | 4;
        for _ in 0..100 {
            memory.tick();
            let _ = engine.tick(&mut memory, &mut arch);
        }
        assert_eq!(arch.read(31), 8);
    }

    #[test]
    fn fixed_shift_shifts_the_register_value_by_shamt_not_the_reverse() {
        let mut engine = new_engine();
        let mut memory = new_memory();
        let mut arch = ArchRegisterFile::new(0);

        // addi $2, $0, 1
        memory.words_mut()[0] = i_type(opcodes::ADDI, 0, 2, 1);
        // sll $3, $2, 4   ; $3 = $2 << 4 = 0x10, not shamt << value = 4
        memory.words_mut()[1] = r_type(0, 2, 3, 4, functs::SLL);
        // addi $4, $0, -8
        memory.words_mut()[2] = i_type(opcodes::ADDI, 0, 4, (-8_i16) as u32);
        // sra $5, $4, 1   ; $5 = $4 >> 1 (arithmetic) = -4
        memory.words_mut()[3] = r_type(0, 4, 5, 1, functs::SRA);

        for _ in 0..400 {
            memory.tick();
            let _ = engine.tick(&mut memory, &mut arch);
        }
        assert_eq!(arch.read(3), 0x10);
        assert_eq!(arch.read(5) as i32, -4);
    }

    #[test]
    fn illegal_instruction_is_reported_as_a_fault() {
        let mut engine = new_engine();
        let mut memory = new_memory();
        let mut arch = ArchRegisterFile::new(0);
        memory.words_mut()[0] = 0x3F << 26;

        let mut saw_fault = false;
        for _ in 0..100 {
            memory.tick();
            if engine.tick(&mut memory, &mut arch).is_err() {
                saw_fault = true;
                break;
            }
        }
        assert!(saw_fault);
    }
}
