//! Scheduling queue: the ALU reservation stations.
//!
//! An unordered pool of slots waiting for their operands to arrive by tag
//! broadcast. A slot's index doubles as the producer tag consumers rename
//! against, per the shared tag namespace (tags `[0, SQ_SIZE)`).

use crate::isa::decode::AluOp;

/// One operand: either already valid, or waiting on a producer tag.
#[derive(Clone, Copy, Debug, Default)]
pub struct Operand {
    /// True once `value` holds the operand's final value.
    pub valid: bool,
    /// Producer tag this operand is waiting on, when not valid.
    pub tag: u32,
    /// Operand value, meaningful only when valid.
    pub value: u32,
}

impl Operand {
    /// An operand that is already resolved (a constant, or `$zero`).
    #[must_use]
    pub fn ready(value: u32) -> Self {
        Self {
            valid: true,
            tag: 0,
            value,
        }
    }

    /// An operand waiting on `tag`'s broadcast.
    #[must_use]
    pub fn pending(tag: u32) -> Self {
        Self {
            valid: false,
            tag,
            value: 0,
        }
    }
}

/// The decoded operation this slot will perform once its operands arrive.
#[derive(Clone, Copy, Debug)]
pub struct SqControl {
    /// ALU operation to apply to the two operands.
    pub alu_op: AluOp,
    /// True if this slot belongs to a load or store (its result is an
    /// address, not a register value).
    pub is_memory: bool,
    /// `jr`: result is unused, but the slot still waits on its one operand
    /// (the jump target) to resolve the actually-taken address.
    pub jump_reg: bool,
    /// `beq`/`bne`.
    pub branch: bool,
    /// Branch is `bne` rather than `beq`.
    pub bne: bool,
}

/// A scheduling-queue slot.
#[derive(Clone, Copy, Debug)]
struct SqSlot {
    allocated: bool,
    operand1: Operand,
    operand2: Operand,
    rob_id: u32,
    ctrl: SqControl,
}

impl Default for SqSlot {
    fn default() -> Self {
        Self {
            allocated: false,
            operand1: Operand::default(),
            operand2: Operand::default(),
            rob_id: 0,
            ctrl: SqControl {
                alu_op: AluOp::Add,
                is_memory: false,
                jump_reg: false,
                branch: false,
                bne: false,
            },
        }
    }
}

/// The scheduling queue: `SQ_SIZE` reservation-station slots.
pub struct SchedulingQueue {
    slots: Vec<SqSlot>,
}

/// A slot ready to execute, along with everything needed to compute and
/// broadcast its result.
pub struct ReadyEntry {
    /// The slot's index, i.e. its producer tag.
    pub tag: u32,
    /// First resolved operand.
    pub operand1: u32,
    /// Second resolved operand.
    pub operand2: u32,
    /// Owning ROB entry.
    pub rob_id: u32,
    /// Decoded operation.
    pub ctrl: SqControl,
}

impl SchedulingQueue {
    /// Creates an empty queue with `capacity` slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![SqSlot::default(); capacity],
        }
    }

    /// Number of allocated slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.allocated).count()
    }

    /// True if every slot is allocated; dispatch must stall.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|s| s.allocated)
    }

    /// Allocates the lowest free slot, returning its index (the producer
    /// tag). Caller must check [`SchedulingQueue::is_full`] first.
    pub fn allocate(
        &mut self,
        operand1: Operand,
        operand2: Operand,
        rob_id: u32,
        ctrl: SqControl,
    ) -> u32 {
        let idx = self
            .slots
            .iter()
            .position(|s| !s.allocated)
            .expect("allocate called on a full scheduling queue");
        self.slots[idx] = SqSlot {
            allocated: true,
            operand1,
            operand2,
            rob_id,
            ctrl,
        };
        idx as u32
    }

    /// Applies a tag broadcast to any operand slots waiting on it.
    pub fn broadcast(&mut self, tag: u32, value: u32) {
        for slot in &mut self.slots {
            if !slot.allocated {
                continue;
            }
            if !slot.operand1.valid && slot.operand1.tag == tag {
                slot.operand1.valid = true;
                slot.operand1.value = value;
            }
            if !slot.operand2.valid && slot.operand2.tag == tag {
                slot.operand2.valid = true;
                slot.operand2.value = value;
            }
        }
    }

    /// Finds and deallocates the lowest-index slot with both operands
    /// ready, returning what's needed to execute and broadcast it. Callers
    /// invoke this up to `W` times per cycle.
    pub fn take_ready(&mut self) -> Option<ReadyEntry> {
        let idx = self
            .slots
            .iter()
            .position(|s| s.allocated && s.operand1.valid && s.operand2.valid)?;
        let slot = self.slots[idx];
        self.slots[idx].allocated = false;
        Some(ReadyEntry {
            tag: idx as u32,
            operand1: slot.operand1.value,
            operand2: slot.operand2.value,
            rob_id: slot.rob_id,
            ctrl: slot.ctrl,
        })
    }

    /// Deallocates every slot. Used on a commit-time flush.
    pub fn flush(&mut self) {
        for slot in &mut self.slots {
            slot.allocated = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_ctrl() -> SqControl {
        SqControl {
            alu_op: AluOp::Add,
            is_memory: false,
            jump_reg: false,
            branch: false,
            bne: false,
        }
    }

    #[test]
    fn allocate_returns_index_as_tag() {
        let mut sq = SchedulingQueue::new(4);
        let tag = sq.allocate(Operand::ready(1), Operand::ready(2), 0, add_ctrl());
        assert_eq!(tag, 0);
    }

    #[test]
    fn ready_entry_only_available_once_both_operands_valid() {
        let mut sq = SchedulingQueue::new(4);
        sq.allocate(Operand::ready(1), Operand::pending(9), 0, add_ctrl());
        assert!(sq.take_ready().is_none());
        sq.broadcast(9, 41);
        let ready = sq.take_ready().unwrap();
        assert_eq!(ready.operand1, 1);
        assert_eq!(ready.operand2, 41);
    }

    #[test]
    fn take_ready_picks_lowest_index_first() {
        let mut sq = SchedulingQueue::new(4);
        sq.allocate(Operand::ready(1), Operand::ready(1), 0, add_ctrl());
        sq.allocate(Operand::ready(2), Operand::ready(2), 1, add_ctrl());
        let first = sq.take_ready().unwrap();
        assert_eq!(first.tag, 0);
    }

    #[test]
    fn is_full_when_all_slots_allocated() {
        let mut sq = SchedulingQueue::new(2);
        sq.allocate(Operand::ready(0), Operand::ready(0), 0, add_ctrl());
        sq.allocate(Operand::ready(0), Operand::ready(0), 1, add_ctrl());
        assert!(sq.is_full());
    }

    #[test]
    fn flush_frees_every_slot() {
        let mut sq = SchedulingQueue::new(2);
        sq.allocate(Operand::ready(0), Operand::ready(0), 0, add_ctrl());
        sq.flush();
        assert!(!sq.is_full());
        assert_eq!(sq.len(), 0);
    }
}
