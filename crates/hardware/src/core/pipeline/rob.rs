//! Reorder buffer: in-order commit and precise speculative recovery.
//!
//! Entries are allocated in program order at dispatch and retired in the
//! same order at commit, once the head is `executed` and not `pending`
//! (awaiting an outstanding store write). A branch/jump entry whose
//! resolved outcome disagreed with its prediction carries `flush = true`;
//! committing it discards all younger speculative state.

use crate::core::units::cache::Memory;
use crate::core::ArchRegisterFile;

/// Flags carried by a ROB entry describing what commit must do with it.
#[derive(Clone, Copy, Debug, Default)]
pub struct RobFlags {
    /// Commit must issue a memory write of `value` to `address`.
    pub mem_write: bool,
    /// Commit must write `value` into architectural register `dest_reg`.
    pub reg_write: bool,
    /// This is a halfword-width memory access (informational/statistics).
    pub halfword: bool,
    /// This is a byte-width memory access (informational/statistics).
    pub byte: bool,
    /// This is a branch/jump; `address` holds the resolved target and this
    /// field records whether it actually resolved taken.
    pub jump: bool,
    /// Resolved outcome disagreed with the prediction; commit must flush.
    pub flush: bool,
}

/// Whether this entry represents a branch/jump the predictor should train on.
#[derive(Clone, Copy, Debug, Default)]
pub struct BranchInfo {
    /// True for any entry that is a branch or jump (trains the predictor).
    pub is_branch_or_jump: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StoreState {
    /// Not a store, or a store whose write hasn't been issued yet.
    NotIssued,
    /// Write request is outstanding in the MSHR.
    Issued,
}

/// A single in-flight instruction's reorder-buffer bookkeeping.
#[derive(Clone, Copy, Debug)]
struct RobEntry {
    executed: bool,
    pending: bool,
    dest_reg: usize,
    pc: u32,
    value: u32,
    address: u32,
    flags: RobFlags,
    branch: BranchInfo,
    store_state: StoreState,
}

impl Default for RobEntry {
    fn default() -> Self {
        Self {
            executed: false,
            pending: false,
            dest_reg: 0,
            pc: 0,
            value: 0,
            address: 0,
            flags: RobFlags::default(),
            branch: BranchInfo::default(),
            store_state: StoreState::NotIssued,
        }
    }
}

/// The outcome of attempting to commit the current ROB head this cycle.
pub struct CommitEvent {
    /// Slot id of the entry that committed.
    pub rob_id: u32,
    /// Register write to apply, if any.
    pub reg_write: Option<(usize, u32)>,
    /// Branch/jump training update to apply to the predictor, if this entry
    /// was a branch or jump: `(pc, taken, target)`.
    pub branch_update: Option<(u32, bool, u32)>,
    /// Flush target PC, if this entry mispredicted.
    pub flush_to: Option<u32>,
}

/// In-order circular FIFO of `ROB_SIZE` entries.
pub struct ReorderBuffer {
    entries: Vec<RobEntry>,
    capacity: usize,
    head: usize,
    tail: usize,
    len: usize,
}

impl ReorderBuffer {
    /// Creates an empty reorder buffer with room for `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![RobEntry::default(); capacity.max(1)],
            capacity,
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    /// Number of in-flight entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the buffer is at capacity; dispatch must stall.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Allocates the next entry in program order, returning its slot id.
    /// Caller must check [`ReorderBuffer::is_full`] first.
    #[allow(clippy::too_many_arguments)]
    pub fn allocate(
        &mut self,
        pc: u32,
        dest_reg: usize,
        flags: RobFlags,
        branch: BranchInfo,
        initial_value: u32,
        initial_address: u32,
        executed_at_allocation: bool,
    ) -> u32 {
        let idx = self.tail;
        self.entries[idx] = RobEntry {
            executed: executed_at_allocation,
            pending: false,
            dest_reg,
            pc,
            value: initial_value,
            address: initial_address,
            flags,
            branch,
            store_state: StoreState::NotIssued,
        };
        self.tail = (self.tail + 1) % self.capacity;
        self.len += 1;
        idx as u32
    }

    /// Updates a plain (non-branching, non-memory) entry's result after
    /// ALU execution, marking it executed.
    pub fn complete_execution(&mut self, rob_id: u32, value: u32) {
        let entry = &mut self.entries[rob_id as usize];
        entry.value = value;
        entry.executed = true;
    }

    /// Resolves a `beq`/`bne` entry once the ALU has produced its zero
    /// flag. `entry.flags.jump` held the *predicted* direction since
    /// allocation; `entry.address` already holds the branch's target
    /// (computable from the immediate alone, regardless of prediction).
    /// A mismatch flags a flush and redirects to whichever of target/
    /// fall-through actually occurred.
    pub fn resolve_branch(&mut self, rob_id: u32, actual_taken: bool) {
        let entry = &mut self.entries[rob_id as usize];
        let branch_target = entry.address;
        let fallthrough = entry.pc.wrapping_add(4);
        let mispredicted = actual_taken != entry.flags.jump;
        entry.executed = true;
        entry.flags.jump = actual_taken;
        if mispredicted {
            entry.flags.flush = true;
            entry.address = if actual_taken { branch_target } else { fallthrough };
        }
    }

    /// Resolves a `jr` entry once the ALU has produced the register's
    /// value. `entry.flags.jump` held the predicted taken bit and
    /// `entry.address` the predicted target since allocation; `jr` is
    /// unconditionally taken, so any mismatch in either is a misprediction.
    pub fn resolve_jump_reg(&mut self, rob_id: u32, actual_target: u32) {
        let entry = &mut self.entries[rob_id as usize];
        let predicted_taken = entry.flags.jump;
        let predicted_target = entry.address;
        entry.executed = true;
        entry.flags.jump = true;
        if !predicted_taken || predicted_target != actual_target {
            entry.flags.flush = true;
            entry.address = actual_target;
        }
    }

    /// Marks a store entry executed (address and value are both ready;
    /// commit may now issue the write).
    pub fn mark_store_ready(&mut self, rob_id: u32, address: u32, value: u32) {
        let entry = &mut self.entries[rob_id as usize];
        entry.address = address;
        entry.value = value;
        entry.executed = true;
    }

    /// Attempts to commit up to `width` heads this cycle, stopping early on
    /// a flush or an outstanding store write. Returns the events for
    /// whatever committed.
    pub fn commit(
        &mut self,
        width: usize,
        memory: &mut Memory,
        arch: &mut ArchRegisterFile,
    ) -> Vec<CommitEvent> {
        let mut events = Vec::with_capacity(width);
        for _ in 0..width {
            let Some(event) = self.try_commit_head(memory, arch) else {
                break;
            };
            let flushed = event.flush_to.is_some();
            events.push(event);
            if flushed {
                break;
            }
        }
        events
    }

    fn try_commit_head(
        &mut self,
        memory: &mut Memory,
        arch: &mut ArchRegisterFile,
    ) -> Option<CommitEvent> {
        if self.len == 0 {
            return None;
        }
        let idx = self.head;
        if !self.entries[idx].executed {
            return None;
        }

        if self.entries[idx].flags.mem_write {
            match self.entries[idx].store_state {
                StoreState::NotIssued => {
                    memory.access(self.entries[idx].address, true, self.entries[idx].value);
                    self.entries[idx].store_state = StoreState::Issued;
                    self.entries[idx].pending = true;
                    return None;
                }
                StoreState::Issued => match memory.poll(self.entries[idx].address, true) {
                    Some(_) => self.entries[idx].pending = false,
                    None => return None,
                },
            }
        }

        let entry = self.entries[idx];
        arch.set_pc(entry.pc);

        let reg_write = entry.flags.reg_write.then_some((entry.dest_reg, entry.value));
        if let Some((reg, value)) = reg_write {
            arch.write(reg, value);
        }

        let branch_update = entry
            .branch
            .is_branch_or_jump
            .then_some((entry.pc, entry.flags.jump, entry.address));

        let flush_to = entry.flags.flush.then_some(entry.address);

        self.head = (self.head + 1) % self.capacity;
        self.len -= 1;

        Some(CommitEvent {
            rob_id: idx as u32,
            reg_write,
            branch_update,
            flush_to,
        })
    }

    /// Discards every in-flight entry. Used on a commit-time flush.
    pub fn flush(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn test_memory() -> Memory {
        Memory::new(&CacheConfig::default(), &CacheConfig::default(), 4096)
    }

    #[test]
    fn allocate_returns_sequential_slot_ids() {
        let mut rob = ReorderBuffer::new(4);
        let a = rob.allocate(0, 1, RobFlags::default(), BranchInfo::default(), 0, 0, false);
        let b = rob.allocate(4, 2, RobFlags::default(), BranchInfo::default(), 0, 0, false);
        assert_eq!(a, 0);
        assert_eq!(b, 1);
    }

    #[test]
    fn commit_stalls_until_executed() {
        let mut rob = ReorderBuffer::new(4);
        rob.allocate(
            0,
            1,
            RobFlags {
                reg_write: true,
                ..Default::default()
            },
            BranchInfo::default(),
            0,
            0,
            false,
        );
        let mut mem = test_memory();
        let mut arch = ArchRegisterFile::new(0);
        assert!(rob.commit(1, &mut mem, &mut arch).is_empty());
    }

    #[test]
    fn commit_writes_register_and_advances_pc() {
        let mut rob = ReorderBuffer::new(4);
        rob.allocate(
            0,
            1,
            RobFlags {
                reg_write: true,
                ..Default::default()
            },
            BranchInfo::default(),
            0,
            0,
            false,
        );
        rob.complete_execution(0, 42);
        let mut mem = test_memory();
        let mut arch = ArchRegisterFile::new(0);
        let events = rob.commit(1, &mut mem, &mut arch);
        assert_eq!(events.len(), 1);
        assert_eq!(arch.read(1), 42);
        assert_eq!(arch.pc(), 0);
    }

    #[test]
    fn commit_flush_stops_committing_further_entries() {
        let mut rob = ReorderBuffer::new(4);
        rob.allocate(
            0,
            0,
            RobFlags {
                flush: true,
                ..Default::default()
            },
            BranchInfo {
                is_branch_or_jump: true,
            },
            0,
            0x2000,
            true,
        );
        rob.allocate(4, 1, RobFlags::default(), BranchInfo::default(), 0, 0, true);
        let mut mem = test_memory();
        let mut arch = ArchRegisterFile::new(0);
        let events = rob.commit(5, &mut mem, &mut arch);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].flush_to, Some(0x2000));
    }

    #[test]
    fn store_commit_stalls_until_memory_write_completes() {
        let mut rob = ReorderBuffer::new(4);
        rob.allocate(
            0,
            0,
            RobFlags {
                mem_write: true,
                ..Default::default()
            },
            BranchInfo::default(),
            0,
            0,
            false,
        );
        rob.mark_store_ready(0, 0x100, 0xAA);
        let mut mem = test_memory();
        let mut arch = ArchRegisterFile::new(0);
        assert!(rob.commit(1, &mut mem, &mut arch).is_empty());
        for _ in 0..64 {
            mem.tick();
            if !rob.commit(1, &mut mem, &mut arch).is_empty() {
                return;
            }
        }
        panic!("store commit never completed");
    }
}
