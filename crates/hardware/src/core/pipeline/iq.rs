//! Instruction queue: the circular FIFO fetch feeds and dispatch drains.
//!
//! Entries may be enqueued as placeholders for an outstanding fetch
//! (`pending = true`) and resolved later once the memory hierarchy returns
//! the word. A pending head blocks dispatch without blocking fetch from
//! continuing to enqueue further placeholders behind it.

use crate::core::units::cache::Memory;

/// One fetched (or not-yet-fetched) instruction slot.
#[derive(Clone, Copy, Debug)]
pub struct IqEntry {
    /// Raw instruction word; `0` while `pending`.
    pub instruction: u32,
    /// Fetch-time program counter.
    pub pc: u32,
    /// True while the fetching memory access has not yet completed.
    pub pending: bool,
    /// Predicted next-fetch PC, recorded at fetch time.
    pub predicted_next_pc: u32,
    /// Predicted taken/not-taken, recorded at fetch time.
    pub predicted_taken: bool,
}

/// Circular FIFO of [`IqEntry`] values.
pub struct InstructionQueue {
    ring: Vec<IqEntry>,
    capacity: usize,
    head: usize,
    len: usize,
}

impl InstructionQueue {
    /// Creates an empty queue with room for `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: vec![
                IqEntry {
                    instruction: 0,
                    pc: 0,
                    pending: false,
                    predicted_next_pc: 0,
                    predicted_taken: false,
                };
                capacity.max(1)
            ],
            capacity,
            head: 0,
            len: 0,
        }
    }

    /// Number of entries currently queued (pending or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the ring holds no entries at all.
    #[must_use]
    pub fn ring_empty(&self) -> bool {
        self.len == 0
    }

    /// True when there is no dispatchable instruction: the ring is empty,
    /// or its head is still `pending`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring_empty() || self.ring[self.head].pending
    }

    /// True when the ring is at capacity; fetch must stall.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Enqueues a fetched (or placeholder) entry. Caller must check
    /// [`InstructionQueue::is_full`] first.
    pub fn put(
        &mut self,
        instruction: u32,
        pc: u32,
        pending: bool,
        predicted_next_pc: u32,
        predicted_taken: bool,
    ) {
        let tail = (self.head + self.len) % self.capacity;
        self.ring[tail] = IqEntry {
            instruction,
            pc,
            pending,
            predicted_next_pc,
            predicted_taken,
        };
        self.len += 1;
    }

    /// Fills in any pending placeholder whose `pc == address`, marking it
    /// ready for dispatch.
    pub fn resolve_pending(&mut self, address: u32, value: u32) {
        for i in 0..self.len {
            let idx = (self.head + i) % self.capacity;
            if self.ring[idx].pending && self.ring[idx].pc == address {
                self.ring[idx].instruction = value;
                self.ring[idx].pending = false;
            }
        }
    }

    /// Polls every still-pending fetch placeholder's outstanding memory
    /// access, resolving any that finished this cycle. Call once per cycle,
    /// after [`Memory::tick`].
    pub fn poll_pending(&mut self, memory: &mut Memory) {
        for i in 0..self.len {
            let idx = (self.head + i) % self.capacity;
            if !self.ring[idx].pending {
                continue;
            }
            let address = self.ring[idx].pc;
            if let Some((true, value)) = memory.poll(address, false) {
                self.resolve_pending(address, value);
            }
        }
    }

    /// Removes and returns the head entry, if dispatchable (non-empty,
    /// head not pending).
    pub fn pop(&mut self) -> Option<IqEntry> {
        if self.is_empty() {
            return None;
        }
        let entry = self.ring[self.head];
        self.head = (self.head + 1) % self.capacity;
        self.len -= 1;
        Some(entry)
    }

    /// Empties the queue, discarding all entries (including pending
    /// placeholders). Used on a commit-time flush.
    pub fn flush(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_queue_has_no_dispatchable_head() {
        let iq = InstructionQueue::new(4);
        assert!(iq.is_empty());
    }

    #[test]
    fn pending_head_blocks_dispatch_but_not_enqueue() {
        let mut iq = InstructionQueue::new(4);
        iq.put(0, 0x1000, true, 0x1004, false);
        iq.put(0xdead_beef, 0x1004, false, 0x1008, false);
        assert!(iq.is_empty());
        assert_eq!(iq.len(), 2);
    }

    #[test]
    fn resolve_pending_unblocks_dispatch() {
        let mut iq = InstructionQueue::new(4);
        iq.put(0, 0x1000, true, 0x1004, false);
        iq.resolve_pending(0x1000, 0x1234_5678);
        assert!(!iq.is_empty());
        let entry = iq.pop().unwrap();
        assert_eq!(entry.instruction, 0x1234_5678);
        assert!(!entry.pending);
    }

    #[test]
    fn flush_discards_everything() {
        let mut iq = InstructionQueue::new(4);
        iq.put(1, 0, false, 4, false);
        iq.put(2, 4, false, 8, false);
        iq.flush();
        assert_eq!(iq.len(), 0);
        assert!(iq.is_empty());
    }

    #[test]
    fn poll_pending_resolves_once_memory_finishes() {
        use crate::config::CacheConfig;

        let mut iq = InstructionQueue::new(4);
        iq.put(0, 0x1000, true, 0x1004, false);
        let mut memory = Memory::new(&CacheConfig::default(), &CacheConfig::default(), 4096);
        memory.words_mut()[0x1000 / 4] = 0x1234_5678;
        memory.access(0x1000, false, 0);
        for _ in 0..64 {
            memory.tick();
            iq.poll_pending(&mut memory);
            if !iq.is_empty() {
                break;
            }
        }
        let entry = iq.pop().unwrap();
        assert_eq!(entry.instruction, 0x1234_5678);
    }

    #[test]
    fn fifo_order_preserved() {
        let mut iq = InstructionQueue::new(4);
        iq.put(1, 0, false, 4, false);
        iq.put(2, 4, false, 8, false);
        assert_eq!(iq.pop().unwrap().instruction, 1);
        assert_eq!(iq.pop().unwrap().instruction, 2);
    }
}
