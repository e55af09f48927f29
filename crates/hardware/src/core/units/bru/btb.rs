//! Branch Target Buffer (BTB).
//!
//! The BTB is a direct-mapped cache that stores target addresses for control
//! flow instructions, keyed by `pc >> 2`. It lets fetch predict a taken
//! branch's target before the instruction reaches execute. Per spec, the
//! BTB is only written when a branch actually resolves taken; mispredicted
//! targets never overwrite a live entry with stale data on a not-taken
//! outcome.

/// An entry in the Branch Target Buffer.
#[derive(Clone, Copy, Default)]
struct BtbEntry {
    /// The tag used to verify if this entry corresponds to the requested PC.
    tag: u32,
    /// The predicted target address.
    target: u32,
    /// Indicates if this entry contains valid data.
    valid: bool,
}

/// Branch Target Buffer structure.
pub struct Btb {
    /// The table of BTB entries.
    table: Vec<BtbEntry>,
    /// The total number of entries in the BTB.
    size: usize,
}

impl Btb {
    /// Creates a new Branch Target Buffer with the specified size.
    ///
    /// `size` must be a power of two.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            table: vec![BtbEntry::default(); size],
            size,
        }
    }

    /// Calculates the index into the BTB table for a given program counter.
    fn index(&self, pc: u32) -> usize {
        ((pc >> 2) as usize) & (self.size - 1)
    }

    /// Looks up a target address for the given program counter.
    ///
    /// Returns `Some(target)` if a valid entry exists and its tag matches,
    /// otherwise `None`.
    #[must_use]
    pub fn lookup(&self, pc: u32) -> Option<u32> {
        let idx = self.index(pc);
        let e = self.table[idx];
        if e.valid && e.tag == pc {
            Some(e.target)
        } else {
            None
        }
    }

    /// Records a resolved taken branch/jump, writing its target into the BTB.
    pub fn update(&mut self, pc: u32, target: u32) {
        let idx = self.index(pc);
        self.table[idx] = BtbEntry {
            tag: pc,
            target,
            valid: true,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_on_empty_table() {
        let btb = Btb::new(16);
        assert_eq!(btb.lookup(0x1000), None);
    }

    #[test]
    fn hit_after_update() {
        let mut btb = Btb::new(16);
        btb.update(0x1000, 0x2000);
        assert_eq!(btb.lookup(0x1000), Some(0x2000));
    }

    #[test]
    fn aliasing_entries_overwrite_by_index() {
        let mut btb = Btb::new(16);
        btb.update(0x1000, 0x2000);
        // Same index (bits above the 4-bit index differ), different tag.
        btb.update(0x11000, 0x3000);
        assert_eq!(btb.lookup(0x1000), None);
        assert_eq!(btb.lookup(0x11000), Some(0x3000));
    }
}
