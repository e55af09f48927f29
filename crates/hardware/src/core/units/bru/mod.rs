//! Branch prediction unit: a 2-bit-counter BHT paired with a BTB.
//!
//! Prediction at fetch is direction from the BHT combined with a target
//! from the BTB; both tables are only trained at commit, once a branch's
//! outcome and target are known, never speculatively at execute.

/// Branch History Table: 2-bit saturating-counter direction predictor.
pub mod bht;

/// Branch Target Buffer: direct-mapped target cache.
pub mod btb;

use self::bht::Bht;
use self::btb::Btb;

/// Combines a BHT and BTB into the single predictor the fetch phase consults.
pub struct BranchPredictor {
    bht: Bht,
    btb: Btb,
}

impl BranchPredictor {
    /// Creates a predictor with the given BHT and BTB table sizes (each must
    /// be a power of two).
    #[must_use]
    pub fn new(bht_size: usize, btb_size: usize) -> Self {
        Self {
            bht: Bht::new(bht_size),
            btb: Btb::new(btb_size),
        }
    }

    /// Predicts the outcome of the branch/jump at `pc`.
    ///
    /// Returns `(taken, target)`. `target` is only meaningful when `taken`
    /// is true; a taken prediction with no BTB entry falls back to `pc + 4`
    /// so the caller always has a concrete next-fetch address.
    #[must_use]
    pub fn predict(&self, pc: u32) -> (bool, u32) {
        let taken = self.bht.predict(pc);
        if taken {
            let target = self.btb.lookup(pc).unwrap_or(pc.wrapping_add(4));
            (true, target)
        } else {
            (false, pc.wrapping_add(4))
        }
    }

    /// Trains both tables with a branch's resolved outcome. Called only at
    /// commit. The BTB is only written when the branch resolved taken.
    pub fn update(&mut self, pc: u32, taken: bool, target: u32) {
        self.bht.update(pc, taken);
        if taken {
            self.btb.update(pc, target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_not_taken_with_sequential_fallback() {
        let bp = BranchPredictor::new(1024, 1024);
        assert_eq!(bp.predict(0x1000), (false, 0x1004));
    }

    #[test]
    fn learns_taken_branch_and_its_target() {
        let mut bp = BranchPredictor::new(1024, 1024);
        bp.update(0x1000, true, 0x2000);
        bp.update(0x1000, true, 0x2000);
        assert_eq!(bp.predict(0x1000), (true, 0x2000));
    }

    #[test]
    fn not_taken_update_never_touches_btb() {
        let mut bp = BranchPredictor::new(1024, 1024);
        bp.update(0x1000, true, 0x2000);
        bp.update(0x1000, true, 0x2000);
        bp.update(0x1000, false, 0);
        // Counter drops to weakly-taken (2) but the stale BTB target survives.
        assert_eq!(bp.predict(0x1000), (true, 0x2000));
    }
}
