//! Simulation statistics collection and reporting.
//!
//! This module tracks the run-level counters the core actually produces:
//! cycle count, instructions committed, branch misprediction count, and
//! per-level cache hit/miss counts (read from [`Memory`] at report time,
//! since the cache hierarchy already owns them). Derived metrics (IPC,
//! misprediction rate, cache hit rates) are computed only when printing.

use std::time::Instant;

use crate::core::units::cache::Memory;

/// Accumulated statistics for one simulation run.
#[derive(Clone)]
pub struct SimStats {
    start_time: Instant,
    /// Total simulated cycles elapsed.
    pub cycles: u64,
    /// Instructions committed (retired) across the whole run.
    pub instructions_retired: u64,
    /// Commits whose resolved branch/jump outcome disagreed with its
    /// prediction, triggering a pipeline flush.
    pub mispredicts: u64,
}

impl Default for SimStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            instructions_retired: 0,
            mispredicts: 0,
        }
    }
}

impl SimStats {
    /// Creates a fresh, zeroed stats accumulator with the clock starting now.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one cycle's commit and misprediction counts into the run total.
    /// Called once per [`crate::core::pipeline::driver::O3Engine::tick`].
    pub fn record_cycle(&mut self, committed: u32, mispredicts: u32) {
        self.cycles += 1;
        self.instructions_retired += u64::from(committed);
        self.mispredicts += u64::from(mispredicts);
    }

    /// Prints a run summary to stdout: host time, cycle/instruction counts,
    /// IPC, misprediction rate, and per-level cache hit rates pulled from
    /// `memory`.
    pub fn print(&self, memory: &Memory) {
        let seconds = self.start_time.elapsed().as_secs_f64();
        let cyc = self.cycles.max(1);
        let ipc = self.instructions_retired as f64 / cyc as f64;
        let mispredict_rate = if self.instructions_retired == 0 {
            0.0
        } else {
            100.0 * self.mispredicts as f64 / self.instructions_retired as f64
        };

        println!("\n==========================================================");
        println!("MIPS-32 OUT-OF-ORDER SIMULATION STATISTICS");
        println!("==========================================================");
        println!("host_seconds             {seconds:.4} s");
        println!("sim_cycles               {}", self.cycles);
        println!("sim_insts                {}", self.instructions_retired);
        println!("sim_ipc                  {ipc:.4}");
        println!("----------------------------------------------------------");
        println!("BRANCH PREDICTION");
        println!("  mispredicts            {}", self.mispredicts);
        println!("  mispredict_rate        {mispredict_rate:.2}%");
        println!("----------------------------------------------------------");
        println!("MEMORY HIERARCHY");
        Self::print_cache_level("L1", memory.l1_hits, memory.l1_misses);
        Self::print_cache_level("L2", memory.l2_hits, memory.l2_misses);
        println!("==========================================================");
    }

    fn print_cache_level(name: &str, hits: u64, misses: u64) {
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            100.0 * hits as f64 / total as f64
        };
        println!("  {name:<4} accesses: {total:<10} | hits: {hits:<10} | hit_rate: {hit_rate:.2}%");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    #[test]
    fn record_cycle_accumulates_commits_and_mispredicts() {
        let mut stats = SimStats::new();
        stats.record_cycle(3, 0);
        stats.record_cycle(2, 1);
        assert_eq!(stats.cycles, 2);
        assert_eq!(stats.instructions_retired, 5);
        assert_eq!(stats.mispredicts, 1);
    }

    #[test]
    fn print_does_not_panic_on_a_fresh_stats_block() {
        let stats = SimStats::new();
        let memory = Memory::new(&CacheConfig::default(), &CacheConfig::default(), 1024);
        stats.print(&memory);
    }
}
