//! Configuration system for the MIPS-32 out-of-order simulator.
//!
//! This module defines all configuration structures used to parameterize the
//! simulator. It provides:
//! 1. **Defaults:** Baseline microarchitectural constants, measured from the
//!    reference implementation this simulator replicates.
//! 2. **Structures:** Hierarchical config for general settings, pipeline buffer
//!    sizes, and the two-level cache hierarchy.
//!
//! Configuration is supplied via JSON (`Config::default()` for the CLI, or a
//! JSON override file for reproducing a specific run).

use serde::Deserialize;

/// Default configuration constants for the simulator.
///
/// These values are the ones measured from the reference implementation this
/// simulator replicates; they define the baseline microarchitecture when not
/// explicitly overridden.
mod defaults {
    /// Superscalar width: operations performed per pipeline phase per cycle.
    pub const WIDTH: usize = 5;

    /// Instruction queue depth.
    pub const IQ_SIZE: usize = 30;

    /// Reorder buffer depth (in-flight instruction window).
    pub const ROB_SIZE: usize = 50;

    /// Load-store buffer depth (in-flight memory ops).
    pub const LSB_SIZE: usize = 20;

    /// Scheduling queue depth (reservation stations).
    pub const SQ_SIZE: usize = 50;

    /// Branch History Table entry count.
    pub const BHT_SIZE: usize = 1024;

    /// Branch Target Buffer entry count.
    pub const BTB_SIZE: usize = 1024;

    /// Default cache line size in bytes.
    pub const CACHE_LINE_SIZE: usize = 32;

    /// Default L1 cache size in bytes.
    pub const L1_SIZE: usize = 1024;

    /// Default L1 associativity.
    pub const L1_WAYS: usize = 2;

    /// Default L1 miss penalty in cycles.
    pub const L1_PENALTY: u32 = 4;

    /// Default L2 cache size in bytes.
    pub const L2_SIZE: usize = 8192;

    /// Default L2 associativity.
    pub const L2_WAYS: usize = 4;

    /// Default L2 miss penalty in cycles (time to reach main memory).
    pub const L2_PENALTY: u32 = 20;

    /// Default main memory size in words.
    pub const MEMORY_WORDS: usize = 1 << 20;

    /// Default program load address.
    pub const PROGRAM_BASE: u32 = 0;

    /// Default data image load address: the midpoint of the default main
    /// memory window, leaving room for the program to grow before it.
    pub const DATA_BASE: u32 = 0x0020_0000;
}

/// Root configuration value for a simulation run.
///
/// # Examples
///
/// ```
/// use mipssim_core::config::Config;
///
/// let json = r#"{
///   "general": { "trace": true },
///   "pipeline": { "width": 4, "rob_size": 32 },
///   "cache": { "l1": { "size_bytes": 2048 } }
/// }"#;
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert!(config.general.trace);
/// assert_eq!(config.pipeline.width, 4);
/// assert_eq!(config.pipeline.rob_size, 32);
/// assert_eq!(config.cache.l1.size_bytes, 2048);
/// assert_eq!(config.cache.l2.size_bytes, 8192);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// General simulation settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Pipeline buffer sizes and superscalar width.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Cache hierarchy configuration.
    #[serde(default)]
    pub cache: CacheHierarchyConfig,
    /// Main memory configuration.
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            pipeline: PipelineConfig::default(),
            cache: CacheHierarchyConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

/// General simulation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Enable per-cycle tracing to stderr (retirements, flushes, cache fills).
    #[serde(default)]
    pub trace: bool,

    /// Initial program counter, and the program image's default load address.
    #[serde(default = "GeneralConfig::default_start_pc")]
    pub start_pc: u32,

    /// Default load address for an optional data image.
    #[serde(default = "GeneralConfig::default_data_base")]
    pub data_base: u32,

    /// Hard cap on simulated cycles, to guarantee termination on a runaway program.
    #[serde(default = "GeneralConfig::default_max_cycles")]
    pub max_cycles: u64,
}

impl GeneralConfig {
    fn default_start_pc() -> u32 {
        defaults::PROGRAM_BASE
    }

    fn default_data_base() -> u32 {
        defaults::DATA_BASE
    }

    fn default_max_cycles() -> u64 {
        10_000_000
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            trace: false,
            start_pc: Self::default_start_pc(),
            data_base: Self::default_data_base(),
            max_cycles: Self::default_max_cycles(),
        }
    }
}

/// Pipeline buffer sizes and superscalar width.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Superscalar width `W`: operations performed per phase per cycle.
    #[serde(default = "PipelineConfig::default_width")]
    pub width: usize,

    /// Instruction queue depth.
    #[serde(default = "PipelineConfig::default_iq_size")]
    pub iq_size: usize,

    /// Reorder buffer depth.
    #[serde(default = "PipelineConfig::default_rob_size")]
    pub rob_size: usize,

    /// Load-store buffer depth.
    #[serde(default = "PipelineConfig::default_lsb_size")]
    pub lsb_size: usize,

    /// Scheduling queue depth.
    #[serde(default = "PipelineConfig::default_sq_size")]
    pub sq_size: usize,

    /// Branch History Table entry count.
    #[serde(default = "PipelineConfig::default_bht_size")]
    pub bht_size: usize,

    /// Branch Target Buffer entry count.
    #[serde(default = "PipelineConfig::default_btb_size")]
    pub btb_size: usize,
}

impl PipelineConfig {
    fn default_width() -> usize {
        defaults::WIDTH
    }

    fn default_iq_size() -> usize {
        defaults::IQ_SIZE
    }

    fn default_rob_size() -> usize {
        defaults::ROB_SIZE
    }

    fn default_lsb_size() -> usize {
        defaults::LSB_SIZE
    }

    fn default_sq_size() -> usize {
        defaults::SQ_SIZE
    }

    fn default_bht_size() -> usize {
        defaults::BHT_SIZE
    }

    fn default_btb_size() -> usize {
        defaults::BTB_SIZE
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: Self::default_width(),
            iq_size: Self::default_iq_size(),
            rob_size: Self::default_rob_size(),
            lsb_size: Self::default_lsb_size(),
            sq_size: Self::default_sq_size(),
            bht_size: Self::default_bht_size(),
            btb_size: Self::default_btb_size(),
        }
    }
}

/// Main memory configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Size of the flat backing memory, in 32-bit words.
    #[serde(default = "MemoryConfig::default_words")]
    pub words: usize,
}

impl MemoryConfig {
    fn default_words() -> usize {
        defaults::MEMORY_WORDS
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            words: Self::default_words(),
        }
    }
}

/// Configuration for both cache levels.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheHierarchyConfig {
    /// L1 (first-level) cache configuration.
    #[serde(default = "CacheHierarchyConfig::default_l1")]
    pub l1: CacheConfig,
    /// L2 (second-level) cache configuration.
    #[serde(default = "CacheHierarchyConfig::default_l2")]
    pub l2: CacheConfig,
}

impl CacheHierarchyConfig {
    fn default_l1() -> CacheConfig {
        CacheConfig {
            size_bytes: defaults::L1_SIZE,
            ways: defaults::L1_WAYS,
            line_bytes: defaults::CACHE_LINE_SIZE,
            miss_penalty: defaults::L1_PENALTY,
        }
    }

    fn default_l2() -> CacheConfig {
        CacheConfig {
            size_bytes: defaults::L2_SIZE,
            ways: defaults::L2_WAYS,
            line_bytes: defaults::CACHE_LINE_SIZE,
            miss_penalty: defaults::L2_PENALTY,
        }
    }
}

impl Default for CacheHierarchyConfig {
    fn default() -> Self {
        Self {
            l1: Self::default_l1(),
            l2: Self::default_l2(),
        }
    }
}

/// Configuration for a single cache level.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CacheConfig {
    /// Total cache capacity in bytes.
    #[serde(default = "CacheConfig::default_size")]
    pub size_bytes: usize,

    /// Associativity (ways per set).
    #[serde(default = "CacheConfig::default_ways")]
    pub ways: usize,

    /// Line size in bytes.
    #[serde(default = "CacheConfig::default_line")]
    pub line_bytes: usize,

    /// Miss penalty in cycles, charged once per miss before the line is resident.
    #[serde(default = "CacheConfig::default_penalty")]
    pub miss_penalty: u32,
}

impl CacheConfig {
    fn default_size() -> usize {
        defaults::L1_SIZE
    }

    fn default_ways() -> usize {
        defaults::L1_WAYS
    }

    fn default_line() -> usize {
        defaults::CACHE_LINE_SIZE
    }

    fn default_penalty() -> u32 {
        defaults::L1_PENALTY
    }

    /// Number of sets implied by size, associativity, and line size.
    #[must_use]
    pub fn num_sets(&self) -> usize {
        self.size_bytes / self.line_bytes / self.ways
    }

    /// Words per line.
    #[must_use]
    pub fn words_per_line(&self) -> usize {
        self.line_bytes / 4
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size_bytes: Self::default_size(),
            ways: Self::default_ways(),
            line_bytes: Self::default_line(),
            miss_penalty: Self::default_penalty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_reference_sizes() {
        let config = Config::default();
        assert_eq!(config.pipeline.width, 5);
        assert_eq!(config.pipeline.iq_size, 30);
        assert_eq!(config.pipeline.rob_size, 50);
        assert_eq!(config.pipeline.lsb_size, 20);
        assert_eq!(config.pipeline.sq_size, 50);
        assert_eq!(config.pipeline.bht_size, 1024);
        assert_eq!(config.pipeline.btb_size, 1024);
    }

    #[test]
    fn partial_json_fills_remaining_fields_from_defaults() {
        let config: Config = serde_json::from_str(r#"{"pipeline": {"width": 2}}"#).unwrap();
        assert_eq!(config.pipeline.width, 2);
        assert_eq!(config.pipeline.rob_size, 50);
        assert!(!config.general.trace);
    }

    #[test]
    fn cache_config_computes_sets_and_words_per_line() {
        let cache = CacheConfig {
            size_bytes: 1024,
            ways: 2,
            line_bytes: 32,
            miss_penalty: 4,
        };
        assert_eq!(cache.num_sets(), 16);
        assert_eq!(cache.words_per_line(), 8);
    }
}
