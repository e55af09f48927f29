//! Two-level set-associative write-back cache hierarchy with non-blocking
//! miss handling.
//!
//! `Memory` owns an L1 cache, an L2 cache (inclusive of L1), a flat main
//! memory word vector, and a Miss Status Holding Register (MSHR) that tracks
//! outstanding accesses. Each simulated cycle, [`Memory::tick`] advances
//! every MSHR entry one step through the hierarchy; [`Memory::access`]
//! enqueues a new request (or folds a read into an already-pending write,
//! store-to-load bypass).

use crate::config::CacheConfig;

/// A single cache line: metadata plus its resident data words.
#[derive(Clone)]
pub struct CacheLine {
    /// Whether this line holds live data.
    pub valid: bool,
    /// Whether this line has been written since it was filled.
    pub dirty: bool,
    /// Tag bits of the resident block (derived from `address`).
    pub tag: u32,
    /// Block-aligned address of the resident line.
    pub address: u32,
    /// Pseudo-LRU rank in `[0, assoc-1]`; `assoc-1` is most recently used.
    pub repl_bits: u32,
    /// The line's data words.
    pub data: Vec<u32>,
}

impl CacheLine {
    fn new(words_per_line: usize) -> Self {
        Self {
            valid: false,
            dirty: false,
            tag: 0,
            address: 0,
            repl_bits: 0,
            data: vec![0; words_per_line],
        }
    }
}

/// A set-associative cache with pseudo-LRU replacement.
pub struct Cache {
    lines: Vec<CacheLine>,
    num_sets: usize,
    ways: usize,
    line_bytes: usize,
    /// Cycles to service a miss once the corresponding backing store responds.
    pub miss_penalty: u32,
}

impl Cache {
    /// Builds a cache from its configuration.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let num_sets = config.num_sets();
        let words_per_line = config.words_per_line();
        Self {
            lines: vec![CacheLine::new(words_per_line); num_sets * config.ways],
            num_sets,
            ways: config.ways,
            line_bytes: config.line_bytes,
            miss_penalty: config.miss_penalty,
        }
    }

    fn index(&self, address: u32) -> usize {
        ((address as usize) / self.line_bytes) % self.num_sets
    }

    fn tag(&self, address: u32) -> u32 {
        address / (self.line_bytes * self.num_sets) as u32
    }

    fn block_address(&self, address: u32) -> u32 {
        address & !((self.line_bytes as u32) - 1)
    }

    fn word_offset(&self, address: u32) -> usize {
        ((address as usize) % self.line_bytes) / 4
    }

    /// Looks for `address`'s block among this set's ways. On hit, promotes
    /// the hitting way to most-recently-used and returns its line index.
    fn find_way(&mut self, address: u32) -> Option<usize> {
        let idx = self.index(address);
        let tag = self.tag(address);
        let base = idx * self.ways;
        for way in 0..self.ways {
            let line_idx = base + way;
            if self.lines[line_idx].valid && self.lines[line_idx].tag == tag {
                self.update_replacement_bits(idx, way);
                return Some(line_idx);
            }
        }
        None
    }

    /// Promotes `way` within set `set_idx` to most-recently-used, decrementing
    /// every other valid way with a higher rank. This is true LRU ordering
    /// among the set's currently-valid ways, not a binary-tree approximation.
    fn update_replacement_bits(&mut self, set_idx: usize, way: usize) {
        let base = set_idx * self.ways;
        let cur = self.lines[base + way].repl_bits;
        for w in 0..self.ways {
            let line_idx = base + w;
            if self.lines[line_idx].valid && self.lines[line_idx].repl_bits > cur {
                self.lines[line_idx].repl_bits -= 1;
            }
        }
        self.lines[base + way].repl_bits = (self.ways - 1) as u32;
    }

    /// Attempts a read at `address`, decrementing `penalty` while a miss is
    /// still being serviced. Returns `Some(word)` once the line is resident.
    pub fn read(&mut self, address: u32, penalty: &mut u32) -> Option<u32> {
        if *penalty > 0 {
            *penalty -= 1;
            return None;
        }
        match self.find_way(address) {
            Some(line_idx) => {
                let offset = self.word_offset(address);
                Some(self.lines[line_idx].data[offset])
            }
            None => {
                *penalty = self.miss_penalty.saturating_sub(1);
                None
            }
        }
    }

    /// Attempts a write at `address`, decrementing `penalty` while a miss is
    /// still being serviced. Returns `true` once the write has landed.
    pub fn write(&mut self, address: u32, value: u32, penalty: &mut u32) -> bool {
        if *penalty > 0 {
            *penalty -= 1;
            return false;
        }
        match self.find_way(address) {
            Some(line_idx) => {
                let offset = self.word_offset(address);
                self.lines[line_idx].data[offset] = value;
                self.lines[line_idx].dirty = true;
                true
            }
            None => {
                *penalty = self.miss_penalty.saturating_sub(1);
                false
            }
        }
    }

    /// Returns a copy of the resident line at `address`, if any. Callers
    /// only invoke this once they know (from a successful lower-level fill)
    /// that the line exists.
    #[must_use]
    pub fn read_line(&self, address: u32) -> Option<CacheLine> {
        let idx = self.index(address);
        let tag = self.tag(address);
        let base = idx * self.ways;
        (0..self.ways)
            .map(|way| base + way)
            .find(|&line_idx| self.lines[line_idx].valid && self.lines[line_idx].tag == tag)
            .map(|line_idx| self.lines[line_idx].clone())
    }

    /// Merges an evicted line's data back into this cache's resident copy,
    /// marking it dirty. Used when a higher level's dirty victim writes back
    /// down into this level.
    pub fn write_back_line(&mut self, evicted: &CacheLine) {
        let idx = self.index(evicted.address);
        let tag = self.tag(evicted.address);
        let base = idx * self.ways;
        for way in 0..self.ways {
            let line_idx = base + way;
            if self.lines[line_idx].valid && self.lines[line_idx].tag == tag {
                self.lines[line_idx].data.clone_from(&evicted.data);
                self.lines[line_idx].dirty = true;
            }
        }
    }

    /// Installs `new_line`'s data at `address`'s set, evicting a victim by
    /// pseudo-LRU rank (or an invalid way) if the block isn't already
    /// resident. Returns the evicted line, if a real line was displaced.
    pub fn replace(&mut self, address: u32, new_data: Vec<u32>, dirty: bool) -> Option<CacheLine> {
        let idx = self.index(address);
        let tag = self.tag(address);
        let base = idx * self.ways;

        if let Some(way) = (0..self.ways).find(|&w| {
            let line_idx = base + w;
            self.lines[line_idx].valid && self.lines[line_idx].tag == tag
        }) {
            self.update_replacement_bits(idx, way);
            return None;
        }

        // No matching line resident: evict an invalid way if one exists,
        // otherwise the valid way with the lowest pseudo-LRU rank. Using
        // `min_by_key` rather than scanning for an exact rank-0 way means
        // this never depends on the ranks forming a clean permutation.
        let victim_way = (0..self.ways)
            .find(|&w| !self.lines[base + w].valid)
            .unwrap_or_else(|| {
                (0..self.ways)
                    .min_by_key(|&w| self.lines[base + w].repl_bits)
                    .expect("a cache set always has at least one way")
            });
        let line_idx = base + victim_way;
        let evicted = self.lines[line_idx].clone();
        self.lines[line_idx] = CacheLine {
            valid: true,
            dirty,
            tag,
            address: self.block_address(address),
            repl_bits: 0,
            data: new_data,
        };
        self.update_replacement_bits(idx, victim_way);
        if evicted.valid {
            Some(evicted)
        } else {
            None
        }
    }

    /// Invalidates the resident line matching `address`'s tag, if any.
    /// Used to maintain inclusion when a backing level evicts a line.
    pub fn invalidate_line(&mut self, address: u32) {
        let idx = self.index(address);
        let tag = self.tag(address);
        let base = idx * self.ways;
        for way in 0..self.ways {
            let line_idx = base + way;
            if self.lines[line_idx].valid && self.lines[line_idx].tag == tag {
                self.lines[line_idx].valid = false;
            }
        }
    }
}

/// An outstanding memory request tracked by the MSHR.
#[derive(Clone)]
struct MshrEntry {
    address: u32,
    write_value: u32,
    is_write: bool,
    l1_penalty: u32,
    l2_penalty: u32,
    success: bool,
    /// Set once this request is observed missing L1, so a later same-cycle
    /// success (once the miss penalty drains) is counted as a miss, not a hit.
    l1_missed: bool,
    /// Set once this request falls through L2 to a main-memory fill.
    l2_missed: bool,
}

/// Miss Status Holding Register: the list of in-flight memory requests.
struct Mshr {
    entries: Vec<MshrEntry>,
}

/// Two-level cache hierarchy plus flat main memory.
pub struct Memory {
    l1: Cache,
    l2: Cache,
    mshr: Mshr,
    words: Vec<u32>,
    line_bytes: usize,
    /// Requests serviced directly out of L1 (no L2 or main-memory probe needed).
    pub l1_hits: u64,
    /// Requests that missed L1 and had to probe L2 or further.
    pub l1_misses: u64,
    /// Requests serviced out of L2 after missing L1.
    pub l2_hits: u64,
    /// Requests that missed both L1 and L2, requiring a main-memory fill.
    pub l2_misses: u64,
}

impl Memory {
    /// Builds the hierarchy: `l1`/`l2` from their configs, `words` main
    /// memory words, addressed `address / 4`.
    #[must_use]
    pub fn new(l1_config: &CacheConfig, l2_config: &CacheConfig, words: usize) -> Self {
        Self {
            l1: Cache::new(l1_config),
            l2: Cache::new(l2_config),
            mshr: Mshr { entries: Vec::new() },
            words: vec![0; words],
            line_bytes: l1_config.line_bytes,
            l1_hits: 0,
            l1_misses: 0,
            l2_hits: 0,
            l2_misses: 0,
        }
    }

    /// Direct, un-cached access to main memory words, for program/data image
    /// loading and final-state inspection.
    pub fn words_mut(&mut self) -> &mut [u32] {
        &mut self.words
    }

    /// Direct, un-cached read of main memory words, for final-state
    /// inspection.
    #[must_use]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Issues a memory access. Returns `true` if it completed this cycle
    /// (the caller may use the result immediately), `false` if it was
    /// enqueued into the MSHR and must be polled via [`Memory::poll`] on
    /// subsequent cycles (after calling [`Memory::tick`]).
    ///
    /// Writes always enqueue a fresh entry. Reads fold into an existing
    /// pending write to the same address (store-to-load bypass, returning
    /// the pending value immediately) or an existing pending read (no
    /// duplicate entry), otherwise enqueue a new read entry.
    pub fn access(&mut self, address: u32, is_write: bool, write_value: u32) -> Option<u32> {
        if is_write {
            self.mshr.entries.push(MshrEntry {
                address,
                write_value,
                is_write: true,
                l1_penalty: 0,
                l2_penalty: 0,
                success: false,
                l1_missed: false,
                l2_missed: false,
            });
            return None;
        }

        for entry in &self.mshr.entries {
            if entry.address == address {
                if entry.is_write {
                    return Some(entry.write_value);
                }
                return None;
            }
        }

        self.mshr.entries.push(MshrEntry {
            address,
            write_value: 0,
            is_write: false,
            l1_penalty: 0,
            l2_penalty: 0,
            success: false,
            l1_missed: false,
            l2_missed: false,
        });
        None
    }

    /// Polls the access at `address` that was previously enqueued via
    /// [`Memory::access`]. Returns `Some((success, value))` once serviced,
    /// removing the entry; `None` while still outstanding.
    pub fn poll(&mut self, address: u32, is_write: bool) -> Option<(bool, u32)> {
        let pos = self
            .mshr
            .entries
            .iter()
            .position(|e| e.address == address && e.is_write == is_write && e.success)?;
        let entry = self.mshr.entries.remove(pos);
        Some((entry.success, entry.write_value))
    }

    /// Advances every outstanding MSHR entry one step through the hierarchy:
    /// L1 probe, then L2 probe with L1 refill on L2 hit, then main-memory
    /// fill with inclusive L1 invalidation and dirty write-back on L2 miss.
    pub fn tick(&mut self) {
        for entry in &mut self.mshr.entries {
            if entry.success {
                continue;
            }

            let l1_done = if entry.is_write {
                self.l1.write(entry.address, entry.write_value, &mut entry.l1_penalty)
            } else {
                match self.l1.read(entry.address, &mut entry.l1_penalty) {
                    Some(value) => {
                        entry.write_value = value;
                        true
                    }
                    None => false,
                }
            };
            if l1_done {
                entry.success = true;
                if entry.l1_missed {
                    self.l1_misses += 1;
                    if entry.l2_missed {
                        self.l2_misses += 1;
                    } else {
                        self.l2_hits += 1;
                    }
                } else {
                    self.l1_hits += 1;
                }
                continue;
            }
            entry.l1_missed = true;

            let l2_done = if entry.is_write {
                self.l2.write(entry.address, entry.write_value, &mut entry.l2_penalty)
            } else {
                match self.l2.read(entry.address, &mut entry.l2_penalty) {
                    Some(value) => {
                        entry.write_value = value;
                        true
                    }
                    None => false,
                }
            };
            if l2_done {
                let l2_line = self
                    .l2
                    .read_line(entry.address)
                    .expect("line just serviced by L2 must be resident");
                if let Some(evicted) = self.l1.replace(entry.address, l2_line.data.clone(), false) {
                    if evicted.dirty {
                        self.l2.write_back_line(&evicted);
                    }
                }
                continue;
            }
            entry.l2_missed = true;

            let line_addr = entry.address & !((self.line_bytes as u32) - 1);
            let words_per_line = self.line_bytes / 4;
            let base_word = (line_addr / 4) as usize;
            let fill: Vec<u32> = self.words[base_word..base_word + words_per_line].to_vec();
            if let Some(evicted) = self.l2.replace(entry.address, fill, false) {
                self.l1.invalidate_line(evicted.address);
                if evicted.dirty {
                    let evict_line_addr = evicted.address & !((self.line_bytes as u32) - 1);
                    let evict_base = (evict_line_addr / 4) as usize;
                    for (i, word) in evicted.data.iter().enumerate() {
                        self.words[evict_base + i] = *word;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn small_config(size_bytes: usize, ways: usize, penalty: u32) -> CacheConfig {
        CacheConfig {
            size_bytes,
            ways,
            line_bytes: 16,
            miss_penalty: penalty,
        }
    }

    #[test]
    fn memory_read_miss_then_hit_after_penalty() {
        let l1 = small_config(64, 2, 2);
        let l2 = small_config(256, 4, 4);
        let mut mem = Memory::new(&l1, &l2, 1024);
        mem.words_mut()[0] = 0xABCD;

        assert_eq!(mem.access(0, false, 0), None);
        // L1 probes before L2 each tick, so a fill that lands on L2's hit
        // cycle is one tick too late for L1 to see it in the same tick;
        // L1 re-arms its own penalty once more before the final hit.
        // Ample margin over the nominal L1+L2 penalty sum.
        for _ in 0..10 {
            mem.tick();
        }
        let result = mem.poll(0, false);
        assert_eq!(result, Some((true, 0xABCD)));
    }

    #[test]
    fn store_to_load_bypass_returns_pending_write_value() {
        let l1 = small_config(64, 2, 2);
        let l2 = small_config(256, 4, 4);
        let mut mem = Memory::new(&l1, &l2, 1024);

        assert_eq!(mem.access(0x100, true, 0x42), None);
        assert_eq!(mem.access(0x100, false, 0), Some(0x42));
    }

    #[test]
    fn tracks_hit_and_miss_counts_per_level() {
        let l1 = small_config(64, 2, 2);
        let l2 = small_config(256, 4, 4);
        let mut mem = Memory::new(&l1, &l2, 1024);
        mem.words_mut()[0] = 0xABCD;

        mem.access(0, false, 0);
        for _ in 0..10 {
            mem.tick();
        }
        mem.poll(0, false);
        assert_eq!((mem.l1_hits, mem.l1_misses, mem.l2_hits, mem.l2_misses), (0, 1, 0, 1));

        mem.access(0, false, 0);
        for _ in 0..10 {
            mem.tick();
        }
        mem.poll(0, false);
        assert_eq!(mem.l1_hits, 1);
    }

    #[test]
    fn duplicate_reads_to_same_address_do_not_enqueue_twice() {
        let l1 = small_config(64, 2, 2);
        let l2 = small_config(256, 4, 4);
        let mut mem = Memory::new(&l1, &l2, 1024);

        assert_eq!(mem.access(0x100, false, 0), None);
        assert_eq!(mem.access(0x100, false, 0), None);
        assert_eq!(mem.mshr.entries.len(), 1);
    }

    #[test]
    fn pseudo_lru_evicts_true_lru_among_valid_ways() {
        let l1 = small_config(64, 4, 1);
        let l2 = small_config(256, 4, 1);
        let mut mem = Memory::new(&l1, &l2, 4096);
        // Four distinct blocks mapping to the same L1 set (stride = set_count * line_bytes).
        let set_span = (l1.num_sets() * l1.line_bytes) as u32;
        let addrs = [0, set_span, set_span * 2, set_span * 3];
        for &addr in &addrs {
            mem.access(addr, false, 0);
            for _ in 0..8 {
                mem.tick();
            }
            mem.poll(addr, false);
        }
        // A fifth distinct block accesses the same set; A (addrs[0]) is now the
        // true LRU and must be the one evicted.
        let fifth = set_span * 4;
        mem.access(fifth, false, 0);
        for _ in 0..8 {
            mem.tick();
        }
        mem.poll(fifth, false);

        assert!(mem.l1.find_way(addrs[0]).is_none());
        assert!(mem.l1.find_way(addrs[1]).is_some());
    }
}
