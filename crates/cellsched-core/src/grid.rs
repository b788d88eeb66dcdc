//! LTE time-frequency resource grid.
//!
//! Hierarchy: a frame is 10 subframes, a subframe is one TTI (1 ms) of two
//! slots, a slot carries `N` resource blocks across frequency where `N`
//! depends on the cell bandwidth. The scheduler allocates in resource block
//! group (RBG) units: consecutive frequency indices covering both slots of a
//! TTI, assigned atomically to a single UE.
//!
//! Aggregate counters (total allocated RBs, per-UE, per-TTI) are kept
//! consistent with RB state by every mutator; a UE's counter entry is removed
//! the moment its count reaches zero.

use std::collections::HashMap;

use crate::error::ConfigError;

/// Slots per subframe/TTI.
pub const SLOTS_PER_TTI: usize = 2;
/// Subframes per 10 ms frame.
pub const SUBFRAMES_PER_FRAME: usize = 10;

/// (bandwidth MHz, RB per slot, RBG size). RB counts per TS 36.211, RBG sizes
/// per TS 36.213 Table 7.1.6.1-1.
const BANDWIDTH_TABLE: [(f64, usize, usize); 6] = [
    (1.4, 6, 1),
    (3.0, 15, 2),
    (5.0, 25, 2),
    (10.0, 50, 3),
    (15.0, 75, 4),
    (20.0, 100, 4),
];

fn bandwidth_row(bandwidth_mhz: f64) -> Option<(usize, usize)> {
    BANDWIDTH_TABLE
        .iter()
        .find(|(bw, _, _)| (bw - bandwidth_mhz).abs() < 1e-9)
        .map(|&(_, rb, rbg)| (rb, rbg))
}

/// Resource blocks per slot for a whitelisted bandwidth, `None` otherwise.
pub fn rb_per_slot(bandwidth_mhz: f64) -> Option<usize> {
    bandwidth_row(bandwidth_mhz).map(|(rb, _)| rb)
}

/// RBG size for a whitelisted bandwidth, `None` otherwise.
pub fn rbg_size(bandwidth_mhz: f64) -> Option<usize> {
    bandwidth_row(bandwidth_mhz).map(|(_, rbg)| rbg)
}

/// Occupancy of a single resource block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RbState {
    Free,
    Assigned(u32),
}

impl RbState {
    pub fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }

    pub fn owner(&self) -> Option<u32> {
        match self {
            Self::Free => None,
            Self::Assigned(ue) => Some(*ue),
        }
    }
}

/// A resource block together with its grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceBlock {
    pub tti: usize,
    /// Slot within the TTI, 0 or 1.
    pub slot: usize,
    /// Frequency index within the slot, `0..rb_per_slot`.
    pub freq: usize,
    pub state: RbState,
}

/// Time-frequency grid for a whole simulation horizon.
pub struct ResourceGrid {
    bandwidth_mhz: f64,
    rb_per_slot: usize,
    rbg_size: usize,
    total_tti: usize,
    blocks: Vec<RbState>,
    allocated_rbs: u64,
    allocation_by_ue: HashMap<u32, u64>,
    allocation_by_tti: Vec<u64>,
}

impl ResourceGrid {
    /// Build a grid covering `num_frames * 10` TTIs.
    pub fn new(bandwidth_mhz: f64, num_frames: u32) -> Result<Self, ConfigError> {
        let (rb_per_slot, rbg_size) = bandwidth_row(bandwidth_mhz)
            .ok_or(ConfigError::UnsupportedBandwidth(bandwidth_mhz))?;
        if num_frames == 0 {
            return Err(ConfigError::ZeroFrames);
        }
        let total_tti = num_frames as usize * SUBFRAMES_PER_FRAME;
        Ok(Self {
            bandwidth_mhz,
            rb_per_slot,
            rbg_size,
            total_tti,
            blocks: vec![RbState::Free; total_tti * SLOTS_PER_TTI * rb_per_slot],
            allocated_rbs: 0,
            allocation_by_ue: HashMap::new(),
            allocation_by_tti: vec![0; total_tti],
        })
    }

    pub fn bandwidth_mhz(&self) -> f64 {
        self.bandwidth_mhz
    }

    pub fn rb_per_slot(&self) -> usize {
        self.rb_per_slot
    }

    pub fn rbg_size(&self) -> usize {
        self.rbg_size
    }

    /// Number of RBGs per TTI; the last group may be short.
    pub fn total_rbg(&self) -> usize {
        self.rb_per_slot.div_ceil(self.rbg_size)
    }

    pub fn total_tti(&self) -> usize {
        self.total_tti
    }

    /// Total RBs over the whole horizon (both slots).
    pub fn total_rbs(&self) -> u64 {
        self.blocks.len() as u64
    }

    fn index(&self, tti: usize, slot: usize, freq: usize) -> Option<usize> {
        if tti >= self.total_tti || slot >= SLOTS_PER_TTI || freq >= self.rb_per_slot {
            return None;
        }
        Some((tti * SLOTS_PER_TTI + slot) * self.rb_per_slot + freq)
    }

    /// Look up one RB. `None` for out-of-range indices.
    pub fn rb(&self, tti: usize, slot: usize, freq: usize) -> Option<ResourceBlock> {
        let idx = self.index(tti, slot, freq)?;
        Some(ResourceBlock {
            tti,
            slot,
            freq,
            state: self.blocks[idx],
        })
    }

    /// Assign a single RB to a UE. `false` when the indices are out of range
    /// or the RB is already taken.
    pub fn allocate_rb(&mut self, tti: usize, slot: usize, freq: usize, ue_id: u32) -> bool {
        let Some(idx) = self.index(tti, slot, freq) else {
            return false;
        };
        if !self.blocks[idx].is_free() {
            return false;
        }
        self.blocks[idx] = RbState::Assigned(ue_id);
        self.allocated_rbs += 1;
        *self.allocation_by_ue.entry(ue_id).or_insert(0) += 1;
        self.allocation_by_tti[tti] += 1;
        true
    }

    /// Release a single RB. `false` when out of range or already free.
    pub fn release_rb(&mut self, tti: usize, slot: usize, freq: usize) -> bool {
        let Some(idx) = self.index(tti, slot, freq) else {
            return false;
        };
        let RbState::Assigned(ue_id) = self.blocks[idx] else {
            return false;
        };
        self.blocks[idx] = RbState::Free;
        self.allocated_rbs -= 1;
        self.allocation_by_tti[tti] -= 1;
        if let Some(count) = self.allocation_by_ue.get_mut(&ue_id) {
            *count -= 1;
            if *count == 0 {
                self.allocation_by_ue.remove(&ue_id);
            }
        }
        true
    }

    /// Atomically assign the RB at `freq` in both slots of `tti`. On partial
    /// failure the slot that succeeded is released again.
    pub fn allocate_rb_pair(&mut self, tti: usize, freq: usize, ue_id: u32) -> bool {
        if !self.allocate_rb(tti, 0, freq, ue_id) {
            return false;
        }
        if !self.allocate_rb(tti, 1, freq, ue_id) {
            self.release_rb(tti, 0, freq);
            return false;
        }
        true
    }

    /// Frequency indices covered by RBG `rbg_idx`; the last group may be
    /// shorter than `rbg_size`. Empty for an out-of-range group index.
    pub fn rbg_indices(&self, rbg_idx: usize) -> Vec<usize> {
        let start = rbg_idx * self.rbg_size;
        if start >= self.rb_per_slot {
            return Vec::new();
        }
        let end = (start + self.rbg_size).min(self.rb_per_slot);
        (start..end).collect()
    }

    /// Atomically assign every RB of an RBG (both slots) to one UE. Any
    /// sub-failure rolls the whole group back.
    pub fn allocate_rbg(&mut self, tti: usize, rbg_idx: usize, ue_id: u32) -> bool {
        let freqs = self.rbg_indices(rbg_idx);
        if freqs.is_empty() {
            return false;
        }
        for (done, &freq) in freqs.iter().enumerate() {
            if !self.allocate_rb_pair(tti, freq, ue_id) {
                for &back in &freqs[..done] {
                    self.release_rb(tti, 0, back);
                    self.release_rb(tti, 1, back);
                }
                return false;
            }
        }
        true
    }

    /// Release every RB of an RBG in both slots.
    pub fn release_rbg(&mut self, tti: usize, rbg_idx: usize) {
        for freq in self.rbg_indices(rbg_idx) {
            self.release_rb(tti, 0, freq);
            self.release_rb(tti, 1, freq);
        }
    }

    /// All free RBs of a TTI, slot 0 first, ascending frequency.
    pub fn free_rbs_for_tti(&self, tti: usize) -> Vec<ResourceBlock> {
        let mut free = Vec::new();
        for slot in 0..SLOTS_PER_TTI {
            for freq in 0..self.rb_per_slot {
                if let Some(rb) = self.rb(tti, slot, freq)
                    && rb.state.is_free()
                {
                    free.push(rb);
                }
            }
        }
        free
    }

    /// Resource Allocation type-0 bitmap: entry `k` is true when RBG `k` of
    /// `tti` is assigned to `ue_id` in both slots.
    pub fn generate_bitmap(&self, tti: usize, ue_id: u32) -> Vec<bool> {
        (0..self.total_rbg())
            .map(|rbg_idx| {
                self.rbg_indices(rbg_idx).iter().all(|&freq| {
                    (0..SLOTS_PER_TTI).all(|slot| {
                        self.rb(tti, slot, freq)
                            .is_some_and(|rb| rb.state.owner() == Some(ue_id))
                    })
                })
            })
            .collect()
    }

    /// Total RBs currently assigned across the horizon.
    pub fn allocated_rbs(&self) -> u64 {
        self.allocated_rbs
    }

    /// RBs currently assigned to one UE (0 when it holds none).
    pub fn allocated_for_ue(&self, ue_id: u32) -> u64 {
        self.allocation_by_ue.get(&ue_id).copied().unwrap_or(0)
    }

    /// UEs currently holding at least one RB.
    pub fn ues_with_allocations(&self) -> usize {
        self.allocation_by_ue.len()
    }

    /// RBs currently assigned within one TTI.
    pub fn allocated_in_tti(&self, tti: usize) -> u64 {
        self.allocation_by_tti.get(tti).copied().unwrap_or(0)
    }

    /// Release every RB and zero all counters.
    pub fn reset(&mut self) {
        self.blocks.fill(RbState::Free);
        self.allocated_rbs = 0;
        self.allocation_by_ue.clear();
        self.allocation_by_tti.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bandwidth_table_matches_the_standard() {
        for (bw, rb, rbg) in [
            (1.4, 6, 1),
            (3.0, 15, 2),
            (5.0, 25, 2),
            (10.0, 50, 3),
            (15.0, 75, 4),
            (20.0, 100, 4),
        ] {
            assert_eq!(rb_per_slot(bw), Some(rb));
            assert_eq!(rbg_size(bw), Some(rbg));
        }
        assert_eq!(rb_per_slot(7.0), None);
    }

    #[test]
    fn construction_rejects_unknown_bandwidth() {
        assert!(matches!(
            ResourceGrid::new(2.5, 1),
            Err(ConfigError::UnsupportedBandwidth(_))
        ));
    }

    #[test]
    fn single_rb_allocation_and_double_assignment() {
        let mut grid = ResourceGrid::new(10.0, 1).unwrap();
        assert!(grid.allocate_rb(0, 0, 10, 100));
        // Same RB again must refuse.
        assert!(!grid.allocate_rb(0, 0, 10, 200));
        // Other slot is independent.
        assert!(grid.allocate_rb(0, 1, 10, 100));
        assert_eq!(grid.allocated_rbs(), 2);
        assert_eq!(grid.allocated_for_ue(100), 2);
        assert_eq!(grid.allocated_in_tti(0), 2);
    }

    #[test]
    fn release_removes_zeroed_ue_entry() {
        let mut grid = ResourceGrid::new(20.0, 1).unwrap();
        assert!(grid.allocate_rb(9, 1, 99, 400));
        assert_eq!(grid.allocated_in_tti(9), 1);
        assert!(grid.release_rb(9, 1, 99));
        assert_eq!(grid.allocated_rbs(), 0);
        assert_eq!(grid.allocated_for_ue(400), 0);
        assert_eq!(grid.ues_with_allocations(), 0);
        assert_eq!(grid.allocated_in_tti(9), 0);
    }

    #[test]
    fn rb_pair_is_atomic() {
        let mut grid = ResourceGrid::new(5.0, 1).unwrap();
        // Occupy slot 1 so the pair cannot complete.
        assert!(grid.allocate_rb(0, 1, 3, 7));
        assert!(!grid.allocate_rb_pair(0, 3, 8));
        // Slot 0 must have been rolled back.
        assert!(grid.rb(0, 0, 3).unwrap().state.is_free());
        assert_eq!(grid.allocated_rbs(), 1);

        assert!(grid.allocate_rb_pair(0, 4, 8));
        assert_eq!(grid.rb(0, 0, 4).unwrap().state.owner(), Some(8));
        assert_eq!(grid.rb(0, 1, 4).unwrap().state.owner(), Some(8));
    }

    #[test]
    fn rbg_indices_cover_the_slot_with_short_tail() {
        let grid = ResourceGrid::new(10.0, 1).unwrap();
        // 50 RB, RBG size 3 -> 17 groups, last one {48, 49}.
        assert_eq!(grid.total_rbg(), 17);
        assert_eq!(grid.rbg_indices(0), vec![0, 1, 2]);
        assert_eq!(grid.rbg_indices(16), vec![48, 49]);
        assert!(grid.rbg_indices(17).is_empty());
    }

    #[test]
    fn rbg_allocation_is_atomic_with_rollback() {
        let mut grid = ResourceGrid::new(10.0, 1).unwrap();
        // Poison one RB in the middle of RBG 0.
        assert!(grid.allocate_rb(0, 1, 1, 55));
        assert!(!grid.allocate_rbg(0, 0, 66));
        for freq in 0..3 {
            assert!(grid.rb(0, 0, freq).unwrap().state.is_free());
        }
        assert_eq!(grid.allocated_rbs(), 1);

        assert!(grid.allocate_rbg(0, 1, 66));
        for freq in 3..6 {
            for slot in 0..SLOTS_PER_TTI {
                assert_eq!(grid.rb(0, slot, freq).unwrap().state.owner(), Some(66));
            }
        }
        assert_eq!(grid.allocated_for_ue(66), 6);
    }

    #[test]
    fn bitmap_reflects_rbg_ownership() {
        let mut grid = ResourceGrid::new(3.0, 1).unwrap();
        assert!(grid.allocate_rbg(0, 0, 1));
        assert!(grid.allocate_rbg(0, 3, 1));
        assert!(grid.allocate_rbg(0, 1, 2));
        let bitmap = grid.generate_bitmap(0, 1);
        assert_eq!(bitmap.len(), 8);
        assert!(bitmap[0] && bitmap[3]);
        assert!(!bitmap[1] && !bitmap[2]);
        let bitmap2 = grid.generate_bitmap(0, 2);
        assert!(bitmap2[1]);
        assert_eq!(bitmap2.iter().filter(|b| **b).count(), 1);
    }

    #[test]
    fn free_rbs_plus_allocated_conserve_the_tti() {
        let mut grid = ResourceGrid::new(5.0, 1).unwrap();
        assert!(grid.allocate_rbg(2, 0, 1));
        assert!(grid.allocate_rbg(2, 5, 2));
        let free = grid.free_rbs_for_tti(2).len() as u64;
        assert_eq!(
            free + grid.allocated_in_tti(2),
            (SLOTS_PER_TTI * grid.rb_per_slot()) as u64
        );
    }

    #[test]
    fn reset_clears_everything() {
        let mut grid = ResourceGrid::new(1.4, 2).unwrap();
        assert!(grid.allocate_rbg(5, 0, 9));
        grid.reset();
        assert_eq!(grid.allocated_rbs(), 0);
        assert_eq!(grid.ues_with_allocations(), 0);
        assert!(grid.free_rbs_for_tti(5).len() == SLOTS_PER_TTI * grid.rb_per_slot());
    }

    #[test]
    fn out_of_range_indices_are_soft() {
        let mut grid = ResourceGrid::new(3.0, 1).unwrap();
        assert!(grid.rb(0, 0, 15).is_none());
        assert!(grid.rb(10, 0, 0).is_none());
        assert!(!grid.allocate_rb(0, 2, 0, 1));
        assert!(!grid.allocate_rb(0, 0, 99, 1));
        assert!(!grid.release_rb(99, 0, 0));
    }
}
