//! Round-Robin RBG assignment.
//!
//! A cursor walks the active set (ordered by UE id) one RBG at a time,
//! skipping UEs whose remaining backlog is exhausted. The UE that opens a TTI
//! is the one after `last_served_ue_id`, and the opener is recorded at the
//! end of the loop, so the starting UE rotates by one position every TTI in
//! which anything was allocated — an even RBG count cannot stall the
//! rotation.

use super::{Allocation, Candidate, commit_rbg};
use crate::grid::ResourceGrid;

pub(crate) fn assign(
    grid: &mut ResourceGrid,
    tti: usize,
    candidates: &mut [Candidate],
    allocation: &mut Allocation,
    last_served_ue_id: &mut Option<u32>,
) {
    if candidates.is_empty() {
        return;
    }
    let n = candidates.len();
    let mut cursor = match *last_served_ue_id {
        Some(last) => candidates
            .iter()
            .position(|c| c.view.ue_id == last)
            .map(|idx| (idx + 1) % n)
            .unwrap_or(0),
        None => 0,
    };

    let mut first_allocated: Option<u32> = None;
    for rbg_idx in 0..grid.total_rbg() {
        if candidates.iter().all(|c| c.remaining_bits <= 0) {
            break;
        }
        // Skip drained UEs, scanning at most one full cycle.
        let start = cursor;
        while candidates[cursor].remaining_bits <= 0 {
            cursor = (cursor + 1) % n;
            if cursor == start {
                break;
            }
        }
        if candidates[cursor].remaining_bits > 0 {
            let ue_id = candidates[cursor].view.ue_id;
            if grid.allocate_rbg(tti, rbg_idx, ue_id) {
                commit_rbg(grid, rbg_idx, &mut candidates[cursor], allocation);
                first_allocated.get_or_insert(ue_id);
            }
        }
        cursor = (cursor + 1) % n;
    }

    if first_allocated.is_some() {
        *last_served_ue_id = first_allocated;
    }
}
