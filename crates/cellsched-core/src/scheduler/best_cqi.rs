//! Best-CQI (max-C/I) RBG assignment.
//!
//! Stateless: every RBG goes to the backlogged UE with the highest CQI,
//! lowest UE id on ties. A grid refusal falls through to the next-best UE
//! for the same RBG.

use super::{Allocation, Candidate, commit_rbg};
use crate::grid::ResourceGrid;

pub(crate) fn assign(
    grid: &mut ResourceGrid,
    tti: usize,
    candidates: &mut [Candidate],
    allocation: &mut Allocation,
) {
    for rbg_idx in 0..grid.total_rbg() {
        // Candidates are id-ordered; a stable sort by descending CQI keeps
        // the lowest id first inside every CQI class.
        let mut order: Vec<usize> = (0..candidates.len())
            .filter(|&i| candidates[i].remaining_bits > 0)
            .collect();
        if order.is_empty() {
            break;
        }
        order.sort_by_key(|&i| std::cmp::Reverse(candidates[i].view.cqi));

        for idx in order {
            let ue_id = candidates[idx].view.ue_id;
            if grid.allocate_rbg(tti, rbg_idx, ue_id) {
                commit_rbg(grid, rbg_idx, &mut candidates[idx], allocation);
                break;
            }
        }
    }
}
