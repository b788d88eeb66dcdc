//! Plug-in seam for external allocation policies.
//!
//! Replaces the out-of-process classifier bridge of earlier experiments: an
//! external policy sees the same per-RBG candidate rows the built-ins select
//! over and names a UE for each group. The core validates the answer, so a
//! plug-in can neither double-book a group nor invent a UE; a refused or
//! invalid pick simply leaves the group empty.

use super::{Allocation, Candidate, commit_rbg};
use crate::grid::ResourceGrid;

/// What an external policy sees for one backlogged UE.
#[derive(Debug, Clone, Copy)]
pub struct RbgCandidate {
    pub ue_id: u32,
    pub cqi: u8,
    pub remaining_bits: i64,
    pub average_dl_throughput: f64,
}

/// An external per-RBG allocation policy.
pub trait RbgPolicy: Send {
    /// Short policy name used as the results-document key.
    fn name(&self) -> &str {
        "external"
    }

    /// Choose the UE for `rbg_idx`, or `None` to leave the group empty.
    /// `candidates` only contains backlogged UEs with valid CQI.
    fn pick(&mut self, tti: usize, rbg_idx: usize, candidates: &[RbgCandidate]) -> Option<u32>;
}

pub(crate) fn assign(
    grid: &mut ResourceGrid,
    tti: usize,
    candidates: &mut [Candidate],
    allocation: &mut Allocation,
    plugin: &mut dyn RbgPolicy,
) {
    for rbg_idx in 0..grid.total_rbg() {
        let rows: Vec<RbgCandidate> = candidates
            .iter()
            .filter(|c| c.remaining_bits > 0)
            .map(|c| RbgCandidate {
                ue_id: c.view.ue_id,
                cqi: c.view.cqi,
                remaining_bits: c.remaining_bits,
                average_dl_throughput: c.average_dl_throughput,
            })
            .collect();
        if rows.is_empty() {
            break;
        }
        let Some(ue_id) = plugin.pick(tti, rbg_idx, &rows) else {
            continue;
        };
        let Some(idx) = candidates
            .iter()
            .position(|c| c.view.ue_id == ue_id && c.remaining_bits > 0)
        else {
            continue;
        };
        if grid.allocate_rbg(tti, rbg_idx, ue_id) {
            commit_rbg(grid, rbg_idx, &mut candidates[idx], allocation);
        }
    }
}
