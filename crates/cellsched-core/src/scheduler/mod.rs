//! Policy-parameterised per-TTI allocator.
//!
//! One [`SchedulerCore`] drives every policy through the same per-TTI
//! pipeline: zero throughputs, build the active set, hand the RBG loop to the
//! policy, dequeue against the real allocation, update the throughput EMA,
//! snapshot statistics. Policies are a tagged enum, so the per-RBG hot loop
//! dispatches on a branch, not a vtable; the external-classifier plug-in is
//! the one boxed seam and lives behind its own variant.
//!
//! Determinism: candidates are ordered by ascending UE id, selection uses
//! strict comparisons with lowest-id tie-breaks, and grid refusals make the
//! policy retry the next-best UE for the same RBG (Best-CQI/PF) or move on
//! (Round-Robin). Refusals are never surfaced.

mod best_cqi;
mod plugin;
mod proportional_fair;
mod round_robin;

pub use plugin::{RbgCandidate, RbgPolicy};

use std::collections::BTreeMap;

use crate::amc;
use crate::basestation::BaseStation;
use crate::config::{PfConfig, PolicyKind};
use crate::error::SimError;
use crate::grid::ResourceGrid;
use crate::stats::{self, StatsSnapshot};
use crate::ue::{UeView, UserEquipment};

/// Allocation map of one TTI: UE id → assigned frequency indices (one entry
/// per RB pair; both slots are always covered).
pub type Allocation = BTreeMap<u32, Vec<usize>>;

/// Result of scheduling one TTI.
#[derive(Debug, Clone)]
pub struct TtiResult {
    pub tti: usize,
    pub allocation: Allocation,
    /// RBG-level Resource Allocation type-0 bitmap per active UE.
    pub bitmap: BTreeMap<u32, Vec<bool>>,
    pub statistics: StatsSnapshot,
}

/// One active-set row the policies select over.
pub(crate) struct Candidate {
    pub view: UeView,
    pub bits_per_rb: u32,
    pub remaining_bits: i64,
    pub average_dl_throughput: f64,
    pub pf_metric: f64,
}

/// Policy state. Round-Robin is the only stateful built-in.
pub enum Policy {
    RoundRobin { last_served_ue_id: Option<u32> },
    BestCqi,
    ProportionalFair,
    /// External per-RBG classifier behind the plug-in seam.
    External(Box<dyn RbgPolicy>),
}

impl Policy {
    pub fn kind_name(&self) -> &str {
        match self {
            Self::RoundRobin { .. } => "round_robin",
            Self::BestCqi => "best_cqi",
            Self::ProportionalFair => "proportional_fair",
            Self::External(p) => p.name(),
        }
    }
}

/// The per-TTI allocator.
pub struct SchedulerCore {
    policy: Policy,
    pf: PfConfig,
}

impl SchedulerCore {
    pub fn new(kind: PolicyKind, pf: PfConfig) -> Self {
        let policy = match kind {
            PolicyKind::RoundRobin => Policy::RoundRobin {
                last_served_ue_id: None,
            },
            PolicyKind::BestCqi => Policy::BestCqi,
            PolicyKind::ProportionalFair => Policy::ProportionalFair,
        };
        Self { policy, pf }
    }

    /// Wrap an external per-RBG policy (e.g. a learned classifier bridge).
    pub fn with_plugin(plugin: Box<dyn RbgPolicy>, pf: PfConfig) -> Self {
        Self {
            policy: Policy::External(plugin),
            pf,
        }
    }

    pub fn policy_name(&self) -> &str {
        self.policy.kind_name()
    }

    /// Schedule one TTI.
    ///
    /// `now_ms` is the simulation time the buffer operations are keyed by
    /// (equal to `tti` when the step is 1 ms). An empty active set is a
    /// normal no-op result; an out-of-horizon TTI is fatal.
    pub fn schedule(
        &mut self,
        tti: usize,
        now_ms: u64,
        ues: &mut [UserEquipment],
        bs: &mut BaseStation,
        grid: &mut ResourceGrid,
    ) -> Result<TtiResult, SimError> {
        if tti >= grid.total_tti() {
            return Err(SimError::TtiOutOfRange {
                tti,
                total: grid.total_tti(),
            });
        }

        for ue in ues.iter_mut() {
            ue.current_dl_throughput_bits = 0;
        }

        // Active set: queued data and a valid CQI. Ordered by UE id so every
        // tie-break below is reproducible.
        let mut candidates: Vec<Candidate> = Vec::new();
        for (handle, ue) in ues.iter().enumerate() {
            let buffer_bytes = bs.buffer().size_of(ue.ue_id);
            if buffer_bytes == 0 {
                continue;
            }
            let Ok(bits_per_rb) = amc::bits_per_rb(ue.cqi) else {
                continue;
            };
            candidates.push(Candidate {
                view: UeView {
                    ue_id: ue.ue_id,
                    cqi: ue.cqi,
                    buffer_bytes,
                    handle,
                },
                bits_per_rb,
                remaining_bits: buffer_bytes as i64 * 8,
                average_dl_throughput: ue.average_dl_throughput,
                pf_metric: 0.0,
            });
        }
        candidates.sort_unstable_by_key(|c| c.view.ue_id);

        let mut allocation = Allocation::new();
        match &mut self.policy {
            Policy::RoundRobin { last_served_ue_id } => round_robin::assign(
                grid,
                tti,
                &mut candidates,
                &mut allocation,
                last_served_ue_id,
            ),
            Policy::BestCqi => best_cqi::assign(grid, tti, &mut candidates, &mut allocation),
            Policy::ProportionalFair => {
                proportional_fair::compute_metrics(&mut candidates, ues, self.pf.avg_floor, grid);
                proportional_fair::assign(grid, tti, &mut candidates, &mut allocation);
            }
            Policy::External(plugin) => {
                plugin::assign(grid, tti, &mut candidates, &mut allocation, plugin.as_mut());
            }
        }

        // Dequeue against the real allocation. UEs without RBs still get the
        // zero-budget call so their queues are TTL-swept every TTI.
        for ue in ues.iter_mut() {
            let rb_count = allocation
                .get(&ue.ue_id)
                .map(|freqs| freqs.len() as u64 * 2)
                .unwrap_or(0);
            let max_bytes = if rb_count > 0 {
                let bits_per_rb = amc::bits_per_rb(ue.cqi)?;
                (rb_count * bits_per_rb as u64 / 8) as usize
            } else {
                0
            };
            let (_packets, bytes_sent) = bs.buffer_mut().get_packets(ue.ue_id, max_bytes, now_ms);
            ue.set_tti_throughput(bytes_sent as u64 * 8);
        }

        // EMA runs for every UE in every TTI, served or not, so that an idle
        // UE's average decays instead of freezing.
        for ue in ues.iter_mut() {
            ue.apply_throughput_ema(self.pf.alpha, self.pf.avg_floor);
        }

        let bitmap: BTreeMap<u32, Vec<bool>> = candidates
            .iter()
            .map(|c| (c.view.ue_id, grid.generate_bitmap(tti, c.view.ue_id)))
            .collect();

        let statistics = stats::build_snapshot(tti, &allocation, ues);
        Ok(TtiResult {
            tti,
            allocation,
            bitmap,
            statistics,
        })
    }
}

/// Shared by the selection policies: charge an RBG's capacity to a candidate
/// and record the allocation.
pub(crate) fn commit_rbg(
    grid: &ResourceGrid,
    rbg_idx: usize,
    candidate: &mut Candidate,
    allocation: &mut Allocation,
) {
    let freqs = grid.rbg_indices(rbg_idx);
    let capacity = freqs.len() as i64 * candidate.bits_per_rb as i64 * 2;
    candidate.remaining_bits -= capacity.min(candidate.remaining_bits);
    allocation
        .entry(candidate.view.ue_id)
        .or_default()
        .extend(freqs);
}
