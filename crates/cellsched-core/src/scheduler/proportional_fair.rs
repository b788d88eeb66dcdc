//! Proportional-Fair RBG assignment.
//!
//! Once per TTI each active UE gets the metric `instant_rate / avg`, where
//! `instant_rate` is what the whole TTI would carry at the UE's CQI
//! (`rb_per_slot * bits_per_rb * 2 * 1000` bit/s) and `avg` is the floored
//! EMA of delivered bits. The metric is not recomputed between RBGs of the
//! same TTI. Selection is a strict max with lowest-id tie-break; the EMA
//! decay itself runs in the core for every UE every TTI.

use super::{Allocation, Candidate, commit_rbg};
use crate::grid::ResourceGrid;
use crate::ue::UserEquipment;

/// Fill in `pf_metric` for every candidate, mirroring it into the UE scratch
/// field for observability.
pub(crate) fn compute_metrics(
    candidates: &mut [Candidate],
    ues: &mut [UserEquipment],
    avg_floor: f64,
    grid: &ResourceGrid,
) {
    let rb_per_slot = grid.rb_per_slot() as f64;
    for candidate in candidates.iter_mut() {
        let instant_rate = rb_per_slot * candidate.bits_per_rb as f64 * 2.0 * 1000.0;
        let ue = &mut ues[candidate.view.handle];
        let avg = ue.average_dl_throughput.max(avg_floor);
        candidate.pf_metric = instant_rate / avg;
        ue.pf_metric = candidate.pf_metric;
    }
}

pub(crate) fn assign(
    grid: &mut ResourceGrid,
    tti: usize,
    candidates: &mut [Candidate],
    allocation: &mut Allocation,
) {
    for rbg_idx in 0..grid.total_rbg() {
        let mut order: Vec<usize> = (0..candidates.len())
            .filter(|&i| candidates[i].remaining_bits > 0)
            .collect();
        if order.is_empty() {
            break;
        }
        // Stable sort on the id-ordered list: strict metric comparison with
        // lowest UE id winning exact ties.
        order.sort_by(|&a, &b| {
            candidates[b]
                .pf_metric
                .partial_cmp(&candidates[a].pf_metric)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for idx in order {
            let ue_id = candidates[idx].view.ue_id;
            if grid.allocate_rbg(tti, rbg_idx, ue_id) {
                commit_rbg(grid, rbg_idx, &mut candidates[idx], allocation);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{PfConfig, PolicyKind};
    use crate::scheduler::SchedulerCore;
    use crate::scheduler::tests::saturated_cell;
    use crate::stats::jain_index;

    #[test]
    fn cold_start_prefers_the_better_channel() {
        // Equal (floored) averages: the metric reduces to instant rate.
        let mut cell = saturated_cell(10.0, 1, &[(1, 4), (2, 12)]);
        let mut core = SchedulerCore::new(PolicyKind::ProportionalFair, PfConfig::default());
        let result = core
            .schedule(0, 0, &mut cell.ues, &mut cell.bs, &mut cell.grid)
            .unwrap();
        assert!(result.allocation.contains_key(&2));
        assert!(!result.allocation.contains_key(&1));
    }

    #[test]
    fn served_ue_loses_priority_over_time() {
        let mut cell = saturated_cell(10.0, 2, &[(1, 4), (2, 12)]);
        let mut core = SchedulerCore::new(PolicyKind::ProportionalFair, PfConfig::default());
        // After the strong UE is served, its average climbs and the weak UE's
        // metric eventually dominates.
        let mut ue1_served = false;
        for tti in 0..20usize {
            let result = core
                .schedule(tti, tti as u64, &mut cell.ues, &mut cell.bs, &mut cell.grid)
                .unwrap();
            if result.allocation.contains_key(&1) {
                ue1_served = true;
                break;
            }
        }
        assert!(ue1_served, "PF never rotated to the weak UE");
    }

    #[test]
    fn metrics_stay_finite() {
        let mut cell = saturated_cell(5.0, 1, &[(1, 1), (2, 15)]);
        let mut core = SchedulerCore::new(PolicyKind::ProportionalFair, PfConfig::default());
        core.schedule(0, 0, &mut cell.ues, &mut cell.bs, &mut cell.grid)
            .unwrap();
        for ue in &cell.ues {
            assert!(ue.pf_metric.is_finite());
            assert!(ue.pf_metric > 0.0);
        }
    }

    fn run_totals(kind: PolicyKind, cqi: [u8; 2], ttis: usize) -> [u64; 2] {
        let mut cell = saturated_cell(10.0, (ttis / 10) as u32, &[(1, cqi[0]), (2, cqi[1])]);
        let mut core = SchedulerCore::new(kind, PfConfig::default());
        let mut totals = [0u64; 2];
        for tti in 0..ttis {
            let result = core
                .schedule(tti, tti as u64, &mut cell.ues, &mut cell.bs, &mut cell.grid)
                .unwrap();
            totals[0] += result.statistics.user_effective_throughput[&1];
            totals[1] += result.statistics.user_effective_throughput[&2];
        }
        totals
    }

    #[test]
    fn long_run_fairness_beats_best_cqi() {
        let pf = run_totals(PolicyKind::ProportionalFair, [4, 12], 500);
        let bc = run_totals(PolicyKind::BestCqi, [4, 12], 500);

        // Best-CQI starves the weak UE entirely.
        assert_eq!(bc[0], 0);
        let pf_jain = jain_index(&[pf[0] as f64, pf[1] as f64]);
        let bc_jain = jain_index(&[bc[0] as f64, bc[1] as f64]);
        assert!(pf[0] > 0, "PF must serve the weak UE");
        assert!(pf_jain > bc_jain);
        // PF converges to an equal time share, so the throughput gap does not
        // exceed the CQI-rate advantage.
        let advantage =
            crate::amc::bits_per_rb(12).unwrap() as f64 / crate::amc::bits_per_rb(4).unwrap() as f64;
        let ratio = pf[1] as f64 / pf[0] as f64;
        assert!(
            ratio <= advantage * 1.10,
            "gap {ratio:.2} exceeds rate advantage {advantage:.2}"
        );
    }

    #[test]
    fn near_equal_channels_reach_high_fairness() {
        let pf = run_totals(PolicyKind::ProportionalFair, [10, 12], 500);
        let jain = jain_index(&[pf[0] as f64, pf[1] as f64]);
        assert!(jain > 0.85, "Jain {jain} too low for a 10-vs-12 CQI pair");
    }
}
