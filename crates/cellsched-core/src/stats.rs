//! Per-TTI snapshots and end-of-run throughput/fairness aggregation.
//!
//! The snapshot distinguishes *max* throughput (what the allocated RBs could
//! carry at the UE's CQI) from *effective* throughput (what the buffer
//! actually produced); effective never exceeds max. Frame-level series are in
//! Mbit/s: bits per 1 ms TTI divided by 1000.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::amc;
use crate::ue::UserEquipment;

/// Jain's fairness index `(Σx)² / (n·Σx²)`.
///
/// By convention 1.0 for an empty set or when every value is zero.
pub fn jain_index(values: &[f64]) -> f64 {
    let sum: f64 = values.iter().sum();
    let sum_sq: f64 = values.iter().map(|x| x * x).sum();
    if sum_sq == 0.0 {
        return 1.0;
    }
    (sum * sum) / (values.len() as f64 * sum_sq)
}

/// Throughput accounting for one TTI.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsSnapshot {
    pub tti: usize,
    /// RBs assigned this TTI, counting both slots.
    pub total_allocated_rbs: u64,
    /// Bits the allocation could carry per UE at its CQI.
    pub user_max_throughput: BTreeMap<u32, u64>,
    /// Bits actually drained from each UE's buffer, capped at max.
    pub user_effective_throughput: BTreeMap<u32, u64>,
    /// Alias of `user_effective_throughput`, kept for report consumers.
    pub user_throughput: BTreeMap<u32, u64>,
    pub total_effective_bits: u64,
    /// Mean effective bits over the UEs that received anything, else 0.
    pub average_dl_throughput: f64,
}

/// Build the snapshot for one TTI from the allocation map and UE state.
///
/// Every UE appears in the per-UE maps, served or not. The effective figure
/// comes from `current_dl_throughput_bits`, which the scheduler set from the
/// real dequeue.
pub fn build_snapshot(
    tti: usize,
    allocation: &BTreeMap<u32, Vec<usize>>,
    ues: &[UserEquipment],
) -> StatsSnapshot {
    let mut snapshot = StatsSnapshot {
        tti,
        ..StatsSnapshot::default()
    };

    for ue in ues {
        let rb_count = allocation
            .get(&ue.ue_id)
            .map(|freqs| freqs.len() as u64 * 2)
            .unwrap_or(0);
        let max_bits = if rb_count > 0 {
            rb_count * amc::bits_per_rb(ue.cqi).unwrap_or(0) as u64
        } else {
            0
        };
        let effective = ue.current_dl_throughput_bits.min(max_bits);

        snapshot.total_allocated_rbs += rb_count;
        snapshot.total_effective_bits += effective;
        snapshot.user_max_throughput.insert(ue.ue_id, max_bits);
        snapshot.user_effective_throughput.insert(ue.ue_id, effective);
        snapshot.user_throughput.insert(ue.ue_id, effective);
    }

    let served = snapshot
        .user_effective_throughput
        .values()
        .filter(|&&bits| bits > 0)
        .count();
    if served > 0 {
        snapshot.average_dl_throughput = snapshot.total_effective_bits as f64 / served as f64;
    }
    snapshot
}

/// End-of-run aggregate report, the persisted shape of a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub sim_duration_ms: u64,
    /// Per-frame cell throughput in Mbit/s.
    pub cell_throughput_mbps: Vec<f64>,
    /// Per-UE per-frame throughput in Mbit/s.
    pub user_throughput_mbps: BTreeMap<u32, Vec<f64>>,
    /// Per-UE mean throughput over the whole run in Mbit/s.
    pub avg_user_throughput_mbps: BTreeMap<u32, f64>,
    pub jain_index_per_frame: Vec<f64>,
    pub jain_index_overall: f64,
    /// Per-frame spectral efficiency in bit/s/Hz.
    pub spectral_efficiency: Vec<f64>,
}

/// Accumulates per-TTI snapshots and folds them into frame-level series.
pub struct StatsAggregator {
    bandwidth_mhz: f64,
    ue_ids: Vec<u32>,
    tti_total_bits: Vec<u64>,
    tti_user_bits: Vec<HashMap<u32, u64>>,
}

impl StatsAggregator {
    /// `ue_ids` fixes the population every fairness figure ranges over.
    pub fn new(bandwidth_mhz: f64, mut ue_ids: Vec<u32>) -> Self {
        ue_ids.sort_unstable();
        ue_ids.dedup();
        Self {
            bandwidth_mhz,
            ue_ids,
            tti_total_bits: Vec::new(),
            tti_user_bits: Vec::new(),
        }
    }

    /// Record one TTI. Snapshots must arrive in TTI order.
    pub fn record(&mut self, snapshot: &StatsSnapshot) {
        self.tti_total_bits.push(snapshot.total_effective_bits);
        self.tti_user_bits.push(
            snapshot
                .user_effective_throughput
                .iter()
                .map(|(&ue, &bits)| (ue, bits))
                .collect(),
        );
    }

    pub fn recorded_ttis(&self) -> usize {
        self.tti_total_bits.len()
    }

    /// Fold the recorded TTIs into the aggregate report.
    pub fn finalize(&self) -> AggregateReport {
        let ttis = self.tti_total_bits.len();
        let frames = ttis.div_ceil(10);

        let mut cell_throughput_mbps = Vec::with_capacity(frames);
        let mut user_throughput_mbps: BTreeMap<u32, Vec<f64>> = self
            .ue_ids
            .iter()
            .map(|&ue| (ue, Vec::with_capacity(frames)))
            .collect();
        let mut jain_index_per_frame = Vec::with_capacity(frames);

        for frame in 0..frames {
            let range = frame * 10..((frame + 1) * 10).min(ttis);
            let len = range.len() as f64;
            let frame_bits: u64 = self.tti_total_bits[range.clone()].iter().sum();
            // Bits per 1 ms TTI == kbit/s; divide by 1000 for Mbit/s.
            cell_throughput_mbps.push(frame_bits as f64 / len / 1000.0);

            let mut frame_user: Vec<f64> = Vec::with_capacity(self.ue_ids.len());
            for &ue in &self.ue_ids {
                let bits: u64 = self.tti_user_bits[range.clone()]
                    .iter()
                    .map(|m| m.get(&ue).copied().unwrap_or(0))
                    .sum();
                let mbps = bits as f64 / len / 1000.0;
                if let Some(series) = user_throughput_mbps.get_mut(&ue) {
                    series.push(mbps);
                }
                frame_user.push(mbps);
            }
            jain_index_per_frame.push(jain_index(&frame_user));
        }

        let avg_user_throughput_mbps: BTreeMap<u32, f64> = user_throughput_mbps
            .iter()
            .map(|(&ue, series)| {
                let mean = if series.is_empty() {
                    0.0
                } else {
                    series.iter().sum::<f64>() / series.len() as f64
                };
                (ue, mean)
            })
            .collect();
        let overall: Vec<f64> = avg_user_throughput_mbps.values().copied().collect();
        let spectral_efficiency = cell_throughput_mbps
            .iter()
            .map(|mbps| mbps / self.bandwidth_mhz)
            .collect();

        AggregateReport {
            sim_duration_ms: ttis as u64,
            cell_throughput_mbps,
            user_throughput_mbps,
            avg_user_throughput_mbps,
            jain_index_per_frame,
            jain_index_overall: jain_index(&overall),
            spectral_efficiency,
        }
    }
}
