//! Per-UE state consumed by the scheduler.
//!
//! A [`UserEquipment`] carries position and kinematics (fed by the mobility
//! model), the current CQI (fed by the channel), and the throughput history
//! the Proportional-Fair policy averages over. The scheduler itself receives
//! only [`UeView`] rows plus a handle back into the UE slice.

use crate::models::mobility::{Kinematics, MobilityModel};
use rand::Rng;

/// SINR below which the CQI floor of 1 is reported.
const SINR_CQI_LOW_DB: f64 = -6.934;
/// SINR above which the CQI ceiling of 15 is reported.
const SINR_CQI_HIGH_DB: f64 = 22.976;

/// Discretise an SINR in dB to a CQI in 1..=15 by linear interpolation over
/// the reporting range.
pub fn sinr_to_cqi(sinr_db: f64) -> u8 {
    if sinr_db <= SINR_CQI_LOW_DB {
        return 1;
    }
    if sinr_db >= SINR_CQI_HIGH_DB {
        return 15;
    }
    let step = (SINR_CQI_HIGH_DB - SINR_CQI_LOW_DB) / 14.0;
    let cqi = 1.0 + (sinr_db - SINR_CQI_LOW_DB) / step;
    (cqi as u8).clamp(1, 15)
}

/// One user terminal.
#[derive(Debug, Clone)]
pub struct UserEquipment {
    pub ue_id: u32,
    pub position: (f64, f64),
    pub height_m: f64,
    pub indoor: bool,
    pub in_car: bool,

    /// Latest reported channel quality, 1..=15.
    pub cqi: u8,
    pub sinr_db: f64,

    /// Bits delivered in the current TTI; zeroed at TTI start.
    pub current_dl_throughput_bits: u64,
    /// EMA of bits delivered per TTI.
    pub average_dl_throughput: f64,
    /// Scratch Proportional-Fair metric, recomputed each TTI.
    pub pf_metric: f64,

    pub total_transmitted_bits: u64,

    mobility: Option<MobilityModel>,
    kinematics: Kinematics,
}

impl UserEquipment {
    pub fn new(ue_id: u32, x: f64, y: f64) -> Self {
        Self {
            ue_id,
            position: (x, y),
            height_m: 1.5,
            indoor: false,
            in_car: false,
            cqi: 1,
            sinr_db: 0.0,
            current_dl_throughput_bits: 0,
            average_dl_throughput: 0.0,
            pf_metric: 0.0,
            total_transmitted_bits: 0,
            mobility: None,
            kinematics: Kinematics::default(),
        }
    }

    pub fn with_cqi(mut self, cqi: u8) -> Self {
        self.cqi = cqi;
        self
    }

    pub fn with_height(mut self, height_m: f64) -> Self {
        self.height_m = height_m;
        self
    }

    pub fn indoor(mut self) -> Self {
        self.indoor = true;
        self
    }

    pub fn set_mobility_model(&mut self, model: MobilityModel) {
        self.mobility = Some(model);
        self.kinematics = Kinematics::default();
    }

    /// Advance position by one update interval; no-op without a model.
    pub fn step_mobility<R: Rng>(&mut self, dt_ms: f64, rng: &mut R) {
        if let Some(model) = &self.mobility {
            model.step(&mut self.position, &mut self.kinematics, dt_ms, rng);
        }
    }

    pub fn velocity_mps(&self) -> f64 {
        self.kinematics.velocity_mps
    }

    /// Record the bits delivered to this UE in the current TTI.
    pub fn set_tti_throughput(&mut self, bits: u64) {
        self.current_dl_throughput_bits = bits;
        self.total_transmitted_bits += bits;
    }

    /// EMA update of the average delivered rate. Applied every TTI, whether
    /// or not the UE was served, so an idle UE's average decays.
    pub fn apply_throughput_ema(&mut self, alpha: f64, floor: f64) {
        self.average_dl_throughput = (1.0 - alpha) * self.average_dl_throughput
            + alpha * self.current_dl_throughput_bits as f64;
        if self.average_dl_throughput < floor {
            self.average_dl_throughput = floor;
        }
    }
}

/// Compact per-UE row handed to the scheduler: identity, channel quality,
/// queued bytes, and a handle back into the UE slice. The scheduler touches
/// nothing else.
#[derive(Debug, Clone, Copy)]
pub struct UeView {
    pub ue_id: u32,
    pub cqi: u8,
    pub buffer_bytes: usize,
    /// Index of this UE in the slice the scheduler mutates.
    pub handle: usize,
}
