//! Simulation configuration.
//!
//! [`SimConfig`] carries every recognised option of a run. All fields have
//! defaults, so a config deserialised from a partial JSON document is still
//! complete. [`SimConfig::validate`] applies the whitelist and cap checks
//! before any component is constructed.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::grid;

/// Cyclic-prefix length. Only `Normal` (7 OFDM symbols per slot) affects the
/// bits-per-RB formula here; `Extended` is stored for completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpType {
    Normal,
    Extended,
}

/// Which scheduling policy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    RoundRobin,
    BestCqi,
    ProportionalFair,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoundRobin => write!(f, "round_robin"),
            Self::BestCqi => write!(f, "best_cqi"),
            Self::ProportionalFair => write!(f, "proportional_fair"),
        }
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" | "rr" => Ok(Self::RoundRobin),
            "best_cqi" | "bc" => Ok(Self::BestCqi),
            "proportional_fair" | "pf" => Ok(Self::ProportionalFair),
            _ => Err(ConfigError::InvalidParameter {
                name: "scheduler",
                value: f64::NAN,
            }),
        }
    }
}

/// Byte caps of the BS-owned downlink buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Cap over the sum of all per-UE queues.
    pub global_max_bytes: usize,
    /// Cap on a single UE queue. Must not exceed `global_max_bytes`.
    pub per_ue_max_bytes: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            global_max_bytes: 1_048_576,
            per_ue_max_bytes: 262_144,
        }
    }
}

/// Proportional-Fair tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PfConfig {
    /// EMA smoothing factor for the average delivered rate.
    pub alpha: f64,
    /// Floor applied to the average before dividing, keeps the metric finite.
    pub avg_floor: f64,
}

impl Default for PfConfig {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            avg_floor: 1e-6,
        }
    }
}

/// Complete configuration of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Cell bandwidth in MHz: 1.4, 3, 5, 10, 15 or 20.
    pub bandwidth_mhz: f64,
    /// Simulation horizon in 10 ms frames; total TTIs = `num_frames * 10`.
    pub num_frames: u32,
    pub cp_type: CpType,
    pub scheduler: PolicyKind,
    pub buffer: BufferConfig,
    /// Default time-to-live stamped on generated packets.
    pub packet_ttl_ms: u64,
    pub pf: PfConfig,
    /// Master seed; every stochastic subsystem draws from one `StdRng`.
    pub seed: u64,
    /// Simulation step in ms. The scheduler runs once per step.
    pub update_interval_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            bandwidth_mhz: 10.0,
            num_frames: 10,
            cp_type: CpType::Normal,
            scheduler: PolicyKind::RoundRobin,
            buffer: BufferConfig::default(),
            packet_ttl_ms: 1000,
            pf: PfConfig::default(),
            seed: 0,
            update_interval_ms: 1,
        }
    }
}

impl SimConfig {
    /// Check the whitelist and cap invariants. Call before building components.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if grid::rb_per_slot(self.bandwidth_mhz).is_none() {
            return Err(ConfigError::UnsupportedBandwidth(self.bandwidth_mhz));
        }
        if self.num_frames == 0 {
            return Err(ConfigError::ZeroFrames);
        }
        if self.buffer.per_ue_max_bytes > self.buffer.global_max_bytes {
            return Err(ConfigError::BufferCaps {
                per_ue: self.buffer.per_ue_max_bytes,
                global: self.buffer.global_max_bytes,
            });
        }
        if !(0.0..=1.0).contains(&self.pf.alpha) {
            return Err(ConfigError::InvalidParameter {
                name: "pf.alpha",
                value: self.pf.alpha,
            });
        }
        if self.pf.avg_floor <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "pf.avg_floor",
                value: self.pf.avg_floor,
            });
        }
        if self.update_interval_ms == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "update_interval_ms",
                value: 0.0,
            });
        }
        Ok(())
    }

    /// Total number of TTIs in the horizon.
    pub fn total_tti(&self) -> usize {
        self.num_frames as usize * 10
    }
}
