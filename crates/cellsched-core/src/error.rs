//! Fatal error kinds raised by the simulator core.
//!
//! Only configuration and argument errors are fatal. Soft conditions — a busy
//! resource block, a packet rejected at admission, TTL expiry — never become
//! error values: allocation refusals are booleans consumed inside the
//! scheduler, and admission failures surface only as counters in buffer
//! telemetry.

use thiserror::Error;

/// Configuration rejected before (or while wiring up) a simulation run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Cell bandwidth must be one of the LTE channel bandwidths.
    #[error("unsupported bandwidth {0} MHz (allowed: 1.4, 3, 5, 10, 15, 20)")]
    UnsupportedBandwidth(f64),

    /// The per-UE buffer cap may not exceed the global cap.
    #[error("per-UE buffer cap {per_ue} B exceeds global cap {global} B")]
    BufferCaps { per_ue: usize, global: usize },

    /// The simulation horizon must cover at least one frame.
    #[error("num_frames must be >= 1")]
    ZeroFrames,

    /// Traffic generation was requested with no UE registered at the BS.
    #[error("traffic generation requested with no registered UE")]
    NoUesRegistered,

    /// A numeric model/config parameter is outside its valid range.
    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// Fatal argument errors surfaced by core operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// CQI outside 1..=15 handed to the AMC table.
    #[error("CQI {0} outside the valid range 1..=15")]
    InvalidCqi(u8),

    /// TTI index outside the configured horizon handed to the scheduler.
    #[error("TTI {tti} outside the simulation horizon 0..{total}")]
    TtiOutOfRange { tti: usize, total: usize },

    /// A packet with zero payload was offered for admission.
    #[error("packet size must be positive")]
    EmptyPacket,
}
