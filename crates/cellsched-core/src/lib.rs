//! # cellsched-core
//!
//! **A TTI-accurate discrete-event simulator of an LTE eNodeB downlink MAC
//! scheduler.**
//!
//! The crate models the per-millisecond scheduling pipeline of one cell:
//! traffic generators fill BS-owned per-UE buffers, mobility and channel
//! models produce a CQI per UE, and a policy (Round-Robin, Best-CQI or
//! Proportional-Fair) assigns resource-block groups on the time-frequency
//! grid, drains the buffers byte-accurately, and feeds throughput, fairness
//! and spectral-efficiency statistics.
//!
//! ## Quick Start
//!
//! ```
//! use cellsched_core::models::traffic::{PoissonTraffic, TrafficModel};
//! use cellsched_core::{PolicyKind, SimConfig, Simulation, UserEquipment};
//!
//! let config = SimConfig {
//!     num_frames: 2,
//!     scheduler: PolicyKind::ProportionalFair,
//!     ..SimConfig::default()
//! };
//! let mut sim = Simulation::new(config).unwrap();
//! for id in 1..=4 {
//!     let traffic = TrafficModel::Poisson(PoissonTraffic::new(200.0, 400, 1400).unwrap());
//!     sim.add_ue(UserEquipment::new(id, 50.0 * id as f64, 0.0).with_cqi(10), Some(traffic));
//! }
//!
//! let report = sim.run().unwrap();
//! assert_eq!(report.per_tti.len(), 20);
//! assert_eq!(report.aggregate.cell_throughput_mbps.len(), 2);
//! ```
//!
//! ## Architecture
//!
//! Per TTI: traffic → buffers → mobility → channel → CQI → scheduler → grid →
//! dequeue → stats, in that fixed order.
//!
//! - [`grid::ResourceGrid`] — Frame/subframe/slot/RB bookkeeping; atomic
//!   RBG allocation with rollback; type-0 allocation bitmaps.
//! - [`amc`] — the CQI 1..=15 modulation-and-coding table, bits per RB.
//! - [`buffer::DownlinkBuffer`] — per-UE FIFOs with byte caps, TTL expiry
//!   and byte-accurate fragmentation on dequeue.
//! - [`basestation::BaseStation`] — UE registration, traffic routing,
//!   aggregate buffer telemetry.
//! - [`scheduler::SchedulerCore`] — the policy-parameterised per-TTI
//!   allocator; external policies plug in via [`scheduler::RbgPolicy`].
//! - [`stats`] — per-TTI snapshots, Jain fairness, frame-level series.
//! - [`models`] — the collaborators: mobility, channel (RMa/UMa/UMi with
//!   correlated shadow fading) and traffic (Poisson, ON/OFF, MMPP).
//! - [`sim::Simulation`] — the harness tying it all together under one
//!   seeded RNG; equal seeds give byte-identical runs.

pub mod amc;
pub mod basestation;
pub mod buffer;
pub mod clock;
pub mod config;
pub mod error;
pub mod grid;
pub mod models;
pub mod report;
pub mod scheduler;
pub mod sim;
pub mod stats;
pub mod ue;

pub use basestation::{BaseStation, CellClass, GlobalBufferStatus};
pub use buffer::{DownlinkBuffer, DropReason, Packet, UeBufferStatus};
pub use clock::SimulationClock;
pub use config::{BufferConfig, CpType, PfConfig, PolicyKind, SimConfig};
pub use error::{ConfigError, SimError};
pub use grid::{ResourceBlock, ResourceGrid};
pub use report::{ResultsDocument, RunRecord};
pub use scheduler::{RbgCandidate, RbgPolicy, SchedulerCore, TtiResult};
pub use sim::{Simulation, SimulationReport};
pub use stats::{AggregateReport, StatsAggregator, StatsSnapshot, jain_index};
pub use ue::{UeView, UserEquipment, sinr_to_cqi};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
