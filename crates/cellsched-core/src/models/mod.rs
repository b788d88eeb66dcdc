//! Collaborator models feeding the scheduling core.
//!
//! The core consumes these only through narrow seams: traffic models emit
//! packet arrivals, mobility models emit position updates, and the channel
//! emits a per-UE SINR that is discretised to a CQI. Every stochastic draw
//! comes from the caller-supplied RNG, so a fixed seed reproduces a run
//! exactly.

pub mod channel;
pub mod mobility;
pub mod traffic;

pub use channel::{CellSite, ChannelModel, Scenario, UeGeometry};
pub use mobility::{Area, Kinematics, MobilityModel};
pub use traffic::{PacketArrival, TrafficModel};
