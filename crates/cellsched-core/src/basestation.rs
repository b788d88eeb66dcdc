//! eNodeB model: UE registration, traffic routing, buffer telemetry.
//!
//! The base station owns the downlink buffer and the per-UE traffic models.
//! Generated packets are wrapped and routed into the right queue; everything
//! the outside world learns about queue health comes from
//! [`BaseStation::global_buffer_status`].

use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use serde::Serialize;

use crate::buffer::{DownlinkBuffer, Packet, UeBufferStatus};
use crate::error::{ConfigError, SimError};
use crate::models::traffic::TrafficModel;

/// Macrocell transmit power in dBm per bandwidth in MHz.
const MACROCELL_TX_POWER: [(f64, f64); 6] = [
    (1.4, 39.0),
    (3.0, 41.0),
    (5.0, 43.0),
    (10.0, 44.0),
    (15.0, 45.0),
    (20.0, 46.0),
];

/// Microcell transmit power in dBm per bandwidth in MHz.
const MICROCELL_TX_POWER: [(f64, f64); 6] = [
    (1.4, 30.0),
    (3.0, 32.0),
    (5.0, 34.0),
    (10.0, 36.0),
    (15.0, 37.0),
    (20.0, 38.0),
];

/// Deployment class, selects the transmit-power table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellClass {
    Macro,
    Micro,
}

/// Transmit power for a cell class and bandwidth; `None` off the whitelist.
pub fn tx_power_dbm(class: CellClass, bandwidth_mhz: f64) -> Option<f64> {
    let table = match class {
        CellClass::Macro => &MACROCELL_TX_POWER,
        CellClass::Micro => &MICROCELL_TX_POWER,
    };
    table
        .iter()
        .find(|(bw, _)| (bw - bandwidth_mhz).abs() < 1e-9)
        .map(|&(_, p)| p)
}

/// Aggregate buffer telemetry across the whole station.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GlobalBufferStatus {
    pub total_size_bytes: usize,
    pub total_packets: usize,
    pub total_dropped: u64,
    pub total_expired: u64,
    /// Packet-weighted mean queueing delay in ms.
    pub avg_delay_ms: f64,
    pub max_delay_ms: u64,
    pub per_ue: BTreeMap<u32, UeBufferStatus>,
    /// Queue fill against the per-UE cap, 0..1.
    pub per_ue_utilisation: BTreeMap<u32, f64>,
}

/// One LTE base station.
pub struct BaseStation {
    pub position: (f64, f64),
    pub height_m: f64,
    pub frequency_ghz: f64,
    pub bandwidth_mhz: f64,
    pub antenna_gain_dbi: f64,
    pub tx_power_dbm: f64,
    buffer: DownlinkBuffer,
    traffic_models: HashMap<u32, TrafficModel>,
}

impl BaseStation {
    /// A macro site at `position` with the default 15 dBi antenna.
    pub fn new(
        position: (f64, f64),
        height_m: f64,
        frequency_ghz: f64,
        bandwidth_mhz: f64,
        buffer: DownlinkBuffer,
    ) -> Result<Self, ConfigError> {
        let tx_power = tx_power_dbm(CellClass::Macro, bandwidth_mhz)
            .ok_or(ConfigError::UnsupportedBandwidth(bandwidth_mhz))?;
        Ok(Self {
            position,
            height_m,
            frequency_ghz,
            bandwidth_mhz,
            antenna_gain_dbi: 15.0,
            tx_power_dbm: tx_power,
            buffer,
            traffic_models: HashMap::new(),
        })
    }

    pub fn with_cell_class(mut self, class: CellClass) -> Result<Self, ConfigError> {
        self.tx_power_dbm = tx_power_dbm(class, self.bandwidth_mhz)
            .ok_or(ConfigError::UnsupportedBandwidth(self.bandwidth_mhz))?;
        Ok(self)
    }

    /// Register a UE: creates its queue and, optionally, its traffic model.
    pub fn register_ue(&mut self, ue_id: u32, traffic: Option<TrafficModel>) {
        self.buffer.register_ue(ue_id);
        if let Some(model) = traffic {
            self.traffic_models.insert(ue_id, model);
        }
    }

    pub fn set_traffic_model(&mut self, ue_id: u32, model: TrafficModel) {
        self.traffic_models.insert(ue_id, model);
    }

    /// Tear down a UE: queue, counters and traffic model.
    pub fn deregister_ue(&mut self, ue_id: u32) {
        self.buffer.remove_ue(ue_id);
        self.traffic_models.remove(&ue_id);
    }

    /// Whether any UE has a traffic model attached.
    pub fn has_traffic_models(&self) -> bool {
        !self.traffic_models.is_empty()
    }

    pub fn buffer(&self) -> &DownlinkBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut DownlinkBuffer {
        &mut self.buffer
    }

    /// Pull the interval `(now - dt, now]` out of the traffic models and
    /// admit the arrivals into the per-UE queues.
    ///
    /// `ue_id` limits generation to one UE; `None` serves every UE with a
    /// model. Fails when no UE is registered for traffic at all. Returns the
    /// number of packets admitted.
    pub fn generate_traffic<R: Rng>(
        &mut self,
        now_ms: u64,
        dt_ms: u64,
        ue_id: Option<u32>,
        ttl_ms: u64,
        rng: &mut R,
    ) -> Result<u64, SimError> {
        if self.traffic_models.is_empty() {
            return Err(ConfigError::NoUesRegistered.into());
        }
        let targets: Vec<u32> = match ue_id {
            Some(id) => vec![id],
            None => {
                let mut ids: Vec<u32> = self.traffic_models.keys().copied().collect();
                ids.sort_unstable();
                ids
            }
        };

        let mut admitted = 0u64;
        for target in targets {
            let Some(model) = self.traffic_models.get_mut(&target) else {
                continue;
            };
            let arrivals = model.generate(now_ms, dt_ms, rng);
            for arrival in arrivals {
                let packet = Packet {
                    size_bytes: arrival.size_bytes,
                    ue_id: target,
                    creation_time_ms: arrival.creation_time_ms,
                    priority: arrival.priority,
                    ttl_ms,
                    is_fragment: false,
                    retry_count: 0,
                };
                match self.buffer.add_packet(packet, now_ms)? {
                    true => admitted += 1,
                    false => {
                        log::debug!("DL packet for UE {target} refused at admission");
                    }
                }
            }
        }
        Ok(admitted)
    }

    /// TTL sweep over every queue.
    pub fn update_buffers(&mut self, now_ms: u64) -> u64 {
        self.buffer.update_all(now_ms)
    }

    /// Aggregate queue telemetry across all registered UEs.
    pub fn global_buffer_status(&self, now_ms: u64) -> GlobalBufferStatus {
        let mut status = GlobalBufferStatus::default();
        let mut delay_weight = 0.0;
        let mut weighted_delay = 0.0;
        let per_ue_max = self.buffer.per_ue_max();

        let mut ids: Vec<u32> = self.buffer.registered_ues().collect();
        ids.sort_unstable();
        for ue_id in ids {
            let ue = self.buffer.ue_status(ue_id, now_ms);
            status.total_size_bytes += ue.size_bytes;
            status.total_packets += ue.packet_count;
            status.total_dropped += ue.dropped;
            status.total_expired += ue.expired;
            status.max_delay_ms = status.max_delay_ms.max(ue.oldest_delay_ms);
            if ue.packet_count > 0 {
                weighted_delay += ue.avg_delay_ms * ue.packet_count as f64;
                delay_weight += ue.packet_count as f64;
            }
            let utilisation = if per_ue_max > 0 {
                ue.size_bytes as f64 / per_ue_max as f64
            } else {
                0.0
            };
            status.per_ue_utilisation.insert(ue_id, utilisation);
            status.per_ue.insert(ue_id, ue);
        }
        if delay_weight > 0.0 {
            status.avg_delay_ms = weighted_delay / delay_weight;
        }
        status
    }

    /// Drop every queued packet for every UE.
    pub fn clear_all_buffers(&mut self) {
        self.buffer.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::traffic::PoissonTraffic;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn station() -> BaseStation {
        BaseStation::new(
            (0.0, 0.0),
            35.0,
            1.8,
            10.0,
            DownlinkBuffer::new(1 << 20, 1 << 18).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn tx_power_tables() {
        assert_eq!(tx_power_dbm(CellClass::Macro, 10.0), Some(44.0));
        assert_eq!(tx_power_dbm(CellClass::Micro, 1.4), Some(30.0));
        assert_eq!(tx_power_dbm(CellClass::Macro, 6.0), None);
    }

    #[test]
    fn traffic_with_no_ues_is_a_config_error() {
        let mut bs = station();
        let mut rng = StdRng::seed_from_u64(0);
        let err = bs.generate_traffic(100, 10, None, 1000, &mut rng);
        assert_eq!(
            err,
            Err(SimError::Config(ConfigError::NoUesRegistered))
        );
    }

    #[test]
    fn generated_traffic_lands_in_the_right_queue() {
        let mut bs = station();
        let mut rng = StdRng::seed_from_u64(5);
        bs.register_ue(
            1,
            Some(TrafficModel::Poisson(
                PoissonTraffic::new(2000.0, 200, 400).unwrap(),
            )),
        );
        bs.register_ue(2, None);

        let admitted = bs.generate_traffic(1000, 1000, None, 500, &mut rng).unwrap();
        assert!(admitted > 0);
        assert!(bs.buffer().size_of(1) > 0);
        assert_eq!(bs.buffer().size_of(2), 0);
    }

    #[test]
    fn generated_packets_carry_the_requested_ttl() {
        let mut bs = station();
        let mut rng = StdRng::seed_from_u64(6);
        bs.register_ue(
            3,
            Some(TrafficModel::Poisson(
                PoissonTraffic::new(3000.0, 100, 200).unwrap(),
            )),
        );
        bs.generate_traffic(100, 100, None, 250, &mut rng).unwrap();
        let before = bs.buffer().size_of(3);
        assert!(before > 0);
        // Far beyond the TTL everything must be swept.
        bs.update_buffers(1000);
        assert_eq!(bs.buffer().size_of(3), 0);
        assert!(bs.buffer().expired_count(3) > 0);
    }

    #[test]
    fn global_status_aggregates_and_normalises() {
        let mut bs = station();
        bs.register_ue(1, None);
        bs.register_ue(2, None);
        bs.buffer_mut()
            .add_packet(Packet::new(1000, 1, 0), 0)
            .unwrap();
        bs.buffer_mut()
            .add_packet(Packet::new(3000, 2, 100), 100)
            .unwrap();

        let status = bs.global_buffer_status(200);
        assert_eq!(status.total_size_bytes, 4000);
        assert_eq!(status.total_packets, 2);
        assert_eq!(status.max_delay_ms, 200);
        // Packet-weighted mean of 200 and 100 ms.
        assert!((status.avg_delay_ms - 150.0).abs() < 1e-9);
        let util = status.per_ue_utilisation[&2];
        assert!((util - 3000.0 / (1 << 18) as f64).abs() < 1e-12);
    }

    #[test]
    fn clear_all_empties_every_queue() {
        let mut bs = station();
        bs.register_ue(1, None);
        bs.buffer_mut()
            .add_packet(Packet::new(500, 1, 0), 0)
            .unwrap();
        bs.clear_all_buffers();
        assert_eq!(bs.buffer().total_size(), 0);
    }
}
