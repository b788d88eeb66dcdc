//! BS-owned downlink buffer layer.
//!
//! One FIFO queue per registered UE, plus two byte caps: `per_ue_max` bounds a
//! single queue and `global_max` bounds the sum of all queues. Admission
//! failures and TTL expiries are never errors — they are counted per UE and
//! surface only through the status queries. Dequeue is byte-accurate: when the
//! head packet does not fit the budget it is split, the fragment inherits the
//! packet's priority, TTL and creation time, and the residual head packet's
//! creation time is refreshed to model re-buffering.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SimError};

/// A downlink packet queued for one UE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub size_bytes: usize,
    pub ue_id: u32,
    pub creation_time_ms: u64,
    /// Reserved for QoS differentiation, 0..=10.
    pub priority: u8,
    pub ttl_ms: u64,
    pub is_fragment: bool,
    /// Reserved for HARQ retransmission accounting.
    pub retry_count: u32,
}

impl Packet {
    /// A fresh full packet with default priority and TTL.
    pub fn new(size_bytes: usize, ue_id: u32, creation_time_ms: u64) -> Self {
        Self {
            size_bytes,
            ue_id,
            creation_time_ms,
            priority: 0,
            ttl_ms: 1000,
            is_fragment: false,
            retry_count: 0,
        }
    }

    pub fn with_ttl(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Packet age relative to `now_ms` (0 for future creation times).
    pub fn age(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.creation_time_ms)
    }

    fn is_expired(&self, now_ms: u64) -> bool {
        self.age(now_ms) > self.ttl_ms
    }
}

/// Why a packet was refused at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    UeLimit,
    GlobalLimit,
}

/// Record of one refused packet, kept per UE for telemetry.
#[derive(Debug, Clone, Serialize)]
pub struct DroppedPacketInfo {
    pub size_bytes: usize,
    pub creation_time_ms: u64,
    pub priority: u8,
    pub reason: DropReason,
}

#[derive(Debug, Clone, Copy, Default)]
struct IngressStats {
    total_bytes: u64,
    start_time_ms: Option<u64>,
}

/// Per-UE snapshot returned by the status queries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UeBufferStatus {
    pub size_bytes: usize,
    pub packet_count: usize,
    /// Age of the oldest queued packet in ms.
    pub oldest_delay_ms: u64,
    /// Mean age of queued packets in ms.
    pub avg_delay_ms: f64,
    pub dropped: u64,
    pub expired: u64,
    pub ingress_bytes: u64,
    pub ingress_rate_bps: f64,
}

/// The downlink buffer: every per-UE FIFO of one base station.
pub struct DownlinkBuffer {
    global_max: usize,
    per_ue_max: usize,
    total_size: usize,
    queues: HashMap<u32, VecDeque<Packet>>,
    sizes: HashMap<u32, usize>,
    dropped: HashMap<u32, u64>,
    expired: HashMap<u32, u64>,
    dropped_info: HashMap<u32, Vec<DroppedPacketInfo>>,
    ingress: HashMap<u32, IngressStats>,
}

impl DownlinkBuffer {
    pub fn new(global_max: usize, per_ue_max: usize) -> Result<Self, ConfigError> {
        if per_ue_max > global_max {
            return Err(ConfigError::BufferCaps {
                per_ue: per_ue_max,
                global: global_max,
            });
        }
        Ok(Self {
            global_max,
            per_ue_max,
            total_size: 0,
            queues: HashMap::new(),
            sizes: HashMap::new(),
            dropped: HashMap::new(),
            expired: HashMap::new(),
            dropped_info: HashMap::new(),
            ingress: HashMap::new(),
        })
    }

    /// Create an (empty) queue for a UE. Idempotent.
    pub fn register_ue(&mut self, ue_id: u32) {
        self.queues.entry(ue_id).or_default();
        self.sizes.entry(ue_id).or_insert(0);
    }

    /// Drop every packet of a UE and reset its counters.
    pub fn destroy_ue(&mut self, ue_id: u32) {
        if let Some(queue) = self.queues.get_mut(&ue_id) {
            let freed: usize = queue.iter().map(|p| p.size_bytes).sum();
            queue.clear();
            self.total_size -= freed;
        }
        self.sizes.insert(ue_id, 0);
        self.dropped.remove(&ue_id);
        self.expired.remove(&ue_id);
        self.dropped_info.remove(&ue_id);
        self.ingress.remove(&ue_id);
    }

    /// Remove a UE's queue entirely (deregistration).
    pub fn remove_ue(&mut self, ue_id: u32) {
        self.destroy_ue(ue_id);
        self.queues.remove(&ue_id);
        self.sizes.remove(&ue_id);
    }

    /// Drop every queued packet of every UE, keeping registrations.
    pub fn clear_all(&mut self) {
        let ids: Vec<u32> = self.queues.keys().copied().collect();
        for ue_id in ids {
            self.destroy_ue(ue_id);
            self.register_ue(ue_id);
        }
        self.total_size = 0;
    }

    /// Retire TTL-stale packets from one queue, updating size accounting.
    fn sweep_expired(&mut self, ue_id: u32, now_ms: u64) -> u64 {
        let Some(queue) = self.queues.get_mut(&ue_id) else {
            return 0;
        };
        let before = queue.len();
        let mut freed = 0usize;
        queue.retain(|p| {
            if p.is_expired(now_ms) {
                freed += p.size_bytes;
                false
            } else {
                true
            }
        });
        let expired_count = (before - queue.len()) as u64;
        if expired_count > 0 {
            *self.sizes.entry(ue_id).or_insert(0) -= freed;
            self.total_size -= freed;
            *self.expired.entry(ue_id).or_insert(0) += expired_count;
        }
        expired_count
    }

    /// Offer a packet for admission.
    ///
    /// Returns `Ok(true)` when queued, `Ok(false)` when refused by a cap (the
    /// refusal is counted against the UE). A zero-size packet is a fatal
    /// argument error. Stale packets of the target queue are retired first,
    /// so a full queue of expired data does not block fresh traffic.
    pub fn add_packet(&mut self, packet: Packet, now_ms: u64) -> Result<bool, SimError> {
        if packet.size_bytes == 0 {
            return Err(SimError::EmptyPacket);
        }
        let ue_id = packet.ue_id;
        self.register_ue(ue_id);
        self.sweep_expired(ue_id, now_ms);

        let ue_size = self.sizes.get(&ue_id).copied().unwrap_or(0);
        let reason = if ue_size + packet.size_bytes > self.per_ue_max {
            Some(DropReason::UeLimit)
        } else if self.total_size + packet.size_bytes > self.global_max {
            Some(DropReason::GlobalLimit)
        } else {
            None
        };

        if let Some(reason) = reason {
            *self.dropped.entry(ue_id).or_insert(0) += 1;
            self.dropped_info
                .entry(ue_id)
                .or_default()
                .push(DroppedPacketInfo {
                    size_bytes: packet.size_bytes,
                    creation_time_ms: packet.creation_time_ms,
                    priority: packet.priority,
                    reason,
                });
            return Ok(false);
        }

        let stats = self.ingress.entry(ue_id).or_default();
        if stats.start_time_ms.is_none() {
            stats.start_time_ms = Some(now_ms);
        }
        stats.total_bytes += packet.size_bytes as u64;

        *self.sizes.entry(ue_id).or_insert(0) += packet.size_bytes;
        self.total_size += packet.size_bytes;
        self.queues.entry(ue_id).or_default().push_back(packet);
        Ok(true)
    }

    /// Dequeue up to `max_bytes` from a UE queue, splitting the head packet
    /// when it does not fit.
    ///
    /// Returns the extracted packets/fragments and the exact byte count. No
    /// byte is lost or invented: the extracted bytes plus the bytes left in
    /// the queue equal the bytes present before the call (after TTL sweep).
    pub fn get_packets(
        &mut self,
        ue_id: u32,
        max_bytes: usize,
        now_ms: u64,
    ) -> (Vec<Packet>, usize) {
        self.sweep_expired(ue_id, now_ms);

        let Some(queue) = self.queues.get_mut(&ue_id) else {
            return (Vec::new(), 0);
        };

        let max_bits = max_bytes * 8;
        let mut selected = Vec::new();
        let mut total_bits = 0usize;
        let mut extracted = 0usize;

        while let Some(head) = queue.front_mut() {
            let head_bits = head.size_bytes * 8;
            if total_bits + head_bits <= max_bits {
                let Some(packet) = queue.pop_front() else {
                    break;
                };
                total_bits += head_bits;
                extracted += packet.size_bytes;
                selected.push(packet);
            } else {
                let remaining_bits = max_bits - total_bits;
                let fragment_size = remaining_bits / 8;
                if fragment_size == 0 {
                    break;
                }
                let fragment = Packet {
                    size_bytes: fragment_size,
                    ue_id,
                    creation_time_ms: head.creation_time_ms,
                    priority: head.priority,
                    ttl_ms: head.ttl_ms,
                    is_fragment: true,
                    retry_count: head.retry_count,
                };
                head.size_bytes -= fragment_size;
                // Residual head re-enters the queue as freshly buffered data.
                head.creation_time_ms = now_ms;
                total_bits += fragment_size * 8;
                extracted += fragment_size;
                selected.push(fragment);
                break;
            }
        }

        if extracted > 0 {
            *self.sizes.entry(ue_id).or_insert(0) -= extracted;
            self.total_size -= extracted;
        }
        (selected, extracted)
    }

    /// TTL sweep of one queue; returns the number of retired packets.
    pub fn update_ue_buffer(&mut self, ue_id: u32, now_ms: u64) -> u64 {
        self.sweep_expired(ue_id, now_ms)
    }

    /// TTL sweep across every queue; returns total retired packets.
    pub fn update_all(&mut self, now_ms: u64) -> u64 {
        let ids: Vec<u32> = self.queues.keys().copied().collect();
        ids.into_iter()
            .map(|ue_id| self.sweep_expired(ue_id, now_ms))
            .sum()
    }

    /// Snapshot of one UE's queue.
    pub fn ue_status(&self, ue_id: u32, now_ms: u64) -> UeBufferStatus {
        let queue = self.queues.get(&ue_id);
        let (oldest, avg) = match queue {
            Some(q) if !q.is_empty() => {
                let delays: Vec<u64> = q.iter().map(|p| p.age(now_ms)).collect();
                let oldest = delays.iter().copied().max().unwrap_or(0);
                let avg = delays.iter().sum::<u64>() as f64 / delays.len() as f64;
                (oldest, avg)
            }
            _ => (0, 0.0),
        };
        let ingress = self.ingress.get(&ue_id).copied().unwrap_or_default();
        let ingress_rate_bps = match ingress.start_time_ms {
            Some(start) if now_ms > start => {
                (ingress.total_bytes * 8) as f64 / (now_ms - start) as f64 * 1000.0
            }
            _ => 0.0,
        };
        UeBufferStatus {
            size_bytes: self.sizes.get(&ue_id).copied().unwrap_or(0),
            packet_count: queue.map(VecDeque::len).unwrap_or(0),
            oldest_delay_ms: oldest,
            avg_delay_ms: avg,
            dropped: self.dropped.get(&ue_id).copied().unwrap_or(0),
            expired: self.expired.get(&ue_id).copied().unwrap_or(0),
            ingress_bytes: ingress.total_bytes,
            ingress_rate_bps,
        }
    }

    /// Bytes queued for one UE.
    pub fn size_of(&self, ue_id: u32) -> usize {
        self.sizes.get(&ue_id).copied().unwrap_or(0)
    }

    /// Bytes queued across all UEs.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn per_ue_max(&self) -> usize {
        self.per_ue_max
    }

    pub fn global_max(&self) -> usize {
        self.global_max
    }

    pub fn dropped_count(&self, ue_id: u32) -> u64 {
        self.dropped.get(&ue_id).copied().unwrap_or(0)
    }

    pub fn expired_count(&self, ue_id: u32) -> u64 {
        self.expired.get(&ue_id).copied().unwrap_or(0)
    }

    /// Admission-refusal records for one UE.
    pub fn dropped_info(&self, ue_id: u32) -> &[DroppedPacketInfo] {
        self.dropped_info
            .get(&ue_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn registered_ues(&self) -> impl Iterator<Item = u32> + '_ {
        self.queues.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> DownlinkBuffer {
        DownlinkBuffer::new(8000, 5000).unwrap()
    }

    #[test]
    fn caps_must_be_ordered() {
        assert!(matches!(
            DownlinkBuffer::new(100, 200),
            Err(ConfigError::BufferCaps { .. })
        ));
    }

    #[test]
    fn fifo_admission_and_sizes() {
        let mut buf = buffer();
        assert!(buf.add_packet(Packet::new(2000, 1, 0), 0).unwrap());
        assert!(buf.add_packet(Packet::new(1500, 1, 10), 10).unwrap());
        assert_eq!(buf.size_of(1), 3500);
        assert_eq!(buf.total_size(), 3500);
    }

    #[test]
    fn per_ue_cap_rejects_with_reason() {
        let mut buf = buffer();
        assert!(buf.add_packet(Packet::new(4000, 1, 0), 0).unwrap());
        assert!(!buf.add_packet(Packet::new(1500, 1, 0), 0).unwrap());
        assert_eq!(buf.dropped_count(1), 1);
        assert_eq!(buf.dropped_info(1)[0].reason, DropReason::UeLimit);
        // Sizes untouched by the refusal.
        assert_eq!(buf.size_of(1), 4000);
    }

    #[test]
    fn global_cap_spans_ues() {
        let mut buf = buffer();
        assert!(buf.add_packet(Packet::new(4500, 1, 0), 0).unwrap());
        assert!(buf.add_packet(Packet::new(3000, 2, 0), 0).unwrap());
        // UE 3 alone is under its cap but the sum is not.
        assert!(!buf.add_packet(Packet::new(1000, 3, 0), 0).unwrap());
        assert_eq!(buf.dropped_info(3)[0].reason, DropReason::GlobalLimit);
        assert_eq!(buf.total_size(), 7500);
    }

    #[test]
    fn zero_size_packet_is_fatal() {
        let mut buf = buffer();
        assert_eq!(
            buf.add_packet(Packet::new(0, 1, 0), 0),
            Err(SimError::EmptyPacket)
        );
    }

    #[test]
    fn expired_packets_are_swept_on_admission() {
        let mut buf = buffer();
        assert!(
            buf.add_packet(Packet::new(4000, 1, 0).with_ttl(500), 0)
                .unwrap()
        );
        // At t=600 the first packet is stale; the new one must fit.
        assert!(buf.add_packet(Packet::new(3000, 1, 600), 600).unwrap());
        assert_eq!(buf.expired_count(1), 1);
        assert_eq!(buf.size_of(1), 3000);
    }

    #[test]
    fn whole_packet_dequeue() {
        let mut buf = buffer();
        buf.add_packet(Packet::new(100, 1, 0), 0).unwrap();
        buf.add_packet(Packet::new(200, 1, 0), 0).unwrap();
        let (packets, bytes) = buf.get_packets(1, 300, 1);
        assert_eq!(packets.len(), 2);
        assert_eq!(bytes, 300);
        assert_eq!(buf.size_of(1), 0);
        assert!(!packets.iter().any(|p| p.is_fragment));
    }

    #[test]
    fn fragmentation_preserves_bytes() {
        let mut buf = DownlinkBuffer::new(1 << 20, 1 << 20).unwrap();
        buf.add_packet(Packet::new(10_000, 1, 0).with_ttl(u64::MAX), 0)
            .unwrap();
        let (packets, bytes) = buf.get_packets(1, 3, 0);
        assert_eq!(packets.len(), 1);
        assert!(packets[0].is_fragment);
        assert_eq!(packets[0].size_bytes, 3);
        assert_eq!(bytes, 3);
        assert_eq!(buf.size_of(1), 9_997);

        // Drain the rest and check nothing is lost or invented.
        let mut total = bytes;
        loop {
            let (chunk, n) = buf.get_packets(1, 997, 0);
            if n == 0 {
                assert!(chunk.is_empty());
                break;
            }
            assert_eq!(chunk.iter().map(|p| p.size_bytes).sum::<usize>(), n);
            total += n;
        }
        assert_eq!(total, 10_000);
        assert_eq!(buf.size_of(1), 0);
    }

    #[test]
    fn fragment_inherits_metadata_and_residual_is_refreshed() {
        let mut buf = buffer();
        buf.add_packet(
            Packet::new(1000, 7, 100).with_ttl(5000).with_priority(3),
            100,
        )
        .unwrap();
        let (packets, _) = buf.get_packets(7, 400, 250);
        assert_eq!(packets[0].creation_time_ms, 100);
        assert_eq!(packets[0].priority, 3);
        assert_eq!(packets[0].ttl_ms, 5000);
        // The residual head packet was re-stamped at dequeue time.
        let status = buf.ue_status(7, 250);
        assert_eq!(status.oldest_delay_ms, 0);
        assert_eq!(status.size_bytes, 600);
    }

    #[test]
    fn sub_byte_budget_extracts_nothing() {
        let mut buf = buffer();
        buf.add_packet(Packet::new(100, 1, 0), 0).unwrap();
        let (packets, bytes) = buf.get_packets(1, 0, 0);
        assert!(packets.is_empty());
        assert_eq!(bytes, 0);
        assert_eq!(buf.size_of(1), 100);
    }

    #[test]
    fn expired_packets_never_dequeue() {
        let mut buf = buffer();
        buf.add_packet(Packet::new(500, 1, 0).with_ttl(100), 0)
            .unwrap();
        buf.add_packet(Packet::new(300, 1, 150).with_ttl(1000), 150)
            .unwrap();
        let (packets, bytes) = buf.get_packets(1, 4000, 200);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].size_bytes, 300);
        assert_eq!(bytes, 300);
        assert_eq!(buf.expired_count(1), 1);
    }

    #[test]
    fn ttl_sweep_only() {
        let mut buf = buffer();
        buf.add_packet(Packet::new(100, 1, 0).with_ttl(50), 0).unwrap();
        buf.add_packet(Packet::new(200, 1, 0).with_ttl(5000), 0).unwrap();
        assert_eq!(buf.update_ue_buffer(1, 100), 1);
        assert_eq!(buf.size_of(1), 200);
        assert_eq!(buf.update_ue_buffer(1, 100), 0);
    }

    #[test]
    fn ue_status_reports_delays_and_rates() {
        let mut buf = buffer();
        buf.add_packet(Packet::new(1000, 1, 0), 0).unwrap();
        buf.add_packet(Packet::new(1000, 1, 400), 400).unwrap();
        let status = buf.ue_status(1, 500);
        assert_eq!(status.packet_count, 2);
        assert_eq!(status.oldest_delay_ms, 500);
        assert!((status.avg_delay_ms - 300.0).abs() < f64::EPSILON);
        assert_eq!(status.ingress_bytes, 2000);
        // 2000 B over 500 ms = 32 kbit/s.
        assert!((status.ingress_rate_bps - 32_000.0).abs() < 1e-9);
    }

    #[test]
    fn destroy_and_clear() {
        let mut buf = buffer();
        buf.add_packet(Packet::new(1000, 1, 0), 0).unwrap();
        buf.add_packet(Packet::new(1000, 2, 0), 0).unwrap();
        buf.destroy_ue(1);
        assert_eq!(buf.size_of(1), 0);
        assert_eq!(buf.total_size(), 1000);
        buf.clear_all();
        assert_eq!(buf.total_size(), 0);
        // Registrations survive a clear.
        assert!(buf.registered_ues().count() >= 1);
    }
}
