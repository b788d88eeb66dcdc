//! Downlink traffic generators.
//!
//! Each model produces the finite batch of packets that arrived in the
//! interval `(now - dt, now]`; there are no lazy streams. Arrival instants
//! are stamped on the packets so queueing delay is measured from the true
//! arrival time, not the batch boundary.

use rand::Rng;
use rand_distr::{Distribution, Exp};

use crate::error::ConfigError;

/// One generated arrival, before it is wrapped into a buffer packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketArrival {
    pub size_bytes: usize,
    pub creation_time_ms: u64,
    pub priority: u8,
}

/// Uniform packet-size range shared by all models.
#[derive(Debug, Clone, Copy)]
struct SizeRange {
    min: usize,
    max: usize,
}

impl SizeRange {
    fn new(min: usize, max: usize) -> Result<Self, ConfigError> {
        if min == 0 || max < min {
            return Err(ConfigError::InvalidParameter {
                name: "packet_size_range",
                value: min as f64,
            });
        }
        Ok(Self { min, max })
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> usize {
        if self.min == self.max {
            self.min
        } else {
            rng.random_range(self.min..self.max)
        }
    }
}

fn exp_ms(mean_ms: f64, name: &'static str) -> Result<Exp<f64>, ConfigError> {
    if mean_ms <= 0.0 {
        return Err(ConfigError::InvalidParameter {
            name,
            value: mean_ms,
        });
    }
    Exp::new(1.0 / mean_ms).map_err(|_| ConfigError::InvalidParameter {
        name,
        value: mean_ms,
    })
}

/// Appends Poisson arrivals at `rate` within `[from, to)` ms.
fn poisson_arrivals<R: Rng>(
    out: &mut Vec<PacketArrival>,
    inter_arrival: &Exp<f64>,
    sizes: &SizeRange,
    from_ms: f64,
    to_ms: f64,
    rng: &mut R,
) {
    let mut t = from_ms;
    loop {
        t += inter_arrival.sample(rng);
        if t >= to_ms {
            break;
        }
        out.push(PacketArrival {
            size_bytes: sizes.sample(rng),
            creation_time_ms: t as u64,
            priority: 0,
        });
    }
}

/// Homogeneous Poisson arrivals.
#[derive(Debug, Clone)]
pub struct PoissonTraffic {
    inter_arrival: Exp<f64>,
    sizes: SizeRange,
}

impl PoissonTraffic {
    /// `packet_rate` in packets per second, sizes in bytes.
    pub fn new(
        packet_rate: f64,
        min_packet_size: usize,
        max_packet_size: usize,
    ) -> Result<Self, ConfigError> {
        if packet_rate <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "packet_rate",
                value: packet_rate,
            });
        }
        Ok(Self {
            inter_arrival: exp_ms(1000.0 / packet_rate, "packet_rate")?,
            sizes: SizeRange::new(min_packet_size, max_packet_size)?,
        })
    }
}

/// Bursty ON/OFF source: Poisson arrivals at `peak_rate` during exponentially
/// distributed ON sojourns, silence during OFF sojourns.
#[derive(Debug, Clone)]
pub struct OnOffTraffic {
    inter_arrival: Exp<f64>,
    sizes: SizeRange,
    on_sojourn: Exp<f64>,
    off_sojourn: Exp<f64>,
    on: bool,
    state_remaining_ms: f64,
}

impl OnOffTraffic {
    pub fn new(
        peak_rate: f64,
        mean_on_ms: f64,
        mean_off_ms: f64,
        min_packet_size: usize,
        max_packet_size: usize,
    ) -> Result<Self, ConfigError> {
        if peak_rate <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "peak_rate",
                value: peak_rate,
            });
        }
        Ok(Self {
            inter_arrival: exp_ms(1000.0 / peak_rate, "peak_rate")?,
            sizes: SizeRange::new(min_packet_size, max_packet_size)?,
            on_sojourn: exp_ms(mean_on_ms, "mean_on_ms")?,
            off_sojourn: exp_ms(mean_off_ms, "mean_off_ms")?,
            on: false,
            state_remaining_ms: 0.0,
        })
    }
}

/// Two-state Markov-modulated Poisson process with per-state arrival rates
/// and exponential holding times.
#[derive(Debug, Clone)]
pub struct MmppTraffic {
    inter_arrival: [Exp<f64>; 2],
    holding: [Exp<f64>; 2],
    sizes: SizeRange,
    state: usize,
    state_remaining_ms: f64,
}

impl MmppTraffic {
    pub fn new(
        rates: [f64; 2],
        mean_holding_ms: [f64; 2],
        min_packet_size: usize,
        max_packet_size: usize,
    ) -> Result<Self, ConfigError> {
        for &rate in &rates {
            if rate <= 0.0 {
                return Err(ConfigError::InvalidParameter {
                    name: "mmpp_rate",
                    value: rate,
                });
            }
        }
        Ok(Self {
            inter_arrival: [
                exp_ms(1000.0 / rates[0], "mmpp_rate")?,
                exp_ms(1000.0 / rates[1], "mmpp_rate")?,
            ],
            holding: [
                exp_ms(mean_holding_ms[0], "mmpp_holding_ms")?,
                exp_ms(mean_holding_ms[1], "mmpp_holding_ms")?,
            ],
            sizes: SizeRange::new(min_packet_size, max_packet_size)?,
            state: 0,
            state_remaining_ms: 0.0,
        })
    }
}

/// Tagged union of the supported traffic models.
#[derive(Debug, Clone)]
pub enum TrafficModel {
    Poisson(PoissonTraffic),
    OnOff(OnOffTraffic),
    Mmpp(MmppTraffic),
}

impl TrafficModel {
    /// Packets that arrived in `(now - dt, now]`, in arrival order.
    pub fn generate<R: Rng>(&mut self, now_ms: u64, dt_ms: u64, rng: &mut R) -> Vec<PacketArrival> {
        let from = now_ms.saturating_sub(dt_ms) as f64;
        let to = now_ms as f64;
        let mut out = Vec::new();
        match self {
            Self::Poisson(model) => {
                poisson_arrivals(&mut out, &model.inter_arrival, &model.sizes, from, to, rng);
            }
            Self::OnOff(model) => {
                let mut t = from;
                while t < to {
                    if model.state_remaining_ms <= 0.0 {
                        model.on = !model.on;
                        let sojourn = if model.on {
                            &model.on_sojourn
                        } else {
                            &model.off_sojourn
                        };
                        model.state_remaining_ms = sojourn.sample(rng);
                    }
                    let span = model.state_remaining_ms.min(to - t);
                    if model.on {
                        poisson_arrivals(
                            &mut out,
                            &model.inter_arrival,
                            &model.sizes,
                            t,
                            t + span,
                            rng,
                        );
                    }
                    t += span;
                    model.state_remaining_ms -= span;
                }
            }
            Self::Mmpp(model) => {
                let mut t = from;
                while t < to {
                    if model.state_remaining_ms <= 0.0 {
                        model.state = 1 - model.state;
                        model.state_remaining_ms = model.holding[model.state].sample(rng);
                    }
                    let span = model.state_remaining_ms.min(to - t);
                    poisson_arrivals(
                        &mut out,
                        &model.inter_arrival[model.state],
                        &model.sizes,
                        t,
                        t + span,
                        rng,
                    );
                    t += span;
                    model.state_remaining_ms -= span;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn poisson_rate_is_roughly_honored() {
        let mut model = TrafficModel::Poisson(PoissonTraffic::new(500.0, 100, 200).unwrap());
        let mut rng = StdRng::seed_from_u64(7);
        let mut count = 0usize;
        for step in 1..=2000u64 {
            count += model.generate(step * 10, 10, &mut rng).len();
        }
        // 500 pkt/s over 20 s => ~10000 arrivals.
        assert!((8000..12000).contains(&count), "got {count}");
    }

    #[test]
    fn arrivals_are_stamped_inside_the_interval() {
        let mut model = TrafficModel::Poisson(PoissonTraffic::new(2000.0, 150, 1500).unwrap());
        let mut rng = StdRng::seed_from_u64(1);
        for now in [100u64, 200, 300] {
            for arrival in model.generate(now, 100, &mut rng) {
                assert!(arrival.creation_time_ms >= now - 100);
                assert!(arrival.creation_time_ms <= now);
                assert!((150..1500).contains(&arrival.size_bytes));
            }
        }
    }

    #[test]
    fn fixed_seed_reproduces_the_stream() {
        let make = || TrafficModel::Poisson(PoissonTraffic::new(300.0, 100, 900).unwrap());
        let mut a = make();
        let mut b = make();
        let mut rng_a = StdRng::seed_from_u64(99);
        let mut rng_b = StdRng::seed_from_u64(99);
        for now in 1..50u64 {
            assert_eq!(
                a.generate(now * 5, 5, &mut rng_a),
                b.generate(now * 5, 5, &mut rng_b)
            );
        }
    }

    #[test]
    fn onoff_produces_silent_spans() {
        let mut model =
            TrafficModel::OnOff(OnOffTraffic::new(1000.0, 50.0, 50.0, 100, 200).unwrap());
        let mut rng = StdRng::seed_from_u64(3);
        let mut empty_intervals = 0usize;
        let mut busy_intervals = 0usize;
        for step in 1..=400u64 {
            if model.generate(step * 10, 10, &mut rng).is_empty() {
                empty_intervals += 1;
            } else {
                busy_intervals += 1;
            }
        }
        assert!(empty_intervals > 50, "expected OFF spans, got {empty_intervals}");
        assert!(busy_intervals > 50, "expected ON spans, got {busy_intervals}");
    }

    #[test]
    fn mmpp_modulates_the_rate() {
        let mut model = TrafficModel::Mmpp(
            MmppTraffic::new([50.0, 2000.0], [200.0, 200.0], 100, 200).unwrap(),
        );
        let mut rng = StdRng::seed_from_u64(11);
        let counts: Vec<usize> = (1..=200u64)
            .map(|step| model.generate(step * 20, 20, &mut rng).len())
            .collect();
        let max = counts.iter().copied().max().unwrap_or(0);
        let min = counts.iter().copied().min().unwrap_or(0);
        // The high-rate state should be clearly visible against the low one.
        assert!(max >= 10, "max interval count {max}");
        assert_eq!(min, 0);
    }

    #[test]
    fn invalid_parameters_are_config_errors() {
        assert!(PoissonTraffic::new(0.0, 100, 200).is_err());
        assert!(PoissonTraffic::new(10.0, 0, 200).is_err());
        assert!(PoissonTraffic::new(10.0, 300, 200).is_err());
        assert!(OnOffTraffic::new(10.0, 0.0, 50.0, 100, 200).is_err());
        assert!(MmppTraffic::new([10.0, 0.0], [10.0, 10.0], 100, 200).is_err());
    }
}
