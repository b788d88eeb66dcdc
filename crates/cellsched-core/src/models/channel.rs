//! Radio channel models producing a per-UE SINR.
//!
//! Scenario path-loss shapes follow TR 38.901: RMa (rural macro), UMa (urban
//! macro) and UMi (urban micro street canyon). Per UE the model keeps a link
//! memory — the LOS/NLOS condition, a distance-correlated log-normal shadow
//! fading value, and frozen O2I building / car penetration losses. All state
//! is keyed by UE id inside this struct and updated against the caller's
//! clock and RNG; nothing is process-global.

use std::collections::HashMap;

use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Speed of light in m/s.
const C_MPS: f64 = 3.0e8;

/// Thermal noise density in dBm/Hz.
const THERMAL_NOISE_DBM_HZ: f64 = -174.0;

/// Static eNodeB-side parameters captured at construction.
#[derive(Debug, Clone, Copy)]
pub struct CellSite {
    pub position: (f64, f64),
    pub height_m: f64,
    pub frequency_ghz: f64,
    pub tx_power_dbm: f64,
    pub antenna_gain_dbi: f64,
}

/// Propagation scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Rural macro: 35 m masts, open terrain.
    Rma,
    /// Urban macro: 25 m rooftop sites.
    Uma,
    /// Urban micro street canyon: 10 m lamppost sites.
    Umi,
}

/// What the channel needs to know about a UE for one query.
#[derive(Debug, Clone, Copy)]
pub struct UeGeometry {
    pub ue_id: u32,
    pub position: (f64, f64),
    pub height_m: f64,
    pub indoor: bool,
    pub in_car: bool,
}

#[derive(Debug, Clone, Copy)]
struct LinkState {
    los: bool,
    shadow_db: f64,
    last_position: (f64, f64),
    o2i_loss_db: f64,
    car_loss_db: f64,
}

/// Scenario channel with per-UE correlated fading memory.
pub struct ChannelModel {
    scenario: Scenario,
    site: CellSite,
    bandwidth_hz: f64,
    noise_figure_db: f64,
    interference_margin_db: f64,
    /// Average building height (RMa path loss term).
    avg_building_height_m: f64,
    /// Average street width (RMa path loss term).
    avg_street_width_m: f64,
    links: HashMap<u32, LinkState>,
}

fn gauss<R: Rng>(rng: &mut R, mean: f64, std: f64) -> f64 {
    Normal::new(mean, std)
        .map(|n| n.sample(rng))
        .unwrap_or(mean)
}

impl ChannelModel {
    pub fn new(scenario: Scenario, site: CellSite, bandwidth_mhz: f64) -> Self {
        Self {
            scenario,
            site,
            bandwidth_hz: bandwidth_mhz * 1e6,
            noise_figure_db: 7.0,
            interference_margin_db: 3.0,
            avg_building_height_m: 5.0,
            avg_street_width_m: 20.0,
            links: HashMap::new(),
        }
    }

    pub fn with_noise_figure(mut self, noise_figure_db: f64) -> Self {
        self.noise_figure_db = noise_figure_db;
        self
    }

    pub fn with_interference_margin(mut self, margin_db: f64) -> Self {
        self.interference_margin_db = margin_db;
        self
    }

    /// Forget all per-UE link memory.
    pub fn reset(&mut self) {
        self.links.clear();
    }

    /// SINR in dB for a UE at its current position.
    pub fn sinr_db<R: Rng>(&mut self, ue: &UeGeometry, rng: &mut R) -> f64 {
        let d_2d = (ue.position.0 - self.site.position.0)
            .hypot(ue.position.1 - self.site.position.1)
            .max(1.0);
        let d_3d = d_2d.hypot(self.site.height_m - ue.height_m);

        let link = self.ensure_link(ue, d_2d, rng);
        let sigma = self.shadow_sigma(link.los, d_2d, ue.height_m);
        let link = self.update_shadow(ue, sigma, rng);

        let path_loss = self.path_loss_db(link.los, d_2d, d_3d, ue.height_m);
        let rx_dbm = self.site.tx_power_dbm + self.site.antenna_gain_dbi
            - path_loss
            - link.shadow_db
            - link.o2i_loss_db
            - link.car_loss_db;
        let noise_dbm =
            THERMAL_NOISE_DBM_HZ + 10.0 * self.bandwidth_hz.log10() + self.noise_figure_db;
        rx_dbm - noise_dbm - self.interference_margin_db
    }

    fn ensure_link<R: Rng>(&mut self, ue: &UeGeometry, d_2d: f64, rng: &mut R) -> LinkState {
        if let Some(link) = self.links.get(&ue.ue_id) {
            return *link;
        }
        let p_los = self.los_probability(d_2d);
        let los = rng.random::<f64>() < p_los;
        let o2i_loss_db = if ue.indoor {
            self.o2i_building_loss(rng)
        } else {
            0.0
        };
        let car_loss_db = if ue.in_car && !ue.indoor {
            // TR 38.901: mu 9 dB, sigma 5 dB, frozen per UE.
            gauss(rng, 9.0, 5.0).max(0.0)
        } else {
            0.0
        };
        let sigma = self.shadow_sigma(los, d_2d, ue.height_m);
        let link = LinkState {
            los,
            shadow_db: gauss(rng, 0.0, sigma),
            last_position: ue.position,
            o2i_loss_db,
            car_loss_db,
        };
        self.links.insert(ue.ue_id, link);
        link
    }

    /// Distance-correlated shadow update: R = exp(-d/d_corr) against the
    /// displacement since the previous query.
    fn update_shadow<R: Rng>(&mut self, ue: &UeGeometry, sigma: f64, rng: &mut R) -> LinkState {
        let d_corr = self.correlation_distance(
            self.links
                .get(&ue.ue_id)
                .map(|l| l.los)
                .unwrap_or(true),
        );
        let innovation = gauss(rng, 0.0, sigma);
        let Some(link) = self.links.get_mut(&ue.ue_id) else {
            return LinkState {
                los: true,
                shadow_db: 0.0,
                last_position: ue.position,
                o2i_loss_db: 0.0,
                car_loss_db: 0.0,
            };
        };
        let displacement = (ue.position.0 - link.last_position.0)
            .hypot(ue.position.1 - link.last_position.1);
        if displacement > 0.0 {
            let r = (-displacement / d_corr).exp();
            link.shadow_db = r * link.shadow_db + (1.0 - r * r).sqrt() * innovation;
            link.last_position = ue.position;
        }
        *link
    }

    fn correlation_distance(&self, los: bool) -> f64 {
        match (self.scenario, los) {
            (Scenario::Rma, true) => 37.0,
            (Scenario::Rma, false) => 120.0,
            (Scenario::Uma, true) => 37.0,
            (Scenario::Uma, false) => 50.0,
            (Scenario::Umi, true) => 10.0,
            (Scenario::Umi, false) => 13.0,
        }
    }

    fn shadow_sigma(&self, los: bool, d_2d: f64, ue_height_m: f64) -> f64 {
        match (self.scenario, los) {
            (Scenario::Rma, true) => {
                if d_2d < self.breakpoint_distance(ue_height_m, d_2d) {
                    4.0
                } else {
                    6.0
                }
            }
            (Scenario::Rma, false) => 8.0,
            (Scenario::Uma, true) => 4.0,
            (Scenario::Uma, false) => 6.0,
            (Scenario::Umi, true) => 4.0,
            (Scenario::Umi, false) => 7.82,
        }
    }

    fn los_probability(&self, d_2d: f64) -> f64 {
        match self.scenario {
            Scenario::Rma => {
                if d_2d <= 10.0 {
                    1.0
                } else {
                    (-(d_2d - 10.0) / 1000.0).exp()
                }
            }
            Scenario::Uma => {
                if d_2d <= 18.0 {
                    1.0
                } else {
                    18.0 / d_2d + (-d_2d / 63.0).exp() * (1.0 - 18.0 / d_2d)
                }
            }
            Scenario::Umi => {
                if d_2d <= 18.0 {
                    1.0
                } else {
                    18.0 / d_2d + (-d_2d / 36.0).exp() * (1.0 - 18.0 / d_2d)
                }
            }
        }
    }

    fn breakpoint_distance(&self, ue_height_m: f64, _d_2d: f64) -> f64 {
        let f_hz = self.site.frequency_ghz * 1e9;
        match self.scenario {
            Scenario::Rma => {
                2.0 * std::f64::consts::PI * self.site.height_m * ue_height_m * f_hz / C_MPS
            }
            Scenario::Uma | Scenario::Umi => {
                // Effective antenna heights, 1 m environment correction.
                let h_bs = (self.site.height_m - 1.0).max(0.1);
                let h_ut = (ue_height_m - 1.0).max(0.1);
                4.0 * h_bs * h_ut * f_hz / C_MPS
            }
        }
    }

    fn path_loss_db(&self, los: bool, d_2d: f64, d_3d: f64, ue_height_m: f64) -> f64 {
        let f = self.site.frequency_ghz;
        let d_bp = self.breakpoint_distance(ue_height_m, d_2d);
        let los_loss = match self.scenario {
            Scenario::Rma => {
                let h = self.avg_building_height_m;
                let pl1 = |d: f64| {
                    20.0 * (40.0 * std::f64::consts::PI * d * f / 3.0).log10()
                        + (0.03 * h.powf(1.72)).min(10.0) * d.log10()
                        - (0.044 * h.powf(1.72)).min(14.77)
                        + 0.002 * h.log10() * d
                };
                if d_2d <= d_bp {
                    pl1(d_3d)
                } else {
                    pl1(d_bp) + 40.0 * (d_3d / d_bp).log10()
                }
            }
            Scenario::Uma => {
                if d_2d <= d_bp {
                    28.0 + 22.0 * d_3d.log10() + 20.0 * f.log10()
                } else {
                    28.0 + 40.0 * d_3d.log10() + 20.0 * f.log10()
                        - 9.0 * (d_bp.powi(2) + (self.site.height_m - ue_height_m).powi(2)).log10()
                }
            }
            Scenario::Umi => {
                if d_2d <= d_bp {
                    32.4 + 21.0 * d_3d.log10() + 20.0 * f.log10()
                } else {
                    32.4 + 40.0 * d_3d.log10() + 20.0 * f.log10()
                        - 9.5 * (d_bp.powi(2) + (self.site.height_m - ue_height_m).powi(2)).log10()
                }
            }
        };
        if los {
            return los_loss;
        }
        let nlos_loss = match self.scenario {
            Scenario::Rma => {
                let h = self.avg_building_height_m;
                let w = self.avg_street_width_m;
                let h_bs = self.site.height_m;
                161.04 - 7.1 * w.log10() + 7.5 * h.log10()
                    - (24.37 - 3.7 * (h / h_bs).powi(2)) * h_bs.log10()
                    + (43.42 - 3.1 * h_bs.log10()) * (d_3d.log10() - 3.0)
                    + 20.0 * f.log10()
                    - (3.2 * (11.75 * ue_height_m).log10().powi(2) - 4.97)
            }
            Scenario::Uma => {
                13.54 + 39.08 * d_3d.log10() + 20.0 * f.log10() - 0.6 * (ue_height_m - 1.5)
            }
            Scenario::Umi => {
                35.3 * d_3d.log10() + 22.4 + 21.3 * f.log10() - 0.3 * (ue_height_m - 1.5)
            }
        };
        los_loss.max(nlos_loss)
    }

    /// TR 38.901 low-loss O2I building penetration, frozen per UE: glass and
    /// concrete facade mix plus an indoor-depth term and a N(0, 4.4) spread.
    fn o2i_building_loss<R: Rng>(&self, rng: &mut R) -> f64 {
        let f = self.site.frequency_ghz;
        let l_glass = 2.0 + 0.2 * f;
        let l_concrete = 5.0 + 4.0 * f;
        let facade = 5.0
            - 10.0
                * (0.3 * 10f64.powf(-l_glass / 10.0) + 0.7 * 10f64.powf(-l_concrete / 10.0))
                    .log10();
        let depth = 0.5 * rng.random_range(0.0..25.0);
        (facade + depth + gauss(rng, 0.0, 4.4)).max(0.0)
    }
}
