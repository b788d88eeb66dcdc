//! UE mobility models.
//!
//! Four classic models over a rectangular area: Random Walk, Random Waypoint,
//! Random Direction and Gauss-Markov. A model is stateless; per-UE kinematic
//! state lives in [`Kinematics`] next to the UE's position, and `step` advances
//! both by one update interval.

use std::f64::consts::{PI, TAU};

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::ConfigError;

/// Rectangular deployment area in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Area {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Area {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Result<Self, ConfigError> {
        if x_max <= x_min || y_max <= y_min {
            return Err(ConfigError::InvalidParameter {
                name: "area",
                value: x_max - x_min,
            });
        }
        Ok(Self {
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    pub fn contains(&self, p: (f64, f64)) -> bool {
        (self.x_min..=self.x_max).contains(&p.0) && (self.y_min..=self.y_max).contains(&p.1)
    }

    pub fn clamp(&self, p: (f64, f64)) -> (f64, f64) {
        (
            p.0.clamp(self.x_min, self.x_max),
            p.1.clamp(self.y_min, self.y_max),
        )
    }

    pub fn random_point<R: Rng>(&self, rng: &mut R) -> (f64, f64) {
        (
            rng.random_range(self.x_min..self.x_max),
            rng.random_range(self.y_min..self.y_max),
        )
    }
}

/// Per-UE kinematic state advanced by the mobility models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    pub velocity_mps: f64,
    pub direction_rad: f64,
    destination: (f64, f64),
    paused: bool,
    pause_timer_ms: f64,
    first_move: bool,
    mean_direction_rad: f64,
}

impl Default for Kinematics {
    fn default() -> Self {
        Self {
            velocity_mps: 0.0,
            direction_rad: 0.0,
            destination: (0.0, 0.0),
            paused: true,
            pause_timer_ms: 0.0,
            first_move: true,
            mean_direction_rad: 0.0,
        }
    }
}

fn sample_speed<R: Rng>(rng: &mut R, v_min: f64, v_max: f64) -> f64 {
    if v_max > v_min {
        rng.random_range(v_min..v_max)
    } else {
        v_min
    }
}

fn validate_speeds(v_min: f64, v_max: f64) -> Result<(), ConfigError> {
    if v_min < 0.0 || v_max < v_min {
        return Err(ConfigError::InvalidParameter {
            name: "velocity_range",
            value: v_min,
        });
    }
    Ok(())
}

/// New uniform speed and heading every interval, reflecting at the boundary.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    area: Area,
    v_min: f64,
    v_max: f64,
}

impl RandomWalk {
    pub fn new(area: Area, v_min: f64, v_max: f64) -> Result<Self, ConfigError> {
        validate_speeds(v_min, v_max)?;
        Ok(Self { area, v_min, v_max })
    }

    fn step<R: Rng>(&self, pos: &mut (f64, f64), kin: &mut Kinematics, dt_ms: f64, rng: &mut R) {
        kin.velocity_mps = sample_speed(rng, self.v_min, self.v_max);
        kin.direction_rad = rng.random_range(0.0..TAU);
        kin.first_move = false;
        let dt_s = dt_ms / 1000.0;
        let mut x = pos.0 + kin.velocity_mps * kin.direction_rad.cos() * dt_s;
        let mut y = pos.1 + kin.velocity_mps * kin.direction_rad.sin() * dt_s;
        // Mirror at the walls.
        if x < self.area.x_min || x > self.area.x_max {
            kin.direction_rad = PI - kin.direction_rad;
            x = x.clamp(self.area.x_min, self.area.x_max);
        }
        if y < self.area.y_min || y > self.area.y_max {
            kin.direction_rad = -kin.direction_rad;
            y = y.clamp(self.area.y_min, self.area.y_max);
        }
        *pos = (x, y);
    }
}

/// Travel to a uniformly chosen waypoint, pause on arrival, repeat.
#[derive(Debug, Clone)]
pub struct RandomWaypoint {
    area: Area,
    v_min: f64,
    v_max: f64,
    pause_time_ms: f64,
}

impl RandomWaypoint {
    pub fn new(
        area: Area,
        v_min: f64,
        v_max: f64,
        pause_time_ms: f64,
    ) -> Result<Self, ConfigError> {
        validate_speeds(v_min, v_max)?;
        Ok(Self {
            area,
            v_min,
            v_max,
            pause_time_ms,
        })
    }

    fn step<R: Rng>(&self, pos: &mut (f64, f64), kin: &mut Kinematics, dt_ms: f64, rng: &mut R) {
        if kin.paused {
            kin.pause_timer_ms -= dt_ms;
            if kin.pause_timer_ms > 0.0 && !kin.first_move {
                return;
            }
            kin.destination = self.area.random_point(rng);
            kin.velocity_mps = sample_speed(rng, self.v_min, self.v_max);
            kin.paused = false;
            kin.first_move = false;
        }
        let (dx, dy) = (kin.destination.0 - pos.0, kin.destination.1 - pos.1);
        let distance = dx.hypot(dy);
        let step = kin.velocity_mps * dt_ms / 1000.0;
        kin.direction_rad = dy.atan2(dx);
        if distance <= step {
            *pos = kin.destination;
            kin.paused = true;
            kin.pause_timer_ms = self.pause_time_ms;
        } else {
            *pos = (pos.0 + step * dx / distance, pos.1 + step * dy / distance);
        }
    }
}

/// Travel on a straight heading until the boundary, pause, pick a new heading.
#[derive(Debug, Clone)]
pub struct RandomDirection {
    area: Area,
    v_min: f64,
    v_max: f64,
    pause_time_ms: f64,
}

impl RandomDirection {
    pub fn new(
        area: Area,
        v_min: f64,
        v_max: f64,
        pause_time_ms: f64,
    ) -> Result<Self, ConfigError> {
        validate_speeds(v_min, v_max)?;
        Ok(Self {
            area,
            v_min,
            v_max,
            pause_time_ms,
        })
    }

    fn step<R: Rng>(&self, pos: &mut (f64, f64), kin: &mut Kinematics, dt_ms: f64, rng: &mut R) {
        if kin.paused {
            kin.pause_timer_ms -= dt_ms;
            if kin.pause_timer_ms > 0.0 && !kin.first_move {
                return;
            }
            kin.direction_rad = rng.random_range(0.0..TAU);
            kin.velocity_mps = sample_speed(rng, self.v_min, self.v_max);
            kin.paused = false;
            kin.first_move = false;
        }
        let dt_s = dt_ms / 1000.0;
        let next = (
            pos.0 + kin.velocity_mps * kin.direction_rad.cos() * dt_s,
            pos.1 + kin.velocity_mps * kin.direction_rad.sin() * dt_s,
        );
        if self.area.contains(next) {
            *pos = next;
        } else {
            *pos = self.area.clamp(next);
            kin.paused = true;
            kin.pause_timer_ms = self.pause_time_ms;
        }
    }
}

/// Gauss-Markov: speed and heading are first-order autoregressive processes
/// around their means, steered back toward the area centre at the edges.
#[derive(Debug, Clone)]
pub struct GaussMarkov {
    area: Area,
    alpha: f64,
    mean_velocity_mps: f64,
    velocity_noise: Normal<f64>,
    direction_noise: Normal<f64>,
}

impl GaussMarkov {
    pub fn new(
        area: Area,
        alpha: f64,
        mean_velocity_mps: f64,
        velocity_std: f64,
        direction_std: f64,
    ) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(ConfigError::InvalidParameter {
                name: "gauss_markov_alpha",
                value: alpha,
            });
        }
        let velocity_noise =
            Normal::new(0.0, velocity_std).map_err(|_| ConfigError::InvalidParameter {
                name: "velocity_std",
                value: velocity_std,
            })?;
        let direction_noise =
            Normal::new(0.0, direction_std).map_err(|_| ConfigError::InvalidParameter {
                name: "direction_std",
                value: direction_std,
            })?;
        Ok(Self {
            area,
            alpha,
            mean_velocity_mps,
            velocity_noise,
            direction_noise,
        })
    }

    fn step<R: Rng>(&self, pos: &mut (f64, f64), kin: &mut Kinematics, dt_ms: f64, rng: &mut R) {
        if kin.first_move {
            kin.velocity_mps = self.mean_velocity_mps;
            kin.direction_rad = rng.random_range(0.0..TAU);
            kin.mean_direction_rad = kin.direction_rad;
            kin.first_move = false;
        }
        let a = self.alpha;
        let memory = (1.0 - a * a).sqrt();
        kin.velocity_mps = (a * kin.velocity_mps
            + (1.0 - a) * self.mean_velocity_mps
            + memory * self.velocity_noise.sample(rng))
        .max(0.0);
        kin.direction_rad = a * kin.direction_rad
            + (1.0 - a) * kin.mean_direction_rad
            + memory * self.direction_noise.sample(rng);

        let dt_s = dt_ms / 1000.0;
        let next = (
            pos.0 + kin.velocity_mps * kin.direction_rad.cos() * dt_s,
            pos.1 + kin.velocity_mps * kin.direction_rad.sin() * dt_s,
        );
        if self.area.contains(next) {
            *pos = next;
        } else {
            *pos = self.area.clamp(next);
            let center = self.area.center();
            kin.mean_direction_rad = (center.1 - pos.1).atan2(center.0 - pos.0);
            kin.direction_rad = kin.mean_direction_rad;
        }
    }
}

/// Tagged union of the supported mobility models.
#[derive(Debug, Clone)]
pub enum MobilityModel {
    RandomWalk(RandomWalk),
    RandomWaypoint(RandomWaypoint),
    RandomDirection(RandomDirection),
    GaussMarkov(GaussMarkov),
}

impl MobilityModel {
    /// Advance `pos`/`kin` by one update interval of `dt_ms`.
    pub fn step<R: Rng>(
        &self,
        pos: &mut (f64, f64),
        kin: &mut Kinematics,
        dt_ms: f64,
        rng: &mut R,
    ) {
        match self {
            Self::RandomWalk(m) => m.step(pos, kin, dt_ms, rng),
            Self::RandomWaypoint(m) => m.step(pos, kin, dt_ms, rng),
            Self::RandomDirection(m) => m.step(pos, kin, dt_ms, rng),
            Self::GaussMarkov(m) => m.step(pos, kin, dt_ms, rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn area() -> Area {
        Area::new(0.0, 500.0, 0.0, 500.0).unwrap()
    }

    fn run_model(model: &MobilityModel, steps: usize, seed: u64) -> Vec<(f64, f64)> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pos = (250.0, 250.0);
        let mut kin = Kinematics::default();
        let mut track = Vec::with_capacity(steps);
        for _ in 0..steps {
            model.step(&mut pos, &mut kin, 1000.0, &mut rng);
            track.push(pos);
        }
        track
    }

    #[test]
    fn all_models_stay_inside_the_area() {
        let a = area();
        let models = [
            MobilityModel::RandomWalk(RandomWalk::new(a, 1.0, 30.0).unwrap()),
            MobilityModel::RandomWaypoint(RandomWaypoint::new(a, 1.0, 30.0, 2000.0).unwrap()),
            MobilityModel::RandomDirection(RandomDirection::new(a, 1.0, 30.0, 2000.0).unwrap()),
            MobilityModel::GaussMarkov(GaussMarkov::new(a, 0.75, 10.0, 2.0, 0.3).unwrap()),
        ];
        for model in &models {
            for p in run_model(model, 2000, 5) {
                assert!(a.contains(p), "escaped to {p:?}");
            }
        }
    }

    #[test]
    fn random_walk_actually_moves() {
        let model = MobilityModel::RandomWalk(RandomWalk::new(area(), 5.0, 10.0).unwrap());
        let track = run_model(&model, 10, 1);
        assert!(track.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn waypoint_pauses_on_arrival() {
        let a = area();
        let model =
            MobilityModel::RandomWaypoint(RandomWaypoint::new(a, 20.0, 20.0, 5000.0).unwrap());
        let track = run_model(&model, 500, 9);
        // Pauses show up as consecutive identical positions.
        assert!(track.windows(2).any(|w| w[0] == w[1]));
    }

    #[test]
    fn fixed_seed_reproduces_the_track() {
        let model = MobilityModel::GaussMarkov(
            GaussMarkov::new(area(), 0.85, 15.0, 3.0, 0.2).unwrap(),
        );
        assert_eq!(run_model(&model, 200, 42), run_model(&model, 200, 42));
    }

    #[test]
    fn parameter_validation() {
        let a = area();
        assert!(RandomWalk::new(a, -1.0, 5.0).is_err());
        assert!(RandomWalk::new(a, 10.0, 5.0).is_err());
        assert!(GaussMarkov::new(a, 1.5, 10.0, 1.0, 0.1).is_err());
        assert!(Area::new(10.0, 0.0, 0.0, 10.0).is_err());
    }
}
