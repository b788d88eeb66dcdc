//! Subcommand implementations and the shared scenario builder.

pub mod compare;
pub mod run;
pub mod scan;

use std::error::Error;

use clap::Args;

use cellsched_core::models::mobility::{Area, MobilityModel, RandomWalk};
use cellsched_core::models::channel::Scenario;
use cellsched_core::models::traffic::{PoissonTraffic, TrafficModel};
use cellsched_core::{PolicyKind, SimConfig, Simulation, UserEquipment};

/// Cell/traffic options shared by `run` and `compare`.
#[derive(Debug, Args)]
pub struct ScenarioArgs {
    /// Cell bandwidth in MHz (1.4, 3, 5, 10, 15, 20)
    #[arg(long, default_value_t = 10.0)]
    pub bandwidth: f64,

    /// Simulation horizon in 10 ms frames
    #[arg(long, default_value_t = 10)]
    pub frames: u32,

    /// Number of UEs scattered over the cell
    #[arg(long, default_value_t = 4)]
    pub ues: u32,

    /// Master RNG seed
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Poisson packet rate per UE in packets/s
    #[arg(long, default_value_t = 300.0)]
    pub rate: f64,

    /// Channel scenario; without one every UE keeps the static CQI
    #[arg(long, value_parser = ["rma", "uma", "umi"])]
    pub channel: Option<String>,

    /// Static CQI used when no channel scenario is set
    #[arg(long, default_value_t = 10)]
    pub cqi: u8,

    /// Radius UEs are scattered over, in metres
    #[arg(long, default_value_t = 500.0)]
    pub radius: f64,
}

/// Build a ready-to-run simulation for one policy.
///
/// UE placement is deterministic (a spiral of rings around the site), so two
/// policies compared under the same seed see the same geometry, traffic and
/// channel draws.
pub fn build_simulation(
    scenario: &ScenarioArgs,
    policy: PolicyKind,
) -> Result<Simulation, Box<dyn Error>> {
    let config = SimConfig {
        bandwidth_mhz: scenario.bandwidth,
        num_frames: scenario.frames,
        scheduler: policy,
        seed: scenario.seed,
        ..SimConfig::default()
    };
    let mut sim = Simulation::new(config)?;

    let r = scenario.radius;
    let area = Area::new(-r, r, -r, r)?;
    for i in 0..scenario.ues {
        let angle = std::f64::consts::TAU * i as f64 / scenario.ues.max(1) as f64;
        let distance = r * (0.25 + 0.65 * i as f64 / scenario.ues.max(1) as f64);
        let mut ue = UserEquipment::new(
            i + 1,
            distance * angle.cos(),
            distance * angle.sin(),
        )
        .with_cqi(scenario.cqi);
        ue.set_mobility_model(MobilityModel::RandomWalk(RandomWalk::new(
            area, 0.5, 15.0,
        )?));
        let traffic = TrafficModel::Poisson(PoissonTraffic::new(scenario.rate, 400, 1400)?);
        sim.add_ue(ue, Some(traffic));
    }

    if let Some(name) = &scenario.channel {
        let s = match name.as_str() {
            "rma" => Scenario::Rma,
            "umi" => Scenario::Umi,
            _ => Scenario::Uma,
        };
        sim.set_channel_scenario(s);
    }
    Ok(sim)
}

/// One summary line per run for the comparison table.
pub fn summary_line(scheduler: &str, report: &cellsched_core::AggregateReport) -> String {
    let mean_cell = if report.cell_throughput_mbps.is_empty() {
        0.0
    } else {
        report.cell_throughput_mbps.iter().sum::<f64>() / report.cell_throughput_mbps.len() as f64
    };
    let mean_se = if report.spectral_efficiency.is_empty() {
        0.0
    } else {
        report.spectral_efficiency.iter().sum::<f64>() / report.spectral_efficiency.len() as f64
    };
    format!(
        "{scheduler:<18} {mean_cell:>10.3} {:>8.3} {mean_se:>10.3}",
        report.jain_index_overall
    )
}
