//! `cellsched compare` — the three policies over the same scenario.

use std::error::Error;
use std::path::Path;

use cellsched_core::{PolicyKind, ResultsDocument, RunRecord};

use super::ScenarioArgs;

pub fn execute(scenario: &ScenarioArgs, output: Option<&Path>) -> Result<(), Box<dyn Error>> {
    println!(
        "{} MHz | {} frames | {} UEs | seed {}",
        scenario.bandwidth, scenario.frames, scenario.ues, scenario.seed
    );
    println!();
    println!(
        "{:<18} {:>10} {:>8} {:>10}",
        "scheduler", "Mbit/s", "Jain", "bit/s/Hz"
    );

    let mut document = ResultsDocument::new();
    for policy in [
        PolicyKind::RoundRobin,
        PolicyKind::BestCqi,
        PolicyKind::ProportionalFair,
    ] {
        let mut sim = super::build_simulation(scenario, policy)?;
        let config = sim.config().clone();
        let report = sim.run()?;
        println!("{}", super::summary_line(&report.scheduler, &report.aggregate));
        document.insert(RunRecord::new(
            report.scheduler.clone(),
            config,
            report.aggregate,
        ));
    }

    if let Some(path) = output {
        document.save(path)?;
        println!();
        println!("results written to {}", path.display());
    }
    Ok(())
}
