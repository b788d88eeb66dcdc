//! `cellsched run` — one policy, full per-frame breakdown.

use std::error::Error;
use std::path::Path;

use cellsched_core::{PolicyKind, ResultsDocument, RunRecord};

use super::ScenarioArgs;

pub fn execute(
    scheduler: &str,
    scenario: &ScenarioArgs,
    output: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let policy: PolicyKind = scheduler.parse()?;
    let mut sim = super::build_simulation(scenario, policy)?;
    let config = sim.config().clone();
    let report = sim.run()?;

    println!(
        "{} | {} MHz | {} frames | {} UEs | seed {}",
        report.scheduler, scenario.bandwidth, scenario.frames, scenario.ues, scenario.seed
    );
    println!();
    println!("{:>5} {:>12} {:>8} {:>12}", "frame", "cell Mbit/s", "Jain", "bit/s/Hz");
    for (frame, mbps) in report.aggregate.cell_throughput_mbps.iter().enumerate() {
        println!(
            "{frame:>5} {mbps:>12.3} {:>8.3} {:>12.3}",
            report.aggregate.jain_index_per_frame[frame],
            report.aggregate.spectral_efficiency[frame],
        );
    }
    println!();
    println!("per-UE average throughput (Mbit/s):");
    for (ue, mbps) in &report.aggregate.avg_user_throughput_mbps {
        println!("  UE {ue:>4}: {mbps:.3}");
    }
    println!();
    println!("overall Jain index: {:.3}", report.aggregate.jain_index_overall);

    let status = sim.base_station().global_buffer_status(sim.clock().now_ms());
    println!(
        "buffers: {} B queued, {} dropped, {} expired",
        status.total_size_bytes, status.total_dropped, status.total_expired
    );

    if let Some(path) = output {
        let mut document = if path.exists() {
            ResultsDocument::load(path)?
        } else {
            ResultsDocument::new()
        };
        document.insert(RunRecord::new(
            report.scheduler.clone(),
            config,
            report.aggregate.clone(),
        ));
        document.save(path)?;
        println!("results written to {}", path.display());
    }
    Ok(())
}
