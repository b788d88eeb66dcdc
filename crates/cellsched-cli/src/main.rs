//! CLI for cellsched — LTE downlink MAC scheduler simulation.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::ScenarioArgs;

#[derive(Parser)]
#[command(name = "cellsched")]
#[command(about = "cellsched — TTI-accurate LTE downlink scheduler simulation")]
#[command(version = cellsched_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one policy and print per-frame throughput, fairness and spectral
    /// efficiency
    Run {
        /// Scheduling policy
        #[arg(long, default_value = "round_robin", value_parser = ["round_robin", "best_cqi", "proportional_fair"])]
        scheduler: String,

        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Write (or update) a JSON results document
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run all three policies over the same scenario and seed, side by side
    Compare {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Write the merged JSON results document
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print the derived cell geometry for a bandwidth
    Scan {
        /// Cell bandwidth in MHz
        #[arg(long, default_value_t = 10.0)]
        bandwidth: f64,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run {
            scheduler,
            scenario,
            output,
        } => commands::run::execute(&scheduler, &scenario, output.as_deref()),
        Commands::Compare { scenario, output } => {
            commands::compare::execute(&scenario, output.as_deref())
        }
        Commands::Scan { bandwidth } => commands::scan::execute(bandwidth),
    };

    if let Err(err) = outcome {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
