//! Walker Delta Constellation Simulator CLI
//!
//! Builds a LEO constellation from a JSON scenario, drives the
//! discrete-event kernel to the horizon and writes a JSON run report.
//!
//! Usage:
//!   constellation-sim --scenario data/walker-16.json \
//!                     --report out/run-report.json

use anyhow::{Context, Result};
use clap::Parser;
use sim_engine::SimTime;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod report;
mod world;

use config::Scenario;
use report::RunReport;
use world::World;

#[derive(Parser, Debug)]
#[command(
    name = "constellation-sim",
    about = "Simulate a Walker-Delta LEO constellation network"
)]
struct Args {
    /// Scenario JSON file; omitted runs the built-in 4x4 demo
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Override the scenario's simulated duration in seconds
    #[arg(short, long)]
    duration_secs: Option<f64>,

    /// Write the JSON run report here
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{}", "=".repeat(60));
    info!("Walker-Delta Constellation Network Simulator");
    info!("{}", "=".repeat(60));

    // Load and validate the scenario
    let mut scenario = match &args.scenario {
        Some(path) => Scenario::load(path)?,
        None => {
            info!("No scenario file given, running the built-in demo");
            Scenario::default()
        }
    };
    if let Some(duration) = args.duration_secs {
        scenario.duration_s = duration;
    }
    scenario.validate().context("invalid scenario")?;

    info!(
        "Constellation: {} satellites in {} planes, F={}, {} km @ {}°",
        scenario.constellation.num_satellites,
        scenario.constellation.num_planes,
        scenario.constellation.phasing_f,
        scenario.constellation.altitude_km,
        scenario.constellation.inclination_deg,
    );
    info!(
        "Ground terminals: {}, routing metric: {:?}",
        scenario.ground_terminals.len(),
        scenario.routing.metric
    );

    // Build the world and run to the horizon
    let mut world = World::build(&scenario)?;
    let horizon = SimTime::from_secs_f64(scenario.duration_s);
    info!("Running to t={horizon}");
    let events = world.run(horizon);

    let run_report = RunReport::collect(&scenario, &world, events);

    // Write the report if requested
    if let Some(path) = &args.report {
        info!("Writing run report to {:?}", path);
        let file = File::create(path).with_context(|| format!("creating {path:?}"))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &run_report)?;
    }

    // Summary
    info!("\n{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!(
        "Simulated {:.1}s, {} events dispatched",
        run_report.simulated_s, run_report.events_dispatched
    );
    info!(
        "  terminals attached: {}/{}",
        run_report.attached_terminals, run_report.terminals
    );
    info!(
        "  handover sweeps: {} ({} attachments, {} handovers, {} deferred)",
        run_report.stats.sweeps,
        run_report.stats.attachments,
        run_report.stats.handovers,
        run_report.stats.deferred
    );
    info!(
        "  routes installed: {} ({} nodes failed)",
        run_report.stats.routes_installed, run_report.stats.route_failures
    );
    info!(
        "  link delay over {} links: min {:.3} ms, mean {:.3} ms, max {:.3} ms",
        run_report.link_delay.links,
        run_report.link_delay.min_ms,
        run_report.link_delay.mean_ms,
        run_report.link_delay.max_ms
    );

    Ok(())
}
