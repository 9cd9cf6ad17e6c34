mod scenario;
mod tracing;

use crate::scenario::Scenario;
use crate::tracing::setup_tracing;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metanet_core::engine::{NumericEngine, RampMetering};
use metanet_core::network::Network;
use metanet_core::simulation::SimulationConfig;
use metanet_core::state::NetworkState;
use metanet_core::test_utils::{make_random_network, uniform_state};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging.
    #[arg(long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a scenario file.
    Run {
        /// Path to the scenario JSON.
        scenario: PathBuf,
        /// Write per-step link states to this CSV file.
        #[arg(short, long)]
        output_path: Option<PathBuf>,
    },
    /// Simulate the built-in two-ramp demo network.
    Demo {
        #[arg(short, long, default_value_t = 360)]
        steps: usize,
    },
    /// Step a randomly generated network, as a smoke test.
    Random {
        #[arg(long, default_value_t = 10)]
        systems: usize,
        #[arg(long, default_value_t = 100)]
        steps: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.debug).context("failed to configure logging")?;
    match cli.command {
        Commands::Run { scenario, output_path } => run_scenario(&scenario, output_path.as_deref()),
        Commands::Demo { steps } => run_demo(steps),
        Commands::Random { systems, steps, seed } => run_random(systems, steps, seed),
    }
}

fn run_scenario(path: &Path, output_path: Option<&Path>) -> Result<()> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario `{}`", path.display()))?;
    let scenario: Scenario =
        serde_json::from_str(&data).context("failed to parse the scenario file")?;
    let network = scenario.build_network()?;

    let engine = NumericEngine::default();
    let mut state = uniform_state(
        &network,
        &engine,
        scenario.initial.density,
        scenario.initial.speed,
    );

    let mut writer = match output_path {
        Some(path) => {
            let mut writer = csv::Writer::from_path(path)
                .with_context(|| format!("failed to open `{}`", path.display()))?;
            writer.write_record(["step", "link", "segment", "density", "speed"])?;
            Some(writer)
        }
        None => None,
    };

    let start = Instant::now();
    for step in 0..scenario.steps {
        if let Some(writer) = writer.as_mut() {
            write_state(writer, step, &network, &state)?;
        }
        state = network.step(&state, &engine, &scenario.config)?;
    }
    if let Some(writer) = writer.as_mut() {
        write_state(writer, scenario.steps, &network, &state)?;
        writer.flush()?;
    }

    println!(
        "simulated `{}` for {} steps in {:.2?}",
        network.name(),
        scenario.steps,
        start.elapsed()
    );
    print_summary(&network, &state);
    Ok(())
}

fn run_demo(steps: usize) -> Result<()> {
    let network = demo_network()?;
    let engine = NumericEngine::default();
    let config = SimulationConfig::default();
    let mut state = uniform_state(&network, &engine, 15.0, 90.0);

    // constant demands with fully open metering
    let metered = network
        .get_origin_index_by_name("O1")
        .context("demo network misses O1")?;
    {
        let ramp = state
            .origin_mut(metered)?
            .metered_ramp_mut()
            .context("O1 is a metered ramp")?;
        ramp.demand = 2000.0;
        ramp.metering_rate = 1.0;
    }
    let simple = network
        .get_origin_index_by_name("O2")
        .context("demo network misses O2")?;
    {
        let ramp = state
            .origin_mut(simple)?
            .simple_metered_ramp_mut()
            .context("O2 is a simplified ramp")?;
        ramp.demand = 500.0;
        ramp.desired_flow = 500.0;
    }

    let start = Instant::now();
    for _ in 0..steps {
        state = network.step(&state, &engine, &config)?;
    }
    println!("simulated {} steps in {:.2?}", steps, start.elapsed());
    print_summary(&network, &state);
    Ok(())
}

fn run_random(systems: usize, steps: usize, seed: u64) -> Result<()> {
    // ChaCha8 is consistent across builds and platforms
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let network = make_random_network(systems, &mut rng)?;
    let engine = NumericEngine::default();
    let config = SimulationConfig::default();
    let mut state = uniform_state(&network, &engine, 12.0, 90.0);

    let start = Instant::now();
    for _ in 0..steps {
        state = network.step(&state, &engine, &config)?;
    }
    println!(
        "stepped {} links for {} steps in {:.2?}",
        network.links().len(),
        steps,
        start.elapsed()
    );
    Ok(())
}

/// Two mainline links fed by a metered on-ramp at the entry and a
/// simplified ramp merging halfway, draining into a congestion scenario.
fn demo_network() -> Result<Network> {
    let mut network = Network::new("demo");
    let n1 = network.add_node("N1")?;
    let n2 = network.add_node("N2")?;
    let n3 = network.add_node("N3")?;
    let parameters = metanet_core::link::LinkParameters {
        num_segments: 4,
        lanes: 2.0,
        segment_length: 1.0,
        max_density: 180.0,
        critical_density: 33.5,
        free_flow_speed: 102.0,
        speed_exponent: 1.867,
        turn_rate: 1.0,
        lane_drop: None,
    };
    let mut second = parameters.clone();
    second.num_segments = 2;
    network.add_link("L1", n1, n2, parameters)?;
    network.add_link("L2", n2, n3, second)?;
    network.add_metered_ramp("O1", n1, 3500.0, RampMetering::CapacityFraction)?;
    network.add_simple_metered_ramp("O2", n2, 2000.0)?;
    network.add_congested_destination("D1", n3, Some(20.0))?;
    network.validate()?;
    Ok(network)
}

fn write_state(
    writer: &mut csv::Writer<File>,
    step: usize,
    network: &Network,
    state: &NetworkState,
) -> Result<()> {
    for link in network.links().iter() {
        let link_state = state.link(link.index())?;
        for segment in 0..link_state.num_segments() {
            writer.write_record([
                step.to_string(),
                link.name().to_string(),
                segment.to_string(),
                format!("{:.4}", link_state.density[segment]),
                format!("{:.4}", link_state.speed[segment]),
            ])?;
        }
    }
    Ok(())
}

fn print_summary(network: &Network, state: &NetworkState) {
    println!("{:<12} {:>14} {:>12}", "link", "mean density", "mean speed");
    for link in network.links().iter() {
        if let Ok(link_state) = state.link(link.index()) {
            let n = link_state.num_segments() as f64;
            println!(
                "{:<12} {:>14.2} {:>12.2}",
                link.name(),
                link_state.density.sum() / n,
                link_state.speed.sum() / n
            );
        }
    }
}
