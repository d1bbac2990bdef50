use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dispatch_core::scenario::{build_dispatcher, ScenarioConfig};
use dispatch_core::{Dispatcher, TripRequest};
use log::info;

mod replay;

use replay::{load_steps, replay};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "dispatch_cli",
    about = "Replay trip requests and stop acknowledgments against the fleet dispatcher",
    long_about = "Loads a road graph and fleet (or the built-in three-zone demo network),\n\
                  replays bookings and stop acknowledgments, and prints every outcome\n\
                  followed by each vehicle's queue, traversal path and seat flow."
)]
struct Cli {
    /// Scenario JSON with the road graph, vehicles and dispatch settings
    #[arg(long, global = true, env = "DISPATCH_SCENARIO")]
    scenario: Option<PathBuf>,
    /// Print the fleet as JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON list of steps
    Run {
        /// File holding `[{"book": {...}}, {"ack": {...}}, {"splice": {...}}]`
        steps: PathBuf,
    },
    /// Book a single trip
    Book {
        pickup: String,
        destination: String,
        #[arg(long, default_value_t = 1)]
        seats: u32,
    },
    /// Print the fleet before any booking
    Show,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.scenario {
        Some(path) => {
            info!("loading scenario from {}", path.display());
            ScenarioConfig::from_path(path)?
        }
        None => ScenarioConfig::default(),
    };
    let dispatcher = build_dispatcher(&config)?;

    match cli.command {
        Commands::Run { steps } => {
            let steps = load_steps(&steps)?;
            for outcome in replay(&dispatcher, &steps) {
                println!("{}", serde_json::to_string(&outcome)?);
            }
        }
        Commands::Book {
            pickup,
            destination,
            seats,
        } => match dispatcher.make_booking(&TripRequest::new(pickup, destination, seats)) {
            Ok(vehicle) => println!("booked on {vehicle}"),
            Err(err) => println!("booking rejected: {err}"),
        },
        Commands::Show => {
            let graph = dispatcher.fleet().graph();
            println!(
                "{} stops, {} edges, {} vehicles",
                graph.node_count(),
                graph.edge_count(),
                dispatcher.fleet().len()
            );
        }
    }

    print_fleet(&dispatcher, cli.json)
}

fn print_fleet(dispatcher: &Dispatcher, json: bool) -> Result<(), Box<dyn Error>> {
    let fleet = dispatcher.snapshot_fleet();
    if json {
        println!("{}", serde_json::to_string_pretty(&fleet)?);
    } else {
        for vehicle in &fleet {
            println!("{vehicle}");
        }
    }
    Ok(())
}
