//! convene CLI — run the meeting simulation.

use std::time::Duration;

use clap::{Parser, Subcommand};
use convene::config::{Config, DelayRange};
use convene::simulation::{Simulation, SimulationReport};
use convene::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(name = "convene", about = "A convener, its participants, and the work between them")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the simulation until Ctrl-C or the time limit
    Run {
        /// Number of participants (overrides CONVENE_PARTICIPANTS)
        #[arg(long)]
        participants: Option<u32>,
        /// Items on the new-work queue at start (overrides CONVENE_INITIAL_WORK)
        #[arg(long)]
        initial_work: Option<u32>,
        /// Stop after this many seconds
        #[arg(long)]
        duration_secs: Option<u64>,
        /// Producer interval in ms, "n" or "min..max" (overrides CONVENE_PRODUCE_MS)
        #[arg(long)]
        produce_ms: Option<DelayRange>,
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            participants,
            initial_work,
            duration_secs,
            produce_ms,
            json,
        } => {
            let mut config = Config::from_env()?;
            if let Some(n) = participants {
                anyhow::ensure!(n > 0, "--participants must be at least 1");
                config.participants = n;
            }
            if let Some(n) = initial_work {
                config.initial_work = n;
            }
            if let Some(range) = produce_ms {
                config.timing.produce = range;
            }
            cmd_run(config, duration_secs.map(Duration::from_secs), json).await
        }
    }
}

async fn cmd_run(config: Config, duration: Option<Duration>, json: bool) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "convene".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let simulation = Simulation::new(config);

    let sim = simulation.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        sim.shutdown();
    });

    let report = simulation.run(duration).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &SimulationReport) {
    println!("Meetings held:   {}", report.meetings_held);
    println!("Items produced:  {}", report.items_produced);
    println!("Items retired:   {}", report.items_retired);
    println!("New work left:   {}", report.new_work_left);
    println!("Completed left:  {}", report.completed_work_left);
    println!("Final phase:     {}", report.final_state.phase());
    println!("---");
    println!("{:<16}  {:>6}  {:>6}", "PARTICIPANT", "CYCLES", "QUESTS");
    for p in &report.participants {
        println!("{:<16}  {:>6}  {:>6}", p.id.to_string(), p.cycles, p.quests_completed);
    }
}
