//! Scene Layout CLI
//!
//! Usage:
//!   scene-layout [OPTIONS] solve [FILE]     Lay out a scene or batch, print JSON
//!   scene-layout [OPTIONS] analyze [FILE]   Print complexity profiles
//!   scene-layout [OPTIONS] qa [FILE]        Score rendered-frame telemetry
//!
//! Options:
//!   -c, --config <FILE>  Engine configuration (TOML format)
//!   -v, --verbose        Raise log level (repeat for more)
//!   -h, --help           Print help

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scene_layout::{
    parse_scenes, solve_json, EngineConfig, LayoutEngine, QaEngine, Scene, StrategyKind, Telemetry,
};

#[derive(Parser)]
#[command(name = "scene-layout")]
#[command(about = "Non-overlapping layout and QA scoring for timed scene elements")]
struct Cli {
    /// Engine configuration file (TOML format)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Raise log level: -v debug, -vv trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lay out a scene (or a `{ "scenes": [...] }` batch) and print the annotated elements
    Solve {
        /// Scene JSON (reads from stdin if not provided)
        input: Option<PathBuf>,

        /// Use this strategy instead of the recommended one
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Seed for the random perturbation
        #[arg(long)]
        seed: Option<u64>,

        /// Force-directed iteration cap
        #[arg(long)]
        iterations: Option<usize>,

        /// Skip physics weight tuning
        #[arg(long)]
        no_tuning: bool,

        /// Wall-clock budget per scene in milliseconds
        #[arg(long)]
        time_budget_ms: Option<u64>,
    },

    /// Print the complexity profile and recommended strategy of each scene
    Analyze {
        /// Scene JSON (reads from stdin if not provided)
        input: Option<PathBuf>,
    },

    /// Score rendered-frame telemetry
    Qa {
        /// Telemetry JSON (reads from stdin if not provided)
        input: Option<PathBuf>,

        /// Print a text summary instead of JSON
        #[arg(long)]
        summary: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Grid,
    Hierarchical,
    Radial,
    Force,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Grid => StrategyKind::Grid,
            StrategyArg::Hierarchical => StrategyKind::Hierarchical,
            StrategyArg::Radial => StrategyKind::Radial,
            StrategyArg::Force => StrategyKind::ForceDirected,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => match EngineConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => fail(&format!("Error loading config '{}': {}", path.display(), e)),
        },
        None => EngineConfig::default(),
    };

    match cli.command {
        Command::Solve {
            input,
            strategy,
            seed,
            iterations,
            no_tuning,
            time_budget_ms,
        } => {
            let mut config = config;
            if let Some(strategy) = strategy {
                config = config.with_strategy(strategy.into());
            }
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }
            if let Some(iterations) = iterations {
                config = config.with_max_iterations(iterations);
            }
            if no_tuning {
                config = config.with_tuning(false);
            }
            if let Some(budget) = time_budget_ms {
                config = config.with_time_budget_ms(budget);
            }
            if let Err(e) = config.validate() {
                fail(&format!("Error: {}", e));
            }

            let source = read_input(input.as_deref());
            let engine = LayoutEngine::new(config);
            match solve_json(&source, &engine) {
                Ok(outputs) => print_json(&outputs),
                Err(e) => fail(&format!("Error: {}", e)),
            }
        }
        Command::Analyze { input } => {
            let source = read_input(input.as_deref());
            let descriptors = match parse_scenes(&source) {
                Ok(d) => d,
                Err(e) => fail(&format!("Error: {}", e)),
            };
            let engine = LayoutEngine::new(config);
            let mut profiles = Vec::with_capacity(descriptors.len());
            for descriptor in descriptors {
                let scene = match Scene::from_descriptor(
                    descriptor,
                    engine.config().canvas,
                    &engine.config().sizing,
                ) {
                    Ok(s) => s,
                    Err(e) => fail(&format!("Error: {}", e)),
                };
                profiles.push(engine.analyze(&scene));
            }
            print_json(&profiles);
        }
        Command::Qa { input, summary } => {
            let source = read_input(input.as_deref());
            let telemetry = match Telemetry::from_json_str(&source) {
                Ok(t) => t,
                Err(e) => fail(&format!("Error: {}", e)),
            };
            let report = QaEngine::new(config.qa).evaluate(&telemetry);
            if summary {
                print!("{}", report.summary());
            } else {
                print_json(&report);
            }
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn read_input(path: Option<&Path>) -> String {
    match path {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => fail(&format!("Error reading file '{}': {}", path.display(), e)),
        },
        None => {
            let mut buffer = String::new();
            match io::stdin().read_to_string(&mut buffer) {
                Ok(_) => buffer,
                Err(e) => fail(&format!("Error reading from stdin: {}", e)),
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(&format!("Error serializing output: {}", e)),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}
