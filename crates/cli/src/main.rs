use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};

use paper_arb_core::{AppConfig, ConfigLoader, MarketSource, Venue};
use paper_arb_engine::{Engine, TracingNotifier};
use paper_arb_sim::{FixtureMarketSource, SyntheticMarketSource};

#[derive(Parser)]
#[command(name = "paper-arb")]
#[command(about = "Paper-trading arbitrage engine for prediction markets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the iteration loop until the configured iteration count
    Run {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Override the configured iteration count
        #[arg(long)]
        iterations: Option<u64>,
        /// Number of synthetic markets per venue
        #[arg(long, default_value_t = 30)]
        markets: usize,
        /// Seed for the synthetic market population
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Run a single iteration and exit
    Once {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Number of synthetic markets per venue
        #[arg(long, default_value_t = 30)]
        markets: usize,
        /// Seed for the synthetic market population
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Run the detector pipeline against fixture markets and print counts
    Selftest {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Path to a JSON array of markets
        #[arg(long)]
        fixtures: Option<String>,
        /// Seed used when no fixture file is given
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

/// Builds the market sources for a run.
///
/// Live venue adapters plug in through the `MarketSource` contract; this
/// binary ships with the deterministic synthetic sources only, so a default
/// run performs no network I/O.
fn build_sources(config: &AppConfig, markets: usize, seed: u64) -> Vec<Box<dyn MarketSource>> {
    if config.engine.dual_venue {
        vec![
            Box::new(
                SyntheticMarketSource::new(Venue::Kalshi, markets, seed)
                    .with_filter(config.filter.clone()),
            ),
            Box::new(
                SyntheticMarketSource::new(Venue::Polymarket, markets, seed.wrapping_add(1000))
                    .with_filter(config.filter.clone()),
            ),
        ]
    } else {
        vec![Box::new(
            SyntheticMarketSource::new(Venue::Polymarket, markets, seed)
                .with_filter(config.filter.clone()),
        )]
    }
}

fn spawn_shutdown_handler(engine: &Engine) {
    let flag = engine.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, finishing current iteration");
            flag.store(true, Ordering::Relaxed);
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            iterations,
            markets,
            seed,
        } => {
            let mut config = ConfigLoader::load_from(&config)?;
            if let Some(iterations) = iterations {
                config.engine.iterations = iterations;
            }
            let sources = build_sources(&config, markets, seed);
            let mut engine = Engine::new(config, sources, Some(Box::new(TracingNotifier)))?;
            spawn_shutdown_handler(&engine);
            engine.run().await?;
        }
        Commands::Once {
            config,
            markets,
            seed,
        } => {
            let config = ConfigLoader::load_from(&config)?;
            let sources = build_sources(&config, markets, seed);
            let mut engine = Engine::new(config, sources, Some(Box::new(TracingNotifier)))?;
            let outcome = engine.run_once().await?;
            println!(
                "iteration {}: {} markets, {} detected, {} approved, {} fills",
                outcome.iteration,
                outcome.markets,
                outcome.detected,
                outcome.approved,
                outcome.fills
            );
        }
        Commands::Selftest {
            config,
            fixtures,
            seed,
        } => {
            let config = ConfigLoader::load_from(&config)?;
            let source: Box<dyn MarketSource> = match fixtures {
                Some(path) => Box::new(
                    FixtureMarketSource::from_json_file(Venue::Polymarket, &path)?
                        .with_filter(config.filter.clone()),
                ),
                None => Box::new(
                    SyntheticMarketSource::new(Venue::Polymarket, 30, seed)
                        .with_filter(config.filter.clone()),
                ),
            };
            let mut engine = Engine::new(config, vec![source], None)?;
            let outcome = engine.run_once().await?;
            println!(
                "self-test detected {} opportunities across {} markets ({} approved)",
                outcome.detected, outcome.markets, outcome.approved
            );
        }
    }

    Ok(())
}
