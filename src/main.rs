use std::sync::Arc;

use clap::{Parser, Subcommand};
use order_book_engine::engine::Engine;
use order_book_engine::instrument::{Asset, Pair};
use order_book_engine::order::Side;
use order_book_engine::simulate::{self, SimConfig};
use order_book_engine::utils::shutdown_token;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "engine-cli")]
#[command(author, version, about = "A demo of a limit-order-book-engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive add/match/cancel/book CLI.
    Interactive,
    /// Seed a resting bid/ask and run the noisy order-flow simulator for
    /// `secs` seconds (0 = run until Ctrl-C).
    Simulate { secs: u64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Interactive => {
            order_book_engine::cli::run_cli();
        }
        Commands::Simulate { secs } => {
            let token = shutdown_token();
            let engine = Arc::new(Engine::new());
            let pair = Pair::crypto_usd(Asset::BTC);
            engine.add_book(pair.code());

            // seed the book with a resting bid and ask
            engine.place_limit(&pair.code(), "seed-bid", Side::Buy, 10, 48);
            engine.place_limit(&pair.code(), "seed-ask", Side::Sell, 10, 52);
            tracing::info!(pair = %pair.code(), "seeded resting orders");

            let cfg = SimConfig {
                symbol: pair.code(),
                run_secs: if secs == 0 { None } else { Some(secs) },
                ..SimConfig::default()
            };
            simulate::run_simulation(engine, cfg, token).await?;
        }
    }
    Ok(())
}
