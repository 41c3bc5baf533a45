//! A small interactive-ish CLI over a single-process `Engine`, kept as the
//! demo entry point the spec treats as an external collaborator (§1: "the
//! process entry point ... are treated as external collaborators").
//!
//! Every subcommand runs against one in-memory `Engine` seeded with the
//! supported instrument pairs (see [`crate::instrument`]) and exits; there
//! is no persistence, matching the spec's non-goal.

use clap::{Parser, Subcommand, arg, builder::PossibleValuesParser};
use uuid::Uuid;

use crate::engine::Engine;
use crate::errors::DemoError;
use crate::instrument::Pair;
use crate::order::Side;

fn validate(quantity: u64, price: Option<u64>) -> Result<(), DemoError> {
    if quantity == 0 {
        return Err(DemoError::InvalidOrder("quantity must be > 0".to_string()));
    }
    if let Some(0) = price {
        return Err(DemoError::InvalidOrder(
            "limit price must be > 0".to_string(),
        ));
    }
    Ok(())
}

/// Simple CLI to interact with the order book engine.
#[derive(Parser)]
#[command(name = "Order Book CLI")]
#[command(author, version, about = "A demo of a limit order book engine")]
struct Cli {
    /// Trading pair to operate on, e.g. "BTC-USD".
    #[arg(long, default_value = "BTC-USD")]
    pair: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new limit order to the book.
    Add {
        /// buy or sell
        #[arg(value_parser = PossibleValuesParser::new(["buy", "sell"]))]
        side: String,
        /// Limit price, in ticks.
        price: u64,
        /// Quantity (must be > 0).
        quantity: u64,
    },
    /// Submit a market order and match it immediately.
    Match {
        /// buy or sell
        #[arg(value_parser = PossibleValuesParser::new(["buy", "sell"]))]
        side: String,
        /// Quantity (must be > 0).
        quantity: u64,
    },
    /// Cancel a resting order by id.
    Cancel {
        /// Order id, as printed by a prior `add`.
        id: String,
    },
    /// Display the current order book.
    Book,
}

fn parse_side(s: &str) -> Side {
    match s {
        "buy" => Side::Buy,
        "sell" => Side::Sell,
        _ => unreachable!("clap restricts values to buy/sell"),
    }
}

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

fn print_book(engine: &Engine, symbol: &str) {
    println!("------ Order Book ({symbol}) ------");
    let Some(snapshot) = engine.get_book(symbol, |b| b.snapshot()) else {
        println!("(no such book)");
        return;
    };
    println!("Bids (highest first):");
    for (price, qty) in snapshot.bids.iter().rev() {
        println!("  {price}: {qty}");
    }
    println!("Asks (lowest first):");
    for (price, qty) in &snapshot.asks {
        println!("  {price}: {qty}");
    }
    println!("-----------------------------------");
}

/// Runs a single CLI invocation against a freshly seeded `Engine`.
///
/// Exposed as a free function (rather than folded into `main`) so the
/// demo binary and integration tests can both drive it without spawning a
/// process. Input validation is this collaborator's own job (spec §6:
/// "validating order fields ... before submission" is a collaborator
/// responsibility, not the core's) — a validation failure is reported and
/// nothing reaches the engine.
pub fn run_cli() {
    let cli = Cli::parse();
    let engine = Engine::new();
    for pair in Pair::supported() {
        engine.add_book(pair.code());
    }

    if let Err(e) = cli
        .pair
        .parse::<Pair>()
        .map_err(DemoError::UnknownSymbol)
    {
        eprintln!("error: {e}");
        return;
    }

    let result = match cli.command {
        Commands::Add {
            side,
            price,
            quantity,
        } => validate(quantity, Some(price)).map(|()| {
            let id = fresh_id();
            let trades =
                engine.place_limit(&cli.pair, id.clone(), parse_side(&side), quantity, price);
            println!("order {id} placed");
            for t in &trades {
                println!("  trade: {t:?}");
            }
            if trades.is_empty() {
                println!("  resting, no immediate match");
            }
        }),
        Commands::Match { side, quantity } => validate(quantity, None).map(|()| {
            let id = fresh_id();
            let trades = engine.place_market(&cli.pair, id, parse_side(&side), quantity);
            if trades.is_empty() {
                println!("no trades occurred");
            } else {
                println!("trades generated:");
                for t in &trades {
                    println!("  {t:?}");
                }
            }
        }),
        Commands::Cancel { id } => {
            if engine.cancel(&id) {
                println!("order {id} cancelled");
            } else {
                println!("order {id} not found");
            }
            Ok(())
        }
        Commands::Book => {
            print_book(&engine, &cli.pair);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_quantity() {
        assert!(validate(0, Some(10)).is_err());
    }

    #[test]
    fn rejects_zero_price() {
        assert!(validate(10, Some(0)).is_err());
    }

    #[test]
    fn accepts_positive_quantity_and_price() {
        assert!(validate(10, Some(10)).is_ok());
        assert!(validate(10, None).is_ok());
    }

    #[test]
    fn rejects_unsupported_pair() {
        let err = "BTC-EUR".parse::<Pair>().map_err(DemoError::UnknownSymbol);
        assert!(err.is_err());
    }
}
