//! Synthetic order-flow driver for exploring the engine's behavior under
//! noisy, continuous load.
//!
//! This is one of the collaborators spec.md §1 calls out as deliberately
//! out of core scope ("synthetic test drivers, random order generators").
//! It drives an `Engine` in-process — the teacher's equivalent drove a
//! live HTTP API instead, which only made sense while this crate exposed
//! one; the simulation logic (Poisson arrivals, a drifting mid-price,
//! simple inventory/PnL bookkeeping) is kept as-is.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use rand_distr::{Distribution, Exp, Exp1, Normal};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::Engine;
use crate::order::Side;

#[derive(Clone)]
pub struct SimConfig {
    pub symbol: String,
    pub run_secs: Option<u64>,
    /// Poisson arrival rate (orders/sec), lambda.
    pub attack_rate_hz: f64,
    /// Std. deviation of the random-walk applied to the mid-price each tick.
    pub noise_sigma: f64,
    /// Average order size (unit-exponential draw scaled by this).
    pub mean_qty: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            symbol: "BTC-USD".to_string(),
            run_secs: Some(10),
            attack_rate_hz: 5.0,
            noise_sigma: 0.1,
            mean_qty: 5.0,
        }
    }
}

fn fresh_id(prefix: &str, seq: u64) -> String {
    format!("{prefix}-{seq}")
}

/// Runs a noisy limit-order simulation loop against `engine` until either
/// `cfg.run_secs` elapses or `cancel_token` fires. `engine` is expected to
/// already have a book for `cfg.symbol` (see `Engine::add_book`).
pub async fn run_simulation(
    engine: Arc<Engine>,
    cfg: SimConfig,
    cancel_token: CancellationToken,
) -> anyhow::Result<()> {
    let ia = Exp::new(cfg.attack_rate_hz).expect("attack_rate_hz must be > 0");
    let drift = Normal::new(0.0, cfg.noise_sigma.max(1e-9)).expect("noise_sigma >= 0");
    let size = Exp1;

    let mut inventory: i64 = 0;
    let mut pnl: f64 = 0.0;
    let mut mid: f64 = 50.0;
    let start = Instant::now();
    let spread = 1.0_f64;
    let mut seq: u64 = 0;

    loop {
        if let Some(max_secs) = cfg.run_secs {
            if start.elapsed().as_secs() >= max_secs {
                break;
            }
        }

        let wait_secs: f64 = ia.sample(&mut rand::rng());
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("received shutdown; exiting simulation loop");
                break;
            }
            _ = sleep(Duration::from_secs_f64(wait_secs)) => {}
        }

        let unit: f64 = size.sample(&mut rand::rng());
        let qty = (unit * cfg.mean_qty).max(1.0).round() as u64;

        mid += drift.sample(&mut rand::rng());

        let (price, side) = if rand::rng().random_bool(0.5) {
            (mid - spread, Side::Buy)
        } else {
            (mid + spread, Side::Sell)
        };
        let price = price.max(1.0).round() as u64;

        seq += 1;
        let id = fresh_id("sim", seq);
        let trades = engine.place_limit(&cfg.symbol, id, side, qty, price);
        if trades.is_empty() {
            continue;
        }

        for t in &trades {
            let px = t.price as f64;
            let q = t.size as f64;
            match side {
                Side::Buy => {
                    inventory -= t.size as i64;
                    pnl += px * q;
                }
                Side::Sell => {
                    inventory += t.size as i64;
                    pnl -= px * q;
                }
            }
        }

        info!(
            elapsed = format_args!("{:.1}s", start.elapsed().as_secs_f64()),
            ?side,
            qty,
            price,
            mid = format_args!("{:.2}", mid),
            inventory,
            pnl = format_args!("{:.2}", pnl),
            "sim tick"
        );
    }

    if cfg.run_secs.is_none() && !cancel_token.is_cancelled() {
        warn!("simulation loop exited without a run_secs bound or a cancellation");
    }
    info!(inventory, pnl = format_args!("{:.2}", pnl), "simulation done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulation_runs_for_bounded_time_and_produces_some_activity() {
        let engine = Arc::new(Engine::new());
        engine.add_book("BTC-USD");
        // seed a resting order so the first few synthetic orders can cross
        engine.place_limit("BTC-USD", "seed-bid", Side::Buy, 1_000_000, 45);
        engine.place_limit("BTC-USD", "seed-ask", Side::Sell, 1_000_000, 55);

        let cfg = SimConfig {
            symbol: "BTC-USD".to_string(),
            run_secs: Some(1),
            attack_rate_hz: 50.0,
            noise_sigma: 0.05,
            mean_qty: 2.0,
        };
        let token = CancellationToken::new();
        run_simulation(engine.clone(), cfg, token).await.unwrap();

        // the book should have changed shape somehow: either residual
        // quantity was consumed, or new resting orders appeared.
        let has_orders = engine.get_book("BTC-USD", |b| b.orders().count()).unwrap();
        assert!(has_orders > 0);
    }

    #[tokio::test]
    async fn cancellation_token_stops_the_loop_promptly() {
        let engine = Arc::new(Engine::new());
        engine.add_book("BTC-USD");
        let token = CancellationToken::new();
        let token_clone = token.clone();
        token.cancel();
        let cfg = SimConfig {
            run_secs: None,
            ..SimConfig::default()
        };
        // should return almost immediately since the token is pre-cancelled
        run_simulation(engine, cfg, token_clone).await.unwrap();
    }
}
