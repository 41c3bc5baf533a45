use serde::{Deserialize, Serialize};

/// A record of one execution between a resting (maker) order and an
/// incoming (taker) order.
///
/// - `price` is always the maker's price (the taker receives price
///   improvement, never pays worse than the best resting order it crossed).
/// - `size` is the quantity filled by this single execution, not the
///   taker's total fill across the whole matching pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub buy_order_id: String,
    pub sell_order_id: String,
    pub size: u64,
    pub price: u64,
    pub timestamp: u64,
}
