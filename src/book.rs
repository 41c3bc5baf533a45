use std::collections::{BTreeMap, HashMap, VecDeque};

use tracing::{debug, info};

use crate::order::{Order, OrderKind, OrderStatus, Side};
use crate::trade::Trade;

/// Resting-order state for a single instrument.
///
/// Each side is an ordered map from price level to a FIFO queue of resting
/// orders — `bids` ascending by price (best bid is the *last* entry),
/// `asks` ascending by price (best ask is the *first* entry). `id_index`
/// tracks, for every live order id, the FIFO-ordered list of locations
/// (`side`, `price`) it occupies; together with invariant (2) this gives
/// cancellation cost bounded by the depth of a single price level rather
/// than the whole book.
pub struct Book {
    pub symbol: String,
    bids: BTreeMap<u64, VecDeque<Order>>,
    asks: BTreeMap<u64, VecDeque<Order>>,
    id_index: HashMap<String, VecDeque<(Side, u64)>>,
    pub last_update_time: u64,
}

/// A read-only view of the resting volume at each price level, used by
/// callers that want to display book state without holding a reference
/// into the engine (printing is explicitly a collaborator's job, not the
/// core's).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BookSnapshot {
    pub symbol: String,
    /// (price, total remaining quantity), best bid last.
    pub bids: Vec<(u64, u64)>,
    /// (price, total remaining quantity), best ask first.
    pub asks: Vec<(u64, u64)>,
}

/// The result of one `Book::match_incoming` call: the chronologically
/// ordered trades produced, plus the ids of any resting (maker) orders
/// that were fully filled and removed from the book along the way. The
/// `Engine` needs the latter to retire its own `id -> symbol` index
/// entries for orders it no longer has any way to look up by id once
/// they've stopped resting.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub trades: Vec<Trade>,
    pub filled_maker_ids: Vec<String>,
}

impl Book {
    pub fn new(symbol: impl Into<String>) -> Self {
        Book {
            symbol: symbol.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            id_index: HashMap::new(),
            last_update_time: 0,
        }
    }

    fn side_map(&mut self, side: Side) -> &mut BTreeMap<u64, VecDeque<Order>> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn side_map_ref(&self, side: Side) -> &BTreeMap<u64, VecDeque<Order>> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn register_index(&mut self, id: String, side: Side, price: u64) {
        self.id_index.entry(id).or_default().push_back((side, price));
    }

    fn unregister_index(&mut self, id: &str, side: Side, price: u64) {
        if let Some(locs) = self.id_index.get_mut(id) {
            if let Some(pos) = locs.iter().position(|&(s, p)| s == side && p == price) {
                locs.remove(pos);
            }
            if locs.is_empty() {
                self.id_index.remove(id);
            }
        }
    }

    /// Inserts a Limit order, preserving price-time priority.
    ///
    /// Panics if `order` is a Market order, belongs to a different symbol,
    /// or has no remaining quantity — all programmer errors per the
    /// documented contract, never triggered by data arriving through
    /// `Engine::place_limit`/`place_market`.
    pub fn add(&mut self, order: Order) {
        assert_eq!(
            order.kind,
            OrderKind::Limit,
            "Book::add called with a Market order (id {})",
            order.id
        );
        assert_eq!(
            order.symbol, self.symbol,
            "Book::add called with mismatched symbol: book is {}, order is {}",
            self.symbol, order.symbol
        );
        assert!(
            order.remaining() > 0,
            "Book::add called with a fully-filled order (id {})",
            order.id
        );
        let price = order
            .price
            .expect("Limit order must carry a price (invariant violated upstream)");
        let id = order.id.clone();
        let side = order.side;
        info!(symbol = %self.symbol, id = %id, ?side, price, "resting order added to book");
        self.side_map(side)
            .entry(price)
            .or_default()
            .push_back(order);
        self.register_index(id, side, price);
    }

    /// Cancels the FIFO-first resting order matching `id`. Returns `true`
    /// if an order was found and removed, `false` otherwise. Never emits a
    /// trade.
    pub fn cancel(&mut self, id: &str) -> bool {
        let Some((side, price)) = self.id_index.get(id).and_then(|locs| locs.front().copied())
        else {
            return false;
        };
        let map = self.side_map(side);
        let removed = if let Some(level) = map.get_mut(&price) {
            if let Some(pos) = level.iter().position(|o| o.id == id) {
                let mut order = level.remove(pos).unwrap();
                order.status = OrderStatus::Cancelled;
                if level.is_empty() {
                    map.remove(&price);
                }
                true
            } else {
                false
            }
        } else {
            false
        };
        if removed {
            self.unregister_index(id, side, price);
            info!(symbol = %self.symbol, id = %id, "resting order cancelled");
        }
        removed
    }

    /// Matches `incoming` against the contra side. Does not add any
    /// residual back onto the book — the caller decides that (see
    /// `Engine`).
    pub fn match_incoming(&mut self, incoming: &mut Order, now: u64) -> MatchOutcome {
        if incoming.remaining() == 0 {
            return MatchOutcome::default();
        }
        let contra = incoming.side.contra();
        let symbol = self.symbol.clone();
        let mut trades = Vec::new();
        // (maker id, price level) for every maker fully consumed; the id
        // index is updated after the loop so it never has to borrow `self`
        // while a price level's `&mut VecDeque` is still live.
        let mut filled_makers: Vec<(String, u64)> = Vec::new();

        loop {
            if incoming.remaining() == 0 {
                break;
            }
            let Some((&price, _)) = self.best_level(contra) else {
                break;
            };
            if !crosses(incoming, price) {
                break;
            }

            let mut level_emptied = false;
            {
                let level = self.side_map(contra).get_mut(&price).unwrap();
                let maker = level.front_mut().unwrap();
                let fill = incoming.remaining().min(maker.remaining());

                debug!(
                    symbol = %symbol,
                    taker = %incoming.id,
                    maker = %maker.id,
                    fill,
                    price,
                    "matched"
                );

                incoming.apply_fill(fill);
                maker.apply_fill(fill);

                let (buy_id, sell_id) = match incoming.side {
                    Side::Buy => (incoming.id.clone(), maker.id.clone()),
                    Side::Sell => (maker.id.clone(), incoming.id.clone()),
                };
                trades.push(Trade {
                    symbol: symbol.clone(),
                    buy_order_id: buy_id,
                    sell_order_id: sell_id,
                    size: fill,
                    price,
                    timestamp: now,
                });

                if maker.is_filled() {
                    let maker_id = maker.id.clone();
                    level.pop_front();
                    filled_makers.push((maker_id, price));
                    level_emptied = level.is_empty();
                }
            }

            // Remove an emptied level immediately: the next iteration's
            // `best_level` must never hand back a level with no orders in
            // it, which would otherwise panic on `front_mut().unwrap()`.
            if level_emptied {
                self.side_map(contra).remove(&price);
            }
        }

        let mut filled_maker_ids = Vec::with_capacity(filled_makers.len());
        for (maker_id, price) in filled_makers {
            self.unregister_index(&maker_id, contra, price);
            filled_maker_ids.push(maker_id);
        }

        self.last_update_time = now;
        MatchOutcome {
            trades,
            filled_maker_ids,
        }
    }

    fn best_level(&self, side: Side) -> Option<(&u64, &VecDeque<Order>)> {
        match side {
            Side::Buy => self.bids.iter().next_back(),
            Side::Sell => self.asks.iter().next(),
        }
    }

    /// Highest resting buy price, or `0` (the "no-bid" sentinel) if the
    /// buy side is empty.
    pub fn best_bid(&self) -> u64 {
        self.bids.keys().next_back().copied().unwrap_or(0)
    }

    /// Lowest resting sell price, or `u64::MAX` (the "no-ask" sentinel) if
    /// the sell side is empty.
    pub fn best_ask(&self) -> u64 {
        self.asks.keys().next().copied().unwrap_or(u64::MAX)
    }

    /// Sum of `remaining()` over all resting orders at exactly `price` on
    /// `side`.
    pub fn volume_at_price(&self, side: Side, price: u64) -> u64 {
        self.side_map_ref(side)
            .get(&price)
            .map(|q| q.iter().map(Order::remaining).sum())
            .unwrap_or(0)
    }

    /// Enumerates every resting order on both sides, in no particular
    /// cross-side order (within a side, price-time order is preserved).
    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.bids
            .values()
            .flatten()
            .chain(self.asks.values().flatten())
    }

    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            symbol: self.symbol.clone(),
            bids: self
                .bids
                .iter()
                .rev()
                .map(|(p, q)| (*p, q.iter().map(Order::remaining).sum()))
                .collect(),
            asks: self
                .asks
                .iter()
                .map(|(p, q)| (*p, q.iter().map(Order::remaining).sum()))
                .collect(),
        }
    }
}

/// Cross check from the distilled spec's matching algorithm: a Market
/// taker always crosses; a Limit taker crosses only while its price still
/// permits execution against the best resting maker price.
fn crosses(incoming: &Order, maker_price: u64) -> bool {
    match incoming.kind {
        OrderKind::Market => true,
        OrderKind::Limit => {
            let price = incoming
                .price
                .expect("Limit order must carry a price (invariant violated upstream)");
            match incoming.side {
                Side::Buy => price >= maker_price,
                Side::Sell => price <= maker_price,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(id: &str, side: Side, price: u64, size: u64, ts: u64) -> Order {
        Order::new(id, side, OrderKind::Limit, "T", size, Some(price), ts)
    }

    fn market(id: &str, side: Side, size: u64, ts: u64) -> Order {
        Order::new(id, side, OrderKind::Market, "T", size, None, ts)
    }

    #[test]
    fn single_full_match() {
        let mut book = Book::new("T");
        book.add(limit("SELL1", Side::Sell, 10, 100, 1));
        let mut buy = limit("BUY1", Side::Buy, 10, 100, 2);
        let outcome = book.match_incoming(&mut buy, 2);
        let trades = outcome.trades;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].buy_order_id, "BUY1");
        assert_eq!(trades[0].sell_order_id, "SELL1");
        assert_eq!(trades[0].size, 100);
        assert_eq!(trades[0].price, 10);
        assert_eq!(outcome.filled_maker_ids, vec!["SELL1".to_string()]);
        assert_eq!(book.best_bid(), 0);
        assert_eq!(book.best_ask(), u64::MAX);
    }

    #[test]
    fn price_priority_then_fifo() {
        let mut book = Book::new("T");
        book.add(limit("S1", Side::Sell, 10, 100, 1));
        book.add(limit("S2", Side::Sell, 10, 100, 2));
        book.add(limit("S3", Side::Sell, 9, 100, 3));
        let mut buy = limit("B1", Side::Buy, 10, 200, 4);
        let outcome = book.match_incoming(&mut buy, 4);
        let trades = outcome.trades;
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].sell_order_id, "S3");
        assert_eq!(trades[0].price, 9);
        assert_eq!(trades[1].sell_order_id, "S1");
        assert_eq!(trades[1].price, 10);
        assert_eq!(outcome.filled_maker_ids, vec!["S3".to_string(), "S1".to_string()]);
        assert_eq!(book.volume_at_price(Side::Sell, 10), 100);
    }

    #[test]
    fn partial_fill_rests() {
        let mut book = Book::new("T");
        book.add(limit("S1", Side::Sell, 10, 100, 1));
        book.add(limit("S2", Side::Sell, 11, 200, 2));
        book.add(limit("S3", Side::Sell, 12, 300, 3));
        let mut buy = limit("B1", Side::Buy, 15, 1000, 4);
        let outcome = book.match_incoming(&mut buy, 4);
        assert_eq!(outcome.trades.len(), 3);
        assert_eq!(outcome.filled_maker_ids.len(), 3);
        assert_eq!(buy.remaining(), 400);
        assert!(buy.price.unwrap() == 15);
    }

    #[test]
    fn market_insufficient_liquidity_is_discarded_by_caller() {
        let mut book = Book::new("T");
        book.add(limit("B1", Side::Buy, 10, 100, 1));
        book.add(limit("B2", Side::Buy, 9, 100, 2));
        let mut sell = market("M1", Side::Sell, 300, 3);
        let outcome = book.match_incoming(&mut sell, 3);
        assert_eq!(outcome.trades.len(), 2);
        assert_eq!(outcome.trades[0].price, 10);
        assert_eq!(outcome.trades[1].price, 9);
        assert_eq!(outcome.filled_maker_ids, vec!["B1".to_string(), "B2".to_string()]);
        assert_eq!(sell.filled, 200);
        assert_eq!(sell.remaining(), 100);
    }

    #[test]
    fn draining_a_sole_order_price_level_does_not_panic_on_the_next_level() {
        // Each price level below holds exactly one order, so fully filling
        // one empties its level immediately. The taker still has
        // remaining quantity afterward and must move on to the next best
        // level instead of re-selecting the just-emptied one.
        let mut book = Book::new("T");
        book.add(limit("S1", Side::Sell, 10, 50, 1));
        book.add(limit("S2", Side::Sell, 11, 50, 2));
        book.add(limit("S3", Side::Sell, 12, 50, 3));
        let mut buy = limit("B1", Side::Buy, 12, 150, 4);
        let outcome = book.match_incoming(&mut buy, 4);
        assert_eq!(outcome.trades.len(), 3);
        assert_eq!(outcome.trades[0].price, 10);
        assert_eq!(outcome.trades[1].price, 11);
        assert_eq!(outcome.trades[2].price, 12);
        assert_eq!(buy.remaining(), 0);
        assert_eq!(book.best_ask(), u64::MAX);
    }

    #[test]
    fn cancel_then_cancel_again() {
        let mut book = Book::new("T");
        book.add(limit("U", Side::Buy, 10, 100, 1));
        assert!(book.cancel("U"));
        assert!(!book.cancel("U"));
        assert_eq!(book.best_bid(), 0);
    }

    #[test]
    fn duplicate_id_cancels_fifo() {
        let mut book = Book::new("T");
        book.add(limit("U", Side::Buy, 10, 100, 1));
        book.add(limit("U", Side::Buy, 11, 200, 2));
        assert!(book.cancel("U"));
        assert_eq!(book.best_bid(), 11);
        assert!(book.cancel("U"));
        assert_eq!(book.best_bid(), 0);
        assert!(!book.cancel("U"));
    }

    #[test]
    fn fifo_at_equal_price() {
        let mut book = Book::new("T");
        book.add(limit("A", Side::Buy, 10, 100, 1));
        book.add(limit("B", Side::Buy, 10, 100, 2));
        book.add(limit("C", Side::Buy, 11, 100, 3));
        let mut sell = limit("S", Side::Sell, 9, 250, 4);
        let outcome = book.match_incoming(&mut sell, 4);
        let trades = outcome.trades;
        assert_eq!(trades.len(), 3);
        assert_eq!(trades[0].buy_order_id, "C");
        assert_eq!(trades[0].size, 100);
        assert_eq!(trades[1].buy_order_id, "A");
        assert_eq!(trades[1].size, 100);
        assert_eq!(trades[2].buy_order_id, "B");
        assert_eq!(trades[2].size, 50);
        // B was only partially filled (50 of 100) and stays resting.
        assert_eq!(outcome.filled_maker_ids, vec!["C".to_string(), "A".to_string()]);
        assert_eq!(book.volume_at_price(Side::Buy, 10), 50);
    }

    #[test]
    fn limit_taker_rests_when_it_does_not_cross() {
        let mut book = Book::new("T");
        book.add(limit("S1", Side::Sell, 100, 5, 1));
        let mut buy = limit("B1", Side::Buy, 50, 10, 2);
        let outcome = book.match_incoming(&mut buy, 2);
        assert!(outcome.trades.is_empty());
        assert!(outcome.filled_maker_ids.is_empty());
        assert_eq!(buy.remaining(), 10);
    }

    #[test]
    fn already_filled_incoming_returns_no_trades() {
        let mut book = Book::new("T");
        book.add(limit("S1", Side::Sell, 10, 100, 1));
        let mut buy = limit("B1", Side::Buy, 10, 0, 2);
        let outcome = book.match_incoming(&mut buy, 2);
        assert!(outcome.trades.is_empty());
        assert!(outcome.filled_maker_ids.is_empty());
        assert_eq!(book.volume_at_price(Side::Sell, 10), 100);
    }

    #[test]
    #[should_panic(expected = "Market order")]
    fn add_rejects_market_order() {
        let mut book = Book::new("T");
        book.add(market("M", Side::Buy, 10, 1));
    }
}
