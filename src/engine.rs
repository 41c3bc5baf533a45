use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{info, warn};

use crate::book::Book;
use crate::order::{Order, OrderKind, Side};
use crate::trade::Trade;

/// A callback notified, synchronously and in registration order, of every
/// trade produced by a `place_limit`/`place_market` call.
///
/// Observers run on the caller's thread while the engine's lock is held
/// (see the crate's concurrency docs). Reentrant calls back into the
/// `Engine` from an observer are a contract violation (deadlock-class) and
/// are not defensively guarded against, matching the teacher's documented
/// treatment of the same hazard in its broadcast-channel fan-out.
pub type TradeObserver = Box<dyn FnMut(&Trade) + Send>;

/// The part of the engine's state that lives behind the single mutex.
///
/// Bundling `books`, `id_index`, `observers` and `clock` in one struct
/// behind one `Mutex` is what makes every `Engine` operation linearizable:
/// a thread holds the lock for the operation's entire duration, including
/// observer notification, and release only happens once the operation has
/// fully committed (see spec §5).
struct EngineInner {
    books: HashMap<String, Book>,
    /// For each order id, the FIFO-ordered list of symbols it was last
    /// registered under — multi-valued because ids may be reused across
    /// time or across instruments (spec §4.2).
    id_index: HashMap<String, std::collections::VecDeque<String>>,
    observers: Vec<TradeObserver>,
    clock: u64,
}

impl EngineInner {
    fn next_timestamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn register_id(&mut self, id: &str, symbol: &str) {
        self.id_index
            .entry(id.to_string())
            .or_default()
            .push_back(symbol.to_string());
    }

    /// Removes the most-recently-registered `(id -> symbol)` entry added by
    /// the in-flight `place_*` call, used when that order did not come to
    /// rest (Open Question 3: no dangling entry for an order with no
    /// resting counterpart). Only correct for the taker's own just-pushed
    /// entry — an id already resting elsewhere under an earlier entry for
    /// the same symbol must not be disturbed.
    fn unregister_last_id(&mut self, id: &str, symbol: &str) {
        if let Some(entries) = self.id_index.get_mut(id) {
            if let Some(pos) = entries.iter().rposition(|s| s == symbol) {
                entries.remove(pos);
            }
            if entries.is_empty() {
                self.id_index.remove(id);
            }
        }
    }

    /// Removes the FIFO-first `(id -> symbol)` entry matching `symbol`,
    /// used to retire a *resting* order's index entry once it stops
    /// resting — via an explicit `cancel`, or because it was fully
    /// consumed as a maker in someone else's match. FIFO-first is required
    /// here (unlike `unregister_last_id`) because §4.2 resolves an id
    /// resting on the same symbol more than once by always acting on the
    /// earliest-registered entry first.
    fn unregister_front_id(&mut self, id: &str, symbol: &str) {
        if let Some(entries) = self.id_index.get_mut(id) {
            if let Some(pos) = entries.iter().position(|s| s == symbol) {
                entries.remove(pos);
            }
            if entries.is_empty() {
                self.id_index.remove(id);
            }
        }
    }

    fn notify(&mut self, trades: &[Trade]) {
        for trade in trades {
            for observer in self.observers.iter_mut() {
                observer(trade);
            }
        }
    }
}

/// Owns every instrument's `Book`, the `id -> symbol` index that makes
/// cancellation a single lookup, the ordered list of trade observers, and
/// the timestamp generator. Routes orders to the right book and serializes
/// all mutating and inspecting operations through one lock (spec §5); this
/// mirrors the teacher's single `RwLock<HashMap<Pair, OrderBook>>`, but a
/// plain `std::sync::Mutex` is enough here since the engine is a
/// synchronous library with no `.await` inside the critical section.
pub struct Engine {
    inner: Mutex<EngineInner>,
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            inner: Mutex::new(EngineInner {
                books: HashMap::new(),
                id_index: HashMap::new(),
                observers: Vec::new(),
                clock: 0,
            }),
        }
    }

    /// Creates a fresh `Book` for `symbol` if none exists yet. Idempotent:
    /// calling this any number of times for the same symbol is equivalent
    /// to calling it once.
    pub fn add_book(&self, symbol: impl Into<String>) {
        let symbol = symbol.into();
        let mut inner = self.inner.lock().unwrap();
        inner.books.entry(symbol.clone()).or_insert_with(|| {
            info!(%symbol, "book created");
            Book::new(symbol)
        });
    }

    /// Places a Limit order. Returns an empty trade list (no state change)
    /// if `symbol` has no book. Otherwise the order is timestamped,
    /// matched against the resting contra side, and — iff any quantity
    /// remains after matching — rested on the book. Observers are notified
    /// of every trade in emission order before this call returns.
    pub fn place_limit(
        &self,
        symbol: &str,
        id: impl Into<String>,
        side: Side,
        size: u64,
        price: u64,
    ) -> Vec<Trade> {
        self.place(symbol, id, side, OrderKind::Limit, size, Some(price))
    }

    /// Places a Market order. Identical to `place_limit` except the order
    /// carries no price and is always discarded after matching, regardless
    /// of residual quantity: market orders never rest (spec invariant 4).
    pub fn place_market(&self, symbol: &str, id: impl Into<String>, side: Side, size: u64) -> Vec<Trade> {
        self.place(symbol, id, side, OrderKind::Market, size, None)
    }

    fn place(
        &self,
        symbol: &str,
        id: impl Into<String>,
        side: Side,
        kind: OrderKind,
        size: u64,
        price: Option<u64>,
    ) -> Vec<Trade> {
        let id = id.into();
        let mut inner = self.inner.lock().unwrap();

        if !inner.books.contains_key(symbol) {
            warn!(%symbol, %id, "place on unknown symbol; no-op");
            return Vec::new();
        }

        let timestamp = inner.next_timestamp();
        inner.register_id(&id, symbol);

        let mut order = Order::new(id.clone(), side, kind, symbol, size, price, timestamp);
        let book = inner.books.get_mut(symbol).expect("checked above");
        let outcome = book.match_incoming(&mut order, timestamp);

        let rests = kind == OrderKind::Limit && order.remaining() > 0;
        if rests {
            book.add(order);
        } else {
            inner.unregister_last_id(&id, symbol);
        }
        // Every maker fully consumed by this match has stopped resting;
        // retire its id->symbol entry too, or a later reuse of the same
        // id elsewhere could have `cancel` consult this stale entry first
        // (see DESIGN.md). Each maker's entry is the FIFO-first one for
        // this symbol, not necessarily the most recent, so this must use
        // `unregister_front_id`.
        for maker_id in &outcome.filled_maker_ids {
            inner.unregister_front_id(maker_id, symbol);
        }

        inner.notify(&outcome.trades);
        outcome.trades
    }

    /// Cancels the FIFO-first resting order with this id, regardless of
    /// which symbol it rests on. Returns `false` if the id is unknown.
    pub fn cancel(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let Some(symbol) = inner.id_index.get(id).and_then(|q| q.front().cloned()) else {
            return false;
        };
        let Some(book) = inner.books.get_mut(&symbol) else {
            return false;
        };
        let cancelled = book.cancel(id);
        if cancelled {
            inner.unregister_front_id(id, &symbol);
        }
        cancelled
    }

    /// Runs `f` against a read-only view of `symbol`'s book, if it exists.
    ///
    /// A `Book` handle cannot be returned by value or by reference without
    /// either cloning the whole book or holding the engine's lock for the
    /// caller's lifetime; this closure-based accessor keeps the same
    /// linearizability guarantee as every other operation while letting
    /// callers read whatever they need (best bid/ask, a snapshot, ...) in
    /// one locked step.
    pub fn get_book<R>(&self, symbol: &str, f: impl FnOnce(&Book) -> R) -> Option<R> {
        let inner = self.inner.lock().unwrap();
        inner.books.get(symbol).map(f)
    }

    /// Runs `f` against every book, keyed by symbol, under one lock
    /// acquisition.
    pub fn all_books<R>(&self, f: impl FnOnce(&HashMap<String, Book>) -> R) -> R {
        let inner = self.inner.lock().unwrap();
        f(&inner.books)
    }

    /// Appends a trade observer to the ordered notification list.
    pub fn register_trade_observer(&self, observer: impl FnMut(&Trade) + Send + 'static) {
        let mut inner = self.inner.lock().unwrap();
        inner.observers.push(Box::new(observer));
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}
