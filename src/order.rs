use serde::{Deserialize, Serialize};

/// Which side of the book an order rests on or crosses against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side an incoming order of this side matches against.
    pub fn contra(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Limit orders may rest; market orders always execute immediately or die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Limit,
    Market,
}

/// Lifecycle state of an order as tracked by the book that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

/// An inbound or resting instruction against a single instrument.
///
/// Prices are integer ticks, not floating point — see the crate's top-level
/// docs for why. `price` is `None` for a `Market` order and `Some(_)` for a
/// `Limit` order; the matching loop never compares a market order's price,
/// it simply always crosses (see [`crate::book::Book::match_incoming`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub side: Side,
    pub kind: OrderKind,
    pub symbol: String,
    pub size: u64,
    pub filled: u64,
    pub price: Option<u64>,
    pub timestamp: u64,
    pub status: OrderStatus,
}

impl Order {
    /// Constructs a fresh order with `status = New` and `filled = 0`.
    ///
    /// `price` must be `Some` for `OrderKind::Limit` and `None` for
    /// `OrderKind::Market`; callers (the Engine) are responsible for this.
    pub fn new(
        id: impl Into<String>,
        side: Side,
        kind: OrderKind,
        symbol: impl Into<String>,
        size: u64,
        price: Option<u64>,
        timestamp: u64,
    ) -> Self {
        Order {
            id: id.into(),
            side,
            kind,
            symbol: symbol.into(),
            size,
            filled: 0,
            price,
            timestamp,
            status: OrderStatus::New,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.size - self.filled
    }

    pub fn is_filled(&self) -> bool {
        self.remaining() == 0
    }

    /// Applies a fill of `qty` units, updating `filled` and `status`.
    ///
    /// Panics (an over-fill is a programmer error, not a recoverable
    /// condition — see the crate docs' error handling section) if `qty`
    /// exceeds `remaining()`.
    pub fn apply_fill(&mut self, qty: u64) {
        let remaining = self.remaining();
        if qty > remaining {
            panic!(
                "over-fill on order {}: tried to fill {qty} but only {remaining} remained",
                self.id
            );
        }
        self.filled += qty;
        self.status = if self.is_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_and_is_filled() {
        let mut o = Order::new("a", Side::Buy, OrderKind::Limit, "T", 100, Some(10), 1);
        assert_eq!(o.remaining(), 100);
        assert!(!o.is_filled());
        o.apply_fill(100);
        assert_eq!(o.remaining(), 0);
        assert!(o.is_filled());
        assert_eq!(o.status, OrderStatus::Filled);
    }

    #[test]
    fn partial_fill_sets_status() {
        let mut o = Order::new("a", Side::Sell, OrderKind::Limit, "T", 100, Some(10), 1);
        o.apply_fill(40);
        assert_eq!(o.remaining(), 60);
        assert_eq!(o.status, OrderStatus::PartiallyFilled);
    }

    #[test]
    #[should_panic(expected = "over-fill")]
    fn overfill_panics() {
        let mut o = Order::new("a", Side::Buy, OrderKind::Limit, "T", 10, Some(10), 1);
        o.apply_fill(11);
    }
}
