//! A small set of demo instrument symbols used by the CLI and the
//! simulation driver. The `Engine` itself only ever sees the plain
//! `&str`/`String` symbol the spec describes — this type exists purely so
//! those two collaborators have something nicer than a bare string to
//! parse from argv and print back.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    BTC,
    USD,
    ETH,
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Asset::BTC => "BTC",
            Asset::USD => "USD",
            Asset::ETH => "ETH",
        };
        f.write_str(s)
    }
}

impl FromStr for Asset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BTC" => Ok(Asset::BTC),
            "USD" => Ok(Asset::USD),
            "ETH" => Ok(Asset::ETH),
            other => Err(format!("unsupported asset `{other}`")),
        }
    }
}

/// A trading pair: base/quote. Its `code()` (e.g. `"BTC-USD"`) is what
/// actually gets handed to `Engine::add_book`/`place_limit` as the symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pair {
    /// The asset you buy or sell.
    pub base: Asset,
    /// The asset you pay or receive.
    pub quote: Asset,
}

impl Pair {
    /// Returns the usual string code, e.g. `"BTC-USD"`.
    pub fn code(&self) -> String {
        format!("{}-{}", self.base, self.quote)
    }

    /// crypto-USD factory for spot pairs.
    pub fn crypto_usd(base: Asset) -> Self {
        Pair {
            base,
            quote: Asset::USD,
        }
    }

    /// The pairs the demo CLI and simulator know how to quote.
    pub fn supported() -> &'static [Pair] {
        &[BTC_USD, ETH_USD]
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl FromStr for Pair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('-')
            .ok_or_else(|| format!("malformed pair `{s}`, expected BASE-QUOTE"))?;
        let parsed = Pair {
            base: base.parse()?,
            quote: quote.parse()?,
        };
        Pair::supported()
            .iter()
            .find(|p| **p == parsed)
            .copied()
            .ok_or_else(|| format!("unsupported pair `{s}`"))
    }
}

impl Serialize for Pair {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.code())
    }
}

impl<'de> Deserialize<'de> for Pair {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

pub const BTC_USD: Pair = Pair {
    base: Asset::BTC,
    quote: Asset::USD,
};
pub const ETH_USD: Pair = Pair {
    base: Asset::ETH,
    quote: Asset::USD,
};
