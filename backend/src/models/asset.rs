//! Chains, assets, coins and addresses
//!
//! Assets compare by identity (chain, symbol, ticker and synthetic marker),
//! never by display string. The settlement asset is `THOR.RUNE`; a synthetic
//! asset is a derivative claim that lives on the THOR chain regardless of the
//! chain of its layer-1 counterpart.
//!
//! # Example
//!
//! ```rust
//! use liquidity_settlement_core::models::asset::{Asset, Chain};
//!
//! let btc: Asset = "BTC.BTC".parse().unwrap();
//! let synth = btc.synthetic();
//! assert_eq!(synth.to_string(), "BTC/BTC");
//! assert_eq!(synth.settlement_chain(), Chain::Thor);
//! assert_eq!(synth.layer1(), btc);
//! assert_ne!(btc, synth);
//! ```

use crate::core::math::{amount_serde, Amount};
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseAssetError {
    #[error("unknown chain: {0}")]
    UnknownChain(String),

    #[error("malformed asset: {0}")]
    Malformed(String),
}

// ============================================================================
// Chain
// ============================================================================

/// Supported chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Chain {
    Thor,
    Btc,
    Eth,
    Bnb,
    Ltc,
    Bch,
    Doge,
    Gaia,
    Avax,
}

impl Chain {
    pub const ALL: [Chain; 9] = [
        Chain::Thor,
        Chain::Btc,
        Chain::Eth,
        Chain::Bnb,
        Chain::Ltc,
        Chain::Bch,
        Chain::Doge,
        Chain::Gaia,
        Chain::Avax,
    ];

    pub fn ticker(&self) -> &'static str {
        match self {
            Chain::Thor => "THOR",
            Chain::Btc => "BTC",
            Chain::Eth => "ETH",
            Chain::Bnb => "BNB",
            Chain::Ltc => "LTC",
            Chain::Bch => "BCH",
            Chain::Doge => "DOGE",
            Chain::Gaia => "GAIA",
            Chain::Avax => "AVAX",
        }
    }

    pub fn is_thor(&self) -> bool {
        matches!(self, Chain::Thor)
    }

    /// Asset used to pay network fees on this chain.
    pub fn gas_asset(&self) -> Asset {
        let symbol = match self {
            Chain::Thor => "RUNE",
            Chain::Btc => "BTC",
            Chain::Eth => "ETH",
            Chain::Bnb => "BNB",
            Chain::Ltc => "LTC",
            Chain::Bch => "BCH",
            Chain::Doge => "DOGE",
            Chain::Gaia => "ATOM",
            Chain::Avax => "AVAX",
        };
        Asset::new(*self, symbol)
    }

    /// Human-readable parts of bech32 addresses, mainnet first.
    fn bech32_hrps(&self) -> &'static [&'static str] {
        match self {
            Chain::Thor => &["thor", "tthor", "sthor"],
            Chain::Btc => &["bc", "tb", "bcrt"],
            Chain::Ltc => &["ltc", "tltc", "rltc"],
            Chain::Bnb => &["bnb", "tbnb"],
            Chain::Gaia => &["cosmos"],
            Chain::Eth | Chain::Avax | Chain::Bch | Chain::Doge => &[],
        }
    }

    /// Leading characters of mainnet base58 addresses.
    fn base58_versions(&self) -> &'static [char] {
        match self {
            Chain::Btc => &['1', '3'],
            Chain::Ltc => &['L', 'M'],
            Chain::Doge => &['D', 'A', '9'],
            _ => &[],
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ticker())
    }
}

impl FromStr for Chain {
    type Err = ParseAssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Chain::ALL
            .iter()
            .copied()
            .find(|chain| chain.ticker().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseAssetError::UnknownChain(s.to_string()))
    }
}

// ============================================================================
// Asset
// ============================================================================

/// Chain + symbol, plus the synthetic marker.
///
/// Serialized as its display string (`BTC.BTC`, `BTC/BTC`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset {
    pub chain: Chain,
    pub symbol: String,
    pub ticker: String,
    pub synth: bool,
}

impl Asset {
    /// Layer-1 asset; the ticker is the symbol up to its first `-`.
    pub fn new(chain: Chain, symbol: &str) -> Self {
        let symbol = symbol.to_ascii_uppercase();
        let ticker = symbol.split('-').next().unwrap_or_default().to_string();
        Self {
            chain,
            symbol,
            ticker,
            synth: false,
        }
    }

    /// The settlement asset.
    pub fn rune() -> Self {
        Asset::new(Chain::Thor, "RUNE")
    }

    pub fn is_rune(&self) -> bool {
        !self.synth && self.chain.is_thor() && self.symbol == "RUNE"
    }

    pub fn is_synthetic(&self) -> bool {
        self.synth
    }

    pub fn is_gas_asset(&self) -> bool {
        !self.synth && *self == self.chain.gas_asset()
    }

    pub fn synthetic(&self) -> Asset {
        Asset {
            synth: true,
            ..self.clone()
        }
    }

    pub fn layer1(&self) -> Asset {
        Asset {
            synth: false,
            ..self.clone()
        }
    }

    /// Chain on which coins of this asset are delivered.
    pub fn settlement_chain(&self) -> Chain {
        if self.synth {
            Chain::Thor
        } else {
            self.chain
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = if self.synth { '/' } else { '.' };
        write!(f, "{}{}{}", self.chain, separator, self.symbol)
    }
}

impl FromStr for Asset {
    type Err = ParseAssetError;

    /// Parses `CHAIN.SYMBOL`, `CHAIN/SYMBOL` (synthetic) or bare `RUNE`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("RUNE") {
            return Ok(Asset::rune());
        }
        let (chain, symbol, synth) = if let Some((chain, symbol)) = s.split_once('/') {
            (chain, symbol, true)
        } else if let Some((chain, symbol)) = s.split_once('.') {
            (chain, symbol, false)
        } else {
            return Err(ParseAssetError::Malformed(s.to_string()));
        };
        if symbol.is_empty() {
            return Err(ParseAssetError::Malformed(s.to_string()));
        }
        let asset = Asset::new(chain.parse()?, symbol);
        Ok(if synth { asset.synthetic() } else { asset })
    }
}

impl TryFrom<String> for Asset {
    type Error = ParseAssetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.to_string()
    }
}

// ============================================================================
// Coin
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub asset: Asset,
    #[serde(with = "amount_serde")]
    pub amount: Amount,
}

impl Coin {
    pub fn new(asset: Asset, amount: Amount) -> Self {
        Self { asset, amount }
    }

    pub fn is_empty(&self) -> bool {
        self.amount.is_zero()
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.asset)
    }
}

// ============================================================================
// Address
// ============================================================================

/// Destination or vault address on some chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Whether the address is well-formed for `chain`.
    ///
    /// Legacy base58 addresses are only accepted with mainnet version
    /// characters, and BCH only in cashaddr form, so no address is valid on
    /// two UTXO chains at once.
    pub fn is_chain(&self, chain: Chain) -> bool {
        let raw = self.0.as_str();
        if raw.is_empty() || raw.chars().any(char::is_whitespace) {
            return false;
        }
        match chain {
            Chain::Eth | Chain::Avax => {
                raw.len() == 42
                    && raw.starts_with("0x")
                    && raw[2..].chars().all(|c| c.is_ascii_hexdigit())
            }
            Chain::Bch => is_cash_addr(raw),
            _ => is_bech32(raw, chain.bech32_hrps()) || is_base58(raw, chain.base58_versions()),
        }
    }
}

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const CASH_ADDR_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

fn is_bech32(raw: &str, hrps: &[&str]) -> bool {
    let lower = raw.to_ascii_lowercase();
    hrps.iter().any(|hrp| {
        lower
            .strip_prefix(hrp)
            .and_then(|rest| rest.strip_prefix('1'))
            .map_or(false, |data| {
                !data.is_empty() && data.chars().all(|c| c.is_ascii_alphanumeric())
            })
    })
}

fn is_base58(raw: &str, versions: &[char]) -> bool {
    (26..=35).contains(&raw.len())
        && raw.chars().next().map_or(false, |c| versions.contains(&c))
        && raw.chars().all(|c| BASE58_ALPHABET.contains(c))
}

fn is_cash_addr(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    let body = ["bitcoincash:", "bchtest:", "bchreg:"]
        .iter()
        .find_map(|prefix| lower.strip_prefix(prefix))
        .unwrap_or(lower.as_str());
    body.len() == 42
        && (body.starts_with('q') || body.starts_with('p'))
        && body.chars().all(|c| CASH_ADDR_CHARSET.contains(c))
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
