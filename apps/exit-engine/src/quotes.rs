//! Leg quote model and synthetic combo NBBO.
//!
//! Aggregates normalized per-leg option quotes into a single synthetic
//! bid/ask/mid for a multi-leg combo, weighted by each leg's ratio to the
//! combo's base quantity. The combo quote is the numeric foundation for
//! every later pricing decision (gate, limit price, ladder offsets).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================
// Option Leg Types
// ============================================

/// Option right (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionRight {
    /// Call option (right to buy).
    Call,
    /// Put option (right to sell).
    Put,
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

/// One option leg with its market data snapshot.
///
/// Quotes are supplied as already-fetched snapshots; `quote_age_secs` and
/// `source` feed the staleness and fallback-source policies. Invariant:
/// `bid <= ask` when both are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegQuote {
    /// Underlying symbol (filled from the strategy descriptor when absent).
    #[serde(default)]
    pub symbol: Option<String>,
    /// Expiry date, `YYYYMMDD` (filled from the strategy descriptor when absent).
    #[serde(default)]
    pub expiry: Option<String>,
    /// Strike price.
    pub strike: Decimal,
    /// Option right (call/put).
    pub right: OptionRight,
    /// Signed position: positive = long, negative = short; magnitude = quantity.
    pub position: i64,
    /// Best bid (absent means no bid quoted).
    #[serde(default)]
    pub bid: Option<Decimal>,
    /// Best ask (absent means no ask quoted).
    #[serde(default)]
    pub ask: Option<Decimal>,
    /// Minimum price increment for this contract.
    #[serde(default = "default_min_tick")]
    pub min_tick: Decimal,
    /// Age of the quote snapshot in seconds.
    #[serde(default)]
    pub quote_age_secs: f64,
    /// Quote-source tag (e.g. `"live"`, `"close"`).
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_min_tick() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_source() -> String {
    "live".to_string()
}

impl LegQuote {
    /// Absolute quantity of this leg.
    #[must_use]
    pub const fn quantity(&self) -> u64 {
        self.position.unsigned_abs()
    }

    /// Whether this leg is held long.
    #[must_use]
    pub const fn is_long(&self) -> bool {
        self.position > 0
    }

    /// Whether closing this leg means buying it (short positions are bought back).
    #[must_use]
    pub const fn close_is_buy(&self) -> bool {
        self.position < 0
    }

    /// Whether at least one side of the quote is present.
    #[must_use]
    pub const fn has_quote(&self) -> bool {
        self.bid.is_some() || self.ask.is_some()
    }

    /// Effective bid: falls back to the ask for one-sided quotes.
    #[must_use]
    pub fn effective_bid(&self) -> Option<Decimal> {
        self.bid.or(self.ask)
    }

    /// Effective ask: falls back to the bid for one-sided quotes.
    #[must_use]
    pub fn effective_ask(&self) -> Option<Decimal> {
        self.ask.or(self.bid)
    }

    /// Quoted spread width for this leg (effective ask - effective bid).
    #[must_use]
    pub fn quoted_width(&self) -> Option<Decimal> {
        match (self.effective_bid(), self.effective_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }
}

// ============================================
// GCD / Combo Quantity
// ============================================

/// Calculate GCD of two numbers using Euclidean algorithm.
const fn gcd_two(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd_two(b, a % b) }
}

/// Base combo quantity: GCD of all legs' absolute quantities, minimum 1.
///
/// Quantities 2 and 4 yield a combo quantity of 2 with leg ratios 1 and 2.
#[must_use]
pub fn combo_quantity(legs: &[LegQuote]) -> u32 {
    let gcd = legs
        .iter()
        .map(LegQuote::quantity)
        .filter(|&q| q > 0)
        .fold(0, gcd_two);
    u32::try_from(gcd.max(1)).unwrap_or(u32::MAX)
}

// ============================================
// Combo Quote
// ============================================

/// Errors from combo quote aggregation.
#[derive(Debug, Clone, Error)]
pub enum QuoteError {
    /// Intent has no legs to price.
    #[error("no quote: intent has no legs")]
    NoLegs,

    /// A required leg has neither a bid nor an ask.
    #[error("no quote for leg{leg}")]
    NoQuote {
        /// 1-based leg index.
        leg: usize,
    },

    /// Aggregated quote violates bid <= ask.
    #[error("combo quote inverted: bid {bid} > ask {ask}")]
    Inverted {
        /// Aggregated bid.
        bid: Decimal,
        /// Aggregated ask.
        ask: Decimal,
    },
}

/// Synthetic NBBO for the whole combo. Invariant: `bid <= mid <= ask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboQuote {
    /// Best synthetic bid.
    pub bid: Decimal,
    /// Best synthetic ask.
    pub ask: Decimal,
    /// Midpoint, the default limit price.
    pub mid: Decimal,
    /// Spread width (ask - bid).
    pub width: Decimal,
}

impl ComboQuote {
    /// Build a validated quote from bid/ask; fails when inverted.
    pub fn validated(bid: Decimal, ask: Decimal) -> Result<Self, QuoteError> {
        if bid > ask {
            return Err(QuoteError::Inverted { bid, ask });
        }
        Ok(Self {
            bid,
            ask,
            mid: (bid + ask) / Decimal::TWO,
            width: ask - bid,
        })
    }

    /// Clamp a candidate price into `[bid, ask]`.
    #[must_use]
    pub fn clamp(&self, price: Decimal) -> Decimal {
        price.max(self.bid).min(self.ask)
    }

    /// Whether a price lies within `[bid, ask]`.
    #[must_use]
    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.bid && price <= self.ask
    }
}

/// Priced combo: base quantity, normalized quote, and the signed closing cost.
///
/// `net_mid` is the per-combo cost of closing at mid, signed from the
/// closing order's perspective: positive means the close is a net debit
/// (the combo is bought back), negative a net credit (the combo is sold).
#[derive(Debug, Clone, Copy)]
pub struct ComboPricing {
    /// Base combo quantity (GCD of leg quantities, minimum 1).
    pub quantity: u32,
    /// Normalized quote with positive orientation (bid <= mid <= ask).
    pub quote: ComboQuote,
    /// Signed per-combo closing cost at mid.
    pub net_mid: Decimal,
}

/// Aggregate leg quotes into a synthetic combo NBBO.
///
/// Each leg contributes from the closing order's perspective (a short leg
/// is bought back, a long leg is sold), scaled by its ratio to the base
/// quantity. A net-credit combo is normalized to positive prices by
/// negate-and-swap so downstream pricing always sees `bid <= mid <= ask`
/// on magnitudes.
///
/// Fails when any leg lacks both a bid and an ask.
pub fn compute_combo_quote(legs: &[LegQuote]) -> Result<ComboPricing, QuoteError> {
    if legs.is_empty() {
        return Err(QuoteError::NoLegs);
    }

    let quantity = combo_quantity(legs);
    let base = Decimal::from(quantity);

    let mut raw_bid = Decimal::ZERO;
    let mut raw_ask = Decimal::ZERO;

    for (idx, leg) in legs.iter().enumerate() {
        let (Some(bid), Some(ask)) = (leg.effective_bid(), leg.effective_ask()) else {
            return Err(QuoteError::NoQuote { leg: idx + 1 });
        };
        let ratio = Decimal::from(leg.quantity()) / base;
        if leg.close_is_buy() {
            raw_bid += ratio * bid;
            raw_ask += ratio * ask;
        } else {
            raw_bid -= ratio * ask;
            raw_ask -= ratio * bid;
        }
    }

    let net_mid = (raw_bid + raw_ask) / Decimal::TWO;

    // Net-credit combos are sold; flip to positive orientation.
    let (bid, ask) = if net_mid > Decimal::ZERO {
        (raw_bid, raw_ask)
    } else {
        (-raw_ask, -raw_bid)
    };

    Ok(ComboPricing {
        quantity,
        quote: ComboQuote::validated(bid, ask)?,
        net_mid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_leg(position: i64, bid: Option<Decimal>, ask: Option<Decimal>) -> LegQuote {
        LegQuote {
            symbol: None,
            expiry: None,
            strike: dec!(100),
            right: OptionRight::Call,
            position,
            bid,
            ask,
            min_tick: dec!(0.05),
            quote_age_secs: 0.0,
            source: "live".to_string(),
        }
    }

    #[test]
    fn test_combo_quantity_gcd() {
        let legs = vec![
            make_leg(2, Some(dec!(1.00)), Some(dec!(1.10))),
            make_leg(-4, Some(dec!(0.50)), Some(dec!(0.60))),
        ];
        assert_eq!(combo_quantity(&legs), 2);
    }

    #[test]
    fn test_combo_quantity_minimum_one() {
        assert_eq!(combo_quantity(&[]), 1);
        let legs = vec![make_leg(0, Some(dec!(1)), Some(dec!(1)))];
        assert_eq!(combo_quantity(&legs), 1);
    }

    #[test]
    fn test_credit_spread_buy_back() {
        // Short 1.05/1.10, long 0.55/0.65: closing buys the short leg back
        // and sells the long leg, a net debit.
        let legs = vec![
            make_leg(-1, Some(dec!(1.05)), Some(dec!(1.10))),
            make_leg(1, Some(dec!(0.55)), Some(dec!(0.65))),
        ];
        let pricing = compute_combo_quote(&legs).unwrap();

        assert_eq!(pricing.quantity, 1);
        assert_eq!(pricing.quote.bid, dec!(0.40));
        assert_eq!(pricing.quote.ask, dec!(0.55));
        assert_eq!(pricing.quote.mid, dec!(0.475));
        assert_eq!(pricing.quote.width, dec!(0.15));
        assert!(pricing.net_mid > Decimal::ZERO);
    }

    #[test]
    fn test_debit_spread_sells_out() {
        // Long 1.05/1.10, short 0.50/0.55: closing is a net credit and the
        // quote is normalized to positive prices.
        let legs = vec![
            make_leg(1, Some(dec!(1.05)), Some(dec!(1.10))),
            make_leg(-1, Some(dec!(0.50)), Some(dec!(0.55))),
        ];
        let pricing = compute_combo_quote(&legs).unwrap();

        assert_eq!(pricing.quote.bid, dec!(0.50));
        assert_eq!(pricing.quote.ask, dec!(0.60));
        assert_eq!(pricing.quote.mid, dec!(0.55));
        assert_eq!(pricing.quote.width, dec!(0.10));
        assert!(pricing.net_mid < Decimal::ZERO);
    }

    #[test]
    fn test_bid_mid_ask_ordering() {
        let legs = vec![
            make_leg(-2, Some(dec!(2.35)), Some(dec!(2.60))),
            make_leg(2, Some(dec!(0.95)), Some(dec!(1.20))),
            make_leg(-4, Some(dec!(0.10)), Some(dec!(0.15))),
        ];
        let pricing = compute_combo_quote(&legs).unwrap();
        assert!(pricing.quote.bid <= pricing.quote.mid);
        assert!(pricing.quote.mid <= pricing.quote.ask);
        assert_eq!(pricing.quantity, 2);
    }

    #[test]
    fn test_ratio_scaling() {
        // 2x short at 1.00/1.00, 4x long at 0.25/0.25 => base 2, ratios 1 and 2.
        let legs = vec![
            make_leg(-2, Some(dec!(1.00)), Some(dec!(1.00))),
            make_leg(4, Some(dec!(0.25)), Some(dec!(0.25))),
        ];
        let pricing = compute_combo_quote(&legs).unwrap();
        assert_eq!(pricing.quantity, 2);
        // 1.00 - 2 * 0.25 per combo.
        assert_eq!(pricing.quote.mid, dec!(0.50));
    }

    #[test]
    fn test_missing_both_sides_fails() {
        let legs = vec![
            make_leg(-1, Some(dec!(1.05)), Some(dec!(1.10))),
            make_leg(1, None, None),
        ];
        let err = compute_combo_quote(&legs).unwrap_err();
        assert!(matches!(err, QuoteError::NoQuote { leg: 2 }));
        assert!(err.to_string().contains("no quote"));
    }

    #[test]
    fn test_one_sided_quote_is_usable() {
        let legs = vec![
            make_leg(-1, Some(dec!(1.00)), None),
            make_leg(1, None, Some(dec!(0.40))),
        ];
        let pricing = compute_combo_quote(&legs).unwrap();
        assert_eq!(pricing.quote.bid, pricing.quote.ask);
        assert_eq!(pricing.quote.mid, dec!(0.60));
    }

    #[test]
    fn test_empty_legs_fails() {
        assert!(matches!(
            compute_combo_quote(&[]),
            Err(QuoteError::NoLegs)
        ));
    }
}
