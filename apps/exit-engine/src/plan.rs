//! Exit intents and dispatch-ready order plans.
//!
//! The plan builder turns a caller-supplied [`ExitIntent`] into an
//! immutable [`ExitOrderPlan`]: legs are normalized against the strategy
//! descriptor, the combo quote is aggregated, the tradeability gate runs,
//! and the limit price is derived from mid, clamped into the NBBO and
//! rounded to the smallest leg tick. Every failure is a structured
//! [`PlanError`], never a panic.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ExitConfig;
use crate::gate;
use crate::quotes::{ComboQuote, LegQuote, QuoteError, compute_combo_quote};

/// Heuristic bound for the credit scale guard: per-combo credit may not
/// exceed this multiple of the combo mid once the contract multiplier is
/// applied. Tunable sanity check against unit/multiplier mistakes, not a
/// correctness invariant.
const MAX_CREDIT_NBBO_RATIO: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

/// Largest contract multiplier accepted by the credit scale guard.
const MAX_CONTRACT_MULTIPLIER: u32 = 10_000;

// ============================================
// Order Value Objects
// ============================================

/// Order action for the closing combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderAction {
    /// Buy the combo (closing a net-credit position).
    Buy,
    /// Sell the combo (closing a net-debit position).
    Sell,
}

impl std::fmt::Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Order kind; market orders are only reachable via force-exit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Limit order at the plan's limit price.
    Limit,
    /// Market order (forced exits only).
    Market,
}

// ============================================
// Intent
// ============================================

/// Strategy-level metadata for one open position being closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    /// Underlying symbol.
    pub symbol: String,
    /// Expiry date, `YYYYMMDD`.
    pub expiry: String,
    /// Strategy name (e.g. `"iron_condor"`).
    pub strategy: String,
    /// Journal trade identifier.
    pub trade_id: String,
    /// Contract multiplier (typically 100 for equity options).
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
}

const fn default_multiplier() -> u32 {
    100
}

/// Caller-supplied description of one strategy to close. Immutable input;
/// the core never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitIntent {
    /// Strategy descriptor.
    pub descriptor: StrategyDescriptor,
    /// Per-leg quotes for the nominal legs.
    pub legs: Vec<LegQuote>,
}

// ============================================
// Plan Errors
// ============================================

/// Structured planning failures.
#[derive(Debug, Clone, Error)]
pub enum PlanError {
    /// No usable combo quote could be aggregated.
    #[error(transparent)]
    Quote(#[from] QuoteError),

    /// The tradeability gate rejected the combo.
    #[error("untradeable: {reason}")]
    Untradeable {
        /// Gate diagnostic.
        reason: String,
    },

    /// Limit price fell outside the NBBO after tick rounding.
    #[error("invalid limit price {price} outside [{bid}, {ask}]")]
    InvalidLimitPrice {
        /// Rounded limit price.
        price: Decimal,
        /// Combo bid.
        bid: Decimal,
        /// Combo ask.
        ask: Decimal,
    },

    /// Per-combo credit magnitude inconsistent with the NBBO scale.
    #[error("credit scale mismatch: credit {credit} vs combo mid {mid} (multiplier {multiplier})")]
    CreditScaleMismatch {
        /// Computed per-combo credit.
        credit: Decimal,
        /// Combo mid.
        mid: Decimal,
        /// Contract multiplier in effect.
        multiplier: u32,
    },
}

// ============================================
// Exit Order Plan
// ============================================

/// Immutable, dispatch-ready order description.
///
/// Created once per dispatch attempt; ladder, fallback, and force each
/// derive their own variants by copy, never by mutation, so the audit
/// trail preserves each attempt's exact inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitOrderPlan {
    /// Strategy descriptor from the originating intent.
    pub descriptor: StrategyDescriptor,
    /// Normalized legs (symbol/expiry filled from the descriptor).
    pub legs: Vec<LegQuote>,
    /// Base combo quantity (positive).
    pub quantity: u32,
    /// Order action.
    pub action: OrderAction,
    /// Order kind (limit unless forced to market).
    pub kind: OrderKind,
    /// Limit price: mid clamped into the NBBO, rounded to tick.
    pub limit_price: Decimal,
    /// The combo quote the plan was priced against.
    pub quote: ComboQuote,
    /// Human-readable tradeability diagnostic from the gate.
    pub diagnostic: String,
    /// Per-combo credit (mid scaled by the contract multiplier).
    pub credit: Decimal,
    /// Effective minimum tick (smallest leg tick).
    pub min_tick: Decimal,
}

impl ExitOrderPlan {
    /// Derive a variant at a different limit price.
    #[must_use]
    pub fn with_limit_price(&self, limit_price: Decimal) -> Self {
        Self {
            limit_price,
            ..self.clone()
        }
    }

    /// Derive a market-order variant (forced exits).
    #[must_use]
    pub fn as_market(&self) -> Self {
        Self {
            kind: OrderKind::Market,
            ..self.clone()
        }
    }
}

// ============================================
// Builder
// ============================================

/// Round a price to the nearest multiple of `tick`.
///
/// Returns `None` for a non-positive tick.
#[must_use]
pub fn round_to_tick(price: Decimal, tick: Decimal) -> Option<Decimal> {
    if tick <= Decimal::ZERO {
        return None;
    }
    let steps =
        (price / tick).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    Some(steps * tick)
}

/// Smallest positive leg tick, defaulting to 0.01.
fn effective_min_tick(legs: &[LegQuote]) -> Decimal {
    legs.iter()
        .map(|leg| leg.min_tick)
        .filter(|tick| *tick > Decimal::ZERO)
        .min()
        .unwrap_or_else(|| Decimal::new(1, 2))
}

/// Fill missing per-leg symbol/expiry from the strategy descriptor.
fn normalize_legs(intent: &ExitIntent) -> Vec<LegQuote> {
    intent
        .legs
        .iter()
        .map(|leg| {
            let mut leg = leg.clone();
            if leg.symbol.is_none() {
                leg.symbol = Some(intent.descriptor.symbol.clone());
            }
            if leg.expiry.is_none() {
                leg.expiry = Some(intent.descriptor.expiry.clone());
            }
            leg
        })
        .collect()
}

/// Build a dispatch-ready exit order plan from an intent.
///
/// `force` bypasses the tradeability gate (annotated on the diagnostic).
/// Fails with a structured [`PlanError`] when no usable combo quote
/// exists, the gate rejects, the rounded limit price escapes the NBBO, or
/// the per-combo credit fails the scale guard.
pub fn build_exit_plan(
    intent: &ExitIntent,
    config: &ExitConfig,
    force: bool,
) -> Result<ExitOrderPlan, PlanError> {
    let legs = normalize_legs(intent);
    let pricing = compute_combo_quote(&legs)?;
    let quote = pricing.quote;

    let outcome = gate::evaluate(&legs, &quote, &config.spread, &config.fallback, force);
    if !outcome.tradeable {
        return Err(PlanError::Untradeable {
            reason: outcome.message,
        });
    }

    // Net debit to close => buy the combo back; zero resolves to sell.
    let action = if pricing.net_mid > Decimal::ZERO {
        OrderAction::Buy
    } else {
        OrderAction::Sell
    };

    let min_tick = effective_min_tick(&legs);
    let limit_price = round_to_tick(quote.clamp(quote.mid), min_tick).ok_or(
        PlanError::InvalidLimitPrice {
            price: quote.mid,
            bid: quote.bid,
            ask: quote.ask,
        },
    )?;
    if !quote.contains(limit_price) {
        return Err(PlanError::InvalidLimitPrice {
            price: limit_price,
            bid: quote.bid,
            ask: quote.ask,
        });
    }

    let multiplier = intent.descriptor.multiplier;
    let credit = quote.mid * Decimal::from(multiplier);
    if !credit_scale_ok(credit, quote.mid, multiplier) {
        return Err(PlanError::CreditScaleMismatch {
            credit,
            mid: quote.mid,
            multiplier,
        });
    }

    Ok(ExitOrderPlan {
        descriptor: intent.descriptor.clone(),
        legs,
        quantity: pricing.quantity,
        action,
        kind: OrderKind::Limit,
        limit_price,
        quote,
        diagnostic: outcome.message,
        credit,
        min_tick,
    })
}

/// Sanity guard against unit/multiplier mistakes: the per-combo credit
/// must stay in proportion to the single-contract NBBO.
fn credit_scale_ok(credit: Decimal, mid: Decimal, multiplier: u32) -> bool {
    if multiplier == 0 || multiplier > MAX_CONTRACT_MULTIPLIER {
        return false;
    }
    let nbbo_scale = mid.abs().max(Decimal::ONE) * Decimal::from(default_multiplier());
    credit.abs() <= nbbo_scale * MAX_CREDIT_NBBO_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotes::OptionRight;
    use rust_decimal_macros::dec;

    fn make_leg(position: i64, bid: Decimal, ask: Decimal) -> LegQuote {
        LegQuote {
            symbol: None,
            expiry: None,
            strike: dec!(100),
            right: OptionRight::Call,
            position,
            bid: Some(bid),
            ask: Some(ask),
            min_tick: dec!(0.05),
            quote_age_secs: 0.0,
            source: "live".to_string(),
        }
    }

    fn make_intent(legs: Vec<LegQuote>) -> ExitIntent {
        ExitIntent {
            descriptor: StrategyDescriptor {
                symbol: "SPX".to_string(),
                expiry: "20260918".to_string(),
                strategy: "vertical_spread".to_string(),
                trade_id: "T-42".to_string(),
                multiplier: 100,
            },
            legs,
        }
    }

    #[test]
    fn test_credit_spread_plan() {
        // Short 1.05/1.10, long 0.55/0.65: quantity 1, BUY to close,
        // mid 0.475 rounds to 0.50 on a 0.05 tick, credit mid * 100.
        let intent = make_intent(vec![
            make_leg(-1, dec!(1.05), dec!(1.10)),
            make_leg(1, dec!(0.55), dec!(0.65)),
        ]);
        let plan = build_exit_plan(&intent, &ExitConfig::default(), false).unwrap();

        assert_eq!(plan.quantity, 1);
        assert_eq!(plan.action, OrderAction::Buy);
        assert_eq!(plan.kind, OrderKind::Limit);
        assert_eq!(plan.quote.bid, dec!(0.40));
        assert_eq!(plan.quote.ask, dec!(0.55));
        assert_eq!(plan.limit_price, dec!(0.50));
        assert_eq!(plan.credit, dec!(47.5));
        assert_eq!(plan.min_tick, dec!(0.05));
    }

    #[test]
    fn test_debit_spread_sells() {
        let intent = make_intent(vec![
            make_leg(1, dec!(1.05), dec!(1.10)),
            make_leg(-1, dec!(0.50), dec!(0.55)),
        ]);
        let plan = build_exit_plan(&intent, &ExitConfig::default(), false).unwrap();
        assert_eq!(plan.action, OrderAction::Sell);
        assert_eq!(plan.limit_price, dec!(0.55));
    }

    #[test]
    fn test_zero_net_credit_resolves_to_sell() {
        let intent = make_intent(vec![
            make_leg(-1, dec!(0.50), dec!(0.50)),
            make_leg(1, dec!(0.50), dec!(0.50)),
        ]);
        let plan = build_exit_plan(&intent, &ExitConfig::default(), false).unwrap();
        assert_eq!(plan.action, OrderAction::Sell);
    }

    #[test]
    fn test_normalization_fills_symbol_and_expiry() {
        let intent = make_intent(vec![
            make_leg(-1, dec!(1.05), dec!(1.10)),
            make_leg(1, dec!(0.55), dec!(0.65)),
        ]);
        let plan = build_exit_plan(&intent, &ExitConfig::default(), false).unwrap();
        for leg in &plan.legs {
            assert_eq!(leg.symbol.as_deref(), Some("SPX"));
            assert_eq!(leg.expiry.as_deref(), Some("20260918"));
        }
    }

    #[test]
    fn test_no_quote_leg_fails() {
        let mut legs = vec![
            make_leg(-1, dec!(1.05), dec!(1.10)),
            make_leg(1, dec!(0.55), dec!(0.65)),
        ];
        legs[1].bid = None;
        legs[1].ask = None;
        let intent = make_intent(legs);
        let err = build_exit_plan(&intent, &ExitConfig::default(), false).unwrap_err();
        assert!(err.to_string().contains("no quote"));
    }

    #[test]
    fn test_stale_quote_fails_without_force() {
        let mut legs = vec![
            make_leg(-1, dec!(1.05), dec!(1.10)),
            make_leg(1, dec!(0.55), dec!(0.65)),
        ];
        legs[0].quote_age_secs = 20.0;
        let intent = make_intent(legs);

        let err = build_exit_plan(&intent, &ExitConfig::default(), false).unwrap_err();
        assert!(err.to_string().contains("stale_quote_leg1"));

        let plan = build_exit_plan(&intent, &ExitConfig::default(), true).unwrap();
        assert!(plan.diagnostic.starts_with("forced_exit:"));
    }

    #[test]
    fn test_credit_scale_guard_rejects_bad_multiplier() {
        let mut intent = make_intent(vec![
            make_leg(-1, dec!(1.05), dec!(1.10)),
            make_leg(1, dec!(0.55), dec!(0.65)),
        ]);
        intent.descriptor.multiplier = 100_000;
        let err = build_exit_plan(&intent, &ExitConfig::default(), false).unwrap_err();
        assert!(matches!(err, PlanError::CreditScaleMismatch { .. }));
    }

    #[test]
    fn test_round_to_tick() {
        assert_eq!(round_to_tick(dec!(0.475), dec!(0.05)), Some(dec!(0.50)));
        assert_eq!(round_to_tick(dec!(0.44), dec!(0.05)), Some(dec!(0.45)));
        assert_eq!(round_to_tick(dec!(1.234), dec!(0.01)), Some(dec!(1.23)));
        assert_eq!(round_to_tick(dec!(1.0), Decimal::ZERO), None);
    }

    #[test]
    fn test_plan_variants_are_copies() {
        let intent = make_intent(vec![
            make_leg(-1, dec!(1.05), dec!(1.10)),
            make_leg(1, dec!(0.55), dec!(0.65)),
        ]);
        let plan = build_exit_plan(&intent, &ExitConfig::default(), false).unwrap();

        let bumped = plan.with_limit_price(dec!(0.55));
        assert_eq!(plan.limit_price, dec!(0.50));
        assert_eq!(bumped.limit_price, dec!(0.55));

        let market = plan.as_market();
        assert_eq!(plan.kind, OrderKind::Limit);
        assert_eq!(market.kind, OrderKind::Market);
    }
}
