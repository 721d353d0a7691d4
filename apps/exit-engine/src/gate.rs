//! Tradeability gate for combo quotes.
//!
//! Accepts or rejects a combo quote against spread-width and quote-age
//! policy, with two escape hatches: legs whose quote-source tag is in the
//! fallback-allowed set produce a note instead of a hard failure, and a
//! force flag bypasses the gate entirely. The gate is stateless and is
//! re-evaluated independently for the primary combo, each fallback wing,
//! and the forced-exit retry.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::config::{FallbackPolicy, SpreadPolicy};
use crate::quotes::{ComboQuote, LegQuote};

/// Outcome of a gate evaluation: verdict plus a human-readable diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateOutcome {
    /// Whether the combo may be dispatched.
    pub tradeable: bool,
    /// Diagnostic message carried onto the plan for the audit trail.
    pub message: String,
}

impl GateOutcome {
    fn pass(message: String) -> Self {
        Self {
            tradeable: true,
            message,
        }
    }

    fn fail(message: String) -> Self {
        Self {
            tradeable: false,
            message,
        }
    }
}

/// Evaluate spread and staleness policy for a combo quote.
///
/// `force` bypasses every check and annotates the diagnostic with a
/// `forced_exit:` prefix so the audit trail shows the gate was skipped.
#[must_use]
pub fn evaluate(
    legs: &[LegQuote],
    quote: &ComboQuote,
    spread: &SpreadPolicy,
    fallback: &FallbackPolicy,
    force: bool,
) -> GateOutcome {
    let allowed = spread.allowed_width(quote.mid);

    if force {
        return GateOutcome::pass(format!(
            "forced_exit: gate bypassed, spread {:.2} allowed {:.2}",
            cents(quote.width),
            cents(allowed)
        ));
    }

    let mut notes: Vec<String> = Vec::new();

    // Per-leg staleness, oldest offender decides.
    for (idx, leg) in legs.iter().enumerate() {
        if leg.quote_age_secs > spread.max_quote_age_secs {
            if fallback.permits(&leg.source) {
                notes.push(format!("fallback_leg{}={}", idx + 1, leg.source));
            } else {
                return GateOutcome::fail(format!(
                    "stale_quote_leg{}: age {:.1}s > {:.1}s",
                    idx + 1,
                    leg.quote_age_secs,
                    spread.max_quote_age_secs
                ));
            }
        }
    }

    if quote.width > allowed {
        // The widest-quoted leg is the offender; its source may qualify
        // the combo for fallback pricing instead of a hard failure.
        let offender = widest_leg(legs);
        match offender {
            Some((idx, leg)) if fallback.permits(&leg.source) => {
                notes.push(format!("fallback_leg{}={}", idx + 1, leg.source));
                notes.push(format!(
                    "spread {:.2} > allowed {:.2}",
                    cents(quote.width),
                    cents(allowed)
                ));
            }
            _ => {
                return GateOutcome::fail(format!(
                    "spread {:.2} > allowed {:.2}",
                    cents(quote.width),
                    cents(allowed)
                ));
            }
        }
    }

    let mut message = format!(
        "spread {:.2} <= allowed {:.2}",
        cents(quote.width),
        cents(allowed)
    );
    if !notes.is_empty() {
        message = format!("{}; {}", notes.join("; "), message);
    }
    GateOutcome::pass(message)
}

/// Round a price to cents for display. Decimal's `{:.2}` precision
/// truncates, so values must be rounded before formatting.
fn cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Leg with the widest quoted spread, if any leg has a two-sided width.
fn widest_leg(legs: &[LegQuote]) -> Option<(usize, &LegQuote)> {
    legs.iter()
        .enumerate()
        .filter_map(|(idx, leg)| leg.quoted_width().map(|w| (idx, leg, w)))
        .max_by(|a, b| a.2.cmp(&b.2))
        .map(|(idx, leg, _)| (idx, leg))
}

/// Allowed width helper exposed for diagnostics.
#[must_use]
pub fn allowed_width(spread: &SpreadPolicy, mid: Decimal) -> Decimal {
    spread.allowed_width(mid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotes::{OptionRight, compute_combo_quote};
    use rust_decimal_macros::dec;
    use test_case::test_case;

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

    fn spread_policy(abs: Decimal, rel: Decimal, age: f64) -> SpreadPolicy {
        SpreadPolicy {
            max_spread_abs: abs,
            max_spread_rel: rel,
            max_quote_age_secs: age,
        }
    }

    #[test]
    fn test_call_spread_within_allowed() {
        // Two-leg call spread 1.05/1.10 and 0.50/0.55: width 0.10 against
        // allowed max(0.01, 0.25 * 0.55) = 0.1375.
        let legs = vec![
            make_leg(1, dec!(1.05), dec!(1.10)),
            make_leg(-1, dec!(0.50), dec!(0.55)),
        ];
        let pricing = compute_combo_quote(&legs).unwrap();
        let policy = spread_policy(dec!(0.01), dec!(0.25), 5.0);

        let outcome = evaluate(&legs, &pricing.quote, &policy, &FallbackPolicy::default(), false);
        assert!(outcome.tradeable, "{}", outcome.message);
        assert!(outcome.message.contains("spread 0.10 <= allowed 0.14"));
    }

    #[test]
    fn test_diagnostic_rounds_allowed_width() {
        // Allowed width 0.25 * 0.55 = 0.1375 must display as 0.14, not
        // truncate to 0.13.
        let legs = vec![
            make_leg(1, dec!(1.05), dec!(1.10)),
            make_leg(-1, dec!(0.50), dec!(0.55)),
        ];
        let pricing = compute_combo_quote(&legs).unwrap();
        let policy = spread_policy(dec!(0.01), dec!(0.25), 5.0);

        let outcome = evaluate(&legs, &pricing.quote, &policy, &FallbackPolicy::default(), false);
        assert_eq!(outcome.message, "spread 0.10 <= allowed 0.14");

        // Same rounding on the rejection path: allowed 0.10 * 1.35 = 0.135.
        let wide = vec![
            make_leg(-1, dec!(1.00), dec!(2.00)),
            make_leg(1, dec!(0.10), dec!(0.20)),
        ];
        let pricing = compute_combo_quote(&wide).unwrap();
        let policy = spread_policy(dec!(0.01), dec!(0.10), 5.0);

        let outcome = evaluate(&wide, &pricing.quote, &policy, &FallbackPolicy::default(), false);
        assert!(!outcome.tradeable);
        assert_eq!(outcome.message, "spread 1.10 > allowed 0.14");
    }

    #[test]
    fn test_wide_spread_rejected() {
        let legs = vec![
            make_leg(-1, dec!(1.00), dec!(2.00)),
            make_leg(1, dec!(0.10), dec!(0.20)),
        ];
        let pricing = compute_combo_quote(&legs).unwrap();
        let policy = spread_policy(dec!(0.10), dec!(0.10), 5.0);

        let outcome = evaluate(&legs, &pricing.quote, &policy, &FallbackPolicy::default(), false);
        assert!(!outcome.tradeable);
        assert!(outcome.message.contains("spread"));
        assert!(outcome.message.contains("> allowed"));
    }

    #[test]
    fn test_wide_spread_fallback_source_note() {
        let mut legs = vec![
            make_leg(-1, dec!(1.00), dec!(2.00)),
            make_leg(1, dec!(0.10), dec!(0.20)),
        ];
        legs[0].source = "close".to_string();
        let pricing = compute_combo_quote(&legs).unwrap();
        let policy = spread_policy(dec!(0.10), dec!(0.10), 5.0);
        let fallback = FallbackPolicy {
            allow_stale_quotes: true,
            allowed_sources: vec!["close".to_string()],
        };

        let outcome = evaluate(&legs, &pricing.quote, &policy, &fallback, false);
        assert!(outcome.tradeable, "{}", outcome.message);
        assert!(outcome.message.contains("fallback_leg1=close"));
    }

    #[test_case(20.0, false, false; "stale rejected")]
    #[test_case(4.0, false, true; "fresh accepted")]
    #[test_case(20.0, true, true; "force bypasses staleness")]
    fn test_quote_age(age: f64, force: bool, expect_tradeable: bool) {
        let mut legs = vec![
            make_leg(-1, dec!(1.05), dec!(1.10)),
            make_leg(1, dec!(0.55), dec!(0.65)),
        ];
        legs[1].quote_age_secs = age;
        let pricing = compute_combo_quote(&legs).unwrap();
        let policy = spread_policy(dec!(0.50), dec!(0.12), 5.0);

        let outcome = evaluate(&legs, &pricing.quote, &policy, &FallbackPolicy::default(), force);
        assert_eq!(outcome.tradeable, expect_tradeable, "{}", outcome.message);
        if !expect_tradeable {
            assert!(outcome.message.contains("stale_quote_leg2"));
        }
        if force {
            assert!(outcome.message.starts_with("forced_exit:"));
        }
    }

    #[test]
    fn test_stale_leg_with_fallback_source() {
        let mut legs = vec![
            make_leg(-1, dec!(1.05), dec!(1.10)),
            make_leg(1, dec!(0.55), dec!(0.65)),
        ];
        legs[1].quote_age_secs = 30.0;
        legs[1].source = "close".to_string();
        let pricing = compute_combo_quote(&legs).unwrap();
        let policy = spread_policy(dec!(0.50), dec!(0.12), 5.0);
        let fallback = FallbackPolicy {
            allow_stale_quotes: true,
            allowed_sources: vec!["close".to_string()],
        };

        let outcome = evaluate(&legs, &pricing.quote, &policy, &fallback, false);
        assert!(outcome.tradeable, "{}", outcome.message);
        assert!(outcome.message.contains("fallback_leg2=close"));
    }

    #[test]
    fn test_force_bypasses_spread() {
        let legs = vec![
            make_leg(-1, dec!(1.00), dec!(5.00)),
            make_leg(1, dec!(0.10), dec!(0.20)),
        ];
        let pricing = compute_combo_quote(&legs).unwrap();
        let policy = spread_policy(dec!(0.01), dec!(0.01), 5.0);

        let outcome = evaluate(&legs, &pricing.quote, &policy, &FallbackPolicy::default(), true);
        assert!(outcome.tradeable);
        assert!(outcome.message.starts_with("forced_exit:"));
    }
}
