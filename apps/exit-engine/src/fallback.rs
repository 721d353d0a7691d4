//! Vertical fallback: per-wing decomposition when the combo cannot
//! execute.
//!
//! After the primary/ladder path fails, the intent's legs are grouped by
//! right into a call wing and a put wing. Each eligible wing gets an
//! independent plan (its own gate evaluation, its own quote data) and is
//! dispatched widest strike-width first, reducing exposure on the larger
//! risk leg before the smaller one. Any wing producing order identifiers
//! counts toward overall success; the remaining wings are still attempted
//! and recorded.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::ExitConfig;
use crate::dispatch::{DispatchError, Dispatcher};
use crate::plan::{ExitIntent, build_exit_plan};
use crate::quotes::{LegQuote, OptionRight};
use crate::result::ExitAttemptResult;

/// Why the fallback was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTrigger {
    /// The primary path failed its tradeability gate.
    GateFailure,
    /// The repricer exhausted its time budget.
    RepricerTimeout,
    /// The primary order was cancelled without a fill.
    CancelOnNoFill,
    /// Any other primary dispatch failure.
    MainBagFailure,
    /// No error and no flags: operator-driven decomposition.
    Manual,
}

impl std::fmt::Display for FallbackTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::GateFailure => "gate_failure",
            Self::RepricerTimeout => "repricer_timeout",
            Self::CancelOnNoFill => "cancel_on_no_fill",
            Self::MainBagFailure => "main_bag_failure",
            Self::Manual => "manual",
        };
        write!(f, "{label}")
    }
}

/// Classify the primary path's terminal error into a fallback trigger.
#[must_use]
pub fn classify_trigger(last_error: Option<&DispatchError>) -> FallbackTrigger {
    match last_error {
        Some(DispatchError::RepricerTimeout { .. }) => FallbackTrigger::RepricerTimeout,
        Some(DispatchError::CancelledNoFill) => FallbackTrigger::CancelOnNoFill,
        Some(err) if err.to_string().contains("untradeable") => FallbackTrigger::GateFailure,
        Some(_) => FallbackTrigger::MainBagFailure,
        None => FallbackTrigger::Manual,
    }
}

/// Outcome of a fallback run.
#[derive(Debug)]
pub struct FallbackOutcome {
    /// Per-wing attempt records in dispatch order.
    pub attempts: Vec<ExitAttemptResult>,
    /// Whether any wing obtained order identifiers.
    pub succeeded: bool,
}

/// One wing awaiting dispatch.
struct Wing {
    right: OptionRight,
    legs: Vec<LegQuote>,
    strike_width: Decimal,
}

impl Wing {
    fn stage(&self) -> String {
        format!("fallback:{}", self.right)
    }
}

/// Split legs into call/put wings, preserving leg order within a wing.
fn split_wings(legs: &[LegQuote]) -> Vec<(OptionRight, Vec<LegQuote>)> {
    [OptionRight::Call, OptionRight::Put]
        .into_iter()
        .map(|right| {
            let wing_legs: Vec<LegQuote> = legs
                .iter()
                .filter(|leg| leg.right == right)
                .cloned()
                .collect();
            (right, wing_legs)
        })
        .collect()
}

/// Strike-spread width of a wing (max strike - min strike).
fn strike_width(legs: &[LegQuote]) -> Decimal {
    let min = legs.iter().map(|l| l.strike).min().unwrap_or_default();
    let max = legs.iter().map(|l| l.strike).max().unwrap_or_default();
    max - min
}

/// Run the vertical fallback against a dispatcher.
///
/// Wings with fewer than two legs are recorded as skipped. Eligible wings
/// are dispatched widest strike-width first; every wing produces an
/// attempt record whether it plans, dispatches, or fails.
pub async fn run_fallback<D: Dispatcher + ?Sized>(
    intent: &ExitIntent,
    config: &ExitConfig,
    force: bool,
    dispatcher: &D,
) -> FallbackOutcome {
    let mut attempts = Vec::new();
    let mut wings: Vec<Wing> = Vec::new();

    for (right, legs) in split_wings(&intent.legs) {
        if legs.len() < 2 {
            attempts.push(ExitAttemptResult::skipped(
                format!("fallback:{right}"),
                "insufficient_legs",
            ));
            continue;
        }
        let strike_width = strike_width(&legs);
        wings.push(Wing {
            right,
            legs,
            strike_width,
        });
    }

    // Widest wing first: close the larger risk side before the smaller.
    wings.sort_by(|a, b| b.strike_width.cmp(&a.strike_width));

    let mut succeeded = false;
    for wing in wings {
        let stage = wing.stage();
        let sub_intent = ExitIntent {
            descriptor: intent.descriptor.clone(),
            legs: wing.legs,
        };

        let plan = match build_exit_plan(&sub_intent, config, force) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::warn!(stage, error = %err, "wing planning failed");
                attempts.push(ExitAttemptResult::failed(stage, None, err.to_string()));
                continue;
            }
        };

        tracing::debug!(
            stage,
            strike_width = %wing.strike_width,
            price = %plan.limit_price,
            "dispatching fallback wing"
        );

        match dispatcher.dispatch(&plan).await {
            Ok(order_ids) if !order_ids.is_empty() => {
                tracing::info!(stage, ?order_ids, "fallback wing filled");
                succeeded = true;
                attempts.push(ExitAttemptResult::success(
                    stage,
                    plan.limit_price,
                    order_ids,
                ));
            }
            Ok(_) => {
                attempts.push(ExitAttemptResult::failed(
                    stage,
                    Some(plan.limit_price),
                    "no_order_ids",
                ));
            }
            Err(err) => {
                tracing::warn!(stage, error = %err, "fallback wing failed");
                attempts.push(ExitAttemptResult::failed(
                    stage,
                    Some(plan.limit_price),
                    err.to_string(),
                ));
            }
        }
    }

    FallbackOutcome {
        attempts,
        succeeded,
    }
}
