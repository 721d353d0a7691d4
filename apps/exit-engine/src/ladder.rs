//! Price ladder: increasingly aggressive limit prices with a bounded
//! time budget.
//!
//! Step 0 is always the unmodified base plan; configured offsets follow.
//! Each candidate price is clamped into the NBBO (and, under force-exit,
//! into the limit-cap band around mid), rounded to tick, and skipped when
//! it duplicates a price already tried. The ladder stops at the first
//! step that yields an order identifier, sleeping the per-step wait
//! between failed attempts until the total duration budget is exhausted.

use rust_decimal::Decimal;
use tokio::time::Instant;

use crate::config::LadderPolicy;
use crate::dispatch::{DispatchError, Dispatcher};
use crate::plan::{ExitOrderPlan, round_to_tick};
use crate::result::ExitAttemptResult;

/// Outcome of a ladder run, handed to the fallback on exhaustion.
#[derive(Debug)]
pub struct LadderOutcome {
    /// Attempt records in step order (including skips).
    pub attempts: Vec<ExitAttemptResult>,
    /// Winning stage label (`primary` or `ladder:<n>`) when a step filled.
    pub winning_stage: Option<String>,
    /// The last dispatcher error, if any step errored.
    pub last_error: Option<DispatchError>,
}

impl LadderOutcome {
    /// Whether any step obtained order identifiers.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.winning_stage.is_some()
    }
}

/// Stage label for a ladder step index.
fn stage_label(step: usize) -> String {
    if step == 0 {
        "primary".to_string()
    } else {
        format!("ladder:{step}")
    }
}

/// Candidate limit price for one step.
///
/// Adds the offset to mid, clamps into the NBBO and the optional
/// force-exit cap band, then rounds to tick. `None` when no price can be
/// computed.
#[must_use]
pub fn candidate_price(
    plan: &ExitOrderPlan,
    offset: Decimal,
    force_cap: Option<Decimal>,
) -> Option<Decimal> {
    let mut price = plan.quote.clamp(plan.quote.mid + offset);
    if let Some(band) = force_cap {
        let band = band.abs();
        price = price
            .max(plan.quote.mid - band)
            .min(plan.quote.mid + band);
    }
    let rounded = round_to_tick(price, plan.min_tick)?;
    plan.quote.contains(rounded).then_some(rounded)
}

/// Run the ladder against a dispatcher.
///
/// `force_cap` is the limit-cap band half-width when force-exit policy is
/// active, `None` otherwise.
pub async fn run_ladder<D: Dispatcher + ?Sized>(
    base: &ExitOrderPlan,
    policy: &LadderPolicy,
    force_cap: Option<Decimal>,
    dispatcher: &D,
) -> LadderOutcome {
    let mut steps = vec![Decimal::ZERO];
    if policy.enabled {
        steps.extend(policy.offsets.iter().copied());
    }

    let deadline = Instant::now() + policy.max_total();
    let total_steps = steps.len();
    let mut tried: Vec<Decimal> = Vec::new();
    let mut attempts = Vec::new();
    let mut last_error = None;

    for (step, offset) in steps.into_iter().enumerate() {
        let stage = stage_label(step);

        if step > 0 && Instant::now() >= deadline {
            tracing::warn!(stage, "ladder time budget exhausted, aborting");
            break;
        }

        let Some(price) = candidate_price(base, offset, force_cap) else {
            attempts.push(ExitAttemptResult::skipped(stage, "no_price"));
            continue;
        };
        if tried.contains(&price) {
            attempts.push(ExitAttemptResult::skipped(stage, "duplicate_price"));
            continue;
        }
        tried.push(price);

        let plan = base.with_limit_price(price);
        tracing::debug!(stage, price = %price, "dispatching ladder step");

        match dispatcher.dispatch(&plan).await {
            Ok(order_ids) if !order_ids.is_empty() => {
                tracing::info!(stage, ?order_ids, "ladder step filled");
                attempts.push(ExitAttemptResult::success(stage.clone(), price, order_ids));
                return LadderOutcome {
                    attempts,
                    winning_stage: Some(stage),
                    last_error: None,
                };
            }
            Ok(_) => {
                attempts.push(ExitAttemptResult::failed(stage.clone(), Some(price), "no_order_ids"));
            }
            Err(err) => {
                tracing::warn!(stage, error = %err, "ladder step failed");
                attempts.push(ExitAttemptResult::failed(stage.clone(), Some(price), err.to_string()));
                last_error = Some(err);
            }
        }

        // Wait before the next step, never past the deadline. No wait
        // after the final step; the fallback takes over immediately.
        if step + 1 < total_steps {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let wait = policy.step_wait().min(remaining);
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }
    }

    LadderOutcome {
        attempts,
        winning_stage: None,
        last_error,
    }
}
