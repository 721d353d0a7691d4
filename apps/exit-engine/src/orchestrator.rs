//! Execution orchestrator: the top-level close-position state machine.
//!
//! One run walks `INIT -> PLANNED -> {FETCH_ONLY | DISPATCH_PRIMARY} ->
//! ladder -> DISPATCH_FALLBACK -> DISPATCH_FORCE -> DONE_*`. Planning
//! failure is the only path that terminates before a dispatch attempt.
//! The orchestrator never returns an error: dispatcher failures, gate
//! rejections, and planning errors all become attempt records inside the
//! terminal [`ExitFlowResult`].

use crate::config::ExitConfig;
use crate::dispatch::Dispatcher;
use crate::fallback::{classify_trigger, run_fallback};
use crate::ladder::run_ladder;
use crate::plan::{ExitIntent, ExitOrderPlan, build_exit_plan};
use crate::result::{ExitAttemptResult, ExitFlowResult, FlowRecorder, FlowStatus};

/// Drives one exit intent through the layered execution policy.
#[derive(Debug, Clone)]
pub struct ExitOrchestrator {
    config: ExitConfig,
}

impl ExitOrchestrator {
    /// Create an orchestrator over a validated policy configuration.
    #[must_use]
    pub const fn new(config: ExitConfig) -> Self {
        Self { config }
    }

    /// The policy configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &ExitConfig {
        &self.config
    }

    /// Close one position. Infallible by contract; every failure is
    /// captured in the returned result's attempt trail.
    pub async fn close<D: Dispatcher + ?Sized>(
        &self,
        intent: &ExitIntent,
        dispatcher: &D,
    ) -> ExitFlowResult {
        let forced = self.config.force_exit.enabled;
        let descriptor = &intent.descriptor;
        let mut recorder = FlowRecorder::new();

        tracing::info!(
            symbol = %descriptor.symbol,
            trade_id = %descriptor.trade_id,
            strategy = %descriptor.strategy,
            forced,
            "state: INIT"
        );

        let plan = match build_exit_plan(intent, &self.config, forced) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::warn!(error = %err, "planning failed, state: DONE_FAILED");
                recorder.record(ExitAttemptResult::failed("primary", None, err.to_string()));
                return recorder.finish(FlowStatus::Failed, err.to_string(), descriptor, forced);
            }
        };
        tracing::info!(
            action = %plan.action,
            quantity = plan.quantity,
            limit_price = %plan.limit_price,
            diagnostic = %plan.diagnostic,
            "state: PLANNED"
        );

        if self.config.fetch_only {
            tracing::info!("state: FETCH_ONLY");
            recorder.record(ExitAttemptResult::fetch_only("primary", plan.limit_price));
            return recorder.finish(FlowStatus::FetchOnly, "fetch_only", descriptor, forced);
        }

        // Primary attempt plus ladder steps share one pass.
        tracing::info!("state: DISPATCH_PRIMARY");
        let force_cap = if forced {
            self.config
                .force_exit
                .limit_cap
                .map(|cap| cap.band(plan.quote.mid))
        } else {
            None
        };
        let ladder = run_ladder(&plan, &self.config.ladder, force_cap, dispatcher).await;
        let last_error = ladder.last_error;
        let winning_stage = ladder.winning_stage;
        recorder.record_all(ladder.attempts);
        if let Some(stage) = winning_stage {
            tracing::info!(stage, "state: DONE_SUCCESS");
            return recorder.finish(FlowStatus::Success, stage, descriptor, forced);
        }

        let trigger = classify_trigger(last_error.as_ref());
        tracing::info!(%trigger, "state: DISPATCH_FALLBACK");
        let fallback = run_fallback(intent, &self.config, forced, dispatcher).await;
        let fallback_won = fallback.succeeded;
        recorder.record_all(fallback.attempts);
        if fallback_won {
            let reason = format!("fallback:{trigger}");
            tracing::info!(reason, "state: DONE_SUCCESS");
            return recorder.finish(FlowStatus::Success, reason, descriptor, forced);
        }

        let mut force_error: Option<String> = None;
        if forced {
            tracing::info!("state: DISPATCH_FORCE");
            match self.force_dispatch(intent, dispatcher, &mut recorder).await {
                Ok(()) => {
                    tracing::info!(reason = "force_exit", "state: DONE_SUCCESS");
                    return recorder.finish(FlowStatus::Success, "force_exit", descriptor, forced);
                }
                Err(err) => force_error = Some(err),
            }
        }

        let primary_reason = last_error
            .as_ref()
            .map_or_else(|| "no order ids obtained".to_string(), ToString::to_string);
        let reason = match force_error {
            Some(err) => format!("{primary_reason}; force_exit: {err}"),
            None => primary_reason,
        };
        tracing::warn!(reason, "state: DONE_FAILED");
        recorder.finish(FlowStatus::Failed, reason, descriptor, forced)
    }

    /// Last-resort dispatch with the gate bypassed. `Err` carries the
    /// failure message for the terminal reason.
    async fn force_dispatch<D: Dispatcher + ?Sized>(
        &self,
        intent: &ExitIntent,
        dispatcher: &D,
        recorder: &mut FlowRecorder,
    ) -> Result<(), String> {
        let plan = match build_exit_plan(intent, &self.config, true) {
            Ok(plan) => self.apply_force_policy(plan),
            Err(err) => {
                recorder.record(ExitAttemptResult::failed("force", None, err.to_string()));
                return Err(err.to_string());
            }
        };

        match dispatcher.dispatch(&plan).await {
            Ok(order_ids) if !order_ids.is_empty() => {
                recorder.record(ExitAttemptResult::success(
                    "force",
                    plan.limit_price,
                    order_ids,
                ));
                Ok(())
            }
            Ok(_) => {
                recorder.record(ExitAttemptResult::failed(
                    "force",
                    Some(plan.limit_price),
                    "no_order_ids",
                ));
                Err("no_order_ids".to_string())
            }
            Err(err) => {
                tracing::warn!(error = %err, "forced dispatch failed");
                recorder.record(ExitAttemptResult::failed(
                    "force",
                    Some(plan.limit_price),
                    err.to_string(),
                ));
                Err(err.to_string())
            }
        }
    }

    /// Shape the forced plan per policy: market order, or limit clamped
    /// into the cap band around mid.
    fn apply_force_policy(&self, plan: ExitOrderPlan) -> ExitOrderPlan {
        if self.config.force_exit.use_market_order {
            return plan.as_market();
        }
        if let Some(cap) = self.config.force_exit.limit_cap {
            let band = cap.band(plan.quote.mid);
            let clamped = plan
                .limit_price
                .max(plan.quote.mid - band)
                .min(plan.quote.mid + band);
            return plan.with_limit_price(clamped);
        }
        plan
    }
}
