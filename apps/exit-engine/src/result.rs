//! Attempt and flow result values.
//!
//! Every stage of the orchestration appends one [`ExitAttemptResult`] to
//! the audit trail regardless of outcome; the terminal
//! [`ExitFlowResult`] carries the full ordered attempt sequence plus
//! de-duplicated limit prices and order identifiers. Both are flat,
//! serializable records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::plan::StrategyDescriptor;

/// Status of one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// The attempt obtained at least one order identifier.
    Success,
    /// The attempt dispatched and failed, or errored before dispatch.
    Failed,
    /// The attempt was skipped (duplicate price, insufficient legs, ...).
    Skipped,
    /// Fetch-only mode: planned but never dispatched.
    FetchOnly,
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::FetchOnly => write!(f, "fetch_only"),
        }
    }
}

/// Terminal status of one orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    /// At least one stage obtained order identifiers.
    Success,
    /// Every stage failed.
    Failed,
    /// Fetch-only run: nothing dispatched by design.
    FetchOnly,
}

/// One logged orchestration step. Append-only; never revised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitAttemptResult {
    /// Stage label: `primary`, `ladder:<n>`, `fallback:<wing>`, `force`.
    pub stage: String,
    /// Attempt status.
    pub status: AttemptStatus,
    /// Limit price used, when one was computed.
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    /// Order identifiers obtained by this attempt.
    #[serde(default)]
    pub order_ids: Vec<i64>,
    /// Reason code or error message, when the attempt did not succeed.
    #[serde(default)]
    pub reason: Option<String>,
}

impl ExitAttemptResult {
    /// A successful dispatch attempt.
    #[must_use]
    pub fn success(stage: impl Into<String>, limit_price: Decimal, order_ids: Vec<i64>) -> Self {
        Self {
            stage: stage.into(),
            status: AttemptStatus::Success,
            limit_price: Some(limit_price),
            order_ids,
            reason: None,
        }
    }

    /// A failed attempt with a reason.
    #[must_use]
    pub fn failed(
        stage: impl Into<String>,
        limit_price: Option<Decimal>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            status: AttemptStatus::Failed,
            limit_price,
            order_ids: Vec::new(),
            reason: Some(reason.into()),
        }
    }

    /// A skipped attempt with a reason code.
    #[must_use]
    pub fn skipped(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            status: AttemptStatus::Skipped,
            limit_price: None,
            order_ids: Vec::new(),
            reason: Some(reason.into()),
        }
    }

    /// A fetch-only attempt: plan recorded, nothing dispatched.
    #[must_use]
    pub fn fetch_only(stage: impl Into<String>, limit_price: Decimal) -> Self {
        Self {
            stage: stage.into(),
            status: AttemptStatus::FetchOnly,
            limit_price: Some(limit_price),
            order_ids: Vec::new(),
            reason: None,
        }
    }
}

/// Terminal outcome of one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitFlowResult {
    /// Overall status.
    pub status: FlowStatus,
    /// Terminal reason: the winning stage label or the failure summary.
    pub reason: String,
    /// Underlying symbol.
    pub symbol: String,
    /// Expiry date.
    pub expiry: String,
    /// Journal trade identifier.
    pub trade_id: String,
    /// Strategy name.
    pub strategy: String,
    /// De-duplicated limit prices in the order first tried.
    pub limit_prices: Vec<Decimal>,
    /// De-duplicated order identifiers in the order first obtained.
    pub order_ids: Vec<i64>,
    /// Full ordered attempt sequence.
    pub attempts: Vec<ExitAttemptResult>,
    /// Whether forced-exit policy was active for this run.
    pub forced: bool,
}

impl ExitFlowResult {
    /// Whether the run obtained any order identifiers.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self.status, FlowStatus::Success)
    }
}

/// Accumulates attempts while keeping price/order-id lists de-duplicated
/// in first-seen order.
#[derive(Debug, Default)]
pub struct FlowRecorder {
    attempts: Vec<ExitAttemptResult>,
    limit_prices: Vec<Decimal>,
    order_ids: Vec<i64>,
}

impl FlowRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one attempt, merging its price and order ids.
    pub fn record(&mut self, attempt: ExitAttemptResult) {
        if let Some(price) = attempt.limit_price {
            if !self.limit_prices.contains(&price) {
                self.limit_prices.push(price);
            }
        }
        for id in &attempt.order_ids {
            if !self.order_ids.contains(id) {
                self.order_ids.push(*id);
            }
        }
        self.attempts.push(attempt);
    }

    /// Append a batch of attempts in order.
    pub fn record_all(&mut self, attempts: impl IntoIterator<Item = ExitAttemptResult>) {
        for attempt in attempts {
            self.record(attempt);
        }
    }

    /// Order identifiers collected so far.
    #[must_use]
    pub fn order_ids(&self) -> &[i64] {
        &self.order_ids
    }

    /// Finish the run into a terminal result.
    #[must_use]
    pub fn finish(
        self,
        status: FlowStatus,
        reason: impl Into<String>,
        descriptor: &StrategyDescriptor,
        forced: bool,
    ) -> ExitFlowResult {
        ExitFlowResult {
            status,
            reason: reason.into(),
            symbol: descriptor.symbol.clone(),
            expiry: descriptor.expiry.clone(),
            trade_id: descriptor.trade_id.clone(),
            strategy: descriptor.strategy.clone(),
            limit_prices: self.limit_prices,
            order_ids: self.order_ids,
            attempts: self.attempts,
            forced,
        }
    }
}
