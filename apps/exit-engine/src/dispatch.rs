//! Dispatcher port (driven port).
//!
//! The broker call is a single-operation interface: one plan in, zero or
//! more integer order identifiers out, or an error. Connection lifecycle,
//! authentication, and wire-protocol mechanics live entirely behind this
//! boundary so the orchestrator can be exercised with test doubles.

use async_trait::async_trait;

use crate::plan::ExitOrderPlan;

/// Dispatcher port error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    /// The repricer gave up after its time budget.
    #[error("repricer timeout after {secs:.0}s")]
    RepricerTimeout {
        /// Seconds waited before giving up.
        secs: f64,
    },

    /// The order was cancelled without a fill.
    #[error("order cancelled with no fill")]
    CancelledNoFill,

    /// Order rejected by the broker.
    #[error("order rejected: {reason}")]
    Rejected {
        /// Rejection reason.
        reason: String,
    },

    /// Connection error.
    #[error("broker connection error: {message}")]
    Connection {
        /// Error details.
        message: String,
    },

    /// Unknown error.
    #[error("dispatch error: {message}")]
    Unknown {
        /// Error details.
        message: String,
    },
}

/// Port for dispatching one exit order plan to the brokerage.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Dispatch a plan, returning any order identifiers obtained.
    ///
    /// An empty id list means the order produced nothing actionable (the
    /// caller treats it as a failed attempt without an error).
    async fn dispatch(&self, plan: &ExitOrderPlan) -> Result<Vec<i64>, DispatchError>;
}

/// Dispatcher that logs the plan and places nothing.
///
/// Used by the binary for fetch-only/inspection runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunDispatcher;

#[async_trait]
impl Dispatcher for DryRunDispatcher {
    async fn dispatch(&self, plan: &ExitOrderPlan) -> Result<Vec<i64>, DispatchError> {
        tracing::info!(
            symbol = %plan.descriptor.symbol,
            action = %plan.action,
            quantity = plan.quantity,
            limit_price = %plan.limit_price,
            "dry-run dispatch, no order placed"
        );
        Ok(Vec::new())
    }
}
