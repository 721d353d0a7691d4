// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Exit Engine - Rust Core Library
//!
//! Closes open multi-leg options positions by aggregating per-leg quotes
//! into a synthetic combo NBBO, gating it for tradeability, and driving a
//! dispatch-ready exit order plan through a layered execution policy:
//! primary attempt, price ladder, per-wing vertical fallback, and an
//! optional forced exit.
//!
//! # Layers (inside -> outside)
//!
//! - **Pricing**: [`quotes`] (leg model, combo NBBO), [`gate`]
//!   (spread/staleness policy), [`plan`] (immutable order plans).
//! - **Execution**: [`ladder`] (offset steps with a time budget),
//!   [`fallback`] (call/put wing decomposition), [`orchestrator`] (the
//!   state machine composing them).
//! - **Boundary**: [`dispatch`] (broker port), [`source`] (intent
//!   provider port), [`sink`] (result persistence port), [`config`]
//!   (policy loading).
//!
//! The orchestrator's public operation never returns an error; every
//! failure becomes attempt/result data so batch callers keep running.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Policy configuration: spread gate, fallback sources, force-exit, ladder.
pub mod config;

/// Dispatcher port for placing one exit order plan.
pub mod dispatch;

/// Vertical fallback: per-wing decomposition and trigger classification.
pub mod fallback;

/// Tradeability gate over a combo quote.
pub mod gate;

/// Price ladder with bounded wait and total time budget.
pub mod ladder;

/// Execution orchestrator state machine.
pub mod orchestrator;

/// Exit intents and dispatch-ready order plans.
pub mod plan;

/// Leg quote model and synthetic combo NBBO.
pub mod quotes;

/// Attempt and flow result values.
pub mod result;

/// Result persistence port and JSONL adapter.
pub mod sink;

/// Intent source port and JSON-file adapter.
pub mod source;

pub use config::{
    ConfigError, ExitConfig, FallbackPolicy, ForceExitPolicy, LadderPolicy, LimitCap,
    SpreadPolicy, load_config,
};
pub use dispatch::{DispatchError, Dispatcher, DryRunDispatcher};
pub use fallback::{FallbackTrigger, classify_trigger, run_fallback};
pub use gate::GateOutcome;
pub use ladder::{LadderOutcome, run_ladder};
pub use orchestrator::ExitOrchestrator;
pub use plan::{
    ExitIntent, ExitOrderPlan, OrderAction, OrderKind, PlanError, StrategyDescriptor,
    build_exit_plan,
};
pub use quotes::{ComboPricing, ComboQuote, LegQuote, OptionRight, QuoteError, compute_combo_quote};
pub use result::{AttemptStatus, ExitAttemptResult, ExitFlowResult, FlowStatus};
pub use sink::{JsonlResultSink, PersistedFlowRecord, ResultSink, SinkError};
pub use source::{IntentSource, JsonFileIntentSource, SourceError};
