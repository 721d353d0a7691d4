//! Exit Engine Binary
//!
//! Runs the exit orchestrator over a batch of intents read from a JSON
//! file, with the dry-run dispatcher: plans are computed, logged, and
//! persisted, but no orders are placed.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin exit-engine -- intents.json [exit-config.yaml]
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log level (default: info)

use anyhow::Context;

use exit_engine::dispatch::DryRunDispatcher;
use exit_engine::orchestrator::ExitOrchestrator;
use exit_engine::result::FlowStatus;
use exit_engine::sink::{JsonlResultSink, ResultSink};
use exit_engine::source::{IntentSource, JsonFileIntentSource};
use exit_engine::{ExitConfig, load_config};

/// Default path for the JSONL result log.
const DEFAULT_RESULTS_PATH: &str = "exit-results.jsonl";

/// Per-run counters for the terminal summary.
#[derive(Debug, Default)]
struct RunSummary {
    total: usize,
    succeeded: usize,
    failed: usize,
    fetch_only: usize,
}

impl RunSummary {
    fn tally(&mut self, status: FlowStatus) {
        self.total += 1;
        match status {
            FlowStatus::Success => self.succeeded += 1,
            FlowStatus::Failed => self.failed += 1,
            FlowStatus::FetchOnly => self.fetch_only += 1,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let intents_path = args
        .next()
        .context("usage: exit-engine <intents.json> [config.yaml]")?;
    let config_path = args.next();

    let config = load_config(config_path.as_deref()).context("loading configuration")?;
    log_config(&config);

    let source = JsonFileIntentSource::new(&intents_path);
    let intents = source.intents().await.context("loading intents")?;
    tracing::info!(count = intents.len(), path = %intents_path, "intents loaded");

    let orchestrator = ExitOrchestrator::new(config);
    let dispatcher = DryRunDispatcher;
    let sink = JsonlResultSink::new(DEFAULT_RESULTS_PATH);

    let mut summary = RunSummary::default();
    for intent in &intents {
        let result = orchestrator.close(intent, &dispatcher).await;
        tracing::info!(
            trade_id = %result.trade_id,
            status = ?result.status,
            reason = %result.reason,
            order_ids = ?result.order_ids,
            "flow complete"
        );
        summary.tally(result.status);
        sink.record(&result).await.context("persisting result")?;
    }

    tracing::info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        fetch_only = summary.fetch_only,
        results = DEFAULT_RESULTS_PATH,
        "run complete"
    );
    Ok(())
}

/// Initialize the tracing subscriber with environment filter.
///
/// Uses static directive strings that are compile-time constants guaranteed to parse.
#[allow(clippy::expect_used)]
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "exit_engine=info"
                    .parse()
                    .expect("static directive 'exit_engine=info' is valid"),
            ),
        )
        .init();
}

/// Log the policy configuration in effect.
fn log_config(config: &ExitConfig) {
    tracing::info!(
        max_spread_abs = %config.spread.max_spread_abs,
        max_spread_rel = %config.spread.max_spread_rel,
        max_quote_age_secs = config.spread.max_quote_age_secs,
        allow_stale_quotes = config.fallback.allow_stale_quotes,
        force_exit = config.force_exit.enabled,
        ladder = config.ladder.enabled,
        fetch_only = config.fetch_only,
        "Configuration loaded"
    );
}
