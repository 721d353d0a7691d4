//! Policy configuration for the exit engine.
//!
//! Provides configuration loading and validation for the spread gate,
//! fallback-source policy, force-exit policy, and price ladder.
//!
//! # Usage
//!
//! ```rust,ignore
//! use exit_engine::config::{ExitConfig, load_config};
//!
//! // Load from default path (exit-config.yaml)
//! let config = load_config(None)?;
//!
//! // Access configuration values
//! println!("max spread: {}", config.spread.max_spread_abs);
//! ```
//!
//! Malformed values are not fatal: `validate()` clamps them back to the
//! documented defaults and logs a warning, so a bad config never fails a
//! close run.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExitConfig {
    /// Spread gate configuration.
    #[serde(default)]
    pub spread: SpreadPolicy,
    /// Fallback quote-source configuration.
    #[serde(default)]
    pub fallback: FallbackPolicy,
    /// Force-exit configuration.
    #[serde(default)]
    pub force_exit: ForceExitPolicy,
    /// Price ladder configuration.
    #[serde(default)]
    pub ladder: LadderPolicy,
    /// Fetch-only mode: plan and record, never dispatch.
    #[serde(default)]
    pub fetch_only: bool,
}

impl ExitConfig {
    /// Validate the configuration, clamping malformed values to defaults.
    ///
    /// Never fails: bad values are replaced and logged so batch callers
    /// keep running.
    pub fn validate(&mut self) {
        self.spread.validate();
        self.ladder.validate();
        self.force_exit.validate();
    }
}

// ============================================
// Spread Gate
// ============================================

/// Spread gate policy: how wide a combo quote may be and how old the
/// per-leg quotes may get before the combo is untradeable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadPolicy {
    /// Absolute spread threshold in dollars.
    #[serde(default = "default_max_spread_abs")]
    pub max_spread_abs: Decimal,
    /// Relative spread threshold as a fraction of mid.
    #[serde(default = "default_max_spread_rel")]
    pub max_spread_rel: Decimal,
    /// Maximum per-leg quote age in seconds.
    #[serde(default = "default_max_quote_age_secs")]
    pub max_quote_age_secs: f64,
}

impl Default for SpreadPolicy {
    fn default() -> Self {
        Self {
            max_spread_abs: default_max_spread_abs(),
            max_spread_rel: default_max_spread_rel(),
            max_quote_age_secs: default_max_quote_age_secs(),
        }
    }
}

impl SpreadPolicy {
    /// Allowed spread width for a given combo mid.
    #[must_use]
    pub fn allowed_width(&self, mid: Decimal) -> Decimal {
        self.max_spread_abs.max(self.max_spread_rel * mid.abs())
    }

    fn validate(&mut self) {
        if self.max_spread_abs < Decimal::ZERO {
            tracing::warn!(
                value = %self.max_spread_abs,
                "negative max_spread_abs, using default"
            );
            self.max_spread_abs = default_max_spread_abs();
        }
        if self.max_spread_rel < Decimal::ZERO {
            tracing::warn!(
                value = %self.max_spread_rel,
                "negative max_spread_rel, using default"
            );
            self.max_spread_rel = default_max_spread_rel();
        }
        if !self.max_quote_age_secs.is_finite() || self.max_quote_age_secs < 0.0 {
            tracing::warn!(
                value = self.max_quote_age_secs,
                "invalid max_quote_age_secs, using default"
            );
            self.max_quote_age_secs = default_max_quote_age_secs();
        }
    }
}

fn default_max_spread_abs() -> Decimal {
    Decimal::new(50, 2) // 0.50
}
fn default_max_spread_rel() -> Decimal {
    Decimal::new(12, 2) // 0.12
}
const fn default_max_quote_age_secs() -> f64 {
    5.0
}

// ============================================
// Fallback Quote Sources
// ============================================

/// Fallback-source policy: which quote-source tags may stand in for a
/// fresh live quote when the gate would otherwise reject.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackPolicy {
    /// Whether stale/derived quotes may be used at all.
    #[serde(default)]
    pub allow_stale_quotes: bool,
    /// Quote-source tags allowed as fallback (e.g. `["close"]`).
    #[serde(default)]
    pub allowed_sources: Vec<String>,
}

impl FallbackPolicy {
    /// Whether a leg with the given source tag qualifies for fallback.
    #[must_use]
    pub fn permits(&self, source: &str) -> bool {
        self.allow_stale_quotes && self.allowed_sources.iter().any(|s| s == source)
    }
}

// ============================================
// Force Exit
// ============================================

/// Cap on how aggressively the limit price may move from mid under
/// force-exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LimitCap {
    /// Absolute dollar distance from mid.
    Absolute(Decimal),
    /// Basis points of mid (1 BPS = 0.01%).
    BasisPoints(u32),
}

impl LimitCap {
    /// Half-width of the allowed price band around mid.
    #[must_use]
    pub fn band(&self, mid: Decimal) -> Decimal {
        match self {
            Self::Absolute(cap) => cap.abs(),
            Self::BasisPoints(bps) => mid.abs() * Decimal::from(*bps) / Decimal::from(10_000),
        }
    }
}

/// Force-exit policy: last-resort close that bypasses the tradeability gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForceExitPolicy {
    /// Whether forced exits are enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Use a market order for the forced dispatch instead of a limit.
    #[serde(default)]
    pub use_market_order: bool,
    /// Optional cap on limit-price distance from mid.
    #[serde(default)]
    pub limit_cap: Option<LimitCap>,
}

impl ForceExitPolicy {
    fn validate(&mut self) {
        if let Some(LimitCap::Absolute(cap)) = self.limit_cap {
            if cap < Decimal::ZERO {
                tracing::warn!(value = %cap, "negative force-exit limit cap, dropping cap");
                self.limit_cap = None;
            }
        }
    }
}

// ============================================
// Price Ladder
// ============================================

/// Price ladder policy: limit-price offsets tried after the primary
/// attempt, with bounded per-step wait and total time budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LadderPolicy {
    /// Whether ladder steps beyond the primary attempt run at all.
    #[serde(default)]
    pub enabled: bool,
    /// Ordered price offsets added to mid, one per step.
    #[serde(default)]
    pub offsets: Vec<Decimal>,
    /// Wait between failed steps, in seconds.
    #[serde(default = "default_step_wait_secs")]
    pub step_wait_secs: f64,
    /// Maximum total ladder duration, in seconds.
    #[serde(default = "default_max_total_secs")]
    pub max_total_secs: f64,
}

impl Default for LadderPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            offsets: Vec::new(),
            step_wait_secs: default_step_wait_secs(),
            max_total_secs: default_max_total_secs(),
        }
    }
}

impl LadderPolicy {
    /// Per-step wait as a duration.
    #[must_use]
    pub fn step_wait(&self) -> Duration {
        Duration::from_secs_f64(self.step_wait_secs.max(0.0))
    }

    /// Total time budget as a duration.
    #[must_use]
    pub fn max_total(&self) -> Duration {
        Duration::from_secs_f64(self.max_total_secs.max(0.0))
    }

    fn validate(&mut self) {
        if !self.step_wait_secs.is_finite() || self.step_wait_secs < 0.0 {
            tracing::warn!(value = self.step_wait_secs, "invalid step_wait_secs, using default");
            self.step_wait_secs = default_step_wait_secs();
        }
        if !self.max_total_secs.is_finite() || self.max_total_secs < 0.0 {
            tracing::warn!(value = self.max_total_secs, "invalid max_total_secs, using default");
            self.max_total_secs = default_max_total_secs();
        }
    }
}

const fn default_step_wait_secs() -> f64 {
    2.0
}
const fn default_max_total_secs() -> f64 {
    30.0
}

// ============================================
// Loading
// ============================================

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "exit-config.yaml";

/// Load configuration from a YAML file.
///
/// Uses `DEFAULT_CONFIG_PATH` when `path` is `None`. A missing default
/// file yields the documented defaults rather than an error.
pub fn load_config(path: Option<&str>) -> Result<ExitConfig, ConfigError> {
    let explicit = path.is_some();
    let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(source) if !explicit && source.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path, "config file not found, using defaults");
            return Ok(ExitConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::ReadError {
                path: path.to_string(),
                source,
            });
        }
    };

    let mut config: ExitConfig = serde_yaml_bw::from_str(&contents)?;
    config.validate();
    Ok(config)
}
