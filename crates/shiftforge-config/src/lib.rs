//! Configuration system for ShiftForge.
//!
//! Load solver configuration from TOML or YAML files to control termination
//! budgets, reproducibility, rule weights, and heuristic knobs without code
//! changes.
//!
//! # Examples
//!
//! Load configuration from a TOML string:
//!
//! ```
//! use shiftforge_config::SolverConfig;
//! use std::time::Duration;
//!
//! let config = SolverConfig::from_toml_str(r#"
//!     random_seed = 42
//!
//!     [termination]
//!     seconds_spent_limit = 30
//!     unimproved_seconds_spent_limit = 5
//!
//!     [rules]
//!     consecutive_days_limit = 5
//!
//!     [rules.weights.unmet_demand]
//!     soft = 250
//! "#).unwrap();
//!
//! assert_eq!(config.time_limit(), Some(Duration::from_secs(30)));
//! assert_eq!(config.rules.consecutive_days_limit, 5);
//! ```
//!
//! Use default config when the file is missing:
//!
//! ```
//! use shiftforge_config::SolverConfig;
//!
//! let config = SolverConfig::load("solver.toml").unwrap_or_default();
//! // Proceeds with a two-minute budget if the file doesn't exist
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main solver configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SolverConfig {
    /// Random seed for reproducible results.
    #[serde(default)]
    pub random_seed: Option<u64>,

    /// Termination configuration.
    #[serde(default)]
    pub termination: TerminationConfig,

    /// Construction heuristic configuration.
    #[serde(default)]
    pub construction: ConstructionConfig,

    /// Local search configuration.
    #[serde(default)]
    pub local_search: LocalSearchConfig,

    /// Scoring rule configuration.
    #[serde(default)]
    pub rules: RuleConfig,
}

impl SolverConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist or contains invalid TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Sets the termination time limit in seconds.
    pub fn with_termination_seconds(mut self, seconds: u64) -> Self {
        self.termination.seconds_spent_limit = Some(TimeBudget::Units(seconds));
        self.termination.minutes_spent_limit = None;
        self
    }

    /// Sets the unimproved termination limit in seconds.
    pub fn with_unimproved_seconds(mut self, seconds: u64) -> Self {
        self.termination.unimproved_seconds_spent_limit = Some(TimeBudget::Units(seconds));
        self
    }

    /// Sets the random seed.
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Enables or disables warm starting from a prior period.
    pub fn with_warm_start(mut self, warm_start: bool) -> Self {
        self.construction.warm_start = warm_start;
        self
    }

    /// Overrides one rule's weight magnitudes.
    pub fn with_weight(mut self, rule: impl Into<String>, hard: i64, soft: i64) -> Self {
        self.rules.weights.insert(rule.into(), WeightConfig { hard, soft });
        self
    }

    /// Returns the termination time limit, if configured.
    ///
    /// Convenience method that delegates to `termination.time_limit()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use shiftforge_config::SolverConfig;
    /// use std::time::Duration;
    ///
    /// let config = SolverConfig::from_toml_str(r#"
    ///     [termination]
    ///     seconds_spent_limit = 30
    /// "#).unwrap();
    ///
    /// assert_eq!(config.time_limit(), Some(Duration::from_secs(30)));
    /// ```
    pub fn time_limit(&self) -> Option<Duration> {
        self.termination.time_limit()
    }

    /// Returns the unimproved time limit, if configured.
    pub fn unimproved_time_limit(&self) -> Option<Duration> {
        self.termination.unimproved_time_limit()
    }
}

/// A time budget value: either a bare count in the field's native unit, or
/// a tolerant duration string such as `"PT2M"`, `"90s"`, or `"500ms"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TimeBudget {
    Units(u64),
    Text(String),
}

impl TimeBudget {
    /// Resolves the budget to a duration, treating a bare count as
    /// `unit_seconds`-second units. Unparseable text resolves to `None`.
    pub fn to_duration(&self, unit_seconds: u64) -> Option<Duration> {
        match self {
            TimeBudget::Units(n) => Some(Duration::from_secs(n.saturating_mul(unit_seconds))),
            TimeBudget::Text(s) => parse_duration_tolerant(s),
        }
    }
}

/// Termination configuration.
///
/// Defaults to a two-minute spent limit with a thirty-second unimproved
/// limit.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TerminationConfig {
    /// Maximum seconds to spend solving.
    #[serde(default)]
    pub seconds_spent_limit: Option<TimeBudget>,

    /// Maximum minutes to spend solving.
    #[serde(default)]
    pub minutes_spent_limit: Option<TimeBudget>,

    /// Maximum seconds without improvement.
    #[serde(default)]
    pub unimproved_seconds_spent_limit: Option<TimeBudget>,

    /// Maximum number of steps.
    #[serde(default)]
    pub step_count_limit: Option<u64>,

    /// Maximum unimproved steps before terminating.
    #[serde(default)]
    pub unimproved_step_count_limit: Option<u64>,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            seconds_spent_limit: None,
            minutes_spent_limit: Some(TimeBudget::Units(2)),
            unimproved_seconds_spent_limit: Some(TimeBudget::Units(30)),
            step_count_limit: None,
            unimproved_step_count_limit: None,
        }
    }
}

impl TerminationConfig {
    /// Returns the time limit as a Duration, if any.
    ///
    /// Seconds and minutes budgets add up; unparseable budget text counts
    /// as zero.
    pub fn time_limit(&self) -> Option<Duration> {
        let mut total = Duration::ZERO;
        if let Some(budget) = &self.seconds_spent_limit {
            total += budget.to_duration(1).unwrap_or_default();
        }
        if let Some(budget) = &self.minutes_spent_limit {
            total += budget.to_duration(60).unwrap_or_default();
        }
        if total > Duration::ZERO {
            Some(total)
        } else {
            None
        }
    }

    /// Returns the unimproved time limit as a Duration, if any.
    pub fn unimproved_time_limit(&self) -> Option<Duration> {
        self.unimproved_seconds_spent_limit
            .as_ref()
            .and_then(|budget| budget.to_duration(1))
            .filter(|limit| *limit > Duration::ZERO)
    }
}

/// Construction heuristic configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ConstructionConfig {
    /// Whether to seed placements from a prior-period solution.
    #[serde(default = "default_true")]
    pub warm_start: bool,
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self { warm_start: true }
    }
}

/// Local search configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LocalSearchConfig {
    /// Maximum number of accepted moves to consider per step.
    #[serde(default = "default_accepted_count_limit")]
    pub accepted_count_limit: usize,
}

impl Default for LocalSearchConfig {
    fn default() -> Self {
        Self {
            accepted_count_limit: default_accepted_count_limit(),
        }
    }
}

/// Scoring rule configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RuleConfig {
    /// Maximum run of consecutive working days before a hard violation.
    #[serde(default = "default_consecutive_days_limit")]
    pub consecutive_days_limit: u32,

    /// Per-rule weight overrides, keyed by rule name.
    #[serde(default)]
    pub weights: HashMap<String, WeightConfig>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            consecutive_days_limit: default_consecutive_days_limit(),
            weights: HashMap::new(),
        }
    }
}

/// Weight magnitudes for one scoring rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct WeightConfig {
    /// Hard score magnitude per match.
    #[serde(default)]
    pub hard: i64,

    /// Soft score magnitude per match.
    #[serde(default)]
    pub soft: i64,
}

fn default_true() -> bool {
    true
}

fn default_accepted_count_limit() -> usize {
    1
}

fn default_consecutive_days_limit() -> u32 {
    6
}

/// Parses a duration from tolerant human input.
///
/// Accepts ISO-8601-style `PT..H..M..S` (case-insensitive), suffix forms
/// `ms`/`s`/`m`/`h`, and bare digits meaning seconds. Returns `None` for
/// anything else, letting the caller fall back to its default budget.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use shiftforge_config::parse_duration_tolerant;
///
/// assert_eq!(parse_duration_tolerant("PT2M"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_duration_tolerant("90s"), Some(Duration::from_secs(90)));
/// assert_eq!(parse_duration_tolerant("500ms"), Some(Duration::from_millis(500)));
/// assert_eq!(parse_duration_tolerant("45"), Some(Duration::from_secs(45)));
/// assert_eq!(parse_duration_tolerant("soon"), None);
/// ```
pub fn parse_duration_tolerant(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<u64>().ok().map(Duration::from_secs);
    }

    let lower = s.to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix("pt") {
        return parse_iso_segments(rest);
    }
    if let Some(count) = lower.strip_suffix("ms") {
        return count.trim().parse::<u64>().ok().map(Duration::from_millis);
    }
    if let Some(count) = lower.strip_suffix('s') {
        return count.trim().parse::<u64>().ok().map(Duration::from_secs);
    }
    if let Some(count) = lower.strip_suffix('m') {
        return count
            .trim()
            .parse::<u64>()
            .ok()
            .map(|minutes| Duration::from_secs(minutes * 60));
    }
    if let Some(count) = lower.strip_suffix('h') {
        return count
            .trim()
            .parse::<u64>()
            .ok()
            .map(|hours| Duration::from_secs(hours * 3600));
    }
    None
}

fn parse_iso_segments(s: &str) -> Option<Duration> {
    let mut total: u64 = 0;
    let mut digits = String::new();
    let mut seen_unit = false;
    for ch in s.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let value: u64 = digits.parse().ok()?;
        digits.clear();
        let factor = match ch {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        total = total.checked_add(value.checked_mul(factor)?)?;
        seen_unit = true;
    }
    if !digits.is_empty() || !seen_unit {
        return None;
    }
    Some(Duration::from_secs(total))
}
