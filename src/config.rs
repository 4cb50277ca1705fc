/// Selector configuration
///
/// Every scoring weight and adaptation constant lives here so operators can
/// tune the engine without rebuilding. Values are layered: built-in defaults,
/// then an optional file (TOML, YAML or JSON, by extension), then
/// `RECOVERY_SELECTOR_*` environment variables.
use crate::{SelectorError, SelectorResult};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix, e.g. `RECOVERY_SELECTOR_MAX_HISTORY_SIZE=1000`
pub const ENV_PREFIX: &str = "RECOVERY_SELECTOR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Cap on entries per effectiveness bucket
    pub max_history_size: usize,

    /// Weight of the a-priori success rate once learned data exists
    pub base_weight: f64,

    /// Weight of the learned success rate
    pub learned_weight: f64,

    /// Learned success rates below this are penalised
    pub low_success_threshold: f64,
    pub low_success_penalty: f64,

    /// Multiplier applied to strategies already tried for this error
    pub repetition_penalty: f64,

    pub priority_weight: f64,

    /// Memory/CPU utilization above this counts as pressure
    pub utilization_threshold: f64,

    /// Strategies whose total requirements stay below this get a bonus
    pub cheap_requirement_threshold: f64,
    pub cheap_requirement_bonus: f64,

    /// Attempt cap for CRITICAL errors
    pub critical_max_attempts: u32,

    /// Attempt budgets shrink once this many attempts were made
    pub attempt_reduction_threshold: u32,

    /// Timeout floor as a multiple of the average response time
    pub timeout_response_factor: f64,

    pub resource_initial_delay_factor: f64,
    pub resource_max_delay_factor: f64,
    pub transient_jitter_percent: f64,
    pub multiplier_growth: f64,
    pub multiplier_cap: f64,

    pub cached_result_max_age_ms: u64,
    pub cached_result_stale_threshold: f64,

    /// Tools suggested by the ALTERNATE_TOOL fallback action
    pub preferred_tools: Vec<String>,

    pub top_strategies_limit: usize,
    pub top_strategies_min_attempts: u64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_history_size: 500,
            base_weight: 0.3,
            learned_weight: 0.7,
            low_success_threshold: 0.5,
            low_success_penalty: 0.8,
            repetition_penalty: 0.7,
            priority_weight: 0.1,
            utilization_threshold: 0.8,
            cheap_requirement_threshold: 0.1,
            cheap_requirement_bonus: 0.05,
            critical_max_attempts: 2,
            attempt_reduction_threshold: 2,
            timeout_response_factor: 2.0,
            resource_initial_delay_factor: 2.0,
            resource_max_delay_factor: 1.5,
            transient_jitter_percent: 0.1,
            multiplier_growth: 1.2,
            multiplier_cap: 3.0,
            cached_result_max_age_ms: 5 * 60 * 1000,
            cached_result_stale_threshold: 0.8,
            preferred_tools: vec![
                "search".to_string(),
                "http_fetch".to_string(),
                "shell".to_string(),
            ],
            top_strategies_limit: 5,
            top_strategies_min_attempts: 3,
        }
    }
}

impl SelectorConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> SelectorResult<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;

        tracing::debug!(
            max_history_size = config.max_history_size,
            learned_weight = config.learned_weight,
            repetition_penalty = config.repetition_penalty,
            "Selector configuration loaded"
        );

        Ok(config)
    }

    /// Reject values that would break the score or adaptation invariants
    pub fn validate(&self) -> SelectorResult<()> {
        if self.max_history_size == 0 {
            return Err(SelectorError::InvalidConfig(
                "max_history_size must be at least 1".to_string(),
            ));
        }

        let unit_fields = [
            ("base_weight", self.base_weight),
            ("learned_weight", self.learned_weight),
            ("low_success_threshold", self.low_success_threshold),
            ("low_success_penalty", self.low_success_penalty),
            ("repetition_penalty", self.repetition_penalty),
            ("utilization_threshold", self.utilization_threshold),
            ("cheap_requirement_bonus", self.cheap_requirement_bonus),
            ("transient_jitter_percent", self.transient_jitter_percent),
            ("cached_result_stale_threshold", self.cached_result_stale_threshold),
        ];
        for (name, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(SelectorError::InvalidConfig(format!(
                    "{} = {} must be within [0, 1]",
                    name, value
                )));
            }
        }

        if (self.base_weight + self.learned_weight - 1.0).abs() > 1e-9 {
            return Err(SelectorError::InvalidConfig(format!(
                "base_weight + learned_weight must equal 1.0 (got {})",
                self.base_weight + self.learned_weight
            )));
        }

        let non_negative_fields = [
            ("priority_weight", self.priority_weight),
            ("cheap_requirement_threshold", self.cheap_requirement_threshold),
        ];
        for (name, value) in non_negative_fields {
            if !value.is_finite() || value < 0.0 {
                return Err(SelectorError::InvalidConfig(format!(
                    "{} = {} must be a non-negative number",
                    name, value
                )));
            }
        }

        // Zero factors would collapse delays or the backoff multiplier
        let positive_fields = [
            ("timeout_response_factor", self.timeout_response_factor),
            ("resource_initial_delay_factor", self.resource_initial_delay_factor),
            ("resource_max_delay_factor", self.resource_max_delay_factor),
            ("multiplier_growth", self.multiplier_growth),
            ("multiplier_cap", self.multiplier_cap),
        ];
        for (name, value) in positive_fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(SelectorError::InvalidConfig(format!(
                    "{} = {} must be a positive number",
                    name, value
                )));
            }
        }

        if self.critical_max_attempts == 0 {
            return Err(SelectorError::InvalidConfig(
                "critical_max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
