/// Recovery strategy configurations, backoff policies and fallback actions
///
/// A `RecoveryStrategyConfig` is both a catalog entry and the value handed
/// back to the executor after adaptation. The backoff policy also knows how to
/// compute the delay the executor should wait before each retry, using
/// exponential growth with optional jitter to avoid thundering herds.
use super::condition::RecoveryCondition;
use crate::{SelectorError, SelectorResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Closed set of recovery strategies the executor knows how to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyType {
    /// Halt the task tree immediately
    EmergencyStop,

    /// Hand the failure to a human operator
    EscalateToHuman,

    /// Hand the failure to the parent tier
    EscalateToParent,

    /// Retry the identical operation
    RetrySame,

    /// Wait for conditions to improve, then retry
    WaitAndRetry,

    /// Retry with modified parameters
    RetryModified,

    FallbackStrategy,
    FallbackModel,
    ReduceScope,
    GracefulDegradation,
    LogWarning,
    LogInfo,
}

impl StrategyType {
    /// Every strategy type, in declaration order
    pub const ALL: [StrategyType; 12] = [
        StrategyType::EmergencyStop,
        StrategyType::EscalateToHuman,
        StrategyType::EscalateToParent,
        StrategyType::RetrySame,
        StrategyType::WaitAndRetry,
        StrategyType::RetryModified,
        StrategyType::FallbackStrategy,
        StrategyType::FallbackModel,
        StrategyType::ReduceScope,
        StrategyType::GracefulDegradation,
        StrategyType::LogWarning,
        StrategyType::LogInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::EmergencyStop => "EMERGENCY_STOP",
            StrategyType::EscalateToHuman => "ESCALATE_TO_HUMAN",
            StrategyType::EscalateToParent => "ESCALATE_TO_PARENT",
            StrategyType::RetrySame => "RETRY_SAME",
            StrategyType::WaitAndRetry => "WAIT_AND_RETRY",
            StrategyType::RetryModified => "RETRY_MODIFIED",
            StrategyType::FallbackStrategy => "FALLBACK_STRATEGY",
            StrategyType::FallbackModel => "FALLBACK_MODEL",
            StrategyType::ReduceScope => "REDUCE_SCOPE",
            StrategyType::GracefulDegradation => "GRACEFUL_DEGRADATION",
            StrategyType::LogWarning => "LOG_WARNING",
            StrategyType::LogInfo => "LOG_INFO",
        }
    }

    /// Escalation strategies hand the problem to someone else
    pub fn is_escalation(&self) -> bool {
        matches!(
            self,
            StrategyType::EscalateToParent | StrategyType::EscalateToHuman
        )
    }

    /// Strategies that remain acceptable for fatal or unrecoverable errors
    pub fn is_terminal_safe(&self) -> bool {
        matches!(
            self,
            StrategyType::EmergencyStop | StrategyType::EscalateToHuman
        )
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of the delay curve between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackoffType {
    Fixed,
    Linear,
    Exponential,
    ExponentialJitter,
}

/// Backoff policy for retries performed by the executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffStrategyConfig {
    #[serde(rename = "type")]
    pub backoff_type: BackoffType,

    /// Delay before the first retry
    pub initial_delay_ms: u64,

    /// Delay cap
    pub max_delay_ms: u64,

    /// Growth factor for exponential curves
    pub multiplier: f64,

    /// Jitter factor (0.0 - 1.0), only applied to EXPONENTIAL_JITTER
    pub jitter_percent: f64,

    /// Executor may tune delays from observed latencies
    pub adaptive_adjustment: bool,
}

impl BackoffStrategyConfig {
    /// Constant delay between attempts
    pub fn fixed(delay_ms: u64) -> Self {
        Self {
            backoff_type: BackoffType::Fixed,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            multiplier: 1.0,
            jitter_percent: 0.0,
            adaptive_adjustment: false,
        }
    }

    /// Delay grows by `initial_delay_ms` each attempt
    pub fn linear(initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            backoff_type: BackoffType::Linear,
            initial_delay_ms,
            max_delay_ms,
            multiplier: 1.0,
            jitter_percent: 0.0,
            adaptive_adjustment: false,
        }
    }

    /// Delay = initial * multiplier^attempt
    pub fn exponential(initial_delay_ms: u64, max_delay_ms: u64, multiplier: f64) -> Self {
        Self {
            backoff_type: BackoffType::Exponential,
            initial_delay_ms,
            max_delay_ms,
            multiplier,
            jitter_percent: 0.0,
            adaptive_adjustment: false,
        }
    }

    /// Exponential delay with symmetric jitter
    pub fn exponential_jitter(
        initial_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
        jitter_percent: f64,
    ) -> Self {
        Self {
            backoff_type: BackoffType::ExponentialJitter,
            initial_delay_ms,
            max_delay_ms,
            multiplier,
            jitter_percent: jitter_percent.clamp(0.0, 1.0),
            adaptive_adjustment: false,
        }
    }

    /// Delay before retry number `attempt` (0-based), with random jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let unit = rand::random::<f64>() * 2.0 - 1.0;
        self.delay_for_attempt_with(attempt, unit)
    }

    /// Delay before retry number `attempt` using an explicit jitter sample.
    ///
    /// `unit` is clamped to [-1, 1]; the jitter applied is
    /// `capped_delay * jitter_percent * unit`. Non-jitter curves ignore it.
    pub fn delay_for_attempt_with(&self, attempt: u32, unit: f64) -> Duration {
        let initial = self.initial_delay_ms as f64;
        let max = self.max_delay_ms as f64;

        let raw = match self.backoff_type {
            BackoffType::Fixed => initial,
            BackoffType::Linear => initial * (f64::from(attempt) + 1.0),
            BackoffType::Exponential | BackoffType::ExponentialJitter => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                initial * self.multiplier.powi(exponent)
            }
        };
        let capped = if raw.is_finite() { raw.min(max) } else { max };

        let final_ms = match self.backoff_type {
            BackoffType::ExponentialJitter => {
                let jitter = capped * self.jitter_percent * unit.clamp(-1.0, 1.0);
                (capped + jitter).max(0.0)
            }
            _ => capped.max(0.0),
        };

        Duration::from_millis(final_ms as u64)
    }

    pub fn validate(&self) -> SelectorResult<()> {
        if !(0.0..=1.0).contains(&self.jitter_percent) {
            return Err(SelectorError::InvalidStrategy(format!(
                "jitter percent {} outside [0, 1]",
                self.jitter_percent
            )));
        }
        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            return Err(SelectorError::InvalidStrategy(format!(
                "backoff multiplier {} must be positive",
                self.multiplier
            )));
        }
        Ok(())
    }

    /// Catalog entries must not start above their own cap. Adapted copies
    /// may, since resource scaling grows the initial delay faster.
    pub fn validate_delay_order(&self) -> SelectorResult<()> {
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(SelectorError::InvalidStrategy(format!(
                "initial delay {}ms exceeds max delay {}ms",
                self.initial_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

/// Closed set of secondary actions attached to a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackActionType {
    ManualIntervention,
    UseCachedResult,
    AlternateTool,
    AlternateStrategy,
    AlternateModel,
    ReduceScope,
    PartialService,
}

/// Secondary action the executor can take if the main strategy falls short
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackAction {
    #[serde(rename = "type")]
    pub action_type: FallbackActionType,

    #[serde(default)]
    pub configuration: serde_json::Map<String, serde_json::Value>,

    #[serde(default)]
    pub conditions: Vec<RecoveryCondition>,

    pub priority: f64,

    pub estimated_success_rate: f64,

    /// Fraction of result quality given up by taking this action
    #[serde(default)]
    pub quality_reduction: f64,

    #[serde(default)]
    pub resource_adjustment: BTreeMap<String, f64>,
}

impl FallbackAction {
    pub fn new(
        action_type: FallbackActionType,
        priority: f64,
        estimated_success_rate: f64,
        quality_reduction: f64,
    ) -> Self {
        Self {
            action_type,
            configuration: serde_json::Map::new(),
            conditions: Vec::new(),
            priority,
            estimated_success_rate,
            quality_reduction,
            resource_adjustment: BTreeMap::new(),
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.configuration.insert(key.into(), value.into());
        self
    }

    pub fn with_resource_adjustment(mut self, resource: impl Into<String>, delta: f64) -> Self {
        self.resource_adjustment.insert(resource.into(), delta);
        self
    }

    /// Hand the problem to an operator
    pub fn manual_intervention() -> Self {
        Self::new(FallbackActionType::ManualIntervention, 10.0, 0.9, 0.0)
            .with_setting("reason", "security_risk")
    }

    /// Serve a cached result no older than `max_age_ms`
    pub fn use_cached_result(max_age_ms: u64, stale_threshold: f64) -> Self {
        Self::new(FallbackActionType::UseCachedResult, 8.0, 0.7, 0.2)
            .with_setting("maxAge", max_age_ms)
            .with_setting("staleThreshold", stale_threshold)
    }

    /// Switch to another tool from `preferred_tools`
    pub fn alternate_tool<S: AsRef<str>>(preferred_tools: &[S]) -> Self {
        let tools: Vec<serde_json::Value> = preferred_tools
            .iter()
            .map(|tool| serde_json::Value::from(tool.as_ref()))
            .collect();
        Self::new(FallbackActionType::AlternateTool, 6.0, 0.6, 0.3)
            .with_setting("preferredTools", tools)
    }

    pub fn validate(&self) -> SelectorResult<()> {
        validate_unit("fallback success rate", self.estimated_success_rate)?;
        validate_unit("quality reduction", self.quality_reduction)
    }
}

/// Fully specified recovery strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryStrategyConfig {
    pub strategy_type: StrategyType,

    pub max_attempts: u32,

    pub backoff_strategy: BackoffStrategyConfig,

    #[serde(default)]
    pub fallback_actions: Vec<FallbackAction>,

    /// Higher is preferred, all else equal
    pub priority: f64,

    /// Budget for the caller's execution of this strategy
    pub timeout_ms: u64,

    #[serde(default)]
    pub conditions: Vec<RecoveryCondition>,

    pub estimated_success_rate: f64,

    #[serde(default)]
    pub resource_requirements: BTreeMap<String, f64>,
}

impl RecoveryStrategyConfig {
    pub fn new(strategy_type: StrategyType, backoff_strategy: BackoffStrategyConfig) -> Self {
        Self {
            strategy_type,
            max_attempts: 1,
            backoff_strategy,
            fallback_actions: Vec::new(),
            priority: 0.0,
            timeout_ms: 30_000,
            conditions: Vec::new(),
            estimated_success_rate: 0.5,
            resource_requirements: BTreeMap::new(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_success_rate(mut self, rate: f64) -> Self {
        self.estimated_success_rate = rate;
        self
    }

    pub fn with_condition(mut self, condition: RecoveryCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_fallback(mut self, action: FallbackAction) -> Self {
        self.fallback_actions.push(action);
        self
    }

    pub fn with_requirement(mut self, resource: impl Into<String>, amount: f64) -> Self {
        self.resource_requirements.insert(resource.into(), amount);
        self
    }

    /// Sum of all resource requirement quantities
    pub fn total_requirements(&self) -> f64 {
        self.resource_requirements.values().sum()
    }

    /// Check whether a fallback action of the given type is attached
    pub fn has_fallback(&self, action_type: FallbackActionType) -> bool {
        self.fallback_actions
            .iter()
            .any(|a| a.action_type == action_type)
    }

    pub fn validate(&self) -> SelectorResult<()> {
        if self.max_attempts == 0 {
            return Err(SelectorError::InvalidStrategy(format!(
                "{} must allow at least one attempt",
                self.strategy_type
            )));
        }
        validate_unit("estimated success rate", self.estimated_success_rate)?;
        if !self.priority.is_finite() {
            return Err(SelectorError::InvalidStrategy(format!(
                "{} has non-finite priority",
                self.strategy_type
            )));
        }
        self.backoff_strategy.validate()?;
        for action in &self.fallback_actions {
            action.validate()?;
        }
        Ok(())
    }
}

fn validate_unit(what: &str, value: f64) -> SelectorResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SelectorError::InvalidStrategy(format!(
            "{} {} outside [0, 1]",
            what, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delays() {
        let backoff = BackoffStrategyConfig::exponential(100, 10_000, 2.0);

        assert_eq!(backoff.delay_for_attempt(0).as_millis(), 100);
        assert_eq!(backoff.delay_for_attempt(1).as_millis(), 200);
        assert_eq!(backoff.delay_for_attempt(2).as_millis(), 400);
    }

    #[test]
    fn test_delay_caps_at_max() {
        let backoff = BackoffStrategyConfig::exponential(100, 1_000, 2.0);
        assert_eq!(backoff.delay_for_attempt(10).as_millis(), 1_000);

        // Overflowing growth still lands on the cap
        assert_eq!(backoff.delay_for_attempt(u32::MAX).as_millis(), 1_000);
    }

    #[test]
    fn test_fixed_and_linear_delays() {
        let fixed = BackoffStrategyConfig::fixed(250);
        assert_eq!(fixed.delay_for_attempt(0).as_millis(), 250);
        assert_eq!(fixed.delay_for_attempt(7).as_millis(), 250);

        let linear = BackoffStrategyConfig::linear(100, 350);
        assert_eq!(linear.delay_for_attempt(0).as_millis(), 100);
        assert_eq!(linear.delay_for_attempt(2).as_millis(), 300);
        assert_eq!(linear.delay_for_attempt(5).as_millis(), 350);
    }

    #[test]
    fn test_jitter_bounds() {
        let backoff = BackoffStrategyConfig::exponential_jitter(1_000, 60_000, 2.0, 0.1);

        assert_eq!(backoff.delay_for_attempt_with(0, 1.0).as_millis(), 1_100);
        assert_eq!(backoff.delay_for_attempt_with(0, -1.0).as_millis(), 900);
        assert_eq!(backoff.delay_for_attempt_with(0, 0.0).as_millis(), 1_000);
        // Samples outside [-1, 1] are clamped
        assert_eq!(backoff.delay_for_attempt_with(0, 5.0).as_millis(), 1_100);

        for _ in 0..50 {
            let delay = backoff.delay_for_attempt(1).as_millis();
            assert!((1_800..=2_200).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_jitter_percent_clamped() {
        let backoff = BackoffStrategyConfig::exponential_jitter(100, 1_000, 2.0, 1.7);
        assert_eq!(backoff.jitter_percent, 1.0);
    }

    #[test]
    fn test_strategy_validation() {
        let strategy = RecoveryStrategyConfig::new(
            StrategyType::RetrySame,
            BackoffStrategyConfig::exponential(100, 1_000, 2.0),
        )
        .with_max_attempts(3)
        .with_success_rate(0.6);
        assert!(strategy.validate().is_ok());

        assert!(strategy.clone().with_max_attempts(0).validate().is_err());
        assert!(strategy.clone().with_success_rate(1.2).validate().is_err());
        assert!(strategy
            .clone()
            .with_fallback(FallbackAction::new(
                FallbackActionType::PartialService,
                1.0,
                0.5,
                -0.1
            ))
            .validate()
            .is_err());

        let mut inverted = strategy;
        inverted.backoff_strategy.initial_delay_ms = 5_000;
        assert!(inverted.validate().is_ok());
        assert!(inverted.backoff_strategy.validate_delay_order().is_err());
    }

    #[test]
    fn test_contextual_fallback_actions() {
        let manual = FallbackAction::manual_intervention();
        assert_eq!(manual.action_type, FallbackActionType::ManualIntervention);
        assert_eq!(manual.priority, 10.0);
        assert_eq!(manual.estimated_success_rate, 0.9);
        assert_eq!(manual.quality_reduction, 0.0);

        let cached = FallbackAction::use_cached_result(300_000, 0.8);
        assert_eq!(cached.configuration["maxAge"], serde_json::json!(300_000));
        assert_eq!(cached.configuration["staleThreshold"], serde_json::json!(0.8));
        assert_eq!(cached.quality_reduction, 0.2);

        let tool = FallbackAction::alternate_tool(&["shell", "http"]);
        assert_eq!(
            tool.configuration["preferredTools"],
            serde_json::json!(["shell", "http"])
        );
    }

    #[test]
    fn test_strategy_type_names_round_trip_through_serde() {
        for strategy in StrategyType::ALL {
            let json = serde_json::to_string(&strategy).unwrap();
            assert_eq!(json, format!("\"{}\"", strategy.as_str()));
        }
    }

    #[test]
    fn test_total_requirements() {
        let strategy = RecoveryStrategyConfig::new(StrategyType::FallbackModel, BackoffStrategyConfig::fixed(0))
            .with_requirement("gpu", 0.5)
            .with_requirement("memory", 0.25);
        assert_eq!(strategy.total_requirements(), 0.75);
        assert!(!strategy.has_fallback(FallbackActionType::AlternateModel));
    }
}
