/// Built-in strategy catalog
///
/// The catalog is assembled once when the selector is constructed and is
/// read-only afterwards: there is no API to add, remove or edit entries.
/// Catalog order is significant, it breaks ties between equal scores.
use super::condition::{ConditionOperator, RecoveryCondition};
use super::strategy::{
    BackoffStrategyConfig, FallbackAction, FallbackActionType, RecoveryStrategyConfig,
    StrategyType,
};
use crate::{SelectorError, SelectorResult};
use std::collections::HashMap;

/// Immutable catalog of strategy configurations, one per strategy type
#[derive(Debug, Clone)]
pub struct StrategyDatabase {
    strategies: Vec<RecoveryStrategyConfig>,
    index: HashMap<StrategyType, usize>,
}

impl StrategyDatabase {
    /// Catalog with the built-in strategies
    pub fn builtin() -> Self {
        let strategies = builtin_strategies();
        let index = strategies
            .iter()
            .enumerate()
            .map(|(i, s)| (s.strategy_type, i))
            .collect();
        Self { strategies, index }
    }

    /// Catalog from caller-supplied strategies, validated and de-duplicated by type
    pub fn from_strategies(strategies: Vec<RecoveryStrategyConfig>) -> SelectorResult<Self> {
        let mut index = HashMap::with_capacity(strategies.len());
        for (i, strategy) in strategies.iter().enumerate() {
            strategy.validate()?;
            strategy.backoff_strategy.validate_delay_order()?;
            if index.insert(strategy.strategy_type, i).is_some() {
                return Err(SelectorError::InvalidStrategy(format!(
                    "duplicate catalog entry for {}",
                    strategy.strategy_type
                )));
            }
        }
        Ok(Self { strategies, index })
    }

    pub fn get(&self, strategy_type: StrategyType) -> Option<&RecoveryStrategyConfig> {
        self.index
            .get(&strategy_type)
            .and_then(|&i| self.strategies.get(i))
    }

    /// Strategies in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &RecoveryStrategyConfig> {
        self.strategies.iter()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl Default for StrategyDatabase {
    fn default() -> Self {
        Self::builtin()
    }
}

fn not_fatal() -> RecoveryCondition {
    RecoveryCondition::new("severity", ConditionOperator::NotEquals, "FATAL")
}

fn recoverable() -> RecoveryCondition {
    RecoveryCondition::new("recoverability", ConditionOperator::NotEquals, "NONE")
}

fn category_in(categories: &[&str]) -> RecoveryCondition {
    RecoveryCondition::new("category", ConditionOperator::In, categories.to_vec())
}

fn builtin_strategies() -> Vec<RecoveryStrategyConfig> {
    vec![
        RecoveryStrategyConfig::new(
            StrategyType::RetrySame,
            BackoffStrategyConfig::exponential(1_000, 10_000, 2.0),
        )
        .with_max_attempts(3)
        .with_priority(0.6)
        .with_timeout_ms(30_000)
        .with_success_rate(0.7)
        .with_condition(category_in(&["TRANSIENT", "NETWORK"]))
        .with_condition(recoverable())
        .with_condition(not_fatal()),
        RecoveryStrategyConfig::new(
            StrategyType::WaitAndRetry,
            BackoffStrategyConfig::exponential(5_000, 60_000, 1.5),
        )
        .with_max_attempts(5)
        .with_priority(0.5)
        .with_timeout_ms(60_000)
        .with_success_rate(0.65)
        .with_condition(category_in(&["TRANSIENT", "RESOURCE", "NETWORK", "DEPENDENCY"]))
        .with_condition(recoverable())
        .with_condition(not_fatal())
        .with_fallback(
            FallbackAction::new(FallbackActionType::ReduceScope, 5.0, 0.6, 0.25)
                .with_setting("scopeFactor", 0.5),
        ),
        RecoveryStrategyConfig::new(
            StrategyType::RetryModified,
            BackoffStrategyConfig::linear(1_000, 5_000),
        )
        .with_max_attempts(2)
        .with_priority(0.5)
        .with_timeout_ms(45_000)
        .with_success_rate(0.55)
        .with_condition(category_in(&["LOGIC", "CONFIGURATION", "DEPENDENCY"]))
        .with_condition(recoverable())
        .with_condition(not_fatal()),
        RecoveryStrategyConfig::new(StrategyType::FallbackStrategy, BackoffStrategyConfig::fixed(0))
            .with_max_attempts(1)
            .with_priority(0.4)
            .with_timeout_ms(60_000)
            .with_success_rate(0.6)
            .with_condition(recoverable())
            .with_condition(not_fatal())
            .with_fallback(FallbackAction::new(
                FallbackActionType::AlternateStrategy,
                5.0,
                0.55,
                0.2,
            )),
        RecoveryStrategyConfig::new(StrategyType::FallbackModel, BackoffStrategyConfig::fixed(500))
            .with_max_attempts(2)
            .with_priority(0.4)
            .with_timeout_ms(90_000)
            .with_success_rate(0.6)
            .with_condition(category_in(&["LOGIC", "DEPENDENCY", "UNKNOWN"]))
            .with_condition(recoverable())
            .with_condition(not_fatal())
            .with_requirement("alternateModels", 1.0)
            .with_fallback(
                FallbackAction::new(FallbackActionType::AlternateModel, 5.0, 0.6, 0.15)
                    .with_resource_adjustment("alternateModels", -1.0),
            ),
        RecoveryStrategyConfig::new(StrategyType::ReduceScope, BackoffStrategyConfig::fixed(500))
            .with_max_attempts(2)
            .with_priority(0.5)
            .with_timeout_ms(30_000)
            .with_success_rate(0.7)
            .with_condition(category_in(&["RESOURCE", "LOGIC"]))
            .with_condition(recoverable())
            .with_condition(not_fatal())
            .with_fallback(
                FallbackAction::new(FallbackActionType::PartialService, 4.0, 0.8, 0.4)
                    .with_resource_adjustment("memory", -0.25),
            ),
        RecoveryStrategyConfig::new(
            StrategyType::GracefulDegradation,
            BackoffStrategyConfig::fixed(0),
        )
        .with_max_attempts(1)
        .with_priority(0.4)
        .with_timeout_ms(15_000)
        .with_success_rate(0.75)
        .with_condition(RecoveryCondition::new(
            "severity",
            ConditionOperator::In,
            vec!["WARNING", "CRITICAL"],
        ))
        .with_condition(recoverable())
        .with_fallback(FallbackAction::new(
            FallbackActionType::PartialService,
            4.0,
            0.85,
            0.35,
        )),
        RecoveryStrategyConfig::new(StrategyType::EscalateToParent, BackoffStrategyConfig::fixed(0))
            .with_max_attempts(1)
            .with_priority(0.5)
            .with_timeout_ms(120_000)
            .with_success_rate(0.8)
            .with_condition(RecoveryCondition::new(
                "tier",
                ConditionOperator::GreaterThan,
                1u32,
            ))
            .with_condition(not_fatal()),
        RecoveryStrategyConfig::new(StrategyType::EscalateToHuman, BackoffStrategyConfig::fixed(0))
            .with_max_attempts(1)
            .with_priority(0.3)
            .with_timeout_ms(3_600_000)
            .with_success_rate(0.6)
            .with_condition(RecoveryCondition::new(
                "severity",
                ConditionOperator::In,
                vec!["CRITICAL", "FATAL"],
            ))
            .with_fallback(FallbackAction::manual_intervention()),
        RecoveryStrategyConfig::new(StrategyType::EmergencyStop, BackoffStrategyConfig::fixed(0))
            .with_max_attempts(1)
            .with_priority(1.0)
            .with_timeout_ms(5_000)
            .with_success_rate(0.95)
            .with_condition(RecoveryCondition::new(
                "severity",
                ConditionOperator::Equals,
                "FATAL",
            )),
        RecoveryStrategyConfig::new(StrategyType::LogWarning, BackoffStrategyConfig::fixed(0))
            .with_max_attempts(1)
            .with_priority(0.2)
            .with_timeout_ms(1_000)
            .with_success_rate(0.5)
            .with_condition(RecoveryCondition::new(
                "severity",
                ConditionOperator::Equals,
                "WARNING",
            ))
            .with_condition(RecoveryCondition::new(
                "recoverability",
                ConditionOperator::Equals,
                "AUTOMATIC",
            )),
        RecoveryStrategyConfig::new(StrategyType::LogInfo, BackoffStrategyConfig::fixed(0))
            .with_max_attempts(1)
            .with_priority(0.1)
            .with_timeout_ms(1_000)
            .with_success_rate(0.9)
            .with_condition(RecoveryCondition::new(
                "severity",
                ConditionOperator::Equals,
                "INFO",
            )),
    ]
}
