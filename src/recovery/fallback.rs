/// Fallback policy - the answer when nothing else applies
///
/// Used when filtering leaves no candidates or when selection fails
/// internally. Severe errors stop the task tree, security problems go to a
/// human, data risk degrades gracefully and everything else is escalated one
/// tier up.
use super::catalog::StrategyDatabase;
use super::classification::ErrorClassification;
use super::strategy::{BackoffStrategyConfig, RecoveryStrategyConfig, StrategyType};

/// Strategy type the fallback policy picks for a classification
pub fn fallback_type(classification: &ErrorClassification) -> StrategyType {
    if classification.severity.is_severe() {
        StrategyType::EmergencyStop
    } else if classification.security_risk {
        StrategyType::EscalateToHuman
    } else if classification.data_risk {
        StrategyType::GracefulDegradation
    } else {
        StrategyType::EscalateToParent
    }
}

/// Fallback strategy, taken from the catalog when it carries one
pub fn fallback_strategy(
    database: &StrategyDatabase,
    classification: &ErrorClassification,
) -> RecoveryStrategyConfig {
    let strategy_type = fallback_type(classification);

    match database.get(strategy_type) {
        Some(strategy) => strategy.clone(),
        None => {
            tracing::debug!(
                strategy = %strategy_type,
                "Catalog has no entry for fallback, using minimal strategy"
            );
            minimal_strategy(strategy_type)
        }
    }
}

/// Bare strategy of the given type with no conditions or fallback actions
pub fn minimal_strategy(strategy_type: StrategyType) -> RecoveryStrategyConfig {
    RecoveryStrategyConfig::new(strategy_type, BackoffStrategyConfig::fixed(0))
        .with_timeout_ms(minimal_timeout_ms(strategy_type))
}

fn minimal_timeout_ms(strategy_type: StrategyType) -> u64 {
    match strategy_type {
        StrategyType::EmergencyStop => 5_000,
        StrategyType::EscalateToHuman => 3_600_000,
        StrategyType::GracefulDegradation => 15_000,
        StrategyType::EscalateToParent => 120_000,
        _ => 30_000,
    }
}
