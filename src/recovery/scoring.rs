/// Composite suitability score for candidate strategies
///
/// score = base (a-priori or blended with learned success rate)
///       + context bonuses + resource-efficiency bonuses
///       (x repetition penalty) + priority bonus, clamped to [0, 1]
use super::classification::{ErrorCategory, ErrorClassification, ErrorContext, Severity};
use super::ledger::StrategyEffectiveness;
use super::strategy::{RecoveryStrategyConfig, StrategyType};
use crate::config::SelectorConfig;
use serde::{Deserialize, Serialize};

const CRITICAL_BONUS: f64 = 0.2;
const CATEGORY_BONUS: f64 = 0.15;
const TIER_BONUS: f64 = 0.1;
const PRESSURE_BONUS: f64 = 0.1;

/// Score assigned to one candidate during a selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateScore {
    pub strategy: StrategyType,
    pub score: f64,

    /// Learned success rate that fed the score, if one existed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learned_success_rate: Option<f64>,
}

/// Score a strategy for the given error; always within [0, 1]
pub fn score(
    strategy: &RecoveryStrategyConfig,
    classification: &ErrorClassification,
    context: &ErrorContext,
    learned: Option<&StrategyEffectiveness>,
    config: &SelectorConfig,
) -> f64 {
    let strategy_type = strategy.strategy_type;
    let mut score = strategy.estimated_success_rate;

    if let Some(record) = learned {
        score = config.base_weight * score + config.learned_weight * record.success_rate;
        if record.success_rate < config.low_success_threshold {
            score *= config.low_success_penalty;
        }
    }

    score += context_bonus(strategy_type, classification, context);
    score += resource_bonus(strategy, context, config);

    if context.has_tried(strategy_type) {
        score *= config.repetition_penalty;
    }

    score += strategy.priority * config.priority_weight;

    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Pick the highest score; the earliest candidate wins ties
pub fn best_candidate(scores: &[CandidateScore]) -> Option<&CandidateScore> {
    scores.iter().fold(None, |best: Option<&CandidateScore>, candidate| match best {
        Some(current) if current.score >= candidate.score => Some(current),
        _ => Some(candidate),
    })
}

fn context_bonus(
    strategy: StrategyType,
    classification: &ErrorClassification,
    context: &ErrorContext,
) -> f64 {
    use StrategyType::*;

    let mut bonus = 0.0;

    if classification.severity == Severity::Critical
        && matches!(strategy, EscalateToHuman | EmergencyStop)
    {
        bonus += CRITICAL_BONUS;
    }

    match classification.category {
        ErrorCategory::Transient if matches!(strategy, RetrySame | WaitAndRetry) => {
            bonus += CATEGORY_BONUS;
        }
        ErrorCategory::Resource if matches!(strategy, ReduceScope | WaitAndRetry) => {
            bonus += CATEGORY_BONUS;
        }
        _ => {}
    }

    match context.tier {
        1 if matches!(strategy, EscalateToHuman | FallbackStrategy) => bonus += TIER_BONUS,
        3 if matches!(strategy, EscalateToParent | FallbackModel) => bonus += TIER_BONUS,
        _ => {}
    }

    bonus
}

fn resource_bonus(
    strategy: &RecoveryStrategyConfig,
    context: &ErrorContext,
    config: &SelectorConfig,
) -> f64 {
    use StrategyType::*;

    let state = &context.resource_state;
    let under_pressure =
        |usage: Option<f64>| usage.map_or(false, |u| u > config.utilization_threshold);
    let mut bonus = 0.0;

    if under_pressure(state.memory_usage)
        && matches!(strategy.strategy_type, ReduceScope | GracefulDegradation)
    {
        bonus += PRESSURE_BONUS;
    }

    if under_pressure(state.cpu_usage)
        && matches!(strategy.strategy_type, LogWarning | EscalateToParent)
    {
        bonus += PRESSURE_BONUS;
    }

    if strategy.total_requirements() < config.cheap_requirement_threshold {
        bonus += config.cheap_requirement_bonus;
    }

    bonus
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::classification::Recoverability;
    use crate::recovery::strategy::BackoffStrategyConfig;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn strategy(strategy_type: StrategyType, rate: f64) -> RecoveryStrategyConfig {
        RecoveryStrategyConfig::new(strategy_type, BackoffStrategyConfig::fixed(0))
            .with_success_rate(rate)
            // Keep the cheap-requirement bonus out of the arithmetic
            .with_requirement("slots", 1.0)
    }

    fn learned(strategy: StrategyType, success_rate: f64) -> StrategyEffectiveness {
        StrategyEffectiveness {
            strategy,
            success_rate,
            average_duration: 0.0,
            resource_cost: 0.0,
            attempts: 10,
            last_used: Utc::now(),
            context_factors: BTreeSet::new(),
        }
    }

    fn logic_warning() -> ErrorClassification {
        ErrorClassification::new(Severity::Warning, ErrorCategory::Logic, Recoverability::Partial)
    }

    fn approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "expected {} got {}", b, a);
    }

    #[test]
    fn test_base_score_is_estimated_rate() {
        let config = SelectorConfig::default();
        let s = strategy(StrategyType::RetryModified, 0.4);
        approx(score(&s, &logic_warning(), &ErrorContext::new(2, "c"), None, &config), 0.4);
    }

    #[test]
    fn test_learned_blend() {
        let config = SelectorConfig::default();
        let s = strategy(StrategyType::RetryModified, 0.4);
        let ctx = ErrorContext::new(2, "c");

        let good = learned(StrategyType::RetryModified, 0.9);
        approx(score(&s, &logic_warning(), &ctx, Some(&good), &config), 0.3 * 0.4 + 0.7 * 0.9);

        // Below 0.5 the blended score is additionally penalised
        let poor = learned(StrategyType::RetryModified, 0.2);
        approx(
            score(&s, &logic_warning(), &ctx, Some(&poor), &config),
            (0.3 * 0.4 + 0.7 * 0.2) * 0.8,
        );
    }

    #[test]
    fn test_context_bonuses_stack() {
        let config = SelectorConfig::default();
        let critical =
            ErrorClassification::new(Severity::Critical, ErrorCategory::Logic, Recoverability::Partial);
        let s = strategy(StrategyType::EscalateToHuman, 0.3);

        approx(score(&s, &critical, &ErrorContext::new(2, "c"), None, &config), 0.5);
        // Tier 1 adds another 0.1 for human escalation
        approx(score(&s, &critical, &ErrorContext::new(1, "c"), None, &config), 0.6);
    }

    #[test]
    fn test_category_bonuses() {
        let config = SelectorConfig::default();
        let ctx = ErrorContext::new(2, "c");
        let transient =
            ErrorClassification::new(Severity::Warning, ErrorCategory::Transient, Recoverability::Automatic);
        let resource =
            ErrorClassification::new(Severity::Warning, ErrorCategory::Resource, Recoverability::Automatic);

        let wait = strategy(StrategyType::WaitAndRetry, 0.5);
        approx(score(&wait, &transient, &ctx, None, &config), 0.65);
        approx(score(&wait, &resource, &ctx, None, &config), 0.65);

        let retry = strategy(StrategyType::RetrySame, 0.5);
        approx(score(&retry, &transient, &ctx, None, &config), 0.65);
        approx(score(&retry, &resource, &ctx, None, &config), 0.5);
    }

    #[test]
    fn test_tier_three_bonus() {
        let config = SelectorConfig::default();
        let s = strategy(StrategyType::FallbackModel, 0.5);
        approx(score(&s, &logic_warning(), &ErrorContext::new(3, "c"), None, &config), 0.6);
    }

    #[test]
    fn test_resource_pressure_bonuses() {
        let config = SelectorConfig::default();
        let ctx = ErrorContext::new(2, "c").with_memory_usage(0.95).with_cpu_usage(0.85);

        let degrade = strategy(StrategyType::GracefulDegradation, 0.5);
        approx(score(&degrade, &logic_warning(), &ctx, None, &config), 0.6);

        let log = strategy(StrategyType::LogWarning, 0.5);
        approx(score(&log, &logic_warning(), &ctx, None, &config), 0.6);

        // Exactly at the threshold is not pressure
        let calm = ErrorContext::new(2, "c").with_memory_usage(0.8);
        approx(score(&degrade, &logic_warning(), &calm, None, &config), 0.5);
    }

    #[test]
    fn test_cheap_strategy_bonus() {
        let config = SelectorConfig::default();
        let cheap = RecoveryStrategyConfig::new(StrategyType::LogInfo, BackoffStrategyConfig::fixed(0))
            .with_success_rate(0.5)
            .with_requirement("cpu", 0.05);
        approx(score(&cheap, &logic_warning(), &ErrorContext::new(2, "c"), None, &config), 0.55);
    }

    #[test]
    fn test_repetition_penalty_and_priority() {
        let config = SelectorConfig::default();
        let s = strategy(StrategyType::RetryModified, 0.6).with_priority(0.5);
        let fresh = ErrorContext::new(2, "c");
        let tried = ErrorContext::new(2, "c").with_previous_strategy(StrategyType::RetryModified);

        approx(score(&s, &logic_warning(), &fresh, None, &config), 0.65);
        approx(score(&s, &logic_warning(), &tried, None, &config), 0.6 * 0.7 + 0.05);
    }

    #[test]
    fn test_score_is_clamped() {
        let config = SelectorConfig::default();
        let high = strategy(StrategyType::EmergencyStop, 1.0).with_priority(50.0);
        let low = strategy(StrategyType::LogInfo, 0.0).with_priority(-50.0);
        let ctx = ErrorContext::new(2, "c");

        assert_eq!(score(&high, &logic_warning(), &ctx, None, &config), 1.0);
        assert_eq!(score(&low, &logic_warning(), &ctx, None, &config), 0.0);
    }

    #[test]
    fn test_best_candidate_prefers_first_on_tie() {
        let scores = vec![
            CandidateScore {
                strategy: StrategyType::RetrySame,
                score: 0.7,
                learned_success_rate: None,
            },
            CandidateScore {
                strategy: StrategyType::WaitAndRetry,
                score: 0.9,
                learned_success_rate: None,
            },
            CandidateScore {
                strategy: StrategyType::ReduceScope,
                score: 0.9,
                learned_success_rate: None,
            },
        ];

        assert_eq!(
            best_candidate(&scores).map(|c| c.strategy),
            Some(StrategyType::WaitAndRetry)
        );
        assert!(best_candidate(&[]).is_none());
    }
}
