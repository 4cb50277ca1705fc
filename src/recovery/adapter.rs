/// Strategy adapter - tailors a catalog strategy to the error at hand
///
/// The catalog entry is never modified; adaptation works on a clone. Attempts
/// are capped for critical or long-running failures, the timeout stretches to
/// cover observed latency, backoff is tuned for resource pressure and
/// transient failures, and contextual fallback actions are attached.
use super::classification::{ErrorCategory, ErrorClassification, ErrorContext, Severity};
use super::strategy::{BackoffType, FallbackAction, FallbackActionType, RecoveryStrategyConfig};
use crate::config::SelectorConfig;
use crate::SelectorResult;

/// Produce an adapted copy of `strategy` for this error
pub fn adapt(
    strategy: &RecoveryStrategyConfig,
    classification: &ErrorClassification,
    context: &ErrorContext,
    config: &SelectorConfig,
) -> SelectorResult<RecoveryStrategyConfig> {
    let mut adapted = strategy.clone();

    adapt_attempts(&mut adapted, classification, context, config);
    adapt_timeout(&mut adapted, context, config);
    adapt_backoff(&mut adapted, classification, context, config);
    attach_fallbacks(&mut adapted, classification, context, config);

    adapted.validate()?;

    tracing::debug!(
        strategy = %adapted.strategy_type,
        max_attempts = adapted.max_attempts,
        timeout_ms = adapted.timeout_ms,
        backoff = ?adapted.backoff_strategy.backoff_type,
        fallback_actions = adapted.fallback_actions.len(),
        "Adapted strategy"
    );

    Ok(adapted)
}

/// Attempt cap and contextual fallbacks only, for when full adaptation fails.
///
/// Leaves backoff and timeout as catalogued so the result stays valid.
pub fn adapt_conservatively(
    strategy: &RecoveryStrategyConfig,
    classification: &ErrorClassification,
    context: &ErrorContext,
    config: &SelectorConfig,
) -> RecoveryStrategyConfig {
    let mut adapted = strategy.clone();
    adapt_attempts(&mut adapted, classification, context, config);
    attach_fallbacks(&mut adapted, classification, context, config);
    adapted
}

fn adapt_attempts(
    strategy: &mut RecoveryStrategyConfig,
    classification: &ErrorClassification,
    context: &ErrorContext,
    config: &SelectorConfig,
) {
    if classification.severity == Severity::Critical {
        strategy.max_attempts = strategy.max_attempts.min(config.critical_max_attempts);
    } else if context.attempt_count > config.attempt_reduction_threshold {
        strategy.max_attempts = strategy
            .max_attempts
            .saturating_sub(context.attempt_count)
            .max(1);
    }
}

fn adapt_timeout(
    strategy: &mut RecoveryStrategyConfig,
    context: &ErrorContext,
    config: &SelectorConfig,
) {
    let Some(average) = context.performance_metrics.average_response_time else {
        return;
    };
    if !average.is_finite() || average <= 0.0 {
        return;
    }

    let required = (average * config.timeout_response_factor).ceil();
    if required > strategy.timeout_ms as f64 {
        strategy.timeout_ms = scale_ms(required);
    }
}

fn adapt_backoff(
    strategy: &mut RecoveryStrategyConfig,
    classification: &ErrorClassification,
    context: &ErrorContext,
    config: &SelectorConfig,
) {
    let backoff = &mut strategy.backoff_strategy;

    match classification.category {
        ErrorCategory::Resource => {
            backoff.initial_delay_ms =
                scale_ms(backoff.initial_delay_ms as f64 * config.resource_initial_delay_factor);
            backoff.max_delay_ms =
                scale_ms(backoff.max_delay_ms as f64 * config.resource_max_delay_factor);
        }
        ErrorCategory::Transient => {
            backoff.backoff_type = BackoffType::ExponentialJitter;
            backoff.jitter_percent = config.transient_jitter_percent;
        }
        _ => return,
    }

    if context.attempt_count > 1 {
        backoff.adaptive_adjustment = true;
        backoff.multiplier = (backoff.multiplier * config.multiplier_growth).min(config.multiplier_cap);
    }
}

fn attach_fallbacks(
    strategy: &mut RecoveryStrategyConfig,
    classification: &ErrorClassification,
    context: &ErrorContext,
    config: &SelectorConfig,
) {
    if classification.security_risk && !strategy.has_fallback(FallbackActionType::ManualIntervention) {
        strategy.fallback_actions.push(FallbackAction::manual_intervention());
    }

    if classification.data_risk && !strategy.has_fallback(FallbackActionType::UseCachedResult) {
        strategy.fallback_actions.push(FallbackAction::use_cached_result(
            config.cached_result_max_age_ms,
            config.cached_result_stale_threshold,
        ));
    }

    if context.tier == 3 && !strategy.has_fallback(FallbackActionType::AlternateTool) {
        strategy
            .fallback_actions
            .push(FallbackAction::alternate_tool(&config.preferred_tools));
    }
}

/// Round a millisecond value to u64, saturating at the type bounds
fn scale_ms(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        0
    } else if value >= u64::MAX as f64 {
        u64::MAX
    } else {
        value.round() as u64
    }
}
