/// Assertion helpers for selected strategies and selection reports

use anyhow::Result;
use recovery_selector::{FallbackActionType, RecoveryStrategyConfig, SelectionReport};

/// Assert the strategy is internally consistent and executable
pub fn assert_strategy_executable(strategy: &RecoveryStrategyConfig) -> Result<()> {
    strategy.validate()?;

    anyhow::ensure!(
        strategy.max_attempts >= 1,
        "{} allows no attempts",
        strategy.strategy_type
    );
    anyhow::ensure!(
        strategy.backoff_strategy.initial_delay_ms <= strategy.backoff_strategy.max_delay_ms,
        "{} backoff starts above its cap",
        strategy.strategy_type
    );

    Ok(())
}

/// Assert a fallback action of the given type is attached
pub fn assert_has_fallback(
    strategy: &RecoveryStrategyConfig,
    action_type: FallbackActionType,
) -> Result<()> {
    anyhow::ensure!(
        strategy.has_fallback(action_type),
        "{} is missing fallback action {:?} (has {:?})",
        strategy.strategy_type,
        action_type,
        strategy
            .fallback_actions
            .iter()
            .map(|a| a.action_type)
            .collect::<Vec<_>>()
    );
    Ok(())
}

/// Assert every reported score is within [0, 1] and the winner is the maximum
pub fn assert_report_consistent(report: &SelectionReport) -> Result<()> {
    for candidate in &report.candidates {
        anyhow::ensure!(
            (0.0..=1.0).contains(&candidate.score),
            "{} scored {} outside [0, 1]",
            candidate.strategy,
            candidate.score
        );
    }

    if let Some(score) = report.score {
        let max = report
            .candidates
            .iter()
            .map(|c| c.score)
            .fold(f64::MIN, f64::max);
        anyhow::ensure!(
            score == max,
            "selected score {} is not the maximum {}",
            score,
            max
        );
    }

    Ok(())
}
