/// Recovery strategy selector - picks and tailors a recovery strategy
///
/// This module provides the entry point used by the task executor:
/// - Filters the catalog down to applicable candidates
/// - Scores candidates, blending in learned effectiveness for this error shape
/// - Adapts the winner to the concrete error context
/// - Falls back to a conservative policy when nothing applies or selection fails
/// - Records execution outcomes so later selections can learn from them
use super::adapter::{adapt, adapt_conservatively};
use super::catalog::StrategyDatabase;
use super::classification::{ErrorClassification, ErrorContext};
use super::fallback::fallback_strategy;
use super::filter::{candidates, CandidatePass};
use super::ledger::{
    build_context_key, extract_context_factors, EffectivenessLedger, EffectivenessStatistics,
    Outcome, StrategyEffectiveness,
};
use super::scoring::{best_candidate, score, CandidateScore};
use super::strategy::{RecoveryStrategyConfig, StrategyType};
use crate::config::SelectorConfig;
use crate::{SelectorError, SelectorResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// How the selected strategy was arrived at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionSource {
    /// Best-scoring directly applicable candidate
    Direct,

    /// Best-scoring candidate from the relaxed compatibility pass
    Broad,

    /// No candidates at all; fallback policy used
    FallbackPolicy,

    /// Selection failed internally; fallback policy used
    ErrorFallback,
}

/// Diagnostic record of a single selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionReport {
    pub selection_id: Uuid,
    pub context_key: String,
    pub source: SelectionSource,

    /// Every scored candidate, in catalog order
    pub candidates: Vec<CandidateScore>,

    pub selected: StrategyType,

    /// Score of the selected strategy; absent when the fallback policy decided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    pub selected_at: DateTime<Utc>,
    pub elapsed_us: u64,
}

impl SelectionReport {
    pub fn used_fallback(&self) -> bool {
        matches!(
            self.source,
            SelectionSource::FallbackPolicy | SelectionSource::ErrorFallback
        )
    }
}

struct Selection {
    strategy: RecoveryStrategyConfig,
    source: SelectionSource,
    candidates: Vec<CandidateScore>,
    score: Option<f64>,
}

/// Selects recovery strategies and learns from their outcomes.
///
/// Safe to share between threads; selection takes `&self` and never blocks
/// on anything but short ledger locks.
#[derive(Debug)]
pub struct RecoveryStrategySelector {
    /// Immutable strategy catalog
    database: Arc<StrategyDatabase>,

    /// Learned effectiveness per context key
    ledger: EffectivenessLedger,

    config: SelectorConfig,
}

impl RecoveryStrategySelector {
    /// Selector with the built-in catalog and default tuning
    pub fn new() -> Self {
        let config = SelectorConfig::default();
        Self {
            database: Arc::new(StrategyDatabase::builtin()),
            ledger: EffectivenessLedger::new(config.max_history_size),
            config,
        }
    }

    /// Selector with the built-in catalog and custom tuning
    pub fn with_config(config: SelectorConfig) -> SelectorResult<Self> {
        Self::with_database(Arc::new(StrategyDatabase::builtin()), config)
    }

    /// Selector over a caller-supplied catalog
    pub fn with_database(
        database: Arc<StrategyDatabase>,
        config: SelectorConfig,
    ) -> SelectorResult<Self> {
        config.validate()?;

        tracing::debug!(
            strategies = database.len(),
            max_history_size = config.max_history_size,
            "Recovery strategy selector created"
        );

        Ok(Self {
            database,
            ledger: EffectivenessLedger::new(config.max_history_size),
            config,
        })
    }

    pub fn database(&self) -> &Arc<StrategyDatabase> {
        &self.database
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn ledger(&self) -> &EffectivenessLedger {
        &self.ledger
    }

    /// Choose and adapt a strategy for the error. Never fails.
    pub fn select_strategy(
        &self,
        classification: &ErrorClassification,
        context: &ErrorContext,
    ) -> RecoveryStrategyConfig {
        self.select_with_report(classification, context).0
    }

    /// Same as `select_strategy`, plus a report of how the decision was made
    pub fn select_with_report(
        &self,
        classification: &ErrorClassification,
        context: &ErrorContext,
    ) -> (RecoveryStrategyConfig, SelectionReport) {
        let started = Instant::now();
        let context_key = build_context_key(classification, context);

        let selection = match self.try_select(classification, context, &context_key) {
            Ok(selection) => selection,
            Err(error) => {
                tracing::error!(
                    error = %error,
                    context_key = %context_key,
                    "Strategy selection failed, using fallback policy"
                );
                Selection {
                    strategy: self.adapted_fallback(classification, context),
                    source: SelectionSource::ErrorFallback,
                    candidates: Vec::new(),
                    score: None,
                }
            }
        };

        let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

        tracing::info!(
            strategy = %selection.strategy.strategy_type,
            score = ?selection.score,
            candidates = selection.candidates.len(),
            source = ?selection.source,
            duration_us = elapsed_us,
            "Recovery strategy selected"
        );

        let report = SelectionReport {
            selection_id: Uuid::new_v4(),
            context_key,
            source: selection.source,
            candidates: selection.candidates,
            selected: selection.strategy.strategy_type,
            score: selection.score,
            selected_at: Utc::now(),
            elapsed_us,
        };

        (selection.strategy, report)
    }

    fn try_select(
        &self,
        classification: &ErrorClassification,
        context: &ErrorContext,
        context_key: &str,
    ) -> SelectorResult<Selection> {
        let candidate_set = candidates(&self.database, classification, context);

        if candidate_set.is_empty() {
            tracing::warn!(
                classification = %classification,
                component = %context.component,
                tier = context.tier,
                "No applicable recovery strategy, using fallback policy"
            );
            let fallback = fallback_strategy(&self.database, classification);
            return Ok(Selection {
                strategy: adapt(&fallback, classification, context, &self.config)?,
                source: SelectionSource::FallbackPolicy,
                candidates: Vec::new(),
                score: None,
            });
        }

        let scores: Vec<CandidateScore> = candidate_set
            .strategies
            .iter()
            .map(|strategy| {
                let learned = self.ledger.lookup(context_key, strategy.strategy_type);
                let value = score(strategy, classification, context, learned.as_ref(), &self.config);

                tracing::debug!(
                    strategy = %strategy.strategy_type,
                    score = value,
                    learned = ?learned.as_ref().map(|l| l.success_rate),
                    "Scored candidate"
                );

                CandidateScore {
                    strategy: strategy.strategy_type,
                    score: value,
                    learned_success_rate: learned.map(|l| l.success_rate),
                }
            })
            .collect();

        let best = best_candidate(&scores)
            .ok_or_else(|| SelectorError::InvalidStrategy("no scored candidates".to_string()))?;
        let chosen = self.database.get(best.strategy).ok_or_else(|| {
            SelectorError::InvalidStrategy(format!("{} missing from catalog", best.strategy))
        })?;
        let best_score = best.score;

        let source = match candidate_set.pass {
            CandidatePass::Direct => SelectionSource::Direct,
            CandidatePass::Broad => SelectionSource::Broad,
        };

        Ok(Selection {
            strategy: adapt(chosen, classification, context, &self.config)?,
            source,
            candidates: scores,
            score: Some(best_score),
        })
    }

    /// Fallback policy output, adapted when adaptation succeeds.
    ///
    /// Otherwise only the attempt cap and contextual fallbacks are applied.
    fn adapted_fallback(
        &self,
        classification: &ErrorClassification,
        context: &ErrorContext,
    ) -> RecoveryStrategyConfig {
        let fallback = fallback_strategy(&self.database, classification);
        match adapt(&fallback, classification, context, &self.config) {
            Ok(adapted) => adapted,
            Err(error) => {
                tracing::error!(
                    error = %error,
                    strategy = %fallback.strategy_type,
                    "Could not adapt fallback strategy, keeping catalogued backoff"
                );
                adapt_conservatively(&fallback, classification, context, &self.config)
            }
        }
    }

    /// Feed an execution outcome back into the ledger.
    ///
    /// Invalid reports and ledger failures are logged and dropped.
    pub fn record_outcome(
        &self,
        strategy: StrategyType,
        classification: &ErrorClassification,
        context: &ErrorContext,
        success: bool,
        duration_ms: f64,
        resource_cost: f64,
    ) {
        let outcome = Outcome {
            success,
            duration_ms,
            resource_cost,
        };

        if let Err(error) = self.try_record(strategy, classification, context, outcome) {
            tracing::error!(
                error = %error,
                strategy = %strategy,
                "Failed to record strategy outcome"
            );
        }
    }

    fn try_record(
        &self,
        strategy: StrategyType,
        classification: &ErrorClassification,
        context: &ErrorContext,
        outcome: Outcome,
    ) -> SelectorResult<()> {
        validate_measurement("duration", outcome.duration_ms)?;
        validate_measurement("resource cost", outcome.resource_cost)?;

        let context_key = build_context_key(classification, context);
        let factors = extract_context_factors(classification, context);
        let updated = self.ledger.record(&context_key, strategy, outcome, factors)?;

        tracing::debug!(
            context_key = %context_key,
            strategy = %strategy,
            success = outcome.success,
            success_rate = updated.success_rate,
            attempts = updated.attempts,
            "Recorded strategy outcome"
        );

        Ok(())
    }

    /// Aggregate learned effectiveness across all context keys
    pub fn effectiveness_statistics(&self) -> EffectivenessStatistics {
        self.ledger.statistics(
            self.config.top_strategies_min_attempts,
            self.config.top_strategies_limit,
        )
    }

    /// Learned record for one strategy under this error's context key
    pub fn effectiveness_for(
        &self,
        classification: &ErrorClassification,
        context: &ErrorContext,
        strategy: StrategyType,
    ) -> Option<StrategyEffectiveness> {
        self.ledger
            .lookup(&build_context_key(classification, context), strategy)
    }

    /// Number of learned records under a context key
    pub fn bucket_len(&self, context_key: &str) -> usize {
        self.ledger.bucket_len(context_key)
    }
}

impl Default for RecoveryStrategySelector {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_measurement(what: &str, value: f64) -> SelectorResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SelectorError::InvalidOutcome(format!(
            "{} must be a non-negative number, got {}",
            what, value
        )))
    }
}
