/// Candidate filter - narrows the catalog to strategies worth scoring
///
/// A direct pass keeps strategies whose conditions all hold, whose resource
/// requirements are met and which have not been tried yet for this error
/// (WAIT_AND_RETRY is exempt from the repetition rule). If nothing survives,
/// a broad pass applies relaxed compatibility rules driven by severity and
/// recoverability.
use super::catalog::StrategyDatabase;
use super::classification::{ErrorClassification, ErrorContext, Recoverability, Severity};
use super::condition::evaluate_all;
use super::strategy::{RecoveryStrategyConfig, StrategyType};
use serde::{Deserialize, Serialize};

/// Which filtering pass produced the candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidatePass {
    Direct,
    Broad,
}

/// Candidates in catalog order plus the pass that found them
#[derive(Debug, Clone)]
pub struct CandidateSet<'a> {
    pub strategies: Vec<&'a RecoveryStrategyConfig>,
    pub pass: CandidatePass,
}

impl CandidateSet<'_> {
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }
}

/// Collect candidate strategies for an error
pub fn candidates<'a>(
    database: &'a StrategyDatabase,
    classification: &ErrorClassification,
    context: &ErrorContext,
) -> CandidateSet<'a> {
    let direct: Vec<_> = database
        .iter()
        .filter(|s| is_directly_applicable(s, classification, context))
        .collect();

    if !direct.is_empty() {
        return CandidateSet {
            strategies: direct,
            pass: CandidatePass::Direct,
        };
    }

    let broad: Vec<_> = database
        .iter()
        .filter(|s| is_broadly_compatible(s.strategy_type, classification))
        .collect();

    tracing::debug!(
        classification = %classification,
        compatible = broad.len(),
        "No directly applicable strategy, using broad compatibility"
    );

    CandidateSet {
        strategies: broad,
        pass: CandidatePass::Broad,
    }
}

/// Conditions hold, resources suffice and the strategy is not a repeat
pub fn is_directly_applicable(
    strategy: &RecoveryStrategyConfig,
    classification: &ErrorClassification,
    context: &ErrorContext,
) -> bool {
    if !evaluate_all(&strategy.conditions, classification, context) {
        return false;
    }

    if !requirements_satisfied(strategy, context) {
        return false;
    }

    strategy.strategy_type == StrategyType::WaitAndRetry
        || !context.has_tried(strategy.strategy_type)
}

/// Every requirement is covered by the available amount (missing = 0)
pub fn requirements_satisfied(strategy: &RecoveryStrategyConfig, context: &ErrorContext) -> bool {
    strategy
        .resource_requirements
        .iter()
        .all(|(resource, required)| context.resource_state.availability(resource) >= *required)
}

/// Relaxed rules used when no strategy is directly applicable
pub fn is_broadly_compatible(strategy: StrategyType, classification: &ErrorClassification) -> bool {
    if strategy.is_escalation() {
        return true;
    }
    if classification.severity == Severity::Fatal {
        return strategy.is_terminal_safe();
    }
    if classification.recoverability == Recoverability::None {
        return strategy.is_terminal_safe();
    }
    true
}
