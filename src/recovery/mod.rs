/// Recovery strategy selection for a multi-tier task executor
///
/// This module decides how to recover from a classified error:
/// - Condition evaluation against the error classification and context
/// - Candidate filtering over an immutable strategy catalog
/// - Composite scoring that blends catalog estimates with learned success rates
/// - Adaptation of the winning strategy (attempts, timeout, backoff, fallbacks)
/// - A conservative fallback policy for when nothing applies
/// - An effectiveness ledger fed by reported outcomes
///
/// # Architecture
///
/// ```text
/// ┌───────────────────────────────────────────┐
/// │      RecoveryStrategySelector (entry)     │
/// └──────┬──────────────┬──────────────┬──────┘
///        │              │              │
///        ↓              ↓              ↓
/// ┌────────────┐  ┌───────────┐  ┌─────────────┐
/// │  Candidate │  │  Scorer   │  │Effectiveness│
/// │   Filter   │  │           │←─│   Ledger    │
/// └─────┬──────┘  └─────┬─────┘  └─────────────┘
///       │               │              ↑
///       ↓               ↓              │ record_outcome
/// ┌────────────┐  ┌───────────┐        │
/// │ Conditions │  │  Adapter  │   executor
/// └────────────┘  └─────┬─────┘
///                       │ (no candidates / failure)
///                       ↓
///                 ┌───────────┐
///                 │ Fallback  │
///                 │  Policy   │
///                 └───────────┘
/// ```
///
/// # Usage Example
///
/// ```rust
/// use recovery_selector::{
///     ErrorCategory, ErrorClassification, ErrorContext, Recoverability,
///     RecoveryStrategySelector, Severity, StrategyType,
/// };
///
/// let selector = RecoveryStrategySelector::new();
/// let classification = ErrorClassification::new(
///     Severity::Critical,
///     ErrorCategory::Resource,
///     Recoverability::Partial,
/// );
/// let context = ErrorContext::new(2, "planner").with_memory_usage(0.92);
///
/// let strategy = selector.select_strategy(&classification, &context);
/// assert_eq!(strategy.strategy_type, StrategyType::ReduceScope);
///
/// // Report back how it went
/// selector.record_outcome(
///     strategy.strategy_type,
///     &classification,
///     &context,
///     true,
///     1_250.0,
///     0.3,
/// );
/// assert_eq!(selector.effectiveness_statistics().total_outcomes, 1);
/// ```

pub mod adapter;
pub mod catalog;
pub mod classification;
pub mod condition;
pub mod fallback;
pub mod filter;
pub mod ledger;
pub mod scoring;
pub mod strategy;
pub mod strategy_selector;

// Re-export main types for convenience
pub use catalog::StrategyDatabase;
pub use classification::{
    ErrorCategory, ErrorClassification, ErrorContext, PerformanceMetrics, Recoverability,
    ResourceState, Severity,
};
pub use condition::{ConditionOperator, FieldValue, RecoveryCondition};
pub use filter::CandidatePass;
pub use ledger::{
    EffectivenessLedger, EffectivenessStatistics, Outcome, StrategyEffectiveness,
    StrategyPerformance,
};
pub use scoring::CandidateScore;
pub use strategy::{
    BackoffStrategyConfig, BackoffType, FallbackAction, FallbackActionType,
    RecoveryStrategyConfig, StrategyType,
};
pub use strategy_selector::{RecoveryStrategySelector, SelectionReport, SelectionSource};
