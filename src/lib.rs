// Allow uppercase acronyms in the serialized strategy/action names
#![allow(clippy::upper_case_acronyms)]

pub mod config;
pub mod recovery;

// Re-export the selector and its inputs/outputs for convenience
pub use config::SelectorConfig;
pub use recovery::{
    BackoffStrategyConfig, BackoffType, ConditionOperator, EffectivenessStatistics,
    ErrorCategory, ErrorClassification, ErrorContext, FallbackAction, FallbackActionType,
    FieldValue, PerformanceMetrics, Recoverability, RecoveryCondition, RecoveryStrategyConfig,
    RecoveryStrategySelector, ResourceState, SelectionReport, SelectionSource, Severity,
    StrategyDatabase, StrategyEffectiveness, StrategyType,
};

use thiserror::Error;

/// Errors raised inside the selector.
///
/// None of these ever reach callers of `select_strategy` or `record_outcome`;
/// both entry points log and absorb them. They surface from construction,
/// configuration loading and the internal pipeline stages.
#[derive(Error, Debug)]
pub enum SelectorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] ::config::ConfigError),

    #[error("Effectiveness ledger lock poisoned: {0}")]
    LedgerPoisoned(String),

    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),

    #[error("Invalid outcome report: {0}")]
    InvalidOutcome(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SelectorResult<T> = Result<T, SelectorError>;
