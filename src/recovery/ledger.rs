/// Effectiveness ledger - learned outcome statistics per error shape
///
/// Outcomes are bucketed by context key (severity, category, recoverability,
/// tier, component). Each bucket keeps one running record per strategy, capped
/// at `max_history_size` entries with first-in-first-out eviction.
///
/// Concurrency: the bucket map sits behind an `RwLock` that is only held long
/// enough to find or insert a bucket; each bucket has its own `Mutex` so
/// read-modify-write updates for one key are serialised without blocking
/// other keys. Readers may observe a value that is one update behind.
use super::classification::{ErrorClassification, ErrorContext};
use super::strategy::StrategyType;
use crate::{SelectorError, SelectorResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Separator between context key components
pub const CONTEXT_KEY_DELIMITER: &str = "::";

/// Attempt counts above this are folded into one context factor
const MAX_ATTEMPT_FACTOR: u32 = 5;

/// Learned statistics for one strategy within one context key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyEffectiveness {
    pub strategy: StrategyType,

    /// Observed success rate in [0, 1]
    pub success_rate: f64,

    /// Mean duration of executions, in milliseconds
    pub average_duration: f64,

    pub resource_cost: f64,

    /// Number of recorded outcomes
    pub attempts: u64,

    pub last_used: DateTime<Utc>,

    /// Tags describing the situations this record was learned in
    pub context_factors: BTreeSet<String>,
}

impl StrategyEffectiveness {
    fn new(strategy: StrategyType) -> Self {
        Self {
            strategy,
            success_rate: 0.0,
            average_duration: 0.0,
            resource_cost: 0.0,
            attempts: 0,
            last_used: Utc::now(),
            context_factors: BTreeSet::new(),
        }
    }

    /// Fold one outcome into the running averages
    fn apply(&mut self, outcome: &Outcome) {
        let n = self.attempts as f64;
        let success = if outcome.success { 1.0 } else { 0.0 };

        self.success_rate = ((self.success_rate * n + success) / (n + 1.0)).clamp(0.0, 1.0);
        self.average_duration = (self.average_duration * n + outcome.duration_ms) / (n + 1.0);
        self.resource_cost = (self.resource_cost * n + outcome.resource_cost) / (n + 1.0);
        self.attempts += 1;
        self.last_used = Utc::now();
    }
}

/// One executed strategy's result as reported by the executor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub success: bool,
    pub duration_ms: f64,
    pub resource_cost: f64,
}

/// Ranked entry in the statistics report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyPerformance {
    pub context_key: String,
    pub strategy: StrategyType,
    pub success_rate: f64,
    pub attempts: u64,
}

/// Aggregate view over every bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivenessStatistics {
    /// Number of (context key, strategy) records
    pub strategies_tracked: usize,

    /// Sum of recorded outcomes across all records
    pub total_outcomes: u64,

    /// Attempt-weighted mean success rate
    pub average_success_rate: f64,

    pub best_performing_strategies: Vec<StrategyPerformance>,
}

type Bucket = VecDeque<StrategyEffectiveness>;

/// Bounded, keyed store of learned strategy effectiveness
#[derive(Debug)]
pub struct EffectivenessLedger {
    buckets: RwLock<BTreeMap<String, Arc<Mutex<Bucket>>>>,
    max_history_size: usize,
}

impl EffectivenessLedger {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            buckets: RwLock::new(BTreeMap::new()),
            max_history_size: max_history_size.max(1),
        }
    }

    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    /// Learned record for a strategy under a context key, if any
    pub fn lookup(&self, key: &str, strategy: StrategyType) -> Option<StrategyEffectiveness> {
        let bucket = self.bucket(key)?;
        let entries = bucket.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(context_key = key, "Reading poisoned effectiveness bucket");
            poisoned.into_inner()
        });
        entries.iter().find(|e| e.strategy == strategy).cloned()
    }

    /// Record an outcome and return the updated record
    pub fn record(
        &self,
        key: &str,
        strategy: StrategyType,
        outcome: Outcome,
        context_factors: BTreeSet<String>,
    ) -> SelectorResult<StrategyEffectiveness> {
        let bucket = self.bucket_or_insert(key);
        let mut entries = bucket
            .lock()
            .map_err(|_| SelectorError::LedgerPoisoned(key.to_string()))?;

        let position = match entries.iter().position(|e| e.strategy == strategy) {
            Some(position) => position,
            None => {
                entries.push_back(StrategyEffectiveness::new(strategy));
                entries.len() - 1
            }
        };

        let updated = {
            let entry = &mut entries[position];
            entry.apply(&outcome);
            entry.context_factors.extend(context_factors);
            entry.clone()
        };

        while entries.len() > self.max_history_size {
            if let Some(evicted) = entries.pop_front() {
                tracing::debug!(
                    context_key = key,
                    strategy = %evicted.strategy,
                    attempts = evicted.attempts,
                    "Evicted oldest effectiveness entry"
                );
            }
        }

        Ok(updated)
    }

    /// Number of entries in a bucket (0 if the key is unknown)
    pub fn bucket_len(&self, key: &str) -> usize {
        match self.bucket(key) {
            Some(bucket) => {
                let entries = bucket.lock().unwrap_or_else(PoisonError::into_inner);
                entries.len()
            }
            None => 0,
        }
    }

    /// Context keys with at least one bucket, in sorted order
    pub fn context_keys(&self) -> Vec<String> {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Aggregate statistics across all buckets.
    ///
    /// Top strategies need at least `min_attempts` outcomes; they are ranked
    /// by success rate, then attempt count, then key order.
    pub fn statistics(&self, min_attempts: u64, limit: usize) -> EffectivenessStatistics {
        let snapshot: Vec<(String, Arc<Mutex<Bucket>>)> = self
            .buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();

        let mut strategies_tracked = 0;
        let mut total_outcomes = 0u64;
        let mut weighted_success = 0.0;
        let mut ranked = Vec::new();

        for (key, bucket) in snapshot {
            let entries = bucket.lock().unwrap_or_else(PoisonError::into_inner);
            for entry in entries.iter() {
                strategies_tracked += 1;
                total_outcomes += entry.attempts;
                weighted_success += entry.success_rate * entry.attempts as f64;

                if entry.attempts >= min_attempts {
                    ranked.push(StrategyPerformance {
                        context_key: key.clone(),
                        strategy: entry.strategy,
                        success_rate: entry.success_rate,
                        attempts: entry.attempts,
                    });
                }
            }
        }

        ranked.sort_by(|a, b| {
            b.success_rate
                .total_cmp(&a.success_rate)
                .then_with(|| b.attempts.cmp(&a.attempts))
        });
        ranked.truncate(limit);

        let average_success_rate = if total_outcomes > 0 {
            weighted_success / total_outcomes as f64
        } else {
            0.0
        };

        EffectivenessStatistics {
            strategies_tracked,
            total_outcomes,
            average_success_rate,
            best_performing_strategies: ranked,
        }
    }

    fn bucket(&self, key: &str) -> Option<Arc<Mutex<Bucket>>> {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn bucket_or_insert(&self, key: &str) -> Arc<Mutex<Bucket>> {
        if let Some(bucket) = self.bucket(key) {
            return bucket;
        }
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            buckets
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new()))),
        )
    }
}

/// Key scoping learned effectiveness: severity::category::recoverability::tier::component
pub fn build_context_key(classification: &ErrorClassification, context: &ErrorContext) -> String {
    [
        classification.severity.as_str().to_string(),
        classification.category.as_str().to_string(),
        classification.recoverability.as_str().to_string(),
        context.tier.to_string(),
        context.component.clone(),
    ]
    .join(CONTEXT_KEY_DELIMITER)
}

/// Tags describing the situation an outcome was observed in
pub fn extract_context_factors(
    classification: &ErrorClassification,
    context: &ErrorContext,
) -> BTreeSet<String> {
    let mut factors = BTreeSet::new();
    factors.insert(format!("severity:{}", classification.severity));
    factors.insert(format!("category:{}", classification.category));
    factors.insert(format!("tier:{}", context.tier));
    factors.insert(format!(
        "attempts:{}",
        context.attempt_count.min(MAX_ATTEMPT_FACTOR)
    ));
    if classification.data_risk {
        factors.insert("data_risk".to_string());
    }
    if classification.security_risk {
        factors.insert("security_risk".to_string());
    }
    if classification.multiple_components_affected {
        factors.insert("multi_component".to_string());
    }
    factors
}
