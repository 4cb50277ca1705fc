/// Applicability conditions and the evaluator that checks them
///
/// Conditions address classification/context fields by name through a fixed
/// accessor table. Dotted paths are split once: `classification.<field>`
/// reads the classification, any other `<group>.<field>` reads the context
/// (`resourceState.*`, `performanceMetrics.*`, `extensions.*`, `context.*`).
/// A condition that cannot be resolved or whose operand types do not fit the
/// operator evaluates to `false`; evaluation never fails.
use super::classification::{ErrorClassification, ErrorContext};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

/// Compiled REGEX_MATCH patterns, including the ones that failed to compile
static PATTERNS: OnceLock<RwLock<HashMap<String, Result<Regex, regex::Error>>>> = OnceLock::new();

/// Dynamically typed value a condition compares against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<FieldValue>),
    Null,
}

impl FieldValue {
    fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Number(f64::from(value))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(values: Vec<T>) -> Self {
        FieldValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    In,
    NotIn,
    RegexMatch,

    /// Any operator name this build does not know; always evaluates to false
    #[serde(other)]
    Unknown,
}

/// Applicability condition attached to a strategy or fallback action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryCondition {
    /// Field name or dotted path
    pub field: String,

    pub operator: ConditionOperator,

    pub value: FieldValue,

    /// Stored for forward compatibility; not consumed by scoring
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl RecoveryCondition {
    pub fn new(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<FieldValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            weight: default_weight(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Evaluate this condition against a classification and context
    pub fn evaluate(&self, classification: &ErrorClassification, context: &ErrorContext) -> bool {
        evaluate(self, classification, context)
    }
}

/// Evaluate a single condition
pub fn evaluate(
    condition: &RecoveryCondition,
    classification: &ErrorClassification,
    context: &ErrorContext,
) -> bool {
    let actual = resolve_field(&condition.field, classification, context);
    let expected = &condition.value;

    match condition.operator {
        ConditionOperator::Equals => actual.map_or(false, |value| value == *expected),
        ConditionOperator::NotEquals => actual.unwrap_or(FieldValue::Null) != *expected,
        ConditionOperator::GreaterThan => compare_numbers(actual.as_ref(), expected, |a, e| a > e),
        ConditionOperator::LessThan => compare_numbers(actual.as_ref(), expected, |a, e| a < e),
        ConditionOperator::Contains => {
            match (actual.as_ref().and_then(FieldValue::as_text), expected.as_text()) {
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => false,
            }
        }
        ConditionOperator::In => match (actual, expected.as_list()) {
            (Some(value), Some(items)) => items.contains(&value),
            _ => false,
        },
        ConditionOperator::NotIn => match expected.as_list() {
            Some(items) => !items.contains(&actual.unwrap_or(FieldValue::Null)),
            None => false,
        },
        ConditionOperator::RegexMatch => {
            match (actual.as_ref().and_then(FieldValue::as_text), expected.as_text()) {
                (Some(text), Some(pattern)) => match regex_is_match(pattern, text) {
                    Ok(matched) => matched,
                    Err(e) => {
                        tracing::debug!(
                            field = %condition.field,
                            pattern = pattern,
                            error = %e,
                            "Invalid pattern in REGEX_MATCH condition"
                        );
                        false
                    }
                },
                _ => false,
            }
        }
        ConditionOperator::Unknown => false,
    }
}

/// Evaluate a conjunction; an empty list is vacuously true
pub fn evaluate_all(
    conditions: &[RecoveryCondition],
    classification: &ErrorClassification,
    context: &ErrorContext,
) -> bool {
    conditions
        .iter()
        .all(|condition| evaluate(condition, classification, context))
}

/// Match against a pattern compiled at most once per process
fn regex_is_match(pattern: &str, text: &str) -> Result<bool, regex::Error> {
    let patterns = PATTERNS.get_or_init(|| RwLock::new(HashMap::new()));

    if let Ok(cache) = patterns.read() {
        if let Some(compiled) = cache.get(pattern) {
            return compiled.as_ref().map(|re| re.is_match(text)).map_err(Clone::clone);
        }
    }

    let compiled = Regex::new(pattern);
    let result = compiled.as_ref().map(|re| re.is_match(text)).map_err(Clone::clone);
    if let Ok(mut cache) = patterns.write() {
        cache.entry(pattern.to_string()).or_insert(compiled);
    }
    result
}

fn compare_numbers(
    actual: Option<&FieldValue>,
    expected: &FieldValue,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool {
    match (actual.and_then(FieldValue::as_number), expected.as_number()) {
        (Some(a), Some(e)) => cmp(a, e),
        _ => false,
    }
}

/// Resolve a field name or dotted path to a value
pub fn resolve_field(
    field: &str,
    classification: &ErrorClassification,
    context: &ErrorContext,
) -> Option<FieldValue> {
    if let Some(value) = classification_field(field, classification) {
        return Some(value);
    }
    if let Some(value) = context_field(field, context) {
        return Some(value);
    }

    let (head, tail) = field.split_once('.')?;
    match head {
        "classification" => classification_field(tail, classification),
        "context" => context_field(tail, context),
        _ => nested_context_field(head, tail, context),
    }
}

fn classification_field(name: &str, classification: &ErrorClassification) -> Option<FieldValue> {
    let value = match name {
        "severity" => FieldValue::from(classification.severity.as_str()),
        "category" => FieldValue::from(classification.category.as_str()),
        "recoverability" => FieldValue::from(classification.recoverability.as_str()),
        "securityRisk" | "security_risk" => FieldValue::Bool(classification.security_risk),
        "dataRisk" | "data_risk" => FieldValue::Bool(classification.data_risk),
        "multipleComponentsAffected" | "multiple_components_affected" => {
            FieldValue::Bool(classification.multiple_components_affected)
        }
        _ => return None,
    };
    Some(value)
}

fn context_field(name: &str, context: &ErrorContext) -> Option<FieldValue> {
    let value = match name {
        "tier" => FieldValue::from(context.tier),
        "component" => FieldValue::from(context.component.as_str()),
        "attemptCount" | "attempt_count" => FieldValue::from(context.attempt_count),
        "previousStrategies" | "previous_strategies" => FieldValue::List(
            context
                .previous_strategies
                .iter()
                .map(|s| FieldValue::from(s.as_str()))
                .collect(),
        ),
        _ => return None,
    };
    Some(value)
}

fn nested_context_field(group: &str, name: &str, context: &ErrorContext) -> Option<FieldValue> {
    match group {
        "resourceState" | "resource_state" => {
            let state = &context.resource_state;
            match name {
                "memoryUsage" | "memory_usage" | "memory" => state.memory_usage,
                "cpuUsage" | "cpu_usage" | "cpu" => state.cpu_usage,
                other => state.available.get(other).copied(),
            }
            .map(FieldValue::Number)
        }
        "performanceMetrics" | "performance_metrics" => {
            let metrics = &context.performance_metrics;
            match name {
                "averageResponseTime" | "average_response_time" => metrics.average_response_time,
                "errorRate" | "error_rate" => metrics.error_rate,
                other => metrics.extra.get(other).copied(),
            }
            .map(FieldValue::Number)
        }
        "extensions" => context.extensions.get(name).cloned(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::classification::{ErrorCategory, Recoverability, Severity};
    use crate::recovery::strategy::StrategyType;

    fn classification() -> ErrorClassification {
        ErrorClassification::new(Severity::Critical, ErrorCategory::Resource, Recoverability::Partial)
            .with_data_risk()
    }

    fn context() -> ErrorContext {
        ErrorContext::new(2, "tool-runner")
            .with_attempts(3)
            .with_previous_strategy(StrategyType::RetrySame)
            .with_memory_usage(0.9)
            .with_resource("workers", 4.0)
            .with_average_response_time(250.0)
            .with_extension("region", "eu-west-1")
    }

    fn check(field: &str, operator: ConditionOperator, value: impl Into<FieldValue>) -> bool {
        RecoveryCondition::new(field, operator, value).evaluate(&classification(), &context())
    }

    #[test]
    fn test_equals_on_classification_and_context() {
        assert!(check("severity", ConditionOperator::Equals, "CRITICAL"));
        assert!(check("dataRisk", ConditionOperator::Equals, true));
        assert!(check("tier", ConditionOperator::Equals, 2u32));
        assert!(check("component", ConditionOperator::Equals, "tool-runner"));
        assert!(!check("severity", ConditionOperator::Equals, "FATAL"));
    }

    #[test]
    fn test_not_equals() {
        assert!(check("category", ConditionOperator::NotEquals, "TRANSIENT"));
        assert!(!check("category", ConditionOperator::NotEquals, "RESOURCE"));
    }

    #[test]
    fn test_numeric_comparisons_require_numbers() {
        assert!(check("attemptCount", ConditionOperator::GreaterThan, 2u32));
        assert!(check("tier", ConditionOperator::LessThan, 3u32));
        assert!(!check("component", ConditionOperator::GreaterThan, 1u32));
        assert!(!check("tier", ConditionOperator::GreaterThan, "1"));
    }

    #[test]
    fn test_contains_requires_text() {
        assert!(check("component", ConditionOperator::Contains, "tool"));
        assert!(!check("component", ConditionOperator::Contains, "planner"));
        assert!(!check("tier", ConditionOperator::Contains, "2"));
    }

    #[test]
    fn test_in_and_not_in_require_list() {
        assert!(check(
            "severity",
            ConditionOperator::In,
            vec!["CRITICAL", "FATAL"]
        ));
        assert!(!check("severity", ConditionOperator::In, vec!["INFO"]));
        assert!(check("severity", ConditionOperator::NotIn, vec!["INFO"]));
        assert!(!check("severity", ConditionOperator::In, "CRITICAL"));
        assert!(!check("severity", ConditionOperator::NotIn, "INFO"));
    }

    #[test]
    fn test_regex_match() {
        assert!(check("component", ConditionOperator::RegexMatch, "^tool-.*$"));
        assert!(!check("component", ConditionOperator::RegexMatch, "^planner"));
        // Invalid pattern resolves to false rather than failing
        assert!(!check("component", ConditionOperator::RegexMatch, "(unclosed"));
        assert!(!check("tier", ConditionOperator::RegexMatch, "2"));
    }

    #[test]
    fn test_dotted_paths() {
        assert!(check(
            "classification.severity",
            ConditionOperator::Equals,
            "CRITICAL"
        ));
        assert!(check(
            "resourceState.memoryUsage",
            ConditionOperator::GreaterThan,
            0.8
        ));
        assert!(check(
            "resourceState.workers",
            ConditionOperator::Equals,
            4.0
        ));
        assert!(check(
            "performanceMetrics.averageResponseTime",
            ConditionOperator::LessThan,
            300.0
        ));
        assert!(check(
            "extensions.region",
            ConditionOperator::Contains,
            "eu-"
        ));
        assert!(check("context.tier", ConditionOperator::Equals, 2u32));
    }

    #[test]
    fn test_unresolvable_field() {
        assert!(!check("nonexistent", ConditionOperator::Equals, "x"));
        assert!(!check("nonexistent", ConditionOperator::GreaterThan, 1.0));
        assert!(!check("resourceState.cpuUsage", ConditionOperator::LessThan, 1.0));
        assert!(!check("classification.tier", ConditionOperator::Equals, 2u32));
        assert!(check("nonexistent", ConditionOperator::NotEquals, "x"));
    }

    #[test]
    fn test_unresolvable_field_never_equals_null() {
        assert!(!check("nonexistent", ConditionOperator::Equals, FieldValue::Null));
        assert!(!check(
            "extensions.missing",
            ConditionOperator::In,
            FieldValue::List(vec![FieldValue::Null])
        ));
        assert!(!check("nonexistent", ConditionOperator::NotEquals, FieldValue::Null));
    }

    #[test]
    fn test_regex_pattern_compiled_once() {
        let pattern = "^api-(gateway|edge)$";
        assert!(regex_is_match(pattern, "api-gateway").unwrap());
        assert!(!regex_is_match(pattern, "api-worker").unwrap());

        let cache = PATTERNS.get().unwrap().read().unwrap();
        assert!(cache.get(pattern).unwrap().is_ok());
        drop(cache);

        assert!(regex_is_match("([unclosed", "x").is_err());
        assert!(PATTERNS.get().unwrap().read().unwrap().get("([unclosed").unwrap().is_err());
    }

    #[test]
    fn test_previous_strategies_list() {
        let value = resolve_field("previousStrategies", &classification(), &context());
        assert_eq!(value, Some(FieldValue::List(vec![FieldValue::from("RETRY_SAME")])));
    }

    #[test]
    fn test_unknown_operator_deserializes_and_is_false() {
        let json = r#"{"field": "severity", "operator": "STARTS_WITH", "value": "CRIT"}"#;
        let condition: RecoveryCondition = serde_json::from_str(json).unwrap();

        assert_eq!(condition.operator, ConditionOperator::Unknown);
        assert_eq!(condition.weight, 1.0);
        assert!(!condition.evaluate(&classification(), &context()));
    }

    #[test]
    fn test_evaluate_all_is_conjunction() {
        let conditions = vec![
            RecoveryCondition::new("severity", ConditionOperator::Equals, "CRITICAL"),
            RecoveryCondition::new("tier", ConditionOperator::Equals, 2u32),
        ];
        assert!(evaluate_all(&conditions, &classification(), &context()));
        assert!(evaluate_all(&[], &classification(), &context()));

        let failing = vec![
            RecoveryCondition::new("severity", ConditionOperator::Equals, "CRITICAL"),
            RecoveryCondition::new("tier", ConditionOperator::Equals, 1u32),
        ];
        assert!(!evaluate_all(&failing, &classification(), &context()));
    }
}
