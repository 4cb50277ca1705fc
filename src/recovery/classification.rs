/// Error classification and execution context consumed by the selector
///
/// Both types are produced by the caller (the upstream classifier and the
/// executor handling the failure) and are treated as immutable inputs for the
/// duration of one selection.
use super::condition::FieldValue;
use super::strategy::StrategyType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How bad the error is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
            Severity::Fatal => "FATAL",
        }
    }

    /// CRITICAL or FATAL
    pub fn is_severe(&self) -> bool {
        matches!(self, Severity::Critical | Severity::Fatal)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad family the error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Glitches expected to clear up on their own (timeouts, busy peers)
    Transient,

    /// Exhaustion of memory, quota, connections and similar
    Resource,

    /// Deterministic defects in the task itself
    Logic,

    /// Authentication, authorization or policy violations
    Security,

    Network,
    Configuration,
    Dependency,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "TRANSIENT",
            ErrorCategory::Resource => "RESOURCE",
            ErrorCategory::Logic => "LOGIC",
            ErrorCategory::Security => "SECURITY",
            ErrorCategory::Network => "NETWORK",
            ErrorCategory::Configuration => "CONFIGURATION",
            ErrorCategory::Dependency => "DEPENDENCY",
            ErrorCategory::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the classifier believes the error can be recovered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recoverability {
    None,
    Partial,
    Automatic,
}

impl Recoverability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recoverability::None => "NONE",
            Recoverability::Partial => "PARTIAL",
            Recoverability::Automatic => "AUTOMATIC",
        }
    }
}

impl fmt::Display for Recoverability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified error as handed over by the upstream classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorClassification {
    pub severity: Severity,
    pub category: ErrorCategory,
    pub recoverability: Recoverability,

    #[serde(default)]
    pub security_risk: bool,

    #[serde(default)]
    pub data_risk: bool,

    #[serde(default)]
    pub multiple_components_affected: bool,
}

impl ErrorClassification {
    /// Create a classification with all risk flags cleared
    pub fn new(severity: Severity, category: ErrorCategory, recoverability: Recoverability) -> Self {
        Self {
            severity,
            category,
            recoverability,
            security_risk: false,
            data_risk: false,
            multiple_components_affected: false,
        }
    }

    pub fn with_security_risk(mut self) -> Self {
        self.security_risk = true;
        self
    }

    pub fn with_data_risk(mut self) -> Self {
        self.data_risk = true;
        self
    }

    pub fn with_multiple_components(mut self) -> Self {
        self.multiple_components_affected = true;
        self
    }
}

impl fmt::Display for ErrorClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} error (recoverability {})",
            self.severity, self.category, self.recoverability
        )
    }
}

/// Resource utilization snapshot at the time of the error
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceState {
    /// Memory utilization in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<f64>,

    /// CPU utilization in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,

    /// Named availability values checked against strategy resource requirements
    #[serde(default)]
    pub available: BTreeMap<String, f64>,
}

impl ResourceState {
    /// Amount of a named resource available; unknown resources count as zero
    pub fn availability(&self, resource: &str) -> f64 {
        self.available.get(resource).copied().unwrap_or(0.0)
    }
}

/// Performance metrics collected by the executor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Average response time of the failing component, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_response_time: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,

    #[serde(default)]
    pub extra: BTreeMap<String, f64>,
}

/// Context information about where the error occurred
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    /// Execution tier (1 = human-facing, larger = deeper/automated)
    pub tier: u32,

    /// Component identifier (e.g., "planner", "tool-runner")
    pub component: String,

    /// Attempts already made for this error instance
    #[serde(default)]
    pub attempt_count: u32,

    /// Strategies already tried for this error instance, oldest first
    #[serde(default)]
    pub previous_strategies: Vec<StrategyType>,

    #[serde(default)]
    pub resource_state: ResourceState,

    #[serde(default)]
    pub performance_metrics: PerformanceMetrics,

    /// Free-form fields reachable from conditions as `extensions.<key>`
    #[serde(default)]
    pub extensions: BTreeMap<String, FieldValue>,
}

impl ErrorContext {
    /// Create a new error context with no history or metrics
    pub fn new(tier: u32, component: impl Into<String>) -> Self {
        Self {
            tier,
            component: component.into(),
            attempt_count: 0,
            previous_strategies: Vec::new(),
            resource_state: ResourceState::default(),
            performance_metrics: PerformanceMetrics::default(),
            extensions: BTreeMap::new(),
        }
    }

    pub fn with_attempts(mut self, attempt_count: u32) -> Self {
        self.attempt_count = attempt_count;
        self
    }

    pub fn with_previous_strategy(mut self, strategy: StrategyType) -> Self {
        self.previous_strategies.push(strategy);
        self
    }

    pub fn with_memory_usage(mut self, usage: f64) -> Self {
        self.resource_state.memory_usage = Some(usage);
        self
    }

    pub fn with_cpu_usage(mut self, usage: f64) -> Self {
        self.resource_state.cpu_usage = Some(usage);
        self
    }

    pub fn with_resource(mut self, name: impl Into<String>, available: f64) -> Self {
        self.resource_state.available.insert(name.into(), available);
        self
    }

    pub fn with_average_response_time(mut self, millis: f64) -> Self {
        self.performance_metrics.average_response_time = Some(millis);
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Check whether a strategy was already tried for this error instance
    pub fn has_tried(&self, strategy: StrategyType) -> bool {
        self.previous_strategies.contains(&strategy)
    }
}
