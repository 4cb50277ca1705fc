/// Fixtures for classified errors and their contexts

use recovery_selector::{
    ErrorCategory, ErrorClassification, ErrorContext, Recoverability, Severity,
};

pub const SEVERITIES: [Severity; 4] = [
    Severity::Info,
    Severity::Warning,
    Severity::Critical,
    Severity::Fatal,
];

pub const CATEGORIES: [ErrorCategory; 8] = [
    ErrorCategory::Transient,
    ErrorCategory::Resource,
    ErrorCategory::Logic,
    ErrorCategory::Security,
    ErrorCategory::Network,
    ErrorCategory::Configuration,
    ErrorCategory::Dependency,
    ErrorCategory::Unknown,
];

pub const RECOVERABILITIES: [Recoverability; 3] = [
    Recoverability::None,
    Recoverability::Partial,
    Recoverability::Automatic,
];

pub fn classification(
    severity: Severity,
    category: ErrorCategory,
    recoverability: Recoverability,
) -> ErrorClassification {
    ErrorClassification::new(severity, category, recoverability)
}

/// Memory exhaustion in the planner, the canonical example
pub fn critical_resource() -> ErrorClassification {
    classification(Severity::Critical, ErrorCategory::Resource, Recoverability::Partial)
}

/// Flaky upstream call that usually succeeds on retry
pub fn transient_warning() -> ErrorClassification {
    classification(Severity::Warning, ErrorCategory::Transient, Recoverability::Automatic)
}

pub fn fatal_logic() -> ErrorClassification {
    classification(Severity::Fatal, ErrorCategory::Logic, Recoverability::None)
}

pub fn security_incident() -> ErrorClassification {
    classification(Severity::Warning, ErrorCategory::Security, Recoverability::Partial)
        .with_security_risk()
}

pub fn planner_context() -> ErrorContext {
    ErrorContext::new(2, "planner")
}

pub fn api_context(attempts: u32) -> ErrorContext {
    ErrorContext::new(2, "api-gateway").with_attempts(attempts)
}

/// Every (severity, category, recoverability) combination
pub fn all_classifications() -> Vec<ErrorClassification> {
    let mut all = Vec::new();
    for severity in SEVERITIES {
        for category in CATEGORIES {
            for recoverability in RECOVERABILITIES {
                all.push(classification(severity, category, recoverability));
            }
        }
    }
    all
}
