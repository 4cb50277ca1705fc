#![allow(dead_code)]

/// Common test utilities shared by the integration tests
///
/// This module provides:
/// - Classification and context fixtures for typical failures
/// - Assertion helpers for selected strategies and reports

pub mod assertions;
pub mod fixtures;
