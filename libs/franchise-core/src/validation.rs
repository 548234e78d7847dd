//! Form validation
//!
//! Problems are collected per field into a [`ValidationReport`] so a form
//! can show all of them at once. Nothing here talks to the backend.

use crate::error::{FranchiseError, Result};
use crate::models::{Case, NewRemark};
use franchise_common::constants::MAX_REMARK_LENGTH;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-field validation messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn field(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Fields with problems, in name order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// Convert into a single error for callers that cannot show per-field messages
    ///
    /// # Errors
    /// Returns `FranchiseError::Validation` listing every problem
    pub fn into_result(self) -> Result<()> {
        if self.is_valid() {
            return Ok(());
        }
        let message = self
            .errors
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");
        Err(FranchiseError::validation(message))
    }
}

/// Check a remark submission
///
/// Pass the case when it is at hand so the service reference is checked too.
#[must_use]
pub fn validate_new_remark(remark: &NewRemark, case: Option<&Case>) -> ValidationReport {
    let mut report = ValidationReport::new();

    if remark.case_id.trim().is_empty() {
        report.add("caseId", "is required");
    }
    if remark.service_id.trim().is_empty() {
        report.add("serviceId", "is required");
    }

    let text = remark.text.trim();
    if text.is_empty() {
        report.add("text", "cannot be empty");
    } else if text.chars().count() > MAX_REMARK_LENGTH {
        report.add(
            "text",
            format!("must be at most {MAX_REMARK_LENGTH} characters"),
        );
    }

    if let Some(case) = case {
        if case.id != remark.case_id {
            report.add("caseId", "does not match the selected case");
        } else if !remark.service_id.trim().is_empty() && case.service(&remark.service_id).is_none()
        {
            report.add("serviceId", "is not a service of this case");
        }
    }

    report
}
