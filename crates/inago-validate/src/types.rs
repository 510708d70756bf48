use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identity of a single validation failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationCause {
    NoUnitsInGroup,
    AtInGroupName,
    BadUnitPrefix,
    MixedSliceInstance,
    MultipleAtInUnitName,
    UnitsSameName,
    GroupsSameName,
    GroupsArePrefix,
    InvalidSubmitRequestNoSliceIds,
    InvalidSubmitRequestSlicesGiven,
}

impl ValidationCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCause::NoUnitsInGroup => "no-units-in-group",
            ValidationCause::AtInGroupName => "at-in-group-name",
            ValidationCause::BadUnitPrefix => "bad-unit-prefix",
            ValidationCause::MixedSliceInstance => "mixed-slice-instance",
            ValidationCause::MultipleAtInUnitName => "multiple-at-in-unit-name",
            ValidationCause::UnitsSameName => "units-same-name",
            ValidationCause::GroupsSameName => "groups-same-name",
            ValidationCause::GroupsArePrefix => "groups-are-prefix",
            ValidationCause::InvalidSubmitRequestNoSliceIds => "invalid-submit-request-no-slice-ids",
            ValidationCause::InvalidSubmitRequestSlicesGiven => {
                "invalid-submit-request-slices-given"
            }
        }
    }
}

impl fmt::Display for ValidationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub cause: ValidationCause,
    pub message: String,
}

impl Finding {
    pub fn new(cause: ValidationCause, message: impl Into<String>) -> Self {
        Self {
            cause,
            message: message.into(),
        }
    }
}

/// Every finding of one validation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Error)]
#[error("group or unit invalid: {}", render(.findings))]
pub struct ValidationError {
    findings: Vec<Finding>,
}

fn render(findings: &[Finding]) -> String {
    findings
        .iter()
        .map(|f| format!("{} ({})", f.cause, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn add(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        self.findings.extend(findings);
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn contains<F>(&self, pred: F) -> bool
    where
        F: Fn(&ValidationCause) -> bool,
    {
        self.findings.iter().any(|f| pred(&f.cause))
    }

    pub fn has(&self, cause: ValidationCause) -> bool {
        self.contains(|c| *c == cause)
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.findings.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}
