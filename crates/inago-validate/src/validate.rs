use inago_core::Request;

use crate::rule::{request_rules, Rule, SubmitSlicesRule};
use crate::types::{Finding, ValidationCause, ValidationError};

/// Runs every structural rule on `req` and reports all failures at once.
pub fn validate_request(req: &Request) -> Result<(), ValidationError> {
    let mut err = ValidationError::default();
    for rule in request_rules() {
        err.extend(rule.eval(req));
    }
    err.into_result()
}

/// [`validate_request`] plus the slice rules that only apply on submit.
pub fn validate_submit_request(req: &Request) -> Result<(), ValidationError> {
    let mut err = ValidationError::default();
    err.extend(SubmitSlicesRule.eval(req));
    for rule in request_rules() {
        err.extend(rule.eval(req));
    }
    err.into_result()
}

/// Rules that only make sense across requests: unique group names and no
/// group name being a prefix of another.
pub fn validate_multiple_requests(reqs: &[Request]) -> Result<(), ValidationError> {
    let mut err = ValidationError::default();
    let mut groups: Vec<&str> = reqs.iter().map(|r| r.group.as_str()).collect();
    groups.sort_unstable();

    for pair in groups.windows(2) {
        if pair[0] == pair[1] {
            err.add(Finding::new(
                ValidationCause::GroupsSameName,
                format!("group '{}' given more than once", pair[0]),
            ));
        }
    }

    // Sorted order puts a prefix right before the names it prefixes.
    groups.dedup();
    for pair in groups.windows(2) {
        if pair[1].starts_with(pair[0]) {
            err.add(Finding::new(
                ValidationCause::GroupsArePrefix,
                format!("group '{}' is a prefix of '{}'", pair[0], pair[1]),
            ));
        }
    }

    err.into_result()
}
