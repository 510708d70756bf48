use std::collections::HashSet;

use inago_core::{is_templated, Request, TEMPLATE_MARKER};

use crate::types::{Finding, ValidationCause};

/// A structural check over one request.
pub trait Rule: Send + Sync {
    fn cause(&self) -> ValidationCause;
    fn eval(&self, req: &Request) -> Vec<Finding>;
}

pub struct NoUnitsRule;

impl Rule for NoUnitsRule {
    fn cause(&self) -> ValidationCause {
        ValidationCause::NoUnitsInGroup
    }

    fn eval(&self, req: &Request) -> Vec<Finding> {
        if req.units.is_empty() {
            return vec![Finding::new(
                self.cause(),
                format!("group '{}' has no units", req.group),
            )];
        }
        vec![]
    }
}

pub struct AtInGroupNameRule;

impl Rule for AtInGroupNameRule {
    fn cause(&self) -> ValidationCause {
        ValidationCause::AtInGroupName
    }

    fn eval(&self, req: &Request) -> Vec<Finding> {
        if req.group.contains('@') {
            return vec![Finding::new(
                self.cause(),
                format!("group '{}' contains '@'", req.group),
            )];
        }
        vec![]
    }
}

/// Unit names start with `<group>-` or `<group>.`.
pub struct UnitPrefixRule;

impl Rule for UnitPrefixRule {
    fn cause(&self) -> ValidationCause {
        ValidationCause::BadUnitPrefix
    }

    fn eval(&self, req: &Request) -> Vec<Finding> {
        let dash = format!("{}-", req.group);
        let dot = format!("{}.", req.group);
        let bad: Vec<&str> = req
            .units
            .iter()
            .map(|u| u.name.as_str())
            .filter(|n| !n.starts_with(&dash) && !n.starts_with(&dot))
            .collect();
        if bad.is_empty() {
            return vec![];
        }
        vec![Finding::new(
            self.cause(),
            format!("not prefixed by group '{}': {}", req.group, bad.join(", ")),
        )]
    }
}

/// All units templated or none. A name with `@` but without `@.` is a broken
/// template and counts as mixing.
pub struct SliceInstanceRule;

impl Rule for SliceInstanceRule {
    fn cause(&self) -> ValidationCause {
        ValidationCause::MixedSliceInstance
    }

    fn eval(&self, req: &Request) -> Vec<Finding> {
        let mut findings = vec![];
        let templated = req.units.iter().filter(|u| is_templated(&u.name)).count();
        if templated > 0 && templated < req.units.len() {
            findings.push(Finding::new(
                self.cause(),
                format!(
                    "{templated} of {} units are templated",
                    req.units.len()
                ),
            ));
        }
        for u in &req.units {
            if u.name.contains('@') && !u.name.contains(TEMPLATE_MARKER) {
                findings.push(Finding::new(
                    self.cause(),
                    format!("'{}' has '@' but no '{TEMPLATE_MARKER}'", u.name),
                ));
            }
        }
        findings
    }
}

pub struct SingleAtRule;

impl Rule for SingleAtRule {
    fn cause(&self) -> ValidationCause {
        ValidationCause::MultipleAtInUnitName
    }

    fn eval(&self, req: &Request) -> Vec<Finding> {
        req.units
            .iter()
            .filter(|u| u.name.matches('@').count() > 1)
            .map(|u| Finding::new(self.cause(), format!("'{}' has more than one '@'", u.name)))
            .collect()
    }
}

pub struct UniqueUnitNamesRule;

impl Rule for UniqueUnitNamesRule {
    fn cause(&self) -> ValidationCause {
        ValidationCause::UnitsSameName
    }

    fn eval(&self, req: &Request) -> Vec<Finding> {
        let mut seen = HashSet::new();
        let mut dups: Vec<&str> = vec![];
        for u in &req.units {
            if !seen.insert(u.name.as_str()) && !dups.contains(&u.name.as_str()) {
                dups.push(&u.name);
            }
        }
        if dups.is_empty() {
            return vec![];
        }
        vec![Finding::new(
            self.cause(),
            format!("duplicate unit names: {}", dups.join(", ")),
        )]
    }
}

/// Templated submits need exactly one of desired slices or explicit slice
/// IDs. Singleton submits must not carry slice IDs.
pub struct SubmitSlicesRule;

impl Rule for SubmitSlicesRule {
    fn cause(&self) -> ValidationCause {
        ValidationCause::InvalidSubmitRequestSlicesGiven
    }

    fn eval(&self, req: &Request) -> Vec<Finding> {
        let templated = req.units.iter().any(|u| is_templated(&u.name));
        let has_ids = !req.slice_ids.is_empty();

        if !templated {
            if has_ids {
                return vec![Finding::new(
                    ValidationCause::InvalidSubmitRequestSlicesGiven,
                    "slice IDs given for a group without templated units",
                )];
            }
            return vec![];
        }

        match (req.desired_slices > 0, has_ids) {
            (false, false) => vec![Finding::new(
                ValidationCause::InvalidSubmitRequestNoSliceIds,
                "neither slice IDs nor a desired slice count given",
            )],
            (true, true) => vec![Finding::new(
                ValidationCause::InvalidSubmitRequestSlicesGiven,
                "both slice IDs and a desired slice count given",
            )],
            _ => vec![],
        }
    }
}

pub fn request_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(NoUnitsRule),
        Box::new(AtInGroupNameRule),
        Box::new(UnitPrefixRule),
        Box::new(SliceInstanceRule),
        Box::new(SingleAtRule),
        Box::new(UniqueUnitNamesRule),
    ]
}
