//! Unit-name conventions for groups and slices.
//!
//! ```text
//! app@1.service  base "app", slice "1", extension ".service"
//! app@.service   templated, no slice yet
//! app.mount      base "app", no slice
//! ```

use crate::error::CoreError;
use crate::model::Unit;

/// Placeholder a templated unit name carries until it is expanded.
pub const TEMPLATE_MARKER: &str = "@.";

/// Strips a trailing `.ext` where `ext` is lowercase ASCII letters.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if name[idx + 1..].bytes().all(|b| b.is_ascii_lowercase()) => &name[..idx],
        _ => name,
    }
}

/// Returns the `@...` suffix of a unit name, or `""` when there is none.
pub fn extract_slice_suffix(name: &str) -> Result<&str, CoreError> {
    match name.matches('@').count() {
        0 => Ok(""),
        1 => Ok(name.find('@').map(|idx| &name[idx..]).unwrap_or("")),
        _ => Err(CoreError::InvalidArguments(format!(
            "unit name '{name}' contains more than one '@'"
        ))),
    }
}

/// `app@1.service` gives `"1"`, `app.service` gives `""`.
pub fn slice_id(name: &str) -> Result<String, CoreError> {
    let suffix = strip_extension(extract_slice_suffix(name)?);
    Ok(suffix.strip_prefix('@').unwrap_or(suffix).to_string())
}

/// Everything before the first `@`, or the name without its extension.
pub fn unit_base(name: &str) -> &str {
    match name.find('@') {
        Some(idx) => strip_extension(&name[..idx]),
        None => strip_extension(name),
    }
}

/// The name with its slice ID removed: `app@1.timer` gives `app@.timer`.
/// Names without `@` are returned as they are.
pub fn template_name(name: &str) -> String {
    match name.find('@') {
        Some(idx) => {
            let suffix = &name[idx..];
            let ext = &suffix[strip_extension(suffix).len()..];
            format!("{}@{ext}", &name[..idx])
        }
        None => name.to_string(),
    }
}

pub fn is_templated(name: &str) -> bool {
    name.contains(TEMPLATE_MARKER)
}

/// Splits `group[@slice]` tokens into the shared group and the slice IDs.
///
/// `["web@1", "web@2"]` gives `("web", ["1", "2"])`; `["web"]` gives
/// `("web", [])`. All tokens must name the same group.
pub fn parse_group_args<S: AsRef<str>>(args: &[S]) -> Result<(String, Vec<String>), CoreError> {
    let first = args
        .first()
        .ok_or_else(|| CoreError::InvalidArguments("no group given".to_string()))?;
    let group = first.as_ref().split('@').next().unwrap_or_default().to_string();
    if group.is_empty() {
        return Err(CoreError::InvalidArguments("group name must not be empty".to_string()));
    }

    let mut slice_ids = Vec::new();
    for arg in args {
        let mut split = arg.as_ref().splitn(2, '@');
        let arg_group = split.next().unwrap_or_default();
        if arg_group != group {
            return Err(CoreError::InvalidArguments(format!(
                "mixed groups '{group}' and '{arg_group}'"
            )));
        }
        if let Some(id) = split.next() {
            slice_ids.push(id.to_string());
        }
    }

    Ok((group, slice_ids))
}

/// Replaces the `@.` placeholder of every templated unit with `@<id>.`, once
/// per slice ID. Slice IDs form the outer loop, so the result is ordered
/// slice by slice. Non-templated units are passed through once per slice.
pub fn expand_templated(units: &[Unit], slice_ids: &[String]) -> Vec<Unit> {
    if slice_ids.is_empty() {
        return units.to_vec();
    }

    let mut expanded = Vec::with_capacity(units.len() * slice_ids.len());
    for id in slice_ids {
        for unit in units {
            let name = unit.name.replacen(TEMPLATE_MARKER, &format!("@{id}."), 1);
            expanded.push(Unit {
                name,
                content: unit.content.clone(),
            });
        }
    }
    expanded
}
