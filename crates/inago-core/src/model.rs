use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A unit file as handed to the scheduler: its file name and raw content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    pub content: String,
}

impl Unit {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Scheduler-level lifecycle of a unit. Used for both the current and the
/// desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    Inactive,
    Loaded,
    Launched,
}

impl UnitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitState::Inactive => "inactive",
            UnitState::Loaded => "loaded",
            UnitState::Launched => "launched",
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(UnitState::Inactive),
            "loaded" => Ok(UnitState::Loaded),
            "launched" => Ok(UnitState::Launched),
            other => Err(CoreError::InvalidUnitStatus(format!(
                "unknown unit state '{other}'"
            ))),
        }
    }
}

/// Runtime state of one unit on one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineStatus {
    pub id: String,
    pub ip: String,
    pub systemd_active: String,
    pub systemd_sub: String,
    pub unit_hash: String,
}

/// Scheduler view of one unit. Recomputed on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStatus {
    pub name: String,
    pub slice_id: String,
    pub current: UnitState,
    pub desired: UnitState,
    /// One entry for a regular unit, one per machine for a global unit.
    pub machines: Vec<MachineStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_state_parses_and_displays() {
        for s in ["inactive", "loaded", "launched"] {
            let state: UnitState = s.parse().unwrap();
            assert_eq!(state.to_string(), s);
        }
        let err = "running".parse::<UnitState>().unwrap_err();
        assert!(err.is_invalid_unit_status());
    }

    #[test]
    fn unit_state_serde_lowercase() {
        let json = serde_json::to_string(&UnitState::Launched).unwrap();
        assert_eq!(json, "\"launched\"");
    }
}
