use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::CoreError;
use crate::model::{MachineStatus, UnitState, UnitStatus};
use crate::naming::{slice_id, unit_base};

/// Coarse lifecycle of a unit, a slice or a whole group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
    NotFound,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Stopped => "stopped",
            Status::Starting => "starting",
            Status::Running => "running",
            Status::Stopping => "stopping",
            Status::Failed => "failed",
            Status::NotFound => "not-found",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Systemd states assumed for a unit that has not been placed on a machine.
pub const UNSCHEDULED_ACTIVE: &str = "inactive";
pub const UNSCHEDULED_SUB: &str = "dead";

/// Maps scheduler current/desired state plus systemd active/sub state to a
/// coarse [`Status`]. The first matching row wins.
pub fn aggregate_status(
    current: UnitState,
    _desired: UnitState,
    active: &str,
    sub: &str,
) -> Result<Status, CoreError> {
    if current == UnitState::Inactive {
        return Ok(Status::Stopped);
    }

    let status = match active {
        "inactive" => Status::Stopped,
        "failed" => Status::Failed,
        "activating" => Status::Starting,
        "deactivating" => Status::Stopping,
        "active" | "reloading" => match sub {
            "stop-sigterm" | "stop-post" | "stop" => Status::Stopping,
            "auto-restart" | "launched" | "start-pre" | "start-post" | "start" | "dead" => {
                Status::Starting
            }
            "exited" | "running" => Status::Running,
            _ => return Err(invalid(current, active, sub)),
        },
        _ => return Err(invalid(current, active, sub)),
    };
    Ok(status)
}

fn invalid(current: UnitState, active: &str, sub: &str) -> CoreError {
    CoreError::InvalidUnitStatus(format!(
        "no status for current={current} active={active} sub={sub}"
    ))
}

/// Coarse status of every machine entry of `us`. A unit without machines
/// reports one unscheduled entry.
pub fn machine_statuses(us: &UnitStatus) -> Result<Vec<Status>, CoreError> {
    if us.machines.is_empty() {
        return Ok(vec![aggregate_status(
            us.current,
            us.desired,
            UNSCHEDULED_ACTIVE,
            UNSCHEDULED_SUB,
        )?]);
    }
    us.machines
        .iter()
        .map(|m| aggregate_status(us.current, us.desired, &m.systemd_active, &m.systemd_sub))
        .collect()
}

/// True iff every machine entry of `us` aggregates to `target`.
pub fn unit_has_status(us: &UnitStatus, target: Status) -> Result<bool, CoreError> {
    Ok(machine_statuses(us)?.into_iter().all(|s| s == target))
}

struct UnitHashInfo<'a> {
    base: &'a str,
    hash: &'a str,
}

fn unit_hash_infos(statuses: &[UnitStatus]) -> Vec<UnitHashInfo<'_>> {
    statuses
        .iter()
        .flat_map(|us| {
            let base = unit_base(&us.name);
            us.machines.iter().map(move |m| UnitHashInfo {
                base,
                hash: &m.unit_hash,
            })
        })
        .collect()
}

fn all_hashes_equal(infos: &[UnitHashInfo<'_>]) -> bool {
    infos.iter().all(|a| {
        infos
            .iter()
            .filter(|b| b.base == a.base)
            .all(|b| b.hash == a.hash)
    })
}

fn all_states_equal(statuses: &[&UnitStatus]) -> bool {
    let Some(first) = statuses.first() else {
        return true;
    };
    let active: Option<&str> = statuses
        .iter()
        .flat_map(|us| us.machines.iter())
        .map(|m: &MachineStatus| m.systemd_active.as_str())
        .next();

    statuses.iter().all(|us| {
        us.current == first.current
            && us.desired == first.desired
            && us.machines.iter().all(|m| Some(m.systemd_active.as_str()) == active)
    })
}

/// Folds statuses of one group. Per slice ID, members whose states agree
/// (and whose content hashes agree group-wide per unit base) collapse into
/// one entry named `"*"`; otherwise the members are listed individually.
pub fn group(statuses: &[UnitStatus]) -> Result<Vec<UnitStatus>, CoreError> {
    let hashes_equal = all_hashes_equal(&unit_hash_infos(statuses));

    let mut ids = Vec::with_capacity(statuses.len());
    for us in statuses {
        ids.push(slice_id(&us.name).map_err(|e| CoreError::InvalidUnitStatus(e.to_string()))?);
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for id in &ids {
        if !seen.insert(id.as_str()) {
            continue;
        }
        let members: Vec<&UnitStatus> = statuses
            .iter()
            .zip(&ids)
            .filter(|(_, other)| *other == id)
            .map(|(us, _)| us)
            .collect();

        if hashes_equal && all_states_equal(&members) {
            let mut rep = members[0].clone();
            rep.name = "*".to_string();
            out.push(rep);
        } else {
            out.extend(members.into_iter().cloned());
        }
    }
    Ok(out)
}
