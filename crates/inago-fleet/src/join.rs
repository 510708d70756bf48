use inago_core::{slice_id, MachineStatus, UnitState, UnitStatus};

use crate::api::{unit_file_from_options, ApiMachine, ApiUnit, ApiUnitState};
use crate::error::FleetError;

/// Fleet reports an empty current state for units it has not acted on yet.
fn parse_state(unit: &str, raw: &str) -> Result<UnitState, FleetError> {
    if raw.is_empty() {
        return Ok(UnitState::Inactive);
    }
    raw.parse()
        .map_err(|_| FleetError::InvalidUnitStatus(format!("{unit}: unknown state '{raw}'")))
}

/// Joins the three fleet listings into one [`UnitStatus`] per unit, in the
/// order of `units`. Unit states are attached by unit name and resolved to a
/// machine IP through `machines`.
pub fn build_unit_statuses(
    units: &[ApiUnit],
    states: &[ApiUnitState],
    machines: &[ApiMachine],
) -> Result<Vec<UnitStatus>, FleetError> {
    let mut out = Vec::with_capacity(units.len());

    for unit in units {
        let slice = slice_id(&unit.name)
            .map_err(|e| FleetError::InvalidUnitStatus(e.to_string()))?;
        let desired = parse_state(&unit.name, &unit.desired_state)?;
        let mut current = parse_state(&unit.name, &unit.current_state)?;

        // Global units may report a transient inactive current state.
        if unit_file_from_options(&unit.options).is_global() {
            current = desired;
        }

        let mut machine_statuses = Vec::new();
        for state in states.iter().filter(|s| s.name == unit.name) {
            let ip = machines
                .iter()
                .find(|m| m.id == state.machine_id)
                .map(|m| m.primary_ip.clone())
                .ok_or_else(|| FleetError::IpNotFound(state.machine_id.clone()))?;
            machine_statuses.push(MachineStatus {
                id: state.machine_id.clone(),
                ip,
                systemd_active: state.systemd_active_state.clone(),
                systemd_sub: state.systemd_sub_state.clone(),
                unit_hash: state.hash.clone(),
            });
        }

        out.push(UnitStatus {
            name: unit.name.clone(),
            slice_id: slice,
            current,
            desired,
            machines: machine_statuses,
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiUnitOption;

    fn unit(name: &str, desired: &str, current: &str) -> ApiUnit {
        ApiUnit {
            name: name.to_string(),
            options: vec![],
            desired_state: desired.to_string(),
            current_state: current.to_string(),
            machine_id: String::new(),
        }
    }

    fn state(name: &str, machine: &str) -> ApiUnitState {
        ApiUnitState {
            name: name.to_string(),
            hash: "abc".to_string(),
            machine_id: machine.to_string(),
            systemd_load_state: "loaded".to_string(),
            systemd_active_state: "active".to_string(),
            systemd_sub_state: "running".to_string(),
        }
    }

    fn machine(id: &str, ip: &str) -> ApiMachine {
        ApiMachine {
            id: id.to_string(),
            primary_ip: ip.to_string(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn joins_units_states_and_machines() {
        let units = [unit("web@1.service", "launched", "launched"), unit("web@2.service", "loaded", "")];
        let states = [state("web@1.service", "m1")];
        let machines = [machine("m1", "10.0.0.1")];

        let out = build_unit_statuses(&units, &states, &machines).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].slice_id, "1");
        assert_eq!(out[0].machines[0].ip, "10.0.0.1");
        assert_eq!(out[0].machines[0].unit_hash, "abc");
        assert_eq!(out[1].current, UnitState::Inactive);
        assert!(out[1].machines.is_empty());
    }

    #[test]
    fn global_unit_takes_desired_state() {
        let mut u = unit("log.service", "launched", "inactive");
        u.options.push(ApiUnitOption {
            section: "X-Fleet".to_string(),
            name: "Global".to_string(),
            value: "true".to_string(),
        });
        let states = [state("log.service", "m1"), state("log.service", "m2")];
        let machines = [machine("m1", "10.0.0.1"), machine("m2", "10.0.0.2")];

        let out = build_unit_statuses(&[u], &states, &machines).unwrap();
        assert_eq!(out[0].current, UnitState::Launched);
        assert_eq!(out[0].machines.len(), 2);
    }

    #[test]
    fn unknown_machine_is_ip_not_found() {
        let units = [unit("web.service", "launched", "launched")];
        let states = [state("web.service", "gone")];
        let err = build_unit_statuses(&units, &states, &[]).unwrap_err();
        assert!(matches!(err, FleetError::IpNotFound(id) if id == "gone"));
    }

    #[test]
    fn bad_state_is_invalid_unit_status() {
        let units = [unit("web.service", "exploded", "launched")];
        let err = build_unit_statuses(&units, &[], &[]).unwrap_err();
        assert!(err.is_invalid_unit_status());
    }
}
