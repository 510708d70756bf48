use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use inago_core::{UnitFile, UnitState};

use crate::api::{options_from_unit_file, ApiMachine, ApiUnit, ApiUnitOption, ApiUnitState};
use crate::error::FleetError;
use crate::Fleet;

pub const MEMORY_MACHINE_ID: &str = "memory-machine";
pub const MEMORY_MACHINE_IP: &str = "127.0.0.1";

/// A scheduler call as seen by [`MemoryFleet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetCall {
    Submit(String),
    Start(String),
    Stop(String),
    Destroy(String),
}

struct MemoryUnit {
    name: String,
    options: Vec<ApiUnitOption>,
    hash: String,
    state: UnitState,
}

/// Systemd states reported for a unit, one per listing, wrapping around.
struct PinnedStates {
    states: Vec<(String, String)>,
    next: usize,
}

impl PinnedStates {
    fn advance(&mut self) -> (String, String) {
        let state = self.states[self.next % self.states.len()].clone();
        self.next += 1;
        state
    }
}

#[derive(Default)]
struct Inner {
    units: Vec<MemoryUnit>,
    calls: Vec<FleetCall>,
    systemd: HashMap<String, PinnedStates>,
}

/// In-process scheduler with one machine. Submitted units are `loaded`,
/// started units `launched`, and systemd follows immediately unless a state
/// is pinned with [`MemoryFleet::set_systemd_state`].
#[derive(Default)]
pub struct MemoryFleet {
    inner: Mutex<Inner>,
}

impl MemoryFleet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every mutating call so far, in order.
    pub fn calls(&self) -> Vec<FleetCall> {
        self.lock().calls.clone()
    }

    pub fn unit_names(&self) -> Vec<String> {
        self.lock().units.iter().map(|u| u.name.clone()).collect()
    }

    /// Pins the systemd active/sub state reported for `name`.
    pub fn set_systemd_state(&self, name: &str, active: &str, sub: &str) {
        self.cycle_systemd_states(name, &[(active, sub)]);
    }

    /// Reports the given active/sub states for `name` in turn, one per unit
    /// state listing, starting over after the last. An empty list unpins.
    pub fn cycle_systemd_states(&self, name: &str, states: &[(&str, &str)]) {
        let mut inner = self.lock();
        if states.is_empty() {
            inner.systemd.remove(name);
            return;
        }
        let states = states
            .iter()
            .map(|(a, s)| (a.to_string(), s.to_string()))
            .collect();
        inner
            .systemd
            .insert(name.to_string(), PinnedStates { states, next: 0 });
    }

    fn set_state(&self, name: &str, state: UnitState, call: FleetCall) -> Result<(), FleetError> {
        let mut inner = self.lock();
        inner.calls.push(call);
        let unit = inner
            .units
            .iter_mut()
            .find(|u| u.name == name)
            .ok_or_else(|| FleetError::UnitNotFound(name.to_string()))?;
        unit.state = state;
        Ok(())
    }
}

#[async_trait]
impl Fleet for MemoryFleet {
    async fn submit(&self, name: &str, content: &str) -> Result<(), FleetError> {
        let uf = UnitFile::parse(content).map_err(FleetError::UnitFile)?;
        let mut inner = self.lock();
        inner.calls.push(FleetCall::Submit(name.to_string()));
        if inner.units.iter().any(|u| u.name == name) {
            debug!("unit {name} already submitted");
            return Ok(());
        }
        inner.units.push(MemoryUnit {
            name: name.to_string(),
            options: options_from_unit_file(&uf),
            hash: uf.hash(),
            state: UnitState::Loaded,
        });
        Ok(())
    }

    async fn start(&self, name: &str) -> Result<(), FleetError> {
        self.set_state(name, UnitState::Launched, FleetCall::Start(name.to_string()))
    }

    async fn stop(&self, name: &str) -> Result<(), FleetError> {
        self.set_state(name, UnitState::Loaded, FleetCall::Stop(name.to_string()))
    }

    async fn destroy(&self, name: &str) -> Result<(), FleetError> {
        let mut inner = self.lock();
        inner.calls.push(FleetCall::Destroy(name.to_string()));
        let before = inner.units.len();
        inner.units.retain(|u| u.name != name);
        if inner.units.len() == before {
            return Err(FleetError::UnitNotFound(name.to_string()));
        }
        inner.systemd.remove(name);
        Ok(())
    }

    async fn list_units(&self) -> Result<Vec<ApiUnit>, FleetError> {
        Ok(self
            .lock()
            .units
            .iter()
            .map(|u| ApiUnit {
                name: u.name.clone(),
                options: u.options.clone(),
                desired_state: u.state.to_string(),
                current_state: u.state.to_string(),
                machine_id: MEMORY_MACHINE_ID.to_string(),
            })
            .collect())
    }

    async fn list_unit_states(&self) -> Result<Vec<ApiUnitState>, FleetError> {
        let mut inner = self.lock();
        let Inner { units, systemd, .. } = &mut *inner;
        Ok(units
            .iter()
            .map(|u| {
                let (active, sub) = match systemd.get_mut(&u.name) {
                    Some(pinned) => pinned.advance(),
                    None => match u.state {
                        UnitState::Launched => ("active".to_string(), "running".to_string()),
                        _ => ("inactive".to_string(), "dead".to_string()),
                    },
                };
                ApiUnitState {
                    name: u.name.clone(),
                    hash: u.hash.clone(),
                    machine_id: MEMORY_MACHINE_ID.to_string(),
                    systemd_load_state: "loaded".to_string(),
                    systemd_active_state: active,
                    systemd_sub_state: sub,
                }
            })
            .collect())
    }

    async fn list_machines(&self) -> Result<Vec<ApiMachine>, FleetError> {
        Ok(vec![ApiMachine {
            id: MEMORY_MACHINE_ID.to_string(),
            primary_ip: MEMORY_MACHINE_IP.to_string(),
            metadata: Default::default(),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inago_core::{unit_has_status, Status};

    const UNIT: &str = "[Unit]\nDescription=test\n";

    #[tokio::test]
    async fn lifecycle_is_reflected_in_status() {
        let fleet = MemoryFleet::new();
        fleet.submit("web-a.service", UNIT).await.unwrap();

        let us = fleet.get_status("web-a.service").await.unwrap();
        assert_eq!(us.current, UnitState::Loaded);
        assert_eq!(us.machines[0].ip, MEMORY_MACHINE_IP);
        assert!(unit_has_status(&us, Status::Stopped).unwrap());

        fleet.start("web-a.service").await.unwrap();
        let us = fleet.get_status("web-a.service").await.unwrap();
        assert!(unit_has_status(&us, Status::Running).unwrap());

        fleet.stop("web-a.service").await.unwrap();
        fleet.destroy("web-a.service").await.unwrap();
        let err = fleet.get_status("web-a.service").await.unwrap_err();
        assert!(err.is_unit_not_found());

        assert_eq!(
            fleet.calls(),
            vec![
                FleetCall::Submit("web-a.service".into()),
                FleetCall::Start("web-a.service".into()),
                FleetCall::Stop("web-a.service".into()),
                FleetCall::Destroy("web-a.service".into()),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_units_are_not_found() {
        let fleet = MemoryFleet::new();
        assert!(fleet.start("nope.service").await.unwrap_err().is_unit_not_found());
        assert!(fleet.destroy("nope.service").await.unwrap_err().is_unit_not_found());
        let err = fleet.get_status_matching(&|_: &str| true).await.unwrap_err();
        assert!(err.is_unit_not_found());
    }

    #[tokio::test]
    async fn reported_hash_matches_local_hash() {
        let fleet = MemoryFleet::new();
        fleet.submit("web-a.service", UNIT).await.unwrap();
        let us = fleet.get_status("web-a.service").await.unwrap();
        assert_eq!(us.machines[0].unit_hash, fleet.hash_of(UNIT).unwrap());
    }

    #[tokio::test]
    async fn pinned_systemd_state_wins() {
        let fleet = MemoryFleet::new();
        fleet.submit("web-a.service", UNIT).await.unwrap();
        fleet.start("web-a.service").await.unwrap();
        fleet.set_systemd_state("web-a.service", "failed", "failed");
        let us = fleet.get_status("web-a.service").await.unwrap();
        assert!(unit_has_status(&us, Status::Failed).unwrap());
    }

    #[tokio::test]
    async fn cycled_systemd_states_advance_per_listing() {
        let fleet = MemoryFleet::new();
        fleet.submit("web-a.service", UNIT).await.unwrap();
        fleet.start("web-a.service").await.unwrap();
        fleet.cycle_systemd_states(
            "web-a.service",
            &[("active", "running"), ("activating", "start")],
        );

        let mut running = Vec::new();
        for _ in 0..3 {
            let us = fleet.get_status("web-a.service").await.unwrap();
            running.push(unit_has_status(&us, Status::Running).unwrap());
        }
        assert_eq!(running, [true, false, true]);

        fleet.cycle_systemd_states("web-a.service", &[]);
        let us = fleet.get_status("web-a.service").await.unwrap();
        assert!(unit_has_status(&us, Status::Running).unwrap());
    }
}
