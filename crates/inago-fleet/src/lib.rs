//! Adapter to the fleet cluster scheduler.
//!
//! [`Fleet`] is the capability set the orchestrator consumes. [`FleetClient`]
//! talks to a fleet daemon over its v1 HTTP API, [`MemoryFleet`] keeps
//! everything in process.

pub mod api;
pub mod client;
pub mod endpoint;
pub mod error;
pub mod join;
pub mod memory;

pub use api::*;
pub use client::*;
pub use endpoint::*;
pub use error::*;
pub use join::*;
pub use memory::*;

use async_trait::async_trait;
use inago_core::{hash_content, UnitStatus};

/// Predicate over unit names.
pub type UnitMatcher<'a> = dyn Fn(&str) -> bool + Send + Sync + 'a;

#[async_trait]
pub trait Fleet: Send + Sync {
    /// Creates the unit in state `loaded`. Re-submitting an existing unit is
    /// not an error.
    async fn submit(&self, name: &str, content: &str) -> Result<(), FleetError>;
    /// Sets the desired state to `launched`.
    async fn start(&self, name: &str) -> Result<(), FleetError>;
    /// Sets the desired state to `loaded`.
    async fn stop(&self, name: &str) -> Result<(), FleetError>;
    async fn destroy(&self, name: &str) -> Result<(), FleetError>;

    async fn list_units(&self) -> Result<Vec<ApiUnit>, FleetError>;
    async fn list_unit_states(&self) -> Result<Vec<ApiUnitState>, FleetError>;
    async fn list_machines(&self) -> Result<Vec<ApiMachine>, FleetError>;

    /// Joins units, unit states and machines for every unit whose name
    /// satisfies `matcher`. Fails with [`FleetError::UnitNotFound`] when
    /// nothing matches.
    async fn get_status_matching(
        &self,
        matcher: &UnitMatcher<'_>,
    ) -> Result<Vec<UnitStatus>, FleetError> {
        let units: Vec<ApiUnit> = self
            .list_units()
            .await?
            .into_iter()
            .filter(|u| matcher(&u.name))
            .collect();
        if units.is_empty() {
            return Err(FleetError::UnitNotFound("no unit matches".to_string()));
        }

        let states: Vec<ApiUnitState> = self
            .list_unit_states()
            .await?
            .into_iter()
            .filter(|s| matcher(&s.name))
            .collect();
        let machines = if states.is_empty() {
            vec![]
        } else {
            self.list_machines().await?
        };

        build_unit_statuses(&units, &states, &machines)
    }

    async fn get_status(&self, name: &str) -> Result<UnitStatus, FleetError> {
        let mut found = self.get_status_matching(&|n: &str| n == name).await?;
        if found.len() != 1 {
            return Err(FleetError::InvalidUnitStatus(format!(
                "expected one unit named {name}, found {}",
                found.len()
            )));
        }
        Ok(found.remove(0))
    }

    fn hash_of(&self, content: &str) -> Result<String, FleetError> {
        hash_content(content).map_err(FleetError::UnitFile)
    }
}
