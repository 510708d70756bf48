use serde::{Deserialize, Serialize};

use crate::model::Unit;
use crate::naming::{expand_templated, is_templated};

/// A group operation's input: which group, which slices and which unit files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub group: String,
    #[serde(default)]
    pub slice_ids: Vec<String>,
    #[serde(default)]
    pub units: Vec<Unit>,
    /// Number of random slice IDs to generate on submit.
    #[serde(default)]
    pub desired_slices: usize,
}

impl Request {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..Default::default()
        }
    }

    pub fn with_slice_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.slice_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_units(mut self, units: Vec<Unit>) -> Self {
        self.units = units;
        self
    }

    pub fn with_desired_slices(mut self, n: usize) -> Self {
        self.desired_slices = n;
        self
    }

    /// True when every unit is templated. A request without units is
    /// trivially templated.
    pub fn has_templated_units(&self) -> bool {
        self.units.iter().all(|u| is_templated(&u.name))
    }

    /// A request the update engine can work on: slice IDs given, none empty.
    pub fn is_sliceable(&self) -> bool {
        !self.slice_ids.is_empty() && self.slice_ids.iter().all(|id| !id.is_empty())
    }

    /// Copy of the request whose units are expanded once per slice ID.
    pub fn extend_slices(&self) -> Request {
        Request {
            units: expand_templated(&self.units, &self.slice_ids),
            ..self.clone()
        }
    }

    pub fn unit_by_base(&self, base: &str) -> Option<&Unit> {
        self.units
            .iter()
            .find(|u| crate::naming::unit_base(&u.name) == base)
    }
}
