use std::path::PathBuf;

use inago_core::CoreError;
use inago_fleet::FleetError;
use inago_task::TaskError;
use inago_validate::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unit not found: {0}")]
    UnitNotFound(String),
    #[error("unit slice not found: slice ID '{0}'")]
    UnitSliceNotFound(String),
    #[error("invalid unit status: {0}")]
    InvalidUnitStatus(String),
    #[error("wait timeout reached")]
    WaitTimeoutReached,
    #[error("update not allowed: {0}")]
    UpdateNotAllowed(String),
    #[error("update failed: {0}")]
    UpdateFailed(String),
    #[error("group does not exist: {0}")]
    GroupNotExist(String),
    #[error("no unit files in {0}")]
    NoUnitFiles(String),
    #[error("{action} task failed: {message}")]
    TaskFailed { action: String, message: String },
    #[error("operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Fleet(FleetError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error("read {path}")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ControllerError {
    pub fn is_unit_not_found(&self) -> bool {
        matches!(self, ControllerError::UnitNotFound(_))
    }

    pub fn is_unit_slice_not_found(&self) -> bool {
        matches!(self, ControllerError::UnitSliceNotFound(_))
    }

    pub fn is_wait_timeout_reached(&self) -> bool {
        matches!(self, ControllerError::WaitTimeoutReached)
    }

    pub fn is_update_not_allowed(&self) -> bool {
        matches!(self, ControllerError::UpdateNotAllowed(_))
    }

    pub fn is_update_failed(&self) -> bool {
        matches!(self, ControllerError::UpdateFailed(_))
    }
}

impl From<FleetError> for ControllerError {
    fn from(err: FleetError) -> Self {
        match err {
            FleetError::UnitNotFound(msg) => ControllerError::UnitNotFound(msg),
            FleetError::InvalidUnitStatus(msg) => ControllerError::InvalidUnitStatus(msg),
            other => ControllerError::Fleet(other),
        }
    }
}

impl From<CoreError> for ControllerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidUnitStatus(msg) => ControllerError::InvalidUnitStatus(msg),
            other => ControllerError::InvalidArgument(other.to_string()),
        }
    }
}
