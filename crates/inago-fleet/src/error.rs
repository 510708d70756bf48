use inago_core::CoreError;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("unit not found: {0}")]
    UnitNotFound(String),
    #[error("invalid unit status: {0}")]
    InvalidUnitStatus(String),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("ip not found for machine {0}")]
    IpNotFound(String),
    #[error("fleet api returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("fleet transport error")]
    Transport(#[source] BoxError),
    #[error("decode fleet response")]
    Decode(#[from] serde_json::Error),
    #[error("unit file")]
    UnitFile(#[source] CoreError),
}

impl FleetError {
    pub fn transport(err: impl Into<BoxError>) -> Self {
        FleetError::Transport(err.into())
    }

    pub fn is_unit_not_found(&self) -> bool {
        matches!(self, FleetError::UnitNotFound(_))
    }

    pub fn is_invalid_unit_status(&self) -> bool {
        matches!(self, FleetError::InvalidUnitStatus(_))
    }

    pub fn is_invalid_endpoint(&self) -> bool {
        matches!(self, FleetError::InvalidEndpoint(_))
    }
}
