use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("invalid unit status: {0}")]
    InvalidUnitStatus(String),
    #[error("unit file line {line}: {message}")]
    UnitFile { line: usize, message: String },
}

impl CoreError {
    pub fn is_invalid_arguments(&self) -> bool {
        matches!(self, CoreError::InvalidArguments(_))
    }

    pub fn is_invalid_unit_status(&self) -> bool {
        matches!(self, CoreError::InvalidUnitStatus(_))
    }
}
