use kurier_proto::ParseModeError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CtlError {
    #[error("dt must be > 0 (got {0})")]
    InvalidDt(f64),

    #[error("unknown mode: {0}")]
    UnknownMode(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl From<ParseModeError> for CtlError {
    fn from(e: ParseModeError) -> Self {
        CtlError::UnknownMode(e.0)
    }
}

pub type CtlResult<T> = std::result::Result<T, CtlError>;
