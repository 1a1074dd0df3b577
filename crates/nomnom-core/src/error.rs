use std::fmt;

/// Failures inside a recommendation request.
///
/// These never cross the public `recommend` boundary; they are logged and
/// the caller receives an empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The data source could not produce a usable snapshot.
    DataUnavailable(String),
    /// The requested user id is unknown or empty.
    InvalidUser(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::DataUnavailable(msg) => write!(f, "data unavailable: {msg}"),
            EngineError::InvalidUser(id) => write!(f, "invalid user: {id:?}"),
        }
    }
}

impl std::error::Error for EngineError {}

pub type Result<T> = std::result::Result<T, EngineError>;
