//! Error taxonomy shared by every world operation.

use thiserror::Error;
use timeline::TimelineError;

/// Everything that can go wrong while reading or changing the world.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    /// The entity, attribute, or rule is absent at the requested time and all earlier ones.
    #[error("not found: {0}")]
    NotFound(String),

    /// A rule or rulebook entry with that name already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A value of the wrong kind was supplied.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// An internal invariant was violated, such as a write behind a branch tip.
    #[error("corruption: {0}")]
    Corruption(String),

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(String),

    /// The engine configuration could not be read.
    #[error("config error: {0}")]
    Config(String),
}

impl WorldError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        WorldError::NotFound(what.to_string())
    }

    pub fn conflict(what: impl std::fmt::Display) -> Self {
        WorldError::Conflict(what.to_string())
    }

    pub fn type_mismatch(what: impl std::fmt::Display) -> Self {
        WorldError::TypeMismatch(what.to_string())
    }
}

impl From<TimelineError> for WorldError {
    fn from(err: TimelineError) -> Self {
        match err {
            TimelineError::NotFound(what) => WorldError::NotFound(what),
            TimelineError::Store(msg) => WorldError::Store(msg),
            corrupt @ (TimelineError::BehindTip { .. }
            | TimelineError::ForkedPast { .. }
            | TimelineError::Corruption(_)) => {
                WorldError::Corruption(corrupt.to_string())
            }
        }
    }
}

pub type WorldResult<T> = Result<T, WorldError>;

/// Turn `NotFound` into `None`, keeping every other error.
pub(crate) fn found<T>(result: WorldResult<T>) -> WorldResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(WorldError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}
