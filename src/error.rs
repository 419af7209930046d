//! Error types for convene.

use thiserror::Error;

use crate::model::ParticipantId;

#[derive(Debug, Error)]
pub enum Error {
    /// A blocking wait was interrupted by its cancellation token.
    #[error("wait cancelled")]
    Cancelled,

    #[error("{0} is already inside the hall")]
    AlreadyInside(ParticipantId),

    #[error("{0} is not inside the hall")]
    NotInside(ParticipantId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
