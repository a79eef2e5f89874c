use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

use crate::models::PenaltyType;

/// Domain errors raised by the moderation services.
///
/// None of these are transient except [`ModerationError::Database`] carrying a busy or
/// locked SQLite error, which the services retry internally.
#[derive(Debug, Error)]
pub enum ModerationError {
    /// The referenced entity does not exist, or the caller may not see it.
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("user already has an active {active} penalty; only a more severe penalty can be issued")]
    AlreadyPenalized { active: PenaltyType },
    #[error("{0}")]
    AlreadyExists(&'static str),
    #[error("{0}")]
    CannotAppeal(&'static str),
    #[error("{0}")]
    CannotRevoke(String),
    #[error("{0}")]
    InvalidAction(String),
    #[error("user {user_id} has an unreadable registration timestamp {raw:?}")]
    InvalidTimestamp { user_id: i64, raw: String },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl ModerationError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyPenalized { .. } | Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::CannotAppeal(_) | Self::CannotRevoke(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidAction(_) => StatusCode::BAD_REQUEST,
            Self::InvalidTimestamp { .. } | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `axum`-compatible error handler.
pub struct Error {
    status: StatusCode,
    err: anyhow::Error,
}

impl Error {
    pub fn with_status(status: StatusCode, err: impl Into<anyhow::Error>) -> Self {
        Self {
            status,
            err: err.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            err,
        }
    }
}

impl From<ModerationError> for Error {
    fn from(err: ModerationError) -> Self {
        Self::with_status(err.status(), err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:?}", self.status, self.err)
    }
}

impl std::error::Error for Error {}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.err.fmt(f)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{:?}", self.err);

            // N.B: Internal details (SQL errors and the like) only leave the process in
            // debug builds.
            if cfg!(debug_assertions) {
                return (self.status, format!("{:?}", self.err)).into_response();
            }
            return self.status.into_response();
        }

        // Client errors are precondition failures; the message is meant for the caller.
        debug!(status = %self.status, "{}", self.err);
        (self.status, self.err.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_client_statuses() {
        let cases = [
            (ModerationError::NotFound("penalty"), StatusCode::NOT_FOUND),
            (
                ModerationError::AlreadyPenalized {
                    active: PenaltyType::TempBan7d,
                },
                StatusCode::CONFLICT,
            ),
            (
                ModerationError::AlreadyExists("appeal already exists"),
                StatusCode::CONFLICT,
            ),
            (
                ModerationError::CannotAppeal("nope"),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ModerationError::InvalidAction("bogus".to_owned()),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(Error::from(err).status(), status);
        }
    }

    #[test]
    fn not_found_message_names_the_entity() {
        assert_eq!(ModerationError::NotFound("appeal").to_string(), "appeal not found");
    }
}
