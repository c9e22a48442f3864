use axum::http::StatusCode;
use thiserror::Error;

use crate::db::{ProfileId, RoomId};

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    #[error("profile {0} not found")]
    ProfileNotFound(ProfileId),

    #[error("notification {0} not found")]
    NotificationNotFound(i64),

    #[error("room {room} has {members} members, expected 2")]
    MembershipInvariantViolation { room: RoomId, members: usize },

    #[error("{0}")]
    ValidationError(String),

    #[error("profile {sender} may not send to room {room}")]
    ForbiddenSender { room: RoomId, sender: ProfileId },

    #[error("couldn't subscribe: {0}")]
    SubscriptionFailure(String),

    #[error("corrupt row: {0}")]
    CorruptRow(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl MessagingError {
    pub fn status(&self) -> StatusCode {
        use MessagingError::*;
        match self {
            Unauthenticated => StatusCode::UNAUTHORIZED,
            RoomNotFound(_) | ProfileNotFound(_) | NotificationNotFound(_) => StatusCode::NOT_FOUND,
            MembershipInvariantViolation { .. } => StatusCode::CONFLICT,
            ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ForbiddenSender { .. } => StatusCode::FORBIDDEN,
            SubscriptionFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            CorruptRow(_) | Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn corrupt(err: impl std::fmt::Display) -> Self {
        MessagingError::CorruptRow(err.to_string())
    }
}
