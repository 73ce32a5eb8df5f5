use argon2::Error as Argon2Error;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use log::{error, warn};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, status::Custom, Responder},
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::Status(Status::NotFound, format!("{} not found", what.into()))
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Status(Status::Unauthorized, msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Status(Status::Forbidden, msg.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Argon2(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Status(status, _) => *status,
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let message = if status.class() == StatusClass::ServerError {
            // Internal details stay in the log.
            error!("{} {}: {self}", req.method(), req.uri());
            "Internal server error".to_string()
        } else {
            warn!("{} {}: {self}", req.method(), req.uri());
            self.to_string()
        };
        let body = ErrorBody {
            status: status.code,
            message,
        };
        Custom(status, Json(body)).respond_to(req)
    }
}
