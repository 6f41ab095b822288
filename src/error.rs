use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use actix_web::ResponseError;
use log::error;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error("Geocoding service unavailable: {0}")]
    GatewayUnavailable(anyhow::Error),

    #[error("Could not identify location")]
    AddressNotResolvable,

    #[error("pickup point store failed: {0}")]
    Store(anyhow::Error),

    #[error("failed to lock pickup point area: {0}")]
    Lock(anyhow::Error),

    #[error("a pickup point is already registered nearby")]
    DuplicatePickupPoint,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::AddressNotResolvable => StatusCode::NOT_FOUND,
            Error::DuplicatePickupPoint => StatusCode::CONFLICT,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::GatewayUnavailable(_) | Error::Store(_) | Error::Lock(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        let detail = match self {
            Error::Store(e) | Error::Lock(e) => {
                error!("{}: {:#}", self, e);
                "internal server error".to_owned()
            }
            _ => self.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorBody { detail })
    }
}
