use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use wirepool_core::ManagerError;
use wirepool_core::config::ConfigError;
use wirepool_core::instance::AllocError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("caller {0} is not allowed")]
    Forbidden(String),

    #[error("instance not found")]
    InstanceNotFound,

    #[error("client slot not found")]
    SlotNotFound,

    #[error("client already holds {0}")]
    DuplicateClient(String),

    #[error("no free addresses left in this instance")]
    PoolExhausted,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal server error")]
    Internal,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Forbidden(_) => StatusCode::UNAUTHORIZED,
            Self::InstanceNotFound | Self::SlotNotFound => StatusCode::NOT_FOUND,
            Self::DuplicateClient(_) => StatusCode::CONFLICT,
            Self::PoolExhausted | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "error": self.to_string() }))
    }
}

impl From<ManagerError> for ApiError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::UnknownInstance(_) => Self::InstanceNotFound,
            ManagerError::Alloc(AllocError::Duplicate { address, .. }) => {
                Self::DuplicateClient(address.to_string())
            }
            ManagerError::Alloc(AllocError::PoolExhausted { .. }) => Self::PoolExhausted,
            ManagerError::Alloc(AllocError::SlotNotFound { .. }) => Self::SlotNotFound,
            ManagerError::Alloc(AllocError::EmptyIdentity)
            | ManagerError::InvalidAddress(_)
            | ManagerError::Config(ConfigError::InvalidName(_)) => Self::Validation(err.to_string()),
            ManagerError::Network(_)
            | ManagerError::Store(_)
            | ManagerError::Config(_)
            | ManagerError::InstanceExists(_) => {
                tracing::error!(error = %err, "instance manager error");
                Self::Internal
            }
        }
    }
}
