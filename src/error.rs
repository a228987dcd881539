//! Error types for imdb2meta

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Config Errors ===
    #[error("invalid configuration: {0}")]
    Config(String),

    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Ingestion Errors ===
    #[error("malformed row: {0}")]
    Decode(String),

    // === Storage Errors ===
    #[error("couldn't open store: {0}")]
    StorageOpen(String),

    #[error("store integrity check failed: {0}")]
    Integrity(String),

    #[error("storage read failed: {0}")]
    StorageRead(String),

    #[error("storage write failed: {0}")]
    StorageWrite(String),

    // === Lookup Outcomes ===
    #[error("title not found: {0}")]
    NotFound(String),

    #[error("missing title ID")]
    MissingId,

    // === Service Lifecycle ===
    #[error("startup verification failed: {0}")]
    StartupVerification(String),

    // === Generic ===
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Did this error happen before the service was serving traffic?
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::StorageOpen(_)
                | Error::Integrity(_)
                | Error::StartupVerification(_)
        )
    }

    /// Convert to a gRPC status for RPC responses.
    ///
    /// Internal faults get a generic message; engine names, paths and raw
    /// error text stay in the server logs.
    pub fn to_grpc_status(&self) -> tonic::Status {
        match self {
            Error::NotFound(_) => tonic::Status::not_found("title not found"),
            Error::MissingId => tonic::Status::invalid_argument("missing title ID"),
            _ => tonic::Status::internal("couldn't get title metadata"),
        }
    }

    /// Convert to an HTTP status code.
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::MissingId => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-safe message for HTTP error responses.
    pub fn public_message(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "title not found",
            Error::MissingId => "missing title ID",
            _ => "internal server error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn internal_faults_never_leak_details() {
        let err = Error::StorageRead("sled at /var/db/imdb blew up".to_string());
        assert_eq!(err.to_http_status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "internal server error");
        let status = err.to_grpc_status();
        assert_eq!(status.code(), tonic::Code::Internal);
        assert!(!status.message().contains("sled"));
        assert!(!status.message().contains("/var/db"));
    }

    #[test]
    fn lookup_outcomes_map_to_client_statuses() {
        assert_eq!(
            Error::NotFound("tt1".into()).to_http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(Error::MissingId.to_http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::MissingId.to_grpc_status().code(),
            tonic::Code::InvalidArgument
        );
    }

    #[test]
    fn startup_failure_classification() {
        assert!(Error::Config("x".into()).is_startup_failure());
        assert!(Error::StartupVerification("x".into()).is_startup_failure());
        assert!(!Error::Internal("x".into()).is_startup_failure());
    }
}
