//! Error types for zstore

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Pool Errors ===
    #[error("volume not found")]
    NotExists,

    #[error("volume already exists")]
    AlreadyExists,

    #[error("pool out of space")]
    OutOfSpace,

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("ZFS is not available on this host: {0}")]
    ZfsUnavailable(String),

    #[error("Pool {name} unhealthy: {health}")]
    PoolUnhealthy { name: String, health: String },

    // === Request Errors ===
    #[error("invalid size slug")]
    InvalidSize,

    #[error("Cannot parse client address {0:?}")]
    AddressParse(String),

    #[error("Invalid volume name: {0}")]
    InvalidName(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Is this a condition the client caused or can act on, rather than a
    /// server fault?
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Error::NotExists
                | Error::AlreadyExists
                | Error::OutOfSpace
                | Error::InvalidSize
                | Error::InvalidName(_)
        )
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::NotExists | Error::InvalidName(_) => StatusCode::NOT_FOUND,
            Error::AlreadyExists => StatusCode::CONFLICT,
            Error::InvalidSize => StatusCode::BAD_REQUEST,
            Error::OutOfSpace => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(Error::NotExists.to_http_status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::AlreadyExists.to_http_status(), StatusCode::CONFLICT);
        assert_eq!(Error::InvalidSize.to_http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::OutOfSpace.to_http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::AddressParse("bogus".into()).to_http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::InvalidName("bad".into()).to_http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::Backend("zfs exploded".into()).to_http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_errors() {
        assert!(Error::NotExists.is_domain());
        assert!(Error::InvalidSize.is_domain());
        assert!(Error::OutOfSpace.is_domain());
        assert!(Error::InvalidName("x".into()).is_domain());
        assert!(!Error::AddressParse("x".into()).is_domain());
        assert!(!Error::Backend("x".into()).is_domain());
    }
}
