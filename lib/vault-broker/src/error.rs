use std::time::Duration;

use thiserror::Error;

/// Coarse classification of a [`VaultError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingCredential,
    InvalidCredential,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    KeyNotFound,
    NotRenewable,
    SessionExpired,
    ConnectionFailure,
    Timeout,
    InvalidSecretRef,
    InvalidConfig,
    InvalidResponse,
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Missing credential: {field} is not set or empty")]
    MissingCredential { field: String },

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Token is not authenticated: {0}")]
    Unauthenticated(String),

    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("Secret not found: {path}")]
    NotFound { path: String },

    #[error("Secret key not found: {key} in {path}")]
    KeyNotFound { path: String, key: String },

    #[error("Session is not renewable")]
    NotRenewable,

    #[error("Session expired, login required")]
    SessionExpired,

    #[error("Vault connection failed: {0}")]
    ConnectionFailure(String),

    #[error("Vault request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid secret reference: {reference}")]
    InvalidSecretRef { reference: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unexpected Vault response ({status}): {message}")]
    InvalidResponse { status: u16, message: String },
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCredential { .. } => ErrorKind::MissingCredential,
            Self::InvalidCredential(_) => ErrorKind::InvalidCredential,
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            Self::NotRenewable => ErrorKind::NotRenewable,
            Self::SessionExpired => ErrorKind::SessionExpired,
            Self::ConnectionFailure(_) => ErrorKind::ConnectionFailure,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::InvalidSecretRef { .. } => ErrorKind::InvalidSecretRef,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::InvalidResponse { .. } => ErrorKind::InvalidResponse,
        }
    }

    /// Transient failures a caller may choose to retry. The client itself never does.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::ConnectionFailure | ErrorKind::Timeout)
    }

    pub(crate) fn missing(field: impl Into<String>) -> Self {
        Self::MissingCredential {
            field: field.into(),
        }
    }

    pub(crate) fn invalid_response(status: u16, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            status,
            message: message.into(),
        }
    }
}
