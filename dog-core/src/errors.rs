//! # Errors
//!
//! Two layers:
//! - [`AdmissionError`]: the typed taxonomy produced by the token gate,
//!   tenant resolution and channel demultiplexing.
//! - [`DogError`]: the transport-agnostic, Feathers-style shape
//!   (`name`/`message`/`code`/`className`) that adapters put on the wire.
//!
//! `AdmissionError::to_dog_error` is the single mapping between the two, so
//! clients can tell "your credentials are wrong" (403/400) from "the tenant
//! backend is not ready, retry later" (503).

use std::fmt;

use anyhow::Error as AnyError;
use thiserror::Error;

use crate::principal::ScopeError;
use crate::tenant::TenantId;

/// Error class names + status codes used by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,       // 400
    NotAuthenticated, // 401
    Forbidden,        // 403
    GeneralError,     // 500
    Unavailable,      // 503
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotAuthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::GeneralError => 500,
            ErrorKind::Unavailable => 503,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotAuthenticated => "NotAuthenticated",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::GeneralError => "GeneralError",
            ErrorKind::Unavailable => "Unavailable",
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::NotAuthenticated => "not-authenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::GeneralError => "general-error",
            ErrorKind::Unavailable => "unavailable",
        }
    }
}

/// Why a request was not admitted.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("JWT has expired")]
    TokenExpired,

    #[error("JWT is invalid: {0}")]
    TokenInvalid(String),

    #[error("tenant id passed without corresponding tenant auth token")]
    MalformedTenantCredential,

    #[error("tenant '{0}' does not exist")]
    UnknownTenant(TenantId),

    #[error("tenant authentication token is invalid for tenant '{0}'")]
    TenantAuthMismatch(TenantId),

    #[error("tenant '{0}' is not active")]
    TenantUnavailable(TenantId),

    #[error("tenant engine for '{tenant}' on service '{service}' not available after {waited_ms}ms")]
    ChannelUnavailable {
        service: String,
        tenant: TenantId,
        waited_ms: u128,
    },

    #[error("wait for tenant engine '{0}' was cancelled")]
    WaitCancelled(TenantId),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("unexpected failure: {0}")]
    Unexpected(#[source] AnyError),
}

impl AdmissionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdmissionError::TokenExpired | AdmissionError::TokenInvalid(_) => ErrorKind::Forbidden,
            AdmissionError::MalformedTenantCredential => ErrorKind::BadRequest,
            AdmissionError::UnknownTenant(_)
            | AdmissionError::TenantAuthMismatch(_)
            | AdmissionError::TenantUnavailable(_)
            | AdmissionError::ChannelUnavailable { .. }
            | AdmissionError::WaitCancelled(_) => ErrorKind::Unavailable,
            AdmissionError::Scope(_) | AdmissionError::Unexpected(_) => ErrorKind::GeneralError,
        }
    }

    /// Message safe to return to the caller. Internal detail stays in logs.
    pub fn client_message(&self) -> &'static str {
        match self {
            AdmissionError::TokenExpired => "JWT has expired.",
            AdmissionError::TokenInvalid(_) => "JWT is invalid.",
            AdmissionError::MalformedTenantCredential => {
                "Tenant id passed without corresponding tenant auth token."
            }
            AdmissionError::UnknownTenant(_) => "The requested tenant does not exist.",
            AdmissionError::TenantAuthMismatch(_) => "Tenant authentication token is invalid.",
            AdmissionError::TenantUnavailable(_) => "The requested tenant is not active.",
            AdmissionError::ChannelUnavailable { .. } => "Tenant engine not available.",
            AdmissionError::WaitCancelled(_) => "Wait for tenant engine was cancelled.",
            AdmissionError::Scope(_) | AdmissionError::Unexpected(_) => "Error processing JWT.",
        }
    }

    pub fn to_dog_error(&self) -> DogError {
        DogError::new(self.kind(), self.client_message())
    }
}

impl From<AdmissionError> for DogError {
    fn from(err: AdmissionError) -> Self {
        err.to_dog_error()
    }
}

/// A structured DogRS error that can live inside `anyhow::Error`.
#[derive(Debug)]
pub struct DogError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DogError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn not_authenticated(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAuthenticated, msg)
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }
}

impl fmt::Display for DogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for DogError {}

#[cfg(feature = "serde")]
impl DogError {
    /// Feathers-ish JSON payload.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        json!({
            "name": self.name(),
            "message": self.message,
            "code": self.code(),
            "className": self.class_name(),
        })
    }
}
