// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::models::ProviderKind;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Why a session token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("No session token presented")]
    Missing,

    #[error("Session token is invalid")]
    Invalid,

    #[error("Session token has expired")]
    Expired,
}

impl AuthError {
    fn code(self) -> &'static str {
        match self {
            AuthError::Missing => "unauthorized",
            AuthError::Invalid => "invalid_token",
            AuthError::Expired => "token_expired",
        }
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The host has not connected the provider, or its stored token is unusable.
    #[error("{provider} calendar is not connected: {reason}")]
    ProviderUnauthorized {
        provider: ProviderKind,
        reason: String,
    },

    #[error("{provider} API error: {message}")]
    ExternalService {
        provider: ProviderKind,
        message: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Stored data is corrupt: {0}")]
    DataCorruption(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn external(provider: ProviderKind, message: impl Into<String>) -> Self {
        AppError::ExternalService {
            provider,
            message: message.into(),
        }
    }

    pub fn provider_unauthorized(provider: ProviderKind, reason: impl Into<String>) -> Self {
        AppError::ProviderUnauthorized {
            provider,
            reason: reason.into(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                Some(msg.clone()),
            ),
            AppError::Auth(e) => (StatusCode::UNAUTHORIZED, e.code(), None),
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "invalid_credentials", None)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::ProviderUnauthorized { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "provider_not_connected",
                Some(self.to_string()),
            ),
            AppError::ExternalService { provider, message } => {
                tracing::warn!(provider = %provider, error = %message, "Calendar provider error");
                (
                    StatusCode::BAD_GATEWAY,
                    "provider_error",
                    Some(self.to_string()),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
            AppError::DataCorruption(msg) => {
                tracing::error!(error = %msg, "Data corruption");
                (StatusCode::INTERNAL_SERVER_ERROR, "data_corruption", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
