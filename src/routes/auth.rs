//! Session routes.
//!
//! A single credentials check (submitted password vs the environment secret)
//! yielding a JWT-backed session. Every admin route consumes the session as a
//! boolean gate via [`require_session`].

use axum::{
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::routes::ErrorResponse;

// ============================================================================
// Configuration
// ============================================================================

lazy_static::lazy_static! {
    /// JWT signing secret from environment
    pub static ref SESSION_SECRET: String = std::env::var("SESSION_SECRET")
        .unwrap_or_else(|_| "default-session-secret-change-in-production".to_string());

    /// Admin password hash from environment (or plain password to hash)
    static ref ADMIN_PASSWORD_HASH: String = {
        if let Ok(hashed) = std::env::var("ADMIN_PASSWORD_HASH") {
            hashed
        } else if let Ok(plain) = std::env::var("ADMIN_PASSWORD") {
            hash(&plain, DEFAULT_COST).unwrap_or_else(|_| String::new())
        } else {
            // Default password "admin123" hashed
            hash("admin123", DEFAULT_COST).unwrap_or_else(|_| String::new())
        }
    };
}

/// Session token expiry in hours
const SESSION_TTL_HOURS: i64 = 24;

// ============================================================================
// Types
// ============================================================================

/// JWT claims for an admin session
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // Always "admin"; there is exactly one admin identity
    pub exp: i64,    // Expiry timestamp
    pub iat: i64,    // Issued at timestamp
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub session_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub success: bool,
}

// ============================================================================
// Helpers
// ============================================================================

pub(crate) fn create_session_token() -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: "admin".to_string(),
        exp: (now + Duration::hours(SESSION_TTL_HOURS)).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SESSION_SECRET.as_bytes()),
    )
}

/// Verify and decode a session token
pub fn verify_session_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(SESSION_SECRET.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Gate for admin routes: a valid bearer session or 401, before any
/// validation or mutation happens.
pub fn require_session(headers: &HeaderMap) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    match extract_bearer_token(headers) {
        Some(token) => match verify_session_token(token) {
            Ok(_) => Ok(()),
            Err(_) => Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Unauthorized")),
            )),
        },
        None => Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("Unauthorized")),
        )),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/login
pub async fn login(Json(payload): Json<LoginRequest>) -> impl IntoResponse {
    if payload.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(LoginResponse {
                success: false,
                session_token: None,
                error: Some("Password is required".to_string()),
            }),
        );
    }

    // bcrypt is CPU-bound; keep the async executor free.
    let password = payload.password;
    let password_ok =
        tokio::task::spawn_blocking(move || verify(&password, &ADMIN_PASSWORD_HASH).unwrap_or(false))
            .await
            .unwrap_or(false);

    if !password_ok {
        tracing::warn!("Failed admin login attempt");
        return (
            StatusCode::UNAUTHORIZED,
            Json(LoginResponse {
                success: false,
                session_token: None,
                error: Some("Invalid credentials".to_string()),
            }),
        );
    }

    match create_session_token() {
        Ok(token) => {
            tracing::info!("Admin session created");
            (
                StatusCode::OK,
                Json(LoginResponse {
                    success: true,
                    session_token: Some(token),
                    error: None,
                }),
            )
        }
        Err(e) => {
            tracing::error!("Failed to create session token: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(LoginResponse {
                    success: false,
                    session_token: None,
                    error: Some("Failed to create session".to_string()),
                }),
            )
        }
    }
}

/// POST /api/auth/verify
pub async fn verify_token(headers: HeaderMap) -> impl IntoResponse {
    let token = match extract_bearer_token(&headers) {
        Some(t) => t,
        None => {
            return (
                StatusCode::OK,
                Json(VerifyResponse {
                    success: false,
                    is_valid: false,
                    error: Some("No authorization token provided".to_string()),
                }),
            );
        }
    };

    match verify_session_token(token) {
        Ok(_) => (
            StatusCode::OK,
            Json(VerifyResponse {
                success: true,
                is_valid: true,
                error: None,
            }),
        ),
        Err(e) => {
            tracing::debug!("Session verification failed: {}", e);
            (
                StatusCode::OK,
                Json(VerifyResponse {
                    success: false,
                    is_valid: false,
                    error: Some("Invalid or expired session".to_string()),
                }),
            )
        }
    }
}

/// POST /api/auth/logout
/// Sessions are stateless JWTs; logout is idempotent and always succeeds.
pub async fn logout() -> impl IntoResponse {
    (StatusCode::OK, Json(LogoutResponse { success: true }))
}
