//! API route handlers.

pub mod auth;
pub mod health;
pub mod images;
pub mod journal;
pub mod properties;

use serde::{Deserialize, Serialize};

/// Error body shared by every route: `{ "error": "..." }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

/// Success body for deletes: `{ "success": true }`
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}
