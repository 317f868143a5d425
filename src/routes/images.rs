//! CMS image routes.
//!
//! Each page section is a named slot (`sectionId`). Uploads append rows; the
//! slot resolves to the most recently uploaded active row, so re-uploading
//! swaps the visible image without touching older ones.

use axum::{
    body::Bytes,
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::blob;
use crate::db::{self, models::CmsImage};
use crate::routes::auth::require_session;
use crate::routes::ErrorResponse;

const IMAGE_COLUMNS: &str = "id, section_id, url, alt_text, file_name, is_active, uploaded_at";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for POST /api/admin/images; the body is the raw file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQuery {
    pub filename: Option<String>,
    pub section_id: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageListQuery {
    pub section_id: Option<String>,
}

/// Public slot resolution: just what a page needs to render
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotImageResponse {
    pub url: String,
    pub alt_text: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/admin/images - Raw body upload into a section slot
pub async fn upload_image(
    headers: HeaderMap,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> impl IntoResponse {
    if let Err(err_response) = require_session(&headers) {
        return err_response.into_response();
    }

    let filename = query.filename.as_deref().unwrap_or("").trim().to_string();
    let section_id = query.section_id.as_deref().unwrap_or("").trim().to_string();
    if filename.is_empty() || section_id.is_empty() || body.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "Filename, body, and sectionId are required",
            )),
        )
            .into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Database not available")),
            )
                .into_response();
        }
    };

    let url = match blob::put(&filename, &body).await {
        Ok(url) => url,
        Err(e @ (blob::BlobError::InvalidFilename | blob::BlobError::UnsupportedType)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Blob store write failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to store image")),
            )
                .into_response();
        }
    };

    let result = sqlx::query_as::<_, CmsImage>(&format!(
        r#"
        INSERT INTO cms_images (section_id, url, alt_text, file_name)
        VALUES ($1, $2, $3, $4)
        RETURNING {}
        "#,
        IMAGE_COLUMNS
    ))
    .bind(&section_id)
    .bind(&url)
    .bind(query.alt_text.as_deref().unwrap_or_default())
    .bind(&filename)
    .fetch_one(pool.as_ref())
    .await;

    match result {
        Ok(image) => {
            tracing::info!("CMS image uploaded for section {}", section_id);
            (StatusCode::CREATED, Json(image)).into_response()
        }
        Err(e) => {
            tracing::error!("Database error recording CMS image: {}", e);
            // The blob already landed; drop it rather than leak an orphan.
            if let Err(cleanup) = blob::del(&url).await {
                tracing::warn!("Failed to clean up orphaned blob {}: {}", url, cleanup);
            }
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to save image")),
            )
                .into_response()
        }
    }
}

/// GET /api/admin/images - Active images, optionally filtered by section
pub async fn list_images(
    headers: HeaderMap,
    Query(query): Query<ImageListQuery>,
) -> impl IntoResponse {
    if let Err(err_response) = require_session(&headers) {
        return err_response.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Database not available")),
            )
                .into_response();
        }
    };

    let result = match query.section_id {
        Some(section_id) => {
            sqlx::query_as::<_, CmsImage>(&format!(
                "SELECT {} FROM cms_images WHERE is_active = TRUE AND section_id = $1 \
                 ORDER BY uploaded_at DESC",
                IMAGE_COLUMNS
            ))
            .bind(section_id)
            .fetch_all(pool.as_ref())
            .await
        }
        None => {
            sqlx::query_as::<_, CmsImage>(&format!(
                "SELECT {} FROM cms_images WHERE is_active = TRUE ORDER BY uploaded_at DESC",
                IMAGE_COLUMNS
            ))
            .fetch_all(pool.as_ref())
            .await
        }
    };

    match result {
        Ok(images) => (StatusCode::OK, Json(images)).into_response(),
        Err(e) => {
            tracing::error!("Database error listing CMS images: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch images")),
            )
                .into_response()
        }
    }
}

/// GET /api/images/:section_id - Public slot lookup.
/// 404 means "no managed image"; pages fall back to their built-in visual.
pub async fn resolve_slot(Path(section_id): Path<String>) -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Database not available")),
            )
                .into_response();
        }
    };

    let result = sqlx::query_as::<_, CmsImage>(&format!(
        "SELECT {} FROM cms_images WHERE section_id = $1 AND is_active = TRUE \
         ORDER BY uploaded_at DESC LIMIT 1",
        IMAGE_COLUMNS
    ))
    .bind(&section_id)
    .fetch_optional(pool.as_ref())
    .await;

    match result {
        Ok(Some(image)) => (
            StatusCode::OK,
            Json(SlotImageResponse {
                url: image.url,
                alt_text: image.alt_text,
            }),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("No image for this section")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error resolving image slot: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch image")),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn test_router() -> Router {
        Router::new()
            .route("/api/admin/images", get(list_images).post(upload_image))
            .route("/api/images/{section_id}", get(resolve_slot))
    }

    fn session_header() -> String {
        let token = crate::routes::auth::create_session_token().unwrap();
        format!("Bearer {}", token)
    }

    #[tokio::test]
    async fn test_upload_without_session_is_unauthorized() {
        let req = Request::post("/api/admin/images?filename=hero.jpg&sectionId=home-hero")
            .body(Body::from("bytes"))
            .unwrap();
        let res = test_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_upload_missing_params_is_bad_request() {
        let req = Request::post("/api/admin/images?filename=hero.jpg")
            .header("authorization", session_header())
            .body(Body::from("bytes"))
            .unwrap();
        let res = test_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_empty_body_is_bad_request() {
        let req = Request::post("/api/admin/images?filename=hero.jpg&sectionId=home-hero")
            .header("authorization", session_header())
            .body(Body::empty())
            .unwrap();
        let res = test_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_without_session_is_unauthorized() {
        let req = Request::get("/api/admin/images").body(Body::empty()).unwrap();
        let res = test_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_public_slot_without_database_is_unavailable() {
        let req = Request::get("/api/images/home-hero").body(Body::empty()).unwrap();
        let res = test_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_slot_response_serializes_camel_case() {
        let json = serde_json::to_value(SlotImageResponse {
            url: "/uploads/cms/hero-abc12345.jpg".to_string(),
            alt_text: "Sunrise over the valley".to_string(),
        })
        .unwrap();
        assert!(json.get("altText").is_some());
        assert!(json.get("alt_text").is_none());
    }
}
