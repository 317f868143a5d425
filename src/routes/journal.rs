//! Journal routes.
//!
//! Session-gated CRUD for journal posts. Sections are replaced wholesale on
//! update; delete best-effort removes every blob-store URL the post
//! referenced before dropping the row.

use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::blob;
use crate::db::{
    self,
    models::{JournalPost, JournalPostWithSections, JournalSection},
};
use crate::routes::auth::require_session;
use crate::routes::{ErrorResponse, SuccessResponse};

const POST_COLUMNS: &str = "id, slug, title, subtitle, hero_image, thumbnail_image, \
     conclusion_image, intro, excerpt, conclusion_title, conclusion_content, gallery, \
     published, created_at, updated_at";

const SECTION_COLUMNS: &str = "id, post_id, title, content, image, reverse, order_index";

// ============================================================================
// Request Types
// ============================================================================

/// Nested section input; order is the submitted index
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalSectionInput {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub reverse: bool,
}

/// Request body for POST /api/admin/journal and PUT /api/admin/journal/:id
#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct JournalPostRequest {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub hero_image: Option<String>,
    pub thumbnail_image: Option<String>,
    pub conclusion_image: Option<String>,
    pub intro: Option<String>,
    pub excerpt: Option<String>,
    pub conclusion_title: Option<String>,
    pub conclusion_content: Option<String>,
    pub gallery: Option<Vec<String>>,
    pub published: Option<bool>,
    pub sections: Option<Vec<JournalSectionInput>>,
}

// ============================================================================
// Helpers
// ============================================================================

async fn fetch_sections(pool: &PgPool, post_id: Uuid) -> Result<Vec<JournalSection>, sqlx::Error> {
    sqlx::query_as::<_, JournalSection>(&format!(
        "SELECT {} FROM journal_sections WHERE post_id = $1 ORDER BY order_index ASC",
        SECTION_COLUMNS
    ))
    .bind(post_id)
    .fetch_all(pool)
    .await
}

async fn insert_sections(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    post_id: Uuid,
    sections: &[JournalSectionInput],
) -> Result<(), sqlx::Error> {
    for (index, section) in sections.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO journal_sections (post_id, title, content, image, reverse, order_index)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(post_id)
        .bind(&section.title)
        .bind(&section.content)
        .bind(&section.image)
        .bind(section.reverse)
        .bind(index as i32)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Every blob-store URL a post references: hero, thumbnail, conclusion,
/// gallery entries and section images. External CDN URLs are skipped.
fn collect_blob_urls(post: &JournalPost, sections: &[JournalSection]) -> Vec<String> {
    let mut urls = Vec::new();
    for candidate in [
        &post.hero_image,
        &post.thumbnail_image,
        &post.conclusion_image,
    ] {
        if blob::is_store_url(candidate) {
            urls.push(candidate.clone());
        }
    }
    for url in &post.gallery {
        if blob::is_store_url(url) {
            urls.push(url.clone());
        }
    }
    for section in sections {
        if blob::is_store_url(&section.image) {
            urls.push(section.image.clone());
        }
    }
    urls
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/admin/journal - All posts, newest first, sections in order
pub async fn list_posts(headers: HeaderMap) -> impl IntoResponse {
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

    let result = async {
        let posts = sqlx::query_as::<_, JournalPost>(&format!(
            "SELECT {} FROM journal_posts ORDER BY created_at DESC",
            POST_COLUMNS
        ))
        .fetch_all(pool.as_ref())
        .await?;

        let mut out = Vec::with_capacity(posts.len());
        for post in posts {
            let sections = fetch_sections(pool.as_ref(), post.id).await?;
            out.push(JournalPostWithSections { post, sections });
        }
        Ok::<_, sqlx::Error>(out)
    }
    .await;

    match result {
        Ok(posts) => (StatusCode::OK, Json(posts)).into_response(),
        Err(e) => {
            tracing::error!("Database error listing journal posts: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch posts")),
            )
                .into_response()
        }
    }
}

/// GET /api/admin/journal/:id
pub async fn get_post(headers: HeaderMap, Path(id): Path<Uuid>) -> impl IntoResponse {
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

    let result = async {
        let post = sqlx::query_as::<_, JournalPost>(&format!(
            "SELECT {} FROM journal_posts WHERE id = $1",
            POST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await?;
        match post {
            Some(post) => {
                let sections = fetch_sections(pool.as_ref(), post.id).await?;
                Ok::<_, sqlx::Error>(Some(JournalPostWithSections { post, sections }))
            }
            None => Ok(None),
        }
    }
    .await;

    match result {
        Ok(Some(post)) => (StatusCode::OK, Json(post)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Post not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error fetching journal post: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch post")),
            )
                .into_response()
        }
    }
}

/// POST /api/admin/journal - Create with nested sections
pub async fn create_post(
    headers: HeaderMap,
    Json(payload): Json<JournalPostRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = require_session(&headers) {
        return err_response.into_response();
    }

    let slug = payload.slug.as_deref().unwrap_or("").trim().to_string();
    let title = payload.title.as_deref().unwrap_or("").trim().to_string();
    if slug.is_empty() || title.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Slug and title are required")),
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

    match sqlx::query_as::<_, (Uuid,)>("SELECT id FROM journal_posts WHERE slug = $1")
        .bind(&slug)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("A post with this slug already exists")),
            )
                .into_response();
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!("Database error checking journal slug: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create post")),
            )
                .into_response();
        }
    }

    let result = async {
        let mut tx = pool.begin().await?;

        let post = sqlx::query_as::<_, JournalPost>(&format!(
            r#"
            INSERT INTO journal_posts (
                slug, title, subtitle, hero_image, thumbnail_image, conclusion_image,
                intro, excerpt, conclusion_title, conclusion_content, gallery, published
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            POST_COLUMNS
        ))
        .bind(&slug)
        .bind(&title)
        .bind(payload.subtitle.as_deref().unwrap_or_default())
        .bind(payload.hero_image.as_deref().unwrap_or_default())
        .bind(payload.thumbnail_image.as_deref().unwrap_or_default())
        .bind(payload.conclusion_image.as_deref().unwrap_or_default())
        .bind(payload.intro.as_deref().unwrap_or_default())
        .bind(payload.excerpt.as_deref().unwrap_or_default())
        .bind(payload.conclusion_title.as_deref().unwrap_or_default())
        .bind(payload.conclusion_content.as_deref().unwrap_or_default())
        .bind(payload.gallery.clone().unwrap_or_default())
        .bind(payload.published.unwrap_or(false))
        .fetch_one(&mut *tx)
        .await?;

        insert_sections(&mut tx, post.id, payload.sections.as_deref().unwrap_or_default()).await?;
        tx.commit().await?;

        let sections = fetch_sections(pool.as_ref(), post.id).await?;
        Ok::<_, sqlx::Error>(JournalPostWithSections { post, sections })
    }
    .await;

    match result {
        Ok(post) => (StatusCode::CREATED, Json(post)).into_response(),
        Err(e) => {
            tracing::error!("Database error creating journal post: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create post")),
            )
                .into_response()
        }
    }
}

/// PUT /api/admin/journal/:id - Sections are replaced wholesale
pub async fn update_post(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<JournalPostRequest>,
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

    let existing = match sqlx::query_as::<_, JournalPost>(&format!(
        "SELECT {} FROM journal_posts WHERE id = $1",
        POST_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await
    {
        Ok(Some(p)) => p,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Post not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Database error fetching journal post: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to update post")),
            )
                .into_response();
        }
    };

    // Reject slug changes that collide with another post
    if let Some(new_slug) = payload.slug.as_deref() {
        if new_slug != existing.slug {
            match sqlx::query_as::<_, (Uuid,)>("SELECT id FROM journal_posts WHERE slug = $1")
                .bind(new_slug)
                .fetch_optional(pool.as_ref())
                .await
            {
                Ok(Some(_)) => {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(ErrorResponse::new("A post with this slug already exists")),
                    )
                        .into_response();
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Database error checking journal slug: {}", e);
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(ErrorResponse::new("Failed to update post")),
                    )
                        .into_response();
                }
            }
        }
    }

    let result = async {
        let mut tx = pool.begin().await?;

        // Replace the full section set in the same transaction
        sqlx::query("DELETE FROM journal_sections WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let post = sqlx::query_as::<_, JournalPost>(&format!(
            r#"
            UPDATE journal_posts SET
                slug = $1, title = $2, subtitle = $3, hero_image = $4,
                thumbnail_image = $5, conclusion_image = $6, intro = $7,
                excerpt = $8, conclusion_title = $9, conclusion_content = $10,
                gallery = $11, published = $12, updated_at = now()
            WHERE id = $13
            RETURNING {}
            "#,
            POST_COLUMNS
        ))
        .bind(payload.slug.clone().unwrap_or(existing.slug))
        .bind(payload.title.clone().unwrap_or(existing.title))
        .bind(payload.subtitle.clone().unwrap_or(existing.subtitle))
        .bind(payload.hero_image.clone().unwrap_or(existing.hero_image))
        .bind(
            payload
                .thumbnail_image
                .clone()
                .unwrap_or(existing.thumbnail_image),
        )
        .bind(
            payload
                .conclusion_image
                .clone()
                .unwrap_or(existing.conclusion_image),
        )
        .bind(payload.intro.clone().unwrap_or(existing.intro))
        .bind(payload.excerpt.clone().unwrap_or(existing.excerpt))
        .bind(
            payload
                .conclusion_title
                .clone()
                .unwrap_or(existing.conclusion_title),
        )
        .bind(
            payload
                .conclusion_content
                .clone()
                .unwrap_or(existing.conclusion_content),
        )
        .bind(payload.gallery.clone().unwrap_or(existing.gallery))
        .bind(payload.published.unwrap_or(existing.published))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        insert_sections(&mut tx, id, payload.sections.as_deref().unwrap_or_default()).await?;
        tx.commit().await?;

        let sections = fetch_sections(pool.as_ref(), id).await?;
        Ok::<_, sqlx::Error>(JournalPostWithSections { post, sections })
    }
    .await;

    match result {
        Ok(post) => (StatusCode::OK, Json(post)).into_response(),
        Err(e) => {
            tracing::error!("Database error updating journal post: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to update post")),
            )
                .into_response()
        }
    }
}

/// DELETE /api/admin/journal/:id - Best-effort blob cleanup, then drop the row
pub async fn delete_post(headers: HeaderMap, Path(id): Path<Uuid>) -> impl IntoResponse {
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

    let result = async {
        let post = sqlx::query_as::<_, JournalPost>(&format!(
            "SELECT {} FROM journal_posts WHERE id = $1",
            POST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await?;

        let Some(post) = post else {
            return Ok::<_, sqlx::Error>(false);
        };
        let sections = fetch_sections(pool.as_ref(), post.id).await?;

        // Best-effort cleanup of every blob the post referenced.
        // A failed delete is logged and the row is removed regardless.
        let urls = collect_blob_urls(&post, &sections);
        let outcomes = futures::future::join_all(urls.iter().map(|url| blob::del(url))).await;
        for (url, outcome) in urls.iter().zip(outcomes) {
            if let Err(e) = outcome {
                tracing::warn!("Failed to delete blob {}: {}", url, e);
            }
        }

        sqlx::query("DELETE FROM journal_posts WHERE id = $1")
            .bind(id)
            .execute(pool.as_ref())
            .await?;
        Ok(true)
    }
    .await;

    match result {
        Ok(true) => (StatusCode::OK, Json(SuccessResponse { success: true })).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Post not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error deleting journal post: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to delete post")),
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
    use chrono::Utc;
    use tower::ServiceExt;

    fn test_router() -> Router {
        Router::new()
            .route("/api/admin/journal", get(list_posts).post(create_post))
            .route(
                "/api/admin/journal/{id}",
                get(get_post).put(update_post).delete(delete_post),
            )
    }

    fn session_header() -> String {
        let token = crate::routes::auth::create_session_token().unwrap();
        format!("Bearer {}", token)
    }

    fn sample_post(gallery: Vec<String>, hero: &str) -> JournalPost {
        JournalPost {
            id: Uuid::new_v4(),
            slug: "amboseli-at-dawn".to_string(),
            title: "Amboseli at Dawn".to_string(),
            subtitle: "The Soul of the Savannah".to_string(),
            hero_image: hero.to_string(),
            thumbnail_image: String::new(),
            conclusion_image: String::new(),
            intro: String::new(),
            excerpt: String::new(),
            conclusion_title: String::new(),
            conclusion_content: String::new(),
            gallery,
            published: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_collect_blob_urls_keeps_only_store_urls() {
        let post = sample_post(
            vec![
                "/uploads/cms/gallery-one-abc12345.jpg".to_string(),
                "https://i.ibb.co/abc/IMG_0821.jpg".to_string(),
            ],
            "/uploads/cms/hero-def67890.jpg",
        );
        let sections = vec![JournalSection {
            id: Uuid::new_v4(),
            post_id: post.id,
            title: "Where Silence Speaks".to_string(),
            content: String::new(),
            image: "/uploads/cms/section-0a1b2c3d.jpg".to_string(),
            reverse: false,
            order_index: 0,
        }];

        let urls = collect_blob_urls(&post, &sections);
        assert_eq!(
            urls,
            vec![
                "/uploads/cms/hero-def67890.jpg",
                "/uploads/cms/gallery-one-abc12345.jpg",
                "/uploads/cms/section-0a1b2c3d.jpg",
            ]
        );
    }

    #[test]
    fn test_collect_blob_urls_empty_for_external_post() {
        let post = sample_post(
            vec!["https://images.unsplash.com/photo-150.jpg".to_string()],
            "https://i.ibb.co/xyz/hero.jpg",
        );
        assert!(collect_blob_urls(&post, &[]).is_empty());
    }

    #[tokio::test]
    async fn test_list_without_session_is_unauthorized() {
        let req = Request::get("/api/admin/journal").body(Body::empty()).unwrap();
        let res = test_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_missing_slug_and_title_is_bad_request() {
        let payload = JournalPostRequest {
            intro: Some("A quiet morning".to_string()),
            ..Default::default()
        };
        let req = Request::post("/api/admin/journal")
            .header("content-type", "application/json")
            .header("authorization", session_header())
            .body(Body::from(serde_json::to_vec(&payload).unwrap()))
            .unwrap();
        let res = test_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_without_session_is_unauthorized() {
        let req = Request::delete(format!("/api/admin/journal/{}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let res = test_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_section_input_defaults_image_and_reverse() {
        let section: JournalSectionInput =
            serde_json::from_str(r#"{"title":"T","content":"C"}"#).unwrap();
        assert_eq!(section.image, "");
        assert!(!section.reverse);
    }
}
