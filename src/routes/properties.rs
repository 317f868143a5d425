//! Property routes.
//!
//! Public listing (filter/sort/paginate over published rows) and detail by
//! slug, plus the session-gated admin CRUD. Child image and amenity rows are
//! written together with the parent; on update a supplied array replaces the
//! full child set inside one transaction.

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::{
    self,
    models::{Property, PropertyAmenity, PropertyImage, PropertyWithRelations},
};
use crate::routes::auth::require_session;
use crate::routes::{ErrorResponse, SuccessResponse};
use crate::slug::{slugify, with_timestamp_suffix};

const PROPERTY_COLUMNS: &str = "id, title, slug, category_slug, tagline, description, \
     property_type, country, city, address, latitude, longitude, nearby_attractions, \
     max_guests, bedrooms, bathrooms, bed_configurations, nightly_rate, weekend_rate, \
     cleaning_fee, service_fee_percent, minimum_stay, cancellation_policy, blocked_dates, \
     instant_book, is_published, is_featured, sort_order, created_at, updated_at";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /api/properties
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyListQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    #[serde(default = "default_sort")]
    pub sort: String,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub guests: Option<i32>,
    #[serde(rename = "type")]
    pub property_type: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_sort() -> String {
    "featured".to_string()
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    12
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyListResponse {
    pub properties: Vec<PropertyWithRelations>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDetailResponse {
    pub property: PropertyWithRelations,
    pub similar_properties: Vec<PropertyWithRelations>,
}

/// Query parameters for GET /api/admin/properties
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPropertyListQuery {
    pub category: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

/// Nested image input on create/update
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyImageInput {
    pub url: String,
    pub alt_text: Option<String>,
    pub is_featured: Option<bool>,
}

/// Nested amenity input on create/update
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyAmenityInput {
    pub name: String,
    pub icon: Option<String>,
}

/// Request body for POST /api/admin/properties
#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreatePropertyRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub category_slug: Option<String>,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub property_type: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub nearby_attractions: Option<Vec<String>>,
    pub max_guests: Option<i32>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub bed_configurations: Option<String>,
    pub nightly_rate: Option<f64>,
    pub weekend_rate: Option<f64>,
    pub cleaning_fee: Option<f64>,
    pub service_fee_percent: Option<f64>,
    pub minimum_stay: Option<i32>,
    pub cancellation_policy: Option<String>,
    pub blocked_dates: Option<Vec<String>>,
    pub instant_book: Option<bool>,
    pub is_published: Option<bool>,
    pub is_featured: Option<bool>,
    pub sort_order: Option<i32>,
    pub images: Option<Vec<PropertyImageInput>>,
    pub amenities: Option<Vec<PropertyAmenityInput>>,
}

/// Request body for PUT /api/admin/properties/:id
/// Absent fields keep their stored values; a supplied images/amenities array
/// replaces the full child set.
pub type UpdatePropertyRequest = CreatePropertyRequest;

// ============================================================================
// Query helpers
// ============================================================================

fn order_clause(sort: &str) -> &'static str {
    match sort {
        "price-low" => " ORDER BY nightly_rate ASC",
        "price-high" => " ORDER BY nightly_rate DESC",
        "newest" => " ORDER BY created_at DESC",
        _ => " ORDER BY is_featured DESC, sort_order ASC, created_at DESC",
    }
}

/// Append the public listing filters as conjunctive AND clauses.
/// The base SQL already carries `WHERE is_published = TRUE`.
fn push_public_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &PropertyListQuery) {
    if let Some(category) = &query.category {
        builder.push(" AND category_slug = ").push_bind(category.clone());
    }
    if let Some(search) = &query.search {
        let pattern = format!("%{}%", search);
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR city ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR country ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR tagline ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(min_price) = query.min_price {
        builder.push(" AND nightly_rate >= ").push_bind(min_price);
    }
    if let Some(max_price) = query.max_price {
        builder.push(" AND nightly_rate <= ").push_bind(max_price);
    }
    if let Some(guests) = query.guests {
        builder.push(" AND max_guests >= ").push_bind(guests);
    }
    if let Some(property_type) = &query.property_type {
        builder
            .push(" AND property_type = ")
            .push_bind(property_type.clone());
    }
}

/// Fetch image and amenity rows for a page of properties and zip them in.
async fn load_relations(
    pool: &PgPool,
    properties: Vec<Property>,
) -> Result<Vec<PropertyWithRelations>, sqlx::Error> {
    if properties.is_empty() {
        return Ok(vec![]);
    }

    let ids: Vec<Uuid> = properties.iter().map(|p| p.id).collect();

    let images = sqlx::query_as::<_, PropertyImage>(
        r#"
        SELECT id, property_id, url, alt_text, is_featured, sort_order
        FROM property_images
        WHERE property_id = ANY($1)
        ORDER BY sort_order ASC
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let amenities = sqlx::query_as::<_, PropertyAmenity>(
        r#"
        SELECT id, property_id, name, icon
        FROM property_amenities
        WHERE property_id = ANY($1)
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut images_by_property: HashMap<Uuid, Vec<PropertyImage>> = HashMap::new();
    for image in images {
        images_by_property.entry(image.property_id).or_default().push(image);
    }
    let mut amenities_by_property: HashMap<Uuid, Vec<PropertyAmenity>> = HashMap::new();
    for amenity in amenities {
        amenities_by_property.entry(amenity.property_id).or_default().push(amenity);
    }

    Ok(properties
        .into_iter()
        .map(|property| {
            let images = images_by_property.remove(&property.id).unwrap_or_default();
            let amenities = amenities_by_property.remove(&property.id).unwrap_or_default();
            PropertyWithRelations {
                property,
                images,
                amenities,
            }
        })
        .collect())
}

// ============================================================================
// Public handlers
// ============================================================================

/// GET /api/properties - List published properties with filters and paging
pub async fn list_properties(Query(query): Query<PropertyListQuery>) -> impl IntoResponse {
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

    let limit = query.limit.clamp(1, 100);
    let page = query.page.max(1);
    let offset = (page - 1) * limit;

    let mut count_builder = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM properties WHERE is_published = TRUE",
    );
    push_public_filters(&mut count_builder, &query);

    let mut list_builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {} FROM properties WHERE is_published = TRUE",
        PROPERTY_COLUMNS
    ));
    push_public_filters(&mut list_builder, &query);
    list_builder.push(order_clause(&query.sort));
    list_builder.push(" LIMIT ").push_bind(limit);
    list_builder.push(" OFFSET ").push_bind(offset);

    let result: Result<(i64, Vec<Property>), sqlx::Error> = async {
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(pool.as_ref())
            .await?;
        let rows = list_builder
            .build_query_as::<Property>()
            .fetch_all(pool.as_ref())
            .await?;
        Ok((total, rows))
    }
    .await;

    let (total, rows) = match result {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Database error listing properties: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch properties")),
            )
                .into_response();
        }
    };

    let properties = match load_relations(pool.as_ref(), rows).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Database error loading property relations: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch properties")),
            )
                .into_response();
        }
    };

    (
        StatusCode::OK,
        Json(PropertyListResponse {
            properties,
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages: (total + limit - 1) / limit,
            },
        }),
    )
        .into_response()
}

/// GET /api/properties/:slug - Published property detail with similar stays
pub async fn get_property(Path(slug): Path<String>) -> impl IntoResponse {
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
        let property = sqlx::query_as::<_, Property>(&format!(
            "SELECT {} FROM properties WHERE slug = $1 AND is_published = TRUE",
            PROPERTY_COLUMNS
        ))
        .bind(&slug)
        .fetch_optional(pool.as_ref())
        .await?;

        let Some(property) = property else {
            return Ok::<_, sqlx::Error>(None);
        };

        let mut with_relations = load_relations(pool.as_ref(), vec![property]).await?;
        let property = with_relations.remove(0);

        let similar_rows = sqlx::query_as::<_, Property>(&format!(
            "SELECT {} FROM properties \
             WHERE category_slug = $1 AND is_published = TRUE AND id != $2 \
             ORDER BY is_featured DESC, created_at DESC \
             LIMIT 3",
            PROPERTY_COLUMNS
        ))
        .bind(&property.property.category_slug)
        .bind(property.property.id)
        .fetch_all(pool.as_ref())
        .await?;

        // List views only need the featured image of each similar stay
        let similar = load_relations(pool.as_ref(), similar_rows)
            .await?
            .into_iter()
            .map(|mut p| {
                p.images.retain(|img| img.is_featured);
                p.images.truncate(1);
                p
            })
            .collect();

        Ok(Some((property, similar)))
    }
    .await;

    match result {
        Ok(Some((property, similar_properties))) => (
            StatusCode::OK,
            Json(PropertyDetailResponse {
                property,
                similar_properties,
            }),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Property not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error fetching property: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch property")),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Admin handlers
// ============================================================================

/// GET /api/admin/properties - All properties regardless of publish state
pub async fn admin_list_properties(
    headers: HeaderMap,
    Query(query): Query<AdminPropertyListQuery>,
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

    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {} FROM properties WHERE TRUE",
        PROPERTY_COLUMNS
    ));
    if let Some(category) = &query.category {
        builder.push(" AND category_slug = ").push_bind(category.clone());
    }
    match query.status.as_deref() {
        Some("published") => {
            builder.push(" AND is_published = TRUE");
        }
        Some("draft") => {
            builder.push(" AND is_published = FALSE");
        }
        _ => {}
    }
    if let Some(search) = &query.search {
        let pattern = format!("%{}%", search);
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR city ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR country ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    builder.push(" ORDER BY created_at DESC");

    let result = async {
        let rows = builder
            .build_query_as::<Property>()
            .fetch_all(pool.as_ref())
            .await?;
        load_relations(pool.as_ref(), rows).await
    }
    .await;

    match result {
        Ok(properties) => (StatusCode::OK, Json(properties)).into_response(),
        Err(e) => {
            tracing::error!("Database error listing properties for admin: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch properties")),
            )
                .into_response()
        }
    }
}

/// GET /api/admin/properties/:id
pub async fn admin_get_property(headers: HeaderMap, Path(id): Path<Uuid>) -> impl IntoResponse {
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
        let property = sqlx::query_as::<_, Property>(&format!(
            "SELECT {} FROM properties WHERE id = $1",
            PROPERTY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await?;
        match property {
            Some(p) => Ok(load_relations(pool.as_ref(), vec![p]).await?.pop()),
            None => Ok::<_, sqlx::Error>(None),
        }
    }
    .await;

    match result {
        Ok(Some(property)) => (StatusCode::OK, Json(property)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Property not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error fetching property: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch property")),
            )
                .into_response()
        }
    }
}

/// POST /api/admin/properties - Create with nested images and amenities
pub async fn create_property(
    headers: HeaderMap,
    Json(payload): Json<CreatePropertyRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = require_session(&headers) {
        return err_response.into_response();
    }

    let missing_required = payload.title.as_deref().unwrap_or("").trim().is_empty()
        || payload.category_slug.as_deref().unwrap_or("").trim().is_empty()
        || payload.description.as_deref().unwrap_or("").trim().is_empty()
        || payload.country.as_deref().unwrap_or("").trim().is_empty()
        || payload.city.as_deref().unwrap_or("").trim().is_empty()
        || payload.nightly_rate.is_none();
    if missing_required {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "Title, category, description, country, city, and nightly rate are required",
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

    let result = async {
        // Derive the slug from the title unless a custom one was supplied;
        // a collision gets a timestamp suffix instead of failing the create.
        let mut slug = payload
            .slug
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| slugify(payload.title.as_deref().unwrap_or_default()));

        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM properties WHERE slug = $1")
            .bind(&slug)
            .fetch_optional(pool.as_ref())
            .await?;
        if exists.is_some() {
            slug = with_timestamp_suffix(&slug);
        }

        let mut tx = pool.begin().await?;

        let property = sqlx::query_as::<_, Property>(&format!(
            r#"
            INSERT INTO properties (
                title, slug, category_slug, tagline, description, property_type,
                country, city, address, latitude, longitude, nearby_attractions,
                max_guests, bedrooms, bathrooms, bed_configurations, nightly_rate,
                weekend_rate, cleaning_fee, service_fee_percent, minimum_stay,
                cancellation_policy, blocked_dates, instant_book, is_published,
                is_featured, sort_order
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27)
            RETURNING {}
            "#,
            PROPERTY_COLUMNS
        ))
        .bind(payload.title.as_deref().unwrap_or_default())
        .bind(&slug)
        .bind(payload.category_slug.as_deref().unwrap_or_default())
        .bind(&payload.tagline)
        .bind(payload.description.as_deref().unwrap_or_default())
        .bind(payload.property_type.as_deref().unwrap_or("villa"))
        .bind(payload.country.as_deref().unwrap_or_default())
        .bind(payload.city.as_deref().unwrap_or_default())
        .bind(&payload.address)
        .bind(payload.latitude)
        .bind(payload.longitude)
        .bind(payload.nearby_attractions.clone().unwrap_or_default())
        .bind(payload.max_guests.unwrap_or(2))
        .bind(payload.bedrooms.unwrap_or(1))
        .bind(payload.bathrooms.unwrap_or(1))
        .bind(&payload.bed_configurations)
        .bind(payload.nightly_rate.unwrap_or_default())
        .bind(payload.weekend_rate)
        .bind(payload.cleaning_fee)
        .bind(payload.service_fee_percent.unwrap_or(10.0))
        .bind(payload.minimum_stay.unwrap_or(1))
        .bind(payload.cancellation_policy.as_deref().unwrap_or("flexible"))
        .bind(payload.blocked_dates.clone().unwrap_or_default())
        .bind(payload.instant_book.unwrap_or(false))
        .bind(payload.is_published.unwrap_or(false))
        .bind(payload.is_featured.unwrap_or(false))
        .bind(payload.sort_order.unwrap_or(0))
        .fetch_one(&mut *tx)
        .await?;

        insert_property_images(
            &mut tx,
            property.id,
            payload.images.as_deref().unwrap_or_default(),
            true,
        )
        .await?;
        insert_property_amenities(
            &mut tx,
            property.id,
            payload.amenities.as_deref().unwrap_or_default(),
        )
        .await?;

        tx.commit().await?;

        Ok::<_, sqlx::Error>(load_relations(pool.as_ref(), vec![property]).await?.pop())
    }
    .await;

    match result {
        Ok(Some(property)) => (StatusCode::CREATED, Json(property)).into_response(),
        Ok(None) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Failed to create property")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error creating property: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create property")),
            )
                .into_response()
        }
    }
}

/// PUT /api/admin/properties/:id - Partial update; supplied child arrays
/// replace the full set inside the same transaction
pub async fn update_property(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePropertyRequest>,
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

    let existing = match sqlx::query_as::<_, Property>(&format!(
        "SELECT {} FROM properties WHERE id = $1",
        PROPERTY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await
    {
        Ok(Some(p)) => p,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Property not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Database error fetching property: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to update property")),
            )
                .into_response();
        }
    };

    // Reject slug changes that would collide with another property
    if let Some(new_slug) = payload.slug.as_deref() {
        if new_slug != existing.slug {
            match sqlx::query_as::<_, (Uuid,)>("SELECT id FROM properties WHERE slug = $1")
                .bind(new_slug)
                .fetch_optional(pool.as_ref())
                .await
            {
                Ok(Some(_)) => {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(ErrorResponse::new(
                            "A property with this slug already exists",
                        )),
                    )
                        .into_response();
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Database error checking slug: {}", e);
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(ErrorResponse::new("Failed to update property")),
                    )
                        .into_response();
                }
            }
        }
    }

    let result = async {
        let mut tx = pool.begin().await?;

        if payload.images.is_some() {
            sqlx::query("DELETE FROM property_images WHERE property_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        if payload.amenities.is_some() {
            sqlx::query("DELETE FROM property_amenities WHERE property_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let property = sqlx::query_as::<_, Property>(&format!(
            r#"
            UPDATE properties SET
                title = $1, slug = $2, category_slug = $3, tagline = $4,
                description = $5, property_type = $6, country = $7, city = $8,
                address = $9, latitude = $10, longitude = $11,
                nearby_attractions = $12, max_guests = $13, bedrooms = $14,
                bathrooms = $15, bed_configurations = $16, nightly_rate = $17,
                weekend_rate = $18, cleaning_fee = $19, service_fee_percent = $20,
                minimum_stay = $21, cancellation_policy = $22, blocked_dates = $23,
                instant_book = $24, is_published = $25, is_featured = $26,
                sort_order = $27, updated_at = now()
            WHERE id = $28
            RETURNING {}
            "#,
            PROPERTY_COLUMNS
        ))
        .bind(payload.title.clone().unwrap_or(existing.title))
        .bind(payload.slug.clone().unwrap_or(existing.slug))
        .bind(payload.category_slug.clone().unwrap_or(existing.category_slug))
        .bind(payload.tagline.clone().or(existing.tagline))
        .bind(payload.description.clone().unwrap_or(existing.description))
        .bind(payload.property_type.clone().unwrap_or(existing.property_type))
        .bind(payload.country.clone().unwrap_or(existing.country))
        .bind(payload.city.clone().unwrap_or(existing.city))
        .bind(payload.address.clone().or(existing.address))
        .bind(payload.latitude.or(existing.latitude))
        .bind(payload.longitude.or(existing.longitude))
        .bind(
            payload
                .nearby_attractions
                .clone()
                .unwrap_or(existing.nearby_attractions),
        )
        .bind(payload.max_guests.unwrap_or(existing.max_guests))
        .bind(payload.bedrooms.unwrap_or(existing.bedrooms))
        .bind(payload.bathrooms.unwrap_or(existing.bathrooms))
        .bind(
            payload
                .bed_configurations
                .clone()
                .or(existing.bed_configurations),
        )
        .bind(payload.nightly_rate.unwrap_or(existing.nightly_rate))
        .bind(payload.weekend_rate.or(existing.weekend_rate))
        .bind(payload.cleaning_fee.or(existing.cleaning_fee))
        .bind(
            payload
                .service_fee_percent
                .unwrap_or(existing.service_fee_percent),
        )
        .bind(payload.minimum_stay.unwrap_or(existing.minimum_stay))
        .bind(
            payload
                .cancellation_policy
                .clone()
                .unwrap_or(existing.cancellation_policy),
        )
        .bind(payload.blocked_dates.clone().unwrap_or(existing.blocked_dates))
        .bind(payload.instant_book.unwrap_or(existing.instant_book))
        .bind(payload.is_published.unwrap_or(existing.is_published))
        .bind(payload.is_featured.unwrap_or(existing.is_featured))
        .bind(payload.sort_order.unwrap_or(existing.sort_order))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(images) = payload.images.as_deref() {
            insert_property_images(&mut tx, id, images, false).await?;
        }
        if let Some(amenities) = payload.amenities.as_deref() {
            insert_property_amenities(&mut tx, id, amenities).await?;
        }

        tx.commit().await?;

        Ok::<_, sqlx::Error>(load_relations(pool.as_ref(), vec![property]).await?.pop())
    }
    .await;

    match result {
        Ok(Some(property)) => (StatusCode::OK, Json(property)).into_response(),
        Ok(None) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Failed to update property")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error updating property: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to update property")),
            )
                .into_response()
        }
    }
}

/// DELETE /api/admin/properties/:id - Children cascade via the database
pub async fn delete_property(headers: HeaderMap, Path(id): Path<Uuid>) -> impl IntoResponse {
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

    match sqlx::query("DELETE FROM properties WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await
    {
        Ok(result) if result.rows_affected() == 0 => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Property not found")),
        )
            .into_response(),
        Ok(_) => (StatusCode::OK, Json(SuccessResponse { success: true })).into_response(),
        Err(e) => {
            tracing::error!("Database error deleting property: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to delete property")),
            )
                .into_response()
        }
    }
}

async fn insert_property_images(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    property_id: Uuid,
    images: &[PropertyImageInput],
    first_defaults_featured: bool,
) -> Result<(), sqlx::Error> {
    for (index, image) in images.iter().enumerate() {
        let is_featured =
            image.is_featured.unwrap_or(false) || (first_defaults_featured && index == 0);
        sqlx::query(
            r#"
            INSERT INTO property_images (property_id, url, alt_text, is_featured, sort_order)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(property_id)
        .bind(&image.url)
        .bind(&image.alt_text)
        .bind(is_featured)
        .bind(index as i32)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn insert_property_amenities(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    property_id: Uuid,
    amenities: &[PropertyAmenityInput],
) -> Result<(), sqlx::Error> {
    for amenity in amenities {
        sqlx::query(
            r#"
            INSERT INTO property_amenities (property_id, name, icon)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(property_id)
        .bind(&amenity.name)
        .bind(&amenity.icon)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
