//! Database models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Property row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub category_slug: String,
    pub tagline: Option<String>,
    pub description: String,
    pub property_type: String,
    pub country: String,
    pub city: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub nearby_attractions: Vec<String>,
    pub max_guests: i32,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub bed_configurations: Option<String>,
    pub nightly_rate: f64,
    pub weekend_rate: Option<f64>,
    pub cleaning_fee: Option<f64>,
    pub service_fee_percent: f64,
    pub minimum_stay: i32,
    pub cancellation_policy: String,
    pub blocked_dates: Vec<String>,
    pub instant_book: bool,
    pub is_published: bool,
    pub is_featured: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Property image row; belongs to one property
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyImage {
    pub id: Uuid,
    pub property_id: Uuid,
    pub url: String,
    pub alt_text: Option<String>,
    pub is_featured: bool,
    pub sort_order: i32,
}

/// Property amenity row; belongs to one property
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyAmenity {
    pub id: Uuid,
    pub property_id: Uuid,
    pub name: String,
    pub icon: Option<String>,
}

/// A property with its child rows, as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyWithRelations {
    #[serde(flatten)]
    pub property: Property,
    pub images: Vec<PropertyImage>,
    pub amenities: Vec<PropertyAmenity>,
}

/// Journal post row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalPost {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub subtitle: String,
    pub hero_image: String,
    pub thumbnail_image: String,
    pub conclusion_image: String,
    pub intro: String,
    pub excerpt: String,
    pub conclusion_title: String,
    pub conclusion_content: String,
    pub gallery: Vec<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Journal section row; replaced wholesale when its post is updated
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalSection {
    pub id: Uuid,
    pub post_id: Uuid,
    pub title: String,
    pub content: String,
    pub image: String,
    pub reverse: bool,
    pub order_index: i32,
}

/// A journal post with its sections, as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalPostWithSections {
    #[serde(flatten)]
    pub post: JournalPost,
    pub sections: Vec<JournalSection>,
}

/// CMS image slot row, keyed by a human-chosen section id
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CmsImage {
    pub id: Uuid,
    pub section_id: String,
    pub url: String,
    pub alt_text: String,
    pub file_name: String,
    pub is_active: bool,
    pub uploaded_at: DateTime<Utc>,
}
