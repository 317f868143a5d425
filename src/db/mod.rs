pub mod models;

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use tokio::sync::OnceCell;

static DB_POOL: OnceCell<Arc<PgPool>> = OnceCell::const_new();

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/retreat".to_string()),
            max_connections: std::env::var("DB_POOL_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_POOL_MIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        }
    }
}

pub async fn init_pool(config: Option<DbConfig>) -> Result<Arc<PgPool>, sqlx::Error> {
    let config = config.unwrap_or_default();

    tracing::info!("Initializing database connection pool...");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(std::time::Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");

    let pool = Arc::new(pool);
    let _ = DB_POOL.set(pool.clone());

    Ok(pool)
}

pub fn get_pool() -> Option<Arc<PgPool>> {
    DB_POOL.get().cloned()
}

pub async fn health_check() -> Result<std::time::Duration, sqlx::Error> {
    let pool = get_pool()
        .ok_or_else(|| sqlx::Error::Configuration("Database pool not initialized".into()))?;

    let start = std::time::Instant::now();
    sqlx::query("SELECT 1").fetch_one(pool.as_ref()).await?;

    Ok(start.elapsed())
}

/// Schema DDL, one command per entry. The prepared-statement protocol
/// rejects multi-command strings, so these must never be batched.
const MIGRATION_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS properties (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        title TEXT NOT NULL,
        slug TEXT UNIQUE NOT NULL,
        category_slug TEXT NOT NULL,
        tagline TEXT,
        description TEXT NOT NULL,
        property_type TEXT NOT NULL DEFAULT 'villa',
        country TEXT NOT NULL,
        city TEXT NOT NULL,
        address TEXT,
        latitude DOUBLE PRECISION,
        longitude DOUBLE PRECISION,
        nearby_attractions TEXT[] NOT NULL DEFAULT '{}',
        max_guests INTEGER NOT NULL DEFAULT 2,
        bedrooms INTEGER NOT NULL DEFAULT 1,
        bathrooms INTEGER NOT NULL DEFAULT 1,
        bed_configurations TEXT,
        nightly_rate DOUBLE PRECISION NOT NULL,
        weekend_rate DOUBLE PRECISION,
        cleaning_fee DOUBLE PRECISION,
        service_fee_percent DOUBLE PRECISION NOT NULL DEFAULT 10,
        minimum_stay INTEGER NOT NULL DEFAULT 1,
        cancellation_policy TEXT NOT NULL DEFAULT 'flexible',
        blocked_dates TEXT[] NOT NULL DEFAULT '{}',
        instant_book BOOLEAN NOT NULL DEFAULT false,
        is_published BOOLEAN NOT NULL DEFAULT false,
        is_featured BOOLEAN NOT NULL DEFAULT false,
        sort_order INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_properties_category_slug ON properties(category_slug)",
    "CREATE INDEX IF NOT EXISTS idx_properties_is_published ON properties(is_published)",
    "CREATE INDEX IF NOT EXISTS idx_properties_nightly_rate ON properties(nightly_rate)",
    r#"
    CREATE INDEX IF NOT EXISTS idx_properties_listing_order
        ON properties(is_featured DESC, sort_order ASC, created_at DESC)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS property_images (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        property_id UUID NOT NULL REFERENCES properties(id) ON DELETE CASCADE,
        url TEXT NOT NULL,
        alt_text TEXT,
        is_featured BOOLEAN NOT NULL DEFAULT false,
        sort_order INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS property_amenities (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        property_id UUID NOT NULL REFERENCES properties(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        icon TEXT
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_property_images_property_id
        ON property_images(property_id, sort_order)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_property_amenities_property_id
        ON property_amenities(property_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS journal_posts (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        slug TEXT UNIQUE NOT NULL,
        title TEXT NOT NULL,
        subtitle TEXT NOT NULL DEFAULT '',
        hero_image TEXT NOT NULL DEFAULT '',
        thumbnail_image TEXT NOT NULL DEFAULT '',
        conclusion_image TEXT NOT NULL DEFAULT '',
        intro TEXT NOT NULL DEFAULT '',
        excerpt TEXT NOT NULL DEFAULT '',
        conclusion_title TEXT NOT NULL DEFAULT '',
        conclusion_content TEXT NOT NULL DEFAULT '',
        gallery TEXT[] NOT NULL DEFAULT '{}',
        published BOOLEAN NOT NULL DEFAULT false,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS journal_sections (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        post_id UUID NOT NULL REFERENCES journal_posts(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        image TEXT NOT NULL DEFAULT '',
        reverse BOOLEAN NOT NULL DEFAULT false,
        order_index INTEGER NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_journal_posts_published ON journal_posts(published)",
    "CREATE INDEX IF NOT EXISTS idx_journal_posts_created_at ON journal_posts(created_at DESC)",
    r#"
    CREATE INDEX IF NOT EXISTS idx_journal_sections_post_id
        ON journal_sections(post_id, order_index)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cms_images (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        section_id TEXT NOT NULL,
        url TEXT NOT NULL,
        alt_text TEXT NOT NULL DEFAULT '',
        file_name TEXT NOT NULL DEFAULT '',
        is_active BOOLEAN NOT NULL DEFAULT true,
        uploaded_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_cms_images_slot
        ON cms_images(section_id, is_active, uploaded_at DESC)
    "#,
];

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    for statement in MIGRATION_STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Database migrations completed successfully");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_default_uses_env_or_fallback() {
        let config = DbConfig::default();
        assert!(config.max_connections >= 1);
        assert!(config.connect_timeout_secs >= 1);
        assert!(config.idle_timeout_secs >= 1);
        assert!(!config.url.is_empty());
    }

    #[test]
    fn test_get_pool_none_before_init() {
        let pool = get_pool();
        assert!(pool.is_none());
    }

    #[tokio::test]
    async fn test_health_check_fails_without_pool() {
        let result = health_check().await;
        assert!(result.is_err());
    }

    #[test]
    fn test_migration_statements_are_single_commands() {
        // Postgres rejects multi-command prepared statements outright
        for statement in MIGRATION_STATEMENTS {
            assert!(
                !statement.contains(';'),
                "statement must be a single command: {}",
                statement
            );
        }
    }

    #[test]
    fn test_migrations_cover_every_table() {
        let ddl = MIGRATION_STATEMENTS.join("\n");
        for table in [
            "properties",
            "property_images",
            "property_amenities",
            "journal_posts",
            "journal_sections",
            "cms_images",
        ] {
            assert!(
                ddl.contains(&format!("CREATE TABLE IF NOT EXISTS {}", table)),
                "missing table: {}",
                table
            );
        }
    }
}
