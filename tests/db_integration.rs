//! Database-backed end-to-end checks.
//!
//! These run only when TEST_DATABASE_URL (or DATABASE_URL) points at a
//! disposable Postgres database; without it the test is a no-op so the
//! default `cargo test` run stays database-free. Everything lives in one
//! test function because the connection pool is a process-wide singleton
//! tied to the runtime that created it.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use retreat_backend::{blob, create_app, db};

fn test_database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, auth: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", auth)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn bare_request(method: &str, uri: &str, auth: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", auth)
        .body(Body::empty())
        .unwrap()
}

fn property_payload(title: &str, category: &str, rate: f64, published: bool) -> Value {
    json!({
        "title": title,
        "categorySlug": category,
        "description": "A quiet house on the plains",
        "country": "Kenya",
        "city": "Amboseli",
        "nightlyRate": rate,
        "isPublished": published,
    })
}

#[tokio::test]
async fn database_backed_end_to_end() {
    let Some(url) = test_database_url() else {
        eprintln!("TEST_DATABASE_URL not set; skipping database-backed checks");
        return;
    };

    std::env::set_var("ADMIN_PASSWORD", "integration-pass");
    let blob_dir = tempfile::tempdir().unwrap();
    std::env::set_var("BLOB_STORE_DIR", blob_dir.path());
    std::env::set_var("BLOB_PUBLIC_BASE", "/uploads/cms");

    let pool = db::init_pool(Some(db::DbConfig {
        url,
        max_connections: 5,
        min_connections: 1,
        connect_timeout_secs: 10,
        idle_timeout_secs: 60,
    }))
    .await
    .expect("connect to test database");

    // Start from an empty schema so migrations take the fresh-database path.
    sqlx::query(
        "DROP TABLE IF EXISTS property_images, property_amenities, properties, \
         journal_sections, journal_posts, cms_images CASCADE",
    )
    .execute(pool.as_ref())
    .await
    .unwrap();

    db::run_migrations(&pool)
        .await
        .expect("migrations succeed on a fresh database");

    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pg_tables WHERE schemaname = 'public' AND tablename = ANY($1)",
    )
    .bind(vec![
        "properties".to_string(),
        "property_images".to_string(),
        "property_amenities".to_string(),
        "journal_posts".to_string(),
        "journal_sections".to_string(),
        "cms_images".to_string(),
    ])
    .fetch_one(pool.as_ref())
    .await
    .unwrap();
    assert_eq!(tables, 6, "every table exists after a fresh migration");

    let app = create_app();

    let (status, body) = send(
        &app,
        Request::post("/api/auth/login")
            .header("content-type", "application/json")
            .body(Body::from(json!({"password": "integration-pass"}).to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let auth = format!("Bearer {}", body["sessionToken"].as_str().unwrap());

    // Two creates with the same title: the second slug gets disambiguated
    // and both rows exist afterward.
    let (status, first) = send(
        &app,
        json_request(
            "POST",
            "/api/admin/properties",
            &auth,
            &property_payload("Acacia House", "safari-escapes", 350.0, true),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["slug"], "acacia-house");

    let (status, second) = send(
        &app,
        json_request(
            "POST",
            "/api/admin/properties",
            &auth,
            &property_payload("Acacia House", "safari-escapes", 900.0, true),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let second_slug = second["slug"].as_str().unwrap();
    assert!(second_slug.starts_with("acacia-house-"));
    assert_ne!(second_slug, "acacia-house");

    let acacias: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM properties WHERE title = 'Acacia House'")
            .fetch_one(pool.as_ref())
            .await
            .unwrap();
    assert_eq!(acacias, 2);

    // Category + price-band filter: out-of-category, out-of-band and
    // unpublished rows all stay out of the listing.
    for payload in [
        property_payload("Cliff Cottage", "coastal-hideaways", 200.0, true),
        property_payload("Dune Camp", "safari-escapes", 150.0, false),
    ] {
        let (status, _) = send(
            &app,
            json_request("POST", "/api/admin/properties", &auth, &payload),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, listing) = send(
        &app,
        Request::get("/api/properties?category=safari-escapes&minPrice=100&maxPrice=500")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let properties = listing["properties"].as_array().unwrap();
    assert_eq!(properties.len(), 1);
    assert_eq!(properties[0]["slug"], "acacia-house");
    assert_eq!(listing["pagination"]["total"], 1);

    // Updating a post's sections replaces the prior set wholesale.
    let (status, created_post) = send(
        &app,
        json_request(
            "POST",
            "/api/admin/journal",
            &auth,
            &json!({
                "slug": "amboseli-at-dawn",
                "title": "Amboseli at Dawn",
                "sections": [
                    {"title": "First Light", "content": "The plains wake slowly."},
                    {"title": "The Long Grass", "content": "Gold to the horizon.", "reverse": true},
                ],
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let post_id = created_post["id"].as_str().unwrap().to_string();
    let original_ids: Vec<String> = created_post["sections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(original_ids.len(), 2);
    assert_eq!(created_post["sections"][1]["orderIndex"], 1);

    let (status, updated_post) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/admin/journal/{}", post_id),
            &auth,
            &json!({
                "sections": [
                    {"title": "Rewritten", "content": "One section remains."},
                ],
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let new_sections = updated_post["sections"].as_array().unwrap();
    assert_eq!(new_sections.len(), 1);
    assert_eq!(new_sections[0]["orderIndex"], 0);
    assert!(!original_ids.contains(&new_sections[0]["id"].as_str().unwrap().to_string()));

    let remaining: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM journal_sections WHERE post_id = $1")
            .bind(Uuid::parse_str(&post_id).unwrap())
            .fetch_one(pool.as_ref())
            .await
            .unwrap();
    assert_eq!(remaining, 1);

    // Deleting a post removes the row even when one referenced blob
    // cannot be deleted, and still removes the blobs that can be.
    let live_url = blob::put("dawn-hero.jpg", b"image-bytes").await.unwrap();
    let missing_url = "/uploads/cms/long-gone-00000000.jpg";

    let (status, doomed) = send(
        &app,
        json_request(
            "POST",
            "/api/admin/journal",
            &auth,
            &json!({
                "slug": "farewell-post",
                "title": "Farewell",
                "heroImage": live_url,
                "gallery": [missing_url],
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let doomed_id = doomed["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        bare_request("DELETE", &format!("/api/admin/journal/{}", doomed_id), &auth),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(
        &app,
        bare_request("GET", &format!("/api/admin/journal/{}", doomed_id), &auth),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let live_name = live_url.rsplit('/').next().unwrap();
    assert!(
        !blob_dir.path().join(live_name).exists(),
        "existing blob removed despite the failing one"
    );
}
