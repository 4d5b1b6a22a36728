//! Schema provisioning against a live PostgreSQL server.
//!
//! Run with `cargo test -p atlas-db --test provisioning_test -- --ignored`.

use atlas_db::test_fixtures::TestDatabase;
use atlas_db::{Capabilities, Error, Extension, GeometryMode, SchemaProvisioner, TABLES};
use sqlx::PgPool;

#[derive(Debug, PartialEq, Eq)]
struct CatalogCounts {
    tables: i64,
    indexes: i64,
    triggers: i64,
}

async fn catalog_counts(pool: &PgPool, schema: &str) -> CatalogCounts {
    let names: Vec<String> = TABLES.iter().map(|t| t.to_string()).collect();
    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables \
         WHERE table_schema = $1 AND table_name = ANY($2)",
    )
    .bind(schema)
    .bind(&names)
    .fetch_one(pool)
    .await
    .unwrap();
    let indexes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pg_indexes WHERE schemaname = $1")
        .bind(schema)
        .fetch_one(pool)
        .await
        .unwrap();
    let triggers: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM pg_trigger t
        JOIN pg_class c ON c.oid = t.tgrelid
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = $1 AND NOT t.tgisinternal
        "#,
    )
    .bind(schema)
    .fetch_one(pool)
    .await
    .unwrap();
    CatalogCounts {
        tables,
        indexes,
        triggers,
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_provisioning_twice_creates_nothing_new() {
    let test_db = TestDatabase::new().await;
    let schema = test_db.schema_name().to_string();

    let before = catalog_counts(&test_db.pool, &schema).await;
    assert_eq!(before.tables, TABLES.len() as i64);

    let report = test_db
        .db
        .provisioner()
        .initialize_schema()
        .await
        .expect("second provisioning run failed");
    assert_eq!(report.tables.len(), TABLES.len());

    let after = catalog_counts(&test_db.pool, &schema).await;
    assert_eq!(before, after);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_fallback_provisioning_reports_mode() {
    let test_db = TestDatabase::fallback().await;
    assert_eq!(test_db.db.mode(), GeometryMode::Fallback);

    let udt: String = sqlx::query_scalar(
        r#"
        SELECT udt_name::text FROM information_schema.columns
        WHERE table_schema = current_schema()
          AND table_name = 'villages' AND column_name = 'boundary'
        "#,
    )
    .fetch_one(&test_db.pool)
    .await
    .unwrap();
    assert_eq!(udt, "jsonb");

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_provisioning_refuses_other_layout() {
    let test_db = TestDatabase::fallback().await;

    let native = Capabilities::from_enabled(&[Extension::Postgis]);
    let err = SchemaProvisioner::new(test_db.pool.clone(), native)
        .initialize_schema()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Provisioning(_)));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_get_stats_marks_missing_table_only() {
    let test_db = TestDatabase::fallback().await;

    let stats = test_db
        .db
        .health()
        .with_tables(["villages", "no_such_table", "documents"])
        .get_stats()
        .await;
    assert_eq!(stats["villages"].count(), Some(0));
    assert_eq!(stats["documents"].count(), Some(0));
    assert!(stats["no_such_table"].count().is_none());

    let report = test_db.db.health().check_health().await;
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["geometry_mode"], "fallback");
    assert!(json["degraded"].is_string());
    assert_eq!(json["stats"]["claimants"], 0);

    test_db.cleanup().await;
}
