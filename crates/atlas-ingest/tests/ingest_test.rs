//! End-to-end ingestion against a live PostgreSQL server.
//!
//! Run with `cargo test -p atlas-ingest --test ingest_test -- --ignored`.

use std::fs;

use atlas_db::test_fixtures::TestDatabase;
use atlas_db::{BoundingBox, Error, SpatialEntity};
use atlas_ingest::{BoundaryIngestor, DocumentIngestor, IngestConfig, OcrPayload};
use serde_json::json;

fn boundary_dataset() -> serde_json::Value {
    json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"village_id": "OD-1", "name": "Kotagarh", "district": "Kandhamal"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[84.0, 20.0], [84.2, 20.0], [84.2, 20.2], [84.0, 20.2], [84.0, 20.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"VILLAGE_ID": 2, "NAME": "Baliguda", "DISTRICT": "Kandhamal"},
                "geometry": {"type": "Point", "coordinates": [84.08, 20.18]}
            }
        ]
    })
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_boundary_ingestion_is_idempotent() {
    let test_db = TestDatabase::new().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("villages.geojson");
    fs::write(&path, boundary_dataset().to_string()).unwrap();

    let ingestor = BoundaryIngestor::new(test_db.db.villages.clone(), IngestConfig::default());

    let first = ingestor.run(&path).await.unwrap();
    assert_eq!(first.imported, 2);
    assert_eq!(first.errored, 0);
    assert_eq!(first.total_villages, Some(2));

    let second = ingestor.run(&path).await.unwrap();
    assert_eq!(second.imported, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(second.total_villages, Some(2));

    let village = test_db
        .db
        .villages
        .get_by_external_id("2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(village.name, "Baliguda");
    assert_eq!(village.properties["VILLAGE_ID"], json!(2));

    // Both modes place the point village inside its own box.
    let bbox = BoundingBox::new(84.0, 20.1, 84.1, 20.2).unwrap();
    let rows = test_db
        .db
        .geometry
        .query_by_bounding_box(SpatialEntity::Village, &bbox, 10)
        .await
        .unwrap();
    assert!(rows.iter().any(|r| r.id == village.id));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_ocr_payload_creates_claimant_then_document() {
    let test_db = TestDatabase::fallback().await;
    let ingestor = BoundaryIngestor::new(test_db.db.villages.clone(), IngestConfig::default());
    ingestor.run_dataset(&boundary_dataset()).await.unwrap();
    let kotagarh = test_db
        .db
        .villages
        .get_by_external_id("OD-1")
        .await
        .unwrap()
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("001.json"),
        json!({
            "file": "scan1.pdf",
            "text": "FORM-A",
            "fields": {"claim_no": "K-17"},
            "confidence": 0.91,
            "claimant": {
                "name": "Sukru Kanhar",
                "type": "IFR",
                "tribe": "Kondh",
                "village": "Kotagarh",
                "area_ha": 1.5,
                "geometry": {"type": "Point", "coordinates": [84.1, 20.1]}
            }
        })
        .to_string(),
    )
    .unwrap();
    fs::write(
        dir.path().join("002.json"),
        json!({"file": "scan2.pdf", "confidence": 3.0}).to_string(),
    )
    .unwrap();
    fs::write(
        dir.path().join("003.json"),
        json!({"file": "scan3.pdf", "uploader": "field-team"}).to_string(),
    )
    .unwrap();

    let outcomes = DocumentIngestor::new(test_db.db.clone())
        .ingest_dir(dir.path())
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 3);

    let first = &outcomes[0];
    let claimant_id = first.claimant_id.expect("claimant created");
    let claimant = test_db.db.claimants.get(claimant_id).await.unwrap().unwrap();
    assert_eq!(claimant.village_id, Some(kotagarh.id));
    let doc = test_db
        .db
        .documents
        .get(first.document_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.claimant_id, Some(claimant_id));
    assert_eq!(doc.uploaded_by.as_deref(), Some("ocr-batch"));
    assert_eq!(doc.structured["claim_no"], "K-17");

    assert!(outcomes[1].error.is_some());
    assert!(outcomes[1].document_id.is_none());

    let third = test_db
        .db
        .documents
        .get(outcomes[2].document_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(third.uploaded_by.as_deref(), Some("field-team"));
    assert_eq!(third.claimant_id, None);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_failed_document_insert_leaves_no_claimant() {
    let test_db = TestDatabase::fallback().await;
    let ingestor = BoundaryIngestor::new(test_db.db.villages.clone(), IngestConfig::default());
    ingestor.run_dataset(&boundary_dataset()).await.unwrap();
    let kotagarh = test_db
        .db
        .villages
        .get_by_external_id("OD-1")
        .await
        .unwrap()
        .unwrap();

    // Document writes now fail after the claimant row is written.
    sqlx::query("DROP TABLE documents")
        .execute(&test_db.pool)
        .await
        .unwrap();

    let payload: OcrPayload = serde_json::from_value(json!({
        "file": "scan4.pdf",
        "claimant": {
            "name": "Mangal Majhi",
            "village": "Kotagarh",
            "geometry": {"type": "Point", "coordinates": [84.1, 20.1]}
        }
    }))
    .unwrap();
    let err = DocumentIngestor::new(test_db.db.clone())
        .ingest_payload(&payload)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Database(_)));

    let claimants = test_db
        .db
        .claimants
        .list_ids_for_village(kotagarh.id)
        .await
        .unwrap();
    assert!(claimants.is_empty());

    test_db.cleanup().await;
}
