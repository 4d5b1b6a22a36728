//! Document repository implementation.

use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Row, Transaction};

use atlas_core::{Document, Error, NewDocument, Result};

/// PostgreSQL document repository. Documents carry no geometry.
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, doc: &NewDocument) -> Result<i64> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let id = self.insert_tx(&mut tx, doc).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(id)
    }

    /// Insert a document within an existing transaction.
    pub async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        doc: &NewDocument,
    ) -> Result<i64> {
        doc.validate()?;
        let structured = match &doc.structured {
            JsonValue::Null => JsonValue::Object(Default::default()),
            other => other.clone(),
        };

        sqlx::query_scalar(
            r#"
            INSERT INTO documents
                (external_id, claimant_id, filename, file_path, raw_text, structured,
                 ocr_confidence, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&doc.external_id)
        .bind(doc.claimant_id)
        .bind(&doc.filename)
        .bind(&doc.file_path)
        .bind(&doc.raw_text)
        .bind(structured)
        .bind(doc.ocr_confidence)
        .bind(&doc.uploaded_by)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT id, uid, external_id, claimant_id, filename, file_path, raw_text,
                   structured, ocr_confidence, uploaded_by, uploaded_at
            FROM documents
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| Document {
            id: r.get("id"),
            uid: r.get("uid"),
            external_id: r.get("external_id"),
            claimant_id: r.get("claimant_id"),
            filename: r.get("filename"),
            file_path: r.get("file_path"),
            raw_text: r.get("raw_text"),
            structured: r.get("structured"),
            ocr_confidence: r.get("ocr_confidence"),
            uploaded_by: r.get("uploaded_by"),
            uploaded_at: r.get("uploaded_at"),
        }))
    }

    pub async fn list_for_claimant(&self, claimant_id: i64) -> Result<Vec<i64>> {
        sqlx::query_scalar("SELECT id FROM documents WHERE claimant_id = $1 ORDER BY id")
            .bind(claimant_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }
}
