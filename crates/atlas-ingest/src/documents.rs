//! OCR output ingestion.
//!
//! Each input file is one JSON payload produced by the OCR batch:
//!
//! ```json
//! {
//!   "file": "scan1.pdf",
//!   "file_path": "/scans/scan1.pdf",
//!   "text": "...",
//!   "fields": {"claimant_name": "..."},
//!   "confidence": 0.87,
//!   "uploader": "ocr-batch",
//!   "claimant": {
//!     "name": "...", "type": "IFR", "tribe": "...", "village": "...",
//!     "area_ha": 1.5, "geometry": {...}, "properties": {...}
//!   }
//! }
//! ```
//!
//! A claimant is only created when the payload carries claimant geometry. It
//! is inserted before the document so the document can reference it, and
//! both rows commit in one transaction.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use atlas_core::{
    defaults, ClaimStatus, ClaimantType, Error, Geometry, NewClaimant, NewDocument, Result,
};
use atlas_db::Database;

/// Claimant details extracted by OCR.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OcrClaimant {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub claimant_type: Option<String>,
    pub tribe: Option<String>,
    /// Village name, resolved to the first village with that exact name.
    pub village: Option<String>,
    pub area_ha: Option<f64>,
    pub geometry: Option<JsonValue>,
    #[serde(default)]
    pub properties: JsonValue,
}

impl OcrClaimant {
    /// Build the claimant insert, or `None` when there is no geometry.
    pub fn to_new_claimant(&self, village_id: Option<i64>) -> Result<Option<NewClaimant>> {
        let geometry = match Geometry::from_optional_json(self.geometry.as_ref())? {
            Some(g) => g,
            None => return Ok(None),
        };
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::InvalidInput("claimant name is required".to_string()))?;
        let claimant_type = match self.claimant_type.as_deref() {
            Some(t) => t.parse::<ClaimantType>().map_err(Error::InvalidInput)?,
            None => ClaimantType::Individual,
        };

        let claimant = NewClaimant {
            external_id: None,
            name: name.to_string(),
            claimant_type,
            tribal_group: self.tribe.clone(),
            village_id,
            area_ha: self.area_ha,
            status: ClaimStatus::default(),
            properties: self.properties.clone(),
            geometry: Some(geometry),
            centroid: None,
        };
        claimant.validate()?;
        Ok(Some(claimant))
    }
}

/// One OCR output file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OcrPayload {
    pub file: Option<String>,
    pub file_path: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub fields: JsonValue,
    pub confidence: Option<f64>,
    pub uploader: Option<String>,
    pub claimant: Option<OcrClaimant>,
}

impl OcrPayload {
    pub fn to_new_document(&self, claimant_id: Option<i64>) -> NewDocument {
        NewDocument {
            external_id: None,
            claimant_id,
            filename: self.file.clone(),
            file_path: self.file_path.clone(),
            raw_text: self.text.clone(),
            structured: self.fields.clone(),
            ocr_confidence: self.confidence,
            uploaded_by: Some(
                self.uploader
                    .clone()
                    .unwrap_or_else(|| defaults::OCR_UPLOADER.to_string()),
            ),
        }
    }
}

/// What happened to one input file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentOutcome {
    pub path: PathBuf,
    pub document_id: Option<i64>,
    pub claimant_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Loads OCR payload files.
pub struct DocumentIngestor {
    db: Database,
}

impl DocumentIngestor {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Ingest one payload file.
    ///
    /// The whole payload is validated before the first insert.
    pub async fn ingest_file(&self, path: impl AsRef<Path>) -> Result<DocumentOutcome> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Ingestion(format!("reading {}: {}", path.display(), e)))?;
        let payload: OcrPayload = serde_json::from_str(&raw)
            .map_err(|e| Error::Ingestion(format!("parsing {}: {}", path.display(), e)))?;

        self.ingest_payload(&payload)
            .await
            .map(|(document_id, claimant_id)| DocumentOutcome {
                path: path.to_path_buf(),
                document_id: Some(document_id),
                claimant_id,
                error: None,
            })
    }

    /// Insert an already parsed payload; returns `(document_id, claimant_id)`.
    pub async fn ingest_payload(&self, payload: &OcrPayload) -> Result<(i64, Option<i64>)> {
        payload.to_new_document(None).validate()?;

        let mut claimant = None;
        if let Some(ocr_claimant) = &payload.claimant {
            // Validate with a placeholder village before any lookup or insert.
            if ocr_claimant.to_new_claimant(None)?.is_some() {
                let village_id = match ocr_claimant.village.as_deref() {
                    Some(name) => self.db.villages.find_id_by_name(name.trim()).await?,
                    None => None,
                };
                claimant = ocr_claimant.to_new_claimant(village_id)?;
            }
        }

        let mut tx = self.db.pool.begin().await.map_err(Error::Database)?;
        let claimant_id = match &claimant {
            Some(c) => Some(self.db.claimants.insert_tx(&mut tx, c).await?),
            None => None,
        };
        let document_id = self
            .db
            .documents
            .insert_tx(&mut tx, &payload.to_new_document(claimant_id))
            .await?;
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "ingest",
            component = "documents",
            op = "ingest_payload",
            document_id,
            claimant_id,
            "Document ingested"
        );
        Ok((document_id, claimant_id))
    }

    /// Ingest every `*.json` file in `dir`, in file-name order.
    ///
    /// A failing file is recorded in its outcome and the rest still run.
    pub async fn ingest_dir(&self, dir: impl AsRef<Path>) -> Result<Vec<DocumentOutcome>> {
        let dir = dir.as_ref();
        let start = Instant::now();
        let files = json_files(dir).await?;

        let mut outcomes = Vec::with_capacity(files.len());
        for path in files {
            let outcome = match self.ingest_file(&path).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        subsystem = "ingest",
                        component = "documents",
                        path = %path.display(),
                        error = %e,
                        "OCR payload rejected"
                    );
                    DocumentOutcome {
                        path,
                        document_id: None,
                        claimant_id: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        info!(
            subsystem = "ingest",
            component = "documents",
            op = "ingest_dir",
            dir = %dir.display(),
            files = outcomes.len(),
            failed = outcomes.iter().filter(|o| o.error.is_some()).count(),
            duration_ms = start.elapsed().as_millis() as u64,
            "OCR directory ingested"
        );
        Ok(outcomes)
    }
}

/// `*.json` files directly inside `dir`, sorted by file name.
async fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::Ingestion(format!("reading {}: {}", dir.display(), e)))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: JsonValue) -> OcrPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_document_defaults_uploader() {
        let p = payload(json!({"file": "scan1.pdf", "text": "Form B", "fields": {"a": 1}}));
        let doc = p.to_new_document(Some(4));
        assert_eq!(doc.uploaded_by.as_deref(), Some("ocr-batch"));
        assert_eq!(doc.claimant_id, Some(4));
        assert_eq!(doc.filename.as_deref(), Some("scan1.pdf"));
        assert_eq!(doc.structured, json!({"a": 1}));
    }

    #[test]
    fn test_confidence_out_of_range_is_rejected() {
        let p = payload(json!({"file": "scan2.pdf", "confidence": 1.4}));
        assert!(matches!(
            p.to_new_document(None).validate(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_claimant_without_geometry_is_not_created() {
        let p = payload(json!({
            "claimant": {"name": "Sukru Kanhar", "type": "IFR", "geometry": null}
        }));
        let claimant = p.claimant.unwrap().to_new_claimant(None).unwrap();
        assert!(claimant.is_none());
    }

    #[test]
    fn test_claimant_fields_are_mapped() {
        let p = payload(json!({
            "claimant": {
                "name": " Sukru Kanhar ",
                "type": "CFR",
                "tribe": "Kondh",
                "village": "Kotagarh",
                "area_ha": 2.5,
                "geometry": {"type": "Point", "coordinates": [84.1, 20.1]},
                "properties": {"survey_no": "112/3"}
            }
        }));
        let claimant = p
            .claimant
            .unwrap()
            .to_new_claimant(Some(9))
            .unwrap()
            .unwrap();
        assert_eq!(claimant.name, "Sukru Kanhar");
        assert_eq!(claimant.claimant_type, ClaimantType::Community);
        assert_eq!(claimant.tribal_group.as_deref(), Some("Kondh"));
        assert_eq!(claimant.village_id, Some(9));
        assert_eq!(claimant.status, ClaimStatus::Pending);
        assert_eq!(claimant.properties["survey_no"], "112/3");
    }

    #[test]
    fn test_claimant_type_defaults_and_validates() {
        let geometry = json!({"type": "Point", "coordinates": [84.1, 20.1]});
        let c = OcrClaimant {
            name: Some("A".to_string()),
            geometry: Some(geometry.clone()),
            ..Default::default()
        };
        let claimant = c.to_new_claimant(None).unwrap().unwrap();
        assert_eq!(claimant.claimant_type, ClaimantType::Individual);

        let c = OcrClaimant {
            name: Some("A".to_string()),
            claimant_type: Some("XFR".to_string()),
            geometry: Some(geometry),
            ..Default::default()
        };
        assert!(matches!(c.to_new_claimant(None), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_claimant_bad_geometry_is_error() {
        let c = OcrClaimant {
            name: Some("A".to_string()),
            geometry: Some(json!({"type": "Point", "coordinates": "x"})),
            ..Default::default()
        };
        assert!(matches!(c.to_new_claimant(None), Err(Error::Geometry(_))));
    }

    #[tokio::test]
    async fn test_json_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.json", "a.json", "notes.txt"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let files = json_files(dir.path()).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[tokio::test]
    async fn test_missing_dir_is_ingestion_error() {
        let err = json_files(Path::new("/nonexistent/ocr_output"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Ingestion(_)));
    }
}
