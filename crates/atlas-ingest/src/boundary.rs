//! Village boundary ingestion from GeoJSON.
//!
//! A single sequential pass over a FeatureCollection. Each feature becomes at
//! most one village; features matching an existing village (by external id,
//! or by name within the same district) are skipped, never updated. Record
//! failures are counted, and the pass stops once more than
//! [`IngestConfig::error_budget`] records have failed. Villages inserted
//! before the stop are kept.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info, warn};

use atlas_core::{defaults, Error, Geometry, NewVillage, Result, VillageStore};

/// Ingestion settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestConfig {
    /// Record failures tolerated before the pass stops.
    pub error_budget: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            error_budget: defaults::INGEST_ERROR_BUDGET,
        }
    }
}

impl IngestConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `INGEST_ERROR_BUDGET` | `10` | Failed records tolerated per run |
    pub fn from_env() -> Self {
        let error_budget = std::env::var("INGEST_ERROR_BUDGET")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::INGEST_ERROR_BUDGET);
        Self { error_budget }
    }

    pub fn with_error_budget(mut self, budget: usize) -> Self {
        self.error_budget = budget;
        self
    }
}

/// Why a single feature could not be ingested.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("feature is not a JSON object")]
    NotAFeature,

    #[error("missing village name")]
    MissingName,

    #[error("invalid geometry: {0}")]
    Geometry(String),

    #[error("store error: {0}")]
    Store(#[from] Error),
}

/// One failed record, kept for the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    /// Zero-based position in the feature array.
    pub index: usize,
    pub external_id: Option<String>,
    pub reason: String,
}

/// Result of one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestionSummary {
    pub imported: usize,
    pub skipped: usize,
    pub errored: usize,
    /// Set when the error budget stopped the pass early.
    pub aborted: bool,
    /// Village count after the pass; `None` when the count query failed.
    pub total_villages: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_error: Option<String>,
    pub failures: Vec<RecordFailure>,
}

enum Outcome {
    Imported,
    Skipped,
}

/// Loads village boundaries into a [`VillageStore`].
pub struct BoundaryIngestor {
    store: Arc<dyn VillageStore>,
    config: IngestConfig,
}

impl BoundaryIngestor {
    pub fn new(store: Arc<dyn VillageStore>, config: IngestConfig) -> Self {
        Self { store, config }
    }

    /// Ingest a GeoJSON FeatureCollection file.
    ///
    /// An unreadable or malformed dataset fails with [`Error::Ingestion`]
    /// before any record is touched; record failures only show up in the
    /// summary.
    pub async fn run(&self, dataset_path: impl AsRef<Path>) -> Result<IngestionSummary> {
        let path = dataset_path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Ingestion(format!("reading {}: {}", path.display(), e)))?;
        let dataset: JsonValue = serde_json::from_str(&raw)
            .map_err(|e| Error::Ingestion(format!("parsing {}: {}", path.display(), e)))?;

        info!(
            subsystem = "ingest",
            component = "boundary",
            op = "run",
            path = %path.display(),
            "Starting boundary ingestion"
        );
        self.run_dataset(&dataset).await
    }

    /// Ingest an already parsed FeatureCollection.
    ///
    /// Once the collection shape is accepted this always returns a summary,
    /// even when the store fails for every record and for the final count.
    pub async fn run_dataset(&self, dataset: &JsonValue) -> Result<IngestionSummary> {
        let features = dataset
            .get("features")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| {
                Error::Ingestion("dataset is not a GeoJSON FeatureCollection".to_string())
            })?;

        let start = Instant::now();
        let mut summary = IngestionSummary::default();

        for (index, feature) in features.iter().enumerate() {
            match self.ingest_feature(feature).await {
                Ok(Outcome::Imported) => summary.imported += 1,
                Ok(Outcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    summary.errored += 1;
                    let external_id = feature
                        .get("properties")
                        .and_then(JsonValue::as_object)
                        .and_then(|p| field(p, "village_id"));
                    warn!(
                        subsystem = "ingest",
                        component = "boundary",
                        index,
                        external_id = external_id.as_deref().unwrap_or(""),
                        error = %e,
                        "Feature rejected"
                    );
                    summary.failures.push(RecordFailure {
                        index,
                        external_id,
                        reason: e.to_string(),
                    });
                    if summary.errored > self.config.error_budget {
                        summary.aborted = true;
                        warn!(
                            subsystem = "ingest",
                            component = "boundary",
                            errored = summary.errored,
                            error_budget = self.config.error_budget,
                            "Error budget exhausted, stopping ingestion"
                        );
                        break;
                    }
                }
            }
        }

        match self.store.count_villages().await {
            Ok(count) => summary.total_villages = Some(count),
            Err(e) => {
                warn!(
                    subsystem = "ingest",
                    component = "boundary",
                    error = %e,
                    "Village count failed after ingestion"
                );
                summary.count_error = Some(e.to_string());
            }
        }

        info!(
            subsystem = "ingest",
            component = "boundary",
            op = "run",
            imported = summary.imported,
            skipped = summary.skipped,
            errored = summary.errored,
            aborted = summary.aborted,
            total_villages = summary.total_villages,
            duration_ms = start.elapsed().as_millis() as u64,
            "Boundary ingestion finished"
        );
        Ok(summary)
    }

    async fn ingest_feature(&self, feature: &JsonValue) -> std::result::Result<Outcome, RecordError> {
        let village = village_from_feature(feature)?;
        let identity = village.identity();

        if let Some(existing) = self.store.find_matching_village(&identity).await? {
            debug!(
                subsystem = "ingest",
                component = "boundary",
                name = %identity.name,
                district = identity.district.as_deref().unwrap_or(""),
                incoming_external_id = identity.external_id.as_deref().unwrap_or(""),
                existing_id = existing.id,
                existing_external_id = existing.external_id.as_deref().unwrap_or(""),
                "Village already present, skipping"
            );
            return Ok(Outcome::Skipped);
        }

        self.store.insert_village(&village).await?;
        Ok(Outcome::Imported)
    }
}

/// Read a property by key, falling back to its upper-case form.
///
/// Strings are trimmed and blank strings count as absent; numbers are
/// stringified.
fn field(properties: &Map<String, JsonValue>, key: &str) -> Option<String> {
    let value = properties
        .get(key)
        .filter(|v| !v.is_null())
        .or_else(|| properties.get(&key.to_uppercase()))?;
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        JsonValue::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Map one GeoJSON feature onto a village insert request.
fn village_from_feature(feature: &JsonValue) -> std::result::Result<NewVillage, RecordError> {
    let feature = feature.as_object().ok_or(RecordError::NotAFeature)?;
    let properties = feature
        .get("properties")
        .and_then(JsonValue::as_object)
        .cloned()
        .unwrap_or_default();

    let name = field(&properties, "name").ok_or(RecordError::MissingName)?;
    let boundary = Geometry::from_optional_json(feature.get("geometry"))
        .map_err(|e| RecordError::Geometry(e.to_string()))?;

    Ok(NewVillage {
        external_id: field(&properties, "village_id"),
        name,
        state: field(&properties, "state"),
        district: field(&properties, "district"),
        block: field(&properties, "block"),
        boundary,
        centroid: None,
        properties: JsonValue::Object(properties),
    })
}
