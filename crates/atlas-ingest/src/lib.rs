//! # atlas-ingest
//!
//! Batch loaders for atlas.
//!
//! - [`BoundaryIngestor`] loads a GeoJSON FeatureCollection of village
//!   boundaries, deduplicating against existing villages and stopping once
//!   the per-record error budget is exhausted.
//! - [`DocumentIngestor`] loads OCR output files, creating a document and,
//!   when the payload carries claimant geometry, the claimant it belongs to.

pub mod boundary;
pub mod documents;

pub use boundary::{
    BoundaryIngestor, IngestConfig, IngestionSummary, RecordError, RecordFailure,
};
pub use documents::{DocumentIngestor, DocumentOutcome, OcrClaimant, OcrPayload};
