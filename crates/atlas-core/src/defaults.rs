//! Centralized default constants for atlas.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// DATABASE POOL
// =============================================================================

/// Default maximum number of connections in the pool.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Default connection acquire timeout in seconds.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout in seconds.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default maximum connection lifetime in seconds (30 minutes).
pub const DB_MAX_LIFETIME_SECS: u64 = 1800;

// =============================================================================
// SPATIAL
// =============================================================================

/// Spatial reference identifier for every stored geometry (WGS 84).
pub const SRID: i32 = 4326;

/// Default result cap for bounding-box queries.
pub const BBOX_LIMIT: i64 = 100;

/// Hard ceiling for bounding-box query limits.
pub const BBOX_LIMIT_MAX: i64 = 10_000;

// =============================================================================
// INGESTION
// =============================================================================

/// Tolerated per-record failures before a boundary ingestion run aborts.
/// The run stops on the failure that pushes the count past this value.
pub const INGEST_ERROR_BUDGET: usize = 10;

/// Uploader recorded for OCR documents that do not name one.
pub const OCR_UPLOADER: &str = "ocr-batch";

/// Default status for new micro-assets.
pub const MICRO_ASSET_STATUS: &str = "active";
