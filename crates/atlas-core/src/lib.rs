//! # atlas-core
//!
//! Core types, traits, and abstractions for the atlas spatial record store.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other atlas crates depend on: entity models, GeoJSON geometry
//! values, the capability flags that select a schema variant, and the error
//! type.
//!
//! ## Logging
//!
//! Every crate logs through `tracing` with the structured fields
//! `subsystem` (`db`, `ingest`, `cli`), `component`, `op` and, for timed
//! operations, `duration_ms`.
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Fatal startup failure |
//! | WARN  | Recoverable issue with a fallback applied (missing extension, index failure, degraded mode, rejected record) |
//! | INFO  | Lifecycle events (pool, provisioning, ingestion summary) |
//! | DEBUG | Decision points (skip reasons, selected geometry mode, pool metrics) |

pub mod capability;
pub mod defaults;
pub mod error;
pub mod geometry;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use capability::{Capabilities, Extension, GeometryMode};
pub use error::{Error, Result};
pub use geometry::{BoundingBox, Centroid, Geometry, Position};
pub use models::*;
pub use traits::*;
