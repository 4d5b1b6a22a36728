//! # atlas-db
//!
//! PostgreSQL storage layer for atlas.
//!
//! This crate provides:
//! - Connection pool management
//! - A startup capability probe for optional extensions (PostGIS, pg_trgm, ...)
//! - Idempotent schema provisioning in a native (PostGIS) or fallback (JSONB)
//!   geometry layout
//! - A geometry strategy that hides the layout from every query path
//! - Repositories for villages, claimants, micro-assets and documents
//! - Health and row-count reporting
//!
//! ## Example
//!
//! ```rust,ignore
//! use atlas_db::{BoundingBox, Database, SpatialEntity};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/atlas").await?;
//!     db.provisioner().initialize_schema().await?;
//!
//!     let bbox = BoundingBox::new(77.0, 20.0, 78.0, 21.0)?;
//!     let rows = db
//!         .geometry
//!         .query_by_bounding_box(SpatialEntity::Village, &bbox, 100)
//!         .await?;
//!     println!("{} villages in view", rows.len());
//!     Ok(())
//! }
//! ```

pub mod capability;
pub mod claimants;
pub mod documents;
pub mod health;
pub mod micro_assets;
pub mod pool;
pub mod query;
pub mod schema;
pub mod spatial;
pub mod villages;

pub mod test_fixtures;

use std::sync::Arc;

use sqlx::PgPool;

pub use atlas_core::*;
pub use capability::CapabilityProber;
pub use claimants::PgClaimantRepository;
pub use documents::PgDocumentRepository;
pub use health::{HealthReporter, PgStatsSource};
pub use micro_assets::PgMicroAssetRepository;
pub use pool::{connect_pool, pool_stats, PoolConfig};
pub use query::QueryParam;
pub use schema::{ProvisioningReport, SchemaPlan, SchemaProvisioner, TABLES};
pub use spatial::{
    strategy_for, ColumnWrite, FallbackGeometry, GeometryStore, NativeGeometry, SpatialInsert,
};
pub use villages::PgVillageRepository;

/// Database handle with capabilities resolved and repositories wired to the
/// matching geometry strategy.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: PgPool,
    /// Probed once; never re-read.
    pub capabilities: Capabilities,
    /// Geometry strategy for the probed mode.
    pub geometry: Arc<dyn GeometryStore>,
    pub villages: Arc<PgVillageRepository>,
    pub claimants: Arc<PgClaimantRepository>,
    pub micro_assets: Arc<PgMicroAssetRepository>,
    pub documents: Arc<PgDocumentRepository>,
}

impl Database {
    /// Wire repositories for known capabilities without probing.
    pub fn with_capabilities(pool: PgPool, capabilities: Capabilities) -> Self {
        let geometry = strategy_for(capabilities.geometry_mode(), pool.clone());
        Self {
            villages: Arc::new(PgVillageRepository::new(pool.clone(), geometry.clone())),
            claimants: Arc::new(PgClaimantRepository::new(pool.clone(), geometry.clone())),
            micro_assets: Arc::new(PgMicroAssetRepository::new(pool.clone(), geometry.clone())),
            documents: Arc::new(PgDocumentRepository::new(pool.clone())),
            pool,
            capabilities,
            geometry,
        }
    }

    /// Probe the store and wire repositories for the resulting mode.
    pub async fn initialize(pool: PgPool) -> Result<Self> {
        let capabilities = CapabilityProber::new(pool.clone()).probe().await?;
        Ok(Self::with_capabilities(pool, capabilities))
    }

    /// Connect with pool settings from the environment, then probe.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = connect_pool(database_url, &PoolConfig::from_env()).await?;
        Self::initialize(pool).await
    }

    pub fn mode(&self) -> GeometryMode {
        self.capabilities.geometry_mode()
    }

    pub fn provisioner(&self) -> SchemaProvisioner {
        SchemaProvisioner::new(self.pool.clone(), self.capabilities)
    }

    pub fn health(&self) -> HealthReporter<PgStatsSource> {
        HealthReporter::new(PgStatsSource::new(self.pool.clone()), self.mode())
    }
}
