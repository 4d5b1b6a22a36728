//! Core traits for atlas abstractions.
//!
//! These traits define the seams between the ingestion/health logic and the
//! Postgres implementations, so the logic can be exercised against in-memory
//! stores in tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{NewVillage, PoolStats, VillageIdentity, VillageMatch};

/// Village persistence needed by boundary ingestion.
#[async_trait]
pub trait VillageStore: Send + Sync {
    /// First village matching by external id OR by (name, district).
    async fn find_matching_village(
        &self,
        identity: &VillageIdentity,
    ) -> Result<Option<VillageMatch>>;

    /// Insert a village and return its id.
    async fn insert_village(&self, village: &NewVillage) -> Result<i64>;

    /// Total number of villages.
    async fn count_villages(&self) -> Result<i64>;
}

/// Source of liveness and row-count information for health reporting.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Trivial round trip to the store.
    async fn ping(&self) -> Result<()>;

    /// Row count of a table.
    async fn count_rows(&self, table: &str) -> Result<i64>;

    /// Connection pool snapshot, if the source is pool-backed.
    fn pool_stats(&self) -> Option<PoolStats> {
        None
    }
}
