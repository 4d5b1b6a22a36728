//! Consistency and health reporting.
//!
//! Neither [`HealthReporter::get_stats`] nor [`HealthReporter::check_health`]
//! returns an error: failures are captured into the report so a monitoring
//! caller always gets a structured answer.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, warn};

use atlas_core::{
    Error, GeometryMode, HealthReport, HealthStatus, PoolStats, Result, StatsSource, TableCount,
    TableStats,
};

use crate::pool::pool_stats;
use crate::schema::TABLES;

/// Pool-backed [`StatsSource`].
pub struct PgStatsSource {
    pool: PgPool,
}

impl PgStatsSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatsSource for PgStatsSource {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// `table` comes from a fixed list, never from user input.
    async fn count_rows(&self, table: &str) -> Result<i64> {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }

    fn pool_stats(&self) -> Option<PoolStats> {
        Some(pool_stats(&self.pool))
    }
}

/// Builds statistics and health reports from a [`StatsSource`].
pub struct HealthReporter<S: StatsSource> {
    source: S,
    mode: GeometryMode,
    tables: Vec<String>,
}

impl<S: StatsSource> HealthReporter<S> {
    /// Report over every entity table.
    pub fn new(source: S, mode: GeometryMode) -> Self {
        Self {
            source,
            mode,
            tables: TABLES.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Override the tables counted by [`HealthReporter::get_stats`].
    pub fn with_tables(mut self, tables: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Row count per table; a failing table carries an error marker and the
    /// others are still counted.
    pub async fn get_stats(&self) -> TableStats {
        let mut stats = TableStats::new();
        for table in &self.tables {
            let entry = match self.source.count_rows(table).await {
                Ok(n) => TableCount::Count(n),
                Err(e) => {
                    warn!(
                        subsystem = "db",
                        component = "health",
                        db_table = %table,
                        error = %e,
                        "Row count failed"
                    );
                    TableCount::Error {
                        error: e.to_string(),
                    }
                }
            };
            stats.insert(table.clone(), entry);
        }
        stats
    }

    /// Liveness plus statistics. Never fails.
    pub async fn check_health(&self) -> HealthReport {
        let start = Instant::now();
        let degraded = self.mode.degraded_warning().map(str::to_string);

        let report = match self.source.ping().await {
            Ok(()) => HealthReport {
                status: HealthStatus::Healthy,
                timestamp: Utc::now(),
                geometry_mode: self.mode,
                degraded,
                pool: self.source.pool_stats(),
                stats: Some(self.get_stats().await),
                error: None,
            },
            Err(e) => HealthReport {
                status: HealthStatus::Unhealthy,
                timestamp: Utc::now(),
                geometry_mode: self.mode,
                degraded,
                pool: self.source.pool_stats(),
                stats: None,
                error: Some(e.to_string()),
            },
        };

        debug!(
            subsystem = "db",
            component = "health",
            op = "check_health",
            healthy = report.status == HealthStatus::Healthy,
            duration_ms = start.elapsed().as_millis() as u64,
            "Health check complete"
        );
        report
    }
}
