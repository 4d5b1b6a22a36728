//! Startup capability probe.
//!
//! Enables each optional extension in [`Extension::PROBE_ORDER`] and records
//! which ones took. The result is computed once during initialization and
//! passed by value to everything that depends on the schema shape.

use std::time::Instant;

use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};

use atlas_core::{Capabilities, Error, Extension, Result};

/// Extension that supplies `gen_random_uuid()` on PostgreSQL < 13.
const UUID_EXTENSION: &str = "pgcrypto";

/// Probes optional store extensions.
pub struct CapabilityProber {
    pool: PgPool,
}

impl CapabilityProber {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the probe.
    ///
    /// Optional extension failures are logged and swallowed. Fails with
    /// [`Error::Capability`] only when the store is unreachable or cannot
    /// generate UUIDs, both of which every table depends on.
    pub async fn probe(&self) -> Result<Capabilities> {
        let start = Instant::now();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Capability(format!("store unreachable: {}", e)))?;

        self.ensure_uuid_generation().await?;

        let mut caps = Capabilities::none();
        for extension in Extension::PROBE_ORDER {
            let available = self.enable(extension).await;
            caps.set(extension, available);
        }

        info!(
            subsystem = "db",
            component = "capability",
            op = "probe",
            trigram = caps.trigram,
            btree_gist = caps.btree_gist,
            postgis = caps.postgis,
            postgis_topology = caps.postgis_topology,
            geometry_mode = %caps.geometry_mode(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Capability probe complete"
        );

        if let Some(warning) = caps.geometry_mode().degraded_warning() {
            warn!(
                subsystem = "db",
                component = "capability",
                geometry_mode = %caps.geometry_mode(),
                "{}",
                warning
            );
        }

        Ok(caps)
    }

    /// Try to enable one extension; `false` means unavailable.
    async fn enable(&self, extension: Extension) -> bool {
        match sqlx::query(&enable_statement(extension.name()))
            .execute(&self.pool)
            .await
        {
            Ok(_) => {
                debug!(
                    subsystem = "db",
                    component = "capability",
                    extension = extension.name(),
                    "Extension enabled"
                );
                true
            }
            Err(e) => {
                // Lacking CREATE privilege is fine if an operator installed it.
                let installed = self.is_installed(extension.name()).await;
                if !installed {
                    warn!(
                        subsystem = "db",
                        component = "capability",
                        extension = extension.name(),
                        error = %e,
                        "Optional extension unavailable"
                    );
                }
                installed
            }
        }
    }

    async fn is_installed(&self, name: &str) -> bool {
        sqlx::query("SELECT EXISTS(SELECT 1 FROM pg_extension WHERE extname = $1) AS installed")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map(|row| row.get::<bool, _>("installed"))
            .unwrap_or(false)
    }

    async fn uuid_generation_works(&self) -> bool {
        sqlx::query("SELECT gen_random_uuid()")
            .execute(&self.pool)
            .await
            .is_ok()
    }

    async fn ensure_uuid_generation(&self) -> Result<()> {
        if self.uuid_generation_works().await {
            return Ok(());
        }

        if let Err(e) = sqlx::query(&enable_statement(UUID_EXTENSION))
            .execute(&self.pool)
            .await
        {
            warn!(
                subsystem = "db",
                component = "capability",
                extension = UUID_EXTENSION,
                error = %e,
                "Could not enable UUID extension"
            );
        }

        if self.uuid_generation_works().await {
            Ok(())
        } else {
            Err(Error::Capability(
                "gen_random_uuid() is unavailable (requires PostgreSQL 13+ or pgcrypto)"
                    .to_string(),
            ))
        }
    }
}

fn enable_statement(name: &str) -> String {
    format!("CREATE EXTENSION IF NOT EXISTS {}", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_statement_is_idempotent_form() {
        assert_eq!(
            enable_statement(Extension::Postgis.name()),
            "CREATE EXTENSION IF NOT EXISTS postgis"
        );
        assert_eq!(
            enable_statement(UUID_EXTENSION),
            "CREATE EXTENSION IF NOT EXISTS pgcrypto"
        );
    }
}
