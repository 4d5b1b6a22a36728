//! Claimant repository implementation.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::debug;

use atlas_core::{Claimant, Error, NewClaimant, Result, SpatialEntity};

use crate::spatial::{ColumnWrite, GeometryStore, SpatialInsert};

/// PostgreSQL claimant repository.
pub struct PgClaimantRepository {
    pool: PgPool,
    geometry: Arc<dyn GeometryStore>,
}

impl PgClaimantRepository {
    pub fn new(pool: PgPool, geometry: Arc<dyn GeometryStore>) -> Self {
        Self { pool, geometry }
    }

    fn map_row(&self, r: &PgRow) -> Result<Claimant> {
        let claimant_type: String = r.get("claimant_type");
        let status: String = r.get("status");
        Ok(Claimant {
            id: r.get("id"),
            uid: r.get("uid"),
            external_id: r.get("external_id"),
            name: r.get("name"),
            claimant_type: claimant_type.parse().map_err(Error::Serialization)?,
            tribal_group: r.get("tribal_group"),
            village_id: r.get("village_id"),
            area_ha: r.get("area_ha"),
            status: status.parse().map_err(Error::Serialization)?,
            properties: r.get("properties"),
            geometry: self.geometry.read_geometry(r)?,
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        })
    }

    fn spatial_insert(claimant: &NewClaimant) -> Result<SpatialInsert> {
        claimant.validate()?;
        let properties = match &claimant.properties {
            JsonValue::Null => JsonValue::Object(Default::default()),
            other => other.clone(),
        };

        Ok(SpatialInsert::new(SpatialEntity::Claimant)
            .column(ColumnWrite::plain("external_id", claimant.external_id.clone()))
            .column(ColumnWrite::plain("name", claimant.name.trim()))
            .column(ColumnWrite::plain(
                "claimant_type",
                claimant.claimant_type.as_str(),
            ))
            .column(ColumnWrite::plain("tribal_group", claimant.tribal_group.clone()))
            .column(ColumnWrite::plain("village_id", claimant.village_id))
            .column(ColumnWrite::plain("area_ha", claimant.area_ha))
            .column(ColumnWrite::plain("status", claimant.status.as_str()))
            .column(ColumnWrite::jsonb("properties", properties))
            .geometry(claimant.geometry.clone(), claimant.centroid))
    }

    pub async fn insert(&self, claimant: &NewClaimant) -> Result<i64> {
        let id = self.geometry.insert(Self::spatial_insert(claimant)?).await?;
        debug!(
            subsystem = "db",
            component = "claimants",
            op = "insert",
            claimant_id = id,
            village_id = claimant.village_id,
            "Claimant inserted"
        );
        Ok(id)
    }

    /// Insert a claimant within an existing transaction.
    pub async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        claimant: &NewClaimant,
    ) -> Result<i64> {
        self.geometry
            .insert_tx(tx, Self::spatial_insert(claimant)?)
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Option<Claimant>> {
        let sql = format!(
            r#"
            SELECT id, uid, external_id, name, claimant_type, tribal_group, village_id,
                   area_ha::float8 AS area_ha, status, properties,
                   {} AS geometry, created_at, updated_at
            FROM claimants
            WHERE id = $1
            "#,
            self.geometry.geometry_select(SpatialEntity::Claimant)
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.map(|r| self.map_row(&r)).transpose()
    }

    /// Claimants attached to a village, in insertion order.
    pub async fn list_ids_for_village(&self, village_id: i64) -> Result<Vec<i64>> {
        sqlx::query_scalar("SELECT id FROM claimants WHERE village_id = $1 ORDER BY id")
            .bind(village_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM claimants WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
