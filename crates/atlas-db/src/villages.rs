//! Village repository implementation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;

use atlas_core::{
    Centroid, Error, Geometry, NewVillage, Result, SpatialEntity, Village, VillageIdentity,
    VillageMatch, VillageStore,
};

use crate::spatial::{ColumnWrite, GeometryStore, SpatialInsert};

/// PostgreSQL implementation of [`VillageStore`].
pub struct PgVillageRepository {
    pool: PgPool,
    geometry: Arc<dyn GeometryStore>,
}

impl PgVillageRepository {
    /// Create a repository over the mode-selected geometry strategy.
    pub fn new(pool: PgPool, geometry: Arc<dyn GeometryStore>) -> Self {
        Self { pool, geometry }
    }

    fn select_columns(&self) -> String {
        format!(
            "id, uid, external_id, name, state, district, block, properties, \
             {} AS geometry, {}, created_at, updated_at",
            self.geometry.geometry_select(SpatialEntity::Village),
            self.geometry.centroid_select(SpatialEntity::Village)
        )
    }

    fn map_row(&self, r: &PgRow) -> Result<Village> {
        Ok(Village {
            id: r.get("id"),
            uid: r.get("uid"),
            external_id: r.get("external_id"),
            name: r.get("name"),
            state: r.get("state"),
            district: r.get("district"),
            block: r.get("block"),
            properties: r.get("properties"),
            boundary: self.geometry.read_geometry(r)?,
            centroid: self.geometry.read_centroid(r)?,
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        })
    }

    /// Insert a village in one statement.
    ///
    /// Native mode derives the centroid in the store; fallback mode persists
    /// the supplied centroid, or one computed from point geometry.
    pub async fn insert(&self, village: &NewVillage) -> Result<i64> {
        village.validate()?;
        let properties = match &village.properties {
            JsonValue::Null => JsonValue::Object(Default::default()),
            other => other.clone(),
        };

        let insert = SpatialInsert::new(SpatialEntity::Village)
            .column(ColumnWrite::plain("external_id", village.external_id.clone()))
            .column(ColumnWrite::plain("name", village.name.trim()))
            .column(ColumnWrite::plain("state", village.state.clone()))
            .column(ColumnWrite::plain("district", village.district.clone()))
            .column(ColumnWrite::plain("block", village.block.clone()))
            .column(ColumnWrite::jsonb("properties", properties))
            .geometry(village.boundary.clone(), village.centroid);

        let id = self.geometry.insert(insert).await?;
        debug!(
            subsystem = "db",
            component = "villages",
            op = "insert",
            village_id = id,
            external_id = village.external_id.as_deref().unwrap_or(""),
            "Village inserted"
        );
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Village>> {
        let sql = format!("SELECT {} FROM villages WHERE id = $1", self.select_columns());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.map(|r| self.map_row(&r)).transpose()
    }

    pub async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Village>> {
        let sql = format!(
            "SELECT {} FROM villages WHERE external_id = $1",
            self.select_columns()
        );
        let row = sqlx::query(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.map(|r| self.map_row(&r)).transpose()
    }

    /// Id of the first village (by insertion order) with this exact name.
    pub async fn find_id_by_name(&self, name: &str) -> Result<Option<i64>> {
        sqlx::query_scalar("SELECT id FROM villages WHERE name = $1 ORDER BY id LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)
    }

    /// Replace the boundary of an existing village.
    pub async fn store_boundary(
        &self,
        id: i64,
        boundary: &Geometry,
        centroid: Option<Centroid>,
    ) -> Result<()> {
        self.geometry
            .store_geometry(SpatialEntity::Village, id, boundary, centroid)
            .await
    }

    /// Delete a village. Referencing claimants and assets keep their rows
    /// with `village_id` cleared.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM villages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl VillageStore for PgVillageRepository {
    async fn find_matching_village(
        &self,
        identity: &VillageIdentity,
    ) -> Result<Option<VillageMatch>> {
        let row = sqlx::query(
            r#"
            SELECT id, external_id FROM villages
            WHERE ($1::text IS NOT NULL AND external_id = $1)
               OR (name = $2 AND district IS NOT DISTINCT FROM $3)
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(&identity.external_id)
        .bind(&identity.name)
        .bind(&identity.district)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| VillageMatch {
            id: r.get("id"),
            external_id: r.get("external_id"),
        }))
    }

    async fn insert_village(&self, village: &NewVillage) -> Result<i64> {
        self.insert(village).await
    }

    async fn count_villages(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM villages")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }
}
