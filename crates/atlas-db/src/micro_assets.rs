//! Micro-asset repository implementation.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;

use atlas_core::{defaults, Error, MicroAsset, NewMicroAsset, Result, SpatialEntity};

use crate::spatial::{ColumnWrite, GeometryStore, SpatialInsert};

/// PostgreSQL micro-asset repository.
pub struct PgMicroAssetRepository {
    pool: PgPool,
    geometry: Arc<dyn GeometryStore>,
}

impl PgMicroAssetRepository {
    pub fn new(pool: PgPool, geometry: Arc<dyn GeometryStore>) -> Self {
        Self { pool, geometry }
    }

    fn map_row(&self, r: &PgRow) -> Result<MicroAsset> {
        let asset_type: String = r.get("asset_type");
        Ok(MicroAsset {
            id: r.get("id"),
            uid: r.get("uid"),
            external_id: r.get("external_id"),
            name: r.get("name"),
            asset_type: asset_type.parse().map_err(Error::Serialization)?,
            village_id: r.get("village_id"),
            district: r.get("district"),
            area_ha: r.get("area_ha"),
            status: r.get("status"),
            properties: r.get("properties"),
            geometry: self.geometry.read_geometry(r)?,
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        })
    }

    pub async fn insert(&self, asset: &NewMicroAsset) -> Result<i64> {
        asset.validate()?;
        let properties = match &asset.properties {
            JsonValue::Null => JsonValue::Object(Default::default()),
            other => other.clone(),
        };
        let status = asset
            .status
            .clone()
            .unwrap_or_else(|| defaults::MICRO_ASSET_STATUS.to_string());

        let insert = SpatialInsert::new(SpatialEntity::MicroAsset)
            .column(ColumnWrite::plain("external_id", asset.external_id.clone()))
            .column(ColumnWrite::plain("name", asset.name.clone()))
            .column(ColumnWrite::plain("asset_type", asset.asset_type.as_str()))
            .column(ColumnWrite::plain("village_id", asset.village_id))
            .column(ColumnWrite::plain("district", asset.district.clone()))
            .column(ColumnWrite::plain("area_ha", asset.area_ha))
            .column(ColumnWrite::plain("status", status))
            .column(ColumnWrite::jsonb("properties", properties))
            .geometry(asset.geometry.clone(), asset.centroid);

        let id = self.geometry.insert(insert).await?;
        debug!(
            subsystem = "db",
            component = "micro_assets",
            op = "insert",
            asset_id = id,
            asset_type = asset.asset_type.as_str(),
            "Micro-asset inserted"
        );
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<Option<MicroAsset>> {
        let sql = format!(
            r#"
            SELECT id, uid, external_id, name, asset_type, village_id, district,
                   area_ha::float8 AS area_ha, status, properties,
                   {} AS geometry, created_at, updated_at
            FROM micro_assets
            WHERE id = $1
            "#,
            self.geometry.geometry_select(SpatialEntity::MicroAsset)
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.map(|r| self.map_row(&r)).transpose()
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM micro_assets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
