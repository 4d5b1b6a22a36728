//! PostGIS-backed geometry strategy.

use sqlx::PgPool;

use atlas_core::{defaults, Centroid, Geometry, GeometryMode, SpatialEntity};

use super::{ColumnWrite, GeometryStore, Placeholder};
use crate::query::QueryParam;

/// Geometry stored in PostGIS `geometry` columns (SRID 4326).
pub struct NativeGeometry {
    pool: PgPool,
}

impl NativeGeometry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn envelope() -> String {
    format!("ST_MakeEnvelope($1, $2, $3, $4, {})", defaults::SRID)
}

impl GeometryStore for NativeGeometry {
    fn mode(&self) -> GeometryMode {
        GeometryMode::Native
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn geometry_select(&self, entity: SpatialEntity) -> String {
        format!("ST_AsGeoJSON({})::jsonb", entity.geometry_column())
    }

    fn centroid_select(&self, entity: SpatialEntity) -> String {
        match entity {
            // Maintained by the centroid trigger.
            SpatialEntity::Village => {
                "ST_Y(centroid) AS centroid_lat, ST_X(centroid) AS centroid_lon".to_string()
            }
            SpatialEntity::Claimant | SpatialEntity::MicroAsset => {
                let column = entity.geometry_column();
                format!(
                    "ST_Y(ST_Centroid({col})) AS centroid_lat, ST_X(ST_Centroid({col})) AS centroid_lon",
                    col = column
                )
            }
        }
    }

    fn bbox_predicate(&self, entity: SpatialEntity) -> String {
        let column = entity.geometry_column();
        format!(
            "{col} && {env} AND ST_Intersects({col}, {env})",
            col = column,
            env = envelope()
        )
    }

    /// The centroid argument is ignored; the store derives it.
    fn geometry_writes(
        &self,
        entity: SpatialEntity,
        geometry: Option<&Geometry>,
        _centroid: Option<Centroid>,
    ) -> Vec<ColumnWrite> {
        vec![ColumnWrite {
            column: entity.geometry_column().to_string(),
            placeholder: Placeholder::GeoJson,
            param: QueryParam::Text(geometry.map(|g| g.to_json().to_string())),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn store() -> NativeGeometry {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/atlas")
            .unwrap();
        NativeGeometry::new(pool)
    }

    #[tokio::test]
    async fn test_bbox_predicate_uses_index_operator_and_intersects() {
        let sql = store().bbox_predicate(SpatialEntity::Village);
        assert_eq!(
            sql,
            "boundary && ST_MakeEnvelope($1, $2, $3, $4, 4326) \
             AND ST_Intersects(boundary, ST_MakeEnvelope($1, $2, $3, $4, 4326))"
        );
    }

    #[tokio::test]
    async fn test_village_centroid_reads_stored_column() {
        let sql = store().centroid_select(SpatialEntity::Village);
        assert!(sql.contains("ST_Y(centroid) AS centroid_lat"));
        let sql = store().centroid_select(SpatialEntity::Claimant);
        assert!(sql.contains("ST_Centroid(geom)"));
    }

    #[tokio::test]
    async fn test_geometry_write_is_geojson_text() {
        let geometry = Geometry::Point {
            coordinates: vec![85.8245, 20.2961],
        };
        let writes = store().geometry_writes(SpatialEntity::MicroAsset, Some(&geometry), None);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].column, "geom");
        assert_eq!(writes[0].placeholder, Placeholder::GeoJson);
        match &writes[0].param {
            QueryParam::Text(Some(text)) => assert!(text.contains("\"Point\"")),
            other => panic!("unexpected param {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_altitude_is_dropped_on_write() {
        let geometry = Geometry::Point {
            coordinates: vec![85.8245, 20.2961, 45.0],
        };
        let writes = store().geometry_writes(SpatialEntity::Claimant, Some(&geometry), None);
        assert_eq!(
            writes[0].placeholder.render(1),
            "ST_Force2D(ST_SetSRID(ST_GeomFromGeoJSON($1::text), 4326))"
        );
    }
}
