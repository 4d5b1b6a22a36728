//! JSONB geometry strategy for stores without PostGIS.
//!
//! Bounding-box results here are approximate: a row is tested by its scalar
//! centroid only, and a row with no centroid is always returned.

use sqlx::PgPool;

use atlas_core::{Centroid, Geometry, GeometryMode, SpatialEntity};

use super::{ColumnWrite, GeometryStore, Placeholder};
use crate::query::QueryParam;

const BBOX_PREDICATE: &str = "(centroid_lat BETWEEN $2 AND $4 OR centroid_lat IS NULL) \
     AND (centroid_lon BETWEEN $1 AND $3 OR centroid_lon IS NULL)";

/// Geometry stored as GeoJSON documents with scalar centroid columns.
pub struct FallbackGeometry {
    pool: PgPool,
}

impl FallbackGeometry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl GeometryStore for FallbackGeometry {
    fn mode(&self) -> GeometryMode {
        GeometryMode::Fallback
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn geometry_select(&self, entity: SpatialEntity) -> String {
        entity.geometry_column().to_string()
    }

    fn centroid_select(&self, _entity: SpatialEntity) -> String {
        "centroid_lat, centroid_lon".to_string()
    }

    fn bbox_predicate(&self, _entity: SpatialEntity) -> String {
        BBOX_PREDICATE.to_string()
    }

    /// Writes the document plus a centroid: the supplied one, else one
    /// derived locally from point geometry, else NULL.
    fn geometry_writes(
        &self,
        entity: SpatialEntity,
        geometry: Option<&Geometry>,
        centroid: Option<Centroid>,
    ) -> Vec<ColumnWrite> {
        let centroid = centroid.or_else(|| geometry.and_then(Geometry::local_centroid));
        let document = match geometry {
            Some(g) => QueryParam::Json(g.to_json()),
            None => QueryParam::Text(None),
        };
        vec![
            ColumnWrite {
                column: entity.geometry_column().to_string(),
                placeholder: Placeholder::Jsonb,
                param: document,
            },
            ColumnWrite::plain("centroid_lat", centroid.map(|c| c.lat)),
            ColumnWrite::plain("centroid_lon", centroid.map(|c| c.lon)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn store() -> FallbackGeometry {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/atlas")
            .unwrap();
        FallbackGeometry::new(pool)
    }

    fn square() -> Geometry {
        Geometry::Polygon {
            coordinates: vec![vec![
                vec![77.0, 20.0],
                vec![78.0, 20.0],
                vec![78.0, 21.0],
                vec![77.0, 21.0],
                vec![77.0, 20.0],
            ]],
        }
    }

    #[tokio::test]
    async fn test_bbox_predicate_keeps_rows_without_centroid() {
        let sql = store().bbox_predicate(SpatialEntity::Claimant);
        assert!(sql.contains("centroid_lat BETWEEN $2 AND $4 OR centroid_lat IS NULL"));
        assert!(sql.contains("centroid_lon BETWEEN $1 AND $3 OR centroid_lon IS NULL"));
    }

    #[tokio::test]
    async fn test_supplied_centroid_is_written() {
        let centroid = Centroid::new(20.5, 77.5).unwrap();
        let writes =
            store().geometry_writes(SpatialEntity::Village, Some(&square()), Some(centroid));
        assert_eq!(writes[0].column, "boundary");
        assert_eq!(writes[0].placeholder, Placeholder::Jsonb);
        assert_eq!(writes[1].param, QueryParam::Float(Some(20.5)));
        assert_eq!(writes[2].param, QueryParam::Float(Some(77.5)));
    }

    #[tokio::test]
    async fn test_polygon_without_supplied_centroid_writes_null() {
        let writes = store().geometry_writes(SpatialEntity::Village, Some(&square()), None);
        assert_eq!(writes[1].param, QueryParam::Float(None));
        assert_eq!(writes[2].param, QueryParam::Float(None));
    }

    #[tokio::test]
    async fn test_point_centroid_derived_locally() {
        let point = Geometry::Point {
            coordinates: vec![85.8245, 20.2961],
        };
        let writes = store().geometry_writes(SpatialEntity::MicroAsset, Some(&point), None);
        assert_eq!(writes[1].param, QueryParam::Float(Some(20.2961)));
        assert_eq!(writes[2].param, QueryParam::Float(Some(85.8245)));
    }

    #[tokio::test]
    async fn test_missing_geometry_writes_sql_null() {
        let writes = store().geometry_writes(SpatialEntity::Claimant, None, None);
        assert_eq!(writes[0].param, QueryParam::Text(None));
    }
}
