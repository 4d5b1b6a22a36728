//! Geometry access strategy.
//!
//! [`GeometryStore`] is the single interface every query and insert path
//! uses for geometry. Two implementations exist, one per [`GeometryMode`]:
//!
//! - [`NativeGeometry`]: PostGIS columns. Bounding-box queries are true
//!   intersection tests served by the GiST index; the village centroid is
//!   derived by a store trigger.
//! - [`FallbackGeometry`]: GeoJSON JSONB plus scalar `centroid_lat` /
//!   `centroid_lon`. Bounding-box queries are a range test on the centroid
//!   fields that never excludes a row without a centroid.
//!
//! The implementation is picked once by [`strategy_for`] from the probed
//! capabilities. Implementations only supply SQL fragments; the operations
//! themselves are provided methods shared by both.

mod fallback;
mod native;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::debug;

use atlas_core::{
    defaults, BoundingBox, Centroid, Error, Geometry, GeometryMode, Result, SpatialEntity,
    SpatialRecord,
};

use crate::query::{bind_all, QueryParam};

pub use fallback::FallbackGeometry;
pub use native::NativeGeometry;

/// How a written value is wrapped around its placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `$n`
    Plain,
    /// `$n::jsonb`
    Jsonb,
    /// `ST_Force2D(ST_SetSRID(ST_GeomFromGeoJSON($n::text), 4326))`
    ///
    /// Altitude is dropped; spatial columns are two-dimensional.
    GeoJson,
}

impl Placeholder {
    pub fn render(&self, n: usize) -> String {
        match self {
            Self::Plain => format!("${}", n),
            Self::Jsonb => format!("${}::jsonb", n),
            Self::GeoJson => format!(
                "ST_Force2D(ST_SetSRID(ST_GeomFromGeoJSON(${}::text), {}))",
                n,
                defaults::SRID
            ),
        }
    }
}

/// One column assignment in an INSERT or UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnWrite {
    pub column: String,
    pub placeholder: Placeholder,
    pub param: QueryParam,
}

impl ColumnWrite {
    pub fn plain(column: &str, param: impl Into<QueryParam>) -> Self {
        Self {
            column: column.to_string(),
            placeholder: Placeholder::Plain,
            param: param.into(),
        }
    }

    pub fn jsonb(column: &str, value: JsonValue) -> Self {
        Self {
            column: column.to_string(),
            placeholder: Placeholder::Jsonb,
            param: QueryParam::Json(value),
        }
    }
}

/// A spatial row to insert: attribute columns plus geometry.
#[derive(Debug, Clone)]
pub struct SpatialInsert {
    pub entity: SpatialEntity,
    pub columns: Vec<ColumnWrite>,
    pub geometry: Option<Geometry>,
    /// Caller-supplied centroid (fallback mode only).
    pub centroid: Option<Centroid>,
}

impl SpatialInsert {
    pub fn new(entity: SpatialEntity) -> Self {
        Self {
            entity,
            columns: Vec::new(),
            geometry: None,
            centroid: None,
        }
    }

    pub fn column(mut self, write: ColumnWrite) -> Self {
        self.columns.push(write);
        self
    }

    pub fn geometry(mut self, geometry: Option<Geometry>, centroid: Option<Centroid>) -> Self {
        self.geometry = geometry;
        self.centroid = centroid;
        self
    }
}

/// Build `INSERT ... RETURNING id` for a set of column writes.
pub(crate) fn insert_sql(table: &str, writes: &[ColumnWrite]) -> String {
    let columns: Vec<&str> = writes.iter().map(|w| w.column.as_str()).collect();
    let values: Vec<String> = writes
        .iter()
        .enumerate()
        .map(|(i, w)| w.placeholder.render(i + 1))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING id",
        table,
        columns.join(", "),
        values.join(", ")
    )
}

/// Build `UPDATE ... WHERE id = $last` for a set of column writes.
pub(crate) fn update_sql(table: &str, writes: &[ColumnWrite]) -> String {
    let assignments: Vec<String> = writes
        .iter()
        .enumerate()
        .map(|(i, w)| format!("{} = {}", w.column, w.placeholder.render(i + 1)))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE id = ${}",
        table,
        assignments.join(", "),
        writes.len() + 1
    )
}

/// Mode-independent geometry access.
#[async_trait]
pub trait GeometryStore: Send + Sync {
    /// The schema variant this strategy targets.
    fn mode(&self) -> GeometryMode;

    fn pool(&self) -> &PgPool;

    /// SQL expression yielding the entity geometry as GeoJSON `jsonb`.
    fn geometry_select(&self, entity: SpatialEntity) -> String;

    /// Select-list fragment yielding `centroid_lat` and `centroid_lon`.
    fn centroid_select(&self, entity: SpatialEntity) -> String;

    /// WHERE predicate over `$1..$4` = min_lon, min_lat, max_lon, max_lat.
    fn bbox_predicate(&self, entity: SpatialEntity) -> String;

    /// Column writes that persist a geometry (and centroid where applicable).
    fn geometry_writes(
        &self,
        entity: SpatialEntity,
        geometry: Option<&Geometry>,
        centroid: Option<Centroid>,
    ) -> Vec<ColumnWrite>;

    /// Insert a spatial row in a single statement and return its id.
    async fn insert(&self, insert: SpatialInsert) -> Result<i64> {
        let (sql, params) = self.insert_statement(insert);
        let id: i64 = bind_all(sqlx::query(&sql), params)
            .fetch_one(self.pool())
            .await
            .map_err(Error::Database)?
            .try_get("id")
            .map_err(Error::Database)?;
        Ok(id)
    }

    /// [`GeometryStore::insert`] within an existing transaction.
    async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        insert: SpatialInsert,
    ) -> Result<i64> {
        let (sql, params) = self.insert_statement(insert);
        let id: i64 = bind_all(sqlx::query(&sql), params)
            .fetch_one(&mut **tx)
            .await
            .map_err(Error::Database)?
            .try_get("id")
            .map_err(Error::Database)?;
        Ok(id)
    }

    /// INSERT statement and binds for a row, geometry written the mode's way.
    fn insert_statement(&self, insert: SpatialInsert) -> (String, Vec<QueryParam>) {
        let mut writes = insert.columns;
        if insert.geometry.is_some() || insert.centroid.is_some() {
            writes.extend(self.geometry_writes(
                insert.entity,
                insert.geometry.as_ref(),
                insert.centroid,
            ));
        }
        let sql = insert_sql(insert.entity.table(), &writes);
        let params = writes.into_iter().map(|w| w.param).collect();
        (sql, params)
    }

    /// Replace the geometry of an existing row.
    async fn store_geometry(
        &self,
        entity: SpatialEntity,
        id: i64,
        geometry: &Geometry,
        centroid: Option<Centroid>,
    ) -> Result<()> {
        let writes = self.geometry_writes(entity, Some(geometry), centroid);
        let sql = update_sql(entity.table(), &writes);
        let mut params: Vec<QueryParam> = writes.into_iter().map(|w| w.param).collect();
        params.push(QueryParam::BigInt(Some(id)));

        let result = bind_all(sqlx::query(&sql), params)
            .execute(self.pool())
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("{} row {}", entity.table(), id)));
        }
        Ok(())
    }

    /// Rows whose geometry falls in `bbox`, ordered by name then insertion.
    ///
    /// `limit` truncates the ordered result; it never changes eligibility.
    /// A limit outside `0..=BBOX_LIMIT_MAX` is rejected.
    async fn query_by_bounding_box(
        &self,
        entity: SpatialEntity,
        bbox: &BoundingBox,
        limit: i64,
    ) -> Result<Vec<SpatialRecord>> {
        if limit < 0 {
            return Err(Error::InvalidInput(format!(
                "limit must be non-negative, got {}",
                limit
            )));
        }
        if limit > defaults::BBOX_LIMIT_MAX {
            return Err(Error::InvalidInput(format!(
                "limit must be at most {}, got {}",
                defaults::BBOX_LIMIT_MAX,
                limit
            )));
        }
        let start = Instant::now();

        let sql = format!(
            r#"
            SELECT id, uid, external_id, name, properties,
                   {} AS geometry,
                   {}
            FROM {}
            WHERE {}
            ORDER BY name ASC NULLS LAST, id ASC
            LIMIT $5
            "#,
            self.geometry_select(entity),
            self.centroid_select(entity),
            entity.table(),
            self.bbox_predicate(entity)
        );

        let rows = sqlx::query(&sql)
            .bind(bbox.min_lon)
            .bind(bbox.min_lat)
            .bind(bbox.max_lon)
            .bind(bbox.max_lat)
            .bind(limit)
            .fetch_all(self.pool())
            .await
            .map_err(Error::Database)?;

        let records = rows
            .iter()
            .map(|row| self.read_record(entity, row))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            subsystem = "db",
            component = "spatial",
            op = "query_by_bounding_box",
            db_table = entity.table(),
            geometry_mode = %self.mode(),
            result_count = records.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Bounding-box query complete"
        );
        Ok(records)
    }

    /// Geometry from a row selected with [`GeometryStore::geometry_select`]
    /// aliased as `geometry`.
    fn read_geometry(&self, row: &PgRow) -> Result<Option<Geometry>> {
        let value: Option<JsonValue> = row.try_get("geometry").map_err(Error::Database)?;
        Geometry::from_optional_json(value.as_ref())
    }

    /// Centroid from a row selected with [`GeometryStore::centroid_select`].
    fn read_centroid(&self, row: &PgRow) -> Result<Option<Centroid>> {
        let lat: Option<f64> = row.try_get("centroid_lat").map_err(Error::Database)?;
        let lon: Option<f64> = row.try_get("centroid_lon").map_err(Error::Database)?;
        Ok(Centroid::from_parts(lat, lon))
    }

    fn read_record(&self, entity: SpatialEntity, row: &PgRow) -> Result<SpatialRecord> {
        Ok(SpatialRecord {
            entity,
            id: row.try_get("id").map_err(Error::Database)?,
            uid: row.try_get("uid").map_err(Error::Database)?,
            external_id: row.try_get("external_id").map_err(Error::Database)?,
            name: row.try_get("name").map_err(Error::Database)?,
            properties: row.try_get("properties").map_err(Error::Database)?,
            geometry: self.read_geometry(row)?,
            centroid: self.read_centroid(row)?,
        })
    }
}

/// Pick the strategy for a geometry mode. Called once at construction.
pub fn strategy_for(mode: GeometryMode, pool: PgPool) -> Arc<dyn GeometryStore> {
    match mode {
        GeometryMode::Native => Arc::new(NativeGeometry::new(pool)),
        GeometryMode::Fallback => Arc::new(FallbackGeometry::new(pool)),
    }
}
