//! GeoJSON geometry values, centroids and bounding boxes.
//!
//! [`Geometry`] is the mode-independent geometry value that crosses every
//! store boundary. Native mode hands it to PostGIS as GeoJSON text; fallback
//! mode stores it verbatim as a JSONB document. Conversion into `geo` types
//! is available for local computation.

use geo::Centroid as _;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// A GeoJSON position: `[longitude, latitude]` with an optional altitude.
pub type Position = Vec<f64>;

/// A GeoJSON geometry object (RFC 7946 section 3.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        coordinates: Position,
    },
    MultiPoint {
        coordinates: Vec<Position>,
    },
    LineString {
        coordinates: Vec<Position>,
    },
    MultiLineString {
        coordinates: Vec<Vec<Position>>,
    },
    Polygon {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Position>>>,
    },
    GeometryCollection {
        geometries: Vec<Geometry>,
    },
}

impl Geometry {
    /// Parse a GeoJSON geometry object.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        let geometry: Geometry = serde_json::from_value(value.clone())
            .map_err(|e| Error::Geometry(format!("invalid GeoJSON geometry: {}", e)))?;
        // Surface bad positions now rather than at insert time.
        geometry.to_geo()?;
        Ok(geometry)
    }

    /// Parse an optional GeoJSON value; JSON `null` means "no geometry".
    pub fn from_optional_json(value: Option<&JsonValue>) -> Result<Option<Self>> {
        match value {
            None | Some(JsonValue::Null) => Ok(None),
            Some(v) => Self::from_json(v).map(Some),
        }
    }

    /// Serialize back into a GeoJSON object.
    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }

    /// GeoJSON type name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Point { .. } => "Point",
            Self::MultiPoint { .. } => "MultiPoint",
            Self::LineString { .. } => "LineString",
            Self::MultiLineString { .. } => "MultiLineString",
            Self::Polygon { .. } => "Polygon",
            Self::MultiPolygon { .. } => "MultiPolygon",
            Self::GeometryCollection { .. } => "GeometryCollection",
        }
    }

    /// Convert into a `geo` geometry for local computation.
    pub fn to_geo(&self) -> Result<geo::Geometry<f64>> {
        Ok(match self {
            Self::Point { coordinates } => geo::Geometry::Point(coord(coordinates)?.into()),
            Self::MultiPoint { coordinates } => geo::Geometry::MultiPoint(geo::MultiPoint::new(
                coordinates
                    .iter()
                    .map(|p| coord(p).map(geo::Point::from))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Self::LineString { coordinates } => geo::Geometry::LineString(line(coordinates)?),
            Self::MultiLineString { coordinates } => {
                geo::Geometry::MultiLineString(geo::MultiLineString::new(
                    coordinates
                        .iter()
                        .map(|l| line(l))
                        .collect::<Result<Vec<_>>>()?,
                ))
            }
            Self::Polygon { coordinates } => geo::Geometry::Polygon(polygon(coordinates)?),
            Self::MultiPolygon { coordinates } => {
                geo::Geometry::MultiPolygon(geo::MultiPolygon::new(
                    coordinates
                        .iter()
                        .map(|p| polygon(p))
                        .collect::<Result<Vec<_>>>()?,
                ))
            }
            Self::GeometryCollection { geometries } => {
                geo::Geometry::GeometryCollection(geo::GeometryCollection(
                    geometries
                        .iter()
                        .map(Geometry::to_geo)
                        .collect::<Result<Vec<_>>>()?,
                ))
            }
        })
    }

    /// Centroid that can be derived without a spatial engine.
    ///
    /// Only point sets qualify: the centroid of a point is the point itself and
    /// of a multipoint the mean of its members. Linear and areal shapes return
    /// `None` and are left to the store (native mode) or to the caller.
    pub fn local_centroid(&self) -> Option<Centroid> {
        match self {
            Self::Point { .. } | Self::MultiPoint { .. } => {
                let point = self.to_geo().ok()?.centroid()?;
                Centroid::new(point.y(), point.x()).ok()
            }
            _ => None,
        }
    }
}

fn coord(position: &[f64]) -> Result<geo::Coord<f64>> {
    match position {
        [x, y, ..] if x.is_finite() && y.is_finite() => Ok(geo::Coord { x: *x, y: *y }),
        _ => Err(Error::Geometry(format!(
            "position needs two finite coordinates, got {:?}",
            position
        ))),
    }
}

fn line(positions: &[Position]) -> Result<geo::LineString<f64>> {
    positions
        .iter()
        .map(|p| coord(p))
        .collect::<Result<Vec<_>>>()
        .map(geo::LineString::new)
}

fn polygon(rings: &[Vec<Position>]) -> Result<geo::Polygon<f64>> {
    let mut rings = rings.iter();
    let exterior = match rings.next() {
        Some(ring) => line(ring)?,
        None => geo::LineString::new(Vec::new()),
    };
    let interiors = rings.map(|r| line(r)).collect::<Result<Vec<_>>>()?;
    Ok(geo::Polygon::new(exterior, interiors))
}

/// A centroid point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub lat: f64,
    pub lon: f64,
}

impl Centroid {
    /// Create a centroid, rejecting coordinates outside WGS 84 ranges.
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(Error::InvalidInput(format!(
                "latitude {} outside [-90, 90]",
                lat
            )));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(Error::InvalidInput(format!(
                "longitude {} outside [-180, 180]",
                lon
            )));
        }
        Ok(Self { lat, lon })
    }

    /// Build from nullable scalar columns; either half missing means absent.
    pub fn from_parts(lat: Option<f64>, lon: Option<f64>) -> Option<Self> {
        match (lat, lon) {
            (Some(lat), Some(lon)) => Some(Self { lat, lon }),
            _ => None,
        }
    }
}

/// Axis-aligned rectangle `(min_lon, min_lat, max_lon, max_lat)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a validated bounding box.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self> {
        for (name, value, limit) in [
            ("min_lon", min_lon, 180.0),
            ("max_lon", max_lon, 180.0),
            ("min_lat", min_lat, 90.0),
            ("max_lat", max_lat, 90.0),
        ] {
            if !value.is_finite() || value.abs() > limit {
                return Err(Error::InvalidInput(format!(
                    "{} must be within [-{limit}, {limit}], got {}",
                    name, value
                )));
            }
        }
        if min_lon > max_lon || min_lat > max_lat {
            return Err(Error::InvalidInput(format!(
                "bounding box minimum exceeds maximum: [{}, {}, {}, {}]",
                min_lon, min_lat, max_lon, max_lat
            )));
        }
        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_polygon_roundtrips_as_geojson() {
        let value = json!({
            "type": "Polygon",
            "coordinates": [[[77.0, 20.0], [78.0, 20.0], [78.0, 21.0], [77.0, 20.0]]]
        });
        let geometry = Geometry::from_json(&value).unwrap();
        assert_eq!(geometry.kind(), "Polygon");
        assert_eq!(geometry.to_json(), value);
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        let value = json!({"type": "Circle", "coordinates": [1.0, 2.0]});
        assert!(matches!(
            Geometry::from_json(&value),
            Err(Error::Geometry(_))
        ));
    }

    #[test]
    fn test_parse_rejects_short_position() {
        let value = json!({"type": "Point", "coordinates": [77.0]});
        assert!(Geometry::from_json(&value).is_err());
    }

    #[test]
    fn test_coordinates_survive_text_roundtrip() {
        // Sums like 20.4 + 0.2 land one ULP off a short decimal.
        let geometry = Geometry::Polygon {
            coordinates: vec![vec![
                vec![77.4, 20.4],
                vec![77.4 + 0.2, 20.4],
                vec![77.4 + 0.2, 20.4 + 0.2],
                vec![77.4, 20.4 + 0.2],
                vec![77.4, 20.4],
            ]],
        };
        let text = geometry.to_json().to_string();
        let parsed: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(Geometry::from_json(&parsed).unwrap(), geometry);
    }

    #[test]
    fn test_optional_null_is_absent() {
        assert_eq!(Geometry::from_optional_json(None).unwrap(), None);
        assert_eq!(
            Geometry::from_optional_json(Some(&JsonValue::Null)).unwrap(),
            None
        );
    }

    #[test]
    fn test_position_altitude_is_tolerated() {
        let value = json!({"type": "Point", "coordinates": [85.8245, 20.2961, 12.0]});
        let geometry = Geometry::from_json(&value).unwrap();
        let centroid = geometry.local_centroid().unwrap();
        assert_eq!(centroid, Centroid { lat: 20.2961, lon: 85.8245 });
    }

    #[test]
    fn test_local_centroid_of_multipoint_is_mean() {
        let geometry = Geometry::MultiPoint {
            coordinates: vec![vec![77.0, 20.0], vec![79.0, 22.0]],
        };
        let centroid = geometry.local_centroid().unwrap();
        assert!((centroid.lat - 21.0).abs() < 1e-9);
        assert!((centroid.lon - 78.0).abs() < 1e-9);
    }

    #[test]
    fn test_local_centroid_skips_areas() {
        let geometry = Geometry::Polygon {
            coordinates: vec![vec![
                vec![77.0, 20.0],
                vec![78.0, 20.0],
                vec![78.0, 21.0],
                vec![77.0, 20.0],
            ]],
        };
        assert_eq!(geometry.local_centroid(), None);
    }

    #[test]
    fn test_to_geo_multipolygon() {
        let geometry = Geometry::MultiPolygon {
            coordinates: vec![vec![vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![1.0, 1.0],
                vec![0.0, 0.0],
            ]]],
        };
        match geometry.to_geo().unwrap() {
            geo::Geometry::MultiPolygon(mp) => assert_eq!(mp.0.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_centroid_range_validation() {
        assert!(Centroid::new(91.0, 0.0).is_err());
        assert!(Centroid::new(0.0, -181.0).is_err());
        assert!(Centroid::new(20.5, 77.5).is_ok());
    }

    #[test]
    fn test_centroid_from_parts_requires_both() {
        assert_eq!(Centroid::from_parts(Some(1.0), None), None);
        assert_eq!(
            Centroid::from_parts(Some(1.0), Some(2.0)),
            Some(Centroid { lat: 1.0, lon: 2.0 })
        );
    }

    #[test]
    fn test_bbox_rejects_inverted_range() {
        assert!(BoundingBox::new(78.0, 20.0, 77.0, 21.0).is_err());
        assert!(BoundingBox::new(77.0, 21.0, 78.0, 20.0).is_err());
    }

    #[test]
    fn test_bbox_rejects_out_of_range() {
        assert!(BoundingBox::new(-200.0, 20.0, 77.0, 21.0).is_err());
        assert!(BoundingBox::new(77.0, 20.0, 78.0, f64::NAN).is_err());
    }
}
