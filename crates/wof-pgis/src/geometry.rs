//! Geometry strategies
//!
//! Turns a feature into the GeoJSON text handed to `ST_GeomFromGeoJSON`.
//! The strategy is chosen once per indexer:
//!
//! | mode            | stored shape                                       |
//! |-----------------|----------------------------------------------------|
//! | `default`       | the feature's own geometry, unmodified             |
//! | `bbox`          | one rectangle covering the whole feature           |
//! | `bbox-polygons` | one rectangle per polygon, as a MultiPolygon       |
//! | `centroid`      | a point at the label (or geometry) centroid        |
//!
//! `bbox` trades shape fidelity for storage size and oversizes features made
//! of scattered polygons; `bbox-polygons` keeps one box per part instead.

use geo::{BoundingRect, Coord, MultiPoint, Point, Rect};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use wof_common::Feature;

use crate::error::{IndexError, IndexResult};

/// Which spatial shape is stored for each record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GeometryMode {
    #[default]
    Default,
    Bbox,
    BboxPolygons,
    Centroid,
    /// An unrecognised mode; every derivation fails
    Unsupported(String),
}

impl GeometryMode {
    /// Parse a mode name; the empty string selects the default geometry
    pub fn parse(mode: &str) -> Self {
        match mode.trim().to_lowercase().as_str() {
            "" | "default" => GeometryMode::Default,
            "bbox" => GeometryMode::Bbox,
            "bbox-polygons" => GeometryMode::BboxPolygons,
            "centroid" => GeometryMode::Centroid,
            _ => GeometryMode::Unsupported(mode.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GeometryMode::Default => "default",
            GeometryMode::Bbox => "bbox",
            GeometryMode::BboxPolygons => "bbox-polygons",
            GeometryMode::Centroid => "centroid",
            GeometryMode::Unsupported(mode) => mode,
        }
    }

    /// Derive the geometry payload for a feature under this mode
    pub fn derive(&self, feature: &Feature) -> IndexResult<GeometryPayload> {
        match self {
            GeometryMode::Default => {
                let geometry = feature
                    .geometry()
                    .ok_or(IndexError::MissingGeometry { id: feature.id() })?;
                encode(feature.id(), geometry)
            },
            GeometryMode::Bbox => {
                let [swlon, swlat, nelon, nelat] = match feature.bbox() {
                    Some(bbox) => bbox,
                    None => {
                        let rect = feature
                            .geometry()
                            .and_then(bounds_of)
                            .ok_or(IndexError::MissingBbox { id: feature.id() })?;
                        [rect.min().x, rect.min().y, rect.max().x, rect.max().y]
                    },
                };
                let polygon = GeoJson::Polygon(vec![bbox_ring(swlon, swlat, nelon, nelat)]);
                encode(feature.id(), &polygon)
            },
            GeometryMode::BboxPolygons => {
                let geometry = feature
                    .geometry()
                    .ok_or(IndexError::MissingBbox { id: feature.id() })?;
                let boxes: Vec<_> = part_bounds(geometry)
                    .into_iter()
                    .map(|rect| vec![rect_ring(&rect)])
                    .collect();
                if boxes.is_empty() {
                    return Err(IndexError::MissingBbox { id: feature.id() });
                }
                encode(feature.id(), &GeoJson::MultiPolygon(boxes))
            },
            GeometryMode::Centroid => {
                let (lat, lon) = centroid(feature).ok_or(IndexError::NoCentroid { id: feature.id() })?;
                encode(feature.id(), &GeoJson::Point([lon, lat]))
            },
            GeometryMode::Unsupported(mode) => Err(IndexError::UnsupportedGeometryMode(mode.clone())),
        }
    }
}

impl FromStr for GeometryMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for GeometryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GeoJSON geometry text accepted by `ST_GeomFromGeoJSON`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryPayload(String);

impl GeometryPayload {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for GeometryPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type Position = [f64; 2];

#[derive(Serialize)]
#[serde(tag = "type", content = "coordinates")]
enum GeoJson {
    Point(Position),
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

fn encode<T: Serialize + ?Sized>(id: i64, geometry: &T) -> IndexResult<GeometryPayload> {
    serde_json::to_string(geometry)
        .map(GeometryPayload)
        .map_err(|source| IndexError::Encode {
            id,
            what: "geometry",
            source,
        })
}

/// Closed ring SW -> NW -> NE -> SE -> SW
fn bbox_ring(swlon: f64, swlat: f64, nelon: f64, nelat: f64) -> Vec<Position> {
    vec![
        [swlon, swlat],
        [swlon, nelat],
        [nelon, nelat],
        [nelon, swlat],
        [swlon, swlat],
    ]
}

fn rect_ring(rect: &Rect<f64>) -> Vec<Position> {
    bbox_ring(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
}

/// Label centroid first, then the geometry centroid, as (lat, lon)
fn centroid(feature: &Feature) -> Option<(f64, f64)> {
    let pair = |lat: &str, lon: &str| Some((feature.float_property(lat)?, feature.float_property(lon)?));

    pair("lbl:latitude", "lbl:longitude").or_else(|| pair("geom:latitude", "geom:longitude"))
}

fn bounds_of(geometry: &Value) -> Option<Rect<f64>> {
    let mut coords = Vec::new();
    collect_positions(geometry, &mut coords);
    rect_of(coords)
}

/// One bounding rectangle per polygon; other geometry types get one overall
fn part_bounds(geometry: &Value) -> Vec<Rect<f64>> {
    let coordinates = geometry.get("coordinates");
    match (geometry.get("type").and_then(Value::as_str), coordinates) {
        (Some("MultiPolygon"), Some(Value::Array(polygons))) => polygons
            .iter()
            .filter_map(|polygon| {
                let mut coords = Vec::new();
                collect_coordinates(polygon, &mut coords);
                rect_of(coords)
            })
            .collect(),
        (Some("GeometryCollection"), _) => geometry
            .get("geometries")
            .and_then(Value::as_array)
            .map(|parts| parts.iter().flat_map(part_bounds).collect())
            .unwrap_or_default(),
        _ => bounds_of(geometry).into_iter().collect(),
    }
}

fn rect_of(coords: Vec<Coord<f64>>) -> Option<Rect<f64>> {
    MultiPoint::new(coords.into_iter().map(Point::from).collect()).bounding_rect()
}

fn collect_positions(geometry: &Value, out: &mut Vec<Coord<f64>>) {
    if let Some(parts) = geometry.get("geometries").and_then(Value::as_array) {
        for part in parts {
            collect_positions(part, out);
        }
    } else if let Some(coordinates) = geometry.get("coordinates") {
        collect_coordinates(coordinates, out);
    }
}

/// Walk nested GeoJSON coordinate arrays down to `[x, y, ...]` positions
fn collect_coordinates(value: &Value, out: &mut Vec<Coord<f64>>) {
    let Some(items) = value.as_array() else {
        return;
    };

    match items.as_slice() {
        [x, y, ..] if x.is_number() && y.is_number() => {
            if let (Some(x), Some(y)) = (x.as_f64(), y.as_f64()) {
                out.push(Coord { x, y });
            }
        },
        _ => {
            for item in items {
                collect_coordinates(item, out);
            }
        },
    }
}
