//! Geodesic math, polygon tests and grid snapping.
//!
//! Everything here is a pure function over WGS84 decimal degrees.

use crate::error::{EngineError, EngineResult};
use crate::models::Coordinate;
use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the Haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Flat-earth scale of one degree of latitude.
pub const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Calculate distance between two points in meters using the Haversine formula.
///
/// # Arguments
/// * `lat1`, `lon1` - First point coordinates in decimal degrees
/// * `lat2`, `lon2` - Second point coordinates in decimal degrees
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Great-circle distance between two coordinates in meters.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    haversine_distance(a.lat, a.lng, b.lat, b.lng)
}

/// Initial bearing from `a` to `b` in degrees, normalized to [0, 360).
pub fn bearing(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_lambda = (b.lng - a.lng).to_radians();

    let x = delta_lambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    normalize_degrees(x.atan2(y).to_degrees())
}

/// Wrap an angle into [0, 360).
pub fn normalize_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Convert a north/south distance in meters to degrees of latitude.
pub fn meters_to_lat_deg(meters: f64) -> f64 {
    meters / METERS_PER_DEG_LAT
}

/// Convert an east/west distance in meters to degrees of longitude at `ref_lat`.
pub fn meters_to_lng_deg(meters: f64, ref_lat: f64) -> f64 {
    meters / meters_per_deg_lng(ref_lat)
}

/// Flat-earth scale of one degree of longitude at `ref_lat`.
pub fn meters_per_deg_lng(ref_lat: f64) -> f64 {
    ref_lat.to_radians().cos().abs().max(0.01) * METERS_PER_DEG_LAT
}

/// Offset a position by distance and bearing along a great circle.
///
/// # Arguments
/// * `origin` - Starting position
/// * `distance_m` - Distance in meters
/// * `bearing_deg` - Bearing in degrees (0 = north, 90 = east)
pub fn offset_by_bearing(origin: Coordinate, distance_m: f64, bearing_deg: f64) -> Coordinate {
    if distance_m.abs() <= f64::EPSILON {
        return origin;
    }

    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lng.to_radians();
    let bearing_rad = bearing_deg.to_radians();
    let angular_distance = distance_m / EARTH_RADIUS_M;

    let sin_lat1 = lat1.sin();
    let cos_lat1 = lat1.cos();
    let sin_ad = angular_distance.sin();
    let cos_ad = angular_distance.cos();

    let sin_lat2 = sin_lat1 * cos_ad + cos_lat1 * sin_ad * bearing_rad.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

    let y = bearing_rad.sin() * sin_ad * cos_lat1;
    let x = cos_ad - sin_lat1 * sin_lat2;
    let mut lon2 = lon1 + y.atan2(x);
    lon2 =
        (lon2 + std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI) - std::f64::consts::PI;

    Coordinate::new(lat2.to_degrees(), lon2.to_degrees())
}

/// Linear interpolation between two coordinates; `t` in [0, 1].
pub fn interpolate(a: Coordinate, b: Coordinate, t: f64) -> Coordinate {
    Coordinate::new(a.lat + (b.lat - a.lat) * t, a.lng + (b.lng - a.lng) * t)
}

/// Ray-casting parity test.
///
/// Points exactly on an edge or vertex get whatever answer the parity
/// arithmetic produces; no boundary special-casing is applied.
pub fn point_in_polygon(point: Coordinate, polygon: &[Coordinate]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let yi = polygon[i].lat;
        let xi = polygon[i].lng;
        let yj = polygon[j].lat;
        let xj = polygon[j].lng;

        if ((yi > point.lat) != (yj > point.lat))
            && (point.lng < (xj - xi) * (point.lat - yi) / (yj - yi) + xi)
        {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Round a single value to the nearest multiple of `cell_size_deg`.
pub fn snap_value(value: f64, cell_size_deg: f64) -> f64 {
    (value / cell_size_deg).round() * cell_size_deg
}

/// Round a coordinate to the nearest grid node.
pub fn snap_to_grid(coord: Coordinate, cell_size_deg: f64) -> Coordinate {
    Coordinate::new(
        snap_value(coord.lat, cell_size_deg),
        snap_value(coord.lng, cell_size_deg),
    )
}

/// Identity of a grid cell: the pair of rounded multiples.
///
/// Integer indices keep cell identity exact where float keys would not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub row: i64,
    pub col: i64,
}

impl GridCell {
    pub fn of(coord: Coordinate, cell_size_deg: f64) -> Self {
        Self {
            row: (coord.lat / cell_size_deg).round() as i64,
            col: (coord.lng / cell_size_deg).round() as i64,
        }
    }

    /// Snapped coordinate of this cell.
    pub fn center(&self, cell_size_deg: f64) -> Coordinate {
        Coordinate::new(
            self.row as f64 * cell_size_deg,
            self.col as f64 * cell_size_deg,
        )
    }

    pub fn offset(&self, d_row: i64, d_col: i64) -> Self {
        Self {
            row: self.row + d_row,
            col: self.col + d_col,
        }
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Bounding box of all finite coordinates; `None` when there are none.
    pub fn from_coordinates<'a>(coords: impl IntoIterator<Item = &'a Coordinate>) -> Option<Self> {
        let mut min_lat = f64::INFINITY;
        let mut max_lat = f64::NEG_INFINITY;
        let mut min_lng = f64::INFINITY;
        let mut max_lng = f64::NEG_INFINITY;
        for coord in coords {
            if !coord.lat.is_finite() || !coord.lng.is_finite() {
                continue;
            }
            min_lat = min_lat.min(coord.lat);
            max_lat = max_lat.max(coord.lat);
            min_lng = min_lng.min(coord.lng);
            max_lng = max_lng.max(coord.lng);
        }
        if !min_lat.is_finite() || !min_lng.is_finite() {
            return None;
        }
        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lng_span(&self) -> f64 {
        self.max_lng - self.min_lng
    }

    pub fn expand(&self, pad_deg: f64) -> Self {
        Self {
            min_lat: self.min_lat - pad_deg,
            max_lat: self.max_lat + pad_deg,
            min_lng: self.min_lng - pad_deg,
            max_lng: self.max_lng + pad_deg,
        }
    }
}

/// Reject polygons that cannot describe an area.
pub fn validate_polygon(polygon: &[Coordinate]) -> EngineResult<()> {
    if polygon.len() < 3 {
        return Err(EngineError::DegenerateGeometry(format!(
            "polygon must have at least 3 vertices, got {}",
            polygon.len()
        )));
    }
    if let Some(bad) = polygon.iter().find(|c| !c.is_valid()) {
        return Err(EngineError::DegenerateGeometry(format!(
            "polygon vertex ({}, {}) is not a valid coordinate",
            bad.lat, bad.lng
        )));
    }
    Ok(())
}

/// Signed shoelace sum over a ring in degree space (x = lng, y = lat).
fn shoelace(points: &[Coordinate]) -> f64 {
    let n = points.len();
    let mut sum = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        sum += points[i].lng * points[j].lat;
        sum -= points[j].lng * points[i].lat;
    }
    sum / 2.0
}

/// Area-weighted centroid; falls back to the vertex mean for zero-area rings.
pub fn polygon_centroid(polygon: &[Coordinate]) -> Option<Coordinate> {
    if polygon.is_empty() {
        return None;
    }
    let count = polygon.len() as f64;
    let mean = polygon.iter().fold(Coordinate::new(0.0, 0.0), |acc, c| {
        Coordinate::new(acc.lat + c.lat / count, acc.lng + c.lng / count)
    });

    let area = shoelace(polygon);
    if polygon.len() < 3 || area.abs() < 1e-18 {
        return Some(mean);
    }

    let n = polygon.len();
    let (mut cx, mut cy) = (0.0, 0.0);
    for i in 0..n {
        let j = (i + 1) % n;
        let cross = polygon[i].lng * polygon[j].lat - polygon[j].lng * polygon[i].lat;
        cx += (polygon[i].lng + polygon[j].lng) * cross;
        cy += (polygon[i].lat + polygon[j].lat) * cross;
    }
    Some(Coordinate::new(cy / (6.0 * area), cx / (6.0 * area)))
}

/// Shoelace area of a ring scaled to square meters at the ring's mean latitude.
pub fn polygon_area_m2(points: &[Coordinate]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mean_lat = points.iter().map(|c| c.lat).sum::<f64>() / points.len() as f64;
    shoelace(points).abs() * METERS_PER_DEG_LAT * meters_per_deg_lng(mean_lat)
}
