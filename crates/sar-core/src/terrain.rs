//! Terrain analysis over an injected elevation source.
//!
//! Every routine here is an approximation built on point samples: the
//! viewshed tests each sample's elevation angle in isolation (no occlusion by
//! intermediate terrain) and path analysis interpolates a straight line
//! instead of searching a graph.

use crate::error::{ElevationError, EngineError, EngineResult};
use crate::models::{Coordinate, HazardKind, HazardPoint, HazardSeverity, TerrainPoint, Waypoint};
use crate::spatial::{
    distance, interpolate, meters_per_deg_lng, normalize_degrees, offset_by_bearing, polygon_area_m2, Bounds,
    METERS_PER_DEG_LAT,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Finite-difference offset used for slope, roughly 11 m.
pub const DEFAULT_SLOPE_OFFSET_DEG: f64 = 0.0001;
/// Samples with an elevation angle below this are visible.
pub const DEFAULT_VISIBILITY_ANGLE_DEG: f64 = 30.0;
/// Points below this elevation are drainage points.
pub const DEFAULT_DRAINAGE_ELEVATION_M: f64 = 50.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub slope_offset_deg: f64,
    /// Coordinate rounding applied to memo keys
    pub memo_precision_deg: f64,
    pub viewshed_bearing_step_deg: f64,
    pub viewshed_sample_step_m: f64,
    pub viewshed_radius_m: f64,
    pub observer_height_m: f64,
    pub visibility_angle_deg: f64,
    pub max_viewshed_samples: usize,
    /// Samples per side for watershed and hazard scans
    pub scan_grid_size: usize,
    pub flow_step_deg: f64,
    pub flow_max_steps: usize,
    pub drainage_elevation_m: f64,
    /// Interpolation steps between path endpoints
    pub path_steps: usize,
    pub path_max_slope_deg: f64,
    pub path_hazard_slope_deg: f64,
    pub path_high_hazard_slope_deg: f64,
    pub grade_easy_percent: f64,
    pub grade_moderate_percent: f64,
    pub grade_difficult_percent: f64,
    pub steep_slope_deg: f64,
    pub cliff_slope_deg: f64,
    pub flight_clearance_m: f64,
    pub max_flight_altitude_m: f64,
    pub landing: LandingSiteRules,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            slope_offset_deg: DEFAULT_SLOPE_OFFSET_DEG,
            memo_precision_deg: 1e-6,
            viewshed_bearing_step_deg: 10.0,
            viewshed_sample_step_m: 100.0,
            viewshed_radius_m: 5000.0,
            observer_height_m: 2.0,
            visibility_angle_deg: DEFAULT_VISIBILITY_ANGLE_DEG,
            max_viewshed_samples: 100_000,
            scan_grid_size: 20,
            flow_step_deg: 0.0001,
            flow_max_steps: 10,
            drainage_elevation_m: DEFAULT_DRAINAGE_ELEVATION_M,
            path_steps: 20,
            path_max_slope_deg: 15.0,
            path_hazard_slope_deg: 20.0,
            path_high_hazard_slope_deg: 30.0,
            grade_easy_percent: 5.0,
            grade_moderate_percent: 10.0,
            grade_difficult_percent: 15.0,
            steep_slope_deg: 30.0,
            cliff_slope_deg: 45.0,
            flight_clearance_m: 100.0,
            max_flight_altitude_m: 400.0,
            landing: LandingSiteRules::default(),
        }
    }
}

impl TerrainConfig {
    pub fn validate(&self) -> EngineResult<()> {
        let positive = [
            ("slope_offset_deg", self.slope_offset_deg),
            ("memo_precision_deg", self.memo_precision_deg),
            ("viewshed_bearing_step_deg", self.viewshed_bearing_step_deg),
            ("viewshed_sample_step_m", self.viewshed_sample_step_m),
            ("flow_step_deg", self.flow_step_deg),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EngineError::invalid_parameter(name, "must be positive"));
            }
        }
        if self.scan_grid_size == 0 || self.path_steps == 0 {
            return Err(EngineError::invalid_parameter(
                "scan_grid_size",
                "grid and path step counts must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Penalties applied when scoring a landing site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LandingSiteRules {
    pub steep_slope_deg: f64,
    pub steep_slope_penalty: f64,
    pub moderate_slope_deg: f64,
    pub moderate_slope_penalty: f64,
    pub high_altitude_m: f64,
    pub high_altitude_penalty: f64,
    pub moderate_altitude_m: f64,
    pub moderate_altitude_penalty: f64,
    pub vegetation_penalty: f64,
    pub suitable_score: f64,
}

impl Default for LandingSiteRules {
    fn default() -> Self {
        Self {
            steep_slope_deg: 15.0,
            steep_slope_penalty: 50.0,
            moderate_slope_deg: 10.0,
            moderate_slope_penalty: 20.0,
            high_altitude_m: 3000.0,
            high_altitude_penalty: 30.0,
            moderate_altitude_m: 2000.0,
            moderate_altitude_penalty: 10.0,
            vegetation_penalty: 40.0,
            suitable_score: 50.0,
        }
    }
}

/// Supplies ground elevation in meters for a coordinate.
pub trait ElevationSource {
    fn elevation(&self, at: Coordinate) -> Result<f64, ElevationError>;
}

impl<F> ElevationSource for F
where
    F: Fn(Coordinate) -> Result<f64, ElevationError>,
{
    fn elevation(&self, at: Coordinate) -> Result<f64, ElevationError> {
        self(at)
    }
}

/// Regularly sampled elevation raster with bilinear interpolation.
///
/// Row 0 is the southern edge, column 0 the western edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainGrid {
    min_lat: f64,
    min_lng: f64,
    max_lat: f64,
    max_lng: f64,
    lat_step_deg: f64,
    lng_step_deg: f64,
    rows: usize,
    cols: usize,
    elevations_m: Vec<f64>,
}

impl TerrainGrid {
    pub fn new(
        bounds: Bounds,
        lat_step_deg: f64,
        lng_step_deg: f64,
        rows: usize,
        cols: usize,
        elevations_m: Vec<f64>,
    ) -> EngineResult<Self> {
        let grid = Self {
            min_lat: bounds.min_lat,
            min_lng: bounds.min_lng,
            max_lat: bounds.max_lat,
            max_lng: bounds.max_lng,
            lat_step_deg,
            lng_step_deg,
            rows,
            cols,
            elevations_m,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Sample `source` on a `rows` x `cols` lattice spanning `bounds`.
    pub fn from_source<S: ElevationSource>(bounds: Bounds, rows: usize, cols: usize, source: &S) -> EngineResult<Self> {
        let rows = rows.max(2);
        let cols = cols.max(2);
        let lat_step = bounds.lat_span() / (rows - 1) as f64;
        let lng_step = bounds.lng_span() / (cols - 1) as f64;
        let mut elevations = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            let lat = bounds.min_lat + row as f64 * lat_step;
            for col in 0..cols {
                let lng = bounds.min_lng + col as f64 * lng_step;
                elevations.push(source.elevation(Coordinate::new(lat, lng))?);
            }
        }
        Self::new(bounds, lat_step, lng_step, rows, cols, elevations)
    }

    /// Check internal consistency, e.g. after deserializing.
    pub fn validate(&self) -> EngineResult<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(EngineError::DegenerateGeometry("terrain grid has no samples".into()));
        }
        if self.elevations_m.len() != self.rows * self.cols {
            return Err(EngineError::invalid_parameter(
                "elevations_m",
                format!(
                    "expected {} samples for {}x{} grid, got {}",
                    self.rows * self.cols,
                    self.rows,
                    self.cols,
                    self.elevations_m.len()
                ),
            ));
        }
        if !(self.min_lat <= self.max_lat && self.min_lng <= self.max_lng) {
            return Err(EngineError::DegenerateGeometry("terrain grid bounds are inverted".into()));
        }
        if !(self.lat_step_deg >= 0.0 && self.lng_step_deg >= 0.0) {
            return Err(EngineError::invalid_parameter("lat_step_deg", "grid steps must be non-negative"));
        }
        if let Some(idx) = self.elevations_m.iter().position(|v| !v.is_finite()) {
            return Err(EngineError::invalid_parameter(
                "elevations_m",
                format!("sample {idx} is not finite"),
            ));
        }
        Ok(())
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            min_lat: self.min_lat,
            max_lat: self.max_lat,
            min_lng: self.min_lng,
            max_lng: self.max_lng,
        }
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Whether `at` lies within the grid, allowing one step of slack.
    pub fn covers(&self, at: Coordinate) -> bool {
        let pad_lat = self.lat_step_deg.max(1e-9);
        let pad_lng = self.lng_step_deg.max(1e-9);
        at.lat >= self.min_lat - pad_lat
            && at.lat <= self.max_lat + pad_lat
            && at.lng >= self.min_lng - pad_lng
            && at.lng <= self.max_lng + pad_lng
    }

    /// Bilinear sample, clamped to the grid edges.
    pub fn sample(&self, at: Coordinate) -> f64 {
        let lat = at.lat.clamp(self.min_lat, self.max_lat);
        let lng = at.lng.clamp(self.min_lng, self.max_lng);

        let max_y = (self.rows - 1) as f64;
        let max_x = (self.cols - 1) as f64;
        let y = ((lat - self.min_lat) / self.lat_step_deg.max(1e-9)).clamp(0.0, max_y);
        let x = ((lng - self.min_lng) / self.lng_step_deg.max(1e-9)).clamp(0.0, max_x);

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(self.rows - 1);
        let x1 = (x0 + 1).min(self.cols - 1);
        let dy = y - y0 as f64;
        let dx = x - x0 as f64;

        let v00 = self.value_at(y0, x0);
        let v10 = self.value_at(y0, x1);
        let v01 = self.value_at(y1, x0);
        let v11 = self.value_at(y1, x1);

        let v0 = v00 + (v10 - v00) * dx;
        let v1 = v01 + (v11 - v01) * dx;
        v0 + (v1 - v0) * dy
    }

    fn value_at(&self, row: usize, col: usize) -> f64 {
        let idx = row * self.cols + col.min(self.cols - 1);
        self.elevations_m.get(idx).copied().unwrap_or(0.0)
    }
}

impl ElevationSource for TerrainGrid {
    fn elevation(&self, at: Coordinate) -> Result<f64, ElevationError> {
        if !self.covers(at) {
            return Err(ElevationError::OutOfCoverage {
                lat: at.lat,
                lng: at.lng,
            });
        }
        Ok(self.sample(at))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlopeAspect {
    pub slope_deg: f64,
    /// Downslope direction in degrees clockwise from north; 0 on flat ground.
    pub aspect_deg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewshedResult {
    pub visible: Vec<TerrainPoint>,
    pub hidden: Vec<TerrainPoint>,
    pub view_radius_m: f64,
    pub observer_height_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catchment {
    pub id: String,
    pub points: Vec<TerrainPoint>,
    pub area_m2: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatershedResult {
    pub flow_paths: Vec<Vec<TerrainPoint>>,
    pub catchments: Vec<Catchment>,
    pub drainage_points: Vec<TerrainPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathDifficulty {
    Easy,
    Moderate,
    Difficult,
    Extreme,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub path: Vec<TerrainPoint>,
    pub distance_m: f64,
    pub elevation_gain_m: f64,
    pub difficulty: PathDifficulty,
    pub hazards: Vec<HazardPoint>,
    /// True when any sampled point is steeper than the requested limit.
    pub exceeds_max_slope: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElevationProfile {
    /// Cumulative distance at each sample, starting at 0.
    pub distances_m: Vec<f64>,
    pub elevations_m: Vec<f64>,
    pub total_distance_m: f64,
    pub max_elevation_m: f64,
    pub min_elevation_m: f64,
    pub total_ascent_m: f64,
    pub total_descent_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceType {
    Open,
    Water,
    Forest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandingSuitability {
    pub suitable: bool,
    pub score: f64,
    pub slope_deg: f64,
    pub elevation_m: f64,
    pub reasons: Vec<String>,
}

/// Ground context for one planned waypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointTerrain {
    pub waypoint_id: String,
    pub sequence: u32,
    pub ground_elevation_m: f64,
    /// Waypoint altitude above ground added to the ground elevation.
    pub altitude_amsl_m: f64,
    pub slope_deg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hazard: Option<HazardKind>,
}

/// Terrain analysis bound to one elevation source.
///
/// Lookups are memoized per instance by rounded coordinate. The memo is safe
/// to share across threads and lives until [`TerrainAnalyzer::clear_cache`]
/// or drop.
pub struct TerrainAnalyzer<S> {
    source: S,
    config: TerrainConfig,
    memo: DashMap<(i64, i64), f64>,
}

impl<S: ElevationSource> TerrainAnalyzer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            config: TerrainConfig::default(),
            memo: DashMap::new(),
        }
    }

    pub fn with_config(source: S, config: TerrainConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            memo: DashMap::new(),
        })
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn cache_len(&self) -> usize {
        self.memo.len()
    }

    pub fn clear_cache(&self) {
        self.memo.clear();
    }

    fn memo_key(&self, at: Coordinate) -> (i64, i64) {
        let p = self.config.memo_precision_deg;
        ((at.lat / p).round() as i64, (at.lng / p).round() as i64)
    }

    /// Ground elevation at `at`, memoized.
    pub fn elevation(&self, at: Coordinate) -> EngineResult<f64> {
        if !at.is_valid() {
            return Err(EngineError::InvalidCoordinate {
                lat: at.lat,
                lng: at.lng,
            });
        }
        let key = self.memo_key(at);
        if let Some(hit) = self.memo.get(&key) {
            return Ok(*hit);
        }
        let value = self.source.elevation(at)?;
        if !value.is_finite() {
            return Err(ElevationError::InvalidValue {
                lat: at.lat,
                lng: at.lng,
            }
            .into());
        }
        self.memo.insert(key, value);
        Ok(value)
    }

    fn terrain_point(&self, at: Coordinate) -> EngineResult<TerrainPoint> {
        Ok(TerrainPoint::new(at.lat, at.lng, self.elevation(at)?))
    }

    pub fn slope_aspect(&self, at: Coordinate) -> EngineResult<SlopeAspect> {
        let step = self.config.slope_offset_deg;
        let center = self.elevation(at)?;
        let north = self.elevation(Coordinate::new(at.lat + step, at.lng))?;
        let east = self.elevation(Coordinate::new(at.lat, at.lng + step))?;

        let dz_dx = (east - center) / (step * meters_per_deg_lng(at.lat));
        let dz_dy = (north - center) / (step * METERS_PER_DEG_LAT);
        let slope_deg = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan().to_degrees();
        let aspect_deg = if dz_dx == 0.0 && dz_dy == 0.0 {
            0.0
        } else {
            normalize_degrees((-dz_dx).atan2(-dz_dy).to_degrees())
        };
        Ok(SlopeAspect { slope_deg, aspect_deg })
    }

    pub fn slope(&self, at: Coordinate) -> EngineResult<f64> {
        Ok(self.slope_aspect(at)?.slope_deg)
    }

    /// Approximate viewshed around `observer`.
    ///
    /// Samples radiate on bearings every `viewshed_bearing_step_deg`, one per
    /// `viewshed_sample_step_m` out to `radius_m`. A sample is visible when
    /// its elevation angle from the observer's eye is below
    /// `visibility_angle_deg`. Intermediate terrain is not checked for
    /// occlusion.
    pub fn viewshed(&self, observer: TerrainPoint, radius_m: f64, observer_height_m: f64) -> EngineResult<ViewshedResult> {
        let origin = observer.coordinate();
        if !origin.is_valid() {
            return Err(EngineError::InvalidCoordinate {
                lat: observer.lat,
                lng: observer.lng,
            });
        }
        if !(radius_m.is_finite() && radius_m > 0.0) {
            return Err(EngineError::invalid_parameter("radius_m", "viewshed radius must be positive"));
        }

        let bearings = (360.0 / self.config.viewshed_bearing_step_deg).ceil() as usize;
        let rings = (radius_m / self.config.viewshed_sample_step_m + 1e-9).floor() as usize;
        let total = bearings.saturating_mul(rings);
        if total > self.config.max_viewshed_samples {
            return Err(EngineError::WorkLimitExceeded {
                what: "viewshed samples",
                limit: self.config.max_viewshed_samples,
            });
        }

        let eye = observer.elevation + observer_height_m;
        let threshold = self.config.visibility_angle_deg.to_radians();
        let mut visible = Vec::new();
        let mut hidden = Vec::new();

        for b in 0..bearings {
            let bearing = b as f64 * self.config.viewshed_bearing_step_deg;
            for ring in 1..=rings {
                let at = offset_by_bearing(origin, ring as f64 * self.config.viewshed_sample_step_m, bearing);
                let point = self.terrain_point(at)?;
                let angle = (point.elevation - eye).atan2(distance(origin, at));
                if angle < threshold {
                    visible.push(point);
                } else {
                    hidden.push(point);
                }
            }
        }

        tracing::debug!(
            visible = visible.len(),
            hidden = hidden.len(),
            radius_m,
            "Viewshed computed"
        );
        Ok(ViewshedResult {
            visible,
            hidden,
            view_radius_m: radius_m,
            observer_height_m,
        })
    }

    /// Grid-sample `bounds`, trace steepest-descent flow from each sample and
    /// collect drainage points into a single catchment.
    ///
    /// When no flow path ends in a local minimum there is no drainage point,
    /// and `catchments` is empty rather than holding an empty catchment.
    pub fn watershed(&self, bounds: &Bounds) -> EngineResult<WatershedResult> {
        validate_scan_bounds(bounds)?;
        let mut result = WatershedResult::default();

        for at in scan_lattice(bounds, self.config.scan_grid_size) {
            let point = self.terrain_point(at)?;
            let path = self.trace_flow_path(point)?;
            if path.len() > 1 {
                result.flow_paths.push(path);
            }
            if point.elevation < self.config.drainage_elevation_m {
                result.drainage_points.push(point);
            }
        }

        if !result.drainage_points.is_empty() {
            let ring: Vec<Coordinate> = result.drainage_points.iter().map(TerrainPoint::coordinate).collect();
            result.catchments.push(Catchment {
                id: "main".to_string(),
                points: result.drainage_points.clone(),
                area_m2: polygon_area_m2(&ring),
            });
        }

        tracing::debug!(
            flow_paths = result.flow_paths.len(),
            drainage = result.drainage_points.len(),
            "Watershed traced"
        );
        Ok(result)
    }

    fn trace_flow_path(&self, start: TerrainPoint) -> EngineResult<Vec<TerrainPoint>> {
        let mut path = vec![start];
        let mut current = start;
        for _ in 0..self.config.flow_max_steps {
            let next = self.lowest_neighbor(current)?;
            if next.elevation >= current.elevation {
                break;
            }
            path.push(next);
            current = next;
        }
        Ok(path)
    }

    /// Lowest of the four cardinal neighbours; earlier neighbours win ties.
    fn lowest_neighbor(&self, point: TerrainPoint) -> EngineResult<TerrainPoint> {
        let step = self.config.flow_step_deg;
        let mut lowest: Option<TerrainPoint> = None;
        for (d_lat, d_lng) in [(step, 0.0), (-step, 0.0), (0.0, step), (0.0, -step)] {
            let candidate = self.terrain_point(Coordinate::new(point.lat + d_lat, point.lng + d_lng))?;
            if lowest.map_or(true, |l| candidate.elevation < l.elevation) {
                lowest = Some(candidate);
            }
        }
        Ok(lowest.unwrap_or(point))
    }

    /// Straight-line path between two points with grade and slope analysis.
    pub fn find_path(&self, start: Coordinate, end: Coordinate, max_slope_deg: f64) -> EngineResult<PathResult> {
        for c in [start, end] {
            if !c.is_valid() {
                return Err(EngineError::InvalidCoordinate { lat: c.lat, lng: c.lng });
            }
        }
        let steps = self.config.path_steps;
        let path = (0..=steps)
            .map(|i| self.terrain_point(interpolate(start, end, i as f64 / steps as f64)))
            .collect::<EngineResult<Vec<_>>>()?;

        let distance_m: f64 = path
            .windows(2)
            .map(|pair| distance(pair[0].coordinate(), pair[1].coordinate()))
            .sum();
        let elevation_gain_m: f64 = path
            .windows(2)
            .map(|pair| (pair[1].elevation - pair[0].elevation).max(0.0))
            .sum();
        let difficulty = self.classify_grade(elevation_gain_m, distance_m);

        let mut hazards = Vec::new();
        let mut exceeds_max_slope = false;
        for point in path.iter().skip(1) {
            let slope = self.slope(point.coordinate())?;
            if slope > max_slope_deg {
                exceeds_max_slope = true;
            }
            if slope > self.config.path_hazard_slope_deg {
                let severity = if slope > self.config.path_high_hazard_slope_deg {
                    HazardSeverity::High
                } else {
                    HazardSeverity::Medium
                };
                hazards.push(HazardPoint {
                    location: *point,
                    kind: HazardKind::SteepSlope,
                    severity,
                    description: format!("Steep section: {slope:.1}°"),
                });
            }
        }

        Ok(PathResult {
            path,
            distance_m,
            elevation_gain_m,
            difficulty,
            hazards,
            exceeds_max_slope,
        })
    }

    fn classify_grade(&self, gain_m: f64, distance_m: f64) -> PathDifficulty {
        if distance_m <= 0.0 {
            return PathDifficulty::Easy;
        }
        let grade = gain_m / distance_m * 100.0;
        if grade < self.config.grade_easy_percent {
            PathDifficulty::Easy
        } else if grade < self.config.grade_moderate_percent {
            PathDifficulty::Moderate
        } else if grade < self.config.grade_difficult_percent {
            PathDifficulty::Difficult
        } else {
            PathDifficulty::Extreme
        }
    }

    /// Scan a lattice over `bounds` for steep slopes and cliffs.
    pub fn identify_hazards(&self, bounds: &Bounds) -> EngineResult<Vec<HazardPoint>> {
        validate_scan_bounds(bounds)?;
        let mut hazards = Vec::new();
        for at in scan_lattice(bounds, self.config.scan_grid_size) {
            let slope = self.slope(at)?;
            if slope <= self.config.steep_slope_deg {
                continue;
            }
            let (kind, severity) = if slope > self.config.cliff_slope_deg {
                (HazardKind::Cliff, HazardSeverity::Critical)
            } else {
                (HazardKind::SteepSlope, HazardSeverity::High)
            };
            hazards.push(HazardPoint {
                location: self.terrain_point(at)?,
                kind,
                severity,
                description: format!("Slope: {slope:.1}°"),
            });
        }
        tracing::debug!(hazards = hazards.len(), "Hazard scan complete");
        Ok(hazards)
    }

    pub fn elevation_profile(&self, path: &[Coordinate]) -> EngineResult<ElevationProfile> {
        let Some(first) = path.first() else {
            return Ok(ElevationProfile::default());
        };
        let mut profile = ElevationProfile {
            distances_m: vec![0.0],
            elevations_m: vec![self.elevation(*first)?],
            ..ElevationProfile::default()
        };

        for pair in path.windows(2) {
            let elevation = self.elevation(pair[1])?;
            let previous = profile.elevations_m.last().copied().unwrap_or(elevation);
            profile.total_distance_m += distance(pair[0], pair[1]);
            profile.distances_m.push(profile.total_distance_m);
            let diff = elevation - previous;
            if diff > 0.0 {
                profile.total_ascent_m += diff;
            } else {
                profile.total_descent_m -= diff;
            }
            profile.elevations_m.push(elevation);
        }

        profile.max_elevation_m = profile.elevations_m.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        profile.min_elevation_m = profile.elevations_m.iter().copied().fold(f64::INFINITY, f64::min);
        Ok(profile)
    }

    /// Score a candidate landing site from its local slope and elevation.
    pub fn landing_suitability(&self, at: Coordinate, surface: Option<SurfaceType>) -> EngineResult<LandingSuitability> {
        let slope = self.slope(at)?;
        let elevation = self.elevation(at)?;
        Ok(assess_landing_site(slope, elevation, surface, &self.config.landing))
    }

    /// Ground elevation, slope and absolute altitude for each waypoint.
    pub fn annotate_waypoints(&self, waypoints: &[Waypoint]) -> EngineResult<Vec<WaypointTerrain>> {
        waypoints
            .iter()
            .map(|wp| {
                let ground = self.elevation(wp.coordinate)?;
                let slope = self.slope(wp.coordinate)?;
                let hazard = if slope > self.config.cliff_slope_deg {
                    Some(HazardKind::Cliff)
                } else if slope > self.config.steep_slope_deg {
                    Some(HazardKind::SteepSlope)
                } else {
                    None
                };
                Ok(WaypointTerrain {
                    waypoint_id: wp.id.clone(),
                    sequence: wp.sequence,
                    ground_elevation_m: ground,
                    altitude_amsl_m: ground + wp.altitude_m,
                    slope_deg: slope,
                    hazard,
                })
            })
            .collect()
    }

    /// Cruise altitude clearing the highest ground along `path`.
    pub fn flight_altitude_for(&self, path: &[Coordinate]) -> EngineResult<f64> {
        let profile = self.elevation_profile(path)?;
        Ok(optimal_flight_altitude(
            &profile.elevations_m,
            self.config.flight_clearance_m,
            self.config.max_flight_altitude_m,
        ))
    }
}

/// Highest terrain plus clearance, capped at `max_altitude_m`.
pub fn optimal_flight_altitude(terrain_profile: &[f64], min_clearance_m: f64, max_altitude_m: f64) -> f64 {
    let highest = terrain_profile
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if highest == f64::NEG_INFINITY {
        return min_clearance_m.min(max_altitude_m);
    }
    (highest + min_clearance_m).min(max_altitude_m)
}

pub fn assess_landing_site(
    slope_deg: f64,
    elevation_m: f64,
    surface: Option<SurfaceType>,
    rules: &LandingSiteRules,
) -> LandingSuitability {
    let mut score: f64 = 100.0;
    let mut reasons = Vec::new();

    if slope_deg > rules.steep_slope_deg {
        score -= rules.steep_slope_penalty;
        reasons.push(format!("Slope too steep: {slope_deg:.1}°"));
    } else if slope_deg > rules.moderate_slope_deg {
        score -= rules.moderate_slope_penalty;
        reasons.push(format!("Moderate slope: {slope_deg:.1}°"));
    }

    if elevation_m > rules.high_altitude_m {
        score -= rules.high_altitude_penalty;
        reasons.push(format!("High altitude: {elevation_m:.0}m"));
    } else if elevation_m > rules.moderate_altitude_m {
        score -= rules.moderate_altitude_penalty;
        reasons.push(format!("Moderate altitude: {elevation_m:.0}m"));
    }

    match surface {
        Some(SurfaceType::Water) => {
            score = 0.0;
            reasons.push("Water body - unsuitable for landing".to_string());
        }
        Some(SurfaceType::Forest) => {
            score -= rules.vegetation_penalty;
            reasons.push("Dense vegetation may obstruct landing".to_string());
        }
        Some(SurfaceType::Open) | None => {}
    }

    LandingSuitability {
        suitable: score >= rules.suitable_score,
        score: score.max(0.0),
        slope_deg,
        elevation_m,
        reasons,
    }
}

fn validate_scan_bounds(bounds: &Bounds) -> EngineResult<()> {
    let corners = [
        Coordinate::new(bounds.min_lat, bounds.min_lng),
        Coordinate::new(bounds.max_lat, bounds.max_lng),
    ];
    if corners.iter().any(|c| !c.is_valid()) {
        return Err(EngineError::DegenerateGeometry("scan bounds are not valid coordinates".into()));
    }
    if bounds.max_lat <= bounds.min_lat || bounds.max_lng <= bounds.min_lng {
        return Err(EngineError::DegenerateGeometry("scan bounds have zero area".into()));
    }
    Ok(())
}

/// `n` x `n` lattice anchored at the south-west corner, excluding the far edges.
fn scan_lattice(bounds: &Bounds, n: usize) -> impl Iterator<Item = Coordinate> + '_ {
    let lat_span = bounds.lat_span();
    let lng_span = bounds.lng_span();
    (0..n).flat_map(move |i| {
        (0..n).map(move |j| {
            Coordinate::new(
                bounds.min_lat + lat_span * i as f64 / n as f64,
                bounds.min_lng + lng_span * j as f64 / n as f64,
            )
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAT0: f64 = 40.0;
    const LNG0: f64 = -105.0;

    /// Plane rising to the east with the given gradient (m per m).
    fn east_ramp(gradient: f64) -> impl Fn(Coordinate) -> Result<f64, ElevationError> {
        let scale = meters_per_deg_lng(LAT0);
        move |c: Coordinate| -> Result<f64, ElevationError> { Ok(1000.0 + (c.lng - LNG0) * scale * gradient) }
    }

    /// Plane rising to the north from sea level at `LAT0`.
    fn north_ramp(gradient: f64) -> impl Fn(Coordinate) -> Result<f64, ElevationError> {
        move |c: Coordinate| -> Result<f64, ElevationError> { Ok((c.lat - LAT0) * METERS_PER_DEG_LAT * gradient) }
    }

    fn flat(height: f64) -> impl Fn(Coordinate) -> Result<f64, ElevationError> {
        move |_: Coordinate| -> Result<f64, ElevationError> { Ok(height) }
    }

    fn scan_box(span: f64) -> Bounds {
        Bounds {
            min_lat: LAT0,
            max_lat: LAT0 + span,
            min_lng: LNG0,
            max_lng: LNG0 + span,
        }
    }

    #[test]
    fn slope_and_aspect_of_eastward_ramp() {
        let analyzer = TerrainAnalyzer::new(east_ramp(1.0));
        let sa = analyzer.slope_aspect(Coordinate::new(LAT0, LNG0)).unwrap();
        assert!((sa.slope_deg - 45.0).abs() < 1e-6, "got {}", sa.slope_deg);
        // Ground falls away to the west.
        assert!((sa.aspect_deg - 270.0).abs() < 1e-6, "got {}", sa.aspect_deg);
    }

    #[test]
    fn flat_ground_has_zero_slope_and_aspect() {
        let analyzer = TerrainAnalyzer::new(flat(250.0));
        let sa = analyzer.slope_aspect(Coordinate::new(LAT0, LNG0)).unwrap();
        assert_eq!(sa.slope_deg, 0.0);
        assert_eq!(sa.aspect_deg, 0.0);
    }

    #[test]
    fn lookups_are_memoized_per_instance() {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let source = |_: Coordinate| -> Result<f64, ElevationError> {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(10.0)
        };
        let analyzer = TerrainAnalyzer::new(source);
        let at = Coordinate::new(LAT0, LNG0);
        analyzer.elevation(at).unwrap();
        analyzer.elevation(Coordinate::new(LAT0 + 1e-9, LNG0)).unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(analyzer.cache_len(), 1);

        analyzer.clear_cache();
        assert_eq!(analyzer.cache_len(), 0);
        analyzer.elevation(at).unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn analyzer_can_be_shared_across_threads() {
        let analyzer = TerrainAnalyzer::new(east_ramp(0.2));
        std::thread::scope(|scope| {
            for t in 0..4 {
                let analyzer = &analyzer;
                scope.spawn(move || {
                    for i in 0..10 {
                        let at = Coordinate::new(LAT0 + (t * 10 + i) as f64 * 0.001, LNG0);
                        analyzer.slope(at).unwrap();
                    }
                });
            }
        });
        assert!(analyzer.cache_len() >= 40);
    }

    #[test]
    fn collaborator_failures_propagate() {
        let analyzer = TerrainAnalyzer::new(|_: Coordinate| -> Result<f64, ElevationError> {
            Err(ElevationError::Unavailable("timeout".into()))
        });
        let err = analyzer.slope(Coordinate::new(LAT0, LNG0)).unwrap_err();
        assert_eq!(err, EngineError::Elevation(ElevationError::Unavailable("timeout".into())));

        let nan = TerrainAnalyzer::new(flat(f64::NAN));
        assert!(matches!(
            nan.elevation(Coordinate::new(LAT0, LNG0)),
            Err(EngineError::Elevation(ElevationError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn viewshed_on_flat_ground_sees_everything() {
        let analyzer = TerrainAnalyzer::new(flat(0.0));
        let observer = TerrainPoint::new(LAT0, LNG0, 0.0);
        let result = analyzer.viewshed(observer, 5000.0, 2.0).unwrap();
        assert_eq!(result.visible.len(), 36 * 50);
        assert!(result.hidden.is_empty());
    }

    #[test]
    fn viewshed_hides_steep_nearby_terrain() {
        let analyzer = TerrainAnalyzer::new(flat(1000.0));
        let observer = TerrainPoint::new(LAT0, LNG0, 0.0);
        let result = analyzer.viewshed(observer, 5000.0, 2.0).unwrap();
        assert!(!result.hidden.is_empty());
        assert!(!result.visible.is_empty());
        let origin = observer.coordinate();
        let nearest_visible = result
            .visible
            .iter()
            .map(|p| distance(origin, p.coordinate()))
            .fold(f64::INFINITY, f64::min);
        let farthest_hidden = result
            .hidden
            .iter()
            .map(|p| distance(origin, p.coordinate()))
            .fold(0.0, f64::max);
        assert!(farthest_hidden < nearest_visible);
    }

    #[test]
    fn viewshed_rejects_zero_radius_and_oversized_requests() {
        let analyzer = TerrainAnalyzer::new(flat(0.0));
        let observer = TerrainPoint::new(LAT0, LNG0, 0.0);
        assert!(analyzer.viewshed(observer, 0.0, 2.0).is_err());
        assert!(matches!(
            analyzer.viewshed(observer, 1_000_000.0, 2.0),
            Err(EngineError::WorkLimitExceeded { .. })
        ));
    }

    #[test]
    fn watershed_flows_downhill_into_drainage() {
        let analyzer = TerrainAnalyzer::new(north_ramp(0.1));
        let result = analyzer.watershed(&scan_box(0.01)).unwrap();

        assert!(!result.drainage_points.is_empty());
        assert!(result.drainage_points.iter().all(|p| p.elevation < 50.0));
        assert_eq!(result.catchments.len(), 1);
        assert_eq!(result.catchments[0].id, "main");

        assert!(!result.flow_paths.is_empty());
        for path in &result.flow_paths {
            assert!(path.len() <= 11);
            for pair in path.windows(2) {
                assert!(pair[1].elevation < pair[0].elevation);
                assert!(pair[1].lat < pair[0].lat);
            }
        }
    }

    #[test]
    fn flat_high_ground_has_no_drainage_or_flow() {
        let analyzer = TerrainAnalyzer::new(flat(300.0));
        let result = analyzer.watershed(&scan_box(0.01)).unwrap();
        assert!(result.flow_paths.is_empty());
        assert!(result.drainage_points.is_empty());
        assert!(result.catchments.is_empty());
    }

    #[test]
    fn path_on_flat_ground_is_easy() {
        let analyzer = TerrainAnalyzer::new(flat(100.0));
        let result = analyzer
            .find_path(Coordinate::new(LAT0, LNG0), Coordinate::new(LAT0 + 0.01, LNG0), 15.0)
            .unwrap();
        assert_eq!(result.path.len(), 21);
        assert_eq!(result.elevation_gain_m, 0.0);
        assert_eq!(result.difficulty, PathDifficulty::Easy);
        assert!(result.hazards.is_empty());
        assert!(!result.exceeds_max_slope);
    }

    #[test]
    fn path_up_a_steep_ramp_is_extreme_and_hazardous() {
        let analyzer = TerrainAnalyzer::new(east_ramp(0.5));
        let result = analyzer
            .find_path(Coordinate::new(LAT0, LNG0), Coordinate::new(LAT0, LNG0 + 0.01), 15.0)
            .unwrap();
        assert_eq!(result.difficulty, PathDifficulty::Extreme);
        assert!(result.exceeds_max_slope);
        assert_eq!(result.hazards.len(), 20);
        assert!(result
            .hazards
            .iter()
            .all(|h| h.kind == HazardKind::SteepSlope && h.severity == HazardSeverity::Medium));
    }

    #[test]
    fn zero_length_path_is_easy() {
        let analyzer = TerrainAnalyzer::new(flat(10.0));
        let at = Coordinate::new(LAT0, LNG0);
        let result = analyzer.find_path(at, at, 15.0).unwrap();
        assert_eq!(result.distance_m, 0.0);
        assert_eq!(result.difficulty, PathDifficulty::Easy);
    }

    #[test]
    fn hazard_scan_classifies_slopes() {
        let steep = TerrainAnalyzer::new(east_ramp(0.7));
        let hazards = steep.identify_hazards(&scan_box(0.01)).unwrap();
        assert_eq!(hazards.len(), 400);
        assert!(hazards
            .iter()
            .all(|h| h.kind == HazardKind::SteepSlope && h.severity == HazardSeverity::High));

        let cliff = TerrainAnalyzer::new(east_ramp(2.0));
        let hazards = cliff.identify_hazards(&scan_box(0.01)).unwrap();
        assert!(hazards
            .iter()
            .all(|h| h.kind == HazardKind::Cliff && h.severity == HazardSeverity::Critical));

        let gentle = TerrainAnalyzer::new(east_ramp(0.1));
        assert!(gentle.identify_hazards(&scan_box(0.01)).unwrap().is_empty());
    }

    #[test]
    fn degenerate_scan_bounds_are_rejected() {
        let analyzer = TerrainAnalyzer::new(flat(0.0));
        let mut bounds = scan_box(0.01);
        bounds.max_lat = bounds.min_lat;
        assert!(matches!(
            analyzer.identify_hazards(&bounds),
            Err(EngineError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn elevation_profile_tracks_ascent_and_descent() {
        let heights = [100.0, 150.0, 120.0, 180.0];
        let path: Vec<Coordinate> = (0..4).map(|i| Coordinate::new(LAT0, LNG0 + i as f64 * 0.001)).collect();
        let lookup = move |c: Coordinate| -> Result<f64, ElevationError> {
            let idx = ((c.lng - LNG0) / 0.001).round() as usize;
            Ok(heights[idx.min(3)])
        };
        let analyzer = TerrainAnalyzer::new(lookup);
        let profile = analyzer.elevation_profile(&path).unwrap();
        assert_eq!(profile.elevations_m, heights.to_vec());
        assert_eq!(profile.distances_m.len(), 4);
        assert_eq!(profile.distances_m[0], 0.0);
        assert!((profile.total_ascent_m - 110.0).abs() < 1e-9);
        assert!((profile.total_descent_m - 30.0).abs() < 1e-9);
        assert_eq!(profile.max_elevation_m, 180.0);
        assert_eq!(profile.min_elevation_m, 100.0);
    }

    #[test]
    fn flight_altitude_is_capped() {
        assert_eq!(optimal_flight_altitude(&[120.0, 250.0, 90.0], 100.0, 400.0), 350.0);
        assert_eq!(optimal_flight_altitude(&[380.0], 100.0, 400.0), 400.0);
        assert_eq!(optimal_flight_altitude(&[], 100.0, 400.0), 100.0);
    }

    #[test]
    fn landing_site_scoring() {
        let rules = LandingSiteRules::default();
        let ideal = assess_landing_site(2.0, 300.0, Some(SurfaceType::Open), &rules);
        assert!(ideal.suitable);
        assert_eq!(ideal.score, 100.0);

        let steep_high = assess_landing_site(18.0, 3200.0, None, &rules);
        assert_eq!(steep_high.score, 20.0);
        assert!(!steep_high.suitable);
        assert_eq!(steep_high.reasons.len(), 2);

        let water = assess_landing_site(0.0, 0.0, Some(SurfaceType::Water), &rules);
        assert_eq!(water.score, 0.0);
        assert!(!water.suitable);

        let forest = assess_landing_site(0.0, 0.0, Some(SurfaceType::Forest), &rules);
        assert_eq!(forest.score, 60.0);
        assert!(forest.suitable);
    }

    #[test]
    fn grid_interpolates_and_reports_coverage() {
        let bounds = scan_box(0.01);
        let grid = TerrainGrid::from_source(bounds, 11, 11, &east_ramp(0.1)).unwrap();
        assert_eq!(grid.dims(), (11, 11));

        let mid = Coordinate::new(LAT0 + 0.005, LNG0 + 0.0055);
        let expected = east_ramp(0.1)(mid).unwrap();
        assert!((grid.sample(mid) - expected).abs() < 1e-6);

        assert!(matches!(
            grid.elevation(Coordinate::new(LAT0 + 1.0, LNG0)),
            Err(ElevationError::OutOfCoverage { .. })
        ));

        let analyzer = TerrainAnalyzer::new(grid);
        let slope = analyzer.slope(Coordinate::new(LAT0 + 0.004, LNG0 + 0.004)).unwrap();
        assert!((slope - 0.1f64.atan().to_degrees()).abs() < 0.01);
    }

    #[test]
    fn grid_rejects_mismatched_samples() {
        let bounds = scan_box(0.01);
        assert!(TerrainGrid::new(bounds, 0.005, 0.005, 3, 3, vec![0.0; 8]).is_err());
        assert!(TerrainGrid::new(bounds, 0.005, 0.005, 3, 3, vec![0.0; 9]).is_ok());
    }

    #[test]
    fn waypoint_annotation_adds_ground_context() {
        let analyzer = TerrainAnalyzer::new(east_ramp(0.7));
        let wps = vec![
            Waypoint::scan(1, Coordinate::new(LAT0, LNG0), 60.0),
            Waypoint::scan(2, Coordinate::new(LAT0, LNG0 + 0.001), 60.0),
        ];
        let annotated = analyzer.annotate_waypoints(&wps).unwrap();
        assert_eq!(annotated.len(), 2);
        assert!((annotated[0].ground_elevation_m - 1000.0).abs() < 1e-9);
        assert!((annotated[0].altitude_amsl_m - 1060.0).abs() < 1e-9);
        assert!(annotated[1].ground_elevation_m > annotated[0].ground_elevation_m);
        assert_eq!(annotated[0].hazard, Some(HazardKind::SteepSlope));
    }
}
