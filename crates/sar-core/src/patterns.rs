//! Search pattern generation and mission planning helpers.

use crate::error::{EngineError, EngineResult};
use crate::models::{Coordinate, NoFlyZone, RestrictionLevel, SearchArea, SearchPattern, Waypoint, WaypointAction};
use crate::spatial::{
    distance, meters_per_deg_lng, meters_to_lat_deg, point_in_polygon, polygon_centroid, validate_polygon, Bounds,
    METERS_PER_DEG_LAT,
};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Default cap on waypoints generated for one area.
pub const DEFAULT_MAX_WAYPOINTS: usize = 10_000;
/// Angular samples per spiral ring (step of pi/8).
pub const DEFAULT_SPIRAL_SAMPLES_PER_RING: usize = 16;
/// Battery drawn per minute of flight, in percent.
pub const DEFAULT_BATTERY_PERCENT_PER_MINUTE: f64 = 2.0;
/// Candidate points examined per allowed waypoint when clipping.
pub const DEFAULT_CLIP_CANDIDATE_FACTOR: usize = 4;

const STEP_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub max_waypoints: usize,
    pub spiral_samples_per_ring: usize,
    pub battery_percent_per_minute: f64,
    /// Drop generated points that fall outside the area polygon.
    pub clip_to_polygon: bool,
    /// With clipping on, at most `max_waypoints * clip_candidate_factor`
    /// candidate points are examined, kept or not.
    pub clip_candidate_factor: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            max_waypoints: DEFAULT_MAX_WAYPOINTS,
            spiral_samples_per_ring: DEFAULT_SPIRAL_SAMPLES_PER_RING,
            battery_percent_per_minute: DEFAULT_BATTERY_PERCENT_PER_MINUTE,
            clip_to_polygon: false,
            clip_candidate_factor: DEFAULT_CLIP_CANDIDATE_FACTOR,
        }
    }
}

impl PatternConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_waypoints == 0 {
            return Err(EngineError::invalid_parameter("max_waypoints", "must be > 0"));
        }
        if self.spiral_samples_per_ring == 0 {
            return Err(EngineError::invalid_parameter(
                "spiral_samples_per_ring",
                "must be > 0",
            ));
        }
        if self.clip_candidate_factor == 0 {
            return Err(EngineError::invalid_parameter(
                "clip_candidate_factor",
                "must be > 0",
            ));
        }
        if !(self.battery_percent_per_minute.is_finite() && self.battery_percent_per_minute >= 0.0) {
            return Err(EngineError::invalid_parameter(
                "battery_percent_per_minute",
                "must be non-negative",
            ));
        }
        Ok(())
    }

    fn max_candidates(&self) -> usize {
        self.max_waypoints.saturating_mul(self.clip_candidate_factor)
    }
}

/// A waypoint that enters a no-fly zone inside its restricted altitude band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoFlyConflict {
    pub waypoint_id: String,
    pub sequence: u32,
    pub zone_id: String,
    pub restriction_level: RestrictionLevel,
    pub altitude_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionStats {
    pub total_distance_m: f64,
    pub total_time_s: f64,
    /// Total time rounded up to whole minutes.
    pub total_time_min: u64,
    /// Battery estimate in percent, rounded up and capped at 100.
    pub estimated_battery_percent: f64,
    pub average_speed_mps: f64,
    pub waypoint_count: usize,
    pub can_complete: bool,
}

/// Accumulates waypoints while enforcing the configured bound.
struct PlanBuilder<'a> {
    area: &'a SearchArea,
    config: &'a PatternConfig,
    waypoints: Vec<Waypoint>,
    /// Candidate points seen, including clipped ones.
    visited: usize,
}

impl<'a> PlanBuilder<'a> {
    fn new(area: &'a SearchArea, config: &'a PatternConfig) -> Self {
        Self {
            area,
            config,
            waypoints: Vec::new(),
            visited: 0,
        }
    }

    fn push(&mut self, coordinate: Coordinate) -> EngineResult<()> {
        if self.config.clip_to_polygon {
            self.visited += 1;
            if self.visited > self.config.max_candidates() {
                return Err(EngineError::WorkLimitExceeded {
                    what: "clipped search pattern candidates",
                    limit: self.config.max_candidates(),
                });
            }
            if !point_in_polygon(coordinate, &self.area.polygon) {
                return Ok(());
            }
        }
        if self.waypoints.len() >= self.config.max_waypoints {
            return Err(EngineError::WorkLimitExceeded {
                what: "search pattern waypoints",
                limit: self.config.max_waypoints,
            });
        }
        let sequence = self.waypoints.len() as u32 + 1;
        self.waypoints
            .push(Waypoint::scan(sequence, coordinate, self.area.altitude_m));
        Ok(())
    }

    /// Push unless identical to the last emitted point.
    fn push_distinct(&mut self, coordinate: Coordinate) -> EngineResult<()> {
        if self.waypoints.last().map(|w| w.coordinate) == Some(coordinate) {
            return Ok(());
        }
        self.push(coordinate)
    }

    fn finish(self) -> EngineResult<Vec<Waypoint>> {
        if self.waypoints.is_empty() && self.config.clip_to_polygon {
            return Err(EngineError::DegenerateGeometry(format!(
                "no pattern point of area {} falls inside its polygon",
                self.area.id
            )));
        }
        Ok(self.waypoints)
    }
}

/// Number of whole steps that fit in `span`, tolerant of float drift.
fn step_count(span: f64, step: f64) -> i64 {
    ((span / step) + STEP_EPSILON).floor() as i64
}

#[derive(Debug, Clone, Default)]
pub struct SearchPatternGenerator {
    config: PatternConfig,
}

impl SearchPatternGenerator {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Build the waypoint sequence for an area according to its pattern.
    ///
    /// Sequences are assigned 1..N in generation order.
    pub fn generate(&self, area: &SearchArea) -> EngineResult<Vec<Waypoint>> {
        validate_polygon(&area.polygon)?;
        if !(area.line_spacing_m.is_finite() && area.line_spacing_m > 0.0) {
            return Err(EngineError::invalid_parameter(
                "line_spacing_m",
                format!("must be positive, got {}", area.line_spacing_m),
            ));
        }
        if !(0.0..=1.0).contains(&area.overlap) {
            return Err(EngineError::invalid_parameter(
                "overlap",
                format!("must be within [0, 1], got {}", area.overlap),
            ));
        }
        if !area.altitude_m.is_finite() {
            return Err(EngineError::invalid_parameter("altitude_m", "must be finite"));
        }

        let bounds = Bounds::from_coordinates(&area.polygon)
            .ok_or_else(|| EngineError::DegenerateGeometry("search area has no vertices".into()))?;

        let waypoints = match area.pattern {
            SearchPattern::Grid => self.grid(area, &bounds)?,
            SearchPattern::Spiral => self.spiral(area, &bounds)?,
            SearchPattern::ExpandingSquare => self.expanding_square(area, &bounds)?,
            SearchPattern::Parallel => self.parallel(area, &bounds)?,
        };

        tracing::debug!(
            area = %area.id,
            pattern = ?area.pattern,
            waypoints = waypoints.len(),
            "Generated search pattern"
        );
        Ok(waypoints)
    }

    /// Boustrophedon rows of constant latitude, alternating direction.
    fn grid(&self, area: &SearchArea, bounds: &Bounds) -> EngineResult<Vec<Waypoint>> {
        let lat_step = meters_to_lat_deg(area.line_spacing_m);
        let lng_step = area.line_spacing_m / meters_per_deg_lng(bounds.center().lat);
        let rows = step_count(bounds.lat_span(), lat_step);
        let cols = step_count(bounds.lng_span(), lng_step);

        let mut plan = PlanBuilder::new(area, &self.config);
        for row in 0..=rows {
            let lat = bounds.min_lat + row as f64 * lat_step;
            for i in 0..=cols {
                let col = if row % 2 == 0 { i } else { cols - i };
                plan.push(Coordinate::new(lat, bounds.min_lng + col as f64 * lng_step))?;
            }
        }
        plan.finish()
    }

    /// Concentric rings around the centroid; ring zero is the centroid itself.
    fn spiral(&self, area: &SearchArea, bounds: &Bounds) -> EngineResult<Vec<Waypoint>> {
        let center = polygon_centroid(&area.polygon).unwrap_or_else(|| bounds.center());
        let lng_scale = meters_per_deg_lng(center.lat);
        let max_radius_m = (bounds.lat_span() * METERS_PER_DEG_LAT)
            .max(bounds.lng_span() * lng_scale)
            / 2.0;
        let rings = step_count(max_radius_m, area.line_spacing_m);
        let samples = self.config.spiral_samples_per_ring.max(1);
        let angle_step = 2.0 * PI / samples as f64;

        let mut plan = PlanBuilder::new(area, &self.config);
        plan.push(center)?;
        for ring in 1..=rings {
            let radius_m = ring as f64 * area.line_spacing_m;
            let d_lat = meters_to_lat_deg(radius_m);
            let d_lng = radius_m / lng_scale;
            for k in 0..samples {
                let angle = k as f64 * angle_step;
                plan.push(Coordinate::new(
                    center.lat + d_lat * angle.sin(),
                    center.lng + d_lng * angle.cos(),
                ))?;
            }
        }
        plan.finish()
    }

    /// Squares of growing half-size around the centroid, each walked
    /// top, right, bottom, left.
    fn expanding_square(&self, area: &SearchArea, bounds: &Bounds) -> EngineResult<Vec<Waypoint>> {
        let center = polygon_centroid(&area.polygon).unwrap_or_else(|| bounds.center());
        let lat_step = meters_to_lat_deg(area.line_spacing_m);
        let lng_step = area.line_spacing_m / meters_per_deg_lng(center.lat);
        let half_extent_m = (bounds.lat_span() * METERS_PER_DEG_LAT)
            .max(bounds.lng_span() * meters_per_deg_lng(center.lat))
            / 2.0;
        let squares = step_count(half_extent_m, area.line_spacing_m);
        let at = |i: i64, j: i64| {
            Coordinate::new(center.lat + i as f64 * lat_step, center.lng + j as f64 * lng_step)
        };

        let mut plan = PlanBuilder::new(area, &self.config);
        plan.push(center)?;
        for k in 1..=squares {
            for j in -k..=k {
                plan.push_distinct(at(k, j))?;
            }
            for i in (-k..=k).rev() {
                plan.push_distinct(at(i, k))?;
            }
            for j in (-k..=k).rev() {
                plan.push_distinct(at(-k, j))?;
            }
            for i in -k..=k {
                plan.push_distinct(at(i, -k))?;
            }
        }
        plan.finish()
    }

    /// South-to-north line pairs at each longitude step, for corridors.
    fn parallel(&self, area: &SearchArea, bounds: &Bounds) -> EngineResult<Vec<Waypoint>> {
        let lng_step = area.line_spacing_m / meters_per_deg_lng(bounds.center().lat);
        let cols = step_count(bounds.lng_span(), lng_step);

        let mut plan = PlanBuilder::new(area, &self.config);
        for col in 0..=cols {
            let lng = bounds.min_lng + col as f64 * lng_step;
            plan.push(Coordinate::new(bounds.min_lat, lng))?;
            plan.push(Coordinate::new(bounds.max_lat, lng))?;
        }
        plan.finish()
    }

    pub fn calculate_mission_stats(
        &self,
        waypoints: &[Waypoint],
        speed_mps: f64,
        battery_capacity: f64,
    ) -> EngineResult<MissionStats> {
        calculate_mission_stats_with_rate(
            waypoints,
            speed_mps,
            battery_capacity,
            self.config.battery_percent_per_minute,
        )
    }
}

/// Greedy nearest-neighbour reordering starting from the first waypoint.
///
/// O(n²) and not globally optimal. The waypoint set is preserved exactly;
/// only order and `sequence` change. Ties keep the earlier waypoint.
pub fn optimize_waypoint_sequence(waypoints: &[Waypoint]) -> Vec<Waypoint> {
    let Some(first) = waypoints.first() else {
        return Vec::new();
    };

    let mut remaining: Vec<&Waypoint> = waypoints[1..].iter().collect();
    let mut ordered = Vec::with_capacity(waypoints.len());
    let mut current = first;
    ordered.push(first.clone());

    while !remaining.is_empty() {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (idx, candidate) in remaining.iter().enumerate() {
            let d = distance(current.coordinate, candidate.coordinate);
            if d < best_dist {
                best_dist = d;
                best = idx;
            }
        }
        current = remaining.remove(best);
        ordered.push(current.clone());
    }

    for (idx, wp) in ordered.iter_mut().enumerate() {
        wp.sequence = idx as u32 + 1;
    }
    ordered
}

/// Flag every (waypoint, zone) pair where the waypoint sits inside the zone
/// polygon and within its restricted altitude band. Nothing is resolved.
///
/// Every zone polygon is validated before any waypoint is checked.
pub fn check_no_fly_zone_conflicts(
    waypoints: &[Waypoint],
    zones: &[NoFlyZone],
) -> EngineResult<Vec<NoFlyConflict>> {
    for zone in zones {
        validate_polygon(&zone.polygon)?;
    }
    let mut conflicts = Vec::new();
    for wp in waypoints {
        for zone in zones {
            if point_in_polygon(wp.coordinate, &zone.polygon) && zone.restricts_altitude(wp.altitude_m) {
                conflicts.push(NoFlyConflict {
                    waypoint_id: wp.id.clone(),
                    sequence: wp.sequence,
                    zone_id: zone.id.clone(),
                    restriction_level: zone.restriction_level,
                    altitude_m: wp.altitude_m,
                });
            }
        }
    }
    if !conflicts.is_empty() {
        tracing::debug!(conflicts = conflicts.len(), "No-fly zone conflicts found");
    }
    Ok(conflicts)
}

/// Mission estimate using the default 2%-per-minute battery model.
pub fn calculate_mission_stats(
    waypoints: &[Waypoint],
    speed_mps: f64,
    battery_capacity: f64,
) -> EngineResult<MissionStats> {
    calculate_mission_stats_with_rate(
        waypoints,
        speed_mps,
        battery_capacity,
        DEFAULT_BATTERY_PERCENT_PER_MINUTE,
    )
}

fn calculate_mission_stats_with_rate(
    waypoints: &[Waypoint],
    speed_mps: f64,
    battery_capacity: f64,
    percent_per_minute: f64,
) -> EngineResult<MissionStats> {
    if !(speed_mps.is_finite() && speed_mps > 0.0) {
        return Err(EngineError::invalid_parameter(
            "speed_mps",
            format!("must be positive, got {speed_mps}"),
        ));
    }
    if !(battery_capacity.is_finite() && battery_capacity >= 0.0) {
        return Err(EngineError::invalid_parameter(
            "battery_capacity",
            "must be a non-negative percentage",
        ));
    }

    let total_distance_m: f64 = waypoints
        .windows(2)
        .map(|pair| distance(pair[0].coordinate, pair[1].coordinate))
        .sum();
    let hover_s: f64 = waypoints
        .iter()
        .filter(|wp| wp.action == WaypointAction::Hover)
        .filter_map(|wp| wp.hover_duration_s)
        .filter(|d| d.is_finite() && *d > 0.0)
        .sum();
    let total_time_s = total_distance_m / speed_mps + hover_s;

    let raw_battery = total_time_s / 60.0 * percent_per_minute;
    let average_speed_mps = if total_time_s > 0.0 {
        total_distance_m / total_time_s
    } else {
        0.0
    };

    Ok(MissionStats {
        total_distance_m,
        total_time_s,
        total_time_min: (total_time_s / 60.0).ceil() as u64,
        estimated_battery_percent: raw_battery.ceil().min(100.0),
        average_speed_mps,
        waypoint_count: waypoints.len(),
        can_complete: raw_battery <= battery_capacity,
    })
}

/// Keep the leading share of a plan proportional to the available battery.
pub fn truncate_for_battery(waypoints: &[Waypoint], battery_percent: f64) -> Vec<Waypoint> {
    let share = battery_percent.clamp(0.0, 100.0) / 100.0;
    let keep = (share * waypoints.len() as f64).floor() as usize;
    waypoints[..keep.min(waypoints.len())].to_vec()
}
