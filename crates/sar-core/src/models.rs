//! Core data models shared by the planning components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    #[serde(alias = "latitude")]
    pub lat: f64,
    #[serde(alias = "lon", alias = "longitude")]
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True when both components are finite and within the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// A coordinate with its ground elevation in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerrainPoint {
    #[serde(alias = "latitude")]
    pub lat: f64,
    #[serde(alias = "lon", alias = "longitude")]
    pub lng: f64,
    pub elevation: f64,
}

impl TerrainPoint {
    pub const fn new(lat: f64, lng: f64, elevation: f64) -> Self {
        Self {
            lat,
            lng,
            elevation,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaypointAction {
    Flyover,
    Hover,
    Photo,
    #[default]
    Scan,
}

/// A single step of a mission plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: String,
    pub coordinate: Coordinate,
    pub altitude_m: f64,
    #[serde(default)]
    pub action: WaypointAction,
    /// Hover time in seconds; only counted for `hover` actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hover_duration_s: Option<f64>,
    /// 1-based position within the plan.
    pub sequence: u32,
}

impl Waypoint {
    pub fn scan(sequence: u32, coordinate: Coordinate, altitude_m: f64) -> Self {
        Self {
            id: format!("wp-{sequence}"),
            coordinate,
            altitude_m,
            action: WaypointAction::Scan,
            hover_duration_s: None,
            sequence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchPattern {
    Grid,
    Spiral,
    ExpandingSquare,
    Parallel,
}

/// An operator-defined area to sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchArea {
    pub id: String,
    pub name: String,
    /// Outer ring; closure is implied, the first vertex need not be repeated.
    pub polygon: Vec<Coordinate>,
    pub pattern: SearchPattern,
    /// Distance between sweep lines in meters.
    pub line_spacing_m: f64,
    pub altitude_m: f64,
    /// Sensor footprint overlap ratio in [0, 1].
    #[serde(default)]
    pub overlap: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestrictionLevel {
    Prohibited,
    Restricted,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoFlyZone {
    pub id: String,
    pub polygon: Vec<Coordinate>,
    /// Floor of the restricted band (meters); unbounded below when absent.
    #[serde(default)]
    pub min_altitude_m: Option<f64>,
    /// Ceiling of the restricted band (meters); unbounded above when absent.
    #[serde(default)]
    pub max_altitude_m: Option<f64>,
    pub restriction_level: RestrictionLevel,
}

impl NoFlyZone {
    /// Whether an altitude falls inside the zone's restricted band (inclusive).
    pub fn restricts_altitude(&self, altitude_m: f64) -> bool {
        let floor = self.min_altitude_m.unwrap_or(f64::NEG_INFINITY);
        let ceiling = self.max_altitude_m.unwrap_or(f64::INFINITY);
        altitude_m >= floor && altitude_m <= ceiling
    }
}

/// A timestamped location sample from a ground team member or drone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Absent when the device reported no fix.
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
    pub timestamp: DateTime<Utc>,
    pub team_id: String,
}

impl Breadcrumb {
    pub fn new(lat: f64, lng: f64, timestamp: DateTime<Utc>, team_id: impl Into<String>) -> Self {
        Self {
            coordinate: Some(Coordinate::new(lat, lng)),
            timestamp,
            team_id: team_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneType {
    Primary,
    Secondary,
    Emergency,
}

/// A registered landing site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandingZone {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub coordinate: Coordinate,
    pub zone_type: ZoneType,
    pub capacity: u32,
    #[serde(default)]
    pub current_occupancy: u32,
    #[serde(default)]
    pub weather_protected: bool,
    #[serde(default)]
    pub facilities: Vec<String>,
}

impl LandingZone {
    pub fn has_capacity(&self) -> bool {
        self.current_occupancy < self.capacity
    }

    pub fn has_facility(&self, facility: &str) -> bool {
        self.facilities.iter().any(|f| f.eq_ignore_ascii_case(facility))
    }
}

/// Live drone telemetry relevant to safety decisions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DronePosition {
    pub coordinate: Coordinate,
    pub altitude_m: f64,
    /// Remaining battery in percent [0, 100].
    pub battery_level: f64,
    /// Heading in degrees [0, 360).
    #[serde(default)]
    pub heading_deg: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    /// Sustained speed in m/s.
    pub speed: f64,
    /// Direction the wind blows from, degrees.
    #[serde(default)]
    pub direction: f64,
    /// Gust speed in m/s.
    #[serde(default)]
    pub gust: f64,
}

/// Coarse weather condition group as reported by forecast providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherCondition {
    #[default]
    Clear,
    Clouds,
    Drizzle,
    Rain,
    Snow,
    Thunderstorm,
    Tornado,
    Mist,
    Fog,
    #[serde(other)]
    Other,
}

/// A weather snapshot at the operating location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherConditions {
    pub wind: Wind,
    /// Visibility in meters.
    pub visibility: f64,
    /// Precipitation rate in mm/h.
    #[serde(default)]
    pub precipitation: f64,
    /// Air temperature in °C.
    #[serde(default)]
    pub temp: f64,
    #[serde(default)]
    pub humidity: f64,
    #[serde(default)]
    pub pressure: f64,
    /// Cloud cover in percent.
    #[serde(default)]
    pub clouds: f64,
    #[serde(default)]
    pub condition: WeatherCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for WeatherConditions {
    fn default() -> Self {
        Self {
            wind: Wind::default(),
            visibility: 10_000.0,
            precipitation: 0.0,
            temp: 20.0,
            humidity: 50.0,
            pressure: 1013.25,
            clouds: 0.0,
            condition: WeatherCondition::Clear,
            description: None,
        }
    }
}

impl WeatherConditions {
    pub fn with_wind(mut self, speed: f64, direction: f64, gust: f64) -> Self {
        self.wind = Wind {
            speed,
            direction,
            gust,
        };
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardKind {
    SteepSlope,
    Cliff,
    Water,
    Vegetation,
    PowerLine,
    Building,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardPoint {
    pub location: TerrainPoint,
    pub kind: HazardKind,
    pub severity: HazardSeverity,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_validity() {
        assert!(Coordinate::new(33.68, -117.82).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, 180.5).is_valid());
    }

    #[test]
    fn no_fly_band_is_inclusive_and_open_ended() {
        let zone = NoFlyZone {
            id: "nfz".into(),
            polygon: Vec::new(),
            min_altitude_m: Some(30.0),
            max_altitude_m: None,
            restriction_level: RestrictionLevel::Prohibited,
        };
        assert!(!zone.restricts_altitude(29.9));
        assert!(zone.restricts_altitude(30.0));
        assert!(zone.restricts_altitude(10_000.0));
    }

    #[test]
    fn weather_condition_accepts_unknown_groups() {
        let parsed: WeatherCondition = serde_json::from_str("\"Sandstorm\"").unwrap();
        assert_eq!(parsed, WeatherCondition::Other);
        let rain: WeatherCondition = serde_json::from_str("\"Rain\"").unwrap();
        assert_eq!(rain, WeatherCondition::Rain);
    }

    #[test]
    fn search_pattern_uses_kebab_case() {
        let parsed: SearchPattern = serde_json::from_str("\"expanding-square\"").unwrap();
        assert_eq!(parsed, SearchPattern::ExpandingSquare);
    }
}
