//! JSON request documents accepted by the planner subcommands.

use anyhow::Context;
use chrono::{DateTime, Utc};
use sar_core::{
    BatteryReport, Breadcrumb, Bounds, Coordinate, DronePosition, LandingZone, MissionParameters,
    PerformanceMetrics, PreFlightChecklist, TerrainGrid, TerrainPoint, TimeRange,
    WeatherConditions,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// Read a JSON document from `path`, or from stdin when `path` is `-`.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading document from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

pub fn write_output<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{text}");
    Ok(())
}

/// A terrain grid document, validated after parsing.
pub fn read_grid(path: &Path) -> anyhow::Result<TerrainGrid> {
    let grid: TerrainGrid = read_document(path)?;
    grid.validate()
        .with_context(|| format!("terrain grid {} is inconsistent", path.display()))?;
    Ok(grid)
}

#[derive(Debug, Deserialize)]
pub struct CoverageRequest {
    pub breadcrumbs: Vec<Breadcrumb>,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
}

#[derive(Debug, Deserialize)]
pub struct ViewshedRequest {
    pub observer: TerrainPoint,
    #[serde(default)]
    pub radius_m: Option<f64>,
    #[serde(default)]
    pub observer_height_m: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct PathRequest {
    pub start: Coordinate,
    pub end: Coordinate,
    #[serde(default)]
    pub max_slope_deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub mission: MissionParameters,
    pub weather: WeatherConditions,
}

#[derive(Debug, Deserialize)]
pub struct RtbRequest {
    pub drone: DronePosition,
    pub weather: WeatherConditions,
    #[serde(default)]
    pub zones: Vec<LandingZone>,
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceRequest {
    pub flight_hours: f64,
    #[serde(default)]
    pub error_codes: Vec<String>,
    #[serde(default)]
    pub metrics: PerformanceMetrics,
    pub last_maintenance: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub flight_hours: f64,
}

/// Everything needed to decide whether a drone may take an assignment.
#[derive(Debug, Deserialize)]
pub struct EligibilityRequest {
    pub battery: BatteryReport,
    pub checklist: PreFlightChecklist,
    #[serde(flatten)]
    pub maintenance: MaintenanceRequest,
}

/// Padded bounds around a point, sized to cover `radius_m`.
pub fn bounds_around(center: Coordinate, radius_m: f64) -> Bounds {
    let pad_lat = sar_core::spatial::meters_to_lat_deg(radius_m);
    let pad_lng = sar_core::spatial::meters_to_lng_deg(radius_m, center.lat);
    Bounds {
        min_lat: center.lat - pad_lat,
        max_lat: center.lat + pad_lat,
        min_lng: center.lng - pad_lng,
        max_lng: center.lng + pad_lng,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligibility_request_flattens_maintenance_fields() {
        let raw = r#"{
            "battery": {
                "serial": "PK-204",
                "cycle_count": 120,
                "capacity_percent": 91.5,
                "manufactured_at": "2024-02-01T00:00:00Z"
            },
            "checklist": { "gps_locked": true },
            "flight_hours": 64.5,
            "error_codes": ["GPS_DRIFT"],
            "last_maintenance": "2025-01-10T08:00:00Z"
        }"#;
        let request: EligibilityRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.battery.serial, "PK-204");
        assert!(request.battery.voltage_readings.is_empty());
        assert_eq!(request.maintenance.flight_hours, 64.5);
        assert_eq!(request.maintenance.error_codes, vec!["GPS_DRIFT".to_string()]);
        assert!(request.maintenance.metrics.gimbal_drift_deg.is_none());
    }

    #[test]
    fn bounds_around_spans_radius() {
        let center = Coordinate::new(45.0, 7.0);
        let bounds = bounds_around(center, 1000.0);
        assert!(bounds.lng_span() > bounds.lat_span());
        let half_lat_m = bounds.lat_span() / 2.0 * sar_core::spatial::METERS_PER_DEG_LAT;
        assert!((half_lat_m - 1000.0).abs() < 1e-6);
    }
}
