//! Flight safety rules and thresholds.
//!
//! Every limit used by the weather and safety components lives here with its
//! operational default, so a deployment can override any of them from a JSON
//! document without touching code.

use crate::coverage::CoverageConfig;
use crate::error::{EngineError, EngineResult};
use crate::fleet::FleetRules;
use crate::patterns::PatternConfig;
use crate::terrain::TerrainConfig;
use serde::{Deserialize, Serialize};

/// Weather hazard thresholds. Speeds in m/s, distances in meters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherLimits {
    /// Sustained wind above this is a severe hazard
    pub extreme_wind_mps: f64,
    /// Sustained wind above this is a moderate hazard
    pub high_wind_mps: f64,
    pub severe_gust_mps: f64,
    /// Visibility below this is a severe hazard
    pub zero_visibility_m: f64,
    pub low_visibility_m: f64,
    /// Cloud cover (percent) above which rain counts as heavy
    pub heavy_rain_cloud_percent: f64,
    pub min_temp_c: f64,
    pub max_temp_c: f64,
    /// Wind above which mission altitude is reduced
    pub altitude_adjust_wind_mps: f64,
    pub max_altitude_reduction_m: f64,
    /// Altitude reduction per m/s of wind
    pub altitude_reduction_per_mps: f64,
    pub min_adjusted_altitude_m: f64,
    /// Visibility below which cruise speed is reduced
    pub speed_adjust_visibility_m: f64,
    /// Meters of visibility deficit per 1 m/s of speed reduction
    pub visibility_per_speed_mps: f64,
    pub min_adjusted_speed_mps: f64,
    /// Wind above which search line spacing is tightened
    pub spacing_adjust_wind_mps: f64,
    pub spacing_factor: f64,
    pub window: WindowScoring,
}

/// Penalties used to rank forecast slots. Each slot starts at 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowScoring {
    pub wind_penalty_per_mps: f64,
    pub max_wind_penalty: f64,
    pub gust_penalty_per_mps: f64,
    pub max_gust_penalty: f64,
    /// Multiplied by the precipitation probability in [0, 1]
    pub precipitation_penalty: f64,
    /// Flat penalty for rain, snow or thunderstorm slots
    pub adverse_condition_penalty: f64,
    pub cloud_penalty_per_percent: f64,
    /// Below this wind the justification mentions calm winds
    pub calm_wind_mps: f64,
    /// Below this cloud cover the justification mentions clear skies
    pub clear_sky_percent: f64,
}

impl Default for WindowScoring {
    fn default() -> Self {
        Self {
            wind_penalty_per_mps: 3.0,
            max_wind_penalty: 50.0,
            gust_penalty_per_mps: 2.0,
            max_gust_penalty: 30.0,
            precipitation_penalty: 50.0,
            adverse_condition_penalty: 30.0,
            cloud_penalty_per_percent: 0.2,
            calm_wind_mps: 5.0,
            clear_sky_percent: 50.0,
        }
    }
}

impl Default for WeatherLimits {
    fn default() -> Self {
        Self {
            extreme_wind_mps: 20.0,
            high_wind_mps: 15.0,
            severe_gust_mps: 25.0,
            zero_visibility_m: 500.0,
            low_visibility_m: 1500.0,
            heavy_rain_cloud_percent: 80.0,
            min_temp_c: -10.0,
            max_temp_c: 40.0,
            altitude_adjust_wind_mps: 10.0,
            max_altitude_reduction_m: 30.0,
            altitude_reduction_per_mps: 2.0,
            min_adjusted_altitude_m: 30.0,
            speed_adjust_visibility_m: 3000.0,
            visibility_per_speed_mps: 100.0,
            min_adjusted_speed_mps: 5.0,
            spacing_adjust_wind_mps: 8.0,
            spacing_factor: 0.8,
            window: WindowScoring::default(),
        }
    }
}

impl WeatherLimits {
    pub fn validate(&self) -> EngineResult<()> {
        require_positive("weather.visibility_per_speed_mps", self.visibility_per_speed_mps)?;
        require_positive("weather.min_adjusted_speed_mps", self.min_adjusted_speed_mps)?;
        require_positive("weather.spacing_factor", self.spacing_factor)?;
        if !(self.altitude_reduction_per_mps.is_finite() && self.altitude_reduction_per_mps >= 0.0) {
            return Err(EngineError::invalid_parameter(
                "weather.altitude_reduction_per_mps",
                "must be non-negative",
            ));
        }
        if self.min_temp_c > self.max_temp_c {
            return Err(EngineError::invalid_parameter(
                "weather.min_temp_c",
                "must not exceed max_temp_c",
            ));
        }
        Ok(())
    }
}

/// Reject zero, negative and non-finite values.
pub(crate) fn require_positive(name: &'static str, value: f64) -> EngineResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::invalid_parameter(name, format!("must be positive, got {value}")))
    }
}

/// Return-to-base trigger thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RtbThresholds {
    /// Battery percent at or below which RTB is forced
    pub battery_threshold: f64,
    pub max_wind_mps: f64,
    /// Added to `max_wind_mps` to escalate a wind RTB to critical
    pub critical_wind_margin_mps: f64,
    pub min_visibility_m: f64,
    /// Precipitation rate (mm/h) above which RTB is advised
    pub max_precipitation: f64,
}

impl Default for RtbThresholds {
    fn default() -> Self {
        Self {
            battery_threshold: 20.0,
            max_wind_mps: 25.0,
            critical_wind_margin_mps: 10.0,
            min_visibility_m: 1000.0,
            max_precipitation: 5.0,
        }
    }
}

/// Landing zone scoring weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LandingScoring {
    pub base_score: f64,
    /// Points subtracted per kilometer of distance
    pub distance_penalty_per_km: f64,
    pub primary_bonus: f64,
    pub secondary_bonus: f64,
    /// Applied only to protected zones when weather is adverse
    pub weather_protection_bonus: f64,
    pub adverse_wind_mps: f64,
    pub adverse_precipitation: f64,
    pub charging_bonus: f64,
    pub maintenance_bonus: f64,
}

impl Default for LandingScoring {
    fn default() -> Self {
        Self {
            base_score: 100.0,
            distance_penalty_per_km: 2.0,
            primary_bonus: 30.0,
            secondary_bonus: 15.0,
            weather_protection_bonus: 50.0,
            adverse_wind_mps: 20.0,
            adverse_precipitation: 3.0,
            charging_bonus: 20.0,
            maintenance_bonus: 10.0,
        }
    }
}

/// Return path estimation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReturnPathRules {
    pub cruise_speed_kmh: f64,
    /// Wind above which the strong-wind distance multiplier applies
    pub strong_wind_mps: f64,
    pub strong_wind_multiplier: f64,
    pub calm_wind_multiplier: f64,
    /// Wind above which battery draw and altitude switch to the high-wind profile
    pub high_wind_mps: f64,
    pub battery_per_km: f64,
    pub high_wind_battery_per_km: f64,
    /// Battery points required on top of the estimated usage
    pub safety_margin: f64,
    pub path_points: usize,
    pub cruise_altitude_m: f64,
    pub high_wind_altitude_m: f64,
    pub final_altitude_m: f64,
}

impl Default for ReturnPathRules {
    fn default() -> Self {
        Self {
            cruise_speed_kmh: 40.0,
            strong_wind_mps: 15.0,
            strong_wind_multiplier: 1.3,
            calm_wind_multiplier: 1.1,
            high_wind_mps: 20.0,
            battery_per_km: 2.0,
            high_wind_battery_per_km: 3.0,
            safety_margin: 10.0,
            path_points: 6,
            cruise_altitude_m: 100.0,
            high_wind_altitude_m: 50.0,
            final_altitude_m: 10.0,
        }
    }
}

/// Every tunable of the engine in one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub coverage: CoverageConfig,
    pub patterns: PatternConfig,
    pub terrain: TerrainConfig,
    pub weather: WeatherLimits,
    pub rtb: RtbThresholds,
    pub landing: LandingScoring,
    pub return_path: ReturnPathRules,
    pub fleet: FleetRules,
}

impl EngineConfig {
    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json_str(raw: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|err| EngineError::invalid_parameter("config", err.to_string()))?;
        config.coverage.validate()?;
        config.patterns.validate()?;
        config.terrain.validate()?;
        config.weather.validate()?;
        config.fleet.validate()?;
        if config.return_path.path_points < 2 {
            return Err(EngineError::invalid_parameter(
                "return_path.path_points",
                "at least two points are required",
            ));
        }
        require_positive("return_path.cruise_speed_kmh", config.return_path.cruise_speed_kmh)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_operational_limits() {
        let limits = WeatherLimits::default();
        assert_eq!(limits.extreme_wind_mps, 20.0);
        assert_eq!(limits.zero_visibility_m, 500.0);
        let rtb = RtbThresholds::default();
        assert_eq!(rtb.battery_threshold, 20.0);
        assert_eq!(rtb.max_wind_mps, 25.0);
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "rtb": { "battery_threshold": 30 }, "coverage": { "cell_size_deg": 0.002 } }"#,
        )
        .unwrap();
        assert_eq!(config.rtb.battery_threshold, 30.0);
        assert_eq!(config.rtb.max_wind_mps, 25.0);
        assert_eq!(config.coverage.cell_size_deg, 0.002);
        assert_eq!(config.coverage.gap_merge_radius_m, 200.0);
        assert_eq!(config.landing.primary_bonus, 30.0);
    }

    #[test]
    fn invalid_document_is_rejected() {
        assert!(EngineConfig::from_json_str("{ not json").is_err());
        assert!(EngineConfig::from_json_str(r#"{ "coverage": { "cell_size_deg": -1 } }"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{ "return_path": { "path_points": 1 } }"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{ "weather": { "visibility_per_speed_mps": 0 } }"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{ "fleet": { "routine_interval_hours": 0 } }"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{ "fleet": { "major_interval_hours": -5 } }"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{ "patterns": { "max_waypoints": 0 } }"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{ "weather": { "visibility_per_speed_mps": 50 } }"#).is_ok());
    }
}
