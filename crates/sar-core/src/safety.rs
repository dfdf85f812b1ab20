//! Return-to-base decisions and emergency landing selection.

use crate::error::{EngineError, EngineResult};
use crate::models::{Coordinate, DronePosition, LandingZone, WeatherConditions, ZoneType};
use crate::rules::{LandingScoring, ReturnPathRules, RtbThresholds};
use crate::spatial::{distance, interpolate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RtbReason {
    LowBattery,
    Weather,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtbDecision {
    pub trigger: bool,
    pub reason: Option<RtbReason>,
    pub urgency: Urgency,
}

impl RtbDecision {
    const CONTINUE: Self = Self {
        trigger: false,
        reason: None,
        urgency: Urgency::Normal,
    };

    fn trigger(reason: RtbReason, urgency: Urgency) -> Self {
        Self {
            trigger: true,
            reason: Some(reason),
            urgency,
        }
    }
}

/// A landing zone with its selection score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredZone {
    pub zone_id: String,
    pub distance_km: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnWaypoint {
    pub coordinate: Coordinate,
    pub altitude_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnPath {
    pub waypoints: Vec<ReturnWaypoint>,
    pub distance_km: f64,
    /// Distance inflated by the wind multiplier.
    pub effective_distance_km: f64,
    pub estimated_time_min: f64,
    /// Battery percentage points the return is expected to draw.
    pub estimated_battery_usage: f64,
    pub feasible: bool,
}

/// RTB decision plus, when any zone has capacity, where and how to return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnPlan {
    pub decision: RtbDecision,
    pub zone: Option<LandingZone>,
    pub path: Option<ReturnPath>,
}

/// Evaluate RTB triggers in priority order. Battery always wins over weather.
pub fn should_trigger_rtb(
    drone: &DronePosition,
    weather: &WeatherConditions,
    thresholds: &RtbThresholds,
) -> EngineResult<RtbDecision> {
    if !drone.battery_level.is_finite() {
        return Err(EngineError::invalid_parameter(
            "battery_level",
            "telemetry battery level must be a number",
        ));
    }

    if drone.battery_level <= thresholds.battery_threshold {
        return Ok(RtbDecision::trigger(RtbReason::LowBattery, Urgency::Critical));
    }

    let wind = weather.wind.speed;
    if wind > thresholds.max_wind_mps {
        let urgency = if wind > thresholds.max_wind_mps + thresholds.critical_wind_margin_mps {
            Urgency::Critical
        } else {
            Urgency::Warning
        };
        return Ok(RtbDecision::trigger(RtbReason::Weather, urgency));
    }
    if weather.visibility < thresholds.min_visibility_m {
        return Ok(RtbDecision::trigger(RtbReason::Weather, Urgency::Warning));
    }
    if weather.precipitation > thresholds.max_precipitation {
        return Ok(RtbDecision::trigger(RtbReason::Weather, Urgency::Warning));
    }
    Ok(RtbDecision::CONTINUE)
}

#[derive(Debug, Clone, Default)]
pub struct FlightSafetyController {
    rtb: RtbThresholds,
    landing: LandingScoring,
    return_path: ReturnPathRules,
}

impl FlightSafetyController {
    pub fn new(rtb: RtbThresholds, landing: LandingScoring, return_path: ReturnPathRules) -> Self {
        Self {
            rtb,
            landing,
            return_path,
        }
    }

    pub fn thresholds(&self) -> &RtbThresholds {
        &self.rtb
    }

    pub fn should_trigger_rtb(&self, drone: &DronePosition, weather: &WeatherConditions) -> EngineResult<RtbDecision> {
        should_trigger_rtb(drone, weather, &self.rtb)
    }

    fn weather_is_adverse(&self, weather: &WeatherConditions) -> bool {
        weather.wind.speed > self.landing.adverse_wind_mps || weather.precipitation > self.landing.adverse_precipitation
    }

    fn score_zone(&self, zone: &LandingZone, distance_km: f64, adverse: bool) -> f64 {
        let scoring = &self.landing;
        let mut score = scoring.base_score;
        if adverse && zone.weather_protected {
            score += scoring.weather_protection_bonus;
        }
        score += match zone.zone_type {
            ZoneType::Primary => scoring.primary_bonus,
            ZoneType::Secondary => scoring.secondary_bonus,
            ZoneType::Emergency => 0.0,
        };
        if zone.has_facility("charging") {
            score += scoring.charging_bonus;
        }
        if zone.has_facility("maintenance") {
            score += scoring.maintenance_bonus;
        }
        score - distance_km * scoring.distance_penalty_per_km
    }

    /// Zones with spare capacity, best first. Equal scores keep registry order.
    pub fn rank_landing_zones(
        &self,
        drone: &DronePosition,
        zones: &[LandingZone],
        weather: &WeatherConditions,
    ) -> EngineResult<Vec<ScoredZone>> {
        if !drone.coordinate.is_valid() {
            return Err(EngineError::InvalidCoordinate {
                lat: drone.coordinate.lat,
                lng: drone.coordinate.lng,
            });
        }
        let adverse = self.weather_is_adverse(weather);
        let mut ranked: Vec<ScoredZone> = zones
            .iter()
            .filter(|zone| zone.has_capacity() && zone.coordinate.is_valid())
            .map(|zone| {
                let distance_km = distance(drone.coordinate, zone.coordinate) / 1000.0;
                ScoredZone {
                    zone_id: zone.id.clone(),
                    distance_km,
                    score: self.score_zone(zone, distance_km, adverse),
                }
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(ranked)
    }

    /// Best landing zone with spare capacity, or `None` if every zone is full.
    pub fn find_nearest_safe_zone<'a>(
        &self,
        drone: &DronePosition,
        zones: &'a [LandingZone],
        weather: &WeatherConditions,
    ) -> EngineResult<Option<&'a LandingZone>> {
        let ranked = self.rank_landing_zones(drone, zones, weather)?;
        let Some(best) = ranked.first() else {
            tracing::warn!(zones = zones.len(), "No landing zone with spare capacity");
            return Ok(None);
        };
        Ok(zones.iter().find(|zone| zone.id == best.zone_id))
    }

    /// Straight-line return estimate with wind-inflated distance.
    pub fn calculate_return_path(
        &self,
        start: &DronePosition,
        target: &LandingZone,
        weather: &WeatherConditions,
        battery_level: f64,
    ) -> EngineResult<ReturnPath> {
        for c in [start.coordinate, target.coordinate] {
            if !c.is_valid() {
                return Err(EngineError::InvalidCoordinate { lat: c.lat, lng: c.lng });
            }
        }
        let rules = &self.return_path;
        let wind = weather.wind.speed;

        let distance_km = distance(start.coordinate, target.coordinate) / 1000.0;
        let multiplier = if wind > rules.strong_wind_mps {
            rules.strong_wind_multiplier
        } else {
            rules.calm_wind_multiplier
        };
        let effective_distance_km = distance_km * multiplier;
        let estimated_time_min = effective_distance_km / rules.cruise_speed_kmh * 60.0;
        let per_km = if wind > rules.high_wind_mps {
            rules.high_wind_battery_per_km
        } else {
            rules.battery_per_km
        };
        let estimated_battery_usage = effective_distance_km * per_km;
        let feasible = battery_level > estimated_battery_usage + rules.safety_margin;

        let cruise = if wind > rules.high_wind_mps {
            rules.high_wind_altitude_m
        } else {
            rules.cruise_altitude_m
        };
        let segments = rules.path_points.max(2) - 1;
        let waypoints = (0..=segments)
            .map(|i| {
                let altitude_m = if i == 0 {
                    start.altitude_m
                } else if i == segments {
                    rules.final_altitude_m
                } else {
                    cruise
                };
                ReturnWaypoint {
                    coordinate: interpolate(start.coordinate, target.coordinate, i as f64 / segments as f64),
                    altitude_m,
                }
            })
            .collect();

        if !feasible {
            tracing::warn!(
                zone = %target.id,
                battery_level,
                estimated_battery_usage,
                "Return to landing zone is not feasible"
            );
        }

        Ok(ReturnPath {
            waypoints,
            distance_km,
            effective_distance_km,
            estimated_time_min,
            estimated_battery_usage,
            feasible,
        })
    }

    /// Decide on RTB, pick a zone and plan the return in one call.
    pub fn plan_return(
        &self,
        drone: &DronePosition,
        zones: &[LandingZone],
        weather: &WeatherConditions,
    ) -> EngineResult<ReturnPlan> {
        let decision = self.should_trigger_rtb(drone, weather)?;
        let zone = self.find_nearest_safe_zone(drone, zones, weather)?;
        let path = zone
            .map(|zone| self.calculate_return_path(drone, zone, weather, drone.battery_level))
            .transpose()?;

        if decision.trigger {
            tracing::info!(
                reason = ?decision.reason,
                urgency = ?decision.urgency,
                zone = zone.map(|z| z.id.as_str()),
                "Return to base triggered"
            );
        }

        Ok(ReturnPlan {
            decision,
            zone: zone.cloned(),
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drone(battery: f64) -> DronePosition {
        DronePosition {
            coordinate: Coordinate::new(41.8240, -71.4128),
            altitude_m: 80.0,
            battery_level: battery,
            heading_deg: 90.0,
        }
    }

    fn calm() -> WeatherConditions {
        WeatherConditions::default().with_wind(5.0, 0.0, 7.0)
    }

    fn zone(id: &str, lat: f64, lng: f64, zone_type: ZoneType) -> LandingZone {
        LandingZone {
            id: id.into(),
            name: id.to_uppercase(),
            coordinate: Coordinate::new(lat, lng),
            zone_type,
            capacity: 2,
            current_occupancy: 0,
            weather_protected: false,
            facilities: Vec::new(),
        }
    }

    #[test]
    fn low_battery_wins_over_weather() {
        let thresholds = RtbThresholds::default();
        let decision = should_trigger_rtb(&drone(15.0), &calm(), &thresholds).unwrap();
        assert_eq!(decision, RtbDecision::trigger(RtbReason::LowBattery, Urgency::Critical));

        let storm = WeatherConditions::default().with_wind(40.0, 0.0, 50.0);
        let decision = should_trigger_rtb(&drone(20.0), &storm, &thresholds).unwrap();
        assert_eq!(decision.reason, Some(RtbReason::LowBattery));
    }

    #[test]
    fn wind_escalates_to_critical_past_margin() {
        let thresholds = RtbThresholds::default();
        let gale = WeatherConditions::default().with_wind(40.0, 0.0, 45.0);
        let decision = should_trigger_rtb(&drone(80.0), &gale, &thresholds).unwrap();
        assert!(decision.trigger);
        assert_eq!(decision.reason, Some(RtbReason::Weather));
        assert_eq!(decision.urgency, Urgency::Critical);

        let breezy = WeatherConditions::default().with_wind(30.0, 0.0, 32.0);
        let decision = should_trigger_rtb(&drone(80.0), &breezy, &thresholds).unwrap();
        assert_eq!(decision.urgency, Urgency::Warning);
    }

    #[test]
    fn visibility_and_precipitation_warn() {
        let thresholds = RtbThresholds::default();
        let mut murky = calm();
        murky.visibility = 800.0;
        let decision = should_trigger_rtb(&drone(80.0), &murky, &thresholds).unwrap();
        assert_eq!(decision, RtbDecision::trigger(RtbReason::Weather, Urgency::Warning));

        let mut wet = calm();
        wet.precipitation = 6.0;
        let decision = should_trigger_rtb(&drone(80.0), &wet, &thresholds).unwrap();
        assert_eq!(decision.urgency, Urgency::Warning);

        let decision = should_trigger_rtb(&drone(80.0), &calm(), &thresholds).unwrap();
        assert_eq!(decision, RtbDecision::CONTINUE);
    }

    #[test]
    fn custom_thresholds_apply() {
        let thresholds = RtbThresholds {
            battery_threshold: 30.0,
            ..RtbThresholds::default()
        };
        let decision = should_trigger_rtb(&drone(25.0), &calm(), &thresholds).unwrap();
        assert_eq!(decision.reason, Some(RtbReason::LowBattery));
        assert!(should_trigger_rtb(&drone(f64::NAN), &calm(), &thresholds).is_err());
    }

    #[test]
    fn full_zones_yield_none() {
        let mut a = zone("a", 41.83, -71.41, ZoneType::Primary);
        a.current_occupancy = 2;
        let mut b = zone("b", 41.82, -71.42, ZoneType::Secondary);
        b.current_occupancy = 2;
        let controller = FlightSafetyController::default();
        let zones = [a, b];
        assert!(controller
            .find_nearest_safe_zone(&drone(50.0), &zones, &calm())
            .unwrap()
            .is_none());
    }

    #[test]
    fn primary_zone_beats_slightly_closer_emergency_zone() {
        let controller = FlightSafetyController::default();
        let zones = [
            zone("field", 41.8250, -71.4128, ZoneType::Emergency),
            zone("base", 41.8300, -71.4128, ZoneType::Primary),
        ];
        let best = controller
            .find_nearest_safe_zone(&drone(50.0), &zones, &calm())
            .unwrap()
            .unwrap();
        assert_eq!(best.id, "base");
    }

    #[test]
    fn protection_only_counts_in_adverse_weather() {
        let controller = FlightSafetyController::default();
        let mut shelter = zone("shelter", 41.8300, -71.4128, ZoneType::Secondary);
        shelter.weather_protected = true;
        let open = zone("open", 41.8300, -71.4128, ZoneType::Primary);
        let zones = [open, shelter];

        let fair = controller
            .find_nearest_safe_zone(&drone(50.0), &zones, &calm())
            .unwrap()
            .unwrap();
        assert_eq!(fair.id, "open");

        let storm = WeatherConditions::default().with_wind(22.0, 0.0, 25.0);
        let foul = controller
            .find_nearest_safe_zone(&drone(50.0), &zones, &storm)
            .unwrap()
            .unwrap();
        assert_eq!(foul.id, "shelter");
    }

    #[test]
    fn facilities_and_ties() {
        let controller = FlightSafetyController::default();
        let mut charged = zone("charged", 41.8300, -71.4128, ZoneType::Secondary);
        charged.facilities = vec!["Charging".into()];
        let first = zone("first", 41.8300, -71.4128, ZoneType::Secondary);
        let second = zone("second", 41.8300, -71.4128, ZoneType::Secondary);

        let ranked = controller
            .rank_landing_zones(&drone(50.0), &[first.clone(), second.clone(), charged], &calm())
            .unwrap();
        assert_eq!(ranked[0].zone_id, "charged");
        assert!((ranked[0].score - ranked[1].score - 20.0).abs() < 1e-9);
        // Equal scores keep registry order.
        assert_eq!(ranked[1].zone_id, "first");
        assert_eq!(ranked[2].zone_id, "second");
    }

    #[test]
    fn invalid_drone_position_is_rejected() {
        let controller = FlightSafetyController::default();
        let mut lost = drone(50.0);
        lost.coordinate = Coordinate::new(f64::NAN, 0.0);
        let zones = [zone("a", 41.83, -71.41, ZoneType::Primary)];
        assert!(controller.find_nearest_safe_zone(&lost, &zones, &calm()).is_err());
    }

    #[test]
    fn return_path_shape_and_estimates() {
        let controller = FlightSafetyController::default();
        let start = drone(60.0);
        let target = zone("base", 41.8690, -71.4128, ZoneType::Primary);
        let path = controller
            .calculate_return_path(&start, &target, &calm(), 60.0)
            .unwrap();

        assert_eq!(path.waypoints.len(), 6);
        assert_eq!(path.waypoints[0].altitude_m, 80.0);
        assert_eq!(path.waypoints[5].altitude_m, 10.0);
        assert!(path.waypoints[1..5].iter().all(|w| w.altitude_m == 100.0));
        assert_eq!(path.waypoints[5].coordinate, target.coordinate);

        assert!((path.effective_distance_km - path.distance_km * 1.1).abs() < 1e-9);
        assert!((path.estimated_time_min - path.effective_distance_km / 40.0 * 60.0).abs() < 1e-9);
        assert!((path.estimated_battery_usage - path.effective_distance_km * 2.0).abs() < 1e-9);
        assert!(path.feasible);
    }

    #[test]
    fn return_path_infeasible_below_margin() {
        let controller = FlightSafetyController::default();
        let start = drone(12.0);
        let target = zone("far", 41.9240, -71.4128, ZoneType::Primary);
        let storm = WeatherConditions::default().with_wind(22.0, 0.0, 25.0);
        let path = controller
            .calculate_return_path(&start, &target, &storm, 12.0)
            .unwrap();
        assert!((path.effective_distance_km - path.distance_km * 1.3).abs() < 1e-9);
        assert!((path.estimated_battery_usage - path.effective_distance_km * 3.0).abs() < 1e-9);
        assert!(path.waypoints[1..5].iter().all(|w| w.altitude_m == 50.0));
        assert!(!path.feasible);
    }

    #[test]
    fn plan_return_combines_decision_zone_and_path() {
        let controller = FlightSafetyController::default();
        let zones = [zone("base", 41.8300, -71.4128, ZoneType::Primary)];
        let plan = controller.plan_return(&drone(15.0), &zones, &calm()).unwrap();
        assert!(plan.decision.trigger);
        assert_eq!(plan.zone.as_ref(), Some(&zones[0]));
        assert!(plan.path.is_some());
        // Planning is pure: the same inputs give the same plan.
        assert_eq!(controller.plan_return(&drone(15.0), &zones, &calm()).unwrap(), plan);

        let plan = controller.plan_return(&drone(90.0), &[], &calm()).unwrap();
        assert!(!plan.decision.trigger);
        assert!(plan.zone.is_none());
        assert!(plan.path.is_none());
    }
}
