//! Weather risk evaluation, mission adjustment and forecast ranking.

use crate::cache::{prune_cache, CacheEntry};
use crate::models::{Coordinate, WeatherCondition, WeatherConditions};
use crate::rules::WeatherLimits;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Fractional consumption change per m/s of direct head- or tailwind.
pub const WIND_IMPACT_PER_MPS: f64 = 0.015;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeatherHazardKind {
    ExtremeWind,
    HighWind,
    SevereGusts,
    ZeroVisibility,
    LowVisibility,
    SevereWeather,
    HeavyRain,
    ExtremeCold,
    ExtremeHeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardLevel {
    Low,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherHazard {
    pub kind: WeatherHazardKind,
    pub severity: HazardLevel,
    pub message: String,
    pub impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAssessment {
    /// False iff at least one hazard is severe.
    pub safe: bool,
    pub hazards: Vec<WeatherHazard>,
}

impl WeatherAssessment {
    pub fn has(&self, kind: WeatherHazardKind) -> bool {
        self.hazards.iter().any(|h| h.kind == kind)
    }
}

/// Mission parameters subject to weather adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionParameters {
    pub altitude_m: f64,
    pub speed_mps: f64,
    /// Sweep line spacing; absent when the mission flies no search pattern.
    #[serde(default)]
    pub search_spacing_m: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustedParameter {
    Altitude,
    Speed,
    SearchSpacing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionAdjustment {
    pub parameter: AdjustedParameter,
    pub original_value: f64,
    pub adjusted_value: f64,
    pub reason: String,
}

impl MissionParameters {
    /// A copy of these parameters with `adjustments` applied.
    pub fn apply(&self, adjustments: &[MissionAdjustment]) -> MissionParameters {
        let mut adjusted = self.clone();
        for adjustment in adjustments {
            match adjustment.parameter {
                AdjustedParameter::Altitude => adjusted.altitude_m = adjustment.adjusted_value,
                AdjustedParameter::Speed => adjusted.speed_mps = adjustment.adjusted_value,
                AdjustedParameter::SearchSpacing => {
                    if adjusted.search_spacing_m.is_some() {
                        adjusted.search_spacing_m = Some(adjustment.adjusted_value);
                    }
                }
            }
        }
        adjusted
    }
}

/// One forecast period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSlot {
    pub time: DateTime<Utc>,
    pub conditions: WeatherConditions,
    /// Probability of precipitation in [0, 1].
    #[serde(default)]
    pub precipitation_probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalWindow {
    pub time: DateTime<Utc>,
    pub score: f64,
    pub reason: String,
    pub conditions: WeatherConditions,
}

#[derive(Debug, Clone, Default)]
pub struct WeatherRiskEngine {
    limits: WeatherLimits,
}

impl WeatherRiskEngine {
    pub fn new(limits: WeatherLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &WeatherLimits {
        &self.limits
    }

    /// Evaluate independent hazard rules against a snapshot.
    pub fn is_weather_safe(&self, weather: &WeatherConditions) -> WeatherAssessment {
        let limits = &self.limits;
        let mut hazards = Vec::new();
        let mut push = |kind, severity, message: String, impact: &str| {
            hazards.push(WeatherHazard {
                kind,
                severity,
                message,
                impact: impact.to_string(),
            })
        };

        let wind = weather.wind.speed;
        if wind > limits.extreme_wind_mps {
            push(
                WeatherHazardKind::ExtremeWind,
                HazardLevel::Severe,
                format!("Wind speed {wind:.1} m/s exceeds safe limits"),
                "Flight not recommended - risk of loss of control",
            );
        } else if wind > limits.high_wind_mps {
            push(
                WeatherHazardKind::HighWind,
                HazardLevel::Moderate,
                format!("High wind speed {wind:.1} m/s"),
                "Reduced battery life and stability",
            );
        }

        let gust = weather.wind.gust;
        if gust > limits.severe_gust_mps {
            push(
                WeatherHazardKind::SevereGusts,
                HazardLevel::Severe,
                format!("Wind gusts {gust:.1} m/s"),
                "Risk of sudden altitude/position changes",
            );
        }

        let visibility = weather.visibility;
        if visibility < limits.zero_visibility_m {
            push(
                WeatherHazardKind::ZeroVisibility,
                HazardLevel::Severe,
                format!("Visibility {visibility:.0}m below minimums"),
                "Unable to maintain visual line of sight",
            );
        } else if visibility < limits.low_visibility_m {
            push(
                WeatherHazardKind::LowVisibility,
                HazardLevel::Moderate,
                format!("Reduced visibility {visibility:.0}m"),
                "Limited visual range for navigation",
            );
        }

        match weather.condition {
            WeatherCondition::Thunderstorm | WeatherCondition::Tornado => push(
                WeatherHazardKind::SevereWeather,
                HazardLevel::Severe,
                weather
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("{:?} reported", weather.condition)),
                "Flight prohibited - extreme weather",
            ),
            WeatherCondition::Rain if weather.clouds > limits.heavy_rain_cloud_percent => push(
                WeatherHazardKind::HeavyRain,
                HazardLevel::Moderate,
                "Heavy rain conditions".to_string(),
                "Reduced visibility and potential water damage",
            ),
            _ => {}
        }

        let temp = weather.temp;
        if temp < limits.min_temp_c {
            push(
                WeatherHazardKind::ExtremeCold,
                HazardLevel::Moderate,
                format!("Temperature {temp:.1}°C"),
                "Reduced battery performance",
            );
        } else if temp > limits.max_temp_c {
            push(
                WeatherHazardKind::ExtremeHeat,
                HazardLevel::Moderate,
                format!("Temperature {temp:.1}°C"),
                "Risk of overheating",
            );
        }

        let safe = !hazards.iter().any(|h| h.severity == HazardLevel::Severe);
        if !safe {
            tracing::debug!(hazards = hazards.len(), "Weather is unsafe for flight");
        }
        WeatherAssessment { safe, hazards }
    }

    /// Parameter deltas for the given weather. The mission itself is untouched.
    pub fn adjust_mission_for_weather(
        &self,
        mission: &MissionParameters,
        weather: &WeatherConditions,
    ) -> Vec<MissionAdjustment> {
        let limits = &self.limits;
        let mut adjustments = Vec::new();
        let wind = weather.wind.speed;

        if wind > limits.altitude_adjust_wind_mps {
            let reduction = (wind * limits.altitude_reduction_per_mps).min(limits.max_altitude_reduction_m);
            adjustments.push(MissionAdjustment {
                parameter: AdjustedParameter::Altitude,
                original_value: mission.altitude_m,
                adjusted_value: (mission.altitude_m - reduction).max(limits.min_adjusted_altitude_m),
                reason: format!("Reduced altitude due to wind speed {wind:.1} m/s"),
            });
        }

        if weather.visibility < limits.speed_adjust_visibility_m {
            let reduction = (limits.speed_adjust_visibility_m - weather.visibility) / limits.visibility_per_speed_mps;
            adjustments.push(MissionAdjustment {
                parameter: AdjustedParameter::Speed,
                original_value: mission.speed_mps,
                adjusted_value: (mission.speed_mps - reduction).max(limits.min_adjusted_speed_mps),
                reason: format!("Reduced speed due to visibility {:.0}m", weather.visibility),
            });
        }

        if let Some(spacing) = mission.search_spacing_m {
            if wind > limits.spacing_adjust_wind_mps {
                adjustments.push(MissionAdjustment {
                    parameter: AdjustedParameter::SearchSpacing,
                    original_value: spacing,
                    adjusted_value: spacing * limits.spacing_factor,
                    reason: "Tighter search pattern due to wind drift".to_string(),
                });
            }
        }

        adjustments
    }

    fn score_slot(&self, slot: &ForecastSlot) -> f64 {
        let scoring = &self.limits.window;
        let c = &slot.conditions;
        let mut score = 100.0;
        score -= (c.wind.speed * scoring.wind_penalty_per_mps).min(scoring.max_wind_penalty);
        score -= (c.wind.gust * scoring.gust_penalty_per_mps).min(scoring.max_gust_penalty);
        score -= slot.precipitation_probability.clamp(0.0, 1.0) * scoring.precipitation_penalty;
        if matches!(
            c.condition,
            WeatherCondition::Rain | WeatherCondition::Snow | WeatherCondition::Thunderstorm
        ) {
            score -= scoring.adverse_condition_penalty;
        }
        score -= c.clouds * scoring.cloud_penalty_per_percent;
        score
    }

    /// Highest-scoring forecast slot; the earliest slot wins ties.
    ///
    /// Returns `None` for an empty forecast.
    pub fn calculate_optimal_flight_time(&self, forecast: &[ForecastSlot]) -> Option<OptimalWindow> {
        let mut best: Option<(&ForecastSlot, f64)> = None;
        for slot in forecast {
            let score = self.score_slot(slot);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((slot, score));
            }
        }
        let (slot, score) = best?;

        let scoring = &self.limits.window;
        let c = &slot.conditions;
        let mut reasons = Vec::new();
        if c.wind.speed < scoring.calm_wind_mps {
            reasons.push("calm winds");
        }
        if c.clouds < scoring.clear_sky_percent {
            reasons.push("clear skies");
        }
        if !matches!(c.condition, WeatherCondition::Rain | WeatherCondition::Snow) {
            reasons.push("no precipitation");
        }
        let reason = if reasons.is_empty() {
            "Best available conditions".to_string()
        } else {
            reasons.join(", ")
        };

        Some(OptimalWindow {
            time: slot.time,
            score,
            reason,
            conditions: c.clone(),
        })
    }
}

/// Battery consumption adjusted for wind relative to the flight direction.
///
/// Directions are in degrees. A relative angle of 0 is a direct headwind and
/// raises consumption; 180 is a tailwind and lowers it.
pub fn calculate_wind_battery_impact(
    wind_speed: f64,
    wind_direction: f64,
    flight_direction: f64,
    base_consumption: f64,
) -> f64 {
    let relative = (wind_direction - flight_direction).abs() % 360.0;
    let relative = if relative > 180.0 { 360.0 - relative } else { relative };
    let factor = relative.to_radians().cos();
    base_consumption * (1.0 + wind_speed * factor * WIND_IMPACT_PER_MPS)
}

/// Default lifetime of a cached snapshot.
pub const DEFAULT_WEATHER_TTL: Duration = Duration::from_secs(600);
/// Default cap on cached snapshots.
pub const DEFAULT_WEATHER_CACHE_ENTRIES: usize = 100;

#[derive(Debug, Clone)]
struct CachedWeather {
    fetched_at: Instant,
    conditions: WeatherConditions,
}

impl CacheEntry for CachedWeather {
    fn fetched_at(&self) -> Instant {
        self.fetched_at
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
}

/// Owned cache of weather snapshots keyed by location rounded to 0.01°.
///
/// Entries expire after the TTL; when full, the oldest entries are evicted.
#[derive(Debug)]
pub struct WeatherCache {
    entries: DashMap<String, CachedWeather>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Default for WeatherCache {
    fn default() -> Self {
        Self::new(DEFAULT_WEATHER_TTL, DEFAULT_WEATHER_CACHE_ENTRIES)
    }
}

impl WeatherCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn location_key(at: Coordinate) -> String {
        format!("weather:{:.2},{:.2}", at.lat, at.lng)
    }

    pub fn get(&self, at: Coordinate) -> Option<WeatherConditions> {
        let key = Self::location_key(at);
        let fresh = self.entries.get(&key).and_then(|entry| {
            (entry.fetched_at.elapsed() <= self.ttl).then(|| entry.conditions.clone())
        });
        match fresh {
            Some(conditions) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(conditions)
            }
            None => {
                if self.entries.remove(&key).is_some() {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, at: Coordinate, conditions: WeatherConditions) {
        self.insert_at(at, conditions, Instant::now());
    }

    fn insert_at(&self, at: Coordinate, conditions: WeatherConditions, fetched_at: Instant) {
        let key = Self::location_key(at);
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            let evicted = prune_cache(&self.entries, self.max_entries - 1, self.ttl);
            if evicted > 0 {
                tracing::warn!(evicted, "Weather cache full, evicted oldest entries");
                self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            }
        }
        self.entries.insert(key, CachedWeather { fetched_at, conditions });
    }

    /// Drop expired entries; returns how many were removed.
    pub fn prune(&self) -> usize {
        let removed = prune_cache(&self.entries, self.max_entries, self.ttl);
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn invalidate_all(&self) {
        let size = self.entries.len();
        self.entries.clear();
        self.evictions.fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> WeatherCacheStats {
        WeatherCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.entries.len(),
        }
    }
}
