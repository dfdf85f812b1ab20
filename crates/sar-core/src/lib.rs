pub mod cache;
pub mod coverage;
pub mod error;
pub mod fleet;
pub mod models;
pub mod patterns;
pub mod rules;
pub mod safety;
pub mod spatial;
pub mod terrain;
pub mod weather;

pub use coverage::{
    CoverageAnalysis, CoverageAnalyzer, CoverageConfig, CoverageStatistics, CoverageZone,
    GapPriority, SearchGap, TeamOverlap, TimeRange,
};
pub use error::{ElevationError, EngineError, EngineResult};
pub use fleet::{
    validate_pre_flight_check, AssignmentEligibility, BatteryHealth, BatteryReport,
    EligibilityBlocker, FleetMaintenancePredictor, FleetRules, MaintenanceFinding,
    MaintenanceIssue, MaintenancePriority, PerformanceMetrics, PreFlightChecklist,
    PreFlightIssue, PreFlightResult, PreFlightWarning, ScheduleKind, ScheduledMaintenance,
};
pub use models::{
    Breadcrumb, Coordinate, DronePosition, HazardKind, HazardPoint, HazardSeverity,
    LandingZone, NoFlyZone, RestrictionLevel, SearchArea, SearchPattern, TerrainPoint,
    Waypoint, WaypointAction, WeatherCondition, WeatherConditions, Wind, ZoneType,
};
pub use patterns::{
    calculate_mission_stats, check_no_fly_zone_conflicts, optimize_waypoint_sequence,
    truncate_for_battery, MissionStats, NoFlyConflict, PatternConfig, SearchPatternGenerator,
};
pub use rules::{
    EngineConfig, LandingScoring, ReturnPathRules, RtbThresholds, WeatherLimits, WindowScoring,
};
pub use safety::{
    should_trigger_rtb, FlightSafetyController, ReturnPath, ReturnPlan, ReturnWaypoint,
    RtbDecision, RtbReason, ScoredZone, Urgency,
};
pub use spatial::{bearing, haversine_distance, Bounds, GridCell};
pub use terrain::{
    assess_landing_site, optimal_flight_altitude, ElevationProfile, ElevationSource,
    LandingSuitability, PathDifficulty, PathResult, SlopeAspect, SurfaceType, TerrainAnalyzer,
    TerrainConfig, TerrainGrid, ViewshedResult, WatershedResult, WaypointTerrain,
};
pub use weather::{
    calculate_wind_battery_impact, ForecastSlot, MissionAdjustment, MissionParameters,
    OptimalWindow, WeatherAssessment, WeatherCache, WeatherCacheStats, WeatherHazard,
    WeatherHazardKind, WeatherRiskEngine,
};
