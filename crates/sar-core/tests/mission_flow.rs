use chrono::{Duration, TimeZone, Utc};
use sar_core::{
    calculate_mission_stats, check_no_fly_zone_conflicts, optimize_waypoint_sequence, Breadcrumb,
    Coordinate, CoverageAnalyzer, CoverageConfig, DronePosition, ElevationError,
    FlightSafetyController, LandingZone, MissionParameters, NoFlyZone, RestrictionLevel,
    RtbReason, SearchArea, SearchPattern, SearchPatternGenerator, TerrainAnalyzer,
    WeatherConditions, WeatherRiskEngine, ZoneType,
};

fn search_area() -> SearchArea {
    SearchArea {
        id: "area-1".into(),
        name: "Lincoln Woods".into(),
        polygon: vec![
            Coordinate::new(41.8800, -71.4400),
            Coordinate::new(41.8800, -71.4300),
            Coordinate::new(41.8880, -71.4300),
            Coordinate::new(41.8880, -71.4400),
        ],
        pattern: SearchPattern::Grid,
        line_spacing_m: 100.0,
        altitude_m: 60.0,
        overlap: 0.2,
    }
}

fn ridge(at: Coordinate) -> Result<f64, ElevationError> {
    Ok(40.0 + (at.lat - 41.88) * 2000.0)
}

#[test]
fn plan_annotate_adjust_and_return() {
    let area = search_area();
    let generator = SearchPatternGenerator::default();
    let plan = generator.generate(&area).unwrap();
    assert!(plan.len() > 4);

    let optimized = optimize_waypoint_sequence(&plan);
    assert_eq!(optimized.len(), plan.len());
    assert!(optimized.windows(2).all(|w| w[1].sequence == w[0].sequence + 1));

    let stats = calculate_mission_stats(&optimized, 10.0, 100.0).unwrap();
    assert_eq!(stats.waypoint_count, optimized.len());
    assert!(stats.total_distance_m > 0.0);

    let far_zone = NoFlyZone {
        id: "nfz-airport".into(),
        polygon: vec![
            Coordinate::new(41.72, -71.44),
            Coordinate::new(41.72, -71.42),
            Coordinate::new(41.73, -71.42),
            Coordinate::new(41.73, -71.44),
        ],
        min_altitude_m: None,
        max_altitude_m: Some(400.0),
        restriction_level: RestrictionLevel::Prohibited,
    };
    assert!(check_no_fly_zone_conflicts(&optimized, &[far_zone]).unwrap().is_empty());

    let terrain = TerrainAnalyzer::new(ridge);
    let annotated = terrain.annotate_waypoints(&optimized).unwrap();
    assert_eq!(annotated.len(), optimized.len());
    for (wp, info) in optimized.iter().zip(&annotated) {
        assert_eq!(wp.id, info.waypoint_id);
        assert!((info.altitude_amsl_m - (info.ground_elevation_m + wp.altitude_m)).abs() < 1e-6);
    }

    let weather = WeatherConditions::default().with_wind(12.0, 270.0, 16.0);
    let engine = WeatherRiskEngine::default();
    assert!(engine.is_weather_safe(&weather).safe);
    let mission = MissionParameters {
        altitude_m: area.altitude_m,
        speed_mps: 10.0,
        search_spacing_m: Some(area.line_spacing_m),
    };
    let adjustments = engine.adjust_mission_for_weather(&mission, &weather);
    let adjusted = mission.apply(&adjustments);
    assert!(adjusted.altitude_m < mission.altitude_m);
    assert!(adjusted.altitude_m >= 30.0);
    assert!(adjusted.search_spacing_m.unwrap_or(f64::MAX) < area.line_spacing_m);

    let last = optimized.last().unwrap();
    let drone = DronePosition {
        coordinate: last.coordinate,
        altitude_m: adjusted.altitude_m,
        battery_level: 18.0,
        heading_deg: 0.0,
    };
    let zones = vec![LandingZone {
        id: "lz-base".into(),
        name: "Base".into(),
        coordinate: Coordinate::new(41.8750, -71.4350),
        zone_type: ZoneType::Primary,
        capacity: 4,
        current_occupancy: 1,
        weather_protected: true,
        facilities: vec!["charging".into()],
    }];
    let controller = FlightSafetyController::default();
    let ret = controller.plan_return(&drone, &zones, &weather).unwrap();
    assert!(ret.decision.trigger);
    assert_eq!(ret.decision.reason, Some(RtbReason::LowBattery));
    let path = ret.path.unwrap();
    assert!(path.feasible);
    assert_eq!(path.waypoints.first().map(|w| w.coordinate), Some(drone.coordinate));
}

#[test]
fn breadcrumbs_along_a_plan_produce_coverage() {
    let plan = SearchPatternGenerator::default().generate(&search_area()).unwrap();
    let start = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
    let crumbs: Vec<Breadcrumb> = plan
        .iter()
        .enumerate()
        .map(|(i, wp)| {
            let team = if i % 2 == 0 { "alpha" } else { "bravo" };
            Breadcrumb::new(
                wp.coordinate.lat,
                wp.coordinate.lng,
                start + Duration::seconds(30 * i as i64),
                team,
            )
        })
        .collect();

    let analyzer = CoverageAnalyzer::new(CoverageConfig::default()).unwrap();
    let analysis = analyzer.analyze(&crumbs, None);
    assert!(!analysis.heatmap.is_empty());
    assert_eq!(analysis.statistics.samples_used, crumbs.len());
    assert!(analysis.statistics.total_area_searched_m2 > 0.0);
}
