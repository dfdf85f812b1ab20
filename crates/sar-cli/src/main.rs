//! `sar-planner`: run mission planning operations on JSON documents.
//!
//! Each subcommand reads one document (a path, or `-` for stdin) and prints
//! the result as pretty JSON on stdout. Logs go to stderr.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use sar_cli::config::Config;
use sar_cli::documents::{
    bounds_around, read_document, read_grid, write_output, AdjustRequest, CoverageRequest,
    EligibilityRequest, MaintenanceRequest, PathRequest, RtbRequest, ScheduleRequest,
    ViewshedRequest,
};
use sar_cli::elevation::fetch_terrain_grid;
use sar_core::{
    check_no_fly_zone_conflicts, optimize_waypoint_sequence, truncate_for_battery,
    validate_pre_flight_check, BatteryReport, Bounds, CoverageAnalyzer, FleetMaintenancePredictor,
    FlightSafetyController, ForecastSlot, MissionStats, NoFlyConflict, NoFlyZone,
    PreFlightChecklist, SearchArea, SearchPatternGenerator, TerrainAnalyzer, TerrainGrid,
    Waypoint, WeatherConditions, WeatherRiskEngine,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Search-and-rescue mission planner
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Engine rules file (JSON); overrides SAR_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Elevation provider base URL; overrides SAR_ELEVATION_URL
    #[arg(long, global = true)]
    elevation_url: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Coverage heatmap, gaps and team overlaps from breadcrumbs
    Coverage {
        input: PathBuf,
    },
    /// Generate search waypoints for an area
    Pattern(PatternArgs),
    /// Terrain analysis over a grid file or fetched elevations
    Terrain {
        #[command(subcommand)]
        command: TerrainCommand,
        /// Pre-sampled terrain grid (JSON); fetched from the provider when absent
        #[arg(long, global = true)]
        grid: Option<PathBuf>,
    },
    /// Weather safety evaluation
    Weather {
        #[command(subcommand)]
        command: WeatherCommand,
    },
    /// Return-to-base decision, landing zone and return path
    Rtb {
        input: PathBuf,
    },
    /// Fleet maintenance and battery health
    Fleet {
        #[command(subcommand)]
        command: FleetCommand,
        /// Reference time for date arithmetic (RFC 3339); defaults to now
        #[arg(long, global = true)]
        as_of: Option<DateTime<Utc>>,
    },
}

#[derive(Args, Debug)]
struct PatternArgs {
    /// Search area document
    input: PathBuf,

    /// Reorder waypoints by nearest neighbour
    #[arg(long)]
    optimize: bool,

    /// No-fly zone list to check the plan against
    #[arg(long)]
    no_fly: Option<PathBuf>,

    /// Cruise speed in m/s
    #[arg(long, default_value_t = 10.0)]
    speed: f64,

    /// Available battery in percent
    #[arg(long, default_value_t = 100.0)]
    battery: f64,

    /// Cut the plan to what the battery can fly when it cannot be completed
    #[arg(long)]
    fit_battery: bool,
}

#[derive(Subcommand, Debug)]
enum TerrainCommand {
    /// Steep slopes and cliffs inside a bounding box
    Hazards { input: PathBuf },
    /// Visible and hidden points from an observer
    Viewshed { input: PathBuf },
    /// Flow paths, drainage points and catchments inside a bounding box
    Watershed { input: PathBuf },
    /// Ground path difficulty between two points
    Path { input: PathBuf },
    /// Ground elevation and slope under each waypoint
    Annotate { input: PathBuf },
}

#[derive(Subcommand, Debug)]
enum WeatherCommand {
    /// Hazards for a weather snapshot
    Safety { input: PathBuf },
    /// Mission parameter adjustments for a snapshot
    Adjust { input: PathBuf },
    /// Best slot in a forecast
    Window { input: PathBuf },
}

#[derive(Subcommand, Debug)]
enum FleetCommand {
    /// Battery health score
    Battery { input: PathBuf },
    /// Predicted maintenance findings
    Maintenance { input: PathBuf },
    /// Pre-flight checklist validation
    Preflight { input: PathBuf },
    /// Upcoming maintenance schedule
    Schedule { input: PathBuf },
    /// Whether a drone may take an assignment
    Eligibility { input: PathBuf },
}

#[derive(Debug, Serialize)]
struct PatternReport {
    waypoints: Vec<Waypoint>,
    stats: MissionStats,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    conflicts: Vec<NoFlyConflict>,
    truncated: bool,
}

#[derive(Debug, Serialize)]
struct AdjustReport {
    adjustments: Vec<sar_core::MissionAdjustment>,
    adjusted: sar_core::MissionParameters,
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("sar_planner=info,sar_core=info"))?;
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let mut config = Config::from_env()?;
    if let Some(path) = &cli.config {
        config = config.with_engine_file(path)?;
    }
    if let Some(url) = cli.elevation_url {
        config.elevation_provider_url = url;
    }

    match cli.command {
        Command::Coverage { input } => run_coverage(&config, &input),
        Command::Pattern(args) => run_pattern(&config, &args),
        Command::Terrain { command, grid } => run_terrain(&config, command, grid.as_deref()),
        Command::Weather { command } => run_weather(&config, command),
        Command::Rtb { input } => {
            let request: RtbRequest = read_document(&input)?;
            let controller = FlightSafetyController::new(
                config.engine.rtb.clone(),
                config.engine.landing.clone(),
                config.engine.return_path.clone(),
            );
            let plan = controller.plan_return(&request.drone, &request.zones, &request.weather)?;
            write_output(&plan)
        }
        Command::Fleet { command, as_of } => run_fleet(&config, command, as_of.unwrap_or_else(Utc::now)),
    }
}

fn run_coverage(config: &Config, input: &Path) -> anyhow::Result<()> {
    let request: CoverageRequest = read_document(input)?;
    let analyzer = CoverageAnalyzer::new(config.engine.coverage.clone())?;
    let analysis = analyzer.analyze(&request.breadcrumbs, request.time_range.as_ref());
    write_output(&analysis)
}

fn run_pattern(config: &Config, args: &PatternArgs) -> anyhow::Result<()> {
    let area: SearchArea = read_document(&args.input)?;
    let generator = SearchPatternGenerator::new(config.engine.patterns.clone());
    let mut waypoints = generator.generate(&area)?;
    if args.optimize {
        waypoints = optimize_waypoint_sequence(&waypoints);
    }

    let mut stats = generator.calculate_mission_stats(&waypoints, args.speed, args.battery)?;
    let mut truncated = false;
    if args.fit_battery && !stats.can_complete && stats.estimated_battery_percent > 0.0 {
        let share = args.battery / stats.estimated_battery_percent * 100.0;
        waypoints = truncate_for_battery(&waypoints, share);
        stats = generator.calculate_mission_stats(&waypoints, args.speed, args.battery)?;
        truncated = true;
        tracing::warn!(kept = waypoints.len(), "Plan truncated to fit battery");
    }

    let conflicts = match &args.no_fly {
        Some(path) => {
            let zones: Vec<NoFlyZone> = read_document(path)?;
            check_no_fly_zone_conflicts(&waypoints, &zones)
                .with_context(|| format!("checking no-fly zones from {}", path.display()))?
        }
        None => Vec::new(),
    };

    write_output(&PatternReport {
        waypoints,
        stats,
        conflicts,
        truncated,
    })
}

fn terrain_source(config: &Config, grid: Option<&Path>, area: Option<Bounds>) -> anyhow::Result<TerrainGrid> {
    if let Some(path) = grid {
        return read_grid(path);
    }
    let area = area.context("document has no coordinates to sample terrain around")?;
    let client = reqwest::blocking::Client::new();
    fetch_terrain_grid(&client, config, &area)
}

fn run_terrain(config: &Config, command: TerrainCommand, grid: Option<&Path>) -> anyhow::Result<()> {
    let terrain = &config.engine.terrain;
    let analyzer = |area: Option<Bounds>| -> anyhow::Result<TerrainAnalyzer<TerrainGrid>> {
        let source = terrain_source(config, grid, area)?;
        Ok(TerrainAnalyzer::with_config(source, terrain.clone())?)
    };

    match command {
        TerrainCommand::Hazards { input } => {
            let bounds: Bounds = read_document(&input)?;
            write_output(&analyzer(Some(bounds))?.identify_hazards(&bounds)?)
        }
        TerrainCommand::Watershed { input } => {
            let bounds: Bounds = read_document(&input)?;
            write_output(&analyzer(Some(bounds))?.watershed(&bounds)?)
        }
        TerrainCommand::Viewshed { input } => {
            let request: ViewshedRequest = read_document(&input)?;
            let radius = request.radius_m.unwrap_or(terrain.viewshed_radius_m);
            let height = request.observer_height_m.unwrap_or(terrain.observer_height_m);
            let area = bounds_around(request.observer.coordinate(), radius);
            write_output(&analyzer(Some(area))?.viewshed(request.observer, radius, height)?)
        }
        TerrainCommand::Path { input } => {
            let request: PathRequest = read_document(&input)?;
            let max_slope = request.max_slope_deg.unwrap_or(terrain.path_max_slope_deg);
            let area = Bounds::from_coordinates([&request.start, &request.end]);
            write_output(&analyzer(area)?.find_path(request.start, request.end, max_slope)?)
        }
        TerrainCommand::Annotate { input } => {
            let waypoints: Vec<Waypoint> = read_document(&input)?;
            let area = Bounds::from_coordinates(waypoints.iter().map(|wp| &wp.coordinate));
            write_output(&analyzer(area)?.annotate_waypoints(&waypoints)?)
        }
    }
}

fn run_weather(config: &Config, command: WeatherCommand) -> anyhow::Result<()> {
    let engine = WeatherRiskEngine::new(config.engine.weather.clone());
    match command {
        WeatherCommand::Safety { input } => {
            let weather: WeatherConditions = read_document(&input)?;
            write_output(&engine.is_weather_safe(&weather))
        }
        WeatherCommand::Adjust { input } => {
            let request: AdjustRequest = read_document(&input)?;
            let adjustments = engine.adjust_mission_for_weather(&request.mission, &request.weather);
            let adjusted = request.mission.apply(&adjustments);
            write_output(&AdjustReport { adjustments, adjusted })
        }
        WeatherCommand::Window { input } => {
            let forecast: Vec<ForecastSlot> = read_document(&input)?;
            write_output(&engine.calculate_optimal_flight_time(&forecast))
        }
    }
}

fn run_fleet(config: &Config, command: FleetCommand, as_of: DateTime<Utc>) -> anyhow::Result<()> {
    let predictor = FleetMaintenancePredictor::new(config.engine.fleet.clone());
    match command {
        FleetCommand::Battery { input } => {
            let report: BatteryReport = read_document(&input)?;
            write_output(&predictor.battery_health(&report, as_of)?)
        }
        FleetCommand::Maintenance { input } => {
            let request: MaintenanceRequest = read_document(&input)?;
            write_output(&predictor.predict_maintenance(
                request.flight_hours,
                &request.error_codes,
                &request.metrics,
                request.last_maintenance,
                as_of,
            ))
        }
        FleetCommand::Preflight { input } => {
            let checklist: PreFlightChecklist = read_document(&input)?;
            write_output(&validate_pre_flight_check(&checklist))
        }
        FleetCommand::Schedule { input } => {
            let request: ScheduleRequest = read_document(&input)?;
            write_output(&predictor.generate_maintenance_schedule(request.flight_hours, as_of))
        }
        FleetCommand::Eligibility { input } => {
            let request: EligibilityRequest = read_document(&input)?;
            let preflight = validate_pre_flight_check(&request.checklist);
            let battery = predictor.battery_health(&request.battery, as_of)?;
            let maintenance = &request.maintenance;
            let findings = predictor.predict_maintenance(
                maintenance.flight_hours,
                &maintenance.error_codes,
                &maintenance.metrics,
                maintenance.last_maintenance,
                as_of,
            );
            write_output(&predictor.assess_assignment_eligibility(&preflight, &battery, &findings))
        }
    }
}
