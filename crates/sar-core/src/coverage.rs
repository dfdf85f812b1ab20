//! Coverage analysis over mission breadcrumbs.
//!
//! A single pass buckets samples into fixed-size grid cells, then a bounded
//! scan around the visited cells looks for unsearched holes inside the
//! effective search perimeter.

use crate::error::{EngineError, EngineResult};
use crate::models::{Breadcrumb, Coordinate};
use crate::spatial::{distance, GridCell, METERS_PER_DEG_LAT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;

/// Default cell size, roughly 111 m at the equator.
pub const DEFAULT_CELL_SIZE_DEG: f64 = 0.001;
/// Intensity added per breadcrumb, capped at 1.0 per cell.
pub const DEFAULT_INTENSITY_INCREMENT: f64 = 0.1;
/// Time credited to a cell per breadcrumb.
pub const DEFAULT_SECONDS_PER_SAMPLE: f64 = 30.0;
/// Cells added around the visited bounding box before the gap scan.
pub const DEFAULT_GAP_MARGIN_CELLS: i64 = 5;
/// Radius, in cells, of the neighbourhood counted around an unvisited cell.
pub const DEFAULT_GAP_NEIGHBOR_RADIUS_CELLS: i64 = 3;
/// An unvisited cell is a gap when more than this many neighbours were searched.
pub const DEFAULT_GAP_MIN_NEIGHBORS: usize = 2;
/// Above this many searched neighbours a gap is high priority.
pub const DEFAULT_GAP_HIGH_PRIORITY_NEIGHBORS: usize = 4;
/// Gap candidates closer than this are merged into one gap.
pub const DEFAULT_GAP_MERGE_RADIUS_M: f64 = 200.0;
/// Upper bound on cells visited by the gap scan.
pub const DEFAULT_MAX_GAP_SCAN_CELLS: usize = 250_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    pub cell_size_deg: f64,
    pub intensity_increment: f64,
    pub seconds_per_sample: f64,
    pub gap_margin_cells: i64,
    pub gap_neighbor_radius_cells: i64,
    pub gap_min_neighbors: usize,
    pub gap_high_priority_neighbors: usize,
    pub gap_merge_radius_m: f64,
    pub max_gap_scan_cells: usize,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            cell_size_deg: DEFAULT_CELL_SIZE_DEG,
            intensity_increment: DEFAULT_INTENSITY_INCREMENT,
            seconds_per_sample: DEFAULT_SECONDS_PER_SAMPLE,
            gap_margin_cells: DEFAULT_GAP_MARGIN_CELLS,
            gap_neighbor_radius_cells: DEFAULT_GAP_NEIGHBOR_RADIUS_CELLS,
            gap_min_neighbors: DEFAULT_GAP_MIN_NEIGHBORS,
            gap_high_priority_neighbors: DEFAULT_GAP_HIGH_PRIORITY_NEIGHBORS,
            gap_merge_radius_m: DEFAULT_GAP_MERGE_RADIUS_M,
            max_gap_scan_cells: DEFAULT_MAX_GAP_SCAN_CELLS,
        }
    }
}

impl CoverageConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.cell_size_deg.is_finite() && self.cell_size_deg > 0.0) {
            return Err(EngineError::invalid_parameter(
                "cell_size_deg",
                "must be a positive number of degrees",
            ));
        }
        if !(self.intensity_increment.is_finite() && self.intensity_increment >= 0.0) {
            return Err(EngineError::invalid_parameter(
                "intensity_increment",
                "must be non-negative",
            ));
        }
        if !(self.seconds_per_sample.is_finite() && self.seconds_per_sample >= 0.0) {
            return Err(EngineError::invalid_parameter(
                "seconds_per_sample",
                "must be non-negative",
            ));
        }
        if self.gap_margin_cells < 0 || self.gap_neighbor_radius_cells < 0 {
            return Err(EngineError::invalid_parameter(
                "gap_margin_cells",
                "gap scan distances must be non-negative",
            ));
        }
        if !(self.gap_merge_radius_m.is_finite() && self.gap_merge_radius_m >= 0.0) {
            return Err(EngineError::invalid_parameter(
                "gap_merge_radius_m",
                "must be non-negative",
            ));
        }
        Ok(())
    }

    /// Nominal radius of one cell in meters.
    pub fn cell_radius_m(&self) -> f64 {
        self.cell_size_deg * METERS_PER_DEG_LAT
    }

    fn cell_area_m2(&self) -> f64 {
        let r = self.cell_radius_m();
        PI * r * r
    }
}

/// Inclusive time window used to filter breadcrumbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// One heatmap cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageZone {
    pub lat: f64,
    pub lng: f64,
    pub intensity: f64,
    pub time_spent_s: f64,
    pub team_count: usize,
    pub last_visited: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchGap {
    pub center: Coordinate,
    pub radius_m: f64,
    pub priority: GapPriority,
    pub estimated_area_m2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamOverlap {
    pub zone: Coordinate,
    pub teams: Vec<String>,
    pub overlap_duration_s: f64,
    pub efficiency: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageStatistics {
    pub total_area_searched_m2: f64,
    pub gap_area_m2: f64,
    pub coverage_percent: f64,
    pub avg_intensity: f64,
    pub total_time_spent_s: f64,
    pub overlap_percent: f64,
    pub high_priority_gaps: usize,
    pub medium_priority_gaps: usize,
    pub low_priority_gaps: usize,
    pub samples_used: usize,
    pub samples_skipped: usize,
    /// Set when the gap scan was skipped because it exceeded its work bound.
    pub gap_scan_skipped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageAnalysis {
    pub heatmap: Vec<CoverageZone>,
    pub gaps: Vec<SearchGap>,
    pub overlaps: Vec<TeamOverlap>,
    pub statistics: CoverageStatistics,
}

/// Per-cell accumulator. The team set is the only source of `team_count`.
#[derive(Debug, Clone)]
struct CellAccumulator {
    intensity: f64,
    time_spent_s: f64,
    teams: BTreeSet<String>,
    last_visited: DateTime<Utc>,
}

impl CellAccumulator {
    fn new(first_seen: DateTime<Utc>) -> Self {
        Self {
            intensity: 0.0,
            time_spent_s: 0.0,
            teams: BTreeSet::new(),
            last_visited: first_seen,
        }
    }
}

/// Turns a breadcrumb stream into a heatmap, gap report and overlap report.
#[derive(Debug, Clone, Default)]
pub struct CoverageAnalyzer {
    config: CoverageConfig,
}

impl CoverageAnalyzer {
    pub fn new(config: CoverageConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CoverageConfig {
        &self.config
    }

    /// Analyze one mission's breadcrumbs.
    ///
    /// Breadcrumbs without a usable coordinate are skipped and counted in
    /// `statistics.samples_skipped`. The output depends only on the input set.
    pub fn analyze(&self, breadcrumbs: &[Breadcrumb], range: Option<&TimeRange>) -> CoverageAnalysis {
        let mut grid: BTreeMap<GridCell, CellAccumulator> = BTreeMap::new();
        let mut used = 0usize;
        let mut skipped = 0usize;

        for crumb in breadcrumbs {
            if let Some(range) = range {
                if !range.contains(crumb.timestamp) {
                    continue;
                }
            }
            let Some(coord) = crumb.coordinate.filter(Coordinate::is_valid) else {
                skipped += 1;
                continue;
            };

            let cell = GridCell::of(coord, self.config.cell_size_deg);
            let acc = grid
                .entry(cell)
                .or_insert_with(|| CellAccumulator::new(crumb.timestamp));
            acc.intensity = (acc.intensity + self.config.intensity_increment).min(1.0);
            acc.time_spent_s += self.config.seconds_per_sample;
            acc.teams.insert(crumb.team_id.clone());
            if crumb.timestamp > acc.last_visited {
                acc.last_visited = crumb.timestamp;
            }
            used += 1;
        }

        if skipped > 0 {
            tracing::warn!(skipped, "Skipped breadcrumbs without a valid coordinate");
        }

        let heatmap: Vec<CoverageZone> = grid
            .iter()
            .map(|(cell, acc)| {
                let center = cell.center(self.config.cell_size_deg);
                CoverageZone {
                    lat: center.lat,
                    lng: center.lng,
                    intensity: acc.intensity,
                    time_spent_s: acc.time_spent_s,
                    team_count: acc.teams.len(),
                    last_visited: acc.last_visited,
                }
            })
            .collect();

        let (candidates, gap_scan_skipped) = self.find_gap_candidates(&grid);
        let gaps = self.merge_nearby_gaps(candidates);
        let overlaps = self.find_team_overlaps(&grid);

        let mut statistics = self.calculate_statistics(&heatmap, &gaps, &overlaps);
        statistics.samples_used = used;
        statistics.samples_skipped = skipped;
        statistics.gap_scan_skipped = gap_scan_skipped;

        tracing::debug!(
            cells = heatmap.len(),
            gaps = gaps.len(),
            overlaps = overlaps.len(),
            "Coverage analysis complete"
        );

        CoverageAnalysis {
            heatmap,
            gaps,
            overlaps,
            statistics,
        }
    }

    /// Scan unvisited cells in the expanded bounding box of visited cells.
    ///
    /// Returns the candidates and whether the scan was skipped for exceeding
    /// `max_gap_scan_cells`.
    fn find_gap_candidates(&self, grid: &BTreeMap<GridCell, CellAccumulator>) -> (Vec<SearchGap>, bool) {
        let Some(first) = grid.keys().next() else {
            return (Vec::new(), false);
        };
        let (mut min_row, mut max_row, mut min_col, mut max_col) =
            (first.row, first.row, first.col, first.col);
        for cell in grid.keys() {
            min_row = min_row.min(cell.row);
            max_row = max_row.max(cell.row);
            min_col = min_col.min(cell.col);
            max_col = max_col.max(cell.col);
        }
        let margin = self.config.gap_margin_cells;
        min_row -= margin;
        max_row += margin;
        min_col -= margin;
        max_col += margin;

        let rows = (max_row - min_row + 1) as u128;
        let cols = (max_col - min_col + 1) as u128;
        if rows * cols > self.config.max_gap_scan_cells as u128 {
            tracing::warn!(
                rows = rows as u64,
                cols = cols as u64,
                limit = self.config.max_gap_scan_cells,
                "Gap scan area too large, skipping gap detection"
            );
            return (Vec::new(), true);
        }

        let radius = self.config.gap_neighbor_radius_cells;
        let neighborhood: Vec<(i64, i64)> = (-radius..=radius)
            .flat_map(|dr| (-radius..=radius).map(move |dc| (dr, dc)))
            .filter(|&(dr, dc)| (dr, dc) != (0, 0) && dr * dr + dc * dc <= radius * radius)
            .collect();

        let gap_radius = self.config.cell_radius_m();
        let gap_area = self.config.cell_area_m2();
        let mut candidates = Vec::new();

        for row in min_row..=max_row {
            for col in min_col..=max_col {
                let cell = GridCell { row, col };
                if grid.contains_key(&cell) {
                    continue;
                }
                let nearby = neighborhood
                    .iter()
                    .filter(|&&(dr, dc)| grid.contains_key(&cell.offset(dr, dc)))
                    .count();
                if nearby > self.config.gap_min_neighbors {
                    let priority = if nearby > self.config.gap_high_priority_neighbors {
                        GapPriority::High
                    } else {
                        GapPriority::Medium
                    };
                    candidates.push(SearchGap {
                        center: cell.center(self.config.cell_size_deg),
                        radius_m: gap_radius,
                        priority,
                        estimated_area_m2: gap_area,
                    });
                }
            }
        }

        (candidates, false)
    }

    /// Cluster candidates around each unclaimed seed within the merge radius.
    fn merge_nearby_gaps(&self, gaps: Vec<SearchGap>) -> Vec<SearchGap> {
        let mut merged = Vec::new();
        let mut used = vec![false; gaps.len()];

        for i in 0..gaps.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            let mut cluster = vec![&gaps[i]];

            for j in (i + 1)..gaps.len() {
                if used[j] {
                    continue;
                }
                if distance(gaps[i].center, gaps[j].center) < self.config.gap_merge_radius_m {
                    used[j] = true;
                    cluster.push(&gaps[j]);
                }
            }

            let count = cluster.len() as f64;
            let avg_lat = cluster.iter().map(|g| g.center.lat).sum::<f64>() / count;
            let avg_lng = cluster.iter().map(|g| g.center.lng).sum::<f64>() / count;
            let total_area: f64 = cluster.iter().map(|g| g.estimated_area_m2).sum();
            let priority = cluster
                .iter()
                .map(|g| g.priority)
                .max()
                .unwrap_or(GapPriority::Low);

            merged.push(SearchGap {
                center: Coordinate::new(avg_lat, avg_lng),
                radius_m: (total_area / PI).sqrt(),
                priority,
                estimated_area_m2: total_area,
            });
        }

        merged
    }

    fn find_team_overlaps(&self, grid: &BTreeMap<GridCell, CellAccumulator>) -> Vec<TeamOverlap> {
        grid.iter()
            .filter(|(_, acc)| acc.teams.len() > 1)
            .map(|(cell, acc)| {
                let teams = acc.teams.len() as f64;
                TeamOverlap {
                    zone: cell.center(self.config.cell_size_deg),
                    teams: acc.teams.iter().cloned().collect(),
                    overlap_duration_s: acc.time_spent_s / teams,
                    efficiency: 1.0 / teams,
                }
            })
            .collect()
    }

    fn calculate_statistics(
        &self,
        heatmap: &[CoverageZone],
        gaps: &[SearchGap],
        overlaps: &[TeamOverlap],
    ) -> CoverageStatistics {
        let count_priority = |p: GapPriority| gaps.iter().filter(|g| g.priority == p).count();
        let gap_area: f64 = gaps.iter().map(|g| g.estimated_area_m2).sum();

        if heatmap.is_empty() {
            return CoverageStatistics {
                gap_area_m2: gap_area,
                ..CoverageStatistics::default()
            };
        }

        let cells = heatmap.len() as f64;
        let total_area = cells * self.config.cell_area_m2();
        let coverage_percent = if total_area > 0.0 {
            ((total_area - gap_area) / total_area * 100.0).max(0.0)
        } else {
            0.0
        };

        CoverageStatistics {
            total_area_searched_m2: total_area,
            gap_area_m2: gap_area,
            coverage_percent,
            avg_intensity: heatmap.iter().map(|z| z.intensity).sum::<f64>() / cells,
            total_time_spent_s: heatmap.iter().map(|z| z.time_spent_s).sum(),
            overlap_percent: overlaps.len() as f64 / cells * 100.0,
            high_priority_gaps: count_priority(GapPriority::High),
            medium_priority_gaps: count_priority(GapPriority::Medium),
            low_priority_gaps: count_priority(GapPriority::Low),
            ..CoverageStatistics::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn crumb(lat: f64, lng: f64, minute: i64, team: &str) -> Breadcrumb {
        Breadcrumb::new(lat, lng, t0() + Duration::minutes(minute), team)
    }

    /// Ring of visited cells around an unvisited center cell.
    fn ring_around(center_row: i64, center_col: i64) -> Vec<Breadcrumb> {
        let mut out = Vec::new();
        for dr in -1..=1_i64 {
            for dc in -1..=1_i64 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let lat = (center_row + dr) as f64 * DEFAULT_CELL_SIZE_DEG;
                let lng = (center_col + dc) as f64 * DEFAULT_CELL_SIZE_DEG;
                out.push(crumb(lat, lng, 0, "alpha"));
            }
        }
        out
    }

    #[test]
    fn empty_input_yields_zeroed_result() {
        let analysis = CoverageAnalyzer::default().analyze(&[], None);
        assert!(analysis.heatmap.is_empty());
        assert!(analysis.gaps.is_empty());
        assert!(analysis.overlaps.is_empty());
        assert_eq!(analysis.statistics.coverage_percent, 0.0);
        assert!(!analysis.statistics.coverage_percent.is_nan());
        assert_eq!(analysis.statistics.avg_intensity, 0.0);
    }

    #[test]
    fn two_teams_in_one_cell_produce_single_overlap() {
        let crumbs = vec![
            crumb(41.8240, -71.4128, 0, "A"),
            crumb(41.8241, -71.4128, 1, "A"),
            crumb(41.8240, -71.4129, 2, "A"),
            crumb(41.8242, -71.4127, 3, "B"),
            crumb(41.8240, -71.4128, 4, "B"),
        ];
        let analysis = CoverageAnalyzer::default().analyze(&crumbs, None);

        assert_eq!(analysis.heatmap.len(), 1);
        let zone = &analysis.heatmap[0];
        assert_eq!(zone.team_count, 2);
        assert!((zone.intensity - 0.5).abs() < 1e-9);
        assert!((zone.time_spent_s - 150.0).abs() < 1e-9);
        assert_eq!(zone.last_visited, t0() + Duration::minutes(4));

        assert_eq!(analysis.overlaps.len(), 1);
        assert!((analysis.overlaps[0].efficiency - 0.5).abs() < 1e-12);
        assert_eq!(analysis.overlaps[0].teams, vec!["A".to_string(), "B".to_string()]);
        assert!((analysis.overlaps[0].overlap_duration_s - 75.0).abs() < 1e-9);
        assert!((analysis.statistics.overlap_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn intensity_caps_at_one() {
        let crumbs: Vec<Breadcrumb> = (0..25).map(|m| crumb(10.0, 10.0, m, "A")).collect();
        let analysis = CoverageAnalyzer::default().analyze(&crumbs, None);
        assert_eq!(analysis.heatmap[0].intensity, 1.0);
        assert!((analysis.heatmap[0].time_spent_s - 750.0).abs() < 1e-9);
    }

    #[test]
    fn malformed_breadcrumbs_are_skipped() {
        let mut crumbs = vec![crumb(10.0, 10.0, 0, "A")];
        crumbs.push(Breadcrumb {
            coordinate: None,
            timestamp: t0(),
            team_id: "A".into(),
        });
        crumbs.push(crumb(f64::NAN, 10.0, 0, "B"));
        let analysis = CoverageAnalyzer::default().analyze(&crumbs, None);
        assert_eq!(analysis.heatmap.len(), 1);
        assert_eq!(analysis.statistics.samples_used, 1);
        assert_eq!(analysis.statistics.samples_skipped, 2);
    }

    #[test]
    fn time_range_filters_samples() {
        let crumbs = vec![crumb(10.0, 10.0, 0, "A"), crumb(10.01, 10.01, 30, "B")];
        let range = TimeRange {
            start: t0() + Duration::minutes(10),
            end: t0() + Duration::minutes(40),
        };
        let analysis = CoverageAnalyzer::default().analyze(&crumbs, Some(&range));
        assert_eq!(analysis.heatmap.len(), 1);
        assert_eq!(analysis.heatmap[0].team_count, 1);
    }

    #[test]
    fn hole_inside_searched_ring_is_high_priority_gap() {
        let analysis = CoverageAnalyzer::default().analyze(&ring_around(10_000, 20_000), None);
        let center = GridCell { row: 10_000, col: 20_000 }.center(DEFAULT_CELL_SIZE_DEG);

        let gap = analysis
            .gaps
            .iter()
            .find(|g| distance(g.center, center) < 250.0)
            .expect("the enclosed cell should be reported as a gap");
        assert_eq!(gap.priority, GapPriority::High);
        assert!(analysis.statistics.high_priority_gaps >= 1);
    }

    #[test]
    fn isolated_cell_does_not_produce_gaps() {
        let analysis = CoverageAnalyzer::default().analyze(&[crumb(5.0, 5.0, 0, "A")], None);
        assert!(analysis.gaps.is_empty());
        assert!((analysis.statistics.coverage_percent - 100.0).abs() < 1e-9);
    }

    /// Gap priority of the unvisited origin cell when `visited` cells are
    /// searched around it, or `None` when it is not a gap.
    fn origin_gap_priority(visited: &[(i64, i64)]) -> Option<GapPriority> {
        let analyzer = CoverageAnalyzer::default();
        let grid: BTreeMap<GridCell, CellAccumulator> = visited
            .iter()
            .map(|&(row, col)| (GridCell { row, col }, CellAccumulator::new(t0())))
            .collect();
        let origin = GridCell { row: 0, col: 0 }.center(DEFAULT_CELL_SIZE_DEG);
        let (candidates, skipped) = analyzer.find_gap_candidates(&grid);
        assert!(!skipped);
        candidates
            .into_iter()
            .find(|g| g.center == origin)
            .map(|g| g.priority)
    }

    #[test]
    fn gap_priority_thresholds_follow_neighbor_count() {
        let around = [(0, 1), (0, -1), (1, 0), (-1, 0), (1, 1)];
        assert_eq!(origin_gap_priority(&around[..2]), None);
        assert_eq!(origin_gap_priority(&around[..3]), Some(GapPriority::Medium));
        assert_eq!(origin_gap_priority(&around[..4]), Some(GapPriority::Medium));
        assert_eq!(origin_gap_priority(&around[..5]), Some(GapPriority::High));
        // Cells outside the neighbour disc do not count.
        assert_eq!(origin_gap_priority(&[(0, 1), (0, -1), (1, 0), (3, 3)]), Some(GapPriority::Medium));
    }

    #[test]
    fn merged_gap_sums_area_and_keeps_highest_priority() {
        let analyzer = CoverageAnalyzer::default();
        let area = analyzer.config().cell_area_m2();
        let radius = analyzer.config().cell_radius_m();
        let gaps = vec![
            SearchGap {
                center: Coordinate::new(0.0, 0.0),
                radius_m: radius,
                priority: GapPriority::Medium,
                estimated_area_m2: area,
            },
            SearchGap {
                center: Coordinate::new(0.001, 0.0),
                radius_m: radius,
                priority: GapPriority::High,
                estimated_area_m2: area,
            },
            SearchGap {
                center: Coordinate::new(0.01, 0.0),
                radius_m: radius,
                priority: GapPriority::Medium,
                estimated_area_m2: area,
            },
        ];
        let merged = analyzer.merge_nearby_gaps(gaps);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].priority, GapPriority::High);
        assert!((merged[0].estimated_area_m2 - 2.0 * area).abs() < 1e-6);
        assert!((merged[0].center.lat - 0.0005).abs() < 1e-12);
        assert_eq!(merged[1].priority, GapPriority::Medium);
    }

    #[test]
    fn oversized_scan_is_skipped_and_flagged() {
        let config = CoverageConfig {
            max_gap_scan_cells: 10,
            ..CoverageConfig::default()
        };
        let analyzer = CoverageAnalyzer::new(config).unwrap();
        let analysis = analyzer.analyze(&ring_around(0, 0), None);
        assert!(analysis.gaps.is_empty());
        assert!(analysis.statistics.gap_scan_skipped);
    }

    #[test]
    fn analysis_is_idempotent() {
        let mut crumbs = ring_around(500, 500);
        crumbs.push(crumb(0.5, 0.5, 3, "B"));
        let analyzer = CoverageAnalyzer::default();
        assert_eq!(analyzer.analyze(&crumbs, None), analyzer.analyze(&crumbs, None));
    }

    #[test]
    fn rejects_non_positive_cell_size() {
        let config = CoverageConfig {
            cell_size_deg: 0.0,
            ..CoverageConfig::default()
        };
        assert!(CoverageAnalyzer::new(config).is_err());
    }
}
