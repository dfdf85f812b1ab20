//! Elevation grid sampling from an Open-Meteo compatible provider.

use crate::config::Config;
use anyhow::{bail, Context};
use reqwest::blocking::Client;
use sar_core::spatial::{meters_per_deg_lng, METERS_PER_DEG_LAT};
use sar_core::{Bounds, Coordinate, TerrainGrid};
use serde::Deserialize;
use std::time::Duration;

const MIN_SPACING_M: f64 = 5.0;
const MAX_SPACING_M: f64 = 2000.0;
const MIN_PAD_DEG: f64 = 0.0015;
const PAD_RATIO: f64 = 0.2;
/// Smallest lattice that still supports bilinear sampling.
const MIN_LATTICE_POINTS: usize = 4;

#[derive(Debug, Deserialize)]
struct OpenMeteoElevationResponse {
    elevation: Option<Vec<f64>>,
}

/// Regular sample lattice anchored at the south-west corner of a box.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SampleLattice {
    origin: Coordinate,
    rows: usize,
    cols: usize,
    lat_step_deg: f64,
    lng_step_deg: f64,
}

impl SampleLattice {
    /// Cover `bounds` at `spacing_m`, coarsening until at most `max_points`
    /// samples remain or the spacing passes `MAX_SPACING_M`.
    fn covering(bounds: &Bounds, spacing_m: f64, max_points: usize) -> Self {
        let lng_scale = meters_per_deg_lng(bounds.center().lat);
        let budget = max_points.max(MIN_LATTICE_POINTS);
        let mut spacing = spacing_m.max(MIN_SPACING_M);

        loop {
            let lat_step_deg = spacing / METERS_PER_DEG_LAT;
            let lng_step_deg = spacing / lng_scale;
            let lattice = Self {
                origin: Coordinate::new(bounds.min_lat, bounds.min_lng),
                rows: steps_over(bounds.lat_span(), lat_step_deg) + 1,
                cols: steps_over(bounds.lng_span(), lng_step_deg) + 1,
                lat_step_deg,
                lng_step_deg,
            };
            let total = lattice.len();
            if total <= budget || spacing > MAX_SPACING_M {
                return lattice;
            }
            spacing *= (total as f64 / budget as f64).sqrt().max(1.1);
        }
    }

    fn len(&self) -> usize {
        self.rows.saturating_mul(self.cols)
    }

    /// Row-major sample coordinates, south to north.
    fn coordinates(&self) -> Vec<Coordinate> {
        (0..self.rows)
            .flat_map(|row| {
                (0..self.cols).map(move |col| {
                    Coordinate::new(
                        self.origin.lat + row as f64 * self.lat_step_deg,
                        self.origin.lng + col as f64 * self.lng_step_deg,
                    )
                })
            })
            .collect()
    }

    /// Box spanned by the lattice; may overshoot the requested box by one step.
    fn bounds(&self) -> Bounds {
        Bounds {
            min_lat: self.origin.lat,
            max_lat: self.origin.lat + (self.rows - 1) as f64 * self.lat_step_deg,
            min_lng: self.origin.lng,
            max_lng: self.origin.lng + (self.cols - 1) as f64 * self.lng_step_deg,
        }
    }
}

/// Whole steps needed to reach across `span`, at least one.
fn steps_over(span: f64, step: f64) -> usize {
    (span / step).ceil().max(1.0) as usize
}

/// Fetch a regular elevation grid covering `area` plus a margin.
///
/// Provider failures are returned to the caller; there is no retry.
pub fn fetch_terrain_grid(client: &Client, config: &Config, area: &Bounds) -> anyhow::Result<TerrainGrid> {
    if config.elevation_provider_url.trim().is_empty() {
        bail!("elevation provider URL is empty");
    }
    if config.elevation_max_grid_points == 0 {
        bail!("elevation_max_grid_points must be > 0");
    }

    let lattice = SampleLattice::covering(
        &padded(area),
        config.elevation_sample_spacing_m,
        config.elevation_max_grid_points,
    );
    let samples = lattice.coordinates();
    let per_request = config.elevation_max_points_per_request.max(1);
    let timeout = Duration::from_secs(config.elevation_request_timeout_s.max(3));
    let mut elevations = Vec::with_capacity(samples.len());

    for chunk in samples.chunks(per_request) {
        let response = client
            .get(chunk_url(&config.elevation_provider_url, chunk))
            .timeout(timeout)
            .send()
            .context("elevation provider request failed")?;
        if !response.status().is_success() {
            bail!("elevation provider HTTP {}", response.status());
        }
        let payload: OpenMeteoElevationResponse = response
            .json()
            .context("elevation provider returned malformed JSON")?;
        let values = payload
            .elevation
            .context("elevation provider response is missing `elevation`")?;
        if values.len() != chunk.len() {
            bail!(
                "elevation provider returned {} samples, expected {}",
                values.len(),
                chunk.len()
            );
        }
        elevations.extend(values);
    }

    tracing::info!(
        rows = lattice.rows,
        cols = lattice.cols,
        samples = samples.len(),
        "Fetched elevation grid"
    );

    let grid = TerrainGrid::new(
        lattice.bounds(),
        lattice.lat_step_deg,
        lattice.lng_step_deg,
        lattice.rows,
        lattice.cols,
        elevations,
    )?;
    Ok(grid)
}

/// Grow each side by a share of the span, never less than `MIN_PAD_DEG`.
fn padded(bounds: &Bounds) -> Bounds {
    let pad_lat = (bounds.lat_span() * PAD_RATIO).max(MIN_PAD_DEG);
    let pad_lng = (bounds.lng_span() * PAD_RATIO).max(MIN_PAD_DEG);
    Bounds {
        min_lat: bounds.min_lat - pad_lat,
        max_lat: bounds.max_lat + pad_lat,
        min_lng: bounds.min_lng - pad_lng,
        max_lng: bounds.max_lng + pad_lng,
    }
}

/// Provider URL for one batch of samples, keeping any query already in `base`.
fn chunk_url(base: &str, chunk: &[Coordinate]) -> String {
    let join = |pick: fn(&Coordinate) -> f64| {
        chunk
            .iter()
            .map(|c| format!("{:.6}", pick(c)))
            .collect::<Vec<_>>()
            .join(",")
    };
    let separator = if base.contains('?') { '&' } else { '?' };
    format!(
        "{base}{separator}latitude={}&longitude={}",
        join(|c| c.lat),
        join(|c| c.lng)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_area() -> Bounds {
        Bounds {
            min_lat: 44.10,
            max_lat: 44.12,
            min_lng: -121.30,
            max_lng: -121.27,
        }
    }

    #[test]
    fn padding_grows_each_side() {
        let expanded = padded(&small_area());
        assert!((expanded.min_lat - 44.096).abs() < 1e-9);
        assert!((expanded.max_lng - (-121.264)).abs() < 1e-9);

        let point = Bounds {
            min_lat: 10.0,
            max_lat: 10.0,
            min_lng: 20.0,
            max_lng: 20.0,
        };
        assert!((padded(&point).lat_span() - 2.0 * MIN_PAD_DEG).abs() < 1e-12);
    }

    #[test]
    fn lattice_respects_point_budget_and_covers_box() {
        let bounds = padded(&small_area());
        let lattice = SampleLattice::covering(&bounds, 10.0, 400);
        assert!(lattice.len() <= 400);
        assert!(lattice.rows >= 2 && lattice.cols >= 2);
        let spanned = lattice.bounds();
        assert!(spanned.lat_span() >= bounds.lat_span() - 1e-12);
        assert!(spanned.lng_span() >= bounds.lng_span() - 1e-12);
        assert_eq!(lattice.coordinates().len(), lattice.len());
    }

    #[test]
    fn small_budget_is_honoured_down_to_four_points() {
        let bounds = padded(&small_area());
        // A small configured budget wins over the requested spacing.
        let lattice = SampleLattice::covering(&bounds, 10.0, 9);
        assert!(lattice.len() <= 9, "got {} samples", lattice.len());

        // Budgets under the bilinear minimum are raised to it.
        let spot = padded(&Bounds {
            min_lat: 10.0,
            max_lat: 10.0,
            min_lng: 20.0,
            max_lng: 20.0,
        });
        let tiny = SampleLattice::covering(&spot, 10.0, 1);
        assert_eq!((tiny.rows, tiny.cols), (2, 2));
        assert_eq!(tiny.len(), MIN_LATTICE_POINTS);
    }

    #[test]
    fn budget_exactly_met_keeps_requested_spacing() {
        let bounds = padded(&small_area());
        let fine = SampleLattice::covering(&bounds, 100.0, usize::MAX);
        let at_edge = SampleLattice::covering(&bounds, 100.0, fine.len());
        assert_eq!(at_edge, fine);
        let below_edge = SampleLattice::covering(&bounds, 100.0, fine.len() - 1);
        assert!(below_edge.len() < fine.len());
        assert!(below_edge.lat_step_deg > fine.lat_step_deg);
    }

    #[test]
    fn chunk_url_appends_query() {
        let chunk = [Coordinate::new(1.0, 2.0), Coordinate::new(-2.5, 3.0)];
        assert_eq!(
            chunk_url("https://api.open-meteo.com/v1/elevation", &chunk),
            "https://api.open-meteo.com/v1/elevation?latitude=1.000000,-2.500000&longitude=2.000000,3.000000"
        );
        assert_eq!(
            chunk_url("http://dem.local/v1?key=abc", &chunk[..1]),
            "http://dem.local/v1?key=abc&latitude=1.000000&longitude=2.000000"
        );
    }
}
