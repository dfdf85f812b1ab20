//! CLI configuration from environment and an optional engine rules file.

use anyhow::Context;
use sar_core::EngineConfig;
use std::env;
use std::path::Path;

pub const DEFAULT_ELEVATION_URL: &str = "https://api.open-meteo.com/v1/elevation";

#[derive(Debug, Clone)]
pub struct Config {
    pub elevation_provider_url: String,
    pub elevation_sample_spacing_m: f64,
    pub elevation_max_grid_points: usize,
    pub elevation_max_points_per_request: usize,
    pub elevation_request_timeout_s: u64,
    /// Engine tunables, defaults unless `SAR_CONFIG` or `--config` names a file
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let engine = match env::var("SAR_CONFIG") {
            Ok(path) if !path.trim().is_empty() => load_engine_config(Path::new(&path))?,
            _ => EngineConfig::default(),
        };
        Ok(Self {
            elevation_provider_url: env::var("SAR_ELEVATION_URL")
                .unwrap_or_else(|_| DEFAULT_ELEVATION_URL.to_string()),
            elevation_sample_spacing_m: parse_env("SAR_ELEVATION_SPACING_M").unwrap_or(30.0),
            elevation_max_grid_points: parse_env("SAR_ELEVATION_MAX_GRID_POINTS").unwrap_or(2500),
            elevation_max_points_per_request: parse_env("SAR_ELEVATION_MAX_POINTS").unwrap_or(100),
            elevation_request_timeout_s: parse_env("SAR_ELEVATION_TIMEOUT_S").unwrap_or(10),
            engine,
        })
    }

    /// Replace the engine tunables with the contents of `path`.
    pub fn with_engine_file(mut self, path: &Path) -> anyhow::Result<Self> {
        self.engine = load_engine_config(path)?;
        Ok(self)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

pub fn load_engine_config(path: &Path) -> anyhow::Result<EngineConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading engine config {}", path.display()))?;
    let config = EngineConfig::from_json_str(&raw)
        .with_context(|| format!("parsing engine config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Loaded engine config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_file_overrides_defaults() {
        let dir = env::temp_dir().join(format!("sar-cli-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("engine.json");
        std::fs::write(&path, r#"{ "rtb": { "battery_threshold": 35 } }"#).unwrap();

        let config = load_engine_config(&path).unwrap();
        assert_eq!(config.rtb.battery_threshold, 35.0);
        assert_eq!(config.rtb.max_wind_mps, 25.0);

        std::fs::write(&path, r#"{ "coverage": { "cell_size_deg": 0 } }"#).unwrap();
        assert!(load_engine_config(&path).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_engine_config(Path::new("/nonexistent/sar-engine.json")).is_err());
    }
}
