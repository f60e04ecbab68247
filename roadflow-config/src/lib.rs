use roadflow_geo::BoundingBox;
use serde::Deserialize;
use std::path::Path;
use std::fs;
use thiserror::Error;

// --- Error Type ---

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

// --- Enums for Choices ---

/// Which render-surface sink the runner should construct.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SinkType {
    WebSocket,
    File,
    Null,
}

impl Default for SinkType {
    fn default() -> Self {
        SinkType::WebSocket
    }
}

// --- Configuration Sections ---

#[derive(Deserialize, Debug, Clone)]
pub struct ParticleSettings {
    #[serde(default = "default_target_count")]
    pub target_count: usize,
    #[serde(default = "default_hard_cap")]
    pub hard_cap: usize,
    /// Per-frame step size range in normalized position units.
    #[serde(default = "default_speed_range")]
    pub speed_range: (f64, f64),
    /// Push a snapshot to the render surface every Nth simulation tick.
    #[serde(default = "default_publish_every")]
    pub publish_every: u64,
}

fn default_target_count() -> usize { 500 }
fn default_hard_cap() -> usize { 2000 }
fn default_speed_range() -> (f64, f64) { (0.0005, 0.0015) }
fn default_publish_every() -> u64 { 2 }

impl Default for ParticleSettings {
    fn default() -> Self {
        Self {
            target_count: default_target_count(),
            hard_cap: default_hard_cap(),
            speed_range: default_speed_range(),
            publish_every: default_publish_every(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct AcquisitionSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Target spacing between sampled polyline points, in degrees (~10 m).
    #[serde(default = "default_sample_spacing")]
    pub sample_spacing_deg: f64,
    /// Server-side result cap for the minor road-class query.
    #[serde(default = "default_minor_road_limit")]
    pub minor_road_limit: u32,
    /// Quiet window after the last viewport move before re-fetching.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Optional bound on the geodata request; unset keeps the transport default.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

fn default_endpoint() -> String { "https://overpass-api.de/api/interpreter".to_string() }
fn default_sample_spacing() -> f64 { 0.0001 }
fn default_minor_road_limit() -> u32 { 500 }
fn default_debounce_ms() -> u64 { 1000 }

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            sample_spacing_deg: default_sample_spacing(),
            minor_road_limit: default_minor_road_limit(),
            debounce_ms: default_debounce_ms(),
            request_timeout_ms: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SurfaceConfig {
    #[serde(rename = "type", default)]
    pub sink_type: SinkType,
    pub options: Option<serde_json::Value>,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            sink_type: SinkType::default(),
            options: None,
        }
    }
}

// --- WebSocket / File Sink Options ---

#[derive(Deserialize, Debug, Clone)]
pub struct WebSocketOptions {
    #[serde(default = "default_ws_host")]
    pub host: String,
    #[serde(default = "default_ws_port")]
    pub port: u16,
}

fn default_ws_host() -> String { "127.0.0.1".to_string() }
fn default_ws_port() -> u16 { 8080 }

impl Default for WebSocketOptions {
    fn default() -> Self {
        Self {
            host: default_ws_host(),
            port: default_ws_port(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct FileOptions {
    #[serde(default = "default_file_path")]
    pub path: String,
}

fn default_file_path() -> String { "particles.jsonl".to_string() }

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            path: default_file_path(),
        }
    }
}

// --- Top-Level Config Struct ---

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Simulation ticks per second.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    #[serde(default)]
    pub particles: ParticleSettings,
    #[serde(default)]
    pub acquisition: AcquisitionSettings,
    /// Viewport used for the first acquisition, before any move events arrive.
    #[serde(default = "default_viewport")]
    pub viewport: BoundingBox,
    #[serde(default)]
    pub surface: SurfaceConfig,
}

fn default_frame_rate() -> u32 { 60 }

// Tampa, FL area
fn default_viewport() -> BoundingBox {
    BoundingBox::new(-82.6, 27.8, -82.3, 28.1)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            particles: ParticleSettings::default(),
            acquisition: AcquisitionSettings::default(),
            viewport: default_viewport(),
            surface: SurfaceConfig::default(),
        }
    }
}

// --- Helper Methods ---

impl SurfaceConfig {
    pub fn get_websocket_options(&self) -> WebSocketOptions {
        if let Some(value) = &self.options {
            if let Ok(options) = serde_json::from_value(value.clone()) {
                return options;
            }
        }
        WebSocketOptions::default()
    }

    pub fn get_file_options(&self) -> FileOptions {
        if let Some(value) = &self.options {
            if let Ok(options) = serde_json::from_value(value.clone()) {
                return options;
            }
        }
        FileOptions::default()
    }
}

// --- Loading Function ---

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.frame_rate == 0 {
        return Err(ConfigError::Validation("frame_rate cannot be zero".to_string()));
    }
    if config.particles.hard_cap == 0 {
        return Err(ConfigError::Validation("particle hard_cap cannot be zero".to_string()));
    }
    if config.particles.publish_every == 0 {
        return Err(ConfigError::Validation("publish_every cannot be zero".to_string()));
    }
    let (low, high) = config.particles.speed_range;
    if low <= 0.0 || low >= high {
        return Err(ConfigError::Validation(format!(
            "speed_range must satisfy 0 < low < high, got [{low}, {high}]"
        )));
    }
    if config.acquisition.sample_spacing_deg <= 0.0 {
        return Err(ConfigError::Validation("sample_spacing_deg must be positive".to_string()));
    }
    if !config.viewport.is_valid() {
        return Err(ConfigError::Validation(
            "viewport must have west < east and south < north".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_valid_config() {
        let content = r#"{
          "frame_rate": 30,
          "particles": { "target_count": 100, "hard_cap": 400 },
          "acquisition": { "debounce_ms": 500 },
          "viewport": { "west": -82.6, "south": 27.8, "east": -82.3, "north": 28.1 },
          "surface": { "type": "file", "options": { "path": "out.jsonl" } }
        }"#;
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.particles.target_count, 100);
        assert_eq!(config.particles.hard_cap, 400);
        // Omitted fields fall back to defaults
        assert_eq!(config.particles.publish_every, 2);
        assert_eq!(config.acquisition.debounce_ms, 500);
        assert_eq!(config.acquisition.minor_road_limit, 500);
        assert_eq!(config.surface.sink_type, SinkType::File);
        assert_eq!(config.surface.get_file_options().path, "out.jsonl");
    }

    #[test]
    fn empty_object_yields_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.frame_rate, 60);
        assert_eq!(config.particles.target_count, 500);
        assert_eq!(config.particles.hard_cap, 2000);
        assert_eq!(config.particles.speed_range, (0.0005, 0.0015));
        assert_eq!(config.acquisition.sample_spacing_deg, 0.0001);
        assert_eq!(config.acquisition.debounce_ms, 1000);
        assert_eq!(config.acquisition.request_timeout_ms, None);
        assert_eq!(config.surface.sink_type, SinkType::WebSocket);
        assert!(config.viewport.is_valid());
    }

    #[test]
    fn zero_frame_rate_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "frame_rate": 0 }}"#).unwrap();
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn inverted_speed_range_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "particles": {{ "speed_range": [0.002, 0.001] }} }}"#).unwrap();
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn inverted_viewport_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "viewport": {{ "west": -82.3, "south": 27.8, "east": -82.6, "north": 28.1 }} }}"#
        )
        .unwrap();
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
