//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ClipError, ClipResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where rendered clips are written when a request names no output.
    pub output_dir: PathBuf,

    /// Parent directory for per-render scratch directories (system temp when unset).
    pub scratch_root: Option<PathBuf>,

    /// External media engine settings.
    pub engine: EngineSettings,

    /// Default render parameters.
    pub render: RenderDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Where to find the external media engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Explicit ffmpeg binary. Takes precedence over `CLIPBURN_FFMPEG` and `PATH`.
    pub ffmpeg_path: Option<PathBuf>,
}

/// Default render parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Output video encoder.
    pub video_codec: String,

    /// Encoder speed preset.
    pub preset: String,

    /// Constant rate factor for the video encoder.
    pub crf: u8,

    /// Output audio encoder (used by the final mux only).
    pub audio_codec: String,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,

    /// Forced output frame rate; the source rate is kept when unset.
    pub fps: Option<u32>,

    /// How the source video is fitted into the canvas.
    pub fit: FitMode,

    /// Canvas background color (hex string, for example `#000000`).
    pub background: String,

    /// Shortest clip accepted for rendering, in seconds.
    pub min_clip_secs: f64,

    /// Which caption rendering path is authoritative.
    pub caption_strategy: CaptionStrategy,

    /// Write `<output>.graph.txt` next to each render.
    pub write_debug_report: bool,
}

/// How the source video is fitted into the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Scale to fit inside the canvas; the background shows around it.
    #[default]
    Letterbox,
    /// Scale to cover the canvas and center-crop the overflow.
    Crop,
}

/// Caption rendering path used for a render. Exactly one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionStrategy {
    /// One rasterized image per caption, overlaid with a visibility window.
    #[default]
    Overlay,
    /// Legacy: a generated subtitle file burned in by the engine.
    SubtitleBurn,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "clipburn=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            scratch_root: None,
            engine: EngineSettings::default(),
            render: RenderDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 20,
            audio_codec: "aac".to_string(),
            audio_bitrate_kbps: 192,
            fps: None,
            fit: FitMode::Letterbox,
            background: "#000000".to_string(),
            min_clip_secs: 1.0,
            caption_strategy: CaptionStrategy::Overlay,
            write_debug_report: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Errors are returned, not swallowed.
    pub fn load_from(path: &Path) -> ClipResult<Self> {
        if !path.exists() {
            return Err(ClipError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            ClipError::config(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("clipburn").join("config.json")
}

/// Default output directory.
fn default_output_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("clipburn").join("renders")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "render": { "crf": 18, "fit": "crop" } }"#).unwrap();
        assert_eq!(config.render.crf, 18);
        assert_eq!(config.render.fit, FitMode::Crop);
        assert_eq!(config.render.video_codec, "libx264");
        assert_eq!(config.render.caption_strategy, CaptionStrategy::Overlay);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ClipError::Config { .. })
        ));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            AppConfig::load_from(&missing),
            Err(ClipError::FileNotFound { .. })
        ));
    }
}
