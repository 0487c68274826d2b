//! Render engine abstraction, progress reporting, and cancellation.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use clipburn_common::config::EngineSettings;
use clipburn_common::error::{ClipError, ClipResult};

/// Environment variable naming the ffmpeg binary.
pub const FFMPEG_ENV: &str = "CLIPBURN_FFMPEG";

/// Progress callback for renders.
pub type ProgressCallback = Box<dyn Fn(RenderProgress) + Send + Sync>;

/// Render progress report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: RenderStage,
}

impl RenderProgress {
    pub fn stage(stage: RenderStage, progress: f64) -> Self {
        Self {
            progress,
            eta_secs: 0.0,
            stage,
        }
    }
}

/// Stages of a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStage {
    Preparing,
    Rasterizing,
    Rendering,
    Finalizing,
    Complete,
    Failed,
}

impl RenderStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStage::Preparing => "preparing",
            RenderStage::Rasterizing => "rasterizing",
            RenderStage::Rendering => "rendering",
            RenderStage::Finalizing => "finalizing",
            RenderStage::Complete => "complete",
            RenderStage::Failed => "failed",
        }
    }
}

/// A fully prepared engine run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInvocation {
    /// Arguments after the binary name.
    pub args: Vec<String>,

    /// Output duration used to turn engine timestamps into progress.
    pub expected_duration_secs: f64,

    /// File the engine writes.
    pub output_path: PathBuf,
}

/// Something that can execute an invocation.
pub trait RenderEngine: Send + Sync {
    /// Run to completion, reporting progress and honoring `abort`.
    fn run(
        &self,
        invocation: &EngineInvocation,
        progress: Option<&ProgressCallback>,
        abort: &AbortHandle,
    ) -> ClipResult<()>;

    /// Source frame rate as an engine rate string (`30000/1001`), if known.
    fn probe_frame_rate(&self, _source: &Path) -> Option<String> {
        None
    }

    /// Engine name.
    fn name(&self) -> &str;
}

/// Cancels an in-flight render.
///
/// Clones share state. Aborting before the engine starts makes the render
/// fail with [`ClipError::Cancelled`] at its next checkpoint; aborting while
/// the engine runs kills the engine process.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
    process: Arc<Mutex<Option<Child>>>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        let Ok(mut guard) = self.process.lock() else {
            return;
        };
        if let Some(child) = guard.as_mut() {
            match child.kill() {
                Ok(()) => tracing::info!(pid = child.id(), "Killed engine process"),
                Err(err) => tracing::warn!(error = %err, "Failed to kill engine process"),
            }
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Fail with `Cancelled` if an abort was requested.
    pub fn checkpoint(&self) -> ClipResult<()> {
        if self.is_aborted() {
            Err(ClipError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Hand the running process to the handle so `abort` can kill it.
    pub(crate) fn attach(&self, child: Child) {
        if let Ok(mut guard) = self.process.lock() {
            *guard = Some(child);
        }
        if self.is_aborted() {
            self.abort();
        }
    }

    /// Take the process back once its output is drained.
    pub(crate) fn detach(&self) -> Option<Child> {
        self.process.lock().ok().and_then(|mut guard| guard.take())
    }
}

/// A resolved and verified engine binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: Option<PathBuf>,
    /// First line of `ffmpeg -version`.
    pub version: String,
}

impl EngineConfig {
    /// Resolve the engine from explicit config, then `CLIPBURN_FFMPEG`, then
    /// `PATH`, and verify it runs.
    ///
    /// Called once at startup so a missing engine is reported before any
    /// request is accepted.
    pub fn resolve(settings: &EngineSettings) -> ClipResult<Self> {
        let env = std::env::var_os(FFMPEG_ENV).map(PathBuf::from);
        let (ffmpeg, source) = if let Some(path) = &settings.ffmpeg_path {
            (path.clone(), "config")
        } else if let Some(path) = env {
            (path, FFMPEG_ENV)
        } else {
            let path = which::which("ffmpeg").map_err(|e| {
                ClipError::config(format!(
                    "ffmpeg not found: set engine.ffmpeg_path, {FFMPEG_ENV}, or add it to PATH ({e})"
                ))
            })?;
            (path, "PATH")
        };

        let config = Self::verify(&ffmpeg)?;
        tracing::info!(
            ffmpeg = %config.ffmpeg.display(),
            source,
            version = %config.version,
            "Render engine resolved"
        );
        Ok(config)
    }

    /// Verify a specific binary by running `-version`.
    pub fn verify(ffmpeg: &Path) -> ClipResult<Self> {
        let output = Command::new(ffmpeg)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                ClipError::config(format!("Cannot execute ffmpeg at {}: {e}", ffmpeg.display()))
            })?;

        if !output.status.success() {
            return Err(ClipError::config(format!(
                "{} -version exited with {}",
                ffmpeg.display(),
                output.status
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok(Self {
            ffmpeg: ffmpeg.to_path_buf(),
            ffprobe: sibling_ffprobe(ffmpeg).or_else(|| which::which("ffprobe").ok()),
            version,
        })
    }

    /// Use a binary without verifying it, for dry runs.
    pub fn unchecked(ffmpeg: impl Into<PathBuf>) -> Self {
        let ffmpeg = ffmpeg.into();
        Self {
            ffprobe: sibling_ffprobe(&ffmpeg),
            ffmpeg,
            version: String::new(),
        }
    }
}

fn sibling_ffprobe(ffmpeg: &Path) -> Option<PathBuf> {
    let name = if cfg!(windows) { "ffprobe.exe" } else { "ffprobe" };
    let candidate = ffmpeg.parent()?.join(name);
    candidate.is_file().then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_before_start_is_sticky() {
        let handle = AbortHandle::new();
        let clone = handle.clone();
        assert!(handle.checkpoint().is_ok());
        clone.abort();
        assert!(handle.is_aborted());
        assert!(matches!(handle.checkpoint(), Err(ClipError::Cancelled)));
        assert!(handle.detach().is_none());
    }

    #[test]
    fn test_progress_serializes_for_line_output() {
        let json = serde_json::to_string(&RenderProgress::stage(RenderStage::Rasterizing, 0.0)).unwrap();
        assert_eq!(json, r#"{"progress":0.0,"eta_secs":0.0,"stage":"rasterizing"}"#);
    }

    #[test]
    fn test_verify_rejects_missing_binary() {
        let err = EngineConfig::verify(Path::new("/nonexistent/ffmpeg")).unwrap_err();
        assert!(matches!(err, ClipError::Config { .. }));
    }

    #[test]
    fn test_explicit_path_takes_precedence() {
        let settings = EngineSettings {
            ffmpeg_path: Some(PathBuf::from("/nonexistent/ffmpeg")),
        };
        let err = EngineConfig::resolve(&settings).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ffmpeg"));
    }

    #[test]
    fn test_unchecked_has_no_version() {
        let config = EngineConfig::unchecked("ffmpeg");
        assert_eq!(config.ffmpeg, PathBuf::from("ffmpeg"));
        assert!(config.version.is_empty());
    }
}
