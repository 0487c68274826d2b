//! End-to-end clip rendering.
//!
//! ```text
//! request ── validate ── layout ── normalize captions
//!                                        │
//!                     scratch dir ── rasterize title/credit/captions
//!                                        │
//!                           build + validate filter graph
//!                                        │
//!                               engine invocation
//!                                        │
//!                                   output.mp4
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use clipburn_common::config::{AppConfig, CaptionStrategy};
use clipburn_common::error::{ClipError, ClipResult};
use clipburn_model::caption::{normalize_captions, Caption};
use clipburn_model::layout::{resolve_layout, Layout};
use clipburn_model::request::{RenderRequest, RenderResponse};
use clipburn_model::style::Rgba;
use clipburn_raster::{FontCache, TextRasterizer};

use crate::assets::stage_assets;
use crate::engine::{
    AbortHandle, EngineInvocation, ProgressCallback, RenderEngine, RenderProgress, RenderStage,
};
use crate::ffmpeg::{build_invocation, debug_report, debug_report_path, InvocationSettings};
use crate::graph::{build_graph, BuiltGraph, CaptionLayer, CompositionInputs};
use crate::scratch::ScratchDir;
use crate::subtitles::write_srt;

/// Frame rate used when neither config nor the source provides one.
pub const DEFAULT_FRAME_RATE: &str = "30";

/// Everything decided for a render before the engine runs.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub layout: Layout,
    pub captions: Vec<Caption>,
    pub strategy: CaptionStrategy,
    pub built: BuiltGraph,
    pub invocation: EngineInvocation,
}

impl RenderPlan {
    pub fn output_path(&self) -> &Path {
        &self.invocation.output_path
    }
}

/// Renders clips with a fixed configuration, engine, and font cache.
///
/// A renderer is immutable once built and may serve concurrent renders;
/// each render owns its own scratch directory.
pub struct ClipRenderer {
    config: AppConfig,
    engine: Arc<dyn RenderEngine>,
    rasterizer: TextRasterizer,
}

impl std::fmt::Debug for ClipRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipRenderer")
            .field("engine", &self.engine.name())
            .field("rasterizer", &self.rasterizer)
            .finish_non_exhaustive()
    }
}

impl ClipRenderer {
    pub fn new(config: AppConfig, engine: Arc<dyn RenderEngine>, fonts: Arc<FontCache>) -> Self {
        Self {
            config,
            engine,
            rasterizer: TextRasterizer::new(fonts),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Render a clip and return the output path.
    ///
    /// The scratch directory is removed on every exit path.
    pub fn render(
        &self,
        request: &RenderRequest,
        progress: Option<&ProgressCallback>,
        abort: &AbortHandle,
    ) -> ClipResult<PathBuf> {
        let started = Instant::now();
        tracing::info!(
            source = %request.source_video_path.display(),
            start = request.start_offset,
            end = request.end_offset,
            aspect = %request.aspect_ratio,
            captions = request.captions.len(),
            "Starting render"
        );

        let result = self.render_inner(request, progress, abort);
        let elapsed_secs = started.elapsed().as_secs_f64();

        match &result {
            Ok(output) => {
                report(progress, RenderProgress::stage(RenderStage::Complete, 1.0));
                tracing::info!(output = %output.display(), elapsed_secs, "Render complete");
            }
            Err(ClipError::Cancelled) => {
                report(progress, RenderProgress::stage(RenderStage::Failed, 0.0));
                tracing::info!(elapsed_secs, "Render cancelled");
            }
            Err(err) => {
                report(progress, RenderProgress::stage(RenderStage::Failed, 0.0));
                tracing::error!(error = %err, elapsed_secs, "Render failed");
            }
        }

        result
    }

    /// Render and fold the outcome into a response.
    pub fn respond(
        &self,
        request: &RenderRequest,
        progress: Option<&ProgressCallback>,
        abort: &AbortHandle,
    ) -> RenderResponse {
        RenderResponse::from(self.render(request, progress, abort))
    }

    fn render_inner(
        &self,
        request: &RenderRequest,
        progress: Option<&ProgressCallback>,
        abort: &AbortHandle,
    ) -> ClipResult<PathBuf> {
        abort.checkpoint()?;
        report(progress, RenderProgress::stage(RenderStage::Preparing, 0.0));
        request.validate(self.config.render.min_clip_secs)?;

        let scratch = ScratchDir::create(self.config.scratch_root.as_deref())?;
        let plan = self.plan_in(request, scratch.path(), progress)?;
        abort.checkpoint()?;

        if self.config.render.write_debug_report {
            let path = debug_report_path(plan.output_path());
            match std::fs::write(&path, debug_report(&plan.built, &plan.invocation)) {
                Ok(()) => tracing::info!(path = %path.display(), "Wrote graph debug report"),
                Err(err) => tracing::warn!(
                    error = %err,
                    path = %path.display(),
                    "Failed to write graph debug report"
                ),
            }
        }

        if let Some(parent) = plan.output_path().parent() {
            std::fs::create_dir_all(parent)?;
        }

        report(progress, RenderProgress::stage(RenderStage::Rendering, 0.0));
        tracing::info!(engine = self.engine.name(), "Invoking render engine");
        self.engine.run(&plan.invocation, progress, abort)?;

        Ok(plan.invocation.output_path)
    }

    /// Validate a request and prepare everything up to the engine run.
    ///
    /// Raster assets are written into `scratch`, which must outlive any use
    /// of the returned plan.
    pub fn plan(&self, request: &RenderRequest, scratch: &Path) -> ClipResult<RenderPlan> {
        request.validate(self.config.render.min_clip_secs)?;
        self.plan_in(request, scratch, None)
    }

    fn plan_in(
        &self,
        request: &RenderRequest,
        scratch: &Path,
        progress: Option<&ProgressCallback>,
    ) -> ClipResult<RenderPlan> {
        let render = &self.config.render;
        let duration = request.clip_duration();
        let layout = resolve_layout(&request.aspect_ratio).with_overrides(&request.rects);
        let captions = normalize_captions(&request.captions, request.start_offset, duration);
        let strategy = request.caption_strategy.unwrap_or(render.caption_strategy);
        let fit = request.fit.unwrap_or(render.fit);
        let background = self.background(request)?;
        let styles = request.styles.resolve();

        report(progress, RenderProgress::stage(RenderStage::Rasterizing, 0.0));
        let overlay_captions: &[Caption] = match strategy {
            CaptionStrategy::Overlay => &captions,
            CaptionStrategy::SubtitleBurn => &[],
        };
        let assets = stage_assets(
            &self.rasterizer,
            scratch,
            &layout,
            &styles,
            &request.title,
            &request.credit,
            overlay_captions,
        )?;

        let subtitle_path = scratch.join("captions.srt");
        let caption_layer = match strategy {
            CaptionStrategy::Overlay => CaptionLayer::Overlays(&assets.captions),
            CaptionStrategy::SubtitleBurn => {
                write_srt(&captions, &subtitle_path)?;
                CaptionLayer::SubtitleFile(&subtitle_path)
            }
        };

        let frame_rate = match render.fps {
            Some(fps) => fps.to_string(),
            None => self
                .engine
                .probe_frame_rate(&request.source_video_path)
                .unwrap_or_else(|| DEFAULT_FRAME_RATE.to_string()),
        };

        let built = build_graph(&CompositionInputs {
            source_video: &request.source_video_path,
            canvas_width: layout.canvas_width,
            canvas_height: layout.canvas_height,
            fit,
            duration,
            frame_rate: &frame_rate,
            background,
            title: Some(&assets.title),
            credit: Some(&assets.credit),
            captions: caption_layer,
        })?;

        let output_path = self.output_path_for(request, &layout);
        let invocation = build_invocation(
            &built,
            &InvocationSettings {
                start_offset: request.start_offset,
                duration,
                output_path: &output_path,
                render,
            },
        );

        tracing::debug!(
            strategy = ?strategy,
            captions = captions.len(),
            frame_rate = %frame_rate,
            output = %output_path.display(),
            "Render planned"
        );

        Ok(RenderPlan {
            layout,
            captions,
            strategy,
            built,
            invocation,
        })
    }

    fn background(&self, request: &RenderRequest) -> ClipResult<Rgba> {
        if let Some(color) = request.background {
            return Ok(color);
        }
        Rgba::from_str(&self.config.render.background)
            .map_err(|e| ClipError::config(format!("Invalid render.background: {e}")))
    }

    /// Output path named by the request, else derived from the source name,
    /// clip window, and aspect ratio inside the output directory.
    pub fn output_path_for(&self, request: &RenderRequest, layout: &Layout) -> PathBuf {
        if let Some(path) = &request.output_path {
            return path.clone();
        }
        let stem = request
            .source_video_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("clip");
        let millis = |secs: f64| (secs * 1000.0).round() as i64;
        self.config.output_dir.join(format!(
            "{stem}_{}-{}_{}.mp4",
            millis(request.start_offset),
            millis(request.end_offset),
            layout.aspect.tag().replace(':', "x")
        ))
    }
}

fn report(progress: Option<&ProgressCallback>, update: RenderProgress) {
    if let Some(cb) = progress {
        cb(update);
    }
}

/// Run a render on the blocking pool.
pub async fn render_clip(
    renderer: Arc<ClipRenderer>,
    request: RenderRequest,
    progress: Option<ProgressCallback>,
    abort: AbortHandle,
) -> ClipResult<PathBuf> {
    tokio::task::spawn_blocking(move || renderer.render(&request, progress.as_ref(), &abort))
        .await
        .map_err(|e| ClipError::Other(anyhow::anyhow!("Render task failed: {e}")))?
}
