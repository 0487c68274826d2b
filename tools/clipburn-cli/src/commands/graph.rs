//! Dry run: build everything up to the engine invocation and print it.

use std::path::PathBuf;
use std::sync::Arc;

use clipburn_common::config::AppConfig;
use clipburn_model::request::RenderRequest;
use clipburn_raster::FontCache;
use clipburn_render_engine::ffmpeg::debug_report;
use clipburn_render_engine::scratch::ScratchDir;
use clipburn_render_engine::{ClipRenderer, EngineConfig, FfmpegEngine};

pub fn run(config: AppConfig, request_path: PathBuf) -> anyhow::Result<()> {
    let request = RenderRequest::load(&request_path)?;

    // A dry run works without ffmpeg; probing just falls back to defaults.
    let engine = EngineConfig::resolve(&config.engine).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Engine unavailable, planning without it");
        EngineConfig::unchecked("ffmpeg")
    });

    let scratch = ScratchDir::create(config.scratch_root.as_deref())?;
    let renderer = ClipRenderer::new(
        config,
        Arc::new(FfmpegEngine::new(engine)),
        Arc::new(FontCache::system()),
    );
    let plan = renderer.plan(&request, scratch.path())?;

    println!(
        "Layout: {} ({}x{}), {} captions, strategy {:?}",
        plan.layout.aspect.tag(),
        plan.layout.canvas_width,
        plan.layout.canvas_height,
        plan.captions.len(),
        plan.strategy
    );
    println!("Output: {}", plan.output_path().display());
    println!();
    print!("{}", debug_report(&plan.built, &plan.invocation));

    Ok(())
}
