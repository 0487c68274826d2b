//! Render a clip.

use std::path::PathBuf;
use std::sync::Arc;

use clipburn_common::config::AppConfig;
use clipburn_model::request::{RenderRequest, RenderResponse};
use clipburn_raster::FontCache;
use clipburn_render_engine::{
    render_clip, AbortHandle, ClipRenderer, EngineConfig, FfmpegEngine, ProgressCallback,
    RenderProgress,
};

pub async fn run(
    mut config: AppConfig,
    request_path: PathBuf,
    output: Option<PathBuf>,
    debug_report: bool,
    json_progress: bool,
) -> anyhow::Result<()> {
    // Resolve the engine before touching the request so a missing binary
    // is reported immediately.
    let engine = EngineConfig::resolve(&config.engine)?;

    let mut request = RenderRequest::load(&request_path)?;
    if output.is_some() {
        request.output_path = output;
    }
    if debug_report {
        config.render.write_debug_report = true;
    }

    let renderer = Arc::new(ClipRenderer::new(
        config,
        Arc::new(FfmpegEngine::new(engine)),
        Arc::new(FontCache::system()),
    ));

    let progress: ProgressCallback = if json_progress {
        Box::new(|p: RenderProgress| {
            if let Ok(line) = serde_json::to_string(&p) {
                eprintln!("{line}");
            }
        })
    } else {
        Box::new(|p: RenderProgress| {
            eprint!(
                "\r  {:<11} {:>5.1}% (ETA: {:.0}s)  ",
                p.stage.as_str(),
                p.progress * 100.0,
                p.eta_secs,
            );
        })
    };

    let abort = AbortHandle::new();
    let mut task = tokio::spawn(render_clip(
        renderer,
        request,
        Some(progress),
        abort.clone(),
    ));

    let joined = tokio::select! {
        joined = &mut task => joined,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, cancelling render");
            abort.abort();
            task.await
        }
    };
    if !json_progress {
        eprintln!();
    }

    let result = joined.map_err(|e| anyhow::anyhow!("Render task failed: {e}"))?;
    let response = RenderResponse::from(result);
    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}
