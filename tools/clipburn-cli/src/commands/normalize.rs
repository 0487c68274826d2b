//! Show the resolved layout and normalized captions for a request.

use std::path::PathBuf;

use clipburn_common::config::AppConfig;
use clipburn_common::timecode::format_timestamp;
use clipburn_model::caption::normalize_captions;
use clipburn_model::layout::resolve_layout;
use clipburn_model::request::RenderRequest;

pub fn run(config: AppConfig, request_path: PathBuf) -> anyhow::Result<()> {
    let request = RenderRequest::load(&request_path)?;
    request.validate(config.render.min_clip_secs)?;

    let layout = resolve_layout(&request.aspect_ratio).with_overrides(&request.rects);
    let captions = normalize_captions(
        &request.captions,
        request.start_offset,
        request.clip_duration(),
    );

    let summary = serde_json::json!({
        "clip": {
            "start": format_timestamp(request.start_offset),
            "end": format_timestamp(request.end_offset),
            "duration": request.clip_duration(),
        },
        "layout": layout,
        "captions": captions,
        "dropped": request.captions.len() - captions.len(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
