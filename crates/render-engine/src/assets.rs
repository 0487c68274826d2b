//! Raster asset staging.
//!
//! Title, credit, and caption strings are rasterized to PNG files inside the
//! render's scratch directory. Each image is exactly as wide as its target
//! rectangle, so overlay placement needs no further scaling.

use std::path::{Path, PathBuf};

use clipburn_common::error::{ClipError, ClipResult};
use clipburn_model::caption::Caption;
use clipburn_model::layout::{Layout, Rect};
use clipburn_model::request::ResolvedStyles;
use clipburn_model::style::StyleDescriptor;
use clipburn_raster::TextRasterizer;

use crate::graph::TimeWindow;

/// A rendered text image on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterAsset {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Placement on the canvas; the image's top-left lands at `rect.x, rect.y`.
    pub rect: Rect,
    /// Visibility window for captions. Title and credit are always visible.
    pub window: Option<TimeWindow>,
}

/// Every image a render needs, in manifest order.
#[derive(Debug, Clone)]
pub struct StagedAssets {
    pub title: RasterAsset,
    pub credit: RasterAsset,
    pub captions: Vec<RasterAsset>,
}

/// Rasterize all text elements into `dir`.
///
/// Captions must already be normalized: their windows are used as-is.
/// Pass an empty caption slice when captions are burned in from a subtitle
/// file instead.
pub fn stage_assets(
    rasterizer: &TextRasterizer,
    dir: &Path,
    layout: &Layout,
    styles: &ResolvedStyles,
    title: &str,
    credit: &str,
    captions: &[Caption],
) -> ClipResult<StagedAssets> {
    let title = stage_one(
        rasterizer,
        &dir.join("title.png"),
        title,
        |_| layout.title_rect,
        &styles.title,
        None,
    )?;
    let credit = stage_one(
        rasterizer,
        &dir.join("credit.png"),
        credit,
        |_| layout.credit_rect,
        &styles.credit,
        None,
    )?;

    let captions = captions
        .iter()
        .enumerate()
        .map(|(i, caption)| {
            stage_one(
                rasterizer,
                &dir.join(format!("caption_{i:03}.png")),
                &caption.text,
                |height| caption_rect(layout.caption_rect, height),
                &styles.caption,
                Some(TimeWindow::new(caption.start, caption.end)),
            )
        })
        .collect::<ClipResult<Vec<_>>>()?;

    tracing::info!(
        dir = %dir.display(),
        captions = captions.len(),
        "Raster assets staged"
    );

    Ok(StagedAssets {
        title,
        credit,
        captions,
    })
}

fn stage_one(
    rasterizer: &TextRasterizer,
    path: &Path,
    text: &str,
    place: impl Fn(u32) -> Rect,
    style: &StyleDescriptor,
    window: Option<TimeWindow>,
) -> ClipResult<RasterAsset> {
    let width = place(0).width;
    let image = rasterizer.render(text, width, style);
    let rect = place(image.height());
    image.save(path).map_err(|e| {
        ClipError::asset(format!("Failed to write {}: {e}", path.display()))
    })?;

    tracing::debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "Wrote raster asset"
    );

    Ok(RasterAsset {
        path: path.to_path_buf(),
        width: image.width(),
        height: image.height(),
        rect,
        window,
    })
}

/// Center a caption image of `height` vertically inside the caption band.
///
/// Images taller than the band are anchored at the band's top.
pub fn caption_rect(band: Rect, height: u32) -> Rect {
    let slack = band.height.saturating_sub(height) as i32;
    Rect::new(band.x, band.y + slack / 2, band.width, height)
}
