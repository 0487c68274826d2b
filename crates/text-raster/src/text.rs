//! Text rasterization into fixed-width RGBA images.

use std::sync::Arc;

use image::{GrayImage, Rgba as Pixel, RgbaImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use rusttype::{point, Font, Scale};

use clipburn_model::style::{Rgba, StyleDescriptor, TextAlign};

use crate::fonts::FontCache;
use crate::wrap::wrap_words;

/// Vertical padding above the first and below the last line, in pixels.
pub const TEXT_PADDING: u32 = 10;

/// Average glyph advance as a fraction of the font size, used to size
/// images when no font can be loaded at all.
const ESTIMATED_ADVANCE: f32 = 0.55;

/// Renders strings into overlay images.
#[derive(Debug, Clone)]
pub struct TextRasterizer {
    fonts: Arc<FontCache>,
}

impl TextRasterizer {
    pub fn new(fonts: Arc<FontCache>) -> Self {
        Self { fonts }
    }

    /// Render `text` into an image exactly `max_width` pixels wide.
    ///
    /// The height is `lines * line_height + 2 * TEXT_PADDING`, computed after
    /// wrapping. Blank text yields a one-line, fully transparent image. A
    /// missing font never fails the render: the cache falls back to a
    /// generic family, and without any font the image is left transparent.
    pub fn render(&self, text: &str, max_width: u32, style: &StyleDescriptor) -> RgbaImage {
        let font = self.fonts.font_for(style);
        let image = rasterize(text, max_width, style, font.as_deref());
        if font.is_none() && !text.trim().is_empty() {
            tracing::warn!(
                family = %style.font_family,
                "Rendered blank overlay because no font could be loaded"
            );
        }
        image
    }
}

/// Rasterize with an explicit font; `None` produces a correctly sized blank image.
pub fn rasterize(
    text: &str,
    max_width: u32,
    style: &StyleDescriptor,
    font: Option<&Font<'static>>,
) -> RgbaImage {
    let style = &style.clamped();
    let width = max_width.max(1);
    let scale = Scale::uniform(style.font_size.max(1.0));
    let measure = |line: &str| match font {
        Some(font) => line_width(font, scale, line),
        None => line.chars().count() as f32 * style.font_size * ESTIMATED_ADVANCE,
    };

    let mut lines = wrap_words(text, width as f32, measure);
    if lines.is_empty() {
        lines.push(String::new());
    }

    let line_height = style.line_height();
    let height = canvas_height(lines.len(), line_height);
    let mut canvas = RgbaImage::new(width, height);

    let Some(font) = font else {
        return canvas;
    };
    if lines.iter().all(|line| line.is_empty()) {
        return canvas;
    }

    let fill_mask = coverage_mask(font, scale, &lines, width, height, line_height, style.align);

    if style.stroke_width > 0 {
        // A 2w centered stroke under the fill shows w pixels outside the glyph.
        let radius = style.stroke_width.min(u8::MAX as u32) as u8;
        let stroke_mask = dilate(&fill_mask, Norm::L2, radius);
        paint(&mut canvas, &stroke_mask, style.stroke_color);
    }
    paint(&mut canvas, &fill_mask, style.color);

    canvas
}

/// Image height for a number of wrapped lines.
pub fn canvas_height(lines: usize, line_height: f32) -> u32 {
    // Float to int casts saturate, and NaN becomes 0.
    let body = (lines.max(1) as f32 * line_height).ceil() as u32;
    body.saturating_add(2 * TEXT_PADDING)
}

/// Advance width of a laid-out line, kerning included.
pub fn line_width(font: &Font<'_>, scale: Scale, line: &str) -> f32 {
    font.layout(line, scale, point(0.0, 0.0))
        .last()
        .map(|glyph| glyph.position().x + glyph.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0)
}

fn coverage_mask(
    font: &Font<'_>,
    scale: Scale,
    lines: &[String],
    width: u32,
    height: u32,
    line_height: f32,
    align: TextAlign,
) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let v_metrics = font.v_metrics(scale);
    let glyph_height = v_metrics.ascent - v_metrics.descent;

    for (index, line) in lines.iter().enumerate() {
        let line_w = line_width(font, scale, line);
        let x = match align {
            TextAlign::Left => 0.0,
            TextAlign::Center => (width as f32 - line_w) / 2.0,
            TextAlign::Right => width as f32 - line_w,
        }
        .max(0.0);
        let slot_top = TEXT_PADDING as f32 + index as f32 * line_height;
        let baseline = slot_top + (line_height - glyph_height) / 2.0 + v_metrics.ascent;

        for glyph in font.layout(line, scale, point(x, baseline)) {
            let Some(bounds) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let px = bounds.min.x + gx as i32;
                let py = bounds.min.y + gy as i32;
                if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                    return;
                }
                let value = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
                let pixel = mask.get_pixel_mut(px as u32, py as u32);
                pixel.0[0] = pixel.0[0].max(value);
            });
        }
    }

    mask
}

/// Composite `color` over the canvas wherever the mask has coverage.
fn paint(canvas: &mut RgbaImage, mask: &GrayImage, color: Rgba) {
    for (x, y, coverage) in mask.enumerate_pixels() {
        let coverage = coverage.0[0];
        if coverage == 0 {
            continue;
        }
        let dst = canvas.get_pixel_mut(x, y);
        *dst = blend_over(*dst, color, coverage as f32 / 255.0);
    }
}

/// Straight-alpha "over" compositing of `color` at `coverage` onto `dst`.
fn blend_over(dst: Pixel<u8>, color: Rgba, coverage: f32) -> Pixel<u8> {
    let src_a = color.0[3] as f32 / 255.0 * coverage;
    let dst_a = dst.0[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return Pixel([0, 0, 0, 0]);
    }

    let mut out = [0u8; 4];
    for channel in 0..3 {
        let src = color.0[channel] as f32;
        let dst_c = dst.0[channel] as f32;
        let value = (src * src_a + dst_c * dst_a * (1.0 - src_a)) / out_a;
        out[channel] = value.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Pixel(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::{FontError, FontHandle, FontQuery, FontResolver, SystemFontResolver};
    use clipburn_model::style::{FontSlant, FontWeight, MAX_FONT_SIZE};

    struct NoFonts;

    impl FontResolver for NoFonts {
        fn resolve(&self, query: &FontQuery) -> Result<FontHandle, FontError> {
            Err(FontError::NotFound {
                family: query.family.clone(),
            })
        }
    }

    fn fontless() -> TextRasterizer {
        TextRasterizer::new(Arc::new(FontCache::with_fallbacks(
            Box::new(NoFonts),
            Vec::new(),
        )))
    }

    fn style(font_size: f32) -> StyleDescriptor {
        StyleDescriptor {
            font_size,
            ..StyleDescriptor::caption_default()
        }
    }

    fn fully_transparent(image: &RgbaImage) -> bool {
        image.pixels().all(|p| p.0[3] == 0)
    }

    #[test]
    fn test_blank_text_yields_one_transparent_line() {
        let image = fontless().render("   ", 960, &style(50.0));
        assert_eq!(image.width(), 960);
        assert_eq!(image.height(), 60 + 2 * TEXT_PADDING);
        assert!(fully_transparent(&image));
    }

    #[test]
    fn test_height_follows_wrapped_line_count() {
        // Estimated advance: 10 chars * 20px * 0.55 = 110px per 10-char word.
        let image = fontless().render("aaaaaaaaaa bbbbbbbbbb cccccccccc", 240, &style(20.0));
        assert_eq!(image.width(), 240);
        assert_eq!(image.height(), canvas_height(2, 24.0));
        assert_eq!(image.height(), 48 + 2 * TEXT_PADDING);
    }

    #[test]
    fn test_missing_font_never_panics_and_stays_transparent() {
        let image = fontless().render("visible caption", 500, &style(64.0));
        assert!(fully_transparent(&image));
        assert_eq!(image.height(), canvas_height(1, 64.0 * 1.2));
    }

    #[test]
    fn test_zero_width_is_clamped() {
        let image = fontless().render("", 0, &style(10.0));
        assert_eq!(image.width(), 1);
    }

    #[test]
    fn test_blend_over_transparent_takes_source() {
        let out = blend_over(Pixel([0, 0, 0, 0]), Rgba([255, 255, 0, 255]), 1.0);
        assert_eq!(out, Pixel([255, 255, 0, 255]));
    }

    #[test]
    fn test_blend_over_half_coverage_mixes() {
        let out = blend_over(Pixel([0, 0, 0, 255]), Rgba::WHITE, 0.5);
        assert_eq!(out.0[3], 255);
        assert!((out.0[0] as i32 - 128).abs() <= 1);
    }

    #[test]
    fn test_canvas_height_formula() {
        assert_eq!(canvas_height(0, 24.0), 24 + 2 * TEXT_PADDING);
        assert_eq!(canvas_height(3, 76.8), 231 + 2 * TEXT_PADDING);
    }

    #[test]
    fn test_canvas_height_saturates() {
        assert_eq!(canvas_height(usize::MAX, 1e30), u32::MAX);
        assert_eq!(canvas_height(1, f32::NAN), 2 * TEXT_PADDING);
    }

    #[test]
    fn test_oversized_font_is_clamped_before_allocating() {
        let image = fontless().render("x", 960, &style(1e9));
        assert_eq!(image.height(), canvas_height(1, MAX_FONT_SIZE * 1.2));
    }

    const DEJAVU_DIR: &str = "/usr/share/fonts/truetype/dejavu";

    fn dejavu_sans() -> Option<FontHandle> {
        if !std::path::Path::new(DEJAVU_DIR).join("DejaVuSans.ttf").is_file() {
            eprintln!("skipping: DejaVu Sans is not installed in {DEJAVU_DIR}");
            return None;
        }
        SystemFontResolver::with_dirs(&[DEJAVU_DIR])
            .resolve(&FontQuery::new("DejaVu Sans", FontWeight::Normal, FontSlant::Normal))
            .ok()
    }

    fn plain(align: TextAlign, stroke_width: u32) -> StyleDescriptor {
        StyleDescriptor {
            font_size: 50.0,
            color: Rgba::WHITE,
            stroke_width,
            stroke_color: Rgba([255, 0, 0, 255]),
            align,
            ..StyleDescriptor::caption_default()
        }
    }

    /// Columns and rows holding any visible pixel: (min_x, max_x, min_y, max_y).
    fn ink_extent(image: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
        image
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[3] > 0)
            .fold(None, |acc, (x, y, _)| match acc {
                None => Some((x, x, y, y)),
                Some((x0, x1, y0, y1)) => Some((x0.min(x), x1.max(x), y0.min(y), y1.max(y))),
            })
    }

    #[test]
    fn test_glyphs_are_drawn_with_fill_color() {
        let Some(font) = dejavu_sans() else { return };
        let image = rasterize("Hello", 400, &plain(TextAlign::Center, 0), Some(&font));
        assert!(!fully_transparent(&image));
        assert!(image.pixels().any(|p| *p == Pixel([255, 255, 255, 255])));
    }

    #[test]
    fn test_stroke_extends_stroke_width_outside_glyph() {
        let Some(font) = dejavu_sans() else { return };
        for stroke_width in [1, 3, 6] {
            let bare = rasterize("I", 300, &plain(TextAlign::Center, 0), Some(&font));
            let stroked = rasterize("I", 300, &plain(TextAlign::Center, stroke_width), Some(&font));
            let (bx0, bx1, by0, by1) = ink_extent(&bare).unwrap();
            let (sx0, sx1, sy0, sy1) = ink_extent(&stroked).unwrap();
            assert_eq!(bx0 - sx0, stroke_width, "left outset");
            assert_eq!(sx1 - bx1, stroke_width, "right outset");
            assert_eq!(by0 - sy0, stroke_width, "top outset");
            assert_eq!(sy1 - by1, stroke_width, "bottom outset");
        }
    }

    #[test]
    fn test_fill_is_painted_over_stroke() {
        let Some(font) = dejavu_sans() else { return };
        let bare = rasterize("I", 300, &plain(TextAlign::Center, 0), Some(&font));
        let stroked = rasterize("I", 300, &plain(TextAlign::Center, 4), Some(&font));
        let (x0, x1, y0, y1) = ink_extent(&bare).unwrap();
        let mid_y = (y0 + y1) / 2;

        // Stem center: fully covered by the fill, so the stroke is hidden.
        let center = stroked.get_pixel((x0 + x1) / 2, mid_y);
        assert_eq!(*center, Pixel([255, 255, 255, 255]));

        // Just outside the stem only the stroke shows.
        let outside = stroked.get_pixel(x0 - 2, mid_y);
        assert!(outside.0[3] > 0);
        assert_eq!(&outside.0[..3], &[255, 0, 0]);
    }

    #[test]
    fn test_alignment_anchors_single_line() {
        let Some(font) = dejavu_sans() else { return };
        let width = 600;
        let extent = |align| {
            ink_extent(&rasterize("Hello", width, &plain(align, 0), Some(&font))).unwrap()
        };

        let (left_x0, left_x1, _, _) = extent(TextAlign::Left);
        let (center_x0, center_x1, _, _) = extent(TextAlign::Center);
        let (right_x0, right_x1, _, _) = extent(TextAlign::Right);

        // Same line width everywhere, only the anchor moves (subpixel offsets
        // can widen the antialiased edge by one pixel).
        let ink = left_x1 - left_x0;
        assert!((center_x1 - center_x0).abs_diff(ink) <= 1);
        assert!((right_x1 - right_x0).abs_diff(ink) <= 1);

        // Side bearings keep the ink a few pixels off the anchor.
        assert!(left_x0 <= 8, "left ink starts at {left_x0}");
        assert!(right_x1 >= width - 9, "right ink ends at {right_x1}");
        let left_margin = center_x0 as i64;
        let right_margin = (width - 1 - center_x1) as i64;
        assert!((left_margin - right_margin).abs() <= 8);
    }

    #[test]
    fn test_lines_are_centered_in_their_slots() {
        let Some(font) = dejavu_sans() else { return };
        let style = plain(TextAlign::Left, 0);
        let line_height = style.line_height();

        let one = rasterize("Hg", 600, &style, Some(&font));
        let (_, _, y0, y1) = ink_extent(&one).unwrap();
        let slot_top = TEXT_PADDING as f32;
        assert!(y0 as f32 >= slot_top);
        assert!(y1 as f32 <= slot_top + line_height);

        // "Hg" and its first word on a second line: ink repeats one line height lower.
        let scale = Scale::uniform(style.font_size);
        let narrow = line_width(&font, scale, "Hg Hg").ceil() as u32 - 1;
        let two = rasterize("Hg Hg", narrow, &style, Some(&font));
        assert_eq!(two.height(), canvas_height(2, line_height));
        let second_top = two
            .enumerate_pixels()
            .filter(|(_, y, p)| p.0[3] > 0 && *y as f32 >= slot_top + line_height)
            .map(|(_, y, _)| y)
            .min()
            .unwrap();
        assert!((second_top as f32 - (y0 as f32 + line_height)).abs() <= 1.0);
    }
}
