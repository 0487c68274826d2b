//! Canvas layout per aspect ratio.
//!
//! Maps an aspect-ratio tag to canvas dimensions and the default placement
//! of the title, caption, and credit overlays. Unknown tags fall back to the
//! vertical layout.

use serde::{Deserialize, Serialize};

/// Horizontal padding between overlays and the canvas edge, in pixels.
pub const HORIZONTAL_PADDING: u32 = 60;

/// A rectangle in canvas pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// The closed set of supported aspect ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    /// 9:16, short-form vertical video.
    #[default]
    Vertical,
    /// 16:9 widescreen.
    Horizontal,
    /// 1:1.
    Square,
    /// 4:5 portrait.
    Portrait,
    /// 2:3 tall portrait.
    PortraitTall,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Vertical,
        AspectRatio::Horizontal,
        AspectRatio::Square,
        AspectRatio::Portrait,
        AspectRatio::PortraitTall,
    ];

    /// Parse a tag such as `"9:16"` or `"square"`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "9:16" | "vertical" => Some(AspectRatio::Vertical),
            "16:9" | "horizontal" | "landscape" => Some(AspectRatio::Horizontal),
            "1:1" | "square" => Some(AspectRatio::Square),
            "4:5" | "portrait" => Some(AspectRatio::Portrait),
            "2:3" | "portrait_tall" => Some(AspectRatio::PortraitTall),
            _ => None,
        }
    }

    /// Canonical ratio tag.
    pub fn tag(&self) -> &'static str {
        match self {
            AspectRatio::Vertical => "9:16",
            AspectRatio::Horizontal => "16:9",
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "4:5",
            AspectRatio::PortraitTall => "2:3",
        }
    }

    /// Canvas size in pixels.
    pub fn canvas_size(&self) -> (u32, u32) {
        match self {
            AspectRatio::Vertical => (1080, 1920),
            AspectRatio::Horizontal => (1920, 1080),
            AspectRatio::Square => (1080, 1080),
            AspectRatio::Portrait => (1080, 1350),
            AspectRatio::PortraitTall => (1080, 1620),
        }
    }
}

/// Canvas dimensions and default overlay placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub aspect: AspectRatio,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub title_rect: Rect,
    pub caption_rect: Rect,
    pub credit_rect: Rect,
}

/// Caller-supplied placement overrides. Unset fields keep the defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectOverrides {
    pub title: Option<Rect>,
    pub caption: Option<Rect>,
    pub credit: Option<Rect>,
}

/// Resolve the layout for an aspect-ratio tag.
pub fn resolve_layout(tag: &str) -> Layout {
    let aspect = AspectRatio::from_tag(tag).unwrap_or_else(|| {
        tracing::warn!(tag, "Unknown aspect ratio tag, using vertical layout");
        AspectRatio::Vertical
    });
    Layout::for_aspect(aspect)
}

impl Layout {
    /// Default layout for a known aspect ratio.
    pub fn for_aspect(aspect: AspectRatio) -> Self {
        let (canvas_width, canvas_height) = aspect.canvas_size();
        let h = canvas_height as f64;
        let inner_width = canvas_width.saturating_sub(2 * HORIZONTAL_PADDING);
        let x = HORIZONTAL_PADDING as i32;

        let title_height = (h * 0.12).round() as u32;
        let caption_height = (h * 0.20).round() as u32;
        let credit_height = (h * 0.06).round() as u32;

        Self {
            aspect,
            canvas_width,
            canvas_height,
            title_rect: Rect::new(x, (h * 0.08).round() as i32, inner_width, title_height),
            caption_rect: Rect::new(
                x,
                ((canvas_height - caption_height) / 2) as i32,
                inner_width,
                caption_height,
            ),
            credit_rect: Rect::new(x, (h * 0.88).round() as i32, inner_width, credit_height),
        }
    }

    /// Apply explicit placement overrides.
    pub fn with_overrides(mut self, overrides: &RectOverrides) -> Self {
        if let Some(rect) = overrides.title {
            self.title_rect = rect;
        }
        if let Some(rect) = overrides.caption {
            self.caption_rect = rect;
        }
        if let Some(rect) = overrides.credit {
            self.credit_rect = rect;
        }
        self
    }
}
