//! Clipburn Text Rasterizer
//!
//! Renders title, caption, and credit strings into fixed-width RGBA images
//! ready to be composited by the render engine.
//!
//! - **Wrap:** greedy word wrapping against a measured width
//! - **Fonts:** `fontdb` lookup by family, weight and slant, behind a
//!   process-wide, read-mostly cache with generic fallbacks
//! - **Text:** line layout, double-width stroke, and fill

pub mod fonts;
pub mod text;
pub mod wrap;

pub use fonts::{
    FaceMatch, FontCache, FontError, FontHandle, FontQuery, FontResolver, SystemFontResolver,
};
pub use text::TextRasterizer;
pub use wrap::wrap_words;
