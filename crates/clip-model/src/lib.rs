//! Clipburn Clip Model
//!
//! Defines the data contracts shared by every render stage:
//! - **Captions:** Timed caption text and the clip-relative normalizer
//! - **Layout:** Aspect-ratio canvases and default overlay placement
//! - **Style:** Text style descriptors and colors
//! - **Request:** The render request and response shapes
//!
//! Times are seconds as `f64`. Pixel geometry is in output canvas space.

pub mod caption;
pub mod layout;
pub mod request;
pub mod style;

pub use caption::*;
pub use layout::*;
pub use request::*;
pub use style::*;
