//! Clipburn Render Engine
//!
//! Turns a render request into a finished clip: text elements are
//! rasterized into a per-render scratch directory, composited over the
//! fitted source video through a typed filter graph, and encoded by an
//! external ffmpeg process.
//!
//! # Composition
//!
//! ```text
//! [0:v] ── scale/fit ──┐
//! color ───────────────┴── base ── +title [1] ── +credit [2]
//!                                                    │
//!                        +caption_0 [3] ... +caption_k-1 [3+k-1]
//!                                                    │
//!                                               final_video
//! [0:a] ── anull ─────────────────────────────── final_audio
//! ```

pub mod assets;
pub mod engine;
pub mod ffmpeg;
pub mod graph;
pub mod pipeline;
pub mod scratch;
pub mod subtitles;

pub use engine::{
    AbortHandle, EngineConfig, EngineInvocation, ProgressCallback, RenderEngine, RenderProgress,
    RenderStage,
};
pub use ffmpeg::FfmpegEngine;
pub use graph::{build_graph, BuiltGraph, GraphError};
pub use pipeline::{render_clip, ClipRenderer, RenderPlan};
