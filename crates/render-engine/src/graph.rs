//! Filter graph construction.
//!
//! The graph is an ordered list of typed operation records connected by
//! named pads. It is assembled in a fixed order (scale, background, base
//! composite, title, credit, captions, audio), validated against the input
//! manifest, and serialized once into the engine's textual form.
//!
//! Caption overlay input indices are taken from the manifest at the moment
//! each caption image is appended, so the two can never drift apart.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use clipburn_common::config::FitMode;
use clipburn_common::error::ClipError;
use clipburn_model::style::Rgba;

use crate::assets::RasterAsset;

pub const VIDEO_BASE: &str = "video_base";
pub const BACKGROUND: &str = "bg";
pub const BASE: &str = "base";
pub const WITH_TITLE: &str = "with_title";
pub const WITH_CREDIT: &str = "with_credit";
pub const FINAL_VIDEO: &str = "final_video";
pub const FINAL_AUDIO: &str = "final_audio";

/// Terminal pads handed to the engine's output mapping.
pub const TERMINAL_PADS: [&str; 2] = [FINAL_VIDEO, FINAL_AUDIO];

pub const SOURCE_INPUT: usize = 0;
pub const TITLE_INPUT: usize = 1;
pub const CREDIT_INPUT: usize = 2;
pub const FIRST_CAPTION_INPUT: usize = 3;

/// Graph construction and invariant failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("raster asset missing for {element}")]
    MissingAsset { element: String },

    #[error("caption {caption} has no visibility window")]
    MissingWindow { caption: usize },

    #[error("{overlays} caption overlay nodes but {manifest} caption inputs")]
    CaptionCountMismatch { overlays: usize, manifest: usize },

    #[error("caption overlay {caption} reads input {actual}, expected {expected}")]
    CaptionInputIndex {
        caption: usize,
        expected: usize,
        actual: usize,
    },

    #[error("node {node} references input {index} but only {inputs} inputs exist")]
    UnknownInput {
        node: usize,
        index: usize,
        inputs: usize,
    },

    #[error("node {node} overlays input {index}, which is not a {expected} asset")]
    InputRoleMismatch {
        node: usize,
        index: usize,
        expected: &'static str,
    },

    #[error("pad [{0}] is declared more than once")]
    DuplicatePad(String),

    #[error("pad [{0}] is consumed before it is declared")]
    UndeclaredPad(String),

    #[error("pad [{pad}] is consumed {count} times")]
    PadReuse { pad: String, count: usize },

    #[error("pad [{0}] is declared but never consumed")]
    DanglingPad(String),

    #[error("terminal pad [{0}] is missing")]
    MissingTerminal(&'static str),

    #[error("caption overlays and subtitle burn-in are both present")]
    MixedCaptionStrategies,
}

impl From<GraphError> for ClipError {
    fn from(err: GraphError) -> Self {
        ClipError::graph(err.to_string())
    }
}

/// Visibility window on the output timeline, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// The engine's enable predicate for this window.
    pub fn enable_expr(&self) -> String {
        format!(
            "between(t,{},{})",
            format_secs(self.start),
            format_secs(self.end)
        )
    }
}

/// Stream selector on an engine input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    fn specifier(&self) -> &'static str {
        match self {
            StreamKind::Video => "v",
            StreamKind::Audio => "a",
        }
    }
}

/// An input terminal of a node: either an engine input stream or a pad.
#[derive(Debug, Clone, PartialEq)]
pub enum PadRef {
    Stream { input: usize, kind: StreamKind },
    Pad(String),
}

impl PadRef {
    pub fn video(input: usize) -> Self {
        PadRef::Stream {
            input,
            kind: StreamKind::Video,
        }
    }

    pub fn audio(input: usize) -> Self {
        PadRef::Stream {
            input,
            kind: StreamKind::Audio,
        }
    }

    pub fn pad(name: impl Into<String>) -> Self {
        PadRef::Pad(name.into())
    }

    fn label(&self) -> String {
        match self {
            PadRef::Stream { input, kind } => format!("[{input}:{}]", kind.specifier()),
            PadRef::Pad(name) => format!("[{name}]"),
        }
    }
}

/// What an overlay node composites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayLayer {
    Video,
    Title,
    Credit,
    Caption(usize),
}

impl OverlayLayer {
    fn expected_role(&self) -> Option<(InputRole, &'static str)> {
        match self {
            OverlayLayer::Video => None,
            OverlayLayer::Title => Some((InputRole::Title, "title")),
            OverlayLayer::Credit => Some((InputRole::Credit, "credit")),
            OverlayLayer::Caption(i) => Some((InputRole::Caption(*i), "caption")),
        }
    }
}

/// A single graph operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Fit the source into the presentation size and square the pixels.
    Scale {
        width: u32,
        height: u32,
        fit: FitMode,
    },
    /// Solid color canvas.
    ColorSource {
        color: Rgba,
        width: u32,
        height: u32,
        rate: String,
        duration: f64,
    },
    /// Composite the second input onto the first.
    Overlay {
        layer: OverlayLayer,
        x: String,
        y: String,
        enable: Option<TimeWindow>,
    },
    /// Audio passthrough; encoding happens only at the final mux.
    AudioCopy,
    /// Video rename with no processing.
    Passthrough,
    /// Legacy subtitle-file burn-in.
    SubtitleBurn { path: PathBuf },
}

impl Operation {
    fn filter(&self) -> String {
        match self {
            Operation::Scale { width, height, fit } => match fit {
                FitMode::Letterbox => format!(
                    "scale={width}:{height}:force_original_aspect_ratio=decrease,setsar=1"
                ),
                FitMode::Crop => format!(
                    "scale={width}:{height}:force_original_aspect_ratio=increase,crop={width}:{height},setsar=1"
                ),
            },
            Operation::ColorSource {
                color,
                width,
                height,
                rate,
                duration,
            } => format!(
                "color=c={}:s={width}x{height}:r={rate}:d={}",
                color.to_ffmpeg(),
                format_secs(*duration)
            ),
            Operation::Overlay { x, y, enable, .. } => {
                let mut filter = format!("overlay=x={x}:y={y}");
                if let Some(window) = enable {
                    let _ = write!(filter, ":enable='{}'", window.enable_expr());
                }
                filter
            }
            Operation::AudioCopy => "anull".to_string(),
            Operation::Passthrough => "null".to_string(),
            Operation::SubtitleBurn { path } => {
                format!("subtitles=filename='{}'", escape_filter_path(path))
            }
        }
    }
}

/// One operation with its input terminals and output pad.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub op: Operation,
    pub inputs: Vec<PadRef>,
    pub output: String,
}

impl GraphNode {
    pub fn new(op: Operation, inputs: Vec<PadRef>, output: impl Into<String>) -> Self {
        Self {
            op,
            inputs,
            output: output.into(),
        }
    }

    fn serialize(&self) -> String {
        let inputs: String = self.inputs.iter().map(PadRef::label).collect();
        format!("{inputs}{}[{}]", self.op.filter(), self.output)
    }

    /// Caption index, when this node is a caption overlay.
    pub fn caption_index(&self) -> Option<usize> {
        match self.op {
            Operation::Overlay {
                layer: OverlayLayer::Caption(i),
                ..
            } => Some(i),
            _ => None,
        }
    }
}

/// Role of an engine input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRole {
    SourceVideo,
    Title,
    Credit,
    Caption(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub role: InputRole,
    pub path: PathBuf,
}

/// Ordered engine inputs: `[video, title, credit, caption_0 .. caption_k-1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputManifest {
    entries: Vec<ManifestEntry>,
}

impl InputManifest {
    /// Append an input and return its engine index.
    pub fn push(&mut self, role: InputRole, path: impl Into<PathBuf>) -> usize {
        self.entries.push(ManifestEntry {
            role,
            path: path.into(),
        });
        self.entries.len() - 1
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&ManifestEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn caption_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.role, InputRole::Caption(_)))
            .count()
    }
}

/// Monotonic pad-name allocator.
#[derive(Debug)]
pub struct PadAllocator {
    prefix: &'static str,
    next: usize,
}

impl PadAllocator {
    pub fn new(prefix: &'static str) -> Self {
        Self { prefix, next: 0 }
    }

    pub fn next_pad(&mut self) -> String {
        let name = format!("{}_{}", self.prefix, self.next);
        self.next += 1;
        name
    }
}

/// An ordered, validated list of graph nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    nodes: Vec<GraphNode>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: GraphNode) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Caption overlay nodes in graph order.
    pub fn caption_overlays(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.caption_index().is_some())
    }

    /// The node producing `pad`.
    pub fn producer(&self, pad: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.output == pad)
    }

    /// The engine's textual filter graph description.
    pub fn serialize(&self) -> String {
        self.nodes
            .iter()
            .map(GraphNode::serialize)
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Check the graph against its input manifest.
    ///
    /// Caption overlay count must equal the manifest's caption count, the
    /// i-th caption overlay must read input `3 + i`, every referenced input
    /// must exist with the right role, and the pads must form a chain where
    /// every pad is declared once and consumed once, except the terminals.
    pub fn validate(&self, manifest: &InputManifest) -> Result<(), GraphError> {
        let overlays: Vec<&GraphNode> = self.caption_overlays().collect();
        if overlays.len() != manifest.caption_count() {
            return Err(GraphError::CaptionCountMismatch {
                overlays: overlays.len(),
                manifest: manifest.caption_count(),
            });
        }

        let has_subtitle_burn = self
            .nodes
            .iter()
            .any(|n| matches!(n.op, Operation::SubtitleBurn { .. }));
        if has_subtitle_burn && !overlays.is_empty() {
            return Err(GraphError::MixedCaptionStrategies);
        }

        for (position, node) in overlays.iter().enumerate() {
            let expected = FIRST_CAPTION_INPUT + position;
            let actual = node
                .inputs
                .iter()
                .find_map(|input| match input {
                    PadRef::Stream { input, .. } => Some(*input),
                    PadRef::Pad(_) => None,
                })
                .unwrap_or(usize::MAX);
            if actual != expected || node.caption_index() != Some(position) {
                return Err(GraphError::CaptionInputIndex {
                    caption: position,
                    expected,
                    actual,
                });
            }
        }

        for (node_index, node) in self.nodes.iter().enumerate() {
            for input in &node.inputs {
                let PadRef::Stream { input: index, .. } = input else {
                    continue;
                };
                let Some(entry) = manifest.get(*index) else {
                    return Err(GraphError::UnknownInput {
                        node: node_index,
                        index: *index,
                        inputs: manifest.len(),
                    });
                };
                if let Operation::Overlay { layer, .. } = &node.op {
                    if let Some((role, expected)) = layer.expected_role() {
                        if entry.role != role {
                            return Err(GraphError::InputRoleMismatch {
                                node: node_index,
                                index: *index,
                                expected,
                            });
                        }
                    }
                }
            }
        }

        self.validate_pads()
    }

    fn validate_pads(&self) -> Result<(), GraphError> {
        let mut declared: HashSet<&str> = HashSet::new();
        let mut consumed: HashMap<&str, usize> = HashMap::new();

        for node in &self.nodes {
            for input in &node.inputs {
                if let PadRef::Pad(name) = input {
                    if !declared.contains(name.as_str()) {
                        return Err(GraphError::UndeclaredPad(name.clone()));
                    }
                    *consumed.entry(name.as_str()).or_default() += 1;
                }
            }
            if !declared.insert(node.output.as_str()) {
                return Err(GraphError::DuplicatePad(node.output.clone()));
            }
        }

        for terminal in TERMINAL_PADS {
            if !declared.contains(terminal) {
                return Err(GraphError::MissingTerminal(terminal));
            }
        }

        for pad in declared {
            let count = consumed.get(pad).copied().unwrap_or(0);
            let terminal = TERMINAL_PADS.contains(&pad);
            match (terminal, count) {
                (true, 0) | (false, 1) => {}
                (false, 0) => return Err(GraphError::DanglingPad(pad.to_string())),
                (_, count) => {
                    return Err(GraphError::PadReuse {
                        pad: pad.to_string(),
                        count,
                    })
                }
            }
        }

        Ok(())
    }
}

/// How captions reach the frame for one render. Exactly one applies.
#[derive(Debug, Clone, Copy)]
pub enum CaptionLayer<'a> {
    /// One image overlay per caption, in normalized order.
    Overlays(&'a [RasterAsset]),
    /// Legacy subtitle-file burn-in.
    SubtitleFile(&'a Path),
}

/// Everything the builder composes.
#[derive(Debug, Clone, Copy)]
pub struct CompositionInputs<'a> {
    pub source_video: &'a Path,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub fit: FitMode,
    pub duration: f64,
    pub frame_rate: &'a str,
    pub background: Rgba,
    pub title: Option<&'a RasterAsset>,
    pub credit: Option<&'a RasterAsset>,
    pub captions: CaptionLayer<'a>,
}

/// A validated graph and the manifest it indexes into.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltGraph {
    pub graph: FilterGraph,
    pub manifest: InputManifest,
}

/// Build and validate the composition graph.
pub fn build_graph(inputs: &CompositionInputs<'_>) -> Result<BuiltGraph, GraphError> {
    let title = require_asset(inputs.title, "title")?;
    let credit = require_asset(inputs.credit, "credit")?;

    let mut manifest = InputManifest::default();
    let mut graph = FilterGraph::new();

    let source = manifest.push(InputRole::SourceVideo, inputs.source_video);
    let title_input = manifest.push(InputRole::Title, &title.path);
    let credit_input = manifest.push(InputRole::Credit, &credit.path);

    graph.push(GraphNode::new(
        Operation::Scale {
            width: inputs.canvas_width,
            height: inputs.canvas_height,
            fit: inputs.fit,
        },
        vec![PadRef::video(source)],
        VIDEO_BASE,
    ));
    graph.push(GraphNode::new(
        Operation::ColorSource {
            color: inputs.background,
            width: inputs.canvas_width,
            height: inputs.canvas_height,
            rate: inputs.frame_rate.to_string(),
            duration: inputs.duration,
        },
        Vec::new(),
        BACKGROUND,
    ));
    graph.push(GraphNode::new(
        Operation::Overlay {
            layer: OverlayLayer::Video,
            x: "(W-w)/2".to_string(),
            y: "(H-h)/2".to_string(),
            enable: None,
        },
        vec![PadRef::pad(BACKGROUND), PadRef::pad(VIDEO_BASE)],
        BASE,
    ));
    graph.push(overlay_node(
        OverlayLayer::Title,
        title,
        None,
        BASE,
        title_input,
        WITH_TITLE,
    ));
    graph.push(overlay_node(
        OverlayLayer::Credit,
        credit,
        None,
        WITH_TITLE,
        credit_input,
        WITH_CREDIT,
    ));

    match inputs.captions {
        CaptionLayer::Overlays(captions) if !captions.is_empty() => {
            let mut pads = PadAllocator::new("captioned");
            let mut running = WITH_CREDIT.to_string();
            for (i, asset) in captions.iter().enumerate() {
                let asset = require_asset(Some(asset), &format!("caption {i}"))?;
                let window = asset.window.ok_or(GraphError::MissingWindow { caption: i })?;
                let input = manifest.push(InputRole::Caption(i), &asset.path);
                let output = if i + 1 == captions.len() {
                    FINAL_VIDEO.to_string()
                } else {
                    pads.next_pad()
                };
                graph.push(overlay_node(
                    OverlayLayer::Caption(i),
                    asset,
                    Some(window),
                    &running,
                    input,
                    &output,
                ));
                running = output;
            }
        }
        CaptionLayer::Overlays(_) => {
            graph.push(GraphNode::new(
                Operation::Passthrough,
                vec![PadRef::pad(WITH_CREDIT)],
                FINAL_VIDEO,
            ));
        }
        CaptionLayer::SubtitleFile(path) => {
            if !path.is_file() {
                return Err(GraphError::MissingAsset {
                    element: format!("subtitle file {}", path.display()),
                });
            }
            graph.push(GraphNode::new(
                Operation::SubtitleBurn {
                    path: path.to_path_buf(),
                },
                vec![PadRef::pad(WITH_CREDIT)],
                FINAL_VIDEO,
            ));
        }
    }

    graph.push(GraphNode::new(
        Operation::AudioCopy,
        vec![PadRef::audio(source)],
        FINAL_AUDIO,
    ));

    graph.validate(&manifest)?;

    tracing::info!(
        nodes = graph.len(),
        caption_overlays = graph.caption_overlays().count(),
        inputs = manifest.len(),
        "Filter graph built"
    );

    Ok(BuiltGraph { graph, manifest })
}

fn require_asset<'a>(
    asset: Option<&'a RasterAsset>,
    element: &str,
) -> Result<&'a RasterAsset, GraphError> {
    match asset {
        Some(asset) if asset.path.is_file() => Ok(asset),
        _ => Err(GraphError::MissingAsset {
            element: element.to_string(),
        }),
    }
}

fn overlay_node(
    layer: OverlayLayer,
    asset: &RasterAsset,
    enable: Option<TimeWindow>,
    base: &str,
    input: usize,
    output: &str,
) -> GraphNode {
    GraphNode::new(
        Operation::Overlay {
            layer,
            x: asset.rect.x.to_string(),
            y: asset.rect.y.to_string(),
            enable,
        },
        vec![PadRef::pad(base), PadRef::video(input)],
        output,
    )
}

/// Seconds with at most millisecond precision and no trailing zeros.
pub fn format_secs(secs: f64) -> String {
    let fixed = format!("{:.3}", secs);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Escape a path for use inside a quoted filter argument.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "'\\''")
        .replace(':', "\\:")
}
