//! ffmpeg invocation.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use clipburn_common::config::RenderDefaults;
use clipburn_common::error::{ClipError, ClipResult};

use crate::engine::{
    AbortHandle, EngineConfig, EngineInvocation, ProgressCallback, RenderEngine, RenderProgress,
    RenderStage,
};
use crate::graph::{format_secs, BuiltGraph, InputRole, FINAL_AUDIO, FINAL_VIDEO};

/// Keep at most this much engine diagnostic output in errors.
const MAX_DIAGNOSTIC_BYTES: usize = 16 * 1024;

/// Clip window and output for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct InvocationSettings<'a> {
    pub start_offset: f64,
    pub duration: f64,
    pub output_path: &'a Path,
    pub render: &'a RenderDefaults,
}

/// Assemble the full argument list for a validated graph.
///
/// Inputs are emitted in manifest order. Only the source video is seeked and
/// trimmed; still images are single-frame inputs that the overlay filter
/// repeats for the rest of the timeline.
pub fn build_invocation(built: &BuiltGraph, settings: &InvocationSettings<'_>) -> EngineInvocation {
    let mut args: Vec<String> = [
        "-y",
        "-hide_banner",
        "-nostdin",
        "-loglevel",
        "error",
        "-nostats",
        "-progress",
        "pipe:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    for entry in built.manifest.entries() {
        if entry.role == InputRole::SourceVideo {
            args.extend([
                "-ss".to_string(),
                format_secs(settings.start_offset),
                "-t".to_string(),
                format_secs(settings.duration),
            ]);
        }
        args.push("-i".to_string());
        args.push(entry.path.to_string_lossy().into_owned());
    }

    args.push("-filter_complex".to_string());
    args.push(built.graph.serialize());
    args.extend([
        "-map".to_string(),
        format!("[{FINAL_VIDEO}]"),
        "-map".to_string(),
        format!("[{FINAL_AUDIO}]"),
    ]);

    if let Some(fps) = settings.render.fps {
        args.push("-r".to_string());
        args.push(fps.to_string());
    }
    args.extend(codec_args(settings.render));
    args.push("-t".to_string());
    args.push(format_secs(settings.duration));
    args.push(settings.output_path.to_string_lossy().into_owned());

    EngineInvocation {
        args,
        expected_duration_secs: settings.duration,
        output_path: settings.output_path.to_path_buf(),
    }
}

/// Encoder directives applied at the final mux.
pub fn codec_args(render: &RenderDefaults) -> Vec<String> {
    vec![
        "-c:v".to_string(),
        render.video_codec.clone(),
        "-preset".to_string(),
        render.preset.clone(),
        "-crf".to_string(),
        render.crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        render.audio_codec.clone(),
        "-b:a".to_string(),
        format!("{}k", render.audio_bitrate_kbps.max(32)),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]
}

/// Runs invocations through an ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    config: EngineConfig,
}

impl FfmpegEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl RenderEngine for FfmpegEngine {
    fn run(
        &self,
        invocation: &EngineInvocation,
        progress: Option<&ProgressCallback>,
        abort: &AbortHandle,
    ) -> ClipResult<()> {
        abort.checkpoint()?;
        tracing::debug!(args = ?invocation.args, "Running ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ClipError::engine(format!("Failed to start ffmpeg: {e}"), ""))?;

        let started = Instant::now();
        tracing::info!(
            pid = child.id(),
            output = %invocation.output_path.display(),
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClipError::engine("Failed to capture ffmpeg stdout", ""))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ClipError::engine("Failed to capture ffmpeg stderr", ""))?;
        abort.attach(child);

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut output = String::new();
            match BufReader::new(stderr).read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let read_result = read_progress(stdout, invocation, progress, started);

        let status = match abort.detach() {
            Some(mut child) => child
                .wait()
                .map_err(|e| ClipError::engine(format!("Failed to wait on ffmpeg: {e}"), "")),
            None => Err(ClipError::engine("ffmpeg process handle was lost", "")),
        };
        let diagnostics = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if abort.is_aborted() {
            tracing::warn!(
                elapsed_secs = started.elapsed().as_secs_f64(),
                "ffmpeg render cancelled"
            );
            return Err(ClipError::Cancelled);
        }

        read_result?;
        let status = status?;
        if !status.success() {
            let diagnostics = truncate_diagnostics(diagnostics.trim());
            tracing::error!(%status, diagnostics = %diagnostics, "ffmpeg render failed");
            return Err(ClipError::engine(
                format!("ffmpeg exited with {status}"),
                diagnostics,
            ));
        }

        if let Some(cb) = progress {
            cb(RenderProgress::stage(RenderStage::Finalizing, 1.0));
        }
        tracing::info!(
            elapsed_secs = started.elapsed().as_secs_f64(),
            output = %invocation.output_path.display(),
            "ffmpeg render finished"
        );
        Ok(())
    }

    fn probe_frame_rate(&self, source: &Path) -> Option<String> {
        let ffprobe = self.config.ffprobe.as_ref()?;
        probe_frame_rate(ffprobe, source)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

fn read_progress(
    stdout: impl Read,
    invocation: &EngineInvocation,
    progress: Option<&ProgressCallback>,
    started: Instant,
) -> ClipResult<()> {
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();
    let mut state = ProgressState::default();
    let mut last_progress_secs = 0.0f64;
    let mut last_progress_wall = Instant::now();

    loop {
        line.clear();
        let bytes = reader
            .read_line(&mut line)
            .map_err(|e| ClipError::engine(format!("Failed reading ffmpeg progress: {e}"), ""))?;
        if bytes == 0 {
            return Ok(());
        }

        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        state.update(key, value);
        if key != "progress" {
            continue;
        }

        if state.out_time_secs > last_progress_secs + 0.001 {
            last_progress_secs = state.out_time_secs;
            last_progress_wall = Instant::now();
        } else if last_progress_wall.elapsed().as_secs() >= 10 {
            tracing::warn!(
                out_time_secs = state.out_time_secs,
                elapsed_secs = started.elapsed().as_secs_f64(),
                "No ffmpeg progress advancement for 10s"
            );
            last_progress_wall = Instant::now();
        }

        if let Some(cb) = progress {
            cb(progress_report(
                &state,
                invocation.expected_duration_secs,
                started.elapsed().as_secs_f64(),
            ));
        }
    }
}

/// Read the first video stream's frame rate with ffprobe.
pub fn probe_frame_rate(ffprobe: &Path, source: &Path) -> Option<String> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=r_frame_rate",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(source)
        .stdin(Stdio::null())
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let raw = String::from_utf8(output.stdout).ok()?;
    parse_frame_rate(raw.lines().next()?)
}

/// Accept `num/den` or plain numeric rates; reject zero and garbage.
fn parse_frame_rate(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let value = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then(|| raw.to_string())
}

fn truncate_diagnostics(text: &str) -> String {
    if text.len() <= MAX_DIAGNOSTIC_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - MAX_DIAGNOSTIC_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

/// Path of the graph debug report written next to an output.
pub fn debug_report_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".graph.txt");
    output.with_file_name(name)
}

/// Human-readable dump of an invocation.
pub fn debug_report(built: &BuiltGraph, invocation: &EngineInvocation) -> String {
    let mut report = String::new();
    report.push_str("# inputs\n");
    for (index, entry) in built.manifest.entries().iter().enumerate() {
        report.push_str(&format!("{index}: {:?} {}\n", entry.role, entry.path.display()));
    }
    report.push_str("\n# filter graph\n");
    for node in built.graph.nodes() {
        report.push_str(&format!("{:?} -> [{}]\n", node.op, node.output));
    }
    report.push_str("\n# filter_complex\n");
    report.push_str(&built.graph.serialize().replace(';', ";\n"));
    report.push_str("\n\n# args\n");
    report.push_str(&invocation.args.join(" "));
    report.push('\n');
    report
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both keys.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }
}

fn progress_report(
    state: &ProgressState,
    expected_duration_secs: f64,
    elapsed_secs: f64,
) -> RenderProgress {
    let progress = if expected_duration_secs <= 0.0 {
        0.0
    } else {
        (state.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    };

    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    RenderProgress {
        progress: if state.complete { 1.0 } else { progress },
        eta_secs,
        stage: if state.complete {
            RenderStage::Finalizing
        } else {
            RenderStage::Rendering
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FilterGraph, GraphNode, InputManifest, Operation, PadRef};

    fn passthrough_graph() -> BuiltGraph {
        let mut manifest = InputManifest::default();
        manifest.push(InputRole::SourceVideo, "/media/source.mp4");
        manifest.push(InputRole::Title, "/scratch/title.png");
        manifest.push(InputRole::Credit, "/scratch/credit.png");
        let mut graph = FilterGraph::new();
        graph.push(GraphNode::new(
            Operation::Passthrough,
            vec![PadRef::video(0)],
            FINAL_VIDEO,
        ));
        graph.push(GraphNode::new(
            Operation::AudioCopy,
            vec![PadRef::audio(0)],
            FINAL_AUDIO,
        ));
        BuiltGraph { graph, manifest }
    }

    #[test]
    fn test_progress_state_parses_time_keys() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "2500000");
        assert!((state.out_time_secs - 2.5).abs() < 1e-9);
        state.update("out_time_ms", "5000000");
        assert!((state.out_time_secs - 5.0).abs() < 1e-9);
        state.update("out_time_ms", "N/A");
        assert!((state.out_time_secs - 5.0).abs() < 1e-9);
        state.update("progress", "end");
        assert!(state.complete);
    }

    #[test]
    fn test_progress_report_clamps_and_estimates() {
        let state = ProgressState {
            out_time_secs: 5.0,
            complete: false,
        };
        let report = progress_report(&state, 10.0, 4.0);
        assert!((report.progress - 0.5).abs() < 1e-9);
        assert!((report.eta_secs - 4.0).abs() < 1e-9);
        assert_eq!(report.stage, RenderStage::Rendering);

        let over = ProgressState {
            out_time_secs: 20.0,
            complete: true,
        };
        let report = progress_report(&over, 10.0, 4.0);
        assert_eq!(report.progress, 1.0);
        assert_eq!(report.stage, RenderStage::Finalizing);
    }

    #[test]
    fn test_invocation_orders_inputs_and_trims_source_only() {
        let render = RenderDefaults::default();
        let invocation = build_invocation(
            &passthrough_graph(),
            &InvocationSettings {
                start_offset: 12.0,
                duration: 10.5,
                output_path: Path::new("/out/clip.mp4"),
                render: &render,
            },
        );
        let args = invocation.args.join(" ");
        assert!(args.contains("-ss 12 -t 10.5 -i /media/source.mp4 -i /scratch/title.png -i /scratch/credit.png"));
        assert!(args.contains("-map [final_video] -map [final_audio]"));
        assert!(args.contains("-c:v libx264 -preset medium -crf 20 -pix_fmt yuv420p"));
        assert!(args.contains("-c:a aac -b:a 192k -movflags +faststart"));
        assert!(args.ends_with("-t 10.5 /out/clip.mp4"));
        assert_eq!(invocation.args.iter().filter(|a| *a == "-ss").count(), 1);
        assert_eq!(invocation.expected_duration_secs, 10.5);
    }

    #[test]
    fn test_forced_fps_is_passed() {
        let render = RenderDefaults {
            fps: Some(30),
            ..RenderDefaults::default()
        };
        let invocation = build_invocation(
            &passthrough_graph(),
            &InvocationSettings {
                start_offset: 0.0,
                duration: 5.0,
                output_path: Path::new("/out/clip.mp4"),
                render: &render,
            },
        );
        assert!(invocation.args.join(" ").contains("-r 30 -c:v"));
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30000/1001\n"), Some("30000/1001".to_string()));
        assert_eq!(parse_frame_rate("25"), Some("25".to_string()));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("garbage"), None);
    }

    #[test]
    fn test_debug_report_path_keeps_extension() {
        assert_eq!(
            debug_report_path(Path::new("/out/clip.mp4")),
            PathBuf::from("/out/clip.mp4.graph.txt")
        );
    }

    #[test]
    fn test_truncate_diagnostics_keeps_tail() {
        let long = "x".repeat(MAX_DIAGNOSTIC_BYTES + 10) + "END";
        let truncated = truncate_diagnostics(&long);
        assert!(truncated.starts_with("..."));
        assert!(truncated.ends_with("END"));
    }
}
