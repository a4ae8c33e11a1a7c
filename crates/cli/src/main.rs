use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;

use fancam_core::capture::domain::frame_source::{CaptureError, FrameSource};
use fancam_core::capture::infrastructure::image_sequence_source::ImageSequenceSource;
use fancam_core::detection::domain::operation_mode::OperationMode;
use fancam_core::pipeline::tracker_config::{ThrottleSettings, TrackerConfig};
use fancam_core::pipeline::tracking_session::{RefreshTimer, TrackingSession};
use fancam_core::pipeline::vertex_overlay::draw_vertex_markers;
use fancam_core::shared::frame::Frame;
use fancam_core::tracking::domain::vertex_buffer::VertexSnapshot;

/// Feature tracking over a sequence of images played back as a camera feed.
#[derive(Parser)]
#[command(name = "fancam-track")]
struct Cli {
    /// Image files or directories of images, played in order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Tracker config file (default: platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Detection mode: edges, faces or eyes.
    #[arg(long)]
    mode: Option<OperationMode>,

    /// Maximum vertices per cycle.
    #[arg(long)]
    max_vertices: Option<usize>,

    /// Directory searched first for cascade files.
    #[arg(long)]
    cascade_dir: Option<PathBuf>,

    /// Host refresh rate in frames per second.
    #[arg(long)]
    refresh_rate: Option<f32>,

    /// Number of frames to feed before stopping (default: one pass over the inputs).
    #[arg(long)]
    ticks: Option<usize>,

    /// Switch to the next mode every N frames (0 = never).
    #[arg(long, default_value = "0")]
    cycle_modes_every: usize,

    /// Resize frames to WIDTHxHEIGHT before tracking.
    #[arg(long, value_parser = parse_size)]
    resize: Option<(u32, u32)>,

    /// Disable worker pacing.
    #[arg(long)]
    unthrottled: bool,

    /// Write the last frame with vertex markers to this image file.
    #[arg(long)]
    annotate: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let looping = cli.ticks.is_some();
    let mut source = ImageSequenceSource::from_inputs(&cli.inputs)?
        .looping(looping)
        .resized(cli.resize);
    let max_ticks = cli.ticks.unwrap_or(source.len());

    let first = source.next_frame()?.ok_or(CaptureError::NoInput)?;
    let mut last_frame = first.clone();

    let mut session = TrackingSession::new(config)?;
    session.start(first)?;

    let period = RefreshTimer::new(session.config().refresh_rate).period();
    let mut fed = 1;
    let mut last_snapshot: Option<VertexSnapshot> = None;
    let mut previous = Instant::now();

    while session.is_stream_active() && fed < max_ticks {
        thread::sleep(period.saturating_sub(previous.elapsed()));
        let now = Instant::now();
        let delta = now - previous;
        previous = now;

        let mut capture_error = None;
        let mut pulled = None;
        let snapshot = session.advance(delta, || match source.next_frame() {
            Ok(frame) => {
                pulled = frame.clone();
                frame
            }
            Err(e) => {
                capture_error = Some(e);
                None
            }
        });
        if let Some(e) = capture_error {
            return Err(e.into());
        }
        if let Some(frame) = pulled {
            last_frame = frame;
            fed += 1;
            if cli.cycle_modes_every > 0 && fed % cli.cycle_modes_every == 0 {
                let mode = session.change_mode()?;
                log::info!("Frame {fed}: mode is now {mode}");
            }
        }
        if snapshot.is_some() {
            last_snapshot = snapshot;
        }
    }

    let timeout = cycle_timeout(session.config());
    let final_snapshot = wait_for_cycle(&session, timeout).or(last_snapshot);
    let last_error = session.worker().and_then(|w| w.last_error());
    let mode = session.mode();
    session.shutdown()?;

    let snapshot = final_snapshot.unwrap_or_default();
    if let Some(path) = &cli.annotate {
        write_annotated(&last_frame, &snapshot, path)?;
        log::info!("Annotated frame written to {}", path.display());
    }

    let report = serde_json::json!({
        "mode": mode.to_string(),
        "frames": fed,
        "count": snapshot.count(),
        "secondary_count": snapshot.secondary_count(),
        "snapshot": snapshot,
        "last_error": last_error,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn build_config(cli: &Cli) -> Result<TrackerConfig, Box<dyn std::error::Error>> {
    let mut config = TrackerConfig::load(cli.config.as_deref())?;
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(max) = cli.max_vertices {
        config.max_vertices = max;
    }
    if let Some(dir) = &cli.cascade_dir {
        config.cascade.cascade_dir = Some(dir.clone());
    }
    if let Some(rate) = cli.refresh_rate {
        config.refresh_rate = rate;
    }
    if cli.unthrottled {
        config.throttle = ThrottleSettings::unthrottled();
    }
    config.validate()?;
    Ok(config)
}

/// Longest a full cycle can take under the configured pacing, plus slack
/// for detection itself. Saturates at `Duration::MAX` for huge capacities.
fn cycle_timeout(config: &TrackerConfig) -> Duration {
    let policy = config.throttle_policy();
    let paced = if policy.limits_items() {
        let writes = u32::try_from(config.max_vertices.saturating_mul(2)).unwrap_or(u32::MAX);
        policy
            .item_interval
            .checked_mul(writes.div_ceil(policy.item_budget))
            .unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    };
    policy
        .startup_delay
        .saturating_add(policy.cycle_pause)
        .saturating_add(paced)
        .saturating_add(Duration::from_secs(10))
}

/// Waits for the worker to publish a cycle after this call, up to `timeout`.
fn wait_for_cycle(session: &TrackingSession, timeout: Duration) -> Option<VertexSnapshot> {
    let seen = session.buffer().cycle();
    // no deadline when the timeout is past what `Instant` can represent
    let deadline = Instant::now().checked_add(timeout);
    while deadline.map_or(true, |d| Instant::now() < d) {
        let snapshot = session.snapshot();
        if snapshot.cycle > seen {
            return Some(snapshot);
        }
        if session.worker().map_or(true, |w| !w.state().is_live()) {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    log::warn!("No tracking cycle completed within {timeout:?}");
    None
}

fn write_annotated(
    frame: &Frame,
    snapshot: &VertexSnapshot,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut image = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        .ok_or("frame is not an RGB image")?;
    draw_vertex_markers(&mut image, snapshot);
    image.save(path)?;
    Ok(())
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("invalid width '{w}'"))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("invalid height '{h}'"))?;
    if w == 0 || h == 0 {
        return Err(format!("size must be non-zero, got {w}x{h}"));
    }
    Ok((w, h))
}
