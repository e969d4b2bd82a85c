// src/sim/harness.rs - Offline planner simulation
//
// Drives the planner with a small canned program against the recording
// motor queue and reports what reached the queue. Useful for eyeballing
// segment streams and for profiling without hardware.

use clap::Parser;
use ferromill::motion::{MotionContext, QueueEntry, RecordingQueue};
use ferromill::{ArcSpec, Config};

#[derive(Parser, Debug)]
#[command(
    name = "sim_harness",
    about = "Run the motion planner against a recording motor queue"
)]
struct Args {
    /// Path to a TOML machine configuration. Defaults apply when omitted.
    #[arg(long)]
    config: Option<String>,

    /// Side length of the test square (mm).
    #[arg(long, default_value_t = 25.0)]
    size: f64,

    /// Feed velocity (mm/min).
    #[arg(long, default_value_t = 600.0)]
    feed: f64,

    /// Log level: error, warn, info, debug or trace.
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level: tracing::Level = args.log.parse()?;
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => {
            tracing::info!("No configuration given; using defaults");
            Config::default()
        }
    };

    let mut ctx = MotionContext::new(&config, RecordingQueue::new());
    ctx.set_position([0.0; 4]);

    // A square of planned feeds (exercises cornering and backplanning),
    // then a half-circle arc, a dwell and the program markers.
    let s = args.size;
    let edge_minutes = s / args.feed;
    ctx.submit_start()?;
    ctx.submit_feed([s, 0.0, 0.0, 0.0], edge_minutes)?;
    ctx.submit_feed([s, s, 0.0, 0.0], edge_minutes)?;
    ctx.submit_feed([0.0, s, 0.0, 0.0], edge_minutes)?;
    ctx.submit_feed([0.0, 0.0, 0.0, 0.0], edge_minutes)?;

    let radius = s / 2.0;
    let arc_length = std::f64::consts::PI * radius;
    ctx.submit_arc(
        ArcSpec {
            target: [s, 0.0, 0.0, 0.0],
            theta: -std::f64::consts::FRAC_PI_2,
            radius,
            angular_travel: std::f64::consts::PI,
            linear_travel: 0.0,
            axis_1: 0,
            axis_2: 1,
            axis_linear: 2,
        },
        arc_length / args.feed,
    )?;
    ctx.submit_dwell(0.5)?;
    ctx.submit_line([0.0, 0.0, 0.0, 0.0], s / args.feed)?;
    ctx.submit_stop()?;
    ctx.submit_end()?;

    let completed = ctx.run_to_idle();

    let queue = ctx.motor_queue();
    let segments = queue
        .entries
        .iter()
        .filter(|e| matches!(e, QueueEntry::Line { .. }))
        .count();
    let total_ms = queue.total_microseconds() as f64 / 1000.0;
    let steps = queue.total_steps();

    tracing::info!(completed, segments, "program drained");
    tracing::info!(
        total_ms,
        steps_a = steps[0],
        steps_b = steps[1],
        steps_c = steps[2],
        "queue totals"
    );
    tracing::info!(position = ?ctx.runtime_position(), "final runtime position");

    Ok(())
}
