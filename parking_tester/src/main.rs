mod video;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use parking_vision::config::{DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, DEFAULT_SLOT_FILE};
use parking_vision::core_modules::slot::{FrameSize, Rect};
use parking_vision::{ParkingConfig, ParkingError, ParkingSession};
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::video::{AnnotatedWriter, OpenCvVideo};

#[derive(Parser, Clone)]
#[command(about = "Draw parking slots over a video and watch their occupancy")]
struct Cli {
    /// Input video file.
    #[arg(long)]
    video: PathBuf,

    /// Slot layout file (source-pixel coordinates).
    #[arg(long, default_value = DEFAULT_SLOT_FILE)]
    slot_file: PathBuf,

    #[arg(long, default_value_t = DEFAULT_CANVAS_WIDTH)]
    canvas_width: u32,

    #[arg(long, default_value_t = DEFAULT_CANVAS_HEIGHT)]
    canvas_height: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone)]
enum Command {
    /// Print the saved layout in source and canvas coordinates.
    Show,
    /// Replace the layout with canvas rectangles given as `x1,y1,x2,y2`, then save it.
    Draw {
        #[arg(long = "rect", value_parser = parse_rect, required = true)]
        rects: Vec<Rect>,
    },
    /// Run occupancy detection over the video.
    Run {
        /// Write the annotated frames the poller receives to this file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Motion ratio above which a slot counts as occupied.
        #[arg(long, default_value_t = 0.10)]
        threshold: f64,

        /// Pause between processed frames, in milliseconds.
        #[arg(long, default_value_t = 30)]
        frame_interval_ms: u64,
    },
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts: Vec<i32> = s
        .split(',')
        .map(|p| p.trim().parse::<i32>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [x1, y1, x2, y2] => Ok(Rect::new(*x1, *y1, *x2, *y2)),
        _ => Err(format!("expected x1,y1,x2,y2, got {s:?}")),
    }
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = ParkingConfig {
        canvas: FrameSize::new(cli.canvas_width, cli.canvas_height),
        slot_file: cli.slot_file.clone(),
        ..ParkingConfig::default()
    };
    if let Command::Run {
        threshold,
        frame_interval_ms,
        ..
    } = &cli.command
    {
        config.detector.motion_ratio_threshold = *threshold;
        config.frame_interval = Duration::from_millis(*frame_interval_ms);
    }

    // The first frame fixes the source resolution; a video without one is fatal.
    let mut probe = OpenCvVideo::open(&cli.video).context("cannot open video")?;
    let mut session = ParkingSession::open_with_probe(config, &mut probe).context("cannot read video")?;
    let fps = probe.fps();
    drop(probe);

    session.load_saved_slots()?;

    match cli.command {
        Command::Show => show(&session),
        Command::Draw { rects } => draw(&mut session, rects),
        Command::Run { output, .. } => run(&mut session, &cli.video, output, fps).await,
    }
}

fn show(session: &ParkingSession) -> anyhow::Result<()> {
    if session.source_slots().is_empty() {
        println!("No slots saved.");
        return Ok(());
    }
    for (slot, canvas) in session.source_slots().iter().zip(session.canvas_slots()) {
        println!("{}  source {}  canvas {}", slot.id, slot.rect, canvas);
    }
    Ok(())
}

fn draw(session: &mut ParkingSession, rects: Vec<Rect>) -> anyhow::Result<()> {
    session.begin_drawing()?;
    for rect in rects {
        session.add_canvas_rect(rect)?;
    }
    match session.save_slots() {
        Ok(count) => println!("{count} slots saved"),
        Err(ParkingError::Io(e)) => warn!(error = %e, "slots were not saved"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn run(
    session: &mut ParkingSession,
    video_path: &std::path::Path,
    output: Option<PathBuf>,
    fps: f64,
) -> anyhow::Result<()> {
    if session.source_slots().is_empty() {
        bail!("no slots available; draw and save slots first");
    }

    let source = OpenCvVideo::open(video_path).context("cannot reopen video")?;
    let mut writer = match output {
        Some(path) => Some(
            AnnotatedWriter::create(&path, session.mapper().source(), fps)
                .with_context(|| format!("cannot create {}", path.display()))?,
        ),
        None => None,
    };

    let mut handle = session.start(source)?;
    let stop = handle.stop_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping detection");
            stop.stop();
        }
    });

    let mut ticker = tokio::time::interval(session.config().poll_interval);
    loop {
        ticker.tick().await;
        let finished = !handle.is_running();
        let drained = handle.drain();

        if let Some(frame) = &drained.frame {
            if let Some(writer) = writer.as_mut() {
                writer.write(&frame.image).context("cannot write output frame")?;
            }
        }
        if let Some(status) = drained.statuses.last() {
            info!(frame = status.frame_index, "{status}");
        }

        if finished && drained.is_empty() {
            break;
        }
    }

    let summary = handle.finish().await?;
    info!(
        processed = summary.frames_processed,
        frames_dropped = summary.frames_dropped,
        statuses_dropped = summary.statuses_dropped,
        reason = ?summary.reason,
        "processing complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rect_arguments() {
        assert_eq!(parse_rect("1, 2,30,40").unwrap(), Rect::new(1, 2, 30, 40));
        assert!(parse_rect("1,2,3").is_err());
        assert!(parse_rect("a,2,3,4").is_err());
    }

    #[test]
    fn cli_accepts_repeated_rects() {
        let cli = Cli::try_parse_from([
            "parking_tester",
            "--video",
            "lot.mp4",
            "draw",
            "--rect",
            "0,0,10,10",
            "--rect",
            "20,20,40,40",
        ])
        .unwrap();
        match cli.command {
            Command::Draw { rects } => assert_eq!(rects.len(), 2),
            _ => panic!("expected draw"),
        }
    }
}
