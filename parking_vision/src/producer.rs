// THEORY:
// The producer loop drives one detection run. It owns the frame source and the
// detector, runs on its own blocking thread, and talks to the presentation side
// exclusively through two bounded channels: rendered frames and occupancy
// snapshots. Nothing mutable is shared with the consumer except a stop flag.
//
// Key architectural principles:
// 1.  **Never block on the consumer**: both pushes are `try_send`. A full queue
//     drops the item being offered and the loop moves on. This is the only
//     backpressure in the system.
// 2.  **Independent streams**: frames and snapshots are dropped independently.
//     Both carry the same `frame_index` so a consumer can correlate them.
// 3.  **Cooperative cancellation**: the stop flag and channel closure are checked
//     at the top of every iteration. Dropping the handle raises the flag.
// 4.  **Rate limiting**: a fixed pause between iterations caps throughput. It is
//     not tied to the source's native frame rate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use image::RgbImage;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ParkingConfig;
use crate::core_modules::frame_source::FrameSource;
use crate::core_modules::occupancy::{OccupancyDetector, OccupancySnapshot};
use crate::core_modules::overlay::render_overlay;
use crate::core_modules::slot::Slot;
use crate::error::Result;

/// A frame with slot outlines drawn on it.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub frame_index: u64,
    pub image: RgbImage,
}

/// Outcome of a non-blocking push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Delivered,
    /// The queue was full; the offered item was discarded.
    Dropped,
    /// The consumer went away.
    Closed,
}

/// Pushes `item` without waiting. Queue-full is a control-flow signal, not an error.
pub fn offer<T>(tx: &mpsc::Sender<T>, item: T) -> Offer {
    match tx.try_send(item) {
        Ok(()) => Offer::Delivered,
        Err(TrySendError::Full(_)) => Offer::Dropped,
        Err(TrySendError::Closed(_)) => Offer::Closed,
    }
}

/// Shared cancellation flag, raised by the consumer and polled by the producer.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    #[default]
    EndOfStream,
    Stopped,
    ConsumerGone,
    TooManyDecodeFailures,
}

/// Counters reported when the producer exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerSummary {
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub statuses_dropped: u64,
    pub decode_failures: u64,
    pub reason: StopReason,
}

/// What one poll tick pulled off the queues.
#[derive(Debug, Default)]
pub struct Drained {
    /// At most one rendered frame per tick.
    pub frame: Option<RenderedFrame>,
    /// Every snapshot that was pending, oldest first.
    pub statuses: Vec<OccupancySnapshot>,
}

impl Drained {
    pub fn is_empty(&self) -> bool {
        self.frame.is_none() && self.statuses.is_empty()
    }
}

/// Consumer end of a running detection.
pub struct SimulationHandle {
    frames: mpsc::Receiver<RenderedFrame>,
    statuses: mpsc::Receiver<OccupancySnapshot>,
    stop: StopSignal,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<ProducerSummary>>,
    summary: Option<ProducerSummary>,
}

impl SimulationHandle {
    /// Drains the queues without blocking: one frame and all pending snapshots.
    pub fn drain(&mut self) -> Drained {
        let frame = self.frames.try_recv().ok();
        let mut statuses = Vec::new();
        loop {
            match self.statuses.try_recv() {
                Ok(status) => statuses.push(status),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Drained { frame, statuses }
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn run_state(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Waits for the producer to exit. Buffered items stay available to `drain`.
    pub async fn finish(&mut self) -> Result<ProducerSummary> {
        if let Some(task) = self.task.take() {
            self.summary = Some(task.await?);
        }
        Ok(self.summary.clone().unwrap_or_default())
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        // The consumer is gone, so the run has no audience left.
        self.stop.stop();
    }
}

/// Starts the producer loop on a blocking thread. Must be called inside a tokio runtime.
pub fn spawn_producer<S>(config: &ParkingConfig, slots: Vec<Slot>, source: S) -> SimulationHandle
where
    S: FrameSource + 'static,
{
    let (frame_tx, frames) = mpsc::channel(config.frame_queue_capacity.max(1));
    let (status_tx, statuses) = mpsc::channel(config.status_queue_capacity.max(1));
    let stop = StopSignal::default();
    let running = Arc::new(AtomicBool::new(true));

    let worker = Producer {
        detector: OccupancyDetector::new(config.detector.clone(), slots),
        frame_interval: config.frame_interval,
        max_decode_failures: config.max_consecutive_decode_failures.max(1),
        frame_tx,
        status_tx,
        stop: stop.clone(),
        running: Arc::clone(&running),
    };
    let task = tokio::task::spawn_blocking(move || worker.run(source));

    SimulationHandle {
        frames,
        statuses,
        stop,
        running,
        task: Some(task),
        summary: None,
    }
}

struct Producer {
    detector: OccupancyDetector,
    frame_interval: Duration,
    max_decode_failures: u32,
    frame_tx: mpsc::Sender<RenderedFrame>,
    status_tx: mpsc::Sender<OccupancySnapshot>,
    stop: StopSignal,
    running: Arc<AtomicBool>,
}

impl Producer {
    fn run<S: FrameSource>(mut self, source: S) -> ProducerSummary {
        let mut guard = RunGuard {
            source,
            running: Arc::clone(&self.running),
        };
        let mut summary = ProducerSummary::default();
        let mut consecutive_failures = 0u32;

        info!(slots = self.detector.slots().len(), "detection run started");

        summary.reason = loop {
            if self.stop.is_stopped() {
                break StopReason::Stopped;
            }
            if self.frame_tx.is_closed() && self.status_tx.is_closed() {
                break StopReason::ConsumerGone;
            }

            let frame = match guard.source.read_frame() {
                Ok(Some(frame)) => {
                    consecutive_failures = 0;
                    frame
                }
                Ok(None) => break StopReason::EndOfStream,
                Err(e) => {
                    summary.decode_failures += 1;
                    consecutive_failures += 1;
                    warn!(error = %e, consecutive = consecutive_failures, "skipping undecodable frame");
                    if consecutive_failures >= self.max_decode_failures {
                        break StopReason::TooManyDecodeFailures;
                    }
                    continue;
                }
            };

            let detection = self.detector.process(&frame);
            let snapshot = detection.snapshot;
            let rendered = RenderedFrame {
                frame_index: snapshot.frame_index,
                image: render_overlay(&frame, self.detector.slots(), &snapshot),
            };
            summary.frames_processed += 1;

            debug!(
                frame = snapshot.frame_index,
                occupied = snapshot.occupied(),
                vacant = snapshot.vacant(),
                "frame classified"
            );

            if offer(&self.frame_tx, rendered) == Offer::Dropped {
                summary.frames_dropped += 1;
            }
            if offer(&self.status_tx, snapshot) == Offer::Dropped {
                summary.statuses_dropped += 1;
            }

            if !self.frame_interval.is_zero() {
                std::thread::sleep(self.frame_interval);
            }
        };

        drop(guard);

        info!(
            processed = summary.frames_processed,
            frames_dropped = summary.frames_dropped,
            statuses_dropped = summary.statuses_dropped,
            decode_failures = summary.decode_failures,
            reason = ?summary.reason,
            "detection run finished"
        );
        summary
    }
}

/// Owns the source for the length of a run. Dropping it, on a normal exit or
/// during a panic unwind, releases the source and clears the running flag.
struct RunGuard<S: FrameSource> {
    source: S,
    running: Arc<AtomicBool>,
}

impl<S: FrameSource> Drop for RunGuard<S> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!("detection run aborted by a panic");
        }
        self.source.release();
        self.running.store(false, Ordering::SeqCst);
    }
}
