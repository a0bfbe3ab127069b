// THEORY:
// Every tunable of the system lives in one explicit configuration tree that is
// handed to the detector and the producer loop at construction. Nothing is read
// from process-wide state, so two sessions with different videos or thresholds
// can coexist in one process.

use std::path::PathBuf;
use std::time::Duration;

use crate::core_modules::slot::FrameSize;

pub const DEFAULT_CANVAS_WIDTH: u32 = 1000;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 600;
pub const DEFAULT_SLOT_FILE: &str = "parking_slots_manual.csv";

/// Parameters of the per-pixel Gaussian mixture background model.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundConfig {
    /// Number of frames that make up the learning window.
    pub history: u32,
    /// Squared Mahalanobis distance under which a pixel is explained by the background.
    pub var_threshold: f32,
    /// Squared Mahalanobis distance under which a pixel is absorbed into an existing mode.
    pub var_threshold_gen: f32,
    /// Cumulative weight of the modes that are considered background.
    pub background_ratio: f32,
    pub var_init: f32,
    pub var_min: f32,
    pub var_max: f32,
    /// Weight decay that prunes modes no longer supported by the data.
    pub complexity_reduction: f32,
    pub max_modes: usize,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            history: 500,
            var_threshold: 30.0,
            var_threshold_gen: 9.0,
            background_ratio: 0.9,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 75.0,
            complexity_reduction: 0.05,
            max_modes: 5,
        }
    }
}

/// Speckle removal applied to the foreground mask: open first, then close.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphologyConfig {
    /// Side of the square structuring element, in pixels.
    pub kernel_size: u32,
    pub open_iterations: u32,
    pub close_iterations: u32,
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            kernel_size: 7,
            open_iterations: 1,
            close_iterations: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub background: BackgroundConfig,
    pub morphology: MorphologyConfig,
    /// A slot is occupied when its motion ratio is strictly above this value.
    pub motion_ratio_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            background: BackgroundConfig::default(),
            morphology: MorphologyConfig::default(),
            motion_ratio_threshold: 0.10,
        }
    }
}

/// Top-level configuration for a parking session and its detection runs.
#[derive(Debug, Clone)]
pub struct ParkingConfig {
    /// Size of the display surface on which slots are drawn.
    pub canvas: FrameSize,
    /// Where the slot layout is persisted, in source-pixel coordinates.
    pub slot_file: PathBuf,
    pub detector: DetectorConfig,
    pub frame_queue_capacity: usize,
    pub status_queue_capacity: usize,
    /// Pause between producer iterations. Caps throughput, unrelated to the video's fps.
    pub frame_interval: Duration,
    /// How often the presentation side drains the queues.
    pub poll_interval: Duration,
    /// Consecutive undecodable frames tolerated before the stream is treated as ended.
    pub max_consecutive_decode_failures: u32,
}

impl Default for ParkingConfig {
    fn default() -> Self {
        Self {
            canvas: FrameSize::new(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT),
            slot_file: PathBuf::from(DEFAULT_SLOT_FILE),
            detector: DetectorConfig::default(),
            frame_queue_capacity: 3,
            status_queue_capacity: 10,
            frame_interval: Duration::from_millis(30),
            poll_interval: Duration::from_millis(100),
            max_consecutive_decode_failures: 5,
        }
    }
}
