// THEORY:
// The `BackgroundModel` is the temporal memory of the detector. Like a grid of
// learning cells, every pixel keeps its own small mixture of Gaussians that
// describes the colors it has shown over the recent past. A new sample that is
// well explained by the heaviest modes is background; anything else is motion.
//
// Key architectural principles:
// 1.  **Per-pixel state, flat storage**: Modes live in one contiguous vector,
//     `max_modes` slots per pixel, sorted by weight. The frame is walked once.
// 2.  **Adaptive learning rate**: The rate starts high (`1 / 2n`) so the model
//     converges within a handful of frames, then settles at `1 / history`.
// 3.  **Pruning**: Every mode pays a small weight tax each frame. Modes that stop
//     receiving support fall below zero and are dropped, which keeps the mixture
//     compact.
// 4.  **No shadows**: The mask is strictly binary (0 or 255). Shadow pixels are
//     never labeled as a separate class.

use image::{GrayImage, Luma, RgbImage};

use crate::config::BackgroundConfig;
use crate::core_modules::slot::FrameSize;

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

#[derive(Debug, Clone, Copy, Default)]
struct Mode {
    weight: f32,
    variance: f32,
    mean: [f32; 3],
}

/// Per-pixel Gaussian mixture model of the static scene.
pub struct BackgroundModel {
    config: BackgroundConfig,
    size: FrameSize,
    modes: Vec<Mode>,
    modes_used: Vec<u8>,
    frames_seen: u64,
}

impl BackgroundModel {
    pub fn new(config: BackgroundConfig) -> Self {
        Self {
            config,
            size: FrameSize::new(0, 0),
            modes: Vec::new(),
            modes_used: Vec::new(),
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Learning rate applied to the `n`th frame (1-based).
    pub fn learning_rate(&self, n: u64) -> f32 {
        let window = (2 * n).min(self.config.history.max(1) as u64);
        1.0 / window.max(1) as f32
    }

    /// Folds `frame` into the model and returns its foreground mask.
    pub fn apply(&mut self, frame: &RgbImage) -> GrayImage {
        let size = FrameSize::new(frame.width(), frame.height());
        if size != self.size {
            self.reset(size);
        }
        self.frames_seen += 1;
        let alpha = self.learning_rate(self.frames_seen);

        let max_modes = self.config.max_modes.max(1);
        let mut mask = GrayImage::new(size.width, size.height);

        for (index, (pixel, out)) in frame.pixels().zip(mask.pixels_mut()).enumerate() {
            let sample = [pixel[0] as f32, pixel[1] as f32, pixel[2] as f32];
            let start = index * max_modes;
            let modes = &mut self.modes[start..start + max_modes];
            let used = &mut self.modes_used[index];

            let background = update_pixel(&self.config, alpha, sample, modes, used);
            *out = Luma([if background { BACKGROUND } else { FOREGROUND }]);
        }

        mask
    }

    fn reset(&mut self, size: FrameSize) {
        let pixels = size.width as usize * size.height as usize;
        self.size = size;
        self.modes = vec![Mode::default(); pixels * self.config.max_modes.max(1)];
        self.modes_used = vec![0; pixels];
        self.frames_seen = 0;
    }
}

/// Updates one pixel's mixture and reports whether the sample is background.
fn update_pixel(
    config: &BackgroundConfig,
    alpha: f32,
    sample: [f32; 3],
    modes: &mut [Mode],
    used: &mut u8,
) -> bool {
    let keep = 1.0 - alpha;
    let prune = -alpha * config.complexity_reduction;

    let mut background = false;
    let mut fits = false;
    let mut total_weight = 0.0f32;
    let mut nmodes = *used as usize;

    let mut mode = 0;
    while mode < nmodes {
        let mut weight = keep * modes[mode].weight + prune;
        let mut slot = mode;

        if !fits {
            let variance = modes[mode].variance;
            let diff = [
                modes[mode].mean[0] - sample[0],
                modes[mode].mean[1] - sample[1],
                modes[mode].mean[2] - sample[2],
            ];
            let dist2 = diff.iter().map(|d| d * d).sum::<f32>();

            if total_weight < config.background_ratio && dist2 < config.var_threshold * variance {
                background = true;
            }

            if dist2 < config.var_threshold_gen * variance {
                fits = true;
                weight += alpha;
                let k = alpha / weight;
                for c in 0..3 {
                    modes[mode].mean[c] -= k * diff[c];
                }
                let updated = variance + k * (dist2 - variance);
                modes[mode].variance = updated.clamp(config.var_min, config.var_max);

                // Keep the mixture sorted by weight.
                while slot > 0 && weight >= modes[slot - 1].weight {
                    modes.swap(slot, slot - 1);
                    slot -= 1;
                }
            }
        }

        if weight < -prune {
            weight = 0.0;
            nmodes -= 1;
        }

        modes[slot].weight = weight;
        total_weight += weight;
        mode += 1;
    }

    if total_weight > 0.0 {
        let norm = 1.0 / total_weight;
        for m in modes.iter_mut().take(nmodes) {
            m.weight *= norm;
        }
    }

    if !fits {
        let slot = if nmodes == modes.len() {
            modes.len() - 1
        } else {
            nmodes += 1;
            nmodes - 1
        };

        if nmodes == 1 {
            modes[slot].weight = 1.0;
        } else {
            modes[slot].weight = alpha;
            for m in modes.iter_mut().take(nmodes - 1) {
                m.weight *= keep;
            }
        }
        modes[slot].mean = sample;
        modes[slot].variance = config.var_init;

        let mut i = slot;
        while i > 0 && alpha >= modes[i - 1].weight {
            modes.swap(i, i - 1);
            i -= 1;
        }
    }

    *used = nmodes as u8;
    background
}
