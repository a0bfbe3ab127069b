// THEORY:
// A `FrameSource` is the seam between the detector and whatever decodes video.
// The library never links a codec; the tester binary plugs in an OpenCV capture
// and tests plug in `MemoryVideo`.
//
// `Ok(None)` is end of stream, a normal termination. `Err` is a single frame
// that could not be decoded; the producer decides whether to skip or stop.

use std::collections::VecDeque;

use image::RgbImage;

use crate::core_modules::slot::FrameSize;
use crate::error::{ParkingError, Result};

pub trait FrameSource: Send {
    fn read_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Frees the underlying video resource. Called once when the stream ends.
    fn release(&mut self) {}
}

/// Reads the first frame and returns its size. This is the startup check that
/// gates every session: no frame, a decode failure or a zero-sized frame is fatal.
pub fn probe_frame_size(source: &mut dyn FrameSource) -> Result<FrameSize> {
    let frame = match source.read_frame() {
        Ok(Some(frame)) => frame,
        Ok(None) => return Err(ParkingError::invalid_video("video has no frames")),
        Err(e) => {
            return Err(ParkingError::invalid_video(format!(
                "cannot decode first frame: {e}"
            )));
        }
    };
    let size = FrameSize::new(frame.width(), frame.height());
    if size.is_empty() {
        return Err(ParkingError::invalid_video(format!("first frame has zero size ({size})")));
    }
    Ok(size)
}

/// In-memory video. Each entry is either a frame or a decode failure message.
#[derive(Default)]
pub struct MemoryVideo {
    frames: VecDeque<std::result::Result<RgbImage, String>>,
    released: bool,
}

impl MemoryVideo {
    pub fn new<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = RgbImage>,
    {
        Self {
            frames: frames.into_iter().map(Ok).collect(),
            released: false,
        }
    }

    pub fn push_frame(&mut self, frame: RgbImage) {
        self.frames.push_back(Ok(frame));
    }

    pub fn push_corrupt(&mut self, reason: impl Into<String>) {
        self.frames.push_back(Err(reason.into()));
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl FrameSource for MemoryVideo {
    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        match self.frames.pop_front() {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(reason)) => Err(ParkingError::decode(reason)),
            None => Ok(None),
        }
    }

    fn release(&mut self) {
        self.frames.clear();
        self.released = true;
    }
}
