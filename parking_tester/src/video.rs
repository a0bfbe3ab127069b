use std::path::Path;

use image::RgbImage;
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use parking_vision::core_modules::frame_source::FrameSource;
use parking_vision::core_modules::slot::FrameSize;
use parking_vision::error::{ParkingError, Result};

/// OpenCV-backed video file, read sequentially from the first frame.
pub struct OpenCvVideo {
    capture: VideoCapture,
    frame: Mat,
}

impl OpenCvVideo {
    pub fn open(path: &Path) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| ParkingError::invalid_video(format!("non UTF-8 path: {}", path.display())))?;

        let capture = VideoCapture::from_file(path_str, videoio::CAP_ANY)
            .map_err(|e| ParkingError::invalid_video(format!("cannot open {path_str}: {e}")))?;
        if !capture.is_opened().unwrap_or(false) {
            return Err(ParkingError::invalid_video(format!("cannot open {path_str}")));
        }

        Ok(Self {
            capture,
            frame: Mat::default(),
        })
    }

    pub fn fps(&self) -> f64 {
        self.capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0)
    }
}

impl FrameSource for OpenCvVideo {
    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        let read = self
            .capture
            .read(&mut self.frame)
            .map_err(|e| ParkingError::decode(format!("read failed: {e}")))?;
        if !read || self.frame.empty() {
            return Ok(None);
        }
        mat_to_rgb_image(&self.frame).map(Some)
    }

    fn release(&mut self) {
        let _ = self.capture.release();
    }
}

fn mat_to_rgb_image(mat: &Mat) -> Result<RgbImage> {
    let width = mat.cols() as u32;
    let height = mat.rows() as u32;

    let mut rgb = Mat::default();
    imgproc::cvt_color(mat, &mut rgb, imgproc::COLOR_BGR2RGB, 0)
        .map_err(|e| ParkingError::decode(format!("BGR to RGB failed: {e}")))?;

    let data = rgb
        .data_bytes()
        .map_err(|e| ParkingError::decode(format!("frame data unavailable: {e}")))?
        .to_vec();

    RgbImage::from_vec(width, height, data)
        .ok_or_else(|| ParkingError::decode("frame buffer has unexpected length"))
}

/// Writes annotated frames to a video file.
pub struct AnnotatedWriter {
    writer: VideoWriter,
}

impl AnnotatedWriter {
    pub fn create(path: &Path, size: FrameSize, fps: f64) -> opencv::Result<Self> {
        let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
        let fps = if fps > 0.0 { fps } else { 10.0 };
        let writer = VideoWriter::new(
            &path.to_string_lossy(),
            fourcc,
            fps,
            core::Size::new(size.width as i32, size.height as i32),
            true,
        )?;
        Ok(Self { writer })
    }

    pub fn write(&mut self, image: &RgbImage) -> opencv::Result<()> {
        let flat = Mat::from_slice(image.as_raw().as_slice())?;
        let rgb = flat.reshape(3, image.height() as i32)?;
        let mut bgr = Mat::default();
        imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
        self.writer.write(&bgr)
    }
}
