//! Error types for the parking occupancy library

use thiserror::Error;

/// Result type alias for the parking library
pub type Result<T> = std::result::Result<T, ParkingError>;

/// Errors that can occur while editing slots or running detection
#[derive(Error, Debug)]
pub enum ParkingError {
    /// The video cannot be opened, its first frame cannot be decoded, or it has zero size.
    #[error("Invalid video: {0}")]
    InvalidVideo(String),

    #[error("Slot file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Slot file is malformed: {0}")]
    Csv(csv::Error),

    #[error("No parking slots available")]
    EmptySlotSet,

    #[error("Slot layout is locked while a detection run is active")]
    SlotsLocked,

    /// A single frame failed to decode mid-stream.
    #[error("Frame decode failed: {0}")]
    Decode(String),

    #[error("Producer task failed: {0}")]
    Producer(#[from] tokio::task::JoinError),
}

impl From<csv::Error> for ParkingError {
    /// I/O failures surfacing through the CSV layer stay I/O errors.
    fn from(e: csv::Error) -> Self {
        let io_kind = match e.kind() {
            csv::ErrorKind::Io(io) => Some(io.kind()),
            _ => None,
        };
        match io_kind {
            Some(kind) => Self::Io(std::io::Error::new(kind, e)),
            None => Self::Csv(e),
        }
    }
}

impl ParkingError {
    pub fn invalid_video<S: Into<String>>(msg: S) -> Self {
        Self::InvalidVideo(msg.into())
    }

    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Whether the error should abort session startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidVideo(_))
    }
}
