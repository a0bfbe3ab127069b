// THEORY:
// This file is the main entry point for the `parking_vision` library crate.
// It exposes the `ParkingSession` (slot editing, persistence, run control) and
// the producer loop that drives the occupancy detector over a video stream.
//
// The per-pixel and per-slot machinery (`core_modules`) stays usable on its own
// so that callers can classify synthetic masks or run the detector by hand.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod producer;
pub mod session;

pub use config::ParkingConfig;
pub use error::{ParkingError, Result};
pub use session::ParkingSession;
