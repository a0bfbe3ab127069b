// THEORY:
// The `session` module is the top-level API of the library. A `ParkingSession`
// binds one video (through its first-frame size) to one slot layout and enforces
// the editing rules around it:
//
// 1.  **Two views of one layout**: canvas rectangles are what the user drew or
//     sees; source slots are what gets persisted and detected. The mapper is the
//     only path between them.
// 2.  **Wholesale edits**: drawing clears the layout and rebuilds it; saving
//     overwrites the file. There are no partial updates.
// 3.  **Locked while running**: the detector reads the layout for the whole run,
//     so every edit is refused until the run ends.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::config::ParkingConfig;
use crate::core_modules::coordinate_mapper::CoordinateMapper;
use crate::core_modules::frame_source::{FrameSource, probe_frame_size};
use crate::core_modules::slot::{FrameSize, Rect, Slot, SlotId};
use crate::core_modules::slot_store::SlotStore;
use crate::error::{ParkingError, Result};
use crate::producer::{SimulationHandle, spawn_producer};

pub struct ParkingSession {
    config: ParkingConfig,
    mapper: CoordinateMapper,
    store: SlotStore,
    canvas_slots: Vec<Rect>,
    source_slots: Vec<Slot>,
    active_run: Option<Arc<AtomicBool>>,
}

impl ParkingSession {
    /// Opens a session for a video whose first frame has `frame_size`.
    pub fn open(config: ParkingConfig, frame_size: FrameSize) -> Result<Self> {
        let mapper = CoordinateMapper::new(config.canvas, frame_size)?;
        let store = SlotStore::new(config.slot_file.clone());
        info!(source = %frame_size, canvas = %config.canvas, "parking session opened");
        Ok(Self {
            config,
            mapper,
            store,
            canvas_slots: Vec::new(),
            source_slots: Vec::new(),
            active_run: None,
        })
    }

    /// Probes `source` for its first frame, then opens a session for it.
    pub fn open_with_probe(config: ParkingConfig, source: &mut dyn FrameSource) -> Result<Self> {
        let frame_size = probe_frame_size(source)?;
        Self::open(config, frame_size)
    }

    pub fn config(&self) -> &ParkingConfig {
        &self.config
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn canvas_slots(&self) -> &[Rect] {
        &self.canvas_slots
    }

    /// The saved or loaded layout, in source coordinates. This is what a run detects on.
    pub fn source_slots(&self) -> &[Slot] {
        &self.source_slots
    }

    pub fn is_running(&self) -> bool {
        self.active_run
            .as_ref()
            .is_some_and(|running| running.load(Ordering::SeqCst))
    }

    /// Loads the persisted layout and projects it onto the canvas. An unreadable
    /// file is reported as a warning and leaves the session empty.
    pub fn load_saved_slots(&mut self) -> Result<usize> {
        self.ensure_editable()?;
        let rects = match self.store.load() {
            Ok(rects) => rects,
            Err(e) => {
                warn!(path = %self.store.path().display(), error = %e, "could not read slot file; starting empty");
                Vec::new()
            }
        };

        warn_degenerate("loaded", &rects);
        self.canvas_slots = rects.iter().map(|r| self.mapper.to_canvas(*r)).collect();
        self.source_slots = Slot::sequence(rects);
        if !self.source_slots.is_empty() {
            info!("{} slots loaded from file", self.source_slots.len());
        }
        Ok(self.source_slots.len())
    }

    /// Starts a new drawing pass. The previous layout is discarded.
    pub fn begin_drawing(&mut self) -> Result<()> {
        self.ensure_editable()?;
        self.canvas_slots.clear();
        self.source_slots.clear();
        Ok(())
    }

    /// Adds one rectangle drawn on the canvas and returns the id it will carry.
    pub fn add_canvas_rect(&mut self, rect: Rect) -> Result<SlotId> {
        self.ensure_editable()?;
        warn_degenerate("drawn", std::slice::from_ref(&rect));
        self.canvas_slots.push(rect);
        Ok(SlotId(self.canvas_slots.len() as u32))
    }

    /// Converts the drawn rectangles to source coordinates and persists them.
    pub fn save_slots(&mut self) -> Result<usize> {
        self.ensure_editable()?;
        if self.canvas_slots.is_empty() {
            return Err(ParkingError::EmptySlotSet);
        }
        let rects: Vec<Rect> = self
            .canvas_slots
            .iter()
            .map(|r| self.mapper.to_source(*r))
            .collect();
        self.store.save(&rects)?;
        self.source_slots = Slot::sequence(rects);
        info!("{} slots saved", self.source_slots.len());
        Ok(self.source_slots.len())
    }

    /// Starts a detection run over `source` using the saved layout.
    pub fn start<S>(&mut self, source: S) -> Result<SimulationHandle>
    where
        S: FrameSource + 'static,
    {
        self.ensure_editable()?;
        if self.source_slots.is_empty() {
            return Err(ParkingError::EmptySlotSet);
        }
        let handle = spawn_producer(&self.config, self.source_slots.clone(), source);
        self.active_run = Some(handle.run_state());
        Ok(handle)
    }

    fn ensure_editable(&self) -> Result<()> {
        if self.is_running() {
            Err(ParkingError::SlotsLocked)
        } else {
            Ok(())
        }
    }
}

fn warn_degenerate(origin: &str, rects: &[Rect]) {
    for rect in rects.iter().filter(|r| r.is_degenerate()) {
        warn!(%rect, origin, "degenerate slot rectangle will always read as vacant");
    }
}
