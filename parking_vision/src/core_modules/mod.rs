pub mod background_model;
pub mod coordinate_mapper;
pub mod frame_source;
pub mod morphology;
pub mod occupancy;
pub mod overlay;
pub mod slot;
pub mod slot_store;
