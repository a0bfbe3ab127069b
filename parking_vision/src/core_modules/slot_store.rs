// THEORY:
// The slot store is the durable half of the slot layout. It persists rectangles
// in source-pixel coordinates so the layout survives canvas size changes, and it
// is always rewritten wholesale: no row is ever patched in place.
//
// A missing file is the normal "nothing drawn yet" state and loads as an empty
// layout. Saving writes a sibling temporary file and renames it into place so a
// failed write never leaves a half-written layout behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core_modules::slot::Rect;
use crate::error::Result;

/// CSV-backed persistence for the slot layout (`x1,y1,x2,y2`, one row per slot).
#[derive(Debug, Clone)]
pub struct SlotStore {
    path: PathBuf,
}

impl SlotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the persisted layout in row order. An absent file yields no slots.
    pub fn load(&self) -> Result<Vec<Rect>> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no slot file yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let rects = reader
            .deserialize::<Rect>()
            .collect::<std::result::Result<Vec<_>, _>>()?;

        info!(path = %self.path.display(), count = rects.len(), "slots loaded from file");
        Ok(rects)
    }

    /// Overwrites the persisted layout with `rects`.
    pub fn save(&self, rects: &[Rect]) -> Result<()> {
        let tmp = self.temp_path();
        if let Err(e) = self.write_rows(&tmp, rects) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, &self.path)?;

        info!(path = %self.path.display(), count = rects.len(), "slots saved");
        Ok(())
    }

    fn write_rows(&self, tmp: &Path, rects: &[Rect]) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(tmp)?;

        // Written explicitly so an empty layout still carries the header row.
        writer.write_record(["x1", "y1", "x2", "y2"])?;
        for rect in rects {
            writer.serialize(rect)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParkingError;

    fn store_in(dir: &tempfile::TempDir) -> SlotStore {
        SlotStore::new(dir.path().join("slots.csv"))
    }

    #[test]
    fn missing_file_loads_as_empty_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(!store.exists());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let rects = vec![
            Rect::new(0, 0, 100, 100),
            Rect::new(1818, 979, 1920, 1080),
            Rect::new(-5, 3, 7, 2),
        ];
        store.save(&rects).unwrap();
        assert_eq!(store.load().unwrap(), rects);
    }

    #[test]
    fn file_has_named_header_and_integer_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&[Rect::new(1, 2, 3, 4)]).unwrap();
        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text, "x1,y1,x2,y2\n1,2,3,4\n");
    }

    #[test]
    fn save_overwrites_previous_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&[Rect::new(1, 2, 3, 4), Rect::new(5, 6, 7, 8)]).unwrap();
        store.save(&[Rect::new(9, 9, 19, 19)]).unwrap();
        assert_eq!(store.load().unwrap(), vec![Rect::new(9, 9, 19, 19)]);
        assert!(!dir.path().join("slots.csv.tmp").exists());
    }

    #[test]
    fn malformed_rows_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "x1,y1,x2,y2\n1,2,three,4\n").unwrap();
        assert!(matches!(store.load(), Err(ParkingError::Csv(_))));
    }

    #[test]
    fn unwritable_destination_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SlotStore::new(dir.path().join("missing_dir").join("slots.csv"));
        let err = store.save(&[Rect::new(0, 0, 1, 1)]).unwrap_err();
        match err {
            ParkingError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("expected an I/O error, got {other:?}"),
        }
        assert!(!store.exists());
    }
}
