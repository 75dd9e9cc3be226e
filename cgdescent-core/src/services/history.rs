//! Append-only storage of accepted gradients, addressed by 1-based record.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::state::{Grid, GridId, StateFields};

/// Gradient history store.
///
/// Records are immutable once written: `store` on an existing record fails
/// with [`Error::RecordExists`]. `load_into` validates the record against the
/// grid layout before handing it out.
pub trait GradientHistory {
    fn store(&mut self, grid: &Grid, record: usize, gradient: &StateFields) -> Result<()>;

    fn load_into(&self, grid: &Grid, record: usize, out: &mut StateFields) -> Result<()>;

    /// Number of records written for `grid`.
    fn len(&self, grid: GridId) -> usize;

    fn is_empty(&self, grid: GridId) -> bool {
        self.len(grid) == 0
    }

    fn load(&self, grid: &Grid, record: usize) -> Result<StateFields> {
        let mut out = grid.zero_state();
        self.load_into(grid, record, &mut out)?;
        Ok(out)
    }
}

fn check_record(grid: &Grid, record: usize) -> Result<()> {
    if record == 0 {
        return Err(Error::InvalidRecord {
            grid: grid.id(),
            record,
        });
    }
    Ok(())
}

/// In-process store, mostly for tests and single-run drivers.
#[derive(Clone, Debug, Default)]
pub struct MemoryHistory {
    records: BTreeMap<(GridId, usize), StateFields>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GradientHistory for MemoryHistory {
    fn store(&mut self, grid: &Grid, record: usize, gradient: &StateFields) -> Result<()> {
        check_record(grid, record)?;
        grid.check_shape(gradient, &format!("history record {record}"))?;
        let key = (grid.id(), record);
        if self.records.contains_key(&key) {
            return Err(Error::RecordExists {
                grid: grid.id(),
                record,
            });
        }
        self.records.insert(key, gradient.clone());
        Ok(())
    }

    fn load_into(&self, grid: &Grid, record: usize, out: &mut StateFields) -> Result<()> {
        check_record(grid, record)?;
        let stored = self
            .records
            .get(&(grid.id(), record))
            .ok_or(Error::MissingRecord {
                grid: grid.id(),
                record,
            })?;
        grid.check_shape(stored, &format!("history record {record}"))?;
        out.clone_from(stored);
        Ok(())
    }

    fn len(&self, grid: GridId) -> usize {
        self.records.range((grid, 1)..=(grid, usize::MAX)).count()
    }
}

/// One JSON document per record under a directory, named
/// `<prefix>_<grid>_<record>.json`.
///
/// Records are written to a temporary file in the same directory and then
/// linked into place without clobbering, so a record can never be replaced
/// and a failed write leaves nothing behind.
#[derive(Clone, Debug)]
pub struct DirHistory {
    root: PathBuf,
    prefix: String,
}

impl DirHistory {
    /// Open (creating if needed) a history directory.
    pub fn open(root: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            prefix: prefix.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_path(&self, grid: GridId, record: usize) -> PathBuf {
        self.root
            .join(format!("{}_{:02}_{:03}.json", self.prefix, grid.0, record))
    }
}

impl GradientHistory for DirHistory {
    fn store(&mut self, grid: &Grid, record: usize, gradient: &StateFields) -> Result<()> {
        check_record(grid, record)?;
        grid.check_shape(gradient, &format!("history record {record}"))?;
        let path = self.record_path(grid.id(), record);
        let exists = || Error::RecordExists {
            grid: grid.id(),
            record,
        };
        if path.exists() {
            return Err(exists());
        }

        // write aside, then publish without clobbering
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, gradient)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => {}
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => return Err(exists()),
            Err(e) => return Err(e.error.into()),
        }
        tracing::debug!(grid = %grid.id(), record, path = %path.display(), "gradient record written");
        Ok(())
    }

    fn load_into(&self, grid: &Grid, record: usize, out: &mut StateFields) -> Result<()> {
        check_record(grid, record)?;
        let path = self.record_path(grid.id(), record);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::MissingRecord {
                    grid: grid.id(),
                    record,
                })
            }
            Err(e) => return Err(e.into()),
        };
        let stored: StateFields = serde_json::from_reader(BufReader::new(file))?;
        grid.check_shape(&stored, &format!("history record {record}"))?;
        *out = stored;
        Ok(())
    }

    fn len(&self, grid: GridId) -> usize {
        (1..)
            .take_while(|&record| self.record_path(grid, record).is_file())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid {
        Grid::new(GridId(1), 3, 2, 2, &[1, 2])
    }

    #[test]
    fn memory_store_is_append_only() {
        let grid = grid();
        let g = grid.state_from_fn(|_, level, point| (level * 10 + point) as f64);
        let mut store = MemoryHistory::new();
        store.store(&grid, 1, &g).unwrap();

        let err = store.store(&grid, 1, &grid.zero_state()).unwrap_err();
        assert!(matches!(err, Error::RecordExists { record: 1, .. }));
        assert_eq!(store.load(&grid, 1).unwrap(), g);
        assert_eq!(store.len(grid.id()), 1);
        assert_eq!(store.len(GridId(9)), 0);
    }

    #[test]
    fn memory_store_keeps_grids_apart() {
        let a = grid();
        let b = Grid::new(GridId(2), 3, 2, 2, &[1, 2]);
        let mut store = MemoryHistory::new();
        store.store(&a, 1, &a.zero_state()).unwrap();
        assert!(matches!(
            store.load(&b, 1).unwrap_err(),
            Error::MissingRecord { record: 1, .. }
        ));
    }

    #[test]
    fn record_zero_is_invalid() {
        let grid = grid();
        let mut store = MemoryHistory::new();
        assert!(matches!(
            store.store(&grid, 0, &grid.zero_state()).unwrap_err(),
            Error::InvalidRecord { record: 0, .. }
        ));
        assert!(matches!(
            store.load(&grid, 0).unwrap_err(),
            Error::InvalidRecord { .. }
        ));
    }

    #[test]
    fn shape_is_validated_on_store() {
        let grid = grid();
        let other = Grid::new(GridId(1), 2, 2, 2, &[1, 2]);
        let mut store = MemoryHistory::new();
        let err = store.store(&grid, 1, &other.zero_state()).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn rejected_store_leaves_no_stray_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirHistory::open(dir.path(), "adj").unwrap();
        let grid = grid();
        let g = grid.state_from_fn(|_, level, point| (level + point) as f64 * 0.5);
        store.store(&grid, 1, &g).unwrap();
        let err = store.store(&grid, 1, &grid.zero_state()).unwrap_err();
        assert!(matches!(err, Error::RecordExists { record: 1, .. }));

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["adj_01_001.json"]);
        assert_eq!(store.load(&grid, 1).unwrap(), g);
    }

    #[test]
    fn unpublished_files_are_not_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirHistory::open(dir.path(), "adj").unwrap();
        let grid = grid();
        // an interrupted write leaves at most a temporary file behind
        fs::write(dir.path().join(".tmpXYZ123"), "{\"zeta\":").unwrap();
        assert_eq!(store.len(grid.id()), 0);
        store.store(&grid, 1, &grid.zero_state()).unwrap();
        assert_eq!(store.len(grid.id()), 1);
    }

    #[test]
    fn record_paths_are_numbered() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirHistory::open(dir.path(), "adj").unwrap();
        let path = store.record_path(GridId(1), 7);
        assert_eq!(path.file_name().unwrap(), "adj_01_007.json");
    }
}
