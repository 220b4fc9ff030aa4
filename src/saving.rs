use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::StoreError;
use crate::grid::Grid;

/// Persistence collaborator used at editor open and by the autosave task.
pub trait SheetStore: Send + Sync {
    fn save(&self, sheet_id: &str, grid: &Grid, columns: &[String]) -> Result<(), StoreError>;

    /// `Ok(None)` when no sheet with that id exists.
    fn load(&self, sheet_id: &str) -> Result<Option<Grid>, StoreError>;
}

/// Load a sheet, falling back to an empty `rows x cols` grid when absent.
pub fn load_or_default(
    store: &dyn SheetStore,
    sheet_id: &str,
    rows: usize,
    cols: usize,
) -> Result<Grid, StoreError> {
    match store.load(sheet_id)? {
        Some(grid) => Ok(grid),
        None => {
            debug!("sheet {} not found, starting with a {}x{} grid", sheet_id, rows, cols);
            Ok(Grid::new(rows, cols))
        }
    }
}

#[derive(Serialize)]
struct SheetRecordRef<'a> {
    grid: &'a Grid,
    columns: &'a [String],
}

#[derive(Deserialize)]
struct SheetRecord {
    grid: Grid,
    columns: Vec<String>,
}

impl SheetRecord {
    fn into_grid(self) -> Grid {
        let mut grid = self.grid;
        if self.columns.len() == grid.cols {
            grid.columns = self.columns;
        }
        grid
    }
}

/// Write a sheet as gzip-compressed bincode.
pub fn save_grid(grid: &Grid, columns: &[String], path: &Path) -> Result<(), StoreError> {
    let file = File::create(path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut writer = BufWriter::new(encoder);

    serialize_into(&mut writer, &SheetRecordRef { grid, columns })?;

    let encoder = writer.into_inner().map_err(|e| e.into_error())?;
    encoder.finish()?.flush()?;
    Ok(())
}

pub fn load_grid(path: &Path) -> Result<Grid, StoreError> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(file);
    let mut reader = BufReader::new(decoder);

    let record: SheetRecord = deserialize_from(&mut reader)?;

    Ok(record.into_grid())
}

/// One `<id>.bin.gz` file per sheet under a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(FileStore { dir })
    }

    pub fn path_for(&self, sheet_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !sheet_id.is_empty()
            && sheet_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidId(sheet_id.to_string()));
        }
        Ok(self.dir.join(format!("{}.bin.gz", sheet_id)))
    }
}

impl SheetStore for FileStore {
    fn save(&self, sheet_id: &str, grid: &Grid, columns: &[String]) -> Result<(), StoreError> {
        let path = self.path_for(sheet_id)?;
        // write then rename so a failed save never truncates the previous copy
        let tmp = path.with_extension("tmp");
        save_grid(grid, columns, &tmp)?;
        std::fs::rename(&tmp, &path)?;
        debug!("saved sheet {} to {}", sheet_id, path.display());
        Ok(())
    }

    fn load(&self, sheet_id: &str) -> Result<Option<Grid>, StoreError> {
        let path = self.path_for(sheet_id)?;
        if !path.exists() {
            return Ok(None);
        }
        load_grid(&path).map(Some)
    }
}

/// In-process store. Counts successful saves and can be told to fail.
#[derive(Default)]
pub struct MemoryStore {
    sheets: Mutex<HashMap<String, Grid>>,
    saves: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Last saved copy of a sheet.
    pub fn get(&self, sheet_id: &str) -> Option<Grid> {
        self.sheets.lock().ok()?.get(sheet_id).cloned()
    }
}

impl SheetStore for MemoryStore {
    fn save(&self, sheet_id: &str, grid: &Grid, columns: &[String]) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!("save of {} rejected", sheet_id)));
        }
        let mut grid = grid.clone();
        grid.columns = columns.to_vec();
        self.sheets
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))?
            .insert(sheet_id.to_string(), grid);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self, sheet_id: &str) -> Result<Option<Grid>, StoreError> {
        let sheets = self
            .sheets
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))?;
        Ok(sheets.get(sheet_id).cloned())
    }
}
