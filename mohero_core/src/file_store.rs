//! File-backed store with file locking.
//!
//! The whole dataset lives in one compact JSON file. Readers take a shared
//! lock on the data file; writers hold an exclusive lock on a sidecar
//! `.lock` file for the full load-modify-save cycle and replace the data
//! file atomically, so a single store call is atomic across processes.
//!
//! A file that exists but cannot be read or parsed is an error, never an
//! empty dataset: it holds the catalog and every user's rows, and writes
//! are refused until [`FileStore::seed`] rebuilds it.

use crate::store::{ProgramStore, StoreData};
use crate::{
    Catalog, CompletedDay, DayWithExercises, Error, ExerciseCategory, ExerciseDefinition,
    ExerciseProgressRecord, Profile, Program, Result,
};
use chrono::NaiveDate;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// JSON file store
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the catalog collections, keeping user rows
    ///
    /// An unreadable store file is replaced by the bare catalog, dropping
    /// whatever user rows it held.
    pub fn seed(&self, catalog: &Catalog) -> Result<()> {
        self.with_write_lock(|| {
            let mut data = self.load().unwrap_or_else(|e| {
                tracing::warn!("Discarding unreadable store {:?}: {}", self.path, e);
                StoreData::default()
            });
            data.import_catalog(catalog);
            self.save(&data)
        })?;
        tracing::info!(
            "Seeded {} programs and {} days into {:?}",
            catalog.programs.len(),
            catalog.days.len(),
            self.path
        );
        Ok(())
    }

    /// Load the dataset with shared locking
    ///
    /// Returns an empty dataset if the file doesn't exist or is blank.
    /// Open, lock and read failures surface as `Error::Io`; unparseable
    /// contents as `Error::Store`.
    pub fn load(&self) -> Result<StoreData> {
        let path = &self.path;
        if !path.exists() {
            tracing::debug!("No store file at {:?}, starting empty", path);
            return Ok(StoreData::default());
        }

        let file = File::open(path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        if contents.trim().is_empty() {
            return Ok(StoreData::default());
        }

        serde_json::from_str::<StoreData>(&contents).map_err(|e| {
            tracing::error!("Failed to parse store file {:?}: {}", path, e);
            Error::Store(format!("corrupt store file {:?}: {}", path, e))
        })
    }

    /// Atomically replace the dataset
    ///
    /// 1. Write to a temp file in the same directory
    /// 2. Sync to disk
    /// 3. Rename over the original
    fn save(&self, data: &StoreData) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::Other(format!("store path {:?} has no parent", self.path)))?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(data)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&StoreData) -> T) -> Result<T> {
        let data = self.load()?;
        Ok(f(&data))
    }

    /// Load, modify and save under the writer lock
    ///
    /// Nothing is written when the current file cannot be loaded.
    fn update<T>(&self, f: impl FnOnce(&mut StoreData) -> Result<T>) -> Result<T> {
        self.with_write_lock(|| {
            let mut data = self.load()?;
            let value = f(&mut data)?;
            self.save(&data)?;
            Ok(value)
        })
    }

    fn with_write_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;

        let result = f();

        lock.unlock()?;
        result
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }
}

impl ProgramStore for FileStore {
    fn list_programs(&self) -> Result<Vec<Program>> {
        self.read(|d| d.list_programs())
    }

    fn load_day(&self, program_id: &str, day_number: u32) -> Result<Option<DayWithExercises>> {
        self.read(|d| d.load_day(program_id, day_number))
    }

    fn list_exercises(&self) -> Result<Vec<ExerciseDefinition>> {
        self.read(|d| d.exercises.clone())
    }

    fn set_exercise_category(&self, exercise_id: &str, category: ExerciseCategory) -> Result<()> {
        self.update(|d| d.set_exercise_category(exercise_id, category))
    }

    fn list_quotes(&self) -> Result<Vec<String>> {
        self.read(|d| d.quotes.clone())
    }

    fn load_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        self.read(|d| d.load_profile(user_id))
    }

    fn save_profile(&self, profile: &Profile) -> Result<()> {
        self.update(|d| {
            d.save_profile(profile);
            Ok(())
        })
    }

    fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.read(|d| d.profiles.clone())
    }

    fn list_progress(
        &self,
        user_id: &str,
        exercise_ids: &[String],
    ) -> Result<Vec<ExerciseProgressRecord>> {
        self.read(|d| d.list_progress(user_id, exercise_ids))
    }

    fn list_user_progress(&self, user_id: &str) -> Result<Vec<ExerciseProgressRecord>> {
        self.read(|d| d.list_user_progress(user_id))
    }

    fn insert_progress(&self, records: &[ExerciseProgressRecord]) -> Result<()> {
        self.update(|d| {
            d.insert_progress(records);
            Ok(())
        })
    }

    fn increment_progress(
        &self,
        user_id: &str,
        exercise_id: &str,
        delta: u32,
    ) -> Result<ExerciseProgressRecord> {
        self.update(|d| Ok(d.increment_progress(user_id, exercise_id, delta)))
    }

    fn count_progress(&self, user_id: &str, exercise_id: &str) -> Result<usize> {
        self.read(|d| d.count_progress(user_id, exercise_id))
    }

    fn update_progress_value(
        &self,
        user_id: &str,
        exercise_id: &str,
        value: u32,
    ) -> Result<usize> {
        self.update(|d| Ok(d.update_progress_value(user_id, exercise_id, value)))
    }

    fn delete_progress(&self, ids: &[Uuid]) -> Result<()> {
        self.update(|d| {
            d.delete_progress(ids);
            Ok(())
        })
    }

    fn delete_user_progress(&self, user_id: &str) -> Result<usize> {
        self.update(|d| Ok(d.delete_user_progress(user_id)))
    }

    fn has_completed_day(&self, user_id: &str, date: NaiveDate) -> Result<bool> {
        self.read(|d| d.has_completed_day(user_id, date))
    }

    fn insert_completed_day(&self, entry: &CompletedDay) -> Result<()> {
        self.update(|d| {
            d.insert_completed_day(entry);
            Ok(())
        })
    }
}
