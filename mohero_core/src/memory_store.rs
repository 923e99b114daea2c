//! In-process store backed by a mutex.
//!
//! Used by tests and as a drop-in fake for the remote backend. Individual
//! calls can be made to fail to exercise the tracker's fallback paths.

use crate::store::{ProgramStore, StoreData};
use crate::{
    Catalog, CompletedDay, DayWithExercises, Error, ExerciseCategory, ExerciseDefinition,
    ExerciseProgressRecord, Profile, Program, Result,
};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Store calls that can be forced to fail
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fault {
    DayRead,
    ProgressRead,
    ProgressInsert,
    Increment,
    /// `count_progress` and `update_progress_value`
    FallbackWrite,
    ProgressWipe,
    Quotes,
    ProfileWrite,
}

/// Mutex-guarded [`StoreData`]
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: Mutex<StoreData>,
    faults: Mutex<HashSet<Fault>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: &Catalog) -> Self {
        Self::from_data(StoreData::from_catalog(catalog))
    }

    pub fn from_data(data: StoreData) -> Self {
        Self {
            data: Mutex::new(data),
            faults: Mutex::new(HashSet::new()),
        }
    }

    /// Make calls guarded by `fault` fail (or succeed again)
    pub fn set_fault(&self, fault: Fault, failing: bool) {
        let mut faults = self
            .faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if failing {
            faults.insert(fault);
        } else {
            faults.remove(&fault);
        }
    }

    /// Copy of every row, for assertions
    pub fn snapshot(&self) -> StoreData {
        self.data().clone()
    }

    /// Direct row access, for arranging fixtures
    pub fn with_data<T>(&self, f: impl FnOnce(&mut StoreData) -> T) -> T {
        f(&mut self.data())
    }

    fn data(&self) -> MutexGuard<'_, StoreData> {
        self.data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, fault: Fault) -> Result<()> {
        let faults = self
            .faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if faults.contains(&fault) {
            return Err(Error::Store(format!("injected {:?} failure", fault)));
        }
        Ok(())
    }
}

impl ProgramStore for InMemoryStore {
    fn list_programs(&self) -> Result<Vec<Program>> {
        Ok(self.data().list_programs())
    }

    fn load_day(&self, program_id: &str, day_number: u32) -> Result<Option<DayWithExercises>> {
        self.check(Fault::DayRead)?;
        Ok(self.data().load_day(program_id, day_number))
    }

    fn list_exercises(&self) -> Result<Vec<ExerciseDefinition>> {
        Ok(self.data().exercises.clone())
    }

    fn set_exercise_category(&self, exercise_id: &str, category: ExerciseCategory) -> Result<()> {
        self.data().set_exercise_category(exercise_id, category)
    }

    fn list_quotes(&self) -> Result<Vec<String>> {
        self.check(Fault::Quotes)?;
        Ok(self.data().quotes.clone())
    }

    fn load_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        Ok(self.data().load_profile(user_id))
    }

    fn save_profile(&self, profile: &Profile) -> Result<()> {
        self.check(Fault::ProfileWrite)?;
        self.data().save_profile(profile);
        Ok(())
    }

    fn list_profiles(&self) -> Result<Vec<Profile>> {
        Ok(self.data().profiles.clone())
    }

    fn list_progress(
        &self,
        user_id: &str,
        exercise_ids: &[String],
    ) -> Result<Vec<ExerciseProgressRecord>> {
        self.check(Fault::ProgressRead)?;
        Ok(self.data().list_progress(user_id, exercise_ids))
    }

    fn list_user_progress(&self, user_id: &str) -> Result<Vec<ExerciseProgressRecord>> {
        self.check(Fault::ProgressRead)?;
        Ok(self.data().list_user_progress(user_id))
    }

    fn insert_progress(&self, records: &[ExerciseProgressRecord]) -> Result<()> {
        self.check(Fault::ProgressInsert)?;
        self.data().insert_progress(records);
        Ok(())
    }

    fn increment_progress(
        &self,
        user_id: &str,
        exercise_id: &str,
        delta: u32,
    ) -> Result<ExerciseProgressRecord> {
        self.check(Fault::Increment)?;
        Ok(self.data().increment_progress(user_id, exercise_id, delta))
    }

    fn count_progress(&self, user_id: &str, exercise_id: &str) -> Result<usize> {
        self.check(Fault::FallbackWrite)?;
        Ok(self.data().count_progress(user_id, exercise_id))
    }

    fn update_progress_value(
        &self,
        user_id: &str,
        exercise_id: &str,
        value: u32,
    ) -> Result<usize> {
        self.check(Fault::FallbackWrite)?;
        Ok(self.data().update_progress_value(user_id, exercise_id, value))
    }

    fn delete_progress(&self, ids: &[Uuid]) -> Result<()> {
        self.data().delete_progress(ids);
        Ok(())
    }

    fn delete_user_progress(&self, user_id: &str) -> Result<usize> {
        self.check(Fault::ProgressWipe)?;
        Ok(self.data().delete_user_progress(user_id))
    }

    fn has_completed_day(&self, user_id: &str, date: NaiveDate) -> Result<bool> {
        Ok(self.data().has_completed_day(user_id, date))
    }

    fn insert_completed_day(&self, entry: &CompletedDay) -> Result<()> {
        self.data().insert_completed_day(entry);
        Ok(())
    }
}
