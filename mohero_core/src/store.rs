//! Remote store abstraction.
//!
//! The tracker talks to its backend only through [`ProgramStore`], a typed
//! read/filter/insert/update/delete surface over the collections the app
//! uses (profiles, programs, days, exercises, progress, completed days,
//! quotes). Every call is expected to be atomic on its own; nothing spans
//! calls.
//!
//! [`StoreData`] holds the rows themselves and implements the row-level
//! semantics once, so the in-memory and file-backed stores only differ in
//! where the rows live and how access is serialized.

use crate::{
    Catalog, CompletedDay, DayWithExercises, ExerciseCategory, ExerciseDefinition,
    ExerciseProgressRecord, Profile, Program, Result,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Backend operations used by the tracker and maintenance routines
pub trait ProgramStore: Send + Sync {
    // === Catalog ===

    /// All programs, ordered by id
    fn list_programs(&self) -> Result<Vec<Program>>;

    /// Day `day_number` of a program joined with its exercises
    fn load_day(&self, program_id: &str, day_number: u32) -> Result<Option<DayWithExercises>>;

    fn list_exercises(&self) -> Result<Vec<ExerciseDefinition>>;

    fn set_exercise_category(&self, exercise_id: &str, category: ExerciseCategory) -> Result<()>;

    /// Motivational quote pool
    fn list_quotes(&self) -> Result<Vec<String>>;

    // === Profiles ===

    fn load_profile(&self, user_id: &str) -> Result<Option<Profile>>;

    /// Create or replace the profile row
    fn save_profile(&self, profile: &Profile) -> Result<()>;

    fn list_profiles(&self) -> Result<Vec<Profile>>;

    // === Exercise progress ===

    /// Progress rows of a user restricted to `exercise_ids`
    fn list_progress(
        &self,
        user_id: &str,
        exercise_ids: &[String],
    ) -> Result<Vec<ExerciseProgressRecord>>;

    /// Every progress row of a user
    fn list_user_progress(&self, user_id: &str) -> Result<Vec<ExerciseProgressRecord>>;

    fn insert_progress(&self, records: &[ExerciseProgressRecord]) -> Result<()>;

    /// Atomically add `delta` to the (user, exercise) row, creating it when
    /// absent, and return the row as stored
    fn increment_progress(
        &self,
        user_id: &str,
        exercise_id: &str,
        delta: u32,
    ) -> Result<ExerciseProgressRecord>;

    /// Number of rows for (user, exercise)
    fn count_progress(&self, user_id: &str, exercise_id: &str) -> Result<usize>;

    /// Overwrite the value of every (user, exercise) row, returning the count
    fn update_progress_value(&self, user_id: &str, exercise_id: &str, value: u32)
        -> Result<usize>;

    fn delete_progress(&self, ids: &[Uuid]) -> Result<()>;

    /// Drop every progress row of a user, returning the count
    fn delete_user_progress(&self, user_id: &str) -> Result<usize>;

    // === Completed-day log ===

    fn has_completed_day(&self, user_id: &str, date: NaiveDate) -> Result<bool>;

    fn insert_completed_day(&self, entry: &CompletedDay) -> Result<()>;
}

/// All rows of the backend
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub programs: Vec<Program>,
    #[serde(default)]
    pub days: Vec<crate::DayDefinition>,
    #[serde(default)]
    pub exercises: Vec<ExerciseDefinition>,
    #[serde(default)]
    pub quotes: Vec<String>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub progress: Vec<ExerciseProgressRecord>,
    #[serde(default)]
    pub completed_days: Vec<CompletedDay>,
}

impl StoreData {
    /// Rows for a freshly seeded backend
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut data = Self::default();
        data.import_catalog(catalog);
        data
    }

    /// Replace catalog collections, leaving user rows untouched
    pub fn import_catalog(&mut self, catalog: &Catalog) {
        let mut programs: Vec<_> = catalog.programs.values().cloned().collect();
        programs.sort_by(|a, b| a.id.cmp(&b.id));
        self.programs = programs;

        self.days = catalog.days.clone();

        let mut exercises: Vec<_> = catalog.exercises.values().cloned().collect();
        exercises.sort_by(|a, b| a.id.cmp(&b.id));
        self.exercises = exercises;

        self.quotes = catalog.quotes.clone();
    }

    pub fn list_programs(&self) -> Vec<Program> {
        let mut programs = self.programs.clone();
        programs.sort_by(|a, b| a.id.cmp(&b.id));
        programs
    }

    pub fn load_day(&self, program_id: &str, day_number: u32) -> Option<DayWithExercises> {
        let day = self
            .days
            .iter()
            .find(|d| d.program_id == program_id && d.day_number == day_number)?;

        let exercises = day
            .exercise_ids
            .iter()
            .filter_map(|id| {
                let found = self.exercises.iter().find(|e| &e.id == id);
                if found.is_none() {
                    tracing::warn!("Day {} references unknown exercise {}", day.id, id);
                }
                found.cloned()
            })
            .collect();

        Some(DayWithExercises {
            day: day.clone(),
            exercises,
        })
    }

    pub fn set_exercise_category(
        &mut self,
        exercise_id: &str,
        category: ExerciseCategory,
    ) -> Result<()> {
        let exercise = self
            .exercises
            .iter_mut()
            .find(|e| e.id == exercise_id)
            .ok_or_else(|| crate::Error::NotFound(format!("exercise {}", exercise_id)))?;
        exercise.category = Some(category);
        Ok(())
    }

    pub fn load_profile(&self, user_id: &str) -> Option<Profile> {
        self.profiles.iter().find(|p| p.user_id == user_id).cloned()
    }

    pub fn save_profile(&mut self, profile: &Profile) {
        match self.profiles.iter_mut().find(|p| p.user_id == profile.user_id) {
            Some(existing) => *existing = profile.clone(),
            None => self.profiles.push(profile.clone()),
        }
    }

    pub fn list_progress(&self, user_id: &str, exercise_ids: &[String]) -> Vec<ExerciseProgressRecord> {
        let wanted: HashSet<&str> = exercise_ids.iter().map(String::as_str).collect();
        self.progress
            .iter()
            .filter(|r| r.user_id == user_id && wanted.contains(r.exercise_id.as_str()))
            .cloned()
            .collect()
    }

    pub fn list_user_progress(&self, user_id: &str) -> Vec<ExerciseProgressRecord> {
        self.progress
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn insert_progress(&mut self, records: &[ExerciseProgressRecord]) {
        self.progress.extend_from_slice(records);
    }

    pub fn increment_progress(
        &mut self,
        user_id: &str,
        exercise_id: &str,
        delta: u32,
    ) -> ExerciseProgressRecord {
        let existing = self
            .progress
            .iter_mut()
            .filter(|r| r.user_id == user_id && r.exercise_id == exercise_id)
            .max_by_key(|r| r.value);

        match existing {
            Some(record) => {
                record.value = record.value.saturating_add(delta);
                record.clone()
            }
            None => {
                let record = ExerciseProgressRecord::new(user_id, exercise_id, delta);
                self.progress.push(record.clone());
                record
            }
        }
    }

    pub fn count_progress(&self, user_id: &str, exercise_id: &str) -> usize {
        self.progress
            .iter()
            .filter(|r| r.user_id == user_id && r.exercise_id == exercise_id)
            .count()
    }

    pub fn update_progress_value(&mut self, user_id: &str, exercise_id: &str, value: u32) -> usize {
        let mut updated = 0;
        for record in self
            .progress
            .iter_mut()
            .filter(|r| r.user_id == user_id && r.exercise_id == exercise_id)
        {
            record.value = value;
            updated += 1;
        }
        updated
    }

    pub fn delete_progress(&mut self, ids: &[Uuid]) {
        let doomed: HashSet<&Uuid> = ids.iter().collect();
        self.progress.retain(|r| !doomed.contains(&r.id));
    }

    pub fn delete_user_progress(&mut self, user_id: &str) -> usize {
        let before = self.progress.len();
        self.progress.retain(|r| r.user_id != user_id);
        before - self.progress.len()
    }

    pub fn has_completed_day(&self, user_id: &str, date: NaiveDate) -> bool {
        self.completed_days
            .iter()
            .any(|d| d.user_id == user_id && d.completed_on == date)
    }

    pub fn insert_completed_day(&mut self, entry: &CompletedDay) {
        self.completed_days.push(entry.clone());
    }
}
