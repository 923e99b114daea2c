//! Program progression tracker.
//!
//! Owns the user's current program, day cursor and today's ritual, and
//! reconciles them with the store:
//! - `select_program` wipes progress and restarts at day 1
//! - `get_current_day_ritual` rebuilds the ritual, lazily creating zero rows
//! - `update_exercise_progress` applies an optimistic draft, then persists
//! - `complete_day` records streak statistics without moving the cursor
//! - `advance_day` / `check_day_rollover` move the cursor
//!
//! Day cursor states are `Day(n)` for `1 <= n <= duration` and `Finished`
//! (`n = duration + 1`). Only `select_program` leaves `Finished`.

use crate::clock::{Clock, SystemClock};
use crate::stats::{self, DayMark};
use crate::store::ProgramStore;
use crate::{
    Config, DailyRitual, Error, Exercise, ExerciseProgressRecord, Profile, Program, Result,
    UserId, UserProgramState,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;

/// How a progress increment reached the store
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressWrite {
    /// Atomic server-side increment; `value` is the stored total
    Incremented { value: u32 },
    /// Existence check then explicit update or insert of `value`
    Fallback { value: u32 },
    /// Both paths failed; the local draft is kept and marked unconfirmed
    Unconfirmed,
}

impl ProgressWrite {
    pub fn is_confirmed(&self) -> bool {
        !matches!(self, ProgressWrite::Unconfirmed)
    }
}

/// Result of a day-cursor check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DayTransition {
    /// Cursor moved to `day`
    Advanced { day: u32 },
    /// Cursor moved past the last day
    Finished,
    /// The current day still has incomplete exercises
    NotReady,
    /// Nothing to do (same calendar day, or program already finished)
    Unchanged,
}

/// Tracks one user's progression through a program
pub struct ProgramTracker<S: ProgramStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    user_id: Option<UserId>,
    default_quote: String,
    rng: StdRng,
    programs: Vec<Program>,
    current_program: Option<Program>,
    user_program: Option<UserProgramState>,
    current_ritual: Option<DailyRitual>,
    loading: bool,
}

impl<S: ProgramStore, C: Clock> ProgramTracker<S, C> {
    /// Create a tracker; call [`load`](Self::load) before using it
    pub fn new(store: S, clock: C, user_id: Option<UserId>) -> Self {
        Self {
            store,
            clock,
            user_id,
            default_quote: crate::config::default_quote(),
            rng: StdRng::from_entropy(),
            programs: Vec::new(),
            current_program: None,
            user_program: None,
            current_ritual: None,
            loading: true,
        }
    }

    /// Apply user and ritual settings from the configuration
    pub fn with_config(mut self, config: &Config) -> Self {
        if self.user_id.is_none() {
            self.user_id = config.user.user_id.clone();
        }
        self.default_quote = config.ritual.default_quote.clone();
        self
    }

    /// Deterministic quote selection
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    pub fn current_program(&self) -> Option<&Program> {
        self.current_program.as_ref()
    }

    pub fn user_program(&self) -> Option<&UserProgramState> {
        self.user_program.as_ref()
    }

    pub fn current_day(&self) -> Option<u32> {
        self.user_program.as_ref().map(|s| s.current_day)
    }

    pub fn current_ritual(&self) -> Option<&DailyRitual> {
        self.current_ritual.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True once the cursor passed the last day
    pub fn is_finished(&self) -> bool {
        match (&self.current_program, &self.user_program) {
            (Some(program), Some(state)) => state.current_day > program.duration_days,
            _ => false,
        }
    }

    /// Load the catalog and the user's program association
    pub fn load(&mut self) -> Result<()> {
        self.loading = true;
        let result = self.load_inner();
        self.loading = false;
        result
    }

    fn load_inner(&mut self) -> Result<()> {
        self.programs = self.store.list_programs()?;
        tracing::debug!("Loaded {} programs", self.programs.len());

        self.current_program = None;
        self.user_program = None;
        self.current_ritual = None;

        let Some(user_id) = self.user_id.clone() else {
            tracing::info!("No signed-in user; catalog only");
            return Ok(());
        };

        let Some(profile) = self.store.load_profile(&user_id)? else {
            tracing::debug!("No profile for {}", user_id);
            return Ok(());
        };

        let Some(program_id) = profile.program_id else {
            return Ok(());
        };

        let Some(program) = self.programs.iter().find(|p| p.id == program_id).cloned() else {
            tracing::warn!("Profile of {} references unknown program {}", user_id, program_id);
            return Ok(());
        };

        let mut state = match profile.progress {
            Some(state) if state.program_id == program.id => state,
            _ => UserProgramState::start(&program.id, self.clock.now()),
        };
        state.current_day = state.current_day.clamp(1, program.finished_day());

        tracing::info!(
            "Resuming {} at day {}/{}",
            program.id,
            state.current_day,
            program.duration_days
        );
        self.current_program = Some(program);
        self.user_program = Some(state);
        Ok(())
    }

    /// Switch the user to `program_id`, discarding all exercise progress
    ///
    /// The progress wipe is best-effort: if it fails the switch still
    /// happens and stale rows may remain.
    pub fn select_program(&mut self, program_id: &str) -> Result<Program> {
        self.loading = true;
        let result = self.select_program_inner(program_id);
        self.loading = false;
        result
    }

    fn select_program_inner(&mut self, program_id: &str) -> Result<Program> {
        let user_id = self.require_user()?;
        let program = self
            .programs
            .iter()
            .find(|p| p.id == program_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("program {}", program_id)))?;

        match self.store.delete_user_progress(&user_id) {
            Ok(count) => tracing::debug!("Cleared {} progress rows for {}", count, user_id),
            Err(e) => tracing::warn!("Failed to clear progress for {}: {}", user_id, e),
        }

        let state = UserProgramState::start(&program.id, self.clock.now());

        let mut profile = self
            .store
            .load_profile(&user_id)?
            .unwrap_or_else(|| Profile::new(&user_id));
        profile.program_id = Some(program.id.clone());
        profile.progress = Some(state.clone());
        self.store.save_profile(&profile)?;

        tracing::info!("{} selected program {}", user_id, program.id);

        self.current_program = Some(program.clone());
        self.user_program = Some(state);
        self.current_ritual = None;
        Ok(program)
    }

    /// Build the ritual for the current day
    ///
    /// Returns `None` once the program is finished. A transient failure
    /// reading the day falls back to the cached ritual for the same day.
    pub fn get_current_day_ritual(&mut self) -> Result<Option<DailyRitual>> {
        self.require_user()?;
        let program = self
            .current_program
            .clone()
            .ok_or_else(|| Error::Precondition("no program selected".into()))?;
        let day = self
            .current_day()
            .ok_or_else(|| Error::Precondition("no program selected".into()))?;

        if day > program.duration_days {
            tracing::info!("Program {} finished; no ritual", program.id);
            self.current_ritual = None;
            return Ok(None);
        }

        let definition = match self.store.load_day(&program.id, day) {
            Ok(Some(definition)) => definition,
            Ok(None) => {
                return Err(Error::NotFound(format!("day {} of program {}", day, program.id)))
            }
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                if let Some(cached) = self.cached_ritual(&program.id, day) {
                    tracing::warn!("Failed to load day {}: {}. Keeping cached ritual.", day, e);
                    return Ok(Some(cached.clone()));
                }
                return Err(Error::Unavailable(format!("day {}: {}", day, e)));
            }
        };

        let exercise_ids: Vec<String> = definition.exercises.iter().map(|e| e.id.clone()).collect();
        let cached = self.cached_ritual(&program.id, day).cloned();

        let progress = match self.get_or_create_progress(&exercise_ids) {
            Ok(progress) => progress,
            Err(e) => {
                tracing::warn!("Failed to load exercise progress: {}. Using last known values.", e);
                cached
                    .iter()
                    .flat_map(|r| r.exercises.iter())
                    .map(|e| (e.id.clone(), e.completed_reps.saturating_sub(e.unconfirmed_reps)))
                    .collect()
            }
        };

        let mut defs = definition.exercises;
        defs.sort_by_key(|e| e.order);

        let exercises = defs
            .iter()
            .map(|def| {
                let stored = progress.get(&def.id).copied().unwrap_or(0);
                let mut exercise = Exercise::from_definition(def, stored);
                // Keep drafts the store has not acknowledged yet
                if let Some(draft) = cached.as_ref().and_then(|r| r.exercise(&def.id)) {
                    exercise.completed_reps =
                        exercise.completed_reps.saturating_add(draft.unconfirmed_reps);
                    exercise.unconfirmed_reps = draft.unconfirmed_reps;
                }
                exercise
            })
            .collect();

        let quote = self.pick_quote(definition.day.quote);

        let ritual = DailyRitual {
            id: definition.day.id,
            program_id: program.id.clone(),
            day,
            quote,
            exercises,
        };

        self.current_ritual = Some(ritual.clone());
        Ok(Some(ritual))
    }

    /// Stored progress for `exercise_ids`, inserting zero rows for the
    /// exercises that have none
    ///
    /// A missing row and a zero row mean the same thing, so a failed insert
    /// is logged and the exercise still reports 0. Duplicate rows report
    /// their maximum.
    pub fn get_or_create_progress(&self, exercise_ids: &[String]) -> Result<HashMap<String, u32>> {
        let user_id = self.require_user()?;
        if exercise_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut progress: HashMap<String, u32> = HashMap::new();
        for record in self.store.list_progress(&user_id, exercise_ids)? {
            let value = progress.entry(record.exercise_id).or_insert(0);
            *value = (*value).max(record.value);
        }

        let mut missing: Vec<ExerciseProgressRecord> = Vec::new();
        for id in exercise_ids {
            if !progress.contains_key(id) {
                progress.insert(id.clone(), 0);
                missing.push(ExerciseProgressRecord::new(&user_id, id, 0));
            }
        }

        if !missing.is_empty() {
            tracing::debug!("Initializing {} progress rows for {}", missing.len(), user_id);
            if let Err(e) = self.store.insert_progress(&missing) {
                tracing::warn!("Failed to initialize progress rows: {}", e);
            }
        }

        Ok(progress)
    }

    /// Add `reps` to an exercise
    ///
    /// The ritual is updated immediately by the full amount. The increment
    /// is then persisted; if that fails the draft stays in place and is
    /// marked unconfirmed for [`retry_unconfirmed`](Self::retry_unconfirmed).
    /// No clamping happens here; see [`clamp_increment`](Self::clamp_increment).
    /// Exercises outside the current ritual are rejected before any store call.
    pub fn update_exercise_progress(&mut self, exercise_id: &str, reps: u32) -> Result<ProgressWrite> {
        let user_id = self.require_user()?;
        if reps == 0 {
            return Err(Error::Precondition("increment must be positive".into()));
        }

        let exercise = self
            .current_ritual
            .as_mut()
            .and_then(|r| r.exercise_mut(exercise_id))
            .ok_or_else(|| Error::NotFound(format!("exercise {} in current ritual", exercise_id)))?;

        exercise.completed_reps = exercise.completed_reps.saturating_add(reps);
        exercise.unconfirmed_reps = exercise.unconfirmed_reps.saturating_add(reps);
        tracing::debug!(
            "Exercise {} now at {}/{}",
            exercise_id,
            exercise.completed_reps,
            exercise.target_reps
        );

        let write = self.persist_increment(&user_id, exercise_id, reps);
        self.settle(&user_id, exercise_id, reps, write);
        Ok(write)
    }

    /// Re-send every unconfirmed draft, returning how many were confirmed
    pub fn retry_unconfirmed(&mut self) -> Result<usize> {
        let user_id = self.require_user()?;
        let pending: Vec<(String, u32)> = self
            .current_ritual
            .iter()
            .flat_map(|r| r.exercises.iter())
            .filter(|e| e.unconfirmed_reps > 0)
            .map(|e| (e.id.clone(), e.unconfirmed_reps))
            .collect();

        let mut confirmed = 0;
        for (exercise_id, reps) in pending {
            let write = self.persist_increment(&user_id, &exercise_id, reps);
            self.settle(&user_id, &exercise_id, reps, write);
            if write.is_confirmed() {
                confirmed += 1;
            }
        }
        Ok(confirmed)
    }

    /// Largest increment that does not overshoot the exercise's target
    ///
    /// Returns 0 for exercises outside the current ritual.
    pub fn clamp_increment(&self, exercise_id: &str, requested: u32) -> u32 {
        self.current_ritual
            .as_ref()
            .and_then(|r| r.exercise(exercise_id))
            .map(|e| requested.min(e.remaining_reps()))
            .unwrap_or(0)
    }

    pub fn is_ritual_complete(&self) -> bool {
        self.current_ritual
            .as_ref()
            .map(DailyRitual::is_complete)
            .unwrap_or(false)
    }

    /// Fraction of today's reps done, in `[0, 1]`
    pub fn daily_progress(&self) -> f64 {
        self.current_ritual
            .as_ref()
            .map(DailyRitual::progress)
            .unwrap_or(0.0)
    }

    /// Record today's completion in the user's statistics
    ///
    /// Returns `false` without side effects unless a ritual is loaded and
    /// every exercise reached its target. Completing twice on the same date
    /// counts once. The day cursor does not move.
    pub fn complete_day(&mut self) -> Result<bool> {
        let user_id = self.require_user()?;

        let Some(ritual) = self.current_ritual.as_ref() else {
            tracing::debug!("No ritual loaded; cannot complete day");
            return Ok(false);
        };
        if !ritual.is_complete() {
            tracing::debug!("Ritual for day {} not complete", ritual.day);
            return Ok(false);
        }
        if ritual.has_unconfirmed() {
            tracing::warn!("Completing day {} with unconfirmed progress", ritual.day);
        }

        match stats::mark_day_completed(&self.store, &user_id, self.clock.today())? {
            DayMark::Recorded(_) | DayMark::AlreadyRecorded => Ok(true),
        }
    }

    /// Move the cursor to the next day once the current one is complete
    ///
    /// Completion is verified against a freshly loaded ritual when the
    /// cached one is for another day.
    pub fn advance_day(&mut self) -> Result<DayTransition> {
        let user_id = self.require_user()?;
        let program = self
            .current_program
            .clone()
            .ok_or_else(|| Error::Precondition("no program selected".into()))?;
        let mut state = self
            .user_program
            .clone()
            .ok_or_else(|| Error::Precondition("no program selected".into()))?;

        if state.current_day > program.duration_days {
            return Ok(DayTransition::Unchanged);
        }

        if self.cached_ritual(&program.id, state.current_day).is_none() {
            self.get_current_day_ritual()?;
        }
        if !self.is_ritual_complete() {
            return Ok(DayTransition::NotReady);
        }

        let next = state.current_day + 1;
        state.current_day = next;
        state.last_updated = self.clock.now();
        state.completed = next > program.duration_days;

        let mut profile = self
            .store
            .load_profile(&user_id)?
            .unwrap_or_else(|| Profile::new(&user_id));
        profile.program_id = Some(program.id.clone());
        profile.progress = Some(state.clone());
        self.store.save_profile(&profile)?;

        let transition = if state.completed {
            tracing::info!("{} finished program {}", user_id, program.id);
            DayTransition::Finished
        } else {
            tracing::info!("{} advanced to day {} of {}", user_id, next, program.id);
            DayTransition::Advanced { day: next }
        };

        self.user_program = Some(state);
        self.current_ritual = None;
        Ok(transition)
    }

    /// Periodic calendar-boundary check
    ///
    /// Advances at most once per new calendar day, and only when the
    /// current day's exercises are all complete.
    pub fn check_day_rollover(&mut self) -> Result<DayTransition> {
        let state = self
            .user_program
            .as_ref()
            .ok_or_else(|| Error::Precondition("no program selected".into()))?;

        let today = self.clock.today();
        let last = state.last_updated.date_naive();
        if today <= last {
            return Ok(DayTransition::Unchanged);
        }

        tracing::debug!("New calendar day {} (last update {})", today, last);
        self.advance_day()
    }

    fn require_user(&self) -> Result<UserId> {
        self.user_id.clone().ok_or(Error::Unauthenticated)
    }

    fn cached_ritual(&self, program_id: &str, day: u32) -> Option<&DailyRitual> {
        self.current_ritual
            .as_ref()
            .filter(|r| r.program_id == program_id && r.day == day)
    }

    fn pick_quote(&mut self, day_quote: Option<String>) -> String {
        let pool = match self.store.list_quotes() {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!("Failed to load quotes: {}", e);
                Vec::new()
            }
        };

        pool.choose(&mut self.rng)
            .cloned()
            .or(day_quote)
            .unwrap_or_else(|| self.default_quote.clone())
    }

    /// Write an increment: reconcile duplicates, atomic increment, then one
    /// existence-check fallback
    fn persist_increment(&self, user_id: &str, exercise_id: &str, reps: u32) -> ProgressWrite {
        let ids = [exercise_id.to_string()];
        let base = match self.store.list_progress(user_id, &ids) {
            Ok(records) => Some(self.reconcile_duplicates(records)),
            Err(e) => {
                tracing::warn!("Failed to read progress for {}: {}", exercise_id, e);
                None
            }
        };

        match self.store.increment_progress(user_id, exercise_id, reps) {
            Ok(record) => return ProgressWrite::Incremented { value: record.value },
            Err(e) => tracing::warn!("Increment of {} failed: {}. Trying fallback.", exercise_id, e),
        }

        // The fallback writes an absolute value, so it needs a known base
        let Some(base) = base else {
            tracing::error!("Progress for {} left unconfirmed", exercise_id);
            return ProgressWrite::Unconfirmed;
        };
        let value = base.saturating_add(reps);

        let written = self.store.count_progress(user_id, exercise_id).and_then(|count| {
            if count > 0 {
                self.store
                    .update_progress_value(user_id, exercise_id, value)
                    .map(|_| ())
            } else {
                self.store
                    .insert_progress(&[ExerciseProgressRecord::new(user_id, exercise_id, value)])
            }
        });

        match written {
            Ok(()) => ProgressWrite::Fallback { value },
            Err(e) => {
                tracing::error!(
                    "Fallback write for {} failed: {}. Progress left unconfirmed.",
                    exercise_id,
                    e
                );
                ProgressWrite::Unconfirmed
            }
        }
    }

    /// Keep the highest of several rows for one exercise, returning its value
    fn reconcile_duplicates(&self, mut records: Vec<ExerciseProgressRecord>) -> u32 {
        records.sort_by(|a, b| b.value.cmp(&a.value));
        let Some(kept) = records.first() else {
            return 0;
        };

        if records.len() > 1 {
            let doomed: Vec<_> = records[1..].iter().map(|r| r.id).collect();
            tracing::warn!(
                "Found {} progress rows for {}; keeping {}",
                records.len(),
                kept.exercise_id,
                kept.value
            );
            if let Err(e) = self.store.delete_progress(&doomed) {
                tracing::warn!("Failed to delete duplicate progress rows: {}", e);
            }
        }
        kept.value
    }

    /// Clear the draft once confirmed and bump category counters
    fn settle(&mut self, user_id: &str, exercise_id: &str, reps: u32, write: ProgressWrite) {
        let draft = self
            .current_ritual
            .as_mut()
            .and_then(|r| r.exercise_mut(exercise_id));

        if !write.is_confirmed() {
            return;
        }

        let Some(exercise) = draft else {
            return;
        };
        exercise.unconfirmed_reps = exercise.unconfirmed_reps.saturating_sub(reps);
        let category = exercise.category;

        match category {
            Some(category) => {
                if let Err(e) = stats::record_category_reps(&self.store, user_id, category, reps) {
                    tracing::warn!("Failed to update {:?} counter: {}", category, e);
                }
            }
            None => tracing::debug!("Exercise {} has no category; counters untouched", exercise_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::memory_store::{Fault, InMemoryStore};
    use crate::{build_default_catalog, ExerciseCategory};
    use chrono::NaiveDate;

    type TestTracker = ProgramTracker<InMemoryStore, FixedClock>;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tracker_for(user: Option<&str>) -> TestTracker {
        crate::logging::init_test();
        let store = InMemoryStore::with_catalog(&build_default_catalog());
        let clock = FixedClock::at_date(date(2024, 6, 3));
        let mut tracker = ProgramTracker::new(store, clock, user.map(Into::into)).with_seed(7);
        tracker.load().unwrap();
        tracker
    }

    fn started(program_id: &str) -> TestTracker {
        let mut tracker = tracker_for(Some("u"));
        tracker.select_program(program_id).unwrap();
        tracker.get_current_day_ritual().unwrap();
        tracker
    }

    fn finish_ritual(tracker: &mut TestTracker) {
        let pending: Vec<(String, u32)> = tracker
            .current_ritual()
            .unwrap()
            .exercises
            .iter()
            .map(|e| (e.id.clone(), e.remaining_reps()))
            .filter(|(_, remaining)| *remaining > 0)
            .collect();
        for (id, remaining) in pending {
            tracker.update_exercise_progress(&id, remaining).unwrap();
        }
    }

    #[test]
    fn test_load_without_profile_has_no_program() {
        let tracker = tracker_for(Some("u"));
        assert!(!tracker.is_loading());
        assert_eq!(tracker.programs().len(), 2);
        assert!(tracker.current_program().is_none());
        assert!(tracker.current_day().is_none());
    }

    #[test]
    fn test_unauthenticated_calls_are_rejected() {
        let mut tracker = tracker_for(None);
        assert!(matches!(
            tracker.select_program("eveil"),
            Err(Error::Unauthenticated)
        ));
        assert!(matches!(
            tracker.get_or_create_progress(&["x".into()]),
            Err(Error::Unauthenticated)
        ));
    }

    #[test]
    fn test_select_unknown_program_is_not_found() {
        let mut tracker = tracker_for(Some("u"));
        assert!(matches!(
            tracker.select_program("nope"),
            Err(Error::NotFound(_))
        ));
        assert!(tracker.current_program().is_none());
    }

    #[test]
    fn test_ritual_starts_at_zero_and_creates_rows() {
        let tracker = started("eveil");
        let ritual = tracker.current_ritual().unwrap();

        assert_eq!(ritual.day, 1);
        assert_eq!(ritual.id, "eveil_j1");
        assert_eq!(ritual.exercises.len(), 2);
        assert!(ritual.exercises.iter().all(|e| e.completed_reps == 0));
        assert_eq!(ritual.exercises[0].order, 1);
        assert_eq!(tracker.store().snapshot().progress.len(), 2);
        assert!(!ritual.quote.is_empty());
    }

    #[test]
    fn test_ritual_reads_max_of_duplicate_rows() {
        let mut tracker = started("eveil");
        let id = tracker.current_ritual().unwrap().exercises[0].id.clone();
        tracker.store().with_data(|d| {
            d.progress.retain(|r| r.exercise_id != id);
            d.progress.push(ExerciseProgressRecord::new("u", &id, 3));
            d.progress.push(ExerciseProgressRecord::new("u", &id, 7));
        });

        let ritual = tracker.get_current_day_ritual().unwrap().unwrap();
        assert_eq!(ritual.exercise(&id).unwrap().completed_reps, 7);
    }

    #[test]
    fn test_increment_reconciles_duplicates_to_max_plus_delta() {
        let mut tracker = started("eveil");
        let id = tracker.current_ritual().unwrap().exercises[1].id.clone();
        tracker.store().with_data(|d| {
            d.progress.retain(|r| r.exercise_id != id);
            d.progress.push(ExerciseProgressRecord::new("u", &id, 3));
            d.progress.push(ExerciseProgressRecord::new("u", &id, 7));
        });

        let write = tracker.update_exercise_progress(&id, 4).unwrap();
        assert_eq!(write, ProgressWrite::Incremented { value: 11 });

        let rows = tracker.store().snapshot().progress;
        let rows: Vec<_> = rows.iter().filter(|r| r.exercise_id == id).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 11);
    }

    #[test]
    fn test_increment_updates_ritual_and_category_counter() {
        let mut tracker = started("eveil");
        let id = "eveil_j1_pompes";

        let write = tracker.update_exercise_progress(id, 6).unwrap();
        assert_eq!(write, ProgressWrite::Incremented { value: 6 });

        let exercise = tracker.current_ritual().unwrap().exercise(id).unwrap();
        assert_eq!(exercise.completed_reps, 6);
        assert_eq!(exercise.unconfirmed_reps, 0);

        let stats = stats::fetch_user_stats(tracker.store(), "u").unwrap();
        assert_eq!(stats.total_push, 6);
        assert_eq!(stats.total_leg, 0);
    }

    #[test]
    fn test_zero_increment_is_rejected() {
        let mut tracker = started("eveil");
        assert!(matches!(
            tracker.update_exercise_progress("eveil_j1_pompes", 0),
            Err(Error::Precondition(_))
        ));
    }

    #[test]
    fn test_huge_increments_saturate() {
        let mut tracker = started("eveil");
        let id = "eveil_j1_pompes";

        tracker.update_exercise_progress(id, u32::MAX).unwrap();
        tracker.update_exercise_progress(id, u32::MAX).unwrap();

        let exercise = tracker.current_ritual().unwrap().exercise(id).unwrap();
        assert_eq!(exercise.completed_reps, u32::MAX);
        assert_eq!(exercise.unconfirmed_reps, 0);
        let rows = tracker.store().snapshot().progress;
        assert_eq!(rows.iter().find(|r| r.exercise_id == id).unwrap().value, u32::MAX);
    }

    #[test]
    fn test_huge_fallback_write_saturates() {
        let mut tracker = started("eveil");
        let id = "eveil_j1_pompes";
        tracker.update_exercise_progress(id, u32::MAX).unwrap();
        tracker.store().set_fault(Fault::Increment, true);

        let write = tracker.update_exercise_progress(id, 1).unwrap();
        assert_eq!(write, ProgressWrite::Fallback { value: u32::MAX });
    }

    #[test]
    fn test_exercise_outside_ritual_is_rejected() {
        let mut tracker = started("eveil");
        let before = tracker.store().snapshot();

        assert!(matches!(
            tracker.update_exercise_progress("eveil_j2_respiration", 3),
            Err(Error::NotFound(_))
        ));

        let after = tracker.store().snapshot();
        assert_eq!(after.progress, before.progress);
        assert_eq!(after.profiles, before.profiles);
    }

    #[test]
    fn test_update_without_ritual_is_rejected() {
        let mut tracker = tracker_for(Some("u"));
        tracker.select_program("eveil").unwrap();

        assert!(matches!(
            tracker.update_exercise_progress("eveil_j1_pompes", 1),
            Err(Error::NotFound(_))
        ));
        assert!(tracker.store().snapshot().progress.is_empty());
    }

    #[test]
    fn test_increment_falls_back_when_atomic_path_fails() {
        let mut tracker = started("eveil");
        let id = "eveil_j1_squats";
        tracker.update_exercise_progress(id, 5).unwrap();

        tracker.store().set_fault(Fault::Increment, true);
        let write = tracker.update_exercise_progress(id, 3).unwrap();
        assert_eq!(write, ProgressWrite::Fallback { value: 8 });

        let rows = tracker.store().snapshot().progress;
        let row = rows.iter().find(|r| r.exercise_id == id).unwrap();
        assert_eq!(row.value, 8);
    }

    #[test]
    fn test_fallback_inserts_when_no_row_exists() {
        let mut tracker = started("eveil");
        let id = "eveil_j1_squats";
        tracker.store().with_data(|d| d.progress.clear());
        tracker.store().set_fault(Fault::Increment, true);

        let write = tracker.update_exercise_progress(id, 2).unwrap();
        assert_eq!(write, ProgressWrite::Fallback { value: 2 });
        assert_eq!(tracker.store().snapshot().progress.len(), 1);
    }

    #[test]
    fn test_failed_write_keeps_draft_until_retry() {
        let mut tracker = started("eveil");
        let id = "eveil_j1_pompes";
        tracker.store().set_fault(Fault::Increment, true);
        tracker.store().set_fault(Fault::FallbackWrite, true);

        let write = tracker.update_exercise_progress(id, 4).unwrap();
        assert_eq!(write, ProgressWrite::Unconfirmed);
        let exercise = tracker.current_ritual().unwrap().exercise(id).unwrap();
        assert_eq!(exercise.completed_reps, 4);
        assert_eq!(exercise.unconfirmed_reps, 4);
        assert!(tracker.current_ritual().unwrap().has_unconfirmed());

        // Rebuilding the ritual keeps the draft on top of stored values
        let ritual = tracker.get_current_day_ritual().unwrap().unwrap();
        assert_eq!(ritual.exercise(id).unwrap().completed_reps, 4);

        tracker.store().set_fault(Fault::Increment, false);
        tracker.store().set_fault(Fault::FallbackWrite, false);
        assert_eq!(tracker.retry_unconfirmed().unwrap(), 1);

        let exercise = tracker.current_ritual().unwrap().exercise(id).unwrap();
        assert_eq!(exercise.completed_reps, 4);
        assert_eq!(exercise.unconfirmed_reps, 0);
        let rows = tracker.store().snapshot().progress;
        assert_eq!(rows.iter().find(|r| r.exercise_id == id).unwrap().value, 4);
        assert_eq!(stats::fetch_user_stats(tracker.store(), "u").unwrap().total_push, 4);
    }

    #[test]
    fn test_unknown_progress_base_skips_fallback() {
        let mut tracker = started("eveil");
        tracker.store().set_fault(Fault::ProgressRead, true);
        tracker.store().set_fault(Fault::Increment, true);

        let write = tracker.update_exercise_progress("eveil_j1_pompes", 2).unwrap();
        assert_eq!(write, ProgressWrite::Unconfirmed);
    }

    #[test]
    fn test_clamp_increment_stops_at_target() {
        let mut tracker = started("eveil");
        let id = "eveil_j1_pompes";
        tracker.update_exercise_progress(id, 8).unwrap();

        assert_eq!(tracker.clamp_increment(id, 5), 2);
        assert_eq!(tracker.clamp_increment(id, 1), 1);
        assert_eq!(tracker.clamp_increment("ghost", 5), 0);
    }

    #[test]
    fn test_overshoot_is_not_clamped_by_update() {
        let mut tracker = started("eveil");
        let id = "eveil_j1_pompes";
        tracker.update_exercise_progress(id, 25).unwrap();

        let exercise = tracker.current_ritual().unwrap().exercise(id).unwrap();
        assert_eq!(exercise.completed_reps, 25);
        assert!(tracker.daily_progress() <= 1.0);
    }

    #[test]
    fn test_daily_progress_fraction() {
        let mut tracker = started("eveil");
        assert_eq!(tracker.daily_progress(), 0.0);
        tracker.update_exercise_progress("eveil_j1_pompes", 10).unwrap();
        // 10 of 30 reps
        assert!((tracker.daily_progress() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_three_day_program_runs_to_finish() {
        let mut tracker = started("eveil");

        for expected in 1..=3 {
            assert_eq!(tracker.current_day(), Some(expected));
            assert_eq!(tracker.advance_day().unwrap(), DayTransition::NotReady);

            finish_ritual(&mut tracker);
            assert!(tracker.is_ritual_complete());
            assert!(tracker.complete_day().unwrap());

            let transition = tracker.advance_day().unwrap();
            if expected < 3 {
                assert_eq!(transition, DayTransition::Advanced { day: expected + 1 });
                let ritual = tracker.get_current_day_ritual().unwrap().unwrap();
                assert_eq!(ritual.day, expected + 1);
                assert!(ritual.exercises.iter().all(|e| e.completed_reps == 0));
            } else {
                assert_eq!(transition, DayTransition::Finished);
            }
            tracker.clock().advance_days(1);
        }

        assert!(tracker.is_finished());
        assert_eq!(tracker.current_day(), Some(4));
        assert!(tracker.get_current_day_ritual().unwrap().is_none());
        assert_eq!(tracker.advance_day().unwrap(), DayTransition::Unchanged);

        let profile = tracker.store().load_profile("u").unwrap().unwrap();
        let state = profile.progress.unwrap();
        assert_eq!(state.current_day, 4);
        assert!(state.completed);
        assert_eq!(profile.stats.total_days_completed, 3);
        assert_eq!(profile.stats.consecutive_days, 3);
    }

    #[test]
    fn test_first_day_scenario_sets_streak_and_total() {
        let mut tracker = started("eveil");
        assert_eq!(tracker.current_program().unwrap().duration_days, 3);

        tracker.update_exercise_progress("eveil_j1_pompes", 10).unwrap();
        assert!(!tracker.is_ritual_complete());
        tracker.update_exercise_progress("eveil_j1_squats", 20).unwrap();
        assert!(tracker.is_ritual_complete());

        assert!(tracker.complete_day().unwrap());
        let stats = stats::fetch_user_stats(tracker.store(), "u").unwrap();
        assert_eq!(stats.consecutive_days, 1);
        assert_eq!(stats.total_days_completed, 1);
    }

    #[test]
    fn test_complete_day_requires_full_ritual_and_counts_once() {
        let mut tracker = started("eveil");
        assert!(!tracker.complete_day().unwrap());

        finish_ritual(&mut tracker);
        assert!(tracker.complete_day().unwrap());
        assert!(tracker.complete_day().unwrap());

        let stats = stats::fetch_user_stats(tracker.store(), "u").unwrap();
        assert_eq!(stats.total_days_completed, 1);
        assert_eq!(stats.last_completed_day, Some(date(2024, 6, 3)));
        // Completion does not move the cursor
        assert_eq!(tracker.current_day(), Some(1));
    }

    #[test]
    fn test_switching_program_wipes_progress() {
        let mut tracker = started("eveil");
        tracker.update_exercise_progress("eveil_j1_pompes", 5).unwrap();

        tracker.select_program("guerrier").unwrap();
        assert_eq!(tracker.current_day(), Some(1));
        assert!(tracker.current_ritual().is_none());
        assert!(tracker.store().snapshot().progress.is_empty());

        let ritual = tracker.get_current_day_ritual().unwrap().unwrap();
        assert_eq!(ritual.program_id, "guerrier");
        assert!(ritual.exercises.iter().all(|e| e.completed_reps == 0));
    }

    #[test]
    fn test_failed_wipe_still_switches_program() {
        let mut tracker = started("eveil");
        tracker.update_exercise_progress("eveil_j1_pompes", 5).unwrap();
        tracker.store().set_fault(Fault::ProgressWipe, true);

        let program = tracker.select_program("guerrier").unwrap();
        assert_eq!(program.id, "guerrier");
        assert_eq!(
            tracker.store().load_profile("u").unwrap().unwrap().program_id.as_deref(),
            Some("guerrier")
        );
        assert!(!tracker.store().snapshot().progress.is_empty());
    }

    #[test]
    fn test_reload_resumes_saved_cursor() {
        let mut tracker = started("eveil");
        finish_ritual(&mut tracker);
        tracker.advance_day().unwrap();

        let snapshot = tracker.store().snapshot();
        let clock = FixedClock::at_date(date(2024, 6, 4));
        let mut reloaded =
            ProgramTracker::new(InMemoryStore::from_data(snapshot), clock, Some("u".into()));
        reloaded.load().unwrap();

        assert_eq!(reloaded.current_program().unwrap().id, "eveil");
        assert_eq!(reloaded.current_day(), Some(2));
    }

    #[test]
    fn test_load_clamps_out_of_range_cursor() {
        let mut tracker = started("eveil");
        tracker.store().with_data(|d| {
            if let Some(state) = d.profiles[0].progress.as_mut() {
                state.current_day = 42;
            }
        });

        tracker.load().unwrap();
        assert_eq!(tracker.current_day(), Some(4));
        assert!(tracker.is_finished());
    }

    #[test]
    fn test_day_read_failure_uses_cached_ritual() {
        let mut tracker = started("eveil");
        tracker.update_exercise_progress("eveil_j1_pompes", 3).unwrap();
        tracker.store().set_fault(Fault::DayRead, true);

        let ritual = tracker.get_current_day_ritual().unwrap().unwrap();
        assert_eq!(ritual.exercise("eveil_j1_pompes").unwrap().completed_reps, 3);
    }

    #[test]
    fn test_day_read_failure_without_cache_is_unavailable() {
        let mut tracker = tracker_for(Some("u"));
        tracker.select_program("eveil").unwrap();
        tracker.store().set_fault(Fault::DayRead, true);

        assert!(matches!(
            tracker.get_current_day_ritual(),
            Err(Error::Unavailable(_))
        ));
    }

    #[test]
    fn test_missing_day_definition_is_not_found() {
        let mut tracker = tracker_for(Some("u"));
        tracker.select_program("eveil").unwrap();
        tracker.store().with_data(|d| d.days.clear());

        assert!(matches!(
            tracker.get_current_day_ritual(),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_progress_insert_failure_still_builds_ritual() {
        let mut tracker = tracker_for(Some("u"));
        tracker.select_program("eveil").unwrap();
        tracker.store().set_fault(Fault::ProgressInsert, true);

        let ritual = tracker.get_current_day_ritual().unwrap().unwrap();
        assert!(ritual.exercises.iter().all(|e| e.completed_reps == 0));
        assert!(tracker.store().snapshot().progress.is_empty());
    }

    #[test]
    fn test_quote_falls_back_to_day_then_default() {
        let mut tracker = tracker_for(Some("u")).with_config(&Config::default());
        tracker.store().with_data(|d| d.quotes.clear());
        tracker.select_program("eveil").unwrap();

        let ritual = tracker.get_current_day_ritual().unwrap().unwrap();
        assert_eq!(ritual.quote, crate::config::default_quote());

        tracker.store().with_data(|d| {
            if let Some(day) = d.days.iter_mut().find(|d| d.id == "eveil_j1") {
                day.quote = Some("Du jour".into());
            }
        });
        let ritual = tracker.get_current_day_ritual().unwrap().unwrap();
        assert_eq!(ritual.quote, "Du jour");

        tracker.store().set_fault(Fault::Quotes, true);
        let ritual = tracker.get_current_day_ritual().unwrap().unwrap();
        assert_eq!(ritual.quote, "Du jour");
    }

    #[test]
    fn test_quote_comes_from_pool_when_available() {
        let tracker = started("eveil");
        let pool = tracker.store().snapshot().quotes;
        assert!(pool.contains(&tracker.current_ritual().unwrap().quote));
    }

    #[test]
    fn test_rollover_waits_for_new_calendar_day() {
        let mut tracker = started("eveil");
        finish_ritual(&mut tracker);

        assert_eq!(tracker.check_day_rollover().unwrap(), DayTransition::Unchanged);

        tracker.clock().advance_days(1);
        assert_eq!(
            tracker.check_day_rollover().unwrap(),
            DayTransition::Advanced { day: 2 }
        );
        // Same calendar day as the last advance
        assert_eq!(tracker.check_day_rollover().unwrap(), DayTransition::Unchanged);
    }

    #[test]
    fn test_rollover_does_not_advance_incomplete_day() {
        let mut tracker = started("eveil");
        tracker.update_exercise_progress("eveil_j1_pompes", 10).unwrap();

        tracker.clock().advance_days(1);
        assert_eq!(tracker.check_day_rollover().unwrap(), DayTransition::NotReady);
        assert_eq!(tracker.current_day(), Some(1));
    }

    #[test]
    fn test_advance_persists_before_mutating_memory() {
        let mut tracker = started("eveil");
        finish_ritual(&mut tracker);
        tracker.store().set_fault(Fault::ProfileWrite, true);

        assert!(tracker.advance_day().is_err());
        assert_eq!(tracker.current_day(), Some(1));
        assert!(tracker.current_ritual().is_some());
    }

    #[test]
    fn test_uncategorized_exercise_leaves_counters() {
        let mut tracker = started("guerrier");
        tracker.update_exercise_progress("guerrier_j1_gainage", 2).unwrap();

        let stats = stats::fetch_user_stats(tracker.store(), "u").unwrap();
        assert_eq!(stats.total_push + stats.total_leg + stats.total_breathing, 0);
        assert_eq!(
            tracker.current_ritual().unwrap().exercise("guerrier_j1_gainage").unwrap().category,
            Some(ExerciseCategory::Other)
        );
    }
}
