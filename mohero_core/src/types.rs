//! Core domain types for MoHero program tracking.
//!
//! This module defines the fundamental types used throughout the system:
//! - Programs and their catalog details
//! - Day definitions and the exercises they prescribe
//! - Per-user cursor, progress records and derived stats
//! - The daily ritual snapshot handed to callers

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// User identifier as issued by the authentication provider
pub type UserId = String;

// ============================================================================
// Program Catalog
// ============================================================================

/// Commercial tier of a program
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProgramCategory {
    Discovery,
    Premium,
}

/// One step of the program outline
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgramPhase {
    pub title: String,
    pub description: String,
}

/// Descriptive blocks shown on the program detail screen
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct ProgramDetails {
    pub benefits: Vec<String>,
    pub phases: Vec<ProgramPhase>,
}

/// A multi-day exercise curriculum (read-only from the tracker's view)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Program {
    pub id: String,
    pub title: String,
    pub description: String,
    pub duration_days: u32,
    pub image_url: Option<String>,
    pub category: ProgramCategory,
    pub focus: Vec<String>,
    #[serde(default)]
    pub details: ProgramDetails,
}

impl Program {
    /// Day number that marks the program as finished
    pub fn finished_day(&self) -> u32 {
        self.duration_days + 1
    }
}

// ============================================================================
// Exercises and Days
// ============================================================================

/// Stats bucket an exercise counts toward
///
/// Assigned at authoring time. Exercises authored before categories existed
/// carry `None` until the backfill routine classifies them.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseCategory {
    Push,
    Leg,
    Breathing,
    Other,
}

/// Catalog definition of an exercise
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub target_reps: u32,
    pub order: u32,
    /// Free-text type label from legacy content
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub category: Option<ExerciseCategory>,
}

/// The exercises assigned to one numbered day of a program
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DayDefinition {
    pub id: String,
    pub program_id: String,
    pub day_number: u32,
    pub quote: Option<String>,
    pub exercise_ids: Vec<String>,
}

/// A day joined with its exercise definitions, as the store returns it
#[derive(Clone, Debug, PartialEq)]
pub struct DayWithExercises {
    pub day: DayDefinition,
    pub exercises: Vec<ExerciseDefinition>,
}

// ============================================================================
// Per-user State
// ============================================================================

/// Mutable per-user cursor into a program
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserProgramState {
    pub program_id: String,
    pub start_date: DateTime<Utc>,
    pub current_day: u32,
    pub completed: bool,
    pub last_updated: DateTime<Utc>,
}

impl UserProgramState {
    /// Fresh cursor at day 1
    pub fn start(program_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            program_id: program_id.into(),
            start_date: now,
            current_day: 1,
            completed: false,
            last_updated: now,
        }
    }
}

/// Durable count of repetitions performed by a user for one exercise
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseProgressRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub exercise_id: String,
    pub value: u32,
}

impl ExerciseProgressRecord {
    pub fn new(user_id: impl Into<UserId>, exercise_id: impl Into<String>, value: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            exercise_id: exercise_id.into(),
            value,
        }
    }
}

/// Entry of the completed-day log
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CompletedDay {
    pub id: Uuid,
    pub user_id: UserId,
    pub completed_on: NaiveDate,
}

/// Denormalized counters kept on the profile
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UserStats {
    pub consecutive_days: u32,
    pub total_days_completed: u32,
    pub last_completed_day: Option<NaiveDate>,
    pub total_push: u64,
    pub total_leg: u64,
    pub total_breathing: u64,
}

impl UserStats {
    /// Add reps to the counter matching `category`
    ///
    /// Returns false when the category has no counter.
    pub fn add_reps(&mut self, category: ExerciseCategory, reps: u32) -> bool {
        let counter = match category {
            ExerciseCategory::Push => &mut self.total_push,
            ExerciseCategory::Leg => &mut self.total_leg,
            ExerciseCategory::Breathing => &mut self.total_breathing,
            ExerciseCategory::Other => return false,
        };
        *counter += u64::from(reps);
        true
    }
}

/// A user's profile row: program association, cursor and stats
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub user_id: UserId,
    pub program_id: Option<String>,
    pub progress: Option<UserProgramState>,
    #[serde(default)]
    pub stats: UserStats,
}

impl Profile {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            program_id: None,
            progress: None,
            stats: UserStats::default(),
        }
    }
}

// ============================================================================
// Daily Ritual
// ============================================================================

/// An exercise as shown in today's ritual
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub target_reps: u32,
    pub completed_reps: u32,
    pub order: u32,
    pub category: Option<ExerciseCategory>,
    /// Local increments not yet acknowledged by the store
    #[serde(default)]
    pub unconfirmed_reps: u32,
}

impl Exercise {
    pub fn from_definition(def: &ExerciseDefinition, completed_reps: u32) -> Self {
        Self {
            id: def.id.clone(),
            name: def.name.clone(),
            description: def.description.clone(),
            image_url: def.image_url.clone(),
            video_url: def.video_url.clone(),
            target_reps: def.target_reps,
            completed_reps,
            order: def.order,
            category: def.category,
            unconfirmed_reps: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_reps >= self.target_reps
    }

    pub fn remaining_reps(&self) -> u32 {
        self.target_reps.saturating_sub(self.completed_reps)
    }
}

/// Snapshot of one (program, day) pair
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DailyRitual {
    pub id: String,
    pub program_id: String,
    pub day: u32,
    pub quote: String,
    pub exercises: Vec<Exercise>,
}

impl DailyRitual {
    /// True when every exercise reached its target
    pub fn is_complete(&self) -> bool {
        self.exercises.iter().all(Exercise::is_complete)
    }

    /// Fraction of the day's reps done, each exercise capped at its target
    pub fn progress(&self) -> f64 {
        let total: u64 = self.exercises.iter().map(|e| u64::from(e.target_reps)).sum();
        if total == 0 {
            return 0.0;
        }
        let done: u64 = self
            .exercises
            .iter()
            .map(|e| u64::from(e.completed_reps.min(e.target_reps)))
            .sum();
        (done as f64 / total as f64).min(1.0)
    }

    pub fn exercise(&self, exercise_id: &str) -> Option<&Exercise> {
        self.exercises.iter().find(|e| e.id == exercise_id)
    }

    pub fn exercise_mut(&mut self, exercise_id: &str) -> Option<&mut Exercise> {
        self.exercises.iter_mut().find(|e| e.id == exercise_id)
    }

    pub fn has_unconfirmed(&self) -> bool {
        self.exercises.iter().any(|e| e.unconfirmed_reps > 0)
    }
}

// ============================================================================
// Catalog Type
// ============================================================================

/// Authored content: programs, their days, exercises and the quote pool
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub programs: HashMap<String, Program>,
    pub days: Vec<DayDefinition>,
    pub exercises: HashMap<String, ExerciseDefinition>,
    pub quotes: Vec<String>,
}
