//! User statistics: streaks, lifetime totals and per-category rep counters.
//!
//! Online updates are additive. [`recompute_stats`] and
//! [`backfill_categories`] are maintenance routines that rebuild counters
//! from source rows and classify legacy exercises.

use crate::store::ProgramStore;
use crate::{CompletedDay, ExerciseCategory, Profile, Result, UserStats};
use chrono::NaiveDate;
use std::collections::HashMap;
use uuid::Uuid;

/// Outcome of recording today's completion
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DayMark {
    /// First completion for this date; counters updated
    Recorded(UserStats),
    /// Date already in the log; nothing counted
    AlreadyRecorded,
}

/// Streak after completing a day on `today`
///
/// Continues when the previous completion was exactly yesterday, otherwise
/// restarts at 1.
pub fn next_streak(stats: &UserStats, today: NaiveDate) -> u32 {
    match stats.last_completed_day {
        Some(last) if today.pred_opt() == Some(last) => stats.consecutive_days + 1,
        _ => 1,
    }
}

/// Log `today` as completed and update streak and lifetime counters
///
/// Idempotent per date: a second call for the same date changes nothing.
pub fn mark_day_completed(
    store: &dyn ProgramStore,
    user_id: &str,
    today: NaiveDate,
) -> Result<DayMark> {
    if store.has_completed_day(user_id, today)? {
        tracing::debug!("Day {} already completed for {}", today, user_id);
        return Ok(DayMark::AlreadyRecorded);
    }

    store.insert_completed_day(&CompletedDay {
        id: Uuid::new_v4(),
        user_id: user_id.into(),
        completed_on: today,
    })?;

    let mut profile = store
        .load_profile(user_id)?
        .unwrap_or_else(|| Profile::new(user_id));

    let stats = &mut profile.stats;
    stats.consecutive_days = next_streak(stats, today);
    stats.total_days_completed += 1;
    stats.last_completed_day = Some(today);

    store.save_profile(&profile)?;

    tracing::info!(
        "Day {} completed for {}: streak {}, total {}",
        today,
        user_id,
        profile.stats.consecutive_days,
        profile.stats.total_days_completed
    );
    Ok(DayMark::Recorded(profile.stats))
}

/// Add `reps` to the user's counter for `category`
///
/// Returns false when the category has no counter and nothing was written.
pub fn record_category_reps(
    store: &dyn ProgramStore,
    user_id: &str,
    category: ExerciseCategory,
    reps: u32,
) -> Result<bool> {
    if category == ExerciseCategory::Other {
        return Ok(false);
    }

    let mut profile = store
        .load_profile(user_id)?
        .unwrap_or_else(|| Profile::new(user_id));
    profile.stats.add_reps(category, reps);
    store.save_profile(&profile)?;

    tracing::debug!("Added {} reps to {:?} for {}", reps, category, user_id);
    Ok(true)
}

/// Current counters for a user (zeroed when no profile exists)
pub fn fetch_user_stats(store: &dyn ProgramStore, user_id: &str) -> Result<UserStats> {
    Ok(store
        .load_profile(user_id)?
        .map(|p| p.stats)
        .unwrap_or_default())
}

/// Guess a category from legacy free-text name and type
///
/// Only meant for backfilling content authored before categories existed.
pub fn classify_exercise(name: &str, kind: Option<&str>) -> ExerciseCategory {
    let name = name.to_lowercase();
    let kind = kind.unwrap_or_default().to_lowercase();

    let name_has = |words: &[&str]| words.iter().any(|w| name.contains(w));
    let kind_has = |words: &[&str]| words.iter().any(|w| kind.contains(w));

    if name_has(&["pompe", "push-up", "pectoraux", "chest", "bras", "arm"])
        || kind_has(&["pompe"])
        || kind == "push-up"
    {
        ExerciseCategory::Push
    } else if name_has(&["squat", "jambe", "leg", "cuisse", "thigh"])
        || kind_has(&["squat", "jambe", "leg"])
    {
        ExerciseCategory::Leg
    } else if name_has(&["respiration", "souffle", "breathing", "méditation", "meditation"])
        || kind_has(&["respiration", "breathing", "méditation", "meditation"])
    {
        ExerciseCategory::Breathing
    } else {
        ExerciseCategory::Other
    }
}

/// Assign a category to every exercise that has none
///
/// Returns the number of exercises updated.
pub fn backfill_categories(store: &dyn ProgramStore) -> Result<usize> {
    let mut updated = 0;
    for exercise in store.list_exercises()? {
        if exercise.category.is_some() {
            continue;
        }
        let category = classify_exercise(&exercise.name, exercise.kind.as_deref());
        store.set_exercise_category(&exercise.id, category)?;
        tracing::info!("Exercise '{}' categorized as {:?}", exercise.name, category);
        updated += 1;
    }
    Ok(updated)
}

/// Rebuild a user's per-category totals from their progress rows
///
/// Streak and day counters are kept as they are.
pub fn recompute_stats(store: &dyn ProgramStore, user_id: &str) -> Result<UserStats> {
    let categories: HashMap<String, ExerciseCategory> = store
        .list_exercises()?
        .into_iter()
        .map(|e| {
            let category = e
                .category
                .unwrap_or_else(|| classify_exercise(&e.name, e.kind.as_deref()));
            (e.id, category)
        })
        .collect();

    let mut profile = store
        .load_profile(user_id)?
        .unwrap_or_else(|| Profile::new(user_id));
    profile.stats.total_push = 0;
    profile.stats.total_leg = 0;
    profile.stats.total_breathing = 0;

    for record in store.list_user_progress(user_id)? {
        match categories.get(&record.exercise_id) {
            Some(category) => {
                profile.stats.add_reps(*category, record.value);
            }
            None => tracing::warn!(
                "Progress row {} references unknown exercise {}",
                record.id,
                record.exercise_id
            ),
        }
    }

    store.save_profile(&profile)?;
    tracing::info!(
        "Recomputed stats for {}: push {}, leg {}, breathing {}",
        user_id,
        profile.stats.total_push,
        profile.stats.total_leg,
        profile.stats.total_breathing
    );
    Ok(profile.stats)
}

/// [`recompute_stats`] for every profile, returning how many were rebuilt
pub fn recompute_all_stats(store: &dyn ProgramStore) -> Result<usize> {
    let profiles = store.list_profiles()?;
    for profile in &profiles {
        recompute_stats(store, &profile.user_id)?;
    }
    Ok(profiles.len())
}
