//! Default catalog of programs, days, exercises and quotes.
//!
//! Real deployments author content in the backend; this catalog seeds
//! local stores and gives tests a realistic fixture.

use crate::types::*;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog_internal);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

/// Builds the default catalog
///
/// Prefer `get_default_catalog()` outside of tests.
pub fn build_default_catalog() -> Catalog {
    build_default_catalog_internal()
}

/// Movement template, instantiated once per day that uses it
struct Movement {
    slug: &'static str,
    name: &'static str,
    description: &'static str,
    category: ExerciseCategory,
}

const POMPES: Movement = Movement {
    slug: "pompes",
    name: "Pompes",
    description: "Pompes classiques, dos gainé.",
    category: ExerciseCategory::Push,
};

const SQUATS: Movement = Movement {
    slug: "squats",
    name: "Squats",
    description: "Descendre cuisses parallèles au sol.",
    category: ExerciseCategory::Leg,
};

const RESPIRATION: Movement = Movement {
    slug: "respiration",
    name: "Respiration carrée",
    description: "Inspirer 4s, bloquer 4s, expirer 4s, bloquer 4s.",
    category: ExerciseCategory::Breathing,
};

const GAINAGE: Movement = Movement {
    slug: "gainage",
    name: "Gainage",
    description: "Planche sur les avant-bras, 30 secondes par série.",
    category: ExerciseCategory::Other,
};

/// Add day `day_number` of `program_id` with one exercise per (movement, target)
fn add_day(
    catalog: &mut Catalog,
    program_id: &str,
    day_number: u32,
    movements: &[(&Movement, u32)],
) {
    let day_id = format!("{}_j{}", program_id, day_number);
    let mut exercise_ids = Vec::with_capacity(movements.len());

    for (order, (movement, target_reps)) in movements.iter().enumerate() {
        let id = format!("{}_{}", day_id, movement.slug);
        catalog.exercises.insert(
            id.clone(),
            ExerciseDefinition {
                id: id.clone(),
                name: movement.name.into(),
                description: movement.description.into(),
                image_url: Some(format!("https://assets.mohero.app/exercises/{}.jpg", movement.slug)),
                video_url: None,
                target_reps: *target_reps,
                order: order as u32 + 1,
                kind: None,
                category: Some(movement.category),
            },
        );
        exercise_ids.push(id);
    }

    catalog.days.push(DayDefinition {
        id: day_id,
        program_id: program_id.into(),
        day_number,
        quote: None,
        exercise_ids,
    });
}

fn build_default_catalog_internal() -> Catalog {
    let mut catalog = Catalog::default();

    // ========================================================================
    // Discovery: three-day introduction
    // ========================================================================

    catalog.programs.insert(
        "eveil".into(),
        Program {
            id: "eveil".into(),
            title: "L'Éveil du Héros".into(),
            description: "Trois jours pour installer le rituel quotidien.".into(),
            duration_days: 3,
            image_url: Some("https://assets.mohero.app/programs/eveil.jpg".into()),
            category: ProgramCategory::Discovery,
            focus: vec!["discipline".into(), "énergie".into()],
            details: ProgramDetails {
                benefits: vec![
                    "Un rituel ancré chaque matin".into(),
                    "Plus d'énergie dès le réveil".into(),
                ],
                phases: vec![ProgramPhase {
                    title: "Initiation".into(),
                    description: "Découvrir les mouvements de base.\nJours 1 à 3".into(),
                }],
            },
        },
    );
    add_day(&mut catalog, "eveil", 1, &[(&POMPES, 10), (&SQUATS, 20)]);
    add_day(&mut catalog, "eveil", 2, &[(&POMPES, 10), (&SQUATS, 20), (&RESPIRATION, 5)]);
    add_day(&mut catalog, "eveil", 3, &[(&POMPES, 20), (&SQUATS, 30), (&RESPIRATION, 5)]);

    // ========================================================================
    // Premium: five days of progressive volume
    // ========================================================================

    catalog.programs.insert(
        "guerrier".into(),
        Program {
            id: "guerrier".into(),
            title: "La Voie du Guerrier".into(),
            description: "Cinq jours d'intensité progressive.".into(),
            duration_days: 5,
            image_url: Some("https://assets.mohero.app/programs/guerrier.jpg".into()),
            category: ProgramCategory::Premium,
            focus: vec!["force".into(), "endurance".into()],
            details: ProgramDetails {
                benefits: vec!["Force du haut du corps".into(), "Endurance des jambes".into()],
                phases: vec![
                    ProgramPhase {
                        title: "Fondations".into(),
                        description: "Volume modéré.\nJours 1 à 2".into(),
                    },
                    ProgramPhase {
                        title: "Montée en charge".into(),
                        description: "Volume maximal.\nJours 3 à 5".into(),
                    },
                ],
            },
        },
    );
    add_day(&mut catalog, "guerrier", 1, &[(&POMPES, 10), (&SQUATS, 20), (&GAINAGE, 3)]);
    add_day(&mut catalog, "guerrier", 2, &[(&POMPES, 15), (&SQUATS, 30), (&GAINAGE, 3)]);
    add_day(&mut catalog, "guerrier", 3, &[(&POMPES, 20), (&SQUATS, 30), (&RESPIRATION, 5)]);
    add_day(&mut catalog, "guerrier", 4, &[(&POMPES, 20), (&SQUATS, 40), (&GAINAGE, 4)]);
    add_day(
        &mut catalog,
        "guerrier",
        5,
        &[(&POMPES, 25), (&SQUATS, 40), (&RESPIRATION, 5), (&GAINAGE, 5)],
    );
    if let Some(last) = catalog.days.last_mut() {
        last.quote = Some("Le dernier pas est celui qui forge le héros.".into());
    }

    catalog.quotes = vec![
        "Chaque répétition te rapproche du héros que tu es.".into(),
        "La discipline est le pont entre tes objectifs et tes accomplissements.".into(),
        "Un petit pas chaque jour, un grand chemin chaque mois.".into(),
    ];

    catalog
}

impl Catalog {
    /// Validate the catalog for consistency
    ///
    /// Returns a list of validation errors, or empty vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (id, program) in &self.programs {
            if id != &program.id {
                errors.push(format!("Program key '{}' does not match id '{}'", id, program.id));
            }
            if program.duration_days == 0 {
                errors.push(format!("Program '{}' has zero duration", id));
            }

            // Every day of the program must be defined exactly once
            for n in 1..=program.duration_days {
                let count = self
                    .days
                    .iter()
                    .filter(|d| d.program_id == program.id && d.day_number == n)
                    .count();
                match count {
                    0 => errors.push(format!("Program '{}' is missing day {}", id, n)),
                    1 => {}
                    _ => errors.push(format!("Program '{}' defines day {} {} times", id, n, count)),
                }
            }
        }

        let mut day_ids = HashSet::new();
        // Progress is stored per exercise, so an exercise may belong to one day only
        let mut owner: HashMap<&str, &str> = HashMap::new();

        for day in &self.days {
            if !day_ids.insert(day.id.as_str()) {
                errors.push(format!("Duplicate day id '{}'", day.id));
            }

            match self.programs.get(&day.program_id) {
                None => errors.push(format!(
                    "Day '{}' references unknown program '{}'",
                    day.id, day.program_id
                )),
                Some(program) => {
                    if day.day_number == 0 || day.day_number > program.duration_days {
                        errors.push(format!(
                            "Day '{}' number {} outside 1..={}",
                            day.id, day.day_number, program.duration_days
                        ));
                    }
                }
            }

            if day.exercise_ids.is_empty() {
                errors.push(format!("Day '{}' has no exercises", day.id));
            }
            for exercise_id in &day.exercise_ids {
                if !self.exercises.contains_key(exercise_id) {
                    errors.push(format!(
                        "Day '{}' references unknown exercise '{}'",
                        day.id, exercise_id
                    ));
                }
                if let Some(first) = owner.insert(exercise_id.as_str(), day.id.as_str()) {
                    errors.push(format!(
                        "Exercise '{}' is shared by days '{}' and '{}'",
                        exercise_id, first, day.id
                    ));
                }
            }
        }

        for (id, exercise) in &self.exercises {
            if exercise.target_reps == 0 {
                errors.push(format!("Exercise '{}' has a zero target", id));
            }
        }

        errors
    }
}
