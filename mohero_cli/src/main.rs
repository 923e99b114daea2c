use clap::{Parser, Subcommand};
use mohero_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mohero")]
#[command(about = "Daily hero ritual tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Act as this user instead of the configured one
    #[arg(long, global = true)]
    user: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the built-in catalog into the store
    Seed,

    /// List available programs
    Programs,

    /// Start a program from day 1 (discards exercise progress)
    Select {
        /// Program id
        program_id: String,
    },

    /// Show today's ritual (default)
    Ritual,

    /// Log repetitions for an exercise of today's ritual
    Rep {
        /// Exercise id or name
        exercise: String,

        /// Repetitions to add, capped at what is left to reach the target
        #[arg(long, default_value_t = 1)]
        count: u32,
    },

    /// Record today's ritual as completed
    Complete,

    /// Move to the next day once today's ritual is complete
    Advance,

    /// Advance if a new calendar day started and today's ritual is complete
    Rollover,

    /// Show streak and totals
    Stats,

    /// Rebuild category totals from progress rows (all users without --user)
    RecomputeStats,

    /// Categorize exercises that have no category
    BackfillCategories,
}

type Tracker = ProgramTracker<FileStore, SystemClock>;

fn main() -> Result<()> {
    // Initialize logging
    mohero_core::logging::init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }
    if cli.user.is_some() {
        config.user.user_id = cli.user;
    }

    let store = FileStore::new(config.data.store_path());

    match cli.command {
        Some(Commands::Seed) => cmd_seed(&store),
        Some(Commands::Programs) => cmd_programs(&store),
        Some(Commands::Select { program_id }) => {
            cmd_select(open_tracker(store, &config)?, &program_id)
        }
        Some(Commands::Rep { exercise, count }) => {
            cmd_rep(open_tracker(store, &config)?, &exercise, count)
        }
        Some(Commands::Complete) => cmd_complete(open_tracker(store, &config)?),
        Some(Commands::Advance) => cmd_advance(open_tracker(store, &config)?),
        Some(Commands::Rollover) => cmd_rollover(open_tracker(store, &config)?),
        Some(Commands::Stats) => cmd_stats(&store, &config),
        Some(Commands::RecomputeStats) => cmd_recompute(&store, &config),
        Some(Commands::BackfillCategories) => cmd_backfill(&store),
        Some(Commands::Ritual) | None => cmd_ritual(open_tracker(store, &config)?),
    }
}

fn open_tracker(store: FileStore, config: &Config) -> Result<Tracker> {
    let mut tracker = ProgramTracker::new(store, SystemClock, None).with_config(config);
    tracker.load()?;
    Ok(tracker)
}

fn require_user(config: &Config) -> Result<&str> {
    config.user.user_id.as_deref().ok_or(Error::Unauthenticated)
}

fn cmd_seed(store: &FileStore) -> Result<()> {
    let catalog = get_default_catalog();
    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::CatalogValidation("Invalid catalog".into()));
    }

    store.seed(catalog)?;

    println!(
        "✓ Seeded {} programs ({} days)",
        catalog.programs.len(),
        catalog.days.len()
    );
    println!("  Store: {}", store.path().display());
    Ok(())
}

fn cmd_programs(store: &FileStore) -> Result<()> {
    let programs = store.list_programs()?;
    if programs.is_empty() {
        println!("No programs found - run `mohero seed` first.");
        return Ok(());
    }

    for program in programs {
        println!(
            "  {:<12} {:<28} {:>2} days  [{:?}]",
            program.id, program.title, program.duration_days, program.category
        );
    }
    Ok(())
}

fn cmd_select(mut tracker: Tracker, program_id: &str) -> Result<()> {
    let program = tracker.select_program(program_id)?;
    println!("✓ Started {} ({} days)", program.title, program.duration_days);
    Ok(())
}

fn cmd_ritual(mut tracker: Tracker) -> Result<()> {
    require_user_of(&tracker)?;
    if tracker.current_program().is_none() {
        println!("No program selected - run `mohero select <program>` first.");
        return Ok(());
    }

    match tracker.get_current_day_ritual()? {
        Some(ritual) => display_ritual(&ritual, tracker.current_program()),
        None => println!("🏆 Program complete! Select a new program to continue."),
    }
    Ok(())
}

fn cmd_rep(mut tracker: Tracker, exercise: &str, count: u32) -> Result<()> {
    let ritual = tracker
        .get_current_day_ritual()?
        .ok_or_else(|| Error::Precondition("program already finished".into()))?;

    let target = ritual
        .exercises
        .iter()
        .find(|e| e.id == exercise || e.name.eq_ignore_ascii_case(exercise))
        .ok_or_else(|| Error::NotFound(format!("exercise {} in today's ritual", exercise)))?;
    let exercise_id = target.id.clone();
    let name = target.name.clone();

    let reps = tracker.clamp_increment(&exercise_id, count);
    if reps == 0 {
        println!("{} already complete.", name);
        return Ok(());
    }

    match tracker.update_exercise_progress(&exercise_id, reps)? {
        ProgressWrite::Unconfirmed => {
            eprintln!("⚠ {} reps for {} could not be saved", reps, name);
        }
        _ => {
            if let Some(done) = tracker.current_ritual().and_then(|r| r.exercise(&exercise_id)) {
                println!("✓ {}: {}/{}", name, done.completed_reps, done.target_reps);
            }
        }
    }

    if tracker.is_ritual_complete() {
        println!("  Ritual complete! Run `mohero complete` to record the day.");
    } else {
        println!("  Today: {:.0}%", tracker.daily_progress() * 100.0);
    }
    Ok(())
}

fn cmd_complete(mut tracker: Tracker) -> Result<()> {
    if tracker.get_current_day_ritual()?.is_none() {
        println!("Program already finished.");
        return Ok(());
    }

    if !tracker.complete_day()? {
        println!("Ritual not complete yet ({:.0}%).", tracker.daily_progress() * 100.0);
        return Ok(());
    }

    let user_id = require_user_of(&tracker)?;
    let stats = fetch_user_stats(tracker.store(), &user_id)?;
    println!("✓ Day recorded!");
    println!("  Streak: {} days", stats.consecutive_days);
    Ok(())
}

fn cmd_advance(mut tracker: Tracker) -> Result<()> {
    let transition = tracker.advance_day()?;
    print_transition(transition);
    Ok(())
}

fn cmd_rollover(mut tracker: Tracker) -> Result<()> {
    let transition = tracker.check_day_rollover()?;
    print_transition(transition);
    Ok(())
}

fn cmd_stats(store: &FileStore, config: &Config) -> Result<()> {
    let user_id = require_user(config)?;
    let stats = fetch_user_stats(store, user_id)?;

    println!("Streak:        {} days", stats.consecutive_days);
    println!("Days complete: {}", stats.total_days_completed);
    if let Some(last) = stats.last_completed_day {
        println!("Last day:      {}", last);
    }
    println!("Push reps:     {}", stats.total_push);
    println!("Leg reps:      {}", stats.total_leg);
    println!("Breathing:     {}", stats.total_breathing);
    Ok(())
}

fn cmd_recompute(store: &FileStore, config: &Config) -> Result<()> {
    match config.user.user_id.as_deref() {
        Some(user_id) => {
            let stats = recompute_stats(store, user_id)?;
            println!(
                "✓ Recomputed {}: push {}, leg {}, breathing {}",
                user_id, stats.total_push, stats.total_leg, stats.total_breathing
            );
        }
        None => {
            let count = recompute_all_stats(store)?;
            println!("✓ Recomputed stats for {} users", count);
        }
    }
    Ok(())
}

fn cmd_backfill(store: &FileStore) -> Result<()> {
    let count = backfill_categories(store)?;
    println!("✓ Categorized {} exercises", count);
    Ok(())
}

fn require_user_of(tracker: &Tracker) -> Result<String> {
    tracker
        .user_id()
        .map(str::to_string)
        .ok_or(Error::Unauthenticated)
}

fn print_transition(transition: DayTransition) {
    match transition {
        DayTransition::Advanced { day } => println!("✓ On to day {}", day),
        DayTransition::Finished => println!("🏆 Program complete!"),
        DayTransition::NotReady => println!("Today's ritual is not complete yet."),
        DayTransition::Unchanged => println!("Nothing to advance."),
    }
}

fn display_ritual(ritual: &DailyRitual, program: Option<&Program>) {
    let duration = program.map(|p| p.duration_days).unwrap_or(ritual.day);

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  DAY {}/{}", ritual.day, duration);
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  « {} »", ritual.quote);
    println!();

    for exercise in &ritual.exercises {
        let mark = if exercise.is_complete() { "✓" } else { "·" };
        println!(
            "  {} {:<22} {:>3}/{:<3}  ({})",
            mark, exercise.name, exercise.completed_reps, exercise.target_reps, exercise.id
        );
    }

    println!();
    println!("  Progress: {:.0}%", ritual.progress() * 100.0);
    println!();
}
