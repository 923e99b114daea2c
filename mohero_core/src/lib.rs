#![forbid(unsafe_code)]

//! Core domain model and business logic for the Mohero daily ritual.
//!
//! This crate provides:
//! - Domain types (programs, days, exercises, rituals, stats)
//! - Default catalog and validation
//! - Store abstraction with in-memory and file-backed implementations
//! - Program progression tracker
//! - Statistics maintenance

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod clock;
pub mod store;
pub mod memory_store;
pub mod file_store;
pub mod stats;
pub mod tracker;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog};
pub use config::Config;
pub use clock::{Clock, FixedClock, SystemClock};
pub use store::{ProgramStore, StoreData};
pub use memory_store::{Fault, InMemoryStore};
pub use file_store::FileStore;
pub use stats::{
    backfill_categories, classify_exercise, fetch_user_stats, recompute_all_stats,
    recompute_stats, DayMark,
};
pub use tracker::{DayTransition, ProgramTracker, ProgressWrite};
