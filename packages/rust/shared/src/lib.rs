//! Shared types, error model, and configuration for ka-progress.
//!
//! This crate is the foundation depended on by all other ka-progress crates.
//! It provides:
//! - [`KaProgressError`] and the traversal failure taxonomy
//! - Domain types ([`UnitSnapshot`], [`CourseReport`]) and the progress wire format
//! - Configuration ([`AppConfig`], [`TraversalConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BrowserConfig, CredentialsConfig, DEFAULT_COURSES, DefaultsConfig, SiteConfig,
    TraversalConfig, config_dir, config_file_path, course_url, init_config, load_config,
    load_config_from,
};
pub use error::{CourseFailure, KaProgressError, PageError, Result, VisitFailure};
pub use types::{
    ContentItemProgress, ContentRef, CourseReport, ProgressCounts, ProgressPayload, UnitSnapshot,
};
