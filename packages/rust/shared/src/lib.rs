//! Shared types, error model, and configuration for JobAtlas.
//!
//! This crate is the foundation depended on by all other JobAtlas crates.
//! It provides:
//! - [`JobAtlasError`] — the unified error type
//! - Occupation-code handling ([`CodeSystem`], levels, parents)
//! - Domain types ([`OccupationRecord`], [`TaskRating`], [`RegionType`])
//! - Configuration ([`AppConfig`], static country/group registries)

pub mod codes;
pub mod config;
pub mod error;
pub mod region;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use codes::{CodeSystem, code_level, derive_major_group, is_soc_code, major_group_id, parent_code};
pub use config::{
    AppConfig, COUNTRIES, CountrySpec, MAJOR_GROUPS, MajorGroupTable, PathsConfig, PipelineConfig,
    SourcesConfig, config_dir, config_file_path, country, country_for_metro, country_for_short,
    country_short, display_name_for_metro, display_name_for_state, init_config, load_config,
    load_config_from, metro_stem,
};
pub use error::{JobAtlasError, Result};
pub use region::{RegionType, region_slug};
pub use types::{OccupationInput, OccupationRecord, TaskRating};
