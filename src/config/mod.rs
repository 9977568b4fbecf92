// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Parse and validate durations and executor settings (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{ConfigFile, ExecutorSection, RawConfigFile, RawTimeoutsSection, Timeouts};
pub use validate::validate_config;
