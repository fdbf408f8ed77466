// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: TOML-backed data model.
//! - `loader.rs`: read a config file from disk.
//! - `validate.rs`: turn a raw config into a checked [`ConfigFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    default_owner_org, BusSection, ConfigFile, InboxSection, PathsSection, PostprocessSection,
    RawConfigFile, RepositorySection, RunSection, SimulatorSection,
};
