//! Infrastructure layer: configuration and platform wiring.

pub mod config;

mod integration_tests;

pub use config::{CatalogFile, ConfigError, StoreConfig};
