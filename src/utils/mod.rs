/// TOML configuration with per-field defaults.
pub mod config;

pub use config::{AppConfig, ConfigError};
