//! Application configuration module.
//!
//! Loads the TOML config file holding TMDB gateway settings and layers
//! `TMDB_*` environment variables on top.

#[allow(clippy::module_inception)]
mod config;
mod paths;

#[allow(clippy::module_name_repetitions)]
pub use config::AppConfig;
pub use paths::resolve_config_path;
