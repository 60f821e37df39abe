//! # gale-settings
//!
//! Engine settings loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`EngineSettings::default()`]
//! 2. **Settings file**: JSON, deep-merged over defaults
//! 3. **Environment variables**: `GALE_*` overrides (highest priority)
//!
//! There is no process-wide settings instance. Load once, then hand the
//! value (or the `EngineConfig` derived from it) to whatever needs it.
//!
//! # Usage
//!
//! ```no_run
//! use gale_settings::load_settings_from_path;
//!
//! let settings = load_settings_from_path(std::path::Path::new("gale.json")).unwrap_or_default();
//! println!("model: {}", settings.default_model);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, apply_overrides_from, deep_merge, load_settings_from_path};
pub use types::{EngineSettings, GoogleSettings};
