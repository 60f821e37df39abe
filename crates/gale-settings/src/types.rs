//! Settings type definitions.
//!
//! All types use `camelCase` JSON field names and implement [`Default`] with
//! production values, so partial files deserialize cleanly.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Default model ID.
pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";

/// Default iteration cap for one agent run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Default cap on end-of-run input injections per `stream()` call.
pub const DEFAULT_MAX_INJECTION_LOOPS: u32 = 5;

/// Root settings for the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Model used when the caller does not pick one.
    pub default_model: String,
    /// Iteration cap for one agent run.
    pub max_iterations: u32,
    /// How many times end-of-run hooks may inject new input per stream.
    pub max_injection_loops: u32,
    /// Log filter passed to the tracing subscriber.
    pub log_level: String,
    /// Gemini transport settings.
    pub google: GoogleSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_injection_loops: DEFAULT_MAX_INJECTION_LOOPS,
            log_level: "warn".to_string(),
            google: GoogleSettings::default(),
        }
    }
}

impl EngineSettings {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(SettingsError::InvalidValue(
                "maxIterations must be at least 1".into(),
            ));
        }
        if self.default_model.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "defaultModel must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Gemini Interactions transport settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleSettings {
    /// API base URL.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
        }
    }
}
