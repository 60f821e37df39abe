//! Immutable engine configuration handed to loops and sessions at construction.

use gale_settings::EngineSettings;

/// Values the engine reads once, when a loop or session is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Model ID sent with every request.
    pub model: String,
    /// Iteration cap for one agent run.
    pub max_iterations: u32,
    /// Cap on end-of-run input injections per session stream.
    pub max_injection_loops: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&EngineSettings::default())
    }
}

impl From<&EngineSettings> for EngineConfig {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            model: settings.default_model.clone(),
            max_iterations: settings.max_iterations,
            max_injection_loops: settings.max_injection_loops,
        }
    }
}

impl EngineConfig {
    /// Override the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Override the injection cap.
    #[must_use]
    pub fn with_max_injection_loops(mut self, max_injection_loops: u32) -> Self {
        self.max_injection_loops = max_injection_loops;
        self
    }
}
