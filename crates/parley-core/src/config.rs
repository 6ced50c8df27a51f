//! Session configuration.
//!
//! # Precedence (highest to lowest)
//!
//! 1. Explicit overrides from the host (CLI flags)
//! 2. Environment variables (`PARLEY_*`)
//! 3. TOML config file
//! 4. Defaults
//!
//! ```toml
//! [model]
//! path = "/models/qwen2.5-1.5b-instruct-q4_k_m.gguf"
//! n_ctx = 2048
//! n_gpu_layers = 0
//!
//! [sampling]
//! min_p = 0.05
//! temperature = 0.8
//!
//! [chat]
//! system_prompt = "You are a helpful assistant."
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use parley_abi::{EngineConfig, SamplingParams};

use crate::error::ConfigError;

pub const DEFAULT_N_CTX: u32 = 2048;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub model: ModelSection,
    pub sampling: SamplingParams,
    pub chat: ChatSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    /// Path to the GGUF model file.
    pub path: PathBuf,
    /// Fixed context capacity for the session.
    pub n_ctx: u32,
    pub n_gpu_layers: i32,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            n_ctx: DEFAULT_N_CTX,
            n_gpu_layers: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSection {
    /// Seeded into the history as the first System turn.
    pub system_prompt: Option<String>,
}

impl SessionConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// File (if any) overlaid with the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay `PARLEY_*` variables looked up through `var`.
    ///
    /// Unparseable values are ignored and the previous value kept.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("PARLEY_MODEL") {
            self.model.path = PathBuf::from(v);
        }
        if let Some(n) = var("PARLEY_N_CTX").and_then(|v| v.parse().ok()) {
            self.model.n_ctx = n;
        }
        if let Some(n) = var("PARLEY_N_GPU_LAYERS").and_then(|v| v.parse().ok()) {
            self.model.n_gpu_layers = n;
        }
        if let Some(p) = var("PARLEY_MIN_P").and_then(|v| v.parse().ok()) {
            self.sampling.min_p = p;
        }
        if let Some(t) = var("PARLEY_TEMPERATURE").and_then(|v| v.parse().ok()) {
            self.sampling.temperature = t;
        }
        if let Some(s) = var("PARLEY_SEED").and_then(|v| v.parse().ok()) {
            self.sampling.seed = s;
        }
        if let Some(sys) = var("PARLEY_SYSTEM_PROMPT") {
            self.chat.system_prompt = Some(sys);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("model path is empty".into()));
        }
        if self.model.n_ctx < 2 {
            return Err(ConfigError::Invalid(format!(
                "n_ctx must be at least 2, got {}",
                self.model.n_ctx
            )));
        }
        if !(0.0..=1.0).contains(&self.sampling.min_p) {
            return Err(ConfigError::Invalid(format!(
                "min_p must be within [0, 1], got {}",
                self.sampling.min_p
            )));
        }
        let t = self.sampling.temperature;
        if t.is_nan() || t < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "temperature must be non-negative, got {t}"
            )));
        }
        Ok(())
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            model_path: self.model.path.clone(),
            n_ctx: self.model.n_ctx,
            n_gpu_layers: self.model.n_gpu_layers,
            sampling: self.sampling.normalized(),
        }
    }
}
