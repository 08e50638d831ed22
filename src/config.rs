use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::budget::DEFAULT_MAX_ITERATIONS;
use crate::tokenizer::{CacheScope, Tokenizer, TokenizerError};
use crate::vocab::{VocabError, Vocabulary};

pub const ASSETS_ENV: &str = "GPT_TOKENIZER_ASSETS";
pub const MAX_ITERATIONS_ENV: &str = "GPT_BUDGET_MAX_ITERATIONS";
pub const SHARED_CACHE_ENV: &str = "GPT_BUDGET_SHARED_CACHE";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Runtime settings. Command-line flags are applied on top of
/// [`Config::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding `characters.json`, `encoder.json` and `vocab.bpe`.
    /// `None` uses the assets embedded at build time.
    pub assets_dir: Option<PathBuf>,
    pub max_iterations: usize,
    pub cache_scope: CacheScope,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            assets_dir: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            cache_scope: CacheScope::PerCall,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build from any variable source (`name → value`).
    pub fn from_vars<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(dir) = get(ASSETS_ENV).filter(|d| !d.is_empty()) {
            config.assets_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = get(MAX_ITERATIONS_ENV) {
            config.max_iterations = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: MAX_ITERATIONS_ENV,
                value: value.clone(),
            })?;
        }
        if let Some(value) = get(SHARED_CACHE_ENV) {
            let shared = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "" | "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: SHARED_CACHE_ENV,
                        value,
                    })
                }
            };
            if shared {
                config.cache_scope = CacheScope::Shared;
            }
        }

        Ok(config)
    }

    pub fn load_vocabulary(&self) -> Result<Vocabulary, VocabError> {
        match &self.assets_dir {
            Some(dir) => Vocabulary::from_dir(dir),
            None => Vocabulary::embedded(),
        }
    }

    pub fn tokenizer(&self) -> Result<Tokenizer, TokenizerError> {
        let vocab = Arc::new(self.load_vocabulary()?);
        Tokenizer::with_cache_scope(vocab, self.cache_scope)
    }
}
