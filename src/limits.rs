//! Context window sizes, in tokens, of the OpenAI completion models.
//!
//! Models not listed here have no enforced limit.
use rustc_hash::FxHashMap;

pub const MODEL_LIMITS: &[(&str, usize)] = &[
    // GPT-4
    ("gpt-4", 8192),
    ("gpt-4-0314", 8192),
    ("gpt-4-32k", 32768),
    ("gpt-4-32k-0314", 32768),
    // GPT-3.5
    ("gpt-3.5-turbo", 4096),
    ("gpt-3.5-turbo-0301", 4096),
    ("text-davinci-003", 4097),
    ("text-davinci-002", 4097),
    ("code-davinci-002", 8001),
    // GPT-3
    ("text-curie-001", 2049),
    ("text-babbage-001", 2049),
    ("text-ada-001", 2049),
    ("davinci", 2049),
    ("curie", 2049),
    ("babbage", 2049),
    ("ada", 2049),
];

/// Look a model up in the built-in table.
pub fn max_tokens(model: &str) -> Option<usize> {
    MODEL_LIMITS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|&(_, max)| max)
}

/// The built-in table plus any limits registered at configuration time.
#[derive(Debug, Clone, Default)]
pub struct ModelLimits {
    extra: FxHashMap<String, usize>,
}

impl ModelLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or override the limit of one model.
    pub fn with_limit(mut self, model: impl Into<String>, max: usize) -> Self {
        self.extra.insert(model.into(), max);
        self
    }

    /// `None` means the model is unlimited.
    pub fn max_tokens(&self, model: &str) -> Option<usize> {
        self.extra.get(model).copied().or_else(|| max_tokens(model))
    }
}
