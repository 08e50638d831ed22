//! GPT-2 / GPT-3 byte-level BPE tokenizer with context-budget pruning.
//!
//! ```ignore
//! let tokenizer = Tokenizer::new(Arc::new(Vocabulary::from_dir("assets")?))?;
//! let pruned = Pruner::new(&tokenizer, &ModelLimits::default())
//!     .pin_first(true)
//!     .prune("gpt-3.5-turbo", &messages)?;
//! ```

pub mod bpe;
pub mod budget;
pub mod byte_level;
pub mod config;
pub mod limits;
pub mod message;
pub mod pretokenize;
pub mod service;
pub mod tokenizer;
pub mod vocab;

mod embedded {
    include!(concat!(env!("OUT_DIR"), "/embedded_vocab.rs"));
}

pub use budget::{BudgetError, PruneStep, Pruned, Pruner};
pub use config::Config;
pub use limits::ModelLimits;
pub use message::{ChatMessage, Role};
pub use service::{ChatRequest, ChatService, CompletionClient, ServiceError};
pub use tokenizer::{CacheScope, Token, TokenCounter, TokenSequence, Tokenizer, TokenizerError};
pub use vocab::{MergeRanks, VocabError, Vocabulary};
