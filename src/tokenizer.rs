//! GPT-2 / GPT-3 byte-level BPE tokenizer.
//!
//! Tokenization: regex pre-segmentation → byte-level alphabet → rank-guided
//! BPE (memoized per segment) → token id lookup. Output keeps text order and
//! every repeated subword.
use std::sync::Arc;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::bpe::{BpeMerger, MergeCache, SharedMergeCache};
use crate::message::ChatMessage;
use crate::pretokenize::PreSegmenter;
use crate::vocab::{VocabError, Vocabulary};

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Vocabulary error: {0}")]
    Vocab(#[from] VocabError),
    #[error("Regex compilation error: {0}")]
    Regex(#[from] fancy_regex::Error),
    #[error("Pre-segmentation failed: {0}")]
    Segmentation(#[source] fancy_regex::Error),
    #[error("Vocabulary mismatch: subword {piece:?} (from segment {segment:?}) has no token id")]
    UnknownPiece { piece: String, segment: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub piece: String,
    pub id: u32,
}

/// Ordered tokens of one text. Not a set: the same subword may appear many
/// times and every occurrence counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSequence {
    tokens: Vec<Token>,
}

impl TokenSequence {
    pub fn push(&mut self, piece: impl Into<String>, id: u32) {
        self.tokens.push(Token {
            piece: piece.into(),
            id,
        });
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.tokens.iter().map(|t| t.id).collect()
    }

    pub fn pieces(&self) -> Vec<&str> {
        self.tokens.iter().map(|t| t.piece.as_str()).collect()
    }

    pub fn as_slice(&self) -> &[Token] {
        &self.tokens
    }
}

impl IntoIterator for TokenSequence {
    type Item = Token;
    type IntoIter = std::vec::IntoIter<Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.into_iter()
    }
}

impl<'a> IntoIterator for &'a TokenSequence {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}

/// How long merge results are remembered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheScope {
    /// A fresh cache for every tokenize call.
    #[default]
    PerCall,
    /// One cache for the lifetime of the tokenizer, shared across threads.
    /// Unbounded; see [`Tokenizer::clear_merge_cache`].
    Shared,
}

/// Anything that can measure the token cost of prompts and conversations.
pub trait TokenCounter {
    fn count_text(&self, text: &str) -> Result<usize, TokenizerError>;
    fn count_messages(&self, messages: &[ChatMessage]) -> Result<usize, TokenizerError>;
}

impl<T: TokenCounter + ?Sized> TokenCounter for &T {
    fn count_text(&self, text: &str) -> Result<usize, TokenizerError> {
        (**self).count_text(text)
    }

    fn count_messages(&self, messages: &[ChatMessage]) -> Result<usize, TokenizerError> {
        (**self).count_messages(messages)
    }
}

pub struct Tokenizer {
    vocab: Arc<Vocabulary>,
    segmenter: PreSegmenter,
    shared_cache: Option<SharedMergeCache>,
}

impl Tokenizer {
    pub fn new(vocab: Arc<Vocabulary>) -> Result<Self, TokenizerError> {
        Self::with_cache_scope(vocab, CacheScope::default())
    }

    pub fn with_cache_scope(
        vocab: Arc<Vocabulary>,
        scope: CacheScope,
    ) -> Result<Self, TokenizerError> {
        let segmenter = PreSegmenter::new()?;
        let shared_cache = match scope {
            CacheScope::PerCall => None,
            CacheScope::Shared => Some(SharedMergeCache::new()),
        };
        Ok(Tokenizer {
            vocab,
            segmenter,
            shared_cache,
        })
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }

    pub fn cache_scope(&self) -> CacheScope {
        match self.shared_cache {
            Some(_) => CacheScope::Shared,
            None => CacheScope::PerCall,
        }
    }

    /// Number of memoized pre-segments held by the shared cache (0 for
    /// [`CacheScope::PerCall`]).
    pub fn merge_cache_len(&self) -> usize {
        self.shared_cache.as_ref().map_or(0, SharedMergeCache::len)
    }

    /// Drop every memoized merge. The shared cache never evicts on its own.
    pub fn clear_merge_cache(&self) {
        if let Some(cache) = &self.shared_cache {
            cache.clear();
        }
    }

    /// Tokenize `text` into ordered `(subword, id)` pairs.
    pub fn tokenize(&self, text: &str) -> Result<TokenSequence, TokenizerError> {
        if text.is_empty() {
            return Ok(TokenSequence::default());
        }
        match &self.shared_cache {
            Some(shared) => self.tokenize_with(text, &mut &*shared),
            None => self.tokenize_with(text, &mut FxHashMap::<String, String>::default()),
        }
    }

    fn tokenize_with<C: MergeCache>(
        &self,
        text: &str,
        cache: &mut C,
    ) -> Result<TokenSequence, TokenizerError> {
        let bpe = BpeMerger::new(self.vocab.ranks());
        let table = self.vocab.byte_to_char();
        let mut tokens = TokenSequence::default();

        for segment in self.segmenter.segment(text) {
            let segment = segment.map_err(TokenizerError::Segmentation)?;
            let merged = bpe.merge_segment(segment, table, cache);
            for piece in merged.split(' ') {
                let id = self
                    .vocab
                    .token_id(piece)
                    .ok_or_else(|| TokenizerError::UnknownPiece {
                        piece: piece.to_string(),
                        segment: segment.to_string(),
                    })?;
                tokens.push(piece, id);
            }
        }

        Ok(tokens)
    }

    /// Tokenize a conversation as the ChatML text the model actually sees:
    /// each message framed by `<|im_start|>` / `<|im_end|>`, blocks joined by
    /// newlines.
    pub fn tokenize_messages(
        &self,
        messages: &[ChatMessage],
    ) -> Result<TokenSequence, TokenizerError> {
        let text = messages
            .iter()
            .map(ChatMessage::frame)
            .collect::<Vec<_>>()
            .join("\n");
        self.tokenize(&text)
    }

    pub fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(self.tokenize(text)?.len())
    }
}

impl TokenCounter for Tokenizer {
    fn count_text(&self, text: &str) -> Result<usize, TokenizerError> {
        self.count_tokens(text)
    }

    fn count_messages(&self, messages: &[ChatMessage]) -> Result<usize, TokenizerError> {
        Ok(self.tokenize_messages(messages)?.len())
    }
}
