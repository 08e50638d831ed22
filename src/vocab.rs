//! Vocabulary loading for the GPT-2 / GPT-3 byte-level BPE assets.
//!
//! Three assets make up a vocabulary:
//!
//! - `characters.json`: the byte → alphabet table, either an object keyed by
//!   byte value (`{"32": "Ġ", ...}`) or a 256-element array
//! - `encoder.json`: token string → id (`{"Ġthe": 262, ...}`)
//! - `vocab.bpe`: one `left right` merge rule per line, after a header line
//!
//! Merge ranks are assigned in file order starting at 0. Lower ranks merge
//! first, and the order is never re-sorted.

use std::path::Path;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::byte_level;
use crate::embedded;

pub const CHARACTERS_FILE: &str = "characters.json";
pub const ENCODER_FILE: &str = "encoder.json";
pub const MERGES_FILE: &str = "vocab.bpe";

/// Errors that can occur when loading vocabulary assets.
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {asset}: {source}")]
    Json {
        asset: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid UTF-8 in {asset}: {source}")]
    Utf8 {
        asset: &'static str,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("Invalid byte table: {0}")]
    ByteTable(String),
    #[error("Invalid merge rule on line {line}: {content:?}")]
    MergeLine { line: usize, content: String },
    #[error("Vocabulary assets were not embedded (build with GPT_TOKENIZER_ASSETS)")]
    NotEmbedded,
}

/// Ordered merge rules: `(left, right) → rank`.
///
/// Nested maps so a pair can be looked up from two borrowed `&str` without
/// building a joined key.
#[derive(Debug, Default)]
pub struct MergeRanks {
    ranks: FxHashMap<String, FxHashMap<String, u32>>,
    len: usize,
}

impl MergeRanks {
    /// Build ranks from pairs in priority order. A repeated pair keeps the
    /// rank of its first occurrence.
    pub fn from_pairs<I, L, R>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (L, R)>,
        L: Into<String>,
        R: Into<String>,
    {
        let mut ranks = MergeRanks::default();
        for (left, right) in pairs {
            ranks.push(left.into(), right.into());
        }
        ranks
    }

    /// Parse the `vocab.bpe` text. The first line is a header and is skipped;
    /// blank lines are ignored.
    pub fn parse(text: &str) -> Result<Self, VocabError> {
        let mut ranks = MergeRanks::default();
        for (idx, line) in text.lines().enumerate().skip(1) {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (None, _, _) => continue,
                (Some(left), Some(right), None) => ranks.push(left.to_string(), right.to_string()),
                _ => {
                    return Err(VocabError::MergeLine {
                        line: idx + 1,
                        content: line.to_string(),
                    })
                }
            }
        }
        Ok(ranks)
    }

    fn push(&mut self, left: String, right: String) {
        let rank = self.len as u32;
        let inner = self.ranks.entry(left).or_default();
        if let std::collections::hash_map::Entry::Vacant(slot) = inner.entry(right) {
            slot.insert(rank);
            self.len += 1;
        }
    }

    /// Rank of merging `left` followed by `right`, or `None` if the pair is
    /// not a merge rule.
    #[inline]
    pub fn rank(&self, left: &str, right: &str) -> Option<u32> {
        self.ranks.get(left)?.get(right).copied()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The immutable tables a tokenizer needs. Load once and share via `Arc`.
#[derive(Debug)]
pub struct Vocabulary {
    byte_to_char: [char; 256],
    char_to_byte: FxHashMap<char, u8>,
    ranks: MergeRanks,
    encoder: FxHashMap<String, u32>,
}

impl Vocabulary {
    pub fn new(
        byte_to_char: [char; 256],
        encoder: FxHashMap<String, u32>,
        ranks: MergeRanks,
    ) -> Result<Self, VocabError> {
        let mut char_to_byte = FxHashMap::default();
        for (b, &ch) in byte_to_char.iter().enumerate() {
            if char_to_byte.insert(ch, b as u8).is_some() {
                return Err(VocabError::ByteTable(format!(
                    "character {:?} is assigned to more than one byte",
                    ch
                )));
            }
        }
        tracing::debug!(
            tokens = encoder.len(),
            merges = ranks.len(),
            "vocabulary loaded"
        );
        Ok(Vocabulary {
            byte_to_char,
            char_to_byte,
            ranks,
            encoder,
        })
    }

    /// Parse the three raw assets.
    pub fn from_bytes(
        characters: &[u8],
        encoder: &[u8],
        merges: &[u8],
    ) -> Result<Self, VocabError> {
        let byte_to_char = parse_byte_table(characters)?;
        let encoder: FxHashMap<String, u32> =
            serde_json::from_slice(encoder).map_err(|source| VocabError::Json {
                asset: ENCODER_FILE,
                source,
            })?;
        let merges = std::str::from_utf8(merges).map_err(|source| VocabError::Utf8 {
            asset: MERGES_FILE,
            source,
        })?;
        let ranks = MergeRanks::parse(merges)?;
        Vocabulary::new(byte_to_char, encoder, ranks)
    }

    /// Load `characters.json`, `encoder.json` and `vocab.bpe` from a directory.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, VocabError> {
        let dir = dir.as_ref();
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read(&path).map_err(|source| VocabError::Io {
                path: path.display().to_string(),
                source,
            })
        };
        let characters = read(CHARACTERS_FILE)?;
        let encoder = read(ENCODER_FILE)?;
        let merges = read(MERGES_FILE)?;
        tracing::info!(dir = %dir.display(), "loading vocabulary assets");
        Vocabulary::from_bytes(&characters, &encoder, &merges)
    }

    /// The assets compiled in from `GPT_TOKENIZER_ASSETS`, if any.
    pub fn embedded() -> Result<Self, VocabError> {
        match (embedded::CHARACTERS, embedded::ENCODER, embedded::MERGES) {
            (Some(characters), Some(encoder), Some(merges)) => {
                Vocabulary::from_bytes(characters, encoder, merges)
            }
            _ => Err(VocabError::NotEmbedded),
        }
    }

    pub fn byte_to_char(&self) -> &[char; 256] {
        &self.byte_to_char
    }

    pub fn char_to_byte(&self, ch: char) -> Option<u8> {
        self.char_to_byte.get(&ch).copied()
    }

    pub fn ranks(&self) -> &MergeRanks {
        &self.ranks
    }

    pub fn token_id(&self, piece: &str) -> Option<u32> {
        self.encoder.get(piece).copied()
    }

    pub fn len(&self) -> usize {
        self.encoder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoder.is_empty()
    }
}

/// Parse `characters.json` into a total byte → char table.
///
/// Object keys are decimal byte values, or single characters whose scalar is
/// the byte value. Every byte must be covered exactly once.
fn parse_byte_table(data: &[u8]) -> Result<[char; 256], VocabError> {
    let root: serde_json::Value =
        serde_json::from_slice(data).map_err(|source| VocabError::Json {
            asset: CHARACTERS_FILE,
            source,
        })?;

    let entries: Vec<(u32, &serde_json::Value)> = match &root {
        serde_json::Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i as u32, v))
            .collect(),
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((byte_key(k)?, v)))
            .collect::<Result<_, VocabError>>()?,
        _ => {
            return Err(VocabError::ByteTable(
                "expected an object or an array".to_string(),
            ))
        }
    };

    let mut table = [None; 256];
    for (byte, value) in entries {
        let slot = table.get_mut(byte as usize).ok_or_else(|| {
            VocabError::ByteTable(format!("byte value {} out of range", byte))
        })?;
        let ch = single_char(value).ok_or_else(|| {
            VocabError::ByteTable(format!("entry {} is not a single character", byte))
        })?;
        if slot.replace(ch).is_some() {
            return Err(VocabError::ByteTable(format!("byte {} defined twice", byte)));
        }
    }

    let mut out = byte_level::byte_to_char_table();
    for (b, entry) in table.iter().enumerate() {
        out[b] = entry
            .ok_or_else(|| VocabError::ByteTable(format!("byte {} has no character", b)))?;
    }
    Ok(out)
}

fn byte_key(key: &str) -> Result<u32, VocabError> {
    if let Ok(n) = key.parse::<u32>() {
        return Ok(n);
    }
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(_), None) => Ok(byte_level::decode_scalar(key.as_bytes())),
        _ => Err(VocabError::ByteTable(format!("invalid key {:?}", key))),
    }
}

fn single_char(value: &serde_json::Value) -> Option<char> {
    let s = value.as_str()?;
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn characters_json() -> String {
        let table = byte_level::byte_to_char_table();
        let map: serde_json::Map<String, serde_json::Value> = table
            .iter()
            .enumerate()
            .map(|(b, ch)| (b.to_string(), serde_json::Value::String(ch.to_string())))
            .collect();
        serde_json::Value::Object(map).to_string()
    }

    #[test]
    fn test_merge_ranks_in_file_order() {
        let ranks = MergeRanks::parse("#version: 0.2\nĠ t\nĠ a\nh e\n\n").unwrap();
        assert_eq!(ranks.rank("Ġ", "t"), Some(0));
        assert_eq!(ranks.rank("Ġ", "a"), Some(1));
        assert_eq!(ranks.rank("h", "e"), Some(2));
        assert_eq!(ranks.rank("e", "h"), None);
        assert_eq!(ranks.len(), 3);
    }

    #[test]
    fn test_merge_header_is_skipped_even_if_it_looks_like_a_rule() {
        let ranks = MergeRanks::parse("a b\nc d\n").unwrap();
        assert_eq!(ranks.rank("a", "b"), None);
        assert_eq!(ranks.rank("c", "d"), Some(0));
    }

    #[test]
    fn test_duplicate_merge_keeps_first_rank() {
        let ranks = MergeRanks::from_pairs([("a", "b"), ("c", "d"), ("a", "b"), ("e", "f")]);
        assert_eq!(ranks.rank("a", "b"), Some(0));
        assert_eq!(ranks.rank("e", "f"), Some(2));
    }

    #[test]
    fn test_malformed_merge_line() {
        let err = MergeRanks::parse("#version\na b c\n").unwrap_err();
        assert!(matches!(err, VocabError::MergeLine { line: 2, .. }));
    }

    #[test]
    fn test_merges_must_be_utf8() {
        let err = Vocabulary::from_bytes(
            characters_json().as_bytes(),
            br#"{"b": 65}"#,
            b"#version: 0.2
\xFF\xFE b
",
        )
        .unwrap_err();
        assert!(matches!(err, VocabError::Utf8 { asset: MERGES_FILE, .. }));
    }

    #[test]
    fn test_byte_table_object_and_array() {
        let from_object = parse_byte_table(characters_json().as_bytes()).unwrap();
        assert_eq!(from_object, byte_level::byte_to_char_table());

        let array: Vec<String> = byte_level::byte_to_char_table()
            .iter()
            .map(|c| c.to_string())
            .collect();
        let json = serde_json::to_string(&array).unwrap();
        let from_array = parse_byte_table(json.as_bytes()).unwrap();
        assert_eq!(from_array, from_object);
    }

    #[test]
    fn test_byte_table_char_keys() {
        let map: serde_json::Map<String, serde_json::Value> = byte_level::byte_to_char_table()
            .iter()
            .enumerate()
            .map(|(b, ch)| {
                // Digit characters would read as decimal keys.
                let key = if (b as u8).is_ascii_digit() {
                    b.to_string()
                } else {
                    (b as u8 as char).to_string()
                };
                (key, serde_json::Value::String(ch.to_string()))
            })
            .collect();
        let json = serde_json::Value::Object(map).to_string();
        let table = parse_byte_table(json.as_bytes()).unwrap();
        assert_eq!(table, byte_level::byte_to_char_table());
    }

    #[test]
    fn test_byte_table_must_be_complete() {
        let err = parse_byte_table(br#"{"0": "A"}"#).unwrap_err();
        assert!(matches!(err, VocabError::ByteTable(_)));
    }

    #[test]
    fn test_from_bytes() {
        let vocab = Vocabulary::from_bytes(
            characters_json().as_bytes(),
            r#"{"Ġ": 220, "hello": 31373}"#.as_bytes(),
            b"#version: 0.2\nh e\n",
        )
        .unwrap();
        assert_eq!(vocab.token_id("Ġ"), Some(220));
        assert_eq!(vocab.token_id("hello"), Some(31373));
        assert_eq!(vocab.ranks().rank("h", "e"), Some(0));
        assert_eq!(vocab.char_to_byte('Ġ'), Some(b' '));
    }

    #[test]
    fn test_duplicate_alphabet_char_rejected() {
        let mut table = byte_level::byte_to_char_table();
        table[1] = table[0];
        let err = Vocabulary::new(table, FxHashMap::default(), MergeRanks::default()).unwrap_err();
        assert!(matches!(err, VocabError::ByteTable(_)));
    }
}
