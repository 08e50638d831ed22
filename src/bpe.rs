//! Rank-guided byte-pair merging over byte-level alphabet strings.
//!
//! Symbols are kept as `[start, end)` byte ranges into the segment string, so
//! adjacent symbols are adjacent in memory and merging two neighbours is a
//! range extension with no allocation.
use dashmap::DashMap;
use rustc_hash::FxHashMap;

use crate::byte_level;
use crate::vocab::MergeRanks;

/// Memo of raw pre-segment → merged (space-joined) subwords.
pub trait MergeCache {
    fn get(&self, segment: &str) -> Option<String>;
    fn insert(&mut self, segment: &str, merged: &str);
}

/// Per-call cache.
impl MergeCache for FxHashMap<String, String> {
    fn get(&self, segment: &str) -> Option<String> {
        FxHashMap::get(self, segment).cloned()
    }

    fn insert(&mut self, segment: &str, merged: &str) {
        FxHashMap::insert(self, segment.to_string(), merged.to_string());
    }
}

/// Process-wide cache, safe to populate from concurrent tokenize calls.
///
/// Values are a pure function of the key and the immutable vocabulary, so a
/// racing insert of the same key always writes the same value.
///
/// Nothing is evicted: the cache holds one entry per distinct pre-segment
/// ever seen. Call [`clear`](Self::clear) to bound it on long-lived
/// tokenizers.
#[derive(Debug, Default)]
pub struct SharedMergeCache {
    map: DashMap<String, String>,
}

impl SharedMergeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&self) {
        self.map.clear();
    }
}

impl MergeCache for &SharedMergeCache {
    fn get(&self, segment: &str) -> Option<String> {
        self.map.get(segment).map(|v| v.value().clone())
    }

    fn insert(&mut self, segment: &str, merged: &str) {
        self.map.insert(segment.to_string(), merged.to_string());
    }
}

pub struct BpeMerger<'v> {
    ranks: &'v MergeRanks,
}

impl<'v> BpeMerger<'v> {
    pub fn new(ranks: &'v MergeRanks) -> Self {
        BpeMerger { ranks }
    }

    /// Merge one pre-segment already mapped to the byte-level alphabet (one
    /// `char` per original byte). Returns the final subwords joined by single
    /// spaces.
    ///
    /// Each round picks the adjacent pair with the lowest rank and merges every
    /// non-overlapping occurrence of it, left to right. Stops when no adjacent
    /// pair has a rank, nothing changed, or a single symbol remains.
    pub fn merge(&self, word: &str) -> String {
        let mut parts: Vec<(usize, usize)> = word
            .char_indices()
            .map(|(i, c)| (i, i + c.len_utf8()))
            .collect();
        if parts.len() <= 1 {
            return word.to_string();
        }

        let sym = |p: (usize, usize)| &word[p.0..p.1];

        loop {
            let best = parts
                .windows(2)
                .filter_map(|w| {
                    self.ranks
                        .rank(sym(w[0]), sym(w[1]))
                        .map(|rank| (rank, w[0], w[1]))
                })
                .min_by_key(|&(rank, _, _)| rank);
            let Some((_, first, second)) = best else {
                break;
            };
            let (first, second) = (sym(first), sym(second));

            let mut merged = Vec::with_capacity(parts.len());
            let mut i = 0;
            while i < parts.len() {
                if i + 1 < parts.len() && sym(parts[i]) == first && sym(parts[i + 1]) == second {
                    merged.push((parts[i].0, parts[i + 1].1));
                    i += 2;
                } else {
                    merged.push(parts[i]);
                    i += 1;
                }
            }

            if merged.len() == parts.len() {
                break;
            }
            parts = merged;
            if parts.len() == 1 {
                break;
            }
        }

        let mut out = String::with_capacity(word.len() + parts.len());
        for (idx, &p) in parts.iter().enumerate() {
            if idx > 0 {
                out.push(' ');
            }
            out.push_str(sym(p));
        }
        out
    }

    /// Map a raw pre-segment to the alphabet and merge it, memoized under the
    /// raw text.
    pub fn merge_segment<C: MergeCache>(
        &self,
        raw: &str,
        table: &[char; 256],
        cache: &mut C,
    ) -> String {
        if let Some(hit) = cache.get(raw) {
            return hit;
        }
        let symbols = byte_level::encode_bytes(raw.as_bytes(), table);
        let merged = self.merge(&symbols);
        cache.insert(raw, &merged);
        merged
    }
}
