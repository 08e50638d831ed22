//! GPT-2 pre-segmentation.
//!
//! Splits text into contractions, letter runs, digit runs, symbol runs and
//! whitespace runs before byte-level BPE. Merge ranks and token ids are
//! defined relative to these exact boundaries.

/// The GPT-2 / GPT-3 split pattern. Alternatives are tried in order; trailing
/// whitespace is kept apart from the next word by `\s+(?!\S)`.
pub const GPT2_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

pub struct PreSegmenter {
    regex: fancy_regex::Regex,
}

impl PreSegmenter {
    pub fn new() -> Result<Self, fancy_regex::Error> {
        Self::with_pattern(GPT2_PATTERN)
    }

    pub fn with_pattern(pattern: &str) -> Result<Self, fancy_regex::Error> {
        let regex = fancy_regex::Regex::new(pattern)?;
        Ok(PreSegmenter { regex })
    }

    /// Like [`with_pattern`](Self::with_pattern) with an explicit cap on
    /// regex backtracking steps per match.
    pub fn with_backtrack_limit(pattern: &str, limit: usize) -> Result<Self, fancy_regex::Error> {
        let regex = fancy_regex::RegexBuilder::new(pattern)
            .backtrack_limit(limit)
            .build()?;
        Ok(PreSegmenter { regex })
    }

    /// Lazily split `text`. The segments cover the input exactly once, in
    /// order. Call again to restart.
    pub fn segment<'r, 't>(&'r self, text: &'t str) -> Segments<'r, 't> {
        Segments {
            text,
            matches: self.regex.find_iter(text),
            pos: 0,
            pending: None,
            done: false,
        }
    }
}

/// Iterator over the pre-segments of one text.
///
/// Any stretch the pattern does not match is emitted as its own segment. If
/// the regex engine gives up (backtrack limit) the error is yielded and the
/// iterator ends.
pub struct Segments<'r, 't> {
    text: &'t str,
    matches: fancy_regex::Matches<'r, 't>,
    pos: usize,
    pending: Option<(usize, usize)>,
    done: bool,
}

impl<'r, 't> Iterator for Segments<'r, 't> {
    type Item = Result<&'t str, fancy_regex::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((start, end)) = self.pending.take() {
                self.pos = end;
                return Some(Ok(&self.text[start..end]));
            }
            if self.done {
                return None;
            }
            match self.matches.next() {
                Some(Ok(m)) => {
                    if m.start() == m.end() {
                        continue;
                    }
                    if m.start() > self.pos {
                        let gap = self.pos;
                        self.pending = Some((m.start(), m.end()));
                        self.pos = m.start();
                        return Some(Ok(&self.text[gap..m.start()]));
                    }
                    self.pos = m.end();
                    return Some(Ok(m.as_str()));
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, offset = self.pos, "pre-segmentation failed");
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    if self.pos < self.text.len() {
                        let start = self.pos;
                        self.pos = self.text.len();
                        return Some(Ok(&self.text[start..]));
                    }
                }
            }
        }
    }
}
