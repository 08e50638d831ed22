#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use gptbudget::byte_level::byte_to_char_table;
use gptbudget::{MergeRanks, Tokenizer, Vocabulary};

/// A slice of the real GPT-2 vocabulary: enough ids and merges to tokenize
/// the fixture texts exactly as the full assets would.
pub const ENCODER: &[(&str, u32)] = &[
    ("<", 27),
    (">", 29),
    ("_", 62),
    ("|", 91),
    ("ĉ", 197),
    ("Ċ", 198),
    ("Ġ", 220),
    ("ĭ", 233),
    ("Į", 234),
    ("į", 235),
    ("Ġa", 257),
    ("Ġis", 318),
    ("im", 320),
    ("end", 437),
    ("iv", 452),
    ("ind", 521),
    ("Ġworld", 995),
    ("Ġmessage", 3275),
    ("this", 5661),
    ("Ġprompt", 6152),
    ("start", 9688),
    ("system", 10057),
    ("ĠðŁ", 12520),
    ("isible", 12843),
    ("hello", 31373),
    ("ĠðŁĳ", 50169),
];

pub const MERGES: &[(&str, &str)] = &[
    ("i", "s"),
    ("t", "h"),
    ("th", "is"),
    ("Ġ", "is"),
    ("Ġ", "a"),
    ("p", "r"),
    ("o", "m"),
    ("p", "t"),
    ("pr", "om"),
    ("prom", "pt"),
    ("Ġ", "prompt"),
    ("i", "n"),
    ("in", "d"),
    ("i", "v"),
    ("i", "b"),
    ("l", "e"),
    ("ib", "le"),
    ("is", "ible"),
    ("h", "e"),
    ("l", "l"),
    ("he", "ll"),
    ("hell", "o"),
    ("ð", "Ł"),
    ("Ġ", "ðŁ"),
    ("ĠðŁ", "ĳ"),
    ("o", "r"),
    ("w", "or"),
    ("l", "d"),
    ("wor", "ld"),
    ("Ġ", "world"),
    ("i", "m"),
    ("s", "t"),
    ("a", "r"),
    ("st", "ar"),
    ("star", "t"),
    ("s", "y"),
    ("e", "m"),
    ("sy", "st"),
    ("syst", "em"),
    ("m", "e"),
    ("s", "s"),
    ("a", "g"),
    ("ag", "e"),
    ("me", "ss"),
    ("mess", "age"),
    ("Ġ", "message"),
    ("e", "n"),
    ("en", "d"),
];

pub fn vocabulary() -> Arc<Vocabulary> {
    let encoder: FxHashMap<String, u32> = ENCODER
        .iter()
        .map(|(piece, id)| (piece.to_string(), *id))
        .collect();
    let ranks = MergeRanks::from_pairs(MERGES.iter().copied());
    Arc::new(Vocabulary::new(byte_to_char_table(), encoder, ranks).unwrap())
}

pub fn tokenizer() -> Tokenizer {
    Tokenizer::new(vocabulary()).unwrap()
}

/// Write the fixture as `characters.json`, `encoder.json` and `vocab.bpe`.
pub fn write_assets(dir: &Path) {
    let table = byte_to_char_table();
    let characters: serde_json::Map<String, serde_json::Value> = table
        .iter()
        .enumerate()
        .map(|(b, ch)| (b.to_string(), serde_json::Value::String(ch.to_string())))
        .collect();
    std::fs::write(
        dir.join("characters.json"),
        serde_json::to_vec(&characters).unwrap(),
    )
    .unwrap();

    let encoder: serde_json::Map<String, serde_json::Value> = ENCODER
        .iter()
        .map(|(piece, id)| (piece.to_string(), serde_json::Value::from(*id)))
        .collect();
    std::fs::write(dir.join("encoder.json"), serde_json::to_vec(&encoder).unwrap()).unwrap();

    let mut merges = String::from("#version: 0.2\n");
    for (left, right) in MERGES {
        merges.push_str(left);
        merges.push(' ');
        merges.push_str(right);
        merges.push('\n');
    }
    std::fs::write(dir.join("vocab.bpe"), merges).unwrap();
}
