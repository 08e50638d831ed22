mod common;

use gptbudget::{CacheScope, ChatMessage, Tokenizer, TokenizerError, Vocabulary};

fn pairs(tokenizer: &Tokenizer, text: &str) -> Vec<(String, u32)> {
    tokenizer
        .tokenize(text)
        .unwrap()
        .into_iter()
        .map(|t| (t.piece, t.id))
        .collect()
}

fn owned(expected: &[(&str, u32)]) -> Vec<(String, u32)> {
    expected.iter().map(|(p, id)| (p.to_string(), *id)).collect()
}

const SYSTEM_MESSAGE: &[(&str, u32)] = &[
    ("<", 27),
    ("|", 91),
    ("im", 320),
    ("_", 62),
    ("start", 9688),
    ("|", 91),
    (">", 29),
    ("system", 10057),
    ("Ċ", 198),
    ("system", 10057),
    ("Ġmessage", 3275),
    ("Ċ", 198),
    ("<", 27),
    ("|", 91),
    ("im", 320),
    ("_", 62),
    ("end", 437),
    ("|", 91),
    (">", 29),
];

#[test]
fn test_space() {
    let tok = common::tokenizer();
    assert_eq!(pairs(&tok, " "), owned(&[("Ġ", 220)]));
}

#[test]
fn test_tab() {
    let tok = common::tokenizer();
    assert_eq!(pairs(&tok, "\t"), owned(&[("ĉ", 197)]));
}

#[test]
fn test_simple_text() {
    let tok = common::tokenizer();
    assert_eq!(
        pairs(&tok, "this is a prompt"),
        owned(&[("this", 5661), ("Ġis", 318), ("Ġa", 257), ("Ġprompt", 6152)])
    );
}

#[test]
fn test_multi_token_word() {
    let tok = common::tokenizer();
    assert_eq!(
        pairs(&tok, "indivisible"),
        owned(&[("ind", 521), ("iv", 452), ("isible", 12843)])
    );
}

#[test]
fn test_emojis() {
    let tok = common::tokenizer();
    assert_eq!(
        pairs(&tok, "hello 👋 world 🌍"),
        owned(&[
            ("hello", 31373),
            ("ĠðŁĳ", 50169),
            ("ĭ", 233),
            ("Ġworld", 995),
            ("ĠðŁ", 12520),
            ("Į", 234),
            ("į", 235),
        ])
    );
}

#[test]
fn test_empty_text() {
    let tok = common::tokenizer();
    assert!(tok.tokenize("").unwrap().is_empty());
    assert_eq!(tok.count_tokens("").unwrap(), 0);
}

#[test]
fn test_repeated_words_all_count() {
    let tok = common::tokenizer();
    let seq = tok.tokenize("this is a prompt this is a prompt").unwrap();
    // No "Ġthis" merge in the fixture, so the second "this" splits.
    assert_eq!(
        seq.ids(),
        vec![5661, 318, 257, 6152, 220, 5661, 318, 257, 6152]
    );
}

#[test]
fn test_one_system_message() {
    let tok = common::tokenizer();
    let seq = tok
        .tokenize_messages(&[ChatMessage::system("system message")])
        .unwrap();
    let got: Vec<(String, u32)> = seq.into_iter().map(|t| (t.piece, t.id)).collect();
    assert_eq!(got, owned(SYSTEM_MESSAGE));
}

#[test]
fn test_two_messages_are_joined_by_newline() {
    let tok = common::tokenizer();
    let messages = vec![
        ChatMessage::system("system message"),
        ChatMessage::system("system message"),
    ];
    let seq = tok.tokenize_messages(&messages).unwrap();
    assert_eq!(seq.len(), 39);

    let mut expected = owned(SYSTEM_MESSAGE);
    expected.push(("Ċ".to_string(), 198));
    expected.extend(owned(SYSTEM_MESSAGE));
    let got: Vec<(String, u32)> = seq.into_iter().map(|t| (t.piece, t.id)).collect();
    assert_eq!(got, expected);
}

#[test]
fn test_no_messages() {
    let tok = common::tokenizer();
    assert!(tok.tokenize_messages(&[]).unwrap().is_empty());
}

#[test]
fn test_deterministic_across_scopes() {
    let per_call = common::tokenizer();
    let shared = Tokenizer::with_cache_scope(common::vocabulary(), CacheScope::Shared).unwrap();
    for text in ["hello 👋 world 🌍", "indivisible", "this is a prompt", "\t \t"] {
        let expected = per_call.tokenize(text).unwrap();
        assert_eq!(shared.tokenize(text).unwrap(), expected);
        assert_eq!(shared.tokenize(text).unwrap(), expected);
        assert_eq!(per_call.tokenize(text).unwrap(), expected);
    }
}

#[test]
fn test_threads_share_one_cache() {
    let tok = Tokenizer::with_cache_scope(common::vocabulary(), CacheScope::Shared).unwrap();
    let expected = tok.tokenize("hello 👋 world 🌍").unwrap();
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..25 {
                    assert_eq!(tok.tokenize("hello 👋 world 🌍").unwrap(), expected);
                }
            });
        }
    });
}

#[test]
fn test_unknown_piece() {
    let tok = common::tokenizer();
    match tok.tokenize("hello there").unwrap_err() {
        TokenizerError::UnknownPiece { segment, .. } => assert_eq!(segment, " there"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_load_from_dir() {
    let dir = tempfile::tempdir().unwrap();
    common::write_assets(dir.path());
    let vocab = Vocabulary::from_dir(dir.path()).unwrap();
    assert_eq!(vocab.len(), common::ENCODER.len());
    assert_eq!(vocab.ranks().len(), common::MERGES.len());
    assert_eq!(vocab.ranks().rank("i", "s"), Some(0));

    let from_dir = Tokenizer::new(std::sync::Arc::new(vocab)).unwrap();
    let fixture = common::tokenizer();
    assert_eq!(
        from_dir.tokenize("hello 👋 world 🌍").unwrap(),
        fixture.tokenize("hello 👋 world 🌍").unwrap()
    );
}

#[test]
fn test_load_from_incomplete_dir() {
    let dir = tempfile::tempdir().unwrap();
    common::write_assets(dir.path());
    std::fs::remove_file(dir.path().join("vocab.bpe")).unwrap();
    assert!(Vocabulary::from_dir(dir.path()).is_err());
}
