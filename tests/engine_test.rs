mod common;

use std::sync::Arc;

use common::{
    fixture_assets, fixture_engine, init_logger, ready_engine, special_token_assets, LexiconBackend, CLS_ID,
    LABELS, MAX_SEQUENCE_LENGTH, SEP_ID,
};
use verdict::{ClassificationEngine, EngineError, EngineState, ErrorKind};

#[test]
fn test_predict_before_initialize() {
    init_logger();
    let engine = fixture_engine(Arc::new(LexiconBackend::default()));
    assert_eq!(engine.state(), EngineState::Uninitialized);

    let err = engine.predict("I love this product!").unwrap_err();
    assert_eq!(err, EngineError::NotReady(EngineState::Uninitialized));
    assert_eq!(engine.state(), EngineState::Uninitialized);
    assert!(engine.info().is_none());
}

#[test]
fn test_end_to_end_classification() -> Result<(), Box<dyn std::error::Error>> {
    let engine = ready_engine();
    assert_eq!(engine.state(), EngineState::Ready);

    let result = engine.predict("I love this product!")?;
    assert_eq!(result.label(), "positive");
    assert!(result.score() >= 0.5);
    assert_eq!(result.class_index(), 1);

    let result = engine.predict("What an awful, terrible movie")?;
    assert_eq!(result.label(), "negative");
    assert!(result.score() > 0.9);
    Ok(())
}

#[test]
fn test_blank_input() {
    let engine = ready_engine();
    for text in ["", "   ", "\n\t "] {
        let err = engine.predict(text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "input {:?}", text);
    }
    assert_eq!(engine.state(), EngineState::Ready);
}

#[test]
fn test_results_within_label_set_and_range() -> Result<(), EngineError> {
    let engine = ready_engine();
    let inputs = [
        "great",
        "bad",
        "a sentence with no known words at all",
        "good good bad",
        "!!!",
        "I hate this product but love the movie",
        "EXCELLENT",
    ];
    for text in inputs {
        let result = engine.predict(text)?;
        assert!(LABELS.contains(&result.label()), "label {}", result.label());
        assert!((0.0..=1.0).contains(&result.score()));
        assert_eq!(result.scores().len(), LABELS.len());
        let total: f32 = result.scores().iter().map(|s| s.score).sum();
        assert!((total - 1.0).abs() < 1e-5);
    }
    Ok(())
}

#[test]
fn test_unknown_words_tie_to_first_label() -> Result<(), EngineError> {
    let engine = ready_engine();
    // Equal logits: the tie goes to the lowest class index.
    let result = engine.predict("completely neutral words")?;
    assert_eq!(result.label(), "negative");
    assert!((result.score() - 0.5).abs() < 1e-6);
    Ok(())
}

#[test]
fn test_initialize_is_idempotent() -> Result<(), EngineError> {
    init_logger();
    let backend = Arc::new(LexiconBackend::default());
    let engine = fixture_engine(Arc::clone(&backend));
    let assets = fixture_assets();

    engine.initialize(&assets)?;
    let first = engine.predict("good movie")?;
    engine.initialize(&assets)?;
    let second = engine.predict("good movie")?;

    assert_eq!(engine.state(), EngineState::Ready);
    assert_eq!(backend.loads(), 1);
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_determinism() -> Result<(), EngineError> {
    let engine = ready_engine();
    let a = engine.predict("This movie is good, but the product is bad")?;
    let b = engine.predict("This movie is good, but the product is bad")?;
    assert_eq!(a.label(), b.label());
    assert_eq!(a.score().to_bits(), b.score().to_bits());
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn test_case_folding_and_whitespace() -> Result<(), EngineError> {
    let engine = ready_engine();
    let plain = engine.predict("love")?;
    let shouted = engine.predict("   LOVE \n")?;
    assert_eq!(plain, shouted);
    Ok(())
}

#[test]
fn test_long_input_is_truncated() -> Result<(), EngineError> {
    let engine = ready_engine();
    // Only the first 16 tokens count: the negative tail is cut off.
    let text = format!("{} {}", "great ".repeat(16), "awful ".repeat(40));
    assert_eq!(engine.count_tokens(&text)?, 56);

    let result = engine.predict(&text)?;
    assert!(result.truncated());
    assert_eq!(result.label(), "positive");

    let short = engine.predict("great")?;
    assert!(!short.truncated());
    Ok(())
}

#[test]
fn test_special_tokens_kept_on_long_input() -> Result<(), EngineError> {
    init_logger();
    let backend = Arc::new(LexiconBackend::default());
    let engine = fixture_engine(Arc::clone(&backend));
    engine.initialize(&special_token_assets())?;

    let text = format!("{} {}", "great ".repeat(20), "awful ".repeat(20));
    assert_eq!(engine.count_tokens(&text)?, 42);
    let result = engine.predict(&text)?;
    assert!(result.truncated());
    assert_eq!(result.label(), "positive");

    let input = backend.last_input().expect("model was run");
    assert_eq!(input.token_count, MAX_SEQUENCE_LENGTH);
    assert_eq!(input.input_ids[0], CLS_ID);
    assert_eq!(input.input_ids[MAX_SEQUENCE_LENGTH - 1], SEP_ID);
    assert!(input.input_ids[1..MAX_SEQUENCE_LENGTH - 1].iter().all(|&id| id == 8));

    engine.predict("I love this product!")?;
    let input = backend.last_input().expect("model was run");
    assert_eq!(input.tokens(), &[CLS_ID, 2, 7, 3, 4, 6, SEP_ID]);
    assert_eq!(input.attention_mask.iter().sum::<i64>(), 7);
    Ok(())
}

#[test]
fn test_engine_info() {
    let engine = ready_engine();
    let info = engine.info().expect("ready engine has info");
    assert_eq!(info.labels, LABELS);
    assert_eq!(info.max_sequence_length, common::MAX_SEQUENCE_LENGTH);
    assert_eq!(info.backend, "lexicon");
    assert_eq!(info.model_asset, "lexicon.json");
    assert_eq!(info.model_sha256, verdict::assets::sha256_hex(common::LEXICON_JSON.as_bytes()));
    assert!(info.source.contains("in-memory"));
    assert_eq!(engine.labels(), Some(vec!["negative".to_string(), "positive".to_string()]));
}

#[test]
fn test_count_tokens_requires_ready_engine() {
    let engine = ClassificationEngine::new();
    assert!(matches!(
        engine.count_tokens("hello"),
        Err(EngineError::NotReady(EngineState::Uninitialized))
    ));
}

#[test]
fn test_engine_moves_across_threads() {
    let engine = ready_engine();
    let result = std::thread::spawn(move || engine.predict("excellent").map(|r| r.label().to_string()))
        .join()
        .unwrap();
    assert_eq!(result.unwrap(), "positive");
}
