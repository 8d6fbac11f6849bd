/// 集成测试：检测-合并-脱敏完整流程
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use doc_redact::analysis::sensitive::merge::merge;
use doc_redact::analysis::sensitive::statistical::{
    OffsetKind, RawEntity, StaticNerBackend, StatisticalRecognizer, UnavailableBackend,
};
use doc_redact::analysis::sensitive::{CustomRuleConfig, PatternRecognizer, RulesFile};
use doc_redact::{
    DetectOptions, DetectionMethod, EntityType, InMemorySource, InputError, PlainTextSource,
    RedactOptions, RedactionEngine, RedactionError, Span,
};

fn star_options() -> RedactOptions {
    RedactOptions::new(DetectOptions::default(), '*')
}

#[tokio::test]
async fn test_contact_line_scenario() {
    let engine = RedactionEngine::with_defaults().unwrap();
    let text = "Contact john@example.com or (555) 123-4567";

    let outcome = engine.redact(text, &star_options()).await.unwrap();
    let spans = &outcome.result.spans;

    assert_eq!(spans.len(), 2);
    assert_eq!(*spans[0].entity_type(), EntityType::Email);
    assert_eq!((spans[0].start(), spans[0].end()), (8, 24));
    assert_eq!(*spans[1].entity_type(), EntityType::Phone);
    assert_eq!((spans[1].start(), spans[1].end()), (28, 42));

    let expected = format!("Contact {} or {}", "*".repeat(16), "*".repeat(14));
    assert_eq!(outcome.redacted_text, expected);
    assert_eq!(outcome.result.summary.total_redactions, 2);
    assert!(!outcome.result.statistical_detection_used);
}

#[test]
fn test_low_confidence_filtered_before_overlap() {
    let text = "Reach me at jane.doe@corp.io soon";
    let email = Span::new(text, 12, 28, EntityType::Email, 0.9, DetectionMethod::Regex).unwrap();
    let person = Span::new(text, 12, 20, EntityType::Person, 0.6, DetectionMethod::Statistical).unwrap();

    let merged = merge(vec![person, email.clone()], 0.7);
    assert_eq!(merged, vec![email]);
}

#[test]
fn test_identical_bounds_prefer_regex() {
    let text = "Acme Widgets Inc";
    let email = Span::new(text, 5, 10, EntityType::Email, 0.9, DetectionMethod::Regex).unwrap();
    let org = Span::new(text, 5, 10, EntityType::Organization, 0.9, DetectionMethod::Statistical).unwrap();

    let merged = merge(vec![org, email.clone()], 0.7);
    assert_eq!(merged, vec![email]);
}

#[tokio::test]
async fn test_empty_input() {
    let engine = RedactionEngine::with_defaults().unwrap();

    let result = engine.detect("", &DetectOptions::default()).await.unwrap();
    assert!(result.spans.is_empty());
    assert_eq!(result.summary.total_redactions, 0);
    assert!(result.summary.by_type.is_empty());
    assert!(result.summary.by_method.is_empty());

    let outcome = engine.redact("", &RedactOptions::default()).await.unwrap();
    assert_eq!(outcome.redacted_text, "");
}

#[tokio::test]
async fn test_text_without_entities_is_unchanged() {
    let engine = RedactionEngine::with_defaults().unwrap();
    let text = "Nothing to see here.";

    let outcome = engine.redact(text, &RedactOptions::default()).await.unwrap();
    assert_eq!(outcome.redacted_text, text);
    assert!(outcome.result.spans.is_empty());
}

#[tokio::test]
async fn test_statistical_backend_contributes_spans() {
    let text = "Dr. Alice Moreau of Northwind Traders can be reached at alice@northwind.example";
    // 字符偏移：Alice Moreau = [4,16)，Northwind Traders = [20,37)
    let backend = StaticNerBackend::new(vec![
        RawEntity::new(4, 16, "B-PER", Some(0.93)),
        RawEntity::new(20, 37, "ORG", None),
    ]);
    let engine = RedactionEngine::with_defaults()
        .unwrap()
        .with_recognizer(Arc::new(StatisticalRecognizer::new(Arc::new(backend))));

    let outcome = engine.redact(text, &star_options()).await.unwrap();
    let types: Vec<EntityType> = outcome
        .result
        .spans
        .iter()
        .map(|s| s.entity_type().clone())
        .collect();

    assert_eq!(types, vec![EntityType::Person, EntityType::Organization, EntityType::Email]);
    assert!(outcome.result.statistical_detection_used);
    assert!(outcome.result.warnings.is_empty());
    // 没有分数的实体使用统一的回退置信度
    assert_eq!(outcome.result.spans[1].confidence(), 0.8);
    assert!(outcome.redacted_text.starts_with("Dr. ************ of ***************** can"));
}

#[tokio::test]
async fn test_token_offsets_are_reconciled() {
    let text = "Invoice for Bob Stone dated 2024-03-15";
    // 空白分词：Invoice(0) for(1) Bob(2) Stone(3) dated(4) 2024-03-15(5)
    let backend = StaticNerBackend::new(vec![RawEntity::new(2, 4, "PER", Some(0.9))])
        .with_offset_kind(OffsetKind::Token);
    let engine = RedactionEngine::with_defaults()
        .unwrap()
        .with_recognizer(Arc::new(StatisticalRecognizer::new(Arc::new(backend))));

    let result = engine.detect(text, &DetectOptions::default()).await.unwrap();

    assert_eq!(result.spans.len(), 2);
    assert_eq!(result.spans[0].matched_text(), "Bob Stone");
    assert_eq!(*result.spans[1].entity_type(), EntityType::Date);
}

#[tokio::test]
async fn test_unavailable_backend_is_non_fatal() {
    let engine = RedactionEngine::with_defaults()
        .unwrap()
        .with_recognizer(Arc::new(StatisticalRecognizer::new(Arc::new(UnavailableBackend::new("ner")))));

    let outcome = engine.redact("SSN 123-45-6789", &star_options()).await.unwrap();

    assert_eq!(outcome.redacted_text, "SSN ***********");
    assert!(!outcome.result.statistical_detection_used);
    assert!(outcome.result.is_degraded());
    assert_eq!(outcome.result.warnings.len(), 1);
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let backend = StaticNerBackend::new(vec![RawEntity::new(0, 5, "PER", Some(0.99))])
        .with_delay(Duration::from_secs(30));
    let statistical = StatisticalRecognizer::new(Arc::new(backend)).with_timeout(Duration::from_millis(100));
    let engine = RedactionEngine::with_defaults()
        .unwrap()
        .with_recognizer(Arc::new(statistical));

    let result = engine
        .detect("Alice wrote to a@b.com", &DetectOptions::default())
        .await
        .unwrap();

    assert!(!result.statistical_detection_used);
    assert_eq!(result.spans.len(), 1);
    assert_eq!(*result.spans[0].entity_type(), EntityType::Email);
}

#[tokio::test]
async fn test_custom_rules_and_disabled_rules() {
    let mut rules = RulesFile::default();
    rules.add_custom_rule(CustomRuleConfig::new(
        "employee_id",
        EntityType::Custom("EMPLOYEE_ID".to_string()),
        r"\bEMP-[0-9]{6}\b",
        0.92,
        "员工编号",
    ));
    rules.disabled_rules.push("email_address".to_string());
    assert!(rules.validate().is_empty());

    let recognizer = PatternRecognizer::with_custom_patterns(rules.custom_patterns().unwrap(), &rules.disabled_rules).unwrap();
    let engine = RedactionEngine::new().with_recognizer(Arc::new(recognizer));

    let outcome = engine
        .redact("EMP-004211 mailed hr@corp.com", &star_options())
        .await
        .unwrap();

    assert_eq!(outcome.redacted_text, "********** mailed hr@corp.com");
    assert_eq!(
        outcome.result.summary.count_for(&EntityType::Custom("EMPLOYEE_ID".to_string())),
        1
    );
}

#[tokio::test]
async fn test_redact_plain_text_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("letter.txt");
    fs::write(&path, "\u{FEFF}Dear patient,\r\nMRN: 00482913\r\n\x0CCall (555) 010-2000").unwrap();

    let engine = RedactionEngine::with_defaults().unwrap();
    let source = PlainTextSource::default();
    let (content, outcome) = engine
        .redact_document(&source, path.to_str().unwrap(), &star_options())
        .await
        .unwrap();

    assert_eq!(content.pages.len(), 2);
    assert_eq!(content.file_type, "txt");
    assert!(!outcome.redacted_text.contains("00482913"));
    assert!(!outcome.redacted_text.contains("010-2000"));
    assert_eq!(outcome.result.summary.count_for(&EntityType::Medical), 1);
    assert_eq!(outcome.result.summary.count_for(&EntityType::Phone), 1);
}

#[tokio::test]
async fn test_document_input_errors() {
    let engine = RedactionEngine::with_defaults().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing.txt");
    let err = engine
        .detect_document(&PlainTextSource::default(), missing.to_str().unwrap(), &DetectOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RedactionError::Input(InputError::NotFound { .. })));

    let scanned = InMemorySource::new().with_document("scan.pdf", vec!["   ".to_string(), String::new()]);
    let err = engine
        .detect_document(&scanned, "scan.pdf", &DetectOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RedactionError::Input(InputError::NoExtractableText { .. })));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_engine_is_shared_across_tasks() {
    let engine = Arc::new(RedactionEngine::with_defaults().unwrap());
    let texts = ["a@b.com", "call 555-123-4567", "nothing", "SSN 123-45-6789"];

    let handles: Vec<_> = texts
        .iter()
        .map(|text| {
            let engine = Arc::clone(&engine);
            let text = text.to_string();
            tokio::spawn(async move { engine.redact(&text, &RedactOptions::default()).await })
        })
        .collect();

    let mut counts = Vec::new();
    for handle in handles {
        counts.push(handle.await.unwrap().unwrap().result.spans.len());
    }
    assert_eq!(counts, vec![1, 1, 0, 1]);
}
