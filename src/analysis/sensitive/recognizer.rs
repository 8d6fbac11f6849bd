use async_trait::async_trait;

use super::patterns::{PatternEngine, SensitivePattern};
use super::predefined_patterns::PredefinedPatterns;
use super::result::{DetectionMethod, Span};
use crate::infrastructure::error::RedactionError;

/// 识别器：从文本中产生候选片段
///
/// 识别器之间相互独立，可以并发执行；返回错误表示该识别器本次不可用，
/// 由调用方降级处理，不会中止整个请求。
#[async_trait]
pub trait Recognizer: Send + Sync {
    fn name(&self) -> &str;
    fn method(&self) -> DetectionMethod;
    async fn detect(&self, text: &str) -> Result<Vec<Span>, RedactionError>;
}

/// 基于正则规则表的识别器
#[derive(Debug, Default)]
pub struct PatternRecognizer {
    engine: PatternEngine,
}

impl PatternRecognizer {
    /// 加载预置规则表
    pub fn with_defaults() -> Result<Self, RedactionError> {
        let mut engine = PatternEngine::new();
        engine.add_patterns(PredefinedPatterns::get_all_patterns()?)?;
        Ok(Self { engine })
    }

    /// 在预置规则之后追加自定义规则，并按名称禁用指定规则
    pub fn with_custom_patterns(
        custom: Vec<SensitivePattern>,
        disabled: &[String],
    ) -> Result<Self, RedactionError> {
        let mut recognizer = Self::with_defaults()?;
        recognizer.engine.add_patterns(custom)?;
        for name in disabled {
            if !recognizer.engine.disable_pattern(name) {
                tracing::warn!(pattern = %name, "Cannot disable unknown pattern");
            }
        }
        Ok(recognizer)
    }

    /// 同步检测，纯函数
    pub fn detect_sync(&self, text: &str) -> Vec<Span> {
        self.engine.spans(text).collect()
    }
}

#[async_trait]
impl Recognizer for PatternRecognizer {
    fn name(&self) -> &str {
        "pattern"
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::Regex
    }

    async fn detect(&self, text: &str) -> Result<Vec<Span>, RedactionError> {
        let spans = self.detect_sync(text);
        tracing::debug!(recognizer = self.name(), candidates = spans.len(), "Pattern detection finished");
        Ok(spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::sensitive::result::EntityType;

    #[test]
    fn test_default_recognizer_finds_email_and_phone() {
        let recognizer = PatternRecognizer::with_defaults().unwrap();
        let text = "Contact john@example.com or (555) 123-4567";
        let spans = recognizer.detect_sync(text);

        assert!(spans
            .iter()
            .any(|s| *s.entity_type() == EntityType::Email && s.matched_text() == "john@example.com"));
        assert!(spans
            .iter()
            .any(|s| *s.entity_type() == EntityType::Phone && s.matched_text() == "(555) 123-4567"));
        assert!(spans.iter().all(|s| *s.method() == DetectionMethod::Regex));
    }

    #[test]
    fn test_plain_text_yields_nothing() {
        let recognizer = PatternRecognizer::with_defaults().unwrap();
        assert!(recognizer.detect_sync("The quick brown fox.").is_empty());
        assert!(recognizer.detect_sync("").is_empty());
    }

    #[test]
    fn test_custom_patterns_and_disabled_rules() {
        let custom = SensitivePattern::new(
            "employee_id",
            EntityType::Custom("EMPLOYEE_ID".to_string()),
            r"\bEMP-[0-9]{6}\b",
            0.9,
            "Employee badge",
        )
        .unwrap();
        let recognizer =
            PatternRecognizer::with_custom_patterns(vec![custom], &["email_address".to_string()]).unwrap();

        let spans = recognizer.detect_sync("EMP-004211 mailed a@b.com");
        assert_eq!(spans.len(), 1);
        assert_eq!(*spans[0].entity_type(), EntityType::Custom("EMPLOYEE_ID".to_string()));
    }

    #[test]
    fn test_country_code_phone_is_one_candidate() {
        let recognizer = PatternRecognizer::with_defaults().unwrap();
        let spans = recognizer.detect_sync("+1 (555) 123-4567");

        assert!(spans
            .iter()
            .any(|s| s.start() == 0 && s.matched_text() == "+1 (555) 123-4567"));
        // 括号格式的候选与完整号码置信度相同，合并时较长者胜出
        let merged = crate::analysis::sensitive::merge::merge(spans, 0.7);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].matched_text(), "+1 (555) 123-4567");
    }

    #[tokio::test]
    async fn test_async_detect_matches_sync() {
        let recognizer = PatternRecognizer::with_defaults().unwrap();
        let text = "SSN 123-45-6789, card 4111 1111 1111 1111";
        let spans = recognizer.detect(text).await.unwrap();
        assert_eq!(spans, recognizer.detect_sync(text));
    }
}
