use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tracing::Instrument;

use super::masking::{Redactor, DEFAULT_REDACTION_CHAR};
use super::merge::{merge, DEFAULT_MIN_CONFIDENCE};
use super::recognizer::{PatternRecognizer, Recognizer};
use super::result::{DetectionMethod, DetectionResult, RedactionOutcome};
use crate::document::{DocumentContent, TextSource};
use crate::infrastructure::error::RedactionError;

/// 检测选项
#[derive(Debug, Clone, PartialEq)]
pub struct DetectOptions {
    pub min_confidence: f32,
    /// `None` 表示启用全部方法
    pub enabled_methods: Option<BTreeSet<DetectionMethod>>,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            enabled_methods: None,
        }
    }
}

impl DetectOptions {
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn only_methods<I: IntoIterator<Item = DetectionMethod>>(mut self, methods: I) -> Self {
        self.enabled_methods = Some(methods.into_iter().collect());
        self
    }

    pub fn is_enabled(&self, method: &DetectionMethod) -> bool {
        self.enabled_methods
            .as_ref()
            .map(|methods| methods.contains(method))
            .unwrap_or(true)
    }

    pub fn validate(&self) -> Result<(), RedactionError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(RedactionError::config(
                format!("min_confidence {} is outside [0.0, 1.0]", self.min_confidence),
                Some("min_confidence".to_string()),
            ));
        }
        Ok(())
    }
}

/// 脱敏选项
#[derive(Debug, Clone, PartialEq)]
pub struct RedactOptions {
    pub detect: DetectOptions,
    pub redaction_char: char,
}

impl Default for RedactOptions {
    fn default() -> Self {
        Self {
            detect: DetectOptions::default(),
            redaction_char: DEFAULT_REDACTION_CHAR,
        }
    }
}

impl RedactOptions {
    pub fn new(detect: DetectOptions, redaction_char: char) -> Self {
        Self { detect, redaction_char }
    }
}

/// 检测-合并-脱敏流水线
///
/// 识别器通过构造函数注入，引擎本身不持有全局状态，可以被多个请求并发共享。
#[derive(Clone, Default)]
pub struct RedactionEngine {
    recognizers: Vec<Arc<dyn Recognizer>>,
}

impl RedactionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 只包含预置正则规则的引擎
    pub fn with_defaults() -> Result<Self, RedactionError> {
        Ok(Self::new().with_recognizer(Arc::new(PatternRecognizer::with_defaults()?)))
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.recognizers.push(recognizer);
        self
    }

    /// 分析文本，不修改文本
    pub async fn detect(&self, text: &str, options: &DetectOptions) -> Result<DetectionResult, RedactionError> {
        options.validate()?;
        let start_time = Instant::now();
        let text_length = text.chars().count();

        if text.is_empty() {
            return Ok(DetectionResult::empty());
        }

        let active: Vec<&Arc<dyn Recognizer>> = self
            .recognizers
            .iter()
            .filter(|r| options.is_enabled(&r.method()))
            .collect();

        let span = tracing::info_span!(
            "detect",
            text_chars = text_length,
            min_confidence = options.min_confidence,
        );

        // 识别器相互独立，并发执行；合并步骤与顺序无关
        let outcomes = join_all(active.iter().map(|recognizer| async move {
            (recognizer.name().to_string(), recognizer.method(), recognizer.detect(text).await)
        }))
        .instrument(span.clone())
        .await;

        let mut candidates = Vec::new();
        let mut warnings = Vec::new();
        let mut statistical_used = false;

        for (name, method, outcome) in outcomes {
            match outcome {
                Ok(spans) => {
                    if method == DetectionMethod::Statistical {
                        statistical_used = true;
                    }
                    candidates.extend(spans);
                }
                Err(e) => {
                    tracing::warn!(recognizer = %name, method = %method, error = %e, "Recognizer degraded to no spans");
                    warnings.push(e.to_string());
                }
            }
        }

        let spans = span.in_scope(|| merge(candidates, options.min_confidence));
        let result = DetectionResult::new(spans, text_length)
            .with_statistical_used(statistical_used)
            .with_warnings(warnings);

        tracing::info!(
            parent: &span,
            text_chars = text_length,
            recognizers = active.len(),
            spans = result.summary.total_redactions,
            degraded = result.is_degraded(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Detection finished"
        );

        Ok(result)
    }

    /// 完整流水线：检测后脱敏
    pub async fn redact(&self, text: &str, options: &RedactOptions) -> Result<RedactionOutcome, RedactionError> {
        let mut result = self.detect(text, &options.detect).await?;
        let (redacted_text, summary) = Redactor::new(options.redaction_char).apply(text, &result.spans)?;
        result.summary = summary;

        Ok(RedactionOutcome { redacted_text, result })
    }

    /// 从文本来源读取文档后检测
    pub async fn detect_document(
        &self,
        source: &dyn TextSource,
        document: &str,
        options: &DetectOptions,
    ) -> Result<(DocumentContent, DetectionResult), RedactionError> {
        let content = source.get_text(document)?;
        let result = self.detect(&content.text, options).await?;
        Ok((content, result))
    }

    /// 从文本来源读取文档后脱敏
    pub async fn redact_document(
        &self,
        source: &dyn TextSource,
        document: &str,
        options: &RedactOptions,
    ) -> Result<(DocumentContent, RedactionOutcome), RedactionError> {
        let content = source.get_text(document)?;
        let outcome = self.redact(&content.text, options).await?;
        Ok((content, outcome))
    }
}
