use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::infrastructure::error::RedactionError;

/// 敏感实体类型
///
/// 内置类型覆盖常见的个人与金融信息，`Custom` 为注册模式时使用的扩展槽。
/// 变体声明顺序同时作为合并时的最终排序键。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityType {
    Email,
    Phone,
    Ssn,
    CreditCard,
    Date,
    Financial,
    Person,
    Organization,
    Address,
    Medical,
    Custom(String),
}

impl EntityType {
    pub const BUILTIN: [EntityType; 10] = [
        EntityType::Email,
        EntityType::Phone,
        EntityType::Ssn,
        EntityType::CreditCard,
        EntityType::Date,
        EntityType::Financial,
        EntityType::Person,
        EntityType::Organization,
        EntityType::Address,
        EntityType::Medical,
    ];

    pub fn label(&self) -> &str {
        match self {
            EntityType::Email => "EMAIL",
            EntityType::Phone => "PHONE",
            EntityType::Ssn => "SSN",
            EntityType::CreditCard => "CREDIT_CARD",
            EntityType::Date => "DATE",
            EntityType::Financial => "FINANCIAL",
            EntityType::Person => "PERSON",
            EntityType::Organization => "ORGANIZATION",
            EntityType::Address => "ADDRESS",
            EntityType::Medical => "MEDICAL",
            EntityType::Custom(name) => name,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityType {
    type Err = std::convert::Infallible;

    /// 未识别的标签一律视为自定义类型
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Ok(EntityType::BUILTIN
            .iter()
            .find(|t| t.label() == normalized)
            .cloned()
            .unwrap_or_else(|| EntityType::Custom(s.trim().to_string())))
    }
}

impl Serialize for EntityType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for EntityType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(label.parse().unwrap_or(EntityType::Custom(label)))
    }
}

/// 产生片段的检测方法
///
/// 变体顺序即方法优先级：正则 > 统计 > 其他。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DetectionMethod {
    Regex,
    Statistical,
    Other(String),
}

impl DetectionMethod {
    pub fn as_str(&self) -> &str {
        match self {
            DetectionMethod::Regex => "regex",
            DetectionMethod::Statistical => "statistical",
            DetectionMethod::Other(name) => name,
        }
    }

    /// 数值越小优先级越高
    pub fn priority(&self) -> u8 {
        match self {
            DetectionMethod::Regex => 0,
            DetectionMethod::Statistical => 1,
            DetectionMethod::Other(_) => 2,
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "regex" => DetectionMethod::Regex,
            "statistical" => DetectionMethod::Statistical,
            other => DetectionMethod::Other(other.to_string()),
        })
    }
}

impl Serialize for DetectionMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DetectionMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(name.parse().unwrap_or(DetectionMethod::Other(name)))
    }
}

/// 检测到的敏感文本片段
///
/// `start`/`end` 是源文本中的字节偏移（左闭右开），必须落在字符边界上。
/// 所有不变式在构造时校验，构造完成后不可修改。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Span {
    start: usize,
    end: usize,
    #[serde(rename = "text")]
    matched_text: String,
    entity_type: EntityType,
    confidence: f32,
    method: DetectionMethod,
    #[serde(skip)]
    char_len: usize,
}

impl Span {
    /// 从源文本切片构造片段
    pub fn new(
        source: &str,
        start: usize,
        end: usize,
        entity_type: EntityType,
        confidence: f32,
        method: DetectionMethod,
    ) -> Result<Self, RedactionError> {
        let matched_text = Self::checked_slice(source, start, end)?.to_string();
        Self::build(start, end, matched_text, entity_type, confidence, method)
    }

    /// 使用调用方给出的匹配文本构造片段，文本必须与源文本切片完全一致
    pub fn with_matched_text(
        source: &str,
        start: usize,
        end: usize,
        matched_text: impl Into<String>,
        entity_type: EntityType,
        confidence: f32,
        method: DetectionMethod,
    ) -> Result<Self, RedactionError> {
        let matched_text = matched_text.into();
        let slice = Self::checked_slice(source, start, end)?;
        if slice != matched_text {
            return Err(RedactionError::structural(format!(
                "matched text does not equal source[{}..{}]",
                start, end
            )));
        }
        Self::build(start, end, matched_text, entity_type, confidence, method)
    }

    fn checked_slice(source: &str, start: usize, end: usize) -> Result<&str, RedactionError> {
        if start >= end {
            return Err(RedactionError::structural(format!(
                "span start {} must be less than end {}",
                start, end
            )));
        }
        if end > source.len() {
            return Err(RedactionError::structural(format!(
                "span end {} exceeds text length {}",
                end,
                source.len()
            )));
        }
        if !source.is_char_boundary(start) || !source.is_char_boundary(end) {
            return Err(RedactionError::structural(format!(
                "span [{}, {}) does not fall on character boundaries",
                start, end
            )));
        }
        Ok(&source[start..end])
    }

    fn build(
        start: usize,
        end: usize,
        matched_text: String,
        entity_type: EntityType,
        confidence: f32,
        method: DetectionMethod,
    ) -> Result<Self, RedactionError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(RedactionError::structural(format!(
                "confidence {} is outside [0.0, 1.0]",
                confidence
            )));
        }
        let char_len = matched_text.chars().count();
        Ok(Self {
            start,
            end,
            matched_text,
            entity_type,
            confidence,
            method,
            char_len,
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn matched_text(&self) -> &str {
        &self.matched_text
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn method(&self) -> &DetectionMethod {
        &self.method
    }

    /// 字节长度
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// 字符长度，决定脱敏后替换串的长度
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn same_bounds(&self, other: &Span) -> bool {
        self.start == other.start && self.end == other.end
    }
}

/// 置信度统计
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceStats {
    pub min: f32,
    pub max: f32,
    pub average: f32,
}

impl Default for ConfidenceStats {
    // 空集合沿用 min=1.0 / max=0.0 的报告约定
    fn default() -> Self {
        Self {
            min: 1.0,
            max: 0.0,
            average: 0.0,
        }
    }
}

/// 检测结果摘要
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RedactionSummary {
    pub total_redactions: usize,
    pub by_type: BTreeMap<EntityType, usize>,
    pub by_method: BTreeMap<DetectionMethod, usize>,
    pub confidence_stats: ConfidenceStats,
}

impl RedactionSummary {
    pub fn from_spans(spans: &[Span]) -> Self {
        let mut builder = SummaryBuilder::default();
        for span in spans {
            builder.record(span);
        }
        builder.finish()
    }

    pub fn count_for(&self, entity_type: &EntityType) -> usize {
        self.by_type.get(entity_type).copied().unwrap_or(0)
    }

    pub fn count_for_method(&self, method: &DetectionMethod) -> usize {
        self.by_method.get(method).copied().unwrap_or(0)
    }
}

/// 增量摘要累加器，脱敏遍历时顺带使用
#[derive(Debug, Default)]
pub struct SummaryBuilder {
    summary: RedactionSummary,
    confidence_sum: f64,
}

impl SummaryBuilder {
    pub fn record(&mut self, span: &Span) {
        let summary = &mut self.summary;
        let confidence = span.confidence();

        if summary.total_redactions == 0 {
            summary.confidence_stats.min = confidence;
            summary.confidence_stats.max = confidence;
        } else {
            summary.confidence_stats.min = summary.confidence_stats.min.min(confidence);
            summary.confidence_stats.max = summary.confidence_stats.max.max(confidence);
        }

        summary.total_redactions += 1;
        *summary.by_type.entry(span.entity_type().clone()).or_insert(0) += 1;
        *summary.by_method.entry(span.method().clone()).or_insert(0) += 1;
        self.confidence_sum += f64::from(confidence);
    }

    pub fn finish(mut self) -> RedactionSummary {
        if self.summary.total_redactions > 0 {
            self.summary.confidence_stats.average =
                (self.confidence_sum / self.summary.total_redactions as f64) as f32;
        }
        self.summary
    }
}

/// 一次检测请求的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub spans: Vec<Span>,
    pub summary: RedactionSummary,
    /// 统计识别器是否实际参与了本次检测
    pub statistical_detection_used: bool,
    pub warnings: Vec<String>,
    /// 输入文本的字符数
    pub text_length: usize,
}

impl DetectionResult {
    pub fn new(spans: Vec<Span>, text_length: usize) -> Self {
        let summary = RedactionSummary::from_spans(&spans);
        Self {
            spans,
            summary,
            statistical_detection_used: false,
            warnings: Vec::new(),
            text_length,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), 0)
    }

    pub fn with_statistical_used(mut self, used: bool) -> Self {
        self.statistical_detection_used = used;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// 完整脱敏流水线的输出
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedactionOutcome {
    pub redacted_text: String,
    pub result: DetectionResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "Call 555-123-4567 now";

    #[test]
    fn test_span_construction() {
        let span = Span::new(TEXT, 5, 17, EntityType::Phone, 0.9, DetectionMethod::Regex).unwrap();
        assert_eq!(span.matched_text(), "555-123-4567");
        assert_eq!(span.len(), 12);
        assert_eq!(span.char_len(), 12);
    }

    #[test]
    fn test_span_rejects_invalid_bounds() {
        assert!(Span::new(TEXT, 5, 5, EntityType::Phone, 0.9, DetectionMethod::Regex).is_err());
        assert!(Span::new(TEXT, 6, 5, EntityType::Phone, 0.9, DetectionMethod::Regex).is_err());
        assert!(Span::new(TEXT, 0, 100, EntityType::Phone, 0.9, DetectionMethod::Regex).is_err());
    }

    #[test]
    fn test_span_rejects_mismatched_text() {
        let err = Span::with_matched_text(
            TEXT,
            5,
            17,
            "555-999-4567",
            EntityType::Phone,
            0.9,
            DetectionMethod::Regex,
        )
        .unwrap_err();
        assert!(matches!(err, RedactionError::Structural { .. }));
    }

    #[test]
    fn test_span_rejects_non_char_boundary() {
        let text = "né 123";
        // 'é' 占两个字节 [1, 3)
        assert!(Span::new(text, 2, 3, EntityType::Person, 0.9, DetectionMethod::Regex).is_err());
        let span = Span::new(text, 0, 3, EntityType::Person, 0.9, DetectionMethod::Regex).unwrap();
        assert_eq!(span.char_len(), 2);
    }

    #[test]
    fn test_span_rejects_bad_confidence() {
        assert!(Span::new(TEXT, 5, 17, EntityType::Phone, 1.5, DetectionMethod::Regex).is_err());
        assert!(Span::new(TEXT, 5, 17, EntityType::Phone, f32::NAN, DetectionMethod::Regex).is_err());
    }

    #[test]
    fn test_entity_type_labels() {
        assert_eq!(EntityType::CreditCard.to_string(), "CREDIT_CARD");
        assert_eq!("credit_card".parse::<EntityType>().unwrap(), EntityType::CreditCard);
        assert_eq!(
            "EMPLOYEE_ID".parse::<EntityType>().unwrap(),
            EntityType::Custom("EMPLOYEE_ID".to_string())
        );
    }

    #[test]
    fn test_method_priority() {
        assert!(DetectionMethod::Regex.priority() < DetectionMethod::Statistical.priority());
        assert_eq!("statistical".parse::<DetectionMethod>().unwrap(), DetectionMethod::Statistical);
    }

    #[test]
    fn test_summary_from_spans() {
        let text = "a@b.io 555-123-4567";
        let spans = vec![
            Span::new(text, 0, 6, EntityType::Email, 0.95, DetectionMethod::Regex).unwrap(),
            Span::new(text, 7, 19, EntityType::Phone, 0.75, DetectionMethod::Statistical).unwrap(),
        ];
        let summary = RedactionSummary::from_spans(&spans);
        assert_eq!(summary.total_redactions, 2);
        assert_eq!(summary.count_for(&EntityType::Email), 1);
        assert_eq!(summary.count_for_method(&DetectionMethod::Statistical), 1);
        assert_eq!(summary.confidence_stats.min, 0.75);
        assert_eq!(summary.confidence_stats.max, 0.95);
        assert!((summary.confidence_stats.average - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_empty_summary() {
        let summary = RedactionSummary::from_spans(&[]);
        assert_eq!(summary.total_redactions, 0);
        assert!(summary.by_type.is_empty());
        assert_eq!(summary.confidence_stats, ConfidenceStats::default());
    }

    #[test]
    fn test_summary_serializes_labels_as_keys() {
        let text = "a@b.io";
        let spans = vec![Span::new(text, 0, 6, EntityType::Email, 0.95, DetectionMethod::Regex).unwrap()];
        let json = serde_json::to_value(RedactionSummary::from_spans(&spans)).unwrap();
        assert_eq!(json["by_type"]["EMAIL"], 1);
        assert_eq!(json["by_method"]["regex"], 1);
    }
}
