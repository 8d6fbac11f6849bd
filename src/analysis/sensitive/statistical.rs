//! 统计命名实体识别适配器
//!
//! 后端（预训练序列标注模型等）对核心是黑盒。适配器负责把后端的标签集
//! 映射到 [`EntityType`]、把字符或词元下标换算成字节偏移，并在后端不可用、
//! 出错或超时时降级为空结果。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use super::recognizer::Recognizer;
use super::result::{DetectionMethod, EntityType, Span};
use crate::infrastructure::error::RedactionError;

/// 后端未给出分数时使用的置信度
pub const DEFAULT_FALLBACK_CONFIDENCE: f32 = 0.8;

/// 默认推理超时
pub const DEFAULT_STATISTICAL_TIMEOUT: Duration = Duration::from_millis(5000);

static DEFAULT_LABEL_MAP: Lazy<HashMap<&'static str, EntityType>> = Lazy::new(|| {
    HashMap::from([
        ("PER", EntityType::Person),
        ("PERSON", EntityType::Person),
        ("ORG", EntityType::Organization),
        ("MISC", EntityType::Organization),
        ("LOC", EntityType::Address),
        ("GPE", EntityType::Address),
        ("DATE", EntityType::Date),
        ("MONEY", EntityType::Financial),
        ("CARDINAL", EntityType::Financial),
    ])
});

// 进程级后端，启动时安装一次，之后只读
static INSTALLED_BACKEND: Lazy<RwLock<Option<Arc<dyn NerBackend>>>> = Lazy::new(|| RwLock::new(None));

/// 后端偏移量约定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetKind {
    /// Unicode 字符下标
    Char,
    /// 词元下标，通过 [`NerBackend::tokenize`] 换算
    Token,
}

/// 后端原始输出
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntity {
    pub start: usize,
    pub end: usize,
    pub label: String,
    pub score: Option<f32>,
}

impl RawEntity {
    pub fn new(start: usize, end: usize, label: impl Into<String>, score: Option<f32>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
            score,
        }
    }
}

/// 统计识别后端
#[async_trait]
pub trait NerBackend: Send + Sync {
    fn name(&self) -> &str;

    /// 区分“模型未加载”与“运行了但没有结果”
    fn is_available(&self) -> bool;

    fn offset_kind(&self) -> OffsetKind {
        OffsetKind::Char
    }

    /// 词元的字符区间（左闭右开），默认按空白切分
    fn tokenize(&self, text: &str) -> Vec<(usize, usize)> {
        whitespace_tokens(text)
    }

    async fn infer(&self, text: &str) -> anyhow::Result<Vec<RawEntity>>;
}

/// 安装进程级后端，返回之前安装的后端
pub fn install_backend(backend: Arc<dyn NerBackend>) -> Option<Arc<dyn NerBackend>> {
    let mut slot = INSTALLED_BACKEND.write().unwrap_or_else(|e| e.into_inner());
    slot.replace(backend)
}

pub fn installed_backend() -> Option<Arc<dyn NerBackend>> {
    INSTALLED_BACKEND
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// 卸载进程级后端
pub fn teardown_backend() -> Option<Arc<dyn NerBackend>> {
    INSTALLED_BACKEND
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .take()
}

/// 统计识别器适配器
pub struct StatisticalRecognizer {
    backend: Arc<dyn NerBackend>,
    label_map: HashMap<String, EntityType>,
    fallback_confidence: f32,
    timeout: Duration,
}

impl StatisticalRecognizer {
    pub fn new(backend: Arc<dyn NerBackend>) -> Self {
        let label_map = DEFAULT_LABEL_MAP
            .iter()
            .map(|(label, entity)| (label.to_string(), entity.clone()))
            .collect();

        Self {
            backend,
            label_map,
            fallback_confidence: DEFAULT_FALLBACK_CONFIDENCE,
            timeout: DEFAULT_STATISTICAL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fallback_confidence(mut self, confidence: f32) -> Self {
        self.fallback_confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// 覆盖或新增标签映射
    pub fn with_label(mut self, label: impl Into<String>, entity_type: EntityType) -> Self {
        self.label_map.insert(label.into().to_ascii_uppercase(), entity_type);
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// 去掉 BIO/BIOES 前缀后查表
    pub fn map_label(&self, label: &str) -> Option<EntityType> {
        let upper = label.trim().to_ascii_uppercase();
        let bare = match upper.split_once('-') {
            Some((prefix, rest)) if matches!(prefix, "B" | "I" | "E" | "S" | "L" | "U") => rest,
            _ => upper.as_str(),
        };
        self.label_map.get(bare).cloned()
    }

    fn confidence_for(&self, score: Option<f32>) -> f32 {
        match score {
            Some(score) if !score.is_nan() => score.clamp(0.0, 1.0),
            _ => self.fallback_confidence,
        }
    }

    /// 把后端输出规范化为片段，无法换算的实体被丢弃
    pub fn normalize(&self, text: &str, entities: Vec<RawEntity>) -> Vec<Span> {
        let char_to_byte = build_char_to_byte_map(text);
        let tokens = match self.backend.offset_kind() {
            OffsetKind::Token => Some(self.backend.tokenize(text)),
            OffsetKind::Char => None,
        };

        let mut spans = Vec::with_capacity(entities.len());
        for entity in entities {
            let Some(entity_type) = self.map_label(&entity.label) else {
                tracing::trace!(label = %entity.label, "Ignoring unmapped backend label");
                continue;
            };

            let char_range = match &tokens {
                Some(tokens) => token_range_to_chars(tokens, entity.start, entity.end),
                None => Some((entity.start, entity.end)),
            };
            let byte_range = char_range.and_then(|(s, e)| chars_to_bytes(&char_to_byte, s, e));

            let Some((start, end)) = byte_range else {
                tracing::warn!(
                    backend = self.backend.name(),
                    start = entity.start,
                    end = entity.end,
                    "Dropping backend entity with unusable offsets"
                );
                continue;
            };

            match Span::new(
                text,
                start,
                end,
                entity_type,
                self.confidence_for(entity.score),
                DetectionMethod::Statistical,
            ) {
                Ok(span) => spans.push(span),
                Err(e) => tracing::warn!(backend = self.backend.name(), error = %e, "Dropping malformed backend entity"),
            }
        }

        spans
    }
}

#[async_trait]
impl Recognizer for StatisticalRecognizer {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::Statistical
    }

    async fn detect(&self, text: &str) -> Result<Vec<Span>, RedactionError> {
        if !self.backend.is_available() {
            return Err(RedactionError::backend_unavailable(self.backend.name(), "model not loaded"));
        }

        let entities = match tokio::time::timeout(self.timeout, self.backend.infer(text)).await {
            Ok(Ok(entities)) => entities,
            Ok(Err(e)) => {
                return Err(RedactionError::backend_unavailable(
                    self.backend.name(),
                    format!("inference failed: {}", e),
                ));
            }
            Err(_) => {
                return Err(RedactionError::backend_unavailable(
                    self.backend.name(),
                    format!("inference timed out after {}ms", self.timeout.as_millis()),
                ));
            }
        };

        let raw_count = entities.len();
        let spans = self.normalize(text, entities);
        tracing::debug!(
            backend = self.backend.name(),
            raw = raw_count,
            candidates = spans.len(),
            "Statistical detection finished"
        );
        Ok(spans)
    }
}

/// 字符下标 -> 字节偏移，末尾额外放入 `text.len()`
fn build_char_to_byte_map(text: &str) -> Vec<usize> {
    let mut map: Vec<usize> = text.char_indices().map(|(byte_idx, _)| byte_idx).collect();
    map.push(text.len());
    map
}

fn chars_to_bytes(char_to_byte: &[usize], start: usize, end: usize) -> Option<(usize, usize)> {
    if start >= end {
        return None;
    }
    Some((*char_to_byte.get(start)?, *char_to_byte.get(end)?))
}

fn token_range_to_chars(tokens: &[(usize, usize)], start: usize, end: usize) -> Option<(usize, usize)> {
    if start >= end {
        return None;
    }
    let first = tokens.get(start)?;
    let last = tokens.get(end - 1)?;
    Some((first.0, last.1))
}

/// 按空白切分的词元字符区间
pub fn whitespace_tokens(text: &str) -> Vec<(usize, usize)> {
    let mut tokens = Vec::new();
    let mut current: Option<usize> = None;

    for (idx, ch) in text.chars().enumerate() {
        match (ch.is_whitespace(), current) {
            (true, Some(start)) => {
                tokens.push((start, idx));
                current = None;
            }
            (false, None) => current = Some(idx),
            _ => {}
        }
    }
    if let Some(start) = current {
        tokens.push((start, text.chars().count()));
    }

    tokens
}

/// 返回固定结果的后端，用于测试和演示
pub struct StaticNerBackend {
    name: String,
    entities: Vec<RawEntity>,
    offset_kind: OffsetKind,
    delay: Option<Duration>,
}

impl StaticNerBackend {
    pub fn new(entities: Vec<RawEntity>) -> Self {
        Self {
            name: "static".to_string(),
            entities,
            offset_kind: OffsetKind::Char,
            delay: None,
        }
    }

    pub fn with_offset_kind(mut self, offset_kind: OffsetKind) -> Self {
        self.offset_kind = offset_kind;
        self
    }

    /// 模拟慢速推理
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl NerBackend for StaticNerBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        true
    }

    fn offset_kind(&self) -> OffsetKind {
        self.offset_kind
    }

    async fn infer(&self, _text: &str) -> anyhow::Result<Vec<RawEntity>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.entities.clone())
    }
}

/// 未加载模型的后端
pub struct UnavailableBackend {
    name: String,
}

impl UnavailableBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl NerBackend for UnavailableBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn infer(&self, _text: &str) -> anyhow::Result<Vec<RawEntity>> {
        anyhow::bail!("backend {} has no model loaded", self.name)
    }
}
