use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::result::{DetectionMethod, EntityType, Span};
use crate::infrastructure::error::RedactionError;

/// 敏感信息模式
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivePattern {
    pub name: String,
    pub entity_type: EntityType,
    pub regex: String,
    #[serde(skip)]
    pub compiled_regex: Option<Regex>,
    pub confidence: f32,
    pub description: String,
    pub enabled: bool,
    pub case_sensitive: bool,
}

impl SensitivePattern {
    pub fn new(
        name: impl Into<String>,
        entity_type: EntityType,
        regex: impl Into<String>,
        confidence: f32,
        description: impl Into<String>,
    ) -> Result<Self, RedactionError> {
        let mut pattern = Self {
            name: name.into(),
            entity_type,
            regex: regex.into(),
            compiled_regex: None,
            confidence,
            description: description.into(),
            enabled: true,
            case_sensitive: true,
        };
        pattern.compile_regex()?;
        Ok(pattern)
    }

    pub fn with_case_sensitivity(mut self, case_sensitive: bool) -> Result<Self, RedactionError> {
        self.case_sensitive = case_sensitive;
        self.compile_regex()?;
        Ok(self)
    }

    pub fn compile_regex(&mut self) -> Result<(), RedactionError> {
        if self.regex.is_empty() {
            return Err(RedactionError::pattern(&self.name, "empty regular expression"));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(RedactionError::pattern(
                &self.name,
                format!("confidence {} is outside [0.0, 1.0]", self.confidence),
            ));
        }

        let compiled = RegexBuilder::new(&self.regex)
            .case_insensitive(!self.case_sensitive)
            .build()
            .map_err(|e| RedactionError::pattern(&self.name, e.to_string()))?;

        self.compiled_regex = Some(compiled);
        Ok(())
    }

    #[cfg(test)]
    pub fn is_match(&self, text: &str) -> bool {
        self.compiled_regex
            .as_ref()
            .map(|regex| regex.is_match(text))
            .unwrap_or(false)
    }

    pub fn find_matches<'t>(&self, text: &'t str) -> Vec<regex::Match<'t>> {
        if let Some(ref regex) = self.compiled_regex {
            regex.find_iter(text).filter(|m| !m.is_empty()).collect()
        } else {
            Vec::new()
        }
    }
}

/// 模式匹配引擎
///
/// 注册顺序即表内顺序；初始化完成后只读。
#[derive(Debug, Default)]
pub struct PatternEngine {
    patterns: Vec<SensitivePattern>,
    pattern_index: HashMap<String, usize>,
    enabled_patterns: Vec<usize>,
}

impl PatternEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册模式，同名模式会被拒绝
    pub fn add_pattern(&mut self, mut pattern: SensitivePattern) -> Result<(), RedactionError> {
        if self.pattern_index.contains_key(&pattern.name) {
            return Err(RedactionError::pattern(&pattern.name, "duplicate pattern name"));
        }
        if pattern.compiled_regex.is_none() {
            pattern.compile_regex()?;
        }

        let index = self.patterns.len();
        self.pattern_index.insert(pattern.name.clone(), index);

        if pattern.enabled {
            self.enabled_patterns.push(index);
        }

        self.patterns.push(pattern);
        Ok(())
    }

    pub fn add_patterns(&mut self, patterns: Vec<SensitivePattern>) -> Result<(), RedactionError> {
        for pattern in patterns {
            self.add_pattern(pattern)?;
        }
        Ok(())
    }

    pub fn disable_pattern(&mut self, name: &str) -> bool {
        if let Some(&index) = self.pattern_index.get(name) {
            if let Some(pattern) = self.patterns.get_mut(index) {
                pattern.enabled = false;
                self.enabled_patterns.retain(|&i| i != index);
                return true;
            }
        }
        false
    }

    /// 把匹配结果转换为片段；惰性、可重复调用
    pub fn spans<'a>(&'a self, text: &'a str) -> impl Iterator<Item = Span> + 'a {
        self.enabled_patterns
            .iter()
            .filter_map(move |&index| self.patterns.get(index))
            .flat_map(move |pattern| {
                pattern
                    .find_matches(text)
                    .into_iter()
                    .filter_map(move |m| {
                        match Span::new(
                            text,
                            m.start(),
                            m.end(),
                            pattern.entity_type.clone(),
                            pattern.confidence,
                            DetectionMethod::Regex,
                        ) {
                            Ok(span) => Some(span),
                            Err(e) => {
                                tracing::warn!(pattern = %pattern.name, error = %e, "Discarding malformed pattern match");
                                None
                            }
                        }
                    })
            })
    }

    pub fn get_pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn get_enabled_pattern_count(&self) -> usize {
        self.enabled_patterns.len()
    }
}
