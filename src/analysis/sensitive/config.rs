use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::patterns::SensitivePattern;
use super::result::EntityType;
use crate::infrastructure::error::RedactionError;

/// 规则文件（JSON）
///
/// 可选的阈值与替换字符优先级最低，会被环境变量和命令行参数覆盖。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redaction_char: Option<char>,
    /// 自定义规则，追加在预置规则之后
    #[serde(default)]
    pub custom_rules: Vec<CustomRuleConfig>,
    /// 按名称禁用的规则（预置或自定义）
    #[serde(default)]
    pub disabled_rules: Vec<String>,
}

/// 自定义规则配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRuleConfig {
    pub name: String,
    pub entity_type: EntityType,
    pub regex: String,
    pub confidence: f32,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl CustomRuleConfig {
    pub fn new(
        name: impl Into<String>,
        entity_type: EntityType,
        regex: impl Into<String>,
        confidence: f32,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            entity_type,
            regex: regex.into(),
            confidence,
            description: description.into(),
            enabled: true,
            case_sensitive: true,
            created_at: Some(chrono::Utc::now().to_rfc3339()),
            tags: Vec::new(),
        }
    }

    pub fn with_case_sensitivity(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn to_sensitive_pattern(&self) -> Result<SensitivePattern, RedactionError> {
        let mut pattern = SensitivePattern::new(
            self.name.clone(),
            self.entity_type.clone(),
            self.regex.clone(),
            self.confidence,
            self.description.clone(),
        )?
        .with_case_sensitivity(self.case_sensitive)?;

        pattern.enabled = self.enabled;
        Ok(pattern)
    }
}

impl RulesFile {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, RedactionError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            RedactionError::config(
                format!("cannot read rules file {}: {}", path.display(), e),
                Some("rules".to_string()),
            )
        })?;
        let rules: RulesFile = serde_json::from_str(&content).map_err(|e| {
            RedactionError::config(
                format!("invalid rules file {}: {}", path.display(), e),
                Some("rules".to_string()),
            )
        })?;

        tracing::debug!(
            path = %path.display(),
            custom_rules = rules.custom_rules.len(),
            disabled_rules = rules.disabled_rules.len(),
            "Loaded rules file"
        );
        Ok(rules)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), RedactionError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RedactionError::config(e.to_string(), None))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn add_custom_rule(&mut self, rule: CustomRuleConfig) {
        self.custom_rules.push(rule);
    }

    /// 编译所有自定义规则（包括已禁用的，禁用状态保留在模式上）
    pub fn custom_patterns(&self) -> Result<Vec<SensitivePattern>, RedactionError> {
        self.custom_rules
            .iter()
            .map(CustomRuleConfig::to_sensitive_pattern)
            .collect()
    }

    /// 一次性报告全部字段错误
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if let Some(min_confidence) = self.min_confidence {
            if !(0.0..=1.0).contains(&min_confidence) {
                errors.push(ConfigValidationError::new(
                    "min_confidence",
                    "置信度阈值必须在 0.0 到 1.0 之间",
                ));
            }
        }

        for (i, rule) in self.custom_rules.iter().enumerate() {
            if rule.name.trim().is_empty() {
                errors.push(ConfigValidationError::new(
                    format!("custom_rules[{}].name", i),
                    "规则名称不能为空",
                ));
            } else if self.custom_rules[..i].iter().any(|r| r.name == rule.name) {
                errors.push(ConfigValidationError::new(
                    format!("custom_rules[{}].name", i),
                    format!("规则名称重复: {}", rule.name),
                ));
            }

            if rule.regex.is_empty() {
                errors.push(ConfigValidationError::new(
                    format!("custom_rules[{}].regex", i),
                    "正则表达式不能为空",
                ));
            } else if let Err(e) = regex::Regex::new(&rule.regex) {
                errors.push(ConfigValidationError::new(
                    format!("custom_rules[{}].regex", i),
                    format!("正则表达式语法错误: {}", e),
                ));
            }

            if !(0.0..=1.0).contains(&rule.confidence) {
                errors.push(ConfigValidationError::new(
                    format!("custom_rules[{}].confidence", i),
                    "置信度必须在 0.0 到 1.0 之间",
                ));
            }

            if rule.entity_type.label().trim().is_empty() {
                errors.push(ConfigValidationError::new(
                    format!("custom_rules[{}].entity_type", i),
                    "实体类型不能为空",
                ));
            }
        }

        for (i, name) in self.disabled_rules.iter().enumerate() {
            if name.trim().is_empty() {
                errors.push(ConfigValidationError::new(
                    format!("disabled_rules[{}]", i),
                    "规则名称不能为空",
                ));
            }
        }

        errors
    }

    pub fn generate_example() -> RulesFile {
        let mut rules = RulesFile {
            min_confidence: Some(0.75),
            ..RulesFile::default()
        };

        rules.add_custom_rule(
            CustomRuleConfig::new(
                "employee_id",
                EntityType::Custom("EMPLOYEE_ID".to_string()),
                r"\bEMP-[0-9]{6}\b",
                0.92,
                "公司员工编号",
            )
            .with_tags(vec!["internal".to_string()]),
        );
        rules.disabled_rules.push("ssn_bare".to_string());

        rules
    }
}

/// 配置验证错误
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl ConfigValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigValidationError {}
