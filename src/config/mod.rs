use std::collections::BTreeSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::sensitive::config::RulesFile;
use crate::analysis::sensitive::detector::{DetectOptions, RedactOptions};
use crate::analysis::sensitive::masking::DEFAULT_REDACTION_CHAR;
use crate::analysis::sensitive::merge::DEFAULT_MIN_CONFIDENCE;
use crate::analysis::sensitive::result::DetectionMethod;
use crate::analysis::sensitive::statistical::{DEFAULT_FALLBACK_CONFIDENCE, DEFAULT_STATISTICAL_TIMEOUT};
use crate::document::DEFAULT_MAX_FILE_SIZE;
use crate::infrastructure::error::RedactionError;
use crate::infrastructure::logging::{parse_level, LogFormat, LoggingConfig};

const ENV_PREFIX: &str = "DOC_REDACT_";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub min_confidence: f32,
    pub redaction_char: char,
    /// 空表示启用全部方法
    pub enabled_methods: Vec<String>,
    pub statistical_timeout_ms: u64,
    pub statistical_fallback_confidence: f32,
    pub max_file_size: u64,
    pub log_level: String,
    pub log_format: String,
    pub rules_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            redaction_char: DEFAULT_REDACTION_CHAR,
            enabled_methods: Vec::new(),
            statistical_timeout_ms: DEFAULT_STATISTICAL_TIMEOUT.as_millis() as u64,
            statistical_fallback_confidence: DEFAULT_FALLBACK_CONFIDENCE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            rules_path: None,
        }
    }
}

impl Config {
    /// 默认值 < 规则文件 < .env < 环境变量；命令行参数由 `update_from_args` 最后应用。
    /// 显式规则文件路径优先于 `DOC_REDACT_RULES`。
    pub fn load(rules_path: Option<&Path>) -> Result<(Self, RulesFile), RedactionError> {
        let mut config = Config::default();

        #[cfg(not(test))]
        config.load_from_env_file();

        let rules_path = rules_path
            .map(Path::to_path_buf)
            .or_else(|| env_var("RULES").map(PathBuf::from));
        let rules = match &rules_path {
            Some(path) => RulesFile::load_from_file(path)?,
            None => RulesFile::default(),
        };

        config.apply_rules_file(&rules);
        config.load_from_env();
        config.rules_path = rules_path;

        Ok((config, rules))
    }

    pub fn load_from_env_file(&mut self) {
        // dotenvy 不覆盖已存在的变量，先加载的文件优先
        dotenvy::dotenv().ok();

        if let Ok(home) = env::var("HOME") {
            let user_env_path = PathBuf::from(format!("{}/.doc-redact/.env", home));
            if user_env_path.exists() {
                dotenvy::from_path(user_env_path).ok();
            }
        }
    }

    pub fn apply_rules_file(&mut self, rules: &RulesFile) {
        if let Some(min_confidence) = rules.min_confidence {
            self.min_confidence = min_confidence;
        }
        if let Some(redaction_char) = rules.redaction_char {
            self.redaction_char = redaction_char;
        }
    }

    pub fn load_from_env(&mut self) {
        if let Some(value) = env_parse("MIN_CONFIDENCE") {
            self.min_confidence = value;
        }
        if let Some(raw) = env_var("REDACTION_CHAR") {
            match single_char(&raw) {
                Some(value) => self.redaction_char = value,
                None => {
                    tracing::warn!(variable = "DOC_REDACT_REDACTION_CHAR", value = %raw, "Ignoring redaction char that is not a single character");
                }
            }
        }
        if let Some(value) = env_var("METHODS") {
            self.enabled_methods = split_methods(&value);
        }
        if let Some(value) = env_parse("STATISTICAL_TIMEOUT_MS") {
            self.statistical_timeout_ms = value;
        }
        if let Some(value) = env_parse("STATISTICAL_FALLBACK_CONFIDENCE") {
            self.statistical_fallback_confidence = value;
        }
        if let Some(value) = env_parse("MAX_FILE_SIZE") {
            self.max_file_size = value;
        }
        if let Some(value) = env_var("LOG_LEVEL") {
            self.log_level = value;
        }
        if let Some(value) = env_var("LOG_FORMAT") {
            self.log_format = value;
        }
    }

    pub fn update_from_args(&mut self, args: &crate::cli::args::Args) {
        // 命令行参数优先级最高
        if let Some(min_confidence) = args.min_confidence {
            self.min_confidence = min_confidence;
        }
        if let Some(redaction_char) = args.redaction_char {
            self.redaction_char = redaction_char;
        }
        if let Some(methods) = &args.methods {
            self.enabled_methods = split_methods(methods);
        }
        if let Some(log_level) = &args.log_level {
            self.log_level = log_level.clone();
        }
        if let Some(log_format) = &args.log_format {
            self.log_format = log_format.clone();
        }
        if let Some(rules) = &args.rules {
            self.rules_path = Some(PathBuf::from(rules));
        }
    }

    pub fn validate(&self) -> Result<(), RedactionError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(RedactionError::config(
                format!("min_confidence must be within [0.0, 1.0], got {}", self.min_confidence),
                Some("min_confidence".to_string()),
            ));
        }
        if !(0.0..=1.0).contains(&self.statistical_fallback_confidence) {
            return Err(RedactionError::config(
                format!(
                    "statistical_fallback_confidence must be within [0.0, 1.0], got {}",
                    self.statistical_fallback_confidence
                ),
                Some("statistical_fallback_confidence".to_string()),
            ));
        }
        if self.statistical_timeout_ms == 0 {
            return Err(RedactionError::config(
                "statistical_timeout_ms must be greater than 0",
                Some("statistical_timeout_ms".to_string()),
            ));
        }
        if self.max_file_size == 0 {
            return Err(RedactionError::config(
                "max_file_size must be greater than 0",
                Some("max_file_size".to_string()),
            ));
        }
        for method in &self.enabled_methods {
            if let Ok(DetectionMethod::Other(name)) = method.parse::<DetectionMethod>() {
                return Err(RedactionError::config(
                    format!("unknown detection method: {} (expected regex or statistical)", name),
                    Some("enabled_methods".to_string()),
                ));
            }
        }
        if self.log_format.parse::<LogFormat>().is_err() {
            return Err(RedactionError::config(
                format!("unsupported log format: {}", self.log_format),
                Some("log_format".to_string()),
            ));
        }
        Ok(())
    }

    pub fn statistical_timeout(&self) -> Duration {
        Duration::from_millis(self.statistical_timeout_ms)
    }

    pub fn to_detect_options(&self) -> DetectOptions {
        let enabled_methods = if self.enabled_methods.is_empty() {
            None
        } else {
            Some(
                self.enabled_methods
                    .iter()
                    .filter_map(|m| m.parse::<DetectionMethod>().ok())
                    .collect::<BTreeSet<_>>(),
            )
        };

        DetectOptions {
            min_confidence: self.min_confidence,
            enabled_methods,
        }
    }

    pub fn to_redact_options(&self) -> RedactOptions {
        RedactOptions::new(self.to_detect_options(), self.redaction_char)
    }

    pub fn to_logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: parse_level(&self.log_level),
            format: self.log_format.parse().unwrap_or(LogFormat::Pretty),
            ..LoggingConfig::default()
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(format!("{}{}", ENV_PREFIX, key))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_var(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = %format!("{}{}", ENV_PREFIX, key), value = %raw, "Ignoring unparsable environment value");
            None
        }
    }
}

fn single_char(value: &str) -> Option<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn split_methods(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
