use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 脱敏流水线错误类型
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RedactionError {
    /// 片段违反偏移量不变式，只会在构造时出现
    #[error("结构错误: {message}")]
    Structural { message: String },

    /// 统计识别后端不可用（未加载、超时或推理失败）
    #[error("后端不可用: {backend} - {reason}")]
    BackendUnavailable { backend: String, reason: String },

    #[error("输入错误: {0}")]
    Input(#[from] InputError),

    /// 正则表达式在注册时编译失败
    #[error("模式错误: {name} - {message}")]
    Pattern { name: String, message: String },

    #[error("配置错误: {message}")]
    Configuration { message: String, field: Option<String> },
}

/// 文本来源报告的输入错误
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputError {
    #[error("文件不存在: {path}")]
    NotFound { path: String },

    #[error("不支持的文件格式: {extension}")]
    UnsupportedFormat { extension: String },

    /// 文档可读但没有任何可提取的文本，与“未发现敏感信息”不同
    #[error("文档中没有可提取的文本: {document}")]
    NoExtractableText { document: String },

    #[error("文件过大: {size} 字节 (上限 {limit} 字节)")]
    TooLarge { size: u64, limit: u64 },

    #[error("读取失败: {message}")]
    Io { message: String },
}

impl RedactionError {
    /// 是否必须中止整个请求
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RedactionError::BackendUnavailable { .. })
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            RedactionError::Structural { .. } => ErrorCategory::Internal,
            RedactionError::BackendUnavailable { .. } => ErrorCategory::ExternalService,
            RedactionError::Input(_) => ErrorCategory::Input,
            RedactionError::Pattern { .. } => ErrorCategory::Configuration,
            RedactionError::Configuration { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        RedactionError::Structural {
            message: message.into(),
        }
    }

    pub fn backend_unavailable(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        RedactionError::BackendUnavailable {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    pub fn pattern(name: impl Into<String>, message: impl Into<String>) -> Self {
        RedactionError::Pattern {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>, field: Option<String>) -> Self {
        RedactionError::Configuration {
            message: message.into(),
            field,
        }
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Configuration,
    Input,
    ExternalService,
    Internal,
}

impl From<std::io::Error> for InputError {
    fn from(err: std::io::Error) -> Self {
        InputError::Io {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for RedactionError {
    fn from(err: std::io::Error) -> Self {
        RedactionError::Input(err.into())
    }
}

impl From<regex::Error> for RedactionError {
    fn from(err: regex::Error) -> Self {
        RedactionError::pattern("<anonymous>", err.to_string())
    }
}
