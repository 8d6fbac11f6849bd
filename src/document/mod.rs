//! 文本来源
//!
//! 把文档转换为规范化的纯文本和分页列表。PDF、DOCX、OCR 等格式解析属于
//! 外部协作方，这里只实现纯文本格式和内存来源。

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::infrastructure::error::{InputError, RedactionError};

/// 默认最大文件大小 (50MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// 分页符
const PAGE_BREAK: char = '\u{000C}';

/// 页面之间的连接符
pub const PAGE_SEPARATOR: &str = "\n\n";

/// 提取出的文档内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContent {
    pub text: String,
    pub pages: Vec<String>,
    pub file_type: String,
    /// 来源相关的描述信息，例如页数、文件大小
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// 纯文本来源恒为 false；由能解析图片的来源设置
    #[serde(default)]
    pub has_images: bool,
}

impl DocumentContent {
    /// 由分页构造，全文为各页以空行连接
    pub fn from_pages(pages: Vec<String>, file_type: impl Into<String>) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("pages".to_string(), pages.len().to_string());
        Self {
            text: pages.join(PAGE_SEPARATOR),
            pages,
            file_type: file_type.into(),
            metadata,
            has_images: false,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn has_text(&self) -> bool {
        self.text.chars().any(|c| !c.is_whitespace())
    }
}

/// 文本来源
pub trait TextSource: Send + Sync {
    /// 无法提取任何文本时返回 `InputError::NoExtractableText`，
    /// 与“没有发现敏感信息”区分开
    fn get_text(&self, document: &str) -> Result<DocumentContent, RedactionError>;
}

/// 纯文本文件来源
#[derive(Debug, Clone)]
pub struct PlainTextSource {
    max_file_size: u64,
}

impl PlainTextSource {
    pub const SUPPORTED_EXTENSIONS: [&'static str; 4] = ["txt", "md", "csv", "log"];

    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    fn check_extension(path: &Path) -> Result<String, InputError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if Self::SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            Ok(extension)
        } else {
            Err(InputError::UnsupportedFormat {
                extension: if extension.is_empty() {
                    "<none>".to_string()
                } else {
                    format!(".{}", extension)
                },
            })
        }
    }
}

impl Default for PlainTextSource {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

impl TextSource for PlainTextSource {
    fn get_text(&self, document: &str) -> Result<DocumentContent, RedactionError> {
        let path = Path::new(document);
        if !path.is_file() {
            return Err(InputError::NotFound {
                path: document.to_string(),
            }
            .into());
        }

        let file_type = Self::check_extension(path)?;

        let size = std::fs::metadata(path)?.len();
        if size > self.max_file_size {
            return Err(InputError::TooLarge {
                size,
                limit: self.max_file_size,
            }
            .into());
        }

        let bytes = std::fs::read(path)?;
        let raw = String::from_utf8(bytes).map_err(|e| InputError::Io {
            message: format!("{} is not valid UTF-8: {}", document, e.utf8_error()),
        })?;

        let content = DocumentContent::from_pages(split_pages(&normalize_text(&raw)), file_type)
            .with_metadata("size_bytes", size.to_string());
        if !content.has_text() {
            return Err(InputError::NoExtractableText {
                document: document.to_string(),
            }
            .into());
        }

        tracing::debug!(document, pages = content.pages.len(), "Extracted document text");
        Ok(content)
    }
}

/// 内存来源，文档名 -> 分页
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    documents: HashMap<String, Vec<String>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, name: impl Into<String>, pages: Vec<String>) -> Self {
        self.documents.insert(name.into(), pages);
        self
    }
}

impl TextSource for InMemorySource {
    fn get_text(&self, document: &str) -> Result<DocumentContent, RedactionError> {
        let pages = self.documents.get(document).ok_or_else(|| InputError::NotFound {
            path: document.to_string(),
        })?;

        let content = DocumentContent::from_pages(
            pages.iter().map(|p| normalize_text(p)).collect(),
            "memory",
        );
        if !content.has_text() {
            return Err(InputError::NoExtractableText {
                document: document.to_string(),
            }
            .into());
        }
        Ok(content)
    }
}

/// 去掉 BOM，统一换行为 LF
pub fn normalize_text(raw: &str) -> String {
    raw.strip_prefix('\u{FEFF}')
        .unwrap_or(raw)
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

fn split_pages(text: &str) -> Vec<String> {
    text.split(PAGE_BREAK).map(str::to_string).collect()
}
