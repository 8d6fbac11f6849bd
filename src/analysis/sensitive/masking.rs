use super::merge::is_ordered_non_overlapping;
use super::result::{RedactionSummary, Span, SummaryBuilder};
use crate::infrastructure::error::RedactionError;

/// 默认脱敏字符（实心方块）
pub const DEFAULT_REDACTION_CHAR: char = '█';

/// 脱敏器：把已合并的片段替换为等长的脱敏字符串
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redactor {
    redaction_char: char,
}

impl Redactor {
    pub fn new(redaction_char: char) -> Self {
        Self { redaction_char }
    }

    pub fn redaction_char(&self) -> char {
        self.redaction_char
    }

    /// 应用脱敏
    ///
    /// `spans` 必须按 start 有序且互不重叠（合并步骤的输出）。违反时返回
    /// `Structural` 错误，不会产出部分脱敏的文本。每个片段替换为
    /// `char_len()` 个脱敏字符，因此输出与输入的字符数相同，片段之外的
    /// 字节保持原样。摘要在同一次遍历中生成。
    pub fn apply(&self, text: &str, spans: &[Span]) -> Result<(String, RedactionSummary), RedactionError> {
        Self::check_spans(text, spans)?;

        let extra = spans.len() * self.redaction_char.len_utf8() * 4;
        let mut redacted = String::with_capacity(text.len() + extra);
        let mut summary = SummaryBuilder::default();
        let mut cursor = 0;

        for span in spans {
            redacted.push_str(&text[cursor..span.start()]);
            redacted.extend(std::iter::repeat(self.redaction_char).take(span.char_len()));
            cursor = span.end();
            summary.record(span);
        }
        redacted.push_str(&text[cursor..]);

        Ok((redacted, summary.finish()))
    }

    fn check_spans(text: &str, spans: &[Span]) -> Result<(), RedactionError> {
        if !is_ordered_non_overlapping(spans) {
            return Err(RedactionError::structural(
                "redaction requires spans sorted by start and non-overlapping",
            ));
        }

        for span in spans {
            let in_bounds = span.end() <= text.len()
                && text.is_char_boundary(span.start())
                && text.is_char_boundary(span.end());
            if !in_bounds || &text[span.start()..span.end()] != span.matched_text() {
                return Err(RedactionError::structural(format!(
                    "span [{}, {}) does not belong to the text being redacted",
                    span.start(),
                    span.end()
                )));
            }
        }

        Ok(())
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(DEFAULT_REDACTION_CHAR)
    }
}
