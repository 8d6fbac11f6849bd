use crate::analysis::sensitive::predefined_patterns::{PredefinedPatterns, PATTERN_TABLE_VERSION};
use crate::analysis::sensitive::result::{DetectionResult, RedactionOutcome};

/// 文本格式的检测摘要，不包含任何原文片段
pub fn format_summary_as_text(result: &DetectionResult) -> String {
    let mut output = String::new();

    output.push_str("=== 脱敏摘要 ===\n");
    output.push_str(&format!("文本长度: {} 字符\n", result.text_length));
    output.push_str(&format!("脱敏片段数: {}\n", result.summary.total_redactions));

    if !result.summary.by_type.is_empty() {
        output.push_str("按类型:\n");
        for (entity_type, count) in &result.summary.by_type {
            output.push_str(&format!("  - {}: {}\n", entity_type, count));
        }
    }

    if !result.summary.by_method.is_empty() {
        output.push_str("按方法:\n");
        for (method, count) in &result.summary.by_method {
            output.push_str(&format!("  - {}: {}\n", method, count));
        }
        let stats = &result.summary.confidence_stats;
        output.push_str(&format!(
            "置信度: 最小 {:.2} / 最大 {:.2} / 平均 {:.2}\n",
            stats.min, stats.max, stats.average
        ));
    }

    output.push_str(&format!(
        "统计识别: {}\n",
        if result.statistical_detection_used { "已使用" } else { "未使用" }
    ));
    for warning in &result.warnings {
        output.push_str(&format!("警告: {}\n", warning));
    }

    output
}

/// 检测模式的文本输出：片段位置与类型
pub fn format_detection_as_text(result: &DetectionResult) -> String {
    let mut output = String::new();
    for span in &result.spans {
        output.push_str(&format!(
            "[{}..{}) {} {:.2} {}\n",
            span.start(),
            span.end(),
            span.entity_type(),
            span.confidence(),
            span.method()
        ));
    }
    output.push('\n');
    output.push_str(&format_summary_as_text(result));
    output
}

pub fn format_outcome_as_text(outcome: &RedactionOutcome) -> String {
    let mut output = String::new();
    output.push_str(&outcome.redacted_text);
    if !outcome.redacted_text.ends_with('\n') {
        output.push('\n');
    }
    output.push('\n');
    output.push_str(&format_summary_as_text(&outcome.result));
    output
}

pub fn format_pattern_list() -> anyhow::Result<String> {
    let patterns = PredefinedPatterns::get_all_patterns()?;
    let stats = PredefinedPatterns::get_pattern_statistics()?;

    let mut output = String::new();
    output.push_str(&format!(
        "=== 预置规则表 v{} ({} 条) ===
",
        PATTERN_TABLE_VERSION, stats.total_patterns
    ));
    for (entity_type, count) in &stats.type_counts {
        output.push_str(&format!("  {}: {}
", entity_type.label(), count));
    }
    output.push('\n');

    for pattern in &patterns {
        output.push_str(&format!(
            "{:<28} {:<12} {:.2}  {}\n",
            pattern.name,
            pattern.entity_type.label(),
            pattern.confidence,
            pattern.description
        ));
    }
    Ok(output)
}
