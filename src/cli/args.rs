use clap::Parser;

use crate::document::normalize_text;

#[derive(Parser, Debug, Default)]
#[command(
    name = "doc-redact",
    version,
    about = "文档敏感信息检测与脱敏工具",
    long_about = "doc-redact 从纯文本文档中检测个人敏感信息（邮箱、电话、证件号、卡号、日期、金额、病历号等），合并正则与统计识别结果，并输出等长替换后的文本。未指定 --file 与 --text 时从标准输入读取。"
)]
pub struct Args {
    /// 输入文件路径（txt/md/csv/log）
    #[arg(short = 'f', long, value_name = "PATH", conflicts_with = "text")]
    pub file: Option<String>,

    /// 直接传入待处理文本
    #[arg(short = 't', long, value_name = "TEXT")]
    pub text: Option<String>,

    /// 只检测，不输出脱敏文本
    #[arg(short = 'd', long = "detect-only", default_value_t = false)]
    pub detect_only: bool,

    /// 置信度阈值 (0.0 - 1.0)
    #[arg(short = 'c', long = "min-confidence", value_name = "F")]
    pub min_confidence: Option<f32>,

    /// 替换字符
    #[arg(short = 'r', long = "redaction-char", value_name = "C")]
    pub redaction_char: Option<char>,

    /// 启用的检测方法，逗号分隔（regex,statistical）
    #[arg(short = 'm', long, value_name = "LIST")]
    pub methods: Option<String>,

    /// JSON 规则文件路径
    #[arg(long, value_name = "PATH")]
    pub rules: Option<String>,

    /// 输出格式（json 或 text）
    #[arg(long, value_name = "FORMAT", default_value = "text", value_parser = ["json", "text"])]
    pub format: String,

    /// 结果写入文件而不是标准输出
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<String>,

    /// 日志级别（trace/debug/info/warn/error）
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// 日志格式（pretty/compact/json）
    #[arg(long = "log-format", value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// 列出内置规则后退出
    #[arg(long = "list-patterns", default_value_t = false)]
    pub list_patterns: bool,

    /// 写出一份示例规则文件后退出
    #[arg(long = "init-rules", value_name = "PATH")]
    pub init_rules: Option<String>,
}

impl Args {
    /// --text 传入的文本，与文件、标准输入走同样的规范化
    pub fn inline_text(&self) -> Option<String> {
        self.text.as_deref().map(normalize_text)
    }
}
