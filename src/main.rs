use std::sync::Arc;

use clap::Parser;
use tokio::io::AsyncReadExt;

use doc_redact::analysis::sensitive::statistical::{
    installed_backend, NerBackend, StatisticalRecognizer, UnavailableBackend,
};
use doc_redact::analysis::sensitive::{PatternRecognizer, RedactionEngine, RulesFile};
use doc_redact::cli::args::Args;
use doc_redact::cli::output;
use doc_redact::config::Config;
use doc_redact::document::{normalize_text, PlainTextSource};
use doc_redact::infrastructure::{setup_logging, RedactionError};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("错误: {:#}", e);
        let code = match e.downcast_ref::<RedactionError>() {
            Some(RedactionError::Input(_)) => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    if args.list_patterns {
        print!("{}", output::format_pattern_list()?);
        return Ok(());
    }

    if let Some(path) = &args.init_rules {
        RulesFile::generate_example().save_to_file(path)?;
        println!("示例规则文件已写入: {}", path);
        return Ok(());
    }

    let (mut config, rules) = Config::load(args.rules.as_deref().map(std::path::Path::new))?;
    config.update_from_args(&args);
    config.validate()?;
    setup_logging(config.to_logging_config())?;

    let rule_errors = rules.validate();
    if !rule_errors.is_empty() {
        for error in &rule_errors {
            tracing::error!(field = %error.field, "{}", error.message);
        }
        let first = &rule_errors[0];
        return Err(RedactionError::config(
            format!("rules file has {} invalid field(s), first: {}", rule_errors.len(), first),
            Some(first.field.clone()),
        )
        .into());
    }

    let engine = build_engine(&config, &rules)?;
    let redact_options = config.to_redact_options();

    let rendered = if let Some(path) = &args.file {
        let source = PlainTextSource::new(config.max_file_size);
        if args.detect_only {
            let (_, result) = engine.detect_document(&source, path, &redact_options.detect).await?;
            render_detection(&args, &result)?
        } else {
            let (_, outcome) = engine.redact_document(&source, path, &redact_options).await?;
            render_outcome(&args, &outcome)?
        }
    } else {
        let text = match args.inline_text() {
            Some(text) => text,
            None => {
                let mut raw = String::new();
                tokio::io::stdin().read_to_string(&mut raw).await?;
                normalize_text(&raw)
            }
        };
        if args.detect_only {
            let result = engine.detect(&text, &redact_options.detect).await?;
            render_detection(&args, &result)?
        } else {
            let outcome = engine.redact(&text, &redact_options).await?;
            render_outcome(&args, &outcome)?
        }
    };

    if let Some(output_file) = &args.output {
        tokio::fs::write(output_file, &rendered).await?;
        tracing::info!(path = %output_file, "Result written");
    } else {
        print!("{}", rendered);
    }

    Ok(())
}

fn build_engine(
    config: &Config,
    rules: &RulesFile,
) -> anyhow::Result<RedactionEngine> {
    let pattern_recognizer = PatternRecognizer::with_custom_patterns(rules.custom_patterns()?, &rules.disabled_rules)?;

    // 本程序不附带统计模型，未安装后端时统计识别降级为警告
    let backend = installed_backend()
        .unwrap_or_else(|| Arc::new(UnavailableBackend::new("ner")) as Arc<dyn NerBackend>);
    let statistical = StatisticalRecognizer::new(backend)
        .with_timeout(config.statistical_timeout())
        .with_fallback_confidence(config.statistical_fallback_confidence);

    Ok(RedactionEngine::new()
        .with_recognizer(Arc::new(pattern_recognizer))
        .with_recognizer(Arc::new(statistical)))
}

fn render_detection(
    args: &Args,
    result: &doc_redact::analysis::sensitive::DetectionResult,
) -> anyhow::Result<String> {
    match args.format.as_str() {
        "json" => Ok(serde_json::to_string_pretty(result)? + "\n"),
        _ => Ok(output::format_detection_as_text(result)),
    }
}

fn render_outcome(
    args: &Args,
    outcome: &doc_redact::analysis::sensitive::RedactionOutcome,
) -> anyhow::Result<String> {
    match args.format.as_str() {
        // 脱敏输出不回显原文片段
        "json" => {
            let value = serde_json::json!({
                "redacted_text": outcome.redacted_text,
                "summary": outcome.result.summary,
                "statistical_detection_used": outcome.result.statistical_detection_used,
                "warnings": outcome.result.warnings,
                "text_length": outcome.result.text_length,
            });
            Ok(serde_json::to_string_pretty(&value)? + "\n")
        }
        _ => Ok(output::format_outcome_as_text(outcome)),
    }
}
