pub mod config;
pub mod detector;
pub mod masking;
pub mod merge;
pub mod patterns;
pub mod predefined_patterns;
pub mod recognizer;
pub mod result;
pub mod statistical;

pub use config::{ConfigValidationError, CustomRuleConfig, RulesFile};
pub use detector::{DetectOptions, RedactOptions, RedactionEngine};
pub use masking::{Redactor, DEFAULT_REDACTION_CHAR};
pub use merge::{merge, rank, DEFAULT_MIN_CONFIDENCE};
pub use patterns::{PatternEngine, SensitivePattern};
pub use predefined_patterns::{PatternStatistics, PredefinedPatterns, PATTERN_TABLE_VERSION};
pub use recognizer::{PatternRecognizer, Recognizer};
pub use result::{
    ConfidenceStats, DetectionMethod, DetectionResult, EntityType, RedactionOutcome,
    RedactionSummary, Span,
};
pub use statistical::{
    install_backend, installed_backend, teardown_backend, NerBackend, OffsetKind, RawEntity,
    StaticNerBackend, StatisticalRecognizer, UnavailableBackend,
};
