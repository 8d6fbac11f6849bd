pub mod analysis;
pub mod cli;
pub mod config;
pub mod document;
pub mod infrastructure;

pub use analysis::sensitive::{
    DetectOptions, DetectionMethod, DetectionResult, EntityType, RedactOptions, RedactionEngine,
    RedactionOutcome, Span,
};
pub use document::{InMemorySource, PlainTextSource, TextSource};
pub use infrastructure::{InputError, RedactionError};
