pub mod sensitive;

pub use sensitive::{DetectionResult, EntityType, RedactionEngine, RedactionOutcome, Span};
