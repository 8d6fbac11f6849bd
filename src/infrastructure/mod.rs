pub mod error;
pub mod logging;

pub use error::{ErrorCategory, InputError, RedactionError};
pub use logging::{setup_logging, LogFormat, LogOutput, LoggingConfig};
