//! Error code constants
//!
//! Returned alongside error messages so a presentation layer can localise them.

/// Task input rejected before any state change
pub const ERR_VALIDATION: &str = "ERR_VALIDATION";

/// Task store read or write failed
pub const ERR_PERSISTENCE: &str = "ERR_PERSISTENCE";

/// Task id not loaded for the current owner
pub const ERR_UNKNOWN_TASK: &str = "ERR_UNKNOWN_TASK";

/// A single copy attempt failed
pub const ERR_COPY_FAILED: &str = "ERR_COPY_FAILED";

/// Configuration file could not be read or parsed
pub const ERR_CONFIG: &str = "ERR_CONFIG";
