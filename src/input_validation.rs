//! Task input validation
//!
//! Checks user supplied task fields before they reach the task store, so a
//! rejected add or edit never leaves a partial write behind.

use crate::error::ValidationError;

/// Maximum accepted path length in bytes
const MAX_PATH_LENGTH: usize = 4096;

/// Validate a polling interval and return it as whole seconds.
pub fn validate_interval(interval_seconds: i64) -> Result<u64, ValidationError> {
    if interval_seconds <= 0 {
        return Err(ValidationError::NonPositiveInterval(interval_seconds));
    }
    Ok(interval_seconds as u64)
}

/// Validate a source or target path argument.
///
/// Paths are opaque to the scheduler: existence is not checked here, only
/// that the value can be handed to a copy executor.
pub fn validate_path_argument(field: &'static str, path: &str) -> Result<(), ValidationError> {
    if path.trim().is_empty() {
        return Err(ValidationError::EmptyPath(field));
    }

    if path.len() > MAX_PATH_LENGTH {
        return Err(ValidationError::PathTooLong {
            field,
            len: path.len(),
            max: MAX_PATH_LENGTH,
        });
    }

    if path.contains('\0') {
        return Err(ValidationError::NullByte(field));
    }

    Ok(())
}
