use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::error_codes::ERR_COPY_FAILED;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CopyOptions {
    pub preserve_permissions: bool,
    pub preserve_times: bool,
    pub verify_after_copy: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            preserve_permissions: true,
            preserve_times: true,
            verify_after_copy: false,
        }
    }
}

/// Result of one copy attempt. Failures are data, never a panic or an `Err`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CopyOutcome {
    pub ok: bool,
    pub output: String,
}

impl CopyOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            ok: true,
            output: output.into(),
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            ok: false,
            output: output.into(),
        }
    }
}

impl From<CopyError> for CopyOutcome {
    fn from(err: CopyError) -> Self {
        CopyOutcome::failure(format!("[{}] {err}", err.code()))
    }
}

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("source file does not exist: {0:?}")]
    SourceMissing(PathBuf),

    #[error("source is not a regular file: {0:?}")]
    SourceNotFile(PathBuf),

    #[error("failed to {op} {path:?}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checksum mismatch after copying to {path:?} (source {source_hash}, target {target_hash})")]
    VerificationFailed {
        path: PathBuf,
        source_hash: String,
        target_hash: String,
    },
}

impl CopyError {
    pub fn code(&self) -> &'static str {
        ERR_COPY_FAILED
    }
}
