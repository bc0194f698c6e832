use crate::sync_engine::executor::CopyExecutor;
use crate::sync_engine::types::{CopyError, CopyOptions, CopyOutcome};
use std::fs;
use std::hash::Hasher;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Copies files with the platform filesystem API.
#[derive(Debug, Clone, Default)]
pub struct FsCopyExecutor {
    options: CopyOptions,
}

impl FsCopyExecutor {
    pub fn new(options: CopyOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CopyOptions {
        &self.options
    }

    fn calculate_checksum(path: &Path) -> Result<String, CopyError> {
        use twox_hash::XxHash64;

        let io_err = |source| CopyError::Io {
            op: "read",
            path: path.to_path_buf(),
            source,
        };

        let mut file = fs::File::open(path).map_err(io_err)?;
        let mut hasher = XxHash64::with_seed(0);
        let mut buffer = [0u8; 8192];

        loop {
            let n = file.read(&mut buffer).map_err(io_err)?;
            if n == 0 {
                break;
            }
            hasher.write(&buffer[..n]);
        }

        Ok(format!("{:x}", hasher.finish()))
    }

    /// An existing directory target receives the file under its own name.
    fn resolve_target(source: &Path, target: &Path) -> PathBuf {
        if target.is_dir() {
            if let Some(name) = source.file_name() {
                return target.join(name);
            }
        }
        target.to_path_buf()
    }

    /// Copy `source` to `target` and return the resolved target and bytes written.
    pub fn copy_file(&self, source: &Path, target: &Path) -> Result<(PathBuf, u64), CopyError> {
        let meta = match fs::metadata(source) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CopyError::SourceMissing(source.to_path_buf()))
            }
            Err(source_err) => {
                return Err(CopyError::Io {
                    op: "inspect",
                    path: source.to_path_buf(),
                    source: source_err,
                })
            }
        };

        if !meta.is_file() {
            return Err(CopyError::SourceNotFile(source.to_path_buf()));
        }

        let target = Self::resolve_target(source, target);

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| CopyError::Io {
                    op: "create directory",
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let bytes = fs::copy(source, &target).map_err(|e| CopyError::Io {
            op: "copy to",
            path: target.clone(),
            source: e,
        })?;

        if self.options.preserve_permissions {
            fs::set_permissions(&target, meta.permissions()).map_err(|e| CopyError::Io {
                op: "set permissions on",
                path: target.clone(),
                source: e,
            })?;
        }

        if self.options.preserve_times {
            let modified = meta.modified().map_err(|e| CopyError::Io {
                op: "read mtime of",
                path: source.to_path_buf(),
                source: e,
            })?;
            filetime::set_file_mtime(&target, filetime::FileTime::from_system_time(modified))
                .map_err(|e| CopyError::Io {
                    op: "set mtime on",
                    path: target.clone(),
                    source: e,
                })?;
        }

        if self.options.verify_after_copy {
            let source_hash = Self::calculate_checksum(source)?;
            let target_hash = Self::calculate_checksum(&target)?;
            if source_hash != target_hash {
                return Err(CopyError::VerificationFailed {
                    path: target,
                    source_hash,
                    target_hash,
                });
            }
        }

        Ok((target, bytes))
    }
}

impl CopyExecutor for FsCopyExecutor {
    fn copy(&self, source: &str, target: &str) -> CopyOutcome {
        match self.copy_file(Path::new(source), Path::new(target)) {
            Ok((resolved, bytes)) => CopyOutcome::success(format!(
                "1 file(s) copied ({bytes} bytes) -> {}",
                resolved.display()
            )),
            Err(e) => e.into(),
        }
    }
}
