use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::UpsertOutcome;

/// The filesystem storage backend: request URIs resolve to paths under a
/// fixed write root. Writes are a root + filename join followed by a
/// `O_CREAT|O_WRONLY` full write, with a root-relative join and
/// traversal guard before any path touches the filesystem.
pub struct FsBackend {
    write_root: PathBuf,
}

impl FsBackend {
    pub fn new(write_root: impl Into<PathBuf>) -> Self {
        FsBackend {
            write_root: write_root.into(),
        }
    }

    /// Joins the write root with the URI path, rejecting anything that
    /// would escape the root after normalization.
    fn resolve(&self, uri: &str) -> io::Result<PathBuf> {
        let relative = uri.trim_start_matches('/');
        let candidate = self.write_root.join(relative);
        let mut normalized = PathBuf::new();
        for component in candidate.components() {
            use std::path::Component;
            match component {
                Component::ParentDir => {
                    normalized.pop();
                }
                Component::CurDir => {}
                other => normalized.push(other.as_os_str()),
            }
        }
        if !normalized.starts_with(&self.write_root) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "path escapes write root"));
        }
        Ok(normalized)
    }

    pub fn exists(&self, uri: &str) -> io::Result<bool> {
        let path = self.resolve(uri)?;
        Ok(path.is_file())
    }

    pub fn read(&self, uri: &str) -> io::Result<Vec<u8>> {
        let path = self.resolve(uri)?;
        fs::read(path)
    }

    pub fn last_modified(&self, uri: &str) -> io::Result<SystemTime> {
        let path = self.resolve(uri)?;
        fs::metadata(path)?.modified()
    }

    /// Creates parent directories as needed (mode 0755) and always writes
    /// with truncation — there is no version-suffix write path in this
    /// implementation (see the open question resolution in DESIGN.md).
    pub fn write(&self, uri: &str, body: &[u8]) -> io::Result<UpsertOutcome> {
        let path = self.resolve(uri)?;
        let existed = path.is_file();
        if let Some(parent) = path.parent() {
            create_dir_all_mode(parent, 0o755)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        file.write_all(body)?;
        Ok(if existed {
            UpsertOutcome::Overwritten
        } else {
            UpsertOutcome::Inserted
        })
    }
}

#[cfg(unix)]
fn create_dir_all_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(mode)
        .create(path)
}

#[cfg(not(unix))]
fn create_dir_all_mode(path: &Path, _mode: u32) -> io::Result<()> {
    fs::create_dir_all(path)
}
