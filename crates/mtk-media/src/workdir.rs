//! Job-scoped scratch directories and local file naming.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::MediaResult;

/// Scratch directory owned by a single job.
///
/// Dropping a `WorkDir` removes it silently. Call [`WorkDir::cleanup`] to
/// observe removal errors.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// Create `<root>/mtk_<job_id>_<random>`. `root` is created if missing.
    pub async fn create(root: &Path, job_id: &str) -> MediaResult<Self> {
        tokio::fs::create_dir_all(root).await?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("mtk_{}_", sanitize_component(job_id)))
            .tempdir_in(root)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `name` inside the directory.
    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory and everything in it.
    pub fn cleanup(self) -> std::io::Result<()> {
        self.dir.close()
    }
}

/// Reduce an external identifier to `[A-Za-z0-9_-]` so it is safe as a
/// single path component.
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Extension of `name` including the dot, or `None` when it has none usable.
///
/// Only alphanumeric extensions are returned.
pub fn extension_of(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(format!(".{}", ext))
}
