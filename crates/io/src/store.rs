//! Artifact storage, partitioned by date: `<prefix>/<YYYY-MM-DD>/<filename>`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;
use tracing::info;
use vpn_recon::ReconError;

/// Where a stored artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredArtifact {
    pub filename: String,
    /// Store-relative object path.
    pub gcs_path: String,
    pub download_url: String,
    pub size_bytes: u64,
    /// RFC 3339, local time. Falls back to the modification time where the
    /// filesystem records no creation time.
    pub created: String,
}

pub trait ArtifactStore {
    fn put(&self, date: NaiveDate, filename: &str, bytes: &[u8]) -> Result<StoredArtifact, ReconError>;

    /// Artifacts stored under `date`, sorted by filename. A date with nothing
    /// stored yields an empty list.
    fn list(&self, date: NaiveDate) -> Result<Vec<StoredArtifact>, ReconError>;

    fn get(&self, date: NaiveDate, filename: &str) -> Result<Vec<u8>, ReconError>;
}

/// Filesystem-backed store rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    prefix: String,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the root exists (or can be created) and is a directory.
    pub fn check(&self) -> Result<(), ReconError> {
        fs::create_dir_all(&self.root)
            .map_err(|e| ReconError::Storage(format!("store root unusable: {}", e.kind())))?;
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(ReconError::Storage("store root is not a directory".into()))
        }
    }

    fn object_path(&self, date: NaiveDate, filename: &str) -> String {
        let day = date.format("%Y-%m-%d");
        if self.prefix.is_empty() {
            format!("{day}/{filename}")
        } else {
            format!("{}/{day}/{filename}", self.prefix)
        }
    }

    fn describe(&self, object: String, filename: &str, path: &Path) -> Result<StoredArtifact, ReconError> {
        let meta = fs::metadata(path)
            .map_err(|e| ReconError::Storage(format!("{object}: {}", e.kind())))?;
        let absolute = fs::canonicalize(path)
            .map_err(|e| ReconError::Storage(format!("{object}: {}", e.kind())))?;
        let created = meta
            .created()
            .or_else(|_| meta.modified())
            .map_err(|e| ReconError::Storage(format!("{object}: {}", e.kind())))?;
        Ok(StoredArtifact {
            filename: filename.to_string(),
            download_url: format!("file://{}", absolute.display()),
            gcs_path: object,
            size_bytes: meta.len(),
            created: DateTime::<Local>::from(created).to_rfc3339(),
        })
    }
}

fn check_filename(filename: &str) -> Result<(), ReconError> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(ReconError::Storage(format!("invalid artifact name '{filename}'")));
    }
    Ok(())
}

impl ArtifactStore for LocalStore {
    fn put(&self, date: NaiveDate, filename: &str, bytes: &[u8]) -> Result<StoredArtifact, ReconError> {
        check_filename(filename)?;
        let object = self.object_path(date, filename);
        let path = self.root.join(&object);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ReconError::Storage(format!("{object}: {}", e.kind())))?;
        }
        fs::write(&path, bytes).map_err(|e| ReconError::Storage(format!("{object}: {}", e.kind())))?;

        info!(object = %object, bytes = bytes.len(), "artifact stored");
        self.describe(object, filename, &path)
    }

    fn list(&self, date: NaiveDate) -> Result<Vec<StoredArtifact>, ReconError> {
        let dir_object = self.object_path(date, "");
        let dir = self.root.join(&dir_object);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir)
            .map_err(|e| ReconError::Storage(format!("{dir_object}: {}", e.kind())))?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ReconError::Storage(format!("{dir_object}: {}", e.kind())))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().into_owned();
            out.push(self.describe(self.object_path(date, &filename), &filename, &path)?);
        }
        out.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(out)
    }

    fn get(&self, date: NaiveDate, filename: &str) -> Result<Vec<u8>, ReconError> {
        check_filename(filename)?;
        let object = self.object_path(date, filename);
        fs::read(self.root.join(&object))
            .map_err(|e| ReconError::Storage(format!("{object}: {}", e.kind())))
    }
}
