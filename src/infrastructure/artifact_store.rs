use crate::domain::artifact::SCRIPT_EXTENSION;
use crate::domain::error::{AppError, Result};
use async_trait::async_trait;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Writes script artifacts under a caller-chosen root directory.
#[async_trait]
pub trait ArtifactStore {
    /// Returns the resolved path of the written file.
    async fn save(&self, root: &Path, filename: &str, content: &str) -> Result<PathBuf>;
}

pub struct FsArtifactStore;

impl FsArtifactStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn save(&self, root: &Path, filename: &str, content: &str) -> Result<PathBuf> {
        let root = root.to_path_buf();
        let filename = sanitize_filename(filename)?;
        let bytes = content.as_bytes().to_vec();

        tokio::task::spawn_blocking(move || {
            ensure_root(&root)?;
            let path = root.join(filename);
            atomic_write_bytes(&path, &bytes)?;
            Ok(path)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Save task failed: {}", e)))?
    }
}

/// Path separators become `_` and the `.robot` extension is enforced.
pub fn sanitize_filename(filename: &str) -> Result<String> {
    let mut name: String = filename
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            other => other,
        })
        .collect();
    let stem = name.strip_suffix(SCRIPT_EXTENSION).unwrap_or(&name);
    if stem.trim_matches('.').trim().is_empty() {
        return Err(AppError::ValidationError(
            "Filename must contain at least one usable character.".to_string(),
        ));
    }
    if !name.ends_with(SCRIPT_EXTENSION) {
        name.push_str(SCRIPT_EXTENSION);
    }
    Ok(name)
}

fn persistence_err(err: std::io::Error, path: &Path) -> AppError {
    if err.kind() == ErrorKind::PermissionDenied {
        AppError::PersistenceError(format!("Permission denied: cannot write to {}", path.display()))
    } else {
        AppError::PersistenceError(format!("{}: {}", path.display(), err))
    }
}

fn ensure_root(root: &Path) -> Result<()> {
    if root.exists() && !root.is_dir() {
        return Err(AppError::PersistenceError(format!(
            "Path is not a directory: {}",
            root.display()
        )));
    }
    fs::create_dir_all(root).map_err(|e| persistence_err(e, root))
}

/// Writes through a temp file and renames so readers never see a partial script.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
    {
        let mut file = fs::File::create(&tmp_path).map_err(|e| persistence_err(e, path))?;
        if let Err(e) = file.write_all(bytes) {
            let _ = fs::remove_file(&tmp_path);
            return Err(persistence_err(e, path));
        }
        file.sync_all().ok();
    }

    // Rename cannot replace an existing file on Windows; move the old one aside first.
    if path.exists() {
        let backup = path.with_extension(format!("bak-{}", Uuid::new_v4()));
        fs::rename(path, &backup).map_err(|e| persistence_err(e, path))?;
        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::rename(&backup, path);
            let _ = fs::remove_file(&tmp_path);
            return Err(persistence_err(e, path));
        }
        let _ = fs::remove_file(&backup);
        Ok(())
    } else {
        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            persistence_err(e, path)
        })
    }
}
