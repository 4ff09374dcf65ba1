use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Persists composed letters. One file per (branch, full name); later saves
/// overwrite earlier ones.
pub trait ArtifactStore: Send + Sync {
    fn save(
        &self,
        canonical_branch: &str,
        full_name: &str,
        body: &str,
        extension: Option<&str>,
    ) -> Result<PathBuf, ArtifactError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("'{0}' cannot be used as a path component")]
    InvalidComponent(String),
    #[error("unable to write letter to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Letters laid out as `{root}/{branch}/{full_name}_LOR[.ext]`.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn letter_path(
        &self,
        canonical_branch: &str,
        full_name: &str,
        extension: Option<&str>,
    ) -> Result<PathBuf, ArtifactError> {
        let branch = single_component(canonical_branch)?;
        let mut file_name = format!("{}_LOR", single_component(full_name)?);
        if let Some(ext) = extension.filter(|ext| !ext.is_empty()) {
            file_name.push('.');
            file_name.push_str(ext);
        }
        Ok(self.root.join(branch).join(file_name))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn save(
        &self,
        canonical_branch: &str,
        full_name: &str,
        body: &str,
        extension: Option<&str>,
    ) -> Result<PathBuf, ArtifactError> {
        let path = self.letter_path(canonical_branch, full_name, extension)?;
        if let Some(folder) = path.parent() {
            fs::create_dir_all(folder).map_err(|source| ArtifactError::Write {
                path: folder.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, body).map_err(|source| ArtifactError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

fn single_component(value: &str) -> Result<&str, ArtifactError> {
    let trimmed = value.trim();
    let mut components = Path::new(trimmed).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !trimmed.contains(['/', '\\']) => Ok(trimmed),
        _ => Err(ArtifactError::InvalidComponent(value.to_string())),
    }
}
