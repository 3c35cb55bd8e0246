use super::codec::CredentialCodec;
use super::session::Session;
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// File-backed home for encoded credentials.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Returns `Ok(None)` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        CredentialCodec::decode(&bytes).map(Some)
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        let bytes = CredentialCodec::encode(session)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, bytes)?;
        tracing::debug!("Saved credentials to {}", self.path.display());
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
