//! Encrypted-at-rest storage for the chat session file.
//!
//! The session is kept in the repository or deployment only as a Fernet
//! token; it is unsealed into a plain session file right before use.

use std::path::Path;

use fernet::Fernet;

use crate::error::{AppError, Result};
use crate::models::HistoryConfig;

pub struct SessionVault {
    fernet: Fernet,
}

impl SessionVault {
    /// Build a vault from a url-safe base64 Fernet key.
    pub fn new(key: &str) -> Result<Self> {
        let fernet = Fernet::new(key.trim())
            .ok_or_else(|| AppError::session("SECRET_KEY is not a valid Fernet key"))?;
        Ok(Self { fernet })
    }

    pub fn from_config(config: &HistoryConfig) -> Result<Self> {
        let key = config
            .session_key
            .as_deref()
            .ok_or_else(|| AppError::session("SECRET_KEY is not set"))?;
        Self::new(key)
    }

    /// Fresh random key, printed once by `session keygen`.
    pub fn generate_key() -> String {
        Fernet::generate_key()
    }

    /// Decrypt `encrypted` and write the plain session to `plain`.
    pub async fn unseal(&self, encrypted: &Path, plain: &Path) -> Result<()> {
        let token = tokio::fs::read_to_string(encrypted).await.map_err(|e| {
            AppError::session(format!("cannot read {}: {e}", encrypted.display()))
        })?;
        let bytes = self.fernet.decrypt(token.trim()).map_err(|_| {
            AppError::session(format!(
                "cannot decrypt {}: wrong key or corrupted file",
                encrypted.display()
            ))
        })?;
        write_file(plain, &bytes).await?;
        log::info!("Session unsealed to {}", plain.display());
        Ok(())
    }

    /// Encrypt the plain session at `plain` into `encrypted`.
    pub async fn seal(&self, plain: &Path, encrypted: &Path) -> Result<()> {
        let bytes = tokio::fs::read(plain)
            .await
            .map_err(|e| AppError::session(format!("cannot read {}: {e}", plain.display())))?;
        let token = self.fernet.encrypt(&bytes);
        write_file(encrypted, token.as_bytes()).await?;
        log::info!("Session sealed to {}", encrypted.display());
        Ok(())
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
