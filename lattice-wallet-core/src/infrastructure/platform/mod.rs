//! Platform storage
//!
//! File-backed wallet repository. Each wallet export is one JSON file
//! `<id>.wallet.json` in the data directory; the secret inside it is
//! already password-encrypted.

use async_trait::async_trait;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::entities::WalletExport;
use crate::domain::repositories::WalletRepository;
use crate::shared::constants::WALLET_FILE_EXTENSION;
use crate::shared::error::WalletError;

pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create the data directory if needed
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, WalletError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700)).await?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, wallet_id: &str) -> Result<PathBuf, WalletError> {
        let safe = !wallet_id.is_empty()
            && wallet_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(WalletError::storage(format!("Invalid wallet id: {:?}", wallet_id)));
        }
        Ok(self.dir.join(format!("{}.{}", wallet_id, WALLET_FILE_EXTENSION)))
    }
}

#[async_trait]
impl WalletRepository for FileStorage {
    async fn save(&self, export: &WalletExport) -> Result<(), WalletError> {
        let path = self.file_path(&export.id)?;
        let tmp = path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(export)?;

        fs::write(&tmp, &json).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }
        // Rename so a crash never leaves a half-written export
        fs::rename(&tmp, &path).await?;
        debug!("Saved wallet {} to {}", export.id, path.display());
        Ok(())
    }

    async fn load(&self, wallet_id: &str) -> Result<Option<WalletExport>, WalletError> {
        let path = self.file_path(wallet_id)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>, WalletError> {
        let suffix = format!(".{}", WALLET_FILE_EXTENSION);
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            match name.to_str().and_then(|n| n.strip_suffix(&suffix)) {
                Some(id) => ids.push(id.to_string()),
                None => {
                    if !name.to_string_lossy().ends_with(".tmp") {
                        warn!("Ignoring unexpected file in wallet directory: {:?}", name);
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, wallet_id: &str) -> Result<(), WalletError> {
        match fs::remove_file(self.file_path(wallet_id)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::encryption::EncryptedData;
    use crate::shared::types::WalletKind;

    fn export(id: &str) -> WalletExport {
        WalletExport {
            id: id.to_string(),
            kind: WalletKind::Seed,
            secret: EncryptedData {
                iv: "00".repeat(12),
                salt: "11".repeat(16),
                encrypted: "ab".repeat(48),
            },
            accounts: Vec::new(),
            selected_account_address: None,
            locked: true,
        }
    }

    #[tokio::test]
    async fn test_save_load_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("wallets")).await.unwrap();

        storage.save(&export("b-wallet")).await.unwrap();
        storage.save(&export("a-wallet")).await.unwrap();

        assert_eq!(storage.list().await.unwrap(), vec!["a-wallet".to_string(), "b-wallet".to_string()]);
        assert_eq!(storage.load("a-wallet").await.unwrap(), Some(export("a-wallet")));
        assert_eq!(storage.load("missing").await.unwrap(), None);

        tokio_test::assert_ok!(storage.delete("a-wallet").await);
        // Deleting twice is not an error
        tokio_test::assert_ok!(storage.delete("a-wallet").await);
        assert_eq!(storage.list().await.unwrap(), vec!["b-wallet".to_string()]);
    }

    #[tokio::test]
    async fn test_saved_file_is_the_export_json() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).await.unwrap();
        storage.save(&export("w1")).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("w1.wallet.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["type"], "seed");
        assert_eq!(json["iv"], "00".repeat(12));
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).await.unwrap();

        assert!(matches!(storage.save(&export("../escape")).await, Err(WalletError::Storage(_))));
        assert!(storage.load("").await.is_err());
    }
}
