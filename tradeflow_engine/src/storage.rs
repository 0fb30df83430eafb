//! Storage of PO files.
//!
//! The engine only ever sees an opaque `file_ref`. [`LocalFileStorage`] keeps the files on local disk and hands out
//! HMAC-signed, time-limited URLs for them.
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;
use tf_common::Secret;
use thiserror::Error;

use crate::db_types::OrderId;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Could not access document storage: {0}")]
    Io(String),
    #[error("Invalid file reference: {0}")]
    InvalidReference(String),
    #[error("The file name is empty")]
    EmptyFileName,
    #[error("The document is empty")]
    EmptyDocument,
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait DocumentStorage {
    /// Stores the file and returns a reference that can later be passed to the other methods.
    async fn store(&self, order_id: OrderId, file_name: &str, content: &[u8]) -> Result<String, StorageError>;

    async fn read(&self, file_ref: &str) -> Result<Vec<u8>, StorageError>;

    async fn remove(&self, file_ref: &str) -> Result<(), StorageError>;

    /// A URL for the file that stops working after `ttl`.
    fn signed_url(&self, file_ref: &str, ttl: Duration) -> Result<String, StorageError>;

    /// Checks a signature produced by [`Self::signed_url`]. Returns false for expired or tampered URLs.
    fn verify_signature(&self, file_ref: &str, expires: i64, signature: &str, now: DateTime<Utc>) -> bool;
}

#[derive(Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
    url_base: String,
    signing_key: Secret<String>,
}

impl LocalFileStorage {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(root: P, url_base: S, signing_key: Secret<String>) -> Self {
        let url_base = url_base.into().trim_end_matches('/').to_string();
        Self { root: root.into(), url_base, signing_key }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn path_for(&self, file_ref: &str) -> Result<PathBuf, StorageError> {
        let valid = !file_ref.is_empty() &&
            file_ref.split('/').all(|part| !part.is_empty() && part != "." && part != "..") &&
            !file_ref.contains('\\');
        if !valid {
            return Err(StorageError::InvalidReference(file_ref.to_string()));
        }
        Ok(self.root.join(file_ref))
    }

    fn signature(&self, file_ref: &str, expires: i64) -> String {
        // new_from_slice accepts keys of any length for HMAC
        let mut mac = match HmacSha256::new_from_slice(self.signing_key.reveal().as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return String::default(),
        };
        mac.update(format!("{file_ref}:{expires}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Keeps letters, digits, `.`, `-` and `_`. Everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    base.chars().map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' }).collect()
}

impl DocumentStorage for LocalFileStorage {
    async fn store(&self, order_id: OrderId, file_name: &str, content: &[u8]) -> Result<String, StorageError> {
        let name = sanitize_file_name(file_name);
        if name.is_empty() || name.chars().all(|c| c == '.') {
            return Err(StorageError::EmptyFileName);
        }
        if content.is_empty() {
            return Err(StorageError::EmptyDocument);
        }
        let prefix: u32 = rand::random();
        let file_ref = format!("orders/{}/{prefix:08x}_{name}", order_id.value());
        let path = self.path_for(&file_ref)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, content).await?;
        debug!("📁️ Stored {} bytes for order {order_id} at {file_ref}", content.len());
        Ok(file_ref)
    }

    async fn read(&self, file_ref: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(file_ref)?;
        Ok(tokio::fs::read(path).await?)
    }

    async fn remove(&self, file_ref: &str) -> Result<(), StorageError> {
        let path = self.path_for(file_ref)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("📁️ {file_ref} was already gone");
                Ok(())
            },
            Err(e) => Err(e.into()),
        }
    }

    fn signed_url(&self, file_ref: &str, ttl: Duration) -> Result<String, StorageError> {
        self.path_for(file_ref)?;
        let expires = (Utc::now() + ttl).timestamp();
        let signature = self.signature(file_ref, expires);
        Ok(format!("{}/{file_ref}?expires={expires}&signature={signature}", self.url_base))
    }

    fn verify_signature(&self, file_ref: &str, expires: i64, signature: &str, now: DateTime<Utc>) -> bool {
        if now.timestamp() > expires {
            trace!("📁️ Signed URL for {file_ref} expired at {expires}");
            return false;
        }
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(self.signing_key.reveal().as_bytes()) else {
            return false;
        };
        mac.update(format!("{file_ref}:{expires}").as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}
