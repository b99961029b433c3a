//! Signed blob URLs for uploads and playback (Azure Blob service SAS)

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha2::Sha256;

use crate::constants::{AZURE_SAS_VERSION, UPLOAD_URL_EXPIRY_SECS, VIEW_URL_EXPIRY_SECS};

/// RFC 3986 unreserved characters stay as-is
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage account is not configured")]
    NotConfigured,
    #[error("invalid storage account key: {0}")]
    InvalidKey(#[from] base64::DecodeError),
    #[error("invalid blob path: {0}")]
    InvalidPath(String),
    #[error("signing failed: {0}")]
    Signing(#[from] hmac::digest::InvalidLength),
}

pub trait StorageUrls: Send + Sync {
    /// Short-lived URL a client can PUT the blob to
    fn upload_url(&self, container: &str, path: &str) -> Result<String, StorageError>;

    /// Longer-lived read-only URL
    fn view_url(&self, container: &str, path: &str) -> Result<String, StorageError>;
}

/// Signed URLs are a convenience: failures are logged and reported as `None`
/// so the surrounding request still succeeds.
pub fn lenient(result: Result<String, StorageError>, purpose: &str) -> Option<String> {
    match result {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(error = %e, purpose, "signed URL generation failed");
            None
        }
    }
}

/// Used when no storage account is configured; every URL request fails and
/// callers fall back to `null`.
pub struct UnconfiguredStorage;

impl StorageUrls for UnconfiguredStorage {
    fn upload_url(&self, _container: &str, _path: &str) -> Result<String, StorageError> {
        Err(StorageError::NotConfigured)
    }

    fn view_url(&self, _container: &str, _path: &str) -> Result<String, StorageError> {
        Err(StorageError::NotConfigured)
    }
}

pub struct AzureSasSigner {
    account_name: String,
    account_key: Vec<u8>,
}

impl AzureSasSigner {
    pub fn new(account_name: &str, account_key_b64: &str) -> Result<Self, StorageError> {
        let account_key = base64::engine::general_purpose::STANDARD.decode(account_key_b64)?;
        Ok(Self {
            account_name: account_name.to_string(),
            account_key,
        })
    }

    /// Build a blob SAS URL granting `permissions` until `expiry`
    pub fn sign(
        &self,
        container: &str,
        path: &str,
        permissions: &str,
        expiry: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        let path = path.trim_start_matches('/');
        if container.is_empty() || path.is_empty() {
            return Err(StorageError::InvalidPath(format!("{}/{}", container, path)));
        }

        let expiry = expiry.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let canonical_resource = format!("/blob/{}/{}/{}", self.account_name, container, path);

        // Field order is fixed by the service version; empty lines are unused fields
        let string_to_sign = [
            permissions,
            "",
            &expiry,
            &canonical_resource,
            "",
            "",
            "https",
            AZURE_SAS_VERSION,
            "b",
            "",
            "",
            "",
            "",
            "",
            "",
            "",
        ]
        .join("\n");

        let mut mac = Hmac::<Sha256>::new_from_slice(&self.account_key)?;
        mac.update(string_to_sign.as_bytes());
        let signature =
            base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

        Ok(format!(
            "https://{}.blob.core.windows.net/{}/{}?sp={}&se={}&spr=https&sv={}&sr=b&sig={}",
            self.account_name,
            encode_path(container),
            encode_path(path),
            percent(permissions),
            percent(&expiry),
            AZURE_SAS_VERSION,
            percent(&signature)
        ))
    }
}

impl StorageUrls for AzureSasSigner {
    fn upload_url(&self, container: &str, path: &str) -> Result<String, StorageError> {
        let expiry = Utc::now() + Duration::seconds(UPLOAD_URL_EXPIRY_SECS);
        self.sign(container, path, "cw", expiry)
    }

    fn view_url(&self, container: &str, path: &str) -> Result<String, StorageError> {
        let expiry = Utc::now() + Duration::seconds(VIEW_URL_EXPIRY_SECS);
        self.sign(container, path, "r", expiry)
    }
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn percent(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}
