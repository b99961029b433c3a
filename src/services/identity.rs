//! External identity store (Firebase) holding the mirrored `role` field

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::models::Role;

const HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("identity provider error: {0}")]
    Api(String),
    #[error("no identity record for {0}")]
    NotFound(String),
}

/// The provider's view of a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub external_id: String,
    pub email: Option<String>,
}

#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    /// Confirm the provider knows `external_id`
    async fn lookup(&self, external_id: &str) -> Result<IdentityRecord, IdentityError>;

    /// Overwrite the mirrored role field
    async fn update_role(&self, external_id: &str, role: Role) -> Result<(), IdentityError>;
}

/// Firebase Auth (Identity Toolkit) for lookups, Firestore `users/{uid}` for the role mirror
#[derive(Clone)]
pub struct FirebaseIdentityStore {
    project_id: String,
    api_key: String,
    access_token: String,
    http: Client,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
}

impl FirebaseIdentityStore {
    pub fn new(project_id: &str, api_key: &str, access_token: &str) -> Result<Self, IdentityError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            project_id: project_id.to_string(),
            api_key: api_key.to_string(),
            access_token: access_token.to_string(),
            http,
        })
    }

    fn lookup_url(&self) -> String {
        format!(
            "https://identitytoolkit.googleapis.com/v1/projects/{}/accounts:lookup?key={}",
            percent_encode(&self.project_id),
            percent_encode(&self.api_key)
        )
    }

    fn user_document_url(&self, external_id: &str) -> String {
        // updateMask limits the patch to `role`; the exists precondition keeps
        // Firestore from creating a document for an unknown uid
        format!(
            "https://firestore.googleapis.com/v1/projects/{}/databases/(default)/documents/users/{}?updateMask.fieldPaths=role&currentDocument.exists=true",
            percent_encode(&self.project_id),
            percent_encode(external_id)
        )
    }
}

#[async_trait::async_trait]
impl IdentityStore for FirebaseIdentityStore {
    async fn lookup(&self, external_id: &str) -> Result<IdentityRecord, IdentityError> {
        let resp = self
            .http
            .post(self.lookup_url())
            .bearer_auth(&self.access_token)
            .json(&json!({ "localId": [external_id] }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(IdentityError::Api(text));
        }

        let body: LookupResponse = resp.json().await?;
        body.users
            .into_iter()
            .find(|u| u.local_id == external_id)
            .map(|u| IdentityRecord {
                external_id: u.local_id,
                email: u.email,
            })
            .ok_or_else(|| IdentityError::NotFound(external_id.to_string()))
    }

    async fn update_role(&self, external_id: &str, role: Role) -> Result<(), IdentityError> {
        let resp = self
            .http
            .patch(self.user_document_url(external_id))
            .bearer_auth(&self.access_token)
            .json(&json!({ "fields": { "role": { "stringValue": role.as_str() } } }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(IdentityError::Api(text));
        }

        Ok(())
    }
}

fn percent_encode(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC).to_string()
}
