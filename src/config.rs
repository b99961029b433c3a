//! Configuration management for the API server
//!
//! Loads configuration from environment variables (a `.env` file is read
//! first when present).

use anyhow::{Context, Result, bail};

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP port to bind on 0.0.0.0
    pub port: u16,
    pub database: DatabaseConfig,
    /// HS256 secret for session tokens
    pub jwt_secret: String,
    /// Base URL share links point at
    pub frontend_url: String,
    pub firebase: FirebaseConfig,
    /// `None` disables signed URLs; upload flows then return null URLs
    pub azure: Option<AzureConfig>,
    pub containers: ContainerNames,
    /// Fallback view limit for videos without their own
    pub default_video_view_limit: Option<i64>,
    /// Six-field cron expression for the privacy sweep
    pub privacy_sweep_cron: String,
    /// Empty means any origin
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub project_id: String,
    pub api_key: String,
    /// OAuth bearer token for the Identity Toolkit and Firestore REST APIs
    pub access_token: String,
}

#[derive(Debug, Clone)]
pub struct AzureConfig {
    pub account_name: String,
    /// Base64 account key
    pub account_key: String,
}

#[derive(Debug, Clone)]
pub struct ContainerNames {
    pub video: String,
    pub thumbnail: String,
    pub webcam: String,
}

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_PRIVACY_SWEEP_CRON: &str = "0 0 * * * *";

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            var(key)
                .filter(|v| !v.is_empty())
                .with_context(|| format!("{} environment variable not set", key))
        };
        let parsed = |key: &str| -> Result<Option<i64>> {
            var(key)
                .filter(|v| !v.is_empty())
                .map(|v| v.parse().with_context(|| format!("{} must be an integer", key)))
                .transpose()
        };

        let port = match parsed("PORT")? {
            Some(p) => u16::try_from(p).context("PORT out of range")?,
            None => DEFAULT_PORT,
        };

        let database = DatabaseConfig {
            url: required("DATABASE_URL")?,
            max_connections: match parsed("DATABASE_MAX_CONNECTIONS")? {
                Some(n) => u32::try_from(n).context("DATABASE_MAX_CONNECTIONS out of range")?,
                None => DEFAULT_MAX_CONNECTIONS,
            },
        };

        let firebase = FirebaseConfig {
            project_id: required("FIREBASE_PROJECT_ID")?,
            api_key: var("FIREBASE_API_KEY").unwrap_or_default(),
            access_token: required("FIREBASE_ACCESS_TOKEN")?,
        };

        let azure = match (
            var("AZURE_STORAGE_ACCOUNT_NAME").filter(|v| !v.is_empty()),
            var("AZURE_STORAGE_ACCOUNT_KEY").filter(|v| !v.is_empty()),
        ) {
            (Some(account_name), Some(account_key)) => Some(AzureConfig {
                account_name,
                account_key,
            }),
            (None, None) => None,
            _ => bail!("AZURE_STORAGE_ACCOUNT_NAME and AZURE_STORAGE_ACCOUNT_KEY must be set together"),
        };

        let container = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());
        let containers = ContainerNames {
            video: container("AZURE_VIDEO_CONTAINER_NAME", "videos"),
            thumbnail: container("AZURE_THUMBNAIL_CONTAINER_NAME", "thumbnails"),
            webcam: container("AZURE_WEBCAM_CONTAINER_NAME", "webcam-recordings"),
        };

        let default_video_view_limit = parsed("DEFAULT_VIDEO_VIEW_LIMIT")?;
        if default_video_view_limit.is_some_and(|limit| limit <= 0) {
            bail!("DEFAULT_VIDEO_VIEW_LIMIT must be positive");
        }

        Ok(Config {
            port,
            database,
            jwt_secret: required("JWT_SECRET")?,
            frontend_url: var("FRONTEND_URL")
                .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            firebase,
            azure,
            containers,
            default_video_view_limit,
            privacy_sweep_cron: var("PRIVACY_SWEEP_CRON")
                .unwrap_or_else(|| DEFAULT_PRIVACY_SWEEP_CRON.to_string()),
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}
