//! Configuration for the mail bot
//!
//! OAuth client credentials are looked up in order of priority:
//! 1. Compile-time `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`
//! 2. `credentials.json` downloaded from the Google Cloud Console
//! 3. Runtime `GMAIL_CLIENT_ID` / `GMAIL_CLIENT_SECRET`
//!
//! Behavioural settings live in `settings.json`; every field has a default so
//! the file is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Credentials filename in the config directory
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Settings filename in the config directory
pub const SETTINGS_FILE: &str = "settings.json";

/// OAuth credentials for Gmail API access
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console credential file: an `installed` (desktop) or `web`
/// section
#[derive(Deserialize)]
struct CredentialFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
}

#[derive(Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
}

impl GmailCredentials {
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            log::debug!("Using compile-time OAuth credentials");
            return Ok(creds);
        }

        if let Some(path) = Self::default_credentials_path().filter(|p| p.exists()) {
            log::debug!("Loading OAuth credentials from {}", path.display());
            return Self::from_file(&path);
        }

        Self::from_env().with_context(|| {
            format!(
                "No Gmail credentials found; place {CREDENTIALS_FILE} in the config directory \
                 or set GMAIL_CLIENT_ID and GMAIL_CLIENT_SECRET"
            )
        })
    }

    /// Credentials embedded at build time.
    /// Build with: GOOGLE_CLIENT_ID=xxx GOOGLE_CLIENT_SECRET=yyy cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        Self::non_empty(option_env!("GOOGLE_CLIENT_ID")?, option_env!("GOOGLE_CLIENT_SECRET")?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let file: CredentialFile = config::load_json_file(path)?;
        Self::from_section(file)
    }

    /// Parse credentials from a Google Cloud Console JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let file: CredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_section(file)
    }

    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("GMAIL_CLIENT_ID")
            .context("GMAIL_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GMAIL_CLIENT_SECRET")
            .context("GMAIL_CLIENT_SECRET environment variable not set")?;
        Self::non_empty(&client_id, &client_secret)
            .context("GMAIL_CLIENT_ID and GMAIL_CLIENT_SECRET must not be empty")
    }

    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }

    /// Whether any credential source is present
    pub fn is_available() -> bool {
        Self::from_compile_time().is_some()
            || config::config_exists(CREDENTIALS_FILE)
            || Self::from_env().is_ok()
    }

    fn from_section(file: CredentialFile) -> Result<Self> {
        let section = file
            .installed
            .or(file.web)
            .context("Credentials file missing 'installed' or 'web' section")?;
        Self::non_empty(&section.client_id, &section.client_secret)
            .context("Credentials file has an empty client_id or client_secret")
    }

    fn non_empty(client_id: &str, client_secret: &str) -> Option<Self> {
        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }
        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }
}

/// Runtime behaviour of the mailbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    /// Gmail user; `me` is the authenticated account
    pub user_id: String,
    /// Listing limit when the caller does not give one
    pub default_max_results: usize,
    /// Where downloaded attachments are written
    pub attachment_dir: PathBuf,
    /// Window used by "recent messages from sender"
    pub recent_days: u32,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            user_id: "me".to_string(),
            default_max_results: 100,
            attachment_dir: PathBuf::from("attachments"),
            recent_days: 30,
        }
    }
}

impl MailSettings {
    /// Load `settings.json` from the config directory, or defaults if absent
    pub fn load() -> Result<Self> {
        config::load_json_or_default(SETTINGS_FILE)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    pub fn save(&self) -> Result<PathBuf> {
        config::save_json(SETTINGS_FILE, self)
    }
}
