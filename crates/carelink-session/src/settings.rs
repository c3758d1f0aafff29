//! Session settings management
//!
//! Stores non-sensitive configuration in a plain JSON file next to the
//! credential stores. Missing fields fall back to defaults.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

use crate::credential::TokenKeys;
use crate::error::{Result, SessionError};
use crate::storage::{SameSite, StoreOptions, MAX_COOKIE_AGE_SECS};

const SETTINGS_FILE: &str = "settings.json";

/// Attributes of the refresh token cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CookieSettings {
    pub path: String,
    pub same_site: SameSite,
    /// Cookie lifetime; between 1 and [`MAX_COOKIE_AGE_SECS`]
    pub max_age_secs: i64,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            same_site: SameSite::Strict,
            max_age_secs: 7 * 24 * 60 * 60,
        }
    }
}

impl CookieSettings {
    /// Options for writing the refresh cookie; `Secure` follows the transport
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions::default()
            .path(self.path.clone())
            .same_site(self.same_site)
            .max_age(self.max_age_secs)
    }
}

/// Where the backend collaborator lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendSettings {
    pub base_url: String,
    /// Returns `{"role": ...}` for the bearer token
    pub profile_path: String,
    /// Returns `{"is_superuser": ...}` for the bearer token
    pub admin_check_path: String,
    /// HTTP client timeout; `None` waits indefinitely
    pub request_timeout_secs: Option<u64>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            profile_path: "/account/profile/".to_string(),
            admin_check_path: "/account/is_admin/".to_string(),
            request_timeout_secs: Some(30),
        }
    }
}

impl BackendSettings {
    /// Resolve a path against the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| SessionError::Config(format!("invalid backend URL: {}", e)))?;
        base.join(path)
            .map_err(|e| SessionError::Config(format!("invalid endpoint {}: {}", path, e)))
    }

    pub fn profile_url(&self) -> Result<Url> {
        self.endpoint(&self.profile_path)
    }

    pub fn admin_check_url(&self) -> Result<Url> {
        self.endpoint(&self.admin_check_path)
    }
}

/// Session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Settings file version
    pub version: u32,
    /// Namespace for storage keys (`<prefix>_access`, `<prefix>_refresh`)
    pub key_prefix: String,
    /// Store new refresh tokens in the cookie jar instead of the local store
    ///
    /// On by default, so a fresh session writes its refresh token to the
    /// cookie jar and reports `cookie` as its auth method. Turn it off to get
    /// the legacy behavior where `set_tokens` leaves the session on
    /// `local-store` until a cookie arrives from the backend.
    pub cookie_auth_enabled: bool,
    /// Origin the application is served from; `https` means secure transport
    pub app_origin: String,
    pub cookie: CookieSettings,
    /// Directory for the durable stores; platform data dir when unset
    pub storage_dir: Option<PathBuf>,
    /// Keep the access token on disk instead of in memory
    pub persist_access_token: bool,
    pub backend: BackendSettings,
    /// Where a denied route guard redirects
    pub login_redirect: String,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self {
            version: 1,
            key_prefix: "carelink".to_string(),
            cookie_auth_enabled: true,
            app_origin: "http://localhost:3000".to_string(),
            cookie: CookieSettings::default(),
            storage_dir: None,
            persist_access_token: false,
            backend: BackendSettings::default(),
            login_redirect: "/login".to_string(),
        }
    }

    /// Whether the application origin uses an encrypted transport
    pub fn secure_transport(&self) -> bool {
        Url::parse(&self.app_origin)
            .map(|url| url.scheme() == "https")
            .unwrap_or(false)
    }

    pub fn token_keys(&self) -> TokenKeys {
        TokenKeys::with_prefix(&self.key_prefix)
    }

    /// Configured storage directory, or the platform data directory
    pub fn resolve_storage_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.storage_dir {
            return Ok(dir.clone());
        }
        default_storage_dir()
    }

    /// Reject settings that would produce unusable keys or URLs
    pub fn validate(&self) -> Result<()> {
        if self.key_prefix.trim().is_empty() {
            return Err(SessionError::Config("keyPrefix must not be empty".to_string()));
        }
        Url::parse(&self.app_origin)
            .map_err(|e| SessionError::Config(format!("invalid appOrigin: {}", e)))?;
        self.backend.profile_url()?;
        self.backend.admin_check_url()?;
        if !(1..=MAX_COOKIE_AGE_SECS).contains(&self.cookie.max_age_secs) {
            return Err(SessionError::Config(format!(
                "cookie.maxAgeSecs must be between 1 and {}",
                MAX_COOKIE_AGE_SECS
            )));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

/// Platform data directory for CareLink session storage
pub fn default_storage_dir() -> Result<PathBuf> {
    ProjectDirs::from("org", "carelink", "carelink-session")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| SessionError::Config("Could not determine data directory".to_string()))
}

/// Settings manager
pub struct SettingsManager {
    settings_file: PathBuf,
    settings: Settings,
}

impl SettingsManager {
    /// Create a new settings manager
    pub fn new(storage_dir: &Path) -> Self {
        let settings_file = storage_dir.join(SETTINGS_FILE);
        let settings = Self::load_from_file(&settings_file).unwrap_or_default();

        Self {
            settings_file,
            settings,
        }
    }

    /// Load settings from file
    fn load_from_file(path: &Path) -> Result<Settings> {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(Settings::new());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.settings_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(&self.settings)?;

        // Write atomically using temp file
        let temp_path = self.settings_file.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &self.settings_file).await?;

        debug!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    /// Get current settings
    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Get mutable settings
    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Validate, replace and save
    pub async fn update(&mut self, settings: Settings) -> Result<()> {
        settings.validate()?;
        self.settings = settings;
        self.save().await
    }

    /// Reset settings to defaults and delete settings file
    pub async fn reset(&mut self) -> Result<()> {
        self.settings = Settings::default();

        if self.settings_file.exists() {
            tokio::fs::remove_file(&self.settings_file).await?;
        }

        Ok(())
    }
}
