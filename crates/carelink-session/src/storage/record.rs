//! Storage records and their cookie attributes

use chrono::{DateTime, NaiveDateTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{Result, SessionError};

/// Longest lifetime a cookie can have (400 days, as browsers cap it)
pub const MAX_COOKIE_AGE_SECS: i64 = 400 * 24 * 60 * 60;

/// Netscape-style `Expires` date still sent by some servers
const HYPHENATED_COOKIE_DATE: &str = "%a, %d-%b-%Y %H:%M:%S GMT";

/// Cross-site sending policy of a cookie
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    #[default]
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        };
        f.write_str(s)
    }
}

impl FromStr for SameSite {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lax" => Ok(Self::Lax),
            "none" => Ok(Self::None),
            other => Err(SessionError::InvalidCookie(format!(
                "unknown SameSite value: {}",
                other
            ))),
        }
    }
}

/// Options accepted by [`super::CredentialStore::set`]
///
/// Stores without attributes (the local store) ignore everything here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreOptions {
    pub path: String,
    /// `None` means "secure iff the transport is encrypted"
    pub secure: Option<bool>,
    pub same_site: SameSite,
    /// `None` keeps the record for the session only
    pub max_age_secs: Option<i64>,
    /// Advisory only when set from client code, see [`StorageRecord::http_only`]
    pub http_only: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            secure: None,
            same_site: SameSite::Strict,
            max_age_secs: None,
            http_only: false,
        }
    }
}

impl StoreOptions {
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    pub fn max_age(mut self, secs: i64) -> Self {
        self.max_age_secs = Some(secs);
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }
}

/// A named value plus cookie attributes
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageRecord {
    pub name: String,
    pub value: String,
    pub path: String,
    pub secure: bool,
    /// Recorded but not enforced. Client code cannot create a real HttpOnly
    /// cookie; only a `Set-Cookie` response header from the backend can.
    pub http_only: bool,
    pub same_site: SameSite,
    /// Absolute expiry; `None` is a session record
    pub expires_at: Option<DateTime<Utc>>,
}

impl StorageRecord {
    /// Build a record from set options
    pub fn from_options(
        name: &str,
        value: &str,
        options: &StoreOptions,
        secure_transport: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            path: options.path.clone(),
            secure: options.secure.unwrap_or(secure_transport),
            http_only: options.http_only,
            same_site: options.same_site,
            expires_at: options.max_age_secs.map(|secs| expiry_after(now, secs)),
        }
    }

    /// An already-expired record that replaces `name` on removal
    pub fn expired(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            value: String::new(),
            path: path.to_string(),
            secure: false,
            http_only: false,
            same_site: SameSite::Strict,
            expires_at: Some(DateTime::<Utc>::UNIX_EPOCH),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    /// Parse a `Set-Cookie` header value
    ///
    /// Follows browser defaults for missing attributes: path `/`, SameSite
    /// `Lax`, session lifetime. `Max-Age` takes precedence over `Expires`,
    /// and either is capped at [`MAX_COOKIE_AGE_SECS`]. Unrecognised or
    /// malformed attributes (including `Domain`) are skipped; only a missing
    /// name=value pair rejects the cookie.
    pub fn parse_set_cookie(header: &str, now: DateTime<Utc>) -> Result<Self> {
        let mut parts = header.split(';');

        let pair = parts.next().unwrap_or_default();
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| SessionError::InvalidCookie("missing name=value pair".to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::InvalidCookie("empty cookie name".to_string()));
        }

        let mut record = Self {
            name: name.to_string(),
            value: value.trim().trim_matches('"').to_string(),
            path: "/".to_string(),
            secure: false,
            http_only: false,
            same_site: SameSite::Lax,
            expires_at: None,
        };
        let mut max_age: Option<i64> = None;

        for attribute in parts {
            let (key, val) = match attribute.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (attribute.trim(), ""),
            };

            match key.to_ascii_lowercase().as_str() {
                "path" if !val.is_empty() => record.path = val.to_string(),
                "secure" => record.secure = true,
                "httponly" => record.http_only = true,
                "samesite" => match val.parse() {
                    Ok(same_site) => record.same_site = same_site,
                    Err(e) => debug!("Skipping SameSite on {}: {}", record.name, e),
                },
                "max-age" => match val.parse::<i64>() {
                    Ok(secs) => max_age = Some(secs),
                    Err(_) => debug!("Skipping invalid Max-Age on {}: {}", record.name, val),
                },
                "expires" => match parse_cookie_date(val) {
                    Some(expires) => {
                        let cap = expiry_after(now, MAX_COOKIE_AGE_SECS);
                        record.expires_at = Some(expires.min(cap));
                    }
                    None => debug!("Skipping invalid Expires on {}: {}", record.name, val),
                },
                _ => {}
            }
        }

        if let Some(secs) = max_age {
            record.expires_at = Some(expiry_after(now, secs));
        }

        Ok(record)
    }
}

impl fmt::Debug for StorageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageRecord")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("http_only", &self.http_only)
            .field("same_site", &self.same_site)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A non-positive max age expires the record immediately; larger ages are
/// capped at [`MAX_COOKIE_AGE_SECS`]
fn expiry_after(now: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
    if secs <= 0 {
        return DateTime::<Utc>::UNIX_EPOCH;
    }

    TimeDelta::try_seconds(secs.min(MAX_COOKIE_AGE_SECS))
        .and_then(|age| now.checked_add_signed(age))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn parse_cookie_date(val: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(val) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(val, HYPHENATED_COOKIE_DATE)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
