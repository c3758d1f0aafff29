//! Credential type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Where the authoritative refresh token was found
///
/// Derived on every query, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    Cookie,
    LocalStore,
    None,
}

impl AuthMethod {
    /// Cookie beats local store; the order is fixed
    pub fn from_presence(in_cookie: bool, in_local: bool) -> Self {
        if in_cookie {
            Self::Cookie
        } else if in_local {
            Self::LocalStore
        } else {
            Self::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cookie => "cookie",
            Self::LocalStore => "local-store",
            Self::None => "none",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which durable store receives newly issued refresh tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageStrategy {
    /// Current scheme: refresh token in the cookie jar
    Cookie,
    /// Legacy scheme: refresh token in the local store
    LocalStore,
}

impl fmt::Display for StorageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cookie => f.write_str("cookie"),
            Self::LocalStore => f.write_str("local-store"),
        }
    }
}

/// Storage key names for the two tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenKeys {
    pub access: String,
    pub refresh: String,
}

impl TokenKeys {
    /// Namespace both keys under an application prefix
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            access: format!("{}_access", prefix),
            refresh: format!("{}_refresh", prefix),
        }
    }
}

impl Default for TokenKeys {
    fn default() -> Self {
        Self::with_prefix("carelink")
    }
}

/// Access/refresh token pair - zeroed when dropped
///
/// Tokens are opaque bearer strings; nothing here inspects or verifies them.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct CredentialPair {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

impl CredentialPair {
    pub fn new(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token,
            refresh_token,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |token: &Option<String>| token.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("CredentialPair")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

/// Token pair as returned by the backend's login endpoint
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct LoginTokens {
    pub access: String,
    pub refresh: String,
}

impl fmt::Debug for LoginTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginTokens")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .finish()
    }
}

/// Read-only diagnostic snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub has_access: bool,
    pub has_refresh: bool,
    pub auth_method: AuthMethod,
}

impl TokenInfo {
    /// Presence of either token; says nothing about validity
    pub fn is_authenticated(&self) -> bool {
        self.has_access || self.has_refresh
    }
}
