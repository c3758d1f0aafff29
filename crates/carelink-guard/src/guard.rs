//! Route guard
//!
//! A guard moves through `Unknown -> Checking -> Authorized | Denied` once
//! per mount. It never grants access while a check is pending, and a missing
//! access token is denied without contacting the backend.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use carelink_session::{MigrationCoordinator, SessionError};

use crate::profile::ProfileService;

/// Why a guard denied access
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenyReason {
    MissingToken,
    RoleNotAllowed { role: String },
    NotSuperuser,
    NonOkResponse { status: u16 },
    NetworkFailure { message: String },
    InvalidResponse { message: String },
}

impl From<SessionError> for DenyReason {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::MissingCredential => Self::MissingToken,
            SessionError::NonOkResponse(status) => Self::NonOkResponse { status },
            SessionError::InvalidResponse(message) => Self::InvalidResponse { message },
            other => Self::NetworkFailure {
                message: other.to_string(),
            },
        }
    }
}

/// Guard lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GuardState {
    Unknown,
    Checking,
    Authorized,
    Denied(DenyReason),
}

impl GuardState {
    /// Authorized and Denied are final for a mount
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Authorized | Self::Denied(_))
    }
}

/// What a guard requires of the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardPolicy {
    /// Profile role must be one of these (exact match)
    Roles(Vec<String>),
    /// Admin check must report `is_superuser`
    Superuser,
}

impl GuardPolicy {
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Roles(roles.into_iter().map(Into::into).collect())
    }
}

/// Gate in front of a protected view
pub struct RouteGuard {
    coordinator: Arc<MigrationCoordinator>,
    service: Arc<dyn ProfileService>,
    policy: GuardPolicy,
    redirect_to: String,
}

impl RouteGuard {
    pub fn new(
        coordinator: Arc<MigrationCoordinator>,
        service: Arc<dyn ProfileService>,
        policy: GuardPolicy,
    ) -> Self {
        Self {
            coordinator,
            service,
            policy,
            redirect_to: "/login".to_string(),
        }
    }

    /// Where a denied guard sends the user
    pub fn with_redirect(mut self, redirect_to: impl Into<String>) -> Self {
        self.redirect_to = redirect_to.into();
        self
    }

    /// Redirect target for a state, if it calls for one
    pub fn redirect_for(&self, state: &GuardState) -> Option<&str> {
        match state {
            GuardState::Denied(_) => Some(&self.redirect_to),
            _ => None,
        }
    }

    /// Run one check to completion
    pub async fn check(&self) -> GuardState {
        let (tx, _rx) = watch::channel(GuardState::Unknown);
        self.evaluate(&tx).await
    }

    /// Start a check in the background
    ///
    /// Dropping or unmounting the handle cancels the check; a result that
    /// arrives afterwards is never published.
    pub fn mount(self: &Arc<Self>) -> GuardHandle {
        let (tx, rx) = watch::channel(GuardState::Unknown);
        let guard = self.clone();
        let task = tokio::spawn(async move {
            guard.evaluate(&tx).await;
        });

        GuardHandle { state: rx, task }
    }

    async fn evaluate(&self, tx: &watch::Sender<GuardState>) -> GuardState {
        let state = match self.coordinator.require_access_token().await {
            Err(e) => {
                debug!("No access token; skipping backend check");
                GuardState::Denied(e.into())
            }
            Ok(token) => {
                tx.send_replace(GuardState::Checking);
                self.decide(&token).await
            }
        };

        match &state {
            GuardState::Authorized => info!("Route guard authorized ({:?})", self.policy),
            GuardState::Denied(reason) => {
                warn!("Route guard denied: {:?}; redirecting to {}", reason, self.redirect_to)
            }
            _ => {}
        }

        tx.send_replace(state.clone());
        state
    }

    async fn decide(&self, token: &str) -> GuardState {
        match &self.policy {
            GuardPolicy::Roles(allowed) => match self.service.fetch_profile(token).await {
                Ok(profile) if allowed.iter().any(|r| *r == profile.role) => GuardState::Authorized,
                Ok(profile) => GuardState::Denied(DenyReason::RoleNotAllowed { role: profile.role }),
                Err(e) => GuardState::Denied(e.into()),
            },
            GuardPolicy::Superuser => match self.service.fetch_admin_status(token).await {
                Ok(status) if status.is_superuser => GuardState::Authorized,
                Ok(_) => GuardState::Denied(DenyReason::NotSuperuser),
                Err(e) => GuardState::Denied(e.into()),
            },
        }
    }
}

/// A mounted guard
pub struct GuardHandle {
    state: watch::Receiver<GuardState>,
    task: JoinHandle<()>,
}

impl GuardHandle {
    /// Current state
    pub fn state(&self) -> GuardState {
        self.state.borrow().clone()
    }

    /// Watch state changes independently of the handle
    pub fn subscribe(&self) -> watch::Receiver<GuardState> {
        self.state.clone()
    }

    /// Wait until the guard is Authorized or Denied
    ///
    /// Returns `None` if the check was cancelled first. There is no timeout:
    /// a backend that never answers leaves the guard in `Checking`.
    pub async fn wait_for_decision(&mut self) -> Option<GuardState> {
        self.state
            .wait_for(GuardState::is_terminal)
            .await
            .ok()
            .map(|state| state.clone())
    }

    /// Cancel a pending check and discard its result
    pub fn unmount(self) {}
}

impl Drop for GuardHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
