//! # carelink-guard
//!
//! Role-gated route guard for CareLink sessions.
//! The guard reads the access token from a session's migration coordinator
//! and asks the backend for the user's profile or admin status.

pub mod guard;
pub mod profile;

pub use guard::{DenyReason, GuardHandle, GuardPolicy, GuardState, RouteGuard};
pub use profile::{AdminStatus, HttpProfileClient, Profile, ProfileService};
