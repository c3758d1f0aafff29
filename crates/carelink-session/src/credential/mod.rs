//! Token pair management across cookie and local stores

mod manager;
mod types;

pub use manager::{CredentialStores, SessionCredentialManager};
pub use types::*;
