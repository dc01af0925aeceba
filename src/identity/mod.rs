// Identity layer: the IdentityProvider seam plus the process-wide viewer
// context built on top of it.
//
// Implementors: LocalIdentity (accounts in the local database, used for
// demo/offline mode and tests) and HostedIdentity (the hosted auth API,
// behind the `hosted` feature).

pub mod context;
pub mod local;

pub use context::{AppContext, Viewer};
pub use local::LocalIdentity;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// An authenticated session as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    /// Bearer token for the hosted backend. None for local sessions.
    pub access_token: Option<String>,
}

/// Auth state changes, mirroring the provider's SIGNED_IN / SIGNED_OUT events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The current session, if any. Does not prompt.
    async fn current_session(&self) -> Result<Option<Session>>;

    /// Register a new account and sign it in.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_in_password(&self, email: &str, password: &str) -> Result<Session>;

    /// URL to send the user to for an OAuth sign-in with `provider`.
    fn oauth_authorize_url(&self, provider: &str, redirect_to: &str) -> Result<String>;

    async fn sign_out(&self) -> Result<()>;

    /// Subscribe to sign-in / sign-out events.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
