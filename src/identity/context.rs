// AppContext: the process-wide client state.
//
// Built once at startup and shared as Arc<AppContext> with every component
// that needs the store, the identity provider, or the signed-in viewer.
// Only sign-in, sign-out, profile edits and tips change the cached viewer,
// and only through the methods here.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{AuthEvent, IdentityProvider, Session};
use crate::db::models::{Profile, ProfileUpdate};
use crate::db::ContentStore;
use crate::error::EngagementError;
use crate::retry::{with_timeout_retry, RetryPolicy};

/// The signed-in user: their session and cached profile.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub session: Session,
    pub profile: Profile,
}

pub struct AppContext {
    store: Arc<dyn ContentStore>,
    identity: Arc<dyn IdentityProvider>,
    session_retry: RetryPolicy,
    viewer: RwLock<Option<Viewer>>,
}

impl AppContext {
    pub fn new(
        store: Arc<dyn ContentStore>,
        identity: Arc<dyn IdentityProvider>,
        session_retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            identity,
            session_retry,
            viewer: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    // A panic while holding the viewer lock leaves plain data behind, so a
    // poisoned lock is still safe to read.
    fn read_viewer(&self) -> RwLockReadGuard<'_, Option<Viewer>> {
        self.viewer.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_viewer(&self) -> RwLockWriteGuard<'_, Option<Viewer>> {
        self.viewer.write().unwrap_or_else(|e| e.into_inner())
    }

    fn set_viewer(&self, viewer: Option<Viewer>) {
        *self.write_viewer() = viewer;
    }

    /// Resolve the startup session under the session retry budget.
    ///
    /// Never fails: when the budget is spent or the provider errors, the
    /// context is left signed out and the app continues as a guest.
    pub async fn bootstrap(&self) -> Option<Profile> {
        let resolved =
            with_timeout_retry("session check", &self.session_retry, || self.resolve_session())
                .await;

        match resolved {
            Ok(Some(viewer)) => {
                info!(user_id = %viewer.profile.id, "Session restored");
                let profile = viewer.profile.clone();
                self.set_viewer(Some(viewer));
                Some(profile)
            }
            Ok(None) => {
                debug!("No session, continuing as guest");
                self.set_viewer(None);
                None
            }
            Err(e) => {
                warn!(error = %e, "Session check failed, continuing as guest");
                self.set_viewer(None);
                None
            }
        }
    }

    async fn resolve_session(&self) -> Result<Option<Viewer>> {
        match self.identity.current_session().await? {
            Some(session) => {
                let profile = self.load_or_create_profile(&session).await?;
                Ok(Some(Viewer { session, profile }))
            }
            None => Ok(None),
        }
    }

    /// Fetch the profile for a session, creating it on first sign-in.
    async fn load_or_create_profile(&self, session: &Session) -> Result<Profile> {
        if let Some(profile) = self.store.get_profile(&session.user_id).await? {
            return Ok(profile);
        }
        let profile = Profile::first_sign_in(&session.user_id, session.email.as_deref(), Utc::now());
        self.store.upsert_profile(&profile).await?;
        info!(user_id = %profile.id, "Created profile on first sign-in");
        Ok(profile)
    }

    async fn adopt_session(&self, session: Session) -> Result<Profile> {
        let profile = self.load_or_create_profile(&session).await?;
        self.set_viewer(Some(Viewer {
            session,
            profile: profile.clone(),
        }));
        Ok(profile)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Profile> {
        let session = self.identity.sign_up(email, password).await?;
        self.adopt_session(session).await
    }

    pub async fn sign_in_password(&self, email: &str, password: &str) -> Result<Profile> {
        let session = self.identity.sign_in_password(email, password).await?;
        self.adopt_session(session).await
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.identity.sign_out().await?;
        self.set_viewer(None);
        Ok(())
    }

    /// Apply an auth event from the provider's change stream.
    pub async fn handle_auth_event(&self, event: AuthEvent) -> Result<()> {
        match event {
            AuthEvent::SignedIn(session) => {
                let already = self
                    .session()
                    .is_some_and(|current| current.user_id == session.user_id);
                if !already {
                    self.adopt_session(session).await?;
                }
            }
            AuthEvent::SignedOut => self.set_viewer(None),
        }
        Ok(())
    }

    /// Follow the provider's auth events for the lifetime of the process.
    pub fn spawn_auth_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let ctx = Arc::clone(self);
        let mut rx = ctx.identity.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Err(e) = ctx.handle_auth_event(event).await {
                            warn!(error = %e, "Failed to apply auth event");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth events lagged, re-checking session");
                        ctx.bootstrap().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// The signed-in user's cached profile.
    pub fn viewer(&self) -> Option<Profile> {
        self.read_viewer().as_ref().map(|v| v.profile.clone())
    }

    pub fn session(&self) -> Option<Session> {
        self.read_viewer().as_ref().map(|v| v.session.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_viewer().is_some()
    }

    /// The viewer's profile, or `NotAuthenticated`.
    pub fn require_viewer(&self) -> Result<Profile, EngagementError> {
        self.viewer().ok_or(EngagementError::NotAuthenticated)
    }

    /// Re-read the viewer's profile from the store.
    pub async fn refresh_profile(&self) -> Result<Option<Profile>> {
        let Some(session) = self.session() else {
            return Ok(None);
        };
        let fresh = self.store.get_profile(&session.user_id).await?;
        if let Some(profile) = &fresh {
            self.replace_profile(profile.clone());
        }
        Ok(fresh)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, EngagementError> {
        let viewer = self.require_viewer()?;
        if update.is_empty() {
            return Ok(viewer);
        }
        let updated = self
            .store
            .update_profile(&viewer.id, update)
            .await
            .map_err(|e| EngagementError::write("update profile", e))?
            .ok_or_else(|| EngagementError::RemoteWriteFailure {
                operation: "update profile",
                message: "profile not found".to_string(),
            })?;
        self.replace_profile(updated.clone());
        Ok(updated)
    }

    fn replace_profile(&self, profile: Profile) {
        let mut guard = self.write_viewer();
        if let Some(viewer) = guard.as_mut() {
            if viewer.profile.id == profile.id {
                viewer.profile = profile;
            }
        }
    }

    /// Record the viewer's new balance after a completed tip.
    pub(crate) fn set_cached_balance(&self, user_id: &str, balance: u32) {
        let mut guard = self.write_viewer();
        if let Some(viewer) = guard.as_mut() {
            if viewer.profile.id == user_id {
                viewer.profile.balance = balance;
            }
        }
    }
}
