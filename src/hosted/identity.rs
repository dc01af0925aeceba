// HostedIdentity: IdentityProvider over the hosted auth API.
//
// The access token is kept in client prefs between runs and handed to the
// shared HostedClient so row requests run as the signed-in user. An expired
// or revoked token reads as "no session".

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::client::HostedClient;
use crate::identity::{AuthEvent, IdentityProvider, Session};
use crate::prefs::{Preferences, StoredSession};

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Reply from `token` and `signup`. Sign-up without an access token means
/// the account is waiting for email confirmation.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<AuthUser>,
}

pub struct HostedIdentity {
    client: Arc<HostedClient>,
    prefs: Arc<Preferences>,
    events: broadcast::Sender<AuthEvent>,
}

impl HostedIdentity {
    pub fn new(client: Arc<HostedClient>, prefs: Arc<Preferences>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            client,
            prefs,
            events,
        }
    }

    fn start_session(&self, response: TokenResponse) -> Result<Session> {
        let token = response
            .access_token
            .context("Account created. Confirm your email, then run `yallwall login`.")?;
        let user = response.user.context("Auth response did not include a user")?;

        self.prefs.save_session(&StoredSession {
            user_id: user.id.clone(),
            access_token: Some(token.clone()),
        })?;
        self.client.set_access_token(Some(token.clone()));

        let session = Session {
            user_id: user.id,
            email: user.email,
            access_token: Some(token),
        };
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    fn forget_session(&self) -> Result<()> {
        self.client.set_access_token(None);
        self.prefs.clear_session()
    }
}

#[async_trait]
impl IdentityProvider for HostedIdentity {
    async fn current_session(&self) -> Result<Option<Session>> {
        let Some(stored) = self.prefs.session()? else {
            return Ok(None);
        };
        let Some(token) = stored.access_token else {
            return Ok(None);
        };

        self.client.set_access_token(Some(token.clone()));
        match self.client.auth_get::<AuthUser>("user").await? {
            Some(user) => Ok(Some(Session {
                user_id: user.id,
                email: user.email,
                access_token: Some(token),
            })),
            None => {
                info!("Stored session expired, signing out");
                self.forget_session()?;
                Ok(None)
            }
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        let response: TokenResponse = self
            .client
            .auth_post("signup", &json!({ "email": email.trim(), "password": password }))
            .await
            .context("Sign-up failed")?;
        let session = self.start_session(response)?;
        info!(user_id = %session.user_id, "Signed up");
        Ok(session)
    }

    async fn sign_in_password(&self, email: &str, password: &str) -> Result<Session> {
        let response: TokenResponse = self
            .client
            .auth_post(
                "token?grant_type=password",
                &json!({ "email": email.trim(), "password": password }),
            )
            .await
            .context("Invalid email or password")?;
        let session = self.start_session(response)?;
        info!(user_id = %session.user_id, "Signed in");
        Ok(session)
    }

    fn oauth_authorize_url(&self, provider: &str, redirect_to: &str) -> Result<String> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/auth/v1/authorize", self.client.base_url()),
            &[("provider", provider), ("redirect_to", redirect_to)],
        )
        .context("Failed to build OAuth URL")?;
        Ok(url.into())
    }

    async fn sign_out(&self) -> Result<()> {
        if self.client.access_token().is_some() {
            if let Err(e) = self.client.auth_post_empty("logout").await {
                warn!(error = %e, "Remote sign-out failed, clearing local session anyway");
            }
        }
        self.forget_session()?;
        let _ = self.events.send(AuthEvent::SignedOut);
        info!("Signed out");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> HostedIdentity {
        HostedIdentity::new(
            Arc::new(HostedClient::new("https://example.test", "anon").unwrap()),
            Arc::new(Preferences::in_memory().unwrap()),
        )
    }

    #[test]
    fn test_oauth_url_encodes_redirect() {
        let url = identity()
            .oauth_authorize_url("google", "http://localhost:3000/auth/callback")
            .unwrap();
        assert_eq!(
            url,
            "https://example.test/auth/v1/authorize?provider=google&redirect_to=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fcallback"
        );
    }

    #[test]
    fn test_sign_up_pending_confirmation_is_an_error() {
        let id = identity();
        let response: TokenResponse =
            serde_json::from_str(r#"{"id": "u1", "email": "a@b.c"}"#).unwrap();
        assert!(id.start_session(response).is_err());
        assert!(id.prefs.session().unwrap().is_none());
    }

    #[test]
    fn test_token_response_starts_session() {
        let id = identity();
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token": "tok", "user": {"id": "u1", "email": "a@b.c"}}"#,
        )
        .unwrap();
        let session = id.start_session(response).unwrap();
        assert_eq!(session.user_id, "u1");
        assert_eq!(id.client.access_token().as_deref(), Some("tok"));
        assert_eq!(
            id.prefs.session().unwrap().unwrap().access_token.as_deref(),
            Some("tok")
        );
    }

    #[tokio::test]
    async fn test_no_stored_session_makes_no_request() {
        assert!(identity().current_session().await.unwrap().is_none());
    }
}
