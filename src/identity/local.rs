// LocalIdentity: password accounts stored in the local database.
//
// Used in demo mode and by tests. Passwords are stored as a hex SHA-256
// digest of a random per-account salt followed by the password. The
// signed-in user is remembered in client prefs between runs.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use tracing::info;

use super::{AuthEvent, IdentityProvider, Session};
use crate::db::queries::AccountRow;
use crate::db::SqliteStore;
use crate::prefs::{Preferences, StoredSession};

const MIN_PASSWORD_LEN: usize = 6;

pub struct LocalIdentity {
    store: Arc<SqliteStore>,
    prefs: Arc<Preferences>,
    events: broadcast::Sender<AuthEvent>,
}

impl LocalIdentity {
    pub fn new(store: Arc<SqliteStore>, prefs: Arc<Preferences>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            store,
            prefs,
            events,
        }
    }

    fn start_session(&self, account: &AccountRow) -> Result<Session> {
        self.prefs.save_session(&StoredSession {
            user_id: account.user_id.clone(),
            access_token: None,
        })?;
        let session = Session {
            user_id: account.user_id.clone(),
            email: Some(account.email.clone()),
            access_token: None,
        };
        // No subscribers is fine
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two digests without short-circuiting on the first mismatch.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn current_session(&self) -> Result<Option<Session>> {
        let Some(stored) = self.prefs.session()? else {
            return Ok(None);
        };
        let account = self.store.get_account_by_user_id(&stored.user_id).await?;
        Ok(account.map(|a| Session {
            user_id: a.user_id,
            email: Some(a.email),
            access_token: None,
        }))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            anyhow::bail!("A valid email address is required");
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            anyhow::bail!("Password must be at least {MIN_PASSWORD_LEN} characters");
        }

        let salt = hex::encode(rand::random::<[u8; 16]>());
        let account = AccountRow {
            email: email.clone(),
            user_id: uuid::Uuid::new_v4().to_string(),
            password_digest: password_digest(&salt, password),
            password_salt: salt,
        };
        self.store
            .insert_account(&account)
            .await
            .with_context(|| format!("Could not create account for {email}"))?;

        info!(user_id = %account.user_id, "Local account created");
        self.start_session(&account)
    }

    async fn sign_in_password(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email);
        let account = self
            .store
            .get_account_by_email(&email)
            .await?
            .filter(|a| {
                constant_time_eq(&password_digest(&a.password_salt, password), &a.password_digest)
            })
            .context("Invalid email or password")?;

        info!(user_id = %account.user_id, "Signed in");
        self.start_session(&account)
    }

    fn oauth_authorize_url(&self, provider: &str, _redirect_to: &str) -> Result<String> {
        anyhow::bail!(
            "OAuth sign-in with {provider} needs the hosted backend. \
             Set YALLWALL_API_URL or use `yallwall login` with a password."
        )
    }

    async fn sign_out(&self) -> Result<()> {
        self.prefs.clear_session()?;
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

    fn identity() -> LocalIdentity {
        LocalIdentity::new(
            Arc::new(SqliteStore::in_memory().unwrap()),
            Arc::new(Preferences::in_memory().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_sign_up_then_current_session() {
        let id = identity();
        assert!(id.current_session().await.unwrap().is_none());
        let session = id.sign_up("Sam@Example.com ", "hunter22").await.unwrap();
        assert_eq!(session.email.as_deref(), Some("sam@example.com"));
        let current = id.current_session().await.unwrap().unwrap();
        assert_eq!(current.user_id, session.user_id);
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let id = identity();
        id.sign_up("sam@example.com", "hunter22").await.unwrap();
        id.sign_out().await.unwrap();
        assert!(id.sign_in_password("sam@example.com", "nope!!").await.is_err());
        assert!(id.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_fails() {
        let id = identity();
        id.sign_up("sam@example.com", "hunter22").await.unwrap();
        assert!(id.sign_up("sam@example.com", "other-pass").await.is_err());
    }

    #[tokio::test]
    async fn test_events_emitted_on_sign_in_and_out() {
        let id = identity();
        let mut rx = id.subscribe();
        let session = id.sign_up("sam@example.com", "hunter22").await.unwrap();
        id.sign_out().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::SignedIn(session));
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::SignedOut);
    }

    #[test]
    fn test_digest_depends_on_salt() {
        assert_ne!(password_digest("a", "pw"), password_digest("b", "pw"));
    }

    #[test]
    fn test_constant_time_eq() {
        let digest = password_digest("salt", "hunter22");
        assert!(constant_time_eq(&digest, &password_digest("salt", "hunter22")));
        assert!(!constant_time_eq(&digest, &password_digest("salt", "hunter23")));
        assert!(!constant_time_eq(&digest, &digest[1..]));
    }
}
