// Client-side preferences: non-authoritative flags kept in the local
// database's `client_flags` table.
//
// Flags are presence/absence only. The same table also carries the
// persisted session handle so a CLI invocation can pick up where the last
// one signed in.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::db::models::Profile;
use crate::db::queries;

const ONBOARDING_COMPLETE: &str = "onboarding_complete";
const DEMO_MODE: &str = "demo_mode";
const SESSION_USER: &str = "session_user_id";
const SESSION_TOKEN: &str = "session_access_token";

/// Persisted identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub user_id: String,
    pub access_token: Option<String>,
}

pub struct Preferences {
    conn: Mutex<Connection>,
}

impl Preferences {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        crate::db::schema::create_tables(&conn)?;
        Ok(Self::new(conn))
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("preferences lock poisoned"))?;
        f(&conn)
    }

    fn flag(&self, key: &str) -> Result<bool> {
        self.with_conn(|c| Ok(queries::get_flag(c, key)?.is_some()))
    }

    fn set(&self, key: &str, on: bool) -> Result<()> {
        self.with_conn(|c| {
            if on {
                queries::set_flag(c, key, "true")
            } else {
                queries::clear_flag(c, key)
            }
        })
    }

    pub fn onboarding_complete(&self) -> Result<bool> {
        self.flag(ONBOARDING_COMPLETE)
    }

    pub fn set_onboarding_complete(&self, done: bool) -> Result<()> {
        self.set(ONBOARDING_COMPLETE, done)
    }

    pub fn demo_mode(&self) -> Result<bool> {
        self.flag(DEMO_MODE)
    }

    pub fn set_demo_mode(&self, enabled: bool) -> Result<()> {
        self.set(DEMO_MODE, enabled)
    }

    pub fn session(&self) -> Result<Option<StoredSession>> {
        self.with_conn(|c| {
            let Some(user_id) = queries::get_flag(c, SESSION_USER)? else {
                return Ok(None);
            };
            Ok(Some(StoredSession {
                user_id,
                access_token: queries::get_flag(c, SESSION_TOKEN)?,
            }))
        })
    }

    pub fn save_session(&self, session: &StoredSession) -> Result<()> {
        self.with_conn(|c| {
            queries::set_flag(c, SESSION_USER, &session.user_id)?;
            match &session.access_token {
                Some(token) => queries::set_flag(c, SESSION_TOKEN, token),
                None => queries::clear_flag(c, SESSION_TOKEN),
            }
        })
    }

    pub fn clear_session(&self) -> Result<()> {
        self.with_conn(|c| {
            queries::clear_flag(c, SESSION_USER)?;
            queries::clear_flag(c, SESSION_TOKEN)
        })
    }

    /// Onboarding is offered to profiles created within the last hour that
    /// haven't dismissed it yet.
    pub fn should_show_onboarding(&self, profile: &Profile, now: DateTime<Utc>) -> Result<bool> {
        Ok(is_new_profile(profile, now) && !self.onboarding_complete()?)
    }
}

fn is_new_profile(profile: &Profile, now: DateTime<Utc>) -> bool {
    profile.created_at > now - Duration::hours(1)
}
