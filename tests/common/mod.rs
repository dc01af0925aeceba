// Shared fixtures for the integration tests.
//
// RecordingStore wraps the in-memory SQLite store, records the name of
// every call made through it, and can be told to fail or stall chosen
// operations. The harness signs a user in through LocalIdentity so the
// engagement layer sees a real viewer.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use yallwall::db::models::{
    expiry_for, Category, NewPost, NewReply, NewTip, Post, Profile, ProfileUpdate, Reply,
    StoreStats, TipTransaction,
};
use yallwall::db::{ChangeEvent, ContentStore, SqliteStore};
use yallwall::identity::{AppContext, LocalIdentity};
use yallwall::prefs::Preferences;
use yallwall::retry::RetryPolicy;

/// Calls that change stored state.
pub const WRITES: &[&str] = &[
    "insert_post",
    "delete_post",
    "update_like_count",
    "insert_like",
    "delete_like",
    "insert_reply",
    "delete_reply",
    "insert_tip",
    "upsert_profile",
    "update_profile",
    "set_balance",
    "increment_earned_points",
];

pub struct RecordingStore {
    inner: Arc<SqliteStore>,
    calls: Mutex<Vec<&'static str>>,
    failing: Mutex<HashSet<&'static str>>,
    delays: Mutex<HashMap<&'static str, Duration>>,
}

impl RecordingStore {
    pub fn new(inner: Arc<SqliteStore>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            delays: Mutex::new(HashMap::new()),
        }
    }

    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn heal(&self, op: &'static str) {
        self.failing.lock().unwrap().remove(op);
    }

    pub fn delay(&self, op: &'static str, by: Duration) {
        self.delays.lock().unwrap().insert(op, by);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn writes(&self) -> Vec<&'static str> {
        self.calls()
            .into_iter()
            .filter(|c| WRITES.contains(c))
            .collect()
    }

    async fn enter(&self, op: &'static str) -> Result<()> {
        self.calls.lock().unwrap().push(op);
        let delay = self.delays.lock().unwrap().get(op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(op) {
            anyhow::bail!("injected failure in {op}");
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for RecordingStore {
    async fn insert_post(&self, post: &NewPost) -> Result<Post> {
        self.enter("insert_post").await?;
        self.inner.insert_post(post).await
    }

    async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        self.enter("get_post").await?;
        self.inner.get_post(post_id).await
    }

    async fn delete_post(&self, post_id: &str) -> Result<()> {
        self.enter("delete_post").await?;
        self.inner.delete_post(post_id).await
    }

    async fn fetch_live_posts(
        &self,
        now: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>> {
        self.enter("fetch_live_posts").await?;
        self.inner.fetch_live_posts(now, offset, limit).await
    }

    async fn fetch_posts_by_author(&self, author_id: &str) -> Result<Vec<Post>> {
        self.enter("fetch_posts_by_author").await?;
        self.inner.fetch_posts_by_author(author_id).await
    }

    async fn update_like_count(&self, post_id: &str, likes: u32) -> Result<()> {
        self.enter("update_like_count").await?;
        self.inner.update_like_count(post_id, likes).await
    }

    async fn insert_like(&self, user_id: &str, post_id: &str) -> Result<()> {
        self.enter("insert_like").await?;
        self.inner.insert_like(user_id, post_id).await
    }

    async fn delete_like(&self, user_id: &str, post_id: &str) -> Result<()> {
        self.enter("delete_like").await?;
        self.inner.delete_like(user_id, post_id).await
    }

    async fn fetch_liked_post_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.enter("fetch_liked_post_ids").await?;
        self.inner.fetch_liked_post_ids(user_id).await
    }

    async fn insert_reply(&self, reply: &NewReply) -> Result<Reply> {
        self.enter("insert_reply").await?;
        self.inner.insert_reply(reply).await
    }

    async fn delete_reply(&self, reply_id: &str) -> Result<()> {
        self.enter("delete_reply").await?;
        self.inner.delete_reply(reply_id).await
    }

    async fn fetch_replies(&self, post_id: &str) -> Result<Vec<Reply>> {
        self.enter("fetch_replies").await?;
        self.inner.fetch_replies(post_id).await
    }

    async fn count_replies(&self, post_ids: &[String]) -> Result<HashMap<String, u32>> {
        self.enter("count_replies").await?;
        self.inner.count_replies(post_ids).await
    }

    async fn insert_tip(&self, tip: &NewTip) -> Result<TipTransaction> {
        self.enter("insert_tip").await?;
        self.inner.insert_tip(tip).await
    }

    async fn fetch_tips_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<TipTransaction>> {
        self.enter("fetch_tips_for_user").await?;
        self.inner.fetch_tips_for_user(user_id, limit).await
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        self.enter("get_profile").await?;
        self.inner.get_profile(user_id).await
    }

    async fn get_profiles(&self, user_ids: &[String]) -> Result<Vec<Profile>> {
        self.enter("get_profiles").await?;
        self.inner.get_profiles(user_ids).await
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.enter("upsert_profile").await?;
        self.inner.upsert_profile(profile).await
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>> {
        self.enter("update_profile").await?;
        self.inner.update_profile(user_id, update).await
    }

    async fn set_balance(&self, user_id: &str, balance: u32) -> Result<()> {
        self.enter("set_balance").await?;
        self.inner.set_balance(user_id, balance).await
    }

    async fn increment_earned_points(&self, user_id: &str, amount: u32) -> Result<()> {
        self.enter("increment_earned_points").await?;
        self.inner.increment_earned_points(user_id, amount).await
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.subscribe_changes()
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<StoreStats> {
        self.enter("stats").await?;
        self.inner.stats(now).await
    }
}

/// Tight budget so timeout paths finish quickly.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        timeout: Duration::from_millis(100),
        attempts: 3,
        backoff: Duration::from_millis(10),
    }
}

pub struct Harness {
    pub sqlite: Arc<SqliteStore>,
    pub store: Arc<RecordingStore>,
    pub prefs: Arc<Preferences>,
    pub ctx: Arc<AppContext>,
}

impl Harness {
    /// Everything wired up, nobody signed in.
    pub fn guest() -> Self {
        let sqlite = Arc::new(SqliteStore::in_memory().unwrap());
        let prefs = Arc::new(Preferences::in_memory().unwrap());
        let store = Arc::new(RecordingStore::new(Arc::clone(&sqlite)));
        let identity = Arc::new(LocalIdentity::new(Arc::clone(&sqlite), Arc::clone(&prefs)));
        let ctx = Arc::new(AppContext::new(
            Arc::clone(&store) as Arc<dyn ContentStore>,
            identity,
            fast_policy(),
        ));
        Self {
            sqlite,
            store,
            prefs,
            ctx,
        }
    }

    /// Signed in as a fresh account holding `balance` points.
    pub async fn signed_in(balance: u32) -> Self {
        let harness = Self::guest();
        let profile = harness
            .ctx
            .sign_up("me@example.com", "correct horse")
            .await
            .unwrap();
        harness.sqlite.set_balance(&profile.id, balance).await.unwrap();
        harness.ctx.refresh_profile().await.unwrap();
        harness.store.clear_calls();
        harness
    }

    pub fn me(&self) -> Profile {
        self.ctx.viewer().expect("signed in")
    }

    /// Another user with a profile row.
    pub async fn neighbour(&self, id: &str, name: &str) -> Profile {
        let mut profile = Profile::first_sign_in(id, None, Utc::now());
        profile.username = name.to_lowercase();
        profile.display_name = Some(name.to_string());
        self.sqlite.upsert_profile(&profile).await.unwrap();
        profile
    }

    /// Insert a live post straight into the store.
    pub async fn post_by(&self, author_id: &str, body: &str, created_at: DateTime<Utc>) -> Post {
        self.sqlite
            .insert_post(&NewPost {
                author_id: author_id.to_string(),
                body: body.to_string(),
                image_url: None,
                location_name: None,
                category: Category::Live,
                manual_flag: None,
                is_important: false,
                is_business: false,
                created_at,
                expires_at: expiry_for(created_at),
            })
            .await
            .unwrap()
    }
}
