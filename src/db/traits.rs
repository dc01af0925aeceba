// ContentStore trait: backend-agnostic async interface to the content store.
//
// Implementors: SqliteStore (local, rusqlite) and HostedStore (the hosted
// backend's REST API, behind the `hosted` feature). All methods are async so
// a Mutex-wrapped rusqlite connection and a reqwest client fit behind one
// interface, shared as `Arc<dyn ContentStore>`.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use super::models::{
    NewPost, NewReply, NewTip, Post, Profile, ProfileUpdate, Reply, StoreStats, TipTransaction,
};
use super::realtime::ChangeEvent;

#[async_trait]
pub trait ContentStore: Send + Sync {
    // --- Posts ---

    /// Insert a post and return the stored row (with its assigned id).
    async fn insert_post(&self, post: &NewPost) -> Result<Post>;

    async fn get_post(&self, post_id: &str) -> Result<Option<Post>>;

    async fn delete_post(&self, post_id: &str) -> Result<()>;

    /// One page of posts with `expires_at > now`, newest first.
    async fn fetch_live_posts(
        &self,
        now: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>>;

    /// Every post by one author, newest first, including expired ones.
    async fn fetch_posts_by_author(&self, author_id: &str) -> Result<Vec<Post>>;

    /// Overwrite the denormalized like count on a post.
    async fn update_like_count(&self, post_id: &str, likes: u32) -> Result<()>;

    // --- Like edges ---

    async fn insert_like(&self, user_id: &str, post_id: &str) -> Result<()>;

    async fn delete_like(&self, user_id: &str, post_id: &str) -> Result<()>;

    async fn fetch_liked_post_ids(&self, user_id: &str) -> Result<Vec<String>>;

    // --- Replies ---

    async fn insert_reply(&self, reply: &NewReply) -> Result<Reply>;

    async fn delete_reply(&self, reply_id: &str) -> Result<()>;

    /// Replies for a post, oldest first.
    async fn fetch_replies(&self, post_id: &str) -> Result<Vec<Reply>>;

    /// Reply counts for a batch of posts. Posts without replies may be absent.
    async fn count_replies(&self, post_ids: &[String]) -> Result<HashMap<String, u32>>;

    // --- Tips ---

    async fn insert_tip(&self, tip: &NewTip) -> Result<TipTransaction>;

    /// Tips sent or received by a user, newest first.
    async fn fetch_tips_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<TipTransaction>>;

    // --- Profiles ---

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>>;

    /// Batched `id IN (...)` profile lookup.
    async fn get_profiles(&self, user_ids: &[String]) -> Result<Vec<Profile>>;

    async fn upsert_profile(&self, profile: &Profile) -> Result<()>;

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate)
        -> Result<Option<Profile>>;

    /// Overwrite a profile's spendable balance.
    async fn set_balance(&self, user_id: &str, balance: u32) -> Result<()>;

    /// Credit a profile's lifetime-earned counter.
    async fn increment_earned_points(&self, user_id: &str, amount: u32) -> Result<()>;

    // --- Change feed ---

    /// Subscribe to post-insert notifications.
    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent>;

    // --- Lifecycle ---

    async fn stats(&self, now: DateTime<Utc>) -> Result<StoreStats>;
}
