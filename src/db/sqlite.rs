// SqliteStore: rusqlite backend implementing the ContentStore trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The guard is never held across an .await on anything but the lock itself.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::{broadcast, Mutex};

use super::models::{
    NewPost, NewReply, NewTip, Post, Profile, ProfileUpdate, Reply, StoreStats, TipTransaction,
};
use super::queries::{self, AccountRow};
use super::realtime::{ChangeEvent, ChangeFeed};
use super::traits::ContentStore;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    changes: ChangeFeed,
}

impl SqliteStore {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            changes: ChangeFeed::new(),
        }
    }

    /// A fresh in-memory store with the schema applied.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::create_tables(&conn)?;
        Ok(Self::new(conn))
    }

    pub async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    // Local accounts are not part of ContentStore: only LocalIdentity uses them.

    pub async fn insert_account(&self, account: &AccountRow) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::insert_account(&conn, account)
    }

    pub async fn get_account_by_email(&self, email: &str) -> Result<Option<AccountRow>> {
        let conn = self.conn.lock().await;
        queries::get_account_by_email(&conn, email)
    }

    pub async fn get_account_by_user_id(&self, user_id: &str) -> Result<Option<AccountRow>> {
        let conn = self.conn.lock().await;
        queries::get_account_by_user_id(&conn, user_id)
    }
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn insert_post(&self, post: &NewPost) -> Result<Post> {
        let stored = {
            let conn = self.conn.lock().await;
            queries::insert_post(&conn, post)?
        };
        self.changes.publish(ChangeEvent::PostInserted {
            post_id: stored.id.clone(),
        });
        Ok(stored)
    }

    async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let conn = self.conn.lock().await;
        queries::get_post(&conn, post_id)
    }

    async fn delete_post(&self, post_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        if !queries::delete_post(&conn, post_id)? {
            anyhow::bail!("No post with id {post_id}");
        }
        Ok(())
    }

    async fn fetch_live_posts(
        &self,
        now: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let conn = self.conn.lock().await;
        queries::fetch_live_posts(&conn, now, offset, limit)
    }

    async fn fetch_posts_by_author(&self, author_id: &str) -> Result<Vec<Post>> {
        let conn = self.conn.lock().await;
        queries::fetch_posts_by_author(&conn, author_id)
    }

    async fn update_like_count(&self, post_id: &str, likes: u32) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::update_like_count(&conn, post_id, likes)
    }

    async fn insert_like(&self, user_id: &str, post_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::insert_like(&conn, user_id, post_id)
    }

    async fn delete_like(&self, user_id: &str, post_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::delete_like(&conn, user_id, post_id)
    }

    async fn fetch_liked_post_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        queries::fetch_liked_post_ids(&conn, user_id)
    }

    async fn insert_reply(&self, reply: &NewReply) -> Result<Reply> {
        let conn = self.conn.lock().await;
        queries::insert_reply(&conn, reply)
    }

    async fn delete_reply(&self, reply_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        if !queries::delete_reply(&conn, reply_id)? {
            anyhow::bail!("No reply with id {reply_id}");
        }
        Ok(())
    }

    async fn fetch_replies(&self, post_id: &str) -> Result<Vec<Reply>> {
        let conn = self.conn.lock().await;
        queries::fetch_replies(&conn, post_id)
    }

    async fn count_replies(&self, post_ids: &[String]) -> Result<HashMap<String, u32>> {
        let conn = self.conn.lock().await;
        queries::count_replies(&conn, post_ids)
    }

    async fn insert_tip(&self, tip: &NewTip) -> Result<TipTransaction> {
        let conn = self.conn.lock().await;
        queries::insert_tip(&conn, tip)
    }

    async fn fetch_tips_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<TipTransaction>> {
        let conn = self.conn.lock().await;
        queries::fetch_tips_for_user(&conn, user_id, limit)
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let conn = self.conn.lock().await;
        queries::get_profile(&conn, user_id)
    }

    async fn get_profiles(&self, user_ids: &[String]) -> Result<Vec<Profile>> {
        let conn = self.conn.lock().await;
        queries::get_profiles(&conn, user_ids)
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::upsert_profile(&conn, profile)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>> {
        let conn = self.conn.lock().await;
        queries::update_profile(&conn, user_id, update)
    }

    async fn set_balance(&self, user_id: &str, balance: u32) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::set_balance(&conn, user_id, balance)
    }

    async fn increment_earned_points(&self, user_id: &str, amount: u32) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::increment_earned_points(&conn, user_id, amount)
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<StoreStats> {
        let conn = self.conn.lock().await;
        queries::store_stats(&conn, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{expiry_for, Category};

    fn new_post(body: &str) -> NewPost {
        let now = Utc::now();
        NewPost {
            author_id: "u1".to_string(),
            body: body.to_string(),
            image_url: None,
            location_name: Some("Boyce, LA".to_string()),
            category: Category::Live,
            manual_flag: None,
            is_important: false,
            is_business: false,
            created_at: now,
            expires_at: expiry_for(now),
        }
    }

    #[tokio::test]
    async fn test_insert_post_publishes_change_event() {
        let store = SqliteStore::in_memory().unwrap();
        let mut rx = store.subscribe_changes();
        let post = store.insert_post(&new_post("hi")).await.unwrap();
        match rx.recv().await.unwrap() {
            ChangeEvent::PostInserted { post_id } => assert_eq!(post_id, post.id),
        }
    }

    #[tokio::test]
    async fn test_trait_like_count_roundtrip() {
        let store = SqliteStore::in_memory().unwrap();
        let post = store.insert_post(&new_post("hi")).await.unwrap();
        store.update_like_count(&post.id, 4).await.unwrap();
        let loaded = store.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.likes, 4);
    }

    #[tokio::test]
    async fn test_delete_missing_reply_errors() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.delete_reply("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_post_removes_replies() {
        let store = SqliteStore::in_memory().unwrap();
        let post = store.insert_post(&new_post("hi")).await.unwrap();
        store
            .insert_reply(&NewReply {
                post_id: post.id.clone(),
                author_id: "u2".to_string(),
                body: "yo".to_string(),
            })
            .await
            .unwrap();
        store.delete_post(&post.id).await.unwrap();
        assert!(store.fetch_replies(&post.id).await.unwrap().is_empty());
        assert!(store.get_post(&post.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_table_count() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.table_count().await.unwrap(), 8);
    }
}
