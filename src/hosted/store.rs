// HostedStore: ContentStore over the hosted backend's row API.
//
// Server-side effects (tip counters, access policy, id assignment) happen
// in the backend. The backend's own realtime socket is not used; inserts
// made through this store are published locally, and `spawn_poller` picks
// up posts made by other clients.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

use super::client::{eq, in_list, Filters, HostedClient};
use crate::db::models::{
    LikeEdge, NewPost, NewReply, NewTip, Post, Profile, ProfileUpdate, Reply, StoreStats,
    TipTransaction,
};
use crate::db::realtime::{ChangeEvent, ChangeFeed};
use crate::db::ContentStore;

const MESSAGES: &str = "messages";
const REPLIES: &str = "replies";
const LIKES: &str = "user_likes";
const TIPS: &str = "tips";
const PROFILES: &str = "profiles";

#[derive(Deserialize)]
struct MessageRef {
    message_id: String,
}

#[derive(Deserialize)]
struct IdRow {
    id: String,
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn first<T>(rows: Vec<T>, what: &str) -> Result<T> {
    rows.into_iter()
        .next()
        .with_context(|| format!("{what} returned no row"))
}

pub struct HostedStore {
    client: Arc<HostedClient>,
    changes: ChangeFeed,
}

impl HostedStore {
    pub fn new(client: Arc<HostedClient>) -> Self {
        Self {
            client,
            changes: ChangeFeed::new(),
        }
    }

    /// Poll for the newest live post and publish a change event whenever it
    /// differs from the last one seen.
    pub fn spawn_poller(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut last_seen: Option<String> = None;
            loop {
                ticker.tick().await;
                let newest = store.newest_post_id().await;
                match newest {
                    Ok(Some(id)) if last_seen.as_deref() != Some(id.as_str()) => {
                        if last_seen.is_some() {
                            store.changes.publish(ChangeEvent::PostInserted {
                                post_id: id.clone(),
                            });
                        }
                        last_seen = Some(id);
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Polling for new posts failed"),
                }
            }
        })
    }

    async fn newest_post_id(&self) -> Result<Option<String>> {
        let filters: Filters = vec![
            ("select", "id".to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", "1".to_string()),
        ];
        let rows: Vec<IdRow> = self.client.select(MESSAGES, &filters).await?;
        Ok(rows.into_iter().next().map(|r| r.id))
    }
}

#[async_trait]
impl ContentStore for HostedStore {
    async fn insert_post(&self, post: &NewPost) -> Result<Post> {
        let rows = self.client.insert(MESSAGES, post).await?;
        let stored: Post = first(rows, "insert post")?;
        self.changes.publish(ChangeEvent::PostInserted {
            post_id: stored.id.clone(),
        });
        Ok(stored)
    }

    async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let filters: Filters = vec![("id", eq(post_id)), ("limit", "1".to_string())];
        let rows = self.client.select(MESSAGES, &filters).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_post(&self, post_id: &str) -> Result<()> {
        let deleted = self.client.delete(MESSAGES, &vec![("id", eq(post_id))]).await?;
        if deleted == 0 {
            anyhow::bail!("Post {post_id} was not deleted (missing or not yours)");
        }
        Ok(())
    }

    async fn fetch_live_posts(
        &self,
        now: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let filters: Filters = vec![
            ("select", "*".to_string()),
            ("expires_at", format!("gt.{}", timestamp(now))),
            ("order", "created_at.desc".to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ];
        self.client.select(MESSAGES, &filters).await
    }

    async fn fetch_posts_by_author(&self, author_id: &str) -> Result<Vec<Post>> {
        let filters: Filters = vec![
            ("user_id", eq(author_id)),
            ("order", "created_at.desc".to_string()),
        ];
        self.client.select(MESSAGES, &filters).await
    }

    async fn update_like_count(&self, post_id: &str, likes: u32) -> Result<()> {
        let rows: Vec<serde_json::Value> = self
            .client
            .update(MESSAGES, &vec![("id", eq(post_id))], &json!({ "likes": likes }))
            .await?;
        if rows.is_empty() {
            anyhow::bail!("No post with id {post_id}");
        }
        Ok(())
    }

    async fn insert_like(&self, user_id: &str, post_id: &str) -> Result<()> {
        let edge = LikeEdge {
            user_id: user_id.to_string(),
            post_id: post_id.to_string(),
        };
        let _: Vec<serde_json::Value> = self.client.insert(LIKES, &edge).await?;
        Ok(())
    }

    async fn delete_like(&self, user_id: &str, post_id: &str) -> Result<()> {
        let filters: Filters = vec![("user_id", eq(user_id)), ("message_id", eq(post_id))];
        self.client.delete(LIKES, &filters).await?;
        Ok(())
    }

    async fn fetch_liked_post_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let filters: Filters = vec![
            ("select", "message_id".to_string()),
            ("user_id", eq(user_id)),
        ];
        let rows: Vec<MessageRef> = self.client.select(LIKES, &filters).await?;
        Ok(rows.into_iter().map(|r| r.message_id).collect())
    }

    async fn insert_reply(&self, reply: &NewReply) -> Result<Reply> {
        let rows = self.client.insert(REPLIES, reply).await?;
        first(rows, "insert reply")
    }

    async fn delete_reply(&self, reply_id: &str) -> Result<()> {
        let deleted = self.client.delete(REPLIES, &vec![("id", eq(reply_id))]).await?;
        if deleted == 0 {
            anyhow::bail!("Reply {reply_id} was not deleted (missing or not yours)");
        }
        Ok(())
    }

    async fn fetch_replies(&self, post_id: &str) -> Result<Vec<Reply>> {
        let filters: Filters = vec![
            ("message_id", eq(post_id)),
            ("order", "created_at.asc".to_string()),
        ];
        self.client.select(REPLIES, &filters).await
    }

    async fn count_replies(&self, post_ids: &[String]) -> Result<HashMap<String, u32>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let filters: Filters = vec![
            ("select", "message_id".to_string()),
            ("message_id", in_list(post_ids)),
        ];
        let rows: Vec<MessageRef> = self.client.select(REPLIES, &filters).await?;
        let mut counts = HashMap::new();
        for row in rows {
            *counts.entry(row.message_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn insert_tip(&self, tip: &NewTip) -> Result<TipTransaction> {
        let rows = self.client.insert(TIPS, tip).await?;
        first(rows, "insert tip")
    }

    async fn fetch_tips_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<TipTransaction>> {
        let filters: Filters = vec![
            (
                "or",
                format!("(from_user_id.eq.{user_id},to_user_id.eq.{user_id})"),
            ),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        self.client.select(TIPS, &filters).await
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let filters: Filters = vec![("id", eq(user_id)), ("limit", "1".to_string())];
        let rows = self.client.select(PROFILES, &filters).await?;
        Ok(rows.into_iter().next())
    }

    async fn get_profiles(&self, user_ids: &[String]) -> Result<Vec<Profile>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.client
            .select(PROFILES, &vec![("id", in_list(user_ids))])
            .await
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.client.upsert(PROFILES, profile).await
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>> {
        if update.is_empty() {
            return self.get_profile(user_id).await;
        }
        let rows = self
            .client
            .update(PROFILES, &vec![("id", eq(user_id))], update)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn set_balance(&self, user_id: &str, balance: u32) -> Result<()> {
        let rows: Vec<serde_json::Value> = self
            .client
            .update(
                PROFILES,
                &vec![("id", eq(user_id))],
                &json!({ "yallpoints": balance }),
            )
            .await?;
        if rows.is_empty() {
            anyhow::bail!("No profile with id {user_id}");
        }
        Ok(())
    }

    async fn increment_earned_points(&self, user_id: &str, amount: u32) -> Result<()> {
        self.client
            .rpc(
                "increment_earned_points",
                &json!({ "user_id": user_id, "amount": amount }),
            )
            .await
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<StoreStats> {
        let live: Filters = vec![("expires_at", format!("gt.{}", timestamp(now)))];
        let expired: Filters = vec![("expires_at", format!("lte.{}", timestamp(now)))];
        let none: Filters = Vec::new();

        let (live_posts, expired_posts, replies, likes, tips, profiles) = futures::try_join!(
            self.client.count(MESSAGES, &live),
            self.client.count(MESSAGES, &expired),
            self.client.count(REPLIES, &none),
            self.client.count(LIKES, &none),
            self.client.count(TIPS, &none),
            self.client.count(PROFILES, &none),
        )?;

        Ok(StoreStats {
            live_posts,
            expired_posts,
            replies,
            likes,
            tips,
            profiles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_utc_millis() {
        let t = DateTime::parse_from_rfc3339("2026-03-01T10:00:00.5+02:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp(t), "2026-03-01T08:00:00.500Z");
    }

    #[test]
    fn test_first_errors_on_empty() {
        assert!(first(Vec::<u8>::new(), "insert post").is_err());
        assert_eq!(first(vec![1, 2], "x").unwrap(), 1);
    }
}
