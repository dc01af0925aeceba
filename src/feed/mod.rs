// Feed composition: the paged, de-duplicated list of live posts.
//
// Pages come from the store newest first, already filtered to unexpired
// posts. Each page is joined with author profiles and reply counts, both
// fetched concurrently. The list itself lives behind a std Mutex that is
// only held for synchronous sections, never across a store call.
//
// A post-insert event from the store's change feed (or a lagged receiver)
// resets the list and refetches page one.

pub mod tabs;

pub use tabs::FeedTab;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::try_join;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::db::models::{Post, Profile};
use crate::db::ChangeEvent;
use crate::engagement::likes::{LikeCountSink, LikeTracker};
use crate::error::EngagementError;
use crate::identity::AppContext;
use crate::retry::{with_timeout_retry, RetryPolicy};

/// Avatar initials: the first two characters of the name, uppercased.
pub fn initials(name: &str) -> String {
    name.chars().take(2).collect::<String>().to_uppercase()
}

/// Label and avatar initials for an author who may have no profile row.
pub fn author_display(profile: Option<&Profile>) -> (String, String) {
    let name = profile.and_then(|p| {
        p.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(Some(p.username.as_str()).filter(|n| !n.is_empty()))
    });
    match name {
        Some(name) => (name.to_string(), initials(name)),
        None => ("Anonymous".to_string(), "U".to_string()),
    }
}

/// A post as the feed shows it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub post: Post,
    pub author_label: String,
    pub initials: String,
    pub reply_count: u32,
    pub liked_by_me: bool,
    pub is_hot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page arrived; `added` posts were new to the list.
    Loaded { added: usize },
    /// The last page has already been seen.
    Exhausted,
    /// Another fetch is in flight.
    Busy,
    /// The first fetch ran out of attempts; the feed is empty.
    Degraded { reason: String },
}

#[derive(Debug, Clone)]
struct Item {
    post: Post,
    author_label: String,
    initials: String,
}

#[derive(Debug, Default)]
struct FeedState {
    items: Vec<Item>,
    next_page: usize,
    exhausted: bool,
    loading: bool,
}

pub struct Feed {
    page_size: usize,
    retry: RetryPolicy,
    state: Mutex<FeedState>,
    updates: watch::Sender<u64>,
}

/// Clears the loading flag however the fetch ends.
struct LoadingFlag<'a>(&'a Feed);

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        self.0.state().loading = false;
    }
}

impl Feed {
    pub fn new(page_size: usize, retry: RetryPolicy) -> Self {
        let (updates, _) = watch::channel(0);
        Self {
            page_size: page_size.max(1),
            retry,
            state: Mutex::new(FeedState::default()),
            updates,
        }
    }

    fn state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin_load(&self) -> Option<LoadingFlag<'_>> {
        let mut state = self.state();
        if state.loading {
            return None;
        }
        state.loading = true;
        Some(LoadingFlag(self))
    }

    /// Bumped after every change to the list.
    pub fn subscribe_updates(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    fn notify(&self) {
        self.updates.send_modify(|n| *n = n.wrapping_add(1));
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().items.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.state().exhausted
    }

    pub fn contains(&self, post_id: &str) -> bool {
        self.state().items.iter().any(|i| i.post.id == post_id)
    }

    /// A loaded post by id.
    pub fn post(&self, post_id: &str) -> Option<Post> {
        self.state()
            .items
            .iter()
            .find(|i| i.post.id == post_id)
            .map(|i| i.post.clone())
    }

    async fn fetch_page(&self, ctx: &AppContext, page: usize) -> Result<Vec<Item>> {
        let store = ctx.store();
        let posts = store
            .fetch_live_posts(Utc::now(), page * self.page_size, self.page_size)
            .await?;
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let mut author_ids: Vec<String> = posts.iter().map(|p| p.author_id.clone()).collect();
        author_ids.sort();
        author_ids.dedup();
        let post_ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();

        let (profiles, counts) = try_join!(
            store.get_profiles(&author_ids),
            store.count_replies(&post_ids)
        )?;

        Ok(posts
            .into_iter()
            .map(|mut post| {
                let profile = profiles.iter().find(|p| p.id == post.author_id);
                let (author_label, initials) = author_display(profile);
                post.reply_count = counts.get(&post.id).copied().unwrap_or(0);
                Item {
                    post,
                    author_label,
                    initials,
                }
            })
            .collect())
    }

    fn apply_reset(&self, items: Vec<Item>) -> usize {
        let count = items.len();
        {
            let mut state = self.state();
            state.exhausted = count < self.page_size;
            state.items = items;
            state.next_page = 1;
        }
        self.notify();
        count
    }

    /// Load page one under the feed retry budget.
    ///
    /// When every attempt fails or times out the feed is left empty and
    /// the outcome says why.
    pub async fn initial_load(&self, ctx: &AppContext) -> LoadOutcome {
        let Some(_flag) = self.begin_load() else {
            return LoadOutcome::Busy;
        };

        match with_timeout_retry("feed fetch", &self.retry, || self.fetch_page(ctx, 0)).await {
            Ok(items) => {
                let added = self.apply_reset(items);
                info!(posts = added, "Feed loaded");
                LoadOutcome::Loaded { added }
            }
            Err(e) => {
                warn!(error = %e, "Feed unavailable, showing empty feed");
                {
                    let mut state = self.state();
                    state.items.clear();
                    state.next_page = 0;
                    state.exhausted = false;
                }
                self.notify();
                LoadOutcome::Degraded {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Throw away the list and fetch page one again.
    pub async fn refresh(&self, ctx: &AppContext) -> Result<LoadOutcome, EngagementError> {
        let Some(_flag) = self.begin_load() else {
            return Ok(LoadOutcome::Busy);
        };
        let items = self
            .fetch_page(ctx, 0)
            .await
            .map_err(|e| EngagementError::read("refresh feed", e))?;
        let added = self.apply_reset(items);
        debug!(posts = added, "Feed refreshed");
        Ok(LoadOutcome::Loaded { added })
    }

    /// Append the next page, skipping posts already in the list.
    pub async fn load_more(&self, ctx: &AppContext) -> Result<LoadOutcome, EngagementError> {
        if self.is_exhausted() {
            return Ok(LoadOutcome::Exhausted);
        }
        let Some(_flag) = self.begin_load() else {
            return Ok(LoadOutcome::Busy);
        };
        let page = self.state().next_page;

        let items = self
            .fetch_page(ctx, page)
            .await
            .map_err(|e| EngagementError::read("load more", e))?;
        let fetched = items.len();

        let added = {
            let mut state = self.state();
            let seen: HashSet<String> = state.items.iter().map(|i| i.post.id.clone()).collect();
            let before = state.items.len();
            state
                .items
                .extend(items.into_iter().filter(|i| !seen.contains(&i.post.id)));
            state.next_page = page + 1;
            state.exhausted = fetched < self.page_size;
            state.items.len() - before
        };
        self.notify();
        debug!(page, fetched, added, "Feed page appended");
        Ok(LoadOutcome::Loaded { added })
    }

    /// Entries under `tab`, in list order, minus anything expired at `now`.
    pub fn visible(&self, tab: FeedTab, likes: &LikeTracker, now: DateTime<Utc>) -> Vec<FeedEntry> {
        self.state()
            .items
            .iter()
            .filter(|i| i.post.is_live_at(now) && tab.matches(&i.post))
            .map(|i| FeedEntry {
                author_label: i.author_label.clone(),
                initials: i.initials.clone(),
                reply_count: i.post.reply_count,
                liked_by_me: likes.is_liked(&i.post.id),
                is_hot: i.post.is_hot_at(now),
                post: i.post.clone(),
            })
            .collect()
    }

    pub fn set_reply_count(&self, post_id: &str, count: u32) {
        let changed = {
            let mut state = self.state();
            match state.items.iter_mut().find(|i| i.post.id == post_id) {
                Some(item) => {
                    item.post.reply_count = count;
                    true
                }
                None => false,
            }
        };
        if changed {
            self.notify();
        }
    }

    /// Re-count a post's replies and store the result in its entry.
    pub async fn refresh_reply_count(
        &self,
        ctx: &AppContext,
        post_id: &str,
    ) -> Result<u32, EngagementError> {
        let counts = ctx
            .store()
            .count_replies(&[post_id.to_string()])
            .await
            .map_err(|e| EngagementError::read("count replies", e))?;
        let count = counts.get(post_id).copied().unwrap_or(0);
        self.set_reply_count(post_id, count);
        Ok(count)
    }

    /// Drop a post from the list. Returns whether it was there.
    pub fn remove_post(&self, post_id: &str) -> bool {
        let removed = {
            let mut state = self.state();
            let before = state.items.len();
            state.items.retain(|i| i.post.id != post_id);
            state.items.len() != before
        };
        if removed {
            self.notify();
        }
        removed
    }
}

impl LikeCountSink for Feed {
    fn set_like_count(&self, post_id: &str, likes: u32) {
        let changed = {
            let mut state = self.state();
            match state.items.iter_mut().find(|i| i.post.id == post_id) {
                Some(item) => {
                    item.post.likes = likes;
                    true
                }
                None => false,
            }
        };
        if changed {
            self.notify();
        }
    }
}

/// Reset and refetch the feed on every post-insert event from the store.
///
/// A lagged receiver means events were dropped, which is handled the same
/// way. The task ends when the store's change feed closes.
pub fn spawn_realtime(feed: Arc<Feed>, ctx: Arc<AppContext>) -> JoinHandle<()> {
    let mut rx = ctx.store().subscribe_changes();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ChangeEvent::PostInserted { post_id }) => {
                    debug!(post_id = %post_id, "New post, refreshing feed");
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Change feed lagged, refreshing feed");
                }
                Err(RecvError::Closed) => {
                    debug!("Change feed closed, realtime refresh stopped");
                    break;
                }
            }
            match feed.refresh(&ctx).await {
                Ok(LoadOutcome::Busy) => debug!("Feed busy, skipped realtime refresh"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Realtime refresh failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initials_take_two_chars_uppercased() {
        assert_eq!(initials("jess"), "JE");
        assert_eq!(initials("é"), "É");
    }

    #[test]
    fn test_author_display_without_profile() {
        assert_eq!(
            author_display(None),
            ("Anonymous".to_string(), "U".to_string())
        );
    }

    #[test]
    fn test_author_display_prefers_display_name() {
        let mut p = Profile::first_sign_in("u1", Some("jess@example.com"), Utc::now());
        p.display_name = Some("Miss Jessie".to_string());
        assert_eq!(
            author_display(Some(&p)),
            ("Miss Jessie".to_string(), "MI".to_string())
        );
    }
}
