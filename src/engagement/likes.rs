// Optimistic like toggling.
//
// A toggle is planned as a LikeTransition, applied locally at once (liked
// set plus the displayed count), then pushed to the store: the edge
// insert/delete followed by the denormalized count update. If either write
// fails the exact inverse transition is applied and the outcome is
// reported as RolledBack. Remote failures never reach the caller.
//
// When the edge write succeeds but the count write fails, the remote edge
// stays in place while the local state rolls back. The next `load` picks
// the edge up again.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use super::pending::PendingSet;
use crate::error::EngagementError;
use crate::identity::AppContext;

/// Receives displayed like counts as toggles apply and roll back.
pub trait LikeCountSink: Send + Sync {
    fn set_like_count(&self, post_id: &str, likes: u32);
}

/// For callers with no on-screen list to keep in step.
impl LikeCountSink for () {
    fn set_like_count(&self, _post_id: &str, _likes: u32) {}
}

/// One step of the liked/unliked state machine for a single post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeTransition {
    pub from_liked: bool,
    pub from_count: u32,
    pub to_liked: bool,
    pub to_count: u32,
}

impl LikeTransition {
    /// Liked goes to unliked with one fewer like (never below zero);
    /// unliked goes to liked with one more.
    pub fn plan(was_liked: bool, count: u32) -> Self {
        let to_count = if was_liked {
            count.saturating_sub(1)
        } else {
            count.saturating_add(1)
        };
        Self {
            from_liked: was_liked,
            from_count: count,
            to_liked: !was_liked,
            to_count,
        }
    }

    pub fn inverse(&self) -> Self {
        Self {
            from_liked: self.to_liked,
            from_count: self.to_count,
            to_liked: self.from_liked,
            to_count: self.from_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOutcome {
    /// A toggle for this post was still pending; nothing changed.
    Ignored,
    /// The toggle is applied locally and in the store.
    Applied { liked: bool, count: u32 },
    /// The store rejected the toggle; local state is back where it started.
    RolledBack { liked: bool, count: u32 },
}

/// The viewer's liked-post set plus the in-flight guard for toggles.
pub struct LikeTracker {
    liked: Mutex<HashSet<String>>,
    pending: PendingSet,
}

impl LikeTracker {
    pub fn new(quiescence: Duration) -> Self {
        Self {
            liked: Mutex::new(HashSet::new()),
            pending: PendingSet::new(quiescence),
        }
    }

    fn liked(&self) -> MutexGuard<'_, HashSet<String>> {
        self.liked.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed the liked set for the signed-in viewer. Signed out means empty.
    pub async fn load(&self, ctx: &AppContext) -> Result<usize, EngagementError> {
        let Some(viewer) = ctx.viewer() else {
            self.clear();
            return Ok(0);
        };
        let ids = ctx
            .store()
            .fetch_liked_post_ids(&viewer.id)
            .await
            .map_err(|e| EngagementError::read("load likes", e))?;

        let mut liked = self.liked();
        *liked = ids.into_iter().collect();
        debug!(user_id = %viewer.id, count = liked.len(), "Liked posts loaded");
        Ok(liked.len())
    }

    pub fn clear(&self) {
        self.liked().clear();
    }

    pub fn is_liked(&self, post_id: &str) -> bool {
        self.liked().contains(post_id)
    }

    pub fn is_pending(&self, post_id: &str) -> bool {
        self.pending.is_pending(post_id)
    }

    fn apply(&self, post_id: &str, transition: &LikeTransition, sink: &dyn LikeCountSink) {
        {
            let mut liked = self.liked();
            if transition.to_liked {
                liked.insert(post_id.to_string());
            } else {
                liked.remove(post_id);
            }
        }
        sink.set_like_count(post_id, transition.to_count);
    }

    /// Toggle the viewer's like on `post_id`, whose displayed count is
    /// `current_count`.
    ///
    /// Only `NotAuthenticated` is returned as an error, and in that case
    /// nothing local is touched.
    pub async fn toggle_like(
        &self,
        ctx: &AppContext,
        post_id: &str,
        current_count: u32,
        sink: &dyn LikeCountSink,
    ) -> Result<LikeOutcome, EngagementError> {
        let viewer = ctx.require_viewer()?;

        let Some(_guard) = self.pending.try_acquire(post_id) else {
            debug!(post_id, "Like toggle ignored, previous toggle pending");
            return Ok(LikeOutcome::Ignored);
        };

        let transition = LikeTransition::plan(self.is_liked(post_id), current_count);
        self.apply(post_id, &transition, sink);

        match push_transition(ctx, &viewer.id, post_id, &transition).await {
            Ok(()) => {
                debug!(post_id, liked = transition.to_liked, count = transition.to_count, "Like applied");
                Ok(LikeOutcome::Applied {
                    liked: transition.to_liked,
                    count: transition.to_count,
                })
            }
            Err(e) => {
                warn!(post_id, error = %e, "Like toggle failed, rolling back");
                let inverse = transition.inverse();
                self.apply(post_id, &inverse, sink);
                Ok(LikeOutcome::RolledBack {
                    liked: inverse.to_liked,
                    count: inverse.to_count,
                })
            }
        }
    }
}

async fn push_transition(
    ctx: &AppContext,
    user_id: &str,
    post_id: &str,
    transition: &LikeTransition,
) -> Result<()> {
    let store = ctx.store();
    if transition.to_liked {
        store.insert_like(user_id, post_id).await?;
    } else {
        store.delete_like(user_id, post_id).await?;
    }
    store.update_like_count(post_id, transition.to_count).await
}
