// Reply threads.
//
// One ReplyThread per opened post. Creating a reply re-fetches the whole
// thread afterwards instead of merging the inserted row, so a slow store
// shows the new reply only once the refresh completes. Deleting removes the
// reply locally without a refresh.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::db::models::{NewReply, PostId, Reply};
use crate::error::EngagementError;
use crate::feed::{author_display, Feed};
use crate::identity::AppContext;

/// A reply joined with its author's display name and avatar initials.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyView {
    pub reply: Reply,
    pub author_label: String,
    pub initials: String,
}

#[derive(Debug)]
pub struct ReplyThread {
    post_id: PostId,
    replies: Vec<ReplyView>,
}

impl ReplyThread {
    /// An empty thread for `post_id`. Call `refresh` to load it.
    pub fn open(post_id: &str) -> Self {
        Self {
            post_id: post_id.to_string(),
            replies: Vec::new(),
        }
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn replies(&self) -> &[ReplyView] {
        &self.replies
    }

    pub fn len(&self) -> usize {
        self.replies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }

    /// Load the thread oldest first, with one batched profile lookup.
    pub async fn refresh(&mut self, ctx: &AppContext) -> Result<(), EngagementError> {
        let store = ctx.store();
        let replies = store
            .fetch_replies(&self.post_id)
            .await
            .map_err(|e| EngagementError::read("load replies", e))?;

        let mut author_ids: Vec<String> = replies.iter().map(|r| r.author_id.clone()).collect();
        author_ids.sort();
        author_ids.dedup();

        let profiles: HashMap<_, _> = if author_ids.is_empty() {
            HashMap::new()
        } else {
            store
                .get_profiles(&author_ids)
                .await
                .map_err(|e| EngagementError::read("load reply authors", e))?
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect()
        };

        self.replies = replies
            .into_iter()
            .map(|reply| {
                let (author_label, initials) = author_display(profiles.get(&reply.author_id));
                ReplyView {
                    reply,
                    author_label,
                    initials,
                }
            })
            .collect();
        debug!(post_id = %self.post_id, count = self.replies.len(), "Thread loaded");
        Ok(())
    }

    /// Post a reply as the viewer, then reload the thread.
    pub async fn create(&mut self, ctx: &AppContext, body: &str) -> Result<Reply, EngagementError> {
        let viewer = ctx.require_viewer()?;
        let body = body.trim();
        if body.is_empty() {
            return Err(EngagementError::EmptyBody);
        }

        let reply = ctx
            .store()
            .insert_reply(&NewReply {
                post_id: self.post_id.clone(),
                author_id: viewer.id.clone(),
                body: body.to_string(),
            })
            .await
            .map_err(|e| EngagementError::write("post reply", e))?;
        info!(post_id = %self.post_id, reply_id = %reply.id, "Reply posted");

        self.refresh(ctx).await?;
        Ok(reply)
    }

    /// Delete one of the viewer's own replies.
    pub async fn delete(&mut self, ctx: &AppContext, reply_id: &str) -> Result<(), EngagementError> {
        let viewer = ctx.require_viewer()?;
        let Some(view) = self.replies.iter().find(|v| v.reply.id == reply_id) else {
            return Err(EngagementError::ReplyNotFound(reply_id.to_string()));
        };
        if view.reply.author_id != viewer.id {
            return Err(EngagementError::NotAuthor);
        }

        ctx.store()
            .delete_reply(reply_id)
            .await
            .map_err(|e| EngagementError::write("delete reply", e))?;
        self.replies.retain(|v| v.reply.id != reply_id);
        info!(post_id = %self.post_id, reply_id, "Reply deleted");
        Ok(())
    }

    /// Close the thread and write its current reply count into the feed.
    pub async fn close(self, ctx: &AppContext, feed: &Feed) -> Result<u32, EngagementError> {
        feed.refresh_reply_count(ctx, &self.post_id).await
    }
}
