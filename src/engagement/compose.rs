// Creating and deleting posts.

use chrono::Utc;
use tracing::{info, warn};

use super::classify::categorize;
use crate::db::models::{expiry_for, Category, ManualFlag, NewPost, Post, MAX_POST_CHARS};
use crate::error::EngagementError;
use crate::feed::Feed;
use crate::identity::AppContext;

/// Compose and store a post as the viewer.
///
/// The category comes from `categorize`; alerts are marked important and
/// deals are marked as business posts. The viewer's city becomes the post's
/// location. Errors go straight back to the caller.
pub async fn create_post(
    ctx: &AppContext,
    body: &str,
    manual_flag: Option<ManualFlag>,
    image_url: Option<String>,
) -> Result<Post, EngagementError> {
    let viewer = ctx.require_viewer()?;

    let body = body.trim();
    if body.is_empty() {
        return Err(EngagementError::EmptyBody);
    }
    let len = body.chars().count();
    if len > MAX_POST_CHARS {
        return Err(EngagementError::BodyTooLong {
            len,
            max: MAX_POST_CHARS,
        });
    }

    let category = categorize(body, manual_flag, viewer.is_business());
    let created_at = Utc::now();
    let new_post = NewPost {
        author_id: viewer.id.clone(),
        body: body.to_string(),
        image_url,
        location_name: viewer.city.clone().filter(|c| !c.is_empty()),
        category,
        manual_flag,
        is_important: category == Category::Alerts,
        is_business: category == Category::Deals,
        created_at,
        expires_at: expiry_for(created_at),
    };

    let post = ctx
        .store()
        .insert_post(&new_post)
        .await
        .map_err(|e| EngagementError::write("create post", e))?;
    info!(post_id = %post.id, category = %post.category, "Post created");
    Ok(post)
}

/// Delete one of the viewer's posts.
///
/// The post leaves the feed immediately. If the store refuses the delete
/// the feed is reloaded so it matches the store again.
pub async fn delete_post(ctx: &AppContext, feed: &Feed, post_id: &str) -> Result<(), EngagementError> {
    let viewer = ctx.require_viewer()?;
    let post = ctx
        .store()
        .get_post(post_id)
        .await
        .map_err(|e| EngagementError::read("load post", e))?;
    match post {
        Some(post) if post.author_id == viewer.id => {}
        Some(_) => return Err(EngagementError::NotAuthor),
        None => {
            feed.remove_post(post_id);
            return Ok(());
        }
    }

    feed.remove_post(post_id);
    if let Err(e) = ctx.store().delete_post(post_id).await {
        warn!(post_id, error = %e, "Delete failed, reloading feed");
        if let Err(reload) = feed.refresh(ctx).await {
            warn!(error = %reload, "Feed reload after failed delete also failed");
        }
        return Err(EngagementError::write("delete post", e));
    }
    info!(post_id, "Post deleted");
    Ok(())
}

/// All of the viewer's posts, including expired ones, newest first.
pub async fn my_posts(ctx: &AppContext) -> Result<Vec<Post>, EngagementError> {
    let viewer = ctx.require_viewer()?;
    ctx.store()
        .fetch_posts_by_author(&viewer.id)
        .await
        .map_err(|e| EngagementError::read("load my posts", e))
}
