// Engagement layer: what happens when a user posts, likes, tips or
// replies, and how posts get their category and "hot" badge.

pub mod classify;
pub mod compose;
pub mod likes;
pub mod pending;
pub mod replies;
pub mod tips;

pub use classify::{categorize, is_hot, is_hot_at};
pub use compose::{create_post, delete_post, my_posts};
pub use likes::{LikeCountSink, LikeOutcome, LikeTracker, LikeTransition};
pub use pending::{PendingGuard, PendingSet};
pub use replies::{ReplyThread, ReplyView};
pub use tips::{send_tip, tip_history, TipDirection, TipReceipt, WalletEntry};
