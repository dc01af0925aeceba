// Feed tabs: Live, Hot, Alerts and Deals as filters over the loaded list.
//
// Tabs never trigger a fetch. The Hot tab ignores post age; the
// time-windowed hot badge lives in engagement::classify.

use crate::db::models::{Category, Post};
use crate::engagement::classify::HOT_MIN_LIKES;

/// Filter tabs over the loaded feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedTab {
    #[default]
    Live,
    Hot,
    Alerts,
    Deals,
}

impl FeedTab {
    pub const ALL: [FeedTab; 4] = [FeedTab::Live, FeedTab::Hot, FeedTab::Alerts, FeedTab::Deals];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedTab::Live => "live",
            FeedTab::Hot => "hot",
            FeedTab::Alerts => "alerts",
            FeedTab::Deals => "deals",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "live" | "all" => Some(FeedTab::Live),
            "hot" => Some(FeedTab::Hot),
            "alerts" | "alert" => Some(FeedTab::Alerts),
            "deals" | "deal" => Some(FeedTab::Deals),
            _ => None,
        }
    }

    /// Whether `post` shows under this tab. Expiry is checked separately.
    ///
    /// The hot tab is looser than the hot badge: any tip at all, or the
    /// badge's like threshold, regardless of age.
    pub fn matches(&self, post: &Post) -> bool {
        match self {
            FeedTab::Live => true,
            FeedTab::Hot => post.tips > 0 || post.likes >= HOT_MIN_LIKES,
            FeedTab::Alerts => post.category == Category::Alerts || post.is_important,
            FeedTab::Deals => post.category == Category::Deals || post.is_business,
        }
    }
}

impl std::fmt::Display for FeedTab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
