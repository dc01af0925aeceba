// Auto-categorization and the "hot" predicate.
//
// Both are pure functions of their inputs. Category precedence is fixed:
// an alert signal always beats a deal signal, and a manual flag only
// outranks keyword matches of its own kind or lower.

use chrono::{DateTime, Duration, Utc};

use crate::db::models::{Category, ManualFlag};

/// Body substrings that mark a post as an alert (matched lowercase).
pub const ALERT_KEYWORDS: &[&str] = &[
    "tornado",
    "storm",
    "warning",
    "emergency",
    "evacuate",
    "flooding",
    "power out",
    "outage",
    "accident",
    "road closed",
    "fire",
    "shooting",
    "missing",
    "amber alert",
    "shelter",
    "flood",
    "hurricane",
    "earthquake",
    "danger",
    "urgent",
];

/// Body substrings that mark a post as a local deal (matched lowercase).
pub const DEAL_KEYWORDS: &[&str] = &[
    "deal",
    "discount",
    "special",
    "sale",
    "off",
    "free",
    "happy hour",
    "open",
    "closed",
    "hours",
    "giveaway",
    "promo",
    "coupon",
    "bogo",
    "clearance",
];

/// Posts older than this are never hot.
pub const HOT_WINDOW_HOURS: i64 = 2;
pub const HOT_MIN_LIKES: u32 = 5;
pub const HOT_MIN_TIPS: u32 = 3;

fn contains_any(lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| lower.contains(kw))
}

/// Pick the display category for a new post. First match wins:
///
/// 1. manual `alert` flag
/// 2. alert keyword in the body
/// 3. manual `business` flag
/// 4. business account
/// 5. deal keyword in the body
/// 6. otherwise `live`
pub fn categorize(text: &str, manual_flag: Option<ManualFlag>, is_business: bool) -> Category {
    let lower = text.to_lowercase();

    if manual_flag == Some(ManualFlag::Alert) || contains_any(&lower, ALERT_KEYWORDS) {
        return Category::Alerts;
    }
    if manual_flag == Some(ManualFlag::Business)
        || is_business
        || contains_any(&lower, DEAL_KEYWORDS)
    {
        return Category::Deals;
    }
    Category::Live
}

/// Hot: at most 2 hours old (inclusive) and either 5+ likes or 3+ tips.
pub fn is_hot_at(likes: u32, tips: u32, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    if now - created_at > Duration::hours(HOT_WINDOW_HOURS) {
        return false;
    }
    likes >= HOT_MIN_LIKES || tips >= HOT_MIN_TIPS
}

/// `is_hot_at` against the wall clock.
pub fn is_hot(likes: u32, tips: u32, created_at: DateTime<Utc>) -> bool {
    is_hot_at(likes, tips, created_at, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_live() {
        assert_eq!(categorize("Nice sunset tonight", None, false), Category::Live);
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        assert_eq!(categorize("TORNADO sighted", None, false), Category::Alerts);
        assert_eq!(categorize("Big SALE today", None, false), Category::Deals);
    }

    #[test]
    fn test_multi_word_keyword() {
        assert_eq!(categorize("road closed on Main", None, false), Category::Alerts);
        assert_eq!(categorize("happy hour at 5", None, false), Category::Deals);
    }

    #[test]
    fn test_business_flag_loses_to_alert_keyword() {
        assert_eq!(
            categorize("fire at the plant", Some(ManualFlag::Business), false),
            Category::Alerts
        );
    }

    #[test]
    fn test_hot_needs_engagement() {
        let now = Utc::now();
        assert!(!is_hot_at(0, 0, now, now));
        assert!(is_hot_at(0, 3, now, now));
    }

    #[test]
    fn test_hot_window_is_inclusive() {
        let now = Utc::now();
        let created = now - Duration::hours(2);
        assert!(is_hot_at(5, 0, created, now));
        assert!(!is_hot_at(5, 0, created - Duration::milliseconds(1), now));
    }
}
