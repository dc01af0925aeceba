// Data models: Rust structs that map to store rows.
//
// Field names follow the hosted backend's column names on the wire
// (`messages.content`, `profiles.yallpoints`, ...) so the same types
// deserialize from the REST adapter and from the local SQLite store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub type PostId = String;
pub type ReplyId = String;
pub type UserId = String;

/// Posts stay on the wall for this long after creation.
pub const POST_LIFETIME_HOURS: i64 = 24;

/// Maximum post body length, counted in characters.
pub const MAX_POST_CHARS: usize = 280;

/// Balance granted to a profile on first sign-in.
pub const STARTING_BALANCE: u32 = 250;

/// Display category of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Live,
    Hot,
    Alerts,
    Deals,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Live => "live",
            Category::Hot => "hot",
            Category::Alerts => "alerts",
            Category::Deals => "deals",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "live" => Some(Category::Live),
            "hot" => Some(Category::Hot),
            "alerts" => Some(Category::Alerts),
            "deals" => Some(Category::Deals),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Author-chosen override applied at compose time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManualFlag {
    Alert,
    Business,
}

impl ManualFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManualFlag::Alert => "alert",
            ManualFlag::Business => "business",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "alert" => Some(ManualFlag::Alert),
            "business" => Some(ManualFlag::Business),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Regular,
    Business,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Regular => "regular",
            AccountType::Business => "business",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "business" => AccountType::Business,
            _ => AccountType::Regular,
        }
    }
}

/// A message on the wall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    #[serde(rename = "user_id")]
    pub author_id: UserId,
    #[serde(rename = "content")]
    pub body: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub location_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub tips: u32,
    /// Not a stored column on the hosted backend; filled in by the feed's
    /// batched reply count.
    #[serde(default, skip_serializing)]
    pub reply_count: u32,
    pub category: Category,
    #[serde(default)]
    pub manual_flag: Option<ManualFlag>,
    #[serde(default)]
    pub is_important: bool,
    #[serde(default, rename = "is_business_post")]
    pub is_business: bool,
}

impl Post {
    /// A post is on the wall only while `now < expires_at`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_hot_at(&self, now: DateTime<Utc>) -> bool {
        crate::engagement::classify::is_hot_at(self.likes, self.tips, self.created_at, now)
    }
}

/// Insert payload for a post. The store assigns the id.
#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    #[serde(rename = "user_id")]
    pub author_id: UserId,
    #[serde(rename = "content")]
    pub body: String,
    pub image_url: Option<String>,
    pub location_name: Option<String>,
    pub category: Category,
    pub manual_flag: Option<ManualFlag>,
    pub is_important: bool,
    #[serde(rename = "is_business_post")]
    pub is_business: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Expiry for a post created at `created_at`.
pub fn expiry_for(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::hours(POST_LIFETIME_HOURS)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: ReplyId,
    #[serde(rename = "message_id")]
    pub post_id: PostId,
    #[serde(rename = "user_id")]
    pub author_id: UserId,
    #[serde(rename = "content")]
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewReply {
    #[serde(rename = "message_id")]
    pub post_id: PostId,
    #[serde(rename = "user_id")]
    pub author_id: UserId,
    #[serde(rename = "content")]
    pub body: String,
}

/// "User X likes post Y". Presence of the row is the whole fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LikeEdge {
    pub user_id: UserId,
    #[serde(rename = "message_id")]
    pub post_id: PostId,
}

/// A recorded tip from one profile to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipTransaction {
    pub id: String,
    #[serde(rename = "from_user_id")]
    pub sender_id: UserId,
    #[serde(rename = "to_user_id")]
    pub receiver_id: UserId,
    #[serde(default, rename = "message_id")]
    pub post_id: Option<PostId>,
    pub amount: u32,
    #[serde(default)]
    pub is_profile_tip: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTip {
    #[serde(rename = "from_user_id")]
    pub sender_id: UserId,
    #[serde(rename = "to_user_id")]
    pub receiver_id: UserId,
    #[serde(rename = "message_id")]
    pub post_id: Option<PostId>,
    pub amount: u32,
    pub is_profile_tip: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    /// Spendable points.
    #[serde(default, rename = "yallpoints")]
    pub balance: u32,
    /// Lifetime points received through tips. Not spendable.
    #[serde(default, rename = "yallpoints_earned")]
    pub earned: u32,
    #[serde(default)]
    pub tips_given: u32,
    #[serde(default)]
    pub tips_received: u32,
    #[serde(default)]
    pub account_type: AccountType,
    #[serde(default)]
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// The profile created the first time a user signs in.
    pub fn first_sign_in(user_id: &str, email: Option<&str>, now: DateTime<Utc>) -> Self {
        let username = email
            .and_then(|e| e.split('@').next())
            .filter(|s| !s.is_empty())
            .unwrap_or("user")
            .to_string();
        Self {
            id: user_id.to_string(),
            display_name: Some(username.clone()),
            username,
            city: None,
            balance: STARTING_BALANCE,
            earned: 0,
            tips_given: 0,
            tips_received: 0,
            account_type: AccountType::Regular,
            is_verified: false,
            created_at: now,
        }
    }

    /// Name shown next to this profile's posts and replies.
    pub fn label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ if !self.username.is_empty() => self.username.as_str(),
            _ => "Anonymous",
        }
    }

    pub fn is_business(&self) -> bool {
        self.account_type == AccountType::Business
    }
}

/// Editable profile fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.username.is_none() && self.city.is_none()
    }

    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(name) = &self.display_name {
            profile.display_name = Some(name.clone());
        }
        if let Some(username) = &self.username {
            profile.username = username.clone();
        }
        if let Some(city) = &self.city {
            profile.city = Some(city.clone());
        }
    }
}

/// Row counts reported by `yallwall status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub live_posts: u64,
    pub expired_posts: u64,
    pub replies: u64,
    pub likes: u64,
    pub tips: u64,
    pub profiles: u64,
}
