// Database queries: CRUD operations for the local store.
//
// Every SQL statement lives in this module. SqliteStore wraps these free
// functions behind the async ContentStore trait, and unit tests exercise
// them directly against an in-memory Connection.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::models::{
    AccountType, Category, ManualFlag, NewPost, NewReply, NewTip, Post, Profile, ProfileUpdate,
    Reply, StoreStats, TipTransaction,
};

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// `?1, ?2, ...` placeholders for an IN (...) list starting at `first`.
fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

// --- Posts ---

const POST_COLUMNS: &str = "m.id, m.user_id, m.content, m.image_url, m.location_name,
     m.created_at, m.expires_at, m.likes, m.tips,
     (SELECT COUNT(*) FROM replies r WHERE r.message_id = m.id),
     m.category, m.manual_flag, m.is_important, m.is_business_post";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let category: String = row.get(10)?;
    let manual_flag: Option<String> = row.get(11)?;
    Ok(Post {
        id: row.get(0)?,
        author_id: row.get(1)?,
        body: row.get(2)?,
        image_url: row.get(3)?,
        location_name: row.get(4)?,
        created_at: from_millis(row.get(5)?),
        expires_at: from_millis(row.get(6)?),
        likes: row.get(7)?,
        tips: row.get(8)?,
        reply_count: row.get(9)?,
        category: Category::parse(&category).unwrap_or(Category::Live),
        manual_flag: manual_flag.as_deref().and_then(ManualFlag::parse),
        is_important: row.get::<_, i32>(12)? != 0,
        is_business: row.get::<_, i32>(13)? != 0,
    })
}

/// Insert a post and return the stored row.
pub fn insert_post(conn: &Connection, post: &NewPost) -> Result<Post> {
    let id = new_id();
    conn.execute(
        "INSERT INTO messages
            (id, user_id, content, image_url, location_name, created_at, expires_at,
             category, manual_flag, is_important, is_business_post)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            id,
            post.author_id,
            post.body,
            post.image_url,
            post.location_name,
            to_millis(post.created_at),
            to_millis(post.expires_at),
            post.category.as_str(),
            post.manual_flag.map(|f| f.as_str()),
            post.is_important,
            post.is_business,
        ],
    )
    .context("Failed to insert post")?;

    get_post(conn, &id)?.context("Inserted post vanished")
}

pub fn get_post(conn: &Connection, id: &str) -> Result<Option<Post>> {
    let sql = format!("SELECT {POST_COLUMNS} FROM messages m WHERE m.id = ?1");
    let post = conn
        .query_row(&sql, params![id], post_from_row)
        .optional()?;
    Ok(post)
}

/// Delete a post. Replies and like edges go with it.
pub fn delete_post(conn: &Connection, id: &str) -> Result<bool> {
    conn.execute("DELETE FROM replies WHERE message_id = ?1", params![id])?;
    conn.execute("DELETE FROM user_likes WHERE message_id = ?1", params![id])?;
    let n = conn.execute("DELETE FROM messages WHERE id = ?1", params![id])?;
    Ok(n > 0)
}

/// One page of unexpired posts, newest first.
pub fn fetch_live_posts(
    conn: &Connection,
    now: DateTime<Utc>,
    offset: usize,
    limit: usize,
) -> Result<Vec<Post>> {
    let sql = format!(
        "SELECT {POST_COLUMNS} FROM messages m
         WHERE m.expires_at > ?1
         ORDER BY m.created_at DESC, m.id DESC
         LIMIT ?2 OFFSET ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![to_millis(now), limit as i64, offset as i64],
        post_from_row,
    )?;

    let mut posts = Vec::new();
    for row in rows {
        posts.push(row?);
    }
    Ok(posts)
}

/// Every post by one author, expired or not, newest first.
pub fn fetch_posts_by_author(conn: &Connection, author_id: &str) -> Result<Vec<Post>> {
    let sql = format!(
        "SELECT {POST_COLUMNS} FROM messages m
         WHERE m.user_id = ?1
         ORDER BY m.created_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![author_id], post_from_row)?;

    let mut posts = Vec::new();
    for row in rows {
        posts.push(row?);
    }
    Ok(posts)
}

/// Overwrite the denormalized like count.
pub fn update_like_count(conn: &Connection, post_id: &str, likes: u32) -> Result<()> {
    let n = conn.execute(
        "UPDATE messages SET likes = ?2 WHERE id = ?1",
        params![post_id, likes],
    )?;
    if n == 0 {
        anyhow::bail!("No post with id {post_id}");
    }
    Ok(())
}

// --- Like edges ---

/// Insert a like edge. Fails if the edge already exists.
pub fn insert_like(conn: &Connection, user_id: &str, post_id: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO user_likes (user_id, message_id, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, post_id, to_millis(Utc::now())],
    )
    .with_context(|| format!("Failed to insert like edge ({user_id}, {post_id})"))?;
    Ok(())
}

pub fn delete_like(conn: &Connection, user_id: &str, post_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM user_likes WHERE user_id = ?1 AND message_id = ?2",
        params![user_id, post_id],
    )?;
    Ok(())
}

pub fn fetch_liked_post_ids(conn: &Connection, user_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT message_id FROM user_likes WHERE user_id = ?1")?;
    let rows = stmt.query_map(params![user_id], |row| row.get(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

// --- Replies ---

fn reply_from_row(row: &Row<'_>) -> rusqlite::Result<Reply> {
    Ok(Reply {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        body: row.get(3)?,
        created_at: from_millis(row.get(4)?),
    })
}

pub fn insert_reply(conn: &Connection, reply: &NewReply) -> Result<Reply> {
    let id = new_id();
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO replies (id, message_id, user_id, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id,
            reply.post_id,
            reply.author_id,
            reply.body,
            to_millis(created_at)
        ],
    )
    .context("Failed to insert reply")?;

    get_reply(conn, &id)?.context("Inserted reply vanished")
}

pub fn get_reply(conn: &Connection, id: &str) -> Result<Option<Reply>> {
    let reply = conn
        .query_row(
            "SELECT id, message_id, user_id, content, created_at FROM replies WHERE id = ?1",
            params![id],
            reply_from_row,
        )
        .optional()?;
    Ok(reply)
}

pub fn delete_reply(conn: &Connection, id: &str) -> Result<bool> {
    let n = conn.execute("DELETE FROM replies WHERE id = ?1", params![id])?;
    Ok(n > 0)
}

/// Replies for a post, oldest first.
pub fn fetch_replies(conn: &Connection, post_id: &str) -> Result<Vec<Reply>> {
    let mut stmt = conn.prepare(
        "SELECT id, message_id, user_id, content, created_at
         FROM replies
         WHERE message_id = ?1
         ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![post_id], reply_from_row)?;

    let mut replies = Vec::new();
    for row in rows {
        replies.push(row?);
    }
    Ok(replies)
}

/// Reply counts for a batch of posts. Posts with no replies are absent.
pub fn count_replies(conn: &Connection, post_ids: &[String]) -> Result<HashMap<String, u32>> {
    if post_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!(
        "SELECT message_id, COUNT(*) FROM replies
         WHERE message_id IN ({})
         GROUP BY message_id",
        placeholders(1, post_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(post_ids.iter()), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
    })?;

    let mut counts = HashMap::new();
    for row in rows {
        let (id, count) = row?;
        counts.insert(id, count);
    }
    Ok(counts)
}

// --- Tips ---

fn tip_from_row(row: &Row<'_>) -> rusqlite::Result<TipTransaction> {
    Ok(TipTransaction {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        post_id: row.get(3)?,
        amount: row.get(4)?,
        is_profile_tip: row.get::<_, i32>(5)? != 0,
        created_at: from_millis(row.get(6)?),
    })
}

pub fn insert_tip(conn: &Connection, tip: &NewTip) -> Result<TipTransaction> {
    let id = new_id();
    conn.execute(
        "INSERT INTO tips (id, from_user_id, to_user_id, message_id, amount, is_profile_tip, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            tip.sender_id,
            tip.receiver_id,
            tip.post_id,
            tip.amount,
            tip.is_profile_tip,
            to_millis(Utc::now()),
        ],
    )
    .context("Failed to insert tip")?;

    let tip = conn.query_row(
        "SELECT id, from_user_id, to_user_id, message_id, amount, is_profile_tip, created_at
         FROM tips WHERE id = ?1",
        params![id],
        tip_from_row,
    )?;
    Ok(tip)
}

/// Tips sent or received by a user, newest first.
pub fn fetch_tips_for_user(
    conn: &Connection,
    user_id: &str,
    limit: u32,
) -> Result<Vec<TipTransaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, from_user_id, to_user_id, message_id, amount, is_profile_tip, created_at
         FROM tips
         WHERE from_user_id = ?1 OR to_user_id = ?1
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![user_id, limit], tip_from_row)?;

    let mut tips = Vec::new();
    for row in rows {
        tips.push(row?);
    }
    Ok(tips)
}

// --- Profiles ---

const PROFILE_COLUMNS: &str = "id, username, display_name, city, yallpoints, yallpoints_earned,
     tips_given, tips_received, account_type, is_verified, created_at";

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    let account_type: String = row.get(8)?;
    Ok(Profile {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        city: row.get(3)?,
        balance: row.get(4)?,
        earned: row.get(5)?,
        tips_given: row.get(6)?,
        tips_received: row.get(7)?,
        account_type: AccountType::parse(&account_type),
        is_verified: row.get::<_, i32>(9)? != 0,
        created_at: from_millis(row.get(10)?),
    })
}

pub fn get_profile(conn: &Connection, id: &str) -> Result<Option<Profile>> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1");
    let profile = conn
        .query_row(&sql, params![id], profile_from_row)
        .optional()?;
    Ok(profile)
}

/// Batched profile lookup (`id IN (...)`).
pub fn get_profiles(conn: &Connection, ids: &[String]) -> Result<Vec<Profile>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id IN ({})",
        placeholders(1, ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), profile_from_row)?;

    let mut profiles = Vec::new();
    for row in rows {
        profiles.push(row?);
    }
    Ok(profiles)
}

/// Save or replace a profile.
pub fn upsert_profile(conn: &Connection, p: &Profile) -> Result<()> {
    conn.execute(
        "INSERT INTO profiles
            (id, username, display_name, city, yallpoints, yallpoints_earned,
             tips_given, tips_received, account_type, is_verified, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET
            username = ?2,
            display_name = ?3,
            city = ?4,
            yallpoints = ?5,
            yallpoints_earned = ?6,
            tips_given = ?7,
            tips_received = ?8,
            account_type = ?9,
            is_verified = ?10",
        params![
            p.id,
            p.username,
            p.display_name,
            p.city,
            p.balance,
            p.earned,
            p.tips_given,
            p.tips_received,
            p.account_type.as_str(),
            p.is_verified,
            to_millis(p.created_at),
        ],
    )?;
    Ok(())
}

/// Apply a partial profile edit and return the updated row.
pub fn update_profile(
    conn: &Connection,
    id: &str,
    update: &ProfileUpdate,
) -> Result<Option<Profile>> {
    conn.execute(
        "UPDATE profiles SET
            display_name = COALESCE(?2, display_name),
            username = COALESCE(?3, username),
            city = COALESCE(?4, city)
         WHERE id = ?1",
        params![id, update.display_name, update.username, update.city],
    )?;
    get_profile(conn, id)
}

pub fn set_balance(conn: &Connection, id: &str, balance: u32) -> Result<()> {
    let n = conn.execute(
        "UPDATE profiles SET yallpoints = ?2 WHERE id = ?1",
        params![id, balance],
    )?;
    if n == 0 {
        anyhow::bail!("No profile with id {id}");
    }
    Ok(())
}

/// Credit a recipient's lifetime-earned counter (not their balance).
pub fn increment_earned_points(conn: &Connection, id: &str, amount: u32) -> Result<()> {
    let n = conn.execute(
        "UPDATE profiles SET yallpoints_earned = yallpoints_earned + ?2 WHERE id = ?1",
        params![id, amount],
    )?;
    if n == 0 {
        anyhow::bail!("No profile with id {id}");
    }
    Ok(())
}

// --- Local accounts ---

/// Stored credentials for the local identity provider.
#[derive(Debug, Clone)]
pub struct AccountRow {
    pub email: String,
    pub user_id: String,
    pub password_salt: String,
    pub password_digest: String,
}

pub fn insert_account(conn: &Connection, account: &AccountRow) -> Result<()> {
    conn.execute(
        "INSERT INTO accounts (email, user_id, password_salt, password_digest, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            account.email,
            account.user_id,
            account.password_salt,
            account.password_digest,
            to_millis(Utc::now()),
        ],
    )
    .with_context(|| format!("Account {} already exists", account.email))?;
    Ok(())
}

pub fn get_account_by_email(conn: &Connection, email: &str) -> Result<Option<AccountRow>> {
    get_account(conn, "email", email)
}

pub fn get_account_by_user_id(conn: &Connection, user_id: &str) -> Result<Option<AccountRow>> {
    get_account(conn, "user_id", user_id)
}

fn get_account(conn: &Connection, column: &str, value: &str) -> Result<Option<AccountRow>> {
    let sql = format!(
        "SELECT email, user_id, password_salt, password_digest FROM accounts WHERE {column} = ?1"
    );
    let account = conn
        .query_row(&sql, params![value], |row| {
            Ok(AccountRow {
                email: row.get(0)?,
                user_id: row.get(1)?,
                password_salt: row.get(2)?,
                password_digest: row.get(3)?,
            })
        })
        .optional()?;
    Ok(account)
}

// --- Client flags ---

pub fn get_flag(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM client_flags WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn set_flag(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO client_flags (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

pub fn clear_flag(conn: &Connection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM client_flags WHERE key = ?1", params![key])?;
    Ok(())
}

// --- Stats ---

pub fn store_stats(conn: &Connection, now: DateTime<Utc>) -> Result<StoreStats> {
    let count = |sql: &str| -> Result<u64> {
        let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    };
    let live: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE expires_at > ?1",
        params![to_millis(now)],
        |row| row.get(0),
    )?;
    let total = count("SELECT COUNT(*) FROM messages")?;
    let live = live.max(0) as u64;

    Ok(StoreStats {
        live_posts: live,
        expired_posts: total.saturating_sub(live),
        replies: count("SELECT COUNT(*) FROM replies")?,
        likes: count("SELECT COUNT(*) FROM user_likes")?,
        tips: count("SELECT COUNT(*) FROM tips")?,
        profiles: count("SELECT COUNT(*) FROM profiles")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{expiry_for, Category};
    use crate::db::schema::create_tables;
    use chrono::Duration;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn
    }

    fn new_post(author: &str, body: &str, created_at: DateTime<Utc>) -> NewPost {
        NewPost {
            author_id: author.to_string(),
            body: body.to_string(),
            image_url: None,
            location_name: None,
            category: Category::Live,
            manual_flag: None,
            is_important: false,
            is_business: false,
            created_at,
            expires_at: expiry_for(created_at),
        }
    }

    #[test]
    fn test_insert_and_get_post() {
        let conn = test_conn();
        let now = Utc::now();
        let post = insert_post(&conn, &new_post("u1", "hello", now)).unwrap();
        let loaded = get_post(&conn, &post.id).unwrap().unwrap();
        assert_eq!(loaded.body, "hello");
        assert_eq!(loaded.created_at.timestamp_millis(), now.timestamp_millis());
        assert_eq!(loaded.likes, 0);
    }

    #[test]
    fn test_fetch_live_posts_excludes_expired_and_orders_newest_first() {
        let conn = test_conn();
        let now = Utc::now();
        insert_post(&conn, &new_post("u1", "old", now - Duration::hours(30))).unwrap();
        insert_post(&conn, &new_post("u1", "older", now - Duration::hours(2))).unwrap();
        insert_post(&conn, &new_post("u1", "newest", now - Duration::minutes(1))).unwrap();

        let posts = fetch_live_posts(&conn, now, 0, 10).unwrap();
        let bodies: Vec<&str> = posts.iter().map(|p| p.body.as_str()).collect();
        assert_eq!(bodies, vec!["newest", "older"]);
    }

    #[test]
    fn test_fetch_live_posts_offset_paging() {
        let conn = test_conn();
        let now = Utc::now();
        for i in 0..5 {
            insert_post(
                &conn,
                &new_post("u1", &format!("p{i}"), now - Duration::minutes(i)),
            )
            .unwrap();
        }
        let page0 = fetch_live_posts(&conn, now, 0, 2).unwrap();
        let page2 = fetch_live_posts(&conn, now, 4, 2).unwrap();
        assert_eq!(page0.len(), 2);
        assert_eq!(page0[0].body, "p0");
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].body, "p4");
    }

    #[test]
    fn test_duplicate_like_edge_is_rejected() {
        let conn = test_conn();
        let post = insert_post(&conn, &new_post("u1", "x", Utc::now())).unwrap();
        insert_like(&conn, "u2", &post.id).unwrap();
        assert!(insert_like(&conn, "u2", &post.id).is_err());
        assert_eq!(fetch_liked_post_ids(&conn, "u2").unwrap(), vec![post.id.clone()]);
        delete_like(&conn, "u2", &post.id).unwrap();
        assert!(fetch_liked_post_ids(&conn, "u2").unwrap().is_empty());
    }

    #[test]
    fn test_count_replies_batches_by_post() {
        let conn = test_conn();
        let a = insert_post(&conn, &new_post("u1", "a", Utc::now())).unwrap();
        let b = insert_post(&conn, &new_post("u1", "b", Utc::now())).unwrap();
        for body in ["one", "two"] {
            insert_reply(
                &conn,
                &NewReply {
                    post_id: a.id.clone(),
                    author_id: "u2".to_string(),
                    body: body.to_string(),
                },
            )
            .unwrap();
        }
        let counts = count_replies(&conn, &[a.id.clone(), b.id.clone()]).unwrap();
        assert_eq!(counts.get(&a.id), Some(&2));
        assert_eq!(counts.get(&b.id), None);
        assert_eq!(get_post(&conn, &a.id).unwrap().unwrap().reply_count, 2);
    }

    #[test]
    fn test_update_like_count_missing_post_errors() {
        let conn = test_conn();
        assert!(update_like_count(&conn, "nope", 3).is_err());
    }

    #[test]
    fn test_increment_earned_points_leaves_balance_alone() {
        let conn = test_conn();
        let p = Profile::first_sign_in("u1", Some("u1@x.y"), Utc::now());
        upsert_profile(&conn, &p).unwrap();
        increment_earned_points(&conn, "u1", 7).unwrap();
        let loaded = get_profile(&conn, "u1").unwrap().unwrap();
        assert_eq!(loaded.earned, 7);
        assert_eq!(loaded.balance, p.balance);
    }

    #[test]
    fn test_get_profiles_in_set() {
        let conn = test_conn();
        for id in ["a", "b", "c"] {
            upsert_profile(&conn, &Profile::first_sign_in(id, None, Utc::now())).unwrap();
        }
        let found = get_profiles(&conn, &["a".to_string(), "c".to_string(), "zz".to_string()])
            .unwrap();
        let mut ids: Vec<_> = found.iter().map(|p| p.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_update_profile_partial() {
        let conn = test_conn();
        upsert_profile(&conn, &Profile::first_sign_in("u1", Some("jo@x.y"), Utc::now())).unwrap();
        let updated = update_profile(
            &conn,
            "u1",
            &ProfileUpdate {
                display_name: Some("Jo B.".to_string()),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Jo B."));
        assert_eq!(updated.username, "jo");
    }

    #[test]
    fn test_flags_roundtrip() {
        let conn = test_conn();
        assert_eq!(get_flag(&conn, "demo_mode").unwrap(), None);
        set_flag(&conn, "demo_mode", "true").unwrap();
        assert_eq!(get_flag(&conn, "demo_mode").unwrap().as_deref(), Some("true"));
        clear_flag(&conn, "demo_mode").unwrap();
        assert_eq!(get_flag(&conn, "demo_mode").unwrap(), None);
    }

    #[test]
    fn test_store_stats_splits_live_and_expired() {
        let conn = test_conn();
        let now = Utc::now();
        insert_post(&conn, &new_post("u1", "live", now)).unwrap();
        insert_post(&conn, &new_post("u1", "gone", now - Duration::hours(25))).unwrap();
        let stats = store_stats(&conn, now).unwrap();
        assert_eq!(stats.live_posts, 1);
        assert_eq!(stats.expired_posts, 1);
    }
}
