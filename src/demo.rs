// Sample wall for demo mode: a handful of neighbours, posts and replies
// written through the ContentStore so every derived field (category,
// expiry, counters) is computed the normal way.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::db::models::{
    expiry_for, AccountType, Category, ManualFlag, NewPost, NewReply, NewTip, Profile,
};
use crate::db::ContentStore;
use crate::engagement::classify::categorize;

struct SampleUser {
    id: &'static str,
    username: &'static str,
    display_name: &'static str,
    business: bool,
}

struct SamplePost {
    author: usize,
    minutes_ago: i64,
    body: &'static str,
    flag: Option<ManualFlag>,
    likes: u32,
    tips: &'static [usize],
    replies: &'static [(usize, &'static str)],
}

const USERS: &[SampleUser] = &[
    SampleUser { id: "demo-sarah", username: "sarahm", display_name: "Sarah M.", business: false },
    SampleUser { id: "demo-mike", username: "miket", display_name: "Mike T.", business: false },
    SampleUser { id: "demo-jessica", username: "jessk", display_name: "Jessica K.", business: false },
    SampleUser { id: "demo-marias", username: "mariascantina", display_name: "Maria's Cantina", business: true },
    SampleUser { id: "demo-tom", username: "tomw", display_name: "Tom W.", business: false },
];

const POSTS: &[SamplePost] = &[
    SamplePost {
        author: 0,
        minutes_ago: 2,
        body: "Storm warning for east side everyone! Stay safe!",
        flag: None,
        likes: 12,
        tips: &[1, 2, 4],
        replies: &[(1, "Thanks for the heads up!"), (2, "Staying inside!"), (4, "Which part of east side?")],
    },
    SamplePost {
        author: 1,
        minutes_ago: 5,
        body: "Best tacos I've ever had at Maria's on 6th Street right now! The line is long but worth it",
        flag: None,
        likes: 8,
        tips: &[0],
        replies: &[],
    },
    SamplePost {
        author: 2,
        minutes_ago: 12,
        body: "Lost my brown lab near Lamar & 6th, answers to Max!",
        flag: Some(ManualFlag::Alert),
        likes: 24,
        tips: &[0, 4],
        replies: &[(4, "What area specifically?"), (1, "I saw a brown dog near the park!")],
    },
    SamplePost {
        author: 3,
        minutes_ago: 20,
        body: "GIVEAWAY: First person to name our signature salsa wins dinner for 2! Comment below",
        flag: None,
        likes: 45,
        tips: &[],
        replies: &[(0, "Spicy Verde!"), (2, "Mango Habanero?")],
    },
    SamplePost {
        author: 4,
        minutes_ago: 180,
        body: "Anyone else hear the owls out by the creek last night?",
        flag: None,
        likes: 3,
        tips: &[],
        replies: &[],
    },
];

fn sample_profile(user: &SampleUser, now: DateTime<Utc>) -> Profile {
    let mut profile = Profile::first_sign_in(user.id, None, now - Duration::days(30));
    profile.username = user.username.to_string();
    profile.display_name = Some(user.display_name.to_string());
    profile.city = Some("Boyce, LA".to_string());
    if user.business {
        profile.account_type = AccountType::Business;
        profile.is_verified = true;
    }
    profile
}

/// Write the sample neighbours and posts. Returns how many posts were added.
///
/// Profiles are upserted, so seeding twice keeps one copy of each
/// neighbour but adds a second copy of every post.
pub async fn seed(store: &dyn ContentStore, now: DateTime<Utc>) -> Result<usize> {
    for user in USERS {
        store.upsert_profile(&sample_profile(user, now)).await?;
    }

    for sample in POSTS {
        let author = &USERS[sample.author];
        let created_at = now - Duration::minutes(sample.minutes_ago);
        let category = categorize(sample.body, sample.flag, author.business);
        let post = store
            .insert_post(&NewPost {
                author_id: author.id.to_string(),
                body: sample.body.to_string(),
                image_url: None,
                location_name: Some("Boyce, LA".to_string()),
                category,
                manual_flag: sample.flag,
                is_important: category == Category::Alerts,
                is_business: category == Category::Deals,
                created_at,
                expires_at: expiry_for(created_at),
            })
            .await?;
        store.update_like_count(&post.id, sample.likes).await?;

        for &tipper in sample.tips {
            store
                .insert_tip(&NewTip {
                    sender_id: USERS[tipper].id.to_string(),
                    receiver_id: author.id.to_string(),
                    post_id: Some(post.id.clone()),
                    amount: 5,
                    is_profile_tip: false,
                })
                .await?;
        }

        for &(replier, body) in sample.replies {
            store
                .insert_reply(&NewReply {
                    post_id: post.id.clone(),
                    author_id: USERS[replier].id.to_string(),
                    body: body.to_string(),
                })
                .await?;
        }
    }

    info!(posts = POSTS.len(), profiles = USERS.len(), "Demo wall seeded");
    Ok(POSTS.len())
}
