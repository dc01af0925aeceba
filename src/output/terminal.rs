// Colored terminal output for the feed, threads, wallet and profile.
//
// main.rs display calls delegate here.

use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};

use super::{format_points, format_relative, format_remaining, truncate_chars};
use crate::db::models::{Category, Post, Profile};
use crate::engagement::{LikeOutcome, ReplyView, TipDirection, TipReceipt, WalletEntry};
use crate::feed::{FeedEntry, FeedTab};

fn colorize_category(category: Category) -> ColoredString {
    match category {
        Category::Alerts => "ALERT".red().bold(),
        Category::Deals => "DEAL".green().bold(),
        Category::Hot => "HOT".bright_red(),
        Category::Live => "LIVE".cyan(),
    }
}

fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// The feed under one tab.
pub fn display_feed(entries: &[FeedEntry], tab: FeedTab, now: DateTime<Utc>) {
    if entries.is_empty() {
        println!("Nothing on the {tab} tab right now. Be the first: `yallwall post \"...\"`");
        return;
    }

    println!(
        "\n{}",
        format!("=== YallWall: {} ({} posts) ===", tab, entries.len()).bold()
    );
    println!();

    for entry in entries {
        display_feed_entry(entry, now);
    }
}

fn display_feed_entry(entry: &FeedEntry, now: DateTime<Utc>) {
    let post = &entry.post;
    let hot = if entry.is_hot {
        format!(" {}", "HOT".bright_red().bold())
    } else {
        String::new()
    };
    let location = post
        .location_name
        .as_deref()
        .map(|l| format!(" · {l}"))
        .unwrap_or_default();

    println!(
        "  [{}] {} {}{}{}  {}",
        entry.initials.bold(),
        entry.author_label.bold(),
        format_relative(post.created_at, now).dimmed(),
        location.dimmed(),
        hot,
        colorize_category(post.category),
    );
    println!("      {}", post.body);
    if let Some(image) = &post.image_url {
        println!("      {}", format!("[image] {image}").dimmed());
    }

    let heart = if entry.liked_by_me {
        "♥".red().to_string()
    } else {
        "♡".normal().to_string()
    };
    println!(
        "      {} {}   ${} tips   {} replies   {}   {}",
        heart,
        post.likes,
        post.tips,
        entry.reply_count,
        format_remaining(post.expires_at, now).dimmed(),
        post.id.as_str().dimmed(),
    );
    println!();
}

/// A post with its reply thread.
pub fn display_thread(post: &Post, replies: &[ReplyView], viewer_id: Option<&str>, now: DateTime<Utc>) {
    println!(
        "\n{} {}",
        colorize_category(post.category),
        truncate_chars(&post.body, 80).bold()
    );
    println!("  {}", format_relative(post.created_at, now).dimmed());
    println!("  {}", "-".repeat(60).dimmed());

    if replies.is_empty() {
        println!("  No replies yet.");
        return;
    }
    for view in replies {
        let mine = if viewer_id == Some(view.reply.author_id.as_str()) {
            format!(" {}", "(you)".dimmed())
        } else {
            String::new()
        };
        println!(
            "  [{}] {}{} {}  {}",
            view.initials.bold(),
            view.author_label,
            mine,
            format_relative(view.reply.created_at, now).dimmed(),
            view.reply.id.as_str().dimmed(),
        );
        println!("      {}", view.reply.body);
    }
}

pub fn display_like_outcome(outcome: &LikeOutcome) {
    match outcome {
        LikeOutcome::Applied { liked: true, count } => {
            println!("{} Liked ({} likes)", "♥".red(), count)
        }
        LikeOutcome::Applied { liked: false, count } => println!("Unliked ({count} likes)"),
        LikeOutcome::RolledBack { count, .. } => println!(
            "{} Couldn't save your like, still at {} likes",
            "!".yellow(),
            count
        ),
        LikeOutcome::Ignored => println!("Still saving your last tap, try again in a moment"),
    }
}

pub fn display_tip_receipt(receipt: &TipReceipt) {
    println!(
        "{} Tipped {} {} YallPoints",
        "$".green().bold(),
        receipt.recipient_label.bold(),
        receipt.transaction.amount,
    );
    println!("  Balance: {}", format_points(receipt.new_balance));
}

/// Balance, lifetime totals and recent tips.
pub fn display_wallet(profile: &Profile, entries: &[WalletEntry], now: DateTime<Utc>) {
    println!("\n{}", "=== Wallet ===".bold());
    println!("  Balance:        {} YallPoints", format_points(profile.balance).bold());
    println!("  Lifetime earned: {}", format_points(profile.earned));
    println!(
        "  Tips given: {}   Tips received: {}",
        profile.tips_given, profile.tips_received
    );
    println!();

    if entries.is_empty() {
        println!("  No tips yet.");
        return;
    }
    for entry in entries {
        let tx = &entry.transaction;
        let (sign, who) = match entry.direction {
            TipDirection::Sent => ("-".red(), format!("to {}", short_id(&tx.receiver_id))),
            TipDirection::Received => ("+".green(), format!("from {}", short_id(&tx.sender_id))),
        };
        let kind = if tx.is_profile_tip { "profile" } else { "post" };
        println!(
            "  {}{:>5}  {:<16} {:<8} {}",
            sign,
            tx.amount,
            who,
            kind.dimmed(),
            format_relative(tx.created_at, now).dimmed(),
        );
    }
}

pub fn display_profile(profile: &Profile) {
    println!("\n{}", format!("=== {} ===", profile.label()).bold());
    println!("  Username: @{}", profile.username);
    if let Some(city) = &profile.city {
        println!("  City: {city}");
    }
    let account = if profile.is_business() {
        "business".green().to_string()
    } else {
        "regular".normal().to_string()
    };
    let verified = if profile.is_verified { " (verified)" } else { "" };
    println!("  Account: {account}{verified}");
    println!("  YallPoints: {}", format_points(profile.balance));
    println!("  Member since: {}", profile.created_at.format("%Y-%m-%d"));
}

/// The viewer's own posts, live and expired.
pub fn display_my_posts(posts: &[Post], now: DateTime<Utc>) {
    if posts.is_empty() {
        println!("You haven't posted yet.");
        return;
    }
    let live = posts.iter().filter(|p| p.is_live_at(now)).count();
    println!(
        "\n{}",
        format!("=== My posts ({} live, {} expired) ===", live, posts.len() - live).bold()
    );
    for post in posts {
        let status = if post.is_live_at(now) {
            format_remaining(post.expires_at, now).green()
        } else {
            "expired".dimmed()
        };
        println!(
            "  {} {:<60} ♥ {}  $ {}  {}",
            post.id.as_str().dimmed(),
            truncate_chars(&post.body, 57),
            post.likes,
            post.tips,
            status,
        );
    }
}
