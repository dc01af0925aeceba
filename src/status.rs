// System status display: backend, store row counts, and who is signed in.

use anyhow::Result;
use chrono::Utc;
use std::path::Path;

use crate::config::Config;
use crate::identity::AppContext;

/// Display system status to the terminal.
pub async fn show(ctx: &AppContext, config: &Config, demo_mode: bool) -> Result<()> {
    if !Path::new(&config.db_path).exists() {
        println!("Database: not initialized");
        println!("\nRun `yallwall init` to set up the database.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&config.db_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", config.db_path, file_size);

    let backend = if demo_mode || !config.has_hosted_backend() {
        "local (demo mode)".to_string()
    } else {
        format!("hosted ({})", config.api_url)
    };
    println!("Backend: {backend}");

    let stats = ctx.store().stats(Utc::now()).await?;
    println!(
        "Posts: {} live, {} expired",
        stats.live_posts, stats.expired_posts
    );
    println!(
        "Engagement: {} likes, {} replies, {} tips",
        stats.likes, stats.replies, stats.tips
    );
    println!("Profiles: {}", stats.profiles);

    match ctx.viewer() {
        Some(profile) => println!(
            "Signed in: {} (@{}), {} YallPoints",
            profile.label(),
            profile.username,
            profile.balance
        ),
        None => {
            println!("Signed in: no");
            println!("  Run `yallwall login` or `yallwall signup` to post and tip");
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
