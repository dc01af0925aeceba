use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::{info, warn};

use yallwall::config::Config;
use yallwall::db::models::{ManualFlag, ProfileUpdate};
use yallwall::db::{ContentStore, SqliteStore};
use yallwall::engagement::{self, LikeTracker, ReplyThread};
use yallwall::feed::{self, Feed, FeedTab, LoadOutcome};
use yallwall::identity::{AppContext, IdentityProvider, LocalIdentity};
use yallwall::output::terminal;
use yallwall::prefs::Preferences;

/// YallWall: what's happening around you, for the next 24 hours.
///
/// Post to your local wall, like and reply to your neighbours, and tip
/// them YallPoints.
#[derive(Parser)]
#[command(name = "yallwall", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the local database
    Init,

    /// Create an account (asks for a password)
    Signup { email: String },

    /// Sign in with email and password, or get an OAuth sign-in link
    Login {
        /// Email address for password sign-in
        email: Option<String>,

        /// OAuth provider (e.g. google) to sign in with instead
        #[arg(long)]
        oauth: Option<String>,

        /// Where the OAuth provider should send you afterwards
        #[arg(long, default_value = "http://localhost:3000/auth/callback")]
        redirect_to: String,
    },

    /// Sign out
    Logout,

    /// Show who is signed in
    Whoami,

    /// Post to the wall (280 characters, gone in 24 hours)
    Post {
        body: String,

        /// Flag as a community alert
        #[arg(long, conflicts_with = "business")]
        alert: bool,

        /// Flag as a business post
        #[arg(long)]
        business: bool,

        /// Image reference to attach
        #[arg(long)]
        image: Option<String>,
    },

    /// Show the wall
    Feed {
        /// Tab: live, hot, alerts or deals
        #[arg(long, default_value = "live")]
        tab: String,

        /// Number of pages to load
        #[arg(long, default_value = "1")]
        pages: u32,
    },

    /// Follow the wall, refreshing as new posts arrive (Ctrl-C to stop)
    Watch {
        /// Tab: live, hot, alerts or deals
        #[arg(long, default_value = "live")]
        tab: String,
    },

    /// Like a post, or unlike it if you already do
    Like { post_id: String },

    /// Tip the author of a post, or a profile with --profile
    Tip {
        /// Post id (or user id with --profile)
        target: String,

        amount: u32,

        /// Treat the target as a user id and send a profile tip
        #[arg(long)]
        profile: bool,
    },

    /// Show your balance and recent tips
    Wallet {
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Show the replies on a post
    Replies { post_id: String },

    /// Reply to a post
    Reply { post_id: String, body: String },

    /// Delete one of your replies
    DeleteReply { post_id: String, reply_id: String },

    /// Delete one of your posts
    DeletePost { post_id: String },

    /// List your posts, including expired ones
    MyPosts,

    /// Show or edit your profile
    Profile {
        #[arg(long)]
        display_name: Option<String>,

        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        city: Option<String>,
    },

    /// Demo mode: use the local store instead of the hosted backend
    Demo {
        #[command(subcommand)]
        action: DemoAction,
    },

    /// Show system status (backend, row counts, signed-in user)
    Status,
}

#[derive(Subcommand)]
enum DemoAction {
    /// Switch to the local store
    On,
    /// Switch back to the hosted backend
    Off,
    /// Fill the local store with sample neighbours and posts
    Seed,
}

/// Everything a command needs once the backend is chosen.
struct App {
    config: Config,
    prefs: Arc<Preferences>,
    ctx: Arc<AppContext>,
    demo_mode: bool,
    #[cfg(feature = "hosted")]
    hosted: Option<Arc<yallwall::hosted::HostedStore>>,
}

impl App {
    fn new_feed(&self) -> Feed {
        Feed::new(self.config.page_size, self.config.feed_retry)
    }

    fn new_likes(&self) -> LikeTracker {
        LikeTracker::new(self.config.like_quiescence)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("yallwall=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Init => {
            info!("Initializing YallWall database...");
            let conn = yallwall::db::initialize(&config.db_path)?;
            let store = SqliteStore::new(conn);
            let table_count = store.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            if config.has_hosted_backend() {
                println!("\nHosted backend: {}", config.api_url);
                println!("Next: `yallwall signup <email>` or `yallwall login <email>`");
            } else {
                println!("\nNo YALLWALL_API_URL set, so everything stays on this machine.");
                println!("Try `yallwall demo seed` for a sample wall, then `yallwall feed`.");
            }
        }

        Commands::Signup { email } => {
            let app = open_app(config).await?;
            let password = prompt_password()?;
            let profile = app.ctx.sign_up(&email, &password).await?;
            println!("Welcome to YallWall, {}!", profile.label().bold());
            println!("You start with {} YallPoints.", profile.balance);
            show_onboarding(&app, &profile)?;
        }

        Commands::Login {
            email,
            oauth,
            redirect_to,
        } => {
            let app = open_app(config).await?;
            if let Some(provider) = oauth {
                let url = app.ctx.identity().oauth_authorize_url(&provider, &redirect_to)?;
                println!("Open this link to sign in with {provider}:\n\n  {url}");
                return Ok(());
            }
            let email = email.context("Give an email address, or use --oauth <provider>")?;
            let password = prompt_password()?;
            let profile = app.ctx.sign_in_password(&email, &password).await?;
            println!("Signed in as {}", profile.label().bold());
            show_onboarding(&app, &profile)?;
        }

        Commands::Logout => {
            let app = open_app(config).await?;
            app.ctx.sign_out().await?;
            println!("Signed out.");
        }

        Commands::Whoami => {
            let app = open_app(config).await?;
            match app.ctx.viewer() {
                Some(profile) => {
                    terminal::display_profile(&profile);
                    show_onboarding(&app, &profile)?;
                }
                None => println!("Not signed in. Browsing as a guest."),
            }
        }

        Commands::Post {
            body,
            alert,
            business,
            image,
        } => {
            let app = open_app(config).await?;
            let flag = if alert {
                Some(ManualFlag::Alert)
            } else if business {
                Some(ManualFlag::Business)
            } else {
                None
            };
            let post = engagement::create_post(&app.ctx, &body, flag, image).await?;
            println!(
                "Posted to {} ({}). It disappears in 24 hours.",
                post.category.to_string().bold(),
                post.id.dimmed()
            );
        }

        Commands::Feed { tab, pages } => {
            let app = open_app(config).await?;
            let tab = parse_tab(&tab)?;
            let feed = app.new_feed();
            let likes = app.new_likes();

            if let LoadOutcome::Degraded { reason } = feed.initial_load(&app.ctx).await {
                println!("{} Couldn't reach the wall: {reason}", "!".yellow());
            }
            for _ in 1..pages {
                if feed.load_more(&app.ctx).await? == LoadOutcome::Exhausted {
                    break;
                }
            }
            if let Err(e) = likes.load(&app.ctx).await {
                warn!(error = %e, "Could not load your likes");
            }

            let now = Utc::now();
            terminal::display_feed(&feed.visible(tab, &likes, now), tab, now);
            if !feed.is_exhausted() {
                println!(
                    "{}",
                    format!("More posts: yallwall feed --tab {tab} --pages {}", pages + 1).dimmed()
                );
            }
        }

        Commands::Watch { tab } => {
            let app = open_app(config).await?;
            let tab = parse_tab(&tab)?;
            watch(&app, tab).await?;
        }

        Commands::Like { post_id } => {
            let app = open_app(config).await?;
            let post = app
                .ctx
                .store()
                .get_post(&post_id)
                .await?
                .with_context(|| format!("No post with id {post_id}"))?;
            let likes = app.new_likes();
            likes.load(&app.ctx).await?;
            let outcome = likes.toggle_like(&app.ctx, &post.id, post.likes, &()).await?;
            terminal::display_like_outcome(&outcome);
        }

        Commands::Tip {
            target,
            amount,
            profile,
        } => {
            let app = open_app(config).await?;
            let receipt = if profile {
                engagement::send_tip(&app.ctx, &target, None, amount).await?
            } else {
                let post = app
                    .ctx
                    .store()
                    .get_post(&target)
                    .await?
                    .with_context(|| format!("No post with id {target}"))?;
                engagement::send_tip(&app.ctx, &post.author_id, Some(&post.id), amount).await?
            };
            terminal::display_tip_receipt(&receipt);
        }

        Commands::Wallet { limit } => {
            let app = open_app(config).await?;
            app.ctx.refresh_profile().await?;
            let entries = engagement::tip_history(&app.ctx, limit).await?;
            let profile = app.ctx.require_viewer()?;
            terminal::display_wallet(&profile, &entries, Utc::now());
        }

        Commands::Replies { post_id } => {
            let app = open_app(config).await?;
            show_thread(&app, &post_id, None).await?;
        }

        Commands::Reply { post_id, body } => {
            let app = open_app(config).await?;
            show_thread(&app, &post_id, Some(&body)).await?;
        }

        Commands::DeleteReply { post_id, reply_id } => {
            let app = open_app(config).await?;
            let mut thread = ReplyThread::open(&post_id);
            thread.refresh(&app.ctx).await?;
            thread.delete(&app.ctx, &reply_id).await?;
            println!("Reply deleted. {} left on this post.", thread.len());
        }

        Commands::DeletePost { post_id } => {
            let app = open_app(config).await?;
            let feed = app.new_feed();
            engagement::delete_post(&app.ctx, &feed, &post_id).await?;
            println!("Post deleted.");
        }

        Commands::MyPosts => {
            let app = open_app(config).await?;
            let posts = engagement::my_posts(&app.ctx).await?;
            terminal::display_my_posts(&posts, Utc::now());
        }

        Commands::Profile {
            display_name,
            username,
            city,
        } => {
            let app = open_app(config).await?;
            let update = ProfileUpdate {
                display_name,
                username,
                city,
            };
            let profile = if update.is_empty() {
                app.ctx.require_viewer()?
            } else {
                let updated = app.ctx.update_profile(&update).await?;
                println!("Profile updated.");
                updated
            };
            terminal::display_profile(&profile);
        }

        Commands::Demo { action } => {
            let prefs = Preferences::new(yallwall::db::initialize(&config.db_path)?);
            match action {
                DemoAction::On => {
                    prefs.set_demo_mode(true)?;
                    prefs.clear_session()?;
                    println!("Demo mode on. Everything stays in {}", config.db_path);
                }
                DemoAction::Off => {
                    prefs.set_demo_mode(false)?;
                    prefs.clear_session()?;
                    if config.has_hosted_backend() {
                        println!("Demo mode off. Using {}", config.api_url);
                    } else {
                        println!("Demo mode off, but YALLWALL_API_URL is not set; still local.");
                    }
                }
                DemoAction::Seed => {
                    let store = SqliteStore::new(yallwall::db::initialize(&config.db_path)?);
                    let added = yallwall::demo::seed(&store, Utc::now()).await?;
                    println!("Added {added} sample posts. Run `yallwall feed` to see them.");
                }
            }
        }

        Commands::Status => {
            let app = open_app(config).await?;
            yallwall::status::show(&app.ctx, &app.config, app.demo_mode).await?;
        }
    }

    Ok(())
}

/// The store and identity provider a run talks to.
struct Backend {
    store: Arc<dyn ContentStore>,
    identity: Arc<dyn IdentityProvider>,
    #[cfg(feature = "hosted")]
    hosted: Option<Arc<yallwall::hosted::HostedStore>>,
}

#[cfg(feature = "hosted")]
fn hosted_backend(config: &Config, prefs: &Arc<Preferences>) -> Result<Backend> {
    use yallwall::hosted::{HostedClient, HostedIdentity, HostedStore};

    config.require_hosted()?;
    info!(api_url = %config.api_url, "Using hosted backend");
    let client = Arc::new(HostedClient::new(&config.api_url, &config.anon_key)?);
    let store = Arc::new(HostedStore::new(Arc::clone(&client)));
    Ok(Backend {
        store: Arc::clone(&store) as Arc<dyn ContentStore>,
        identity: Arc::new(HostedIdentity::new(client, Arc::clone(prefs))),
        hosted: Some(store),
    })
}

#[cfg(not(feature = "hosted"))]
fn hosted_backend(_config: &Config, _prefs: &Arc<Preferences>) -> Result<Backend> {
    anyhow::bail!(
        "YALLWALL_API_URL is set but the 'hosted' feature is not compiled in.\n\
         Rebuild with default features, or run `yallwall demo on`."
    )
}

fn local_backend(config: &Config, prefs: &Arc<Preferences>) -> Result<Backend> {
    info!("Using local store");
    let store = Arc::new(SqliteStore::new(yallwall::db::open(&config.db_path)?));
    let identity = Arc::new(LocalIdentity::new(Arc::clone(&store), Arc::clone(prefs)));
    Ok(Backend {
        store,
        identity,
        #[cfg(feature = "hosted")]
        hosted: None,
    })
}

/// Choose the backend, build the shared context, and restore the session.
///
/// The hosted backend is used when YALLWALL_API_URL is set and demo mode
/// is off; otherwise the local store and local accounts are used.
async fn open_app(config: Config) -> Result<App> {
    let prefs = Arc::new(Preferences::new(yallwall::db::open(&config.db_path)?));
    let demo_mode = prefs.demo_mode()?;

    let backend = if config.has_hosted_backend() && !demo_mode {
        hosted_backend(&config, &prefs)?
    } else {
        local_backend(&config, &prefs)?
    };

    let ctx = Arc::new(AppContext::new(
        backend.store,
        backend.identity,
        config.session_retry,
    ));
    ctx.bootstrap().await;

    Ok(App {
        config,
        prefs,
        ctx,
        demo_mode,
        #[cfg(feature = "hosted")]
        hosted: backend.hosted,
    })
}

fn parse_tab(raw: &str) -> Result<FeedTab> {
    FeedTab::parse(raw).with_context(|| {
        format!("Unknown tab {raw:?}. Pick one of: live, hot, alerts, deals")
    })
}

fn prompt_password() -> Result<String> {
    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }
    Ok(password)
}

/// Offer the welcome tour to brand-new profiles once.
fn show_onboarding(app: &App, profile: &yallwall::db::models::Profile) -> Result<()> {
    if !app.prefs.should_show_onboarding(profile, Utc::now())? {
        return Ok(());
    }
    println!("\n{}", "Welcome to your wall!".bold());
    println!("  - Posts disappear after 24 hours");
    println!("  - `yallwall like <post>` and `yallwall reply <post> \"...\"` to join in");
    println!("  - Tip neighbours with `yallwall tip <post> <amount>`");
    app.prefs.set_onboarding_complete(true)?;
    Ok(())
}

/// Show a thread, optionally posting a reply first. Closing the thread
/// writes the fresh reply count back to the feed entry.
async fn show_thread(app: &App, post_id: &str, reply: Option<&str>) -> Result<()> {
    let post = app
        .ctx
        .store()
        .get_post(post_id)
        .await?
        .with_context(|| format!("No post with id {post_id}"))?;

    let mut thread = ReplyThread::open(&post.id);
    thread.refresh(&app.ctx).await?;
    if let Some(body) = reply {
        thread.create(&app.ctx, body).await?;
        println!("Reply posted.");
    }

    let viewer_id = app.ctx.viewer().map(|p| p.id);
    terminal::display_thread(&post, thread.replies(), viewer_id.as_deref(), Utc::now());

    let feed = app.new_feed();
    let count = thread.close(&app.ctx, &feed).await?;
    info!(post_id = %post.id, replies = count, "Thread closed");
    Ok(())
}

/// Render the tab, then re-render every time the feed changes.
async fn watch(app: &App, tab: FeedTab) -> Result<()> {
    let feed = Arc::new(app.new_feed());
    let likes = app.new_likes();
    if let Err(e) = likes.load(&app.ctx).await {
        warn!(error = %e, "Could not load your likes");
    }

    let mut updates = feed.subscribe_updates();
    if let LoadOutcome::Degraded { reason } = feed.initial_load(&app.ctx).await {
        println!("{} Couldn't reach the wall: {reason}", "!".yellow());
    }

    let realtime = feed::spawn_realtime(Arc::clone(&feed), Arc::clone(&app.ctx));
    #[cfg(feature = "hosted")]
    let poller = app
        .hosted
        .as_ref()
        .map(|store| store.spawn_poller(app.config.poll_interval));
    let auth = app.ctx.spawn_auth_listener();

    let now = Utc::now();
    terminal::display_feed(&feed.visible(tab, &likes, now), tab, now);
    println!("{}", "Watching for new posts. Ctrl-C to stop.".dimmed());

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let now = Utc::now();
                terminal::display_feed(&feed.visible(tab, &likes, now), tab, now);
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    realtime.abort();
    auth.abort();
    #[cfg(feature = "hosted")]
    if let Some(poller) = poller {
        poller.abort();
    }
    Ok(())
}
