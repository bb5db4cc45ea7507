//! Bangumoe CLI - a command line front end for the Bangumoe anime catalogue.
//!
//! Every page visit goes through the same navigation guard the web client
//! uses, so beta gating and login requirements behave identically here.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bangumoe_core::api::{Listing, Page};
use bangumoe_core::config::{normalize_base_url, TokenStorage};
use bangumoe_core::models::{Bangumi, Credentials, ProfileUpdate, RegistrationForm, Upload};
use bangumoe_core::{ApiError, Config, Decision, Location, Route, SessionContext};

// ============================================================================
// Constants
// ============================================================================

/// Environment variable holding the login password for non-interactive use
const PASSWORD_ENV: &str = "BANGUMOE_PASSWORD";

/// Redirect hops followed by `open` before giving up
const MAX_REDIRECTS: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "bangumoe", version, about = "Bangumoe anime catalogue client")]
struct Cli {
    /// API origin, e.g. https://bangumoe.example
    #[arg(long, env = "BANGUMOE_API_URL")]
    api_url: Option<String>,

    /// Where the login token is kept
    #[arg(long, value_enum)]
    storage: Option<StorageArg>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StorageArg {
    Keyring,
    File,
    Memory,
}

impl From<StorageArg> for TokenStorage {
    fn from(arg: StorageArg) -> Self {
        match arg {
            StorageArg::Keyring => TokenStorage::Keyring,
            StorageArg::File => TokenStorage::File,
            StorageArg::Memory => TokenStorage::Memory,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and remember the token
    Login {
        #[arg(long, short)]
        username: Option<String>,
    },
    /// Create an account
    Register {
        #[arg(long, short)]
        username: String,
        #[arg(long, short)]
        email: String,
        /// Avatar image to upload
        #[arg(long)]
        avatar: Option<PathBuf>,
    },
    /// Forget the stored token
    Logout,
    /// Show the logged-in user's profile
    Whoami {
        /// Print the raw profile as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change email, avatar or password
    UpdateProfile {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        avatar: Option<PathBuf>,
        /// Prompt for the old and new password
        #[arg(long)]
        change_password: bool,
    },
    /// Ask the server whether the stored token is still valid
    Check,
    /// Show beta-mode status for this user
    Beta,
    /// Visit a page through the navigation guard
    Open { path: String },
    /// List bangumi, optionally for one year
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        year: Option<String>,
    },
    /// List the years with bangumi
    Years,
    /// Show one bangumi
    Show {
        id: i64,
        /// Also print the bangumi's statistics
        #[arg(long)]
        stats: bool,
    },
    /// Show the rankings
    Rankings {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Search bangumi by title
    Search {
        title: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

/// Initialize the tracing subscriber for logging.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug).
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer().with_writer(io::stderr);

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir).context("Failed to create log directory")?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(filter)
                .init();
            Ok(None)
        }
    }
}

fn load_config(cli: &Cli) -> Config {
    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    if let Some(ref url) = cli.api_url {
        config.api_base_url = normalize_base_url(url);
    }
    if let Some(storage) = cli.storage {
        config.token_storage = storage.into();
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_deref())?;
    info!("Bangumoe CLI starting");

    let config = load_config(&cli);
    let ctx = SessionContext::open(&config)?;

    match cli.command {
        Command::Login { username } => login(&ctx, &config, username).await,
        Command::Register {
            username,
            email,
            avatar,
        } => register(&ctx, username, email, avatar).await,
        Command::Logout => {
            ctx.auth().logout();
            println!("已退出登录");
            Ok(())
        }
        Command::Whoami { json } => whoami(&ctx, json).await,
        Command::UpdateProfile {
            email,
            avatar,
            change_password,
        } => update_profile(&ctx, email, avatar, change_password).await,
        Command::Check => {
            if ctx.auth().check_token().await {
                println!("Token 有效");
            } else {
                println!("Token 无效或无法验证");
            }
            Ok(())
        }
        Command::Beta => {
            let state = ctx.beta().check_beta_status().await;
            println!(
                "内测模式: {}  访问权限: {}",
                if state.beta_mode_active { "开启" } else { "关闭" },
                if state.user_allowed { "允许" } else { "无权限" }
            );
            Ok(())
        }
        Command::Open { path } => open(&ctx, &path).await,
        Command::List { page, year } => {
            let listing = match year {
                Some(ref year) => {
                    visit_or_bail(&ctx, &Route::CatalogueByYear { year: year.clone() }).await?;
                    ctx.catalogue().list_by_year(year, Page::catalogue(page)).await
                }
                None => {
                    visit_or_bail(&ctx, &Route::Catalogue).await?;
                    ctx.catalogue().list(Page::catalogue(page)).await
                }
            };
            print_listing(listing)
        }
        Command::Years => {
            visit_or_bail(&ctx, &Route::Catalogue).await?;
            let years = ctx.catalogue().years().await.map_err(report)?;
            println!("{}", years.join("  "));
            Ok(())
        }
        Command::Show { id, stats } => {
            visit_or_bail(&ctx, &Route::Player { id: id.to_string() }).await?;
            let bangumi = ctx.catalogue().detail(id).await.map_err(report)?;
            println!("{}", bangumi.summary());
            if let Some(ref poster) = bangumi.poster_link {
                println!("  poster: {}", poster);
            }
            println!(
                "  views: {}  favorites: {}",
                bangumi.view_count, bangumi.favorite_count
            );
            if stats {
                let stats = ctx.catalogue().stats(id).await.map_err(report)?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            Ok(())
        }
        Command::Rankings { page } => {
            visit_or_bail(&ctx, &Route::Rankings).await?;
            let listing = ctx.catalogue().rankings(Page::rankings(page)).await;
            print_listing(listing)
        }
        Command::Search { title, page } => {
            visit_or_bail(&ctx, &Route::Search).await?;
            let listing = ctx.catalogue().search(&title, Page::catalogue(page)).await;
            print_listing(listing)
        }
    }
}

async fn login(ctx: &SessionContext, config: &Config, username: Option<String>) -> Result<()> {
    let username = match username.or_else(|| config.last_username.clone()) {
        Some(u) => u,
        None => prompt("用户名: ")?,
    };
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(p) => p,
        Err(_) => rpassword::prompt_password("密码: ").context("Failed to read password")?,
    };

    match ctx.auth().login(&Credentials::new(&username, password)).await {
        Ok(user) => {
            if let Err(e) = Config::remember_username(&username) {
                warn!(error = %e, "Failed to save config");
            }
            let name = user.map(|u| u.username).unwrap_or(username);
            println!("登录成功，欢迎 {}", name);
            Ok(())
        }
        Err(e) => anyhow::bail!(e.user_message("登录失败")),
    }
}

async fn register(
    ctx: &SessionContext,
    username: String,
    email: String,
    avatar: Option<PathBuf>,
) -> Result<()> {
    let password = rpassword::prompt_password("密码: ").context("Failed to read password")?;
    let confirm_password =
        rpassword::prompt_password("确认密码: ").context("Failed to read password")?;
    let form = RegistrationForm {
        username,
        password,
        confirm_password,
        email,
        avatar: avatar.as_deref().map(read_upload).transpose()?,
    };
    match ctx.auth().register(&form).await {
        Ok(_) => {
            println!("注册成功，请登录");
            Ok(())
        }
        Err(e) => anyhow::bail!(e.user_message("注册失败")),
    }
}

async fn whoami(ctx: &SessionContext, json: bool) -> Result<()> {
    match ctx.auth().get_profile().await {
        Some(profile) if json => {
            println!("{}", serde_json::to_string_pretty(&profile)?);
            Ok(())
        }
        Some(profile) => {
            println!("{} <{}>", profile.username, profile.email);
            println!("  id: {}  role: {}", profile.id, profile.role);
            if let Some(ref avatar) = profile.avatar {
                println!("  avatar: {}", avatar);
            }
            Ok(())
        }
        None => anyhow::bail!("未登录"),
    }
}

async fn update_profile(
    ctx: &SessionContext,
    email: Option<String>,
    avatar: Option<PathBuf>,
    change_password: bool,
) -> Result<()> {
    let (old_password, new_password) = if change_password {
        (
            Some(rpassword::prompt_password("原密码: ").context("Failed to read password")?),
            Some(rpassword::prompt_password("新密码: ").context("Failed to read password")?),
        )
    } else {
        (None, None)
    };
    let update = ProfileUpdate {
        email,
        avatar: avatar.as_deref().map(read_upload).transpose()?,
        old_password,
        new_password,
    };
    let profile = ctx
        .auth()
        .update_profile(&update)
        .await
        .map_err(report)?;
    println!("资料已更新: {} <{}>", profile.username, profile.email);
    Ok(())
}

/// Follow the guard's redirects from `path` and print where we end up.
async fn open(ctx: &SessionContext, path: &str) -> Result<()> {
    let mut location = Location::parse(path);
    for _ in 0..MAX_REDIRECTS {
        match ctx.guard().before_each(&location).await {
            Decision::Admit => {
                let route = Route::resolve(&location.path);
                println!("{}  [{}]", location, route.title());
                return Ok(());
            }
            Decision::Redirect(next) => {
                println!("{} -> {}", location, next);
                location = next;
            }
            Decision::Deny => anyhow::bail!("导航已取消: {}", location),
            Decision::Reauthenticate(Some(login)) => {
                println!("登录已过期，请重新登录: {}", login);
                return Ok(());
            }
            Decision::Reauthenticate(None) => anyhow::bail!("登录已过期"),
        }
    }
    anyhow::bail!("Too many redirects starting from {}", path)
}

/// Catalogue commands are page visits too; refuse if the guard would.
async fn visit_or_bail(ctx: &SessionContext, route: &Route) -> Result<()> {
    match ctx.guard().before_each(&route.location()).await {
        Decision::Admit => Ok(()),
        other => {
            let target = other
                .destination()
                .map(|l| l.to_string())
                .unwrap_or_default();
            anyhow::bail!("无法访问 {} ({})", route.path(), target)
        }
    }
}

fn print_listing(listing: Result<Listing<Bangumi>, ApiError>) -> Result<()> {
    let listing = listing.map_err(report)?;
    if listing.items.is_empty() {
        println!("没有结果");
    }
    for bangumi in &listing.items {
        println!("{}", bangumi.summary());
    }
    if let Some(total) = listing.total {
        println!("共 {} 部", total);
    }
    Ok(())
}

/// Turn an API error into a CLI error. A 401 outside the profile
/// endpoints has already ended the session in the core; a 401 from a
/// profile update leaves the stored token alone.
fn report(e: ApiError) -> anyhow::Error {
    if e.is_unauthorized() {
        return anyhow::anyhow!("登录已过期，请重新登录: {}", Route::Login.location());
    }
    anyhow::anyhow!(e.user_message("请求失败"))
}

fn read_upload(path: &Path) -> Result<Upload> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "avatar".to_string());
    Ok(Upload::from_bytes(name, bytes))
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;

    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
