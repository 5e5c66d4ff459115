//! autoauth CLI - automated browser step for CLI OAuth logins
//!
//! Usage:
//!   autoauth login [-- COMMAND...]   Run a login, gcloud by default
//!   autoauth profile                 Show the browser profile that would be staged
//!   autoauth cache show|clear|add    Inspect or edit the selector cache
//!   autoauth config init|show        Write or print the configuration

use anyhow::{bail, Context, Result};
use autoauth_core::config::AutoAuthConfig;
use autoauth_core::profile::{resolve_default_profile, ProfileLayout};
use autoauth_core::SelectorCache;
use autoauth_orchestrator::{ChromeLauncher, CodeOrigin, LoginContext, LoginWorkflow};
use autoauth_process::{CliLoginProcess, LoginCommand, StdinPrompt};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "autoauth")]
#[command(author, version, about = "Automate the browser half of CLI OAuth logins")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ~/.autoauth/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a CLI login and complete the browser consent automatically
    Login(LoginArgs),

    /// Show the browser profile that would be staged
    Profile {
        /// Profile layout to resolve
        #[arg(long)]
        layout: Option<CliLayout>,

        /// Directory holding browser profiles
        #[arg(long, value_name = "DIR")]
        profiles_root: Option<PathBuf>,
    },

    /// Selector cache management
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Args, Debug, Default)]
struct LoginArgs {
    /// Account to pick on the account chooser
    #[arg(long, value_name = "EMAIL")]
    account: Option<String>,

    /// Browser profile layout to stage
    #[arg(long)]
    layout: Option<CliLayout>,

    /// Directory holding browser profiles
    #[arg(long, value_name = "DIR")]
    profiles_root: Option<PathBuf>,

    /// Maximum consent attempts
    #[arg(long)]
    max_attempts: Option<usize>,

    /// Do not read or write the selector cache
    #[arg(long)]
    no_cache: bool,

    /// Scan page text for a code when the URL has none
    #[arg(long, conflicts_with = "no_scrape_text")]
    scrape_text: bool,

    /// Only look for the code in the page URL
    #[arg(long)]
    no_scrape_text: bool,

    /// Open the URL in the system browser if automation fails
    #[arg(long)]
    open_fallback: bool,

    /// Login command to run instead of the configured one
    #[arg(last = true, value_name = "COMMAND")]
    command: Vec<String>,
}

/// CLI-friendly layout enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLayout {
    Firefox,
    Chromium,
}

impl From<CliLayout> for ProfileLayout {
    fn from(l: CliLayout) -> Self {
        match l {
            CliLayout::Firefox => ProfileLayout::Firefox,
            CliLayout::Chromium => ProfileLayout::Chromium,
        }
    }
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Print the cache and the resulting attempt order
    Show,

    /// Delete the cache file
    Clear,

    /// Add a curated consent selector
    Add {
        /// Selector, e.g. 'button:has-text("Allow")'
        selector: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; stdout carries the login command's own output
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = match cli.config {
        Some(path) => path,
        None => AutoAuthConfig::default_path().context("Could not determine home directory")?,
    };

    match cli.command {
        Commands::Login(args) => cmd_login(&config_path, args).await,
        Commands::Profile {
            layout,
            profiles_root,
        } => cmd_profile(&config_path, layout, profiles_root),
        Commands::Cache { action } => cmd_cache(&config_path, action),
        Commands::Config { action } => cmd_config(&config_path, action),
    }
}

fn load_config(path: &Path) -> Result<AutoAuthConfig> {
    AutoAuthConfig::load_or_default(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Fold command-line flags over the loaded configuration
fn apply_login_args(config: &mut AutoAuthConfig, args: LoginArgs) {
    if let Some(email) = args.account {
        config.account.email = Some(email);
    }
    if let Some(layout) = args.layout {
        config.browser.layout = layout.into();
    }
    if let Some(root) = args.profiles_root {
        config.browser.profiles_root = Some(root);
    }
    if let Some(max) = args.max_attempts {
        config.automation.max_attempts = max;
    }
    if args.no_cache {
        config.cache.enabled = false;
    }
    if args.scrape_text {
        config.automation.scrape_page_text = true;
    }
    if args.no_scrape_text {
        config.automation.scrape_page_text = false;
    }
    if args.open_fallback {
        config.fallback.open_url = true;
    }
    if !args.command.is_empty() {
        config.login.command = args.command;
    }
}

async fn cmd_login(config_path: &Path, args: LoginArgs) -> Result<()> {
    let mut config = load_config(config_path)?;
    apply_login_args(&mut config, args);

    if config.browser.layout == ProfileLayout::Firefox {
        warn!("Staging a Firefox profile; the automated browser is Chromium and will not read its cookies");
    }

    let command = LoginCommand::from_argv(&config.login.command, &config.login.env)?;
    let context = LoginContext::from_config(&config)?;
    let workflow = LoginWorkflow::new(context);
    let launcher = ChromeLauncher::new(config.browser.clone());

    info!("Starting login: {}", command.display());
    let mut process = CliLoginProcess::spawn(&command)
        .with_context(|| format!("Failed to start {}", command.display()))?;
    let mut prompt = StdinPrompt::stdin();

    let report = workflow.run(&mut process, &launcher, &mut prompt).await?;

    println!();
    match report.origin {
        CodeOrigin::Automated => println!(
            "Login completed automatically after {} attempt(s)",
            report.attempts
        ),
        CodeOrigin::Manual => println!("Login completed with a manually entered code"),
    }
    if let Some(code) = report.relay.exit_code.filter(|c| *c != 0) {
        warn!("{} exited with status {}", command.display(), code);
    }

    Ok(())
}

fn cmd_profile(
    config_path: &Path,
    layout: Option<CliLayout>,
    profiles_root: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let layout = layout.map(ProfileLayout::from).unwrap_or(config.browser.layout);
    let root = match profiles_root.or(config.browser.profiles_root) {
        Some(root) => root,
        None => layout
            .default_profiles_root()
            .context("No default profiles directory on this platform")?,
    };

    let profile = resolve_default_profile(&root, layout)?;

    println!("Layout:  {}", layout);
    println!("Root:    {}", root.display());
    println!("Profile: {}", profile.display());
    println!("Files:");
    for name in layout.essential_files() {
        let marker = if profile.join(name).exists() { "+" } else { "-" };
        println!("  {} {}", marker, name);
    }
    for name in layout.root_files() {
        let marker = if root.join(name).exists() { "+" } else { "-" };
        println!("  {} {} (root)", marker, name);
    }

    Ok(())
}

fn cmd_cache(config_path: &Path, action: CacheCommands) -> Result<()> {
    let config = load_config(config_path)?;
    let Some(path) = config.cache_path() else {
        bail!("Selector cache is disabled in {}", config_path.display());
    };

    match action {
        CacheCommands::Show => {
            let cache = SelectorCache::load(&path);
            println!("Cache: {}", path.display());
            println!("{}", serde_json::to_string_pretty(&cache)?);
            println!("\nAttempt order:");
            let order = cache.prioritized(autoauth_core::selectors::DEFAULT_CONSENT_SELECTORS);
            for (i, selector) in order.iter().enumerate() {
                println!("  {}. {}", i + 1, selector);
            }
        }
        CacheCommands::Clear => {
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                println!("Removed {}", path.display());
            } else {
                println!("No cache at {}", path.display());
            }
        }
        CacheCommands::Add { selector } => {
            let mut cache = SelectorCache::load(&path);
            if cache.add_consent_selector(&selector) {
                cache.save(&path)?;
                println!("Added {}", selector);
            } else {
                println!("Already present: {}", selector);
            }
        }
    }

    Ok(())
}

fn cmd_config(config_path: &Path, action: ConfigCommands) -> Result<()> {
    match action {
        ConfigCommands::Init { force } => {
            if config_path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    config_path.display()
                );
            }
            AutoAuthConfig::default().write(config_path)?;
            println!("Wrote {}", config_path.display());
        }
        ConfigCommands::Show => {
            let config = load_config(config_path)?;
            println!("# {}", config_path.display());
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_flags_override_config() {
        let cli = Cli::parse_from([
            "autoauth",
            "login",
            "--account",
            "me@example.com",
            "--layout",
            "firefox",
            "--max-attempts",
            "5",
            "--no-cache",
            "--no-scrape-text",
            "--",
            "gcloud",
            "auth",
            "application-default",
            "login",
        ]);
        let Commands::Login(args) = cli.command else {
            panic!("expected login");
        };

        let mut config = AutoAuthConfig::default();
        apply_login_args(&mut config, args);

        assert_eq!(config.account.email.as_deref(), Some("me@example.com"));
        assert_eq!(config.browser.layout, ProfileLayout::Firefox);
        assert_eq!(config.automation.max_attempts, 5);
        assert!(!config.cache.enabled);
        assert!(!config.automation.scrape_page_text);
        assert_eq!(
            config.login.command,
            vec!["gcloud", "auth", "application-default", "login"]
        );
    }

    #[test]
    fn test_login_without_flags_keeps_config() {
        let cli = Cli::parse_from(["autoauth", "login"]);
        let Commands::Login(args) = cli.command else {
            panic!("expected login");
        };

        let mut config = AutoAuthConfig::default();
        apply_login_args(&mut config, args);
        assert_eq!(config, AutoAuthConfig::default());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["autoauth", "login", "--verbose", "--config", "/tmp/a.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/a.toml")));
    }

    #[test]
    fn test_scrape_flags_conflict() {
        let result = Cli::try_parse_from(["autoauth", "login", "--scrape-text", "--no-scrape-text"]);
        assert!(result.is_err());
    }
}
