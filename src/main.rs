use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use domain_patcher::auth::AuthClient;
use domain_patcher::config::{load_default, PatcherConfig, GAME_DIR_ENV};
use domain_patcher::patcher::{ArtifactStatus, Patcher};
use domain_patcher::{RewriteResult, DEFAULT_TARGET_DOMAIN, ORIGINAL_DOMAIN};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "domain-patcher")]
#[command(about = "Redirect a game installation to a different service domain", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/domain-patcher/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch the client binary and server JAR
    Patch {
        /// Installation root containing Client/ and Server/
        #[arg(short, long)]
        game_dir: Option<PathBuf>,

        /// Domain to write in place of the original one
        #[arg(short, long)]
        domain: Option<String>,

        /// Skip re-signing the client
        #[arg(long)]
        no_sign: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Restore the client binary and server JAR from their backups
    Restore {
        /// Installation root containing Client/ and Server/
        #[arg(short, long)]
        game_dir: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show marker, backup and domain occurrences for each artifact
    Status {
        /// Installation root containing Client/ and Server/
        #[arg(short, long)]
        game_dir: Option<PathBuf>,
    },

    /// Fetch session tokens from the auth server
    Token {
        #[arg(long)]
        uuid: String,

        #[arg(long)]
        name: String,

        /// Auth domain (defaults to the configured target domain)
        #[arg(short, long)]
        domain: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Patch {
            game_dir,
            domain,
            no_sign,
            json,
        } => cmd_patch(&config, game_dir, domain, no_sign, json),

        Commands::Restore { game_dir, json } => cmd_restore(&config, game_dir, json),

        Commands::Status { game_dir } => cmd_status(&config, game_dir),

        Commands::Token { uuid, name, domain } => cmd_token(&config, &uuid, &name, domain),
    }
}

/// Logs go to stderr so `--json` output stays clean. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Resolve the installation root.
///
/// Priority order:
/// 1. Explicit --game-dir flag
/// 2. `game_dir` in the config file
/// 3. DOMAIN_PATCHER_GAME_DIR environment variable
fn resolve_game_dir(flag: Option<PathBuf>, config: &PatcherConfig) -> Result<PathBuf> {
    let candidate = flag
        .or_else(|| config.game_dir.clone())
        .or_else(|| env::var_os(GAME_DIR_ENV).map(PathBuf::from));

    match candidate {
        Some(path) if path.is_dir() => Ok(path),
        Some(path) => anyhow::bail!("Game directory does not exist: {}", path.display()),
        None => anyhow::bail!(
            "{}\n{}\n  {}\n  {}\n  {}",
            "Could not determine the game directory.".red(),
            "Try one of:".bold(),
            "1. Specify explicitly: domain-patcher patch --game-dir /path/to/game",
            "2. Set game_dir in ~/.config/domain-patcher/config.toml",
            "3. Set environment variable: export DOMAIN_PATCHER_GAME_DIR=/path/to/game"
        ),
    }
}

fn build_patcher(config: &PatcherConfig, domain: Option<String>) -> Patcher {
    let requested = domain
        .or_else(|| config.target_domain.clone())
        .unwrap_or_else(|| DEFAULT_TARGET_DOMAIN.to_string());
    let patcher = Patcher::new(&requested);

    if patcher.target_domain() != requested {
        eprintln!(
            "{}",
            format!(
                "Warning: '{}' cannot replace '{}' (needs the same length, ASCII only), using {}",
                requested,
                ORIGINAL_DOMAIN,
                patcher.target_domain()
            )
            .yellow()
        );
    }
    patcher
}

/// Progress callback printing `[ nn%] message` lines, or nothing in JSON mode.
fn progress_printer(quiet: bool) -> impl FnMut(&str, u8) {
    move |message: &str, percent: u8| {
        if !quiet {
            println!("{}", format!("[{:>3}%] {}", percent, message).dimmed());
        }
    }
}

/// What a finished command summarizes.
#[derive(Clone, Copy)]
enum Summary {
    Patch,
    Restore,
}

fn finish(result: &RewriteResult, json: bool, summary: Summary) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        let done = match summary {
            Summary::Patch => "Patching complete",
            Summary::Restore => "Restore complete",
        };

        println!();
        if let Some(error) = &result.error {
            eprintln!("{} {}", "✗".red(), error);
        } else if result.already_patched {
            println!("{} Already patched", "⊙".yellow());
        } else if result.has_warnings() {
            println!("{} {} with warnings", "⊙".yellow(), done);
        } else {
            println!("{} {}", "✓".green(), done);
        }
        for warning in &result.warnings {
            println!("  {} {}", "⊙".yellow(), warning);
        }

        println!();
        println!("{}", "Summary:".bold());
        match summary {
            Summary::Patch => {
                println!(
                    "  {} occurrence(s) patched",
                    format!("{}", result.patch_count).green()
                );
                println!(
                    "  {} already patched",
                    if result.already_patched {
                        "yes".yellow()
                    } else {
                        "no".normal()
                    }
                );
            }
            Summary::Restore if result.has_warnings() => println!(
                "  {} warning(s)",
                format!("{}", result.warnings.len()).yellow()
            ),
            Summary::Restore => println!("  {}", "all artifacts restored".green()),
        }
    }

    if !result.success {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_patch(
    config: &PatcherConfig,
    game_dir: Option<PathBuf>,
    domain: Option<String>,
    no_sign: bool,
    json: bool,
) -> Result<()> {
    let game_dir = resolve_game_dir(game_dir, config)?;
    let mut patcher = build_patcher(config, domain);
    if no_sign || !config.sign {
        patcher = patcher.without_signing();
    }

    if !json {
        println!("Game directory: {}", game_dir.display());
        println!("Domain: {} -> {}", ORIGINAL_DOMAIN, patcher.target_domain());
        println!();
    }

    let mut progress = progress_printer(json);
    let result = patcher.ensure_patched(&game_dir, &mut progress);
    finish(&result, json, Summary::Patch)
}

fn cmd_restore(config: &PatcherConfig, game_dir: Option<PathBuf>, json: bool) -> Result<()> {
    let game_dir = resolve_game_dir(game_dir, config)?;
    let mut patcher = build_patcher(config, None);
    if !config.sign {
        patcher = patcher.without_signing();
    }

    if !json {
        println!("Game directory: {}", game_dir.display());
        println!();
    }

    let mut progress = progress_printer(json);
    let result = patcher.restore_patched(&game_dir, &mut progress);
    finish(&result, json, Summary::Restore)
}

fn cmd_status(config: &PatcherConfig, game_dir: Option<PathBuf>) -> Result<()> {
    let game_dir = resolve_game_dir(game_dir, config)?;
    let patcher = build_patcher(config, None);

    println!("{}", "Patch Status Report".bold());
    println!("Game directory: {}", game_dir.display());
    println!("Target domain: {}", patcher.target_domain());
    println!();

    let statuses = patcher.status(&game_dir);
    if statuses.is_empty() {
        println!("{} No client binary or server JAR found", "✗".red());
        std::process::exit(1);
    }

    for status in &statuses {
        print_status(status, patcher.target_domain());
    }

    Ok(())
}

fn print_status(status: &ArtifactStatus, target: &str) {
    let (symbol, state) = match &status.marker {
        Some(marker) if marker.target_domain == target => ("✓".green(), "PATCHED".green().bold()),
        Some(_) => ("⊙".yellow(), "PATCHED (other domain)".yellow().bold()),
        None => ("⊘".cyan(), "NOT PATCHED".cyan().bold()),
    };

    println!("{} {} {}", symbol, status.kind.label().bold(), state);
    println!("  Path: {}", status.path.display());
    if let Some(marker) = &status.marker {
        println!(
            "  Marker: {} -> {} at {} (v{})",
            marker.original_domain, marker.target_domain, marker.patched_at, marker.patcher_version
        );
    }
    println!(
        "  Backup: {}",
        if status.has_backup {
            "present".normal()
        } else {
            "missing".dimmed()
        }
    );
    println!(
        "  Occurrences: {} original, {} target",
        format_count(status.original_occurrences),
        format_count(status.target_occurrences)
    );
    println!();
}

fn format_count(count: Option<usize>) -> String {
    count.map_or_else(|| "?".to_string(), |n| n.to_string())
}

fn cmd_token(
    config: &PatcherConfig,
    uuid: &str,
    name: &str,
    domain: Option<String>,
) -> Result<()> {
    let domain = domain
        .or_else(|| config.auth_domain().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_TARGET_DOMAIN.to_string());
    let client = AuthClient::with_timeout(&domain, config.auth.timeout())?;

    println!("Auth server: {}", client.endpoint());

    let (tokens, error) = client.tokens_or_local(uuid, name);
    match error {
        None => println!("{} Tokens received", "✓".green()),
        Some(err) => eprintln!(
            "{}",
            format!(
                "Warning: token exchange failed ({}), using local offline tokens",
                err
            )
            .yellow()
        ),
    }

    println!("Identity token: {}", tokens.identity_token);
    println!("Session token: {}", tokens.session_token);
    Ok(())
}
