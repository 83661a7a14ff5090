//! CodeClaw CLI — the main entry point.
//!
//! One command: point it at a project directory and chat. Flags override
//! environment variables, which override `~/.codeclaw/config.toml`.

use anyhow::{bail, ensure};
use clap::Parser;
use codeclaw_agent::WorkLoop;
use codeclaw_config::AppConfig;
use codeclaw_core::session::{ProviderOptions, Session, ToolMode};
use codeclaw_providers::{ProviderClientCache, ProviderKind};
use codeclaw_session::SessionStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

mod render;
mod repl;

#[derive(Parser)]
#[command(
    name = "codeclaw",
    about = "CodeClaw — AI coding assistant for your terminal",
    version
)]
struct Cli {
    /// Project directory the assistant is allowed to work on
    #[arg(default_value = ".")]
    workdir: PathBuf,

    /// Provider to use: ollama, openai, openrouter or anthropic
    #[arg(long, env = "CODECLAW_PROVIDER")]
    provider: Option<String>,

    /// Model name, as the provider knows it
    #[arg(long, env = "CODECLAW_MODEL")]
    model: Option<String>,

    /// Override the provider's base URL
    #[arg(long)]
    api_url: Option<String>,

    /// API key (prefer the environment variables)
    #[arg(long)]
    api_key: Option<String>,

    /// Context budget in tokens for history trimming
    #[arg(long)]
    context_size: Option<u32>,

    /// Keep at most this many recent messages per model call
    #[arg(long)]
    max_messages: Option<usize>,

    /// Resume the most recent session for this directory
    #[arg(long)]
    continue_session: bool,

    /// Run destructive tools without asking for confirmation
    #[arg(long, conflicts_with = "read_only")]
    write_mode: bool,

    /// Deny destructive tools entirely
    #[arg(long)]
    read_only: bool,

    /// Skip .cursorrules / AGENTS.md / CLAUDE.md discovery
    #[arg(long)]
    no_agent_rules: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    debug: bool,
}

/// `--debug` raises this workspace's crates to debug; outside noise stays at warn.
const DEBUG_FILTER: &str = "warn,codeclaw=debug,codeclaw_core=debug,codeclaw_config=debug,\
    codeclaw_providers=debug,codeclaw_tools=debug,codeclaw_agent=debug,codeclaw_session=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { DEBUG_FILTER } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::load()?;
    if let Some(provider) = &cli.provider {
        config.default_provider = provider.clone();
    }
    if let Some(model) = &cli.model {
        config.default_model = model.clone();
    }
    if cli.api_url.is_some() {
        config.api_url = cli.api_url.clone();
    }
    if cli.api_key.is_some() {
        config.api_key = cli.api_key.clone();
    }
    if cli.context_size.is_some() {
        config.context_size = cli.context_size;
    }
    if cli.max_messages.is_some() {
        config.max_messages = cli.max_messages;
    }
    if cli.write_mode {
        config.tool_mode = ToolMode::Yolo;
    }
    if cli.read_only {
        config.tool_mode = ToolMode::ReadOnly;
    }
    if cli.no_agent_rules {
        config.disable_agent_rules = true;
    }

    let work_dir = cli
        .workdir
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("cannot open {}: {e}", cli.workdir.display()))?;
    ensure!(work_dir.is_dir(), "{} is not a directory", work_dir.display());

    let mut provider_options =
        ProviderOptions::new(&config.default_provider, &config.default_model);
    provider_options.context_size = config.context_size;
    provider_options.api_key = config.api_key.clone();
    provider_options.api_url = config.api_url.clone();
    provider_options.disable_agent_rules = config.disable_agent_rules;

    let store = SessionStore::new(AppConfig::sessions_dir());
    let session = if cli.continue_session {
        resume_or_new(&store, &work_dir, &cli, &config, provider_options)
    } else {
        Session::new(&work_dir, config.tool_mode, provider_options)
    };

    let kind: ProviderKind = session.provider_options.provider.parse()?;
    if kind.requires_api_key() && session.provider_options.api_key.is_none() {
        eprintln!();
        eprintln!("  ERROR: No API key configured for provider \"{kind}\".");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    CODECLAW_API_KEY       (generic)");
        eprintln!("    OPENROUTER_API_KEY     (for openrouter)");
        eprintln!("    OPENAI_API_KEY         (for openai)");
        eprintln!("    ANTHROPIC_API_KEY      (for anthropic)");
        eprintln!();
        eprintln!(
            "  Or add api_key to {}",
            AppConfig::config_dir().join("config.toml").display()
        );
        eprintln!();
        bail!("no API key found");
    }

    let mut cache = ProviderClientCache::new();
    let provider = cache.get_or_create(&session.provider_options)?;
    let tools = Arc::new(codeclaw_tools::default_registry(session.tool_mode));

    let mut work = WorkLoop::new(provider, tools);
    if let Some(max) = config.max_messages {
        work = work.with_max_messages(max);
    }

    repl::run(session, work, store).await
}

/// Resume the latest session for this directory, or start fresh.
///
/// Stored options win on resume; flags given explicitly on this run
/// override them. The API key never persists and is re-injected here.
fn resume_or_new(
    store: &SessionStore,
    work_dir: &Path,
    cli: &Cli,
    config: &AppConfig,
    fresh_options: ProviderOptions,
) -> Session {
    let Some(id) = store.find_latest(work_dir) else {
        return Session::new(work_dir, config.tool_mode, fresh_options);
    };

    match store.load(&id) {
        Ok(mut session) => {
            if let Some(provider) = &cli.provider {
                session.provider_options.provider = provider.clone();
            }
            if let Some(model) = &cli.model {
                session.provider_options.model = model.clone();
            }
            if cli.api_url.is_some() {
                session.provider_options.api_url = cli.api_url.clone();
            }
            if cli.context_size.is_some() {
                session.provider_options.context_size = cli.context_size;
            }
            if cli.no_agent_rules {
                session.provider_options.disable_agent_rules = true;
            }
            session.provider_options.api_key = config.api_key.clone();
            if cli.write_mode {
                session.tool_mode = ToolMode::Yolo;
            }
            if cli.read_only {
                session.tool_mode = ToolMode::ReadOnly;
            }
            info!(
                session_id = %session.id,
                messages = session.messages.len(),
                "Resuming session"
            );
            session
        }
        Err(e) => {
            warn!(error = %e, "Could not resume previous session, starting fresh");
            Session::new(work_dir, config.tool_mode, fresh_options)
        }
    }
}
