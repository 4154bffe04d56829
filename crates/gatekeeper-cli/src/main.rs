// ============================================================================
// gatekeeper - MFA-gated access to OpenBao secrets from the terminal
// ============================================================================
// Usage:
//   gatekeeper                      Interactive session (default)
//   gatekeeper session              Same, explicitly
//   gatekeeper status               Show tier (always no_access at startup)
//   gatekeeper read <path>          Authenticate via Duo push and read once
//   gatekeeper list <path>          Authenticate via Duo push and list once
//
// Tokens live only in this process. Escalation and writes need a session,
// since an RW token does not survive the process that obtained it.
// ============================================================================

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gatekeeper_core::config::ENV_ADDR;
use gatekeeper_core::{AccessGateway, GatekeeperConfig, GatekeeperError, SecretData};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "gatekeeper_core=info,gatekeeper=info";

/// Zero-standing-access broker for OpenBao secrets
#[derive(Parser)]
#[command(name = "gatekeeper", version, about = "MFA-gated read/write access to OpenBao secrets")]
struct Cli {
    /// OpenBao address (default: $VAULT_ADDR)
    #[arg(long, global = true)]
    addr: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read commands from stdin against one in-memory token session
    Session,

    /// Show current tier and token lease state
    Status,

    /// Read a secret (relative to the KV v2 mount)
    Read { path: String },

    /// List keys under a path
    List { path: String },
}

/// One line of session input
#[derive(Debug, PartialEq)]
enum SessionCommand {
    Authenticate,
    Read(String),
    List(String),
    Write(String, SecretData),
    Escalate,
    Deescalate,
    Status,
    Help,
    Quit,
}

const SESSION_HELP: &str = "\
Commands:
  authenticate              Duo push for a read-only token
  read <path>               Read a secret (auto-authenticates)
  list <path>               List keys under a path (auto-authenticates)
  write <path> <json>       Write a secret (requires escalate first)
  escalate                  Duo push for a 15 minute read-write token
  deescalate                Revoke the read-write token
  status                    Show tier and remaining lease times
  quit                      Exit (all tokens are discarded)";

fn parse_command(line: &str) -> Result<SessionCommand> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let require_path = |what: &str| -> Result<String> {
        if rest.is_empty() {
            anyhow::bail!("Usage: {} <path>", what);
        }
        Ok(rest.to_string())
    };

    match verb.to_lowercase().as_str() {
        "authenticate" | "auth" => Ok(SessionCommand::Authenticate),
        "read" => Ok(SessionCommand::Read(require_path("read")?)),
        "list" | "ls" => Ok(SessionCommand::List(require_path("list")?)),
        "write" => {
            let (path, json) = rest
                .split_once(char::is_whitespace)
                .context("Usage: write <path> <json-object>")?;
            let data = match serde_json::from_str::<Value>(json.trim())
                .context("Secret data must be valid JSON")?
            {
                Value::Object(map) => map,
                _ => anyhow::bail!("Secret data must be a JSON object"),
            };
            Ok(SessionCommand::Write(path.to_string(), data))
        }
        "escalate" => Ok(SessionCommand::Escalate),
        "deescalate" => Ok(SessionCommand::Deescalate),
        "status" => Ok(SessionCommand::Status),
        "help" | "?" => Ok(SessionCommand::Help),
        "quit" | "exit" => Ok(SessionCommand::Quit),
        _ => anyhow::bail!("Unknown command '{}'. Type 'help' for a list.", verb),
    }
}

fn pretty(value: &impl serde::Serialize) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Run one command. Gateway failures become output text, not errors.
async fn execute(gateway: &AccessGateway, command: SessionCommand) -> Result<String> {
    let rendered = match command {
        SessionCommand::Authenticate => gateway
            .authenticate()
            .await
            .map(|grant| grant.to_string())
            .map_err(|e| format!("Authentication failed: {}", e)),
        SessionCommand::Read(path) => match gateway.read_secret(&path).await {
            Ok(data) => Ok(pretty(&data)?),
            Err(e) => Err(format!("Error reading secret at '{}': {}", path, e)),
        },
        SessionCommand::List(path) => match gateway.list_secrets(&path).await {
            Ok(keys) if keys.is_empty() => Ok(format!("No secrets found at '{}'.", path)),
            Ok(keys) => Ok(pretty(&keys)?),
            Err(e) => Err(format!("Error listing secrets at '{}': {}", path, e)),
        },
        SessionCommand::Write(path, data) => match gateway.write_secret(&path, &data).await {
            Ok(receipt) => Ok(format!(
                "Secret written to '{}' (version {}).",
                path, receipt.version
            )),
            Err(e @ GatekeeperError::InsufficientPrivilege) => Err(e.to_string()),
            Err(e) => Err(format!("Error writing secret at '{}': {}", path, e)),
        },
        SessionCommand::Escalate => gateway
            .escalate()
            .await
            .map(|grant| grant.to_string())
            .map_err(|e| format!("Escalation failed: {}", e)),
        SessionCommand::Deescalate => Ok(gateway.deescalate().await.to_string()),
        SessionCommand::Status => Ok(pretty(&gateway.status().await)?),
        SessionCommand::Help => Ok(SESSION_HELP.to_string()),
        SessionCommand::Quit => Ok(String::new()),
    };

    Ok(rendered.unwrap_or_else(|e| e))
}

async fn run_session(gateway: &AccessGateway) -> Result<()> {
    eprintln!("gatekeeper session started at tier no_access. Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(SessionCommand::Quit) => break,
            Ok(command) => println!("{}", execute(gateway, command).await?),
            Err(e) => println!("Error: {}", e),
        }
    }

    info!("Session ended, discarding all tokens");
    Ok(())
}

fn load_config(addr_override: Option<String>) -> Result<GatekeeperConfig> {
    let loaded = match addr_override {
        Some(addr) => GatekeeperConfig::from_lookup(|name| match name {
            ENV_ADDR => Some(addr.clone()),
            _ => std::env::var(name).ok(),
        }),
        None => GatekeeperConfig::from_env(),
    };
    // VAULT_TOKEN is the bootstrap token: it may only read the RO login password and validate MFA
    loaded.context("Failed to load configuration (VAULT_ADDR and VAULT_TOKEN are required)")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Could not load .env file: {}", e);
        }
    }

    // Logs go to stderr so results on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.addr)?;
    info!("Using OpenBao at {}", config.addr);

    let gateway = AccessGateway::new(&config).context("Failed to initialise gateway")?;

    match cli.command.unwrap_or(Commands::Session) {
        Commands::Session => run_session(&gateway).await,
        Commands::Status => {
            println!("{}", execute(&gateway, SessionCommand::Status).await?);
            Ok(())
        }
        Commands::Read { path } => {
            println!("{}", execute(&gateway, SessionCommand::Read(path)).await?);
            Ok(())
        }
        Commands::List { path } => {
            println!("{}", execute(&gateway, SessionCommand::List(path)).await?);
            Ok(())
        }
    }
}
