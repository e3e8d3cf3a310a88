//! `muninn`: operator CLI for inspecting and releasing proxy state.
//!
//! Opens the same documents the proxy uses (resolved from the muninn
//! config file) and offers the administrative actions the state layer
//! supports: listing and clearing cooldowns, inspecting and wiping the
//! signature cache, and listing credentials by public id.
//!
//! Build: `cargo build --bin muninn --features cli`

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use dialoguer::Confirm;

use muninn::{Config, Muninn, SignatureOptions, StateLayer};

// ── CLI ─────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "muninn", version = muninn::PKG_VERSION, about = "inspect and manage proxy credential state")]
struct Args {
    /// path to config.toml
    #[arg(short, long, env = "MUNINN_CONFIG")]
    config: Option<PathBuf>,

    /// override the state directory from the config
    #[arg(long, env = "MUNINN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// quota cooldowns
    #[command(subcommand)]
    Cooldowns(CooldownCommand),
    /// continuity signature cache
    #[command(subcommand)]
    Signatures(SignatureCommand),
    /// credential records
    #[command(subcommand)]
    Credentials(CredentialCommand),
    /// print version and build metadata
    Version,
}

#[derive(Subcommand)]
enum CooldownCommand {
    /// list live cooldowns
    List,
    /// release cooldowns of one credential
    Clear {
        /// credential identifier
        credential: String,
        /// only release the family this model belongs to
        #[arg(long)]
        model: Option<String>,
    },
}

#[derive(Subcommand)]
enum SignatureCommand {
    /// show the stored history for a model
    Show {
        /// model identifier (resolution suffixes are ignored)
        model: String,
    },
    /// delete every cached signature
    Clear {
        /// skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum CredentialCommand {
    /// list credentials by public id
    List,
    /// print the installation salt
    Salt,
}

// ── helpers ─────────────────────────────────────────────────────────

fn open_state(args: &Args) -> Result<StateLayer, Box<dyn std::error::Error>> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = dir.clone();
    }
    Ok(Muninn::builder().config(&config).build()?)
}

/// confirm a prompt with the user; returns false if declined.
fn confirm(prompt: &str) -> bool {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false)
}

/// shorten long opaque values for table display.
fn abbreviate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let head: String = value.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

// ── commands ────────────────────────────────────────────────────────

fn cooldown_list(state: &StateLayer) {
    let snapshot = state.cooldowns().list_all();
    if snapshot.is_empty() {
        println!("no active cooldowns.");
        return;
    }

    println!("{:<40} {:<14} UNTIL", "CREDENTIAL", "FAMILY");
    println!("{}", "─".repeat(80));
    for (credential, families) in &snapshot {
        for (family, status) in families {
            println!(
                "{:<40} {:<14} {}",
                abbreviate(credential, 40),
                family,
                status.until_formatted
            );
        }
    }
}

fn cooldown_clear(state: &StateLayer, credential: &str, model: Option<&str>) {
    match model {
        Some(model) => {
            state.cooldowns().clear_cooldown(credential, model);
            println!(
                "released '{credential}' for family {}.",
                muninn::ModelFamily::classify(model)
            );
        }
        None => {
            state.cooldowns().clear_all_cooldowns(credential);
            println!("released all cooldowns of '{credential}'.");
        }
    }
}

fn signature_show(state: &StateLayer, model: &str) {
    let base = muninn::base_model_name(model);
    let history = state.signatures().history(model);
    if history.is_empty() {
        println!("no signatures cached for '{base}'.");
        return;
    }

    // show what a request would receive under the configured policy
    let opts = SignatureOptions::new(state.signature_policy());
    println!("{base} ({} entries, oldest first)", history.len());
    for (i, entry) in history.iter().enumerate() {
        println!(
            "  {}. {}  content: {:?}",
            i + 1,
            abbreviate(&entry.signature, 48),
            abbreviate(&entry.content, 40)
        );
    }
    if let Some(latest) = state.signatures().get_signature(model, &opts) {
        println!("served: {}", abbreviate(&latest.signature, 48));
    }
}

fn signature_clear(state: &StateLayer, yes: bool) {
    if !yes
        && !confirm(&format!(
            "delete every cached signature under {}?",
            state.signatures().dir().display()
        ))
    {
        println!("aborted.");
        return;
    }
    let removed = state.signatures().clear_all();
    println!("removed {removed} signature file(s).");
}

fn credential_list(state: &StateLayer) {
    let records = state.credentials().read_all();
    if records.is_empty() {
        println!("no credentials stored.");
        return;
    }

    println!(
        "{:<18} {:<32} {:<28} ENABLED",
        "PUBLIC ID", "EMAIL", "PROJECT"
    );
    println!("{}", "─".repeat(90));
    for record in &records {
        println!(
            "{:<18} {:<32} {:<28} {}",
            state.credentials().public_id(&record.refresh_token),
            abbreviate(record.email.as_deref().unwrap_or("-"), 32),
            abbreviate(record.project_id.as_deref().unwrap_or("-"), 28),
            if record.enable { "yes" } else { "no" }
        );
    }
    println!("\n{} credentials", records.len());
}

// ── main ────────────────────────────────────────────────────────────

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    if let Command::Version = args.command {
        println!("muninn {}", muninn::version_string());
        return;
    }

    let state = match open_state(&args) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    match &args.command {
        Command::Cooldowns(CooldownCommand::List) => cooldown_list(&state),
        Command::Cooldowns(CooldownCommand::Clear { credential, model }) => {
            cooldown_clear(&state, credential, model.as_deref())
        }
        Command::Signatures(SignatureCommand::Show { model }) => signature_show(&state, model),
        Command::Signatures(SignatureCommand::Clear { yes }) => signature_clear(&state, *yes),
        Command::Credentials(CredentialCommand::List) => credential_list(&state),
        Command::Credentials(CredentialCommand::Salt) => println!("{}", state.credentials().salt()),
        Command::Version => unreachable!("handled above"),
    }
}
