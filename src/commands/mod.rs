//! Command handlers for the CVForge binary
//!
//! Each handler drives one [`ResumeClient`] operation and renders the result
//! for a terminal. Errors are returned to `main`; handlers only add a hint
//! for the error kinds a user can act on.

use colored::Colorize;

use crate::cli::{ChatCommand, Commands};
use crate::client::{ProbeOutcome, ResumeClient};
use crate::config::Config;
use crate::error::{ApiError, ErrorKind, Result};

pub mod chats;
pub mod templates;

/// Runs `command` against a client built from `config`.
pub async fn run(config: Config, command: Commands) -> Result<()> {
    let client = ResumeClient::from_config(&config)?;
    client.init().await;

    let result = dispatch(&client, command).await;
    if let Err(e) = &result {
        if let Some(api) = e.downcast_ref::<ApiError>() {
            print_hint(api, &config);
        }
    }
    result
}

async fn dispatch(client: &ResumeClient, command: Commands) -> Result<()> {
    match command {
        Commands::Login { email, password } => login(client, &email, &password).await,
        Commands::Signup {
            name,
            email,
            password,
        } => signup(client, &name, &email, &password).await,
        Commands::Logout => logout(client).await,
        Commands::Whoami => whoami(client).await,
        Commands::Chats { command } => match command {
            ChatCommand::List { search } => chats::list(client, search.as_deref()).await,
            ChatCommand::Show { id } => chats::show(client, &id).await,
            ChatCommand::Send { id, text } => chats::send(client, &id, &text).await,
            ChatCommand::New { text } => chats::create(client, &text).await,
        },
        Commands::Templates { page, page_size } => {
            templates::list(client, page, page_size).await
        }
        Commands::Template { id } => templates::show(client, &id).await,
        Commands::Ping => ping(client).await,
    }
}

fn print_hint(error: &ApiError, config: &Config) {
    let hint = match error.kind() {
        ErrorKind::Unauthenticated => "Sign in first: cvforge login <email>".to_string(),
        ErrorKind::Network => format!(
            "Cannot reach {}. Check your connection and api.base_url.",
            config.api.base_url
        ),
        ErrorKind::Protocol => {
            "The server did not answer with JSON. Run `cvforge ping` to inspect it.".to_string()
        }
        _ if error.is_unauthorized() => {
            "Your session was rejected. Sign in again: cvforge login <email>".to_string()
        }
        _ => return,
    };
    eprintln!("{}", hint.yellow());
}

async fn login(client: &ResumeClient, email: &str, password: &str) -> Result<()> {
    let session = client.login(email, password).await?;
    let who = session
        .display_name
        .or(session.email)
        .unwrap_or_else(|| email.to_string());
    println!("{}", format!("Signed in as {}", who).green());
    Ok(())
}

async fn signup(client: &ResumeClient, name: &str, email: &str, password: &str) -> Result<()> {
    client.signup(name, email, password).await?;
    println!("{}", format!("Account created. Welcome, {}!", name).green());
    Ok(())
}

async fn logout(client: &ResumeClient) -> Result<()> {
    client.logout().await?;
    println!("{}", "Signed out.".green());
    Ok(())
}

async fn whoami(client: &ResumeClient) -> Result<()> {
    match client.whoami().await {
        Some(session) => {
            println!(
                "{} {}",
                "Name: ".bold(),
                session.display_name.as_deref().unwrap_or("-")
            );
            println!(
                "{} {}",
                "Email:".bold(),
                session.email.as_deref().unwrap_or("-")
            );
            println!("{} {}", "Token:".bold(), session.token_prefix().dimmed());
        }
        None => println!("{}", "Not signed in.".yellow()),
    }
    Ok(())
}

async fn ping(client: &ResumeClient) -> Result<()> {
    let report = client.probe().await;
    println!("Probing {}", report.url.cyan());
    match report.outcome {
        ProbeOutcome::Json { status } => {
            println!(
                "{}",
                format!("Server is responding with JSON (status {}).", status).green()
            );
        }
        ProbeOutcome::NotJson { message, snippet } => {
            println!("{}", format!("Server answered, but {}.", message).yellow());
            println!("This usually means the backend is not running behind this URL.");
            println!("First {} characters:", snippet.chars().count());
            println!("{}", snippet.dimmed());
        }
        ProbeOutcome::Unreachable(reason) => {
            println!("{}", format!("No answer: {}", reason).red());
        }
    }
    Ok(())
}

/// Shortens `text` to `max` characters for table cells.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
