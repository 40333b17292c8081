//! Command-line interface definition for CVForge
//!
//! The binary is a thin consumer of [`crate::client::ResumeClient`]: each
//! command maps to one client operation.

use clap::{Parser, Subcommand};

use crate::config::StorageBackend;
use crate::services::templates::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE};

/// CVForge - AI resume builder client
///
/// Sign in, browse and continue conversations with the resume assistant,
/// and list generated PDFs.
#[derive(Parser, Debug, Clone)]
#[command(name = "cvforge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Override the backend base URL
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Override where the session token is kept
    #[arg(long, value_enum)]
    pub storage: Option<StorageBackend>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for CVForge
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Sign in with email and password
    Login {
        /// Account email
        email: String,

        /// Account password
        #[arg(long, env = "CVFORGE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and sign in
    Signup {
        /// Display name
        name: String,

        /// Account email
        email: String,

        /// Account password
        #[arg(long, env = "CVFORGE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Work with conversations
    Chats {
        /// Conversation subcommand
        #[command(subcommand)]
        command: ChatCommand,
    },

    /// List generated PDFs, one page at a time
    Templates {
        /// Page number (1-based)
        #[arg(long, default_value_t = DEFAULT_PAGE)]
        page: u32,

        /// Items per page
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },

    /// Show one generated PDF
    Template {
        /// PDF identifier
        id: String,
    },

    /// Check that the backend answers with JSON
    Ping,
}

/// Conversation subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ChatCommand {
    /// List conversations
    List {
        /// Only show conversations whose title or last message contains this
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show a conversation with its messages
    Show {
        /// Conversation identifier
        id: String,
    },

    /// Send a message to an existing conversation
    Send {
        /// Conversation identifier
        id: String,

        /// Message text
        text: String,
    },

    /// Start a new conversation
    New {
        /// First message
        text: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_whoami() {
        let cli = Cli::try_parse_from(["cvforge", "whoami"]).unwrap();
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(matches!(cli.command, Commands::Whoami));
    }

    #[test]
    fn test_cli_parse_login_with_password_flag() {
        let cli = Cli::try_parse_from(["cvforge", "login", "sam@example.com", "--password", "pw"])
            .unwrap();
        match cli.command {
            Commands::Login { email, password } => {
                assert_eq!(email, "sam@example.com");
                assert_eq!(password, "pw");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_templates_defaults() {
        let cli = Cli::try_parse_from(["cvforge", "templates"]).unwrap();
        match cli.command {
            Commands::Templates { page, page_size } => {
                assert_eq!(page, 1);
                assert_eq!(page_size, 9);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_chats_send() {
        let cli = Cli::try_parse_from(["cvforge", "chats", "send", "c1", "make it shorter"]).unwrap();
        match cli.command {
            Commands::Chats {
                command: ChatCommand::Send { id, text },
            } => {
                assert_eq!(id, "c1");
                assert_eq!(text, "make it shorter");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_global_overrides() {
        let cli = Cli::try_parse_from([
            "cvforge",
            "--base-url",
            "https://api.example.com",
            "--storage",
            "memory",
            "-v",
            "ping",
        ])
        .unwrap();
        assert_eq!(cli.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(cli.storage, Some(StorageBackend::Memory));
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_rejects_unknown_storage() {
        assert!(Cli::try_parse_from(["cvforge", "--storage", "floppy", "ping"]).is_err());
    }

    #[test]
    fn test_cli_parse_chats_list_search() {
        let cli = Cli::try_parse_from(["cvforge", "chats", "list", "--search", "resume"]).unwrap();
        match cli.command {
            Commands::Chats {
                command: ChatCommand::List { search },
            } => assert_eq!(search.as_deref(), Some("resume")),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
