//! Keyx CLI
//!
//! Command-line interface for keyx - pairwise Diffie-Hellman key exchange.

mod commands;
mod config;
mod display;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use keyx_core::BackendKind;
use uuid::Uuid;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "keyx")]
#[command(version, about = "Pairwise Diffie-Hellman key exchange")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory (default: ~/.keyx)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Key exchange server URL
    #[arg(
        long,
        global = true,
        env = "KEYX_SERVER_URL",
        default_value = "http://127.0.0.1:8080"
    )]
    server: String,

    /// Identity to act as
    #[arg(long, global = true, env = "KEYX_USER")]
    user: Option<String>,

    /// Key agreement backend (ecdh, classical)
    #[arg(long, global = true, env = "KEYX_BACKEND", default_value = "ecdh")]
    backend: BackendKind,

    /// Base64 key for encrypting stored key material
    #[arg(long, global = true, env = "KEYX_STORAGE_KEY", hide_env_values = true)]
    storage_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a key exchange with another user
    Request {
        /// Counterparty identity
        user: String,
    },

    /// List your key exchange requests
    Requests,

    /// Confirm a request addressed to you
    Confirm {
        /// Request ID
        request_id: Uuid,
    },

    /// Decline a request addressed to you
    Decline {
        /// Request ID
        request_id: Uuid,
    },

    /// Derive the shared secret for a confirmed request you opened
    Finalize {
        /// Request ID
        request_id: Uuid,
    },

    /// Show your public keys per counterparty
    PublicKeys,

    /// Manage Diffie-Hellman parameters
    #[command(subcommand)]
    Params(ParamsCommands),

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ParamsCommands {
    /// Print the built-in RFC 3526 2048-bit group as PEM
    Builtin {
        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Upload a parameter file to the server
    Upload {
        /// PEM or DER parameter file
        file: PathBuf,
    },

    /// Download the latest parameter set
    Fetch {
        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn run(cli: Cli) -> Result<()> {
    let config = CliConfig {
        data_dir: cli.data_dir.unwrap_or_else(CliConfig::default_data_dir),
        server_url: cli.server,
        user: cli.user,
        backend: cli.backend,
        storage_key: cli.storage_key,
    };

    match cli.command {
        Commands::Request { user } => commands::exchange::request(&config, &user)?,
        Commands::Requests => commands::exchange::list(&config)?,
        Commands::Confirm { request_id } => commands::exchange::confirm(&config, request_id)?,
        Commands::Decline { request_id } => commands::exchange::decline(&config, request_id)?,
        Commands::Finalize { request_id } => commands::exchange::finalize(&config, request_id)?,
        Commands::PublicKeys => commands::keys::public_keys(&config)?,
        Commands::Params(cmd) => match cmd {
            ParamsCommands::Builtin { output } => commands::params::builtin(output.as_deref())?,
            ParamsCommands::Upload { file } => commands::params::upload(&config, &file)?,
            ParamsCommands::Fetch { output } => {
                commands::params::fetch(&config, output.as_deref())?
            }
        },
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "keyx", &mut io::stdout());
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "keyx",
            "request",
            "bob",
            "--user",
            "alice",
            "--backend",
            "classical",
        ])
        .unwrap();

        assert_eq!(cli.user.as_deref(), Some("alice"));
        assert_eq!(cli.backend, BackendKind::Classical);
        assert!(matches!(cli.command, Commands::Request { ref user } if user == "bob"));
    }

    #[test]
    fn test_rejects_malformed_request_id() {
        assert!(Cli::try_parse_from(["keyx", "confirm", "not-a-uuid"]).is_err());
    }

    #[test]
    fn test_params_builtin_subcommand() {
        let cli = Cli::try_parse_from(["keyx", "params", "builtin", "-o", "dh.pem"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Params(ParamsCommands::Builtin { output: Some(ref path) })
                if path == &PathBuf::from("dh.pem")
        ));
        assert!(Cli::try_parse_from(["keyx", "params", "generate"]).is_err());
    }
}
