mod commands;
mod config;
mod logging;

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Parser};
use logging::init_logging;

#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(
        long,
        short,
        default_value = "/etc/jailsync.yaml",
        action = ArgAction::Set,
        env = "JAILSYNC_CONFIG"
    )]
    config: PathBuf,

    /// Verbosity level (repeat for more)
    #[arg(long, short, action=ArgAction::Count)]
    debug: u8,
}

#[derive(clap::Subcommand)]
pub(crate) enum Commands {
    /// Push local jails and bans to the central store (one pass)
    Sync {
        /// Apply the central global bans to every local jail instead
        #[arg(long)]
        apply_global: bool,
        /// Override the configured server name
        #[arg(long)]
        server: Option<String>,
    },
    /// Check the central store and fail2ban connectivity
    Test {
        #[arg(long)]
        server: Option<String>,
    },
    /// Validate config file
    Check,
    /// Run the central sync HTTP endpoint
    Run,
    /// Manage registered servers
    Server {
        #[command(subcommand)]
        command: ServerCommand,
    },
    /// Manage global bans
    GlobalBan {
        #[command(subcommand)]
        command: GlobalBanCommand,
    },
    /// Ban an IP in a local jail and record it centrally
    Ban {
        #[arg(long)]
        jail: String,
        ip: IpAddr,
        #[arg(long, default_value = "cli")]
        author: String,
    },
    /// Unban an IP in a local jail and record it centrally
    Unban {
        #[arg(long)]
        jail: String,
        ip: IpAddr,
        #[arg(long, default_value = "cli")]
        author: String,
    },
    /// List active bans
    Bans {
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        jail: Option<String>,
    },
}

#[derive(clap::Subcommand)]
pub(crate) enum ServerCommand {
    /// Register a server and issue an API key
    Add {
        name: String,
        #[arg(long, default_value = "127.0.0.1")]
        ip: String,
    },
    /// Issue a new API key, invalidating the old one
    RotateKey { name: String },
    List,
    Deactivate { name: String },
    Activate { name: String },
}

#[derive(clap::Subcommand)]
pub(crate) enum GlobalBanCommand {
    Add {
        ip: IpAddr,
        #[arg(long)]
        reason: String,
        #[arg(long, default_value = "cli")]
        author: String,
        #[arg(long)]
        permanent: bool,
        /// e.g. `12h` or `7days`
        #[arg(long, value_parser = humantime::parse_duration, conflicts_with = "permanent")]
        expires_in: Option<Duration>,
    },
    Remove {
        ip: IpAddr,
        #[arg(long, default_value = "cli")]
        author: String,
    },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli);

    match &cli.command {
        Commands::Sync {
            apply_global,
            server,
        } => crate::commands::sync::command(&cli, *apply_global, server.as_deref()).await,
        Commands::Test { server } => crate::commands::test::command(&cli, server.as_deref()).await,
        Commands::Check => crate::commands::check::command(&cli).await,
        Commands::Run => crate::commands::run::command(&cli).await,
        Commands::Server { command } => crate::commands::server::command(&cli, command).await,
        Commands::GlobalBan { command } => {
            crate::commands::global_ban::command(&cli, command).await
        }
        Commands::Ban { jail, ip, author } => {
            crate::commands::ban::ban(&cli, jail, *ip, author).await
        }
        Commands::Unban { jail, ip, author } => {
            crate::commands::ban::unban(&cli, jail, *ip, author).await
        }
        Commands::Bans { server, jail } => {
            crate::commands::bans::command(&cli, server.clone(), jail.clone()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync_flags() {
        let cli = Cli::parse_from(["jailsync", "sync", "--apply-global", "--server", "web-2"]);
        assert_eq!(cli.config, PathBuf::from("/etc/jailsync.yaml"));
        match cli.command {
            Commands::Sync {
                apply_global,
                server,
            } => {
                assert!(apply_global);
                assert_eq!(server.as_deref(), Some("web-2"));
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn test_parse_global_ban_expiry() {
        let cli = Cli::parse_from([
            "jailsync",
            "-c",
            "/tmp/j.yaml",
            "global-ban",
            "add",
            "203.0.113.5",
            "--reason",
            "scanner",
            "--expires-in",
            "12h",
        ]);
        match cli.command {
            Commands::GlobalBan {
                command:
                    GlobalBanCommand::Add {
                        ip,
                        expires_in,
                        author,
                        permanent,
                        ..
                    },
            } => {
                assert_eq!(ip.to_string(), "203.0.113.5");
                assert_eq!(expires_in, Some(Duration::from_secs(12 * 3600)));
                assert_eq!(author, "cli");
                assert!(!permanent);
            }
            _ => panic!("expected global-ban add"),
        }
    }

    #[test]
    fn test_rejects_invalid_ip() {
        assert!(Cli::try_parse_from(["jailsync", "ban", "--jail", "sshd", "bogus"]).is_err());
    }
}
