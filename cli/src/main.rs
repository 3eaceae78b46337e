//! ethkeep - account custody and signing from the command line

mod commands;
mod config;
mod directory;

use clap::{Parser, Subcommand};
use commands::App;
use config::Config;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ethkeep")]
#[command(about = "Create, store and use Ethereum accounts", version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Node JSON-RPC endpoint (overrides eth_url)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Directory holding the vault and account names (overrides data_dir)
    #[arg(long, global = true, value_name = "DIR")]
    datadir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new account and print its recovery phrase
    Create {
        #[arg(long)]
        pass: String,
        /// Name for the account (defaults to its address)
        #[arg(long, default_value = "")]
        name: String,
    },

    /// List named accounts
    Show,

    /// Delete an account
    Delete {
        #[arg(long)]
        pass: String,
        #[arg(long)]
        name: String,
    },

    /// Import an account from its recovery phrase
    Import {
        #[arg(long)]
        pass: String,
        #[arg(long, default_value = "")]
        name: String,
        /// Recovery phrase, quoted
        #[arg(long)]
        words: String,
    },

    /// Query an account's balance
    Balance {
        #[arg(long)]
        pass: String,
        #[arg(long)]
        name: String,
    },

    /// Send native currency
    Transfer {
        #[arg(long)]
        pass: String,
        #[arg(long)]
        name: String,
        /// Recipient address
        #[arg(long)]
        to: String,
        /// Amount in ether, e.g. 1.5
        #[arg(long)]
        value: String,
    },

    /// Deploy the token contract
    #[command(alias = "deploytoken")]
    DeployToken {
        #[arg(long)]
        pass: String,
        #[arg(long)]
        name: String,
    },

    /// Mint tokens to an address
    #[command(alias = "minttoken")]
    MintToken {
        #[arg(long)]
        pass: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        to: String,
        /// Raw token units
        #[arg(long)]
        value: String,
    },

    /// Send tokens to an address
    #[command(alias = "sendtoken")]
    SendToken {
        #[arg(long)]
        pass: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        to: String,
        /// Raw token units
        #[arg(long)]
        value: String,
    },

    /// Query an account's token balance
    #[command(alias = "balancetoken")]
    BalanceToken {
        #[arg(long)]
        name: String,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.url {
        config.eth_url = url;
    }
    if let Some(datadir) = cli.datadir {
        config.data_dir = datadir;
    }
    log::debug!("Using node {} and data dir {}", config.eth_url, config.data_dir.display());

    let app = App::open(config)?;
    let mut out = io::stdout().lock();

    match cli.command {
        Commands::Create { pass, name } => app.create(&mut out, &pass, &name),
        Commands::Show => app.show(&mut out),
        Commands::Delete { pass, name } => app.delete(&mut out, &pass, &name),
        Commands::Import { pass, name, words } => app.import(&mut out, &pass, &name, &words),
        Commands::Balance { pass, name } => app.balance(&mut out, &pass, &name),
        Commands::Transfer {
            pass,
            name,
            to,
            value,
        } => app.transfer(&mut out, &pass, &name, &to, &value),
        Commands::DeployToken { pass, name } => app.deploy_token(&mut out, &pass, &name),
        Commands::MintToken {
            pass,
            name,
            to,
            value,
        } => app.mint_token(&mut out, &pass, &name, &to, &value),
        Commands::SendToken {
            pass,
            name,
            to,
            value,
        } => app.send_token(&mut out, &pass, &name, &to, &value),
        Commands::BalanceToken { name } => app.balance_token(&mut out, &name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_legacy_command_names() {
        let cli = Cli::try_parse_from(["ethkeep", "balancetoken", "--name", "alice"]).unwrap();
        assert!(matches!(cli.command, Commands::BalanceToken { name } if name == "alice"));

        let cli = Cli::try_parse_from([
            "ethkeep", "sendtoken", "--pass", "p", "--name", "a", "--to", "0x00", "--value", "1",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::SendToken { .. }));
    }

    #[test]
    fn test_global_overrides() {
        let cli = Cli::try_parse_from(["ethkeep", "show", "--url", "http://node:8545", "--datadir", "/tmp/k"])
            .unwrap();
        assert_eq!(cli.url.as_deref(), Some("http://node:8545"));
        assert_eq!(cli.datadir, Some(PathBuf::from("/tmp/k")));
    }

    #[test]
    fn test_create_name_optional() {
        let cli = Cli::try_parse_from(["ethkeep", "create", "--pass", "secret"]).unwrap();
        assert!(matches!(cli.command, Commands::Create { name, .. } if name.is_empty()));
    }
}
