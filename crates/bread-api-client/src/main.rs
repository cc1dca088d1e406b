/*
[INPUT]:  CLI arguments, optional YAML configuration file, OS shutdown signal
[OUTPUT]: Results of individual Bread API calls on stdout
[POS]:    Binary entry point
[UPDATE]: When changing CLI commands, startup flow, or shutdown handling
*/

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bread_api_client::auth::device_id;
use bread_api_client::{
    BreadClient, ClientServices, FeatureFlag, FileConfig, FilePreferences, FileSecureStorage,
    PersistentKeyProvider,
};

#[derive(Parser, Debug)]
#[command(name = "bread-api", version, about = "Bread API client")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Name of the local wallet whose auth key is used
    #[arg(long = "account", default_value = "default")]
    account: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the authentication key if it does not exist yet
    InitKey,
    /// Print this install's device id
    DeviceId,
    /// Fetch and store a new API token
    Token,
    /// Print the current fee per kilobyte
    FeePerKb,
    /// Refresh feature flags and print them
    Features,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let file_config = match &args.config_path {
        Some(path) => FileConfig::from_file(path).context("load config")?,
        None => FileConfig::default(),
    };
    let config = file_config.client_config();
    let data_dir = file_config.data_dir();
    info!(base_url = %config.base_url(), data_dir = %data_dir.display(), "starting bread-api");

    let key_provider = Arc::new(PersistentKeyProvider::new(data_dir.join("keys"), &args.account));
    let preferences = Arc::new(
        FilePreferences::open(data_dir.join("preferences.json")).context("open preferences")?,
    );
    let storage = Arc::new(FileSecureStorage::new(data_dir.join("tokens")));

    if let Command::InitKey = args.command {
        let key = key_provider.get_or_create().context("create auth key")?;
        println!("{}", key.public_key_base58());
        return Ok(());
    }
    if let Command::DeviceId = args.command {
        println!("{}", device_id(preferences.as_ref()));
        return Ok(());
    }

    let client = BreadClient::new(
        config,
        ClientServices::new(key_provider, storage, preferences),
    )
    .context("build client")?;
    setup_signal_handler(&client);

    match args.command {
        Command::Token => {
            client.get_token().await.context("fetch token")?;
            let token = client
                .token_manager()
                .tokens()
                .load()
                .context("read stored token")?
                .ok_or_else(|| anyhow!("token endpoint succeeded but nothing was stored"))?;
            println!("user {}", token.user_id);
        }
        Command::FeePerKb => {
            let fee = client.fee_per_kb().await;
            match fee.error {
                Some(err) => return Err(anyhow!("fee lookup failed: {err}")),
                None => println!("{}", fee.value),
            }
        }
        Command::Features => {
            let stored = client
                .update_feature_flags()
                .await
                .context("update feature flags")?;
            info!(stored, "feature flags updated");
            for flag in [FeatureFlag::BuyBitcoin, FeatureFlag::EarlyAccess] {
                println!("{flag}: {}", client.feature_enabled(flag));
            }
        }
        Command::InitKey | Command::DeviceId => {}
    }

    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn setup_signal_handler(client: &BreadClient) {
    let shutdown = client.shutdown_token();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown.cancel();
    });
}
