use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use epay_tools::{EpayClient, EpayConfig};
use log::*;

mod payments;

use crate::payments::{print_charge, print_public_key, print_status, print_token};

#[derive(Parser, Debug)]
#[command(version = "0.1.0", about = "Talk to the Epay payment processor using the EPAY_* environment configuration")]
pub struct Arguments {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[clap(name = "token", about = "Obtain an access token and print it")]
    AccessToken,
    #[clap(name = "key", about = "Fetch the processor's public key and print its size")]
    PublicKey,
    #[clap(name = "pay", about = "Charge the configured card for an invoice")]
    Pay(PayParams),
    #[clap(name = "status", about = "Look up the status of an invoice's transaction")]
    Status(StatusParams),
}

#[derive(Debug, Args)]
pub struct PayParams {
    /// The merchant's invoice id. Charges are not idempotent, so do not re-use an invoice id unless you know the
    /// previous attempt failed.
    #[arg(short = 'i', long = "invoice")]
    invoice_id: String,
    /// The amount to charge, in minor currency units
    #[arg(short = 'a', long = "amount")]
    amount: i64,
    /// Overrides EPAY_CURRENCY
    #[arg(short = 'c', long = "currency")]
    currency: Option<String>,
}

#[derive(Debug, Args)]
pub struct StatusParams {
    #[arg(short = 'i', long = "invoice")]
    invoice_id: String,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let cli = Arguments::parse();
    let config = EpayConfig::new_from_env_or_default();
    if let Err(e) = run(cli.command, config).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(command: Command, config: EpayConfig) -> anyhow::Result<()> {
    let client = EpayClient::new(config)?;
    // The public key is not behind OAuth, so there is no need for a token to fetch it
    let refresher = match command {
        Command::PublicKey => None,
        _ => Some(client.start_token_refresher().await?),
    };
    let result = match command {
        Command::AccessToken => print_token(&client),
        Command::PublicKey => print_public_key(&client).await,
        Command::Pay(params) => print_charge(&client, params).await,
        Command::Status(params) => print_status(&client, &params.invoice_id).await,
    };
    if let Some(refresher) = refresher {
        refresher.stop().await;
    }
    debug!("Bye!");
    result
}
