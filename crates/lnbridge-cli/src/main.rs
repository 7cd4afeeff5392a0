mod config;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use ln_types::{Amount, NodeId, P2PAddress};
use lnbridge_core::lightning::backend::LightningBackend;
use lnbridge_core::lightning::error::LightningError;
use lnbridge_core::lightning::settlement::wait_for_payment;
use lnbridge_core::lightning::types::{CreateInvoiceParams, InvoiceId, OpenChannelRequest};
use lnbridge_lnd::LndBackend;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "lnbridge")]
#[command(about = "Lightning node client for payment processing")]
struct Cli {
    /// Connection string, e.g. `type=lnd-rest;server=https://127.0.0.1:8080;macaroon=...`
    #[arg(long, env = "LNBRIDGE_CONNECTION", conflicts_with = "config")]
    connection: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Info,
    CreateInvoice {
        #[arg(long)]
        amount_msat: u64,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        expiry_secs: Option<u64>,
        #[arg(long)]
        private: bool,
        /// Block until the invoice is paid.
        #[arg(long)]
        wait: bool,
    },
    GetInvoice {
        id: String,
    },
    CancelInvoice {
        id: String,
    },
    Pay {
        payment_request: String,
    },
    OpenChannel {
        #[arg(long)]
        node: String,
        #[arg(long)]
        amount_sat: u64,
        #[arg(long)]
        fee_rate: Option<u64>,
    },
    Channels,
    DepositAddress,
    Connect {
        /// `node_id@host:port`
        address: String,
    },
    Listen,
}

fn load_config(cli: &Cli) -> Result<CliConfig> {
    match (&cli.config, &cli.connection) {
        (Some(path), _) => CliConfig::from_file(path),
        (None, Some(connection)) => CliConfig::from_connection_string(connection),
        (None, None) => Err(anyhow!(
            "either --config or --connection (LNBRIDGE_CONNECTION) must be set"
        )),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_invoice_id(id: &str) -> Result<InvoiceId> {
    id.parse::<InvoiceId>()
        .with_context(|| format!("invalid invoice id {id}"))
}

async fn listen(backend: &LndBackend) -> Result<()> {
    let session = backend.listen_session().await?;
    let stop = CancellationToken::new();
    let trigger = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    info!("listening for invoices, press ctrl-c to stop");
    let outcome = loop {
        match session.wait_invoice(&stop).await {
            Ok(invoice) => println!("{}", serde_json::to_string(&invoice)?),
            Err(LightningError::Cancelled) => break Ok(()),
            Err(err) => break Err(err),
        }
    };
    session.release().await;
    outcome.context("invoice stream failed")
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;
    let backend = LndBackend::new(cfg.lnd.clone()).context("failed to build lnd client")?;

    match cli.cmd {
        Commands::Info => print_json(&backend.get_info().await?)?,
        Commands::CreateInvoice {
            amount_msat,
            description,
            expiry_secs,
            private,
            wait,
        } => {
            let amount = Amount::from_msat(amount_msat)?;
            let expiry = Duration::from_secs(expiry_secs.unwrap_or(cfg.invoice_expiry_secs));
            let mut params = CreateInvoiceParams::new(amount, description, expiry);
            params.private_route_hints = private;

            // Subscribe first so a fast payer cannot slip in between.
            let session = if wait {
                Some(backend.listen_session().await?)
            } else {
                None
            };
            let invoice = backend.create_invoice(params).await?;
            print_json(&invoice)?;

            if let Some(session) = session {
                let paid =
                    wait_for_payment(&session, &invoice.id, cfg.settlement_timeout_secs).await;
                session.release().await;
                print_json(&paid?)?;
            }
        }
        Commands::GetInvoice { id } => {
            let id = parse_invoice_id(&id)?;
            match backend.get_invoice(&id).await? {
                Some(invoice) => print_json(&invoice)?,
                None => return Err(anyhow!("invoice {id} not found")),
            }
        }
        Commands::CancelInvoice { id } => {
            let id = parse_invoice_id(&id)?;
            backend.cancel_invoice(&id).await?;
            info!("cancelled invoice {id}");
        }
        Commands::Pay { payment_request } => {
            print_json(&backend.pay(&payment_request).await?)?;
        }
        Commands::OpenChannel {
            node,
            amount_sat,
            fee_rate,
        } => {
            let node: NodeId = node
                .parse()
                .map_err(|e| anyhow!("invalid node id {node}: {e}"))?;
            let request = OpenChannelRequest {
                node,
                channel_amount: Amount::from_sat(amount_sat)?,
                fee_rate_sat_per_vbyte: fee_rate,
            };
            print_json(&backend.open_channel(request).await?)?;
        }
        Commands::Channels => print_json(&backend.list_channels().await?)?,
        Commands::DepositAddress => println!("{}", backend.get_deposit_address().await?),
        Commands::Connect { address } => {
            let address: P2PAddress = address
                .parse()
                .map_err(|e| anyhow!("invalid address {address}: {e}"))?;
            let result = backend.connect_to(&address).await?;
            if result != lnbridge_core::lightning::types::ConnectionResult::Ok {
                warn!("could not connect to {address}");
            }
            print_json(&result)?;
        }
        Commands::Listen => listen(&backend).await?,
    }

    Ok(())
}
