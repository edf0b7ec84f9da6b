//! PayPal MCP server: AZTP-secured payment operations over stdio.

mod client;
mod tools;

use std::process::ExitCode;

use anyhow::Context;
use aztp_mcp::config::{optional, require, require_secret};
use aztp_mcp::{
    serve_stdio, telemetry, Dispatcher, IdentityArgs, IdentityConfig, IdentitySlot, LogArgs,
    McpServer, ServerInfo,
};
use clap::{Args, Parser};

use crate::client::{PayPalClient, PayPalEnvironment};
use crate::tools::{PayPalTools, RedirectUrls};

const SERVER_NAME: &str = "paypal-mcp-server";

#[derive(Parser)]
#[command(name = "paypal-mcp", version, about = "AZTP-secured PayPal payments MCP server")]
struct Cli {
    #[command(flatten)]
    identity: IdentityArgs,

    #[command(flatten)]
    paypal: PayPalArgs,

    #[command(flatten)]
    log: LogArgs,
}

#[derive(Debug, Args)]
struct PayPalArgs {
    #[arg(long, env = "PAYPAL_CLIENT_ID", hide_env_values = true)]
    paypal_client_id: Option<String>,

    #[arg(long, env = "PAYPAL_CLIENT_SECRET", hide_env_values = true)]
    paypal_client_secret: Option<String>,

    /// `live` for production; anything else uses the sandbox.
    #[arg(long, env = "PAYPAL_ENVIRONMENT")]
    paypal_environment: Option<String>,

    /// Where buyers land after approving an order or subscription.
    #[arg(long, env = "PAYPAL_RETURN_URL")]
    paypal_return_url: Option<String>,

    #[arg(long, env = "PAYPAL_CANCEL_URL")]
    paypal_cancel_url: Option<String>,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let identity = IdentityConfig::from_args(cli.identity)?;
    let args = cli.paypal;
    let client_id = require("PAYPAL_CLIENT_ID", args.paypal_client_id)?;
    let client_secret = require_secret("PAYPAL_CLIENT_SECRET", args.paypal_client_secret)?;
    let environment = PayPalEnvironment::from_name(optional(args.paypal_environment).as_deref());
    let redirects = RedirectUrls {
        return_url: optional(args.paypal_return_url),
        cancel_url: optional(args.paypal_cancel_url),
    };

    tracing::info!(?environment, "using PayPal environment");
    let client = PayPalClient::new(environment, client_id, client_secret)
        .context("failed to build PayPal client")?;
    let dispatcher = Dispatcher::new(
        PayPalTools::new(client, redirects),
        tools::identity_tool(),
        IdentitySlot::new(),
    )?;
    let server = McpServer::new(
        ServerInfo::new(SERVER_NAME, env!("CARGO_PKG_VERSION")),
        dispatcher,
    );

    serve_stdio(server, &identity).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init(cli.log.log_level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Fatal error running server: {e:#}");
            ExitCode::FAILURE
        }
    }
}
