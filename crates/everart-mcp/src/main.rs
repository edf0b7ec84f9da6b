//! EverArt MCP server: AZTP-secured image generation over stdio.

mod client;
mod tools;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use aztp_mcp::config::{optional, require_secret};
use aztp_mcp::{
    serve_stdio, telemetry, Dispatcher, IdentityArgs, IdentityConfig, IdentitySlot, LogArgs,
    McpServer, ServerInfo,
};
use clap::{Args, Parser};

use crate::client::{EverArtClient, PollConfig};
use crate::tools::EverArtTools;

const SERVER_NAME: &str = "example-servers/everart";

#[derive(Parser)]
#[command(name = "everart-mcp", version, about = "AZTP-secured EverArt image generation MCP server")]
struct Cli {
    #[command(flatten)]
    identity: IdentityArgs,

    #[command(flatten)]
    everart: EverArtArgs,

    #[command(flatten)]
    log: LogArgs,
}

#[derive(Debug, Args)]
struct EverArtArgs {
    /// EverArt API key.
    #[arg(long, env = "EVERART_API_KEY", hide_env_values = true)]
    everart_api_key: Option<String>,

    /// Override the EverArt API endpoint.
    #[arg(long, env = "EVERART_BASE_URL")]
    everart_base_url: Option<String>,

    /// Longest time to wait for a generation to finish, in seconds.
    #[arg(long, env = "EVERART_MAX_WAIT_SECS", default_value_t = 300)]
    everart_max_wait_secs: u64,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let identity = IdentityConfig::from_args(cli.identity)?;
    let api_key = require_secret("EVERART_API_KEY", cli.everart.everart_api_key)?;
    let base_url = optional(cli.everart.everart_base_url);

    let client = EverArtClient::new(api_key, base_url.as_deref())
        .context("failed to build EverArt client")?;
    let poll = PollConfig {
        max_wait: Duration::from_secs(cli.everart.everart_max_wait_secs),
        ..PollConfig::default()
    };
    let dispatcher = Dispatcher::new(
        EverArtTools::new(client, poll),
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
