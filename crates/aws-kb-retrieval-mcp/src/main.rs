//! AWS KB Retrieval MCP server: AZTP-secured retrieval from Bedrock knowledge
//! bases over stdio.

mod bedrock;
mod sigv4;
mod tools;

use std::process::ExitCode;

use anyhow::Context;
use aztp_mcp::config::{optional, require, require_secret};
use aztp_mcp::{
    serve_stdio, telemetry, ConfigError, Dispatcher, IdentityArgs, IdentityConfig, IdentitySlot,
    LogArgs, McpServer, ServerInfo,
};
use clap::{Args, Parser};
use secrecy::SecretString;

use crate::bedrock::BedrockKnowledgeBase;
use crate::sigv4::Credentials;
use crate::tools::KbTools;

const SERVER_NAME: &str = "aws-kb-retrieval-server";

#[derive(Parser)]
#[command(name = "aws-kb-retrieval-mcp", version, about = "AZTP-secured AWS knowledge base retrieval MCP server")]
struct Cli {
    #[command(flatten)]
    identity: IdentityArgs,

    #[command(flatten)]
    aws: AwsArgs,

    #[command(flatten)]
    log: LogArgs,
}

#[derive(Debug, Args)]
struct AwsArgs {
    /// AWS region of the knowledge base.
    #[arg(long, env = "AWS_REGION")]
    aws_region: Option<String>,

    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    aws_access_key_id: Option<String>,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    aws_secret_access_key: Option<String>,

    /// Session token for temporary credentials.
    #[arg(long, env = "AWS_SESSION_TOKEN", hide_env_values = true)]
    aws_session_token: Option<String>,
}

impl AwsArgs {
    fn into_parts(self) -> Result<(String, Credentials), ConfigError> {
        let region = require("AWS_REGION", self.aws_region)?;
        let credentials = Credentials {
            access_key_id: require("AWS_ACCESS_KEY_ID", self.aws_access_key_id)?,
            secret_access_key: require_secret("AWS_SECRET_ACCESS_KEY", self.aws_secret_access_key)?,
            session_token: optional(self.aws_session_token).map(SecretString::from),
        };
        Ok((region, credentials))
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let identity = IdentityConfig::from_args(cli.identity)?;
    let (region, credentials) = cli.aws.into_parts()?;

    let kb = BedrockKnowledgeBase::new(region, credentials)
        .context("failed to build Bedrock client")?;
    let dispatcher = Dispatcher::new(KbTools::new(kb), tools::identity_tool(), IdentitySlot::new())?;
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
