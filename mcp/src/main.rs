use std::time::Duration;

use clap::Parser;
use confluence_core::ProfileSource;
use confluence_mcp_runtime::{McpCommands, RuntimeConfig, run as run_mcp};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "confluence-mcp",
    version,
    about = "Confluence MCP server over stdio for Cloud and Datacenter deployments"
)]
struct Cli {
    /// Confluence base URL, e.g. https://your-domain.atlassian.net
    #[arg(long, env = "CONFLUENCE_BASE_URL")]
    base_url: Option<String>,

    /// Deployment type: cloud (default) or datacenter
    #[arg(long, env = "CONFLUENCE_DEPLOYMENT_TYPE")]
    deployment_type: Option<String>,

    /// Account email (Cloud only)
    #[arg(long, env = "CONFLUENCE_EMAIL")]
    email: Option<String>,

    /// API token (Cloud) or personal access token (Datacenter)
    #[arg(long, env = "CONFLUENCE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Per-request timeout in seconds; 0 disables it
    #[arg(long, env = "CONFLUENCE_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    #[command(subcommand)]
    command: McpCommands,
}

impl Cli {
    fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            profile: ProfileSource {
                base_url: self.base_url.clone(),
                deployment_type: self.deployment_type.clone(),
                email: self.email.clone(),
                api_token: self.api_token.clone(),
            },
            request_timeout: (self.request_timeout_secs > 0)
                .then(|| Duration::from_secs(self.request_timeout_secs)),
        }
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // stdout carries the protocol stream
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confluence_mcp=info,confluence_mcp_runtime=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.runtime_config();
    tracing::debug!(event = "config_loaded", profile = ?config.profile);

    let code = run_mcp(config, cli.command).await;
    std::process::exit(code);
}
