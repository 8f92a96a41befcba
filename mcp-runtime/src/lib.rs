//! Model Context Protocol runtime for Confluence: the HTTP gateway, the
//! operation and resource registry, the Confluence tool surface and the stdio
//! host that ties them together.

pub mod context;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod resources;
pub mod server;
pub mod template;
pub mod tools;

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use confluence_core::entities::CurrentUser;
use confluence_core::{GatewayError, ProfileSource};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

pub use context::CallContext;
pub use error::{FailureKind, HandlerError, RegistryError};
pub use gateway::Gateway;
pub use registry::{InvocationResult, OperationDescriptor, Registry, ResourceDescriptor};
pub use server::McpServer;

#[derive(Subcommand)]
pub enum McpCommands {
    /// Run the Confluence MCP server over stdio
    Serve,
    /// Report the resolved deployment configuration without contacting Confluence
    Check(CheckArgs),
    /// Print the registered tools and resources
    Tools,
}

#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    /// Also fetch the authenticated user to verify credentials
    #[arg(long)]
    pub verify: bool,
}

/// Startup configuration, read once and passed by value.
#[derive(Clone, Debug, Default)]
pub struct RuntimeConfig {
    pub profile: ProfileSource,
    pub request_timeout: Option<Duration>,
}

pub fn build_registry(gateway: Arc<Gateway>) -> Result<Registry, RegistryError> {
    Registry::builder()
        .operations(tools::all())
        .resources(resources::all())
        .build(gateway)
}

pub async fn run(config: RuntimeConfig, command: McpCommands) -> i32 {
    let gateway = Arc::new(Gateway::new(config.profile).with_timeout(config.request_timeout));
    let registry = match build_registry(gateway.clone()) {
        Ok(registry) => Arc::new(registry),
        Err(err) => {
            let payload = json!({
                "error": "registry_invalid",
                "message": err.to_string(),
            });
            eprintln!("{}", to_pretty_json(&payload));
            return 1;
        }
    };

    match command {
        McpCommands::Serve => match McpServer::new(registry).serve_stdio().await {
            Ok(()) => 0,
            Err(err) => {
                let payload = json!({
                    "error": "mcp_server_error",
                    "message": err,
                });
                eprintln!("{}", to_pretty_json(&payload));
                1
            }
        },
        McpCommands::Check(args) => {
            let (report, ready) = check_report(&registry, args.verify).await;
            println!("{}", to_pretty_json(&report));
            if ready { 0 } else { 2 }
        }
        McpCommands::Tools => {
            println!("{}", to_pretty_json(&inventory(&registry)));
            0
        }
    }
}

async fn check_report(registry: &Registry, verify: bool) -> (Value, bool) {
    let mut report = registry.gateway().describe();
    let mut ready = report["isConfigured"].as_bool().unwrap_or(false);
    if verify && ready {
        let outcome = fetch_current_user(registry.gateway()).await;
        ready = outcome.is_ok();
        report["verification"] = match outcome {
            Ok(user) => json!({ "ok": true, "user": user.label() }),
            Err(err) => json!({ "ok": false, "detail": err.to_string() }),
        };
    }
    report["status"] = Value::String(if ready { "ready" } else { "not_ready" }.to_string());
    (report, ready)
}

async fn fetch_current_user(gateway: &Gateway) -> Result<CurrentUser, GatewayError> {
    let raw = gateway
        .get("user/current", false, &CancellationToken::new())
        .await?;
    serde_json::from_str(&raw).map_err(|err| GatewayError::Decode(err.to_string()))
}

fn inventory(registry: &Registry) -> Value {
    let tools: Vec<Value> = registry
        .list_operations()
        .into_iter()
        .map(|tool| json!({ "name": tool.name, "description": tool.description }))
        .collect();
    let resources: Vec<Value> = registry
        .list_resources()
        .into_iter()
        .map(|resource| {
            json!({
                "uri": resource.uri,
                "templated": resource.templated,
                "mimeType": resource.mime_type,
            })
        })
        .collect();
    json!({ "tools": tools, "resources": resources })
}

fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use confluence_core::ProfileSource;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn registry_for(source: ProfileSource) -> Registry {
        build_registry(Arc::new(Gateway::new(source))).unwrap()
    }

    #[test]
    fn full_surface_registers_without_conflicts() {
        let registry = registry_for(ProfileSource::default());
        let listed = inventory(&registry);
        assert_eq!(listed["tools"].as_array().unwrap().len(), tools::all().len());
        assert_eq!(
            listed["resources"].as_array().unwrap().len(),
            resources::all().len()
        );
    }

    #[tokio::test]
    async fn check_reports_configuration_error_without_network() {
        let registry = registry_for(ProfileSource::default());
        let (report, ready) = check_report(&registry, true).await;
        assert!(!ready);
        assert_eq!(report["status"], "not_ready");
        assert!(report.get("verification").is_none());
        assert!(
            report["configurationError"]
                .as_str()
                .unwrap()
                .contains("CONFLUENCE_BASE_URL")
        );
    }

    #[tokio::test]
    async fn verify_reports_authenticated_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/user/current"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"username":"ada","userKey":"8a7f"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let registry = registry_for(ProfileSource {
            base_url: Some(server.uri()),
            deployment_type: Some("datacenter".to_string()),
            email: None,
            api_token: Some("pat".to_string()),
        });
        let (report, ready) = check_report(&registry, true).await;
        assert!(ready);
        assert_eq!(report["status"], "ready");
        assert_eq!(report["verification"]["ok"], true);
        assert_eq!(report["verification"]["user"], "ada");
    }

    #[tokio::test]
    async fn rejected_credentials_mark_not_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/user/current"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let registry = registry_for(ProfileSource {
            base_url: Some(server.uri()),
            deployment_type: Some("datacenter".to_string()),
            email: None,
            api_token: Some("stale".to_string()),
        });
        let (report, ready) = check_report(&registry, true).await;
        assert!(!ready);
        assert_eq!(report["verification"]["detail"], "Confluence API error (401): unauthorized");
    }
}
