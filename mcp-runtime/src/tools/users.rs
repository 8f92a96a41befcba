use confluence_core::cql;
use confluence_core::format::pretty_print;

use super::{DEFAULT_LIMIT, Query};
use crate::context::CallContext;
use crate::error::HandlerError;
use crate::registry::{BoundArgs, OperationDescriptor, ParamSpec, handler};

pub(super) fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "confluence_get_current_user",
            "Get information about the currently authenticated user",
            handler(get_current_user),
        )
        .failure_prefix("Error getting current user"),
        OperationDescriptor::new("confluence_search_users", "Search for Confluence users", handler(search_users))
            .param(ParamSpec::string("query", "Search query (name or email)"))
            .param(ParamSpec::int_or("limit", "Maximum results (default: 25)", DEFAULT_LIMIT))
            .failure_prefix("Error searching users"),
        OperationDescriptor::new(
            "confluence_get_user_content",
            "Get content created or contributed by a user",
            handler(get_user_content),
        )
        .param(ParamSpec::string("userKey", "Username or account ID"))
        .param(ParamSpec::int_or("limit", "Maximum results (default: 25)", DEFAULT_LIMIT))
        .failure_prefix("Error getting user content"),
        OperationDescriptor::new(
            "confluence_get_server_info",
            "Get Confluence server information",
            handler(get_server_info),
        )
        .failure_prefix("Error getting server info"),
    ]
}

async fn get_current_user(ctx: CallContext, _args: BoundArgs) -> Result<String, HandlerError> {
    Ok(pretty_print(&ctx.get("user/current").await?))
}

async fn search_users(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let needle = cql::quote(args.str("query")?);
    let path = Query::new("search/user")
        .arg("cql", format!("user.fullname~{needle} OR user.email~{needle}"))
        .arg("limit", args.int("limit")?)
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn get_user_content(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let path = Query::new("search")
        .arg(
            "cql",
            format!(
                "creator={} ORDER BY lastmodified DESC",
                cql::quote(args.str("userKey")?)
            ),
        )
        .arg("limit", args.int("limit")?)
        .arg("expand", "content.space")
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn get_server_info(ctx: CallContext, _args: BoundArgs) -> Result<String, HandlerError> {
    Ok(pretty_print(&ctx.get("settings/lookandfeel").await?))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::super::test_support::{call, registry};

    #[tokio::test]
    async fn search_users_matches_name_or_email() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/search/user"))
            .and(query_param("cql", r#"user.fullname~"ada" OR user.email~"ada""#))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"results":[]}"#))
            .expect(1)
            .mount(&server)
            .await;

        let registry = registry(&server);
        let result = call(&registry, "confluence_search_users", json!({"query": "ada"})).await;
        assert!(result.is_success(), "{result:?}");
    }
}
