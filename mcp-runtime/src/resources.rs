//! Read-only resource surface: fixed URIs plus `confluence://...` templates.

use confluence_core::cql;
use confluence_core::format::pretty_print;
use serde_json::Value;

use crate::context::CallContext;
use crate::error::HandlerError;
use crate::registry::{BoundArgs, HTML_MIME_TYPE, ResourceDescriptor, handler};
use crate::tools::{Query, snapshot};

pub fn all() -> Vec<ResourceDescriptor> {
    vec![
        ResourceDescriptor::fixed(
            "confluence://config",
            "Confluence Configuration",
            "Returns current Confluence connection configuration (without sensitive data)",
            handler(config),
        ),
        ResourceDescriptor::fixed(
            "confluence://spaces",
            "All Spaces",
            "Returns list of all accessible Confluence spaces",
            handler(spaces),
        ),
        ResourceDescriptor::fixed(
            "confluence://current-user",
            "Current User",
            "Returns information about the authenticated user",
            handler(current_user),
        ),
        ResourceDescriptor::fixed(
            "confluence://my-recent-work",
            "My Recent Work",
            "Returns content recently modified by current user",
            handler(my_recent_work),
        ),
        ResourceDescriptor::fixed(
            "confluence://recent-pages",
            "Recent Pages",
            "Returns recently modified pages across all spaces",
            handler(recent_pages),
        ),
        ResourceDescriptor::fixed(
            "confluence://recent-blogposts",
            "Recent Blog Posts",
            "Returns recently published blog posts",
            handler(recent_blogposts),
        ),
        ResourceDescriptor::fixed(
            "confluence://templates",
            "Global Templates",
            "Returns available global content templates",
            handler(global_templates),
        ),
        ResourceDescriptor::templated(
            "confluence://page/{pageId}",
            &["pageId"],
            "Confluence Page",
            "Returns details of a specific Confluence page",
            handler(page),
        ),
        ResourceDescriptor::templated(
            "confluence://page/{pageId}/body",
            &["pageId"],
            "Confluence Page Body",
            "Returns only the body content of a Confluence page",
            handler(page_body),
        )
        .mime_type(HTML_MIME_TYPE),
        ResourceDescriptor::templated(
            "confluence://page/{pageId}/children",
            &["pageId"],
            "Page Children",
            "Returns child pages of a Confluence page",
            handler(page_children),
        ),
        ResourceDescriptor::templated(
            "confluence://page/{pageId}/comments",
            &["pageId"],
            "Page Comments",
            "Returns comments on a Confluence page",
            handler(page_comments),
        ),
        ResourceDescriptor::templated(
            "confluence://page/{pageId}/attachments",
            &["pageId"],
            "Page Attachments",
            "Returns attachments on a Confluence page",
            handler(page_attachments),
        ),
        ResourceDescriptor::templated(
            "confluence://page/{pageId}/labels",
            &["pageId"],
            "Page Labels",
            "Returns labels on a Confluence page",
            handler(page_labels),
        ),
        ResourceDescriptor::templated(
            "confluence://page/{pageId}/history",
            &["pageId"],
            "Page History",
            "Returns version history of a Confluence page",
            handler(page_history),
        ),
        ResourceDescriptor::templated(
            "confluence://space/{spaceKey}",
            &["spaceKey"],
            "Confluence Space",
            "Returns details of a specific Confluence space",
            handler(space),
        ),
        ResourceDescriptor::templated(
            "confluence://space/{spaceKey}/pages",
            &["spaceKey"],
            "Space Pages",
            "Returns all pages in a Confluence space",
            handler(space_pages),
        ),
        ResourceDescriptor::templated(
            "confluence://space/{spaceKey}/blogposts",
            &["spaceKey"],
            "Space Blog Posts",
            "Returns all blog posts in a Confluence space",
            handler(space_blogposts),
        ),
        ResourceDescriptor::templated(
            "confluence://space/{spaceKey}/root-pages",
            &["spaceKey"],
            "Space Root Pages",
            "Returns top-level pages in a Confluence space",
            handler(space_root_pages),
        ),
        ResourceDescriptor::templated(
            "confluence://space/{spaceKey}/templates",
            &["spaceKey"],
            "Space Templates",
            "Returns content templates in a space",
            handler(space_templates),
        ),
        ResourceDescriptor::templated(
            "confluence://search/{query}",
            &["query"],
            "Search Results",
            "Returns search results for a query",
            handler(search),
        ),
        ResourceDescriptor::templated(
            "confluence://label/{label}",
            &["label"],
            "Content by Label",
            "Returns content with a specific label",
            handler(by_label),
        ),
    ]
}

async fn config(ctx: CallContext, _args: BoundArgs) -> Result<String, HandlerError> {
    Ok(serde_json::to_string_pretty(&ctx.gateway().describe())?)
}

async fn get_pretty(ctx: &CallContext, query: Query) -> Result<String, HandlerError> {
    Ok(pretty_print(&ctx.get(&query.build()).await?))
}

async fn spaces(ctx: CallContext, _args: BoundArgs) -> Result<String, HandlerError> {
    let query = Query::new("space")
        .arg("limit", 100)
        .arg("expand", "description.plain,homepage");
    get_pretty(&ctx, query).await
}

async fn current_user(ctx: CallContext, _args: BoundArgs) -> Result<String, HandlerError> {
    get_pretty(&ctx, Query::new("user/current")).await
}

fn cql_search(cql: String, limit: i64, expand: &str) -> Query {
    Query::new("search")
        .arg("cql", cql)
        .arg("limit", limit)
        .arg("expand", expand)
}

async fn my_recent_work(ctx: CallContext, _args: BoundArgs) -> Result<String, HandlerError> {
    let query = cql_search(
        "contributor=currentUser() ORDER BY lastmodified DESC".to_string(),
        25,
        "content.space",
    );
    get_pretty(&ctx, query).await
}

async fn recent_pages(ctx: CallContext, _args: BoundArgs) -> Result<String, HandlerError> {
    let query = cql_search(
        "type=page ORDER BY lastmodified DESC".to_string(),
        25,
        "content.space,content.version",
    );
    get_pretty(&ctx, query).await
}

async fn recent_blogposts(ctx: CallContext, _args: BoundArgs) -> Result<String, HandlerError> {
    let query = cql_search(
        "type=blogpost ORDER BY created DESC".to_string(),
        25,
        "content.space,content.version",
    );
    get_pretty(&ctx, query).await
}

async fn global_templates(ctx: CallContext, _args: BoundArgs) -> Result<String, HandlerError> {
    let query = Query::new("template/page").arg("expand", "body").arg("limit", 50);
    get_pretty(&ctx, query).await
}

async fn page(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let query = Query::new(format!("content/{}", args.segment("pageId")?))
        .arg("expand", "body.storage,version,space,ancestors,metadata.labels");
    get_pretty(&ctx, query).await
}

/// Raw storage-format markup; empty when the page has no body.
async fn page_body(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let query = Query::new(format!("content/{}", args.segment("pageId")?)).arg("expand", "body.storage");
    let page = snapshot(&ctx.get(&query.build()).await?)?;
    Ok(page.storage_value().to_string())
}

async fn page_children(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let query = Query::new(format!("content/{}/child/page", args.segment("pageId")?))
        .arg("expand", "version")
        .arg("limit", 50);
    get_pretty(&ctx, query).await
}

async fn page_comments(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let query = Query::new(format!("content/{}/child/comment", args.segment("pageId")?))
        .arg("expand", "body.storage,version")
        .arg("depth", "all")
        .arg("limit", 50);
    get_pretty(&ctx, query).await
}

async fn page_attachments(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let query = Query::new(format!("content/{}/child/attachment", args.segment("pageId")?))
        .arg("expand", "version,metadata.mediaType")
        .arg("limit", 50);
    get_pretty(&ctx, query).await
}

async fn page_labels(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    get_pretty(&ctx, Query::new(format!("content/{}/label", args.segment("pageId")?))).await
}

async fn page_history(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let query = Query::new(format!("content/{}/history", args.segment("pageId")?))
        .arg("expand", "lastUpdated,previousVersion,contributors");
    get_pretty(&ctx, query).await
}

async fn space(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let query = Query::new(format!("space/{}", args.segment("spaceKey")?))
        .arg("expand", "description.plain,homepage,metadata.labels");
    get_pretty(&ctx, query).await
}

async fn space_pages(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let query = Query::new(format!("space/{}/content/page", args.segment("spaceKey")?))
        .arg("limit", 100)
        .arg("expand", "version");
    get_pretty(&ctx, query).await
}

async fn space_blogposts(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let query = Query::new(format!("space/{}/content/blogpost", args.segment("spaceKey")?))
        .arg("limit", 50)
        .arg("expand", "version");
    get_pretty(&ctx, query).await
}

async fn space_root_pages(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let query = Query::new(format!("space/{}/content/page", args.segment("spaceKey")?))
        .arg("depth", "root")
        .arg("limit", 50)
        .arg("expand", "version");
    get_pretty(&ctx, query).await
}

async fn space_templates(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let query = Query::new("template/page")
        .arg("spaceKey", args.str("spaceKey")?)
        .arg("expand", "body")
        .arg("limit", 50);
    get_pretty(&ctx, query).await
}

async fn search(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let query = cql_search(
        format!("text~{}", cql::quote(args.str("query")?)),
        25,
        "content.space,excerpt",
    );
    get_pretty(&ctx, query).await
}

async fn by_label(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let query = cql_search(
        format!("label={}", cql::quote(args.str("label")?)),
        50,
        "content.space,content.metadata.labels",
    );
    get_pretty(&ctx, query).await
}

/// Body delivered in place of a failed read, shaped for the resource's mime type.
pub fn error_payload(mime_type: &str, message: &str) -> String {
    if mime_type == HTML_MIME_TYPE {
        format!("<!-- Error: {message} -->")
    } else {
        let mut payload = serde_json::Map::new();
        payload.insert("error".to_string(), Value::String(message.to_string()));
        Value::Object(payload).to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use confluence_core::ProfileSource;
    use serde_json::{Value, json};
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::gateway::Gateway;
    use crate::registry::{InvocationResult, Registry};

    fn registry(base_url: &str) -> Registry {
        let source = ProfileSource {
            base_url: Some(base_url.to_string()),
            deployment_type: Some("cloud".to_string()),
            email: Some("me@example.com".to_string()),
            api_token: Some("tok".to_string()),
        };
        Registry::builder()
            .resources(all())
            .build(Arc::new(Gateway::new(source)))
            .expect("resource registry builds")
    }

    #[test]
    fn exposes_fixed_and_templated_resources() {
        let registry = registry("https://x.atlassian.net");
        let listed = registry.list_resources();
        assert_eq!(listed.len(), 21);
        assert_eq!(listed.iter().filter(|r| r.templated).count(), 14);
        assert_eq!(
            registry.resource_mime_type("confluence://page/5/body"),
            Some(HTML_MIME_TYPE)
        );
    }

    #[tokio::test]
    async fn config_resource_has_no_secret() {
        let registry = registry("https://x.atlassian.net");
        let result = registry
            .resolve("confluence://config", CancellationToken::new())
            .await;
        let payload: Value = serde_json::from_str(result.text()).unwrap();
        assert_eq!(payload["deploymentType"], "cloud");
        assert_eq!(payload["apiBasePath"], "/wiki/rest/api");
        assert_eq!(payload["isConfigured"], true);
        assert!(!result.text().contains("tok\""));
    }

    #[tokio::test]
    async fn space_pages_resource_keeps_paging_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/rest/api/space/DEV/content/page"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": "1"}, {"id": "2"}],
                "size": 2,
                "_links": {"next": "/rest/api/space/DEV/content/page?start=100"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let registry = registry(&server.uri());
        let result = registry
            .resolve("confluence://space/DEV/pages", CancellationToken::new())
            .await;
        let payload: Value = serde_json::from_str(result.text()).unwrap();
        assert_eq!(payload["size"], 2);
        assert_eq!(payload["results"].as_array().unwrap().len(), 2);
        assert!(payload.get("totalCount").is_none());
        assert_eq!(payload["_links"]["next"], "/rest/api/space/DEV/content/page?start=100");
    }

    #[tokio::test]
    async fn page_body_resource_returns_storage_markup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/rest/api/content/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "body": {"storage": {"value": "<p>Hello</p>", "representation": "storage"}}
            })))
            .mount(&server)
            .await;

        let registry = registry(&server.uri());
        let result = registry
            .resolve("confluence://page/5/body", CancellationToken::new())
            .await;
        assert_eq!(
            result,
            InvocationResult::Success {
                payload: "<p>Hello</p>".to_string(),
                mime_type: HTML_MIME_TYPE.to_string(),
            }
        );
    }

    #[test]
    fn error_payload_matches_mime_type() {
        assert_eq!(
            error_payload(HTML_MIME_TYPE, "boom"),
            "<!-- Error: boom -->"
        );
        assert_eq!(
            error_payload("application/json", "say \"hi\""),
            r#"{"error":"say \"hi\""}"#
        );
    }
}
