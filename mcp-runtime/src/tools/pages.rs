use confluence_core::endpoint::encode_segment;
use confluence_core::entities::{ContentRequest, ContentType};
use confluence_core::format::pretty_print;

use super::{DEFAULT_LIMIT, Query, snapshot};
use crate::context::CallContext;
use crate::error::HandlerError;
use crate::registry::{BoundArgs, OperationDescriptor, ParamSpec, handler};

const DEFAULT_VERSION_MESSAGE: &str = "Updated via MCP";

pub(super) fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new("confluence_get_page", "Get a Confluence page by ID", handler(get_page))
            .param(ParamSpec::string("pageId", "The page ID"))
            .param(ParamSpec::bool_or("includeBody", "Include page body content (default: true)", true))
            .param(ParamSpec::string_or(
                "bodyFormat",
                "Body format: storage, atlas_doc_format, view, export_view (default: storage)",
                "storage",
            ))
            .failure_prefix("Error getting page"),
        OperationDescriptor::new(
            "confluence_get_page_by_title",
            "Get a Confluence page by its title and space key",
            handler(get_page_by_title),
        )
        .param(ParamSpec::string("spaceKey", "The space key (e.g., DEV, HR)"))
        .param(ParamSpec::string("title", "The page title"))
        .failure_prefix("Error getting page by title"),
        OperationDescriptor::new("confluence_create_page", "Create a new Confluence page", handler(create_page))
            .param(ParamSpec::string("spaceKey", "The space key where the page will be created"))
            .param(ParamSpec::string("title", "The page title"))
            .param(ParamSpec::string("content", "The page content in Confluence storage format (XHTML)"))
            .param(ParamSpec::opt_string("parentId", "Parent page ID (optional - creates as child page)"))
            .param(ParamSpec::string_or("contentType", "Content type: page or blogpost (default: page)", "page"))
            .failure_prefix("Error creating page"),
        OperationDescriptor::new("confluence_update_page", "Update an existing Confluence page", handler(update_page))
            .param(ParamSpec::string("pageId", "The page ID to update"))
            .param(ParamSpec::string("title", "The new page title"))
            .param(ParamSpec::string("content", "The new page content in Confluence storage format (XHTML)"))
            .param(ParamSpec::int("versionNumber", "Current version number (required for update)"))
            .param(ParamSpec::opt_string("versionMessage", "Version message/comment (optional)"))
            .failure_prefix("Error updating page"),
        OperationDescriptor::new("confluence_delete_page", "Delete a Confluence page", handler(delete_page))
            .param(ParamSpec::string("pageId", "The page ID to delete"))
            .param(ParamSpec::bool_or(
                "purge",
                "Purge permanently (true) or move to trash (false, default)",
                false,
            ))
            .failure_prefix("Error deleting page"),
        OperationDescriptor::new(
            "confluence_get_page_children",
            "Get child pages of a Confluence page",
            handler(get_page_children),
        )
        .param(ParamSpec::string("pageId", "The parent page ID"))
        .param(ParamSpec::int_or("limit", "Maximum results (default: 25)", DEFAULT_LIMIT))
        .param(ParamSpec::int_or("start", "Start index for pagination (default: 0)", 0))
        .failure_prefix("Error getting child pages"),
        OperationDescriptor::new(
            "confluence_get_page_ancestors",
            "Get ancestor (parent) pages of a Confluence page",
            handler(get_page_ancestors),
        )
        .param(ParamSpec::string("pageId", "The page ID"))
        .failure_prefix("Error getting page ancestors"),
        OperationDescriptor::new(
            "confluence_get_page_history",
            "Get version history of a Confluence page",
            handler(get_page_history),
        )
        .param(ParamSpec::string("pageId", "The page ID"))
        .param(ParamSpec::int_or("limit", "Maximum results (default: 25)", DEFAULT_LIMIT))
        .failure_prefix("Error getting page history"),
        OperationDescriptor::new(
            "confluence_get_page_version",
            "Get a specific version of a Confluence page",
            handler(get_page_version),
        )
        .param(ParamSpec::string("pageId", "The page ID"))
        .param(ParamSpec::int("versionNumber", "The version number"))
        .failure_prefix("Error getting page version"),
        OperationDescriptor::new("confluence_copy_page", "Copy a Confluence page to a new location", handler(copy_page))
            .param(ParamSpec::string("sourcePageId", "The source page ID to copy"))
            .param(ParamSpec::string("destinationSpaceKey", "Destination space key"))
            .param(ParamSpec::string("newTitle", "New page title"))
            .param(ParamSpec::opt_string("parentId", "Parent page ID in destination (optional)"))
            .failure_prefix("Error copying page"),
        OperationDescriptor::new("confluence_move_page", "Move a Confluence page to a new parent", handler(move_page))
            .param(ParamSpec::string("pageId", "The page ID to move"))
            .param(ParamSpec::string("newParentId", "New parent page ID"))
            .failure_prefix("Error moving page"),
    ]
}

async fn get_page(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let expand = if args.bool("includeBody")? {
        format!("body.{},version,space,ancestors", args.str("bodyFormat")?)
    } else {
        "version,space,ancestors".to_string()
    };
    let path = Query::new(format!("content/{}", args.segment("pageId")?))
        .arg("expand", expand)
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn get_page_by_title(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let path = Query::new("content")
        .arg("spaceKey", args.str("spaceKey")?)
        .arg("title", args.str("title")?)
        .arg("expand", "body.storage,version,space,ancestors")
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn create_page(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let raw_type = args.str("contentType")?;
    let content_type = ContentType::parse_creatable(raw_type).ok_or_else(|| {
        HandlerError::invalid(format!(
            "contentType must be 'page' or 'blogpost', got '{raw_type}'"
        ))
    })?;
    let request = ContentRequest::create(
        content_type,
        args.str("spaceKey")?,
        args.str("title")?,
        args.str("content")?,
    )
    .with_parent(args.opt_str("parentId"));
    Ok(pretty_print(&ctx.post("content", &request).await?))
}

async fn update_page(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let page_id = args.str("pageId")?;
    let current = u64::try_from(args.int("versionNumber")?)
        .map_err(|_| HandlerError::invalid("versionNumber must not be negative"))?;
    let message = args
        .opt_str("versionMessage")
        .unwrap_or(DEFAULT_VERSION_MESSAGE)
        .to_string();
    let request = ContentRequest::update(
        page_id,
        args.str("title")?,
        args.str("content")?,
        current + 1,
        Some(message),
    );
    let path = format!("content/{}", encode_segment(page_id));
    Ok(pretty_print(&ctx.put(&path, &request).await?))
}

async fn delete_page(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let page_id = args.str("pageId")?;
    let path = if args.bool("purge")? {
        Query::new(format!("content/{}", encode_segment(page_id)))
            .arg("status", "trashed")
            .build()
    } else {
        format!("content/{}", encode_segment(page_id))
    };
    ctx.delete(&path).await?;
    Ok(format!("Page {page_id} deleted successfully"))
}

async fn get_page_children(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let path = Query::new(format!("content/{}/child/page", args.segment("pageId")?))
        .arg("limit", args.int("limit")?)
        .arg("start", args.int("start")?)
        .arg("expand", "version")
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn get_page_ancestors(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let path = Query::new(format!("content/{}", args.segment("pageId")?))
        .arg("expand", "ancestors")
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn get_page_history(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let path = Query::new(format!("content/{}/history", args.segment("pageId")?))
        .arg("expand", "lastUpdated,previousVersion,contributors")
        .arg("limit", args.int("limit")?)
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn get_page_version(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let path = Query::new(format!("content/{}", args.segment("pageId")?))
        .arg("status", "historical")
        .arg("version", args.int("versionNumber")?)
        .arg("expand", "body.storage,version")
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn copy_page(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let source_path = Query::new(format!("content/{}", args.segment("sourcePageId")?))
        .arg("expand", "body.storage")
        .build();
    let source = snapshot(&ctx.get(&source_path).await?)?;

    let request = ContentRequest::create(
        ContentType::Page,
        args.str("destinationSpaceKey")?,
        args.str("newTitle")?,
        source.storage_value(),
    )
    .with_parent(args.opt_str("parentId"));
    Ok(pretty_print(&ctx.post("content", &request).await?))
}

async fn move_page(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let page_id = args.str("pageId")?;
    let current_path = Query::new(format!("content/{}", encode_segment(page_id)))
        .arg("expand", "version,body.storage")
        .build();
    let current = snapshot(&ctx.get(&current_path).await?)?;

    let request = ContentRequest::update(
        page_id,
        current.title(),
        current.storage_value(),
        current.version_number() + 1,
        None,
    )
    .with_parent(Some(args.str("newParentId")?));
    let path = format!("content/{}", encode_segment(page_id));
    Ok(pretty_print(&ctx.put(&path, &request).await?))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::super::test_support::{body_json as request_json, call, registry};
    use crate::error::FailureKind;
    use crate::registry::{Failure, InvocationResult};

    #[tokio::test]
    async fn get_page_expands_body_in_requested_format() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/content/123"))
            .and(query_param("expand", "body.view,version,space,ancestors"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"123"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let registry = registry(&server);
        let result = call(
            &registry,
            "confluence_get_page",
            json!({"pageId": "123", "bodyFormat": "view"}),
        )
        .await;
        assert_eq!(result.text(), "{\n  \"id\": \"123\"\n}");
    }

    #[tokio::test]
    async fn get_page_failure_is_prefixed_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/content/404"))
            .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"message":"not found"}"#))
            .mount(&server)
            .await;

        let registry = registry(&server);
        let result = call(&registry, "confluence_get_page", json!({"pageId": "404"})).await;
        assert_eq!(
            result,
            InvocationResult::Failure(Failure::new(
                FailureKind::UpstreamError,
                r#"Error getting page: Confluence API error (404): {"message":"not found"}"#
            ))
        );
    }

    #[tokio::test]
    async fn create_page_posts_typed_body_with_parent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/content"))
            .and(body_json(json!({
                "type": "page",
                "title": "Plan",
                "space": {"key": "DEV"},
                "ancestors": [{"id": "7"}],
                "body": {"storage": {"value": "<p>x</p>", "representation": "storage"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"8"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let registry = registry(&server);
        let result = call(
            &registry,
            "confluence_create_page",
            json!({"spaceKey": "DEV", "title": "Plan", "content": "<p>x</p>", "parentId": "7"}),
        )
        .await;
        assert!(result.is_success(), "{result:?}");
    }

    #[tokio::test]
    async fn create_page_rejects_unknown_content_type_without_calling_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let registry = registry(&server);
        let result = call(
            &registry,
            "confluence_create_page",
            json!({"spaceKey": "DEV", "title": "T", "content": "c", "contentType": "comment"}),
        )
        .await;
        assert!(matches!(
            result,
            InvocationResult::Failure(Failure { kind: FailureKind::HandlerError, .. })
        ));
    }

    #[tokio::test]
    async fn update_page_bumps_version_and_defaults_message() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/rest/api/content/5"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let registry = registry(&server);
        let result = call(
            &registry,
            "confluence_update_page",
            json!({"pageId": "5", "title": "T", "content": "c", "versionNumber": "3"}),
        )
        .await;
        assert!(result.is_success(), "{result:?}");

        let requests = server.received_requests().await.unwrap_or_default();
        let body = request_json(&requests[0]);
        assert_eq!(body["id"], "5");
        assert_eq!(body["version"]["number"], 4);
        assert_eq!(body["version"]["message"], "Updated via MCP");
    }

    #[tokio::test]
    async fn delete_page_with_purge_targets_trashed_status() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/api/content/9"))
            .and(query_param("status", "trashed"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let registry = registry(&server);
        let result = call(
            &registry,
            "confluence_delete_page",
            json!({"pageId": "9", "purge": true}),
        )
        .await;
        assert_eq!(result.text(), "Page 9 deleted successfully");
    }

    #[tokio::test]
    async fn delete_page_keeps_slashes_inside_the_id_segment() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/api/content/123/label/x"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/rest/api/content/123%2Flabel%2Fx"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such page"))
            .expect(1)
            .mount(&server)
            .await;

        let registry = registry(&server);
        let result = call(
            &registry,
            "confluence_delete_page",
            json!({"pageId": "123/label/x"}),
        )
        .await;
        assert_eq!(
            result.text(),
            "Error deleting page: Confluence API error (404): no such page"
        );
    }

    #[tokio::test]
    async fn move_page_reuses_current_title_body_and_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/content/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "5",
                "title": "Old home",
                "body": {"storage": {"value": "<p>kept</p>", "representation": "storage"}},
                "version": {"number": 6}
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/rest/api/content/5"))
            .and(body_json(json!({
                "id": "5",
                "type": "page",
                "title": "Old home",
                "ancestors": [{"id": "42"}],
                "body": {"storage": {"value": "<p>kept</p>", "representation": "storage"}},
                "version": {"number": 7}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let registry = registry(&server);
        let result = call(
            &registry,
            "confluence_move_page",
            json!({"pageId": "5", "newParentId": "42"}),
        )
        .await;
        assert!(result.is_success(), "{result:?}");
    }

    #[tokio::test]
    async fn copy_page_with_undecodable_source_is_a_handler_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/content/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let registry = registry(&server);
        let result = call(
            &registry,
            "confluence_copy_page",
            json!({"sourcePageId": "1", "destinationSpaceKey": "OPS", "newTitle": "Copy"}),
        )
        .await;
        match result {
            InvocationResult::Failure(failure) => {
                assert_eq!(failure.kind, FailureKind::HandlerError);
                assert!(failure.message.starts_with("Error copying page: unexpected response"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
