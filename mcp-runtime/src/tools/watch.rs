use confluence_core::endpoint::encode_segment;
use serde_json::json;

use crate::context::CallContext;
use crate::error::HandlerError;
use crate::registry::{BoundArgs, OperationDescriptor, ParamSpec, handler};

pub(super) fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new("confluence_watch_page", "Watch a page to receive notifications", handler(watch_page))
            .param(ParamSpec::string("pageId", "The page ID to watch"))
            .failure_prefix("Error watching page"),
        OperationDescriptor::new("confluence_unwatch_page", "Stop watching a page", handler(unwatch_page))
            .param(ParamSpec::string("pageId", "The page ID to unwatch"))
            .failure_prefix("Error unwatching page"),
        OperationDescriptor::new(
            "confluence_watch_space",
            "Watch a space to receive notifications",
            handler(watch_space),
        )
        .param(ParamSpec::string("spaceKey", "The space key to watch"))
        .failure_prefix("Error watching space"),
    ]
}

async fn watch_page(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let page_id = args.str("pageId")?;
    ctx.post(&format!("user/watch/content/{}", encode_segment(page_id)), &json!({}))
        .await?;
    Ok(format!("Now watching page {page_id}"))
}

async fn unwatch_page(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let page_id = args.str("pageId")?;
    ctx.delete(&format!("user/watch/content/{}", encode_segment(page_id)))
        .await?;
    Ok(format!("Stopped watching page {page_id}"))
}

async fn watch_space(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let space_key = args.str("spaceKey")?;
    ctx.post(&format!("user/watch/space/{}", encode_segment(space_key)), &json!({}))
        .await?;
    Ok(format!("Now watching space {space_key}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::super::test_support::{call, registry};

    #[tokio::test]
    async fn watch_and_unwatch_page() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/user/watch/content/21"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/rest/api/user/watch/content/21"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let registry = registry(&server);
        let watched = call(&registry, "confluence_watch_page", json!({"pageId": "21"})).await;
        assert_eq!(watched.text(), "Now watching page 21");
        let unwatched = call(&registry, "confluence_unwatch_page", json!({"pageId": "21"})).await;
        assert_eq!(unwatched.text(), "Stopped watching page 21");
    }
}
