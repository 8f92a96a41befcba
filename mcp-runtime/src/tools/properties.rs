use confluence_core::entities::ContentPropertyRequest;
use confluence_core::format::pretty_print;

use crate::context::CallContext;
use crate::error::HandlerError;
use crate::registry::{BoundArgs, OperationDescriptor, ParamSpec, handler};

pub(super) fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "confluence_get_content_properties",
            "Get custom properties on a page",
            handler(get_content_properties),
        )
        .param(ParamSpec::string("pageId", "The page ID"))
        .failure_prefix("Error getting content properties"),
        OperationDescriptor::new(
            "confluence_set_content_property",
            "Set a custom property on a page",
            handler(set_content_property),
        )
        .param(ParamSpec::string("pageId", "The page ID"))
        .param(ParamSpec::string("key", "Property key"))
        .param(ParamSpec::string("value", "Property value (JSON string)"))
        .failure_prefix("Error setting content property"),
    ]
}

async fn get_content_properties(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let path = format!("content/{}/property", args.segment("pageId")?);
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn set_content_property(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let request = ContentPropertyRequest {
        key: args.str("key")?.to_string(),
        value: serde_json::from_str(args.str("value")?)?,
    };
    let path = format!("content/{}/property", args.segment("pageId")?);
    Ok(pretty_print(&ctx.post(&path, &request).await?))
}
