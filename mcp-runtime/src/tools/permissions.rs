use confluence_core::format::pretty_print;

use super::Query;
use crate::context::CallContext;
use crate::error::HandlerError;
use crate::registry::{BoundArgs, OperationDescriptor, ParamSpec, handler};

pub(super) fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "confluence_get_page_restrictions",
            "Get restrictions (permissions) on a page",
            handler(get_page_restrictions),
        )
        .param(ParamSpec::string("pageId", "The page ID"))
        .failure_prefix("Error getting page restrictions"),
        OperationDescriptor::new(
            "confluence_get_space_permissions",
            "Get permissions for a space",
            handler(get_space_permissions),
        )
        .param(ParamSpec::string("spaceKey", "The space key"))
        .failure_prefix("Error getting space permissions"),
    ]
}

async fn get_page_restrictions(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let path = format!("content/{}/restriction", args.segment("pageId")?);
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn get_space_permissions(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let path = Query::new(format!("space/{}", args.segment("spaceKey")?))
        .arg("expand", "permissions")
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}
