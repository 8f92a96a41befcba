use confluence_core::endpoint::encode_segment;
use confluence_core::entities::SpaceRequest;
use confluence_core::format::pretty_print;

use super::{DEFAULT_LIMIT, Query};
use crate::context::CallContext;
use crate::error::HandlerError;
use crate::registry::{BoundArgs, OperationDescriptor, ParamSpec, handler};

pub(super) fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new("confluence_list_spaces", "List all Confluence spaces", handler(list_spaces))
            .param(ParamSpec::string_or(
                "type",
                "Space type filter: global, personal, all (default: all)",
                "all",
            ))
            .param(ParamSpec::int_or("limit", "Maximum results (default: 25)", DEFAULT_LIMIT))
            .param(ParamSpec::int_or("start", "Start index for pagination (default: 0)", 0))
            .failure_prefix("Error listing spaces"),
        OperationDescriptor::new("confluence_get_space", "Get details of a Confluence space", handler(get_space))
            .param(ParamSpec::string("spaceKey", "The space key"))
            .failure_prefix("Error getting space"),
        OperationDescriptor::new("confluence_create_space", "Create a new Confluence space", handler(create_space))
            .param(ParamSpec::string("spaceKey", "The space key (unique identifier, e.g., DEV)"))
            .param(ParamSpec::string("name", "The space name"))
            .param(ParamSpec::opt_string("description", "Space description (optional)"))
            .param(ParamSpec::string_or("type", "Space type: global or personal (default: global)", "global"))
            .failure_prefix("Error creating space"),
        OperationDescriptor::new("confluence_delete_space", "Delete a Confluence space", handler(delete_space))
            .param(ParamSpec::string("spaceKey", "The space key to delete"))
            .failure_prefix("Error deleting space"),
        OperationDescriptor::new(
            "confluence_get_space_content",
            "Get all content in a space",
            handler(get_space_content),
        )
        .param(ParamSpec::string("spaceKey", "The space key"))
        .param(ParamSpec::string_or(
            "contentType",
            "Content type: page, blogpost, or all (default: page)",
            "page",
        ))
        .param(ParamSpec::int_or("limit", "Maximum results (default: 25)", DEFAULT_LIMIT))
        .param(ParamSpec::int_or("start", "Start index for pagination (default: 0)", 0))
        .param(ParamSpec::string_or(
            "depth",
            "Depth: root (top-level only) or all (default: all)",
            "all",
        ))
        .failure_prefix("Error getting space content"),
    ]
}

async fn list_spaces(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let space_type = args.str("type")?;
    let mut query = Query::new("space")
        .arg("limit", args.int("limit")?)
        .arg("start", args.int("start")?)
        .arg("expand", "description.plain,homepage");
    if !space_type.eq_ignore_ascii_case("all") {
        query = query.arg("type", space_type);
    }
    Ok(pretty_print(&ctx.get(&query.build()).await?))
}

async fn get_space(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let path = Query::new(format!("space/{}", args.segment("spaceKey")?))
        .arg("expand", "description.plain,homepage,metadata.labels")
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn create_space(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let request = SpaceRequest::new(args.str("spaceKey")?, args.str("name")?, args.str("type")?)
        .with_description(args.opt_str("description"));
    Ok(pretty_print(&ctx.post("space", &request).await?))
}

async fn delete_space(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let space_key = args.str("spaceKey")?;
    ctx.delete(&format!("space/{}", encode_segment(space_key)))
        .await?;
    Ok(format!("Space {space_key} deleted successfully"))
}

/// `contentType=all` lists every kind by dropping the type segment.
async fn get_space_content(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let space_key = args.str("spaceKey")?;
    let content_type = args.str("contentType")?;
    let base = if content_type.eq_ignore_ascii_case("all") {
        format!("space/{}/content", encode_segment(space_key))
    } else {
        format!(
            "space/{}/content/{}",
            encode_segment(space_key),
            encode_segment(content_type)
        )
    };
    let path = Query::new(base)
        .arg("limit", args.int("limit")?)
        .arg("start", args.int("start")?)
        .arg("depth", args.str("depth")?)
        .arg("expand", "version")
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}
