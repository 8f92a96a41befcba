use confluence_core::cql;
use confluence_core::format::pretty_print;

use super::{DEFAULT_LIMIT, Query, space_clause};
use crate::context::CallContext;
use crate::error::HandlerError;
use crate::registry::{BoundArgs, OperationDescriptor, ParamSpec, handler};

const ORDER_BY_LAST_MODIFIED: &str = " ORDER BY lastmodified DESC";

pub(super) fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "confluence_search",
            "Search Confluence using CQL (Confluence Query Language)",
            handler(search),
        )
        .param(ParamSpec::string(
            "cql",
            "CQL query string (e.g., 'type=page AND space=DEV AND text~\"search term\"')",
        ))
        .param(ParamSpec::int_or("limit", "Maximum results (default: 25)", DEFAULT_LIMIT))
        .param(ParamSpec::int_or("start", "Start index for pagination (default: 0)", 0))
        .param(ParamSpec::bool_or(
            "includeExcerpt",
            "Include content excerpt in results (default: true)",
            true,
        ))
        .failure_prefix("Error searching"),
        OperationDescriptor::new(
            "confluence_search_content",
            "Simple text search across Confluence content",
            handler(search_content),
        )
        .param(ParamSpec::string("searchText", "Search text"))
        .param(ParamSpec::opt_string("spaceKey", "Space key to limit search (optional)"))
        .param(ParamSpec::string_or(
            "contentType",
            "Content type: page, blogpost, attachment, or all (default: all)",
            "all",
        ))
        .param(ParamSpec::int_or("limit", "Maximum results (default: 25)", DEFAULT_LIMIT))
        .failure_prefix("Error searching content"),
        OperationDescriptor::new(
            "confluence_search_by_label",
            "Search Confluence content by label",
            handler(search_by_label),
        )
        .param(ParamSpec::string("label", "Label name to search for"))
        .param(ParamSpec::opt_string("spaceKey", "Space key to limit search (optional)"))
        .param(ParamSpec::int_or("limit", "Maximum results (default: 25)", DEFAULT_LIMIT))
        .failure_prefix("Error searching by label"),
        OperationDescriptor::new(
            "confluence_get_recent_content",
            "Get recently modified content",
            handler(get_recent_content),
        )
        .param(ParamSpec::opt_string("spaceKey", "Space key to filter (optional)"))
        .param(ParamSpec::int_or("limit", "Maximum results (default: 25)", DEFAULT_LIMIT))
        .failure_prefix("Error getting recent content"),
        OperationDescriptor::new(
            "confluence_get_my_recent_work",
            "Get content recently modified by current user",
            handler(get_my_recent_work),
        )
        .param(ParamSpec::int_or("limit", "Maximum results (default: 25)", DEFAULT_LIMIT))
        .failure_prefix("Error getting recent work"),
    ]
}

async fn search(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let expand = if args.bool("includeExcerpt")? {
        "content.space,content.version,excerpt"
    } else {
        "content.space,content.version"
    };
    let path = Query::new("search")
        .arg("cql", args.str("cql")?)
        .arg("limit", args.int("limit")?)
        .arg("start", args.int("start")?)
        .arg("expand", expand)
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn search_content(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let content_type = args.str("contentType")?;
    let type_clause = if content_type.eq_ignore_ascii_case("all") {
        String::new()
    } else {
        format!("type={}", cql::quote(content_type))
    };
    let query = cql::and([
        format!("text~{}", cql::quote(args.str("searchText")?)),
        space_clause(args.opt_str("spaceKey")),
        type_clause,
    ]);
    let path = Query::new("search")
        .arg("cql", query)
        .arg("limit", args.int("limit")?)
        .arg("expand", "content.space,excerpt")
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn search_by_label(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let query = cql::and([
        format!("label={}", cql::quote(args.str("label")?)),
        space_clause(args.opt_str("spaceKey")),
    ]);
    let path = Query::new("search")
        .arg("cql", query)
        .arg("limit", args.int("limit")?)
        .arg("expand", "content.space,content.metadata.labels")
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn get_recent_content(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let query = cql::and(["type=page".to_string(), space_clause(args.opt_str("spaceKey"))])
        + ORDER_BY_LAST_MODIFIED;
    let path = Query::new("search")
        .arg("cql", query)
        .arg("limit", args.int("limit")?)
        .arg("expand", "content.space,content.version")
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn get_my_recent_work(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let path = Query::new("search")
        .arg("cql", format!("contributor=currentUser(){ORDER_BY_LAST_MODIFIED}"))
        .arg("limit", args.int("limit")?)
        .arg("expand", "content.space")
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}
