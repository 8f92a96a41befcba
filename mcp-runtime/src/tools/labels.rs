use confluence_core::endpoint::encode_segment;
use confluence_core::entities::LabelRequest;
use confluence_core::format::pretty_print;

use crate::context::CallContext;
use crate::error::HandlerError;
use crate::registry::{BoundArgs, OperationDescriptor, ParamSpec, handler};

pub(super) fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new("confluence_get_labels", "Get labels on a Confluence page", handler(get_labels))
            .param(ParamSpec::string("pageId", "The page ID"))
            .failure_prefix("Error getting labels"),
        OperationDescriptor::new("confluence_add_labels", "Add labels to a Confluence page", handler(add_labels))
            .param(ParamSpec::string("pageId", "The page ID"))
            .param(ParamSpec::string("labels", "Comma-separated label names to add"))
            .failure_prefix("Error adding labels"),
        OperationDescriptor::new(
            "confluence_remove_label",
            "Remove a label from a Confluence page",
            handler(remove_label),
        )
        .param(ParamSpec::string("pageId", "The page ID"))
        .param(ParamSpec::string("label", "Label name to remove"))
        .failure_prefix("Error removing label"),
    ]
}

async fn get_labels(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let path = format!("content/{}/label", args.segment("pageId")?);
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn add_labels(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let labels = LabelRequest::from_csv(args.str("labels")?);
    if labels.is_empty() {
        return Err(HandlerError::invalid("labels must contain at least one name"));
    }
    let path = format!("content/{}/label", args.segment("pageId")?);
    Ok(pretty_print(&ctx.post(&path, &labels).await?))
}

async fn remove_label(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let page_id = args.str("pageId")?;
    let label = args.str("label")?;
    let path = format!(
        "content/{}/label/{}",
        encode_segment(page_id),
        encode_segment(&label.to_lowercase())
    );
    ctx.delete(&path)
        .await?;
    Ok(format!("Label '{label}' removed from page {page_id}"))
}
