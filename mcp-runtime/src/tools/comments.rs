use confluence_core::endpoint::encode_segment;
use confluence_core::entities::CommentRequest;
use confluence_core::format::pretty_print;

use super::{DEFAULT_LIMIT, Query};
use crate::context::CallContext;
use crate::error::HandlerError;
use crate::registry::{BoundArgs, OperationDescriptor, ParamSpec, handler};

pub(super) fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "confluence_get_page_comments",
            "Get comments on a Confluence page",
            handler(get_page_comments),
        )
        .param(ParamSpec::string("pageId", "The page ID"))
        .param(ParamSpec::string_or(
            "depth",
            "Comment depth: root (top-level) or all (default: all)",
            "all",
        ))
        .param(ParamSpec::int_or("limit", "Maximum results (default: 25)", DEFAULT_LIMIT))
        .failure_prefix("Error getting comments"),
        OperationDescriptor::new("confluence_add_comment", "Add a comment to a Confluence page", handler(add_comment))
            .param(ParamSpec::string("pageId", "The page ID to comment on"))
            .param(ParamSpec::string("commentText", "Comment text (in storage format or plain text)"))
            .param(ParamSpec::opt_string("parentCommentId", "Parent comment ID for replies (optional)"))
            .failure_prefix("Error adding comment"),
        OperationDescriptor::new(
            "confluence_delete_comment",
            "Delete a comment from a Confluence page",
            handler(delete_comment),
        )
        .param(ParamSpec::string("commentId", "The comment ID to delete"))
        .failure_prefix("Error deleting comment"),
    ]
}

async fn get_page_comments(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let path = Query::new(format!("content/{}/child/comment", args.segment("pageId")?))
        .arg("depth", args.str("depth")?)
        .arg("limit", args.int("limit")?)
        .arg("expand", "body.storage,version")
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn add_comment(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let request = CommentRequest::plain_text(
        args.str("pageId")?,
        args.str("commentText")?,
        args.opt_str("parentCommentId"),
    );
    Ok(pretty_print(&ctx.post("content", &request).await?))
}

async fn delete_comment(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let comment_id = args.str("commentId")?;
    ctx.delete(&format!("content/{}", encode_segment(comment_id)))
        .await?;
    Ok(format!("Comment {comment_id} deleted successfully"))
}
