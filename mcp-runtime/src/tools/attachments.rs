use std::path::Path;

use base64::Engine;
use confluence_core::endpoint::encode_segment;
use confluence_core::format::pretty_print;
use reqwest::multipart::{Form, Part};
use serde_json::json;

use super::{DEFAULT_LIMIT, Query};
use crate::context::CallContext;
use crate::error::HandlerError;
use crate::registry::{BoundArgs, OperationDescriptor, ParamSpec, handler};

pub(super) fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "confluence_get_attachments",
            "Get attachments on a Confluence page",
            handler(get_attachments),
        )
        .param(ParamSpec::string("pageId", "The page ID"))
        .param(ParamSpec::int_or("limit", "Maximum results (default: 25)", DEFAULT_LIMIT))
        .failure_prefix("Error getting attachments"),
        OperationDescriptor::new(
            "confluence_get_attachment_info",
            "Get information about a specific attachment",
            handler(get_attachment_info),
        )
        .param(ParamSpec::string("attachmentId", "The attachment ID"))
        .failure_prefix("Error getting attachment info"),
        OperationDescriptor::new(
            "confluence_delete_attachment",
            "Delete an attachment from a Confluence page",
            handler(delete_attachment),
        )
        .param(ParamSpec::string("attachmentId", "The attachment ID to delete"))
        .failure_prefix("Error deleting attachment"),
        OperationDescriptor::new(
            "confluence_upload_attachment",
            "Upload a local file as an attachment to a Confluence page",
            handler(upload_attachment),
        )
        .param(ParamSpec::string("pageId", "The page ID to attach the file to"))
        .param(ParamSpec::string("filePath", "Path of the local file to upload"))
        .param(ParamSpec::opt_string("comment", "Attachment comment (optional)"))
        .param(ParamSpec::bool_or(
            "minorEdit",
            "Do not notify watchers (default: true)",
            true,
        ))
        .failure_prefix("Error uploading attachment"),
        OperationDescriptor::new(
            "confluence_download_attachment",
            "Download an attachment; writes to outputPath or returns base64 content",
            handler(download_attachment),
        )
        .param(ParamSpec::string("pageId", "The page ID that holds the attachment"))
        .param(ParamSpec::string("attachmentId", "The attachment ID"))
        .param(ParamSpec::opt_string(
            "outputPath",
            "Local file path to write to (optional; omitted returns base64)",
        ))
        .failure_prefix("Error downloading attachment"),
    ]
}

async fn get_attachments(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let path = Query::new(format!("content/{}/child/attachment", args.segment("pageId")?))
        .arg("limit", args.int("limit")?)
        .arg("expand", "version,metadata.mediaType")
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn get_attachment_info(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let path = Query::new(format!("content/{}", args.segment("attachmentId")?))
        .arg("expand", "version,container,metadata.mediaType")
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn delete_attachment(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let attachment_id = args.str("attachmentId")?;
    ctx.delete(&format!("content/{}", encode_segment(attachment_id)))
        .await?;
    Ok(format!("Attachment {attachment_id} deleted successfully"))
}

async fn upload_attachment(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let file_path = Path::new(args.str("filePath")?);
    let file_name = file_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| HandlerError::invalid("filePath must name a file"))?
        .to_string();
    let bytes = tokio::fs::read(file_path).await?;
    let mime = mime_guess::from_path(file_path).first_or_octet_stream();

    let part = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime.essence_str())
        .map_err(|err| HandlerError::invalid(format!("unsupported content type: {err}")))?;
    let mut form = Form::new()
        .part("file", part)
        .text("minorEdit", args.bool("minorEdit")?.to_string());
    if let Some(comment) = args.opt_str("comment") {
        form = form.text("comment", comment.to_string());
    }

    let path = format!("content/{}/child/attachment", args.segment("pageId")?);
    Ok(pretty_print(&ctx.post_multipart(&path, form).await?))
}

async fn download_attachment(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let attachment_id = args.str("attachmentId")?;
    let path = format!(
        "content/{}/child/attachment/{}/download",
        args.segment("pageId")?,
        encode_segment(attachment_id)
    );
    let bytes = ctx.get_bytes(&path).await?;

    match args.opt_str("outputPath") {
        Some(output) => {
            tokio::fs::write(output, &bytes).await?;
            Ok(format!(
                "Attachment {attachment_id} saved to {output} ({} bytes)",
                bytes.len()
            ))
        }
        None => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
            Ok(serde_json::to_string_pretty(&json!({
                "attachmentId": attachment_id,
                "size": bytes.len(),
                "encoding": "base64",
                "data": encoded,
            }))?)
        }
    }
}
