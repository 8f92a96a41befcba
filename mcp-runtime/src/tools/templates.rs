use confluence_core::entities::{ContentRequest, ContentType};
use confluence_core::format::pretty_print;

use super::{Query, snapshot};
use crate::context::CallContext;
use crate::error::HandlerError;
use crate::registry::{BoundArgs, OperationDescriptor, ParamSpec, handler};

pub(super) fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new("confluence_get_templates", "Get available content templates", handler(get_templates))
            .param(ParamSpec::opt_string(
                "spaceKey",
                "Space key (optional - if not provided, returns global templates)",
            ))
            .failure_prefix("Error getting templates"),
        OperationDescriptor::new(
            "confluence_create_page_from_template",
            "Create a page from a template",
            handler(create_page_from_template),
        )
        .param(ParamSpec::string("spaceKey", "The space key"))
        .param(ParamSpec::string("title", "The page title"))
        .param(ParamSpec::string("templateId", "Template ID"))
        .param(ParamSpec::opt_string("parentId", "Parent page ID (optional)"))
        .failure_prefix("Error creating page from template"),
    ]
}

async fn get_templates(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let path = Query::new("template/page")
        .arg_opt("spaceKey", args.opt_str("spaceKey"))
        .arg("expand", "body")
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}

async fn create_page_from_template(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let template_path = Query::new(format!("template/{}", args.segment("templateId")?))
        .arg("expand", "body")
        .build();
    let template = snapshot(&ctx.get(&template_path).await?)?;

    let request = ContentRequest::create(
        ContentType::Page,
        args.str("spaceKey")?,
        args.str("title")?,
        template.storage_value(),
    )
    .with_parent(args.opt_str("parentId"));
    Ok(pretty_print(&ctx.post("content", &request).await?))
}
