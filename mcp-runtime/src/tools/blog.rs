use confluence_core::entities::{ContentRequest, ContentType};
use confluence_core::format::pretty_print;

use super::{DEFAULT_LIMIT, Query};
use crate::context::CallContext;
use crate::error::HandlerError;
use crate::registry::{BoundArgs, OperationDescriptor, ParamSpec, handler};

pub(super) fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new("confluence_create_blog_post", "Create a new blog post", handler(create_blog_post))
            .param(ParamSpec::string("spaceKey", "The space key"))
            .param(ParamSpec::string("title", "The blog post title"))
            .param(ParamSpec::string("content", "The blog post content in storage format"))
            .failure_prefix("Error creating blog post"),
        OperationDescriptor::new("confluence_get_blog_posts", "Get blog posts from a space", handler(get_blog_posts))
            .param(ParamSpec::string("spaceKey", "The space key"))
            .param(ParamSpec::int_or("limit", "Maximum results (default: 25)", DEFAULT_LIMIT))
            .failure_prefix("Error getting blog posts"),
    ]
}

async fn create_blog_post(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let request = ContentRequest::create(
        ContentType::BlogPost,
        args.str("spaceKey")?,
        args.str("title")?,
        args.str("content")?,
    );
    Ok(pretty_print(&ctx.post("content", &request).await?))
}

async fn get_blog_posts(ctx: CallContext, args: BoundArgs) -> Result<String, HandlerError> {
    let path = Query::new(format!("space/{}/content/blogpost", args.segment("spaceKey")?))
        .arg("limit", args.int("limit")?)
        .arg("expand", "version,body.storage")
        .build();
    Ok(pretty_print(&ctx.get(&path).await?))
}
