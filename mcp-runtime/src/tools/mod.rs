//! Tool surface. Each submodule contributes descriptors for one area of the
//! Confluence API; handlers build one relative path and call the gateway.

use confluence_core::GatewayError;
use confluence_core::cql;
use confluence_core::entities::ContentSnapshot;

use crate::error::HandlerError;
use crate::registry::OperationDescriptor;

mod attachments;
mod blog;
mod comments;
mod labels;
mod pages;
mod permissions;
mod properties;
mod search;
mod spaces;
mod templates;
mod users;
mod watch;

pub const DEFAULT_LIMIT: i64 = 25;

/// Every operation, in the order `tools/list` reports them.
pub fn all() -> Vec<OperationDescriptor> {
    let mut ops = Vec::new();
    ops.extend(pages::operations());
    ops.extend(spaces::operations());
    ops.extend(search::operations());
    ops.extend(comments::operations());
    ops.extend(attachments::operations());
    ops.extend(labels::operations());
    ops.extend(users::operations());
    ops.extend(blog::operations());
    ops.extend(templates::operations());
    ops.extend(permissions::operations());
    ops.extend(watch::operations());
    ops.extend(properties::operations());
    ops
}

/// Relative path plus query pairs, form-encoded on [`Query::build`].
pub(crate) struct Query {
    path: String,
    pairs: Vec<(&'static str, String)>,
}

impl Query {
    pub(crate) fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            pairs: Vec::new(),
        }
    }

    pub(crate) fn arg(mut self, key: &'static str, value: impl ToString) -> Self {
        self.pairs.push((key, value.to_string()));
        self
    }

    pub(crate) fn arg_opt(self, key: &'static str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.arg(key, value),
            None => self,
        }
    }

    pub(crate) fn build(&self) -> String {
        cql::with_query(&self.path, &self.pairs)
    }
}

pub(crate) fn snapshot(raw: &str) -> Result<ContentSnapshot, HandlerError> {
    serde_json::from_str(raw).map_err(|err| GatewayError::Decode(err.to_string()).into())
}

/// `space="KEY"` clause, or nothing when no key was given.
pub(crate) fn space_clause(space_key: Option<&str>) -> String {
    space_key
        .map(|key| format!("space={}", cql::quote(key)))
        .unwrap_or_default()
}


#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn operation_ids_are_unique_and_prefixed() {
        let ops = all();
        let mut seen = HashSet::new();
        for op in &ops {
            assert!(op.id().starts_with("confluence_"), "{}", op.id());
            assert!(seen.insert(op.id()), "duplicate {}", op.id());
        }
        assert_eq!(ops.len(), 47);
    }

    #[test]
    fn query_builder_encodes_values() {
        let path = Query::new("content")
            .arg("spaceKey", "DEV")
            .arg("title", "Release notes & plans")
            .arg_opt("missing", None)
            .arg("limit", 25)
            .build();
        assert_eq!(
            path,
            "content?spaceKey=DEV&title=Release+notes+%26+plans&limit=25"
        );
    }

    #[test]
    fn space_clause_quotes_key() {
        assert_eq!(space_clause(Some("DEV")), "space=\"DEV\"");
        assert_eq!(space_clause(None), "");
    }
}
