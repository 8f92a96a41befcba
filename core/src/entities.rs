//! Typed request bodies and decoded response subsets for the Confluence REST
//! API (v1 wire format).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Page,
    #[serde(rename = "blogpost")]
    BlogPost,
    Comment,
}

impl ContentType {
    /// Content types a page-creation call may target.
    pub fn parse_creatable(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "page" => Some(ContentType::Page),
            "blogpost" => Some(ContentType::BlogPost),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageValue {
    pub value: String,
    pub representation: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StorageBody {
    pub storage: StorageValue,
}

impl StorageBody {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            storage: StorageValue {
                value: value.into(),
                representation: "storage".to_string(),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpaceRef {
    pub key: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IdRef {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VersionInfo {
    pub number: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Create/update body for pages and blog posts.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space: Option<SpaceRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ancestors: Vec<IdRef>,
    pub body: StorageBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionInfo>,
}

impl ContentRequest {
    pub fn create(
        content_type: ContentType,
        space_key: impl Into<String>,
        title: impl Into<String>,
        storage: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            content_type,
            title: title.into(),
            space: Some(SpaceRef {
                key: space_key.into(),
            }),
            ancestors: Vec::new(),
            body: StorageBody::new(storage),
            version: None,
        }
    }

    /// Update body for an existing page; `next_version` must be the current
    /// version plus one.
    pub fn update(
        id: impl Into<String>,
        title: impl Into<String>,
        storage: impl Into<String>,
        next_version: u64,
        message: Option<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            content_type: ContentType::Page,
            title: title.into(),
            space: None,
            ancestors: Vec::new(),
            body: StorageBody::new(storage),
            version: Some(VersionInfo {
                number: next_version,
                message,
            }),
        }
    }

    /// Attach a parent; blank ids are ignored.
    pub fn with_parent(mut self, parent_id: Option<&str>) -> Self {
        if let Some(id) = parent_id.map(str::trim).filter(|id| !id.is_empty()) {
            self.ancestors = vec![IdRef { id: id.to_string() }];
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommentContainer {
    pub id: String,
    #[serde(rename = "type")]
    pub container_type: ContentType,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommentRequest {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub container: CommentContainer,
    pub body: StorageBody,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ancestors: Vec<IdRef>,
}

impl CommentRequest {
    /// Plain-text comment on a page, wrapped in a paragraph after escaping.
    pub fn plain_text(page_id: impl Into<String>, text: &str, reply_to: Option<&str>) -> Self {
        let ancestors = reply_to
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| vec![IdRef { id: id.to_string() }])
            .unwrap_or_default();
        Self {
            content_type: ContentType::Comment,
            container: CommentContainer {
                id: page_id.into(),
                container_type: ContentType::Page,
            },
            body: StorageBody::new(format!("<p>{}</p>", escape_html(text))),
            ancestors,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlainValue {
    pub value: String,
    pub representation: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpaceDescription {
    pub plain: PlainValue,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpaceRequest {
    pub key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub space_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<SpaceDescription>,
}

impl SpaceRequest {
    pub fn new(key: &str, name: impl Into<String>, space_type: impl Into<String>) -> Self {
        Self {
            key: key.trim().to_uppercase(),
            name: name.into(),
            space_type: space_type.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: Option<&str>) -> Self {
        self.description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| SpaceDescription {
                plain: PlainValue {
                    value: d.to_string(),
                    representation: "plain".to_string(),
                },
            });
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LabelRequest {
    pub prefix: String,
    pub name: String,
}

impl LabelRequest {
    pub fn global(name: &str) -> Self {
        Self {
            prefix: "global".to_string(),
            name: name.trim().to_lowercase(),
        }
    }

    /// Parse a comma-separated list, dropping empty entries.
    pub fn from_csv(labels: &str) -> Vec<Self> {
        labels
            .split(',')
            .filter(|l| !l.trim().is_empty())
            .map(Self::global)
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContentPropertyRequest {
    pub key: String,
    pub value: Value,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BodyField {
    #[serde(default)]
    pub storage: Option<StorageValue>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct VersionField {
    #[serde(default)]
    pub number: Option<u64>,
}

/// The parts of a content (or template) payload that read-modify-write
/// handlers need.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ContentSnapshot {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<BodyField>,
    #[serde(default)]
    pub version: Option<VersionField>,
}

impl ContentSnapshot {
    pub fn storage_value(&self) -> &str {
        self.body
            .as_ref()
            .and_then(|b| b.storage.as_ref())
            .map(|s| s.value.as_str())
            .unwrap_or_default()
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    pub fn version_number(&self) -> u64 {
        self.version.as_ref().and_then(|v| v.number).unwrap_or(1)
    }
}

/// Identity returned by `user/current`. Cloud reports `accountId`;
/// Datacenter reports `username` and `userKey`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl CurrentUser {
    /// Best human-readable name available.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .or(self.account_id.as_deref())
            .unwrap_or("unknown user")
    }
}

/// Minimal HTML escaping for text placed inside storage-format markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_page_body_matches_wire_format() {
        let req = ContentRequest::create(ContentType::Page, "DEV", "Title", "<p>x</p>")
            .with_parent(Some("42"));
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "type": "page",
                "title": "Title",
                "space": {"key": "DEV"},
                "ancestors": [{"id": "42"}],
                "body": {"storage": {"value": "<p>x</p>", "representation": "storage"}}
            })
        );
    }

    #[test]
    fn blank_parent_is_ignored() {
        let req = ContentRequest::create(ContentType::BlogPost, "DEV", "T", "")
            .with_parent(Some("  "));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["type"], "blogpost");
        assert!(value.get("ancestors").is_none());
    }

    #[test]
    fn update_body_carries_id_and_version() {
        let req = ContentRequest::update("7", "T", "b", 4, Some("msg".to_string()));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["id"], "7");
        assert_eq!(value["version"], json!({"number": 4, "message": "msg"}));
        assert!(value.get("space").is_none());
    }

    #[test]
    fn comment_escapes_text_and_threads_reply() {
        let req = CommentRequest::plain_text("9", "a <b> & c", Some("11"));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["type"], "comment");
        assert_eq!(value["container"], json!({"id": "9", "type": "page"}));
        assert_eq!(value["body"]["storage"]["value"], "<p>a &lt;b&gt; &amp; c</p>");
        assert_eq!(value["ancestors"], json!([{"id": "11"}]));
    }

    #[test]
    fn space_key_is_uppercased_and_description_optional() {
        let req = SpaceRequest::new("dev", "Development", "global").with_description(None);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value, json!({"key": "DEV", "name": "Development", "type": "global"}));

        let req = SpaceRequest::new("ops", "Ops", "global").with_description(Some("Runbooks"));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["description"]["plain"]["value"], "Runbooks");
    }

    #[test]
    fn labels_from_csv_are_trimmed_and_lowercased() {
        let labels = LabelRequest::from_csv(" Alpha, beta ,,GAMMA");
        let names: Vec<_> = labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
        assert!(labels.iter().all(|l| l.prefix == "global"));
    }

    #[test]
    fn snapshot_reads_nested_fields_with_defaults() {
        let snap: ContentSnapshot = serde_json::from_value(json!({
            "id": "1",
            "title": "Home",
            "body": {"storage": {"value": "<p>hi</p>", "representation": "storage"}},
            "version": {"number": 3}
        }))
        .unwrap();
        assert_eq!(snap.title(), "Home");
        assert_eq!(snap.storage_value(), "<p>hi</p>");
        assert_eq!(snap.version_number(), 3);

        let empty: ContentSnapshot = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.storage_value(), "");
        assert_eq!(empty.version_number(), 1);
    }

    #[test]
    fn creatable_content_types() {
        assert_eq!(ContentType::parse_creatable("Page"), Some(ContentType::Page));
        assert_eq!(ContentType::parse_creatable("blogpost"), Some(ContentType::BlogPost));
        assert_eq!(ContentType::parse_creatable("comment"), None);
    }

    #[test]
    fn current_user_label_prefers_display_name() {
        let cloud: CurrentUser = serde_json::from_value(json!({
            "accountId": "5b10a",
            "displayName": "Ada Lovelace",
            "type": "known"
        }))
        .unwrap();
        assert_eq!(cloud.label(), "Ada Lovelace");

        let datacenter: CurrentUser =
            serde_json::from_value(json!({"username": "ada", "userKey": "8a7f"})).unwrap();
        assert_eq!(datacenter.label(), "ada");
        assert_eq!(CurrentUser::default().label(), "unknown user");
    }
}
