use crate::profile::{DeploymentMode, DeploymentProfile};

/// API base path for a deployment mode. Only cloud distinguishes v1 and v2.
pub fn api_base_path(mode: DeploymentMode, use_v2: bool) -> &'static str {
    match (mode, use_v2) {
        (DeploymentMode::Cloud, false) => "/wiki/rest/api",
        (DeploymentMode::Cloud, true) => "/wiki/api/v2",
        (DeploymentMode::SelfHosted, _) => "/rest/api",
    }
}

/// Absolute URL for an operation-relative path (which may carry a query
/// string). The configured base URL is used literally apart from trailing
/// slashes; the relative path loses its leading slashes.
pub fn build_url(profile: &DeploymentProfile, relative_path: &str, use_v2: bool) -> String {
    let base = profile.base_url().trim_end_matches('/');
    let api_path = api_base_path(profile.mode(), use_v2);
    format!("{base}{api_path}/{}", relative_path.trim_start_matches('/'))
}

/// Percent-encode a caller-supplied value for use as one path segment.
/// Everything outside the RFC 3986 unreserved set is escaped, so `/`, `?`
/// and `#` cannot change which endpoint a request reaches.
pub fn encode_segment(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(char::from(byte))
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}
