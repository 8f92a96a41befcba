use base64::Engine;

use crate::profile::{DeploymentMode, DeploymentProfile};

/// Authorization header value for a validated profile.
///
/// Cloud uses basic auth over `email:api_token`; self-hosted installs take
/// the personal access token as a bearer token.
pub fn auth_header(profile: &DeploymentProfile) -> String {
    match profile.mode() {
        DeploymentMode::Cloud => {
            let email = profile.email().unwrap_or_default();
            let raw = format!("{email}:{}", profile.secret());
            let encoded = base64::engine::general_purpose::STANDARD.encode(raw.as_bytes());
            format!("Basic {encoded}")
        }
        DeploymentMode::SelfHosted => format!("Bearer {}", profile.secret()),
    }
}
