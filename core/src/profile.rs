use std::fmt;

use crate::error::GatewayError;

/// Which backend variant governs auth scheme and path conventions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeploymentMode {
    Cloud,
    SelfHosted,
}

impl DeploymentMode {
    /// Case-insensitive. Blank means cloud; every other non-cloud value is
    /// treated as a self-hosted (Datacenter/Server) install.
    pub fn parse(raw: Option<&str>) -> Self {
        let normalized = raw.map(|v| v.trim().to_ascii_lowercase()).unwrap_or_default();
        if normalized.is_empty() || normalized == "cloud" {
            DeploymentMode::Cloud
        } else {
            DeploymentMode::SelfHosted
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentMode::Cloud => "cloud",
            DeploymentMode::SelfHosted => "datacenter",
        }
    }
}

/// Raw configuration inputs as captured once at startup.
///
/// Nothing is validated here; [`ProfileSource::resolve`] re-checks the values
/// every time a gateway call needs a profile.
#[derive(Clone, Default)]
pub struct ProfileSource {
    pub base_url: Option<String>,
    pub deployment_type: Option<String>,
    pub email: Option<String>,
    pub api_token: Option<String>,
}

impl fmt::Debug for ProfileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileSource")
            .field("base_url", &self.base_url)
            .field("deployment_type", &self.deployment_type)
            .field("email", &self.email)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl ProfileSource {
    pub fn mode(&self) -> DeploymentMode {
        DeploymentMode::parse(self.deployment_type.as_deref())
    }

    /// Validate the inputs into a profile. Checks run in a fixed order and the
    /// first failure wins: base URL, then token, then (cloud only) email.
    pub fn resolve(&self) -> Result<DeploymentProfile, GatewayError> {
        let base_url = non_blank(self.base_url.as_ref()).ok_or_else(|| {
            GatewayError::ConfigurationInvalid(
                "Confluence base URL not set (CONFLUENCE_BASE_URL)".to_string(),
            )
        })?;
        let secret = non_blank(self.api_token.as_ref()).ok_or_else(|| {
            GatewayError::ConfigurationInvalid(
                "Confluence API token not set (CONFLUENCE_API_TOKEN)".to_string(),
            )
        })?;

        let mode = self.mode();
        let email = match mode {
            DeploymentMode::Cloud => {
                let email = non_blank(self.email.as_ref()).ok_or_else(|| {
                    GatewayError::ConfigurationInvalid(
                        "Confluence email required for Cloud deployment (CONFLUENCE_EMAIL)"
                            .to_string(),
                    )
                })?;
                Some(email.to_string())
            }
            DeploymentMode::SelfHosted => None,
        };

        Ok(DeploymentProfile {
            base_url: base_url.to_string(),
            mode,
            email,
            secret: secret.to_string(),
        })
    }
}

/// A validated profile: secret is non-empty and email is present iff cloud.
#[derive(Clone, PartialEq, Eq)]
pub struct DeploymentProfile {
    base_url: String,
    mode: DeploymentMode,
    email: Option<String>,
    secret: String,
}

impl DeploymentProfile {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for DeploymentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentProfile")
            .field("base_url", &self.base_url)
            .field("mode", &self.mode)
            .field("email", &self.email)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(base: &str, mode: Option<&str>, email: &str, token: &str) -> ProfileSource {
        ProfileSource {
            base_url: Some(base.to_string()),
            deployment_type: mode.map(str::to_string),
            email: Some(email.to_string()),
            api_token: Some(token.to_string()),
        }
    }

    fn config_message(result: Result<DeploymentProfile, GatewayError>) -> String {
        match result {
            Err(GatewayError::ConfigurationInvalid(message)) => message,
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn mode_defaults_to_cloud_and_is_case_insensitive() {
        assert_eq!(DeploymentMode::parse(None), DeploymentMode::Cloud);
        assert_eq!(DeploymentMode::parse(Some("  ")), DeploymentMode::Cloud);
        assert_eq!(DeploymentMode::parse(Some("CLOUD")), DeploymentMode::Cloud);
        assert_eq!(DeploymentMode::parse(Some("DataCenter")), DeploymentMode::SelfHosted);
        assert_eq!(DeploymentMode::parse(Some("server")), DeploymentMode::SelfHosted);
    }

    #[test]
    fn missing_base_url_is_reported_first() {
        let src = ProfileSource::default();
        assert!(config_message(src.resolve()).contains("base URL not set"));
    }

    #[test]
    fn blank_token_is_reported_before_email() {
        let src = source("https://x.atlassian.net/wiki", None, "", "   ");
        assert!(config_message(src.resolve()).contains("API token not set"));
    }

    #[test]
    fn cloud_requires_email() {
        let src = source("https://x.atlassian.net/wiki", Some("cloud"), "", "tok");
        assert!(config_message(src.resolve()).contains("email required for Cloud deployment"));
    }

    #[test]
    fn self_hosted_ignores_email() {
        let src = source("https://wiki.corp", Some("datacenter"), "someone@corp", "pat");
        let profile = src.resolve().unwrap();
        assert_eq!(profile.mode(), DeploymentMode::SelfHosted);
        assert_eq!(profile.email(), None);
        assert_eq!(profile.secret(), "pat");
    }

    #[test]
    fn cloud_profile_keeps_trimmed_values() {
        let src = source(" https://x.atlassian.net/wiki ", None, " me@x.io ", " tok ");
        let profile = src.resolve().unwrap();
        assert_eq!(profile.base_url(), "https://x.atlassian.net/wiki");
        assert_eq!(profile.email(), Some("me@x.io"));
        assert_eq!(profile.secret(), "tok");
    }

    #[test]
    fn debug_output_never_contains_secret() {
        let src = source("https://wiki.corp", Some("datacenter"), "", "super-secret");
        assert!(!format!("{src:?}").contains("super-secret"));
        let profile = src.resolve().unwrap();
        assert!(!format!("{profile:?}").contains("super-secret"));
    }
}
