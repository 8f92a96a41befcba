//! Stateless request gateway in front of the Confluence REST API.
//!
//! Every call re-resolves the deployment profile, derives the Authorization
//! value and attaches it to that one outgoing request. The shared
//! `reqwest::Client` only carries the connection pool and user agent, so
//! concurrent calls never observe each other's headers.

use std::time::{Duration, Instant};

use confluence_core::auth::auth_header;
use confluence_core::endpoint::{api_base_path, build_url};
use confluence_core::{DeploymentProfile, GatewayError, ProfileSource};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

const ATLASSIAN_TOKEN_HEADER: &str = "X-Atlassian-Token";
const DELETED_PLACEHOLDER: &str = "Deleted successfully";

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("confluence-mcp/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Transport(format!("Confluence request timed out: {err}"))
    } else {
        GatewayError::Transport(format!("Failed to reach Confluence: {err}"))
    }
}

async fn read_text(response: Response, cancel: &CancellationToken) -> Result<String, GatewayError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GatewayError::Cancelled),
        result = response.text() => result.map_err(transport_error),
    }
}

pub struct Gateway {
    http: reqwest::Client,
    source: ProfileSource,
    timeout: Option<Duration>,
}

impl Gateway {
    pub fn new(source: ProfileSource) -> Self {
        Self {
            http: client(),
            source,
            timeout: None,
        }
    }

    /// Per-request timeout handed to the transport; `None` keeps reqwest's default.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn profile(&self) -> Result<DeploymentProfile, GatewayError> {
        self.source.resolve()
    }

    /// Non-secret view of the configuration.
    pub fn describe(&self) -> Value {
        let mode = self.source.mode();
        let mut payload = json!({
            "baseUrl": self.source.base_url.clone().unwrap_or_default(),
            "deploymentType": mode.as_str(),
            "isCloud": mode == confluence_core::DeploymentMode::Cloud,
            "isDatacenter": mode == confluence_core::DeploymentMode::SelfHosted,
            "isConfigured": false,
            "apiBasePath": api_base_path(mode, false),
        });
        match self.profile() {
            Ok(_) => payload["isConfigured"] = Value::Bool(true),
            Err(err) => payload["configurationError"] = Value::String(err.to_string()),
        }
        payload
    }

    fn prepare(
        &self,
        method: Method,
        relative_path: &str,
        use_v2: bool,
    ) -> Result<RequestBuilder, GatewayError> {
        let profile = self.profile()?;
        let url = build_url(&profile, relative_path, use_v2);
        let mut request = self
            .http
            .request(method, url)
            .header(AUTHORIZATION, auth_header(&profile))
            .header(ACCEPT, "application/json");
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        Ok(request)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Response, GatewayError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            result = request.send() => result.map_err(transport_error),
        }
    }

    /// Send and read the whole body as text; non-2xx becomes `Upstream`.
    async fn execute_text(
        &self,
        method: &Method,
        relative_path: &str,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let started = Instant::now();
        let response = self.send(request, cancel).await?;
        let status = response.status();
        let body = read_text(response, cancel).await?;
        tracing::debug!(
            event = "confluence_response",
            method = %method,
            path = %relative_path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
        );
        if !status.is_success() {
            tracing::warn!(
                event = "confluence_upstream_error",
                method = %method,
                path = %relative_path,
                status = status.as_u16(),
            );
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    /// Uniform call shape: relative path, optional JSON body, API version flag.
    pub async fn request(
        &self,
        method: Method,
        relative_path: &str,
        body: Option<&Value>,
        use_v2: bool,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let mut request = self.prepare(method.clone(), relative_path, use_v2)?;
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute_text(&method, relative_path, request, cancel)
            .await
    }

    pub async fn get(
        &self,
        relative_path: &str,
        use_v2: bool,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        self.request(Method::GET, relative_path, None, use_v2, cancel)
            .await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        relative_path: &str,
        body: &B,
        use_v2: bool,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let request = self.prepare(Method::POST, relative_path, use_v2)?.json(body);
        self.execute_text(&Method::POST, relative_path, request, cancel)
            .await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        relative_path: &str,
        body: &B,
        use_v2: bool,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let request = self.prepare(Method::PUT, relative_path, use_v2)?.json(body);
        self.execute_text(&Method::PUT, relative_path, request, cancel)
            .await
    }

    /// DELETE; an empty success body is reported as "Deleted successfully".
    pub async fn delete(
        &self,
        relative_path: &str,
        use_v2: bool,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let body = self
            .request(Method::DELETE, relative_path, None, use_v2, cancel)
            .await?;
        if body.trim().is_empty() {
            Ok(DELETED_PLACEHOLDER.to_string())
        } else {
            Ok(body)
        }
    }

    /// GET returning raw bytes, for binary downloads. Error mapping matches `get`.
    pub async fn get_bytes(
        &self,
        relative_path: &str,
        use_v2: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, GatewayError> {
        let request = self.prepare(Method::GET, relative_path, use_v2)?;
        let response = self.send(request, cancel).await?;
        let status = response.status();
        if !status.is_success() {
            let body = read_text(response, cancel).await?;
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
            result = response.bytes() => result.map_err(transport_error)?,
        };
        Ok(bytes.to_vec())
    }

    /// Multipart POST. The XSRF opt-out header is attached to this request only.
    pub async fn post_multipart(
        &self,
        relative_path: &str,
        form: reqwest::multipart::Form,
        use_v2: bool,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let request = self
            .prepare(Method::POST, relative_path, use_v2)?
            .header(ATLASSIAN_TOKEN_HEADER, "no-check")
            .multipart(form);
        self.execute_text(&Method::POST, relative_path, request, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cloud_source(base_url: &str) -> ProfileSource {
        ProfileSource {
            base_url: Some(base_url.to_string()),
            deployment_type: Some("cloud".to_string()),
            email: Some("me@example.com".to_string()),
            api_token: Some("cloud-token".to_string()),
        }
    }

    fn datacenter_source(base_url: &str) -> ProfileSource {
        ProfileSource {
            base_url: Some(base_url.to_string()),
            deployment_type: Some("datacenter".to_string()),
            email: None,
            api_token: Some("pat".to_string()),
        }
    }

    fn basic(email: &str, token: &str) -> String {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!("{email}:{token}"));
        format!("Basic {encoded}")
    }

    #[tokio::test]
    async fn cloud_get_sends_basic_auth_to_v1_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/rest/api/content/5"))
            .and(query_param("expand", "version"))
            .and(header("authorization", basic("me@example.com", "cloud-token").as_str()))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"5"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = Gateway::new(cloud_source(&server.uri()));
        let body = gateway
            .get("content/5?expand=version", false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, r#"{"id":"5"}"#);
    }

    #[tokio::test]
    async fn cloud_v2_uses_v2_base_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/api/v2/pages/5"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = Gateway::new(cloud_source(&format!("{}/", server.uri())));
        gateway
            .get("/pages/5", true, &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn datacenter_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/content"))
            .and(header("authorization", "Bearer pat"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"77"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = Gateway::new(datacenter_source(&server.uri()));
        let body = gateway
            .post("content", &json!({"type": "page"}), false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, r#"{"id":"77"}"#);
    }

    #[tokio::test]
    async fn non_success_maps_to_upstream_error_with_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/content/404"))
            .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"message":"not found"}"#))
            .mount(&server)
            .await;

        let gateway = Gateway::new(datacenter_source(&server.uri()));
        let err = gateway
            .get("content/404", false, &CancellationToken::new())
            .await
            .expect_err("404 must fail");
        assert_eq!(err.status(), Some(404));
        let message = err.to_string();
        assert!(message.contains("404"));
        assert!(message.contains(r#"{"message":"not found"}"#));
    }

    #[tokio::test]
    async fn success_status_with_error_payload_is_still_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"error":"soft"}"#))
            .mount(&server)
            .await;

        let gateway = Gateway::new(datacenter_source(&server.uri()));
        let body = gateway
            .get("anything", false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, r#"{"error":"soft"}"#);
    }

    #[tokio::test]
    async fn invalid_configuration_never_reaches_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut source = cloud_source(&server.uri());
        source.email = None;
        let gateway = Gateway::new(source);
        let err = gateway
            .get("content/1", false, &CancellationToken::new())
            .await
            .expect_err("missing email must fail");
        assert!(matches!(err, GatewayError::ConfigurationInvalid(_)));
        assert!(err.to_string().contains("email required for Cloud deployment"));
    }

    #[tokio::test]
    async fn delete_with_empty_body_reports_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/api/content/9"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let gateway = Gateway::new(datacenter_source(&server.uri()));
        let body = gateway
            .delete("content/9", false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, "Deleted successfully");
    }

    #[tokio::test]
    async fn get_bytes_returns_raw_payload_and_maps_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/download/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0_u8, 159, 146, 150]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/api/download/missing"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&server)
            .await;

        let gateway = Gateway::new(datacenter_source(&server.uri()));
        let cancel = CancellationToken::new();
        let bytes = gateway.get_bytes("download/ok", false, &cancel).await.unwrap();
        assert_eq!(bytes, vec![0_u8, 159, 146, 150]);

        let err = gateway
            .get_bytes("download/missing", false, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Confluence API error (403): denied");
    }

    #[tokio::test]
    async fn get_bytes_reports_truncated_error_body_as_transport_failure() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0_u8; 2048];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 100\r\n\r\npartial")
                .await
                .unwrap();
        });

        let gateway = Gateway::new(datacenter_source(&format!("http://{addr}")));
        let err = gateway
            .get_bytes("download/broken", false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)), "{err:?}");
    }

    #[tokio::test]
    async fn multipart_attaches_request_scoped_headers_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/content/3/child/attachment"))
            .and(header("x-atlassian-token", "no-check"))
            .and(header("accept", "application/json"))
            .and(header_exists("content-type"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"results":[]}"#))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/api/content/3"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = Gateway::new(datacenter_source(&server.uri()));
        let cancel = CancellationToken::new();
        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(b"hello".to_vec()).file_name("hello.txt"),
        );
        gateway
            .post_multipart("content/3/child/attachment", form, false, &cancel)
            .await
            .unwrap();
        gateway.get("content/3", false, &cancel).await.unwrap();

        let requests = server.received_requests().await.unwrap_or_default();
        let follow_up = requests
            .iter()
            .find(|r| r.method.as_str() == "GET")
            .expect("follow-up GET recorded");
        assert!(!follow_up.headers.contains_key("x-atlassian-token"));
    }

    #[tokio::test]
    async fn cancelled_token_aborts_in_flight_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let gateway = Gateway::new(datacenter_source(&server.uri()));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = gateway.get("slow", false, &cancel).await.unwrap_err();
        assert!(matches!(err, GatewayError::Cancelled));
    }

    #[tokio::test]
    async fn timeout_is_reported_as_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let gateway = Gateway::new(datacenter_source(&server.uri()))
            .with_timeout(Some(Duration::from_millis(100)));
        let err = gateway
            .get("slow", false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[test]
    fn describe_hides_secrets_and_reports_configuration_state() {
        let gateway = Gateway::new(datacenter_source("https://wiki.corp"));
        let described = gateway.describe();
        assert_eq!(described["deploymentType"], "datacenter");
        assert_eq!(described["isConfigured"], true);
        assert_eq!(described["apiBasePath"], "/rest/api");
        assert!(!described.to_string().contains("pat"));

        let unconfigured = Gateway::new(ProfileSource::default()).describe();
        assert_eq!(unconfigured["isConfigured"], false);
        assert_eq!(unconfigured["isCloud"], true);
        assert!(
            unconfigured["configurationError"]
                .as_str()
                .unwrap()
                .contains("base URL not set")
        );
    }
}
