use std::sync::Arc;

use confluence_core::GatewayError;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::gateway::Gateway;

/// Per-invocation handle given to every handler: the shared gateway plus the
/// cancellation token of this one call.
#[derive(Clone)]
pub struct CallContext {
    gateway: Arc<Gateway>,
    cancel: CancellationToken,
}

impl CallContext {
    pub fn new(gateway: Arc<Gateway>, cancel: CancellationToken) -> Self {
        Self { gateway, cancel }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn get(&self, path: &str) -> Result<String, GatewayError> {
        self.gateway.get(path, false, &self.cancel).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<String, GatewayError> {
        self.gateway.post(path, body, false, &self.cancel).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<String, GatewayError> {
        self.gateway.put(path, body, false, &self.cancel).await
    }

    pub async fn delete(&self, path: &str) -> Result<String, GatewayError> {
        self.gateway.delete(path, false, &self.cancel).await
    }

    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, GatewayError> {
        self.gateway.get_bytes(path, false, &self.cancel).await
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<String, GatewayError> {
        self.gateway
            .post_multipart(path, form, false, &self.cancel)
            .await
    }
}
