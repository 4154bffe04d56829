//! ============================================================================
//! OpenBao Client - HTTP implementation of `SecretsBackend`
//! ============================================================================
//! KV v2 reads/lists/writes, userpass login, MFA validation and token
//! self-revocation against an OpenBao (or Vault) server.
//! ============================================================================

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::wire::{
    KvListResponse, KvReadResponse, KvWriteResponse, LoginResponse, MfaValidateResponse,
    SecretData,
};
use super::{check_secret_path, SecretsBackend};
use crate::config::GatekeeperConfig;
use crate::types::{GatekeeperError, GatekeeperResult};

const TOKEN_HEADER: &str = "X-Vault-Token";

/// HTTP client for the OpenBao API
pub struct OpenBaoClient {
    client: Client,
    /// Applied per request; MFA validation is exempt
    request_timeout: Duration,
    addr: String,
    kv_mount: String,
    userpass_mount: String,
}

impl OpenBaoClient {
    pub fn new(config: &GatekeeperConfig) -> GatekeeperResult<Self> {
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let client = Client::builder()
            .user_agent(concat!("gatekeeper/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| GatekeeperError::Transport {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            request_timeout,
            addr: config.addr.trim_end_matches('/').to_string(),
            kv_mount: config.kv_mount.clone(),
            userpass_mount: config.userpass_mount.clone(),
        })
    }

    /// Request bounded by the configured timeout
    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.client.request(method, url).timeout(self.request_timeout)
    }

    fn url(&self, api_path: &str) -> String {
        format!("{}/v1/{}", self.addr, api_path.trim_start_matches('/'))
    }

    fn kv_url(&self, kind: &str, path: &str) -> GatekeeperResult<String> {
        check_secret_path(path)?;
        Ok(self.url(&format!(
            "{}/{}/{}",
            self.kv_mount,
            kind,
            path.trim_start_matches('/')
        )))
    }

    async fn send(request: RequestBuilder, what: &str) -> GatekeeperResult<Response> {
        let response = request.send().await.map_err(|e| GatekeeperError::Transport {
            message: format!("{}: {}", what, e),
        })?;

        let status = response.status();
        debug!("{} -> {}", what, status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatekeeperError::BackendRequest {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> GatekeeperResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| GatekeeperError::InvalidResponse {
                message: format!("{}: {}", what, e),
            })
    }
}

#[async_trait]
impl SecretsBackend for OpenBaoClient {
    async fn read_kv(&self, path: &str, token: &str) -> GatekeeperResult<KvReadResponse> {
        let what = format!("read {}", path);
        let request = self
            .request(Method::GET, self.kv_url("data", path)?)
            .header(TOKEN_HEADER, token);

        let response = Self::send(request, &what).await?;
        Self::decode(response, &what).await
    }

    async fn list_kv(&self, path: &str, token: &str) -> GatekeeperResult<KvListResponse> {
        let what = format!("list {}", path);
        let method = Method::from_bytes(b"LIST").map_err(|e| GatekeeperError::Transport {
            message: format!("{}: {}", what, e),
        })?;
        let request = self
            .request(method, self.kv_url("metadata", path)?)
            .header(TOKEN_HEADER, token);

        match Self::send(request, &what).await {
            Ok(response) => Self::decode(response, &what).await,
            // Nothing stored under this prefix
            Err(GatekeeperError::BackendRequest { status: 404, .. }) => Ok(KvListResponse::default()),
            Err(e) => Err(e),
        }
    }

    async fn write_kv(
        &self,
        path: &str,
        data: &SecretData,
        token: &str,
    ) -> GatekeeperResult<KvWriteResponse> {
        let what = format!("write {}", path);
        let request = self
            .request(Method::POST, self.kv_url("data", path)?)
            .header(TOKEN_HEADER, token)
            .json(&json!({ "data": data }));

        let response = Self::send(request, &what).await?;
        Self::decode(response, &what).await
    }

    async fn userpass_login(&self, username: &str, password: &str) -> GatekeeperResult<LoginResponse> {
        let what = format!("userpass login {}", username);
        let request = self
            .request(
                Method::POST,
                self.url(&format!("auth/{}/login/{}", self.userpass_mount, username)),
            )
            .json(&json!({ "password": password }));

        let response = Self::send(request, &what).await?;
        Self::decode(response, &what).await
    }

    async fn validate_mfa(
        &self,
        mfa_request_id: &str,
        method_id: &str,
        token: &str,
    ) -> GatekeeperResult<MfaValidateResponse> {
        let what = "mfa validate";
        // Blocks for the whole Duo push; the backend owns that timeout
        let request = self
            .client
            .post(self.url("sys/mfa/validate"))
            .header(TOKEN_HEADER, token)
            .json(&json!({
                "mfa_request_id": mfa_request_id,
                "mfa_payload": { method_id: [] },
            }));

        let response = Self::send(request, what).await?;
        Self::decode(response, what).await
    }

    async fn revoke_self(&self, token: &str) -> GatekeeperResult<()> {
        let request = self
            .request(Method::POST, self.url("auth/token/revoke-self"))
            .header(TOKEN_HEADER, token);

        Self::send(request, "revoke-self").await.map(|_| ())
    }
}
