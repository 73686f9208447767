use reqwest::{Client, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::models::ErrorBody;

const TOKEN_HEADER: &str = "X-Vault-Token";

/// Thin HTTP layer shared by the authenticator and the secret reader.
///
/// Every request carries the configured timeout. Transport failures are mapped
/// here; status codes are left to the caller because their meaning depends on
/// the endpoint (a 403 on login is a bad credential, on a read it is a policy
/// denial).
#[derive(Clone)]
pub struct VaultHttp {
    client: Client,
    config: VaultConfig,
}

impl VaultHttp {
    pub fn new(config: VaultConfig) -> Result<Self, VaultError> {
        let mut builder = Client::builder().timeout(config.timeout);
        if let Some(ref app_name) = config.application_name {
            builder = builder.user_agent(app_name.as_str());
        }
        let client = builder
            .build()
            .map_err(|e| VaultError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// URL of an API path under `/v1`; see [`VaultConfig::endpoint`].
    pub(crate) fn url<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, VaultError> {
        self.config.endpoint(segments)
    }

    pub(crate) async fn get(
        &self,
        url: Url,
        token: Option<&str>,
    ) -> Result<VaultResponse, VaultError> {
        let request = self.client.get(url);
        self.send(with_token(request, token)).await
    }

    pub(crate) async fn post<B: Serialize + ?Sized>(
        &self,
        url: Url,
        token: Option<&str>,
        body: &B,
    ) -> Result<VaultResponse, VaultError> {
        let request = self.client.post(url).json(body);
        self.send(with_token(request, token)).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<VaultResponse, VaultError> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        tracing::trace!(status, "Vault responded");
        Ok(VaultResponse { status, body })
    }

    fn transport_error(&self, err: reqwest::Error) -> VaultError {
        if err.is_timeout() {
            VaultError::Timeout(self.config.timeout)
        } else {
            VaultError::ConnectionFailure(err.to_string())
        }
    }
}

fn with_token(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.header(TOKEN_HEADER, token),
        None => request,
    }
}

/// Status and raw body of a completed request.
#[derive(Debug)]
pub(crate) struct VaultResponse {
    pub status: u16,
    pub body: String,
}

impl VaultResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, VaultError> {
        serde_json::from_str(&self.body).map_err(|e| {
            VaultError::invalid_response(self.status, format!("undecodable body: {e}"))
        })
    }

    /// Vault reports failures as `{"errors": [...]}`; fall back to the raw body.
    pub fn error_message(&self) -> String {
        let errors = serde_json::from_str::<ErrorBody>(&self.body)
            .map(|b| b.errors)
            .unwrap_or_default();
        if !errors.is_empty() {
            return errors.join("; ");
        }
        let body = self.body.trim();
        if body.is_empty() {
            format!("status {}", self.status)
        } else {
            body.to_string()
        }
    }

    /// Error for a status the endpoint does not expect. 5xx means the store is
    /// down or sealed.
    pub fn unexpected(&self) -> VaultError {
        if self.status >= 500 {
            VaultError::ConnectionFailure(format!(
                "Vault returned {}: {}",
                self.status,
                self.error_message()
            ))
        } else {
            VaultError::invalid_response(self.status, self.error_message())
        }
    }
}
