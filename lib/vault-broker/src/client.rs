use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::auth::{Authenticator, VaultAuthenticator};
use crate::cache::TokenCache;
use crate::config::{
    ENV_VAULT_ADDR, ENV_VAULT_APPROLE_MOUNT, ENV_VAULT_TIMEOUT_SECS, VaultConfig,
    parse_timeout_secs,
};
use crate::credential::{Credential, CredentialProvider, EnvCredentialProvider};
use crate::error::VaultError;
use crate::http::VaultHttp;
use crate::models::{KvData, KvMetadata};
use crate::secret::{SecretReader, SecretRef, SecretValue};
use crate::session::Session;

pub struct VaultClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    approle_mount: Option<String>,
    application_name: Option<String>,
    credential_provider: Option<Arc<dyn CredentialProvider>>,
    environ: Option<HashMap<String, String>>,
    app_role_only: bool,
}

impl Default for VaultClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: None,
            approle_mount: None,
            application_name: None,
            credential_provider: None,
            environ: None,
            app_role_only: false,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn approle_mount(mut self, mount: impl Into<String>) -> Self {
        self.approle_mount = Some(mount.into());
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential_provider = Some(Arc::new(credential));
        self
    }

    pub fn credential_provider(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.credential_provider = Some(Arc::new(provider));
        self
    }

    /// Use these variables instead of the process environment.
    pub fn environ(mut self, environ: HashMap<String, String>) -> Self {
        self.environ = Some(environ);
        self
    }

    /// Log in with AppRole only. The environment's `VAULT_TOKEN` is ignored and
    /// any other credential is rejected with `InvalidConfig`.
    pub fn app_role_only(mut self) -> Self {
        self.app_role_only = true;
        self
    }

    fn resolve_config(&self, environ: &HashMap<String, String>) -> Result<VaultConfig, VaultError> {
        let base_url = self
            .base_url
            .clone()
            .or_else(|| environ.get(ENV_VAULT_ADDR).cloned())
            .ok_or_else(|| VaultError::InvalidConfig(format!("{ENV_VAULT_ADDR} not set")))?;

        let mut config = VaultConfig::new(&base_url)?;

        let timeout = match self.timeout {
            Some(timeout) => Some(timeout),
            None => environ
                .get(ENV_VAULT_TIMEOUT_SECS)
                .map(|raw| parse_timeout_secs(raw))
                .transpose()?,
        };
        if let Some(timeout) = timeout {
            config = config.with_timeout(timeout)?;
        }

        if let Some(mount) = self
            .approle_mount
            .clone()
            .or_else(|| environ.get(ENV_VAULT_APPROLE_MOUNT).cloned())
        {
            config = config.with_approle_mount(mount)?;
        }

        if let Some(ref name) = self.application_name {
            config = config.with_application_name(name.clone());
        }

        Ok(config)
    }

    /// Resolve configuration, load the credential and log in.
    ///
    /// Configuration and credential errors are reported before any request
    /// reaches the store.
    pub async fn build(self) -> Result<VaultClient, VaultError> {
        let environ = self
            .environ
            .clone()
            .unwrap_or_else(|| std::env::vars().collect());
        let config = self.resolve_config(&environ)?;

        let credential = match self.credential_provider {
            Some(ref provider) => provider.load()?,
            None if self.app_role_only => EnvCredentialProvider::new(environ).app_role().load()?,
            None => EnvCredentialProvider::new(environ).load()?,
        };
        if self.app_role_only && !matches!(credential, Credential::AppRole { .. }) {
            return Err(VaultError::InvalidConfig(format!(
                "AppRole credential required, got {}",
                credential.method()
            )));
        }

        let http = VaultHttp::new(config.clone())?;
        let authenticator = Arc::new(VaultAuthenticator::new(http.clone()));

        let session = authenticator.login(&credential).await?;
        tracing::info!(
            addr = %config.base_url,
            method = credential.method(),
            "Successfully authenticated to Vault"
        );

        let cache = TokenCache::with_session(authenticator.clone(), session);

        Ok(VaultClient {
            config,
            credential,
            authenticator,
            cache: Arc::new(cache),
            reader: SecretReader::new(http),
        })
    }
}

/// Logged-in client: credential, token cache and secret reader wired together.
pub struct VaultClient {
    config: VaultConfig,
    credential: Credential,
    authenticator: Arc<VaultAuthenticator>,
    cache: Arc<TokenCache>,
    reader: SecretReader,
}

impl VaultClient {
    pub async fn from_env() -> Result<Self, VaultError> {
        VaultClientBuilder::new().build().await
    }

    pub fn builder() -> VaultClientBuilder {
        VaultClientBuilder::new()
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn token_cache(&self) -> &Arc<TokenCache> {
        &self.cache
    }

    /// A valid session. When the cache reports `SessionExpired` this logs in
    /// again with the stored credential; every other error is returned as is.
    pub async fn session(&self) -> Result<Session, VaultError> {
        match self.cache.current().await {
            Err(VaultError::SessionExpired) => {
                tracing::info!("Session expired, logging in again");
                let session = self.authenticator.login(&self.credential).await?;
                self.cache.update(session.clone()).await;
                Ok(session)
            }
            other => other,
        }
    }

    pub async fn read(&self, secret: &SecretRef) -> Result<SecretValue, VaultError> {
        let session = self.session().await?;
        self.reader.read(&session, secret).await
    }

    /// `read` for a `mount/path` string, e.g. `read_path("demo/API", "mysecret")`.
    pub async fn read_path(&self, path: &str, key: &str) -> Result<SecretValue, VaultError> {
        let secret = SecretRef::parse(path, key)?;
        self.read(&secret).await
    }

    pub async fn read_version(
        &self,
        mount: &str,
        path: &str,
        version: Option<u64>,
    ) -> Result<KvData, VaultError> {
        let session = self.session().await?;
        self.reader.read_version(&session, mount, path, version).await
    }

    pub async fn read_metadata(&self, mount: &str, path: &str) -> Result<KvMetadata, VaultError> {
        let session = self.session().await?;
        self.reader.read_metadata(&session, mount, path).await
    }

    /// Renew the current token now.
    pub async fn renew(&self) -> Result<Session, VaultError> {
        self.cache.renew_now().await
    }

    pub async fn is_authenticated(&self) -> Result<bool, VaultError> {
        let session = self.cache.current().await?;
        self.authenticator.is_authenticated(&session).await
    }

    /// See [`TokenCache::spawn_renewal`].
    pub fn spawn_renewal(&self, threshold: f64) -> JoinHandle<VaultError> {
        self.cache.spawn_renewal(threshold)
    }
}
