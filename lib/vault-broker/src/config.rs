use std::collections::HashMap;
use std::time::Duration;

use reqwest::Url;

use crate::error::VaultError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_APPROLE_MOUNT: &str = "approle";

pub(crate) const ENV_VAULT_ADDR: &str = "VAULT_ADDR";
pub(crate) const ENV_VAULT_TIMEOUT_SECS: &str = "VAULT_TIMEOUT_SECS";
pub(crate) const ENV_VAULT_APPROLE_MOUNT: &str = "VAULT_APPROLE_MOUNT";

/// Where the store lives and how every request to it is bounded.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub base_url: Url,
    /// Applied to every network call (login, renew, read).
    pub timeout: Duration,
    pub approle_mount: String,
    /// Sent as `User-Agent` when set.
    pub application_name: Option<String>,
}

impl VaultConfig {
    pub fn new(base_url: &str) -> Result<Self, VaultError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout: DEFAULT_TIMEOUT,
            approle_mount: DEFAULT_APPROLE_MOUNT.to_string(),
            application_name: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, VaultError> {
        if timeout.is_zero() {
            return Err(VaultError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        self.timeout = timeout;
        Ok(self)
    }

    pub fn with_approle_mount(mut self, mount: impl Into<String>) -> Result<Self, VaultError> {
        let mount = mount.into();
        let mount = mount.trim_matches('/');
        if mount.is_empty() {
            return Err(VaultError::InvalidConfig(
                "approle mount must not be empty".to_string(),
            ));
        }
        self.approle_mount = mount.to_string();
        Ok(self)
    }

    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Reads `VAULT_ADDR`, `VAULT_TIMEOUT_SECS` and `VAULT_APPROLE_MOUNT`.
    pub fn from_environ(environ: &HashMap<String, String>) -> Result<Self, VaultError> {
        let addr = environ
            .get(ENV_VAULT_ADDR)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| VaultError::InvalidConfig(format!("{ENV_VAULT_ADDR} not set")))?;

        let mut config = Self::new(addr)?;

        if let Some(secs) = environ.get(ENV_VAULT_TIMEOUT_SECS) {
            config = config.with_timeout(parse_timeout_secs(secs)?)?;
        }
        if let Some(mount) = environ.get(ENV_VAULT_APPROLE_MOUNT) {
            config = config.with_approle_mount(mount.as_str())?;
        }

        Ok(config)
    }

    /// Full URL of an API path given as segments, e.g. `["auth", "token",
    /// "renew-self"]`. Each segment is percent-encoded, so `#`, `?` or `/`
    /// inside one never change which resource is addressed.
    pub(crate) fn endpoint<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, VaultError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                VaultError::InvalidConfig(format!("{} cannot be a base URL", self.base_url))
            })?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }
}

pub(crate) fn parse_base_url(raw: &str) -> Result<Url, VaultError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| VaultError::InvalidConfig(format!("invalid Vault address {raw:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(VaultError::InvalidConfig(format!(
            "unsupported scheme {other:?} in Vault address"
        ))),
    }
}

pub(crate) fn parse_timeout_secs(raw: &str) -> Result<Duration, VaultError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| VaultError::InvalidConfig(format!("{ENV_VAULT_TIMEOUT_SECS}={raw:?} is not a number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn environ(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = VaultConfig::new("http://localhost:8200/").unwrap();
        assert_eq!(
            config.endpoint(["auth", "approle", "login"]).unwrap().as_str(),
            "http://localhost:8200/v1/auth/approle/login"
        );

        let config = VaultConfig::new("https://gateway/vault").unwrap();
        assert_eq!(
            config.endpoint(["demo", "data", "API"]).unwrap().as_str(),
            "https://gateway/vault/v1/demo/data/API"
        );
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let config = VaultConfig::new("http://localhost:8200").unwrap();
        let url = config.endpoint(["demo", "data", "a#b", "API?version=1"]).unwrap();

        assert_eq!(url.path(), "/v1/demo/data/a%23b/API%3Fversion=1");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_defaults() {
        let config = VaultConfig::new("http://localhost:8200").unwrap();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.approle_mount, "approle");
        assert!(config.application_name.is_none());
    }

    #[test]
    fn test_rejects_bad_address() {
        let err = VaultConfig::new("not a url").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);

        let err = VaultConfig::new("ftp://vault:8200").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = VaultConfig::new("http://vault:8200")
            .unwrap()
            .with_timeout(Duration::ZERO)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_from_environ() {
        let config = VaultConfig::from_environ(&environ(&[
            ("VAULT_ADDR", "https://vault.internal:8200"),
            ("VAULT_TIMEOUT_SECS", "5"),
            ("VAULT_APPROLE_MOUNT", "/ci-approle/"),
        ]))
        .unwrap();

        assert_eq!(config.base_url.host_str(), Some("vault.internal"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.approle_mount, "ci-approle");
    }

    #[test]
    fn test_from_environ_requires_addr() {
        let err = VaultConfig::from_environ(&environ(&[])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.to_string().contains("VAULT_ADDR"));
    }

    #[test]
    fn test_from_environ_rejects_bad_timeout() {
        let err = VaultConfig::from_environ(&environ(&[
            ("VAULT_ADDR", "http://vault:8200"),
            ("VAULT_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }
}
