use std::fmt;

use crate::error::VaultError;
use crate::http::{VaultHttp, VaultResponse};
use crate::models::{KvData, KvMetadata, KvReadData, KvReadResponse, MetadataResponse};
use crate::session::Session;

/// Location of a single key inside a KV v2 secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretRef {
    mount: String,
    path: String,
    key: String,
}

impl SecretRef {
    pub fn new(
        mount: impl Into<String>,
        path: impl Into<String>,
        key: impl Into<String>,
    ) -> Result<Self, VaultError> {
        let (mount, path, key) = (mount.into(), path.into(), key.into());
        let (mount, path) = check_location(&mount, &path).map_err(|_| {
            VaultError::InvalidSecretRef {
                reference: format!("{mount}/{path}:{key}"),
            }
        })?;
        if key.is_empty() {
            return Err(VaultError::InvalidSecretRef {
                reference: format!("{mount}/{path}:{key}"),
            });
        }

        Ok(Self { mount, path, key })
    }

    /// Split `mount/path...` on the first slash: `"demo/API"` is mount `demo`,
    /// path `API`.
    pub fn parse(full_path: &str, key: impl Into<String>) -> Result<Self, VaultError> {
        let key = key.into();
        let (mount, path) = full_path
            .trim_matches('/')
            .split_once('/')
            .ok_or_else(|| VaultError::InvalidSecretRef {
                reference: format!("{full_path}:{key}"),
            })?;
        Self::new(mount, path, key)
    }

    pub fn mount(&self) -> &str {
        &self.mount
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// `mount/path`, as used in error messages.
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.mount, self.path)
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.mount, self.path, self.key)
    }
}

/// Value stored under a key, exactly as the store returned it.
#[derive(Clone, PartialEq)]
pub struct SecretValue(serde_json::Value);

impl SecretValue {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// The payload when it is a string, which is the usual case.
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    pub fn expose(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_inner(self) -> serde_json::Value {
        self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue([REDACTED])")
    }
}

/// Reads KV v2 secrets with a session's token.
#[derive(Clone)]
pub struct SecretReader {
    http: VaultHttp,
}

impl SecretReader {
    pub fn new(http: VaultHttp) -> Self {
        Self { http }
    }

    /// Value of `secret.key` in the latest version. Soft-deleted versions are
    /// read as present but empty, so their keys report `KeyNotFound`.
    #[tracing::instrument(skip_all, fields(secret = %secret))]
    pub async fn read(
        &self,
        session: &Session,
        secret: &SecretRef,
    ) -> Result<SecretValue, VaultError> {
        let version = self
            .read_version(session, secret.mount(), secret.path(), None)
            .await?;

        let value = version.data.get(secret.key()).cloned().ok_or_else(|| {
            VaultError::KeyNotFound {
                path: secret.full_path(),
                key: secret.key().to_string(),
            }
        })?;

        tracing::debug!(version = version.metadata.version, "Secret read");
        Ok(SecretValue::new(value))
    }

    /// Whole secret version; `None` for the latest.
    pub async fn read_version(
        &self,
        session: &Session,
        mount: &str,
        path: &str,
        version: Option<u64>,
    ) -> Result<KvData, VaultError> {
        let (mount, path) = check_location(mount, path)?;
        let full_path = format!("{mount}/{path}");

        let mut url = self.http.url(secret_url(&mount, "data", &path))?;
        if let Some(version) = version {
            url.query_pairs_mut()
                .append_pair("version", &version.to_string());
        }

        let response = self.http.get(url, Some(session.token())).await?;

        match response.status {
            _ if response.is_success() => {
                let read: KvReadResponse = response.json()?;
                let data = read.data.ok_or_else(|| {
                    VaultError::invalid_response(response.status, "missing data in KV response")
                })?;
                KvData::try_from(data)
            }
            404 => match soft_deleted(&response) {
                Some(deleted) => {
                    tracing::debug!(
                        path = %full_path,
                        version = deleted.metadata.version,
                        "Reading soft-deleted version"
                    );
                    KvData::try_from(deleted)
                }
                None => Err(VaultError::NotFound { path: full_path }),
            },
            status => Err(classify_read_error(status, full_path, &response)),
        }
    }

    /// Metadata for every version of a secret, oldest first.
    pub async fn read_metadata(
        &self,
        session: &Session,
        mount: &str,
        path: &str,
    ) -> Result<KvMetadata, VaultError> {
        let (mount, path) = check_location(mount, path)?;
        let full_path = format!("{mount}/{path}");

        let url = self.http.url(secret_url(&mount, "metadata", &path))?;
        let response = self.http.get(url, Some(session.token())).await?;

        match response.status {
            _ if response.is_success() => {
                let meta: MetadataResponse = response.json()?;
                KvMetadata::try_from(meta.data)
            }
            404 => Err(VaultError::NotFound { path: full_path }),
            status => Err(classify_read_error(status, full_path, &response)),
        }
    }
}

/// Trimmed `(mount, path)` if every segment names something: no empty
/// inner segments, no `.` or `..`, and a mount of exactly one segment.
fn check_location(mount: &str, path: &str) -> Result<(String, String), VaultError> {
    let mount_trimmed = mount.trim_matches('/');
    let path_trimmed = path.trim_matches('/');

    let valid_segment = |s: &str| !s.is_empty() && s != "." && s != "..";
    if !valid_segment(mount_trimmed)
        || mount_trimmed.contains('/')
        || !path_trimmed.split('/').all(valid_segment)
    {
        return Err(VaultError::InvalidSecretRef {
            reference: format!("{mount}/{path}"),
        });
    }

    Ok((mount_trimmed.to_string(), path_trimmed.to_string()))
}

/// `{mount}/{data|metadata}/{path...}` as URL segments.
fn secret_url<'a>(
    mount: &'a str,
    kind: &'a str,
    path: &'a str,
) -> impl Iterator<Item = &'a str> {
    [mount, kind].into_iter().chain(path.split('/'))
}

/// A 404 body that still describes a version with a deletion time.
fn soft_deleted(response: &VaultResponse) -> Option<KvReadData> {
    response
        .json::<KvReadResponse>()
        .ok()
        .and_then(|r| r.data)
        .filter(|d| d.metadata.is_deleted())
}

fn classify_read_error(status: u16, path: String, response: &VaultResponse) -> VaultError {
    match status {
        403 => VaultError::PermissionDenied { path },
        401 => VaultError::Unauthenticated(response.error_message()),
        _ => response.unexpected(),
    }
}
