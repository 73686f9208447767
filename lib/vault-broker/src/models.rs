use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::VaultError;

/// KV v2 secret data with version metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvData {
    pub data: HashMap<String, serde_json::Value>,
    pub metadata: KvVersion,
}

/// Version information for a secret
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvVersion {
    pub version: u64,
    pub created_time: DateTime<Utc>,
    #[serde(default)]
    pub deletion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub destroyed: bool,
}

impl KvVersion {
    /// Soft-deleted: the version still exists and can be undeleted.
    pub fn is_deleted(&self) -> bool {
        self.deletion_time.is_some()
    }
}

/// Full metadata for a secret including all versions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvMetadata {
    pub created_time: DateTime<Utc>,
    #[serde(default)]
    pub custom_metadata: Option<HashMap<String, String>>,
    pub versions: Vec<KvVersion>,
}

// Wire shapes below mirror the Vault HTTP API and stay private to the crate.

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    pub auth: AuthData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthData {
    pub client_token: String,
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KvReadResponse {
    pub data: Option<KvReadData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KvReadData {
    /// `null` for deleted or destroyed versions.
    #[serde(default)]
    pub data: Option<HashMap<String, serde_json::Value>>,
    pub metadata: KvVersionResponse,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KvVersionResponse {
    pub version: u64,
    pub created_time: String,
    #[serde(default)]
    pub deletion_time: Option<String>,
    #[serde(default)]
    pub destroyed: bool,
}

impl KvVersionResponse {
    pub fn is_deleted(&self) -> bool {
        self.deletion_time
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetadataResponse {
    pub data: MetadataData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetadataData {
    pub created_time: String,
    #[serde(default)]
    pub custom_metadata: Option<HashMap<String, String>>,
    pub versions: HashMap<String, VersionInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VersionInfo {
    pub created_time: String,
    #[serde(default)]
    pub deletion_time: Option<String>,
    #[serde(default)]
    pub destroyed: bool,
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, VaultError> {
    raw.parse()
        .map_err(|e| VaultError::invalid_response(200, format!("invalid timestamp {raw:?}: {e}")))
}

/// Vault sends `""` for "not deleted".
fn parse_optional_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.filter(|s| !s.is_empty()).and_then(|s| s.parse().ok())
}

impl TryFrom<KvReadData> for KvData {
    type Error = VaultError;

    fn try_from(read: KvReadData) -> Result<Self, Self::Error> {
        Ok(KvData {
            data: read.data.unwrap_or_default(),
            metadata: KvVersion {
                version: read.metadata.version,
                created_time: parse_timestamp(&read.metadata.created_time)?,
                deletion_time: parse_optional_timestamp(read.metadata.deletion_time.as_deref()),
                destroyed: read.metadata.destroyed,
            },
        })
    }
}

impl TryFrom<MetadataData> for KvMetadata {
    type Error = VaultError;

    fn try_from(meta: MetadataData) -> Result<Self, Self::Error> {
        let mut versions: Vec<KvVersion> = meta
            .versions
            .into_iter()
            .map(|(version_str, info)| {
                Ok(KvVersion {
                    version: version_str.parse().map_err(|_| {
                        VaultError::invalid_response(200, format!("invalid version {version_str:?}"))
                    })?,
                    created_time: parse_timestamp(&info.created_time)?,
                    deletion_time: parse_optional_timestamp(info.deletion_time.as_deref()),
                    destroyed: info.destroyed,
                })
            })
            .collect::<Result<Vec<_>, VaultError>>()?;

        versions.sort_by_key(|v| v.version);

        Ok(KvMetadata {
            created_time: parse_timestamp(&meta.created_time)?,
            custom_metadata: meta.custom_metadata,
            versions,
        })
    }
}
