//! vault-broker - credential broker client for HashiCorp Vault
//!
//! Logs in with a static token or an AppRole role/secret id pair, caches the
//! resulting session, renews it when it expires and reads KV v2 secrets with
//! typed errors.
//!
//! Credential selection from the environment:
//! 1. VAULT_AUTH_METHOD → forced method (`token` or `approle`)
//! 2. VAULT_TOKEN → static token
//! 3. Otherwise → AppRole from VAULT_ROLE_ID / VAULT_SECRET_ID

mod auth;
mod cache;
mod client;
mod config;
mod credential;
mod error;
mod http;
mod models;
mod secret;
mod session;

pub use auth::{Authenticator, VaultAuthenticator};
pub use cache::TokenCache;
pub use client::{VaultClient, VaultClientBuilder};
pub use config::{DEFAULT_APPROLE_MOUNT, DEFAULT_TIMEOUT, VaultConfig};
pub use credential::{Credential, CredentialProvider, EnvCredentialProvider};
pub use error::{ErrorKind, VaultError};
pub use http::VaultHttp;
pub use models::{KvData, KvMetadata, KvVersion};
pub use secret::{SecretReader, SecretRef, SecretValue};
pub use session::Session;
