use std::time::Duration;

use clap::{Parser, Subcommand};
use vault_broker::VaultClientBuilder;

#[derive(Parser, Debug)]
#[command(name = "vault-fetch", version, about = "Read secrets from a Vault KV v2 store")]
pub struct Cli {
    /// Vault server address
    #[arg(long, env = "VAULT_ADDR", default_value = "http://localhost:8200")]
    pub addr: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "VAULT_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Mount point of the AppRole auth method
    #[arg(long, env = "VAULT_APPROLE_MOUNT", default_value = "approle")]
    pub approle_mount: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Print one key of a secret, e.g. `get demo/API mysecret`
    Get {
        /// Secret path including the mount
        path: String,
        /// Key inside the secret
        key: String,
    },
    /// Log in with AppRole and renew the token
    Renew,
    /// Check that the credentials authenticate
    Status,
}

impl Cli {
    /// Client builder carrying the connection flags. Credentials still come
    /// from the environment.
    pub fn client_builder(&self) -> VaultClientBuilder {
        VaultClientBuilder::new()
            .base_url(self.addr.clone())
            .timeout(Duration::from_secs(self.timeout_secs))
            .approle_mount(self.approle_mount.clone())
            .application_name(env!("CARGO_PKG_NAME"))
    }
}
