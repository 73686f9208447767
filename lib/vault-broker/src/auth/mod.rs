mod approle;
mod token;

use async_trait::async_trait;

use crate::VaultError;
use crate::credential::{Credential, expose};
use crate::http::VaultHttp;
use crate::session::Session;

/// Exchanges credentials for sessions and renews them.
///
/// Implementations never store the sessions they produce; that is the
/// [`TokenCache`](crate::TokenCache)'s job.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Perform a fresh login
    async fn login(&self, credential: &Credential) -> Result<Session, VaultError>;

    /// Renew a leased session via renew-self
    async fn renew(&self, session: &Session) -> Result<Session, VaultError>;
}

/// [`Authenticator`] backed by the Vault HTTP API.
#[derive(Clone)]
pub struct VaultAuthenticator {
    http: VaultHttp,
}

impl VaultAuthenticator {
    pub fn new(http: VaultHttp) -> Self {
        Self { http }
    }

    /// Lightweight "am I authenticated" check for an existing session.
    pub async fn is_authenticated(&self, session: &Session) -> Result<bool, VaultError> {
        match token::lookup_self(&self.http, session.token()).await {
            Ok(()) => Ok(true),
            Err(VaultError::Unauthenticated(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Authenticator for VaultAuthenticator {
    #[tracing::instrument(skip_all, fields(method = credential.method()))]
    async fn login(&self, credential: &Credential) -> Result<Session, VaultError> {
        let session = match credential {
            Credential::StaticToken { token } => {
                let token = expose(token);
                token::lookup_self(&self.http, token).await?;
                Session::static_token(token)
            }
            Credential::AppRole { role_id, secret_id } => {
                approle::login(&self.http, role_id, expose(secret_id)).await?
            }
        };

        tracing::debug!(ttl_seconds = session.ttl_seconds(), "Logged in to Vault");
        Ok(session)
    }

    #[tracing::instrument(skip_all, fields(ttl_seconds = session.ttl_seconds()))]
    async fn renew(&self, session: &Session) -> Result<Session, VaultError> {
        if !session.is_renewable() {
            return Err(VaultError::NotRenewable);
        }

        let renewed = token::renew_self(&self.http, session.token()).await?;
        tracing::debug!(ttl_seconds = renewed.ttl_seconds(), "Token renewed");
        Ok(renewed)
    }
}
