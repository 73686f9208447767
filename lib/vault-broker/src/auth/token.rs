use chrono::Utc;

use crate::VaultError;
use crate::http::VaultHttp;
use crate::models::AuthResponse;
use crate::session::Session;

/// `GET /v1/auth/token/lookup-self`: succeeds only if the store accepts the token.
pub(super) async fn lookup_self(http: &VaultHttp, token: &str) -> Result<(), VaultError> {
    let url = http.url(["auth", "token", "lookup-self"])?;
    let response = http.get(url, Some(token)).await?;

    match response.status {
        _ if response.is_success() => Ok(()),
        401 | 403 => Err(VaultError::Unauthenticated(response.error_message())),
        _ => Err(response.unexpected()),
    }
}

/// `POST /v1/auth/token/renew-self`. The renewed session takes its token from
/// the response, once.
pub(super) async fn renew_self(http: &VaultHttp, token: &str) -> Result<Session, VaultError> {
    let url = http.url(["auth", "token", "renew-self"])?;
    let response = http.post(url, Some(token), &serde_json::json!({})).await?;

    match response.status {
        _ if response.is_success() => {
            let renewed: AuthResponse = response.json()?;
            Ok(Session::leased(
                renewed.auth.client_token,
                renewed.auth.lease_duration,
                renewed.auth.renewable,
                Utc::now(),
            ))
        }
        400 => {
            tracing::debug!(reason = %response.error_message(), "Store refused renewal");
            Err(VaultError::NotRenewable)
        }
        401 | 403 => Err(VaultError::Unauthenticated(response.error_message())),
        _ => Err(response.unexpected()),
    }
}
