use chrono::Utc;
use serde::Serialize;

use crate::VaultError;
use crate::http::VaultHttp;
use crate::models::AuthResponse;
use crate::session::Session;

#[derive(Serialize)]
struct LoginRequest<'a> {
    role_id: &'a str,
    secret_id: &'a str,
}

/// `POST /v1/auth/{mount}/login` with a role id and secret id.
pub(super) async fn login(
    http: &VaultHttp,
    role_id: &str,
    secret_id: &str,
) -> Result<Session, VaultError> {
    // Mounts may be nested, e.g. `ci/approle`.
    let mount = http.config().approle_mount.split('/');
    let url = http.url(std::iter::once("auth").chain(mount).chain(["login"]))?;
    let response = http
        .post(url, None, &LoginRequest { role_id, secret_id })
        .await?;

    match response.status {
        _ if response.is_success() => {
            let login: AuthResponse = response.json()?;
            Ok(Session::leased(
                login.auth.client_token,
                login.auth.lease_duration,
                login.auth.renewable,
                Utc::now(),
            ))
        }
        400 | 401 | 403 => Err(VaultError::InvalidCredential(response.error_message())),
        _ => Err(response.unexpected()),
    }
}
