use std::io::Write;

use anyhow::Context;
use vault_broker::{ErrorKind, SecretRef, SecretValue, VaultClientBuilder, VaultError};

use crate::cli::Command;

pub async fn execute(
    command: &Command,
    builder: VaultClientBuilder,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Command::Get { path, key } => get(builder, path, key, out).await,
        Command::Renew => renew(builder, out).await,
        Command::Status => status(builder, out).await,
    }
}

async fn get(
    builder: VaultClientBuilder,
    path: &str,
    key: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    // A malformed reference is reported before logging in.
    let secret = SecretRef::parse(path, key)?;
    let client = builder.build().await?;

    let value = client
        .read(&secret)
        .await
        .with_context(|| format!("Failed to read {secret}"))?;

    writeln!(out, "Retrieved value for {}: {}", key, display_value(&value))?;
    Ok(())
}

async fn renew(builder: VaultClientBuilder, out: &mut impl Write) -> anyhow::Result<()> {
    // Static tokens are never renewable; renewal always starts from an AppRole login.
    let client = builder.app_role_only().build().await?;
    tracing::info!(addr = %client.config().base_url, "Successfully authenticated to Vault");

    let session = client.renew().await.context("Failed to renew token")?;
    writeln!(
        out,
        "Token renewed successfully. New TTL: {} seconds.",
        session.ttl_seconds()
    )?;
    Ok(())
}

async fn status(builder: VaultClientBuilder, out: &mut impl Write) -> anyhow::Result<()> {
    let client = builder.build().await?;

    if !client.is_authenticated().await? {
        return Err(VaultError::Unauthenticated("token lookup was rejected".to_string()).into());
    }

    writeln!(
        out,
        "Successfully authenticated to Vault at {}",
        client.config().base_url.as_str().trim_end_matches('/')
    )?;
    Ok(())
}

/// Strings print bare, anything else as compact JSON.
fn display_value(value: &SecretValue) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.expose().to_string(),
    }
}

/// One-line advice for the operator, chosen by what went wrong.
pub fn hint_for(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::MissingCredential => {
            "Please set VAULT_TOKEN, or the VAULT_ROLE_ID and VAULT_SECRET_ID environment variables."
        }
        ErrorKind::InvalidCredential => "Check your VAULT_ROLE_ID and VAULT_SECRET_ID values.",
        ErrorKind::Unauthenticated => "Vault client is not authenticated. Check `VAULT_TOKEN` value.",
        ErrorKind::PermissionDenied => {
            "Access denied when retrieving secret. Check your client's permissions."
        }
        ErrorKind::NotFound | ErrorKind::KeyNotFound => {
            "Error retrieving secret. Ensure the path and key are correct."
        }
        ErrorKind::NotRenewable => {
            "The token is not renewable. Renewal needs an AppRole login with a renewable token."
        }
        ErrorKind::SessionExpired => "The Vault token expired. Log in again.",
        ErrorKind::ConnectionFailure | ErrorKind::Timeout => {
            "Could not reach Vault. Check VAULT_ADDR and that the server is up."
        }
        ErrorKind::InvalidSecretRef => "Secret paths look like <mount>/<path>, e.g. demo/API.",
        ErrorKind::InvalidConfig => "Check VAULT_ADDR, VAULT_TIMEOUT_SECS and VAULT_APPROLE_MOUNT.",
        ErrorKind::InvalidResponse => "Vault returned an unexpected response.",
    }
}

/// Hint and details for a failed command.
pub fn report(err: &anyhow::Error) -> String {
    match err.downcast_ref::<VaultError>() {
        Some(vault_err) => format!("{}\nDetails: {:#}", hint_for(vault_err.kind()), err),
        None => format!("An unexpected error occurred: {err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use vault_broker::Credential;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn approle_builder(uri: &str) -> VaultClientBuilder {
        VaultClientBuilder::new()
            .base_url(uri)
            .credential(Credential::app_role("demo-role", "demo-secret").unwrap())
    }

    async fn mount_login(mock_server: &MockServer, lease_duration: u64) {
        Mock::given(method("POST"))
            .and(path("/v1/auth/approle/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "auth": {
                    "client_token": "hvs.cli",
                    "lease_duration": lease_duration,
                    "renewable": true
                }
            })))
            .mount(mock_server)
            .await;
    }

    async fn run(command: Command, builder: VaultClientBuilder) -> (anyhow::Result<()>, String) {
        let mut out = Vec::new();
        let result = execute(&command, builder, &mut out).await;
        (result, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_get_prints_value() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server, 3600).await;

        Mock::given(method("GET"))
            .and(path("/v1/demo/data/API"))
            .and(header("X-Vault-Token", "hvs.cli"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "data": {"mysecret": "s3cr3t", "port": 5432},
                    "metadata": {
                        "created_time": "2024-01-01T00:00:00Z",
                        "deletion_time": "",
                        "destroyed": false,
                        "version": 1
                    }
                }
            })))
            .mount(&mock_server)
            .await;

        let get = |key: &str| Command::Get {
            path: "demo/API".to_string(),
            key: key.to_string(),
        };

        let (result, out) = run(get("mysecret"), approle_builder(&mock_server.uri())).await;
        result.unwrap();
        assert_eq!(out, "Retrieved value for mysecret: s3cr3t\n");

        let (result, out) = run(get("port"), approle_builder(&mock_server.uri())).await;
        result.unwrap();
        assert_eq!(out, "Retrieved value for port: 5432\n");
    }

    #[tokio::test]
    async fn test_get_rejects_bad_path_before_login() {
        let mock_server = MockServer::start().await;

        let command = Command::Get {
            path: "API".to_string(),
            key: "mysecret".to_string(),
        };
        let (result, out) = run(command, approle_builder(&mock_server.uri())).await;

        let err = result.unwrap_err();
        assert!(out.is_empty());
        assert!(report(&err).starts_with(hint_for(ErrorKind::InvalidSecretRef)));
        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_renew_prints_ttl() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server, 60).await;

        Mock::given(method("POST"))
            .and(path("/v1/auth/token/renew-self"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "auth": {
                    "client_token": "hvs.cli",
                    "lease_duration": 7200,
                    "renewable": true
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (result, out) = run(Command::Renew, approle_builder(&mock_server.uri())).await;
        result.unwrap();
        assert_eq!(out, "Token renewed successfully. New TTL: 7200 seconds.\n");
    }

    #[tokio::test]
    async fn test_renew_logs_in_with_app_role_even_with_token_set() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/auth/approle/login"))
            .and(body_json(serde_json::json!({
                "role_id": "env-role",
                "secret_id": "env-secret"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "auth": {
                    "client_token": "hvs.approle",
                    "lease_duration": 60,
                    "renewable": true
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/auth/token/renew-self"))
            .and(header("X-Vault-Token", "hvs.approle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "auth": {
                    "client_token": "hvs.approle",
                    "lease_duration": 3600,
                    "renewable": true
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/auth/token/lookup-self"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let environ: HashMap<String, String> = [
            ("VAULT_TOKEN", "myroot"),
            ("VAULT_ROLE_ID", "env-role"),
            ("VAULT_SECRET_ID", "env-secret"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let builder = VaultClientBuilder::new()
            .base_url(mock_server.uri())
            .environ(environ);

        let (result, out) = run(Command::Renew, builder).await;
        result.unwrap();
        assert_eq!(out, "Token renewed successfully. New TTL: 3600 seconds.\n");
    }

    #[tokio::test]
    async fn test_renew_without_app_role_reports_missing_credential() {
        let mock_server = MockServer::start().await;

        let environ = HashMap::from([("VAULT_TOKEN".to_string(), "myroot".to_string())]);
        let builder = VaultClientBuilder::new()
            .base_url(mock_server.uri())
            .environ(environ);

        let (result, out) = run(Command::Renew, builder).await;
        let message = report(&result.unwrap_err());

        assert!(out.is_empty());
        assert!(message.starts_with(hint_for(ErrorKind::MissingCredential)));
        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_reports_address() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server, 3600).await;

        Mock::given(method("GET"))
            .and(path("/v1/auth/token/lookup-self"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"id": "hvs.cli"}
            })))
            .mount(&mock_server)
            .await;

        let (result, out) = run(Command::Status, approle_builder(&mock_server.uri())).await;
        result.unwrap();
        assert_eq!(
            out,
            format!("Successfully authenticated to Vault at {}\n", mock_server.uri())
        );
    }

    #[tokio::test]
    async fn test_bad_login_reports_credential_hint() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/auth/approle/login"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "errors": ["invalid role or secret ID"]
            })))
            .mount(&mock_server)
            .await;

        let (result, _) = run(Command::Status, approle_builder(&mock_server.uri())).await;
        let message = report(&result.unwrap_err());

        assert!(message.starts_with("Check your VAULT_ROLE_ID and VAULT_SECRET_ID values."));
        assert!(message.contains("invalid role or secret ID"));
    }

    #[test]
    fn test_report_keeps_hint_through_context() {
        let err = anyhow::Error::from(VaultError::KeyNotFound {
            path: "demo/API".to_string(),
            key: "missing".to_string(),
        })
        .context("Failed to read demo/API:missing");

        let message = report(&err);
        assert!(message.starts_with(hint_for(ErrorKind::KeyNotFound)));
        assert!(message.contains("Failed to read demo/API:missing"));
    }

    #[test]
    fn test_report_unexpected() {
        let err = anyhow::anyhow!("disk on fire");
        assert_eq!(report(&err), "An unexpected error occurred: disk on fire");
    }
}
