use std::collections::HashMap;
use std::path::Path;

use secrecy::{ExposeSecret, SecretString};

use crate::error::VaultError;

pub(crate) const ENV_VAULT_AUTH_METHOD: &str = "VAULT_AUTH_METHOD";
pub(crate) const ENV_VAULT_TOKEN: &str = "VAULT_TOKEN";
pub(crate) const ENV_VAULT_TOKEN_FILE: &str = "VAULT_TOKEN_FILE";
pub(crate) const ENV_VAULT_ROLE_ID: &str = "VAULT_ROLE_ID";
pub(crate) const ENV_VAULT_SECRET_ID: &str = "VAULT_SECRET_ID";
pub(crate) const ENV_VAULT_SECRET_ID_FILE: &str = "VAULT_SECRET_ID_FILE";

/// What the client presents to the store to obtain a session.
///
/// Built once from configuration and never mutated. Secret material is kept in
/// [`SecretString`] so it does not leak through `Debug`.
#[derive(Debug, Clone)]
pub enum Credential {
    StaticToken { token: SecretString },
    AppRole { role_id: String, secret_id: SecretString },
}

impl Credential {
    pub fn static_token(token: impl Into<String>) -> Result<Self, VaultError> {
        let token = non_empty(ENV_VAULT_TOKEN, token.into())?;
        Ok(Self::StaticToken {
            token: SecretString::from(token),
        })
    }

    pub fn app_role(
        role_id: impl Into<String>,
        secret_id: impl Into<String>,
    ) -> Result<Self, VaultError> {
        let role_id = non_empty(ENV_VAULT_ROLE_ID, role_id.into())?;
        let secret_id = non_empty(ENV_VAULT_SECRET_ID, secret_id.into())?;
        Ok(Self::AppRole {
            role_id,
            secret_id: SecretString::from(secret_id),
        })
    }

    /// Auth method name, safe to log.
    pub fn method(&self) -> &'static str {
        match self {
            Self::StaticToken { .. } => "token",
            Self::AppRole { .. } => "approle",
        }
    }
}

fn non_empty(field: &str, value: String) -> Result<String, VaultError> {
    if value.trim().is_empty() {
        Err(VaultError::missing(field))
    } else {
        Ok(value)
    }
}

/// Source of the credential used for login.
pub trait CredentialProvider: Send + Sync {
    fn load(&self) -> Result<Credential, VaultError>;
}

impl CredentialProvider for Credential {
    fn load(&self) -> Result<Credential, VaultError> {
        Ok(self.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Token,
    AppRole,
}

/// Loads a credential from environment variables.
///
/// `VAULT_AUTH_METHOD` (`token` or `approle`) forces a method; otherwise a
/// non-empty `VAULT_TOKEN` wins over AppRole. Secret ids and tokens may also be
/// read from the files named by `VAULT_SECRET_ID_FILE` / `VAULT_TOKEN_FILE`.
pub struct EnvCredentialProvider {
    environ: HashMap<String, String>,
    forced: Option<Method>,
}

impl EnvCredentialProvider {
    /// Create with custom environment (for testing)
    pub fn new(environ: HashMap<String, String>) -> Self {
        Self {
            environ,
            forced: None,
        }
    }

    /// Create with actual OS environment
    pub fn from_env() -> Self {
        Self::new(std::env::vars().collect())
    }

    /// Always load the AppRole pair, ignoring `VAULT_TOKEN` and
    /// `VAULT_AUTH_METHOD`.
    pub fn app_role(mut self) -> Self {
        self.forced = Some(Method::AppRole);
        self
    }

    fn var(&self, name: &str) -> Option<&str> {
        self.environ
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn method(&self) -> Result<Method, VaultError> {
        if let Some(forced) = self.forced {
            return Ok(forced);
        }
        match self.var(ENV_VAULT_AUTH_METHOD) {
            Some(m) if m.eq_ignore_ascii_case("token") => Ok(Method::Token),
            Some(m) if m.eq_ignore_ascii_case("approle") => Ok(Method::AppRole),
            Some(other) => Err(VaultError::InvalidConfig(format!(
                "unknown {ENV_VAULT_AUTH_METHOD} {other:?}, expected \"token\" or \"approle\""
            ))),
            None if self.var(ENV_VAULT_TOKEN).is_some() => Ok(Method::Token),
            None => Ok(Method::AppRole),
        }
    }

    /// Value of `name`, or the trimmed contents of the file named by `file_var`.
    fn value_or_file(&self, name: &str, file_var: &str) -> Result<String, VaultError> {
        if let Some(value) = self.var(name) {
            return Ok(value.to_string());
        }
        match self.var(file_var) {
            Some(path) => read_credential_file(file_var, Path::new(path)),
            None => Err(VaultError::missing(name)),
        }
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn load(&self) -> Result<Credential, VaultError> {
        match self.method()? {
            Method::Token => {
                Credential::static_token(self.value_or_file(ENV_VAULT_TOKEN, ENV_VAULT_TOKEN_FILE)?)
            }
            Method::AppRole => {
                let role_id = self
                    .var(ENV_VAULT_ROLE_ID)
                    .ok_or_else(|| VaultError::missing(ENV_VAULT_ROLE_ID))?;
                let secret_id =
                    self.value_or_file(ENV_VAULT_SECRET_ID, ENV_VAULT_SECRET_ID_FILE)?;
                Credential::app_role(role_id, secret_id)
            }
        }
    }
}

fn read_credential_file(field: &str, path: &Path) -> Result<String, VaultError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Failed to read credential file");
        VaultError::missing(field)
    })?;
    non_empty(field, contents.trim().to_string())
}

/// Exposes secret material where a request body needs it.
pub(crate) fn expose(secret: &SecretString) -> &str {
    secret.expose_secret()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn provider(pairs: &[(&str, &str)]) -> EnvCredentialProvider {
        EnvCredentialProvider::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_app_role_rejects_empty_role_id() {
        let err = Credential::app_role("", "secret").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredential);
        assert!(err.to_string().contains("VAULT_ROLE_ID"));
    }

    #[test]
    fn test_app_role_rejects_blank_secret_id() {
        let err = Credential::app_role("role", "   ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredential);
        assert!(err.to_string().contains("VAULT_SECRET_ID"));
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let cred = Credential::app_role("my-role", "super-secret-id").unwrap();
        let debug = format!("{cred:?}");
        assert!(debug.contains("my-role"));
        assert!(!debug.contains("super-secret-id"));

        let cred = Credential::static_token("hvs.root-token").unwrap();
        assert!(!format!("{cred:?}").contains("hvs.root-token"));
    }

    #[test]
    fn test_loads_app_role() {
        let cred = provider(&[("VAULT_ROLE_ID", "role"), ("VAULT_SECRET_ID", "secret")])
            .load()
            .unwrap();
        match cred {
            Credential::AppRole { role_id, secret_id } => {
                assert_eq!(role_id, "role");
                assert_eq!(expose(&secret_id), "secret");
            }
            other => panic!("expected AppRole, got {other:?}"),
        }
    }

    #[test]
    fn test_token_wins_without_explicit_method() {
        let cred = provider(&[
            ("VAULT_TOKEN", "myroot"),
            ("VAULT_ROLE_ID", "role"),
            ("VAULT_SECRET_ID", "secret"),
        ])
        .load()
        .unwrap();
        assert_eq!(cred.method(), "token");
    }

    #[test]
    fn test_explicit_method_overrides_token() {
        let cred = provider(&[
            ("VAULT_AUTH_METHOD", "AppRole"),
            ("VAULT_TOKEN", "myroot"),
            ("VAULT_ROLE_ID", "role"),
            ("VAULT_SECRET_ID", "secret"),
        ])
        .load()
        .unwrap();
        assert_eq!(cred.method(), "approle");
    }

    #[test]
    fn test_forced_app_role_ignores_token() {
        let cred = provider(&[
            ("VAULT_AUTH_METHOD", "token"),
            ("VAULT_TOKEN", "myroot"),
            ("VAULT_ROLE_ID", "role"),
            ("VAULT_SECRET_ID", "secret"),
        ])
        .app_role()
        .load()
        .unwrap();
        assert_eq!(cred.method(), "approle");

        let err = provider(&[("VAULT_TOKEN", "myroot")])
            .app_role()
            .load()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredential);
        assert!(err.to_string().contains("VAULT_ROLE_ID"));
    }

    #[test]
    fn test_unknown_method() {
        let err = provider(&[("VAULT_AUTH_METHOD", "kubernetes")])
            .load()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_missing_secret_id() {
        let err = provider(&[("VAULT_ROLE_ID", "role")]).load().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredential);
        assert!(err.to_string().contains("VAULT_SECRET_ID"));
    }

    #[test]
    fn test_empty_token_falls_back_to_app_role() {
        let err = provider(&[("VAULT_TOKEN", ""), ("VAULT_SECRET_ID", "secret")])
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("VAULT_ROLE_ID"));
    }

    #[test]
    fn test_explicit_token_method_requires_token() {
        let err = provider(&[("VAULT_AUTH_METHOD", "token")])
            .load()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredential);
        assert!(err.to_string().contains("VAULT_TOKEN"));
    }

    #[test]
    fn test_secret_id_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "secret-from-file").unwrap();

        let cred = provider(&[
            ("VAULT_ROLE_ID", "role"),
            ("VAULT_SECRET_ID_FILE", file.path().to_str().unwrap()),
        ])
        .load()
        .unwrap();

        match cred {
            Credential::AppRole { secret_id, .. } => {
                assert_eq!(expose(&secret_id), "secret-from-file")
            }
            other => panic!("expected AppRole, got {other:?}"),
        }
    }

    #[test]
    fn test_token_file_missing() {
        let err = provider(&[
            ("VAULT_AUTH_METHOD", "token"),
            ("VAULT_TOKEN_FILE", "/nonexistent/path"),
        ])
        .load()
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredential);
        assert!(err.to_string().contains("VAULT_TOKEN_FILE"));
    }

    #[test]
    fn test_empty_credential_file() {
        let file = NamedTempFile::new().unwrap();
        let err = provider(&[
            ("VAULT_ROLE_ID", "role"),
            ("VAULT_SECRET_ID_FILE", file.path().to_str().unwrap()),
        ])
        .load()
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredential);
    }
}
