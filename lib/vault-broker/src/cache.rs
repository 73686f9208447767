use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::auth::Authenticator;
use crate::error::{ErrorKind, VaultError};
use crate::session::Session;

/// Holds the current session and renews it on demand.
///
/// Reads share an `RwLock`; renewal runs under a separate mutex so that any
/// number of concurrent callers hitting an expired session cause a single
/// `renew` call. A new session is installed in one write, after the renewal
/// completed, so a dropped future leaves the previous session in place.
pub struct TokenCache {
    authenticator: Arc<dyn Authenticator>,
    session: RwLock<Option<Session>>,
    renewal: Mutex<()>,
}

impl TokenCache {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            session: RwLock::new(None),
            renewal: Mutex::new(()),
        }
    }

    pub fn with_session(authenticator: Arc<dyn Authenticator>, session: Session) -> Self {
        Self {
            authenticator,
            session: RwLock::new(Some(session)),
            renewal: Mutex::new(()),
        }
    }

    /// The cached session if it is still valid, renewing it first if it expired.
    ///
    /// `SessionExpired` means the caller has to log in again and [`update`](Self::update).
    pub async fn current(&self) -> Result<Session, VaultError> {
        let stale = match self.session.read().await.as_ref() {
            None => return Err(VaultError::SessionExpired),
            Some(session) if !session.is_expired() => return Ok(session.clone()),
            Some(session) => session.clone(),
        };

        if !stale.is_renewable() {
            tracing::debug!("Cached session expired and cannot be renewed");
            return Err(VaultError::SessionExpired);
        }

        let _guard = self.renewal.lock().await;

        // Another caller may have renewed while we waited for the lock.
        let stale = match self.session.read().await.as_ref() {
            None => return Err(VaultError::SessionExpired),
            Some(session) if !session.is_expired() => return Ok(session.clone()),
            Some(session) if !session.is_renewable() => return Err(VaultError::SessionExpired),
            Some(session) => session.clone(),
        };

        warn_if_expired(&stale);

        let renewed = match self.authenticator.renew(&stale).await {
            Ok(renewed) => renewed,
            Err(e) if is_rejection(&e) => {
                tracing::warn!(error = %e, "Renewal of expired session rejected, login required");
                return Err(VaultError::SessionExpired);
            }
            Err(e) => return Err(e),
        };

        if renewed.is_expired() {
            tracing::warn!("Store renewed the session with no remaining TTL");
            return Err(VaultError::SessionExpired);
        }

        self.install(&stale, renewed).await
    }

    /// Renew the cached session now, whether or not it is due.
    pub async fn renew_now(&self) -> Result<Session, VaultError> {
        let _guard = self.renewal.lock().await;

        let stale = self
            .session
            .read()
            .await
            .clone()
            .ok_or(VaultError::SessionExpired)?;

        if !stale.is_renewable() {
            return Err(VaultError::NotRenewable);
        }
        warn_if_expired(&stale);

        let renewed = self.authenticator.renew(&stale).await?;
        self.install(&stale, renewed).await
    }

    /// Replace the cached session wholesale, e.g. after a fresh login.
    pub async fn update(&self, session: Session) {
        *self.session.write().await = Some(session);
    }

    /// Drop the cached session; the next `current()` reports `SessionExpired`.
    pub async fn clear(&self) {
        *self.session.write().await = None;
    }

    /// Whether `threshold` of the cached session's lease has elapsed.
    pub async fn needs_renewal(&self, threshold: f64) -> bool {
        self.session
            .read()
            .await
            .as_ref()
            .is_some_and(|s| s.needs_renewal_at(Utc::now(), threshold))
    }

    /// Keep the session renewed in the background.
    ///
    /// Sleeps until `threshold` of the lease has elapsed, renews, repeats. The
    /// task does not retry: it ends with the first error, which the handle returns.
    pub fn spawn_renewal(self: &Arc<Self>, threshold: f64) -> JoinHandle<VaultError> {
        let cache = Arc::clone(self);
        let threshold = if threshold.is_finite() {
            threshold.clamp(0.1, 0.95)
        } else {
            Session::DEFAULT_RENEWAL_THRESHOLD
        };

        tokio::spawn(async move {
            loop {
                let wait = match cache.session.read().await.as_ref() {
                    None => return VaultError::SessionExpired,
                    Some(session) if session.ttl_seconds() == 0 => {
                        return VaultError::SessionExpired;
                    }
                    Some(session) => match session.until_renewal(Utc::now(), threshold) {
                        Some(wait) => wait,
                        None => return VaultError::NotRenewable,
                    },
                };

                tokio::time::sleep(wait).await;

                match cache.renew_now().await {
                    Ok(session) => {
                        tracing::debug!(ttl_seconds = session.ttl_seconds(), "Background renewal done");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Background renewal stopped");
                        return e;
                    }
                }
            }
        })
    }

    /// Install `renewed` unless the session it was derived from has been
    /// replaced meanwhile, in which case the newer session wins.
    async fn install(&self, stale: &Session, renewed: Session) -> Result<Session, VaultError> {
        let mut slot = self.session.write().await;
        if slot.as_ref() == Some(stale) {
            *slot = Some(renewed.clone());
            return Ok(renewed);
        }

        tracing::debug!("Session replaced during renewal, discarding renewed token");
        slot.clone().ok_or(VaultError::SessionExpired)
    }
}

/// Renewing after expiry is a degraded path: the lease may already be gone.
/// Returns whether it was reported.
fn warn_if_expired(stale: &Session) -> bool {
    if !stale.is_expired() {
        return false;
    }
    tracing::warn!(
        expired_at = ?stale.expires_at(),
        "Renewing an already expired session"
    );
    true
}

/// The store refused the renewal itself, as opposed to being unreachable.
fn is_rejection(err: &VaultError) -> bool {
    matches!(
        err.kind(),
        ErrorKind::Unauthenticated
            | ErrorKind::PermissionDenied
            | ErrorKind::InvalidCredential
            | ErrorKind::NotRenewable
    )
}
