use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};

/// Authenticated token plus its validity window.
///
/// Sessions are never mutated; renewal produces a new one.
#[derive(Clone)]
pub struct Session {
    token: SecretString,
    ttl_seconds: i64,
    issued_at: DateTime<Utc>,
    renewable: bool,
}

impl Session {
    /// TTL of a static-token session: unknown, never expires, never renewed.
    pub const NON_EXPIRING_TTL: i64 = -1;

    /// Fraction of the lease after which renewal is due, used when a caller
    /// passes a threshold that is not a finite number.
    pub const DEFAULT_RENEWAL_THRESHOLD: f64 = 0.75;

    /// Session for a static token.
    pub fn static_token(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            ttl_seconds: Self::NON_EXPIRING_TTL,
            issued_at: Utc::now(),
            renewable: false,
        }
    }

    /// Session with a store-issued lease. A zero TTL is expired on arrival.
    pub fn leased(
        token: impl Into<String>,
        ttl_seconds: u64,
        renewable: bool,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token: SecretString::from(token.into()),
            ttl_seconds: i64::try_from(ttl_seconds).unwrap_or(i64::MAX),
            issued_at,
            renewable,
        }
    }

    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Whether `renew` may be attempted: a leased session the store marked renewable.
    pub fn is_renewable(&self) -> bool {
        self.ttl_seconds >= 0 && self.renewable
    }

    /// `None` for static-token sessions.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if self.ttl_seconds < 0 {
            return None;
        }
        let expiry = TimeDelta::try_seconds(self.ttl_seconds)
            .and_then(|ttl| self.issued_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Some(expiry)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// True once `threshold` (0..1) of the lease has elapsed.
    pub fn needs_renewal_at(&self, now: DateTime<Utc>, threshold: f64) -> bool {
        self.until_renewal(now, threshold)
            .is_some_and(|wait| wait.is_zero())
    }

    /// Time left before `threshold` of the lease has elapsed; `None` if the
    /// session cannot be renewed.
    pub fn until_renewal(&self, now: DateTime<Utc>, threshold: f64) -> Option<Duration> {
        if !self.is_renewable() {
            return None;
        }
        let lease = Duration::from_secs(self.ttl_seconds.unsigned_abs());
        let threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            Self::DEFAULT_RENEWAL_THRESHOLD
        };
        let renew_after = lease.mul_f64(threshold);
        let elapsed = (now - self.issued_at).to_std().unwrap_or(Duration::ZERO);
        Some(renew_after.saturating_sub(elapsed))
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.token.expose_secret() == other.token.expose_secret()
            && self.ttl_seconds == other.ttl_seconds
            && self.issued_at == other.issued_at
            && self.renewable == other.renewable
    }
}

impl Eq for Session {}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("ttl_seconds", &self.ttl_seconds)
            .field("issued_at", &self.issued_at)
            .field("renewable", &self.renewable)
            .finish()
    }
}
