//! JWT access-token validator with a background-refreshed key set.
//!
//! Grounded on `auth/validator.go`'s `TokenValidator`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("key set has not been fetched yet")]
    KeySetNotFound,

    #[error("token type is not access-token")]
    InvalidTokenType,

    #[error("token validation failed: {0}")]
    Invalid(String),

    #[error("key set refresh failed: {0}")]
    RefreshFailed(String),
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub exp: u64,
    #[serde(rename = "type")]
    pub token_type: String,
}

pub type RefreshFuture = Pin<Box<dyn Future<Output = Result<Vec<DecodingKey>, ValidatorError>> + Send>>;
pub type RefreshFn = Arc<dyn Fn() -> RefreshFuture + Send + Sync>;

pub struct ValidatorConfig {
    pub issuer: String,
    pub refresh_fn: RefreshFn,
}

struct KeySet {
    keys: Vec<DecodingKey>,
}

/// Validates access tokens against a key set fetched via `refresh_fn` and
/// refreshed on demand through `run`, mirroring the original's
/// `keySetExpired` channel handshake.
pub struct TokenValidator {
    config: ValidatorConfig,
    key_set: RwLock<Option<KeySet>>,
    expired_tx: mpsc::Sender<()>,
    expired_rx: tokio::sync::Mutex<Option<mpsc::Receiver<()>>>,
}

impl TokenValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        let (expired_tx, expired_rx) = mpsc::channel(1);
        Self { config, key_set: RwLock::new(None), expired_tx, expired_rx: tokio::sync::Mutex::new(Some(expired_rx)) }
    }

    /// Triggers the initial key-set fetch, then loops refreshing whenever
    /// `verify` signals the set is missing, until `cancel` fires. Returns an
    /// error (without retrying) if a fetch fails, matching the original.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ValidatorError> {
        self.fetch_key_set().await?;

        let Some(mut expired) = self.expired_rx.lock().await.take() else {
            return Ok(());
        };

        loop {
            tokio::select! {
                signal = expired.recv() => match signal {
                    Some(()) => self.fetch_key_set().await?,
                    None => return Ok(()),
                },
                _ = cancel.cancelled() => return Ok(()),
            }
        }
    }

    async fn fetch_key_set(&self) -> Result<(), ValidatorError> {
        let keys = (self.config.refresh_fn)().await?;
        *self.key_set.write().await = Some(KeySet { keys });
        Ok(())
    }

    /// Verifies `token` against the current key set, validating issuer,
    /// expiry, and that `type == "access-token"`. Signals a refresh (without
    /// blocking on it) and fails immediately if the key set was never
    /// fetched, matching `keySetProvider`'s non-blocking contract.
    pub async fn verify(&self, token: &str) -> Result<Claims, ValidatorError> {
        let guard = self.key_set.read().await;
        let Some(key_set) = guard.as_ref() else {
            let _ = self.expired_tx.try_send(());
            return Err(ValidatorError::KeySetNotFound);
        };

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(std::slice::from_ref(&self.config.issuer));

        let mut last_err = None;
        for key in &key_set.keys {
            match decode::<Claims>(token, key, &validation) {
                Ok(data) => {
                    if data.claims.token_type != "access-token" {
                        return Err(ValidatorError::InvalidTokenType);
                    }
                    return Ok(data.claims);
                }
                Err(err) => last_err = Some(err),
            }
        }

        Err(ValidatorError::Invalid(last_err.map(|e| e.to_string()).unwrap_or_else(|| "no keys in key set".to_string())))
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
