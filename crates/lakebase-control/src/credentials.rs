//! Cached short-lived database credentials.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{error, info};

use crate::client::ControlPlane;

/// Lifetime assumed for a freshly minted token. Shorter than the vendor's.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(55 * 60);

/// A cached token is not reused once it is this close to expiry.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CachedToken {
    endpoint_name: String,
    token: String,
    expires_at: Instant,
}

/// Supplies bearer tokens usable as the database password for an endpoint.
///
/// Holds a single cached token, keyed by the endpoint it was minted for.
/// Concurrent callers may both mint on a miss; the last one wins the slot.
pub struct CredentialProvider {
    control_plane: Arc<dyn ControlPlane>,
    cached: Mutex<Option<CachedToken>>,
    lifetime: Duration,
    refresh_margin: Duration,
}

impl CredentialProvider {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self {
            control_plane,
            cached: Mutex::new(None),
            lifetime: DEFAULT_TOKEN_LIFETIME,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
        }
    }

    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    #[must_use]
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Returns a token for `endpoint_name`, minting one if the cache misses.
    ///
    /// Returns `None` when the endpoint name is empty or minting fails. A
    /// missing token means "use the statically configured password".
    pub async fn get_token(&self, endpoint_name: &str, force_refresh: bool) -> Option<String> {
        if endpoint_name.is_empty() {
            return None;
        }

        if !force_refresh && let Some(token) = self.cached_token(endpoint_name) {
            return Some(token);
        }

        info!(endpoint = endpoint_name, "generating_oauth_token");
        match self
            .control_plane
            .generate_database_credential(endpoint_name)
            .await
        {
            Ok(credential) if !credential.token.is_empty() => {
                *self.cached.lock() = Some(CachedToken {
                    endpoint_name: endpoint_name.to_string(),
                    token: credential.token.clone(),
                    expires_at: Instant::now() + self.lifetime,
                });
                Some(credential.token)
            }
            Ok(_) => {
                error!(endpoint = endpoint_name, "oauth_token_generation_returned_empty_token");
                None
            }
            Err(e) => {
                error!(
                    endpoint = endpoint_name,
                    error = %e,
                    category = %e.category(),
                    "oauth_token_generation_failed"
                );
                None
            }
        }
    }

    /// Drops the cached token.
    pub fn invalidate(&self) {
        *self.cached.lock() = None;
    }

    fn cached_token(&self, endpoint_name: &str) -> Option<String> {
        let guard = self.cached.lock();
        let cached = guard.as_ref()?;
        let fresh = Instant::now() + self.refresh_margin < cached.expires_at;
        (cached.endpoint_name == endpoint_name && fresh).then(|| cached.token.clone())
    }
}
