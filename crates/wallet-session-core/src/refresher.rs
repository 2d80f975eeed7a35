use std::sync::Arc;

use crate::domain::{Account, ChainId, ErrorOrigin};
use crate::ports::{PortError, ProviderPort};
use crate::store::SessionStore;

/// Re-reads balance and chain id for the primary account and publishes them
/// together with the account set, or not at all.
pub struct BalanceRefresher<P: ?Sized> {
    provider: Arc<P>,
    store: SessionStore,
}

impl<P: ?Sized> Clone for BalanceRefresher<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            store: self.store.clone(),
        }
    }
}

impl<P: ProviderPort + ?Sized> BalanceRefresher<P> {
    pub fn new(provider: Arc<P>, store: SessionStore) -> Self {
        Self { provider, store }
    }

    /// `Ok(false)` means both reads succeeded but the session was torn down meanwhile.
    pub async fn refresh(&self, accounts: Vec<Account>) -> Result<bool, PortError> {
        let primary = accounts
            .first()
            .cloned()
            .ok_or_else(|| PortError::Validation("refresh requires a primary account".to_owned()))?;

        match self.read(&primary).await {
            Ok((balance, chain_id)) => {
                let published = self.store.publish_snapshot(accounts, balance, chain_id);
                if published {
                    tracing::debug!(account = %primary, "wallet snapshot refreshed");
                }
                Ok(published)
            }
            Err(e) => {
                tracing::warn!(account = %primary, error = %e, "wallet refresh failed");
                self.store.record_error(ErrorOrigin::Refresh, e.provider_message());
                Err(e)
            }
        }
    }

    async fn read(&self, primary: &Account) -> Result<(String, ChainId), PortError> {
        let balance = self.provider.balance_of(primary).await?;
        let chain_id = self.provider.chain_id().await?;
        Ok((balance, chain_id))
    }
}
