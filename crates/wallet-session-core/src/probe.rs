use crate::domain::ProviderAvailability;
use crate::ports::ProviderPort;

/// One-shot, non-prompting provider detection. A failing probe counts as absent.
pub async fn detect<P: ProviderPort + ?Sized>(provider: &P) -> ProviderAvailability {
    match provider.is_available().await {
        Ok(true) => ProviderAvailability::Present,
        Ok(false) => ProviderAvailability::Absent,
        Err(e) => {
            tracing::debug!(error = %e, "provider probe failed; treating as absent");
            ProviderAvailability::Absent
        }
    }
}
