use crate::lightning::backend::InvoiceListener;
use crate::lightning::error::LightningError;
use crate::lightning::types::{InvoiceId, InvoiceStatus, LightningInvoice};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub async fn wait_for_payment(
    listener: &dyn InvoiceListener,
    id: &InvoiceId,
    timeout_secs: u64,
) -> Result<LightningInvoice, LightningError> {
    let duration = Duration::from_secs(timeout_secs);
    let cancel = CancellationToken::new();
    let result = timeout(duration, async {
        loop {
            let invoice = match listener.wait_invoice(&cancel).await {
                Ok(invoice) => invoice,
                Err(e) => return Err::<LightningInvoice, LightningError>(e),
            };
            if invoice.id == *id && invoice.status == InvoiceStatus::Paid {
                return Ok(invoice);
            }
            debug!("skipping invoice {} ({})", invoice.id, invoice.status);
        }
    })
    .await;

    match result {
        Ok(outcome) => outcome,
        Err(_) => Err(LightningError::StreamError(
            "settlement wait timed out".to_string(),
        )),
    }
}
