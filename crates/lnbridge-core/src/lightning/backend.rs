use crate::lightning::error::LightningError;
use crate::lightning::types::{
    ConnectionResult, CreateInvoiceParams, InvoiceId, LightningChannel, LightningInvoice,
    NodeInfo, OpenChannelRequest, OpenChannelResult, PayResult,
};
use ln_types::P2PAddress;
use tokio_util::sync::CancellationToken;

/// Consumer side of an invoice notification stream.
///
/// Invoices are delivered in the order the node reported them. Once the
/// stream has terminated every further call fails: with
/// [`LightningError::Cancelled`] after a cancellation or a clean close, or
/// with the exact failure that ended the stream.
#[async_trait::async_trait]
pub trait InvoiceListener: Send + Sync {
    /// Waits for the next invoice. Firing `cancel` aborts only this wait.
    async fn wait_invoice(
        &self,
        cancel: &CancellationToken,
    ) -> Result<LightningInvoice, LightningError>;

    /// Stops the stream and waits for its reader to exit. Idempotent.
    async fn release(&self);
}

#[async_trait::async_trait]
pub trait LightningBackend: Send + Sync + 'static {
    async fn create_invoice(
        &self,
        params: CreateInvoiceParams,
    ) -> Result<LightningInvoice, LightningError>;

    async fn get_invoice(
        &self,
        id: &InvoiceId,
    ) -> Result<Option<LightningInvoice>, LightningError>;

    async fn cancel_invoice(&self, id: &InvoiceId) -> Result<(), LightningError>;

    async fn pay(&self, payment_request: &str) -> Result<PayResult, LightningError>;

    async fn open_channel(
        &self,
        request: OpenChannelRequest,
    ) -> Result<OpenChannelResult, LightningError>;

    async fn list_channels(&self) -> Result<Vec<LightningChannel>, LightningError>;

    async fn get_info(&self) -> Result<NodeInfo, LightningError>;

    async fn get_deposit_address(&self) -> Result<String, LightningError>;

    async fn connect_to(&self, address: &P2PAddress) -> Result<ConnectionResult, LightningError>;

    async fn listen(&self) -> Result<Box<dyn InvoiceListener>, LightningError>;
}
