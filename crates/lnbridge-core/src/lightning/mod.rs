pub mod backend;
pub mod classify;
pub mod error;
pub mod executor;
pub mod settlement;
pub mod types;

pub use backend::{InvoiceListener, LightningBackend};
pub use error::{LightningError, RemoteError};
pub use executor::{PaymentReply, ResilientExecutor, RetryPolicy};
pub use types::{
    ConnectionResult, CreateInvoiceParams, InvoiceId, InvoiceStatus, LightningChannel,
    LightningInvoice, NodeInfo, OpenChannelRequest, OpenChannelResult, PayDetails, PayResult,
};
