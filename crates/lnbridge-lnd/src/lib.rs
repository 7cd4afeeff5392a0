pub mod config;
pub mod mapper;
pub mod rest;
pub mod session;
pub mod wire;

use chrono::Utc;
use ln_types::P2PAddress;
use lnbridge_core::lightning::backend::{InvoiceListener, LightningBackend};
use lnbridge_core::lightning::error::LightningError;
use lnbridge_core::lightning::executor::ResilientExecutor;
use lnbridge_core::lightning::types::{
    ConnectionResult, CreateInvoiceParams, InvoiceId, InvoiceStatus, LightningChannel,
    LightningInvoice, NodeInfo, OpenChannelRequest, OpenChannelResult, PayResult,
};
use serde_json::{json, Value};
use tracing::{info, warn};

pub use config::LndConfig;
pub use session::InvoiceSession;

use crate::rest::LndRestClient;
use crate::wire::{
    encode_bytes, AddInvoiceResponse, GetInfoResponse, ListChannelsResponse, LndInvoice,
    NewAddressResponse, PendingChannelsResponse, SendResponse,
};

const SUBSCRIBE_INVOICES_PATH: &str = "/v1/invoices/subscribe";

pub struct LndBackend {
    rest: LndRestClient,
    executor: ResilientExecutor,
}

impl LndBackend {
    pub fn new(config: LndConfig) -> Result<Self, LightningError> {
        let rest = LndRestClient::new(&config)?;
        Ok(LndBackend {
            rest,
            executor: ResilientExecutor::new(config.retry),
        })
    }

    pub async fn connect(config: LndConfig) -> Result<Self, LightningError> {
        let backend = Self::new(config)?;
        backend.check_connectivity().await?;
        Ok(backend)
    }

    pub async fn check_connectivity(&self) -> Result<(), LightningError> {
        let info: GetInfoResponse = self.rest.get("/v1/getinfo").await?;
        info!(
            "connected to lnd node {} at height {}",
            info.identity_pubkey, info.block_height
        );
        Ok(())
    }

    pub async fn listen_session(&self) -> Result<InvoiceSession, LightningError> {
        let (client, body) = self.rest.open_stream(SUBSCRIBE_INVOICES_PATH).await?;
        Ok(InvoiceSession::start(body, Some(client)))
    }
}

#[async_trait::async_trait]
impl LightningBackend for LndBackend {
    async fn create_invoice(
        &self,
        params: CreateInvoiceParams,
    ) -> Result<LightningInvoice, LightningError> {
        let mut body = json!({
            "value_msat": params.amount.to_msat().to_string(),
            "memo": params.description,
            "expiry": params.expiry.as_secs().to_string(),
            "private": params.private_route_hints,
        });
        if let Some(hash) = params.description_hash {
            body["description_hash"] = Value::String(encode_bytes(&hash));
        }

        let response: AddInvoiceResponse = self.rest.post("/v1/invoices", &body).await?;
        let now = Utc::now();
        let expiry = chrono::Duration::from_std(params.expiry)
            .map_err(|e| LightningError::Config(format!("invalid expiry: {e}")))?;

        Ok(LightningInvoice {
            id: InvoiceId::from_slice(&response.r_hash)?,
            amount: params.amount,
            amount_received: None,
            bolt11: response.payment_request,
            status: InvoiceStatus::Unpaid,
            expires_at: now + expiry,
            paid_at: None,
        })
    }

    async fn get_invoice(
        &self,
        id: &InvoiceId,
    ) -> Result<Option<LightningInvoice>, LightningError> {
        let invoice: Option<LndInvoice> =
            self.rest.get_optional(&format!("/v1/invoice/{id}")).await?;
        invoice
            .map(|invoice| mapper::map_invoice(&invoice, Utc::now()))
            .transpose()
    }

    async fn cancel_invoice(&self, id: &InvoiceId) -> Result<(), LightningError> {
        let body = json!({ "payment_hash": encode_bytes(id.as_bytes()) });
        let _: Value = self.rest.post("/v2/invoices/cancel", &body).await?;
        Ok(())
    }

    async fn pay(&self, payment_request: &str) -> Result<PayResult, LightningError> {
        if payment_request.trim().is_empty() {
            return Err(LightningError::InvalidPaymentRequest(
                "empty payment request".to_string(),
            ));
        }
        let rest = &self.rest;
        let body = &json!({ "payment_request": payment_request });
        self.executor
            .pay(move || async move {
                let response: SendResponse =
                    rest.post("/v1/channels/transactions", body).await?;
                mapper::map_payment_reply(response)
            })
            .await
    }

    async fn open_channel(
        &self,
        request: OpenChannelRequest,
    ) -> Result<OpenChannelResult, LightningError> {
        let mut body = json!({
            "node_pubkey": encode_bytes(&request.node.to_array()),
            "local_funding_amount": request.channel_amount.to_sat_floor().to_string(),
        });
        if let Some(fee_rate) = request.fee_rate_sat_per_vbyte {
            body["sat_per_vbyte"] = Value::String(fee_rate.to_string());
        }

        let rest = &self.rest;
        let body = &body;
        let result = self
            .executor
            .open_channel(
                &request.node,
                move || async move {
                    let _: Value = rest.post("/v1/channels", body).await?;
                    Ok::<(), LightningError>(())
                },
                move || async move {
                    let pending: PendingChannelsResponse =
                        rest.get("/v1/channels/pending").await?;
                    Ok::<_, LightningError>(mapper::pending_open_nodes(&pending))
                },
            )
            .await?;
        info!("open channel to {}: {:?}", request.node, result);
        Ok(result)
    }

    async fn list_channels(&self) -> Result<Vec<LightningChannel>, LightningError> {
        let response: ListChannelsResponse = self.rest.get("/v1/channels").await?;
        response.channels.iter().map(mapper::map_channel).collect()
    }

    async fn get_info(&self) -> Result<NodeInfo, LightningError> {
        let info: GetInfoResponse = self.rest.get("/v1/getinfo").await?;
        mapper::map_node_info(&info)
    }

    async fn get_deposit_address(&self) -> Result<String, LightningError> {
        let response: NewAddressResponse = self
            .rest
            .get("/v1/newaddress?type=WITNESS_PUBKEY_HASH")
            .await?;
        Ok(response.address)
    }

    async fn connect_to(&self, address: &P2PAddress) -> Result<ConnectionResult, LightningError> {
        let body = json!({
            "addr": {
                "pubkey": address.node_id.to_string(),
                "host": format!("{}:{}", address.host, address.port),
            },
            "perm": false,
        });
        match self.rest.post::<Value>("/v1/peers", &body).await {
            Ok(_) => Ok(ConnectionResult::Ok),
            Err(LightningError::Remote(remote))
                if remote.message.contains("already connected to peer") =>
            {
                Ok(ConnectionResult::Ok)
            }
            Err(LightningError::Remote(remote)) => {
                warn!("could not connect to {}: {remote}", address.node_id);
                Ok(ConnectionResult::CouldNotConnect)
            }
            Err(err) => Err(err),
        }
    }

    async fn listen(&self) -> Result<Box<dyn InvoiceListener>, LightningError> {
        Ok(Box::new(self.listen_session().await?))
    }
}
