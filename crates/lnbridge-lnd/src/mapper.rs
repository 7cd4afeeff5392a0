use chrono::{DateTime, TimeZone, Utc};
use ln_types::{Amount, NodeId, P2PAddress};
use lnbridge_core::lightning::error::LightningError;
use lnbridge_core::lightning::executor::PaymentReply;
use lnbridge_core::lightning::types::{
    InvoiceId, InvoiceStatus, LightningChannel, LightningInvoice, NodeInfo, PayDetails,
};
use tracing::debug;

use crate::wire::{GetInfoResponse, LndChannel, LndInvoice, PendingChannelsResponse, SendResponse};

fn msat(value: u64) -> Result<Amount, LightningError> {
    Amount::from_msat(value).map_err(|e| LightningError::Decode(e.to_string()))
}

fn sat(value: u64) -> Result<Amount, LightningError> {
    Amount::from_sat(value).map_err(|e| LightningError::Decode(e.to_string()))
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, LightningError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| LightningError::Decode(format!("timestamp out of range: {secs}")))
}

fn node_id(hex: &str) -> Result<NodeId, LightningError> {
    hex.parse()
        .map_err(|e| LightningError::Decode(format!("invalid node id {hex}: {e}")))
}

// Builds the domain invoice. The status reflects `now`, so the same wire
// invoice observed later may map to a different status.
pub fn map_invoice(
    invoice: &LndInvoice,
    now: DateTime<Utc>,
) -> Result<LightningInvoice, LightningError> {
    let id = InvoiceId::from_slice(&invoice.r_hash)?;
    let expires_at = timestamp(invoice.creation_date.saturating_add(invoice.expiry))?;
    let settled = invoice.is_settled();
    let paid_at = if settled {
        Some(timestamp(invoice.settle_date)?)
    } else {
        None
    };

    Ok(LightningInvoice {
        id,
        amount: msat(invoice.value_msat)?,
        amount_received: invoice.amt_paid_msat.map(msat).transpose()?,
        bolt11: invoice.payment_request.clone(),
        status: InvoiceStatus::derive(settled, expires_at, now),
        expires_at,
        paid_at,
    })
}

pub fn map_payment_reply(response: SendResponse) -> Result<PaymentReply, LightningError> {
    let route = match response.payment_route {
        Some(route) => Some(PayDetails {
            total_amount: msat(route.total_amt_msat)?,
            fee_amount: msat(route.total_fees_msat)?,
        }),
        None => None,
    };
    let payment_preimage = if response.payment_preimage.is_empty() {
        None
    } else {
        Some(response.payment_preimage)
    };
    Ok(PaymentReply {
        payment_error: response.payment_error.unwrap_or_default(),
        payment_preimage,
        route,
    })
}

pub fn map_channel(channel: &LndChannel) -> Result<LightningChannel, LightningError> {
    Ok(LightningChannel {
        remote_node: node_id(&channel.remote_pubkey)?,
        is_public: !channel.private,
        is_active: channel.active,
        capacity: sat(channel.capacity)?,
        local_balance: sat(channel.local_balance)?,
        channel_point: channel.channel_point.clone(),
    })
}

pub fn map_node_info(info: &GetInfoResponse) -> Result<NodeInfo, LightningError> {
    let addresses = info
        .uris
        .iter()
        .filter_map(|uri| match uri.parse::<P2PAddress>() {
            Ok(address) => Some(address),
            Err(e) => {
                debug!("skipping node uri {uri}: {e}");
                None
            }
        })
        .collect();
    Ok(NodeInfo {
        identity: node_id(&info.identity_pubkey)?,
        block_height: info.block_height,
        synced_to_chain: info.synced_to_chain,
        addresses,
    })
}

pub fn pending_open_nodes(pending: &PendingChannelsResponse) -> Vec<NodeId> {
    pending
        .pending_open_channels
        .iter()
        .filter_map(|p| p.channel.remote_node_pub.parse().ok())
        .collect()
}
