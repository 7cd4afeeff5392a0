use chrono::{DateTime, Utc};
use ln_types::{Amount, NodeId, P2PAddress};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::lightning::error::LightningError;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvoiceId([u8; 32]);

impl InvoiceId {
    pub fn from_hash(hash: [u8; 32]) -> Self {
        InvoiceId(hash)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, LightningError> {
        let hash: [u8; 32] = bytes.try_into().map_err(|_| {
            LightningError::Decode(format!(
                "payment hash must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(InvoiceId(hash))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvoiceId({self})")
    }
}

impl FromStr for InvoiceId {
    type Err = LightningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| {
            LightningError::InvalidPaymentRequest(format!("invalid invoice id {s}: {e}"))
        })?;
        let hash: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            LightningError::InvalidPaymentRequest(format!(
                "invalid invoice id {s}: expected 32 bytes"
            ))
        })?;
        Ok(InvoiceId(hash))
    }
}

impl Serialize for InvoiceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InvoiceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
    Expired,
}

impl InvoiceStatus {
    // Status is never stored. Settlement wins over expiry.
    pub fn derive(settled: bool, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if settled {
            InvoiceStatus::Paid
        } else if expires_at < now {
            InvoiceStatus::Expired
        } else {
            InvoiceStatus::Unpaid
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::Unpaid => write!(f, "unpaid"),
            InvoiceStatus::Paid => write!(f, "paid"),
            InvoiceStatus::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LightningInvoice {
    pub id: InvoiceId,
    pub amount: Amount,
    pub amount_received: Option<Amount>,
    pub bolt11: String,
    pub status: InvoiceStatus,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub struct CreateInvoiceParams {
    pub amount: Amount,
    pub description: String,
    pub expiry: Duration,
    pub description_hash: Option<[u8; 32]>,
    pub private_route_hints: bool,
}

impl CreateInvoiceParams {
    pub fn new(amount: Amount, description: impl Into<String>, expiry: Duration) -> Self {
        CreateInvoiceParams {
            amount,
            description: description.into(),
            expiry,
            description_hash: None,
            private_route_hints: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PayDetails {
    pub total_amount: Amount,
    pub fee_amount: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum PayResult {
    Ok(Option<PayDetails>),
    CouldNotFindRoute,
    Error(String),
}

impl PayResult {
    pub fn label(&self) -> &'static str {
        match self {
            PayResult::Ok(_) => "ok",
            PayResult::CouldNotFindRoute => "could_not_find_route",
            PayResult::Error(_) => "error",
        }
    }
}

#[derive(Clone, Debug)]
pub struct OpenChannelRequest {
    pub node: NodeId,
    pub channel_amount: Amount,
    pub fee_rate_sat_per_vbyte: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum OpenChannelResult {
    Ok,
    PeerNotConnected,
    CannotAffordFunding,
    NeedMoreConf,
    AlreadyExists,
}

impl OpenChannelResult {
    pub fn label(&self) -> &'static str {
        match self {
            OpenChannelResult::Ok => "ok",
            OpenChannelResult::PeerNotConnected => "peer_not_connected",
            OpenChannelResult::CannotAffordFunding => "cannot_afford_funding",
            OpenChannelResult::NeedMoreConf => "need_more_conf",
            OpenChannelResult::AlreadyExists => "already_exists",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConnectionResult {
    Ok,
    CouldNotConnect,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LightningChannel {
    pub remote_node: NodeId,
    pub is_public: bool,
    pub is_active: bool,
    pub capacity: Amount,
    pub local_balance: Amount,
    pub channel_point: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct NodeInfo {
    pub identity: NodeId,
    pub block_height: u32,
    pub synced_to_chain: bool,
    pub addresses: Vec<P2PAddress>,
}
