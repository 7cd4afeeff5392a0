use base64::prelude::{Engine as _, BASE64_STANDARD};
use lnbridge_core::lightning::error::{LightningError, RemoteError};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString<T> {
    Int(T),
    Str(String),
}

fn parse_int<T, E>(raw: IntOrString<T>) -> Result<Option<T>, E>
where
    T: FromStr,
    T::Err: Display,
    E: serde::de::Error,
{
    match raw {
        IntOrString::Int(n) => Ok(Some(n)),
        IntOrString::Str(s) if s.trim().is_empty() => Ok(None),
        IntOrString::Str(s) => s.trim().parse().map(Some).map_err(E::custom),
    }
}

fn int<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default + Deserialize<'de>,
    T::Err: Display,
{
    let raw = IntOrString::<T>::deserialize(deserializer)?;
    Ok(parse_int::<T, D::Error>(raw)?.unwrap_or_default())
}

// Blank or missing becomes `None`.
fn opt_int<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Deserialize<'de>,
    T::Err: Display,
{
    match Option::<IntOrString<T>>::deserialize(deserializer)? {
        Some(raw) => parse_int::<T, D::Error>(raw),
        None => Ok(None),
    }
}

fn base64_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) => BASE64_STANDARD.decode(s.as_bytes()).map_err(D::Error::custom),
        None => Ok(Vec::new()),
    }
}

pub fn encode_bytes(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LndInvoice {
    #[serde(default)]
    pub memo: String,
    #[serde(default, deserialize_with = "base64_bytes")]
    pub r_hash: Vec<u8>,
    #[serde(default, deserialize_with = "int")]
    pub value_msat: u64,
    #[serde(default)]
    pub settled: bool,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "int")]
    pub creation_date: i64,
    #[serde(default, deserialize_with = "int")]
    pub settle_date: i64,
    #[serde(default)]
    pub payment_request: String,
    #[serde(default, deserialize_with = "int")]
    pub expiry: i64,
    #[serde(default, deserialize_with = "opt_int")]
    pub amt_paid_msat: Option<u64>,
}

impl LndInvoice {
    pub fn is_settled(&self) -> bool {
        self.settled || self.state.as_deref() == Some("SETTLED")
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AddInvoiceResponse {
    #[serde(default, deserialize_with = "base64_bytes")]
    pub r_hash: Vec<u8>,
    #[serde(default)]
    pub payment_request: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Route {
    #[serde(default, deserialize_with = "int")]
    pub total_amt_msat: u64,
    #[serde(default, deserialize_with = "int")]
    pub total_fees_msat: u64,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub payment_error: Option<String>,
    #[serde(default, deserialize_with = "base64_bytes")]
    pub payment_preimage: Vec<u8>,
    #[serde(default)]
    pub payment_route: Option<Route>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LndChannel {
    #[serde(default)]
    pub active: bool,
    pub remote_pubkey: String,
    #[serde(default)]
    pub channel_point: String,
    #[serde(default, deserialize_with = "int")]
    pub capacity: u64,
    #[serde(default, deserialize_with = "int")]
    pub local_balance: u64,
    #[serde(default)]
    pub private: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListChannelsResponse {
    #[serde(default)]
    pub channels: Vec<LndChannel>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PendingChannel {
    #[serde(default)]
    pub remote_node_pub: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PendingOpenChannel {
    pub channel: PendingChannel,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PendingChannelsResponse {
    #[serde(default)]
    pub pending_open_channels: Vec<PendingOpenChannel>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GetInfoResponse {
    pub identity_pubkey: String,
    #[serde(default, deserialize_with = "int")]
    pub block_height: u32,
    #[serde(default)]
    pub synced_to_chain: bool,
    #[serde(default)]
    pub uris: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewAddressResponse {
    pub address: String,
}

// Error object: `{code, error}`; newer gateways call the text `message`.
#[derive(Clone, Debug, Deserialize)]
pub struct LndErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl From<LndErrorBody> for RemoteError {
    fn from(body: LndErrorBody) -> Self {
        let message = body
            .error
            .filter(|e| !e.is_empty())
            .or(body.message)
            .unwrap_or_default();
        RemoteError::new(body.code, message)
    }
}

#[derive(Clone, Debug)]
pub enum StreamItem {
    Invoice(LndInvoice),
    Error(RemoteError),
}

fn decode_value<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, LightningError> {
    serde_json::from_value(value)
        .map_err(|e| LightningError::ProtocolViolation(format!("malformed {what}: {e}")))
}

pub fn decode_stream_line(line: &str) -> Result<StreamItem, LightningError> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| LightningError::ProtocolViolation(format!("invalid stream line: {e}")))?;
    let mut object = match value {
        Value::Object(object) => object,
        _ => {
            return Err(LightningError::ProtocolViolation(
                "stream line is not an object".to_string(),
            ))
        }
    };
    if let Some(result) = object.remove("result") {
        return decode_value(result, "invoice").map(StreamItem::Invoice);
    }
    if let Some(error) = object.remove("error") {
        return decode_value::<LndErrorBody>(error, "error object")
            .map(|body| StreamItem::Error(body.into()));
    }
    Err(LightningError::ProtocolViolation(
        "stream line has neither result nor error".to_string(),
    ))
}
