use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use lnbridge_core::lightning::error::{LightningError, RemoteError};
use reqwest::{Certificate, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::io;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

use crate::config::LndConfig;
use crate::wire::LndErrorBody;

const MACAROON_HEADER: &str = "Grpc-Metadata-macaroon";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

fn transport_error(err: reqwest::Error) -> LightningError {
    LightningError::NodeUnavailable(err.to_string())
}

#[derive(Clone)]
pub struct LndRestClient {
    client: Client,
    base_url: String,
    macaroon_hex: Option<String>,
    tls_cert: Option<Vec<u8>>,
    allow_insecure: bool,
}

impl LndRestClient {
    pub fn new(config: &LndConfig) -> Result<Self, LightningError> {
        config.validate()?;
        let tls_cert = match &config.tls_cert_path {
            Some(path) => Some(fs::read(path).map_err(|e| {
                LightningError::Config(format!(
                    "failed to read tls cert {}: {e}",
                    path.display()
                ))
            })?),
            None => None,
        };

        let client = Self::build_client(
            tls_cert.as_deref(),
            config.allow_insecure,
            Some(REQUEST_TIMEOUT),
        )?;
        Ok(LndRestClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            macaroon_hex: config.macaroon_hex()?,
            tls_cert,
            allow_insecure: config.allow_insecure,
        })
    }

    fn build_client(
        tls_cert: Option<&[u8]>,
        allow_insecure: bool,
        timeout: Option<Duration>,
    ) -> Result<Client, LightningError> {
        let mut builder = Client::builder().danger_accept_invalid_certs(allow_insecure);
        if let Some(pem) = tls_cert {
            let cert = Certificate::from_pem(pem)
                .map_err(|e| LightningError::Config(format!("invalid tls cert: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|e| LightningError::Config(e.to_string()))
    }

    fn request(&self, client: &Client, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = client.request(method, url);
        match &self.macaroon_hex {
            Some(macaroon) => builder.header(MACAROON_HEADER, macaroon),
            None => builder,
        }
    }

    async fn error_from_response(response: Response) -> LightningError {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let text = response.text().await.unwrap_or_default();
            return LightningError::AuthError(format!("HTTP {status}: {text}"));
        }
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return transport_error(e),
        };
        match serde_json::from_str::<LndErrorBody>(&text) {
            Ok(body) => LightningError::Remote(RemoteError::from(body)),
            Err(_) => LightningError::NodeUnavailable(format!("HTTP {status}: {text}")),
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, LightningError> {
        let response = builder.send().await.map_err(transport_error)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::error_from_response(response).await)
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, LightningError> {
        let bytes = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&bytes).map_err(|e| LightningError::Decode(e.to_string()))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, LightningError> {
        debug!("GET {path}");
        let response = self
            .send(self.request(&self.client, Method::GET, path))
            .await?;
        Self::decode(response).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, LightningError> {
        debug!("POST {path}");
        let response = self
            .send(self.request(&self.client, Method::POST, path).json(body))
            .await?;
        Self::decode(response).await
    }

    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, LightningError> {
        debug!("GET {path}");
        let response = self
            .request(&self.client, Method::GET, path)
            .send()
            .await
            .map_err(transport_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return match Self::error_from_response(response).await {
                LightningError::Remote(remote) if is_not_found(&remote) => Ok(None),
                err => Err(err),
            };
        }
        Self::decode(response).await.map(Some)
    }

    // Opens a long-lived GET whose body is read as a byte stream. The
    // returned client has no request timeout and must outlive the stream.
    pub async fn open_stream(&self, path: &str) -> Result<(Client, ByteStream), LightningError> {
        let client = Self::build_client(self.tls_cert.as_deref(), self.allow_insecure, None)?;
        debug!("GET {path} (stream)");
        let response = self.send(self.request(&client, Method::GET, path)).await?;
        let body = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        Ok((client, Box::pin(body)))
    }
}

fn is_not_found(remote: &RemoteError) -> bool {
    remote.code == 5 || remote.message.contains("unable to locate invoice")
}
