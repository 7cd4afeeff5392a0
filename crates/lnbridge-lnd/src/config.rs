use lnbridge_core::lightning::error::LightningError;
use lnbridge_core::lightning::executor::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

const CONNECTION_TYPE: &str = "lnd-rest";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LndConfig {
    pub base_url: String,
    // Hex encoded macaroon.
    #[serde(default)]
    pub macaroon: Option<String>,
    #[serde(default)]
    pub macaroon_path: Option<PathBuf>,
    #[serde(default)]
    pub tls_cert_path: Option<PathBuf>,
    #[serde(default)]
    pub allow_insecure: bool,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl LndConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        LndConfig {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            macaroon: None,
            macaroon_path: None,
            tls_cert_path: None,
            allow_insecure: false,
            retry: RetryPolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), LightningError> {
        let is_http = self.base_url.starts_with("http://");
        if !is_http && !self.base_url.starts_with("https://") {
            return Err(LightningError::Config(format!(
                "server must be an http(s) url, got {}",
                self.base_url
            )));
        }
        if is_http && !self.allow_insecure {
            return Err(LightningError::Config(
                "plain http server requires allowinsecure=true".to_string(),
            ));
        }
        if self.macaroon.is_some() && self.macaroon_path.is_some() {
            return Err(LightningError::Config(
                "macaroon and macaroonfilepath are mutually exclusive".to_string(),
            ));
        }
        if let Some(macaroon) = &self.macaroon {
            hex::decode(macaroon)
                .map_err(|e| LightningError::Config(format!("macaroon is not hex: {e}")))?;
        }
        Ok(())
    }

    pub fn macaroon_hex(&self) -> Result<Option<String>, LightningError> {
        if let Some(macaroon) = &self.macaroon {
            return Ok(Some(macaroon.clone()));
        }
        match &self.macaroon_path {
            Some(path) => {
                let bytes = fs::read(path).map_err(|e| {
                    LightningError::AuthError(format!(
                        "failed to read macaroon {}: {e}",
                        path.display()
                    ))
                })?;
                Ok(Some(hex::encode(bytes)))
            }
            None => Ok(None),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, LightningError> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(LightningError::Config(format!(
            "{key} must be true or false, got {value}"
        ))),
    }
}

impl FromStr for LndConfig {
    type Err = LightningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut entries: HashMap<String, String> = HashMap::new();
        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                LightningError::Config(format!("expected key=value, got {part}"))
            })?;
            let key = key.trim().to_ascii_lowercase();
            if entries.insert(key.clone(), value.trim().to_string()).is_some() {
                return Err(LightningError::Config(format!("duplicate key {key}")));
            }
        }

        match entries.remove("type") {
            Some(kind) if kind.eq_ignore_ascii_case(CONNECTION_TYPE) => {}
            Some(kind) => {
                return Err(LightningError::Config(format!(
                    "unsupported connection type {kind}"
                )))
            }
            None => return Err(LightningError::Config("missing type".to_string())),
        }

        let server = entries
            .remove("server")
            .ok_or_else(|| LightningError::Config("missing server".to_string()))?;
        let mut config = LndConfig::new(server);
        config.macaroon = entries.remove("macaroon");
        config.macaroon_path = entries.remove("macaroonfilepath").map(PathBuf::from);
        config.tls_cert_path = entries.remove("certfilepath").map(PathBuf::from);
        if let Some(value) = entries.remove("allowinsecure") {
            config.allow_insecure = parse_bool("allowinsecure", &value)?;
        }

        if let Some(key) = entries.keys().next() {
            return Err(LightningError::Config(format!("unknown key {key}")));
        }

        config.validate()?;
        Ok(config)
    }
}
