use anyhow::{anyhow, Context, Result};
use lnbridge_lnd::LndConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_invoice_expiry_secs() -> u64 {
    3600
}

fn default_settlement_timeout_secs() -> u64 {
    600
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CliConfig {
    pub lnd: LndConfig,
    #[serde(default = "default_invoice_expiry_secs")]
    pub invoice_expiry_secs: u64,
    #[serde(default = "default_settlement_timeout_secs")]
    pub settlement_timeout_secs: u64,
}

impl CliConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let cfg: CliConfig = toml::from_str(&data)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_connection_string(connection: &str) -> Result<Self> {
        let lnd: LndConfig = connection
            .parse()
            .context("failed to parse connection string")?;
        let cfg = CliConfig {
            lnd,
            invoice_expiry_secs: default_invoice_expiry_secs(),
            settlement_timeout_secs: default_settlement_timeout_secs(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.lnd.validate()?;
        if self.invoice_expiry_secs == 0 {
            return Err(anyhow!("invoice_expiry_secs must be > 0"));
        }
        if self.settlement_timeout_secs == 0 {
            return Err(anyhow!("settlement_timeout_secs must be > 0"));
        }
        Ok(())
    }
}
