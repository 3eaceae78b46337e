use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wallet::{parse_address, Address, KdfParams, NodeConfig};

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default = "default_eth_url")]
    pub eth_url: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Fixed gas limit for contract calls; the node estimates when unset
    #[serde(default)]
    pub gas_limit: Option<u64>,

    #[serde(default)]
    pub mytoken_address: Option<String>,

    /// "standard" or "light"
    #[serde(default = "default_kdf")]
    pub kdf: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_eth_url() -> String {
    wallet::config::DEFAULT_NODE_URL.to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./datadir")
}

fn default_kdf() -> String {
    "standard".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Config {
            eth_url: default_eth_url(),
            data_dir: default_data_dir(),
            gas_limit: None,
            mytoken_address: None,
            kdf: default_kdf(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Load `path` if given, else `./config.json` when present, else defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    log::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    return Ok(Config::default());
                }
                fallback
            }
        };

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn node(&self) -> NodeConfig {
        NodeConfig::new(self.eth_url.clone()).with_gas_limit(self.gas_limit)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn kdf_params(&self) -> anyhow::Result<KdfParams> {
        match self.kdf.as_str() {
            "standard" => Ok(KdfParams::default()),
            "light" => Ok(KdfParams::light()),
            other => bail!("unknown kdf setting {:?} (expected \"standard\" or \"light\")", other),
        }
    }

    pub fn token_address(&self) -> anyhow::Result<Address> {
        let Some(address) = self.mytoken_address.as_deref() else {
            bail!("mytoken_address is not set in the config; deploy the token first");
        };
        parse_address(address).context("invalid mytoken_address in config")
    }
}
