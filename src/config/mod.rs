use alloy::signers::local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner};
use alloy::transports::http::reqwest::Url;
use anyhow::{anyhow, bail, Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::time::Duration;
use tracing::{debug, warn};

/// Compiler settings. Accepts either a bare version string or a table with a
/// `version` key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SoliditySettings {
    Version(String),
    Detailed { version: String },
}

impl SoliditySettings {
    pub fn version(&self) -> &str {
        match self {
            SoliditySettings::Version(version) => version,
            SoliditySettings::Detailed { version } => version,
        }
    }
}

/// HD wallet derived accounts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HdAccounts {
    pub mnemonic: String,
    #[serde(default)]
    pub initial_index: u32,
    #[serde(default = "default_hd_count")]
    pub count: u32,
}

fn default_hd_count() -> u32 {
    20
}

/// Upper bound on accounts derived from one mnemonic
pub const MAX_HD_ACCOUNTS: u32 = 100;

/// First hardened BIP-32 child index; derived indices must stay below it
const HARDENED_OFFSET: u32 = 1 << 31;

impl HdAccounts {
    /// Derivation indices, rejecting empty, oversized and overflowing ranges
    pub fn index_range(&self) -> Result<Range<u32>> {
        if self.count == 0 {
            bail!("mnemonic derives zero accounts");
        }
        if self.count > MAX_HD_ACCOUNTS {
            bail!(
                "mnemonic count {} exceeds the maximum of {}",
                self.count,
                MAX_HD_ACCOUNTS
            );
        }
        let end = self
            .initial_index
            .checked_add(self.count)
            .filter(|end| *end <= HARDENED_OFFSET)
            .ok_or_else(|| {
                anyhow!(
                    "mnemonic indices {}..{}+{} fall outside the non-hardened range",
                    self.initial_index,
                    self.initial_index,
                    self.count
                )
            })?;
        Ok(self.initial_index..end)
    }
}

/// Signing accounts of a network.
///
/// An empty key list means the node's own unlocked accounts are used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Accounts {
    PrivateKeys(Vec<String>),
    Mnemonic(HdAccounts),
}

impl Default for Accounts {
    fn default() -> Self {
        Accounts::PrivateKeys(Vec::new())
    }
}

impl Accounts {
    /// True when signing is delegated to the node
    pub fn is_remote(&self) -> bool {
        matches!(self, Accounts::PrivateKeys(keys) if keys.is_empty())
    }

    /// Build local signers, in declaration order. The first one deploys.
    pub fn signers(&self) -> Result<Vec<PrivateKeySigner>> {
        match self {
            Accounts::PrivateKeys(keys) => keys
                .iter()
                .enumerate()
                .map(|(i, key)| {
                    PrivateKeySigner::from_str(key)
                        .map_err(|e| anyhow!("Invalid private key at accounts[{}]: {}", i, e))
                })
                .collect(),
            Accounts::Mnemonic(hd) => hd
                .index_range()?
                .map(|index| {
                    MnemonicBuilder::<English>::default()
                        .phrase(hd.mnemonic.as_str())
                        .index(index)
                        .and_then(|builder| builder.build())
                        .map_err(|e| anyhow!("Failed to derive account {}: {}", index, e))
                })
                .collect(),
        }
    }
}

/// Connection profile for a single network
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    pub url: String,
    #[serde(default)]
    pub accounts: Accounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    40000
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn rpc_url(&self) -> Result<Url> {
        let url = Url::parse(&self.url).context(format!("Invalid RPC URL {}", self.url))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => bail!("Unsupported RPC URL scheme '{}' in {}", scheme, self.url),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathsConfig {
    #[serde(default = "default_artifacts_dir")]
    pub artifacts: PathBuf,
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            artifacts: default_artifacts_dir(),
        }
    }
}

/// Deployment configuration from deploy.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    pub solidity: SoliditySettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_network: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(deserialize_with = "deserialize_unique_networks")]
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub root: PathBuf,
}

impl DeployConfig {
    /// Load configuration from a YAML file, resolving `${VAR}` key references
    /// from the environment (and `.env`, if present).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = path.as_ref();
        let yaml_content = fs::read_to_string(path)
            .context(format!("Failed to read {}", path.display()))?;

        let mut config = Self::from_yaml_str(&yaml_content)
            .context(format!("Failed to parse {}", path.display()))?;
        config.root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(config)
    }

    /// Parse, resolve and validate configuration text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut config: DeployConfig = serde_yaml::from_str(yaml)?;
        config.resolve_env_refs()?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_env_refs(&mut self) -> Result<()> {
        for (name, network) in self.networks.iter_mut() {
            let mut literal_keys = 0;

            match &mut network.accounts {
                Accounts::PrivateKeys(keys) => {
                    for key in keys.iter_mut() {
                        match env_ref(key) {
                            Some(var) => {
                                *key = env::var(var).context(format!(
                                    "Network '{}' references {} which is not set",
                                    name, var
                                ))?;
                            }
                            None => literal_keys += 1,
                        }
                    }
                }
                Accounts::Mnemonic(hd) => match env_ref(&hd.mnemonic) {
                    Some(var) => {
                        hd.mnemonic = env::var(var).context(format!(
                            "Network '{}' references {} which is not set",
                            name, var
                        ))?;
                    }
                    None => literal_keys += 1,
                },
            }

            if literal_keys > 0 {
                warn!(
                    "⚠️  Network '{}' embeds {} plaintext secret(s) in the config file. Use ${{VAR}} references instead!",
                    name, literal_keys
                );
            }
        }

        Ok(())
    }

    /// Structural validation
    pub fn validate(&self) -> Result<()> {
        if self.solidity.version().trim().is_empty() {
            bail!("solidity version must not be empty");
        }

        if self.networks.is_empty() {
            bail!("No networks configured");
        }

        for (name, network) in &self.networks {
            network
                .rpc_url()
                .context(format!("Network '{}' is misconfigured", name))?;

            if network.timeout_ms == 0 {
                bail!("Network '{}' timeout_ms must be greater than zero", name);
            }

            match &network.accounts {
                Accounts::PrivateKeys(keys) => {
                    for (i, key) in keys.iter().enumerate() {
                        validate_private_key(key).context(format!(
                            "Network '{}' has a malformed key at accounts[{}]",
                            name, i
                        ))?;
                    }
                }
                Accounts::Mnemonic(hd) => {
                    hd.index_range()
                        .context(format!("Network '{}' has invalid mnemonic accounts", name))?;
                }
            }

            debug!(
                "Network '{}': url={}, chain_id={:?}, timeout={}ms",
                name, network.url, network.chain_id, network.timeout_ms
            );
        }

        if let Some(default) = &self.default_network {
            self.network(default).context("Invalid default_network")?;
        }

        Ok(())
    }

    /// Look up a network profile by name
    pub fn network(&self, name: &str) -> Result<&NetworkConfig> {
        self.networks.get(name).ok_or_else(|| {
            anyhow!(
                "Unknown network '{}'. Configured networks: {}",
                name,
                self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })
    }

    /// Pick the network to deploy to: explicit selection, then `default_network`,
    /// then the only configured network.
    pub fn select_network<'a>(
        &'a self,
        requested: Option<&'a str>,
    ) -> Result<(&'a str, &'a NetworkConfig)> {
        let name = match (requested, self.default_network.as_deref()) {
            (Some(name), _) => name,
            (None, Some(name)) => name,
            (None, None) if self.networks.len() == 1 => {
                self.networks.keys().next().map(String::as_str).unwrap_or_default()
            }
            (None, None) => bail!(
                "No network selected and no default_network configured. Use --network with one of: {}",
                self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        };

        Ok((name, self.network(name)?))
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join(&self.paths.artifacts)
    }
}

/// `${VAR}` → `VAR`
fn env_ref(value: &str) -> Option<&str> {
    value
        .trim()
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|var| !var.is_empty())
}

fn validate_private_key(key: &str) -> Result<()> {
    let hex_part = key.strip_prefix("0x").unwrap_or(key);
    if hex_part.len() != 64 {
        bail!("expected 32 bytes of hex, got {} characters", hex_part.len());
    }
    hex::decode(hex_part).context("private key is not valid hex")?;
    PrivateKeySigner::from_str(key).map_err(|e| anyhow!("not a valid secp256k1 key: {}", e))?;
    Ok(())
}

fn deserialize_unique_networks<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, NetworkConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    struct NetworksVisitor;

    impl<'de> Visitor<'de> for NetworksVisitor {
        type Value = BTreeMap<String, NetworkConfig>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a mapping of network name to network config")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut networks = BTreeMap::new();
            while let Some((name, network)) = map.next_entry::<String, NetworkConfig>()? {
                if networks.contains_key(&name) {
                    return Err(serde::de::Error::custom(format!(
                        "duplicate network '{}'",
                        name
                    )));
                }
                networks.insert(name, network);
            }
            Ok(networks)
        }
    }

    deserializer.deserialize_map(NetworksVisitor)
}
