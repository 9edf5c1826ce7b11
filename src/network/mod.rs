use crate::config::NetworkConfig;
use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::{TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
    transports::{
        http::{reqwest::Url, Client, Http},
        Transport,
    },
};
use anyhow::{anyhow, bail, Context, Result};
use std::future::{Future, IntoFuture};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// A connected network with a resolved deployer account
pub struct Network {
    name: String,
    config: NetworkConfig,
    url: Url,
    provider: RootProvider<Http<Client>>,
    signers: Vec<PrivateKeySigner>,
    deployer: Address,
    chain_id: u64,
}

impl Network {
    /// Connect to a configured network: verify the endpoint answers, check the
    /// chain id if one is configured and resolve the deployer account.
    pub async fn connect(name: &str, config: &NetworkConfig) -> Result<Self> {
        let url = config.rpc_url()?;
        let signers = config.accounts.signers()?;
        let provider = ProviderBuilder::new().on_http(url.clone());

        info!("🔌 Connecting to network '{}' at {}", name, url);

        let chain_id = bounded(name, config, "eth_chainId", provider.get_chain_id())
            .await?
            .context(format!("Network '{}' at {} is unreachable", name, url))?;

        if let Some(expected) = config.chain_id {
            if expected != chain_id {
                bail!(
                    "Network '{}' is configured with chain_id {} but the node at {} reports {}",
                    name,
                    expected,
                    url,
                    chain_id
                );
            }
        }

        let deployer = match signers.first() {
            Some(signer) => signer.address(),
            None => {
                debug!("[{}] No local accounts, asking the node", name);
                let accounts = bounded(name, config, "eth_accounts", provider.get_accounts())
                    .await?
                    .context(format!("Failed to list accounts of network '{}'", name))?;
                *accounts.first().ok_or_else(|| {
                    anyhow!(
                        "Network '{}' has no accounts configured and the node exposes none",
                        name
                    )
                })?
            }
        };

        info!(
            "✅ Connected to '{}' (chain_id: {}, deployer: {})",
            name, chain_id, deployer
        );

        Ok(Self {
            name: name.to_string(),
            config: config.clone(),
            url,
            provider,
            signers,
            deployer,
            chain_id,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn deployer(&self) -> Address {
        self.deployer
    }

    /// Deployer balance in wei
    pub async fn deployer_balance(&self) -> Result<U256> {
        bounded(
            &self.name,
            &self.config,
            "eth_getBalance",
            self.provider.get_balance(self.deployer).into_future(),
        )
        .await?
        .context(format!("Failed to read balance of {}", self.deployer))
    }

    /// Send a transaction from the deployer and wait for its receipt.
    ///
    /// Local signers sign client-side; otherwise the node signs for its own
    /// unlocked account.
    pub async fn send(&self, tx: TransactionRequest) -> Result<TransactionReceipt> {
        let tx = tx.with_from(self.deployer);

        match self.signers.split_first() {
            Some((first, rest)) => {
                let mut wallet = EthereumWallet::from(first.clone());
                for signer in rest {
                    wallet.register_signer(signer.clone());
                }

                let provider = ProviderBuilder::new()
                    .with_recommended_fillers()
                    .wallet(wallet)
                    .on_http(self.url.clone());
                self.submit(&provider, tx).await
            }
            None => {
                let provider = ProviderBuilder::new()
                    .with_recommended_fillers()
                    .on_http(self.url.clone());
                self.submit(&provider, tx).await
            }
        }
    }

    async fn submit<P, T>(&self, provider: &P, tx: TransactionRequest) -> Result<TransactionReceipt>
    where
        P: Provider<T>,
        T: Transport + Clone,
    {
        let pending = bounded(
            &self.name,
            &self.config,
            "eth_sendTransaction",
            provider.send_transaction(tx),
        )
        .await?
        .context(format!("[{}] Failed to submit transaction", self.name))?;

        let tx_hash = *pending.tx_hash();
        info!("[{}] Transaction submitted: {}", self.name, tx_hash);

        let receipt = bounded(
            &self.name,
            &self.config,
            "transaction confirmation",
            pending.get_receipt(),
        )
        .await?
        .context(format!("[{}] Failed to confirm transaction {}", self.name, tx_hash))?;

        debug!(
            "[{}] Transaction {} mined in block {:?}",
            self.name, tx_hash, receipt.block_number
        );

        Ok(receipt)
    }
}

/// Bound a network call by the network's timeout
async fn bounded<F, R>(name: &str, config: &NetworkConfig, what: &str, fut: F) -> Result<R>
where
    F: Future<Output = R>,
{
    match timeout(config.timeout(), fut).await {
        Ok(result) => Ok(result),
        Err(_) => {
            warn!(
                "[{}] {} timed out after {}ms",
                name, what, config.timeout_ms
            );
            Err(anyhow!(
                "[{}] {} timed out after {}ms ({})",
                name,
                what,
                config.timeout_ms,
                config.url
            ))
        }
    }
}
