use crate::artifacts::{ArtifactStore, ContractArtifact};
use crate::network::Network;
use alloy::{
    network::{ReceiptResponse, TransactionBuilder},
    primitives::{Address, Bytes, TxHash},
    rpc::types::TransactionRequest,
};
use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};

/// Outcome of a successful deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub contract_name: String,
    pub network: String,
    pub chain_id: u64,
    pub address: Address,
    pub transaction_hash: TxHash,
    pub block_number: Option<u64>,
    pub deployer: Address,
    pub gas_used: u128,
}

/// Deploys a compiled contract with no constructor arguments
#[derive(Debug, Clone)]
pub struct ContractFactory {
    artifact: ContractArtifact,
    creation_code: Bytes,
}

impl ContractFactory {
    /// Look up `name` in the artifact store and build its factory
    pub fn get(store: &ArtifactStore, name: &str, solidity_version: &str) -> Result<Self> {
        let artifact = store
            .find(name)
            .context(format!("Failed to get contract factory for {}", name))?;
        Self::from_artifact(artifact, solidity_version)
    }

    pub fn from_artifact(artifact: ContractArtifact, solidity_version: &str) -> Result<Self> {
        let arity = artifact.constructor_arity();
        if arity > 0 {
            bail!(
                "{} constructor expects {} argument(s); only argument-free deployment is supported",
                artifact.fully_qualified_name(),
                arity
            );
        }

        match artifact.compiler_version()? {
            Some(compiled_with) if !same_compiler(&compiled_with, solidity_version) => {
                bail!(
                    "Compilation mismatch: {} was compiled with solc {} but the config requires {}. Recompile the contracts.",
                    artifact.fully_qualified_name(),
                    compiled_with,
                    solidity_version
                );
            }
            Some(_) => {}
            None => warn!(
                "⚠️  No build info for {}, cannot verify it was compiled with solc {}",
                artifact.fully_qualified_name(),
                solidity_version
            ),
        }

        let creation_code = artifact.creation_code()?;

        Ok(Self {
            artifact,
            creation_code,
        })
    }

    pub fn contract_name(&self) -> &str {
        &self.artifact.contract_name
    }

    /// Contract-creation transaction (no `to`, creation code as input)
    pub fn deploy_transaction(&self) -> TransactionRequest {
        TransactionRequest::default().with_deploy_code(self.creation_code.clone())
    }

    /// Deploy to `network` and wait for the contract address
    pub async fn deploy(&self, network: &Network) -> Result<Deployment> {
        info!(
            "🚀 Deploying {} to '{}' (chain_id: {}) from {}",
            self.artifact.fully_qualified_name(),
            network.name(),
            network.chain_id(),
            network.deployer()
        );

        let receipt = network
            .send(self.deploy_transaction())
            .await
            .context(format!("Failed to deploy {}", self.contract_name()))?;

        if !ReceiptResponse::status(&receipt) {
            bail!(
                "Deployment of {} reverted (transaction {})",
                self.contract_name(),
                receipt.transaction_hash
            );
        }

        let address = receipt.contract_address.ok_or_else(|| {
            anyhow!(
                "Receipt of {} carries no contract address",
                receipt.transaction_hash
            )
        })?;

        info!(
            "✅ {} deployed at {} (tx: {}, block: {:?})",
            self.contract_name(),
            address,
            receipt.transaction_hash,
            receipt.block_number
        );

        Ok(Deployment {
            contract_name: self.contract_name().to_string(),
            network: network.name().to_string(),
            chain_id: network.chain_id(),
            address,
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            deployer: receipt.from,
            gas_used: u128::from(receipt.gas_used),
        })
    }
}

/// `0.8.28` matches `0.8.28` and `0.8.28+commit.7893614a`
fn same_compiler(compiled_with: &str, required: &str) -> bool {
    let short = |v: &str| {
        v.trim()
            .trim_start_matches('v')
            .split('+')
            .next()
            .unwrap_or_default()
            .to_string()
    };
    short(compiled_with) == short(required)
}
