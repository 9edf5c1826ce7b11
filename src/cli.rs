use crate::artifacts::ArtifactStore;
use crate::config::DeployConfig;
use crate::factory::{ContractFactory, Deployment};
use crate::network::Network;
use alloy::primitives::U256;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

/// Deploy a compiled contract to a configured network
#[derive(Debug, Clone, Parser)]
#[command(name = "procurement-deployer", version)]
pub struct Args {
    /// Network configuration file
    #[arg(long, env = "DEPLOY_CONFIG", default_value = "deploy.yaml")]
    pub config: PathBuf,

    /// Network to deploy to (defaults to `default_network`)
    #[arg(long, env = "DEPLOY_NETWORK")]
    pub network: Option<String>,

    /// Contract name, or `path/File.sol:Name`
    #[arg(long, env = "DEPLOY_CONTRACT", default_value = "ProcurementSystem")]
    pub contract: String,

    /// Artifacts directory, overriding `paths.artifacts`
    #[arg(long, env = "DEPLOY_ARTIFACTS")]
    pub artifacts: Option<PathBuf>,
}

/// Load config, get the contract factory, deploy, return the deployment
pub async fn run(args: &Args) -> Result<Deployment> {
    info!("📋 Loading configuration from {}", args.config.display());
    let config = DeployConfig::load(&args.config)?;

    let (network_name, network_config) = config.select_network(args.network.as_deref())?;

    let artifacts_dir = args
        .artifacts
        .clone()
        .unwrap_or_else(|| config.artifacts_dir());
    let store = ArtifactStore::new(artifacts_dir);
    info!("📦 Reading artifacts from {}", store.root().display());

    let factory = ContractFactory::get(&store, &args.contract, config.solidity.version())?;

    let network = Network::connect(network_name, network_config).await?;

    match network.deployer_balance().await {
        Ok(balance) if balance == U256::ZERO => warn!(
            "⚠️  Deployer {} has no funds on '{}'",
            network.deployer(),
            network.name()
        ),
        Ok(balance) => info!("💰 Deployer balance: {} wei", balance),
        Err(e) => warn!("Could not read deployer balance: {:#}", e),
    }

    factory.deploy(&network).await
}

/// Lines printed on success
pub fn report(deployment: &Deployment) -> String {
    format!(
        "{} deployed to: {}\nContract is deployed!",
        deployment.contract_name, deployment.address
    )
}
