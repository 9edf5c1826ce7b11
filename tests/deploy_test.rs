use alloy::node_bindings::Anvil;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use procurement_deployer::cli::{self, Args};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;

/// Init code returning a one-byte runtime (`STOP`)
const PROCUREMENT_BYTECODE: &str = "0x600060005360016000f3";

/// Init code that reverts with empty data
const REVERTING_BYTECODE: &str = "0x60006000fd";

/// Helper to lay out a compiled ProcurementSystem artifact under `root/artifacts`
fn write_procurement_artifact(root: &Path) {
    write_artifact_with_bytecode(root, PROCUREMENT_BYTECODE);
}

fn write_artifact_with_bytecode(root: &Path, bytecode: &str) {
    let dir = root.join("artifacts/contracts/ProcurementSystem.sol");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("ProcurementSystem.json"),
        json!({
            "_format": "hh-sol-artifact-1",
            "contractName": "ProcurementSystem",
            "sourceName": "contracts/ProcurementSystem.sol",
            "abi": [],
            "bytecode": bytecode,
            "deployedBytecode": "0x00",
            "linkReferences": {},
            "deployedLinkReferences": {}
        })
        .to_string(),
    )
    .expect("Failed to write artifact");
}

/// Helper to write deploy.yaml with a single network
fn write_config(root: &Path, network: &str, url: &str, extra: &str) -> std::path::PathBuf {
    let path = root.join("deploy.yaml");
    fs::write(
        &path,
        format!(
            r#"
solidity: "0.8.28"
default_network: {network}
networks:
  {network}:
    url: "{url}"
    timeout_ms: 5000
{extra}
"#
        ),
    )
    .expect("Failed to write config");
    path
}

fn deployer_command(config: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_procurement-deployer"));
    cmd.arg("--config")
        .arg(config)
        .env_remove("DEPLOY_NETWORK")
        .env_remove("DEPLOY_CONTRACT")
        .env_remove("DEPLOY_ARTIFACTS")
        .env("RUST_LOG", "procurement_deployer=info");
    cmd
}

#[test]
fn test_unreachable_network_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    write_procurement_artifact(dir.path());
    let config = write_config(dir.path(), "ganache", "http://127.0.0.1:1", "");

    let output = deployer_command(&config)
        .output()
        .expect("Failed to run deployer binary");

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Deployment failed"), "stderr: {}", stderr);
}

#[test]
fn test_unknown_network_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    write_procurement_artifact(dir.path());
    let config = write_config(dir.path(), "ganache", "http://127.0.0.1:1", "");

    let output = deployer_command(&config)
        .args(["--network", "mainnet"])
        .output()
        .expect("Failed to run deployer binary");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown network 'mainnet'"), "stderr: {}", stderr);
}

#[tokio::test]
#[ignore = "requires the anvil binary on PATH"]
async fn test_deploy_with_local_key() {
    let anvil = Anvil::new().try_spawn().expect("Failed to spawn anvil");
    let key = format!("0x{}", hex::encode(anvil.keys()[0].to_bytes()));

    let dir = tempfile::tempdir().unwrap();
    write_procurement_artifact(dir.path());
    let config = write_config(
        dir.path(),
        "anvil",
        &anvil.endpoint(),
        &format!("    chain_id: {}\n    accounts:\n      - \"{}\"", anvil.chain_id(), key),
    );

    let args = Args {
        config,
        network: None,
        contract: "ProcurementSystem".to_string(),
        artifacts: None,
    };
    let deployment = cli::run(&args).await.expect("Deployment should succeed");

    assert_eq!(deployment.network, "anvil");
    assert_eq!(deployment.chain_id, anvil.chain_id());
    assert_eq!(deployment.deployer, anvil.addresses()[0]);
    assert!(!deployment.address.is_zero());

    let provider = ProviderBuilder::new().on_http(anvil.endpoint().parse().unwrap());
    let code = provider.get_code_at(deployment.address).await.unwrap();
    assert_eq!(code.to_vec(), vec![0x00]);
}

#[tokio::test]
#[ignore = "requires the anvil binary on PATH"]
async fn test_chain_id_mismatch_is_rejected() {
    let anvil = Anvil::new().try_spawn().expect("Failed to spawn anvil");

    let dir = tempfile::tempdir().unwrap();
    write_procurement_artifact(dir.path());
    let config = write_config(dir.path(), "anvil", &anvil.endpoint(), "    chain_id: 1");

    let args = Args {
        config,
        network: None,
        contract: "ProcurementSystem".to_string(),
        artifacts: None,
    };
    let err = cli::run(&args)
        .await
        .expect_err("a wrong chain_id must abort before sending anything");

    let message = format!("{:#}", err);
    assert!(
        message.contains("configured with chain_id 1 but the node")
            && message.contains(&format!("reports {}", anvil.chain_id())),
        "unexpected error: {}",
        message
    );
}

#[tokio::test]
#[ignore = "requires the anvil binary on PATH"]
async fn test_reverting_constructor_fails_deployment() {
    let anvil = Anvil::new().try_spawn().expect("Failed to spawn anvil");
    let key = format!("0x{}", hex::encode(anvil.keys()[0].to_bytes()));

    let dir = tempfile::tempdir().unwrap();
    write_artifact_with_bytecode(dir.path(), REVERTING_BYTECODE);
    let config = write_config(
        dir.path(),
        "anvil",
        &anvil.endpoint(),
        &format!("    accounts:\n      - \"{}\"", key),
    );

    let args = Args {
        config,
        network: None,
        contract: "ProcurementSystem".to_string(),
        artifacts: None,
    };
    let err = cli::run(&args)
        .await
        .expect_err("a reverting constructor must not yield an address");

    let message = format!("{:#}", err);
    assert!(
        message.contains("Failed to deploy ProcurementSystem") || message.contains("reverted"),
        "unexpected error: {}",
        message
    );
}

#[test]
#[ignore = "requires the anvil binary on PATH"]
fn test_binary_deploys_with_node_accounts() {
    let anvil = Anvil::new().try_spawn().expect("Failed to spawn anvil");

    let dir = tempfile::tempdir().unwrap();
    write_procurement_artifact(dir.path());
    let config = write_config(dir.path(), "localhost", &anvil.endpoint(), "");

    let output = deployer_command(&config)
        .output()
        .expect("Failed to run deployer binary");

    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = stdout.lines();
    let address = lines
        .next()
        .and_then(|line| line.strip_prefix("ProcurementSystem deployed to: "))
        .expect("missing address line");
    assert!(Address::from_str(address).is_ok(), "bad address: {}", address);
    assert_eq!(lines.next(), Some("Contract is deployed!"));
}
