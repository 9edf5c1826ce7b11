use alloy::json_abi::JsonAbi;
use alloy::primitives::Bytes;
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Compiler output for a single contract
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    pub source_name: String,
    pub abi: JsonAbi,
    pub bytecode: String,
    #[serde(skip)]
    pub path: PathBuf,
}

/// Debug sidecar (`<Name>.dbg.json`) pointing at the build-info file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildInfo {
    solc_version: String,
}

impl ContractArtifact {
    /// Read and parse an artifact file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
        let mut artifact: ContractArtifact = serde_json::from_str(&content)
            .context(format!("Failed to parse artifact {}", path.display()))?;
        artifact.path = path.to_path_buf();
        Ok(artifact)
    }

    /// `sourceName:contractName`
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }

    /// Decoded creation code
    pub fn creation_code(&self) -> Result<Bytes> {
        let code = self.bytecode.trim();
        let hex_part = code.strip_prefix("0x").unwrap_or(code);

        if hex_part.is_empty() {
            bail!(
                "{} has no bytecode (is it an interface or abstract contract?)",
                self.fully_qualified_name()
            );
        }

        if hex_part.contains("__") {
            bail!(
                "{} has unlinked library references and cannot be deployed as-is",
                self.fully_qualified_name()
            );
        }

        let bytes = hex::decode(hex_part)
            .context(format!("Invalid bytecode in {}", self.path.display()))?;
        Ok(Bytes::from(bytes))
    }

    /// Number of constructor parameters declared in the ABI
    pub fn constructor_arity(&self) -> usize {
        self.abi
            .constructor
            .as_ref()
            .map(|ctor| ctor.inputs.len())
            .unwrap_or(0)
    }

    /// Compiler version recorded in the build-info file, when one is present
    pub fn compiler_version(&self) -> Result<Option<String>> {
        let Some(dbg_path) = self.debug_file_path() else {
            return Ok(None);
        };
        if !dbg_path.exists() {
            return Ok(None);
        }

        let dbg: DebugFile = serde_json::from_str(
            &fs::read_to_string(&dbg_path)
                .context(format!("Failed to read {}", dbg_path.display()))?,
        )
        .context(format!("Failed to parse {}", dbg_path.display()))?;

        let build_info_path = dbg_path
            .parent()
            .map(|dir| dir.join(&dbg.build_info))
            .unwrap_or(dbg.build_info);

        let build_info: BuildInfo = serde_json::from_str(
            &fs::read_to_string(&build_info_path)
                .context(format!("Failed to read {}", build_info_path.display()))?,
        )
        .context(format!("Failed to parse {}", build_info_path.display()))?;

        Ok(Some(build_info.solc_version))
    }

    fn debug_file_path(&self) -> Option<PathBuf> {
        let stem = self.path.file_stem()?.to_str()?;
        Some(self.path.with_file_name(format!("{}.dbg.json", stem)))
    }
}

/// Lookup of compiled artifacts under a root directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find an artifact by contract name, or by `path/File.sol:Name`
    pub fn find(&self, name: &str) -> Result<ContractArtifact> {
        if !self.root.is_dir() {
            bail!(
                "Artifacts directory {} does not exist. Compile the contracts first.",
                self.root.display()
            );
        }

        let (source_name, contract_name) = match name.rsplit_once(':') {
            Some((source, contract)) => (Some(source), contract),
            None => (None, name),
        };

        let mut candidates = Vec::new();
        self.collect(&self.root, contract_name, &mut candidates)?;

        let mut matches: Vec<ContractArtifact> = candidates
            .iter()
            .map(|path| ContractArtifact::from_file(path))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .filter(|artifact| artifact.contract_name == contract_name)
            .filter(|artifact| source_name.map_or(true, |s| artifact.source_name == s))
            .collect();

        debug!(
            "Found {} artifact(s) for {} under {}",
            matches.len(),
            name,
            self.root.display()
        );

        match matches.len() {
            0 => Err(anyhow!(
                "Artifact for contract {} not found under {}",
                name,
                self.root.display()
            )),
            1 => Ok(matches.remove(0)),
            _ => {
                let mut names: Vec<String> =
                    matches.iter().map(|a| a.fully_qualified_name()).collect();
                names.sort();
                Err(anyhow!(
                    "Ambiguous contract name {}. Use a fully qualified name: {}",
                    name,
                    names.join(", ")
                ))
            }
        }
    }

    fn collect(&self, dir: &Path, contract_name: &str, out: &mut Vec<PathBuf>) -> Result<()> {
        let file_name = format!("{}.json", contract_name);

        for entry in fs::read_dir(dir).context(format!("Failed to list {}", dir.display()))? {
            let path = entry?.path();
            if path.is_dir() {
                // build-info holds compiler inputs/outputs, not artifacts
                if path.file_name().is_some_and(|n| n == "build-info") {
                    continue;
                }
                self.collect(&path, contract_name, out)?;
            } else if path.file_name().is_some_and(|n| n.to_str() == Some(file_name.as_str())) {
                out.push(path);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use serde_json::json;
    use std::fs;
    use std::path::Path;

    /// Init code returning a one-byte runtime (`STOP`)
    pub const TRIVIAL_BYTECODE: &str = "0x600060005360016000f3";

    pub fn write_artifact(
        root: &Path,
        source_name: &str,
        contract_name: &str,
        bytecode: &str,
        abi: serde_json::Value,
    ) {
        let dir = root.join(source_name);
        fs::create_dir_all(&dir).unwrap();
        let artifact = json!({
            "_format": "hh-sol-artifact-1",
            "contractName": contract_name,
            "sourceName": source_name,
            "abi": abi,
            "bytecode": bytecode,
            "deployedBytecode": "0x00",
            "linkReferences": {},
            "deployedLinkReferences": {}
        });
        fs::write(
            dir.join(format!("{}.json", contract_name)),
            serde_json::to_string_pretty(&artifact).unwrap(),
        )
        .unwrap();
    }

    pub fn write_build_info(root: &Path, source_name: &str, contract_name: &str, solc: &str) {
        let build_info_dir = root.join("build-info");
        fs::create_dir_all(&build_info_dir).unwrap();
        fs::write(
            build_info_dir.join("abc123.json"),
            json!({ "_format": "hh-sol-build-info-1", "solcVersion": solc }).to_string(),
        )
        .unwrap();

        let depth = Path::new(source_name).components().count();
        let build_info = format!("{}build-info/abc123.json", "../".repeat(depth));
        fs::write(
            root.join(source_name)
                .join(format!("{}.dbg.json", contract_name)),
            json!({ "_format": "hh-sol-dbg-1", "buildInfo": build_info }).to_string(),
        )
        .unwrap();
    }
}
