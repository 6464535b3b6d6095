use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use alloy::json_abi::JsonAbi;
use alloy::primitives::Bytes;
use serde_json::Value;

use super::handle::encode_constructor;
use crate::error::{DeployError, Result};
use crate::project::Project;

/// Compiled contract: ABI plus creation bytecode
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub name: String,
    /// Source file the contract was compiled from, e.g. `contracts/Token.sol`
    pub source_path: Option<String>,
    pub abi: Arc<JsonAbi>,
    pub bytecode: Bytes,
}

impl ContractArtifact {
    /// Creation bytecode followed by the ABI-encoded constructor arguments
    pub fn deploy_code(&self, args: &[Value]) -> Result<Bytes> {
        let encoded_args = encode_constructor(&self.abi, args)?;
        let mut code = self.bytecode.to_vec();
        code.extend_from_slice(&encoded_args);
        Ok(code.into())
    }
}

/// What an explorer needs to re-compile and match a contract
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationSource {
    /// Fully qualified `path:Name`
    pub contract_path: String,
    /// Long compiler version, e.g. `v0.8.20+commit.a1b79de6`
    pub compiler_version: String,
    pub standard_json_input: Value,
}

#[derive(Debug)]
enum Backing {
    Directory {
        artifacts_dir: PathBuf,
        build_info_dir: PathBuf,
    },
    Memory {
        artifacts: HashMap<String, ContractArtifact>,
        sources: HashMap<String, VerificationSource>,
    },
}

/// Looks up compiled artifacts by source name (`Token` or `contracts/Token.sol:Token`)
#[derive(Debug)]
pub struct ArtifactStore {
    backing: Backing,
}

impl ArtifactStore {
    pub fn from_project(project: &Project) -> Self {
        Self {
            backing: Backing::Directory {
                artifacts_dir: project.artifacts_dir.clone(),
                build_info_dir: project.build_info_dir.clone(),
            },
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backing: Backing::Memory {
                artifacts: HashMap::new(),
                sources: HashMap::new(),
            },
        }
    }

    /// Adds an artifact to an in-memory store; ignored for directory stores
    pub fn insert(&mut self, artifact: ContractArtifact) {
        if let Backing::Memory { artifacts, .. } = &mut self.backing {
            artifacts.insert(artifact.name.clone(), artifact);
        }
    }

    pub fn insert_source(&mut self, name: &str, source: VerificationSource) {
        if let Backing::Memory { sources, .. } = &mut self.backing {
            sources.insert(name.to_string(), source);
        }
    }

    pub fn load(&self, source_name: &str) -> Result<ContractArtifact> {
        let (path, name) = split_source_name(source_name);
        match &self.backing {
            Backing::Memory { artifacts, .. } => artifacts
                .get(name)
                .cloned()
                .ok_or_else(|| DeployError::artifact(format!("no artifact for {source_name}"))),
            Backing::Directory { artifacts_dir, .. } => {
                let file = find_artifact_file(artifacts_dir, path, name)?.ok_or_else(|| {
                    DeployError::artifact(format!(
                        "no artifact for {source_name} under {}",
                        artifacts_dir.display()
                    ))
                })?;
                parse_artifact_file(&file, name)
            }
        }
    }

    /// Load an ABI for an already-deployed contract
    pub fn load_abi(&self, source_name: &str) -> Result<Arc<JsonAbi>> {
        Ok(self.load(source_name)?.abi)
    }

    pub fn verification_source(&self, source_name: &str) -> Result<VerificationSource> {
        let (path, name) = split_source_name(source_name);
        match &self.backing {
            Backing::Memory { sources, .. } => sources.get(name).cloned().ok_or_else(|| {
                DeployError::artifact(format!("no verification source for {source_name}"))
            }),
            Backing::Directory { build_info_dir, .. } => {
                let path = match path {
                    Some(path) => Some(path.to_string()),
                    None => self.load(source_name)?.source_path,
                };
                find_in_build_info(build_info_dir, path.as_deref(), name)
            }
        }
    }
}

fn split_source_name(source_name: &str) -> (Option<&str>, &str) {
    match source_name.rsplit_once(':') {
        Some((path, name)) => (Some(path), name),
        None => (None, source_name),
    }
}

/// Searches `<dir>/**/<File>.sol/<Name>.json`, skipping build-info and debug files
fn find_artifact_file(dir: &Path, source_path: Option<&str>, name: &str) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }
    let wanted_file = format!("{}.json", name);
    let wanted_parent = source_path.and_then(|p| Path::new(p).file_name().map(|f| f.to_owned()));

    let entries = fs::read_dir(dir)
        .map_err(|e| DeployError::artifact(format!("failed to read {}: {e}", dir.display())))?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if path.file_name().is_some_and(|n| n == "build-info") {
                continue;
            }
            if let Some(found) = find_artifact_file(&path, source_path, name)? {
                return Ok(Some(found));
            }
        } else if path.file_name().is_some_and(|n| n == wanted_file.as_str()) {
            let parent = path.parent().and_then(|p| p.file_name());
            let parent_matches = match &wanted_parent {
                Some(wanted) => parent == Some(wanted.as_os_str()),
                None => parent.is_some_and(|p| p.to_string_lossy().ends_with(".sol")),
            };
            if parent_matches {
                return Ok(Some(path));
            }
        }
    }

    Ok(None)
}

fn parse_artifact_file(path: &Path, name: &str) -> Result<ContractArtifact> {
    let content = fs::read_to_string(path)
        .map_err(|e| DeployError::artifact(format!("failed to read {}: {e}", path.display())))?;
    let artifact: Value = serde_json::from_str(&content)
        .map_err(|e| DeployError::artifact(format!("failed to parse {}: {e}", path.display())))?;
    parse_artifact(&artifact, name)
}

/// Accepts both Hardhat (`bytecode: "0x.."`) and Foundry (`bytecode.object`) layouts
pub(crate) fn parse_artifact(artifact: &Value, name: &str) -> Result<ContractArtifact> {
    let abi_value = artifact
        .get("abi")
        .ok_or_else(|| DeployError::artifact(format!("artifact for {name} has no abi")))?;
    let abi: JsonAbi = serde_json::from_value(abi_value.clone())
        .map_err(|e| DeployError::artifact(format!("invalid abi for {name}: {e}")))?;

    let bytecode_hex = match artifact.get("bytecode") {
        Some(Value::String(s)) => s.as_str(),
        Some(obj) => obj.get("object").and_then(Value::as_str).unwrap_or_default(),
        None => "",
    };
    if bytecode_hex.contains("__") {
        return Err(DeployError::artifact(format!(
            "{name} has unlinked library placeholders"
        )));
    }
    let bytecode = hex::decode(bytecode_hex.trim_start_matches("0x"))
        .map_err(|e| DeployError::artifact(format!("invalid bytecode for {name}: {e}")))?;
    if bytecode.is_empty() {
        return Err(DeployError::artifact(format!(
            "{name} has no creation bytecode (abstract contract or interface?)"
        )));
    }

    let source_path = artifact
        .get("sourceName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            artifact
                .pointer("/metadata/settings/compilationTarget")
                .and_then(Value::as_object)
                .and_then(|targets| targets.keys().next().cloned())
        });

    Ok(ContractArtifact {
        name: name.to_string(),
        source_path,
        abi: Arc::new(abi),
        bytecode: bytecode.into(),
    })
}

fn find_in_build_info(dir: &Path, source_path: Option<&str>, name: &str) -> Result<VerificationSource> {
    let entries = fs::read_dir(dir)
        .map_err(|e| DeployError::artifact(format!("failed to read {}: {e}", dir.display())))?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        let Ok(build_info) = serde_json::from_str::<Value>(&content) else {
            tracing::warn!("Skipping unreadable build info {:?}", path);
            continue;
        };
        if let Some(source) = verification_source_from_build_info(&build_info, source_path, name)? {
            return Ok(source);
        }
    }

    Err(DeployError::artifact(format!(
        "no build info in {} contains {name}",
        dir.display()
    )))
}

pub(crate) fn verification_source_from_build_info(
    build_info: &Value,
    source_path: Option<&str>,
    name: &str,
) -> Result<Option<VerificationSource>> {
    let Some(contracts) = build_info
        .pointer("/output/contracts")
        .and_then(Value::as_object)
    else {
        return Ok(None);
    };

    let found = contracts.iter().find_map(|(path, by_name)| {
        let matches_path = source_path.is_none_or(|wanted| wanted == path);
        (matches_path && by_name.get(name).is_some()).then(|| (path.clone(), &by_name[name]))
    });
    let Some((path, contract_output)) = found else {
        return Ok(None);
    };

    let input = build_info
        .get("input")
        .cloned()
        .ok_or_else(|| DeployError::artifact("build info has no compiler input"))?;

    let version = build_info
        .get("solcLongVersion")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| metadata_compiler_version(contract_output))
        .ok_or_else(|| DeployError::artifact(format!("no compiler version for {name}")))?;

    Ok(Some(VerificationSource {
        contract_path: format!("{path}:{name}"),
        compiler_version: format!("v{}", version.trim_start_matches('v')),
        standard_json_input: input,
    }))
}

/// solc emits `metadata` as a JSON string
fn metadata_compiler_version(contract_output: &Value) -> Option<String> {
    let metadata = contract_output.get("metadata")?;
    let parsed: Value = match metadata {
        Value::String(s) => serde_json::from_str(s).ok()?,
        other => other.clone(),
    };
    parsed
        .pointer("/compiler/version")
        .and_then(Value::as_str)
        .map(str::to_string)
}
