use std::path::Path;

use eyre::{Result, eyre};

use super::{Project, ProjectType, foundry, hardhat};

/// Detect the project type based on configuration files present in the directory
pub fn detect(path: &Path) -> Result<Project> {
    match project_type(path) {
        Some(ProjectType::Foundry) => {
            tracing::info!("Detected Foundry project at {:?}", path);
            foundry::load_project(path)
        }
        Some(ProjectType::Hardhat) => {
            tracing::info!("Detected Hardhat project at {:?}", path);
            hardhat::load_project(path)
        }
        None => Err(eyre!(
            "No Foundry or Hardhat project detected at {:?}\n\
             Expected: foundry.toml, hardhat.config.js, or hardhat.config.ts",
            path
        )),
    }
}

/// Foundry wins when both configurations are present
fn project_type(path: &Path) -> Option<ProjectType> {
    if path.join("foundry.toml").exists() {
        Some(ProjectType::Foundry)
    } else if path.join("hardhat.config.js").exists() || path.join("hardhat.config.ts").exists() {
        Some(ProjectType::Hardhat)
    } else {
        None
    }
}
