use std::collections::HashMap;
use std::fs;
use std::path::Path;

use eyre::{Result, WrapErr, eyre};
use serde::{Deserialize, Serialize};

use super::{Project, ProjectType, project_name};

/// The parts of foundry.toml that locate compiler output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoundryConfig {
    #[serde(default)]
    pub profile: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub out: Option<String>,
    pub build_info_path: Option<String>,
}

impl FoundryConfig {
    fn default_profile(&self) -> Option<&ProfileConfig> {
        self.profile.get("default")
    }

    pub fn out_dir(&self) -> &str {
        self.default_profile()
            .and_then(|p| p.out.as_deref())
            .unwrap_or("out")
    }

    /// Defaults to `<out>/build-info`
    pub fn build_info_dir(&self) -> Option<&str> {
        self.default_profile()
            .and_then(|p| p.build_info_path.as_deref())
    }
}

/// Load a Foundry project from the given path
pub fn load_project(path: &Path) -> Result<Project> {
    let config_path = path.join("foundry.toml");

    if !config_path.exists() {
        return Err(eyre!("foundry.toml not found at {:?}", path));
    }

    let config_content = fs::read_to_string(&config_path)
        .wrap_err_with(|| format!("Failed to read {:?}", config_path))?;

    let config: FoundryConfig =
        toml::from_str(&config_content).wrap_err("Failed to parse foundry.toml")?;

    let artifacts_dir = path.join(config.out_dir());
    let build_info_dir = match config.build_info_dir() {
        Some(dir) => path.join(dir),
        None => artifacts_dir.join("build-info"),
    };

    Ok(Project {
        project_type: ProjectType::Foundry,
        root: path.to_path_buf(),
        name: project_name(path),
        artifacts_dir,
        build_info_dir,
    })
}
