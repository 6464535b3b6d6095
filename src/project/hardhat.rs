use std::path::Path;

use eyre::{Result, eyre};

use super::{Project, ProjectType, project_name};

/// Load a Hardhat project from the given path
pub fn load_project(path: &Path) -> Result<Project> {
    let config_js = path.join("hardhat.config.js");
    let config_ts = path.join("hardhat.config.ts");

    if !config_js.exists() && !config_ts.exists() {
        return Err(eyre!(
            "hardhat.config.js or hardhat.config.ts not found at {:?}",
            path
        ));
    }

    // Hardhat uses conventional directories
    let artifacts_dir = path.join("artifacts");
    Ok(Project {
        project_type: ProjectType::Hardhat,
        root: path.to_path_buf(),
        name: project_name(path),
        build_info_dir: artifacts_dir.join("build-info"),
        artifacts_dir,
    })
}
