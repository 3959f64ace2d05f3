use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "marksheet-merge.toml";

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# marksheet-merge configuration. CLI flags override these values.

[generate]
# Worker threads for row processing: 1 = sequential, 0 = one per core.
jobs = 1
# Warn on stderr about bracketed tokens left unreplaced in the output.
warn_unresolved = true
# Bundle filename used when --zip is given without a path.
zip_name = "generated_docs.zip"

[naming]
# Prefix for rows whose learner name and registration number are both blank.
fallback_prefix = "output"
"#;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub generate: GenerateSection,
    #[serde(default)]
    pub naming: NamingSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct GenerateSection {
    #[serde(default)]
    pub jobs: Option<usize>,
    #[serde(default)]
    pub warn_unresolved: Option<bool>,
    #[serde(default)]
    pub zip_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct NamingSection {
    #[serde(default)]
    pub fallback_prefix: Option<String>,
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parse config: {}", path.display()))
}

/// Searches for `marksheet-merge.toml` upward from `start_dir`, the same way
/// the input's surrounding project directory would be probed by hand.
pub fn find_default_config(start_dir: &Path) -> Option<PathBuf> {
    find_file_upwards(start_dir, CONFIG_FILE_NAME, 4)
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() && !force {
        return Err(anyhow!(
            "config already exists: {} (use --force to overwrite)",
            path.display()
        ));
    }
    std::fs::write(&path, DEFAULT_CONFIG_TEMPLATE)
        .with_context(|| format!("write config: {}", path.display()))?;
    Ok(path)
}
