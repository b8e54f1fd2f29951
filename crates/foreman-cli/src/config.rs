//! Configuration file management for foreman.
//!
//! Provides a TOML config file at `~/.config/foreman/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default. The env
//! var surface itself is read once by `foreman_core::Config::from_env`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub orchestrator: OrchestratorSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrchestratorSection {
    /// Orchestrator name reported in status snapshots.
    pub name: String,
    /// Default parallelism cap for workflow execution.
    pub max_parallel_steps: usize,
    /// Default log level when ORCHESTRATOR_LOG_LEVEL is unset.
    pub log_level: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorSection {
                name: "foreman".to_string(),
                max_parallel_steps: 5,
                log_level: "info".to_string(),
            },
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the foreman config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/foreman` or `~/.config/foreman`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("foreman");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("foreman")
}

/// Return the path to the foreman config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file, or defaults if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;
    Ok(())
}

/// `foreman init`: write a config file with defaults.
pub fn init(force: bool) -> Result<()> {
    let path = config_path();
    if path.exists() && !force {
        bail!(
            "config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    save_config(&ConfigFile::default())?;
    println!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrips_through_toml() {
        let config = ConfigFile::default();
        let contents = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&contents).unwrap();
        assert_eq!(parsed.orchestrator.name, "foreman");
        assert_eq!(parsed.orchestrator.max_parallel_steps, 5);
        assert_eq!(parsed.orchestrator.log_level, "info");
    }

    #[test]
    fn config_dir_honors_xdg_layout() {
        // Whatever the environment, the directory ends with "foreman".
        let dir = config_dir();
        assert_eq!(dir.file_name().unwrap(), "foreman");
    }
}
