use crate::error::{CliError, CliResult};
use leads_db_core::StoreLimits;
use leads_db_shard::ShardConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.toml";

/// Contents of `{store}/config.toml`. Missing sections and keys take defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub shards: ShardConfig,
    pub store: StoreLimits,
}

/// The store directory, if it has been initialized.
pub fn require_store_dir(store: &Path) -> CliResult<PathBuf> {
    if store.is_dir() {
        Ok(store.to_path_buf())
    } else {
        Err(CliError::NoStore(store.to_path_buf()))
    }
}

/// Read `config.toml` from the store directory; defaults when absent.
pub fn load_config(store_dir: &Path) -> CliResult<CliConfig> {
    let path = store_dir.join(CONFIG_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CliConfig::default()),
        Err(e) => {
            return Err(CliError::Config(format!(
                "failed to read {}: {e}",
                path.display()
            )))
        }
    };
    let config: CliConfig = toml::from_str(&content)?;
    config
        .shards
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;
    if config.store.max_batch_ops == 0 || config.store.max_document_bytes == 0 {
        return Err(CliError::Config(
            "store limits must be greater than 0".to_string(),
        ));
    }
    Ok(config)
}

/// Create the store directory and write `template` as its config unless one
/// already exists. Returns whether a config file was written.
pub fn init_store_dir(store: &Path, template: &str) -> CliResult<bool> {
    fs::create_dir_all(store).map_err(|e| {
        CliError::Config(format!("cannot create {}: {e}", store.display()))
    })?;
    let path = store.join(CONFIG_FILE);
    if path.exists() {
        return Ok(false);
    }
    fs::write(&path, template).map_err(|e| {
        CliError::Config(format!("cannot write {}: {e}", path.display()))
    })?;
    Ok(true)
}
