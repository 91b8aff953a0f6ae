mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::Context;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CHEATCODE_CONFIG";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.index
            .splitter()
            .validate()
            .context("invalid [index] settings")?;
        self.retrieval
            .validated()
            .context("invalid [retrieval] settings")?;
        if self.chat.max_context_tokens == 0 {
            anyhow::bail!("invalid [chat] settings: max_context_tokens must be greater than zero");
        }
        if self.llm.embed_batch_size == 0 {
            anyhow::bail!("invalid [llm] settings: embed_batch_size must be greater than zero");
        }
        Ok(())
    }
}

/// Resolve the config file path: explicit flag, then `CHEATCODE_CONFIG`,
/// then `<project>/.cheatcode/config.toml`.
#[must_use]
pub fn resolve_config_path(cli_arg: Option<&Path>, project: &Path) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_owned();
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    project
        .join(cheatcode_index::store::DATA_DIR)
        .join("config.toml")
}
