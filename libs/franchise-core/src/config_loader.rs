//! Configuration Loader
//!
//! Resolves a [`ClientConfig`] from defaults, configuration files and the
//! environment, in increasing order of precedence. Command-line flags are
//! applied by the caller as a final [`ConfigOverlay`].

use crate::config::{ClientConfig, ConfigOverlay};
use crate::error::Result;
use franchise_common::utils::user_config_dir;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_FILE_STEM: &str = "franchise";
const CONFIG_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Configuration loader that handles multiple sources with precedence
pub struct ConfigLoader {
    base_config: ClientConfig,
    /// Files tried in order; later files win
    config_paths: Vec<PathBuf>,
    load_from_env: bool,
    /// Applied after files and environment
    overrides: ConfigOverlay,
    validate: bool,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_config: ClientConfig::default(),
            config_paths: Self::default_config_paths(),
            load_from_env: true,
            overrides: ConfigOverlay::default(),
            validate: true,
        }
    }

    #[must_use]
    pub fn with_base_config(mut self, config: ClientConfig) -> Self {
        self.base_config = config;
        self
    }

    #[must_use]
    pub fn add_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_paths.push(path.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn with_config_paths<P: AsRef<Path>>(mut self, paths: Vec<P>) -> Self {
        self.config_paths = paths
            .into_iter()
            .map(|p| p.as_ref().to_path_buf())
            .collect();
        self
    }

    #[must_use]
    pub fn with_env_loading(mut self, enabled: bool) -> Self {
        self.load_from_env = enabled;
        self
    }

    #[must_use]
    pub fn without_env_loading(self) -> Self {
        self.with_env_loading(false)
    }

    /// Overrides with the highest precedence, typically from CLI flags
    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverlay) -> Self {
        self.overrides = overrides;
        self
    }

    #[must_use]
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate = enabled;
        self
    }

    /// Load configuration from all sources
    ///
    /// An unreadable file is skipped with a warning. A malformed environment
    /// variable or an invalid final configuration is an error.
    ///
    /// # Errors
    /// Returns an error if configuration cannot be loaded or is invalid
    pub fn load(&self) -> Result<ClientConfig> {
        let mut config = self.base_config.clone();
        debug!("Starting configuration loading");

        for path in &self.config_paths {
            if !path.exists() {
                debug!("Configuration file not found: {}", path.display());
                continue;
            }
            match ConfigOverlay::from_file(path) {
                Ok(overlay) => {
                    config.apply(&overlay);
                    info!("Loaded configuration from: {}", path.display());
                }
                Err(e) => {
                    warn!(
                        "Failed to load configuration from {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }

        if self.load_from_env {
            let overlay = ConfigOverlay::from_env()?;
            if !overlay.is_empty() {
                debug!("Applying configuration from environment variables");
                config.apply(&overlay);
            }
        }

        config.apply(&self.overrides);

        if self.validate {
            config.validate()?;
        }

        Ok(config)
    }

    /// Config files tried by default, user directory first
    #[must_use]
    pub fn default_config_paths() -> Vec<PathBuf> {
        let user_dir = user_config_dir();
        let names: Vec<String> = CONFIG_EXTENSIONS
            .iter()
            .map(|ext| format!("{CONFIG_FILE_STEM}.{ext}"))
            .collect();

        // Project-local files override user-level ones
        names
            .iter()
            .map(|name| user_dir.join(name))
            .chain(names.iter().map(PathBuf::from))
            .collect()
    }

    /// Write a sample configuration file
    ///
    /// # Errors
    /// Returns an error if the file cannot be created
    pub fn create_sample_config<P: AsRef<Path>>(path: P, format: &str) -> Result<()> {
        ClientConfig::default().to_file(path, format)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load configuration from the default sources
///
/// # Errors
/// Returns an error if configuration cannot be loaded
pub fn load_config() -> Result<ClientConfig> {
    ConfigLoader::new().load()
}
