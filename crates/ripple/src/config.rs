//! Configuration file handling.
//!
//! Settings live in `.ripple/config.yaml`. Every field has a default, so a
//! partial file (or no file at all) is valid:
//!
//! ```yaml
//! impact:
//!   decay: 0.6
//!   breaking-bonus: 0.3
//!   weights: { imports: 1.0, calls: 0.7, config-ref: 0.4 }
//!   thresholds: { critical: 0.8, high: 0.6, medium: 0.3 }
//! executor:
//!   max-workers: 4
//!   failure-policy: stop-on-fail
//!   retry: { max-attempts: 1, backoff: fixed, delay-ms: 100, max-delay-ms: 10000 }
//! ```

use crate::error::{Error, Result};
use crate::executor::{ExecutorOptions, FailurePolicy, RetryPolicy};
use crate::impact::ImpactConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Name of the ripple directory
pub const RIPPLE_DIR_NAME: &str = ".ripple";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Maximum directory depth to traverse when searching for the ripple root
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Executor section of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExecutorConfig {
    /// Size of the worker pool
    pub max_workers: usize,
    /// Dependent handling after a terminal failure
    pub failure_policy: FailurePolicy,
    /// Retry policy for tasks that do not set their own
    pub retry: RetryPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let options = ExecutorOptions::default();
        Self {
            max_workers: options.max_workers,
            failure_policy: options.failure_policy,
            retry: RetryPolicy::default(),
        }
    }
}

impl ExecutorConfig {
    /// The executor options this section describes.
    #[must_use]
    pub fn options(&self) -> ExecutorOptions {
        ExecutorOptions {
            max_workers: self.max_workers,
            failure_policy: self.failure_policy,
        }
    }
}

/// Configuration file structure for ripple
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RippleConfig {
    /// Impact scoring parameters
    pub impact: ImpactConfig,
    /// Executor settings
    pub executor: ExecutorConfig,
}

impl RippleConfig {
    /// Load and validate configuration from a file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, is not valid YAML, or holds invalid values.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Fails for an unreadable, malformed or invalid file.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if fs::try_exists(path).await? {
            Self::load(path).await
        } else {
            debug!(path = %path.display(), "no configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Fails if serialization or the write fails.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Check every value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.impact.validate().map_err(Error::Config)?;
        if self.executor.max_workers == 0 {
            return Err(Error::Config("max-workers must be at least 1".to_string()));
        }
        if self.executor.retry.max_attempts == 0 {
            return Err(Error::Config("max-attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Result of [`init`]
#[derive(Debug)]
pub struct InitResult {
    /// Path to the created ripple directory
    pub ripple_dir: PathBuf,
    /// Path to the created config file
    pub config_file: PathBuf,
}

/// Create `.ripple/config.yaml` with default settings under `base_dir`.
///
/// # Errors
///
/// Fails if the directory already exists or a file system operation fails.
pub async fn init(base_dir: &Path) -> Result<InitResult> {
    let ripple_dir = base_dir.join(RIPPLE_DIR_NAME);
    if fs::try_exists(&ripple_dir).await? {
        return Err(Error::Config(format!(
            "ripple is already initialized here. Found existing '{RIPPLE_DIR_NAME}'"
        )));
    }

    fs::create_dir_all(&ripple_dir).await?;
    let config_file = ripple_dir.join(CONFIG_FILE_NAME);
    RippleConfig::default().save(&config_file).await?;

    Ok(InitResult {
        ripple_dir,
        config_file,
    })
}

/// Find the directory containing `.ripple/`, searching upwards from `start_dir`.
#[must_use]
pub fn find_ripple_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if current.join(RIPPLE_DIR_NAME).exists() {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}

/// Default config path for `start_dir`: the nearest `.ripple/config.yaml`
/// above it, or one directly inside it.
#[must_use]
pub fn default_config_path(start_dir: &Path) -> PathBuf {
    find_ripple_root(start_dir)
        .unwrap_or_else(|| start_dir.to_path_buf())
        .join(RIPPLE_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}
