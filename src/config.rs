//! Configuration management for packscout
//!
//! Settings are loaded from environment variables with sensible defaults.
//! Command-line flags override individual values after loading.
//!
//! # Environment Variables
//!
//! - `PACKSCOUT_LOG_LEVEL`: Logging level - default: "info"
//! - `PACKSCOUT_MAX_DEPTH`: Deepest directory level scanned, 0 for unlimited - default: unlimited
//! - `PACKSCOUT_MAX_FILES`: Files examined before a scan is truncated - default: "10000"
//! - `PACKSCOUT_HEAD_BYTES`: Bytes read per file for shebang detection - default: "512"
//! - `PACKSCOUT_PARALLEL_SCAN`: Walk top-level directories in parallel (true|false) - default: "false"
//! - `PACKSCOUT_TIMEOUT`: Overall pipeline timeout in seconds - default: "30"
//! - `PACKSCOUT_STRICT_RENDER`: Reject metadata the template never uses (true|false) - default: "false"
//! - `PACKSCOUT_REGISTRY`: Buildpack registry file (YAML or TOML) - default:
//!   `<config dir>/packscout/registry.yaml` when present, otherwise the built-in packs
//!
//! # Example
//!
//! ```no_run
//! use packscout::PackscoutConfig;
//!
//! let config = PackscoutConfig::default();
//! config.validate().expect("Invalid configuration");
//!
//! let registry = config.load_registry().expect("Invalid registry");
//! println!("{} buildpacks registered", registry.len());
//! ```

use crate::buildpack::BuildpackRegistry;
use crate::error::RegistryError;
use crate::pipeline::PipelineConfig;
use crate::scan::ScanConfig;
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_MAX_FILES: usize = 10_000;
const DEFAULT_HEAD_BYTES: usize = 512;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const REGISTRY_FILE_NAME: &str = "registry.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackscoutConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Deepest directory level scanned, `None` for unlimited
    pub max_depth: Option<usize>,

    pub max_files: usize,

    pub head_bytes: usize,

    pub parallel_scan: bool,

    /// Overall pipeline timeout in seconds
    pub timeout_secs: u64,

    pub strict_render: bool,

    /// Registry file replacing or extending the built-in buildpacks
    pub registry_path: Option<PathBuf>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn default_registry_path() -> Option<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("packscout").join(REGISTRY_FILE_NAME))
        .filter(|path| path.is_file())
}

impl Default for PackscoutConfig {
    /// Loads configuration from `PACKSCOUT_*` environment variables, falling
    /// back to defaults for anything unset or unparsable.
    fn default() -> Self {
        let log_level = env::var("PACKSCOUT_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        let max_depth = env_parse::<usize>("PACKSCOUT_MAX_DEPTH").filter(|d| *d > 0);

        let max_files = env_parse("PACKSCOUT_MAX_FILES").unwrap_or(DEFAULT_MAX_FILES);
        let head_bytes = env_parse("PACKSCOUT_HEAD_BYTES").unwrap_or(DEFAULT_HEAD_BYTES);
        let parallel_scan = env_parse("PACKSCOUT_PARALLEL_SCAN").unwrap_or(false);
        let timeout_secs = env_parse("PACKSCOUT_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_SECS);
        let strict_render = env_parse("PACKSCOUT_STRICT_RENDER").unwrap_or(false);

        let registry_path = env::var("PACKSCOUT_REGISTRY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .or_else(default_registry_path);

        Self {
            log_level,
            max_depth,
            max_files,
            head_bytes,
            parallel_scan,
            timeout_secs,
            strict_render,
            registry_path,
        }
    }
}

impl PackscoutConfig {
    /// Checks that numeric values are in range and the log level is known.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_files == 0 {
            return Err(ConfigError::ValidationFailed(
                "Max files must be at least 1".to_string(),
            ));
        }

        if self.head_bytes < 2 {
            return Err(ConfigError::ValidationFailed(
                "Head bytes must be at least 2 to detect a shebang".to_string(),
            ));
        }
        if self.head_bytes > 1_048_576 {
            return Err(ConfigError::ValidationFailed(
                "Head bytes cannot exceed 1MB".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Timeout must be at least 1 second".to_string(),
            ));
        }
        if self.timeout_secs > 3600 {
            return Err(ConfigError::ValidationFailed(
                "Timeout cannot exceed 1 hour".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            max_depth: self.max_depth,
            max_files: self.max_files,
            head_bytes: self.head_bytes,
            parallel: self.parallel_scan,
            ..ScanConfig::default()
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new()
            .with_timeout(self.timeout())
            .with_scan_config(self.scan_config())
            .with_strict_render(self.strict_render)
    }

    /// The configured registry file, or the built-in buildpacks.
    pub fn load_registry(&self) -> Result<BuildpackRegistry, RegistryError> {
        match &self.registry_path {
            Some(path) => {
                debug!(path = %path.display(), "Loading buildpack registry file");
                BuildpackRegistry::from_path(path)
            }
            None => Ok(BuildpackRegistry::with_defaults()),
        }
    }

    /// Converts configuration to a display map for output formatting
    pub fn to_display_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();

        map.insert("log_level".to_string(), self.log_level.clone());
        map.insert(
            "max_depth".to_string(),
            self.max_depth
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unlimited".to_string()),
        );
        map.insert("max_files".to_string(), self.max_files.to_string());
        map.insert("head_bytes".to_string(), self.head_bytes.to_string());
        map.insert("parallel_scan".to_string(), self.parallel_scan.to_string());
        map.insert("timeout_secs".to_string(), self.timeout_secs.to_string());
        map.insert("strict_render".to_string(), self.strict_render.to_string());
        map.insert(
            "registry".to_string(),
            self.registry_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "built-in".to_string()),
        );

        map
    }
}

impl fmt::Display for PackscoutConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Packscout Configuration:")?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        match self.max_depth {
            Some(depth) => writeln!(f, "  Max Depth: {}", depth)?,
            None => writeln!(f, "  Max Depth: unlimited")?,
        }
        writeln!(f, "  Max Files: {}", self.max_files)?;
        writeln!(f, "  Head Bytes: {}", self.head_bytes)?;
        writeln!(f, "  Parallel Scan: {}", self.parallel_scan)?;
        writeln!(f, "  Timeout: {}s", self.timeout_secs)?;
        writeln!(f, "  Strict Render: {}", self.strict_render)?;
        match &self.registry_path {
            Some(path) => writeln!(f, "  Registry: {}", path.display())?,
            None => writeln!(f, "  Registry: built-in")?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn remove(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    fn clear_env() -> Vec<EnvGuard> {
        [
            "PACKSCOUT_LOG_LEVEL",
            "PACKSCOUT_MAX_DEPTH",
            "PACKSCOUT_MAX_FILES",
            "PACKSCOUT_HEAD_BYTES",
            "PACKSCOUT_PARALLEL_SCAN",
            "PACKSCOUT_TIMEOUT",
            "PACKSCOUT_STRICT_RENDER",
            "PACKSCOUT_REGISTRY",
        ]
        .into_iter()
        .map(EnvGuard::remove)
        .collect()
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = clear_env();

        let config = PackscoutConfig::default();

        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.max_depth, None);
        assert_eq!(config.max_files, DEFAULT_MAX_FILES);
        assert_eq!(config.head_bytes, DEFAULT_HEAD_BYTES);
        assert!(!config.parallel_scan);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(!config.strict_render);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _guards = vec![
            EnvGuard::set("PACKSCOUT_LOG_LEVEL", "DEBUG"),
            EnvGuard::set("PACKSCOUT_MAX_DEPTH", "4"),
            EnvGuard::set("PACKSCOUT_MAX_FILES", "250"),
            EnvGuard::set("PACKSCOUT_HEAD_BYTES", "1024"),
            EnvGuard::set("PACKSCOUT_PARALLEL_SCAN", "true"),
            EnvGuard::set("PACKSCOUT_TIMEOUT", "5"),
            EnvGuard::set("PACKSCOUT_STRICT_RENDER", "true"),
            EnvGuard::set("PACKSCOUT_REGISTRY", "/etc/packscout/packs.toml"),
        ];

        let config = PackscoutConfig::default();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.max_depth, Some(4));
        assert_eq!(config.max_files, 250);
        assert_eq!(config.head_bytes, 1024);
        assert!(config.parallel_scan);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(config.strict_render);
        assert_eq!(
            config.registry_path,
            Some(PathBuf::from("/etc/packscout/packs.toml"))
        );
    }

    #[test]
    #[serial]
    fn test_zero_depth_means_unlimited() {
        let _guards = vec![EnvGuard::set("PACKSCOUT_MAX_DEPTH", "0")];
        assert_eq!(PackscoutConfig::default().max_depth, None);
    }

    #[test]
    #[serial]
    fn test_unparsable_values_fall_back() {
        let _guards = vec![
            EnvGuard::set("PACKSCOUT_MAX_FILES", "lots"),
            EnvGuard::set("PACKSCOUT_TIMEOUT", "-3"),
        ];
        let config = PackscoutConfig::default();
        assert_eq!(config.max_files, DEFAULT_MAX_FILES);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    #[serial]
    fn test_validation_rejects_out_of_range() {
        let _guards = clear_env();

        let mut config = PackscoutConfig::default();
        config.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = PackscoutConfig::default();
        config.max_files = 0;
        assert!(config.validate().is_err());

        let mut config = PackscoutConfig::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_scan_and_pipeline_config() {
        let _guards = clear_env();
        let mut config = PackscoutConfig::default();
        config.max_depth = Some(3);
        config.parallel_scan = true;

        let scan = config.scan_config();
        assert_eq!(scan.max_depth, Some(3));
        assert!(scan.parallel);
        assert!(scan.read_content);

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.timeout, Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)));
    }

    #[test]
    #[serial]
    fn test_load_registry_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("packs.yaml");
        std::fs::write(
            &path,
            "extends_defaults: true\nbuildpacks:\n  - name: deno\n    priority: 20\n    signals:\n      - { type: marker_path, value: deno.json, weight: 10, mandatory: true }\n",
        )
        .unwrap();

        let _guards = vec![EnvGuard::set("PACKSCOUT_REGISTRY", path.to_str().unwrap())];
        let registry = PackscoutConfig::default().load_registry().unwrap();
        assert!(registry.get("deno").is_some());
        assert!(registry.get("maven").is_some());
    }

    #[test]
    #[serial]
    fn test_config_display() {
        let _guards = clear_env();
        let config = PackscoutConfig::default();
        let display = format!("{}", config);
        assert!(display.contains("Packscout Configuration:"));
        assert!(display.contains("Timeout: 30s"));

        let map = config.to_display_map();
        assert_eq!(map.get("max_depth").map(String::as_str), Some("unlimited"));
    }
}
