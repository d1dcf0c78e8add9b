use std::path::Path;
use std::time::Duration;

use hashfs_commit::{LatchScope, DEFAULT_TEMPORARY_SEGMENT};
use hashfs_store::RetryPolicy;
use hashfs_types::HashAlgorithm;
use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};

/// Block size reported by `get_status` when the backend does not say.
pub const DEFAULT_STATUS_BLOCK_SIZE: u64 = 128 * 1024 * 1024;

/// File facade configuration, usually loaded from TOML.
///
/// ```toml
/// default_container = "pithos"
/// hash_algorithm = "sha256"
/// latch_scope = "per_output"
///
/// [retry]
/// max_attempts = 3
/// retry_budget_ms = 30000
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Backend address. Informational; the transport is supplied by the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Container used for paths that do not name one.
    pub default_container: String,
    /// Block size for new objects instead of the container default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_size_override: Option<u64>,
    pub hash_algorithm: HashAlgorithm,
    /// Recompute the digest of every block read.
    pub verify_blocks: bool,
    /// Path segment that marks staged attempt output.
    pub temporary_segment: String,
    pub latch_scope: LatchScope,
    /// Block size reported for directories, and for files whose metadata
    /// carries none.
    pub directory_block_size: u64,
    pub retry: RetryConfig,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            default_container: "pithos".into(),
            block_size_override: None,
            hash_algorithm: HashAlgorithm::Sha256,
            verify_blocks: true,
            temporary_segment: DEFAULT_TEMPORARY_SEGMENT.into(),
            latch_scope: LatchScope::PerOutput,
            directory_block_size: DEFAULT_STATUS_BLOCK_SIZE,
            retry: RetryConfig::default(),
        }
    }
}

/// `[retry]` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    /// Time allowed for retrying one backend call. Absent means no limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_budget_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 5_000,
            backoff_multiplier: 2.0,
            retry_budget_ms: Some(30_000),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            backoff_multiplier: self.backoff_multiplier,
            retry_budget: self.retry_budget_ms.map(Duration::from_millis),
        }
    }
}

impl FsConfig {
    pub fn from_toml_str(s: &str) -> FsResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> FsResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> FsResult<String> {
        toml::to_string(self).map_err(|e| FsError::Config(e.to_string()))
    }

    pub fn validate(&self) -> FsResult<()> {
        if self.default_container.is_empty() || self.default_container.contains('/') {
            return Err(FsError::Config(format!(
                "default_container {:?} must be a single non-empty segment",
                self.default_container
            )));
        }
        if self.block_size_override == Some(0) {
            return Err(FsError::Config("block_size_override must be positive".into()));
        }
        if self.directory_block_size == 0 {
            return Err(FsError::Config("directory_block_size must be positive".into()));
        }
        if self.temporary_segment.is_empty() || self.temporary_segment.contains('/') {
            return Err(FsError::Config(
                "temporary_segment must be a single non-empty segment".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(FsError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.backoff_multiplier.is_nan() || self.retry.backoff_multiplier < 1.0 {
            return Err(FsError::Config("retry.backoff_multiplier must be >= 1.0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config() {
        let c = FsConfig::default();
        assert_eq!(c.default_container, "pithos");
        assert_eq!(c.temporary_segment, "_temporary");
        assert_eq!(c.directory_block_size, 128 * 1024 * 1024);
        assert_eq!(c.latch_scope, LatchScope::PerOutput);
        assert!(c.verify_blocks);
        assert!(c.block_size_override.is_none());
        c.validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = FsConfig::from_toml_str(
            r#"
            default_container = "data"
            hash_algorithm = "blake3"
            latch_scope = "global"

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(c.default_container, "data");
        assert_eq!(c.hash_algorithm, HashAlgorithm::Blake3);
        assert_eq!(c.latch_scope, LatchScope::Global);
        assert_eq!(c.retry.max_attempts, 5);
        assert_eq!(c.retry.initial_backoff_ms, 100);
        assert!(c.verify_blocks);
    }

    #[test]
    fn retry_policy_conversion() {
        let policy = RetryConfig {
            retry_budget_ms: None,
            ..RetryConfig::default()
        }
        .policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(100));
        assert!(policy.retry_budget.is_none());
    }

    #[test]
    fn invalid_values_rejected() {
        for bad in [
            "block_size_override = 0",
            "temporary_segment = \"\"",
            "default_container = \"a/b\"",
            "[retry]\nmax_attempts = 0",
            "[retry]\nbackoff_multiplier = 0.5",
        ] {
            assert!(
                matches!(FsConfig::from_toml_str(bad), Err(FsError::Config(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = FsConfig::from_toml_str("verify_blocks = \"maybe\"").unwrap_err();
        assert!(matches!(err, FsError::ConfigParse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "endpoint = \"https://pithos.example.org/v1\"").unwrap();
        writeln!(file, "block_size_override = 1048576").unwrap();
        let c = FsConfig::load(file.path()).unwrap();
        assert_eq!(c.endpoint.as_deref(), Some("https://pithos.example.org/v1"));
        assert_eq!(c.block_size_override, Some(1_048_576));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, FsError::Io(_)));
    }

    #[test]
    fn serialized_config_loads_back() {
        let c = FsConfig {
            block_size_override: Some(4096),
            latch_scope: LatchScope::Global,
            ..FsConfig::default()
        };
        let text = c.to_toml_string().unwrap();
        assert_eq!(FsConfig::from_toml_str(&text).unwrap(), c);
    }
}
