use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Connection settings for one OBS bucket.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObsStorageConfig {
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: String,
    pub bucket: String,
}

impl std::fmt::Debug for ObsStorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secret = if self.secret_key.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("ObsStorageConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &secret)
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl ObsStorageConfig {
    /// Read settings from `{prefix}OBS_ACCESS_KEY`, `{prefix}OBS_SECRET_KEY`,
    /// `{prefix}OBS_ENDPOINT` and `{prefix}OBS_BUCKET`. Unset variables are
    /// left empty; call [`validate`](Self::validate) before use.
    pub fn from_env(prefix: &str) -> Self {
        let var = |name: &str| std::env::var(format!("{prefix}OBS_{name}")).unwrap_or_default();
        Self {
            access_key: var("ACCESS_KEY"),
            secret_key: var("SECRET_KEY"),
            endpoint: var("ENDPOINT"),
            bucket: var("BUCKET"),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.is_empty() {
            return Err(ConfigError::ValidationError(
                "no OBS bucket specified".to_string(),
            ));
        }

        if self.access_key.is_empty() != self.secret_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "must supply both an access key and secret key or neither".to_string(),
            ));
        }

        if self.endpoint.is_empty() {
            return Err(ConfigError::ValidationError(
                "endpoint must be specified".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    Obs,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for local storage backend
    pub local_storage_path: String,
    pub obs: ObsStorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./objects".to_string(),
            obs: ObsStorageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "obs" => StorageBackend::Obs,
            _ => StorageBackend::Local,
        };

        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./objects".to_string());

        let config = Config {
            storage: StorageConfig {
                backend,
                local_storage_path,
                obs: ObsStorageConfig::from_env(""),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.storage.backend {
            StorageBackend::Obs => self.storage.obs.validate(),
            StorageBackend::Local if self.storage.local_storage_path.is_empty() => Err(
                ConfigError::ValidationError("LOCAL_STORAGE_PATH cannot be empty".to_string()),
            ),
            StorageBackend::Local => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ObsStorageConfig {
        ObsStorageConfig {
            access_key: "ak".to_string(),
            secret_key: "sk".to_string(),
            endpoint: "https://obs.cn-north-4.myhuaweicloud.com".to_string(),
            bucket: "chunks".to_string(),
        }
    }

    fn message(cfg: &ObsStorageConfig) -> String {
        match cfg.validate() {
            Err(ConfigError::ValidationError(msg)) => msg,
            Ok(()) => panic!("expected validation failure"),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_anonymous_config_is_valid() {
        let cfg = ObsStorageConfig {
            access_key: String::new(),
            secret_key: String::new(),
            ..valid()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_missing_bucket() {
        let cfg = ObsStorageConfig {
            bucket: String::new(),
            ..valid()
        };
        assert_eq!(message(&cfg), "no OBS bucket specified");
    }

    #[test]
    fn test_mismatched_credentials() {
        let only_access = ObsStorageConfig {
            secret_key: String::new(),
            ..valid()
        };
        let only_secret = ObsStorageConfig {
            access_key: String::new(),
            ..valid()
        };
        for cfg in [only_access, only_secret] {
            assert_eq!(
                message(&cfg),
                "must supply both an access key and secret key or neither"
            );
        }
    }

    #[test]
    fn test_missing_endpoint() {
        let cfg = ObsStorageConfig {
            endpoint: String::new(),
            ..valid()
        };
        assert_eq!(message(&cfg), "endpoint must be specified");
    }

    #[test]
    fn test_bucket_checked_first() {
        assert_eq!(
            message(&ObsStorageConfig::default()),
            "no OBS bucket specified"
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", valid());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("\"sk\""));
    }

    #[test]
    fn test_from_env_with_prefix() {
        std::env::set_var("CFGTEST_OBS_ACCESS_KEY", "ak");
        std::env::set_var("CFGTEST_OBS_SECRET_KEY", "sk");
        std::env::set_var("CFGTEST_OBS_ENDPOINT", "http://127.0.0.1:9000");
        std::env::set_var("CFGTEST_OBS_BUCKET", "ruler");

        let cfg = ObsStorageConfig::from_env("CFGTEST_");
        assert_eq!(cfg.access_key, "ak");
        assert_eq!(cfg.secret_key, "sk");
        assert_eq!(cfg.endpoint, "http://127.0.0.1:9000");
        assert_eq!(cfg.bucket, "ruler");

        let other = ObsStorageConfig::from_env("CFGTEST_UNSET_");
        assert_eq!(other, ObsStorageConfig::default());
    }
}
