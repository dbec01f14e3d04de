//! # 仓库配置
//!
//! 一个配置文件可以描述多个签发实例，每个实例有独立的存储目录、吊销文件和 CRL 文件。
//!
//! ```toml
//! log_level = "info"
//!
//! [instances.sign-ca]
//! storage_directory = "/var/lib/ca/sign"
//! crl_file = "/var/lib/ca/sign/sign.crl"
//!
//! [instances.sign-ca.crypto]
//! key = "secret"
//! kid = "key01"
//! salt = "c2FsdA=="
//! ```

use crate::errors::RepositoryError;
use crate::RepositoryResult;
use ca_storage::StorageConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// 指定配置文件路径的环境变量
pub const CONFIG_ENV_VAR: &str = "CA_REPO_CONFIG";

/// 默认配置文件
pub const DEFAULT_CONFIG_FILE: &str = "ca-repo.toml";

fn default_log_level() -> String {
    "info".to_string()
}

/// 仓库配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// 签发实例
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceConfig>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            instances: BTreeMap::new(),
        }
    }
}

/// 单个签发实例的配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfig {
    #[serde(flatten)]
    pub storage: StorageConfig,

    /// CRL 文件，缺省为存储目录下的 `<实例名>.crl`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crl_file: Option<PathBuf>,
}

impl InstanceConfig {
    pub fn new(storage: StorageConfig) -> Self {
        Self {
            storage,
            crl_file: None,
        }
    }

    pub fn with_crl_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.crl_file = Some(file.into());
        self
    }

    /// 实际使用的 CRL 文件路径
    pub fn crl_file(&self, name: &str) -> PathBuf {
        self.crl_file
            .clone()
            .unwrap_or_else(|| self.storage.storage_directory.join(format!("{}.crl", name)))
    }
}

impl RepositoryConfig {
    /// 查找实例配置
    pub fn instance(&self, name: &str) -> RepositoryResult<&InstanceConfig> {
        self.instances
            .get(name)
            .ok_or_else(|| RepositoryError::UnknownInstance(name.to_string()).into())
    }

    /// 检查所有实例的存储配置
    pub fn validate(&self) -> RepositoryResult<()> {
        for (name, instance) in &self.instances {
            instance
                .storage
                .validate()
                .map_err(|e| error::ErrorInfo::from(e).with_context(format!("实例: {}", name)))?;
        }
        Ok(())
    }

    /// 从 TOML 文本解析配置
    #[cfg(feature = "config")]
    pub fn from_toml_str(content: &str) -> RepositoryResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| RepositoryError::Config(format!("配置文件格式错误: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

/// 默认配置文件路径：优先使用环境变量 `CA_REPO_CONFIG`
pub fn default_config_path() -> PathBuf {
    std::env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// 读取配置文件
#[cfg(feature = "config")]
pub fn load_config(path: &Path) -> RepositoryResult<RepositoryConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RepositoryError::Config(format!("无法读取配置文件 {}: {}", path.display(), e))
    })?;
    RepositoryConfig::from_toml_str(&content)
}
