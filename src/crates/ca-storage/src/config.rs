//! # 存储配置
//!
//! 单个签发实例的存储配置：存储目录、吊销文件、主题标识属性和可选的存储加密。

use crate::encryption::{KeyLength, KeyStore, StorageCodec, DEFAULT_ITERATIONS, DEFAULT_KEY_LENGTH};
use crate::error::StorageError;
use crate::x509::SUBJECT_SERIAL_NUMBER_OID;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// 默认吊销文件名
pub const DEFAULT_REVOCATION_FILE: &str = "revoked.json";

fn default_subject_id_attribute() -> String {
    SUBJECT_SERIAL_NUMBER_OID.to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_key_length() -> u32 {
    DEFAULT_KEY_LENGTH
}

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

/// 存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 存储目录，必须已经存在
    pub storage_directory: PathBuf,

    /// 吊销文件，缺省为存储目录下的 `revoked.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_file: Option<PathBuf>,

    /// 主题标识属性的点分 OID
    #[serde(default = "default_subject_id_attribute")]
    pub subject_id_attribute: String,

    /// 存储加密
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crypto: Option<StorageCryptoConfig>,
}

impl StorageConfig {
    /// 以默认设置创建配置
    pub fn new(storage_directory: impl Into<PathBuf>) -> Self {
        Self {
            storage_directory: storage_directory.into(),
            revocation_file: None,
            subject_id_attribute: default_subject_id_attribute(),
            crypto: None,
        }
    }

    /// 设置吊销文件
    pub fn with_revocation_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.revocation_file = Some(file.into());
        self
    }

    /// 设置主题标识属性
    pub fn with_subject_id_attribute(mut self, oid: impl Into<String>) -> Self {
        self.subject_id_attribute = oid.into();
        self
    }

    /// 设置存储加密
    pub fn with_crypto(mut self, crypto: StorageCryptoConfig) -> Self {
        self.crypto = Some(crypto);
        self
    }

    /// 吊销文件路径
    pub fn revocation_file(&self) -> PathBuf {
        self.revocation_file
            .clone()
            .unwrap_or_else(|| self.storage_directory.join(DEFAULT_REVOCATION_FILE))
    }

    /// 验证配置
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.storage_directory.as_os_str().is_empty() {
            return Err(StorageError::Config("存储目录不能为空".to_string()));
        }

        if !is_dotted_oid(&self.subject_id_attribute) {
            return Err(StorageError::Config(format!(
                "主题标识属性不是有效的 OID: {}",
                self.subject_id_attribute
            )));
        }

        match &self.crypto {
            Some(crypto) => crypto.validate(),
            None => Ok(()),
        }
    }

    /// 构建编解码器
    ///
    /// 未配置或未启用加密时返回 `None`。
    pub fn build_codec(&self) -> Result<Option<StorageCodec>, StorageError> {
        match &self.crypto {
            Some(crypto) if crypto.enabled => crypto.build_codec().map(Some),
            _ => {
                info!("存储 {} 未启用加密", self.storage_directory.display());
                Ok(None)
            }
        }
    }

    /// 解密历史数据用的密钥表
    pub fn key_store(&self) -> KeyStore {
        self.crypto
            .as_ref()
            .map(|crypto| crypto.key_store.clone())
            .unwrap_or_default()
    }

    /// 存储目录
    pub fn storage_directory(&self) -> &Path {
        &self.storage_directory
    }
}

fn is_dotted_oid(oid: &str) -> bool {
    let arcs: Vec<&str> = oid.split('.').collect();
    arcs.len() >= 2 && arcs.iter().all(|arc| !arc.is_empty() && arc.chars().all(|c| c.is_ascii_digit()))
}

/// 存储加密配置
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageCryptoConfig {
    /// 是否启用
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Base64 编码的盐
    pub salt: String,

    /// 默认密钥的口令
    pub key: String,

    /// 默认密钥的标识
    pub kid: String,

    /// 密钥长度（位），128 或 256
    #[serde(default = "default_key_length")]
    pub key_length: u32,

    /// 迭代次数
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// 历史密钥表：密钥标识 -> 口令
    #[serde(default)]
    pub key_store: KeyStore,
}

impl fmt::Debug for StorageCryptoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kids: Vec<&String> = self.key_store.keys().collect();
        kids.sort();
        f.debug_struct("StorageCryptoConfig")
            .field("enabled", &self.enabled)
            .field("kid", &self.kid)
            .field("key_length", &self.key_length)
            .field("iterations", &self.iterations)
            .field("key_store", &kids)
            .finish_non_exhaustive()
    }
}

impl StorageCryptoConfig {
    /// 以默认密钥长度和迭代次数创建
    pub fn new(key: impl Into<String>, kid: impl Into<String>, salt: &[u8]) -> Self {
        Self {
            enabled: true,
            salt: STANDARD.encode(salt),
            key: key.into(),
            kid: kid.into(),
            key_length: DEFAULT_KEY_LENGTH,
            iterations: DEFAULT_ITERATIONS,
            key_store: KeyStore::new(),
        }
    }

    /// 设置密钥长度
    pub fn with_key_length(mut self, bits: u32) -> Self {
        self.key_length = bits;
        self
    }

    /// 设置迭代次数
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// 添加历史密钥
    pub fn with_historical_key(mut self, kid: impl Into<String>, key: impl Into<String>) -> Self {
        self.key_store.insert(kid.into(), key.into());
        self
    }

    /// 验证配置
    pub fn validate(&self) -> Result<(), StorageError> {
        if !self.enabled {
            return Ok(());
        }
        if self.kid.trim().is_empty() {
            return Err(StorageError::Config("密钥标识不能为空".to_string()));
        }
        if self.key.is_empty() {
            return Err(StorageError::Config("加密口令不能为空".to_string()));
        }
        if self.iterations == 0 {
            return Err(StorageError::Config("迭代次数必须大于0".to_string()));
        }
        KeyLength::from_bits(self.key_length)?;
        self.decode_salt()?;
        Ok(())
    }

    /// 构建编解码器
    pub fn build_codec(&self) -> Result<StorageCodec, StorageError> {
        self.validate()?;
        let salt = self.decode_salt()?;
        StorageCodec::with_parameters(
            &self.key,
            self.kid.clone(),
            &salt,
            KeyLength::from_bits(self.key_length)?,
            self.iterations,
        )
    }

    fn decode_salt(&self) -> Result<Vec<u8>, StorageError> {
        let salt = STANDARD
            .decode(self.salt.trim())
            .map_err(|e| StorageError::Config(format!("盐不是有效的 Base64: {}", e)))?;
        if salt.is_empty() {
            return Err(StorageError::Config("盐不能为空".to_string()));
        }
        Ok(salt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StorageConfig::new("/var/ca/sign");
        assert_eq!(config.subject_id_attribute, "2.5.4.5");
        assert_eq!(config.revocation_file(), PathBuf::from("/var/ca/sign/revoked.json"));
        assert!(config.validate().is_ok());
        assert!(config.build_codec().unwrap().is_none());
        assert!(config.key_store().is_empty());

        let config = config.with_revocation_file("/var/ca/shared/revoked.json");
        assert_eq!(config.revocation_file(), PathBuf::from("/var/ca/shared/revoked.json"));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: StorageConfig = serde_json::from_str(
            r#"{
                "storage_directory": "/var/ca/sign",
                "crypto": { "salt": "c2FsdA==", "key": "secret", "kid": "key01" }
            }"#,
        )
        .unwrap();

        let crypto = config.crypto.as_ref().unwrap();
        assert!(crypto.enabled);
        assert_eq!(crypto.key_length, 128);
        assert_eq!(crypto.iterations, 65536);
        assert!(crypto.key_store.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        let config = StorageConfig::new("/var/ca").with_subject_id_attribute("serialNumber");
        assert!(matches!(config.validate(), Err(StorageError::Config(_))));

        let config = StorageConfig::new("").with_subject_id_attribute("2.5.4.5");
        assert!(config.validate().is_err());

        let crypto = StorageCryptoConfig::new("secret", "key01", b"salt").with_key_length(192);
        assert!(crypto.validate().is_err());

        let mut crypto = StorageCryptoConfig::new("secret", "key01", b"salt");
        crypto.salt = "not base64!".to_string();
        assert!(crypto.validate().is_err());

        let crypto = StorageCryptoConfig::new("secret", " ", b"salt");
        assert!(crypto.validate().is_err());
    }

    #[test]
    fn test_disabled_crypto_builds_no_codec() {
        let mut crypto = StorageCryptoConfig::new("secret", "key01", b"salt");
        crypto.enabled = false;
        let config = StorageConfig::new("/var/ca").with_crypto(crypto);
        assert!(config.build_codec().unwrap().is_none());
    }

    #[test]
    fn test_build_codec() {
        let crypto = StorageCryptoConfig::new("secret", "key01", b"salt")
            .with_iterations(1000)
            .with_key_length(256)
            .with_historical_key("key00", "old-secret");
        let config = StorageConfig::new("/var/ca").with_crypto(crypto);

        let codec = config.build_codec().unwrap().unwrap();
        assert_eq!(codec.kid(), "key01");
        assert_eq!(codec.key_length(), KeyLength::Aes256);
        assert_eq!(codec.iterations(), 1000);
        assert_eq!(config.key_store().get("key00").map(String::as_str), Some("old-secret"));
    }

    #[test]
    fn test_debug_hides_passwords() {
        let crypto = StorageCryptoConfig::new("top-secret", "key01", b"salt")
            .with_historical_key("key00", "older-secret");
        let debug = format!("{:?}", crypto);
        assert!(debug.contains("key00"));
        assert!(!debug.contains("top-secret"));
        assert!(!debug.contains("older-secret"));
    }
}
