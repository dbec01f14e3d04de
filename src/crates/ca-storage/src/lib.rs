//! # CA 证书存储
//!
//! 证书签发服务的持久化层。
//!
//! ## 组成
//!
//! - [`CertificateLog`]: 只追加、按天分文件的证书日志，写入失败后锁定直至重启
//! - [`RevocationLedger`]: 可手工编辑的吊销文件，按状态机规则接受吊销请求
//! - [`StorageCodec`]: 基于口令派生密钥的加解密，可选压缩，支持历史密钥
//! - [`StoredRecordIterator`]: 离线读取一天的证书日志
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use ca_storage::{CertificateLog, RevocationLedger, StorageConfig};
//!
//! let config = StorageConfig::new("/var/ca/sign");
//! let log = CertificateLog::from_config(&config)?;
//! let ledger = RevocationLedger::open(config.revocation_file())?;
//!
//! let der = std::fs::read("issued.der").map_err(|e| ca_storage::StorageError::Io(e.to_string()))?;
//! log.store(&der)?;
//! println!("已吊销证书: {}", ledger.list()?.len());
//! # Ok::<(), ca_storage::StorageError>(())
//! ```

pub mod cert_log;
pub mod compression;
pub mod config;
pub mod encryption;
pub mod error;
pub mod iterator;
pub mod record;
pub mod revocation;
pub mod x509;

pub use cert_log::{CertificateLog, STORE_FILE_PREFIX};
pub use config::{StorageConfig, StorageCryptoConfig};
pub use encryption::{EncryptedEnvelope, KeyLength, KeyStore, StorageCodec};
pub use crate::error::{RevocationError, StorageError, StorageResult};
pub use iterator::StoredRecordIterator;
pub use record::{RecordPayload, StorageRecord};
pub use revocation::{CrlReason, RevocationLedger, RevocationRecord, RevokedCertificate};
pub use x509::{decode_certificate, parse_serial_hex, serial_to_hex, DecodedCertificate};
