//! # 证书日志
//!
//! 只追加的证书日志。每天一个文件 `certStore-YYYY-MM-DD`，每张证书一行，
//! 文件写入后不再改写，本组件也从不删除它们。
//!
//! ## 写入失败锁定
//!
//! 追加写入失败后存储进入锁定状态，此后所有 `store` 调用都返回
//! [`StorageError::RestartRequired`]，即使故障已经排除，直到进程重启。
//! 证书解码、主题标识缺失、加密失败等写入之前的错误只影响当次调用。

use crate::config::StorageConfig;
use crate::encryption::StorageCodec;
use crate::error::StorageError;
use crate::record::StorageRecord;
use crate::x509::{decode_certificate, SUBJECT_SERIAL_NUMBER_OID};
use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// 日志文件名前缀
pub const STORE_FILE_PREFIX: &str = "certStore-";

/// 受互斥锁保护的日志状态
#[derive(Debug, Default)]
struct LogState {
    /// 是否已因写入失败被锁定
    poisoned: bool,
}

/// 证书日志
pub struct CertificateLog {
    storage_directory: PathBuf,
    subject_id_attribute: String,
    codec: Option<StorageCodec>,
    state: Mutex<LogState>,
}

impl CertificateLog {
    /// 创建证书日志
    ///
    /// 存储目录必须已经存在。
    pub fn new(
        storage_directory: impl Into<PathBuf>,
        codec: Option<StorageCodec>,
    ) -> Result<Self, StorageError> {
        Self::with_subject_id_attribute(storage_directory, SUBJECT_SERIAL_NUMBER_OID, codec)
    }

    /// 指定主题标识属性的 OID 创建证书日志
    pub fn with_subject_id_attribute(
        storage_directory: impl Into<PathBuf>,
        subject_id_attribute: impl Into<String>,
        codec: Option<StorageCodec>,
    ) -> Result<Self, StorageError> {
        let storage_directory = storage_directory.into();
        if !storage_directory.is_dir() {
            return Err(StorageError::Config(format!(
                "存储目录 {} 不存在",
                storage_directory.display()
            )));
        }

        let subject_id_attribute = subject_id_attribute.into();
        info!(
            "证书日志已初始化: {} (主题标识属性 {}, 加密: {})",
            storage_directory.display(),
            subject_id_attribute,
            codec.as_ref().map(|c| c.kid()).unwrap_or("未启用")
        );

        Ok(Self {
            storage_directory,
            subject_id_attribute,
            codec,
            state: Mutex::new(LogState::default()),
        })
    }

    /// 从存储配置创建证书日志
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        config.validate()?;
        Self::with_subject_id_attribute(
            &config.storage_directory,
            config.subject_id_attribute.clone(),
            config.build_codec()?,
        )
    }

    /// 存储目录
    pub fn storage_directory(&self) -> &Path {
        &self.storage_directory
    }

    /// 编解码器
    pub fn codec(&self) -> Option<&StorageCodec> {
        self.codec.as_ref()
    }

    /// 是否已因写入失败被锁定
    pub fn is_critical_storage_error(&self) -> bool {
        self.state.lock().poisoned
    }

    /// 指定日期的日志文件路径
    pub fn storage_file_for(&self, date: NaiveDate) -> PathBuf {
        self.storage_directory
            .join(format!("{}{}", STORE_FILE_PREFIX, date.format("%Y-%m-%d")))
    }

    /// 存储一张证书
    ///
    /// 接受 DER 或 PEM 编码。整个过程持有日志锁，并发调用按顺序执行。
    pub fn store(&self, certificate: &[u8]) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        if state.poisoned {
            warn!("存储已因先前的写入失败被锁定，拒绝存储证书");
            return Err(StorageError::RestartRequired);
        }

        let decoded = decode_certificate(certificate)?;
        let subject_id = decoded
            .subject_attribute(&self.subject_id_attribute)
            .ok_or_else(|| StorageError::MissingSubjectId(self.subject_id_attribute.clone()))?;
        if subject_id.is_empty() {
            return Err(StorageError::EmptySubjectId(self.subject_id_attribute.clone()));
        }

        let record = StorageRecord::from_certificate(&decoded, subject_id, self.codec.as_ref())?;
        let line = record.to_line()?;

        let path = self.storage_file_for(Local::now().date_naive());
        if let Err(e) = append_line(&path, &line) {
            state.poisoned = true;
            error!(
                "证书 {} 写入 {} 失败，存储已锁定，必须重启: {}",
                record.serial,
                path.display(),
                e
            );
            return Err(StorageError::WriteFailed(format!("{}: {}", path.display(), e)));
        }

        debug!("证书已记录: {} -> {}", record.serial, path.display());
        Ok(())
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.sync_data()
}
