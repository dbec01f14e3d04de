//! # 高吞吐证书仓库
//!
//! 把证书日志、吊销记录和 CRL 编号计数器组合起来，实现签发引擎需要的仓库接口。
//!
//! 这是一个只写的"存储二极管"：签发的证书只追加进日志，不能按序列号查回，
//! 查询类接口一律返回空结果。吊销状态只来自吊销记录文件。

use crate::config::InstanceConfig;
use crate::crl::read_crl_file;
use crate::errors::RepositoryError;
use crate::traits::{
    CertificateRepository, CrlMetadata, CrlMetadataProvider, RevocationStatusProvider, SortBy,
};
use crate::RepositoryResult;
use ca_storage::{CertificateLog, RevocationLedger, RevokedCertificate, StorageRecord};
use chrono::{DateTime, Utc};
use error::ErrorInfo;
use num_bigint::BigUint;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 高吞吐证书仓库
pub struct HighVolumeRepository {
    log: CertificateLog,
    ledger: RevocationLedger,
    crl_file: PathBuf,
    crl_number: Mutex<BigUint>,
}

impl HighVolumeRepository {
    /// 创建仓库
    ///
    /// CRL 文件存在时从其 CRL 编号扩展恢复计数器，否则从 0 开始。
    pub fn new(
        log: CertificateLog,
        ledger: RevocationLedger,
        crl_file: impl Into<PathBuf>,
    ) -> RepositoryResult<Self> {
        let crl_file = crl_file.into();

        let crl_number = match read_crl_file(&crl_file)? {
            Some((_, info)) => {
                let number = info.crl_number.ok_or_else(|| {
                    ErrorInfo::from(RepositoryError::CrlNumberMissing(crl_file.display().to_string()))
                })?;
                info!("CRL 编号计数器从 {} 恢复: {}", crl_file.display(), number);
                number
            }
            None => {
                info!("未找到 CRL 文件 {}，CRL 编号从 0 开始", crl_file.display());
                BigUint::default()
            }
        };

        Ok(Self {
            log,
            ledger,
            crl_file,
            crl_number: Mutex::new(crl_number),
        })
    }

    /// 按实例配置创建仓库
    pub fn from_instance_config(name: &str, config: &InstanceConfig) -> RepositoryResult<Self> {
        let log = CertificateLog::from_config(&config.storage)?;
        let ledger = RevocationLedger::open(config.storage.revocation_file())?;
        let repository = Self::new(log, ledger, config.crl_file(name))?;
        info!("证书仓库实例 {} 已就绪", name);
        Ok(repository)
    }

    /// 证书日志
    pub fn log(&self) -> &CertificateLog {
        &self.log
    }

    /// 吊销记录
    pub fn ledger(&self) -> &RevocationLedger {
        &self.ledger
    }

    /// CRL 文件路径
    pub fn crl_file(&self) -> &Path {
        &self.crl_file
    }

    /// 最近一次分配的 CRL 编号，不递增
    pub fn current_crl_number(&self) -> BigUint {
        self.crl_number.lock().clone()
    }

    /// 证书日志是否已因写入失败被锁定
    pub fn is_critical_storage_error(&self) -> bool {
        self.log.is_critical_storage_error()
    }
}

impl CertificateRepository for HighVolumeRepository {
    fn add_certificate(&self, certificate: &[u8]) -> RepositoryResult<()> {
        self.log.store(certificate).map_err(|e| {
            let info = ErrorInfo::from(e);
            if info.is_critical() {
                error!("证书无法持久化，签发流程必须停止: {}", info.message());
            } else {
                warn!("证书存储被拒绝: {}", info.message());
            }
            info
        })
    }

    fn revoke_certificate(
        &self,
        serial: &BigUint,
        reason: i32,
        revocation_time: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()> {
        let time = revocation_time.unwrap_or_else(Utc::now);
        self.ledger.revoke(serial, time, reason)?;
        Ok(())
    }

    fn all_certificates(&self) -> Vec<BigUint> {
        Vec::new()
    }

    fn certificate(&self, _serial: &BigUint) -> Option<StorageRecord> {
        None
    }

    fn certificate_count(&self, _not_revoked: bool) -> usize {
        0
    }

    fn certificate_range(
        &self,
        _page: usize,
        _page_size: usize,
        _not_revoked: bool,
        _sort_by: SortBy,
        _descending: bool,
    ) -> Vec<StorageRecord> {
        Vec::new()
    }

    fn remove_expired_certs(&self, _grace_period: Duration) -> RepositoryResult<Vec<BigUint>> {
        // 没有索引可供清理
        Ok(Vec::new())
    }
}

impl CrlMetadataProvider for HighVolumeRepository {
    fn revoked_certificates(&self) -> RepositoryResult<Vec<RevokedCertificate>> {
        Ok(self.ledger.list()?)
    }

    fn next_crl_number(&self) -> BigUint {
        let mut number = self.crl_number.lock();
        *number += 1u32;
        debug!("分配 CRL 编号: {}", number);
        number.clone()
    }

    fn publish_new_crl(&self, crl: &[u8]) -> RepositoryResult<()> {
        fs::write(&self.crl_file, crl).map_err(|e| {
            ErrorInfo::from(RepositoryError::CrlIo(format!("{}: {}", self.crl_file.display(), e)))
        })?;
        info!("已发布新的 CRL: {} ({} 字节)", self.crl_file.display(), crl.len());
        Ok(())
    }

    fn current_crl(&self) -> Option<Vec<u8>> {
        match read_crl_file(&self.crl_file) {
            Ok(Some((bytes, _))) => Some(bytes),
            Ok(None) => {
                debug!("当前没有 CRL");
                None
            }
            Err(e) => {
                debug!("当前 CRL 不可用: {}", e.message());
                None
            }
        }
    }

    fn current_crl_metadata(&self) -> RepositoryResult<CrlMetadata> {
        let info = match read_crl_file(&self.crl_file) {
            Ok(Some((_, info))) => info,
            Ok(None) => return Ok(CrlMetadata::empty()),
            Err(e) => {
                debug!("当前 CRL 不可用: {}", e.message());
                return Ok(CrlMetadata::empty());
            }
        };

        Ok(CrlMetadata {
            crl_number: info.crl_number.unwrap_or_default(),
            this_update: info.this_update,
            next_update: info.next_update.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            revoked_count: info.revoked_count,
        })
    }
}

impl RevocationStatusProvider for HighVolumeRepository {
    fn revocation_snapshot(&self) -> RepositoryResult<Vec<RevokedCertificate>> {
        Ok(self.ledger.list()?)
    }
}
