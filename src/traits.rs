//! # 签发引擎能力接口
//!
//! 签发引擎、CRL 签发方和 OCSP 响应方通过这些 trait 使用证书仓库。

use crate::RepositoryResult;
use ca_storage::{RevokedCertificate, StorageRecord};
use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use std::time::Duration;

/// 证书列表排序方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    /// 按序列号
    SerialNumber,
    /// 按签发时间
    IssueDate,
}

/// 当前 CRL 的元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlMetadata {
    /// CRL 编号
    pub crl_number: BigUint,
    /// 本次更新时间
    pub this_update: DateTime<Utc>,
    /// 下次更新时间
    pub next_update: DateTime<Utc>,
    /// 吊销条目数
    pub revoked_count: usize,
}

impl CrlMetadata {
    /// 尚未发布过 CRL 时的元数据：编号为 0，时间为纪元起点
    pub fn empty() -> Self {
        Self {
            crl_number: BigUint::default(),
            this_update: DateTime::<Utc>::UNIX_EPOCH,
            next_update: DateTime::<Utc>::UNIX_EPOCH,
            revoked_count: 0,
        }
    }
}

/// 证书仓库
///
/// 签发引擎通过它持久化新签发的证书和处理吊销请求。
pub trait CertificateRepository: Send + Sync {
    /// 存储新签发的证书
    ///
    /// 返回的错误为 `Critical` 时签发流程必须停止。
    fn add_certificate(&self, certificate: &[u8]) -> RepositoryResult<()>;

    /// 吊销证书，`revocation_time` 缺省为当前时间
    fn revoke_certificate(
        &self,
        serial: &BigUint,
        reason: i32,
        revocation_time: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()>;

    /// 所有证书的序列号
    fn all_certificates(&self) -> Vec<BigUint>;

    /// 按序列号查询证书
    fn certificate(&self, serial: &BigUint) -> Option<StorageRecord>;

    /// 证书数量
    fn certificate_count(&self, not_revoked: bool) -> usize;

    /// 分页查询证书
    fn certificate_range(
        &self,
        page: usize,
        page_size: usize,
        not_revoked: bool,
        sort_by: SortBy,
        descending: bool,
    ) -> Vec<StorageRecord>;

    /// 清理过期证书，返回被清理的序列号
    fn remove_expired_certs(&self, grace_period: Duration) -> RepositoryResult<Vec<BigUint>>;
}

/// CRL 数据提供方
pub trait CrlMetadataProvider: Send + Sync {
    /// 所有已吊销证书
    fn revoked_certificates(&self) -> RepositoryResult<Vec<RevokedCertificate>>;

    /// 取下一个 CRL 编号
    fn next_crl_number(&self) -> BigUint;

    /// 发布新的 CRL，覆盖当前 CRL 文件
    fn publish_new_crl(&self, crl: &[u8]) -> RepositoryResult<()>;

    /// 当前 CRL 的编码；没有可用的 CRL 时返回 `None`
    fn current_crl(&self) -> Option<Vec<u8>>;

    /// 当前 CRL 的元数据
    fn current_crl_metadata(&self) -> RepositoryResult<CrlMetadata>;
}

/// 吊销状态数据源
pub trait RevocationStatusProvider: Send + Sync {
    /// 当前吊销列表的快照
    fn revocation_snapshot(&self) -> RepositoryResult<Vec<RevokedCertificate>>;
}
