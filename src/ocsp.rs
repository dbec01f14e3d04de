//! # 证书状态查询
//!
//! 为 OCSP 响应方提供按序列号的吊销状态判断。仓库不保存已签发证书的索引，
//! 因此不在吊销列表中的序列号一律视为有效。

use crate::traits::RevocationStatusProvider;
use crate::RepositoryResult;
use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use std::sync::Arc;
use tracing::debug;

/// 证书状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateStatus {
    /// 未吊销
    Good,
    /// 已吊销或被冻结
    Revoked {
        /// 吊销时间
        revocation_time: DateTime<Utc>,
        /// 吊销原因码
        reason: i32,
    },
}

impl CertificateStatus {
    pub fn is_revoked(&self) -> bool {
        matches!(self, Self::Revoked { .. })
    }
}

/// 按吊销列表判断证书状态
#[derive(Clone)]
pub struct StatusLookup {
    provider: Arc<dyn RevocationStatusProvider>,
}

impl StatusLookup {
    pub fn new(provider: Arc<dyn RevocationStatusProvider>) -> Self {
        Self { provider }
    }

    /// 查询证书状态
    ///
    /// 每次查询都读取最新的吊销列表。
    pub fn status_of(&self, serial: &BigUint) -> RepositoryResult<CertificateStatus> {
        let revoked = self.provider.revocation_snapshot()?;
        let status = revoked
            .into_iter()
            .find(|entry| &entry.serial == serial)
            .map(|entry| CertificateStatus::Revoked {
                revocation_time: entry.revocation_time,
                reason: entry.reason,
            })
            .unwrap_or(CertificateStatus::Good);

        debug!("证书 {:x} 状态: {:?}", serial, status);
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_storage::RevokedCertificate;
    use error::ErrorInfo;
    use parking_lot::Mutex;

    struct FixedProvider {
        revoked: Mutex<Vec<RevokedCertificate>>,
    }

    impl RevocationStatusProvider for FixedProvider {
        fn revocation_snapshot(&self) -> RepositoryResult<Vec<RevokedCertificate>> {
            Ok(self.revoked.lock().clone())
        }
    }

    struct FailingProvider;

    impl RevocationStatusProvider for FailingProvider {
        fn revocation_snapshot(&self) -> RepositoryResult<Vec<RevokedCertificate>> {
            Err(ErrorInfo::new(6401, "吊销文件损坏".to_string()))
        }
    }

    fn revoked(serial: u32, reason: i32) -> RevokedCertificate {
        RevokedCertificate {
            serial: BigUint::from(serial),
            revocation_time: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            reason,
        }
    }

    #[test]
    fn test_unknown_serial_is_good() {
        let provider = Arc::new(FixedProvider {
            revoked: Mutex::new(vec![revoked(1, 1)]),
        });
        let lookup = StatusLookup::new(provider);

        assert_eq!(lookup.status_of(&BigUint::from(2u32)).unwrap(), CertificateStatus::Good);
    }

    #[test]
    fn test_revoked_serial() {
        let provider = Arc::new(FixedProvider {
            revoked: Mutex::new(vec![revoked(1, 1), revoked(2, 6)]),
        });
        let lookup = StatusLookup::new(provider);

        let status = lookup.status_of(&BigUint::from(2u32)).unwrap();
        assert!(status.is_revoked());
        assert_eq!(
            status,
            CertificateStatus::Revoked {
                revocation_time: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
                reason: 6,
            }
        );
    }

    #[test]
    fn test_lookup_sees_latest_snapshot() {
        let provider = Arc::new(FixedProvider {
            revoked: Mutex::new(Vec::new()),
        });
        let lookup = StatusLookup::new(provider.clone());
        let serial = BigUint::from(3u32);

        assert_eq!(lookup.status_of(&serial).unwrap(), CertificateStatus::Good);
        provider.revoked.lock().push(revoked(3, 0));
        assert!(lookup.status_of(&serial).unwrap().is_revoked());
    }

    #[test]
    fn test_provider_error_propagates() {
        let lookup = StatusLookup::new(Arc::new(FailingProvider));
        let err = lookup.status_of(&BigUint::from(1u32)).unwrap_err();
        assert_eq!(err.code(), 6401);
    }
}
