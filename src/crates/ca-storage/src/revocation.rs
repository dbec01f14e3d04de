//! # 吊销记录
//!
//! 吊销信息保存在一个格式化的 JSON 数组文件中（默认 `revoked.json`），运维人员可以手工编辑。
//! 每次修改都读出整个文件、应用一次状态转换、再整体写回。
//!
//! ## 状态机
//!
//! | 当前状态 | 请求原因码 | 结果 |
//! |----------|------------|------|
//! | 未吊销 | certificateHold | 冻结 |
//! | 未吊销 | 其他有效原因 | 永久吊销 |
//! | 未吊销 | removeFromCRL | 拒绝 |
//! | 冻结 | certificateHold | 接受，无变化 |
//! | 冻结 | 其他有效原因 | 原地改为永久吊销 |
//! | 冻结 | removeFromCRL | 删除记录 |
//! | 永久吊销 | 任意 | 拒绝 |
//!
//! 小于 0 或大于 aACompromise 的原因码一律拒绝。

use crate::error::{RevocationError, StorageError};
use crate::x509::{parse_serial_hex, serial_to_hex};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use num_bigint::BigUint;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 吊销时间格式（本地时间）
pub const REVOCATION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// CRL 吊销原因码（RFC 5280）
///
/// 原因码 7 未分配，但仍在可接受的范围内。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrlReason {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCrl,
    PrivilegeWithdrawn,
    AaCompromise,
}

impl CrlReason {
    /// 原因码
    pub const fn code(self) -> i32 {
        match self {
            CrlReason::Unspecified => 0,
            CrlReason::KeyCompromise => 1,
            CrlReason::CaCompromise => 2,
            CrlReason::AffiliationChanged => 3,
            CrlReason::Superseded => 4,
            CrlReason::CessationOfOperation => 5,
            CrlReason::CertificateHold => 6,
            CrlReason::RemoveFromCrl => 8,
            CrlReason::PrivilegeWithdrawn => 9,
            CrlReason::AaCompromise => 10,
        }
    }

    /// 从原因码转换
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(CrlReason::Unspecified),
            1 => Some(CrlReason::KeyCompromise),
            2 => Some(CrlReason::CaCompromise),
            3 => Some(CrlReason::AffiliationChanged),
            4 => Some(CrlReason::Superseded),
            5 => Some(CrlReason::CessationOfOperation),
            6 => Some(CrlReason::CertificateHold),
            8 => Some(CrlReason::RemoveFromCrl),
            9 => Some(CrlReason::PrivilegeWithdrawn),
            10 => Some(CrlReason::AaCompromise),
            _ => None,
        }
    }

    /// RFC 5280 中的名称
    pub fn name(self) -> &'static str {
        match self {
            CrlReason::Unspecified => "unspecified",
            CrlReason::KeyCompromise => "keyCompromise",
            CrlReason::CaCompromise => "cACompromise",
            CrlReason::AffiliationChanged => "affiliationChanged",
            CrlReason::Superseded => "superseded",
            CrlReason::CessationOfOperation => "cessationOfOperation",
            CrlReason::CertificateHold => "certificateHold",
            CrlReason::RemoveFromCrl => "removeFromCRL",
            CrlReason::PrivilegeWithdrawn => "privilegeWithdrawn",
            CrlReason::AaCompromise => "aACompromise",
        }
    }
}

/// 最大的有效原因码
pub const MAX_REASON_CODE: i32 = CrlReason::AaCompromise.code();

const HOLD: i32 = CrlReason::CertificateHold.code();
const REMOVE_FROM_CRL: i32 = CrlReason::RemoveFromCrl.code();

/// 吊销文件中的一条记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRecord {
    /// 十六进制序列号
    pub serial: String,
    /// 吊销时间，格式见 [`REVOCATION_TIME_FORMAT`]
    pub time: String,
    /// 原因码
    pub reason: i32,
}

/// 已吊销证书
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokedCertificate {
    pub serial: BigUint,
    pub revocation_time: DateTime<Utc>,
    pub reason: i32,
}

impl RevokedCertificate {
    fn from_record(record: &RevocationRecord) -> Result<Self, StorageError> {
        let serial = parse_serial_hex(&record.serial).ok_or_else(|| {
            StorageError::LedgerIntegrity(format!("序列号无效: {}", record.serial))
        })?;
        let naive = NaiveDateTime::parse_from_str(&record.time, REVOCATION_TIME_FORMAT).map_err(|e| {
            StorageError::LedgerIntegrity(format!("证书 {} 的吊销时间 {} 无效: {}", record.serial, record.time, e))
        })?;
        let local = Local.from_local_datetime(&naive).earliest().ok_or_else(|| {
            StorageError::LedgerIntegrity(format!("吊销时间 {} 在本地时区不存在", record.time))
        })?;

        Ok(Self {
            serial,
            revocation_time: local.with_timezone(&Utc),
            reason: record.reason,
        })
    }
}

/// 对吊销记录应用一次吊销请求
///
/// 记录按序列号的数值匹配，手工写入的 `0x` 前缀、前导零和大写形式都视为同一证书；
/// 无法解析的序列号不匹配任何请求。失败时 `records` 保持不变。
pub fn apply_revocation(
    records: &mut Vec<RevocationRecord>,
    serial: &BigUint,
    time: &str,
    reason: i32,
) -> Result<(), RevocationError> {
    if reason < 0 {
        return Err(RevocationError::NegativeReason(reason));
    }
    if reason > MAX_REASON_CODE {
        return Err(RevocationError::IllegalReason(reason));
    }

    let existing = records
        .iter()
        .position(|record| parse_serial_hex(&record.serial).as_ref() == Some(serial));
    let serial = serial_to_hex(serial);

    match existing {
        Some(idx) if records[idx].reason == HOLD => {
            if reason == REMOVE_FROM_CRL {
                debug!("解除证书冻结: {}", serial);
                records.remove(idx);
            } else {
                debug!("证书 {} 由证书冻结改为原因码 {}", serial, reason);
                records[idx].reason = reason;
            }
            Ok(())
        }
        Some(_) if reason == REMOVE_FROM_CRL => Err(RevocationError::NoHoldToRemove(serial)),
        Some(_) => Err(RevocationError::AlreadyRevoked(serial)),
        None if reason == REMOVE_FROM_CRL => Err(RevocationError::NoHoldToRemove(serial)),
        None => {
            records.push(RevocationRecord {
                serial,
                time: time.to_string(),
                reason,
            });
            Ok(())
        }
    }
}

/// 吊销记录文件
pub struct RevocationLedger {
    file: PathBuf,
    write_lock: Mutex<()>,
}

impl RevocationLedger {
    /// 打开吊销记录文件
    ///
    /// 文件可以不存在，第一次吊销时创建。
    pub fn open(file: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let ledger = Self {
            file: file.into(),
            write_lock: Mutex::new(()),
        };

        let count = ledger.read_records()?.len();
        info!("吊销记录文件: {}", ledger.file.display());
        info!("已加载 {} 条吊销记录", count);
        Ok(ledger)
    }

    /// 吊销记录文件路径
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// 吊销证书
    ///
    /// 吊销请求之间互斥执行；成功后整个文件被重写。
    pub fn revoke(&self, serial: &BigUint, time: DateTime<Utc>, reason: i32) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();

        let serial_hex = serial_to_hex(serial);
        let time = time.with_timezone(&Local).format(REVOCATION_TIME_FORMAT).to_string();

        let mut records = self.read_records()?;
        // 任何一条记录无法解析都拒绝修改
        for record in &records {
            RevokedCertificate::from_record(record)?;
        }
        if let Err(e) = apply_revocation(&mut records, serial, &time, reason) {
            warn!("拒绝吊销请求 {} (原因码 {}): {}", serial_hex, reason, e);
            return Err(e.into());
        }

        self.write_records(&records)?;
        info!("吊销请求已处理: {} 原因码 {}", serial_hex, reason);
        Ok(())
    }

    /// 列出所有已吊销证书
    ///
    /// 不加锁读取；任何一条记录无法解析都视为吊销文件损坏。
    pub fn list(&self) -> Result<Vec<RevokedCertificate>, StorageError> {
        self.read_records()?
            .iter()
            .map(RevokedCertificate::from_record)
            .collect()
    }

    /// 吊销记录条数
    pub fn count(&self) -> Result<usize, StorageError> {
        Ok(self.read_records()?.len())
    }

    fn read_records(&self) -> Result<Vec<RevocationRecord>, StorageError> {
        let data = match fs::read(&self.file) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::Io(format!(
                    "读取吊销文件 {} 失败: {}",
                    self.file.display(),
                    e
                )))
            }
        };

        serde_json::from_slice(&data).map_err(|e| {
            StorageError::LedgerIntegrity(format!("{}: {}", self.file.display(), e))
        })
    }

    fn write_records(&self, records: &[RevocationRecord]) -> Result<(), StorageError> {
        let data = serde_json::to_vec_pretty(records)
            .map_err(|e| StorageError::LedgerWrite(format!("序列化吊销记录失败: {}", e)))?;

        // 先写临时文件再改名，不加锁的读者不会看到写了一半的文件
        let mut temp = self.file.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        fs::write(&temp, &data)
            .and_then(|_| fs::rename(&temp, &self.file))
            .map_err(|e| StorageError::LedgerWrite(format!("{}: {}", self.file.display(), e)))
    }
}
