//! # 证书存储错误定义
//!
//! 存储层所有可能的失败。错误码按子系统分段：
//! 62xx 证书解析，63xx 证书日志，64xx 吊销文件，65xx 记录读取，66xx 加解密，67xx 配置，68xx IO。

use error::Error;

/// 吊销请求被状态机拒绝的原因
///
/// 出现这类错误时吊销文件保持不变。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RevocationError {
    /// 原因码超出 CRL 原因码范围
    #[error("非法的吊销原因码: {0}", code = 6411, category = Revocation, severity = Warning)]
    IllegalReason(i32),

    /// 原因码为负数
    #[error("吊销原因码不能为负数: {0}", code = 6412, category = Revocation, severity = Warning)]
    NegativeReason(i32),

    /// 证书已以证书冻结以外的原因被吊销
    #[error("证书 {0} 已被永久吊销", code = 6413, category = Revocation, severity = Warning)]
    AlreadyRevoked(String),

    /// 请求解除冻结，但证书不处于冻结状态
    #[error("证书 {0} 不处于证书冻结状态，无法从 CRL 中移除", code = 6414, category = Revocation, severity = Warning)]
    NoHoldToRemove(String),
}

/// 证书存储错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// 证书编码无效
    #[error("证书编码无效: {0}", code = 6201, category = Parse, severity = Warning)]
    InvalidCertificate(String),

    /// 证书主题中缺少标识属性
    #[error("证书主题中缺少标识属性 {0}", code = 6202, category = Validation, severity = Warning)]
    MissingSubjectId(String),

    /// 证书主题中的标识属性为空
    #[error("证书主题中的标识属性 {0} 为空", code = 6203, category = Validation, severity = Warning)]
    EmptySubjectId(String),

    /// 追加写入证书日志失败，存储进入锁定状态
    #[error("证书日志写入失败: {0}", code = 6301, category = Durability, severity = Critical)]
    WriteFailed(String),

    /// 存储已因先前的写入失败被锁定
    #[error("存储已因先前的写入失败被锁定，必须重启服务", code = 6302, category = Durability, severity = Critical)]
    RestartRequired,

    /// 吊销文件无法解析
    #[error("吊销文件损坏: {0}", code = 6401, category = Configuration, severity = Critical)]
    LedgerIntegrity(String),

    /// 吊销文件写入失败
    #[error("吊销文件写入失败: {0}", code = 6402, category = Storage, severity = Critical)]
    LedgerWrite(String),

    /// 吊销请求被拒绝
    #[error("吊销请求被拒绝: {0}", code = 6410, category = Revocation, severity = Warning)]
    Revocation(RevocationError),

    /// 证书日志中的某一行无法解析
    #[error("第 {line} 行记录格式错误: {msg}", code = 6501, category = Parse)]
    MalformedRecord { line: usize, msg: String },

    /// 加解密或压缩失败
    #[error("加解密失败: {0}", code = 6601, category = Encryption)]
    Crypto(String),

    /// 密钥表中没有对应的密钥标识
    #[error("密钥表中没有密钥标识 {0} 对应的密钥", code = 6602, category = Encryption)]
    UnknownKeyId(String),

    /// 配置错误
    #[error("存储配置错误: {0}", code = 6701, category = Configuration)]
    Config(String),

    /// IO错误
    #[error("IO错误: {0}", code = 6801, category = Io)]
    Io(String),
}

impl StorageError {
    /// 获取吊销状态机的拒绝原因
    pub fn as_revocation(&self) -> Option<&RevocationError> {
        match self {
            StorageError::Revocation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RevocationError> for StorageError {
    fn from(err: RevocationError) -> Self {
        StorageError::Revocation(err)
    }
}

/// 存储结果类型
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use error::{ErrorCategory, ErrorInfo, ErrorKind, ErrorSeverity};

    #[test]
    fn test_durability_errors_are_critical() {
        let info: ErrorInfo = StorageError::WriteFailed("disk full".to_string()).into();
        assert!(info.is_critical());
        assert_eq!(info.category(), ErrorCategory::Durability);

        let info: ErrorInfo = StorageError::RestartRequired.into();
        assert!(info.is_critical());
        assert_eq!(info.code(), 6302);
    }

    #[test]
    fn test_revocation_errors_are_warnings() {
        let err = StorageError::from(RevocationError::AlreadyRevoked("1a2b".to_string()));
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(err.category(), ErrorCategory::Revocation);
        assert!(err.to_string().contains("1a2b"));
        assert_eq!(
            err.as_revocation(),
            Some(&RevocationError::AlreadyRevoked("1a2b".to_string()))
        );
    }

    #[test]
    fn test_malformed_record_message() {
        let err = StorageError::MalformedRecord { line: 7, msg: "EOF".to_string() };
        assert_eq!(err.to_string(), "第 7 行记录格式错误: EOF");
        assert_eq!(err.error_code(), 6501);
        assert!(err.as_revocation().is_none());
    }
}
