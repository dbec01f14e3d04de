//! # 仓库错误定义

use error::Error;

/// 仓库适配层错误
///
/// 存储层错误直接转换为 `ErrorInfo` 传播，这里只定义适配层自身的失败。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// CRL 无法解码
    #[error("CRL 解码失败: {0}", code = 7101, category = Parse)]
    CrlDecode(String),

    /// CRL 中没有 CRL 编号扩展
    #[error("CRL 文件 {0} 中没有 CRL 编号扩展", code = 7102, category = Configuration, severity = Critical)]
    CrlNumberMissing(String),

    /// CRL 文件读写失败
    #[error("CRL 文件读写失败: {0}", code = 7103, category = Io)]
    CrlIo(String),

    /// 配置错误
    #[error("配置错误: {0}", code = 7201, category = Configuration)]
    Config(String),

    /// 配置中没有该实例
    #[error("未配置的实例: {0}", code = 7202, category = Configuration)]
    UnknownInstance(String),

    /// 序列号格式错误
    #[error("序列号不是有效的十六进制数: {0}", code = 7301, category = Validation, severity = Warning)]
    InvalidSerial(String),
}
