//! # 错误处理框架
//!
//! 证书存储层共用的错误框架。每个错误都带有错误码、类别和严重程度，
//! 调用方据此区分"单次操作失败"与"必须停止签发"两类情况。
//!
//! ## 特性
//!
//! - **派生宏**: 通过 `#[derive(Error)]` 为错误枚举生成 `Display`、`ErrorKind` 和到 `ErrorInfo` 的转换
//! - **显式错误码**: 每个变体在属性中声明自己的错误码、类别和严重程度
//! - **错误上下文**: 传播过程中可以逐层追加上下文
//!
//! ## 使用示例
//!
//! ```rust
//! use error::{Error, ErrorInfo, ErrorSeverity};
//!
//! #[derive(Debug, Error)]
//! enum LedgerError {
//!     #[error("吊销文件损坏: {0}", code = 6401, category = Configuration, severity = Critical)]
//!     Corrupt(String),
//!
//!     #[error("原因码非法: {code}", code = 6402, category = Revocation)]
//!     IllegalReason { code: i32 },
//! }
//!
//! let info: ErrorInfo = LedgerError::Corrupt("revoked.json".to_string()).into();
//! assert_eq!(info.code(), 6401);
//! assert_eq!(info.severity(), ErrorSeverity::Critical);
//! ```

// 让派生宏生成的 `::error::` 路径在本 crate 内同样可用
extern crate self as error;

pub use error_derive::Error;

use std::fmt;

/// 错误严重程度
///
/// `Critical` 专门用于持久化失败一类的错误：出现后调用方应停止继续签发。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// 调试级别
    Debug = 0,
    /// 信息级别
    Info = 1,
    /// 警告级别：单次请求被拒绝，状态未改变
    Warning = 2,
    /// 错误级别：需要处理的错误
    Error = 3,
    /// 严重级别：存储已不可信，必须停止并重启
    Critical = 4,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Debug => write!(f, "调试"),
            ErrorSeverity::Info => write!(f, "信息"),
            ErrorSeverity::Warning => write!(f, "警告"),
            ErrorSeverity::Error => write!(f, "错误"),
            ErrorSeverity::Critical => write!(f, "严重"),
        }
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// IO 错误
    Io,
    /// 解析错误（证书、CRL、记录行）
    Parse,
    /// 输入验证错误
    Validation,
    /// 配置错误，包括吊销文件结构损坏
    Configuration,
    /// 存储错误
    Storage,
    /// 加密错误
    Encryption,
    /// 吊销状态转换错误
    Revocation,
    /// 持久化失败（证书日志写入失败后进入的锁定状态）
    Durability,
    /// 其他错误
    Other,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Io => write!(f, "IO错误"),
            ErrorCategory::Parse => write!(f, "解析错误"),
            ErrorCategory::Validation => write!(f, "验证错误"),
            ErrorCategory::Configuration => write!(f, "配置错误"),
            ErrorCategory::Storage => write!(f, "存储错误"),
            ErrorCategory::Encryption => write!(f, "加密错误"),
            ErrorCategory::Revocation => write!(f, "吊销错误"),
            ErrorCategory::Durability => write!(f, "持久化错误"),
            ErrorCategory::Other => write!(f, "其他错误"),
        }
    }
}

/// 错误类型的核心trait
///
/// 由 `#[derive(Error)]` 自动实现，也可以手写。
pub trait ErrorKind: fmt::Debug + fmt::Display + Send + Sync {
    /// 获取错误码
    fn error_code(&self) -> u32;

    /// 获取错误消息
    fn error_message(&self) -> String;

    /// 获取错误类别
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Other
    }

    /// 获取错误严重程度
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }

    /// 获取错误源
    fn source(&self) -> Option<&(dyn ErrorKind + Send + Sync)> {
        None
    }
}

/// 错误信息结构体
///
/// 跨 crate 边界传递的统一错误形式。
#[derive(Debug)]
pub struct ErrorInfo {
    code: u32,
    message: String,
    source: Option<Box<dyn ErrorKind + Send + Sync>>,
    context: Vec<String>,
    severity: ErrorSeverity,
    category: ErrorCategory,
}

impl Clone for ErrorInfo {
    fn clone(&self) -> Self {
        Self {
            code: self.code,
            message: self.message.clone(),
            // 源错误不可克隆
            source: None,
            context: self.context.clone(),
            severity: self.severity,
            category: self.category,
        }
    }
}

impl PartialEq for ErrorInfo {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
            && self.message == other.message
            && self.context == other.context
            && self.severity == other.severity
            && self.category == other.category
    }
}

impl ErrorInfo {
    /// 创建一个新的错误信息
    ///
    /// ```rust
    /// use error::ErrorInfo;
    ///
    /// let error = ErrorInfo::new(6201, "证书编码无效".to_string());
    /// assert_eq!(error.code(), 6201);
    /// ```
    pub fn new(code: u32, message: String) -> Self {
        Self {
            code,
            message,
            source: None,
            context: Vec::new(),
            severity: ErrorSeverity::Error,
            category: ErrorCategory::Other,
        }
    }

    /// 创建一个带有源错误的错误信息
    ///
    /// 类别和严重程度继承自源错误。
    pub fn with_source<E: ErrorKind + 'static>(code: u32, message: String, source: E) -> Self {
        let category = source.category();
        let severity = source.severity();
        Self {
            code,
            message,
            source: Some(Box::new(source)),
            context: Vec::new(),
            severity,
            category,
        }
    }

    /// 添加错误上下文
    pub fn add_context(&mut self, context: String) {
        self.context.push(context);
    }

    /// 链式添加错误上下文
    ///
    /// ```rust
    /// use error::ErrorInfo;
    ///
    /// let error = ErrorInfo::new(6301, "追加写入失败".to_string())
    ///     .with_context("存储实例: sign-ca".to_string());
    /// assert_eq!(error.context().len(), 1);
    /// ```
    pub fn with_context(mut self, context: String) -> Self {
        self.context.push(context);
        self
    }

    /// 设置错误严重程度
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// 设置错误类别
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }

    /// 获取错误消息
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 获取错误码
    pub fn code(&self) -> u32 {
        self.code
    }

    /// 获取源错误
    pub fn source(&self) -> Option<&(dyn ErrorKind + Send + Sync)> {
        self.source.as_ref().map(|e| e.as_ref())
    }

    /// 获取错误上下文
    pub fn context(&self) -> &[String] {
        &self.context
    }

    /// 获取错误严重程度
    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// 判断是否为严重错误
    ///
    /// 为 true 时调用方必须停止签发流程。
    pub fn is_critical(&self) -> bool {
        self.severity == ErrorSeverity::Critical
    }

    /// 判断是否为警告
    pub fn is_warning(&self) -> bool {
        self.severity == ErrorSeverity::Warning
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}][错误码: {}] {}",
               self.severity, self.category, self.code, self.message)?;

        for ctx in &self.context {
            write!(f, "\n  上下文: {}", ctx)?;
        }

        if let Some(source) = &self.source {
            write!(f, "\n  由以下错误引起: {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorInfo {}

impl ErrorKind for ErrorInfo {
    fn error_code(&self) -> u32 {
        self.code
    }

    fn error_message(&self) -> String {
        self.message.clone()
    }

    fn category(&self) -> ErrorCategory {
        self.category
    }

    fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    fn source(&self) -> Option<&(dyn ErrorKind + Send + Sync)> {
        self.source.as_ref().map(|e| e.as_ref())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ErrorInfo>;

impl From<std::io::Error> for ErrorInfo {
    fn from(err: std::io::Error) -> Self {
        let (code, category) = match err.kind() {
            std::io::ErrorKind::NotFound => (404, ErrorCategory::Io),
            std::io::ErrorKind::PermissionDenied => (403, ErrorCategory::Io),
            std::io::ErrorKind::AlreadyExists => (409, ErrorCategory::Io),
            std::io::ErrorKind::InvalidInput => (400, ErrorCategory::Validation),
            std::io::ErrorKind::InvalidData => (400, ErrorCategory::Parse),
            std::io::ErrorKind::WriteZero => (507, ErrorCategory::Storage),
            std::io::ErrorKind::UnexpectedEof => (400, ErrorCategory::Parse),
            _ => (500, ErrorCategory::Io),
        };

        ErrorInfo::new(code, err.to_string())
            .with_category(category)
            .with_severity(ErrorSeverity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_info_new() {
        let error = ErrorInfo::new(404, "吊销文件不存在".to_string());
        assert_eq!(error.code(), 404);
        assert_eq!(error.message(), "吊销文件不存在");
        assert!(error.source().is_none());
        assert_eq!(error.category(), ErrorCategory::Other);
        assert_eq!(error.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn test_with_source_inherits_classification() {
        let source = ErrorInfo::new(6301, "追加写入失败".to_string())
            .with_category(ErrorCategory::Durability)
            .with_severity(ErrorSeverity::Critical);
        let error = ErrorInfo::with_source(7001, "证书入库失败".to_string(), source);

        assert_eq!(error.code(), 7001);
        assert!(error.is_critical());
        assert_eq!(error.category(), ErrorCategory::Durability);
        let src = error.source().expect("应当保留源错误");
        assert_eq!(src.error_code(), 6301);
    }

    #[test]
    fn test_display_with_context_and_source() {
        let source = ErrorInfo::new(500, "磁盘已满".to_string());
        let error = ErrorInfo::with_source(6301, "追加写入失败".to_string(), source)
            .with_context("certStore-2026-10-15".to_string());
        let display = format!("{}", error);
        assert!(display.contains("6301"));
        assert!(display.contains("上下文: certStore-2026-10-15"));
        assert!(display.contains("由以下错误引起"));
        assert!(display.contains("磁盘已满"));
    }

    #[test]
    fn test_add_context() {
        let mut error = ErrorInfo::new(400, "原因码非法".to_string());
        error.add_context("序列号: 5f3a".to_string());
        error.add_context("实例: sign-ca".to_string());
        assert_eq!(error.context(), ["序列号: 5f3a", "实例: sign-ca"]);
    }

    #[test]
    fn test_clone_drops_source_only() {
        let source = ErrorInfo::new(1, "底层".to_string());
        let error = ErrorInfo::with_source(2, "上层".to_string(), source)
            .with_context("ctx".to_string());
        let cloned = error.clone();
        assert!(cloned.source().is_none());
        assert_eq!(cloned, error);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Critical > ErrorSeverity::Error);
        assert!(ErrorSeverity::Error > ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning > ErrorSeverity::Info);
        assert!(ErrorSeverity::Info > ErrorSeverity::Debug);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(format!("{}", ErrorCategory::Durability), "持久化错误");
        assert_eq!(format!("{}", ErrorCategory::Revocation), "吊销错误");
        assert_eq!(format!("{}", ErrorCategory::Encryption), "加密错误");
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: ErrorInfo = io.into();
        assert_eq!(error.code(), 404);
        assert_eq!(error.category(), ErrorCategory::Io);

        let io = std::io::Error::new(std::io::ErrorKind::InvalidData, "garbled");
        let error: ErrorInfo = io.into();
        assert_eq!(error.category(), ErrorCategory::Parse);
    }
}
