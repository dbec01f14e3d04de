//! # CA 证书仓库 - 高吞吐存储后端
//!
//! 为证书签发引擎提供只追加的证书存储、吊销管理和 CRL 编号分配。
//!
//! ## 核心特性
//!
//! - **只写存储**: 签发的证书按天追加到日志文件，写入失败后锁定存储直到重启
//! - **吊销管理**: 吊销记录保存在单个 JSON 文件中，支持证书冻结和解冻
//! - **存储加密**: 可选的 AES-GCM 加密，支持按密钥标识轮换密钥
//! - **CRL 编号**: 启动时从现有 CRL 恢复编号，之后严格递增
//!
//! ## 模块架构
//!
//! ```text
//! ca-repo/
//! ├── src/
//! │   ├── main.rs         # 命令行工具
//! │   ├── lib.rs          # 库入口
//! │   ├── repository.rs   # 仓库适配层
//! │   ├── ocsp.rs         # 证书状态查询
//! │   └── crates/
//! │       ├── error/          # 错误处理框架
//! │       ├── error-derive/   # 错误派生宏
//! │       └── ca-storage/     # 证书日志、吊销记录和存储加密
//! ```
//!
//! ## 使用示例
//!
//! ```no_run
//! use ca_repo::{CertificateRepository, CrlMetadataProvider, HighVolumeRepository};
//! use ca_storage::{CertificateLog, RevocationLedger};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let log = CertificateLog::new("/var/lib/ca/sign", None)?;
//!     let ledger = RevocationLedger::open("/var/lib/ca/sign/revoked.json")?;
//!     let repository = HighVolumeRepository::new(log, ledger, "/var/lib/ca/sign/sign.crl")?;
//!
//!     let certificate = std::fs::read("leaf.der")?;
//!     if let Err(e) = repository.add_certificate(&certificate) {
//!         if e.is_critical() {
//!             // 停止签发
//!         }
//!     }
//!
//!     let crl_number = repository.next_crl_number();
//!     println!("下一个 CRL 编号: {}", crl_number);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crl;
pub mod errors;
pub mod ocsp;
pub mod repository;
pub mod traits;

use error::ErrorInfo;

pub use config::{InstanceConfig, RepositoryConfig};
pub use crl::{decode_crl, CrlInfo};
pub use errors::RepositoryError;
pub use ocsp::{CertificateStatus, StatusLookup};
pub use repository::HighVolumeRepository;
pub use traits::{
    CertificateRepository, CrlMetadata, CrlMetadataProvider, RevocationStatusProvider, SortBy,
};

/// 仓库操作结果类型
pub type RepositoryResult<T> = std::result::Result<T, ErrorInfo>;
