//! # 压缩模块
//!
//! 加密前的数据压缩，使用 Zstd 标准压缩。
//!
//! 是否压缩由调用方决定：证书这类不小于 128 字节的结构化数据压缩后明显变小，
//! 短标识或随机数据压缩后反而可能变大。

use crate::error::StorageError;
use std::io::Cursor;
use tracing::debug;

/// Zstd 压缩级别
const COMPRESSION_LEVEL: i32 = 3;

/// 值得压缩的最小数据长度（字节）
pub const MIN_COMPRESSIBLE_LEN: usize = 128;

/// 压缩数据
pub fn compress(data: &[u8]) -> Result<Vec<u8>, StorageError> {
    let compressed = zstd::encode_all(Cursor::new(data), COMPRESSION_LEVEL)
        .map_err(|e| StorageError::Crypto(format!("Zstd压缩失败: {}", e)))?;

    debug!("压缩完成: {} -> {} 字节", data.len(), compressed.len());
    Ok(compressed)
}

/// 解压数据
///
/// 输入不是 Zstd 帧时返回错误。
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, StorageError> {
    zstd::decode_all(Cursor::new(data))
        .map_err(|e| StorageError::Crypto(format!("Zstd解压失败: {}", e)))
}
