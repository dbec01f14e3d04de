//! # CRL 解码
//!
//! 只读取仓库需要的几项：CRL 编号、本次/下次更新时间和吊销条目数。

use crate::errors::RepositoryError;
use crate::RepositoryResult;
use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use x509_parser::pem::Pem;
use x509_parser::prelude::FromDer;
use x509_parser::revocation_list::CertificateRevocationList;
use x509_parser::time::ASN1Time;

const PEM_CRL_LABEL: &str = "X509 CRL";

/// 解码后的 CRL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlInfo {
    /// CRL 编号扩展
    pub crl_number: Option<BigUint>,
    /// 本次更新时间
    pub this_update: DateTime<Utc>,
    /// 下次更新时间
    pub next_update: Option<DateTime<Utc>>,
    /// 吊销条目数
    pub revoked_count: usize,
}

/// 解码 DER 或 PEM 编码的 CRL
pub fn decode_crl(bytes: &[u8]) -> RepositoryResult<CrlInfo> {
    let der = to_der(bytes)?;
    let (_, crl) = CertificateRevocationList::from_der(&der)
        .map_err(|e| RepositoryError::CrlDecode(e.to_string()))?;

    Ok(CrlInfo {
        crl_number: crl.crl_number().cloned(),
        this_update: to_utc(&crl.last_update())?,
        next_update: crl.next_update().as_ref().map(to_utc).transpose()?,
        revoked_count: crl.iter_revoked_certificates().count(),
    })
}

/// 读取并解码 CRL 文件；文件不存在时返回 `None`
pub fn read_crl_file(path: &Path) -> RepositoryResult<Option<(Vec<u8>, CrlInfo)>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(RepositoryError::CrlIo(format!("{}: {}", path.display(), e)).into());
        }
    };

    let info = decode_crl(&bytes)?;
    Ok(Some((bytes, info)))
}

fn to_der(bytes: &[u8]) -> RepositoryResult<Vec<u8>> {
    let trimmed = bytes.trim_ascii_start();
    if !trimmed.starts_with(b"-----BEGIN") {
        return Ok(bytes.to_vec());
    }

    for pem in Pem::iter_from_buffer(trimmed) {
        let pem = pem.map_err(|e| RepositoryError::CrlDecode(format!("PEM 解析失败: {}", e)))?;
        if pem.label == PEM_CRL_LABEL {
            return Ok(pem.contents);
        }
    }
    Err(RepositoryError::CrlDecode("PEM 中没有 CRL".to_string()).into())
}

fn to_utc(time: &ASN1Time) -> RepositoryResult<DateTime<Utc>> {
    DateTime::from_timestamp(time.timestamp(), 0)
        .ok_or_else(|| RepositoryError::CrlDecode(format!("时间超出范围: {}", time)).into())
}
