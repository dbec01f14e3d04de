//! # 证书解码
//!
//! 从 DER 或 PEM 编码中取出存储记录需要的证书信息：序列号、有效期和主题属性。

use crate::error::StorageError;
use chrono::{DateTime, Local, NaiveDateTime};
use num_bigint::BigUint;
use x509_parser::pem::Pem;
use x509_parser::time::ASN1Time;

/// 主题序列号属性（serialNumber）的 OID
pub const SUBJECT_SERIAL_NUMBER_OID: &str = "2.5.4.5";

const PEM_CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// 解码后的证书
#[derive(Debug, Clone)]
pub struct DecodedCertificate {
    /// DER 编码
    pub der: Vec<u8>,
    /// 序列号
    pub serial: BigUint,
    /// 生效时间（本地时间）
    pub not_before: NaiveDateTime,
    /// 过期时间（本地时间）
    pub not_after: NaiveDateTime,
    subject_attributes: Vec<(String, String)>,
}

impl DecodedCertificate {
    /// 序列号的小写十六进制形式，不带前导 `0x`
    pub fn serial_hex(&self) -> String {
        serial_to_hex(&self.serial)
    }

    /// 按点分 OID 查找主题属性
    ///
    /// 属性存在但不是字符串类型时返回空串。
    pub fn subject_attribute(&self, oid: &str) -> Option<&str> {
        self.subject_attributes
            .iter()
            .find(|(attr_oid, _)| attr_oid == oid)
            .map(|(_, value)| value.as_str())
    }
}

/// 序列号转换为小写十六进制
pub fn serial_to_hex(serial: &BigUint) -> String {
    format!("{:x}", serial)
}

/// 解析十六进制序列号
pub fn parse_serial_hex(hex: &str) -> Option<BigUint> {
    let hex = hex.trim();
    let hex = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);
    if hex.is_empty() {
        return None;
    }
    BigUint::parse_bytes(hex.as_bytes(), 16)
}

/// 解码 DER 或 PEM 编码的证书
pub fn decode_certificate(bytes: &[u8]) -> Result<DecodedCertificate, StorageError> {
    let der = to_der(bytes)?;

    let (serial, not_before, not_after, subject_attributes) = {
        let (_, cert) = x509_parser::parse_x509_certificate(&der)
            .map_err(|e| StorageError::InvalidCertificate(e.to_string()))?;

        let validity = cert.validity();
        let attributes = cert
            .subject()
            .iter_attributes()
            .map(|attr| {
                (
                    attr.attr_type().to_id_string(),
                    attr.as_str().unwrap_or("").trim().to_string(),
                )
            })
            .collect::<Vec<_>>();

        (
            cert.tbs_certificate.serial.clone(),
            asn1_time_to_local(&validity.not_before)?,
            asn1_time_to_local(&validity.not_after)?,
            attributes,
        )
    };

    Ok(DecodedCertificate {
        der,
        serial,
        not_before,
        not_after,
        subject_attributes,
    })
}

fn to_der(bytes: &[u8]) -> Result<Vec<u8>, StorageError> {
    let trimmed = bytes.trim_ascii_start();
    if !trimmed.starts_with(b"-----BEGIN") {
        return Ok(bytes.to_vec());
    }

    for pem in Pem::iter_from_buffer(trimmed) {
        let pem = pem.map_err(|e| StorageError::InvalidCertificate(format!("PEM 解析失败: {}", e)))?;
        if pem.label == PEM_CERTIFICATE_LABEL {
            return Ok(pem.contents);
        }
    }
    Err(StorageError::InvalidCertificate("PEM 中没有证书".to_string()))
}

/// ASN.1 时间转换为本地时间
pub fn asn1_time_to_local(time: &ASN1Time) -> Result<NaiveDateTime, StorageError> {
    DateTime::from_timestamp(time.timestamp(), 0)
        .map(|utc| utc.with_timezone(&Local).naive_local())
        .ok_or_else(|| StorageError::InvalidCertificate(format!("时间超出范围: {}", time)))
}
