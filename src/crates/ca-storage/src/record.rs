//! # 证书存储记录
//!
//! 证书日志中的一行。主题标识和证书内容要么都是明文，要么都是密文，
//! 由存储是否配置了编解码器决定，记录创建后不再修改。
//!
//! 行格式为 JSON 对象：`it`、`et`、`serial`，以及 `id`/`eId` 和 `cert`/`eCert` 中各一个，
//! 未使用的字段不输出。

use crate::encryption::{KeyStore, StorageCodec};
use crate::error::StorageError;
use crate::x509::DecodedCertificate;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 记录中签发时间和过期时间的格式
pub const RECORD_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// 主题标识与证书内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordPayload {
    /// 明文：URL 编码的主题标识和 Base64 编码的证书
    Plain { id: String, cert: String },
    /// 密文：两者各自加密后的信封，Base64 编码
    Encrypted { e_id: String, e_cert: String },
}

/// 证书存储记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord", into = "RawRecord")]
pub struct StorageRecord {
    /// 签发时间（本地时间，秒精度）
    pub issued_at: NaiveDateTime,
    /// 过期时间（本地时间，秒精度）
    pub expires_at: NaiveDateTime,
    /// 小写十六进制序列号
    pub serial: String,
    /// 主题标识与证书内容
    pub payload: RecordPayload,
}

impl StorageRecord {
    /// 从证书创建记录
    ///
    /// 配置了编解码器时主题标识不压缩加密，证书压缩后加密。
    pub fn from_certificate(
        certificate: &DecodedCertificate,
        subject_id: &str,
        codec: Option<&StorageCodec>,
    ) -> Result<Self, StorageError> {
        let payload = match codec {
            Some(codec) => RecordPayload::Encrypted {
                e_id: STANDARD.encode(codec.encrypt(subject_id.as_bytes(), false)?),
                e_cert: STANDARD.encode(codec.encrypt(&certificate.der, true)?),
            },
            None => RecordPayload::Plain {
                id: form_urlencoded::byte_serialize(subject_id.as_bytes()).collect(),
                cert: STANDARD.encode(&certificate.der),
            },
        };

        Ok(Self {
            issued_at: certificate.not_before,
            expires_at: certificate.not_after,
            serial: certificate.serial_hex(),
            payload,
        })
    }

    /// 是否为加密记录
    pub fn is_encrypted(&self) -> bool {
        matches!(self.payload, RecordPayload::Encrypted { .. })
    }

    /// 取出主题标识
    pub fn subject_id(
        &self,
        codec: Option<&StorageCodec>,
        key_store: Option<&KeyStore>,
    ) -> Result<String, StorageError> {
        match &self.payload {
            RecordPayload::Plain { id, .. } => Ok(url_decode(id)),
            RecordPayload::Encrypted { e_id, .. } => {
                let plain = decrypt_field(e_id, false, codec, key_store)?;
                String::from_utf8(plain)
                    .map_err(|e| StorageError::Crypto(format!("主题标识不是有效的 UTF-8: {}", e)))
            }
        }
    }

    /// 取出证书的 DER 编码
    pub fn certificate_der(
        &self,
        codec: Option<&StorageCodec>,
        key_store: Option<&KeyStore>,
    ) -> Result<Vec<u8>, StorageError> {
        match &self.payload {
            RecordPayload::Plain { cert, .. } => STANDARD
                .decode(cert)
                .map_err(|e| StorageError::InvalidCertificate(format!("证书 Base64 解码失败: {}", e))),
            RecordPayload::Encrypted { e_cert, .. } => decrypt_field(e_cert, true, codec, key_store),
        }
    }

    /// 序列化为一行，带结尾换行符
    pub fn to_line(&self) -> Result<String, StorageError> {
        let mut line = serde_json::to_string(self)
            .map_err(|e| StorageError::Io(format!("序列化存储记录失败: {}", e)))?;
        line.push('\n');
        Ok(line)
    }
}

fn decrypt_field(
    value: &str,
    decompress: bool,
    codec: Option<&StorageCodec>,
    key_store: Option<&KeyStore>,
) -> Result<Vec<u8>, StorageError> {
    let codec = codec.ok_or_else(|| StorageError::Config("记录已加密，但未配置存储加密".to_string()))?;
    let envelope = STANDARD
        .decode(value)
        .map_err(|e| StorageError::Crypto(format!("密文 Base64 解码失败: {}", e)))?;
    codec.decrypt(&envelope, decompress, key_store)
}

fn url_decode(value: &str) -> String {
    // 编码后的值不含 '&' 和 '='，解析结果只有一个键
    form_urlencoded::parse(value.as_bytes())
        .map(|(key, _)| key.into_owned())
        .next()
        .unwrap_or_default()
}

/// 行上的原始字段
#[derive(Serialize, Deserialize)]
struct RawRecord {
    it: String,
    et: String,
    serial: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "eId", default, skip_serializing_if = "Option::is_none")]
    e_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cert: Option<String>,
    #[serde(rename = "eCert", default, skip_serializing_if = "Option::is_none")]
    e_cert: Option<String>,
}

impl TryFrom<RawRecord> for StorageRecord {
    type Error = String;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let issued_at = NaiveDateTime::parse_from_str(&raw.it, RECORD_TIME_FORMAT)
            .map_err(|e| format!("签发时间 {} 格式错误: {}", raw.it, e))?;
        let expires_at = NaiveDateTime::parse_from_str(&raw.et, RECORD_TIME_FORMAT)
            .map_err(|e| format!("过期时间 {} 格式错误: {}", raw.et, e))?;

        let payload = match (raw.id, raw.e_id, raw.cert, raw.e_cert) {
            (Some(id), None, Some(cert), None) => RecordPayload::Plain { id, cert },
            (None, Some(e_id), None, Some(e_cert)) => RecordPayload::Encrypted { e_id, e_cert },
            _ => {
                return Err(
                    "记录必须且只能包含 id/cert 或 eId/eCert 中的一组字段".to_string(),
                )
            }
        };

        Ok(Self {
            issued_at,
            expires_at,
            serial: raw.serial,
            payload,
        })
    }
}

impl From<StorageRecord> for RawRecord {
    fn from(record: StorageRecord) -> Self {
        let (id, e_id, cert, e_cert) = match record.payload {
            RecordPayload::Plain { id, cert } => (Some(id), None, Some(cert), None),
            RecordPayload::Encrypted { e_id, e_cert } => (None, Some(e_id), None, Some(e_cert)),
        };

        Self {
            it: record.issued_at.format(RECORD_TIME_FORMAT).to_string(),
            et: record.expires_at.format(RECORD_TIME_FORMAT).to_string(),
            serial: record.serial,
            id,
            e_id,
            cert,
            e_cert,
        }
    }
}
