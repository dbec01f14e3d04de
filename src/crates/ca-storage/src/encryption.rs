//! # 存储加密
//!
//! 基于口令派生密钥的对称加密，用于加密证书日志中的主题标识和证书内容。
//!
//! ## 算法
//!
//! - 密钥派生: PBKDF2-HMAC-SHA256（口令 + 盐 + 迭代次数），默认 65536 次迭代、128 位密钥
//! - 加密: AES-GCM，每次加密使用随机生成的 12 字节 nonce 作为 IV
//! - 可选压缩: 加密前 Zstd 压缩，解密后解压
//!
//! 加密结果是一个 JSON 信封 `{kid, iv, ciphertext}`，`iv` 和 `ciphertext` 为 Base64 编码。
//! 解密时按信封中的 `kid` 选择密钥：缺省或等于本编解码器的 `kid` 时使用缓存的默认密钥，
//! 否则从调用方提供的密钥表中取出口令临时派生密钥。

use crate::compression;
use crate::error::StorageError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

/// 默认迭代次数
pub const DEFAULT_ITERATIONS: u32 = 65536;

/// 默认密钥长度（位）
pub const DEFAULT_KEY_LENGTH: u32 = 128;

/// AES-GCM nonce 长度（字节）
const NONCE_LEN: usize = 12;

/// 密钥表：密钥标识 -> 口令
pub type KeyStore = HashMap<String, String>;

/// 派生密钥长度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLength {
    /// AES-128
    Aes128,
    /// AES-256
    Aes256,
}

impl KeyLength {
    /// 从位数创建
    pub fn from_bits(bits: u32) -> Result<Self, StorageError> {
        match bits {
            128 => Ok(KeyLength::Aes128),
            256 => Ok(KeyLength::Aes256),
            other => Err(StorageError::Config(format!(
                "不支持的密钥长度: {} 位（仅支持 128 或 256）",
                other
            ))),
        }
    }

    /// 位数
    pub fn bits(self) -> u32 {
        match self {
            KeyLength::Aes128 => 128,
            KeyLength::Aes256 => 256,
        }
    }

    fn bytes(self) -> usize {
        self.bits() as usize / 8
    }
}

impl Default for KeyLength {
    fn default() -> Self {
        KeyLength::Aes128
    }
}

/// 加密信封
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// 密钥标识
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// 初始化向量
    #[serde(with = "base64_bytes")]
    pub iv: Vec<u8>,

    /// 密文（含认证标签）
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
}

impl EncryptedEnvelope {
    /// 从 JSON 字节解析
    pub fn from_bytes(data: &[u8]) -> Result<Self, StorageError> {
        serde_json::from_slice(data)
            .map_err(|e| StorageError::Crypto(format!("加密信封格式错误: {}", e)))
    }

    /// 序列化为 JSON 字节
    pub fn to_bytes(&self) -> Result<Vec<u8>, StorageError> {
        serde_json::to_vec(self)
            .map_err(|e| StorageError::Crypto(format!("序列化加密信封失败: {}", e)))
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// 派生出的 AES-GCM 密钥
#[derive(Clone)]
enum AeadCipher {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

impl AeadCipher {
    fn derive(
        password: &str,
        salt: &[u8],
        iterations: u32,
        key_length: KeyLength,
    ) -> Result<Self, StorageError> {
        let mut key = vec![0u8; key_length.bytes()];
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);

        let cipher = match key_length {
            KeyLength::Aes128 => Aes128Gcm::new_from_slice(&key).map(AeadCipher::Aes128),
            KeyLength::Aes256 => Aes256Gcm::new_from_slice(&key).map(AeadCipher::Aes256),
        };
        cipher.map_err(|e| StorageError::Crypto(format!("创建密钥失败: {}", e)))
    }

    fn encrypt(&self, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, StorageError> {
        let nonce = Nonce::from_slice(iv);
        let result = match self {
            AeadCipher::Aes128(cipher) => cipher.encrypt(nonce, plaintext),
            AeadCipher::Aes256(cipher) => cipher.encrypt(nonce, plaintext),
        };
        result.map_err(|e| StorageError::Crypto(format!("加密失败: {}", e)))
    }

    fn decrypt(&self, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, StorageError> {
        let nonce = Nonce::from_slice(iv);
        let result = match self {
            AeadCipher::Aes128(cipher) => cipher.decrypt(nonce, ciphertext),
            AeadCipher::Aes256(cipher) => cipher.decrypt(nonce, ciphertext),
        };
        result.map_err(|e| StorageError::Crypto(format!("解密失败: {}", e)))
    }
}

/// 存储编解码器
///
/// 构造时派生并缓存默认密钥，之后的加密全部使用默认密钥。
#[derive(Clone)]
pub struct StorageCodec {
    kid: String,
    salt: Vec<u8>,
    iterations: u32,
    key_length: KeyLength,
    default_cipher: AeadCipher,
}

impl fmt::Debug for StorageCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCodec")
            .field("kid", &self.kid)
            .field("iterations", &self.iterations)
            .field("key_length", &self.key_length.bits())
            .finish_non_exhaustive()
    }
}

impl StorageCodec {
    /// 使用默认迭代次数和默认密钥长度创建编解码器
    pub fn new(password: &str, kid: impl Into<String>, salt: &[u8]) -> Result<Self, StorageError> {
        Self::with_parameters(password, kid, salt, KeyLength::default(), DEFAULT_ITERATIONS)
    }

    /// 指定全部参数创建编解码器
    pub fn with_parameters(
        password: &str,
        kid: impl Into<String>,
        salt: &[u8],
        key_length: KeyLength,
        iterations: u32,
    ) -> Result<Self, StorageError> {
        let kid = kid.into();
        if iterations == 0 {
            return Err(StorageError::Config("迭代次数必须大于0".to_string()));
        }

        let default_cipher = AeadCipher::derive(password, salt, iterations, key_length)?;
        info!(
            "存储加密已初始化: kid={}, 密钥长度={}, 迭代次数={}",
            kid,
            key_length.bits(),
            iterations
        );

        Ok(Self {
            kid,
            salt: salt.to_vec(),
            iterations,
            key_length,
            default_cipher,
        })
    }

    /// 默认密钥的标识
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// 派生密钥长度
    pub fn key_length(&self) -> KeyLength {
        self.key_length
    }

    /// 迭代次数
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// 加密数据
    ///
    /// 返回序列化后的信封字节。`compress` 为 true 时先压缩再加密。
    pub fn encrypt(&self, data: &[u8], compress: bool) -> Result<Vec<u8>, StorageError> {
        let plaintext = if compress {
            if data.len() < compression::MIN_COMPRESSIBLE_LEN {
                debug!("待压缩数据仅 {} 字节，压缩后可能变大", data.len());
            }
            compression::compress(data)?
        } else {
            data.to_vec()
        };

        let mut iv = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let ciphertext = self.default_cipher.encrypt(&iv, &plaintext)?;

        EncryptedEnvelope {
            kid: Some(self.kid.clone()),
            iv: iv.to_vec(),
            ciphertext,
        }
        .to_bytes()
    }

    /// 解密数据
    ///
    /// `decompress` 必须与加密时的 `compress` 一致。
    /// 信封的 `kid` 不是默认密钥时，从 `key_store` 中查找口令。
    pub fn decrypt(
        &self,
        envelope: &[u8],
        decompress: bool,
        key_store: Option<&KeyStore>,
    ) -> Result<Vec<u8>, StorageError> {
        let envelope = EncryptedEnvelope::from_bytes(envelope)?;
        if envelope.iv.len() != NONCE_LEN {
            return Err(StorageError::Crypto(format!(
                "IV 长度无效: {} 字节",
                envelope.iv.len()
            )));
        }

        let plaintext = match envelope.kid.as_deref() {
            Some(kid) if !kid.eq_ignore_ascii_case(&self.kid) => {
                let password = key_store
                    .and_then(|keys| keys.get(kid))
                    .ok_or_else(|| StorageError::UnknownKeyId(kid.to_string()))?;
                debug!("使用密钥表中的密钥解密: {}", kid);
                let cipher =
                    AeadCipher::derive(password, &self.salt, self.iterations, self.key_length)?;
                cipher.decrypt(&envelope.iv, &envelope.ciphertext)?
            }
            _ => {
                debug!("使用默认密钥解密: {}", self.kid);
                self.default_cipher.decrypt(&envelope.iv, &envelope.ciphertext)?
            }
        };

        if decompress {
            compression::decompress(&plaintext)
        } else {
            Ok(plaintext)
        }
    }
}
