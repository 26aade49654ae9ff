//! 대칭 키와 단일 사용 핸들
//!
//! [`Key`]는 복제할 수 없으며 Server/Client 설정 하나에 이동(move)되어 소비됩니다.
//! 설정을 복제하면 키 자료 대신 지문만 남는 [`KeyHandle::Consumed`]가 되고,
//! 이 상태로 작성기를 만들면 `KeyReuse` 에러가 발생합니다.

use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{LoggingError, Result};

/// 무작위 키 길이 (바이트)
pub const RANDOM_KEY_LEN: usize = 32;

/// 네트워크 암호화 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EncryptionMethod {
    /// 인증 및 암호화 없음
    #[default]
    None,
    /// 키 기반 인증만 수행
    AuthKey,
    /// 키 기반 인증 + AES-256-GCM 암호화
    Aes,
}

/// 대칭 키 (복제 불가)
pub struct Key {
    method: EncryptionMethod,
    secret: Vec<u8>,
}

impl Key {
    /// 암호화 방식
    pub fn method(&self) -> EncryptionMethod {
        self.method
    }

    /// 키 지문 (SHA-256 앞 8바이트의 hex)
    pub fn fingerprint(&self) -> String {
        fingerprint_of(&self.secret)
    }

    /// 키 자료 길이
    pub fn len(&self) -> usize {
        self.secret.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }

    /// 같은 자료를 가진 새 키 발급 (서버 키를 클라이언트에 넘길 때 사용)
    pub(crate) fn reissue(material: &KeyMaterial) -> Key {
        Key {
            method: material.method,
            secret: material.secret.clone(),
        }
    }

    fn material(&self) -> KeyMaterial {
        KeyMaterial {
            method: self.method,
            secret: self.secret.clone(),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("method", &self.method)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

fn fingerprint_of(secret: &[u8]) -> String {
    let digest = Sha256::digest(secret);
    hex::encode(&digest[..8])
}

/// 호출자가 제공한 바이트로 키 생성
pub fn create_key(method: EncryptionMethod, bytes: &[u8]) -> Result<Key> {
    if method != EncryptionMethod::None && bytes.is_empty() {
        return Err(LoggingError::Config(format!(
            "{:?} 방식에는 비어 있지 않은 키가 필요합니다",
            method
        )));
    }
    let secret = if method == EncryptionMethod::None {
        Vec::new()
    } else {
        bytes.to_vec()
    };
    Ok(Key { method, secret })
}

/// 무작위 키 생성
pub fn create_random_key(method: EncryptionMethod) -> Key {
    if method == EncryptionMethod::None {
        return Key {
            method,
            secret: Vec::new(),
        };
    }
    let mut secret = vec![0u8; RANDOM_KEY_LEN];
    rand::thread_rng().fill_bytes(&mut secret);
    Key { method, secret }
}

/// 백엔드 내부에서만 사용하는 키 자료 사본
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct KeyMaterial {
    pub method: EncryptionMethod,
    pub secret: Vec<u8>,
}

impl KeyMaterial {
    /// 인증 없음
    pub fn none() -> Self {
        Self {
            method: EncryptionMethod::None,
            secret: Vec::new(),
        }
    }

    pub fn fingerprint(&self) -> String {
        fingerprint_of(&self.secret)
    }
}

/// 설정이 보유한 키 상태
pub enum KeyHandle {
    /// 키 없음 (인증 안 함)
    Absent,
    /// 소유 중인 키
    Owned(Key),
    /// 이미 다른 설정이 소비한 키의 흔적
    Consumed {
        method: EncryptionMethod,
        fingerprint: String,
    },
}

impl KeyHandle {
    /// 선택적 키에서 핸들 생성
    pub fn from_key(key: Option<Key>) -> Self {
        match key {
            Some(key) => KeyHandle::Owned(key),
            None => KeyHandle::Absent,
        }
    }

    /// 암호화 방식
    pub fn method(&self) -> EncryptionMethod {
        match self {
            KeyHandle::Absent => EncryptionMethod::None,
            KeyHandle::Owned(key) => key.method,
            KeyHandle::Consumed { method, .. } => *method,
        }
    }

    /// 소비된 키인지 확인
    pub fn is_consumed(&self) -> bool {
        matches!(self, KeyHandle::Consumed { .. })
    }

    /// 백엔드가 사용할 키 자료 추출 (소비된 키면 `KeyReuse`)
    pub(crate) fn material(&self) -> Result<KeyMaterial> {
        match self {
            KeyHandle::Absent => Ok(KeyMaterial::none()),
            KeyHandle::Owned(key) => Ok(key.material()),
            KeyHandle::Consumed { fingerprint, .. } => {
                Err(LoggingError::KeyReuse(fingerprint.clone()))
            }
        }
    }
}

impl Default for KeyHandle {
    fn default() -> Self {
        KeyHandle::Absent
    }
}

impl Clone for KeyHandle {
    fn clone(&self) -> Self {
        match self {
            KeyHandle::Absent => KeyHandle::Absent,
            KeyHandle::Owned(key) => KeyHandle::Consumed {
                method: key.method,
                fingerprint: key.fingerprint(),
            },
            KeyHandle::Consumed {
                method,
                fingerprint,
            } => KeyHandle::Consumed {
                method: *method,
                fingerprint: fingerprint.clone(),
            },
        }
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyHandle::Absent => f.write_str("Absent"),
            KeyHandle::Owned(key) => f.debug_tuple("Owned").field(key).finish(),
            KeyHandle::Consumed {
                method,
                fingerprint,
            } => f
                .debug_struct("Consumed")
                .field("method", method)
                .field("fingerprint", fingerprint)
                .finish(),
        }
    }
}

/// 영속화 형식
#[derive(Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum KeyRecord {
    Absent,
    Owned {
        method: EncryptionMethod,
        key: String,
    },
    Consumed {
        method: EncryptionMethod,
        fingerprint: String,
    },
}

impl Serialize for KeyHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let record = match self {
            KeyHandle::Absent => KeyRecord::Absent,
            KeyHandle::Owned(key) => KeyRecord::Owned {
                method: key.method,
                key: general_purpose::STANDARD.encode(&key.secret),
            },
            KeyHandle::Consumed {
                method,
                fingerprint,
            } => KeyRecord::Consumed {
                method: *method,
                fingerprint: fingerprint.clone(),
            },
        };
        record.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for KeyHandle {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let record = KeyRecord::deserialize(deserializer)?;
        Ok(match record {
            KeyRecord::Absent => KeyHandle::Absent,
            KeyRecord::Owned { method, key } => {
                let secret = general_purpose::STANDARD
                    .decode(key.as_bytes())
                    .map_err(serde::de::Error::custom)?;
                KeyHandle::Owned(Key { method, secret })
            }
            KeyRecord::Consumed {
                method,
                fingerprint,
            } => KeyHandle::Consumed {
                method,
                fingerprint,
            },
        })
    }
}
