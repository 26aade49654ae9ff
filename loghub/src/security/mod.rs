//! 키 및 암호화 모듈
//!
//! - 대칭 키 생성/파생과 단일 사용(move-only) 소유권
//! - HMAC-SHA256 핸드셰이크 토큰
//! - AES-256-GCM 프레임 암호화

pub mod cipher;
pub mod key;

pub use key::{create_key, create_random_key, EncryptionMethod, Key, KeyHandle};
