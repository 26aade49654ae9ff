//! 핸드셰이크 토큰과 프레임 암호화
//!
//! 토큰은 서버가 보낸 nonce에 대한 HMAC-SHA256이며, AES 프레임은
//! `nonce(12) || ciphertext || tag` 형태입니다.

use anyhow::{anyhow, Result};
use rand::RngCore;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::hmac;
use sha2::{Digest, Sha256};

use crate::security::key::KeyMaterial;

/// 핸드셰이크 nonce 길이
pub const HANDSHAKE_NONCE_LEN: usize = 32;

const FRAME_AAD: &[u8] = b"loghub-frame-v1";

/// 무작위 핸드셰이크 nonce 생성
pub fn handshake_nonce() -> Vec<u8> {
    let mut nonce = vec![0u8; HANDSHAKE_NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// 인증 토큰 계산
pub(crate) fn auth_token(material: &KeyMaterial, nonce: &[u8]) -> Vec<u8> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, &material.secret);
    hmac::sign(&key, nonce).as_ref().to_vec()
}

/// 인증 토큰 검증 (상수 시간 비교)
pub(crate) fn verify_token(material: &KeyMaterial, nonce: &[u8], token: &[u8]) -> bool {
    let key = hmac::Key::new(hmac::HMAC_SHA256, &material.secret);
    hmac::verify(&key, nonce, token).is_ok()
}

/// AES-256-GCM 프레임 암호기
pub(crate) struct FrameCipher {
    key: LessSafeKey,
}

impl FrameCipher {
    /// 키 자료에서 AES 키 파생 (SHA-256)
    pub fn new(material: &KeyMaterial) -> Result<Self> {
        let derived = Sha256::digest(&material.secret);
        let unbound = UnboundKey::new(&AES_256_GCM, derived.as_slice())
            .map_err(|_| anyhow!("AES 키 생성 실패"))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
        })
    }

    /// 평문 본문 암호화
    pub fn seal(&self, plain: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plain.to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::from(FRAME_AAD), &mut in_out)
            .map_err(|_| anyhow!("프레임 암호화 실패"))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);
        Ok(sealed)
    }

    /// 암호화된 본문 복호화
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(anyhow!("암호화 프레임이 너무 짧습니다: {} 바이트", sealed.len()));
        }
        let (nonce_bytes, body) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| anyhow!("잘못된 nonce"))?;

        let mut in_out = body.to_vec();
        let plain_len = self
            .key
            .open_in_place(nonce, Aad::from(FRAME_AAD), &mut in_out)
            .map_err(|_| anyhow!("프레임 복호화 실패 (키 불일치 또는 변조)"))?
            .len();
        in_out.truncate(plain_len);
        Ok(in_out)
    }
}
