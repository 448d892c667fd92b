//! AES-256-GCM authenticated encryption: 96-bit random IV, 128-bit tag (§4.2).

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand_core::{CryptoRng, RngCore};
use thiserror::Error;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AesGcmError {
    #[error("decryption failed: tag mismatch, wrong key, or corrupted ciphertext")]
    DecryptionFailed,
    #[error("malformed envelope: {0}")]
    Malformed(&'static str),
}

/// An encrypted payload in the shape the escrow/store persistence layout
/// uses: `{iv, ciphertext, tag}`, with the tag appended to the ciphertext by
/// the underlying AEAD and split back out on decrypt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub iv: [u8; IV_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

impl Envelope {
    pub fn to_hex_parts(&self) -> (String, String, String) {
        (
            hex::encode(self.iv),
            hex::encode(&self.ciphertext),
            hex::encode(self.tag),
        )
    }

    pub fn from_hex_parts(iv: &str, ciphertext: &str, tag: &str) -> Result<Self, AesGcmError> {
        let iv_bytes = hex::decode(iv).map_err(|_| AesGcmError::Malformed("iv not hex"))?;
        let tag_bytes = hex::decode(tag).map_err(|_| AesGcmError::Malformed("tag not hex"))?;
        let ciphertext =
            hex::decode(ciphertext).map_err(|_| AesGcmError::Malformed("ciphertext not hex"))?;
        if iv_bytes.len() != IV_LEN {
            return Err(AesGcmError::Malformed("iv wrong length"));
        }
        if tag_bytes.len() != TAG_LEN {
            return Err(AesGcmError::Malformed("tag wrong length"));
        }
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&iv_bytes);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&tag_bytes);
        Ok(Envelope {
            iv,
            ciphertext,
            tag,
        })
    }
}

/// Encrypt `plaintext` under `key` (exactly 32 bytes), drawing the IV from
/// `rng`. Never reuse an IV with the same key.
pub fn encrypt(
    key: &[u8; KEY_LEN],
    plaintext: &[u8],
    rng: &mut (impl RngCore + CryptoRng),
) -> Envelope {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);
    let mut sealed = cipher
        .encrypt(nonce, plaintext)
        .expect("aes-gcm encryption is infallible for valid key/nonce lengths");
    let tag_bytes = sealed.split_off(sealed.len() - TAG_LEN);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&tag_bytes);
    Envelope {
        iv,
        ciphertext: sealed,
        tag,
    }
}

/// Decrypt an [`Envelope`] under `key`. Fails distinctly (never panics, never
/// returns partial plaintext) on tag mismatch or wrong key.
pub fn decrypt(key: &[u8; KEY_LEN], envelope: &Envelope) -> Result<Vec<u8>, AesGcmError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(&envelope.iv);
    let mut combined = envelope.ciphertext.clone();
    combined.extend_from_slice(&envelope.tag);
    cipher
        .decrypt(nonce, combined.as_slice())
        .map_err(|_| AesGcmError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn key() -> [u8; KEY_LEN] {
        [42u8; KEY_LEN]
    }

    #[test]
    fn round_trip() {
        let mut rng = OsRng;
        let env = encrypt(&key(), b"hello zeroid", &mut rng);
        let plain = decrypt(&key(), &env).unwrap();
        assert_eq!(plain, b"hello zeroid");
    }

    #[test]
    fn wrong_key_fails() {
        let mut rng = OsRng;
        let env = encrypt(&key(), b"hello zeroid", &mut rng);
        let wrong = [7u8; KEY_LEN];
        assert_eq!(decrypt(&wrong, &env), Err(AesGcmError::DecryptionFailed));
    }

    #[test]
    fn bit_flip_in_ciphertext_fails() {
        let mut rng = OsRng;
        let mut env = encrypt(&key(), b"hello zeroid", &mut rng);
        env.ciphertext[0] ^= 0x01;
        assert_eq!(decrypt(&key(), &env), Err(AesGcmError::DecryptionFailed));
    }

    #[test]
    fn bit_flip_in_tag_fails() {
        let mut rng = OsRng;
        let mut env = encrypt(&key(), b"hello zeroid", &mut rng);
        env.tag[0] ^= 0x01;
        assert_eq!(decrypt(&key(), &env), Err(AesGcmError::DecryptionFailed));
    }

    #[test]
    fn bit_flip_in_iv_fails() {
        let mut rng = OsRng;
        let mut env = encrypt(&key(), b"hello zeroid", &mut rng);
        env.iv[0] ^= 0x01;
        assert_eq!(decrypt(&key(), &env), Err(AesGcmError::DecryptionFailed));
    }

    #[test]
    fn hex_round_trip() {
        let mut rng = OsRng;
        let env = encrypt(&key(), b"payload", &mut rng);
        let (iv, ct, tag) = env.to_hex_parts();
        let parsed = Envelope::from_hex_parts(&iv, &ct, &tag).unwrap();
        assert_eq!(parsed, env);
    }
}
