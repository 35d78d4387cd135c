//! AES-128-CBC for the `AESV2` crypt filter.
//!
//! Encrypted payloads are a 16-byte IV followed by the ciphertext, padded
//! with PKCS#7.

use aes::Aes128;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::{Decryptor, Encryptor};

type Aes128CbcEnc = Encryptor<Aes128>;
type Aes128CbcDec = Decryptor<Aes128>;

/// Decrypt `IV || ciphertext` and strip the padding.
pub fn aes128_decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, &'static str> {
    if key.len() != 16 {
        return Err("AES-128 key must be 16 bytes");
    }
    if data.len() < 16 {
        return Err("missing initialization vector");
    }
    let (iv, ciphertext) = data.split_at(16);
    if ciphertext.is_empty() {
        return Ok(Vec::new());
    }
    if ciphertext.len() % 16 != 0 {
        return Err("ciphertext is not a whole number of blocks");
    }

    let mut buffer = ciphertext.to_vec();
    let cipher = Aes128CbcDec::new(key.into(), iv.into());
    let plain = cipher
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|_| "bad padding")?;
    Ok(plain.to_vec())
}

/// Encrypt with PKCS#7 padding and prepend the IV.
pub fn aes128_encrypt(key: &[u8], iv: &[u8; 16], data: &[u8]) -> Result<Vec<u8>, &'static str> {
    if key.len() != 16 {
        return Err("AES-128 key must be 16 bytes");
    }
    let mut buffer = data.to_vec();
    let pad = 16 - data.len() % 16;
    buffer.resize(data.len() + pad, 0);

    let cipher = Aes128CbcEnc::new(key.into(), iv.into());
    let encrypted = cipher
        .encrypt_padded_mut::<Pkcs7>(&mut buffer, data.len())
        .map_err(|_| "buffer too small")?;

    let mut out = Vec::with_capacity(16 + encrypted.len());
    out.extend_from_slice(iv);
    out.extend_from_slice(encrypted);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 16] = [7u8; 16];
    const IV: [u8; 16] = [3u8; 16];

    #[test]
    fn test_roundtrip() {
        for len in [0usize, 1, 15, 16, 17, 100] {
            let data: Vec<u8> = (0..len as u8).collect();
            let encrypted = aes128_encrypt(&KEY, &IV, &data).unwrap();
            assert_eq!(encrypted.len(), 16 + (len / 16 + 1) * 16);
            assert_eq!(aes128_decrypt(&KEY, &encrypted).unwrap(), data);
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(aes128_decrypt(&[0u8; 5], &[0u8; 32]).is_err());
        assert!(aes128_decrypt(&KEY, &[0u8; 8]).is_err());
        assert!(aes128_decrypt(&KEY, &[0u8; 20]).is_err());
        assert!(aes128_decrypt(&KEY, &IV).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_key_fails_or_differs() {
        let encrypted = aes128_encrypt(&KEY, &IV, b"secret message").unwrap();
        match aes128_decrypt(&[9u8; 16], &encrypted) {
            Ok(plain) => assert_ne!(plain, b"secret message"),
            Err(_) => {},
        }
    }
}
