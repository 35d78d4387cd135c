//! Standard security handler key derivation (revisions 2 to 4).
//!
//! All hashing is MD5; the RC4 passes use the local cipher.

use super::rc4::rc4_crypt;
use md5::{Digest, Md5};

/// Password padding string.
pub const PADDING: &[u8; 32] = b"\x28\xBF\x4E\x5E\x4E\x75\x8A\x41\
                                  \x64\x00\x4E\x56\xFF\xFA\x01\x08\
                                  \x2E\x2E\x00\xB6\xD0\x68\x3E\x80\
                                  \x2F\x0C\xA9\xFE\x64\x53\x69\x7A";

/// Inputs shared by every derivation for one document.
#[derive(Debug, Clone)]
pub struct KeyParams<'a> {
    /// `/O` value
    pub owner_hash: &'a [u8],
    /// `/P` value
    pub permissions: i32,
    /// First element of the trailer `/ID`
    pub file_id: &'a [u8],
    /// `/R` value
    pub revision: u32,
    /// Key length in bytes (5 to 16)
    pub key_length: usize,
    /// `/EncryptMetadata`
    pub encrypt_metadata: bool,
}

/// Pad or truncate a password to 32 bytes.
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PADDING[..32 - len]);
    padded
}

/// Derive the file key from a user password.
pub fn compute_encryption_key(password: &[u8], params: &KeyParams) -> Vec<u8> {
    let key_length = params.key_length.clamp(5, 16);
    let mut hasher = Md5::new();
    hasher.update(pad_password(password));
    hasher.update(params.owner_hash);
    hasher.update(params.permissions.to_le_bytes());
    hasher.update(params.file_id);
    if params.revision >= 4 && !params.encrypt_metadata {
        hasher.update([0xFF, 0xFF, 0xFF, 0xFF]);
    }
    let mut hash = hasher.finalize().to_vec();

    if params.revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..key_length]).to_vec();
        }
    }

    hash.truncate(key_length);
    hash
}

/// Expected `/U` value for a file key. Only the first 16 bytes are
/// significant for revision 3 and later.
pub fn compute_user_hash(key: &[u8], params: &KeyParams) -> Vec<u8> {
    if params.revision < 3 {
        return rc4_crypt(key, PADDING);
    }

    let mut hasher = Md5::new();
    hasher.update(PADDING);
    hasher.update(params.file_id);
    let mut hash = hasher.finalize().to_vec();

    for i in 0..20u8 {
        let round_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
        hash = rc4_crypt(&round_key, &hash);
    }

    hash.resize(32, 0);
    hash
}

/// Try a user password; returns the file key on a match.
pub fn authenticate_user_password(password: &[u8], user_hash: &[u8], params: &KeyParams) -> Option<Vec<u8>> {
    let key = compute_encryption_key(password, params);
    let expected = compute_user_hash(&key, params);
    let significant = if params.revision >= 3 { 16 } else { 32 };

    if user_hash.len() < significant {
        return None;
    }
    constant_time_eq(&user_hash[..significant], &expected[..significant]).then_some(key)
}

fn owner_rc4_key(owner_password: &[u8], revision: u32, key_length: usize) -> Vec<u8> {
    let key_length = key_length.clamp(5, 16);
    let mut hash = Md5::digest(pad_password(owner_password)).to_vec();
    if revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash).to_vec();
        }
    }
    hash.truncate(key_length);
    hash
}

/// Compute the `/O` value. An empty owner password falls back to the user password.
pub fn compute_owner_hash(owner_password: &[u8], user_password: &[u8], revision: u32, key_length: usize) -> Vec<u8> {
    let password = if owner_password.is_empty() {
        user_password
    } else {
        owner_password
    };
    let key = owner_rc4_key(password, revision, key_length);
    let mut hash = rc4_crypt(&key, &pad_password(user_password));

    if revision >= 3 {
        for i in 1..=19u8 {
            let round_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
            hash = rc4_crypt(&round_key, &hash);
        }
    }
    hash
}

/// Recover the padded user password from `/O` with an owner password.
pub fn recover_user_password(owner_password: &[u8], params: &KeyParams) -> Vec<u8> {
    let key = owner_rc4_key(owner_password, params.revision, params.key_length);
    let mut data = params.owner_hash.to_vec();

    if params.revision >= 3 {
        for i in (0..=19u8).rev() {
            let round_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
            data = rc4_crypt(&round_key, &data);
        }
    } else {
        data = rc4_crypt(&key, &data);
    }
    data
}

/// Per-object key: MD5 of file key, low 3 bytes of the object number, low 2
/// bytes of the generation (and `sAlT` for AES), truncated to n + 5 bytes.
pub fn object_key(file_key: &[u8], id: u32, gen: u32, aes: bool) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(file_key);
    hasher.update(&id.to_le_bytes()[..3]);
    hasher.update(&gen.to_le_bytes()[..2]);
    if aes {
        hasher.update(b"sAlT");
    }
    let hash = hasher.finalize();
    hash[..(file_key.len() + 5).min(16)].to_vec()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params<'a>(owner_hash: &'a [u8], revision: u32, key_length: usize) -> KeyParams<'a> {
        KeyParams {
            owner_hash,
            permissions: -4,
            file_id: b"0123456789abcdef",
            revision,
            key_length,
            encrypt_metadata: true,
        }
    }

    #[test]
    fn test_pad_password() {
        assert_eq!(&pad_password(b""), PADDING);
        let padded = pad_password(b"abc");
        assert_eq!(&padded[..3], b"abc");
        assert_eq!(&padded[3..], &PADDING[..29]);
        assert_eq!(&pad_password(&[b'x'; 40]), &[b'x'; 32]);
    }

    #[test]
    fn test_key_lengths() {
        let o = compute_owner_hash(b"owner", b"user", 2, 5);
        assert_eq!(compute_encryption_key(b"user", &params(&o, 2, 5)).len(), 5);
        let o = compute_owner_hash(b"owner", b"user", 3, 16);
        assert_eq!(compute_encryption_key(b"user", &params(&o, 3, 16)).len(), 16);
    }

    #[test]
    fn test_user_password_roundtrip_r2_and_r3() {
        for (revision, len) in [(2, 5), (3, 16), (4, 16)] {
            let o = compute_owner_hash(b"owner", b"secret", revision, len);
            let p = params(&o, revision, len);
            let key = compute_encryption_key(b"secret", &p);
            let u = compute_user_hash(&key, &p);

            assert_eq!(authenticate_user_password(b"secret", &u, &p), Some(key));
            assert_eq!(authenticate_user_password(b"wrong", &u, &p), None);
        }
    }

    #[test]
    fn test_owner_password_recovers_user_password() {
        for revision in [2, 3] {
            let o = compute_owner_hash(b"owner", b"secret", revision, 16);
            let p = params(&o, revision, 16);
            assert_eq!(recover_user_password(b"owner", &p), pad_password(b"secret").to_vec());
        }
    }

    #[test]
    fn test_empty_owner_uses_user_password() {
        assert_eq!(
            compute_owner_hash(b"", b"user", 3, 16),
            compute_owner_hash(b"user", b"user", 3, 16)
        );
    }

    #[test]
    fn test_object_key() {
        assert_eq!(object_key(&[1, 2, 3, 4, 5], 1, 0, false).len(), 10);
        assert_eq!(object_key(&[1; 16], 1, 0, true).len(), 16);
        assert_ne!(object_key(&[1; 16], 1, 0, false), object_key(&[1; 16], 2, 0, false));
        assert_ne!(object_key(&[1; 16], 1, 0, false), object_key(&[1; 16], 1, 0, true));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
