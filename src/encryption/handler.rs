//! Per-document security state: password authentication and per-object
//! string/stream decryption.

use super::algorithms::{self, object_key};
use super::{CryptMethod, EncryptDict, Permissions};
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};

/// What an encrypted payload belongs to; strings and streams may use
/// different crypt filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// String inside an indirect object
    String,
    /// Stream data
    Stream,
}

/// Security handler for one document.
#[derive(Debug, Clone)]
pub struct SecurityHandler {
    dict: EncryptDict,
    file_id: Vec<u8>,
    file_key: Option<Vec<u8>>,
}

impl SecurityHandler {
    /// Build from a parsed dictionary and the first `/ID` string.
    pub fn new(dict: EncryptDict, file_id: Vec<u8>) -> Self {
        log::info!(
            "Document encrypted: V={} R={} key length {} bytes",
            dict.version,
            dict.revision,
            dict.key_length
        );
        Self {
            dict,
            file_id,
            file_key: None,
        }
    }

    /// Build from the trailer's `/Encrypt` value.
    pub fn from_object(encrypt: &Object, file_id: Vec<u8>) -> Result<Self> {
        Ok(Self::new(EncryptDict::from_object(encrypt)?, file_id))
    }

    /// Try a password as the user password, then as the owner password.
    ///
    /// On success the file key is kept and content becomes decryptable.
    pub fn authenticate(&mut self, password: &[u8]) -> bool {
        let params = self.dict.key_params(&self.file_id);

        if let Some(key) = algorithms::authenticate_user_password(password, &self.dict.user_hash, &params) {
            log::debug!("Authenticated with user password");
            self.file_key = Some(key);
            return true;
        }

        let user_password = algorithms::recover_user_password(password, &params);
        if let Some(key) = algorithms::authenticate_user_password(&user_password, &self.dict.user_hash, &params) {
            log::debug!("Authenticated with owner password");
            self.file_key = Some(key);
            return true;
        }

        log::warn!("Password did not authenticate; encrypted content stays opaque");
        false
    }

    /// True once a password has matched.
    pub fn is_authenticated(&self) -> bool {
        self.file_key.is_some()
    }

    /// File key, after authentication.
    pub fn file_key(&self) -> Option<&[u8]> {
        self.file_key.as_deref()
    }

    /// Parsed encryption dictionary.
    pub fn dict(&self) -> &EncryptDict {
        &self.dict
    }

    /// Access permissions.
    pub fn permissions(&self) -> Permissions {
        self.dict.permissions()
    }

    fn method(&self, kind: PayloadKind) -> CryptMethod {
        match kind {
            PayloadKind::String => self.dict.string_method,
            PayloadKind::Stream => self.dict.stream_method,
        }
    }

    /// Decrypt a string or stream belonging to `reference`.
    pub fn decrypt(&self, data: &[u8], reference: ObjectRef, kind: PayloadKind) -> Result<Vec<u8>> {
        let file_key = self.file_key.as_deref().ok_or(Error::AuthenticationFailure)?;
        match self.method(kind) {
            CryptMethod::Identity => Ok(data.to_vec()),
            CryptMethod::Rc4 => {
                let key = object_key(file_key, reference.id, reference.gen, false);
                Ok(super::rc4::rc4_crypt(&key, data))
            },
            CryptMethod::AesV2 => {
                let key = object_key(file_key, reference.id, reference.gen, true);
                super::aes::aes128_decrypt(&key, data)
                    .map_err(|e| Error::filter("AESV2", format!("object {}: {}", reference, e)))
            },
        }
    }

    /// Encrypt a payload for `reference` (fresh random IV for AES).
    pub fn encrypt(&self, data: &[u8], reference: ObjectRef, kind: PayloadKind) -> Result<Vec<u8>> {
        let file_key = self.file_key.as_deref().ok_or(Error::AuthenticationFailure)?;
        match self.method(kind) {
            CryptMethod::Identity => Ok(data.to_vec()),
            CryptMethod::Rc4 => {
                let key = object_key(file_key, reference.id, reference.gen, false);
                Ok(super::rc4::rc4_crypt(&key, data))
            },
            CryptMethod::AesV2 => {
                let key = object_key(file_key, reference.id, reference.gen, true);
                let iv = *uuid::Uuid::new_v4().as_bytes();
                super::aes::aes128_encrypt(&key, &iv, data).map_err(|e| Error::filter("AESV2", e))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict;
    use crate::encryption::{compute_encryption_key, compute_owner_hash, compute_user_hash};
    use crate::object::Dictionary;

    const FILE_ID: &[u8] = b"fixture-file-id!";

    fn encrypt_dict(revision: u32, key_length: usize, user: &[u8], owner: &[u8]) -> Dictionary {
        let o = compute_owner_hash(owner, user, revision, key_length);
        let mut d = dict! {
            "Filter" => Object::name("Standard"),
            "V" => Object::Integer(if revision == 2 { 1 } else { 2 }),
            "R" => Object::Integer(revision as i32),
            "Length" => Object::Integer((key_length * 8) as i32),
            "O" => Object::String(o.clone()),
            "P" => Object::Integer(-4),
        };
        let e = EncryptDict {
            filter: "Standard".into(),
            version: 2,
            revision,
            key_length,
            owner_hash: o,
            user_hash: Vec::new(),
            permissions: -4,
            encrypt_metadata: true,
            stream_method: CryptMethod::Rc4,
            string_method: CryptMethod::Rc4,
        };
        let params = e.key_params(FILE_ID);
        let key = compute_encryption_key(user, &params);
        d.insert("U".into(), Object::String(compute_user_hash(&key, &params)));
        d
    }

    fn handler(revision: u32, key_length: usize) -> SecurityHandler {
        let d = encrypt_dict(revision, key_length, b"user", b"owner");
        SecurityHandler::new(EncryptDict::from_dict(&d).unwrap(), FILE_ID.to_vec())
    }

    #[test]
    fn test_user_password() {
        let mut h = handler(3, 16);
        assert!(!h.authenticate(b"nope"));
        assert!(!h.is_authenticated());
        assert!(h.authenticate(b"user"));
        assert_eq!(h.file_key().map(<[u8]>::len), Some(16));
    }

    #[test]
    fn test_owner_password() {
        let mut h = handler(3, 16);
        assert!(h.authenticate(b"owner"));
        let mut r2 = handler(2, 5);
        assert!(r2.authenticate(b"owner"));
    }

    #[test]
    fn test_decrypt_requires_authentication() {
        let h = handler(3, 16);
        assert!(matches!(
            h.decrypt(b"x", ObjectRef::new(1, 0), PayloadKind::String),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_rc4_roundtrip_per_object() {
        let mut h = handler(3, 16);
        assert!(h.authenticate(b"user"));
        let r = ObjectRef::new(7, 0);
        let enc = h.encrypt(b"Hello", r, PayloadKind::String).unwrap();
        assert_ne!(enc, b"Hello");
        assert_eq!(h.decrypt(&enc, r, PayloadKind::String).unwrap(), b"Hello");
        // A different object key does not decrypt
        assert_ne!(h.decrypt(&enc, ObjectRef::new(8, 0), PayloadKind::String).unwrap(), b"Hello");
    }

    #[test]
    fn test_aes_roundtrip() {
        let mut h = handler(3, 16);
        h.dict.stream_method = CryptMethod::AesV2;
        assert!(h.authenticate(b"user"));
        let r = ObjectRef::new(3, 0);
        let enc = h.encrypt(b"stream payload", r, PayloadKind::Stream).unwrap();
        assert_eq!(enc.len(), 32);
        assert_eq!(h.decrypt(&enc, r, PayloadKind::Stream).unwrap(), b"stream payload");
    }
}
