//! Standard security handler.
//!
//! Supports RC4 (V1/V2, R2/R3) and AES-128 crypt filters (V4, R4 with
//! `/CFM /AESV2`). A document opens without a password check; strings and
//! streams are only decrypted once a password has authenticated.

use crate::error::{Error, Result};
use crate::object::{Dictionary, DictionaryExt, Object};
use bitflags::bitflags;

mod aes;
mod algorithms;
mod handler;
mod rc4;

pub use aes::{aes128_decrypt, aes128_encrypt};
pub use algorithms::{
    KeyParams, PADDING, authenticate_user_password, compute_encryption_key, compute_owner_hash,
    compute_user_hash, object_key, pad_password,
};
pub use handler::{PayloadKind, SecurityHandler};
pub use rc4::rc4_crypt;

/// Cipher applied by a crypt filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptMethod {
    /// `/Identity`, or `/CFM /None`
    Identity,
    /// RC4 (V1/V2 or `/CFM /V2`)
    Rc4,
    /// AES-128-CBC (`/CFM /AESV2`)
    AesV2,
}

bitflags! {
    /// User access permissions (`/P`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u32 {
        /// Print the document
        const PRINT = 1 << 2;
        /// Modify contents
        const MODIFY = 1 << 3;
        /// Copy or extract text and graphics
        const COPY = 1 << 4;
        /// Add or modify annotations
        const ANNOTATE = 1 << 5;
        /// Fill in form fields
        const FILL_FORMS = 1 << 8;
        /// Extract for accessibility
        const EXTRACT_ACCESSIBILITY = 1 << 9;
        /// Assemble (insert, rotate, delete pages)
        const ASSEMBLE = 1 << 10;
        /// Print at full quality
        const PRINT_HIGH_QUALITY = 1 << 11;
    }
}

impl Permissions {
    /// Interpret a raw `/P` value; reserved bits are dropped.
    pub fn from_p(p: i32) -> Self {
        Self::from_bits_truncate(p as u32)
    }
}

/// Parsed `/Encrypt` dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptDict {
    /// `/Filter` (only `Standard` is supported)
    pub filter: String,
    /// `/V`
    pub version: u32,
    /// `/R`
    pub revision: u32,
    /// Key length in bytes
    pub key_length: usize,
    /// `/O`
    pub owner_hash: Vec<u8>,
    /// `/U`
    pub user_hash: Vec<u8>,
    /// `/P`
    pub permissions: i32,
    /// `/EncryptMetadata`
    pub encrypt_metadata: bool,
    /// Method for streams (`/StmF`)
    pub stream_method: CryptMethod,
    /// Method for strings (`/StrF`)
    pub string_method: CryptMethod,
}

impl EncryptDict {
    /// Parse an encryption dictionary.
    pub fn from_dict(dict: &Dictionary) -> Result<Self> {
        let filter = dict.get_name("Filter").unwrap_or("Standard").to_string();
        if filter != "Standard" {
            return Err(Error::NotImplemented(format!("security handler /{}", filter)));
        }

        let version = dict.get_int("V").unwrap_or(0) as u32;
        let revision = dict
            .get_int("R")
            .ok_or_else(|| Error::StructuralInvariantViolation("Encrypt dictionary missing /R".into()))?
            as u32;
        if version >= 5 || revision >= 5 {
            return Err(Error::NotImplemented(format!("encryption V={} R={}", version, revision)));
        }

        let bytes = |key: &str| -> Result<Vec<u8>> {
            dict.get(key)
                .and_then(Object::as_string)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| Error::StructuralInvariantViolation(format!("Encrypt dictionary missing /{}", key)))
        };
        let owner_hash = bytes("O")?;
        let user_hash = bytes("U")?;
        let permissions = dict
            .get_int("P")
            .ok_or_else(|| Error::StructuralInvariantViolation("Encrypt dictionary missing /P".into()))?
            as i32;
        let encrypt_metadata = dict.get_bool("EncryptMetadata").unwrap_or(true);

        let (mut key_length, stream_method, string_method) = if version == 4 {
            let stream = crypt_filter(dict, "StmF")?;
            let string = crypt_filter(dict, "StrF")?;
            (16, stream, string)
        } else {
            (5, CryptMethod::Rc4, CryptMethod::Rc4)
        };
        if version == 2 || version == 3 {
            if let Some(bits) = dict.get_int("Length") {
                key_length = (bits / 8) as usize;
            }
        }
        if version == 4 {
            if let Some(bits) = std_cf_length(dict) {
                key_length = bits;
            }
        }

        Ok(Self {
            filter,
            version,
            revision,
            key_length: key_length.clamp(5, 16),
            owner_hash,
            user_hash,
            permissions,
            encrypt_metadata,
            stream_method,
            string_method,
        })
    }

    /// Parse from an object (must be a dictionary).
    pub fn from_object(obj: &Object) -> Result<Self> {
        let dict = obj.as_dict().ok_or_else(|| Error::InvalidObjectType {
            expected: "Dictionary".into(),
            found: obj.type_name().into(),
        })?;
        Self::from_dict(dict)
    }

    /// Permission set from `/P`.
    pub fn permissions(&self) -> Permissions {
        Permissions::from_p(self.permissions)
    }

    /// Derivation inputs for a file ID.
    pub fn key_params<'a>(&'a self, file_id: &'a [u8]) -> KeyParams<'a> {
        KeyParams {
            owner_hash: &self.owner_hash,
            permissions: self.permissions,
            file_id,
            revision: self.revision,
            key_length: self.key_length,
            encrypt_metadata: self.encrypt_metadata,
        }
    }
}

/// Resolve `/StmF` or `/StrF` through `/CF`.
fn crypt_filter(dict: &Dictionary, entry: &str) -> Result<CryptMethod> {
    let name = dict.get_name(entry).unwrap_or("Identity");
    if name == "Identity" {
        return Ok(CryptMethod::Identity);
    }
    let filter = dict
        .get("CF")
        .and_then(Object::as_dict)
        .and_then(|cf| cf.get(name))
        .and_then(Object::as_dict)
        .ok_or_else(|| Error::StructuralInvariantViolation(format!("crypt filter /{} not in /CF", name)))?;

    match filter.get_name("CFM").unwrap_or("None") {
        "None" => Ok(CryptMethod::Identity),
        "V2" => Ok(CryptMethod::Rc4),
        "AESV2" => Ok(CryptMethod::AesV2),
        other => Err(Error::NotImplemented(format!("crypt filter method /{}", other))),
    }
}

/// Key length in bytes from the standard crypt filter, if given.
///
/// `/Length` here is in bytes for AESV2 but some writers put bits.
fn std_cf_length(dict: &Dictionary) -> Option<usize> {
    let name = dict.get_name("StmF")?;
    let len = dict.get("CF")?.as_dict()?.get(name)?.as_dict()?.get_int("Length")?;
    Some(if len > 16 { (len / 8) as usize } else { len as usize })
}
