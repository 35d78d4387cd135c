//! Standard security handler through the document API.

mod common;

use common::encrypted_pdf;
use pdf_engine::encryption::Permissions;
use pdf_engine::{Document, Error, MemorySource, Object, ObjectRef, SaveOptions};

const SECRET: &[u8] = b"attack at dawn";
const SECRET_REF: ObjectRef = ObjectRef { id: 4, gen: 0 };

fn secret(doc: &Document) -> Vec<u8> {
    match doc.get_object(SECRET_REF) {
        Object::Dictionary(d) => d.get("Secret").and_then(Object::as_string).map(<[u8]>::to_vec).unwrap(),
        other => panic!("object 4 is {:?}", other),
    }
}

fn open(password: Option<&[u8]>) -> Document {
    let bytes = encrypted_pdf(b"user", b"owner", SECRET);
    Document::open(MemorySource::new(bytes), password).unwrap()
}

// ============================================================================
// Authentication
// ============================================================================

#[test]
fn test_user_password_decrypts_strings() {
    let doc = open(Some(b"user"));
    assert!(doc.is_encrypted());
    assert!(doc.is_authenticated());
    assert_eq!(secret(&doc), SECRET);
}

#[test]
fn test_owner_password_decrypts_strings() {
    let doc = open(Some(b"owner"));
    assert!(doc.is_authenticated());
    assert_eq!(secret(&doc), SECRET);
}

#[test]
fn test_wrong_password_leaves_payloads_opaque() {
    let doc = open(Some(b"guess"));
    assert!(doc.is_encrypted());
    assert!(!doc.is_authenticated());
    assert_ne!(secret(&doc), SECRET);

    // Structure stays navigable
    assert_eq!(doc.page_count().unwrap(), 1);
    assert_eq!(doc.get_page(0).unwrap().media_box.x1, 100.0);
}

#[test]
fn test_later_authentication() {
    let doc = open(None);
    assert!(!doc.is_authenticated());
    assert!(!doc.authenticate(b"nope"));
    assert!(doc.authenticate(b"user"));
    assert!(doc.is_authenticated());
    assert_eq!(secret(&doc), SECRET);
}

#[test]
fn test_empty_user_password_opens_without_prompt() {
    let bytes = encrypted_pdf(b"", b"owner", SECRET);
    let doc = Document::open(MemorySource::new(bytes), None).unwrap();
    assert!(doc.is_encrypted());
    assert!(doc.is_authenticated());
    assert_eq!(secret(&doc), SECRET);
}

#[test]
fn test_permissions_from_p() {
    let doc = open(Some(b"user"));
    let p = doc.permissions();
    assert!(p.contains(Permissions::PRINT));
    assert!(!Document::new().permissions().is_empty());
}

// ============================================================================
// Probing
// ============================================================================

#[test]
fn test_probe_encrypted() {
    let mut encrypted = MemorySource::new(encrypted_pdf(b"user", b"owner", SECRET));
    assert!(Document::probe_encrypted(&mut encrypted).unwrap());

    let mut plain = MemorySource::new(common::simple_pdf(1));
    assert!(!Document::probe_encrypted(&mut plain).unwrap());
}

#[test]
fn test_is_encrypted_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locked.pdf");
    std::fs::write(&path, encrypted_pdf(b"user", b"owner", SECRET)).unwrap();
    assert!(Document::is_encrypted_file(&path).unwrap());
}

// ============================================================================
// Saving
// ============================================================================

#[test]
fn test_save_requires_authentication() {
    let doc = open(Some(b"wrong"));
    let mut out = Vec::new();
    let err = doc.save(&mut out, &SaveOptions::default()).unwrap_err();
    assert!(matches!(err, Error::AuthenticationFailure));
}

#[test]
fn test_authenticated_save_writes_plaintext() {
    let doc = open(Some(b"user"));
    let mut out = Vec::new();
    doc.save(&mut out, &SaveOptions::default()).unwrap();

    let text = String::from_utf8_lossy(&out);
    assert!(!text.contains("/Encrypt"));
    assert!(text.contains("(attack at dawn)"));

    let reopened = Document::open(MemorySource::new(out), None).unwrap();
    assert!(!reopened.is_encrypted());
    assert_eq!(secret(&reopened), SECRET);
}
