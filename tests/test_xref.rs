//! Cross-reference loading, incremental updates and recovery.

mod common;

use common::{append_update, init_logging, simple_pdf, PdfBuilder};
use pdf_engine::xref::XRefEntry;
use pdf_engine::resources::FontRegistry;
use pdf_engine::{Document, MemorySource, Object, ObjectRef, OpenOptions};

fn open(bytes: Vec<u8>) -> Document {
    Document::open(MemorySource::new(bytes), None).unwrap()
}

fn open_strict(bytes: Vec<u8>) -> pdf_engine::Result<Document> {
    Document::open_with(
        Box::new(MemorySource::new(bytes)),
        None,
        OpenOptions::strict(),
        FontRegistry::new(),
    )
}

fn three_objects() -> PdfBuilder {
    PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 300 300] >>")
        .trailer("/Root 1 0 R")
}

// ============================================================================
// Entry table
// ============================================================================

#[test]
fn test_every_entry_has_one_type_and_deletion_bumps_generation() {
    let doc = open(simple_pdf(2));
    let max = doc.object_count() as u32;
    for n in 1..=max {
        let entry = doc.reference_entry(n).unwrap();
        assert!(matches!(entry, XRefEntry::Normal { .. }), "object {}", n);
    }

    for n in 1..=max {
        let gen = doc.reference_entry(n).unwrap().generation();
        doc.delete_object(ObjectRef::new(n, gen)).unwrap();
        let entry = doc.reference_entry(n).unwrap();
        assert!(matches!(entry, XRefEntry::Free { .. }));
        assert_eq!(entry.generation(), gen + 1);
    }
}

#[test]
fn test_generation_mismatch_is_undefined() {
    let doc = open(simple_pdf(1));
    assert!(doc.get_object(ObjectRef::new(1, 0)).as_dict().is_some());
    assert_eq!(doc.get_object(ObjectRef::new(1, 3)), Object::Undefined);
    assert_eq!(doc.get_object(ObjectRef::new(999, 0)), Object::Undefined);
}

// ============================================================================
// Compressed sections
// ============================================================================

#[test]
fn test_xref_stream_and_object_stream() {
    let bytes = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .packed(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .packed(3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 50 60] >>")
        .packed(4, "[1 2.5 (three) /Four]")
        .trailer("/Root 1 0 R")
        .build_with_xref_stream();
    let doc = open(bytes);

    assert!(matches!(doc.reference_entry(1), Some(XRefEntry::Normal { .. })));
    assert_eq!(
        doc.reference_entry(4),
        Some(XRefEntry::Compressed { stream: 5, index: 2 })
    );
    assert_eq!(
        doc.get_object(ObjectRef::new(4, 0)),
        Object::Array(vec![
            Object::Integer(1),
            Object::Real(2.5),
            Object::String(b"three".to_vec()),
            Object::name("Four"),
        ])
    );
    assert_eq!(doc.page_count().unwrap(), 1);
    assert_eq!(doc.get_page(0).unwrap().media_box.y1, 60.0);
}

// ============================================================================
// Incremental updates
// ============================================================================

#[test]
fn test_newest_section_wins() {
    let base = three_objects().build();
    let updated = append_update(
        &base,
        &[(3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 400 500] >>")],
        "/Root 1 0 R",
    );
    let doc = open(updated);
    assert_eq!(doc.get_page(0).unwrap().media_box.x1, 400.0);
}

#[test]
fn test_trailer_keys_inherited_from_older_sections() {
    let base = three_objects().build();
    let updated = append_update(&base, &[(4, "(appended)")], "");
    let doc = open(updated);

    assert!(doc.trailer().contains_key("Root"));
    assert!(!doc.trailer().contains_key("Prev"));
    assert_eq!(doc.get_object(ObjectRef::new(4, 0)), Object::String(b"appended".to_vec()));
    assert_eq!(doc.page_count().unwrap(), 1);
}

#[test]
fn test_prev_cycle_stops() {
    init_logging();
    // A second table whose /Prev points at itself
    let mut bytes = three_objects().build();
    let own = bytes.len();
    bytes.extend_from_slice(
        format!(
            "xref\n0 1\n0000000000 65535 f\r\ntrailer\n<< /Size 4 /Root 1 0 R /Prev {} >>\nstartxref\n{}\n%%EOF\n",
            own, own
        )
        .as_bytes(),
    );
    // Entries from the first table are unreachable, so recovery takes over
    let doc = open(bytes);
    assert_eq!(doc.page_count().unwrap(), 1);
}

// ============================================================================
// Recovery
// ============================================================================

#[test]
fn test_leading_junk_before_header() {
    let bytes = three_objects().prefix(b"garbage from a mail gateway\n").build();
    let doc = open(bytes);
    assert_eq!(doc.version(), (1, 7));
    assert_eq!(doc.page_count().unwrap(), 1);
}

#[test]
fn test_wrong_offsets_recovered_by_scan() {
    init_logging();
    let mut bytes = three_objects().build();
    // Shift every object by inserting bytes after the header
    let insert_at = bytes.iter().position(|&b| b == b'\n').unwrap() + 1;
    bytes.splice(insert_at..insert_at, b"% padding comment\n".iter().copied());

    let doc = open(bytes.clone());
    assert_eq!(doc.page_count().unwrap(), 1);
    assert_eq!(doc.get_page(0).unwrap().media_box.x1, 300.0);

    assert!(open_strict(bytes).is_err());
}

#[test]
fn test_oversized_trailer_size_does_not_exhaust_memory() {
    let bytes = three_objects().trailer("/Root 1 0 R /Size 2000000000").build();
    let doc = open(bytes.clone());
    assert_eq!(doc.page_count().unwrap(), 1);
    assert_eq!(doc.reference_entry(bytes.len() as u32 + 1), None);
}

#[test]
fn test_truncated_file_without_objects_fails() {
    let result = Document::open(MemorySource::new(b"%PDF-1.4\n%%EOF\n".to_vec()), None);
    assert!(result.is_err());
}
