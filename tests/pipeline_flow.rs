//! End-to-end runs of the archive pipeline: verification, extraction,
//! schema validation and envelope building against freshly signed archives.

mod common;

use std::collections::HashMap;

use mailroom::envelopes::status::Event;
use mailroom::ingest::verify::{SignatureMode, SignedArchive};
use mailroom::ingest::{builder, read_envelope, IngestError};
use mailroom::notify::ErrorCode;

use common::{build_zip, inner_archive, metadata_json, signature_mode, signed_outer};

const ZIP_NAME: &str = "1_24-06-2018-00-00-00.zip";
const CONTAINER: &str = "bulkscan";

fn jurisdictions() -> HashMap<String, String> {
    HashMap::from([(CONTAINER.to_string(), "divorce".to_string())])
}

fn archive(bytes: &[u8]) -> SignedArchive<'_> {
    SignedArchive {
        container: CONTAINER,
        zip_file_name: ZIP_NAME,
        bytes,
    }
}

#[test]
fn valid_archive_becomes_a_created_envelope() {
    let metadata = metadata_json(ZIP_NAME, &["1111002.pdf"]);
    let outer = signed_outer(&inner_archive(&metadata, &["1111002.pdf"]));

    let parsed = read_envelope(&archive(&outer), &signature_mode()).unwrap();
    assert_eq!(parsed.pdfs.len(), 1);
    assert_eq!(parsed.pdfs[0].file_name, "1111002.pdf");

    let pdf_names: Vec<String> = parsed.pdfs.iter().map(|p| p.file_name.clone()).collect();
    let bundle = builder::build(CONTAINER, &jurisdictions(), &parsed.metafile, &pdf_names).unwrap();

    assert_eq!(bundle.envelope.status, "CREATED");
    assert_eq!(bundle.envelope.zip_file_name, ZIP_NAME);
    assert_eq!(bundle.envelope.container, CONTAINER);
    assert_eq!(bundle.envelope.jurisdiction, "divorce");
    assert_eq!(bundle.envelope.po_box, "BM 12345");
    assert_eq!(bundle.envelope.case_number.as_deref(), Some("1555555"));
    assert_eq!(bundle.envelope.classification, "NEW_APPLICATION");
    assert_eq!(bundle.scannable_items.len(), 1);
    assert_eq!(bundle.scannable_items[0].document_control_number, "1111002");
    assert!(bundle.payments.is_empty());
    assert!(bundle.non_scannable_items.is_empty());
}

#[test]
fn declared_pdf_absent_from_archive_is_a_validation_failure() {
    let metadata = metadata_json(ZIP_NAME, &["1111001.pdf"]);
    let outer = signed_outer(&inner_archive(&metadata, &[]));

    let parsed = read_envelope(&archive(&outer), &signature_mode()).unwrap();
    let err = builder::build(CONTAINER, &jurisdictions(), &parsed.metafile, &[]).unwrap_err();

    assert_eq!(err.to_string(), "Missing PDFs: 1111001.pdf");
    assert_eq!(err.event(), Some(Event::FileValidationFailure));
    assert_eq!(ErrorCode::for_error(&err), Some(ErrorCode::ZipProcessingFailed));
    assert!(err.rejects_archive());
}

#[test]
fn undeclared_pdf_in_archive_is_a_validation_failure() {
    let metadata = metadata_json(ZIP_NAME, &["1111002.pdf"]);
    let outer = signed_outer(&inner_archive(&metadata, &["1111002.pdf", "1111003.pdf"]));

    let parsed = read_envelope(&archive(&outer), &signature_mode()).unwrap();
    let pdf_names: Vec<String> = parsed.pdfs.iter().map(|p| p.file_name.clone()).collect();
    let err =
        builder::build(CONTAINER, &jurisdictions(), &parsed.metafile, &pdf_names).unwrap_err();

    assert_eq!(err.to_string(), "Extra PDFs: 1111003.pdf");
    assert!(err.rejects_archive());
}

#[test]
fn fully_mismatched_file_sets_report_both_sides() {
    let metadata = metadata_json(ZIP_NAME, &["1111001.pdf", "1111005.pdf"]);
    let outer = signed_outer(&inner_archive(&metadata, &["1111002.pdf", "1111003.pdf"]));

    let parsed = read_envelope(&archive(&outer), &signature_mode()).unwrap();
    let pdf_names: Vec<String> = parsed.pdfs.iter().map(|p| p.file_name.clone()).collect();
    let err =
        builder::build(CONTAINER, &jurisdictions(), &parsed.metafile, &pdf_names).unwrap_err();

    let message = err.to_string();
    assert!(
        message.contains("Missing PDFs: 1111001.pdf, 1111005.pdf"),
        "{message}"
    );
}

#[test]
fn tampered_archive_is_a_signature_failure() {
    let metadata = metadata_json(ZIP_NAME, &["1111002.pdf"]);
    let genuine = inner_archive(&metadata, &["1111002.pdf"]);
    let outer = signed_outer(&genuine);

    // Rebuild the outer archive around a different inner payload, keeping
    // the original signature.
    let tampered_inner = inner_archive(&metadata, &["1111002.pdf", "extra.pdf"]);
    let signature = {
        let parsed = read_outer_entries(&outer);
        parsed
            .into_iter()
            .find(|(name, _)| name == "signature")
            .map(|(_, bytes)| bytes)
            .unwrap()
    };
    let forged = build_zip(&[
        ("envelope.zip", tampered_inner.as_slice()),
        ("signature", signature.as_slice()),
    ]);

    let err = read_envelope(&archive(&forged), &signature_mode()).unwrap_err();
    assert!(matches!(err, IngestError::Signature(_)), "{err:?}");
    assert_eq!(err.event(), Some(Event::DocSignatureFailure));
    assert_eq!(ErrorCode::for_error(&err), Some(ErrorCode::SigVerifyFailed));
    assert!(err.rejects_archive());
}

#[test]
fn missing_metafile_is_reported_after_verification() {
    let inner = build_zip(&[("1111002.pdf", b"%PDF-1.4".as_slice())]);
    let outer = signed_outer(&inner);

    let err = read_envelope(&archive(&outer), &signature_mode()).unwrap_err();
    assert!(matches!(err, IngestError::MetadataNotFound), "{err:?}");
    assert_eq!(err.event(), Some(Event::FileValidationFailure));
}

#[test]
fn schema_violation_is_an_invalid_metafile() {
    let metadata = r#"{"po_box": "BM 12345", "surprise": true}"#;
    let outer = signed_outer(&inner_archive(metadata, &[]));

    let err = read_envelope(&archive(&outer), &signature_mode()).unwrap_err();
    assert!(matches!(err, IngestError::InvalidMetafile(_)), "{err:?}");
    assert_eq!(ErrorCode::for_error(&err), Some(ErrorCode::MetafileInvalid));
}

#[test]
fn none_mode_accepts_the_bare_inner_archive() {
    let metadata = metadata_json(ZIP_NAME, &["1111002.pdf"]);
    let inner = inner_archive(&metadata, &["1111002.pdf"]);

    let parsed = read_envelope(&archive(&inner), &SignatureMode::None).unwrap();
    assert_eq!(parsed.metafile.zip_file_name, ZIP_NAME);
    assert_eq!(parsed.pdfs.len(), 1);
}

fn read_outer_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).unwrap();
        let name = entry.name().to_string();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).unwrap();
        entries.push((name, contents));
    }
    entries
}
