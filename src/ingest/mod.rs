//! Turns an inbound signed archive into a validated, normalized envelope.
//!
//! The pipeline is `verify` (outer archive + signature) → `extract` (inner
//! entries) → `metafile::parse` (schema) → `builder::build` (cross-check +
//! normalization). Each stage raises a typed [`IngestError`]; only the
//! ingestion task decides what to do with one.

use std::io::{Cursor, Read};

use anyhow::Context;

pub mod builder;
pub mod error;
pub mod metafile;
pub mod verify;

pub use error::IngestError;

use metafile::Metafile;
use verify::{SignatureMode, SignedArchive};

pub const METAFILE_ENTRY: &str = "metadata.json";

/// One extracted document, ready for the document store.
#[derive(Debug, Clone)]
pub struct Pdf {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct InnerContents {
    pub metafile: Vec<u8>,
    pub pdfs: Vec<Pdf>,
}

#[derive(Debug)]
pub struct ParsedEnvelope {
    pub metafile: Metafile,
    pub pdfs: Vec<Pdf>,
}

/// Verify and parse a blob into its metafile and documents.
pub fn read_envelope(
    archive: &SignedArchive<'_>,
    mode: &SignatureMode,
) -> Result<ParsedEnvelope, IngestError> {
    let inner = verify::verify(archive, mode)?;
    let contents = extract(&inner)?;
    let metafile = metafile::parse(&contents.metafile)
        .map_err(|err| IngestError::InvalidMetafile(err.to_string()))?;
    Ok(ParsedEnvelope {
        metafile,
        pdfs: contents.pdfs,
    })
}

/// Split the inner archive into the metafile and its PDFs. The metafile
/// entry is matched exactly; documents by `.pdf` extension regardless of
/// case. Anything else fails the whole archive.
pub fn extract(inner: &[u8]) -> Result<InnerContents, IngestError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(inner)).context("failed to open inner archive")?;

    let mut metafile: Option<Vec<u8>> = None;
    let mut pdfs = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read inner archive entry {index}"))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .with_context(|| format!("failed to read inner archive entry {name}"))?;

        if name == METAFILE_ENTRY && metafile.is_none() {
            metafile = Some(contents);
        } else if name.to_ascii_lowercase().ends_with(".pdf") {
            pdfs.push(Pdf {
                file_name: name,
                bytes: contents,
            });
        } else {
            return Err(IngestError::NonPdfFile(name));
        }
    }

    match metafile {
        Some(metafile) => Ok(InnerContents { metafile, pdfs }),
        None => Err(IngestError::MetadataNotFound),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::FileOptions::default();
        for (name, bytes) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn splits_metafile_and_pdfs() {
        let inner = build_zip(&[
            (METAFILE_ENTRY, b"{}".as_slice()),
            ("1111002.pdf", b"%PDF-1.4".as_slice()),
            ("1111003.PDF", b"%PDF-1.4".as_slice()),
        ]);
        let contents = extract(&inner).unwrap();
        assert_eq!(contents.metafile, b"{}");
        assert_eq!(contents.pdfs.len(), 2);
        assert_eq!(contents.pdfs[0].file_name, "1111002.pdf");
    }

    #[test]
    fn missing_metafile_is_reported() {
        let inner = build_zip(&[("1111002.pdf", b"%PDF-1.4".as_slice())]);
        let err = extract(&inner).unwrap_err();
        assert!(matches!(err, IngestError::MetadataNotFound), "{err:?}");
    }

    #[test]
    fn non_pdf_entry_is_rejected() {
        let inner = build_zip(&[
            (METAFILE_ENTRY, b"{}".as_slice()),
            ("script.exe", b"MZ".as_slice()),
        ]);
        let err = extract(&inner).unwrap_err();
        match err {
            IngestError::NonPdfFile(name) => assert_eq!(name, "script.exe"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn metafile_entry_name_is_exact() {
        // A differently-cased metafile is neither the metafile nor a pdf.
        let inner = build_zip(&[
            ("Metadata.json", b"{}".as_slice()),
            ("1111002.pdf", b"%PDF-1.4".as_slice()),
        ]);
        let err = extract(&inner).unwrap_err();
        assert!(matches!(err, IngestError::NonPdfFile(_)), "{err:?}");
    }

    #[test]
    fn empty_archive_has_no_metafile() {
        let inner = build_zip(&[]);
        assert!(matches!(
            extract(&inner).unwrap_err(),
            IngestError::MetadataNotFound
        ));
    }
}
