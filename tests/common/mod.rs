use std::io::{Cursor, Write};
use std::sync::OnceLock;

use rsa::pkcs1v15::SigningKey;
use rsa::signature::{Keypair, SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde_json::json;
use sha2::Sha256;

use mailroom::ingest::verify::{SignatureMode, INNER_ZIP_ENTRY, SIGNATURE_ENTRY};
use mailroom::ingest::METAFILE_ENTRY;

static KEYS: OnceLock<SigningKey<Sha256>> = OnceLock::new();

fn signing_key() -> &'static SigningKey<Sha256> {
    KEYS.get_or_init(|| {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 2048)
            .expect("failed to generate test key");
        SigningKey::new(private)
    })
}

pub fn signature_mode() -> SignatureMode {
    SignatureMode::Sha256WithRsa(signing_key().verifying_key())
}

pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, bytes) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Inner archive holding the metafile and one stub PDF per name.
pub fn inner_archive(metadata: &str, pdf_names: &[&str]) -> Vec<u8> {
    let mut entries: Vec<(&str, &[u8])> = vec![(METAFILE_ENTRY, metadata.as_bytes())];
    for name in pdf_names {
        entries.push((name, b"%PDF-1.4 stub"));
    }
    build_zip(&entries)
}

/// Outer archive: inner bytes plus a detached signature over them.
pub fn signed_outer(inner: &[u8]) -> Vec<u8> {
    let signature = signing_key().sign(inner).to_vec();
    build_zip(&[(INNER_ZIP_ENTRY, inner), (SIGNATURE_ENTRY, &signature)])
}

/// Metafile declaring one scannable item per file name.
pub fn metadata_json(zip_file_name: &str, declared_pdfs: &[&str]) -> String {
    let items: Vec<serde_json::Value> = declared_pdfs
        .iter()
        .enumerate()
        .map(|(index, name)| {
            json!({
                "document_control_number": name.trim_end_matches(".pdf"),
                "scanning_date": "2018-06-24T12:06:47.000Z",
                "ocr_accuracy": "high",
                "document_type": "Other",
                "file_name": name,
                "notes": format!("item {index}")
            })
        })
        .collect();

    json!({
        "po_box": "BM 12345",
        "jurisdiction": "divorce",
        "delivery_date": "2018-06-24T12:06:47.000Z",
        "opening_date": "2018-06-24 13:00:00",
        "zip_file_createddate": "2018-06-24T14:00:00.619Z",
        "zip_file_name": zip_file_name,
        "case_number": "1555555",
        "envelope_classification": "NEW_APPLICATION",
        "scannable_items": items,
        "payments": [],
        "non_scannable_items": []
    })
    .to_string()
}
