use std::io::{Cursor, Read};

use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha256;
use tracing::warn;

use super::error::IngestError;

pub const INNER_ZIP_ENTRY: &str = "envelope.zip";
pub const SIGNATURE_ENTRY: &str = "signature";

/// How inbound archives are authenticated. Built once at startup; an
/// undecodable key or unknown selector refuses to start rather than
/// failing archive by archive.
#[derive(Clone)]
pub enum SignatureMode {
    Sha256WithRsa(VerifyingKey<Sha256>),
    /// Test profiles only: the blob is taken to be the inner archive as-is.
    None,
}

impl SignatureMode {
    pub fn from_config(algorithm: &str, public_key_base64: Option<&str>) -> anyhow::Result<Self> {
        match algorithm.to_ascii_lowercase().as_str() {
            "sha256withrsa" => {
                let encoded =
                    public_key_base64.context("a public key is required for sha256withrsa")?;
                let der = BASE64
                    .decode(encoded.trim().as_bytes())
                    .context("public key is not valid base64")?;
                let key = RsaPublicKey::from_public_key_der(&der)
                    .context("public key is not X.509 SubjectPublicKeyInfo")?;
                Ok(SignatureMode::Sha256WithRsa(VerifyingKey::new(key)))
            }
            "none" => Ok(SignatureMode::None),
            other => anyhow::bail!("undefined signature verification algorithm: {other}"),
        }
    }
}

/// An inbound blob together with where it came from. Plain value; the
/// verifier holds no state of its own.
pub struct SignedArchive<'a> {
    pub container: &'a str,
    pub zip_file_name: &'a str,
    pub bytes: &'a [u8],
}

/// Check the outer archive and return the inner `envelope.zip` bytes.
pub fn verify(archive: &SignedArchive<'_>, mode: &SignatureMode) -> Result<Vec<u8>, IngestError> {
    let key = match mode {
        SignatureMode::Sha256WithRsa(key) => key,
        SignatureMode::None => return Ok(archive.bytes.to_vec()),
    };

    let entries = read_entries(archive.bytes)?;

    let mut inner: Option<&[u8]> = None;
    let mut signature: Option<&[u8]> = None;
    for (name, bytes) in &entries {
        if name.eq_ignore_ascii_case(INNER_ZIP_ENTRY) {
            inner = Some(bytes);
        } else if name.eq_ignore_ascii_case(SIGNATURE_ENTRY) {
            signature = Some(bytes);
        }
    }

    let (inner, signature) = match (entries.len(), inner, signature) {
        (2, Some(inner), Some(signature)) => (inner, signature),
        _ => {
            let names: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();
            warn!(
                container = %archive.container,
                zip = %archive.zip_file_name,
                entries = ?names,
                "outer archive entries do not match expected file names"
            );
            return Err(IngestError::Signature(format!(
                "zip entries do not match expected file names, actual names = {names:?}"
            )));
        }
    };

    let signature = Signature::try_from(signature)
        .map_err(|_| IngestError::Signature("signature entry is malformed".into()))?;

    if key.verify(inner, &signature).is_err() {
        warn!(
            container = %archive.container,
            zip = %archive.zip_file_name,
            "zip signature failed verification"
        );
        return Err(IngestError::Signature(
            "zip signature failed verification".into(),
        ));
    }

    Ok(inner.to_vec())
}

fn read_entries(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>, IngestError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("failed to open outer archive")?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read outer archive entry {index}"))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .with_context(|| format!("failed to read outer archive entry {name}"))?;
        entries.push((name, contents));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rsa::pkcs1v15::SigningKey;
    use rsa::signature::{SignatureEncoding, Signer};
    use rsa::RsaPrivateKey;

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

    fn keys() -> (SigningKey<Sha256>, SignatureMode) {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let verifying = VerifyingKey::new(private.to_public_key());
        (
            SigningKey::new(private),
            SignatureMode::Sha256WithRsa(verifying),
        )
    }

    fn signed_outer(signing_key: &SigningKey<Sha256>, inner: &[u8]) -> Vec<u8> {
        let signature = signing_key.sign(inner).to_vec();
        build_zip(&[(INNER_ZIP_ENTRY, inner), (SIGNATURE_ENTRY, &signature)])
    }

    fn archive<'a>(bytes: &'a [u8]) -> SignedArchive<'a> {
        SignedArchive {
            container: "bulkscan",
            zip_file_name: "1_24-06-2018-00-00-00.zip",
            bytes,
        }
    }

    #[test]
    fn accepts_properly_signed_archive() {
        let (signing, mode) = keys();
        let inner = build_zip(&[("metadata.json", b"{}".as_slice())]);
        let outer = signed_outer(&signing, &inner);

        let verified = verify(&archive(&outer), &mode).unwrap();
        assert_eq!(verified, inner);
    }

    #[test]
    fn accepts_case_insensitive_entry_names() {
        let (signing, mode) = keys();
        let inner = b"inner".to_vec();
        let signature = signing.sign(&inner).to_vec();
        let outer = build_zip(&[("ENVELOPE.ZIP", inner.as_slice()), ("Signature", &signature)]);

        assert!(verify(&archive(&outer), &mode).is_ok());
    }

    #[test]
    fn rejects_tampered_inner_archive() {
        let (signing, mode) = keys();
        let signature = signing.sign(b"original").to_vec();
        let outer = build_zip(&[(INNER_ZIP_ENTRY, b"tampered".as_slice()), (SIGNATURE_ENTRY, &signature)]);

        let err = verify(&archive(&outer), &mode).unwrap_err();
        assert!(matches!(err, IngestError::Signature(_)), "{err:?}");
        assert!(err.to_string().contains("failed verification"));
    }

    #[test]
    fn rejects_extra_entry() {
        let (signing, mode) = keys();
        let inner = b"inner".to_vec();
        let signature = signing.sign(&inner).to_vec();
        let outer = build_zip(&[
            (INNER_ZIP_ENTRY, inner.as_slice()),
            (SIGNATURE_ENTRY, &signature),
            ("extra.txt", b"?".as_slice()),
        ]);

        let err = verify(&archive(&outer), &mode).unwrap_err();
        assert!(matches!(err, IngestError::Signature(_)), "{err:?}");
        assert!(err.to_string().contains("expected file names"));
    }

    #[test]
    fn rejects_wrong_entry_names() {
        let (_, mode) = keys();
        let outer = build_zip(&[("documents.zip", b"x".as_slice()), ("sig", b"y".as_slice())]);

        let err = verify(&archive(&outer), &mode).unwrap_err();
        assert!(matches!(err, IngestError::Signature(_)), "{err:?}");
    }

    #[test]
    fn none_mode_passes_bytes_through() {
        let inner = build_zip(&[("metadata.json", b"{}".as_slice())]);
        let verified = verify(&archive(&inner), &SignatureMode::None).unwrap();
        assert_eq!(verified, inner);
    }

    #[test]
    fn corrupt_outer_archive_is_not_a_signature_failure() {
        let (_, mode) = keys();
        let err = verify(&archive(b"not a zip at all"), &mode).unwrap_err();
        assert!(matches!(err, IngestError::Other(_)), "{err:?}");
    }

    #[test]
    fn unknown_selector_is_a_configuration_error() {
        assert!(SignatureMode::from_config("md5withdsa", None).is_err());
    }

    #[test]
    fn selector_none_needs_no_key() {
        assert!(matches!(
            SignatureMode::from_config("none", None).unwrap(),
            SignatureMode::None
        ));
    }
}
