use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDateTime, Timelike};
use uuid::Uuid;

use crate::envelopes::status::Status;
use crate::models::{NewEnvelope, NewNonScannableItem, NewPayment, NewScannableItem};

use super::error::IngestError;
use super::metafile::{self, Metafile};

/// Envelope row plus children, normalized and ready to insert.
#[derive(Debug)]
pub struct EnvelopeBundle {
    pub envelope: NewEnvelope,
    pub scannable_items: Vec<NewScannableItem>,
    pub payments: Vec<NewPayment>,
    pub non_scannable_items: Vec<NewNonScannableItem>,
}

/// Cross-check the archive contents against the metafile and normalize the
/// input records into persistable rows. Nothing is saved here.
pub fn build(
    container: &str,
    jurisdictions: &HashMap<String, String>,
    metafile: &Metafile,
    pdf_names: &[String],
) -> Result<EnvelopeBundle, IngestError> {
    check_file_names(metafile, pdf_names)?;
    check_jurisdiction(container, jurisdictions, &metafile.jurisdiction)?;

    let envelope_id = Uuid::new_v4();

    let mut scannable_items = Vec::with_capacity(metafile.scannable_items.len());
    for item in &metafile.scannable_items {
        let ocr_data = match &item.ocr_data {
            Some(value) => {
                let fields = metafile::ocr_fields(value).map_err(|err| {
                    IngestError::OcrDataParse {
                        dcn: item.document_control_number.clone(),
                        detail: err.to_string(),
                    }
                })?;
                Some(serde_json::to_value(fields).map_err(|err| IngestError::OcrDataParse {
                    dcn: item.document_control_number.clone(),
                    detail: err.to_string(),
                })?)
            }
            None => None,
        };

        scannable_items.push(NewScannableItem {
            id: Uuid::new_v4(),
            envelope_id,
            document_control_number: item.document_control_number.clone(),
            scanning_date: truncate_to_millis(item.scanning_date),
            ocr_accuracy: item.ocr_accuracy.clone(),
            ocr_data,
            exception_record: item.exception_record.unwrap_or(false),
            document_type: item.document_type.clone(),
            document_sub_type: item.document_sub_type.clone(),
            notes: item.notes.clone(),
            file_name: item.file_name.clone(),
        });
    }

    let payments = metafile
        .payments
        .iter()
        .map(|payment| NewPayment {
            id: Uuid::new_v4(),
            envelope_id,
            document_control_number: payment.document_control_number.clone(),
            method: payment.method.clone(),
            amount: payment.amount.clone(),
            currency: payment.currency.clone(),
        })
        .collect();

    let non_scannable_items = metafile
        .non_scannable_items
        .iter()
        .map(|item| NewNonScannableItem {
            id: Uuid::new_v4(),
            envelope_id,
            document_control_number: item.document_control_number.clone(),
            item_type: item.item_type.clone(),
            notes: item.notes.clone(),
        })
        .collect();

    Ok(EnvelopeBundle {
        envelope: NewEnvelope {
            id: envelope_id,
            container: container.to_string(),
            jurisdiction: metafile.jurisdiction.clone(),
            po_box: metafile.po_box.clone(),
            case_number: metafile.case_number.clone(),
            classification: metafile.envelope_classification.as_str().to_string(),
            delivery_date: truncate_to_millis(metafile.delivery_date),
            opening_date: truncate_to_millis(metafile.opening_date),
            zip_file_createddate: truncate_to_millis(metafile.zip_file_createddate),
            zip_file_name: metafile.zip_file_name.clone(),
            status: Status::Created.as_str().to_string(),
        },
        scannable_items,
        payments,
        non_scannable_items,
    })
}

/// Multiset equality between declared scannable-item file names and the PDF
/// entries actually present in the archive.
fn check_file_names(metafile: &Metafile, pdf_names: &[String]) -> Result<(), IngestError> {
    let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
    for item in &metafile.scannable_items {
        *counts.entry(item.file_name.as_str()).or_default() += 1;
    }
    for name in pdf_names {
        *counts.entry(name.as_str()).or_default() -= 1;
    }

    let missing: Vec<&str> = counts
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(name, _)| *name)
        .collect();
    let extra: Vec<&str> = counts
        .iter()
        .filter(|(_, count)| **count < 0)
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() && extra.is_empty() {
        return Ok(());
    }

    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("Missing PDFs: {}", missing.join(", ")));
    }
    if !extra.is_empty() {
        parts.push(format!("Extra PDFs: {}", extra.join(", ")));
    }
    Err(IngestError::FileNameIrregularities(parts.join("; ")))
}

fn check_jurisdiction(
    container: &str,
    jurisdictions: &HashMap<String, String>,
    jurisdiction: &str,
) -> Result<(), IngestError> {
    match jurisdictions.get(container) {
        Some(expected) if expected.eq_ignore_ascii_case(jurisdiction) => Ok(()),
        _ => Err(IngestError::JurisdictionMismatch {
            container: container.to_string(),
            jurisdiction: jurisdiction.to_string(),
        }),
    }
}

// Declared timestamps are persisted at whole-millisecond precision.
fn truncate_to_millis(ts: NaiveDateTime) -> NaiveDateTime {
    let nanos = ts.nanosecond();
    ts.with_nanosecond(nanos - nanos % 1_000_000).unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::metafile::parse;
    use serde_json::json;

    fn jurisdictions() -> HashMap<String, String> {
        HashMap::from([("bulkscan".to_string(), "divorce".to_string())])
    }

    fn metafile_with_items(file_names: &[&str]) -> Metafile {
        let items: Vec<serde_json::Value> = file_names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                json!({
                    "document_control_number": format!("111100{index}"),
                    "scanning_date": "2018-06-24T12:06:47.567891Z",
                    "document_type": "Other",
                    "file_name": name
                })
            })
            .collect();
        let value = json!({
            "po_box": "BM 12345",
            "jurisdiction": "divorce",
            "delivery_date": "2018-06-24T12:06:47.000Z",
            "opening_date": "2018-06-24T13:00:00.000Z",
            "zip_file_createddate": "2018-06-24T14:00:00.000Z",
            "zip_file_name": "1_24-06-2018-00-00-00.zip",
            "envelope_classification": "NEW_APPLICATION",
            "scannable_items": items
        });
        parse(value.to_string().as_bytes()).unwrap()
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn builds_envelope_for_matching_archive() {
        let metafile = metafile_with_items(&["1111002.pdf"]);
        let bundle = build(
            "bulkscan",
            &jurisdictions(),
            &metafile,
            &names(&["1111002.pdf"]),
        )
        .unwrap();

        assert_eq!(bundle.envelope.container, "bulkscan");
        assert_eq!(bundle.envelope.jurisdiction, "divorce");
        assert_eq!(bundle.envelope.status, "CREATED");
        assert_eq!(bundle.scannable_items.len(), 1);
        assert_eq!(
            bundle.scannable_items[0].envelope_id,
            bundle.envelope.id
        );
    }

    #[test]
    fn reports_missing_pdfs() {
        let metafile = metafile_with_items(&["1111001.pdf"]);
        let err = build("bulkscan", &jurisdictions(), &metafile, &[]).unwrap_err();
        assert_eq!(err.to_string(), "Missing PDFs: 1111001.pdf");
    }

    #[test]
    fn reports_extra_pdfs() {
        let metafile = metafile_with_items(&["1111002.pdf"]);
        let err = build(
            "bulkscan",
            &jurisdictions(),
            &metafile,
            &names(&["1111002.pdf", "1111003.pdf"]),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Extra PDFs: 1111003.pdf");
    }

    #[test]
    fn reports_fully_mismatched_file_sets() {
        let metafile = metafile_with_items(&["1111001.pdf", "1111005.pdf"]);
        let err = build(
            "bulkscan",
            &jurisdictions(),
            &metafile,
            &names(&["1111002.pdf", "1111003.pdf"]),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(
            message.contains("Missing PDFs: 1111001.pdf, 1111005.pdf"),
            "{message}"
        );
        assert!(
            message.contains("Extra PDFs: 1111002.pdf, 1111003.pdf"),
            "{message}"
        );
    }

    #[test]
    fn counts_duplicate_file_names_as_a_multiset() {
        let metafile = metafile_with_items(&["1111002.pdf", "1111002.pdf"]);
        let err = build(
            "bulkscan",
            &jurisdictions(),
            &metafile,
            &names(&["1111002.pdf"]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Missing PDFs: 1111002.pdf"));
    }

    #[test]
    fn rejects_jurisdiction_not_matching_container() {
        let metafile = metafile_with_items(&["1111002.pdf"]);
        let mapping = HashMap::from([("bulkscan".to_string(), "probate".to_string())]);
        let err = build("bulkscan", &mapping, &metafile, &names(&["1111002.pdf"])).unwrap_err();
        assert!(matches!(err, IngestError::JurisdictionMismatch { .. }));
    }

    #[test]
    fn rejects_unconfigured_container() {
        let metafile = metafile_with_items(&["1111002.pdf"]);
        let err = build(
            "mystery",
            &jurisdictions(),
            &metafile,
            &names(&["1111002.pdf"]),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::JurisdictionMismatch { .. }));
    }

    #[test]
    fn truncates_timestamps_to_whole_milliseconds() {
        let metafile = metafile_with_items(&["1111002.pdf"]);
        let bundle = build(
            "bulkscan",
            &jurisdictions(),
            &metafile,
            &names(&["1111002.pdf"]),
        )
        .unwrap();
        let nanos = bundle.scannable_items[0]
            .scanning_date
            .and_utc()
            .timestamp_subsec_nanos();
        assert_eq!(nanos % 1_000_000, 0);
        assert_eq!(nanos / 1_000_000, 567);
    }

    #[test]
    fn malformed_ocr_data_is_its_own_failure() {
        let value = json!({
            "po_box": "BM 12345",
            "jurisdiction": "divorce",
            "delivery_date": "2018-06-24T12:06:47.000Z",
            "opening_date": "2018-06-24T13:00:00.000Z",
            "zip_file_createddate": "2018-06-24T14:00:00.000Z",
            "zip_file_name": "1.zip",
            "envelope_classification": "EXCEPTION",
            "scannable_items": [{
                "document_control_number": "1111002",
                "scanning_date": "2018-06-24T12:06:47.000Z",
                "ocr_data": {"not": "a list"},
                "document_type": "Other",
                "file_name": "1111002.pdf"
            }]
        });
        let metafile = parse(value.to_string().as_bytes()).unwrap();
        let err = build(
            "bulkscan",
            &jurisdictions(),
            &metafile,
            &names(&["1111002.pdf"]),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::OcrDataParse { .. }), "{err:?}");
    }
}
