use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parsed `metadata.json` from the inner archive. Strict by construction:
/// unknown fields are a schema violation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Metafile {
    pub po_box: String,
    pub jurisdiction: String,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub delivery_date: NaiveDateTime,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub opening_date: NaiveDateTime,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub zip_file_createddate: NaiveDateTime,
    pub zip_file_name: String,
    #[serde(default)]
    pub case_number: Option<String>,
    pub envelope_classification: Classification,
    #[serde(default)]
    pub scannable_items: Vec<InputScannableItem>,
    #[serde(default)]
    pub payments: Vec<InputPayment>,
    #[serde(default)]
    pub non_scannable_items: Vec<InputNonScannableItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    NewApplication,
    SupplementaryEvidence,
    Exception,
    SupplementaryEvidenceWithOcr,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::NewApplication => "NEW_APPLICATION",
            Classification::SupplementaryEvidence => "SUPPLEMENTARY_EVIDENCE",
            Classification::Exception => "EXCEPTION",
            Classification::SupplementaryEvidenceWithOcr => "SUPPLEMENTARY_EVIDENCE_WITH_OCR",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputScannableItem {
    pub document_control_number: String,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub scanning_date: NaiveDateTime,
    #[serde(default)]
    pub ocr_accuracy: Option<String>,
    /// Raw key/value blob; parsed separately so a malformed blob is
    /// distinguishable from a schema violation.
    #[serde(default)]
    pub ocr_data: Option<Value>,
    #[serde(default)]
    pub exception_record: Option<bool>,
    pub document_type: String,
    #[serde(default)]
    pub document_sub_type: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub file_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputPayment {
    pub document_control_number: String,
    pub method: String,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputNonScannableItem {
    pub document_control_number: String,
    pub item_type: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One OCR field extracted by the scanning bureau.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct OcrField {
    pub metadata_field_name: String,
    pub metadata_field_value: String,
}

pub fn parse(bytes: &[u8]) -> Result<Metafile, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Interpret a scannable item's raw `ocr_data` value.
pub fn ocr_fields(value: &Value) -> Result<Vec<OcrField>, serde_json::Error> {
    serde_json::from_value(value.clone())
}

// Bureaus send both ISO timestamps and a space-separated variant; accept
// either, with or without fractional seconds.
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d-%m-%Y %H:%M:%S%.f",
];

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(parsed);
        }
    }
    Err(format!("unrecognised timestamp: {raw:?}"))
}

fn flexible_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}
