use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = envelopes)]
pub struct Envelope {
    pub id: Uuid,
    pub container: String,
    pub jurisdiction: String,
    pub po_box: String,
    pub case_number: Option<String>,
    pub classification: String,
    pub delivery_date: NaiveDateTime,
    pub opening_date: NaiveDateTime,
    pub zip_file_createddate: NaiveDateTime,
    pub zip_file_name: String,
    pub status: String,
    pub upload_failure_count: i32,
    pub zip_deleted: bool,
    pub ccd_id: Option<String>,
    pub ccd_action: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = envelopes)]
pub struct NewEnvelope {
    pub id: Uuid,
    pub container: String,
    pub jurisdiction: String,
    pub po_box: String,
    pub case_number: Option<String>,
    pub classification: String,
    pub delivery_date: NaiveDateTime,
    pub opening_date: NaiveDateTime,
    pub zip_file_createddate: NaiveDateTime,
    pub zip_file_name: String,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = scannable_items)]
#[diesel(belongs_to(Envelope))]
pub struct ScannableItem {
    pub id: Uuid,
    pub envelope_id: Uuid,
    pub document_control_number: String,
    pub scanning_date: NaiveDateTime,
    pub ocr_accuracy: Option<String>,
    pub ocr_data: Option<serde_json::Value>,
    pub exception_record: bool,
    pub document_type: String,
    pub document_sub_type: Option<String>,
    pub notes: Option<String>,
    pub file_name: String,
    pub document_url: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = scannable_items)]
pub struct NewScannableItem {
    pub id: Uuid,
    pub envelope_id: Uuid,
    pub document_control_number: String,
    pub scanning_date: NaiveDateTime,
    pub ocr_accuracy: Option<String>,
    pub ocr_data: Option<serde_json::Value>,
    pub exception_record: bool,
    pub document_type: String,
    pub document_sub_type: Option<String>,
    pub notes: Option<String>,
    pub file_name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = payments)]
#[diesel(belongs_to(Envelope))]
pub struct Payment {
    pub id: Uuid,
    pub envelope_id: Uuid,
    pub document_control_number: String,
    pub method: String,
    pub amount: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = payments)]
pub struct NewPayment {
    pub id: Uuid,
    pub envelope_id: Uuid,
    pub document_control_number: String,
    pub method: String,
    pub amount: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = non_scannable_items)]
#[diesel(belongs_to(Envelope))]
pub struct NonScannableItem {
    pub id: Uuid,
    pub envelope_id: Uuid,
    pub document_control_number: String,
    pub item_type: String,
    pub notes: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = non_scannable_items)]
pub struct NewNonScannableItem {
    pub id: Uuid,
    pub envelope_id: Uuid,
    pub document_control_number: String,
    pub item_type: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = process_events)]
pub struct ProcessEvent {
    pub id: i64,
    pub container: String,
    pub zip_file_name: String,
    pub event: String,
    pub envelope_id: Option<Uuid>,
    pub reason: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = process_events)]
pub struct NewProcessEvent {
    pub container: String,
    pub zip_file_name: String,
    pub event: String,
    pub envelope_id: Option<Uuid>,
    pub reason: Option<String>,
}
