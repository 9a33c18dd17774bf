//! Unit tests for validation.rs module

use clinic_cache::error::ValidationError;
use clinic_cache::models::{AttachmentCacheRecord, AuthTokenRecord, DownloadStatus, Message, PatientCacheRecord, SyncStatus};
use clinic_cache::validation::{FromRawFields, InputValidator, RawFields, Validate};
use serde_json::{json, Value};

fn fields(value: Value) -> RawFields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn message_fields() -> RawFields {
    fields(json!({
        "id": "m1",
        "content": "hello",
        "is_ai": 1,
        "timestamp": 1_700_000_000_000_i64,
        "session_id": "s1"
    }))
}

#[test]
fn test_valid_message_parses() {
    let message = Message::parse(&message_fields()).expect("valid message");

    assert_eq!(message.id, "m1");
    assert!(message.is_ai);
    assert_eq!(message.timestamp, 1_700_000_000_000);
}

#[test]
fn test_each_missing_message_field_is_named() {
    for name in ["id", "content", "is_ai", "timestamp", "session_id"] {
        let mut raw = message_fields();
        raw.remove(name);

        let err = Message::parse(&raw).unwrap_err();
        assert_eq!(err.to_string(), format!("Missing required field: {name}"));
    }
}

#[test]
fn test_is_ai_as_string_is_rejected() {
    let mut raw = message_fields();
    raw.insert("is_ai".to_string(), json!("true"));

    let err = Message::parse(&raw).unwrap_err();
    assert_eq!(err.to_string(), "is_ai must be an integer");
}

#[test]
fn test_timestamp_as_string_is_rejected() {
    let mut raw = message_fields();
    raw.insert("timestamp".to_string(), json!("yesterday"));

    assert_eq!(Message::parse(&raw).unwrap_err(), ValidationError::NotInteger("timestamp".to_string()));
}

#[test]
fn test_null_content_is_rejected() {
    let mut raw = message_fields();
    raw.insert("content".to_string(), Value::Null);

    let err = Message::parse(&raw).unwrap_err();
    assert_eq!(err.to_string(), "content cannot be null");
}

#[test]
fn test_null_session_is_rejected() {
    let mut raw = message_fields();
    raw.insert("session_id".to_string(), Value::Null);

    assert_eq!(Message::parse(&raw).unwrap_err(), ValidationError::Null("session_id".to_string()));
}

#[test]
fn test_type_error_reported_before_null() {
    let mut raw = message_fields();
    raw.insert("is_ai".to_string(), json!("yes"));
    raw.insert("content".to_string(), Value::Null);

    assert_eq!(Message::parse(&raw).unwrap_err().field(), "is_ai");
}

#[test]
fn test_empty_content_is_accepted() {
    let mut raw = message_fields();
    raw.insert("content".to_string(), json!(""));

    assert_eq!(Message::parse(&raw).expect("empty content").content, "");
}

#[test]
fn test_empty_id_is_rejected() {
    let mut raw = message_fields();
    raw.insert("id".to_string(), json!(""));

    assert_eq!(Message::parse(&raw).unwrap_err(), ValidationError::Empty("id".to_string()));
}

#[test]
fn test_is_ai_outside_flag_range() {
    let mut raw = message_fields();
    raw.insert("is_ai".to_string(), json!(3));

    assert_eq!(Message::parse(&raw).unwrap_err().to_string(), "is_ai must be 0 or 1");
}

#[test]
fn test_typed_message_validation() {
    let mut message = Message::parse(&message_fields()).expect("valid message");
    assert!(message.validate().is_ok());

    message.timestamp = -1;
    assert_eq!(message.validate().unwrap_err(), ValidationError::Negative("timestamp".to_string()));
}

#[test]
fn test_patient_defaults() {
    let raw = fields(json!({"id": "p1", "created_at": 1, "updated_at": 2, "full_name": "Ada"}));
    let patient = PatientCacheRecord::parse(&raw).expect("valid patient");

    assert!(patient.active);
    assert!(!patient.is_recent);
    assert_eq!(patient.sync_status, SyncStatus::Synced);
    assert_eq!(patient.supabase_id, None);
    assert_eq!(patient.metadata, None);
}

#[test]
fn test_patient_missing_name() {
    let raw = fields(json!({"id": "p1", "created_at": 1, "updated_at": 2}));
    assert_eq!(PatientCacheRecord::parse(&raw).unwrap_err().to_string(), "Missing required field: full_name");
}

#[test]
fn test_patient_unknown_sync_status() {
    let raw = fields(json!({
        "id": "p1", "created_at": 1, "updated_at": 2, "full_name": "Ada", "sync_status": "stale"
    }));

    let err = PatientCacheRecord::parse(&raw).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidChoice { ref value, .. } if value == "stale"));
    assert_eq!(err.field(), "sync_status");
}

#[test]
fn test_attachment_download_status() {
    let raw = fields(json!({
        "id": "a1",
        "created_at": 1,
        "updated_at": 1,
        "filename": "scan.pdf",
        "file_type": "pdf",
        "patient_id": "p1",
        "download_status": "completed",
        "file_size_bytes": 2048
    }));

    let attachment = AttachmentCacheRecord::parse(&raw).expect("valid attachment");
    assert_eq!(attachment.download_status, DownloadStatus::Completed);
    assert_eq!(attachment.file_size_bytes, Some(2048));
    assert_eq!(attachment.patient_id.as_deref(), Some("p1"));
}

#[test]
fn test_attachment_invalid_download_status() {
    let raw = fields(json!({
        "id": "a1", "created_at": 1, "updated_at": 1, "filename": "scan.pdf", "file_type": "pdf",
        "download_status": "halfway"
    }));

    assert!(AttachmentCacheRecord::parse(&raw).is_err());
}

#[test]
fn test_attachment_negative_size() {
    let mut attachment = AttachmentCacheRecord::new("a1", "scan.pdf", "pdf", None, 1);
    attachment.file_size_bytes = Some(-5);

    assert_eq!(attachment.validate().unwrap_err().field(), "file_size_bytes");
}

#[test]
fn test_auth_token_defaults() {
    let raw = fields(json!({
        "id": "t1", "created_at": 1, "updated_at": 1, "user_id": "u1", "expires_at": 1000
    }));

    let token = AuthTokenRecord::parse(&raw).expect("valid token");
    assert!(!token.is_expired);
    assert_eq!(token.refresh_count, 0);
    assert!(token.active);
}

#[test]
fn test_auth_token_expiry_must_be_integer() {
    let raw = fields(json!({
        "id": "t1", "created_at": 1, "updated_at": 1, "user_id": "u1", "expires_at": null
    }));

    assert_eq!(AuthTokenRecord::parse(&raw).unwrap_err().to_string(), "expires_at must be an integer");
}

#[test]
fn test_input_validator_rules() {
    assert!(InputValidator::validate_key("id", "abc").is_ok());
    assert!(InputValidator::validate_key("id", "   ").is_err());
    assert!(InputValidator::validate_non_negative("timestamp", 0).is_ok());
    assert!(InputValidator::validate_non_negative("timestamp", -1).is_err());
    assert!(InputValidator::validate_optional_non_negative("last_visit_at", None).is_ok());
    assert!(InputValidator::validate_optional_non_negative("last_visit_at", Some(-1)).is_err());
}
