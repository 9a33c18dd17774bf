//! Pre-write validation
//!
//! Collaborators hand over loosely typed field maps (`serde_json` objects). Each
//! entity parses such a map into its typed record, checking presence, type and
//! nullability before any statement reaches the engine. Typed records built in
//! code are re-checked through [`Validate`] on every insert.

use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::models::{AttachmentCacheRecord, AuthTokenRecord, Message, PatientCacheRecord};
use crate::schema::{attachments_cache, auth_tokens, messages, patients_cache};

/// Loosely typed input as received from the sync or chat collaborator.
pub type RawFields = Map<String, Value>;

type Result<T> = std::result::Result<T, ValidationError>;

/// Parse a raw field map into a typed record.
pub trait FromRawFields: Sized {
    /// Validate every field and build the record, or name the first violation.
    fn parse(fields: &RawFields) -> Result<Self>;
}

/// Invariants checked on typed records before they are written.
pub trait Validate {
    /// Check the record, naming the first violation.
    fn validate(&self) -> Result<()>;
}

/// Shared field rules
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Keys and other identifying text must not be empty.
    pub fn validate_key(field: &str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ValidationError::Empty(field.to_string()));
        }
        Ok(())
    }

    /// Timestamps and counters are non-negative.
    pub fn validate_non_negative(field: &str, value: i64) -> Result<()> {
        if value < 0 {
            return Err(ValidationError::Negative(field.to_string()));
        }
        Ok(())
    }

    /// Optional variant of [`Self::validate_non_negative`].
    pub fn validate_optional_non_negative(field: &str, value: Option<i64>) -> Result<()> {
        value.map_or(Ok(()), |v| Self::validate_non_negative(field, v))
    }
}

/// Typed accessors over a raw field map.
#[derive(Debug, Clone, Copy)]
pub struct FieldReader<'a> {
    fields: &'a RawFields,
}

impl<'a> FieldReader<'a> {
    /// Wrap a field map.
    #[must_use]
    pub const fn new(fields: &'a RawFields) -> Self {
        Self { fields }
    }

    /// Fail on the first name absent from the map.
    pub fn require_present(&self, names: &[&str]) -> Result<()> {
        match names.iter().find(|name| !self.fields.contains_key(**name)) {
            Some(missing) => Err(ValidationError::MissingField((*missing).to_string())),
            None => Ok(()),
        }
    }

    fn present(&self, name: &str) -> Result<&'a Value> {
        self.fields.get(name).ok_or_else(|| ValidationError::MissingField(name.to_string()))
    }

    fn non_null(&self, name: &str) -> Result<&'a Value> {
        match self.present(name)? {
            Value::Null => Err(ValidationError::Null(name.to_string())),
            value => Ok(value),
        }
    }

    /// Present value, or `None` when absent or null.
    fn optional(&self, name: &str) -> Option<&'a Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    fn as_int(name: &str, value: &Value) -> Result<i64> {
        value.as_i64().ok_or_else(|| ValidationError::NotInteger(name.to_string()))
    }

    fn as_text(name: &str, value: &Value) -> Result<String> {
        value
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| ValidationError::NotText(name.to_string()))
    }

    fn as_flag(name: &str, value: &Value) -> Result<bool> {
        match Self::as_int(name, value)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ValidationError::NotFlag(name.to_string())),
        }
    }

    /// Required integer. Checks type before nullability so a wrong type is
    /// reported as such even when other fields are null.
    pub fn int(&self, name: &str) -> Result<i64> {
        let value = self.non_null(name).map_err(|e| match e {
            ValidationError::Null(_) => ValidationError::NotInteger(name.to_string()),
            other => other,
        })?;
        Self::as_int(name, value)
    }

    /// Required non-negative integer.
    pub fn timestamp(&self, name: &str) -> Result<i64> {
        let value = self.int(name)?;
        InputValidator::validate_non_negative(name, value)?;
        Ok(value)
    }

    /// Required 0/1 integer.
    pub fn required_flag(&self, name: &str) -> Result<bool> {
        let value = self.non_null(name).map_err(|e| match e {
            ValidationError::Null(_) => ValidationError::NotInteger(name.to_string()),
            other => other,
        })?;
        Self::as_flag(name, value)
    }

    /// Optional 0/1 integer falling back to `default`.
    pub fn flag(&self, name: &str, default: bool) -> Result<bool> {
        self.optional(name).map_or(Ok(default), |v| Self::as_flag(name, v))
    }

    /// Required, non-null text. Empty strings are allowed.
    pub fn text(&self, name: &str) -> Result<String> {
        Self::as_text(name, self.non_null(name)?)
    }

    /// Required, non-null, non-empty text.
    pub fn key(&self, name: &str) -> Result<String> {
        let value = self.text(name)?;
        InputValidator::validate_key(name, &value)?;
        Ok(value)
    }

    /// Optional text.
    pub fn optional_text(&self, name: &str) -> Result<Option<String>> {
        self.optional(name).map(|v| Self::as_text(name, v)).transpose()
    }

    /// Optional identifier. Blank text counts as absent so it is stored as NULL.
    pub fn optional_key(&self, name: &str) -> Result<Option<String>> {
        Ok(self.optional_text(name)?.filter(|v| !v.trim().is_empty()))
    }

    /// Optional non-negative integer.
    pub fn optional_timestamp(&self, name: &str) -> Result<Option<i64>> {
        let value = self.optional(name).map(|v| Self::as_int(name, v)).transpose()?;
        InputValidator::validate_optional_non_negative(name, value)?;
        Ok(value)
    }

    /// Optional enum-like text parsed into `T`, falling back to `T::default()`.
    pub fn choice<T>(&self, name: &str) -> Result<T>
    where
        T: std::str::FromStr<Err = ValidationError> + Default,
    {
        match self.optional(name) {
            Some(value) => Self::as_text(name, value)?.parse(),
            None => Ok(T::default()),
        }
    }

    /// Opaque payload: strings are stored as their bytes, anything else as JSON.
    #[must_use]
    pub fn blob(&self, name: &str) -> Option<Vec<u8>> {
        self.optional(name).map(|value| match value {
            Value::String(s) => s.clone().into_bytes(),
            other => other.to_string().into_bytes(),
        })
    }
}

impl FromRawFields for Message {
    fn parse(fields: &RawFields) -> Result<Self> {
        let reader = FieldReader::new(fields);
        // Presence, then type, then null.
        reader.require_present(messages::COLUMNS)?;
        let is_ai = reader.required_flag(messages::IS_AI)?;
        let timestamp = reader.timestamp(messages::TIMESTAMP)?;
        let content = reader.text(messages::CONTENT)?;
        let message = Self {
            id: reader.key(messages::ID)?,
            content,
            is_ai,
            timestamp,
            session_id: reader.key(messages::SESSION_ID)?,
        };
        Ok(message)
    }
}

impl Validate for Message {
    fn validate(&self) -> Result<()> {
        InputValidator::validate_key(messages::ID, &self.id)?;
        InputValidator::validate_key(messages::SESSION_ID, &self.session_id)?;
        InputValidator::validate_non_negative(messages::TIMESTAMP, self.timestamp)
    }
}

impl FromRawFields for PatientCacheRecord {
    fn parse(fields: &RawFields) -> Result<Self> {
        let r = FieldReader::new(fields);
        r.require_present(&[
            patients_cache::ID,
            patients_cache::CREATED_AT,
            patients_cache::UPDATED_AT,
            patients_cache::FULL_NAME,
        ])?;
        Ok(Self {
            id: r.key(patients_cache::ID)?,
            active: r.flag(patients_cache::ACTIVE, true)?,
            created_at: r.timestamp(patients_cache::CREATED_AT)?,
            updated_at: r.timestamp(patients_cache::UPDATED_AT)?,
            full_name: r.key(patients_cache::FULL_NAME)?,
            date_of_birth: r.optional_text(patients_cache::DATE_OF_BIRTH)?,
            gender: r.optional_text(patients_cache::GENDER)?,
            phone_number: r.optional_text(patients_cache::PHONE_NUMBER)?,
            last_visit_at: r.optional_timestamp(patients_cache::LAST_VISIT_AT)?,
            next_appointment_at: r.optional_timestamp(patients_cache::NEXT_APPOINTMENT_AT)?,
            is_recent: r.flag(patients_cache::IS_RECENT, false)?,
            is_upcoming: r.flag(patients_cache::IS_UPCOMING, false)?,
            last_synced_at: r.optional_timestamp(patients_cache::LAST_SYNCED_AT)?,
            supabase_id: r.optional_key(patients_cache::SUPABASE_ID)?,
            sync_status: r.choice(patients_cache::SYNC_STATUS)?,
            metadata: r.blob(patients_cache::METADATA),
        })
    }
}

impl Validate for PatientCacheRecord {
    fn validate(&self) -> Result<()> {
        InputValidator::validate_key(patients_cache::ID, &self.id)?;
        InputValidator::validate_key(patients_cache::FULL_NAME, &self.full_name)?;
        InputValidator::validate_non_negative(patients_cache::CREATED_AT, self.created_at)?;
        InputValidator::validate_non_negative(patients_cache::UPDATED_AT, self.updated_at)?;
        InputValidator::validate_optional_non_negative(patients_cache::LAST_VISIT_AT, self.last_visit_at)?;
        InputValidator::validate_optional_non_negative(patients_cache::NEXT_APPOINTMENT_AT, self.next_appointment_at)?;
        InputValidator::validate_optional_non_negative(patients_cache::LAST_SYNCED_AT, self.last_synced_at)
    }
}

impl FromRawFields for AttachmentCacheRecord {
    fn parse(fields: &RawFields) -> Result<Self> {
        let r = FieldReader::new(fields);
        r.require_present(&[
            attachments_cache::ID,
            attachments_cache::CREATED_AT,
            attachments_cache::UPDATED_AT,
            attachments_cache::FILENAME,
            attachments_cache::FILE_TYPE,
        ])?;
        Ok(Self {
            id: r.key(attachments_cache::ID)?,
            active: r.flag(attachments_cache::ACTIVE, true)?,
            created_at: r.timestamp(attachments_cache::CREATED_AT)?,
            updated_at: r.timestamp(attachments_cache::UPDATED_AT)?,
            filename: r.key(attachments_cache::FILENAME)?,
            file_type: r.key(attachments_cache::FILE_TYPE)?,
            mime_type: r.optional_text(attachments_cache::MIME_TYPE)?,
            file_size_bytes: r.optional_timestamp(attachments_cache::FILE_SIZE_BYTES)?,
            checksum: r.optional_text(attachments_cache::CHECKSUM)?,
            patient_id: r.optional_text(attachments_cache::PATIENT_ID)?,
            local_path: r.optional_text(attachments_cache::LOCAL_PATH)?,
            remote_url: r.optional_text(attachments_cache::REMOTE_URL)?,
            download_status: r.choice(attachments_cache::DOWNLOAD_STATUS)?,
            last_synced_at: r.optional_timestamp(attachments_cache::LAST_SYNCED_AT)?,
            supabase_id: r.optional_key(attachments_cache::SUPABASE_ID)?,
            sync_status: r.choice(attachments_cache::SYNC_STATUS)?,
            metadata: r.blob(attachments_cache::METADATA),
        })
    }
}

impl Validate for AttachmentCacheRecord {
    fn validate(&self) -> Result<()> {
        InputValidator::validate_key(attachments_cache::ID, &self.id)?;
        InputValidator::validate_key(attachments_cache::FILENAME, &self.filename)?;
        InputValidator::validate_key(attachments_cache::FILE_TYPE, &self.file_type)?;
        InputValidator::validate_non_negative(attachments_cache::CREATED_AT, self.created_at)?;
        InputValidator::validate_non_negative(attachments_cache::UPDATED_AT, self.updated_at)?;
        InputValidator::validate_optional_non_negative(attachments_cache::FILE_SIZE_BYTES, self.file_size_bytes)?;
        InputValidator::validate_optional_non_negative(attachments_cache::LAST_SYNCED_AT, self.last_synced_at)
    }
}

impl FromRawFields for AuthTokenRecord {
    fn parse(fields: &RawFields) -> Result<Self> {
        let r = FieldReader::new(fields);
        r.require_present(&[
            auth_tokens::ID,
            auth_tokens::CREATED_AT,
            auth_tokens::UPDATED_AT,
            auth_tokens::USER_ID,
            auth_tokens::EXPIRES_AT,
        ])?;
        Ok(Self {
            id: r.key(auth_tokens::ID)?,
            active: r.flag(auth_tokens::ACTIVE, true)?,
            created_at: r.timestamp(auth_tokens::CREATED_AT)?,
            updated_at: r.timestamp(auth_tokens::UPDATED_AT)?,
            user_id: r.key(auth_tokens::USER_ID)?,
            token_type: r.optional_text(auth_tokens::TOKEN_TYPE)?,
            expires_at: r.timestamp(auth_tokens::EXPIRES_AT)?,
            is_expired: r.flag(auth_tokens::IS_EXPIRED, false)?,
            refresh_count: r.optional_timestamp(auth_tokens::REFRESH_COUNT)?.unwrap_or(0),
            last_used_at: r.optional_timestamp(auth_tokens::LAST_USED_AT)?,
            device_id: r.optional_text(auth_tokens::DEVICE_ID)?,
            ip_address: r.optional_text(auth_tokens::IP_ADDRESS)?,
            last_synced_at: r.optional_timestamp(auth_tokens::LAST_SYNCED_AT)?,
            sync_status: r.choice(auth_tokens::SYNC_STATUS)?,
            metadata: r.blob(auth_tokens::METADATA),
        })
    }
}

impl Validate for AuthTokenRecord {
    fn validate(&self) -> Result<()> {
        InputValidator::validate_key(auth_tokens::ID, &self.id)?;
        InputValidator::validate_key(auth_tokens::USER_ID, &self.user_id)?;
        InputValidator::validate_non_negative(auth_tokens::CREATED_AT, self.created_at)?;
        InputValidator::validate_non_negative(auth_tokens::UPDATED_AT, self.updated_at)?;
        InputValidator::validate_non_negative(auth_tokens::EXPIRES_AT, self.expires_at)?;
        InputValidator::validate_non_negative(auth_tokens::REFRESH_COUNT, self.refresh_count)?;
        InputValidator::validate_optional_non_negative(auth_tokens::LAST_USED_AT, self.last_used_at)?;
        InputValidator::validate_optional_non_negative(auth_tokens::LAST_SYNCED_AT, self.last_synced_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> RawFields {
        match value {
            Value::Object(map) => map,
            _ => RawFields::new(),
        }
    }

    #[test]
    fn blob_keeps_strings_verbatim() {
        let raw = fields(json!({"metadata": "abc", "other": {"k": 1}}));
        let reader = FieldReader::new(&raw);
        assert_eq!(reader.blob("metadata"), Some(b"abc".to_vec()));
        assert_eq!(reader.blob("other"), Some(br#"{"k":1}"#.to_vec()));
        assert_eq!(reader.blob("missing"), None);
    }

    #[test]
    fn null_integer_reports_type() {
        let raw = fields(json!({"timestamp": null}));
        let err = FieldReader::new(&raw).int("timestamp").unwrap_err();
        assert_eq!(err.to_string(), "timestamp must be an integer");
    }

    #[test]
    fn flag_rejects_out_of_range() {
        let raw = fields(json!({"active": 2}));
        let err = FieldReader::new(&raw).flag("active", true).unwrap_err();
        assert_eq!(err, ValidationError::NotFlag("active".to_string()));
    }

    #[test]
    fn blank_optional_key_is_absent() {
        let raw = fields(json!({"supabase_id": "  ", "other": "r-1"}));
        let reader = FieldReader::new(&raw);
        assert_eq!(reader.optional_key("supabase_id"), Ok(None));
        assert_eq!(reader.optional_key("other"), Ok(Some("r-1".to_string())));
    }

    #[test]
    fn float_is_not_an_integer() {
        let raw = fields(json!({"timestamp": 1.5}));
        assert!(FieldReader::new(&raw).timestamp("timestamp").is_err());
    }
}
