//! Validation and sanitization of inbound readings.
//!
//! Devices send loosely-typed JSON: booleans as numeric strings, fields
//! missing, extra vendor fields tagging along. `validate` rejects payloads
//! that are missing required fields or carry a malformed UID; `sanitize`
//! then coerces the rest into a well-formed [`Reading`] without ever
//! failing — malformed optional fields degrade to safe defaults instead of
//! rejecting the whole request.

use chrono::Local;
use mongodb::bson::{Bson, Document};

use crate::db::models::{Reading, READING_TIMESTAMP_FORMAT};
use crate::error::ValidationError;

/// Fields every inbound reading must carry.
pub const REQUIRED_FIELDS: &[&str] = &["presenca", "acesso", "uid_tag"];

/// Check required-field presence (first missing field wins, in order),
/// then the UID format: at least 8 characters, hex digits or spaces only,
/// case-insensitive, surrounding whitespace ignored.
pub fn validate(raw: &Document, required: &[&str]) -> Result<(), ValidationError> {
    for field in required {
        if !raw.contains_key(field) {
            return Err(ValidationError::MissingField((*field).to_string()));
        }
    }

    let uid = raw.get("uid_tag").map(stringify).unwrap_or_default();
    let uid = uid.trim();
    if uid.chars().count() < 8 || !uid.chars().all(|c| c.is_ascii_hexdigit() || c == ' ') {
        return Err(ValidationError::InvalidUid);
    }
    Ok(())
}

/// Coerce a raw document into a [`Reading`]. Total: any input, including
/// an empty document, produces a well-formed result.
///
/// - `presenca`: parsed as an integer and truth-tested; anything
///   non-numeric (or absent) is `false`.
/// - `acesso`: `true` iff the value reads "true" case-insensitively.
/// - `uid_tag`: stringified and trimmed.
/// - `timestamp`: kept if present, else stamped with the current local
///   time.
/// - every other field passes through untouched.
pub fn sanitize(mut raw: Document) -> Reading {
    let presenca = raw
        .remove("presenca")
        .map(|v| stringify(&v).trim().parse::<i64>().map(|n| n != 0).unwrap_or(false))
        .unwrap_or(false);

    let acesso = raw
        .remove("acesso")
        .map(|v| stringify(&v).eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let uid_tag = raw
        .remove("uid_tag")
        .map(|v| stringify(&v).trim().to_owned())
        .unwrap_or_default();

    let timestamp = match raw.remove("timestamp") {
        Some(v) => stringify(&v),
        None => Local::now().format(READING_TIMESTAMP_FORMAT).to_string(),
    };

    Reading {
        presenca,
        acesso,
        uid_tag,
        timestamp,
        extra: raw,
    }
}

/// String form of a loose value without the quoting `Bson`'s `Display`
/// puts around strings.
fn stringify(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        Bson::Int32(n) => n.to_string(),
        Bson::Int64(n) => n.to_string(),
        Bson::Double(f) => f.to_string(),
        Bson::Boolean(b) => b.to_string(),
        other => other.to_string(),
    }
}
