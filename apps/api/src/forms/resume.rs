//! Resume attachment codec.
//!
//! Write path: an accepted upload is stored verbatim as `(bytes, mimetype, filename)`.
//! Read path: whatever representation the store hands back is turned into a
//! base64 payload, or `None` when no bytes can be recovered. The read path never fails.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::form::StoredResume;

pub const PDF_MIMETYPE: &str = "application/pdf";
pub const DEFAULT_FILENAME: &str = "resume.pdf";

/// A file accepted by the upload boundary (already type- and size-checked).
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub data: Bytes,
    pub mimetype: String,
    pub filename: String,
}

/// Transport-safe resume shape returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePayload {
    /// Standard base64 (with padding).
    pub data: String,
    pub mimetype: String,
    pub filename: String,
    pub size: usize,
}

impl StoredResume {
    pub fn from_upload(file: UploadedFile) -> Self {
        StoredResume::Binary {
            data: file.data.to_vec(),
            mimetype: Some(file.mimetype),
            filename: Some(file.filename),
        }
    }
}

/// Builds the client payload for a stored resume.
pub fn to_payload(stored: &StoredResume) -> Option<ResumePayload> {
    let (bytes, mimetype, filename) = match stored {
        StoredResume::Binary {
            data,
            mimetype,
            filename,
        } => (data.clone(), mimetype.clone(), filename.clone()),
        StoredResume::Legacy(value) => decode_legacy(value)?,
    };

    if bytes.is_empty() {
        return None;
    }

    Some(ResumePayload {
        data: STANDARD.encode(&bytes),
        mimetype: non_blank(mimetype).unwrap_or_else(|| PDF_MIMETYPE.to_string()),
        filename: non_blank(filename).unwrap_or_else(|| DEFAULT_FILENAME.to_string()),
        size: bytes.len(),
    })
}

type Decoded = (Vec<u8>, Option<String>, Option<String>);

/// Compatibility shim for resumes imported from the previous document store.
///
/// Accepted shapes, alone or as the `data` member of a
/// `{data, mimetype, originalname}` wrapper:
/// - Node Buffer JSON: `{"type": "Buffer", "data": [37, 80, ...]}`
/// - extended JSON: `{"$binary": {"base64": "...", "subType": "00"}}`
///   or `{"$binary": "...", "$type": "00"}`
/// - driver object dump: `{"buffer": <any of these>}`
/// - a bare array of byte values
/// - a base64 string
pub fn decode_legacy(value: &Value) -> Option<Decoded> {
    if let Value::Object(map) = value {
        if is_wrapper(map) {
            let bytes = decode_binary(map.get("data")?)?;
            let mimetype = string_field(map, &["mimetype", "contentType", "mimeType"]);
            let filename = string_field(map, &["originalname", "originalName", "filename"]);
            return Some((bytes, mimetype, filename));
        }
    }
    decode_binary(value).map(|bytes| (bytes, None, None))
}

fn is_wrapper(map: &Map<String, Value>) -> bool {
    map.contains_key("data") && !is_buffer_json(map) && !map.contains_key("$binary")
}

fn is_buffer_json(map: &Map<String, Value>) -> bool {
    map.get("type").and_then(Value::as_str) == Some("Buffer")
}

fn decode_binary(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::String(encoded) => STANDARD.decode(encoded.trim()).ok(),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect(),
        Value::Object(map) => {
            if let Some(binary) = map.get("$binary") {
                return match binary {
                    Value::String(encoded) => STANDARD.decode(encoded.trim()).ok(),
                    Value::Object(inner) => inner
                        .get("base64")
                        .and_then(Value::as_str)
                        .and_then(|encoded| STANDARD.decode(encoded.trim()).ok()),
                    _ => None,
                };
            }
            if is_buffer_json(map) {
                return map.get("data").and_then(decode_binary);
            }
            map.get("buffer").and_then(decode_binary)
        }
        _ => None,
    }
}

fn string_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .map(String::from)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PDF: &[u8] = b"%PDF-1.4 fake";

    fn encoded() -> String {
        STANDARD.encode(PDF)
    }

    #[test]
    fn test_upload_round_trips_through_payload() {
        let stored = StoredResume::from_upload(UploadedFile {
            data: Bytes::from_static(PDF),
            mimetype: PDF_MIMETYPE.to_string(),
            filename: "cv.pdf".to_string(),
        });
        let payload = to_payload(&stored).unwrap();
        assert_eq!(STANDARD.decode(&payload.data).unwrap(), PDF);
        assert_eq!(payload.filename, "cv.pdf");
        assert_eq!(payload.mimetype, PDF_MIMETYPE);
        assert_eq!(payload.size, PDF.len());
    }

    #[test]
    fn test_binary_without_metadata_gets_defaults() {
        let stored = StoredResume::Binary {
            data: PDF.to_vec(),
            mimetype: None,
            filename: Some("  ".to_string()),
        };
        let payload = to_payload(&stored).unwrap();
        assert_eq!(payload.mimetype, "application/pdf");
        assert_eq!(payload.filename, "resume.pdf");
    }

    #[test]
    fn test_empty_binary_is_null() {
        let stored = StoredResume::Binary {
            data: vec![],
            mimetype: Some(PDF_MIMETYPE.to_string()),
            filename: Some("cv.pdf".to_string()),
        };
        assert!(to_payload(&stored).is_none());
    }

    #[test]
    fn test_wrapper_with_buffer_json() {
        let bytes: Vec<u64> = PDF.iter().map(|b| *b as u64).collect();
        let legacy = json!({
            "data": { "type": "Buffer", "data": bytes },
            "mimetype": "application/pdf",
            "originalname": "old.pdf"
        });
        let payload = to_payload(&StoredResume::Legacy(legacy)).unwrap();
        assert_eq!(payload.data, encoded());
        assert_eq!(payload.filename, "old.pdf");
    }

    #[test]
    fn test_wrapper_with_extended_json_binary() {
        let legacy = json!({
            "data": { "$binary": { "base64": encoded(), "subType": "00" } },
            "originalname": "cv.pdf"
        });
        let payload = to_payload(&StoredResume::Legacy(legacy)).unwrap();
        assert_eq!(payload.data, encoded());
        assert_eq!(payload.mimetype, PDF_MIMETYPE);
    }

    #[test]
    fn test_legacy_extended_json_binary_string_form() {
        let legacy = json!({ "$binary": encoded(), "$type": "00" });
        let payload = to_payload(&StoredResume::Legacy(legacy)).unwrap();
        assert_eq!(payload.size, PDF.len());
        assert_eq!(payload.filename, DEFAULT_FILENAME);
    }

    #[test]
    fn test_driver_buffer_dump() {
        let legacy = json!({ "data": { "buffer": encoded() }, "mimetype": "application/pdf" });
        assert_eq!(to_payload(&StoredResume::Legacy(legacy)).unwrap().data, encoded());
    }

    #[test]
    fn test_bare_array_and_base64_string() {
        let array = json!(PDF.to_vec());
        assert_eq!(to_payload(&StoredResume::Legacy(array)).unwrap().data, encoded());
        let string = json!(encoded());
        assert_eq!(to_payload(&StoredResume::Legacy(string)).unwrap().data, encoded());
    }

    #[test]
    fn test_unrecoverable_shapes_degrade_to_none() {
        for legacy in [
            json!(null),
            json!({}),
            json!({ "data": null }),
            json!({ "data": [] }),
            json!([1, 2, 300]),
            json!("not base64 !!"),
            json!({ "type": "Buffer" }),
            json!({ "$binary": 42 }),
            json!(12),
        ] {
            assert!(
                to_payload(&StoredResume::Legacy(legacy.clone())).is_none(),
                "expected null for {legacy}"
            );
        }
    }
}
