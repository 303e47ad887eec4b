//! Request-body extraction for form submissions.
//!
//! Accepts `multipart/form-data` (with an optional PDF under `resume`),
//! `application/json`, and `application/x-www-form-urlencoded`. Upload
//! constraints are enforced here, so a rejected file never reaches a handler.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::{multipart::MultipartError, FromRequest, Multipart, Request},
    http::{header::CONTENT_TYPE, StatusCode},
    Form,
};
use bytes::BytesMut;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::errors::AppError;
use crate::forms::input::RawFields;
use crate::forms::resume::{UploadedFile, PDF_MIMETYPE};
use crate::forms::sanitize::sanitize_file_name;
use crate::state::AppState;

/// The only multipart field allowed to carry a file.
pub const RESUME_FIELD: &str = "resume";

/// Extracted body: text fields plus at most one accepted resume upload.
#[derive(Debug, Default)]
pub struct FormSubmission {
    pub fields: RawFields,
    pub resume: Option<UploadedFile>,
}

#[async_trait]
impl FromRequest<AppState> for FormSubmission {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_default();
        let essence = content_type.split(';').next().unwrap_or("").trim().to_string();

        let mut submission = match essence.as_str() {
            "multipart/form-data" => {
                let multipart = Multipart::from_request(req, state)
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                read_multipart(multipart, &state.config).await?
            }
            "application/json" => {
                let bytes = read_limited(req, state.config.json_body_limit).await?;
                FormSubmission {
                    fields: fields_from_json(&bytes)?,
                    resume: None,
                }
            }
            "application/x-www-form-urlencoded" => {
                let (parts, body) = req.into_parts();
                let bytes = to_bytes(body, state.config.json_body_limit)
                    .await
                    .map_err(|_| body_too_large(state.config.json_body_limit))?;
                let Form(pairs) = Form::<Vec<(String, String)>>::from_request(
                    Request::from_parts(parts, Body::from(bytes)),
                    state,
                )
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
                let mut fields = RawFields::new();
                for (name, value) in pairs {
                    fields.push(name, value);
                }
                FormSubmission {
                    fields,
                    resume: None,
                }
            }
            "" => {
                let bytes = read_limited(req, state.config.json_body_limit).await?;
                if !bytes.is_empty() {
                    return Err(AppError::UnsupportedMediaType(
                        "Request body must declare a Content-Type".to_string(),
                    ));
                }
                FormSubmission::default()
            }
            other => {
                return Err(AppError::UnsupportedMediaType(format!(
                    "Content-Type '{other}' is not supported"
                )))
            }
        };

        submission
            .fields
            .collapse_duplicates(&state.config.hpp_allowlist);
        Ok(submission)
    }
}

async fn read_multipart(mut multipart: Multipart, config: &Config) -> Result<FormSubmission, AppError> {
    let mut submission = FormSubmission::default();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();

        let file_name = match field.file_name().map(str::to_string) {
            None => {
                let value = field.text().await.map_err(multipart_error)?;
                submission.fields.push(name, value);
                continue;
            }
            // Browsers send an empty, unnamed part for an untouched file input.
            Some(file_name) if file_name.is_empty() => continue,
            Some(file_name) => sanitize_file_name(&file_name),
        };

        if name != RESUME_FIELD {
            return Err(AppError::BadRequest(format!(
                "Unexpected file field '{name}'; upload the file as '{RESUME_FIELD}'"
            )));
        }
        if submission.resume.is_some() {
            return Err(AppError::BadRequest(
                "Only one resume file may be uploaded".to_string(),
            ));
        }

        let mimetype = field
            .content_type()
            .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .unwrap_or_default();
        if mimetype != PDF_MIMETYPE {
            return Err(AppError::UnsupportedMediaType(
                "Only PDF files are allowed".to_string(),
            ));
        }

        let mut data = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if data.len() + chunk.len() > config.upload_max_bytes {
                return Err(AppError::PayloadTooLarge(format!(
                    "Resume exceeds the {} byte upload limit",
                    config.upload_max_bytes
                )));
            }
            data.extend_from_slice(&chunk);
        }

        debug!("Accepted resume upload '{file_name}' ({} bytes)", data.len());
        submission.resume = Some(UploadedFile {
            data: data.freeze(),
            mimetype,
            filename: file_name,
        });
    }

    Ok(submission)
}

async fn read_limited(req: Request, limit: usize) -> Result<bytes::Bytes, AppError> {
    to_bytes(req.into_body(), limit)
        .await
        .map_err(|_| body_too_large(limit))
}

fn body_too_large(limit: usize) -> AppError {
    AppError::PayloadTooLarge(format!("Request body exceeds the {limit} byte limit"))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// Flattens a JSON object body into string fields. Arrays become repeated
/// values; nested objects are refused.
fn fields_from_json(bytes: &[u8]) -> Result<RawFields, AppError> {
    if bytes.is_empty() {
        return Ok(RawFields::new());
    }
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| AppError::BadRequest(format!("Malformed JSON body: {e}")))?;
    let Value::Object(map) = value else {
        return Err(AppError::BadRequest(
            "JSON body must be an object".to_string(),
        ));
    };

    let mut fields = RawFields::new();
    for (name, value) in map {
        match value {
            Value::Array(items) => {
                let texts = items
                    .into_iter()
                    .map(|item| scalar_text(&name, item))
                    .collect::<Result<Vec<_>, _>>()?;
                fields.push_list(name, texts);
            }
            Value::Null => {}
            other => fields.push(name.clone(), scalar_text(&name, other)?),
        }
    }
    Ok(fields)
}

fn scalar_text(name: &str, value: Value) -> Result<String, AppError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Object(_) => Err(AppError::BadRequest(format!(
            "Field '{name}' must be a string, number, boolean or list of those"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_flattening() {
        let body = br#"{"fullName":"Jane","monthlyIncome":5000,"newsLetterSubscription":true,
                       "hobbies":["chess","golf"],"dob":null}"#;
        let fields = fields_from_json(body).unwrap();
        assert_eq!(fields.get("fullName"), Some("Jane"));
        assert_eq!(fields.get("monthlyIncome"), Some("5000"));
        assert_eq!(fields.get("newsLetterSubscription"), Some("true"));
        assert_eq!(fields.get_all("hobbies").len(), 2);
        assert!(fields.is_list("hobbies"));
        assert!(!fields.is_list("fullName"));
        assert!(!fields.contains("dob"));
    }

    #[test]
    fn test_json_empty_list_is_kept_as_supplied() {
        let fields = fields_from_json(br#"{"hobbies":[]}"#).unwrap();
        assert!(fields.contains("hobbies"));
    }

    #[test]
    fn test_json_rejects_nested_objects_and_non_objects() {
        assert!(matches!(
            fields_from_json(br#"{"fullName":{"$gt":""}}"#),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            fields_from_json(br#"["a"]"#),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            fields_from_json(b"{not json"),
            Err(AppError::BadRequest(_))
        ));
    }
}
