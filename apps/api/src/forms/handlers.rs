//! Axum route handlers for the Forms API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::forms::credential::{hash_password, verify_password};
use crate::forms::extract::FormSubmission;
use crate::forms::input::{coerce_fields, FormDraft};
use crate::forms::sanitize::{sanitize_fields, sanitize_id};
use crate::forms::validation::{
    merge_violations, validate_credential, validate_form, FieldViolation,
};
use crate::models::form::{FormResponse, FormSummary, StoredResume};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response envelope
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        ApiResponse {
            status: "success",
            results: None,
            data,
        }
    }
}

fn form_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("No form found with id {id}"))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /forms
///
/// Creates a record from form fields plus an optional PDF resume.
/// The credential is hashed before storage and never echoed back.
pub async fn create_form(
    State(state): State<AppState>,
    submission: FormSubmission,
) -> Result<(StatusCode, Json<ApiResponse<FormResponse>>), AppError> {
    let FormSubmission { mut fields, resume } = submission;
    sanitize_fields(&mut fields);
    debug!("Create form submission with {} fields", fields.len());

    let (mut input, coercion_violations) = coerce_fields(&fields);
    input.draft.resume = resume.map(StoredResume::from_upload);

    let violations = merge_violations(
        coercion_violations,
        validate_credential(
            input.password.as_deref(),
            input.confirm_password.as_deref(),
            true,
        )
        .into_iter()
        .chain(validate_form(&input.draft)),
    );
    // A missing password is always among the violations.
    let Some(password) = input.password.filter(|_| violations.is_empty()) else {
        return Err(AppError::Validation(violations));
    };
    let password_hash = hash_password(password).await?;
    let data = input
        .draft
        .finalize(password_hash)
        .map_err(AppError::Validation)?;

    let record = state.store.insert(&data).await?;
    info!("Created form {}", record.id);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(FormResponse::from(&record))),
    ))
}

/// GET /forms
///
/// Lists every record in the reduced projection (no attachments, no credential).
pub async fn list_forms(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<FormSummary>>>, AppError> {
    let forms = state.store.list().await?;
    Ok(Json(ApiResponse {
        status: "success",
        results: Some(forms.len()),
        data: forms,
    }))
}

/// GET /forms/:id
///
/// Returns the full record with its resume normalized to base64 (or `null`).
pub async fn get_form(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<FormResponse>>, AppError> {
    let id = sanitize_id(&raw_id)?;
    let record = state
        .store
        .find_by_id(id)
        .await?
        .ok_or_else(|| form_not_found(id))?;
    Ok(Json(ApiResponse::success(FormResponse::from(&record))))
}

/// PUT /forms/:id
///
/// Partial update: only submitted fields change and the merged record is
/// re-validated. A new resume replaces the old one wholesale. Changing the
/// credential requires `currentPassword`.
pub async fn update_form(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    submission: FormSubmission,
) -> Result<Json<ApiResponse<FormResponse>>, AppError> {
    let id = sanitize_id(&raw_id)?;
    let FormSubmission { mut fields, resume } = submission;
    sanitize_fields(&mut fields);

    let existing = state
        .store
        .find_by_id(id)
        .await?
        .ok_or_else(|| form_not_found(id))?;

    let (mut input, coercion_violations) = coerce_fields(&fields);
    input.draft.resume = resume.map(StoredResume::from_upload);
    let merged = FormDraft::from_data(&existing.data).merge(input.draft);

    let violations = merge_violations(
        coercion_violations,
        validate_credential(
            input.password.as_deref(),
            input.confirm_password.as_deref(),
            false,
        )
        .into_iter()
        .chain(validate_form(&merged)),
    );
    if !violations.is_empty() {
        return Err(AppError::Validation(violations));
    }

    let password_hash = match input.password {
        None => existing.data.password_hash.clone(),
        Some(new_password) => {
            let Some(current) = input.current_password else {
                return Err(AppError::Validation(vec![FieldViolation::new(
                    "currentPassword",
                    "Current password is required to set a new password",
                )]));
            };
            if !verify_password(current, existing.data.password_hash.clone()).await? {
                return Err(AppError::Unauthorized(
                    "Current password is incorrect".to_string(),
                ));
            }
            hash_password(new_password).await?
        }
    };

    let data = merged
        .finalize(password_hash)
        .map_err(AppError::Validation)?;
    let record = state
        .store
        .update(id, &data)
        .await?
        .ok_or_else(|| form_not_found(id))?;
    info!("Updated form {id}");

    Ok(Json(ApiResponse::success(FormResponse::from(&record))))
}

/// DELETE /forms/:id
pub async fn delete_form(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let id = sanitize_id(&raw_id)?;

    if !state.store.exists(id).await? {
        return Err(form_not_found(id));
    }
    // Gone between the check and the delete: someone else won.
    if !state.store.delete(id).await? {
        return Err(form_not_found(id));
    }
    info!("Deleted form {id}");

    Ok(Json(ApiResponse::success(())))
}
