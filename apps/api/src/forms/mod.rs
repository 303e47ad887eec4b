//! The form-submission pipeline: body extraction, sanitization, coercion,
//! validation, credential hashing, resume handling and the HTTP handlers.

pub mod credential;
pub mod extract;
pub mod handlers;
pub mod input;
pub mod resume;
pub mod sanitize;
pub mod validation;
