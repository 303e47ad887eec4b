//! Input sanitization applied at the handler boundary, before coercion.

use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::forms::input::RawFields;

/// Drops operator-style keys (`$where`, `a.b`) and strips control characters
/// from every value. Newlines and tabs survive.
pub fn sanitize_fields(fields: &mut RawFields) {
    fields.retain(|name| {
        let keep = is_safe_key(name);
        if !keep {
            warn!("Dropping unsafe form field '{name}'");
        }
        keep
    });

    for value in fields.values_mut() {
        if value.chars().any(is_stripped_char) {
            value.retain(|c| !is_stripped_char(c));
        }
    }
}

/// Strips control characters from an uploaded file's name, which is stored as
/// text alongside the bytes.
pub fn sanitize_file_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Parses a path identifier. A blank id is rejected before any store access.
pub fn sanitize_id(raw: &str) -> Result<Uuid, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Form id is required".to_string()));
    }
    Uuid::parse_str(trimmed)
        .map_err(|_| AppError::BadRequest(format!("Invalid form id '{trimmed}'")))
}

fn is_safe_key(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('$') && !name.contains('.')
}

fn is_stripped_char(c: char) -> bool {
    c.is_control() && !matches!(c, '\n' | '\r' | '\t')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_keys_are_dropped() {
        let mut fields = RawFields::new();
        fields.push("fullName", "Jane");
        fields.push("$where", "1 == 1");
        fields.push("address.city", "X");
        sanitize_fields(&mut fields);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("fullName"), Some("Jane"));
    }

    #[test]
    fn test_control_characters_are_stripped() {
        let mut fields = RawFields::new();
        fields.push("addressLine1", "1 Main\u{0} St\u{1b}");
        fields.push("addressLine2", "line\nbreak\tok");
        sanitize_fields(&mut fields);
        assert_eq!(fields.get("addressLine1"), Some("1 Main St"));
        assert_eq!(fields.get("addressLine2"), Some("line\nbreak\tok"));
    }

    #[test]
    fn test_file_name_loses_control_characters() {
        assert_eq!(sanitize_file_name("cv\u{0}.pdf"), "cv.pdf");
        assert_eq!(sanitize_file_name(" my\tresume\n.pdf "), "myresume.pdf");
        assert_eq!(sanitize_file_name("\u{0}\u{1}"), "");
    }

    #[test]
    fn test_id_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(sanitize_id(&format!(" {id} ")).unwrap(), id);
        assert!(matches!(sanitize_id("   "), Err(AppError::BadRequest(m)) if m.contains("required")));
        assert!(matches!(sanitize_id("{\"$gt\":\"\"}"), Err(AppError::BadRequest(_))));
    }
}
