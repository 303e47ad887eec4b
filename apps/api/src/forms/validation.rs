use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::forms::input::FormDraft;

/// Struct field name to client field name, in reporting order.
const FIELD_NAMES: &[(&str, &str)] = &[
    ("full_name", "fullName"),
    ("password", "password"),
    ("gender", "gender"),
    ("phone_num", "phoneNum"),
    ("address_line1", "addressLine1"),
    ("country", "country"),
    ("city", "city"),
    ("postal_code", "postalCode"),
    ("employment_status", "employmentStatus"),
    ("loan_status", "loanStatus"),
    ("preferred_contact", "preferredContact"),
    ("years_of_experience", "yearsOfExperience"),
    ("monthly_income", "monthlyIncome"),
    ("loan_amount", "loanAmount"),
    ("credit_score", "creditScore"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldViolation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Checks a candidate record against every field rule declared on
/// [`FormDraft`], collecting all failures. An empty result means the record
/// may be written.
pub fn validate_form(draft: &FormDraft) -> Vec<FieldViolation> {
    match draft.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => into_violations(&errors),
    }
}

#[derive(Debug, Validate)]
struct CredentialRules {
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    password: Option<String>,
}

/// Rules for the plaintext credential, checked before it is hashed.
pub fn validate_credential(
    password: Option<&str>,
    confirm_password: Option<&str>,
    required: bool,
) -> Vec<FieldViolation> {
    let mut violations = match password {
        None if required => vec![FieldViolation::new("password", "Password is required")],
        _ => {
            let rules = CredentialRules {
                password: password.map(str::to_string),
            };
            rules
                .validate()
                .err()
                .map(|errors| into_violations(&errors))
                .unwrap_or_default()
        }
    };

    if let Some(confirm) = confirm_password {
        if password != Some(confirm) {
            violations.push(FieldViolation::new(
                "confirmPassword",
                "Passwords do not match",
            ));
        }
    }

    violations
}

/// Flattens validator output into one violation per field, in form order.
fn into_violations(errors: &ValidationErrors) -> Vec<FieldViolation> {
    let mut ranked: Vec<(usize, FieldViolation)> = errors
        .field_errors()
        .into_iter()
        .filter_map(|(name, list)| {
            let name: &str = &name;
            let first = list.first()?;
            let (rank, field) = FIELD_NAMES
                .iter()
                .enumerate()
                .find(|(_, (rust, _))| *rust == name)
                .map(|(rank, (_, client))| (rank, client.to_string()))
                .unwrap_or((usize::MAX, name.to_string()));
            let message = first
                .message
                .as_deref()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{field} is invalid"));
            Some((rank, FieldViolation::new(field, message)))
        })
        .collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.field.cmp(&b.1.field)));
    ranked.into_iter().map(|(_, v)| v).collect()
}

fn rule_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if is_mobile_phone(phone) {
        Ok(())
    } else {
        Err(rule_error("phone", "Invalid phone number"))
    }
}

pub fn validate_postal_code(code: &str) -> Result<(), ValidationError> {
    if is_postal_code(code) {
        Ok(())
    } else {
        Err(rule_error("postal_code", "Invalid postal code"))
    }
}

/// Concatenates violation lists, keeping only the first message per field.
pub fn merge_violations(
    first: Vec<FieldViolation>,
    rest: impl IntoIterator<Item = FieldViolation>,
) -> Vec<FieldViolation> {
    let mut merged = first;
    for violation in rest {
        if !merged.iter().any(|v| v.field == violation.field) {
            merged.push(violation);
        }
    }
    merged
}

/// Accepts international (`+` prefixed) and national numbers once the usual
/// separators are stripped: 7 to 15 digits, no leading zero after a `+`.
pub fn is_mobile_phone(raw: &str) -> bool {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    let (international, digits) = match compact.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, compact.as_str()),
    };

    if !(7..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    !(international && digits.starts_with('0'))
}

/// Country-agnostic postal code shape: 2 to 10 letters and digits, optionally
/// split by single spaces or hyphens, with at least one digit.
pub fn is_postal_code(raw: &str) -> bool {
    let code = raw.trim();
    let len = code.chars().count();
    if !(2..=10).contains(&len) {
        return false;
    }

    let mut previous_was_separator = true;
    for c in code.chars() {
        match c {
            c if c.is_ascii_alphanumeric() => previous_was_separator = false,
            ' ' | '-' if !previous_was_separator => previous_was_separator = true,
            _ => return false,
        }
    }

    !previous_was_separator && code.chars().any(|c| c.is_ascii_digit())
}
