//! Form-field coercion: raw submitted strings into typed, defaulted values.
//!
//! Multipart and urlencoded bodies deliver every value as a string, and JSON
//! bodies are flattened into the same shape, so this is the one place where
//! numbers, booleans, enums, dates and the hobbies list get parsed.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use validator::Validate;

use crate::forms::validation::FieldViolation;
use crate::models::form::{
    EmploymentStatus, FormData, Gender, LoanStatus, PreferredContact, StoredResume,
};

/// Submitted field values keyed by name, in arrival order per name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFields {
    values: BTreeMap<String, Vec<String>>,
    /// Names that arrived as an explicit list (a JSON array).
    lists: BTreeSet<String>,
}

impl RawFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.entry(name.into()).or_default().push(value.into());
    }

    /// Records `name` as an explicit list. An empty list still counts as supplied.
    pub fn push_list<I, V>(&mut self, name: impl Into<String>, items: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let name = name.into();
        let values = self.values.entry(name.clone()).or_default();
        values.extend(items.into_iter().map(Into::into));
        self.lists.insert(name);
    }

    pub fn is_list(&self, name: &str) -> bool {
        self.lists.contains(name)
    }

    /// Last submitted value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|v| v.last())
            .map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Collapses repeated parameters to their last value, except for names in
    /// `allowlist`, which keep every value. `name[]` matches an entry `name`.
    pub fn collapse_duplicates(&mut self, allowlist: &[String]) {
        for (name, values) in self.values.iter_mut() {
            let base = name.strip_suffix("[]").unwrap_or(name);
            if values.len() > 1 && !allowlist.iter().any(|allowed| allowed == base) {
                let last = values.pop();
                values.clear();
                values.extend(last);
            }
        }
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.values.retain(|name, _| keep(name));
        let values = &self.values;
        self.lists.retain(|name| values.contains_key(name));
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.values.values_mut().flat_map(|v| v.iter_mut())
    }
}

/// A candidate record where every field may be absent.
///
/// On create it starts empty; on update it starts from the stored record and
/// the submitted fields are layered on top with [`FormDraft::merge`].
/// Field rules are checked by [`crate::forms::validation::validate_form`].
#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct FormDraft {
    #[validate(
        required(message = "Full name is required"),
        length(min = 2, message = "Name must be at least 2 characters")
    )]
    pub full_name: Option<String>,
    #[validate(required(message = "Gender is required"))]
    pub gender: Option<Gender>,
    pub dob: Option<NaiveDate>,
    #[validate(
        required(message = "Phone number is required"),
        custom(function = "crate::forms::validation::validate_phone")
    )]
    pub phone_num: Option<String>,
    pub alternate_phone_num: Option<String>,
    #[validate(required(message = "Address line 1 is required"))]
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    #[validate(required(message = "Country is required"))]
    pub country: Option<String>,
    #[validate(required(message = "City is required"))]
    pub city: Option<String>,
    #[validate(custom(function = "crate::forms::validation::validate_postal_code"))]
    pub postal_code: Option<String>,
    pub current_job_title: Option<String>,
    #[validate(required(message = "Employment status is required"))]
    pub employment_status: Option<EmploymentStatus>,
    pub company_name: Option<String>,
    #[validate(range(min = 0.0, message = "Years of experience cannot be negative"))]
    pub years_of_experience: Option<f64>,
    #[validate(
        required(message = "Monthly income is required"),
        range(min = 0.0, message = "Income must be positive")
    )]
    pub monthly_income: Option<f64>,
    #[validate(required(message = "Loan status is required"))]
    pub loan_status: Option<LoanStatus>,
    #[validate(range(min = 0.0, message = "Loan amount must be positive"))]
    pub loan_amount: Option<f64>,
    #[validate(range(
        min = 0.0,
        max = 1000.0,
        message = "Credit score must be between 0 and 1000"
    ))]
    pub credit_score: Option<f64>,
    #[validate(required(message = "Preferred contact method is required"))]
    pub preferred_contact: Option<PreferredContact>,
    pub hobbies: Option<Vec<String>>,
    pub news_letter_subscription: Option<bool>,
    pub resume: Option<StoredResume>,
}

impl FormDraft {
    pub fn from_data(data: &FormData) -> Self {
        FormDraft {
            full_name: Some(data.full_name.clone()),
            gender: Some(data.gender),
            dob: data.dob,
            phone_num: Some(data.phone_num.clone()),
            alternate_phone_num: data.alternate_phone_num.clone(),
            address_line1: Some(data.address_line1.clone()),
            address_line2: data.address_line2.clone(),
            country: Some(data.country.clone()),
            city: Some(data.city.clone()),
            postal_code: data.postal_code.clone(),
            current_job_title: data.current_job_title.clone(),
            employment_status: Some(data.employment_status),
            company_name: data.company_name.clone(),
            years_of_experience: Some(data.years_of_experience),
            monthly_income: Some(data.monthly_income),
            loan_status: Some(data.loan_status),
            loan_amount: data.loan_amount,
            credit_score: data.credit_score,
            preferred_contact: Some(data.preferred_contact),
            hobbies: Some(data.hobbies.clone()),
            news_letter_subscription: Some(data.news_letter_subscription),
            resume: data.resume.clone(),
        }
    }

    /// Overlays every field present in `patch`; absent fields keep their value.
    pub fn merge(self, patch: FormDraft) -> Self {
        FormDraft {
            full_name: patch.full_name.or(self.full_name),
            gender: patch.gender.or(self.gender),
            dob: patch.dob.or(self.dob),
            phone_num: patch.phone_num.or(self.phone_num),
            alternate_phone_num: patch.alternate_phone_num.or(self.alternate_phone_num),
            address_line1: patch.address_line1.or(self.address_line1),
            address_line2: patch.address_line2.or(self.address_line2),
            country: patch.country.or(self.country),
            city: patch.city.or(self.city),
            postal_code: patch.postal_code.or(self.postal_code),
            current_job_title: patch.current_job_title.or(self.current_job_title),
            employment_status: patch.employment_status.or(self.employment_status),
            company_name: patch.company_name.or(self.company_name),
            years_of_experience: patch.years_of_experience.or(self.years_of_experience),
            monthly_income: patch.monthly_income.or(self.monthly_income),
            loan_status: patch.loan_status.or(self.loan_status),
            loan_amount: patch.loan_amount.or(self.loan_amount),
            credit_score: patch.credit_score.or(self.credit_score),
            preferred_contact: patch.preferred_contact.or(self.preferred_contact),
            hobbies: patch.hobbies.or(self.hobbies),
            news_letter_subscription: patch
                .news_letter_subscription
                .or(self.news_letter_subscription),
            resume: patch.resume.or(self.resume),
        }
    }

    /// Fills defaults and produces the record data to persist. Expects a draft
    /// that already passed `validate_form`; a missing required field is still
    /// reported rather than panicking.
    pub fn finalize(self, password_hash: String) -> Result<FormData, Vec<FieldViolation>> {
        fn required<T>(value: Option<T>, field: &str) -> Result<T, Vec<FieldViolation>> {
            value.ok_or_else(|| vec![FieldViolation::new(field, format!("{field} is required"))])
        }

        Ok(FormData {
            full_name: required(self.full_name, "fullName")?,
            password_hash,
            gender: required(self.gender, "gender")?,
            dob: self.dob,
            phone_num: required(self.phone_num, "phoneNum")?,
            alternate_phone_num: self.alternate_phone_num,
            address_line1: required(self.address_line1, "addressLine1")?,
            address_line2: self.address_line2,
            country: required(self.country, "country")?,
            city: required(self.city, "city")?,
            postal_code: self.postal_code,
            current_job_title: self.current_job_title,
            employment_status: required(self.employment_status, "employmentStatus")?,
            company_name: self.company_name,
            years_of_experience: self.years_of_experience.unwrap_or(0.0),
            monthly_income: required(self.monthly_income, "monthlyIncome")?,
            loan_status: required(self.loan_status, "loanStatus")?,
            loan_amount: self.loan_amount,
            credit_score: self.credit_score,
            preferred_contact: required(self.preferred_contact, "preferredContact")?,
            hobbies: self.hobbies.unwrap_or_default(),
            news_letter_subscription: self.news_letter_subscription.unwrap_or(false),
            resume: self.resume,
        })
    }
}

/// Everything extracted from one create/update request body.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub draft: FormDraft,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub current_password: Option<String>,
}

/// Coerces raw fields into a [`Submission`]. Values that cannot be coerced are
/// reported as violations and left absent in the draft.
pub fn coerce_fields(fields: &RawFields) -> (Submission, Vec<FieldViolation>) {
    let mut violations = Vec::new();

    let draft = FormDraft {
        full_name: text(fields, "fullName"),
        gender: choice(fields, "gender", &mut violations),
        dob: date(fields, "dob", &mut violations),
        phone_num: text(fields, "phoneNum"),
        alternate_phone_num: text(fields, "alternatePhoneNum"),
        address_line1: text(fields, "addressLine1"),
        address_line2: text(fields, "addressLine2"),
        country: text(fields, "country"),
        city: text(fields, "city"),
        postal_code: text(fields, "postalCode"),
        current_job_title: text(fields, "currentJobTitle"),
        employment_status: choice(fields, "employmentStatus", &mut violations),
        company_name: text(fields, "companyName"),
        years_of_experience: number(fields, "yearsOfExperience", &mut violations),
        monthly_income: number(fields, "monthlyIncome", &mut violations),
        loan_status: choice(fields, "loanStatus", &mut violations),
        loan_amount: number(fields, "loanAmount", &mut violations),
        credit_score: number(fields, "creditScore", &mut violations),
        preferred_contact: choice(fields, "preferredContact", &mut violations),
        hobbies: hobbies(fields),
        news_letter_subscription: boolean(fields, "newsLetterSubscription", &mut violations),
        resume: None,
    };

    let submission = Submission {
        draft,
        password: secret(fields, "password"),
        confirm_password: secret(fields, "confirmPassword"),
        current_password: secret(fields, "currentPassword"),
    };

    (submission, violations)
}

fn text(fields: &RawFields, name: &str) -> Option<String> {
    fields
        .get(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Secrets are not trimmed; an empty value counts as "not supplied".
fn secret(fields: &RawFields, name: &str) -> Option<String> {
    fields
        .get(name)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn number(fields: &RawFields, name: &str, violations: &mut Vec<FieldViolation>) -> Option<f64> {
    let raw = text(fields, name)?;
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => {
            violations.push(FieldViolation::new(
                name,
                format!("'{raw}' is not a valid number"),
            ));
            None
        }
    }
}

fn boolean(fields: &RawFields, name: &str, violations: &mut Vec<FieldViolation>) -> Option<bool> {
    let raw = text(fields, name)?;
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            violations.push(FieldViolation::new(
                name,
                format!("'{raw}' is not a valid boolean"),
            ));
            None
        }
    }
}

fn choice<T>(fields: &RawFields, name: &str, violations: &mut Vec<FieldViolation>) -> Option<T>
where
    T: FromStr<Err = String>,
{
    let raw = text(fields, name)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(message) => {
            violations.push(FieldViolation::new(name, message));
            None
        }
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp (the date part is kept).
fn date(fields: &RawFields, name: &str, violations: &mut Vec<FieldViolation>) -> Option<NaiveDate> {
    let raw = text(fields, name)?;
    if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(&raw) {
        return Some(timestamp.date_naive());
    }
    violations.push(FieldViolation::new(
        name,
        format!("'{raw}' is not a valid date (expected YYYY-MM-DD)"),
    ));
    None
}

/// Hobbies arrive as repeated fields (`hobbies`, `hobbies[]`), a JSON array
/// (in the body or as a string), or one comma-separated string. Only that last
/// shape is split on commas. The result is always a list.
fn hobbies(fields: &RawFields) -> Option<Vec<String>> {
    if !fields.contains("hobbies") && !fields.contains("hobbies[]") {
        return None;
    }

    let plain = fields.get_all("hobbies");
    let bracketed = fields.get_all("hobbies[]");
    let single_text = plain.len() + bracketed.len() == 1
        && bracketed.is_empty()
        && !fields.is_list("hobbies");

    let mut items = Vec::new();
    for raw in plain.iter().chain(bracketed) {
        let trimmed = raw.trim();
        match serde_json::from_str::<Vec<String>>(trimmed) {
            Ok(list) if trimmed.starts_with('[') => items.extend(list),
            _ if single_text => items.extend(trimmed.split(',').map(String::from)),
            _ => items.push(trimmed.to_string()),
        }
    }

    Some(
        items
            .into_iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> RawFields {
        let mut raw = RawFields::new();
        for (name, value) in pairs {
            raw.push(*name, *value);
        }
        raw
    }

    fn example_fields() -> RawFields {
        fields(&[
            ("fullName", "  Jane Doe "),
            ("password", "secret1"),
            ("gender", "Female"),
            ("employmentStatus", "Employed"),
            ("monthlyIncome", "5000"),
            ("loanStatus", "No"),
            ("preferredContact", "Email"),
            ("phoneNum", "+14155552671"),
            ("addressLine1", "1 Main St"),
            ("country", "US"),
            ("city", "X"),
        ])
    }

    #[test]
    fn test_example_submission_coerces_cleanly() {
        let (submission, violations) = coerce_fields(&example_fields());
        assert!(violations.is_empty());
        assert_eq!(submission.password.as_deref(), Some("secret1"));
        let draft = &submission.draft;
        assert_eq!(draft.full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(draft.monthly_income, Some(5000.0));
        assert_eq!(draft.gender, Some(Gender::Female));
        assert_eq!(draft.hobbies, None);
    }

    #[test]
    fn test_finalize_applies_defaults() {
        let (submission, _) = coerce_fields(&example_fields());
        let data = submission.draft.finalize("hash".to_string()).unwrap();
        assert_eq!(data.years_of_experience, 0.0);
        assert!(data.hobbies.is_empty());
        assert!(!data.news_letter_subscription);
        assert!(data.resume.is_none());
    }

    #[test]
    fn test_string_numbers_and_booleans() {
        let raw = fields(&[
            ("yearsOfExperience", " 3.5 "),
            ("creditScore", "720"),
            ("newsLetterSubscription", "true"),
            ("loanAmount", ""),
        ]);
        let (submission, violations) = coerce_fields(&raw);
        assert!(violations.is_empty());
        assert_eq!(submission.draft.years_of_experience, Some(3.5));
        assert_eq!(submission.draft.credit_score, Some(720.0));
        assert_eq!(submission.draft.news_letter_subscription, Some(true));
        assert_eq!(submission.draft.loan_amount, None);
    }

    #[test]
    fn test_uncoercible_values_are_violations() {
        let raw = fields(&[
            ("monthlyIncome", "lots"),
            ("newsLetterSubscription", "maybe"),
            ("gender", "male"),
            ("dob", "31/12/1990"),
            ("creditScore", "NaN"),
        ]);
        let (submission, violations) = coerce_fields(&raw);
        let names: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(
            names,
            vec!["gender", "dob", "monthlyIncome", "creditScore", "newsLetterSubscription"]
        );
        assert_eq!(submission.draft.monthly_income, None);
    }

    #[test]
    fn test_dob_accepts_date_and_timestamp() {
        let (a, _) = coerce_fields(&fields(&[("dob", "1990-05-17")]));
        let (b, _) = coerce_fields(&fields(&[("dob", "1990-05-17T00:00:00.000Z")]));
        assert_eq!(a.draft.dob, NaiveDate::from_ymd_opt(1990, 5, 17));
        assert_eq!(a.draft.dob, b.draft.dob);
    }

    #[test]
    fn test_hobbies_shapes_normalize_to_list() {
        let repeated = fields(&[("hobbies", "chess"), ("hobbies", "golf")]);
        assert_eq!(
            coerce_fields(&repeated).0.draft.hobbies,
            Some(vec!["chess".to_string(), "golf".to_string()])
        );

        let single = fields(&[("hobbies", "chess")]);
        assert_eq!(
            coerce_fields(&single).0.draft.hobbies,
            Some(vec!["chess".to_string()])
        );

        let json = fields(&[("hobbies", r#"["chess", "rock, paper"]"#)]);
        assert_eq!(
            coerce_fields(&json).0.draft.hobbies,
            Some(vec!["chess".to_string(), "rock, paper".to_string()])
        );

        let csv = fields(&[("hobbies", "chess, golf,,")]);
        assert_eq!(
            coerce_fields(&csv).0.draft.hobbies,
            Some(vec!["chess".to_string(), "golf".to_string()])
        );

        let empty = fields(&[("hobbies", "")]);
        assert_eq!(coerce_fields(&empty).0.draft.hobbies, Some(vec![]));
    }

    #[test]
    fn test_listed_hobbies_are_not_split_on_commas() {
        let mut listed = RawFields::new();
        listed.push_list("hobbies", ["rock, paper, scissors", "chess"]);
        assert_eq!(
            coerce_fields(&listed).0.draft.hobbies,
            Some(vec!["rock, paper, scissors".to_string(), "chess".to_string()])
        );

        let mut one_item = RawFields::new();
        one_item.push_list("hobbies", ["rock, paper"]);
        assert_eq!(
            coerce_fields(&one_item).0.draft.hobbies,
            Some(vec!["rock, paper".to_string()])
        );

        let repeated = fields(&[("hobbies", "rock, paper"), ("hobbies", "chess")]);
        assert_eq!(
            coerce_fields(&repeated).0.draft.hobbies,
            Some(vec!["rock, paper".to_string(), "chess".to_string()])
        );

        let bracketed = fields(&[("hobbies[]", "chess, golf")]);
        assert_eq!(
            coerce_fields(&bracketed).0.draft.hobbies,
            Some(vec!["chess, golf".to_string()])
        );

        let mut empty = RawFields::new();
        empty.push_list("hobbies", Vec::<String>::new());
        assert_eq!(coerce_fields(&empty).0.draft.hobbies, Some(vec![]));
    }

    #[test]
    fn test_merge_only_overrides_supplied_fields() {
        let (base, _) = coerce_fields(&example_fields());
        let base = FormDraft {
            company_name: Some("Acme".to_string()),
            ..base.draft
        };
        let (patch, _) = coerce_fields(&fields(&[("city", "Y"), ("monthlyIncome", "6000")]));
        let merged = base.clone().merge(patch.draft);
        assert_eq!(merged.city.as_deref(), Some("Y"));
        assert_eq!(merged.monthly_income, Some(6000.0));
        assert_eq!(merged.company_name.as_deref(), Some("Acme"));
        assert_eq!(merged.full_name, base.full_name);
    }

    #[test]
    fn test_empty_password_counts_as_absent() {
        let (submission, _) = coerce_fields(&fields(&[("password", "")]));
        assert!(submission.password.is_none());
    }

    #[test]
    fn test_collapse_duplicates_respects_allowlist() {
        let mut raw = fields(&[
            ("city", "A"),
            ("city", "B"),
            ("hobbies", "chess"),
            ("hobbies", "golf"),
        ]);
        raw.push("hobbies[]", "tennis");
        raw.push("hobbies[]", "go");
        raw.collapse_duplicates(&["hobbies".to_string()]);
        assert_eq!(raw.get_all("city"), ["B".to_string()]);
        assert_eq!(raw.get_all("hobbies").len(), 2);
        assert_eq!(raw.get_all("hobbies[]"), ["tennis".to_string(), "go".to_string()]);
    }
}
