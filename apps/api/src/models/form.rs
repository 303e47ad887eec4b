use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::forms::resume::{self, ResumePayload};

/// Declares a closed set of string-valued options, with the exact spellings
/// accepted on input and written to the store.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALLOWED: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "'{}' is not one of {}",
                        other,
                        Self::ALLOWED.join(", ")
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(Gender {
    Male => "Male",
    Female => "Female",
    Other => "Other",
});

string_enum!(EmploymentStatus {
    Employed => "Employed",
    Unemployed => "Unemployed",
    Student => "Student",
});

string_enum!(LoanStatus {
    Yes => "Yes",
    No => "No",
});

string_enum!(PreferredContact {
    Email => "Email",
    Phone => "Phone",
    Sms => "SMS",
});

/// Resume attachment as it sits in the store.
///
/// New writes are always `Binary`. `Legacy` carries documents imported from the
/// previous document store, whose binary encoding varies; it is only ever decoded
/// by [`resume::to_payload`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoredResume {
    Binary {
        data: Vec<u8>,
        mimetype: Option<String>,
        filename: Option<String>,
    },
    Legacy(Value),
}

/// Everything a client controls on a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct FormData {
    pub full_name: String,
    pub password_hash: String,
    pub gender: Gender,
    pub dob: Option<NaiveDate>,
    pub phone_num: String,
    pub alternate_phone_num: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub country: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub current_job_title: Option<String>,
    pub employment_status: EmploymentStatus,
    pub company_name: Option<String>,
    pub years_of_experience: f64,
    pub monthly_income: f64,
    pub loan_status: LoanStatus,
    pub loan_amount: Option<f64>,
    pub credit_score: Option<f64>,
    pub preferred_contact: PreferredContact,
    pub hobbies: Vec<String>,
    pub news_letter_subscription: bool,
    pub resume: Option<StoredResume>,
}

/// One job-application submission, as persisted. Identity and timestamps are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct FormRecord {
    pub id: Uuid,
    pub data: FormData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw `forms` table row. Enum columns are TEXT guarded by CHECK constraints.
#[derive(Debug, Clone, FromRow)]
pub struct FormRow {
    pub id: Uuid,
    pub full_name: String,
    pub password_hash: String,
    pub gender: String,
    pub dob: Option<NaiveDate>,
    pub phone_num: String,
    pub alternate_phone_num: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub country: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub current_job_title: Option<String>,
    pub employment_status: String,
    pub company_name: Option<String>,
    pub years_of_experience: f64,
    pub monthly_income: f64,
    pub loan_status: String,
    pub loan_amount: Option<f64>,
    pub credit_score: Option<f64>,
    pub preferred_contact: String,
    pub hobbies: Vec<String>,
    pub news_letter_subscription: bool,
    pub resume_data: Option<Vec<u8>>,
    pub resume_mimetype: Option<String>,
    pub resume_filename: Option<String>,
    pub resume_legacy: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<FormRow> for FormRecord {
    type Error = anyhow::Error;

    fn try_from(row: FormRow) -> Result<Self, Self::Error> {
        let resume = match (row.resume_data, row.resume_legacy) {
            (Some(data), _) => Some(StoredResume::Binary {
                data,
                mimetype: row.resume_mimetype,
                filename: row.resume_filename,
            }),
            (None, Some(legacy)) => Some(StoredResume::Legacy(legacy)),
            (None, None) => None,
        };

        Ok(FormRecord {
            id: row.id,
            data: FormData {
                full_name: row.full_name,
                password_hash: row.password_hash,
                gender: row.gender.parse().map_err(anyhow::Error::msg)?,
                dob: row.dob,
                phone_num: row.phone_num,
                alternate_phone_num: row.alternate_phone_num,
                address_line1: row.address_line1,
                address_line2: row.address_line2,
                country: row.country,
                city: row.city,
                postal_code: row.postal_code,
                current_job_title: row.current_job_title,
                employment_status: row
                    .employment_status
                    .parse()
                    .map_err(anyhow::Error::msg)?,
                company_name: row.company_name,
                years_of_experience: row.years_of_experience,
                monthly_income: row.monthly_income,
                loan_status: row.loan_status.parse().map_err(anyhow::Error::msg)?,
                loan_amount: row.loan_amount,
                credit_score: row.credit_score,
                preferred_contact: row
                    .preferred_contact
                    .parse()
                    .map_err(anyhow::Error::msg)?,
                hobbies: row.hobbies,
                news_letter_subscription: row.news_letter_subscription,
                resume,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Reduced projection used by the list endpoint; never carries attachment bytes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FormSummary {
    pub id: Uuid,
    pub full_name: String,
    pub gender: String,
    pub phone_num: String,
    pub country: String,
    pub created_at: DateTime<Utc>,
}

impl From<&FormRecord> for FormSummary {
    fn from(record: &FormRecord) -> Self {
        FormSummary {
            id: record.id,
            full_name: record.data.full_name.clone(),
            gender: record.data.gender.to_string(),
            phone_num: record.data.phone_num.clone(),
            country: record.data.country.clone(),
            created_at: record.created_at,
        }
    }
}

/// Client-facing record. Never carries the credential.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormResponse {
    pub id: Uuid,
    pub full_name: String,
    pub gender: Gender,
    pub dob: Option<NaiveDate>,
    pub phone_num: String,
    pub alternate_phone_num: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub country: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub current_job_title: Option<String>,
    pub employment_status: EmploymentStatus,
    pub company_name: Option<String>,
    pub years_of_experience: f64,
    pub monthly_income: f64,
    pub loan_status: LoanStatus,
    pub loan_amount: Option<f64>,
    pub credit_score: Option<f64>,
    pub preferred_contact: PreferredContact,
    pub hobbies: Vec<String>,
    pub news_letter_subscription: bool,
    /// Always present in the JSON; `null` when there is no recoverable attachment.
    pub resume: Option<ResumePayload>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&FormRecord> for FormResponse {
    fn from(record: &FormRecord) -> Self {
        let data = &record.data;
        FormResponse {
            id: record.id,
            full_name: data.full_name.clone(),
            gender: data.gender,
            dob: data.dob,
            phone_num: data.phone_num.clone(),
            alternate_phone_num: data.alternate_phone_num.clone(),
            address_line1: data.address_line1.clone(),
            address_line2: data.address_line2.clone(),
            country: data.country.clone(),
            city: data.city.clone(),
            postal_code: data.postal_code.clone(),
            current_job_title: data.current_job_title.clone(),
            employment_status: data.employment_status,
            company_name: data.company_name.clone(),
            years_of_experience: data.years_of_experience,
            monthly_income: data.monthly_income,
            loan_status: data.loan_status,
            loan_amount: data.loan_amount,
            credit_score: data.credit_score,
            preferred_contact: data.preferred_contact,
            hobbies: data.hobbies.clone(),
            news_letter_subscription: data.news_letter_subscription,
            resume: data.resume.as_ref().and_then(resume::to_payload),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_parsing_is_exact() {
        assert_eq!("SMS".parse::<PreferredContact>(), Ok(PreferredContact::Sms));
        assert_eq!(" Female ".parse::<Gender>(), Ok(Gender::Female));
        let err = "employed".parse::<EmploymentStatus>().unwrap_err();
        assert!(err.contains("Employed, Unemployed, Student"));
    }

    #[test]
    fn test_enum_serializes_with_display_spelling() {
        let json = serde_json::to_value(PreferredContact::Sms).unwrap();
        assert_eq!(json, serde_json::json!("SMS"));
    }

    #[test]
    fn test_row_prefers_binary_columns_over_legacy() {
        let now = Utc::now();
        let row = FormRow {
            id: Uuid::new_v4(),
            full_name: "Jane Doe".to_string(),
            password_hash: "hash".to_string(),
            gender: "Female".to_string(),
            dob: None,
            phone_num: "+14155552671".to_string(),
            alternate_phone_num: None,
            address_line1: "1 Main St".to_string(),
            address_line2: None,
            country: "US".to_string(),
            city: "X".to_string(),
            postal_code: None,
            current_job_title: None,
            employment_status: "Employed".to_string(),
            company_name: None,
            years_of_experience: 0.0,
            monthly_income: 5000.0,
            loan_status: "No".to_string(),
            loan_amount: None,
            credit_score: None,
            preferred_contact: "Email".to_string(),
            hobbies: vec![],
            news_letter_subscription: false,
            resume_data: Some(b"%PDF".to_vec()),
            resume_mimetype: None,
            resume_filename: None,
            resume_legacy: Some(serde_json::json!("ignored")),
            created_at: now,
            updated_at: now,
        };
        let record = FormRecord::try_from(row).unwrap();
        assert!(matches!(record.data.resume, Some(StoredResume::Binary { .. })));
    }
}
