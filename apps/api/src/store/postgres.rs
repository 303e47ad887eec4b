use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::models::form::{FormData, FormRecord, FormRow, FormSummary, StoredResume};
use crate::store::{FormStore, StoreError};

/// Name of the UNIQUE constraint on `forms.full_name` (see migrations).
pub const FULL_NAME_CONSTRAINT: &str = "forms_full_name_key";

/// Postgres-backed store over the `forms` table.
#[derive(Clone)]
pub struct PgFormStore {
    pool: PgPool,
}

impl PgFormStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Column values for the resume attachment. New uploads clear the legacy column.
struct ResumeColumns<'a> {
    data: Option<&'a [u8]>,
    mimetype: Option<&'a str>,
    filename: Option<&'a str>,
    legacy: Option<Value>,
}

impl<'a> ResumeColumns<'a> {
    fn from_stored(resume: Option<&'a StoredResume>) -> Self {
        match resume {
            Some(StoredResume::Binary {
                data,
                mimetype,
                filename,
            }) => ResumeColumns {
                data: Some(data.as_slice()),
                mimetype: mimetype.as_deref(),
                filename: filename.as_deref(),
                legacy: None,
            },
            Some(StoredResume::Legacy(value)) => ResumeColumns {
                data: None,
                mimetype: None,
                filename: None,
                legacy: Some(value.clone()),
            },
            None => ResumeColumns {
                data: None,
                mimetype: None,
                filename: None,
                legacy: None,
            },
        }
    }
}

fn decode_row(row: FormRow) -> Result<FormRecord, StoreError> {
    let id = row.id;
    FormRecord::try_from(row).map_err(|e| StoreError::Corrupt {
        id,
        reason: e.to_string(),
    })
}

#[async_trait]
impl FormStore for PgFormStore {
    async fn insert(&self, data: &FormData) -> Result<FormRecord, StoreError> {
        let resume = ResumeColumns::from_stored(data.resume.as_ref());

        let row = sqlx::query_as::<_, FormRow>(
            r#"
            INSERT INTO forms
                (id, full_name, password_hash, gender, dob, phone_num, alternate_phone_num,
                 address_line1, address_line2, country, city, postal_code,
                 current_job_title, employment_status, company_name, years_of_experience,
                 monthly_income, loan_status, loan_amount, credit_score, preferred_contact,
                 hobbies, news_letter_subscription,
                 resume_data, resume_mimetype, resume_filename, resume_legacy)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.full_name)
        .bind(&data.password_hash)
        .bind(data.gender.as_str())
        .bind(data.dob)
        .bind(&data.phone_num)
        .bind(&data.alternate_phone_num)
        .bind(&data.address_line1)
        .bind(&data.address_line2)
        .bind(&data.country)
        .bind(&data.city)
        .bind(&data.postal_code)
        .bind(&data.current_job_title)
        .bind(data.employment_status.as_str())
        .bind(&data.company_name)
        .bind(data.years_of_experience)
        .bind(data.monthly_income)
        .bind(data.loan_status.as_str())
        .bind(data.loan_amount)
        .bind(data.credit_score)
        .bind(data.preferred_contact.as_str())
        .bind(&data.hobbies)
        .bind(data.news_letter_subscription)
        .bind(resume.data)
        .bind(resume.mimetype)
        .bind(resume.filename)
        .bind(resume.legacy)
        .fetch_one(&self.pool)
        .await?;

        debug!("Inserted form {}", row.id);
        decode_row(row)
    }

    async fn list(&self) -> Result<Vec<FormSummary>, StoreError> {
        Ok(sqlx::query_as::<_, FormSummary>(
            r#"
            SELECT id, full_name, gender, phone_num, country, created_at
            FROM forms
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FormRecord>, StoreError> {
        let row = sqlx::query_as::<_, FormRow>("SELECT * FROM forms WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(decode_row).transpose()
    }

    async fn update(&self, id: Uuid, data: &FormData) -> Result<Option<FormRecord>, StoreError> {
        let resume = ResumeColumns::from_stored(data.resume.as_ref());

        let row = sqlx::query_as::<_, FormRow>(
            r#"
            UPDATE forms SET
                full_name = $2, password_hash = $3, gender = $4, dob = $5, phone_num = $6,
                alternate_phone_num = $7, address_line1 = $8, address_line2 = $9,
                country = $10, city = $11, postal_code = $12, current_job_title = $13,
                employment_status = $14, company_name = $15, years_of_experience = $16,
                monthly_income = $17, loan_status = $18, loan_amount = $19,
                credit_score = $20, preferred_contact = $21, hobbies = $22,
                news_letter_subscription = $23, resume_data = $24, resume_mimetype = $25,
                resume_filename = $26, resume_legacy = $27, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.full_name)
        .bind(&data.password_hash)
        .bind(data.gender.as_str())
        .bind(data.dob)
        .bind(&data.phone_num)
        .bind(&data.alternate_phone_num)
        .bind(&data.address_line1)
        .bind(&data.address_line2)
        .bind(&data.country)
        .bind(&data.city)
        .bind(&data.postal_code)
        .bind(&data.current_job_title)
        .bind(data.employment_status.as_str())
        .bind(&data.company_name)
        .bind(data.years_of_experience)
        .bind(data.monthly_income)
        .bind(data.loan_status.as_str())
        .bind(data.loan_amount)
        .bind(data.credit_score)
        .bind(data.preferred_contact.as_str())
        .bind(&data.hobbies)
        .bind(data.news_letter_subscription)
        .bind(resume.data)
        .bind(resume.mimetype)
        .bind(resume.filename)
        .bind(resume.legacy)
        .fetch_optional(&self.pool)
        .await?;

        if row.is_some() {
            debug!("Updated form {id}");
        }
        row.map(decode_row).transpose()
    }

    async fn exists(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM forms WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM forms WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            debug!("Deleted form {id}");
        }
        Ok(deleted)
    }
}
