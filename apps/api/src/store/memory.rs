use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::form::{FormData, FormRecord, FormSummary};
use crate::store::{FormStore, StoreError};

/// In-process store for local runs and tests. Enforces the same full-name
/// uniqueness as the Postgres schema. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryFormStore {
    records: RwLock<HashMap<Uuid, FormRecord>>,
}

impl MemoryFormStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a fully formed record, e.g. one carrying a legacy resume shape.
    #[cfg(test)]
    pub async fn seed(&self, record: FormRecord) {
        self.records.write().await.insert(record.id, record);
    }
}

fn name_taken(records: &HashMap<Uuid, FormRecord>, full_name: &str, except: Option<Uuid>) -> bool {
    records
        .values()
        .any(|r| r.data.full_name == full_name && Some(r.id) != except)
}

fn duplicate_name() -> StoreError {
    StoreError::Duplicate {
        field: "fullName".to_string(),
    }
}

#[async_trait]
impl FormStore for MemoryFormStore {
    async fn insert(&self, data: &FormData) -> Result<FormRecord, StoreError> {
        let mut records = self.records.write().await;
        if name_taken(&records, &data.full_name, None) {
            return Err(duplicate_name());
        }
        let now = Utc::now();
        let record = FormRecord {
            id: Uuid::new_v4(),
            data: data.clone(),
            created_at: now,
            updated_at: now,
        };
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<FormSummary>, StoreError> {
        let records = self.records.read().await;
        let mut summaries: Vec<FormSummary> = records.values().map(FormSummary::from).collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FormRecord>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, data: &FormData) -> Result<Option<FormRecord>, StoreError> {
        let mut records = self.records.write().await;
        if !records.contains_key(&id) {
            return Ok(None);
        }
        if name_taken(&records, &data.full_name, Some(id)) {
            return Err(duplicate_name());
        }
        Ok(records.get_mut(&id).map(|record| {
            record.data = data.clone();
            record.updated_at = Utc::now();
            record.clone()
        }))
    }

    async fn exists(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.records.read().await.contains_key(&id))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(&id).is_some())
    }
}
