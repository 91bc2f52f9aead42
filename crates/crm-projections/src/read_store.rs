//! Read store abstraction and an in-memory implementation.
//!
//! Records are stored as JSON documents keyed by kind, tenant and entity id.
//! Each document carries the version of the last event folded into it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crm_core::error::DomainError;
use crm_opportunity::domain::aggregates::OpportunityState;
use crm_opportunity::domain::events::{InternalStage, InternalType};

/// Record kind of opportunities.
pub const OPPORTUNITY: &str = "opportunity";

/// One read-model entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record<S> {
    /// Tenant the record belongs to.
    pub tenant: String,
    /// Aggregate identifier.
    pub id: String,
    /// Version of the last event folded into `state`.
    pub aggregate_version: i64,
    /// Projected state.
    pub state: S,
}

impl<S: Default> Record<S> {
    /// An entity nothing has been projected into yet.
    #[must_use]
    pub fn empty(tenant: &str, id: &str) -> Self {
        Self {
            tenant: tenant.to_owned(),
            id: id.to_owned(),
            aggregate_version: 0,
            state: S::default(),
        }
    }
}

/// A record in its stored form.
pub type Document = Record<serde_json::Value>;

/// Write and lookup API of the read store.
#[async_trait]
pub trait ReadStore: Send + Sync {
    /// Fetch one document.
    async fn get(&self, kind: &str, tenant: &str, id: &str)
    -> Result<Option<Document>, DomainError>;

    /// Insert or replace a document. A document older than the stored one
    /// (by `aggregate_version`) is ignored.
    async fn upsert(&self, kind: &str, document: Document) -> Result<(), DomainError>;

    /// Open renewal opportunities whose `renewedAt` lies before `before`,
    /// earliest first, at most `limit`.
    async fn renewals_due(
        &self,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Record<OpportunityState>>, DomainError>;
}

/// Loads and decodes a record.
///
/// # Errors
///
/// Returns the store's error, or `DomainError::Serialization` for a document
/// that does not decode as `S`.
pub async fn load_record<S: DeserializeOwned>(
    store: &dyn ReadStore,
    kind: &str,
    tenant: &str,
    id: &str,
) -> Result<Option<Record<S>>, DomainError> {
    store
        .get(kind, tenant, id)
        .await?
        .map(decode_document)
        .transpose()
}

/// Encodes and stores a record.
///
/// # Errors
///
/// Returns `DomainError::Serialization` if the state cannot be encoded, or the
/// store's error.
pub async fn save_record<S: Serialize + Sync>(
    store: &dyn ReadStore,
    kind: &str,
    record: &Record<S>,
) -> Result<(), DomainError> {
    let document = Document {
        tenant: record.tenant.clone(),
        id: record.id.clone(),
        aggregate_version: record.aggregate_version,
        state: serde_json::to_value(&record.state)?,
    };
    store.upsert(kind, document).await
}

fn decode_document<S: DeserializeOwned>(document: Document) -> Result<Record<S>, DomainError> {
    Ok(Record {
        tenant: document.tenant,
        id: document.id,
        aggregate_version: document.aggregate_version,
        state: serde_json::from_value(document.state)?,
    })
}

fn is_due_renewal(state: &OpportunityState, before: DateTime<Utc>) -> bool {
    state.internal_type == Some(InternalType::Renewal)
        && state.internal_stage.is_none_or(|stage| stage == InternalStage::Open)
        && state.renewal.renewed_at.is_some_and(|at| at < before)
}

type DocumentKey = (String, String, String);

/// Read store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryReadStore {
    documents: Mutex<BTreeMap<DocumentKey, Document>>,
}

impl InMemoryReadStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents of `kind`.
    pub async fn count(&self, kind: &str) -> usize {
        self.documents
            .lock()
            .await
            .keys()
            .filter(|(k, _, _)| k == kind)
            .count()
    }
}

#[async_trait]
impl ReadStore for InMemoryReadStore {
    async fn get(
        &self,
        kind: &str,
        tenant: &str,
        id: &str,
    ) -> Result<Option<Document>, DomainError> {
        let key = (kind.to_owned(), tenant.to_owned(), id.to_owned());
        Ok(self.documents.lock().await.get(&key).cloned())
    }

    async fn upsert(&self, kind: &str, document: Document) -> Result<(), DomainError> {
        let key = (kind.to_owned(), document.tenant.clone(), document.id.clone());
        let mut documents = self.documents.lock().await;
        let stale = documents
            .get(&key)
            .is_some_and(|stored| stored.aggregate_version > document.aggregate_version);
        if !stale {
            documents.insert(key, document);
        }
        Ok(())
    }

    async fn renewals_due(
        &self,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Record<OpportunityState>>, DomainError> {
        let documents: Vec<Document> = self
            .documents
            .lock()
            .await
            .iter()
            .filter(|((kind, _, _), _)| kind == OPPORTUNITY)
            .map(|(_, document)| document.clone())
            .collect();
        let mut due = Vec::new();
        for document in documents {
            let record: Record<OpportunityState> = decode_document(document)?;
            if is_due_renewal(&record.state, before) {
                due.push(record);
            }
        }
        due.sort_by_key(|record| record.state.renewal.renewed_at);
        due.truncate(limit);
        Ok(due)
    }
}
