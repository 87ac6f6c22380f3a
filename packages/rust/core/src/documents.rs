//! HR document ingestion into the vector index.

use std::collections::BTreeMap;

use rhassistant_knowledge::IndexGateway;
use rhassistant_shared::{AssistantError, BestEffort, HrDocument, Result};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::store::DocumentStore;

/// Outcome of an ingestion whose index write succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub id: String,
    /// The metadata row is optional: its failure leaves the document searchable.
    pub metadata: BestEffort,
}

/// Index `doc`, then record its metadata.
///
/// The index write is fatal on failure; the metadata write is reported in
/// [`IngestOutcome::metadata`].
#[instrument(skip_all, fields(title = %doc.title))]
pub async fn ingest(
    index: &dyn IndexGateway,
    documents: &dyn DocumentStore,
    doc: &HrDocument,
) -> Result<IngestOutcome> {
    if doc.content.trim().is_empty() {
        return Err(AssistantError::validation("document has no text content"));
    }

    let id = Uuid::now_v7().to_string();
    let metadata: BTreeMap<String, String> = [
        ("title", &doc.title),
        ("source", &doc.source),
        ("category", &doc.category),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.clone()))
    .collect();

    index.upsert(&id, &doc.content, &metadata).await?;

    let metadata = match documents
        .record_document(
            &id,
            &doc.title,
            &doc.source,
            &doc.category,
            doc.content.chars().count(),
        )
        .await
    {
        Ok(()) => BestEffort::Done,
        Err(e) => {
            warn!(%id, error = %e, "document indexed but metadata not recorded");
            BestEffort::Failed(e.to_string())
        }
    };

    info!(%id, metadata_recorded = metadata.is_done(), "document ingested");
    Ok(IngestOutcome { id, metadata })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use rhassistant_knowledge::IndexHit;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingIndex {
        pub fail: bool,
        pub upserts: Mutex<Vec<(String, BTreeMap<String, String>)>>,
    }

    #[async_trait]
    impl IndexGateway for RecordingIndex {
        async fn upsert(
            &self,
            id: &str,
            _text: &str,
            metadata: &BTreeMap<String, String>,
        ) -> Result<()> {
            if self.fail {
                return Err(AssistantError::Upstream("index unreachable".into()));
            }
            self.upserts
                .lock()
                .unwrap()
                .push((id.to_string(), metadata.clone()));
            Ok(())
        }

        async fn query(&self, _text: &str, _k: usize) -> Result<Vec<IndexHit>> {
            Ok(Vec::new())
        }
    }

    pub(crate) struct FailingDocuments;

    #[async_trait]
    impl DocumentStore for FailingDocuments {
        async fn record_document(
            &self,
            _id: &str,
            _title: &str,
            _source: &str,
            _category: &str,
            _content_len: usize,
        ) -> Result<()> {
            Err(AssistantError::Storage("database is locked".into()))
        }

        async fn count_documents(&self) -> Result<u64> {
            Ok(0)
        }
    }

    fn document() -> HrDocument {
        HrDocument {
            title: "Charte télétravail".into(),
            content: "Deux jours de télétravail par semaine.".into(),
            source: "charte.txt".into(),
            category: "organisation".into(),
        }
    }

    #[tokio::test]
    async fn metadata_failure_is_reported_not_fatal() {
        let index = RecordingIndex::default();
        let outcome = ingest(&index, &FailingDocuments, &document()).await.unwrap();
        assert!(matches!(outcome.metadata, BestEffort::Failed(ref e) if e.contains("locked")));

        let upserts = index.upserts.lock().unwrap();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].0, outcome.id);
        assert_eq!(upserts[0].1["category"], "organisation");
    }

    #[tokio::test]
    async fn index_failure_is_fatal() {
        let index = RecordingIndex {
            fail: true,
            ..RecordingIndex::default()
        };
        let err = ingest(&index, &FailingDocuments, &document()).await.unwrap_err();
        assert!(matches!(err, AssistantError::Upstream(_)));
    }

    #[tokio::test]
    async fn blank_documents_are_rejected() {
        let mut doc = document();
        doc.content = "  \n ".into();
        let err = ingest(&RecordingIndex::default(), &FailingDocuments, &doc)
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::Validation { .. }));
    }
}
