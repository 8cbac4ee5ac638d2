//! Shared fakes for the sync tests.

#![allow(dead_code)]

use async_trait::async_trait;
use booksync_sync::{
    BookLookup, CorrelationKey, DestinationError, DestinationResult, FieldWrite, LookupResult,
    RowWriter, SchemaSource, UpsertResponse,
};
use booksync_types::{
    BookRecord, DestinationField, FieldId, FieldType, Isbn, RowId, UpsertOperation,
};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The two-column table of the Dune scenario.
pub fn dune_schema() -> Vec<DestinationField> {
    vec![
        DestinationField::new("fldA", "Title", FieldType::Text),
        DestinationField::new("fldB", "Cover", FieldType::Attachment),
    ]
}

pub fn dune_record() -> BookRecord {
    BookRecord::new("Dune")
        .unwrap()
        .with("author", "Herbert")
        .with("isbn", "9780441013593")
}

/// Schema source returning a configurable result.
pub struct FakeSource {
    result: Mutex<DestinationResult<Vec<DestinationField>>>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(fields: Vec<DestinationField>) -> Self {
        Self {
            result: Mutex::new(Ok(fields)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, result: DestinationResult<Vec<DestinationField>>) {
        *self.result.lock().unwrap() = result;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaSource for FakeSource {
    async fn list_fields(&self) -> DestinationResult<Vec<DestinationField>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.lock().unwrap().clone()
    }
}

/// One recorded upsert.
#[derive(Debug, Clone)]
pub struct UpsertCall {
    pub correlation: Option<CorrelationKey>,
    pub fields: BTreeMap<FieldId, FieldWrite>,
}

/// Row writer that records calls and answers with a canned result.
pub struct FakeWriter {
    result: Mutex<DestinationResult<UpsertResponse>>,
    calls: Mutex<Vec<UpsertCall>>,
}

impl FakeWriter {
    pub fn succeeding(row_id: &str, operation: UpsertOperation) -> Self {
        Self::with_result(Ok(UpsertResponse {
            row_id: RowId::new(row_id),
            operation,
            rejected: BTreeMap::new(),
        }))
    }

    pub fn rejecting(row_id: &str, rejected: &[(&str, &str)]) -> Self {
        Self::with_result(Ok(UpsertResponse {
            row_id: RowId::new(row_id),
            operation: UpsertOperation::Created,
            rejected: rejected
                .iter()
                .map(|(id, reason)| (FieldId::new(*id), reason.to_string()))
                .collect(),
        }))
    }

    pub fn failing(err: DestinationError) -> Self {
        Self::with_result(Err(err))
    }

    fn with_result(result: DestinationResult<UpsertResponse>) -> Self {
        Self {
            result: Mutex::new(result),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<UpsertCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Field ids sent in the only recorded call.
    pub fn sent_ids(&self) -> Vec<String> {
        let calls = self.calls();
        assert_eq!(calls.len(), 1, "expected exactly one upsert");
        calls[0].fields.keys().map(|id| id.to_string()).collect()
    }
}

#[async_trait]
impl RowWriter for FakeWriter {
    async fn upsert(
        &self,
        correlation: Option<&CorrelationKey>,
        fields: &BTreeMap<FieldId, FieldWrite>,
    ) -> DestinationResult<UpsertResponse> {
        self.calls.lock().unwrap().push(UpsertCall {
            correlation: correlation.cloned(),
            fields: fields.clone(),
        });
        self.result.lock().unwrap().clone()
    }
}

/// Lookup answering every ISBN with the same result.
pub struct FakeLookup {
    result: LookupResult<BookRecord>,
    calls: AtomicUsize,
}

impl FakeLookup {
    pub fn new(result: LookupResult<BookRecord>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BookLookup for FakeLookup {
    async fn fetch_by_isbn(&self, _isbn: &Isbn) -> LookupResult<BookRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}
