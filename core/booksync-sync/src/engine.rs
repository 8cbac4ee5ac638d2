//! The sync engine: validate, convert, upsert, report.
//!
//! One call to [`SyncEngine::sync`] is one attempt. The engine re-validates
//! the mapping against the cached schema snapshot, writes only the keys
//! that came out `mapped`, and reports an outcome for every other key. It
//! never retries and holds no lock across the destination call.

use crate::destination::{CorrelationKey, DestinationError, FieldWrite, RowWriter};
use crate::schema_cache::{SchemaCache, SchemaSnapshot};
use crate::validator::{ValidationOptions, validate};
use booksync_types::{
    BookValue, DestinationField, FailureKind, FieldId, FieldOutcome, FieldType, KeyStatus,
    SkipReason, SyncFailure, SyncRequest, SyncResult, SyncStatus, ValidationReport,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Source key whose value identifies the destination row to update.
    pub correlation_key: String,
    pub validation: ValidationOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            correlation_key: "isbn".to_string(),
            validation: ValidationOptions::default(),
        }
    }
}

/// Phase of a single sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Validating,
    /// Validation failed; nothing was sent.
    Aborted,
    Writing,
    Succeeded,
    PartiallySucceeded,
    Failed,
}

/// Inputs that move a sync attempt between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    Start,
    ValidationFailed,
    ValidationPassed,
    WriteSucceeded,
    WritePartial,
    WriteFailed,
}

impl SyncPhase {
    /// Applies an event. Events that do not apply in the current phase leave
    /// it unchanged.
    #[must_use]
    pub fn advance(self, event: PhaseEvent) -> Self {
        match (self, event) {
            (Self::Idle, PhaseEvent::Start) => Self::Validating,
            (Self::Validating, PhaseEvent::ValidationFailed) => Self::Aborted,
            (Self::Validating, PhaseEvent::ValidationPassed) => Self::Writing,
            (Self::Writing, PhaseEvent::WriteSucceeded) => Self::Succeeded,
            (Self::Writing, PhaseEvent::WritePartial) => Self::PartiallySucceeded,
            (Self::Writing, PhaseEvent::WriteFailed) => Self::Failed,
            (phase, _) => phase,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Aborted | Self::Succeeded | Self::PartiallySucceeded | Self::Failed
        )
    }

    /// Result status for a terminal phase.
    #[must_use]
    pub fn status(self) -> Option<SyncStatus> {
        match self {
            Self::Succeeded => Some(SyncStatus::Succeeded),
            Self::PartiallySucceeded => Some(SyncStatus::PartiallySucceeded),
            Self::Aborted | Self::Failed => Some(SyncStatus::Failed),
            Self::Idle | Self::Validating | Self::Writing => None,
        }
    }
}

/// Converts a record value into the cell format of `field`.
///
/// Returns `None` if the field type has no representation for the value.
pub fn cell_value(field: &DestinationField, value: &BookValue) -> Option<Value> {
    match field.field_type {
        FieldType::Text | FieldType::SingleSelect => Some(Value::String(value.as_text())),
        FieldType::MultiSelect => Some(Value::Array(vec![Value::String(value.as_text())])),
        // Non-finite numbers become null and are rejected by the destination.
        FieldType::Number => value
            .as_number()
            .map(|n| serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)),
        FieldType::DateTime => match value {
            BookValue::Date(date) => date
                .and_hms_opt(0, 0, 0)
                .map(|dt| Value::from(dt.and_utc().timestamp_millis())),
            _ => None,
        },
        FieldType::Url => match value {
            BookValue::Link(url) => Some(serde_json::json!({ "link": url, "text": url })),
            _ => None,
        },
        _ => None,
    }
}

fn failure_kind(err: &DestinationError) -> FailureKind {
    match err {
        DestinationError::Auth(_) => FailureKind::Auth,
        DestinationError::Transport(_) => FailureKind::Transport,
        DestinationError::Api { .. } => FailureKind::Api,
        DestinationError::MalformedPayload(_) => FailureKind::MalformedPayload,
        DestinationError::NotConfigured(_) => FailureKind::NotConfigured,
    }
}

/// Runs sync attempts against a destination table.
pub struct SyncEngine {
    schema: Arc<SchemaCache>,
    writer: Arc<dyn RowWriter>,
    config: EngineConfig,
}

impl SyncEngine {
    pub fn new(schema: Arc<SchemaCache>, writer: Arc<dyn RowWriter>, config: EngineConfig) -> Self {
        Self {
            schema,
            writer,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validates `request.mapping` against the cached schema.
    pub async fn validate(&self, request: &SyncRequest) -> ValidationReport {
        let snapshot = self.schema.get().await;
        validate(
            &request.record,
            &request.mapping,
            &snapshot,
            &self.config.validation,
        )
    }

    /// Performs one sync attempt.
    pub async fn sync(&self, request: &SyncRequest) -> SyncResult {
        let mut phase = SyncPhase::Idle.advance(PhaseEvent::Start);
        let snapshot = self.schema.get().await;
        let report = validate(
            &request.record,
            &request.mapping,
            &snapshot,
            &self.config.validation,
        );

        let mut outcomes = BTreeMap::new();
        let mut included: Vec<(String, FieldId)> = Vec::new();
        for (key, entry) in report.keys.iter().filter(|(_, r)| r.in_record) {
            match &entry.status {
                KeyStatus::Mapped { field_id } => included.push((key.clone(), field_id.clone())),
                KeyStatus::Unmapped => {
                    outcomes.insert(
                        key.clone(),
                        FieldOutcome::Skipped {
                            reason: SkipReason::Unmapped,
                        },
                    );
                }
                KeyStatus::BrokenReference { field_id, reason } => {
                    warn!("Skipping {}: mapping to {} is broken ({})", key, field_id, reason);
                    outcomes.insert(
                        key.clone(),
                        FieldOutcome::Skipped {
                            reason: SkipReason::BrokenReference { reason: *reason },
                        },
                    );
                }
            }
        }

        if !report.passed() {
            phase = phase.advance(PhaseEvent::ValidationFailed);
            let reason = report
                .failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            info!("Sync aborted: {}", reason);
            for (key, _) in included {
                outcomes.insert(
                    key,
                    FieldOutcome::Skipped {
                        reason: SkipReason::ValidationFailed,
                    },
                );
            }
            return Self::finish(phase, outcomes, FailureKind::Validation, reason);
        }
        phase = phase.advance(PhaseEvent::ValidationPassed);

        let mut writes = BTreeMap::new();
        let mut written_keys = Vec::new();
        for (key, field_id) in included {
            let converted = snapshot.find(&field_id).and_then(|field| {
                let value = request.record.get(&key)?;
                cell_value(field, value).map(|value| FieldWrite {
                    field: field.clone(),
                    value,
                })
            });
            match converted {
                Some(write) => {
                    writes.insert(field_id.clone(), write);
                    written_keys.push((key, field_id));
                }
                None => {
                    outcomes.insert(
                        key,
                        FieldOutcome::Rejected {
                            field_id,
                            reason: "value cannot be converted for this field".to_string(),
                        },
                    );
                }
            }
        }

        if writes.is_empty() {
            phase = phase.advance(PhaseEvent::WriteFailed);
            return Self::finish(
                phase,
                outcomes,
                FailureKind::MalformedPayload,
                "no mapped value could be converted".to_string(),
            );
        }

        let correlation = self.correlation(&report, &snapshot, request);
        debug!(
            "Writing {} fields (correlated: {})",
            writes.len(),
            correlation.is_some()
        );

        match self.writer.upsert(correlation.as_ref(), &writes).await {
            Ok(response) => {
                for (key, field_id) in written_keys {
                    let outcome = match response.rejected.get(&field_id) {
                        Some(reason) => FieldOutcome::Rejected {
                            field_id,
                            reason: reason.clone(),
                        },
                        None => FieldOutcome::Written { field_id },
                    };
                    outcomes.insert(key, outcome);
                }

                let partial = outcomes
                    .values()
                    .any(|o| matches!(o, FieldOutcome::Rejected { .. }));
                phase = phase.advance(if partial {
                    PhaseEvent::WritePartial
                } else {
                    PhaseEvent::WriteSucceeded
                });
                if partial {
                    warn!("Row {} written with rejected fields", response.row_id);
                } else {
                    info!("Row {} written", response.row_id);
                }

                SyncResult {
                    status: phase.status().unwrap_or(SyncStatus::Failed),
                    per_field_outcomes: outcomes,
                    destination_row_id: Some(response.row_id),
                    operation: Some(response.operation),
                    failure: None,
                }
            }
            Err(e) => {
                phase = phase.advance(PhaseEvent::WriteFailed);
                warn!("Sync failed: {}", e);
                for (key, field_id) in written_keys {
                    outcomes.insert(key, FieldOutcome::NotWritten { field_id });
                }
                Self::finish(phase, outcomes, failure_kind(&e), e.to_string())
            }
        }
    }

    fn correlation(
        &self,
        report: &ValidationReport,
        snapshot: &SchemaSnapshot,
        request: &SyncRequest,
    ) -> Option<CorrelationKey> {
        let key = self.config.correlation_key.as_str();
        match report.keys.get(key) {
            Some(entry) if entry.in_record => match &entry.status {
                KeyStatus::Mapped { field_id } => Some(CorrelationKey {
                    field: snapshot.find(field_id)?.clone(),
                    value: request.record.get(key)?.as_text(),
                }),
                _ => None,
            },
            _ => None,
        }
    }

    fn finish(
        phase: SyncPhase,
        outcomes: BTreeMap<String, FieldOutcome>,
        kind: FailureKind,
        reason: String,
    ) -> SyncResult {
        debug!("Sync attempt ended in phase {:?}", phase);
        SyncResult {
            status: phase.status().unwrap_or(SyncStatus::Failed),
            per_field_outcomes: outcomes,
            destination_row_id: None,
            operation: None,
            failure: Some(SyncFailure { kind, reason }),
        }
    }
}
