mod common;

use booksync_sync::{SchemaSnapshot, ValidationOptions, validate};
use booksync_types::{
    BookRecord, BookValue, BrokenReason, DestinationField, FieldId, FieldMapping, FieldType,
    KeyReport, KeyStatus, ValidationFailure,
};
use common::{dune_record, dune_schema};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn mapped(id: &str) -> KeyStatus {
    KeyStatus::Mapped {
        field_id: FieldId::new(id),
    }
}

fn broken(id: &str, reason: BrokenReason) -> KeyStatus {
    KeyStatus::BrokenReference {
        field_id: FieldId::new(id),
        reason,
    }
}

fn wide_schema() -> SchemaSnapshot {
    SchemaSnapshot::new(vec![
        DestinationField::new("fldT", "Title", FieldType::Text),
        DestinationField::new("fldP", "Pages", FieldType::Number),
        DestinationField::new("fldD", "Published", FieldType::DateTime),
        DestinationField::new("fldU", "Link", FieldType::Url),
        DestinationField::new("fldS", "Shelf", FieldType::SingleSelect),
        DestinationField::new("fldF", "Formula", FieldType::Formula),
        DestinationField::new("fldX", "Mystery", FieldType::Other(4242)),
    ])
}

// ── Scenario ────────────────────────────────────────────────────

#[test]
fn dune_scenario() {
    let record = dune_record();
    let snapshot = SchemaSnapshot::new(dune_schema());
    let mapping = FieldMapping::new().with("title", "fldA").with("author", "fldB");

    let report = validate(&record, &mapping, &snapshot, &ValidationOptions::default());

    assert_eq!(report.status("title"), Some(&mapped("fldA")));
    assert_eq!(
        report.status("author"),
        Some(&broken("fldB", BrokenReason::Unselectable))
    );
    assert_eq!(report.status("isbn"), Some(&KeyStatus::Unmapped));
    assert_eq!(report.mapped_count, 1);
    assert_eq!(report.total_count, 3);
    assert!(report.passed());
    assert_eq!(
        report.writable().collect::<Vec<_>>(),
        vec![("title", &FieldId::new("fldA"))]
    );
}

// ── Per-key status ──────────────────────────────────────────────

#[test]
fn field_missing_from_schema_is_broken_reference() {
    let record = BookRecord::new("Dune").unwrap().with("author", "Herbert");
    let mapping = FieldMapping::new().with("title", "fldT").with("author", "fldGone");

    let report = validate(&record, &mapping, &wide_schema(), &ValidationOptions::default());

    assert_eq!(
        report.status("author"),
        Some(&broken("fldGone", BrokenReason::MissingField))
    );
    assert_eq!(report.broken().collect::<Vec<_>>(), vec![("author", BrokenReason::MissingField)]);
    assert_eq!(report.mapped_count, 1);
}

#[test]
fn capability_mismatch_is_incompatible_value() {
    let record = BookRecord::new("Dune")
        .unwrap()
        .with("author", "Herbert")
        .with("pages", 412_i64)
        .with("url", BookValue::link("https://book.example/dune"));
    let mapping = FieldMapping::new()
        .with("title", "fldU")
        .with("author", "fldP")
        .with("pages", "fldT")
        .with("url", "fldT");

    let report = validate(&record, &mapping, &wide_schema(), &ValidationOptions::default());

    assert_eq!(
        report.status("title"),
        Some(&broken("fldU", BrokenReason::IncompatibleValue))
    );
    assert_eq!(
        report.status("author"),
        Some(&broken("fldP", BrokenReason::IncompatibleValue))
    );
    // Text fields take the text form of numbers and links.
    assert_eq!(report.status("pages"), Some(&mapped("fldT")));
    assert_eq!(report.status("url"), Some(&mapped("fldT")));
}

#[test]
fn system_and_unknown_types_are_unselectable() {
    let record = BookRecord::new("Dune").unwrap().with("author", "Herbert");
    let mapping = FieldMapping::new().with("title", "fldF").with("author", "fldX");

    let report = validate(&record, &mapping, &wide_schema(), &ValidationOptions::default());

    assert_eq!(
        report.status("title"),
        Some(&broken("fldF", BrokenReason::Unselectable))
    );
    assert_eq!(
        report.status("author"),
        Some(&broken("fldX", BrokenReason::Unselectable))
    );
    assert_eq!(report.failures, vec![ValidationFailure::NoMappings]);
}

#[test]
fn date_and_number_fields_accept_matching_values() {
    let date = chrono::NaiveDate::from_ymd_opt(1965, 8, 1).unwrap();
    let record = BookRecord::new("Dune")
        .unwrap()
        .with("publish_date", date)
        .with("pages", 412_i64)
        .with("binding", "平装");
    let mapping = FieldMapping::new()
        .with("publish_date", "fldD")
        .with("pages", "fldP")
        .with("binding", "fldS");

    let report = validate(&record, &mapping, &wide_schema(), &ValidationOptions::default());

    assert_eq!(report.mapped_count, 3);
    assert_eq!(report.total_count, 4);
    assert!(report.passed());
}

// ── Counting ────────────────────────────────────────────────────

#[test]
fn display_only_keys_are_ignored() {
    let record = BookRecord::new("Dune")
        .unwrap()
        .with("cover_image", BookValue::image("https://img.example/dune.jpg"));
    let mapping = FieldMapping::new().with("title", "fldT").with("cover_image", "fldT");

    let report = validate(&record, &mapping, &wide_schema(), &ValidationOptions::default());

    assert!(report.status("cover_image").is_none());
    assert_eq!(report.total_count, 1);
    assert_eq!(report.mapped_count, 1);
    assert!(report.passed(), "display-only entry does not count as a duplicate");
}

#[test]
fn custom_display_only_set() {
    let record = BookRecord::new("Dune").unwrap().with("score", 9.0);
    let options = ValidationOptions {
        display_only: ["score".to_string()].into_iter().collect(),
    };

    let report = validate(&record, &FieldMapping::new(), &wide_schema(), &options);
    assert_eq!(report.total_count, 1);
    assert!(report.status("score").is_none());
}

#[test]
fn mapping_keys_absent_from_record_are_reported_not_counted() {
    let record = BookRecord::new("Dune").unwrap();
    let mapping = FieldMapping::new()
        .with("title", "fldT")
        .with("translator", "fldT")
        .with("series", "fldGone");

    let report = validate(&record, &mapping, &wide_schema(), &ValidationOptions::default());

    assert_eq!(
        report.keys.get("translator"),
        Some(&KeyReport {
            status: mapped("fldT"),
            in_record: false
        })
    );
    assert_eq!(
        report.keys.get("series"),
        Some(&KeyReport {
            status: broken("fldGone", BrokenReason::MissingField),
            in_record: false
        })
    );
    assert_eq!(report.total_count, 1);
    assert_eq!(report.mapped_count, 1);
    assert!(report.passed());
    assert_eq!(report.writable().count(), 1);
}

// ── Failures ────────────────────────────────────────────────────

#[test]
fn empty_mapping_fails_with_no_mappings() {
    let report = validate(
        &dune_record(),
        &FieldMapping::new(),
        &SchemaSnapshot::new(dune_schema()),
        &ValidationOptions::default(),
    );

    assert!(!report.passed());
    assert_eq!(report.mapped_count, 0);
    assert_eq!(report.failures, vec![ValidationFailure::NoMappings]);
    assert_eq!(report.failures[0].code(), "no_mappings");
}

#[test]
fn empty_schema_breaks_every_mapping() {
    let mapping = FieldMapping::new().with("title", "fldA");
    let report = validate(
        &dune_record(),
        &mapping,
        &SchemaSnapshot::empty(),
        &ValidationOptions::default(),
    );

    assert_eq!(
        report.status("title"),
        Some(&broken("fldA", BrokenReason::MissingField))
    );
    assert_eq!(report.failures, vec![ValidationFailure::NoMappings]);
}

#[test]
fn duplicate_targets_fail() {
    let record = BookRecord::new("Dune")
        .unwrap()
        .with("author", "Herbert")
        .with("publisher", "Chilton");
    let mapping = FieldMapping::new()
        .with("title", "fldT")
        .with("author", "fldS")
        .with("publisher", "fldS");

    let report = validate(&record, &mapping, &wide_schema(), &ValidationOptions::default());

    assert_eq!(report.mapped_count, 3);
    assert_eq!(
        report.failures,
        vec![ValidationFailure::DuplicateDestinationTarget {
            field_id: FieldId::new("fldS"),
            keys: vec!["author".to_string(), "publisher".to_string()],
        }]
    );
    assert!(!report.passed());
}

// ── Properties ──────────────────────────────────────────────────

fn arb_record() -> impl Strategy<Value = BookRecord> {
    (
        "[A-Za-z ]{1,16}",
        prop::collection::btree_map("[a-z_]{1,10}", "[a-z0-9 ]{0,12}", 0..6),
    )
        .prop_map(|(title, extra)| {
            let mut record = BookRecord::new(title.trim().to_string() + "x").unwrap();
            for (k, v) in extra {
                if k != "title" {
                    record.insert(k, v);
                }
            }
            record
        })
}

fn arb_mapping() -> impl Strategy<Value = FieldMapping> {
    prop::collection::btree_map(
        "[a-z_]{1,10}",
        prop::sample::select(vec!["fldA", "fldB", "fldT", "fldP", "fldGone"]),
        0..6,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(k, v)| (k, FieldId::new(v)))
            .collect()
    })
}

proptest! {
    #[test]
    fn validate_is_deterministic_and_pure(record in arb_record(), mapping in arb_mapping()) {
        let mut fields = dune_schema();
        fields.extend(wide_schema().fields().iter().cloned());
        let snapshot = SchemaSnapshot::new(fields);
        let options = ValidationOptions::default();

        let record_before = record.clone();
        let mapping_before = mapping.clone();

        let first = validate(&record, &mapping, &snapshot, &options);
        let second = validate(&record, &mapping, &snapshot, &options);

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&record, &record_before);
        prop_assert_eq!(&mapping, &mapping_before);
    }

    #[test]
    fn passing_requires_a_mapped_key(record in arb_record(), mapping in arb_mapping()) {
        let snapshot = SchemaSnapshot::new(dune_schema());
        let report = validate(&record, &mapping, &snapshot, &ValidationOptions::default());

        if report.mapped_count == 0 {
            prop_assert!(report.failures.contains(&ValidationFailure::NoMappings));
        }
        prop_assert!(report.mapped_count <= report.total_count);
    }

    #[test]
    fn missing_ids_are_never_dropped(record in arb_record()) {
        let mapping = FieldMapping::new().with("title", "fldGone");
        let snapshot = SchemaSnapshot::new(dune_schema());
        let report = validate(&record, &mapping, &snapshot, &ValidationOptions::default());

        prop_assert_eq!(
            report.status("title"),
            Some(&KeyStatus::BrokenReference {
                field_id: FieldId::new("fldGone"),
                reason: BrokenReason::MissingField,
            })
        );
    }
}
