//! Unit tests for report serialization.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use tidemark::report::{DatasetEntry, FlagsReport, ReduceReport, StatusReport, flag_counts};
use tidemark_core::{DataSet, DatasetId, Flag, InstrumentId};

#[test]
fn test_flag_counts_by_text() {
    let counts = flag_counts([Flag::Good, Flag::Bad, Flag::Good]);
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[Flag::Good.text()], 2);
    assert_eq!(counts[Flag::Bad.text()], 1);
}

#[test]
fn test_failed_report_serializes_error() {
    let dataset = DataSet::new(DatasetId(4), InstrumentId(1), "Leg 4");
    let report = ReduceReport::failed(&dataset, "Unrecognised mode 'x'");
    assert!(report.is_failed());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["dataset"], 4);
    assert_eq!(json["name"], "Leg 4");
    assert_eq!(json["error"], "Unrecognised mode 'x'");
    assert_eq!(json["measurements"], 0);
}

#[test]
fn test_successful_report_omits_error() {
    let report = ReduceReport {
        dataset: 1,
        name: "Leg 1".to_string(),
        measurements: 10,
        values: 20,
        ..ReduceReport::default()
    };
    let json = serde_json::to_string(&report).unwrap();
    assert!(!json.contains("error"));

    let back: ReduceReport = serde_json::from_str(&json).unwrap();
    assert!(!back.is_failed());
    assert_eq!(back.values, 20);
}

#[test]
fn test_status_report_lists_datasets() {
    let datasets = [
        DataSet::new(DatasetId(1), InstrumentId(7), "Leg 1"),
        DataSet::new(DatasetId(2), InstrumentId(7), "Leg 2"),
    ];
    let report = StatusReport {
        database: "tidemark.db".to_string(),
        sensor_values: 12,
        datasets: datasets.iter().map(DatasetEntry::from).collect(),
    };

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["sensor_values"], 12);
    assert_eq!(json["datasets"][1]["name"], "Leg 2");
    assert_eq!(json["datasets"][1]["instrument"], 7);
}

#[test]
fn test_flags_report_nests_by_sensor_type() {
    let report = FlagsReport {
        dataset: 3,
        sensor_types: [("xCO2".to_string(), flag_counts([Flag::Flushing]))]
            .into_iter()
            .collect(),
    };
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["sensor_types"]["xCO2"][Flag::Flushing.text()], 1);
}
