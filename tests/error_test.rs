//! Tests for error types

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use trueno_eval::Error;

fn every_kind() -> Vec<Error> {
    vec![
        Error::ArtifactNotFound {
            path: PathBuf::from("models/rf.json"),
        },
        Error::ArtifactCorrupt {
            path: PathBuf::from("models/rf.json"),
            reason: "expected value at line 1".to_string(),
        },
        Error::DatasetUnavailable {
            dataset: "diabetes@1".to_string(),
            reason: "no such file".to_string(),
        },
        Error::MissingFeature {
            missing: vec!["bmi".to_string()],
        },
        Error::InsufficientData { rows: 1, required: 2 },
        Error::Inference("column plas is Utf8".to_string()),
        Error::RunAlreadyActive {
            run_id: "exp-1".to_string(),
        },
        Error::TrackingStoreUnavailable {
            location: "mlruns".to_string(),
            reason: "permission denied".to_string(),
        },
        Error::Timeout {
            operation: "dataset fetch".to_string(),
            after: Duration::from_secs(30),
        },
    ]
}

#[test]
fn test_artifact_not_found_error() {
    let error = Error::ArtifactNotFound {
        path: PathBuf::from("models/rf.json"),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("model artifact not found"));
    assert!(error_str.contains("models/rf.json"));
    assert_eq!(error.kind(), "ArtifactNotFoundError");
}

#[test]
fn test_missing_feature_error_lists_every_column() {
    let error = Error::MissingFeature {
        missing: vec!["bmi".to_string(), "age".to_string()],
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("bmi, age"));
}

#[test]
fn test_timeout_error() {
    let error = Error::Timeout {
        operation: "dataset fetch".to_string(),
        after: Duration::from_millis(1500),
    };
    assert_eq!(format!("{error}"), "dataset fetch timed out after 1500ms");
    assert!(error.is_transient());
}

#[test]
fn test_exit_codes_are_distinct_and_non_zero() {
    let codes: Vec<u8> = every_kind().iter().map(Error::exit_code).collect();
    assert!(codes.iter().all(|&code| code != 0));

    let unique: HashSet<u8> = codes.iter().copied().collect();
    assert_eq!(unique.len(), codes.len());
}

#[test]
fn test_kind_names() {
    let kinds: Vec<&str> = every_kind().iter().map(Error::kind).collect();
    assert_eq!(
        kinds,
        vec![
            "ArtifactNotFoundError",
            "ArtifactCorruptError",
            "DatasetUnavailableError",
            "MissingFeatureError",
            "InsufficientDataError",
            "InferenceError",
            "RunAlreadyActiveError",
            "TrackingStoreUnavailableError",
            "TimeoutError",
        ]
    );
}

#[test]
fn test_only_store_and_timeout_errors_are_transient() {
    let transient: Vec<&str> = every_kind()
        .iter()
        .filter(|e| e.is_transient())
        .map(Error::kind)
        .collect();
    assert_eq!(transient, vec!["TrackingStoreUnavailableError", "TimeoutError"]);
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error: Error = io_error.into();
    assert!(format!("{error}").contains("file not found"));
    assert_eq!(error.exit_code(), 1);
}
