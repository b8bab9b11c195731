//! Artifact loading, explanation and scoring against the fixture artifact set

use approx::assert_abs_diff_eq;
use churn_dashboard::config::{AppConfig, ArtifactsConfig, ExplanationConfig};
use churn_dashboard::explain::{self, ImportanceAggregator, TreeExplainer};
use churn_dashboard::models::loader::ArtifactLoader;
use churn_dashboard::types::customer::FEATURE_COLUMNS;
use churn_dashboard::{DashboardError, FeatureExtractor, InferenceEngine, SessionCache};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture_paths() -> ArtifactsConfig {
    let dir = fixtures();
    let path = |name: &str| dir.join(name).to_string_lossy().into_owned();
    ArtifactsConfig {
        model: path("model.json"),
        reference: path("reference.csv"),
        x_train: path("X_train.csv"),
        x_test: path("X_test.csv"),
        y_train: path("y_train.csv"),
        y_test: path("y_test.csv"),
        scaler: path("scaler.json"),
    }
}

#[test]
fn test_load_fixture_artifacts() {
    let artifacts = ArtifactLoader::new(fixture_paths()).load().unwrap();

    assert_eq!(artifacts.model.kind(), "tree_ensemble");
    assert_eq!(artifacts.model.num_trees(), 2);
    assert_eq!(artifacts.model.num_features(), FEATURE_COLUMNS.len());
    assert_eq!(artifacts.x_train.len(), 8);
    assert_eq!(artifacts.x_test.len(), 5);
    assert_eq!(artifacts.y_train.len(), artifacts.x_train.len());
    assert_eq!(artifacts.y_test.values(), &[1, 1, 1, 0, 0]);
    assert_eq!(artifacts.x_test.ids()[0], "9305-CDSKC");

    // One blank Total Charges cell in the reference set is skipped.
    assert_eq!(artifacts.reference.rows, 15);
    assert_eq!(artifacts.reference.maxima(), [72.0, 118.75, 8684.8]);
}

#[test]
fn test_load_is_deterministic() {
    let a = ArtifactLoader::new(fixture_paths()).load().unwrap();
    let b = ArtifactLoader::new(fixture_paths()).load().unwrap();
    assert_eq!(a.fingerprint, b.fingerprint);
    assert_eq!(a.x_test.records(), b.x_test.records());
}

#[test]
fn test_missing_artifact() {
    let mut paths = fixture_paths();
    paths.y_test = fixtures().join("nope.csv").to_string_lossy().into_owned();
    let err = ArtifactLoader::new(paths).load().unwrap_err();
    match err {
        DashboardError::MissingArtifact { path, .. } => assert!(path.ends_with("nope.csv")),
        other => panic!("expected MissingArtifact, got {:?}", other),
    }
}

#[test]
fn test_schema_mismatch_on_misaligned_labels() {
    let mut labels = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(labels, "Churn Value\n1\n0").unwrap();

    let mut paths = fixture_paths();
    paths.y_test = labels.path().to_string_lossy().into_owned();
    let err = ArtifactLoader::new(paths).load().unwrap_err();
    assert!(matches!(err, DashboardError::SchemaMismatch { .. }));
}

#[test]
fn test_schema_mismatch_on_missing_column() {
    let header: Vec<&str> = FEATURE_COLUMNS.iter().copied().filter(|c| *c != "Contract").collect();
    let mut table = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(table, "CustomerID,{}", header.join(",")).unwrap();

    let mut paths = fixture_paths();
    paths.x_train = table.path().to_string_lossy().into_owned();
    let err = ArtifactLoader::new(paths).load().unwrap_err();
    assert!(matches!(err, DashboardError::SchemaMismatch { .. }));
}

#[test]
fn test_explanations_add_up() {
    let artifacts = ArtifactLoader::new(fixture_paths()).load().unwrap();
    let extractor = FeatureExtractor::new();
    let explanations = explain::explain(
        &artifacts.model,
        &extractor,
        &artifacts.x_train,
        &artifacts.x_test,
        &ExplanationConfig::default(),
    )
    .unwrap();

    // Cover-weighted means: 0.015 for the first tree, 0.05 for the second, on a zero margin.
    assert_abs_diff_eq!(explanations.baseline, 0.065, epsilon = 1e-9);
    assert_eq!(explanations.train.n_features(), FEATURE_COLUMNS.len());

    for (table, values) in [
        (&artifacts.x_train, &explanations.train),
        (&artifacts.x_test, &explanations.test),
    ] {
        for (i, record) in table.records().iter().enumerate() {
            let raw = artifacts.model.predict_raw(&extractor.extract(record));
            assert_abs_diff_eq!(values.reconstructed(i), raw, epsilon = 1e-9);
        }
    }

    // Only Tenure Months, Internet Service, Contract and Monthly Charges are ever split on.
    let ranked = ImportanceAggregator::new(artifacts.model.feature_names().to_vec())
        .rank(&explanations.train);
    assert_eq!(ranked.len(), FEATURE_COLUMNS.len());
    let used: Vec<&str> = ranked
        .iter()
        .filter(|r| r.value > 0.0)
        .map(|r| r.feature.as_str())
        .collect();
    assert!(used.len() <= 4);
    for feature in used {
        assert!(["Tenure Months", "Internet Service", "Contract", "Monthly Charges"].contains(&feature));
    }
    assert!(ranked.windows(2).all(|w| w[0].value >= w[1].value));
}

#[test]
fn test_explanations_are_deterministic() {
    let artifacts = ArtifactLoader::new(fixture_paths()).load().unwrap();
    let rows = FeatureExtractor::new().extract_table(&artifacts.x_test);
    let explainer = TreeExplainer::new(&artifacts.model).unwrap();
    let first = explainer.shap_values(&rows);
    let second = explainer.shap_values(&rows);
    for i in 0..first.n_rows() {
        assert_eq!(first.row(i), second.row(i));
    }
}

#[test]
fn test_predictions_match_model() {
    let artifacts = ArtifactLoader::new(fixture_paths()).load().unwrap();
    let extractor = FeatureExtractor::new();
    let engine = InferenceEngine::new(&artifacts.model, &artifacts.scaler, &extractor);

    for (i, record) in artifacts.x_test.records().iter().enumerate() {
        let prediction = engine.predict_row(&artifacts.x_test, i).unwrap();
        let row = extractor.extract(record);
        let [p0, p1] = artifacts.model.predict_proba(&row);
        assert_abs_diff_eq!(p0 + p1, 1.0, epsilon = 1e-12);
        assert_eq!(prediction.probability, p1);
        assert_eq!(prediction.label, artifacts.model.predict_label(&row));
    }
    assert!(engine.predict_row(&artifacts.x_test, 99).is_none());
}

#[test]
fn test_session_cache_reuses_sessions() {
    let cache = SessionCache::new();
    let paths = fixture_paths();
    assert!(!cache.is_loaded());

    let first = cache.session(&paths).unwrap();
    let again = cache.session(&paths).unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    let config = ExplanationConfig::default();
    let e1 = cache.explanations(&first, &config).unwrap();
    let e2 = cache.explanations(&again, &config).unwrap();
    assert!(Arc::ptr_eq(&e1, &e2));

    // A different artifact set is a different session with a different fingerprint.
    let mut linear = paths.clone();
    linear.model = fixtures().join("linear_model.json").to_string_lossy().into_owned();
    let other = cache.session(&linear).unwrap();
    assert!(!Arc::ptr_eq(&first, &other));
    assert_ne!(first.artifacts.fingerprint, other.artifacts.fingerprint);

    cache.clear();
    assert!(!cache.is_loaded());
}

#[test]
fn test_failed_load_is_not_cached() {
    let cache = SessionCache::new();
    let mut paths = fixture_paths();
    paths.scaler = fixtures().join("missing_scaler.json").to_string_lossy().into_owned();
    assert!(cache.session(&paths).is_err());
    assert!(!cache.is_loaded());
}

#[test]
fn test_linear_model_scores_but_cannot_be_explained() {
    let mut paths = fixture_paths();
    paths.model = fixtures().join("linear_model.json").to_string_lossy().into_owned();
    let config = AppConfig {
        artifacts: paths,
        ..AppConfig::default()
    };

    let cache = SessionCache::new();
    let session = cache.session(&config.artifacts).unwrap();
    assert_eq!(session.artifacts.model.kind(), "linear");

    let err = cache.explanations(&session, &config.explanation).unwrap_err();
    assert!(matches!(err, DashboardError::Explanation(_)));

    let artifacts = &session.artifacts;
    let engine = InferenceEngine::new(&artifacts.model, &artifacts.scaler, cache.extractor());
    let prediction = engine.predict_row(&artifacts.x_test, 0).unwrap();
    assert!(prediction.probability > 0.0 && prediction.probability < 1.0);
}

#[test]
fn test_split_on_unknown_feature_is_malformed_model() {
    let mut model: serde_json::Value =
        serde_json::from_slice(&std::fs::read(fixtures().join("model.json")).unwrap()).unwrap();
    model["learner"]["gradient_booster"]["model"]["trees"][0]["split_indices"][0] =
        serde_json::json!(40);
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(model.to_string().as_bytes()).unwrap();

    let mut paths = fixture_paths();
    paths.model = file.path().to_string_lossy().into_owned();
    let err = ArtifactLoader::new(paths).load().unwrap_err();
    match err {
        DashboardError::MissingArtifact { reason, .. } => assert!(reason.contains("feature 40"), "{}", reason),
        other => panic!("expected MissingArtifact, got {:?}", other),
    }
}

#[test]
fn test_unparsable_label_is_malformed_artifact() {
    let mut labels = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(labels, "Churn Value\n1\n1\nmaybe\n0\n0").unwrap();

    let mut paths = fixture_paths();
    paths.y_test = labels.path().to_string_lossy().into_owned();
    let err = ArtifactLoader::new(paths).load().unwrap_err();
    assert_eq!(err.kind(), "missing_artifact");
}
