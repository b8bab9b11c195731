//! End-to-end tests of the dashboard routes against the fixture artifact set

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use churn_dashboard::config::{AppConfig, ArtifactsConfig};
use churn_dashboard::dashboard::form::{FutureCustomerForm, FORM_FIELDS};
use churn_dashboard::metrics::DashboardMetrics;
use churn_dashboard::models::format_probability;
use churn_dashboard::models::loader::ArtifactLoader;
use churn_dashboard::server::{create_router, AppState};
use churn_dashboard::FeatureExtractor;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tower::ServiceExt;

fn fixture_config() -> AppConfig {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let path = |name: &str| dir.join(name).to_string_lossy().into_owned();
    AppConfig {
        artifacts: ArtifactsConfig {
            model: path("model.json"),
            reference: path("reference.csv"),
            x_train: path("X_train.csv"),
            x_test: path("X_test.csv"),
            y_train: path("y_train.csv"),
            y_test: path("y_test.csv"),
            scaler: path("scaler.json"),
        },
        ..AppConfig::default()
    }
}

fn app() -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(fixture_config(), Arc::new(DashboardMetrics::new())));
    (create_router(Arc::clone(&state)), state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn post_form(app: Router, fields: &[(&str, String)]) -> (StatusCode, String) {
    let body = fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, url_encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn url_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' => (b as char).to_string(),
            b' ' => "+".to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}

fn default_fields() -> Vec<(&'static str, String)> {
    let form = FutureCustomerForm::defaults();
    let mut fields: Vec<(&str, String)> = FORM_FIELDS
        .iter()
        .map(|f| (f.name, form.value(f.name).unwrap_or_default().to_string()))
        .collect();
    fields.push(("confirm", "1".to_string()));
    fields
}

/// The percentage following `marker`, e.g. `57.44` out of `Churn Probability: <span ...>57.44%`.
fn percentage_after(html: &str, marker: &str) -> Option<f64> {
    let rest = &html[html.find(marker)? + marker.len()..];
    let rest = &rest[rest.find('>')? + 1..];
    let end = rest.find('%')?;
    let number = &rest[..end];
    let (_, decimals) = number.split_once('.')?;
    if decimals.len() != 2 {
        return None;
    }
    number.parse().ok()
}

#[tokio::test]
async fn test_feature_importance_is_default_view() {
    let (app, state) = app();
    let (status, html) = get(app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("<h1>Telco Customer Churn Project</h1>"));
    assert!(html.contains("Feature Importance"));
    assert_eq!(html.matches(r#"class="bar""#).count(), 19);
    assert!(html.contains(r#"value="feature-importance" checked"#));
    assert_eq!(state.metrics.renders.load(Ordering::Relaxed), 1);
    // Explanations were computed on demand, without a warm-up.
    assert!(state.metrics.get_explanation_time().is_some());
}

#[tokio::test]
async fn test_customer_view_shows_model_probability() {
    let artifacts = ArtifactLoader::new(fixture_config().artifacts).load().unwrap();
    let record = &artifacts.x_test.records()[1];
    let [_, p1] = artifacts
        .model
        .predict_proba(&FeatureExtractor::new().extract(record));

    let (app, _) = app();
    let uri = format!("/?mode=customer&customer_id={}", record.customer_id);
    let (status, html) = get(app, &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Prediction for the Customer Churn Probability :"));
    assert!(html.contains(&format_probability(p1)));
    assert!(html.contains(r#"<span class="actual">1</span>"#));
    assert!(html.contains(&format!(r#"<option value="{0}" selected>"#, record.customer_id)));
    assert!(html.contains("Decision plot"));
    assert!(html.contains(r#"class="step""#));
}

#[tokio::test]
async fn test_customer_view_defaults_to_first_customer() {
    let (app, _) = app();
    let (status, html) = get(app, "/?mode=customer").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Customer 9305-CDSKC:"));
}

#[tokio::test]
async fn test_unknown_customer_is_not_found() {
    let (app, state) = app();
    let (status, html) = get(app, "/?mode=customer&customer_id=0000-NOPE").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(html.contains("unknown_customer"));
    assert_eq!(state.metrics.get_failures_by_kind().get("unknown_customer"), Some(&1));
}

#[tokio::test]
async fn test_unknown_mode_is_rejected() {
    let (app, _) = app();
    let (status, _) = get(app, "/?mode=everything").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_future_form_is_not_scored_until_confirmed() {
    let (app, state) = app();
    let (status, html) = get(app, "/?mode=future").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(html.matches("<select").count(), 16);
    assert!(html.contains(r#"name="tenure_months" min="0" max="72""#));
    assert!(!html.contains("Churn Probability:"));
    assert_eq!(state.metrics.predictions.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_confirmed_minimum_customer() {
    let (app, state) = app();
    let (status, html) = post_form(app, &default_fields()).await;

    assert_eq!(status, StatusCode::OK);
    let probability = percentage_after(&html, "Churn Probability:").unwrap();
    assert!((0.0..=100.0).contains(&probability));
    // Tenure 0 and no internet service: 0.4 - 0.1 on a zero margin.
    assert!(html.contains("57.44%"));
    // The encoded record carries the placeholder identifier and 0/1 flags.
    assert!(html.contains("<tr><td>CustomerID</td><td>6464-UIAEA</td></tr>"));
    assert!(html.contains("<tr><td>Partner</td><td>0</td></tr>"));
    assert_eq!(state.metrics.predictions.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_out_of_bounds_form_is_rejected() {
    let (app, _) = app();
    let mut fields = default_fields();
    for (name, value) in fields.iter_mut() {
        if *name == "monthly_charges" {
            *value = "118.76".to_string();
        }
    }
    let (status, html) = post_form(app, &fields).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(html.contains("invalid_input"));
}

#[tokio::test]
async fn test_missing_artifacts_fail_every_view() {
    let mut config = fixture_config();
    config.artifacts.scaler = "/nonexistent/scaler.json".to_string();
    let app = create_router(Arc::new(AppState::new(config, Arc::new(DashboardMetrics::new()))));

    for uri in ["/", "/?mode=customer", "/?mode=future"] {
        let (status, html) = get(app.clone(), uri).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(html.contains("missing_artifact"));
    }
}

#[tokio::test]
async fn test_health_reports_session_state() {
    let (app, state) = app();
    let (status, body) = get(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["session_loaded"], false);
    assert_eq!(json["status"], "degraded");

    state.warm_up().unwrap();
    let (_, body) = get(app, "/health").await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_cold_requests_share_one_session() {
    let (app, state) = app();
    let requests = (0..4).map(|i| {
        let app = app.clone();
        let uri = if i % 2 == 0 { "/" } else { "/?mode=customer" };
        tokio::spawn(async move { get(app, uri).await })
    });
    for handle in requests.collect::<Vec<_>>() {
        let (status, _) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }
    assert!(state.cache.is_loaded());
    assert_eq!(state.metrics.renders.load(Ordering::Relaxed), 4);
}
