//! Artifact loader
//!
//! Reconstructs the model, reference statistics, feature/label tables and the
//! fitted scaler from the paths in [`ArtifactsConfig`]. Every read or parse
//! failure, down to a single unparsable cell, is a
//! [`DashboardError::MissingArtifact`]; every disagreement with the model's
//! schema is a [`DashboardError::SchemaMismatch`].

use crate::config::ArtifactsConfig;
use crate::error::{DashboardError, Result};
use crate::feature_extractor::FeatureExtractor;
use crate::models::forest::ChurnModel;
use crate::models::scaler::FittedScaler;
use crate::models::xgboost::XgbModel;
use crate::types::customer::{CustomerRecord, YesNo, FEATURE_COLUMNS, ID_COLUMN, NUMERIC_COLUMNS};
use crate::types::table::{FeatureTable, LabelTable};
use csv::StringRecord;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};
use xxhash_rust::xxh3::Xxh3;

/// Column maxima of the reference dataset, used as upper form bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceStats {
    pub rows: usize,
    pub max_tenure: f64,
    pub max_monthly_charges: f64,
    pub max_total_charges: f64,
}

impl ReferenceStats {
    /// Maxima in [`NUMERIC_COLUMNS`] order.
    pub fn maxima(&self) -> [f64; 3] {
        [self.max_tenure, self.max_monthly_charges, self.max_total_charges]
    }
}

/// A complete, read-only artifact set.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub model: ChurnModel,
    pub reference: ReferenceStats,
    pub x_train: FeatureTable,
    pub x_test: FeatureTable,
    pub y_train: LabelTable,
    pub y_test: LabelTable,
    pub scaler: FittedScaler,
    /// xxh3 of every artifact's bytes, in load order.
    pub fingerprint: u64,
}

/// Loader for one artifact set
pub struct ArtifactLoader {
    paths: ArtifactsConfig,
    extractor: FeatureExtractor,
}

impl ArtifactLoader {
    pub fn new(paths: ArtifactsConfig) -> Self {
        Self {
            paths,
            extractor: FeatureExtractor::new(),
        }
    }

    /// Load every artifact. Deterministic: the same files give the same result.
    pub fn load(&self) -> Result<Artifacts> {
        let start = Instant::now();
        let mut hasher = Xxh3::new();
        let mut read = |path: &str| -> Result<Vec<u8>> {
            let bytes = read_artifact(path)?;
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(&bytes);
            Ok(bytes)
        };

        let model_bytes = read(&self.paths.model)?;
        let reference_bytes = read(&self.paths.reference)?;
        let x_train_bytes = read(&self.paths.x_train)?;
        let x_test_bytes = read(&self.paths.x_test)?;
        let y_train_bytes = read(&self.paths.y_train)?;
        let y_test_bytes = read(&self.paths.y_test)?;
        let scaler_bytes = read(&self.paths.scaler)?;

        let model = self.parse_model(&self.paths.model, &model_bytes)?;
        let reference = parse_reference(&self.paths.reference, &reference_bytes)?;
        let x_train = parse_feature_table("X_train", &self.paths.x_train, &x_train_bytes)?;
        let x_test = parse_feature_table("X_test", &self.paths.x_test, &x_test_bytes)?;
        let y_train = parse_label_table(&self.paths.y_train, &y_train_bytes)?;
        let y_test = parse_label_table(&self.paths.y_test, &y_test_bytes)?;
        y_train.ensure_aligned(&x_train, "y_train")?;
        y_test.ensure_aligned(&x_test, "y_test")?;
        let scaler = parse_scaler(&self.paths.scaler, &scaler_bytes)?;

        let fingerprint = hasher.digest();
        info!(
            model = %self.paths.model,
            booster = model.kind(),
            trees = model.num_trees(),
            train_rows = x_train.len(),
            test_rows = x_test.len(),
            reference_rows = reference.rows,
            fingerprint = format!("{:016x}", fingerprint),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Artifacts loaded"
        );

        Ok(Artifacts {
            model,
            reference,
            x_train,
            x_test,
            y_train,
            y_test,
            scaler,
            fingerprint,
        })
    }

    fn parse_model(&self, path: &str, bytes: &[u8]) -> Result<ChurnModel> {
        let xgb: XgbModel = serde_json::from_slice(bytes)
            .map_err(|e| DashboardError::missing(path, format!("malformed XGBoost JSON: {}", e)))?;
        let model = ChurnModel::from_xgboost(&xgb).map_err(|reason| DashboardError::missing(path, reason))?;
        self.extractor
            .verify_model_schema(model.feature_names(), model.num_features())?;
        debug!(
            path = %path,
            objective = %model.objective(),
            base_margin = model.base_margin(),
            "Model parsed"
        );
        Ok(model)
    }
}

fn read_artifact(path: &str) -> Result<Vec<u8>> {
    std::fs::read(Path::new(path)).map_err(|e| DashboardError::missing(path, e))
}

fn csv_reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(bytes)
}

fn headers(path: &str, reader: &mut csv::Reader<&[u8]>) -> Result<StringRecord> {
    reader
        .headers()
        .map(|h| h.clone())
        .map_err(|e| DashboardError::missing(path, format!("unreadable CSV header: {}", e)))
}

/// `customerID`, `Customer ID` and `CustomerID` all name the identifier column.
fn is_id_column(name: &str) -> bool {
    let squashed: String = name.chars().filter(|c| !c.is_whitespace() && *c != '_').collect();
    squashed.eq_ignore_ascii_case(ID_COLUMN)
}

fn parse_feature_table(name: &str, path: &str, bytes: &[u8]) -> Result<FeatureTable> {
    let mut reader = csv_reader(bytes);
    let found = headers(path, &mut reader)?;
    let found: Vec<&str> = found.iter().collect();

    let ok = found.len() == FEATURE_COLUMNS.len() + 1
        && is_id_column(found[0])
        && found[1..].iter().zip(FEATURE_COLUMNS).all(|(a, b)| *a == b);
    if !ok {
        return Err(DashboardError::schema(
            name,
            format!(
                "expected columns [{}, {}], found [{}]",
                ID_COLUMN,
                FEATURE_COLUMNS.join(", "),
                found.join(", ")
            ),
        ));
    }

    let mut canonical = StringRecord::new();
    canonical.push_field(ID_COLUMN);
    for column in FEATURE_COLUMNS {
        canonical.push_field(column);
    }
    reader.set_headers(canonical);

    let mut records = Vec::new();
    for (row, result) in reader.deserialize::<CustomerRecord>().enumerate() {
        let record = result
            .map_err(|e| DashboardError::missing(path, format!("row {}: {}", row + 1, e)))?;
        record
            .validate()
            .map_err(|e| DashboardError::missing(path, format!("row {}: {}", row + 1, e)))?;
        records.push(record);
    }
    debug!(table = name, rows = records.len(), "Feature table parsed");
    Ok(FeatureTable::new(name, records))
}

fn parse_label_table(path: &str, bytes: &[u8]) -> Result<LabelTable> {
    let mut reader = csv_reader(bytes);
    let found = headers(path, &mut reader)?;
    if found.len() != 1 {
        return Err(DashboardError::schema(
            path,
            format!("label table must have one column, found {}", found.len()),
        ));
    }
    let column = found.get(0).unwrap_or_default().to_string();

    let mut values = Vec::new();
    for (row, result) in reader.deserialize::<(YesNo,)>().enumerate() {
        let (label,) = result
            .map_err(|e| DashboardError::missing(path, format!("row {}: {}", row + 1, e)))?;
        values.push(label.binary());
    }
    Ok(LabelTable::new(column, values))
}

fn parse_reference(path: &str, bytes: &[u8]) -> Result<ReferenceStats> {
    let mut reader = csv_reader(bytes);
    let found = headers(path, &mut reader)?;
    let mut positions = [0usize; 3];
    for (slot, column) in positions.iter_mut().zip(NUMERIC_COLUMNS) {
        *slot = found.iter().position(|h| h == column).ok_or_else(|| {
            DashboardError::schema("reference", format!("column '{}' not found", column))
        })?;
    }

    let mut maxima = [f64::NEG_INFINITY; 3];
    let mut rows = 0;
    for result in reader.records() {
        let record = result.map_err(|e| DashboardError::missing(path, e))?;
        rows += 1;
        for (max, &pos) in maxima.iter_mut().zip(&positions) {
            // Blank or non-numeric cells (e.g. " " in Total Charges) are skipped.
            if let Some(v) = record.get(pos).and_then(|s| s.parse::<f64>().ok()) {
                if v.is_finite() && v > *max {
                    *max = v;
                }
            }
        }
    }

    if let Some(i) = maxima.iter().position(|m| !m.is_finite()) {
        return Err(DashboardError::schema(
            "reference",
            format!("no numeric values in '{}'", NUMERIC_COLUMNS[i]),
        ));
    }
    Ok(ReferenceStats {
        rows,
        max_tenure: maxima[0],
        max_monthly_charges: maxima[1],
        max_total_charges: maxima[2],
    })
}

fn parse_scaler(path: &str, bytes: &[u8]) -> Result<FittedScaler> {
    let scaler: FittedScaler = serde_json::from_slice(bytes)
        .map_err(|e| DashboardError::missing(path, format!("malformed scaler JSON: {}", e)))?;
    scaler.validate()?;
    Ok(scaler)
}
