//! Demo Artifact Generator
//!
//! Writes a synthetic but internally consistent artifact set (reference
//! dataset, train/test tables, labels, fitted scaler and an XGBoost JSON
//! model) so the dashboard can be run without a training pipeline.

use anyhow::Context;
use churn_dashboard::models::{FittedScaler, ScalerType};
use churn_dashboard::types::customer::{
    Contract, CustomerRecord, Gender, InternetService, PaymentMethod, YesNo, FEATURE_COLUMNS,
    NUMERIC_COLUMNS,
};
use churn_dashboard::FeatureExtractor;
use rand::Rng;
use serde_json::json;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// A customer before scaling, with its churn label.
struct Customer {
    record: CustomerRecord,
    churned: bool,
}

/// Customer generator
struct CustomerGenerator {
    rng: rand::rngs::ThreadRng,
    customer_counter: u64,
}

impl CustomerGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            customer_counter: 0,
        }
    }

    fn next_id(&mut self) -> String {
        self.customer_counter += 1;
        let letters: String = (0..5)
            .map(|_| (b'A' + self.rng.gen_range(0..26)) as char)
            .collect();
        format!("{:04}-{}", self.customer_counter % 10_000, letters)
    }

    fn yes_no(&mut self, p_yes: f64) -> YesNo {
        if self.rng.gen_bool(p_yes) {
            YesNo::Yes
        } else {
            YesNo::No
        }
    }

    fn pick<T: Copy>(&mut self, choices: &[T]) -> T {
        choices[self.rng.gen_range(0..choices.len())]
    }

    /// Long-tenure customer on a contract
    fn generate_loyal(&mut self) -> Customer {
        let tenure = self.rng.gen_range(12..=72) as f64;
        let internet = self.pick(&[InternetService::No, InternetService::Dsl, InternetService::FiberOptic]);
        self.generate(tenure, internet, false, |g| {
            g.pick(&[Contract::OneYear, Contract::TwoYear, Contract::MonthToMonth])
        })
    }

    /// Short-tenure, month-to-month, often fiber and electronic check
    fn generate_churner(&mut self) -> Customer {
        let tenure = self.rng.gen_range(1..=24) as f64;
        let internet = self.pick(&[InternetService::FiberOptic, InternetService::FiberOptic, InternetService::Dsl]);
        self.generate(tenure, internet, true, |_| Contract::MonthToMonth)
    }

    fn generate(
        &mut self,
        tenure: f64,
        internet: InternetService,
        churned: bool,
        contract: impl Fn(&mut Self) -> Contract,
    ) -> Customer {
        let has_internet = internet != InternetService::No;
        let addon = |g: &mut Self, p: f64| if has_internet { g.yes_no(p) } else { YesNo::No };
        let addon_p = if churned { 0.2 } else { 0.5 };

        let phone_service = self.yes_no(0.9);
        let base_charge = match internet {
            InternetService::No => 20.0,
            InternetService::Dsl => 45.0,
            InternetService::FiberOptic => 75.0,
        };
        let monthly: f64 = (base_charge + self.rng.gen_range(0.0..40.0_f64)).min(118.75);
        let monthly = (monthly * 100.0).round() / 100.0;
        let total = ((monthly * tenure * self.rng.gen_range(0.9..1.05)) * 100.0).round() / 100.0;

        let record = CustomerRecord {
            customer_id: self.next_id(),
            gender: self.pick(&[Gender::Female, Gender::Male]),
            senior_citizen: self.yes_no(if churned { 0.25 } else { 0.12 }),
            partner: self.yes_no(if churned { 0.35 } else { 0.55 }),
            dependents: self.yes_no(if churned { 0.15 } else { 0.35 }),
            tenure_months: tenure,
            phone_service,
            multiple_lines: if phone_service == YesNo::Yes { self.yes_no(0.45) } else { YesNo::No },
            internet_service: internet,
            online_security: addon(self, addon_p),
            online_backup: addon(self, addon_p),
            device_protection: addon(self, addon_p),
            tech_support: addon(self, addon_p),
            streaming_tv: addon(self, 0.45),
            streaming_movies: addon(self, 0.45),
            contract: contract(self),
            paperless_billing: self.yes_no(if churned { 0.75 } else { 0.55 }),
            payment_method: if churned && self.rng.gen_bool(0.6) {
                PaymentMethod::ElectronicCheck
            } else {
                self.pick(&[
                    PaymentMethod::ElectronicCheck,
                    PaymentMethod::MailedCheck,
                    PaymentMethod::BankTransfer,
                    PaymentMethod::CreditCard,
                ])
            },
            monthly_charges: monthly,
            total_charges: total,
        };
        Customer { record, churned }
    }
}

/// Fit a standard scaler over the numeric columns.
fn fit_scaler(customers: &[Customer]) -> FittedScaler {
    let n = customers.len().max(1) as f64;
    let mut center = Vec::with_capacity(NUMERIC_COLUMNS.len());
    let mut scale = Vec::with_capacity(NUMERIC_COLUMNS.len());
    for idx in 0..NUMERIC_COLUMNS.len() {
        let values: Vec<f64> = customers.iter().map(|c| c.record.numeric_values()[idx]).collect();
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        center.push(mean);
        scale.push(if var > 0.0 { var.sqrt() } else { 1.0 });
    }
    FittedScaler {
        scaler_type: ScalerType::Standard,
        columns: NUMERIC_COLUMNS.iter().map(|s| s.to_string()).collect(),
        center,
        scale,
        feature_range: [0.0, 1.0],
    }
}

/// Hand-shaped regression tree, thresholds on model-ready (scaled) features.
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf(f64),
}

fn split(feature: &str, threshold: f64, left: Node, right: Node) -> Node {
    Node::Split {
        feature: FEATURE_COLUMNS.iter().position(|c| *c == feature).unwrap_or(0),
        threshold,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// XGBoost node arrays for one tree, in pre-order.
#[derive(Default)]
struct FlatTree {
    left: Vec<i32>,
    right: Vec<i32>,
    feature: Vec<i32>,
    condition: Vec<f32>,
    parent: Vec<i32>,
    hessian: Vec<f64>,
}

impl FlatTree {
    fn flatten(node: &Node, rows: &[Vec<f64>]) -> Self {
        let mut flat = FlatTree::default();
        let all: Vec<&Vec<f64>> = rows.iter().collect();
        flat.push(node, &all, i32::MAX);
        flat
    }

    /// Returns the node id and its cover (row count plus one per leaf).
    fn push(&mut self, node: &Node, rows: &[&Vec<f64>], parent: i32) -> (i32, f64) {
        let id = self.left.len() as i32;
        self.left.push(-1);
        self.right.push(-1);
        self.feature.push(0);
        self.condition.push(0.0);
        self.parent.push(parent);
        self.hessian.push(0.0);

        let idx = id as usize;
        let cover = match node {
            Node::Leaf(value) => {
                self.condition[idx] = *value as f32;
                rows.len() as f64 + 1.0
            }
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                let threshold = *threshold as f32;
                let (go_left, go_right): (Vec<&Vec<f64>>, Vec<&Vec<f64>>) =
                    rows.iter().copied().partition(|r| (r[*feature] as f32) < threshold);
                let (l, l_cover) = self.push(left, &go_left, id);
                let (r, r_cover) = self.push(right, &go_right, id);
                self.left[idx] = l;
                self.right[idx] = r;
                self.feature[idx] = *feature as i32;
                self.condition[idx] = threshold;
                l_cover + r_cover
            }
        };
        self.hessian[idx] = cover;
        (id, cover)
    }

    fn to_json(&self, id: usize) -> serde_json::Value {
        let n = self.left.len();
        let leaf_weights: Vec<f32> = (0..n)
            .map(|i| if self.left[i] == -1 { self.condition[i] } else { 0.0 })
            .collect();
        json!({
            "base_weights": leaf_weights,
            "categories": [],
            "categories_nodes": [],
            "categories_segments": [],
            "categories_sizes": [],
            "default_left": self.left.iter().map(|&l| i32::from(l != -1)).collect::<Vec<_>>(),
            "id": id,
            "left_children": self.left,
            "loss_changes": vec![0.0; n],
            "parents": self.parent,
            "right_children": self.right,
            "split_conditions": self.condition,
            "split_indices": self.feature,
            "split_type": vec![0; n],
            "sum_hessian": self.hessian,
            "tree_param": {
                "num_deleted": "0",
                "num_feature": FEATURE_COLUMNS.len().to_string(),
                "num_nodes": n.to_string(),
                "size_leaf_vector": "1"
            }
        })
    }
}

fn demo_trees(scaler: &FittedScaler) -> Vec<Node> {
    let tenure = |months: f64| scaler.scale_value(0, months);
    let monthly = |charges: f64| scaler.scale_value(1, charges);
    let total = |charges: f64| scaler.scale_value(2, charges);

    vec![
        split(
            "Contract",
            0.5,
            split("Tenure Months", tenure(12.0), Node::Leaf(0.8), Node::Leaf(0.2)),
            Node::Leaf(-0.9),
        ),
        split(
            "Internet Service",
            1.5,
            Node::Leaf(-0.3),
            split("Tech Support", 0.5, Node::Leaf(0.5), Node::Leaf(0.0)),
        ),
        split(
            "Payment Method",
            0.5,
            Node::Leaf(0.35),
            split("Monthly Charges", monthly(70.0), Node::Leaf(-0.25), Node::Leaf(0.05)),
        ),
        split(
            "Total Charges",
            total(1000.0),
            split("Online Security", 0.5, Node::Leaf(0.3), Node::Leaf(-0.1)),
            Node::Leaf(-0.35),
        ),
    ]
}

fn model_json(trees: &[FlatTree], base_score: f64) -> serde_json::Value {
    let tree_json: Vec<_> = trees.iter().enumerate().map(|(i, t)| t.to_json(i)).collect();
    let indptr: Vec<usize> = (0..=trees.len()).collect();
    json!({
        "version": [2, 0, 3],
        "learner": {
            "attributes": {},
            "feature_names": FEATURE_COLUMNS,
            "feature_types": FEATURE_COLUMNS
                .iter()
                .map(|c| if NUMERIC_COLUMNS.contains(c) { "float" } else { "int" })
                .collect::<Vec<_>>(),
            "gradient_booster": {
                "name": "gbtree",
                "model": {
                    "gbtree_model_param": {
                        "num_parallel_tree": "1",
                        "num_trees": trees.len().to_string()
                    },
                    "iteration_indptr": indptr,
                    "tree_info": vec![0; trees.len()],
                    "trees": tree_json
                }
            },
            "learner_model_param": {
                "base_score": format!("{:E}", base_score),
                "boost_from_average": "1",
                "num_class": "0",
                "num_feature": FEATURE_COLUMNS.len().to_string(),
                "num_target": "1"
            },
            "objective": {
                "name": "binary:logistic",
                "reg_loss_param": { "scale_pos_weight": "1" }
            }
        }
    })
}

fn write_table(path: &Path, records: &[CustomerRecord]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_labels(path: &Path, customers: &[&Customer]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["Churn Value"])?;
    for c in customers {
        writer.write_record([if c.churned { "1" } else { "0" }])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_reference(path: &Path, customers: &[Customer]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["CustomerID", "Gender", "Tenure Months", "Monthly Charges", "Total Charges", "Churn Value"])?;
    for c in customers {
        let r = &c.record;
        // New customers have no billing history yet.
        let total = if r.tenure_months == 0.0 { " ".to_string() } else { r.total_charges.to_string() };
        writer.write_record([
            r.customer_id.clone(),
            r.gender.to_string(),
            r.tenure_months.to_string(),
            r.monthly_charges.to_string(),
            total,
            u8::from(c.churned).to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("demo_artifacts=info".parse()?),
        )
        .init();

    info!("Starting Demo Artifact Generator");

    let args: Vec<String> = std::env::args().collect();
    let out_dir = args.get(1).map(|s| s.as_str()).unwrap_or("artifacts");
    let count: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(500);
    let churn_rate: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.265);
    let test_fraction: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.2);

    info!(
        out_dir = %out_dir,
        count = count,
        churn_rate = churn_rate,
        test_fraction = test_fraction,
        "Configuration loaded"
    );

    let out = Path::new(out_dir);
    std::fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;

    let mut generator = CustomerGenerator::new();
    let mut rng = rand::thread_rng();
    let customers: Vec<Customer> = (0..count.max(2))
        .map(|_| {
            if rng.gen_bool(churn_rate.clamp(0.0, 1.0)) {
                generator.generate_churner()
            } else {
                generator.generate_loyal()
            }
        })
        .collect();

    let scaler = fit_scaler(&customers);
    let extractor = FeatureExtractor::new();
    let test_len = ((customers.len() as f64 * test_fraction) as usize).clamp(1, customers.len() - 1);
    let (test, train) = customers.split_at(test_len);

    let scaled = |set: &[Customer]| -> Vec<CustomerRecord> {
        set.iter().map(|c| scaler.transform_record(&c.record)).collect()
    };
    let x_train = scaled(train);
    let x_test = scaled(test);

    let rows: Vec<Vec<f64>> = x_train.iter().map(|r| extractor.extract(r)).collect();
    let trees: Vec<FlatTree> = demo_trees(&scaler)
        .iter()
        .map(|t| FlatTree::flatten(t, &rows))
        .collect();
    let model = model_json(&trees, 0.5);

    write_reference(&out.join("reference.csv"), &customers)?;
    write_table(&out.join("X_train.csv"), &x_train)?;
    write_table(&out.join("X_test.csv"), &x_test)?;
    write_labels(&out.join("y_train.csv"), &train.iter().collect::<Vec<_>>())?;
    write_labels(&out.join("y_test.csv"), &test.iter().collect::<Vec<_>>())?;
    serde_json::to_writer_pretty(File::create(out.join("scaler.json"))?, &scaler)?;
    serde_json::to_writer_pretty(File::create(out.join("model.json"))?, &model)?;

    let churners = customers.iter().filter(|c| c.churned).count();
    info!(
        train_rows = x_train.len(),
        test_rows = x_test.len(),
        churners = churners,
        trees = trees.len(),
        "Completed! Artifacts written to {}",
        out.display()
    );

    Ok(())
}
