//! Native representation of the churn classifier.
//!
//! The XGBoost document is converted once at load time into flat per-tree
//! arrays. Leaf values are pre-multiplied by the tree weight so DART models
//! score and explain exactly like plain tree ensembles.

use super::xgboost::{GradientBooster, ModelTrees, Tree as XgbTree, XgbModel};

/// A single regression tree in struct-of-arrays layout.
///
/// Children always have a larger index than their parent, so traversal
/// terminates.
#[derive(Debug, Clone)]
pub struct Tree {
    left: Vec<u32>,
    right: Vec<u32>,
    feature: Vec<u32>,
    threshold: Vec<f32>,
    default_left: Vec<bool>,
    leaf_value: Vec<f64>,
    is_leaf: Vec<bool>,
    cover: Option<Vec<f64>>,
}

impl Tree {
    pub fn num_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    #[inline]
    pub fn is_leaf(&self, node: usize) -> bool {
        self.is_leaf[node]
    }

    #[inline]
    pub fn split_feature(&self, node: usize) -> usize {
        self.feature[node] as usize
    }

    #[inline]
    pub fn leaf_value(&self, node: usize) -> f64 {
        self.leaf_value[node]
    }

    #[inline]
    pub fn children(&self, node: usize) -> (usize, usize) {
        (self.left[node] as usize, self.right[node] as usize)
    }

    pub fn covers(&self) -> Option<&[f64]> {
        self.cover.as_deref()
    }

    /// Child taken by `row` at an internal node. Missing values follow the default direction.
    #[inline]
    pub fn next_node(&self, node: usize, row: &[f64]) -> usize {
        let value = row.get(self.split_feature(node)).copied().unwrap_or(f64::NAN);
        let go_left = if value.is_nan() {
            self.default_left[node]
        } else {
            (value as f32) < self.threshold[node]
        };
        if go_left {
            self.left[node] as usize
        } else {
            self.right[node] as usize
        }
    }

    /// Leaf value reached by `row`.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut node = 0;
        while !self.is_leaf(node) {
            node = self.next_node(node, row);
        }
        self.leaf_value(node)
    }

    fn from_xgboost(
        tree: &XgbTree,
        tree_idx: usize,
        weight: f64,
        num_features: usize,
    ) -> Result<Self, String> {
        let n = tree.left_children.len();
        if n == 0 {
            return Err(format!("tree {} has no nodes", tree_idx));
        }
        let lengths = [
            tree.right_children.len(),
            tree.split_indices.len(),
            tree.split_conditions.len(),
            tree.default_left.len(),
        ];
        if lengths.iter().any(|&len| len != n) {
            return Err(format!("tree {} has node arrays of unequal length", tree_idx));
        }
        if tree.split_type.iter().any(|&t| t != 0) {
            return Err(format!(
                "tree {} uses categorical splits; encode categories as ordinal codes",
                tree_idx
            ));
        }

        let mut left = Vec::with_capacity(n);
        let mut right = Vec::with_capacity(n);
        let mut feature = Vec::with_capacity(n);
        let mut is_leaf = Vec::with_capacity(n);
        let mut leaf_value = Vec::with_capacity(n);

        for node in 0..n {
            let (l, r) = (tree.left_children[node], tree.right_children[node]);
            let leaf = l == -1;
            if !leaf {
                for child in [l, r] {
                    if child <= node as i32 || child as usize >= n {
                        return Err(format!(
                            "tree {} node {} references invalid child {} ({} nodes)",
                            tree_idx, node, child, n
                        ));
                    }
                }
                let split = tree.split_indices[node];
                if split < 0 || split as usize >= num_features {
                    return Err(format!(
                        "tree {} node {} splits on feature {} but the model has {} features",
                        tree_idx, node, split, num_features
                    ));
                }
            }
            let value = tree
                .base_weights
                .get(node)
                .copied()
                .filter(|_| leaf && tree.base_weights.len() == n)
                .unwrap_or(tree.split_conditions[node]);

            left.push(l.max(0) as u32);
            right.push(r.max(0) as u32);
            feature.push(tree.split_indices[node].max(0) as u32);
            is_leaf.push(leaf);
            leaf_value.push(if leaf { value as f64 * weight } else { 0.0 });
        }

        let cover = (tree.sum_hessian.len() == n).then(|| tree.sum_hessian.clone());

        Ok(Self {
            left,
            right,
            feature,
            threshold: tree.split_conditions.clone(),
            default_left: tree.default_left.iter().map(|&d| d != 0).collect(),
            leaf_value,
            is_leaf,
            cover,
        })
    }
}

/// Additive tree ensemble in margin (log-odds) space.
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn new(trees: Vec<Tree>) -> Self {
        Self { trees }
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }
}

/// gblinear booster: `bias + sum(w_i * x_i)`.
#[derive(Debug, Clone)]
pub struct LinearModel {
    weights: Vec<f64>,
    bias: f64,
}

impl LinearModel {
    fn predict(&self, row: &[f64]) -> f64 {
        self.bias
            + self
                .weights
                .iter()
                .zip(row)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}

#[derive(Debug, Clone)]
pub enum Booster {
    Trees(TreeEnsemble),
    Linear(LinearModel),
}

/// The loaded, immutable churn classifier.
#[derive(Debug, Clone)]
pub struct ChurnModel {
    booster: Booster,
    base_margin: f64,
    feature_names: Vec<String>,
    num_features: usize,
    objective: String,
}

/// Objectives whose margin maps onto a churn probability through the sigmoid.
const BINARY_OBJECTIVES: [&str; 3] = ["binary:logistic", "binary:logitraw", "reg:logistic"];

fn prob_to_margin(base_score: f64, objective: &str) -> f64 {
    match objective {
        "binary:logistic" | "reg:logistic" => {
            let p = base_score.clamp(1e-7, 1.0 - 1e-7);
            (p / (1.0 - p)).ln()
        }
        _ => base_score,
    }
}

/// Numerically stable logistic function.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

impl ChurnModel {
    /// Convert a parsed XGBoost document. Errors describe why the model is unusable.
    pub fn from_xgboost(model: &XgbModel) -> Result<Self, String> {
        let learner = &model.learner;
        let objective = learner.objective.name.clone();
        if !BINARY_OBJECTIVES.contains(&objective.as_str()) {
            return Err(format!(
                "objective '{}' is not a binary classifier (expected one of {:?})",
                objective, BINARY_OBJECTIVES
            ));
        }
        if learner.learner_model_param.num_class > 1 {
            return Err(format!(
                "multiclass model with {} classes",
                learner.learner_model_param.num_class
            ));
        }
        let num_features = usize::try_from(learner.learner_model_param.num_feature)
            .map_err(|_| "negative num_feature".to_string())?;
        if !learner.feature_names.is_empty() && learner.feature_names.len() != num_features {
            return Err(format!(
                "{} feature names for {} features",
                learner.feature_names.len(),
                num_features
            ));
        }

        let booster = match &learner.gradient_booster {
            GradientBooster::Gbtree { model } => Booster::Trees(convert_trees(model, None, num_features)?),
            GradientBooster::Dart {
                gbtree,
                weight_drop,
            } => Booster::Trees(convert_trees(&gbtree.model, Some(weight_drop), num_features)?),
            GradientBooster::Gblinear { model } => {
                if model.weights.len() != num_features + 1 {
                    return Err(format!(
                        "gblinear weights length {} doesn't match num_features + 1 = {}",
                        model.weights.len(),
                        num_features + 1
                    ));
                }
                Booster::Linear(LinearModel {
                    weights: model.weights[..num_features].to_vec(),
                    bias: model.weights[num_features],
                })
            }
        };

        Ok(Self {
            booster,
            base_margin: prob_to_margin(learner.learner_model_param.base_score, &objective),
            feature_names: learner.feature_names.clone(),
            num_features,
            objective,
        })
    }

    /// Build a tree-ensemble model directly; used by tests and tooling.
    pub fn from_trees(trees: Vec<Tree>, base_margin: f64, feature_names: Vec<String>) -> Self {
        Self {
            num_features: feature_names.len(),
            booster: Booster::Trees(TreeEnsemble::new(trees)),
            base_margin,
            feature_names,
            objective: "binary:logistic".to_string(),
        }
    }

    pub fn booster(&self) -> &Booster {
        &self.booster
    }

    pub fn kind(&self) -> &'static str {
        match self.booster {
            Booster::Trees(_) => "tree_ensemble",
            Booster::Linear(_) => "linear",
        }
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn base_margin(&self) -> f64 {
        self.base_margin
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn num_trees(&self) -> usize {
        match &self.booster {
            Booster::Trees(ensemble) => ensemble.trees().len(),
            Booster::Linear(_) => 0,
        }
    }

    /// Raw margin (log-odds of churn).
    pub fn predict_raw(&self, row: &[f64]) -> f64 {
        let sum = match &self.booster {
            Booster::Trees(ensemble) => ensemble.trees().iter().map(|t| t.predict(row)).sum(),
            Booster::Linear(linear) => linear.predict(row),
        };
        self.base_margin + sum
    }

    /// Class probabilities `[p(stay), p(churn)]`.
    pub fn predict_proba(&self, row: &[f64]) -> [f64; 2] {
        let p = sigmoid(self.predict_raw(row));
        [1.0 - p, p]
    }

    /// Argmax of [`predict_proba`](Self::predict_proba); ties go to class 0.
    pub fn predict_label(&self, row: &[f64]) -> u8 {
        let [p0, p1] = self.predict_proba(row);
        u8::from(p1 > p0)
    }
}

fn convert_trees(
    model: &ModelTrees,
    weights: Option<&Vec<f64>>,
    num_features: usize,
) -> Result<TreeEnsemble, String> {
    if let Some(w) = weights {
        if w.len() != model.trees.len() {
            return Err(format!(
                "{} DART weights for {} trees",
                w.len(),
                model.trees.len()
            ));
        }
    }
    if model.tree_info.iter().any(|&group| group != 0) {
        return Err("trees assigned to more than one output group".to_string());
    }
    let trees = model
        .trees
        .iter()
        .enumerate()
        .map(|(idx, tree)| {
            let weight = weights.map(|w| w[idx]).unwrap_or(1.0);
            Tree::from_xgboost(tree, idx, weight, num_features)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TreeEnsemble::new(trees))
}

/// Compact tree construction for tests and tooling.
///
/// `nodes` lists `(left, right, feature, threshold, leaf_value, cover)`;
/// a node with `left == -1` is a leaf. Split features must be below `num_features`.
pub fn tree_from_nodes(
    nodes: &[(i32, i32, u32, f32, f64, f64)],
    num_features: usize,
) -> Result<Tree, String> {
    let xgb = XgbTree {
        left_children: nodes.iter().map(|n| n.0).collect(),
        right_children: nodes.iter().map(|n| n.1).collect(),
        split_indices: nodes.iter().map(|n| n.2 as i32).collect(),
        split_conditions: nodes
            .iter()
            .map(|n| if n.0 == -1 { n.4 as f32 } else { n.3 })
            .collect(),
        default_left: vec![1; nodes.len()],
        base_weights: Vec::new(),
        sum_hessian: nodes.iter().map(|n| n.5).collect(),
        split_type: Vec::new(),
    };
    Tree::from_xgboost(&xgb, 0, 1.0, num_features)
}
