//! TreeSHAP explainer for tree ensembles.
//!
//! Exact path-dependent TreeSHAP (Lundberg et al., 2020, Algorithm 2).
//! Attributions are in margin space and sum with the expected value to the
//! raw model output for every row.

use super::values::ExplanationValues;
use crate::error::{DashboardError, Result};
use crate::models::forest::{Booster, ChurnModel, Tree, TreeEnsemble};

/// One element of the unique feature path.
#[derive(Debug, Clone, Copy, Default)]
struct PathElement {
    /// Split feature, `-1` for the root placeholder.
    feature_index: i32,
    /// Fraction of cover flowing down this path when the feature is absent.
    zero_fraction: f64,
    /// 1 if the row follows this path when the feature is present, else 0.
    one_fraction: f64,
    /// Permutation weight of the subset sizes ending at this element.
    pweight: f64,
}

fn extend_path(path: &mut [PathElement], depth: usize, zero: f64, one: f64, feature: i32) {
    path[depth] = PathElement {
        feature_index: feature,
        zero_fraction: zero,
        one_fraction: one,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    };
    let d = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].pweight += one * path[i].pweight * (i + 1) as f64 / d;
        path[i].pweight = zero * path[i].pweight * (depth - i) as f64 / d;
    }
}

fn unwind_path(path: &mut [PathElement], depth: usize, index: usize) {
    let one = path[index].one_fraction;
    let zero = path[index].zero_fraction;
    let d = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * d / ((i + 1) as f64 * one);
            next_one_portion = tmp - path[i].pweight * zero * (depth - i) as f64 / d;
        } else {
            path[i].pweight = path[i].pweight * d / (zero * (depth - i) as f64);
        }
    }

    for i in index..depth {
        path[i].feature_index = path[i + 1].feature_index;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
}

/// Total permutation weight of the path with element `index` removed.
fn unwound_path_sum(path: &[PathElement], depth: usize, index: usize) -> f64 {
    let one = path[index].one_fraction;
    let zero = path[index].zero_fraction;
    let d = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one != 0.0 {
            let tmp = next_one_portion * d / ((i + 1) as f64 * one);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero * (depth - i) as f64 / d;
        } else if zero != 0.0 {
            total += path[i].pweight / zero / ((depth - i) as f64 / d);
        }
    }
    total
}

/// Cover-weighted mean of the leaf values of `tree`.
fn expected_value(tree: &Tree, covers: &[f64]) -> f64 {
    // Children have larger indices than parents, so a reverse sweep sees
    // both children before their parent.
    let mut means = vec![0.0; tree.num_nodes()];
    for node in (0..tree.num_nodes()).rev() {
        means[node] = if tree.is_leaf(node) {
            tree.leaf_value(node)
        } else {
            let (l, r) = tree.children(node);
            (covers[l] * means[l] + covers[r] * means[r]) / covers[node]
        };
    }
    means[0]
}

/// TreeSHAP explainer bound to one tree ensemble.
pub struct TreeExplainer<'a> {
    ensemble: &'a TreeEnsemble,
    n_features: usize,
    base_value: f64,
}

impl<'a> TreeExplainer<'a> {
    /// Fails for linear boosters and for trees without positive node covers.
    pub fn new(model: &'a ChurnModel) -> Result<Self> {
        let ensemble = match model.booster() {
            Booster::Trees(ensemble) => ensemble,
            Booster::Linear(_) => {
                return Err(DashboardError::Explanation(format!(
                    "TreeSHAP needs a tree ensemble, got a {} booster",
                    model.kind()
                )))
            }
        };

        let mut base_value = model.base_margin();
        for (idx, tree) in ensemble.trees().iter().enumerate() {
            let covers = tree.covers().ok_or_else(|| {
                DashboardError::Explanation(format!(
                    "tree {} has no cover statistics (sum_hessian)",
                    idx
                ))
            })?;
            if let Some(node) = covers.iter().position(|c| !(c.is_finite() && *c > 0.0)) {
                return Err(DashboardError::Explanation(format!(
                    "tree {} node {} has non-positive cover {}",
                    idx, node, covers[node]
                )));
            }
            base_value += expected_value(tree, covers);
        }

        Ok(Self {
            ensemble,
            n_features: model.num_features(),
            base_value,
        })
    }

    /// Expected raw output; the shared baseline of every explanation.
    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    /// Attributions for every row, in row order.
    pub fn shap_values(&self, rows: &[Vec<f64>]) -> ExplanationValues {
        let mut values = ExplanationValues::new(rows.len(), self.n_features, self.base_value);
        for (idx, row) in rows.iter().enumerate() {
            self.shap_row(row, values.row_mut(idx));
        }
        values
    }

    /// Accumulate the attributions of one row into `phi`.
    pub fn shap_row(&self, row: &[f64], phi: &mut [f64]) {
        for tree in self.ensemble.trees() {
            // covers were checked in new()
            if let Some(covers) = tree.covers() {
                let root = [PathElement::default()];
                self.recurse(tree, covers, row, phi, 0, &root, 0, 1.0, 1.0, -1);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn recurse(
        &self,
        tree: &Tree,
        covers: &[f64],
        row: &[f64],
        phi: &mut [f64],
        node: usize,
        parent_path: &[PathElement],
        depth: usize,
        zero_fraction: f64,
        one_fraction: f64,
        feature: i32,
    ) {
        let mut path = Vec::with_capacity(depth + 2);
        path.extend_from_slice(&parent_path[..depth]);
        path.push(PathElement::default());
        extend_path(&mut path, depth, zero_fraction, one_fraction, feature);

        if tree.is_leaf(node) {
            let leaf = tree.leaf_value(node);
            for i in 1..=depth {
                let w = unwound_path_sum(&path, depth, i);
                let el = path[i];
                phi[el.feature_index as usize] += w * (el.one_fraction - el.zero_fraction) * leaf;
            }
            return;
        }

        let split = tree.split_feature(node);
        let hot = tree.next_node(node, row);
        let (left, right) = tree.children(node);
        let cold = if hot == left { right } else { left };
        let hot_zero_fraction = covers[hot] / covers[node];
        let cold_zero_fraction = covers[cold] / covers[node];

        let mut depth = depth;
        let mut incoming_zero = 1.0;
        let mut incoming_one = 1.0;

        // A feature already on the path is unwound and its fractions carried over.
        if let Some(index) = (1..=depth).find(|&i| path[i].feature_index == split as i32) {
            incoming_zero = path[index].zero_fraction;
            incoming_one = path[index].one_fraction;
            unwind_path(&mut path, depth, index);
            depth -= 1;
        }

        self.recurse(
            tree,
            covers,
            row,
            phi,
            hot,
            &path,
            depth + 1,
            hot_zero_fraction * incoming_zero,
            incoming_one,
            split as i32,
        );
        self.recurse(
            tree,
            covers,
            row,
            phi,
            cold,
            &path,
            depth + 1,
            cold_zero_fraction * incoming_zero,
            0.0,
            split as i32,
        );
    }
}
