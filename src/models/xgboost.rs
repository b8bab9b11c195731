//! XGBoost JSON model format.
//!
//! Foreign types used only for parsing `save_model("*.json")` output
//! (XGBoost >= 1.6). Only the fields the dashboard scores and explains with
//! are modelled; everything else in the document is ignored.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr};

/// `base_score` is written as a number, a string (`"5E-1"`) or a bracketed
/// string (`"[5E-1]"`) depending on the XGBoost version.
fn deserialize_base_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as SerdeError;

    let mut cur = Value::deserialize(deserializer)?;
    loop {
        match cur {
            Value::Number(n) => {
                return n
                    .as_f64()
                    .ok_or_else(|| SerdeError::custom("invalid base_score number"));
            }
            Value::String(s) => {
                let t = s.trim();
                if let Ok(f) = t.parse::<f64>() {
                    return Ok(f);
                }
                let inner = t
                    .strip_prefix('[')
                    .and_then(|rest| rest.strip_suffix(']'))
                    .ok_or_else(|| {
                        SerdeError::custom(format!("cannot parse base_score from '{}'", s))
                    })?;
                cur = Value::String(inner.split(',').next().unwrap_or_default().to_string());
            }
            Value::Array(arr) => {
                cur = arr
                    .into_iter()
                    .next()
                    .ok_or_else(|| SerdeError::custom("empty base_score array"))?;
            }
            _ => return Err(SerdeError::custom("base_score must be number, string or array")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct XgbModel {
    pub learner: Learner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Learner {
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub gradient_booster: GradientBooster,
    pub objective: Objective,
    pub learner_model_param: LearnerModelParam,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct LearnerModelParam {
    #[serde(deserialize_with = "deserialize_base_score")]
    pub base_score: f64,
    #[serde_as(as = "DisplayFromStr")]
    pub num_class: i64,
    #[serde_as(as = "DisplayFromStr")]
    pub num_feature: i64,
}

/// Only the objective name matters for scoring.
#[derive(Debug, Clone, Deserialize)]
pub struct Objective {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum GradientBooster {
    Gbtree { model: ModelTrees },
    Gblinear { model: GbLinearModel },
    Dart { gbtree: GbTreeDefinition, weight_drop: Vec<f64> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct GbTreeDefinition {
    pub model: ModelTrees,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GbLinearModel {
    pub weights: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelTrees {
    pub trees: Vec<Tree>,
    #[serde(default)]
    pub tree_info: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub left_children: Vec<i32>,
    pub right_children: Vec<i32>,
    pub split_indices: Vec<i32>,
    pub split_conditions: Vec<f32>,
    pub default_left: Vec<i32>,
    #[serde(default)]
    pub base_weights: Vec<f32>,
    #[serde(default)]
    pub sum_hessian: Vec<f64>,
    #[serde(default)]
    pub split_type: Vec<i32>,
}
