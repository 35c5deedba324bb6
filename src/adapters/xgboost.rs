//! XGBoost JSON 模型 (`Booster.save_model("model.json")`) 的推論實作。
//!
//! 只支援 `gbtree` 與數值型切分；類別型切分、`dart`、`gblinear`
//! 以及其他 objective 在載入時就會被拒絕。

use crate::adapters::reject_pickle;
use crate::domain::ports::Classifier;
use crate::utils::error::{InferenceError, LoadError, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    MultiSoftprob,
    MultiSoftmax,
    BinaryLogistic,
    BinaryHinge,
}

impl Objective {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "multi:softprob" => Some(Self::MultiSoftprob),
            "multi:softmax" => Some(Self::MultiSoftmax),
            "binary:logistic" => Some(Self::BinaryLogistic),
            "binary:hinge" => Some(Self::BinaryHinge),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::MultiSoftprob => "multi:softprob",
            Self::MultiSoftmax => "multi:softmax",
            Self::BinaryLogistic => "binary:logistic",
            Self::BinaryHinge => "binary:hinge",
        }
    }

    fn is_multiclass(&self) -> bool {
        matches!(self, Self::MultiSoftprob | Self::MultiSoftmax)
    }

    pub fn has_probabilities(&self) -> bool {
        matches!(self, Self::MultiSoftprob | Self::BinaryLogistic)
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    learner: RawLearner,
}

#[derive(Debug, Deserialize)]
struct RawLearner {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: RawGradientBooster,
    learner_model_param: RawLearnerModelParam,
    objective: RawObjective,
}

#[derive(Debug, Deserialize)]
struct RawGradientBooster {
    name: String,
    model: Option<RawTreeModel>,
}

#[derive(Debug, Deserialize)]
struct RawTreeModel {
    trees: Vec<RawTree>,
    tree_info: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct RawTree {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    #[serde(default)]
    split_type: Vec<u8>,
}

// 舊版輸出 0/1，新版部分輸出 bool
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(u8),
}

impl Flag {
    fn is_set(self) -> bool {
        match self {
            Flag::Bool(value) => value,
            Flag::Int(value) => value != 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLearnerModelParam {
    base_score: String,
    #[serde(default)]
    num_class: Option<String>,
    num_feature: String,
}

#[derive(Debug, Deserialize)]
struct RawObjective {
    name: String,
}

#[derive(Debug, Clone, PartialEq)]
// 門檻與葉值都是 f32，與 XGBoost 內部表示相同
enum Node {
    Leaf(f32),
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        default_left: bool,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
    group: usize,
}

impl Tree {
    fn leaf_value(&self, row: &[f64]) -> f32 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    // 與 XGBoost 相同，輸入先轉成 f32 再比較
                    let x = row[*feature] as f32;
                    index = if x.is_nan() {
                        if *default_left {
                            *left
                        } else {
                            *right
                        }
                    } else if x < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// 載入後不可變的樹集成模型
#[derive(Debug, Clone)]
pub struct XgbModel {
    objective: Objective,
    trees: Vec<Tree>,
    base_margin: Vec<f32>,
    num_features: usize,
    num_classes: usize,
    feature_names: Vec<String>,
}

impl XgbModel {
    pub fn from_slice(path: &str, bytes: &[u8]) -> std::result::Result<Self, LoadError> {
        reject_pickle(path, bytes)?;

        let document: RawDocument =
            serde_json::from_slice(bytes).map_err(|e| LoadError::Corrupt {
                path: path.to_string(),
                message: format!("not an XGBoost JSON model: {}", e),
            })?;

        Self::from_raw(path, document.learner)
    }

    fn from_raw(path: &str, learner: RawLearner) -> std::result::Result<Self, LoadError> {
        let corrupt = |message: String| LoadError::Corrupt {
            path: path.to_string(),
            message,
        };
        let unsupported = |message: String| LoadError::Unsupported {
            path: path.to_string(),
            message,
        };

        let objective = Objective::from_name(&learner.objective.name)
            .ok_or_else(|| unsupported(format!("objective '{}'", learner.objective.name)))?;

        if learner.gradient_booster.name != "gbtree" {
            return Err(unsupported(format!(
                "booster '{}' (only gbtree is supported)",
                learner.gradient_booster.name
            )));
        }
        let model = learner
            .gradient_booster
            .model
            .ok_or_else(|| corrupt("gbtree booster without a model section".to_string()))?;

        let params = &learner.learner_model_param;
        let num_features = parse_count(&params.num_feature)
            .ok_or_else(|| corrupt(format!("invalid num_feature '{}'", params.num_feature)))?;
        let num_class = match &params.num_class {
            Some(raw) => parse_count(raw)
                .ok_or_else(|| corrupt(format!("invalid num_class '{}'", raw)))?,
            None => 0,
        };

        let (num_groups, num_classes) = if objective.is_multiclass() {
            if num_class < 2 {
                return Err(corrupt(format!(
                    "{} requires num_class >= 2, found {}",
                    objective.name(),
                    num_class
                )));
            }
            (num_class, num_class)
        } else {
            (1, 2)
        };

        let base_score = parse_base_score(&params.base_score)
            .ok_or_else(|| corrupt(format!("invalid base_score '{}'", params.base_score)))?;
        let base_score = match base_score.len() {
            1 => vec![base_score[0]; num_groups],
            n if n == num_groups => base_score,
            n => {
                return Err(corrupt(format!(
                    "base_score has {} values for {} output groups",
                    n, num_groups
                )))
            }
        };
        let base_margin = base_score
            .into_iter()
            .map(|score| base_score_to_margin(objective, score).map(|m| m as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| corrupt("base_score must be in (0, 1) for binary:logistic".to_string()))?;

        if model.trees.len() != model.tree_info.len() {
            return Err(corrupt(format!(
                "{} trees but {} tree_info entries",
                model.trees.len(),
                model.tree_info.len()
            )));
        }
        if model.trees.is_empty() {
            return Err(corrupt("model has no trees".to_string()));
        }

        let trees = model
            .trees
            .into_iter()
            .zip(model.tree_info)
            .enumerate()
            .map(|(id, (raw, group))| {
                if group >= num_groups {
                    return Err(corrupt(format!(
                        "tree {} belongs to group {} but the model has {} groups",
                        id, group, num_groups
                    )));
                }
                build_tree(raw, group, num_features).map_err(|e| match e {
                    TreeError::Corrupt(message) => corrupt(format!("tree {}: {}", id, message)),
                    TreeError::Unsupported(message) => {
                        unsupported(format!("tree {}: {}", id, message))
                    }
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        tracing::debug!(
            "Parsed XGBoost model from {}: objective={}, trees={}, classes={}",
            path,
            objective.name(),
            trees.len(),
            num_classes
        );

        Ok(Self {
            objective,
            trees,
            base_margin,
            num_features,
            num_classes,
            feature_names: learner.feature_names,
        })
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// 各輸出群組的 margin，以 f32 累加後再轉成 f64
    fn margins(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.num_features {
            return Err(InferenceError::invalid_input(
                "row",
                format!(
                    "expected {} features, got {}",
                    self.num_features,
                    row.len()
                ),
            ));
        }

        let mut margins = self.base_margin.clone();
        for tree in &self.trees {
            margins[tree.group] += tree.leaf_value(row);
        }
        Ok(margins.into_iter().map(f64::from).collect())
    }
}

impl Classifier for XgbModel {
    fn num_features(&self) -> usize {
        self.num_features
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn feature_names(&self) -> Option<&[String]> {
        if self.feature_names.is_empty() {
            None
        } else {
            Some(&self.feature_names)
        }
    }

    fn predict(&self, row: &[f64]) -> Result<usize> {
        let margins = self.margins(row)?;
        let class_id = match self.objective {
            Objective::MultiSoftprob | Objective::MultiSoftmax => argmax(&margins),
            Objective::BinaryLogistic => usize::from(sigmoid(margins[0]) > 0.5),
            Objective::BinaryHinge => usize::from(margins[0] > 0.0),
        };
        Ok(class_id)
    }

    fn supports_probabilities(&self) -> bool {
        self.objective.has_probabilities()
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
        let margins = self.margins(row)?;
        match self.objective {
            Objective::MultiSoftprob => Ok(softmax(&margins)),
            Objective::BinaryLogistic => {
                let p = sigmoid(margins[0]);
                Ok(vec![1.0 - p, p])
            }
            Objective::MultiSoftmax | Objective::BinaryHinge => {
                Err(InferenceError::CapabilityUnsupported {
                    capability: format!("probabilities with objective {}", self.objective.name()),
                })
            }
        }
    }

    fn describe(&self) -> String {
        format!(
            "xgboost gbtree, objective {}, {} trees, {} classes",
            self.objective.name(),
            self.trees.len(),
            self.num_classes
        )
    }
}

enum TreeError {
    Corrupt(String),
    Unsupported(String),
}

fn build_tree(
    raw: RawTree,
    group: usize,
    num_features: usize,
) -> std::result::Result<Tree, TreeError> {
    let n = raw.left_children.len();
    if n == 0 {
        return Err(TreeError::Corrupt("tree has no nodes".to_string()));
    }
    if raw.right_children.len() != n
        || raw.split_indices.len() != n
        || raw.split_conditions.len() != n
        || raw.default_left.len() != n
    {
        return Err(TreeError::Corrupt("node arrays have different lengths".to_string()));
    }
    if raw.split_type.iter().any(|t| *t != 0) {
        return Err(TreeError::Unsupported(
            "categorical splits are not supported".to_string(),
        ));
    }

    let mut nodes = Vec::with_capacity(n);
    for i in 0..n {
        let left = raw.left_children[i];
        let right = raw.right_children[i];

        if left == -1 {
            nodes.push(Node::Leaf(raw.split_conditions[i]));
            continue;
        }

        // 子節點索引一定大於父節點，保證走訪會結束
        let child = |value: i64| -> std::result::Result<usize, TreeError> {
            usize::try_from(value)
                .ok()
                .filter(|c| *c > i && *c < n)
                .ok_or_else(|| {
                    TreeError::Corrupt(format!("node {} has invalid child {}", i, value))
                })
        };
        let feature = usize::try_from(raw.split_indices[i])
            .ok()
            .filter(|f| *f < num_features)
            .ok_or_else(|| {
                TreeError::Corrupt(format!(
                    "node {} splits on feature {} (model has {})",
                    i, raw.split_indices[i], num_features
                ))
            })?;

        nodes.push(Node::Split {
            feature,
            threshold: raw.split_conditions[i],
            left: child(left)?,
            right: child(right)?,
            default_left: raw.default_left[i].is_set(),
        });
    }

    Ok(Tree { nodes, group })
}

fn parse_count(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok()
}

// 可能是 "5E-1" 或 "[5E-1]"，多輸出時為 "[a,b,c]"
fn parse_base_score(raw: &str) -> Option<Vec<f64>> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let values = trimmed
        .split(',')
        .map(|part| part.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect::<Option<Vec<f64>>>()?;
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn base_score_to_margin(objective: Objective, score: f64) -> Option<f64> {
    match objective {
        Objective::BinaryLogistic => {
            if score > 0.0 && score < 1.0 {
                Some((score / (1.0 - score)).ln())
            } else {
                None
            }
        }
        _ => Some(score),
    }
}

fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

fn softmax(margins: &[f64]) -> Vec<f64> {
    let max = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = margins.iter().map(|m| (m - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

// 同分時取第一個，與 numpy argmax 一致
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, value) in values.iter().enumerate().skip(1) {
        if *value > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn stump(feature: usize, threshold: f64, left: f64, right: f64) -> Value {
        json!({
            "base_weights": [0.0, left, right],
            "default_left": [1, 0, 0],
            "left_children": [1, -1, -1],
            "right_children": [2, -1, -1],
            "parents": [2147483647, 0, 0],
            "split_conditions": [threshold, left, right],
            "split_indices": [feature, 0, 0],
            "split_type": [0, 0, 0],
            "tree_param": { "num_deleted": "0", "num_feature": "8", "num_nodes": "3", "size_leaf_vector": "1" }
        })
    }

    fn document(objective: &str, num_class: &str, trees: Vec<Value>, tree_info: Vec<usize>) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "learner": {
                "attributes": {},
                "feature_names": [],
                "feature_types": [],
                "gradient_booster": {
                    "model": {
                        "gbtree_model_param": { "num_parallel_tree": "1", "num_trees": trees.len().to_string() },
                        "iteration_indptr": [0, trees.len()],
                        "tree_info": tree_info,
                        "trees": trees
                    },
                    "name": "gbtree"
                },
                "learner_model_param": {
                    "base_score": "5E-1",
                    "boost_from_average": "1",
                    "num_class": num_class,
                    "num_feature": "8",
                    "num_target": "1"
                },
                "objective": { "name": objective }
            },
            "version": [2, 0, 3]
        }))
        .unwrap()
    }

    fn softprob_model() -> XgbModel {
        let bytes = document(
            "multi:softprob",
            "3",
            vec![
                stump(3, 2.0, 0.5, -0.3),
                stump(4, 100.0, 0.8, -0.2),
                stump(2, 0.001, 0.9, -0.4),
            ],
            vec![0, 1, 2],
        );
        XgbModel::from_slice("softprob.json", &bytes).unwrap()
    }

    const SAMPLE: [f64; 8] = [12.34, 3.5, 0.0012, 1.1, 250.6, 10.3, 5500.0, 0.9];

    #[test]
    fn test_softprob_prediction_and_probabilities() {
        let model = softprob_model();
        assert_eq!(model.num_classes(), 3);
        assert_eq!(model.num_trees(), 3);
        assert!(model.supports_probabilities());

        assert_eq!(model.predict(&SAMPLE).unwrap(), 0);

        let proba = model.predict_proba(&SAMPLE).unwrap();
        assert_eq!(proba.len(), 3);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((proba[0] - 0.525443).abs() < 1e-5);
        assert!((proba[1] - 0.260927).abs() < 1e-5);
        assert!((proba[2] - 0.213629).abs() < 1e-5);
    }

    #[test]
    fn test_split_goes_left_only_when_strictly_less() {
        let model = softprob_model();
        let mut row = SAMPLE;
        // pl_rade 剛好等於門檻值時走右邊
        row[3] = 2.0;
        row[4] = 50.0;
        assert_eq!(model.predict(&row).unwrap(), 1);
    }

    #[test]
    fn test_split_compares_in_single_precision() {
        let bytes = document(
            "multi:softprob",
            "3",
            vec![stump(2, 0.1, 5.0, -5.0), stump(2, 0.1, -5.0, 5.0)],
            vec![0, 2],
        );
        let model = XgbModel::from_slice("threshold.json", &bytes).unwrap();

        // 0.099999999 轉成 f32 後等於 0.1f32，不小於門檻，走右邊
        let mut row = SAMPLE;
        row[2] = 0.099999999;
        assert_eq!(model.predict(&row).unwrap(), 2);

        // 明顯小於門檻時走左邊
        row[2] = 0.0999;
        assert_eq!(model.predict(&row).unwrap(), 0);
    }

    #[test]
    fn test_softmax_objective_has_no_probabilities() {
        let bytes = document(
            "multi:softmax",
            "3",
            vec![
                stump(3, 2.0, 0.5, -0.3),
                stump(4, 100.0, 0.8, -0.2),
                stump(2, 0.001, 0.9, -0.4),
            ],
            vec![0, 1, 2],
        );
        let model = XgbModel::from_slice("softmax.json", &bytes).unwrap();
        assert!(!model.supports_probabilities());
        assert_eq!(model.predict(&SAMPLE).unwrap(), 0);
        assert!(matches!(
            model.predict_proba(&SAMPLE),
            Err(InferenceError::CapabilityUnsupported { .. })
        ));
    }

    #[test]
    fn test_binary_logistic() {
        let bytes = document("binary:logistic", "0", vec![stump(6, 6000.0, 0.8, -0.8)], vec![0]);
        let model = XgbModel::from_slice("binary.json", &bytes).unwrap();
        assert_eq!(model.num_classes(), 2);
        assert_eq!(model.predict(&SAMPLE).unwrap(), 1);

        let proba = model.predict_proba(&SAMPLE).unwrap();
        assert!((proba[1] - 0.689974).abs() < 1e-5);
        assert!((proba[0] + proba[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_binary_hinge() {
        let bytes = document("binary:hinge", "0", vec![stump(6, 6000.0, -0.8, 0.8)], vec![0]);
        let model = XgbModel::from_slice("hinge.json", &bytes).unwrap();
        assert!(!model.supports_probabilities());
        // base margin 0.5 + (-0.8) < 0
        assert_eq!(model.predict(&SAMPLE).unwrap(), 0);
    }

    #[test]
    fn test_row_length_is_checked() {
        let model = softprob_model();
        assert!(matches!(
            model.predict(&SAMPLE[..7]),
            Err(InferenceError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_rejects_unsupported_artifacts() {
        let pickle = [0x80, 0x04, 0x95, 0x00];
        assert!(matches!(
            XgbModel::from_slice("xgb.joblib", &pickle),
            Err(LoadError::Unsupported { .. })
        ));

        let ranking = document("rank:pairwise", "0", vec![stump(0, 1.0, 0.1, 0.2)], vec![0]);
        assert!(matches!(
            XgbModel::from_slice("rank.json", &ranking),
            Err(LoadError::Unsupported { .. })
        ));

        let mut categorical = stump(0, 1.0, 0.1, 0.2);
        categorical["split_type"] = json!([1, 0, 0]);
        let bytes = document("binary:logistic", "0", vec![categorical], vec![0]);
        assert!(matches!(
            XgbModel::from_slice("cat.json", &bytes),
            Err(LoadError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_rejects_corrupt_artifacts() {
        assert!(matches!(
            XgbModel::from_slice("garbage.json", b"{ not json"),
            Err(LoadError::Corrupt { .. })
        ));

        let bad_feature = document("binary:logistic", "0", vec![stump(11, 1.0, 0.1, 0.2)], vec![0]);
        assert!(matches!(
            XgbModel::from_slice("feature.json", &bad_feature),
            Err(LoadError::Corrupt { .. })
        ));

        let mut cyclic = stump(0, 1.0, 0.1, 0.2);
        cyclic["left_children"] = json!([0, -1, -1]);
        let bytes = document("binary:logistic", "0", vec![cyclic], vec![0]);
        assert!(matches!(
            XgbModel::from_slice("cyclic.json", &bytes),
            Err(LoadError::Corrupt { .. })
        ));

        let bad_group = document("multi:softprob", "3", vec![stump(0, 1.0, 0.1, 0.2)], vec![5]);
        assert!(matches!(
            XgbModel::from_slice("group.json", &bad_group),
            Err(LoadError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_parse_base_score_variants() {
        assert_eq!(parse_base_score("5E-1"), Some(vec![0.5]));
        assert_eq!(parse_base_score("[5E-1]"), Some(vec![0.5]));
        assert_eq!(parse_base_score("[1E-1,2E-1]"), Some(vec![0.1, 0.2]));
        assert_eq!(parse_base_score("nan"), None);
        assert_eq!(parse_base_score("[]"), None);
    }

    #[test]
    fn test_argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5]), 1);
        assert_eq!(argmax(&[1.0]), 0);
    }
}
