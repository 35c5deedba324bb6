#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;

pub const CLASSES: [&str; 3] = ["CANDIDATE", "CONFIRMED", "FALSE POSITIVE"];

pub const FEATURE_NAMES: [&str; 8] = [
    "pl_orbper",
    "pl_trandurh",
    "pl_trandep",
    "pl_rade",
    "pl_insol",
    "st_tmag",
    "st_teff",
    "st_rad",
];

/// 單一切分的樹：x < threshold 走左葉，否則右葉
pub fn stump(feature: usize, threshold: f64, left: f64, right: f64) -> Value {
    json!({
        "base_weights": [0.0, left, right],
        "categories": [],
        "categories_nodes": [],
        "categories_segments": [],
        "categories_sizes": [],
        "default_left": [1, 0, 0],
        "id": 0,
        "left_children": [1, -1, -1],
        "loss_changes": [1.5, 0.0, 0.0],
        "parents": [2147483647, 0, 0],
        "right_children": [2, -1, -1],
        "split_conditions": [threshold, left, right],
        "split_indices": [feature, 0, 0],
        "split_type": [0, 0, 0],
        "sum_hessian": [10.0, 5.0, 5.0],
        "tree_param": {
            "num_deleted": "0",
            "num_feature": "8",
            "num_nodes": "3",
            "size_leaf_vector": "1"
        }
    })
}

pub fn model_json(objective: &str, trees: Vec<Value>, feature_names: &[&str]) -> String {
    let tree_info: Vec<usize> = (0..trees.len()).map(|i| i % 3).collect();
    serde_json::to_string_pretty(&json!({
        "learner": {
            "attributes": {},
            "feature_names": feature_names,
            "feature_types": feature_names.iter().map(|_| "float").collect::<Vec<_>>(),
            "gradient_booster": {
                "model": {
                    "gbtree_model_param": {
                        "num_parallel_tree": "1",
                        "num_trees": trees.len().to_string()
                    },
                    "iteration_indptr": [0, trees.len()],
                    "tree_info": tree_info,
                    "trees": trees
                },
                "name": "gbtree"
            },
            "learner_model_param": {
                "base_score": "5E-1",
                "boost_from_average": "1",
                "num_class": "3",
                "num_feature": "8",
                "num_target": "1"
            },
            "objective": {
                "name": objective,
                "softmax_multiclass_param": { "num_class": "3" }
            }
        },
        "version": [2, 0, 3]
    }))
    .unwrap()
}

/// 範例輸入會被判為 CANDIDATE (id 0)，信心約 52.54%
pub fn candidate_model() -> String {
    model_json(
        "multi:softprob",
        vec![
            stump(3, 2.0, 0.5, -0.3),
            stump(4, 100.0, 0.8, -0.2),
            stump(2, 0.001, 0.9, -0.4),
        ],
        &FEATURE_NAMES,
    )
}

/// 範例輸入會被判為 FALSE POSITIVE (id 2)
pub fn false_positive_model() -> String {
    model_json(
        "multi:softprob",
        vec![
            stump(3, 2.0, 0.1, -0.3),
            stump(4, 100.0, 0.8, -0.2),
            stump(2, 0.01, 2.0, -0.4),
        ],
        &FEATURE_NAMES,
    )
}

pub fn softmax_model() -> String {
    model_json(
        "multi:softmax",
        vec![
            stump(3, 2.0, 0.5, -0.3),
            stump(4, 100.0, 0.8, -0.2),
            stump(2, 0.001, 0.9, -0.4),
        ],
        &[],
    )
}

pub fn encoder_json(classes: &[&str]) -> String {
    serde_json::to_string(&json!({ "classes": classes })).unwrap()
}

pub fn write_artifacts(dir: &Path, model: &str, classes: &[&str]) {
    std::fs::write(dir.join("xgb.json"), model).unwrap();
    std::fs::write(dir.join("disp_encode.json"), encoder_json(classes)).unwrap();
}

pub fn sample_fields() -> HashMap<String, Value> {
    let values = [12.34, 3.5, 0.0012, 1.1, 250.6, 10.3, 5500.0, 0.9];
    FEATURE_NAMES
        .iter()
        .zip(values)
        .map(|(name, value)| (name.to_string(), json!(value)))
        .collect()
}

/// candidate_model 會判為 FALSE POSITIVE 的輸入
pub fn false_positive_fields() -> HashMap<String, Value> {
    let mut fields = sample_fields();
    fields.insert("pl_rade".to_string(), json!(3.0));
    fields.insert("pl_trandep".to_string(), json!(0.0005));
    fields
}
