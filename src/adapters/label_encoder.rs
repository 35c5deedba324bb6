use crate::adapters::reject_pickle;
use crate::utils::error::{InferenceError, LoadError, Result};
use serde::Deserialize;
use std::collections::HashSet;

/// 類別編號與名稱的對照表，等同 scikit-learn `LabelEncoder.classes_`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEncoder {
    Object { classes: Vec<String> },
    List(Vec<String>),
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> std::result::Result<Self, LoadError> {
        Self::checked("<memory>", classes)
    }

    pub fn from_slice(path: &str, bytes: &[u8]) -> std::result::Result<Self, LoadError> {
        reject_pickle(path, bytes)?;

        let raw: RawEncoder = serde_json::from_slice(bytes).map_err(|e| LoadError::Corrupt {
            path: path.to_string(),
            message: format!("expected {{\"classes\": [...]}} or a JSON array of labels: {}", e),
        })?;
        let classes = match raw {
            RawEncoder::Object { classes } => classes,
            RawEncoder::List(classes) => classes,
        };

        Self::checked(path, classes)
    }

    fn checked(path: &str, classes: Vec<String>) -> std::result::Result<Self, LoadError> {
        let corrupt = |message: String| LoadError::Corrupt {
            path: path.to_string(),
            message,
        };

        if classes.is_empty() {
            return Err(corrupt("encoder has no classes".to_string()));
        }
        if let Some(position) = classes.iter().position(|c| c.trim().is_empty()) {
            return Err(corrupt(format!("class {} has an empty label", position)));
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = classes.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(corrupt(format!("duplicate class label '{}'", duplicate)));
        }

        Ok(Self { classes })
    }

    pub fn inverse_transform(&self, class_id: usize) -> Result<&str> {
        self.classes
            .get(class_id)
            .map(String::as_str)
            .ok_or(InferenceError::Decode {
                class_id,
                known_classes: self.classes.len(),
            })
    }

    pub fn transform(&self, label: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == label)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
