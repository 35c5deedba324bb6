use crate::utils::error::{InferenceError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// 模型訓練時使用的八個特徵，順序即為訓練順序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    PlOrbper,
    PlTrandurh,
    PlTrandep,
    PlRade,
    PlInsol,
    StTmag,
    StTeff,
    StRad,
}

pub const FEATURE_COUNT: usize = 8;

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::PlOrbper,
        Feature::PlTrandurh,
        Feature::PlTrandep,
        Feature::PlRade,
        Feature::PlInsol,
        Feature::StTmag,
        Feature::StTeff,
        Feature::StRad,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::PlOrbper => "pl_orbper",
            Self::PlTrandurh => "pl_trandurh",
            Self::PlTrandep => "pl_trandep",
            Self::PlRade => "pl_rade",
            Self::PlInsol => "pl_insol",
            Self::StTmag => "st_tmag",
            Self::StTeff => "st_teff",
            Self::StRad => "st_rad",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PlOrbper => "Orbital Period",
            Self::PlTrandurh => "Transit Duration",
            Self::PlTrandep => "Transit Depth",
            Self::PlRade => "Planet Radius",
            Self::PlInsol => "Insolation Flux",
            Self::StTmag => "Star Magnitude",
            Self::StTeff => "Star Temperature",
            Self::StRad => "Star Radius",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Self::PlOrbper => "days for one orbit",
            Self::PlTrandurh => "hours of transit",
            Self::PlTrandep => "brightness decrease",
            Self::PlRade => "Earth radii",
            Self::PlInsol => "energy received",
            Self::StTmag => "brightness value",
            Self::StTeff => "Kelvin",
            Self::StRad => "solar radii",
        }
    }

    /// 表單預填的示範數值，僅供 `FeatureVector::sample` 使用
    pub fn sample_value(&self) -> f64 {
        match self {
            Self::PlOrbper => 12.34,
            Self::PlTrandurh => 3.5,
            Self::PlTrandep => 0.0012,
            Self::PlRade => 1.1,
            Self::PlInsol => 250.6,
            Self::StTmag => 10.3,
            Self::StTeff => 5500.0,
            Self::StRad => 0.9,
        }
    }

    pub fn is_stellar(&self) -> bool {
        matches!(self, Self::StTmag | Self::StTeff | Self::StRad)
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn info(&self) -> FeatureInfo {
        FeatureInfo {
            index: self.index(),
            name: self.name(),
            label: self.label(),
            unit: self.unit(),
            sample: self.sample_value(),
            group: if self.is_stellar() { "stellar" } else { "planetary" },
        }
    }

    pub fn catalogue() -> Vec<FeatureInfo> {
        Feature::ALL.iter().map(Feature::info).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureInfo {
    pub index: usize,
    pub name: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub sample: f64,
    pub group: &'static str,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self> {
        Feature::ALL
            .iter()
            .copied()
            .find(|feature| feature.name() == s)
            .ok_or_else(|| InferenceError::invalid_input(s, "unknown feature"))
    }
}

/// 一筆已驗證的特徵向量：八個有限浮點數，依訓練順序排列
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "HashMap<String, f64>")]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Result<Self> {
        for (feature, value) in Feature::ALL.iter().zip(values.iter()) {
            check_finite(*feature, *value)?;
        }
        Ok(Self { values })
    }

    /// 從欄位名稱對應的值建立向量。欄位必須剛好是八個訓練特徵，
    /// 值可以是 JSON 數字或可解析為數字的字串。
    pub fn from_fields(fields: &HashMap<String, serde_json::Value>) -> Result<Self> {
        if let Some(unknown) = fields
            .keys()
            .find(|name| name.parse::<Feature>().is_err())
        {
            return Err(InferenceError::invalid_input(
                unknown.as_str(),
                "unknown feature",
            ));
        }

        let mut values = [0.0; FEATURE_COUNT];
        for feature in Feature::ALL {
            let raw = fields
                .get(feature.name())
                .ok_or_else(|| InferenceError::invalid_input(feature.name(), "missing value"))?;
            values[feature.index()] = parse_value(feature, raw)?;
        }

        Self::new(values)
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let fields = pairs
            .into_iter()
            .map(|(name, value)| {
                (
                    name.trim().to_string(),
                    serde_json::Value::String(value.to_string()),
                )
            })
            .collect::<HashMap<_, _>>();
        Self::from_fields(&fields)
    }

    pub fn sample() -> Self {
        Self {
            values: Feature::ALL.map(|feature| feature.sample_value()),
        }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    /// 單列資料，順序與訓練時一致
    pub fn as_row(&self) -> &[f64] {
        &self.values
    }
}

impl From<FeatureVector> for HashMap<String, f64> {
    fn from(vector: FeatureVector) -> Self {
        Feature::ALL
            .iter()
            .map(|feature| (feature.name().to_string(), vector.get(*feature)))
            .collect()
    }
}

impl<'de> Deserialize<'de> for FeatureVector {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let fields = HashMap::<String, serde_json::Value>::deserialize(deserializer)?;
        FeatureVector::from_fields(&fields).map_err(serde::de::Error::custom)
    }
}

fn parse_value(feature: Feature, raw: &serde_json::Value) -> Result<f64> {
    let value = match raw {
        serde_json::Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| InferenceError::invalid_input(feature.name(), "number out of range"))?,
        serde_json::Value::String(text) => text.trim().parse::<f64>().map_err(|_| {
            InferenceError::invalid_input(feature.name(), format!("'{}' is not a number", text))
        })?,
        serde_json::Value::Null => {
            return Err(InferenceError::invalid_input(feature.name(), "missing value"))
        }
        other => {
            return Err(InferenceError::invalid_input(
                feature.name(),
                format!("expected a number, got {}", other),
            ))
        }
    };
    check_finite(feature, value)?;
    Ok(value)
}

fn check_finite(feature: Feature, value: f64) -> Result<()> {
    if value.is_nan() {
        return Err(InferenceError::invalid_input(feature.name(), "value is NaN"));
    }
    if value.is_infinite() {
        return Err(InferenceError::invalid_input(feature.name(), "value is infinite"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub label: String,
    pub class_id: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}
