use crate::adapters::label_encoder::LabelEncoder;
use crate::adapters::xgboost::XgbModel;
use crate::core::{ArtifactStore, ClassificationResult, Classifier, Feature, FeatureVector};
use crate::domain::model::FEATURE_COUNT;
use crate::utils::error::{LoadError, Result};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    pub model_path: String,
    pub encoder_path: String,
}

impl ArtifactPaths {
    pub fn new(model_path: impl Into<String>, encoder_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            encoder_path: encoder_path.into(),
        }
    }
}

/// 一組配對的模型與編碼器。載入後不再修改，以 `Arc` 在請求間共享。
pub struct Artifacts {
    model: Arc<dyn Classifier>,
    encoder: LabelEncoder,
    source: Option<ArtifactPaths>,
}

impl std::fmt::Debug for Artifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifacts")
            .field("encoder", &self.encoder)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub model: String,
    pub num_features: usize,
    pub num_classes: usize,
    pub supports_probabilities: bool,
    pub classes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ArtifactPaths>,
}

impl Artifacts {
    pub fn new(model: Arc<dyn Classifier>, encoder: LabelEncoder) -> Self {
        Self {
            model,
            encoder,
            source: None,
        }
    }

    pub fn with_source(mut self, source: ArtifactPaths) -> Self {
        self.source = Some(source);
        self
    }

    pub fn model(&self) -> &dyn Classifier {
        self.model.as_ref()
    }

    pub fn encoder(&self) -> &LabelEncoder {
        &self.encoder
    }

    pub fn source(&self) -> Option<&ArtifactPaths> {
        self.source.as_ref()
    }

    pub fn classify(&self, features: &FeatureVector) -> Result<ClassificationResult> {
        classify(self.model(), &self.encoder, features)
    }

    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            model: self.model.describe(),
            num_features: self.model.num_features(),
            num_classes: self.model.num_classes(),
            supports_probabilities: self.model.supports_probabilities(),
            classes: self.encoder.classes().to_vec(),
            source: self.source.clone(),
        }
    }
}

/// 讀取並解析模型與編碼器。任何一個檔案缺少、無法讀取或格式錯誤都會回傳 `LoadError`。
pub async fn load_artifacts<S: ArtifactStore>(
    store: &S,
    model_path: &str,
    encoder_path: &str,
) -> Result<Artifacts> {
    tracing::info!("📦 Loading model from {}", model_path);
    tracing::info!("📦 Loading label encoder from {}", encoder_path);

    let (model_bytes, encoder_bytes) = tokio::try_join!(
        store.read_artifact(model_path),
        store.read_artifact(encoder_path)
    )?;

    let model = XgbModel::from_slice(model_path, &model_bytes)?;
    let encoder = LabelEncoder::from_slice(encoder_path, &encoder_bytes)?;
    check_feature_layout(&model)?;

    if model.num_classes() != encoder.len() {
        tracing::warn!(
            "⚠️ Model predicts {} classes but the label encoder knows {}; unknown ids will fail to decode",
            model.num_classes(),
            encoder.len()
        );
    }

    tracing::info!(
        "✅ Artifacts loaded: {} / classes {:?}",
        model.describe(),
        encoder.classes()
    );

    Ok(Artifacts::new(Arc::new(model), encoder)
        .with_source(ArtifactPaths::new(model_path, encoder_path)))
}

/// 確認模型的輸入欄位與訓練順序一致
pub fn check_feature_layout(model: &dyn Classifier) -> std::result::Result<(), LoadError> {
    if model.num_features() != FEATURE_COUNT {
        return Err(LoadError::Mismatch {
            message: format!(
                "model expects {} features, this service provides {}",
                model.num_features(),
                FEATURE_COUNT
            ),
        });
    }

    if let Some(names) = model.feature_names() {
        let expected: Vec<&str> = Feature::ALL.iter().map(|f| f.name()).collect();
        if names.iter().map(String::as_str).ne(expected.iter().copied()) {
            return Err(LoadError::Mismatch {
                message: format!(
                    "model was trained on {:?}, expected {:?}",
                    names, expected
                ),
            });
        }
    }

    Ok(())
}

pub fn classify(
    model: &dyn Classifier,
    encoder: &LabelEncoder,
    features: &FeatureVector,
) -> Result<ClassificationResult> {
    let row = features.as_row();

    let class_id = model.predict(row)?;
    let label = encoder.inverse_transform(class_id)?.to_string();

    // 機率是選用能力，不支援時只省略信心值
    let confidence = if model.supports_probabilities() {
        let proba = model.predict_proba(row)?;
        proba
            .into_iter()
            .reduce(f64::max)
            .map(|p| (p * 100.0).clamp(0.0, 100.0))
    } else {
        None
    };

    tracing::debug!(
        "Classified {:?} as {} (id {}, confidence {:?})",
        row,
        label,
        class_id,
        confidence
    );

    Ok(ClassificationResult {
        label,
        class_id,
        confidence,
    })
}

/// 持有目前服務中的模型組合。重新載入時整組替換，讀取端只會看到舊組或新組。
pub struct InferenceService {
    current: RwLock<Arc<Artifacts>>,
    // 同一時間只允許一個 reload，從讀檔持有到換上新組合
    reload_lock: tokio::sync::Mutex<()>,
}

impl InferenceService {
    pub fn new(artifacts: Artifacts) -> Self {
        Self {
            current: RwLock::new(Arc::new(artifacts)),
            reload_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn load<S: ArtifactStore>(
        store: &S,
        model_path: &str,
        encoder_path: &str,
    ) -> Result<Self> {
        let artifacts = load_artifacts(store, model_path, encoder_path).await?;
        Ok(Self::new(artifacts))
    }

    /// 重新載入並回傳這次換上的組合；失敗時保留原本的模型組合。
    /// 同時發出的 reload 會依序執行。
    pub async fn reload<S: ArtifactStore>(
        &self,
        store: &S,
        model_path: &str,
        encoder_path: &str,
    ) -> Result<Arc<Artifacts>> {
        let _guard = self.reload_lock.lock().await;

        match load_artifacts(store, model_path, encoder_path).await {
            Ok(artifacts) => {
                let installed = Arc::new(artifacts);
                self.swap(Arc::clone(&installed));
                tracing::info!("🔄 Artifacts reloaded");
                Ok(installed)
            }
            Err(e) => {
                tracing::error!("❌ Reload failed, keeping current artifacts: {}", e);
                Err(e)
            }
        }
    }

    /// 換上新的模型組合並回傳舊的
    pub fn replace(&self, artifacts: Artifacts) -> Arc<Artifacts> {
        self.swap(Arc::new(artifacts))
    }

    fn swap(&self, next: Arc<Artifacts>) -> Arc<Artifacts> {
        std::mem::replace(&mut *self.current.write(), next)
    }

    pub fn snapshot(&self) -> Arc<Artifacts> {
        self.current.read().clone()
    }

    pub fn classify(&self, features: &FeatureVector) -> Result<ClassificationResult> {
        self.snapshot().classify(features)
    }

    pub fn classify_fields(
        &self,
        fields: &HashMap<String, serde_json::Value>,
    ) -> Result<ClassificationResult> {
        let features = FeatureVector::from_fields(fields)?;
        self.classify(&features)
    }

    /// 同一批次使用同一份快照
    pub fn classify_batch(
        &self,
        items: &[HashMap<String, serde_json::Value>],
    ) -> Vec<Result<ClassificationResult>> {
        let artifacts = self.snapshot();
        items
            .iter()
            .map(|fields| {
                let features = FeatureVector::from_fields(fields)?;
                artifacts.classify(&features)
            })
            .collect()
    }
}
