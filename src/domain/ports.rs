use crate::utils::error::Result;

/// 讀取模型與編碼器檔案的儲存來源
pub trait ArtifactStore: Send + Sync {
    fn read_artifact(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
}

/// 已載入、不可變的分類模型。實作必須可同時被多個請求讀取。
pub trait Classifier: Send + Sync {
    /// 模型預期的輸入欄位數
    fn num_features(&self) -> usize;

    fn num_classes(&self) -> usize;

    /// 檔案內記錄的訓練欄位名稱；沒有記錄時回傳 `None`
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// 回傳單列資料的內部類別編號
    fn predict(&self, row: &[f64]) -> Result<usize>;

    /// 模型是否能輸出各類別機率。不支援時 `predict_proba` 不會被呼叫。
    fn supports_probabilities(&self) -> bool;

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>>;

    /// 給 `inspect` 與健康檢查使用的簡短描述
    fn describe(&self) -> String;
}
