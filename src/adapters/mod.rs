// Adapters layer: concrete implementations for external systems (artifact formats, storage, http).

pub mod http;
pub mod label_encoder;
pub mod storage;
pub mod xgboost;

use crate::utils::error::LoadError;

/// Python pickle (protocol 2+) 以 0x80 加上協定版本開頭；joblib 未壓縮時也是 pickle。
pub(crate) fn reject_pickle(path: &str, bytes: &[u8]) -> Result<(), LoadError> {
    if bytes.is_empty() {
        return Err(LoadError::Corrupt {
            path: path.to_string(),
            message: "file is empty".to_string(),
        });
    }

    if bytes.len() >= 2 && bytes[0] == 0x80 && (2..=5).contains(&bytes[1]) {
        return Err(LoadError::Unsupported {
            path: path.to_string(),
            message: "looks like a Python pickle/joblib artifact; export it as JSON".to_string(),
        });
    }

    Ok(())
}
