use crate::core::service::Artifacts;
use crate::core::{Feature, FeatureVector};
use crate::utils::error::{InferenceError, Result};
use std::collections::HashSet;
use std::io::{Read, Write};

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// 原樣輸出到結果檔的識別欄位，例如 `kepoi_name`
    pub id_column: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub rows: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// 逐列分類 CSV。欄位順序不限，輸出前會依訓練順序排列；
/// 單列失敗只會寫入 `error` 欄位，不會中斷整批。
pub fn classify_csv<R: Read, W: Write>(
    artifacts: &Artifacts,
    input: R,
    output: W,
    options: &BatchOptions,
) -> Result<BatchSummary> {
    // 欄位數不符的列逐列回報，不讓 csv 直接中斷整批
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);
    let headers = reader.headers()?.clone();

    let id_index = check_headers(&headers, options)?;

    let mut writer = csv::Writer::from_writer(output);
    let mut out_header = Vec::with_capacity(5);
    if let Some(id_column) = &options.id_column {
        out_header.push(id_column.as_str());
    }
    out_header.extend(["label", "class_id", "confidence", "error"]);
    writer.write_record(&out_header)?;

    let mut summary = BatchSummary::default();
    for record in reader.records() {
        summary.rows += 1;

        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                // 例如非 UTF-8 內容，只寫入 error 欄位
                summary.failed += 1;
                tracing::warn!("Row {} could not be read: {}", summary.rows, e);
                let mut row = vec![String::new(); out_header.len() - 1];
                row.push(e.to_string());
                writer.write_record(&row)?;
                continue;
            }
        };

        let outcome = if record.len() != headers.len() {
            Err(InferenceError::invalid_input(
                "row",
                format!("expected {} cells, found {}", headers.len(), record.len()),
            ))
        } else {
            let pairs = headers
                .iter()
                .zip(record.iter())
                .enumerate()
                .filter(|(i, _)| Some(*i) != id_index)
                .map(|(_, pair)| pair);
            FeatureVector::from_pairs(pairs).and_then(|f| artifacts.classify(&f))
        };

        let mut row: Vec<String> = Vec::with_capacity(5);
        if let Some(index) = id_index {
            row.push(record.get(index).unwrap_or_default().to_string());
        }
        match outcome {
            Ok(result) => {
                summary.succeeded += 1;
                row.push(result.label);
                row.push(result.class_id.to_string());
                row.push(
                    result
                        .confidence
                        .map(|c| format!("{:.1}", c))
                        .unwrap_or_default(),
                );
                row.push(String::new());
            }
            Err(e) => {
                summary.failed += 1;
                tracing::warn!("Row {} failed: {}", summary.rows, e);
                row.extend([String::new(), String::new(), String::new(), e.to_string()]);
            }
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;

    tracing::info!(
        "📊 Batch finished: {} rows, {} succeeded, {} failed",
        summary.rows,
        summary.succeeded,
        summary.failed
    );

    Ok(summary)
}

fn check_headers(headers: &csv::StringRecord, options: &BatchOptions) -> Result<Option<usize>> {
    let mut seen = HashSet::new();
    if let Some(duplicate) = headers.iter().find(|h| !seen.insert(*h)) {
        return Err(InferenceError::invalid_input(duplicate, "duplicate column"));
    }

    let id_index = match &options.id_column {
        Some(id_column) if id_column.parse::<Feature>().is_ok() => {
            return Err(InferenceError::invalid_input(
                id_column.as_str(),
                "id column cannot be a feature column",
            ))
        }
        Some(id_column) => Some(
            headers
                .iter()
                .position(|h| h == id_column.as_str())
                .ok_or_else(|| {
                    InferenceError::invalid_input(id_column.as_str(), "id column not found in header")
                })?,
        ),
        None => None,
    };

    for (i, header) in headers.iter().enumerate() {
        if Some(i) != id_index && header.parse::<Feature>().is_err() {
            return Err(InferenceError::invalid_input(header, "unexpected column"));
        }
    }

    for feature in Feature::ALL {
        if !headers.iter().any(|h| h == feature.name()) {
            return Err(InferenceError::invalid_input(feature.name(), "missing column"));
        }
    }

    Ok(id_index)
}
