use crate::engines::ConvertOptions;
use crate::formats::ConvertFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// One request's worth of work for the office session
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub id: Uuid,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub format: ConvertFormat,
    pub options: ConvertOptions,
}

/// Outcome reported to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Seconds spent staging and converting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion_time: Option<f64>,
}

impl ConversionResult {
    pub fn converted(output_file: String, file_size: u64, elapsed: Duration) -> Self {
        Self {
            success: true,
            message: "Conversion succeeded".to_string(),
            output_file: Some(output_file),
            file_size: Some(file_size),
            conversion_time: Some(elapsed.as_secs_f64()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            output_file: None,
            file_size: None,
            conversion_time: None,
        }
    }
}
