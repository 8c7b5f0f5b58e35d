//! Request-level conversion flow: stage the upload, hand a job to the
//! session, report the outcome and arrange for the staged files to go away.

mod cleanup;

pub use cleanup::StagedFiles;

use crate::engines::ConvertOptions;
use crate::error::{AppError, Result};
use crate::formats::{is_supported_input, ConvertFormat, INPUT_EXTENSIONS};
use crate::jobs::{ConversionJob, ConversionResult};
use crate::session::SessionManager;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

pub const DOWNLOAD_PREFIX: &str = "/download/";

/// A file received from the client
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub data: Bytes,
}

/// A converted file ready to be sent back
pub struct DownloadFile {
    pub data: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

pub struct Orchestrator {
    session: Arc<SessionManager>,
    upload_dir: PathBuf,
    output_dir: PathBuf,
    output_retention: Duration,
}

impl Orchestrator {
    pub fn new(
        session: Arc<SessionManager>,
        upload_dir: PathBuf,
        output_dir: PathBuf,
        output_retention: Duration,
    ) -> Self {
        Self {
            session,
            upload_dir,
            output_dir,
            output_retention,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Create the staging directories if they are missing
    pub async fn prepare_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::create_dir_all(&self.output_dir).await
    }

    pub async fn handle_convert(
        &self,
        upload: Upload,
        format: ConvertFormat,
        options: ConvertOptions,
    ) -> Result<ConversionResult> {
        let started = Instant::now();

        let filename = sanitize_filename(&upload.filename)?;
        let name = Path::new(&filename);
        let ext = name
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| AppError::InvalidRequest(format!("{} has no extension", filename)))?;
        if !is_supported_input(ext) {
            return Err(AppError::UnsupportedFormat(format!(
                ".{} files cannot be converted (accepted: {})",
                ext,
                INPUT_EXTENSIONS.join(", ")
            )));
        }
        let stem = name
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");

        let id = Uuid::new_v4();
        let output_name = format!("{}_{}.{}", id, stem, format.extension());
        let job = ConversionJob {
            id,
            input_path: self.upload_dir.join(format!("{}_{}", id, filename)),
            output_path: self.output_dir.join(&output_name),
            format,
            options,
        };

        let staged = StagedFiles::new(job.input_path.clone(), job.output_path.clone());
        tokio::fs::write(&job.input_path, &upload.data).await?;
        info!(
            job_id = %id,
            file = %filename,
            bytes = upload.data.len(),
            format = %format,
            "staged upload"
        );

        match self.session.convert(&job).await {
            Ok(converted) => {
                info!(
                    job_id = %id,
                    output = %converted.path.display(),
                    retention_secs = self.output_retention.as_secs(),
                    "output ready for download"
                );
                staged.schedule(self.output_retention);
                Ok(ConversionResult::converted(
                    format!("{}{}", DOWNLOAD_PREFIX, output_name),
                    converted.file_size,
                    started.elapsed(),
                ))
            }
            Err(e) => {
                staged.remove_now().await;
                Err(e)
            }
        }
    }

    /// Convert every upload, one result per upload in input order.
    ///
    /// Staging runs concurrently; the session still converts one document at
    /// a time.
    pub async fn handle_batch(
        self: &Arc<Self>,
        uploads: Vec<Upload>,
        format: ConvertFormat,
    ) -> Vec<ConversionResult> {
        let tasks: Vec<_> = uploads
            .into_iter()
            .map(|upload| {
                let this = Arc::clone(self);
                let filename = upload.filename.clone();
                let task = tokio::spawn(async move {
                    this.handle_convert(upload, format, ConvertOptions::default())
                        .await
                });
                (filename, task)
            })
            .collect();

        let (filenames, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        let joined = futures::future::join_all(handles).await;

        filenames
            .into_iter()
            .zip(joined)
            .map(|(filename, joined)| match joined {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    warn!(file = %filename, error = %e, "batch entry failed");
                    ConversionResult::failed(e.to_string())
                }
                Err(e) => {
                    warn!(file = %filename, error = %e, "batch entry aborted");
                    ConversionResult::failed(format!("Internal error: {}", e))
                }
            })
            .collect()
    }

    pub async fn open_download(&self, file_id: &str) -> Result<DownloadFile> {
        if file_id.is_empty()
            || file_id.contains(['/', '\\'])
            || file_id.contains("..")
        {
            return Err(AppError::NotFound(file_id.to_string()));
        }

        let path = self.output_dir.join(file_id);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound(file_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let filename = file_id
            .split_once('_')
            .map(|(_, rest)| rest)
            .filter(|rest| !rest.is_empty())
            .unwrap_or(file_id)
            .to_string();
        let content_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .to_string();

        Ok(DownloadFile {
            data,
            filename,
            content_type,
        })
    }
}

/// Keep only the final path component of a client-supplied name
fn sanitize_filename(raw: &str) -> Result<String> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(AppError::InvalidRequest(format!(
            "invalid file name '{}'",
            raw
        )));
    }
    Ok(name.to_string())
}
