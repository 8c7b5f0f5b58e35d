use super::{AutomationHandle, OfficeBackend, OpenDocument};
use crate::error::{AppError, Result};
use crate::formats::{ConvertFormat, FileFormatCode};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

pub struct LibreOfficeBackend {
    /// Path to LibreOffice/soffice executable
    soffice_path: Option<String>,
}

impl LibreOfficeBackend {
    pub fn new() -> Self {
        Self { soffice_path: None }
    }

    #[cfg(test)]
    pub fn with_soffice_path(mut self, path: String) -> Self {
        self.soffice_path = Some(path);
        self
    }

    fn get_soffice_path(&self) -> String {
        if let Some(path) = &self.soffice_path {
            return path.clone();
        }

        if let Ok(path) = std::env::var("SOFFICE_PATH") {
            return path;
        }

        if cfg!(target_os = "macos") {
            "/Applications/LibreOffice.app/Contents/MacOS/soffice".to_string()
        } else if cfg!(target_os = "windows") {
            r"C:\Program Files\LibreOffice\program\soffice.exe".to_string()
        } else {
            for path in &["/usr/bin/soffice", "/usr/bin/libreoffice"] {
                if Path::new(path).exists() {
                    return path.to_string();
                }
            }
            "soffice".to_string()
        }
    }
}

impl Default for LibreOfficeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OfficeBackend for LibreOfficeBackend {
    fn name(&self) -> &'static str {
        "libreoffice"
    }

    async fn is_available(&self) -> bool {
        Command::new(self.get_soffice_path())
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn launch(&self) -> Result<Box<dyn AutomationHandle>> {
        let soffice_path = self.get_soffice_path();
        if !self.is_available().await {
            return Err(AppError::ServiceUnavailable(format!(
                "LibreOffice not found at {}",
                soffice_path
            )));
        }

        // Each session gets its own profile so it never collides with a
        // desktop instance of the same user.
        let profile = tempfile::Builder::new()
            .prefix("officemill-profile-")
            .tempdir()?;
        info!(
            soffice = %soffice_path,
            profile = %profile.path().display(),
            "LibreOffice session started"
        );

        Ok(Box::new(LibreOfficeSession {
            soffice_path,
            profile: Some(profile),
            open_document: None,
        }))
    }
}

struct LibreOfficeSession {
    soffice_path: String,
    profile: Option<TempDir>,
    open_document: Option<PathBuf>,
}

impl LibreOfficeSession {
    fn profile_url(&self) -> Result<String> {
        let profile = self
            .profile
            .as_ref()
            .ok_or_else(|| AppError::ConversionFailed("LibreOffice session has quit".to_string()))?;
        Ok(format!("file://{}", profile.path().display()))
    }
}

#[async_trait]
impl AutomationHandle for LibreOfficeSession {
    async fn open(&mut self, path: &Path) -> Result<OpenDocument> {
        if let Some(current) = &self.open_document {
            return Err(AppError::ConversionFailed(format!(
                "{} is still open",
                current.display()
            )));
        }

        let meta = tokio::fs::metadata(path).await.map_err(|e| {
            AppError::ConversionFailed(format!("Cannot open {}: {}", path.display(), e))
        })?;
        if !meta.is_file() {
            return Err(AppError::ConversionFailed(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let path = path.canonicalize()?;
        self.open_document = Some(path.clone());
        Ok(OpenDocument { path })
    }

    async fn save_as(
        &mut self,
        doc: &OpenDocument,
        output_path: &Path,
        format: FileFormatCode,
    ) -> Result<()> {
        let target = format.format();
        let scratch = tempfile::tempdir()?;

        info!(
            "Converting {} to {} using LibreOffice",
            doc.path.display(),
            target
        );

        let output = Command::new(&self.soffice_path)
            .arg(format!("-env:UserInstallation={}", self.profile_url()?))
            .arg("--headless")
            .arg("--norestore")
            .arg("--convert-to")
            .arg(export_filter(target))
            .arg("--outdir")
            .arg(scratch.path())
            .arg(&doc.path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::ConversionFailed(format!("LibreOffice did not start: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::ConversionFailed(format!(
                "LibreOffice conversion failed: {}",
                stderr.trim()
            )));
        }

        // LibreOffice names the result after the input stem
        let stem = doc
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        let produced = scratch.path().join(format!("{}.{}", stem, target.extension()));
        if !produced.exists() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(AppError::ConversionFailed(format!(
                "LibreOffice produced no {} file: {}",
                target,
                stdout.trim()
            )));
        }

        move_file(&produced, output_path).await?;
        debug!(output = %output_path.display(), "saved converted document");
        Ok(())
    }

    async fn close(&mut self, doc: OpenDocument) -> Result<()> {
        if self.open_document.as_deref() == Some(doc.path.as_path()) {
            self.open_document = None;
        }
        Ok(())
    }

    async fn reset(&mut self) -> Result<()> {
        if let Some(stale) = self.open_document.take() {
            debug!(document = %stale.display(), "discarded document from interrupted conversion");
        }
        Ok(())
    }

    async fn quit(&mut self) -> Result<()> {
        self.open_document = None;
        if let Some(profile) = self.profile.take() {
            profile.close()?;
        }
        Ok(())
    }
}

/// `--convert-to` argument for each target format
fn export_filter(format: ConvertFormat) -> &'static str {
    match format {
        ConvertFormat::Pdf => "pdf:writer_pdf_Export",
        ConvertFormat::Doc => "doc:MS Word 97",
        ConvertFormat::Docx => "docx:MS Word 2007 XML",
        ConvertFormat::Txt => "txt:Text (encoded):UTF8",
        ConvertFormat::Html => "html:HTML (StarWriter)",
        ConvertFormat::Rtf => "rtf:Rich Text Format",
    }
}

/// Rename, falling back to copy when the scratch dir sits on another filesystem
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}
