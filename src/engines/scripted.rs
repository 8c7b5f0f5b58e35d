//! In-memory office backend for tests.
//!
//! Behaves like a single shared application instance: `save_as` writes out
//! whatever document is open *in the application*, not the token it was
//! handed, so overlapping open/save sequences produce crossed outputs.

use super::{AutomationHandle, OfficeBackend, OpenDocument};
use crate::error::{AppError, Result};
use crate::formats::FileFormatCode;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct Script {
    pub fail_launch: AtomicBool,
    pub hang_launch: AtomicBool,
    pub fail_save: AtomicBool,
    pub fail_quit: AtomicBool,
    pub fail_reset: AtomicBool,
    pub skip_output: AtomicBool,
    pub hang_save: AtomicBool,
    pub save_delay_ms: AtomicU64,
    pub launches: AtomicUsize,
    pub quits: AtomicUsize,
    pub resets: AtomicUsize,
    pub overlaps: AtomicUsize,
    current: Mutex<Option<PathBuf>>,
}

#[derive(Default, Clone)]
pub struct ScriptedBackend {
    script: Arc<Script>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self) -> Arc<Script> {
        Arc::clone(&self.script)
    }
}

/// What the scripted application writes for an input
pub fn rendered(content: &[u8], format: FileFormatCode) -> Vec<u8> {
    let mut out = format!("%{}%\n", format.format().extension().to_uppercase()).into_bytes();
    out.extend_from_slice(content);
    out
}

#[async_trait]
impl OfficeBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn is_available(&self) -> bool {
        !self.script.fail_launch.load(Ordering::SeqCst)
    }

    async fn launch(&self) -> Result<Box<dyn AutomationHandle>> {
        if self.script.hang_launch.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.script.fail_launch.load(Ordering::SeqCst) {
            return Err(AppError::ServiceUnavailable(
                "scripted application refused to start".to_string(),
            ));
        }
        self.script.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedHandle {
            script: Arc::clone(&self.script),
        }))
    }
}

struct ScriptedHandle {
    script: Arc<Script>,
}

#[async_trait]
impl AutomationHandle for ScriptedHandle {
    async fn open(&mut self, path: &Path) -> Result<OpenDocument> {
        if !path.exists() {
            return Err(AppError::ConversionFailed(format!(
                "Cannot open {}",
                path.display()
            )));
        }
        let mut current = self.script.current.lock().unwrap();
        if current.is_some() {
            self.script.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        *current = Some(path.to_path_buf());
        Ok(OpenDocument {
            path: path.to_path_buf(),
        })
    }

    async fn save_as(
        &mut self,
        _doc: &OpenDocument,
        output_path: &Path,
        format: FileFormatCode,
    ) -> Result<()> {
        if self.script.hang_save.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let delay = self.script.save_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.script.fail_save.load(Ordering::SeqCst) {
            return Err(AppError::ConversionFailed(
                "scripted save failure".to_string(),
            ));
        }

        let source = self
            .script
            .current
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::ConversionFailed("no document open".to_string()))?;
        if self.script.skip_output.load(Ordering::SeqCst) {
            return Ok(());
        }

        let content = tokio::fs::read(&source).await?;
        tokio::fs::write(output_path, rendered(&content, format)).await?;
        Ok(())
    }

    async fn close(&mut self, _doc: OpenDocument) -> Result<()> {
        *self.script.current.lock().unwrap() = None;
        Ok(())
    }

    async fn reset(&mut self) -> Result<()> {
        self.script.resets.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_reset.load(Ordering::SeqCst) {
            return Err(AppError::Internal("scripted reset failure".to_string()));
        }
        *self.script.current.lock().unwrap() = None;
        Ok(())
    }

    async fn quit(&mut self) -> Result<()> {
        self.script.quits.fetch_add(1, Ordering::SeqCst);
        *self.script.current.lock().unwrap() = None;
        if self.script.fail_quit.load(Ordering::SeqCst) {
            return Err(AppError::Internal("scripted quit failure".to_string()));
        }
        Ok(())
    }
}
