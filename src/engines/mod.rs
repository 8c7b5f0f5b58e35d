mod libreoffice;
#[cfg(test)]
pub mod scripted;

pub use libreoffice::LibreOfficeBackend;

use crate::error::Result;
use crate::formats::FileFormatCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Caller-supplied conversion options.
///
/// These are handed to the backend untouched. No backend currently gives
/// them an effect; keys are only logged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConvertOptions(pub Map<String, Value>);

impl ConvertOptions {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// A document currently open inside an automation handle
#[derive(Debug)]
pub struct OpenDocument {
    pub path: PathBuf,
}

/// Factory for the external office application
#[async_trait]
pub trait OfficeBackend: Send + Sync {
    /// Short name used in logs and the health endpoint
    fn name(&self) -> &'static str;

    /// Check if the application is installed and answers
    async fn is_available(&self) -> bool;

    /// Start the application and hand back its automation handle
    async fn launch(&self) -> Result<Box<dyn AutomationHandle>>;
}

/// One running instance of the office application.
///
/// The handle is stateful: only one document may be open at a time, and
/// callers must go through open, save_as, close in that order.
#[async_trait]
pub trait AutomationHandle: Send {
    async fn open(&mut self, path: &Path) -> Result<OpenDocument>;

    async fn apply_options(&mut self, doc: &OpenDocument, options: &ConvertOptions) -> Result<()> {
        for key in options.keys() {
            debug!(
                document = %doc.path.display(),
                option = key,
                "conversion option has no effect on this backend"
            );
        }
        Ok(())
    }

    async fn save_as(
        &mut self,
        doc: &OpenDocument,
        output_path: &Path,
        format: FileFormatCode,
    ) -> Result<()>;

    async fn close(&mut self, doc: OpenDocument) -> Result<()>;

    /// Forget any document left open by a sequence that never reached
    /// `close`, so the next `open` starts clean.
    async fn reset(&mut self) -> Result<()>;

    /// Shut the application down. The handle is unusable afterwards.
    async fn quit(&mut self) -> Result<()>;
}
