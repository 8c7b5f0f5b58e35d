//! Exclusive owner of the office automation handle.
//!
//! Every document operation runs while holding the session mutex, so a
//! single handle never sees two open/save/close sequences interleave even
//! when requests arrive concurrently.

use crate::engines::{AutomationHandle, OfficeBackend};
use crate::error::{AppError, Result};
use crate::jobs::ConversionJob;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

/// Lifecycle of the automation handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    Ready,
    Converting,
    ShuttingDown,
}

/// A file the office application wrote and that passed the existence check
#[derive(Debug, Clone)]
pub struct ConvertedOutput {
    pub path: PathBuf,
    pub file_size: u64,
}

#[derive(Default)]
struct Slot {
    handle: Option<Box<dyn AutomationHandle>>,
    /// Set while a document operation runs; still set on the next call if
    /// that operation was dropped before reaching `close`.
    interrupted: bool,
}

pub struct SessionManager {
    backend: Arc<dyn OfficeBackend>,
    slot: Mutex<Slot>,
    phase: watch::Sender<SessionPhase>,
    timeout: Duration,
    reinit_on_timeout: bool,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn OfficeBackend>, timeout: Duration, reinit_on_timeout: bool) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Uninitialized);
        Self {
            backend,
            slot: Mutex::new(Slot::default()),
            phase,
            timeout,
            reinit_on_timeout,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Current phase; never waits for a running conversion
    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    pub fn is_available(&self) -> bool {
        matches!(self.phase(), SessionPhase::Ready | SessionPhase::Converting)
    }

    /// Start the office application unless it is already running
    pub async fn initialize(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        self.ensure_handle(&mut slot).await
    }

    /// Quit the office application. Errors are logged and dropped.
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        self.teardown(&mut slot).await;
    }

    /// Quit and relaunch the office application
    pub async fn reinitialize(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        self.teardown(&mut slot).await;
        self.ensure_handle(&mut slot).await
    }

    /// Run open → options → save → close for one job.
    ///
    /// The output file existing afterwards is the only success signal. Faults
    /// from the backend come back as `ConversionFailed` and leave the handle
    /// in place. A timeout tears it down when `reinit_on_timeout` is set and
    /// resets it otherwise.
    pub async fn convert(&self, job: &ConversionJob) -> Result<ConvertedOutput> {
        let mut slot = self.slot.lock().await;
        if slot.interrupted {
            self.recover(&mut slot).await;
        }
        self.ensure_handle(&mut slot).await?;

        if let Some(parent) = job.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.phase.send_replace(SessionPhase::Converting);
        let started = Instant::now();
        slot.interrupted = true;
        let handle = slot
            .handle
            .as_mut()
            .ok_or_else(|| AppError::Internal("office session vanished during start".to_string()))?;
        let outcome = tokio::time::timeout(self.timeout, drive(&mut **handle, job)).await;

        let driven = match outcome {
            Ok(result) => {
                slot.interrupted = false;
                result.map_err(into_conversion_failure)
            }
            Err(_) => {
                warn!(
                    job_id = %job.id,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "conversion timed out"
                );
                if self.reinit_on_timeout {
                    self.teardown(&mut slot).await;
                } else {
                    self.recover(&mut slot).await;
                }
                Err(AppError::ConversionFailed(format!(
                    "conversion timed out after {:.1}s",
                    self.timeout.as_secs_f64()
                )))
            }
        };
        if slot.handle.is_some() {
            self.phase.send_replace(SessionPhase::Ready);
        }
        drop(slot);

        if let Err(e) = driven {
            warn!(job_id = %job.id, error = %e, "conversion failed");
            return Err(e);
        }

        match tokio::fs::metadata(&job.output_path).await {
            Ok(meta) if meta.is_file() => {
                info!(
                    job_id = %job.id,
                    format = %job.format,
                    bytes = meta.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "conversion finished"
                );
                Ok(ConvertedOutput {
                    path: job.output_path.clone(),
                    file_size: meta.len(),
                })
            }
            _ => Err(AppError::ConversionFailed(format!(
                "output file was not produced: {}",
                job.output_path.display()
            ))),
        }
    }

    async fn ensure_handle(&self, slot: &mut Slot) -> Result<()> {
        if slot.handle.is_some() {
            return Ok(());
        }

        self.phase.send_replace(SessionPhase::Initializing);
        let launched = match tokio::time::timeout(self.timeout, self.backend.launch()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::ServiceUnavailable(format!(
                "{} did not start within {:.1}s",
                self.backend.name(),
                self.timeout.as_secs_f64()
            ))),
        };

        match launched {
            Ok(handle) => {
                slot.handle = Some(handle);
                slot.interrupted = false;
                self.phase.send_replace(SessionPhase::Ready);
                info!(backend = self.backend.name(), "office session ready");
                Ok(())
            }
            Err(e) => {
                self.phase.send_replace(SessionPhase::Uninitialized);
                warn!(backend = self.backend.name(), error = %e, "office session failed to start");
                Err(match e {
                    AppError::ServiceUnavailable(msg) => AppError::ServiceUnavailable(msg),
                    other => AppError::ServiceUnavailable(other.to_string()),
                })
            }
        }
    }

    /// Discard whatever an interrupted operation left open. A handle that
    /// cannot be reset is quit; the next conversion relaunches it.
    async fn recover(&self, slot: &mut Slot) {
        slot.interrupted = false;
        let Some(handle) = slot.handle.as_mut() else {
            return;
        };

        warn!(backend = self.backend.name(), "previous conversion was interrupted; resetting office session");
        let reset = tokio::time::timeout(self.timeout, handle.reset()).await;
        match reset {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "office session reset failed; restarting");
                self.teardown(slot).await;
            }
            Err(_) => {
                warn!("office session reset timed out; restarting");
                self.teardown(slot).await;
            }
        }
    }

    async fn teardown(&self, slot: &mut Slot) {
        slot.interrupted = false;
        if let Some(mut handle) = slot.handle.take() {
            self.phase.send_replace(SessionPhase::ShuttingDown);
            match tokio::time::timeout(self.timeout, handle.quit()).await {
                Ok(Ok(())) => info!(backend = self.backend.name(), "office session closed"),
                Ok(Err(e)) => warn!(error = %e, "office session did not quit cleanly"),
                Err(_) => warn!("office session did not quit in time"),
            }
        }
        self.phase.send_replace(SessionPhase::Uninitialized);
    }
}

async fn drive(handle: &mut dyn AutomationHandle, job: &ConversionJob) -> Result<()> {
    let doc = handle.open(&job.input_path).await?;

    if !job.options.is_empty() {
        if let Err(e) = handle.apply_options(&doc, &job.options).await {
            warn!(job_id = %job.id, error = %e, "conversion options were not applied");
        }
    }

    let saved = handle
        .save_as(&doc, &job.output_path, job.format.file_format_code())
        .await;
    let closed = handle.close(doc).await;

    saved?;
    closed
}

fn into_conversion_failure(e: AppError) -> AppError {
    match e {
        AppError::ConversionFailed(_) => e,
        AppError::ServiceUnavailable(msg) | AppError::Internal(msg) => AppError::ConversionFailed(msg),
        other => AppError::ConversionFailed(other.to_string()),
    }
}
