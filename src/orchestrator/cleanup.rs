use std::io::ErrorKind;
use std::mem;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Staged input and output of one job, deleted exactly once.
///
/// Either `schedule` or `remove_now` consumes the guard. A guard dropped
/// without either (request cancelled mid-conversion) still removes both
/// files.
#[derive(Debug)]
pub struct StagedFiles {
    input: PathBuf,
    output: PathBuf,
    armed: bool,
}

impl StagedFiles {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Self {
            input,
            output,
            armed: true,
        }
    }

    /// Drop the input now and the output once `retention` has passed
    pub fn schedule(mut self, retention: Duration) {
        let (input, output) = self.disarm();
        tokio::spawn(async move {
            remove_quietly(&input).await;
            tokio::time::sleep(retention).await;
            remove_quietly(&output).await;
        });
    }

    pub async fn remove_now(mut self) {
        let (input, output) = self.disarm();
        remove_quietly(&input).await;
        remove_quietly(&output).await;
    }

    fn disarm(&mut self) -> (PathBuf, PathBuf) {
        self.armed = false;
        (mem::take(&mut self.input), mem::take(&mut self.output))
    }
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let (input, output) = self.disarm();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    remove_quietly(&input).await;
                    remove_quietly(&output).await;
                });
            }
            Err(_) => {
                for path in [input, output] {
                    if let Err(e) = std::fs::remove_file(&path) {
                        if e.kind() != ErrorKind::NotFound {
                            warn!(path = %path.display(), error = %e, "failed to remove staged file");
                        }
                    }
                }
            }
        }
    }
}

pub async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed staged file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove staged file"),
    }
}
