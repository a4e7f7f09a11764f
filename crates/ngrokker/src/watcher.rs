//! Process failure watcher
//!
//! ngrok writes nothing to stderr while it runs normally. The watcher reads
//! stderr to EOF; any captured text, or a failing exit status when there
//! was none, is reported as the reason the tunnel could not start.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::oneshot;

use crate::classify::Classifier;
use crate::error::TunnelError;
use crate::process::ExitWatch;

/// Watches one ngrok process for failure
#[derive(Debug, Clone)]
pub struct ProcessWatcher {
    classifier: Classifier,
    verbose: bool,
}

impl ProcessWatcher {
    /// Create a watcher using `classifier` for captured output
    pub fn new(classifier: Classifier, verbose: bool) -> Self {
        Self {
            classifier,
            verbose,
        }
    }

    /// Determine whether the process failed.
    ///
    /// Returns `None` when the stream closed empty and the process exited
    /// cleanly (or its status could not be collected).
    pub async fn watch<R>(&self, mut stderr: R, mut exit: ExitWatch) -> Option<TunnelError>
    where
        R: AsyncRead + Unpin,
    {
        let mut output = Vec::new();
        if let Err(e) = stderr.read_to_end(&mut output).await {
            return Some(TunnelError::Io(e));
        }

        if !output.is_empty() {
            if self.verbose {
                tracing::warn!(
                    "ngrok wrote to stderr: {}",
                    String::from_utf8_lossy(&output).trim_end()
                );
            }
            return Some(self.classifier.classify(&output));
        }

        match exit.wait().await {
            Some(status) if !status.success() => Some(TunnelError::ProcessExited(status)),
            Some(_) => {
                if self.verbose {
                    tracing::debug!("ngrok exited cleanly");
                }
                None
            }
            None => None,
        }
    }

    /// Run the watcher and deliver a failure, if any, into `slot`
    pub async fn run<R>(self, stderr: R, exit: ExitWatch, slot: oneshot::Sender<TunnelError>)
    where
        R: AsyncRead + Unpin,
    {
        if let Some(err) = self.watch(stderr, exit).await {
            // Receiver is gone once open() has settled
            let _ = slot.send(err);
        }
    }
}
