//! Terminal width change notifications.

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Subscription to terminal resizes (`SIGWINCH` on unix).
///
/// On other platforms, or when no tokio runtime is available, the watcher
/// is inert and [`ResizeWatcher::changed`] never resolves.
#[derive(Debug)]
pub struct ResizeWatcher {
    #[cfg(unix)]
    signal: Option<Signal>,
}

impl ResizeWatcher {
    pub fn new() -> Self {
        #[cfg(unix)]
        {
            let signal = if tokio::runtime::Handle::try_current().is_ok() {
                match signal(SignalKind::window_change()) {
                    Ok(sig) => Some(sig),
                    Err(e) => {
                        tracing::warn!("Failed to install SIGWINCH handler: {}", e);
                        None
                    }
                }
            } else {
                None
            };
            Self { signal }
        }

        #[cfg(not(unix))]
        {
            Self {}
        }
    }

    /// Wait for the next resize and return the new column count.
    ///
    /// Yields `None` if the terminal size could not be read after a resize.
    pub async fn changed(&mut self) -> Option<u16> {
        #[cfg(unix)]
        if let Some(sig) = self.signal.as_mut() {
            if sig.recv().await.is_some() {
                return crossterm::terminal::size().ok().map(|(columns, _)| columns);
            }
        }

        std::future::pending().await
    }
}

impl Default for ResizeWatcher {
    fn default() -> Self {
        Self::new()
    }
}
