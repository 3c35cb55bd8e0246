use crate::chrome::PageSignal;
use crate::config::{AuthConfig, SignalSource};
use crate::{MessagesError, Result};
use regex::Regex;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

/// Recognizes the page event that means pairing went through.
#[derive(Debug, Clone)]
pub struct AuthSignalDetector {
    source: SignalSource,
    pattern: Regex,
}

impl AuthSignalDetector {
    pub fn new(source: SignalSource, pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            MessagesError::ConfigError(format!("invalid auth signal pattern '{}': {}", pattern, e))
        })?;
        Ok(Self { source, pattern })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Self::new(config.signal_source, &config.signal_pattern)
    }

    pub fn matches(&self, signal: &PageSignal) -> bool {
        let source_ok = match (self.source, signal) {
            (SignalSource::Any, _) => true,
            (SignalSource::Navigation, PageSignal::Navigated(_)) => true,
            (SignalSource::Request, PageSignal::Request(_)) => true,
            _ => false,
        };
        source_ok && self.pattern.is_match(signal.url())
    }

    /// Starts listening. Subscribe before triggering anything that could
    /// produce the signal, or it may be missed.
    pub fn arm(self, mut signals: broadcast::Receiver<PageSignal>) -> ArmedDetector {
        let (tx, rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            loop {
                match signals.recv().await {
                    Ok(signal) if self.matches(&signal) => {
                        tracing::info!("Authenticated signal: {}", signal.url());
                        tx.send(signal.url().to_string()).ok();
                        break;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Signal listener lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        ArmedDetector {
            fired: rx,
            done: false,
            task,
        }
    }
}

/// A detector that fires at most once. The listener task exits on the first
/// match; dropping the handle tears it down if it has not.
pub struct ArmedDetector {
    fired: oneshot::Receiver<String>,
    done: bool,
    task: JoinHandle<()>,
}

impl ArmedDetector {
    /// Resolves with the matching URL, or `None` once the page can no longer
    /// produce signals. Resolves again with `None` after having fired.
    pub async fn fired(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        // A oneshot receiver must not be polled again once it has resolved.
        let result = (&mut self.fired).await.ok();
        self.done = true;
        result
    }

    pub fn disarm(self) {}
}

impl Drop for ArmedDetector {
    fn drop(&mut self) {
        self.task.abort();
    }
}
