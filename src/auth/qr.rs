use crate::chrome::{CallbackHandler, PageSurface, WaitOptions};
use crate::config::Config;
use crate::js_templates;
use crate::locators::{Locator, LocatorKey};
use crate::{MessagesError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

/// One rendered QR code. Superseded by the next frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrFrame {
    /// The image `src`, normally a `data:image/png;base64,...` URL.
    pub image_data: String,
    pub sequence: u64,
    pub received_at: DateTime<Utc>,
}

pub type FrameSink = Arc<dyn Fn(QrFrame) + Send + Sync>;

#[derive(Default)]
struct Delivery {
    active: bool,
    sequence: u64,
    last_src: Option<String>,
}

/// Watches the QR container and reports every new image.
///
/// Frames come from two places: an in-page mutation observer calling back
/// through an exposed binding, and one direct read at attach time. Both go
/// through the same gate, which numbers frames, drops a `src` identical to
/// the previous one and drops everything once detached.
pub struct QrCodeWatcher {
    page: Arc<dyn PageSurface>,
    container: Locator,
    image: Locator,
    binding: String,
    wait_ms: u64,
    delivery: Arc<Mutex<Delivery>>,
}

impl QrCodeWatcher {
    pub fn new(page: Arc<dyn PageSurface>, config: &Config) -> Self {
        Self {
            page,
            container: config.locators.get(LocatorKey::QrCode),
            image: config.locators.get(LocatorKey::QrImage),
            binding: config.auth.qr_binding.clone(),
            wait_ms: config.timeouts.element_ms,
            delivery: Arc::new(Mutex::new(Delivery::default())),
        }
    }

    fn observer_slot(&self) -> String {
        format!("{}Observer", self.binding)
    }

    pub async fn attach<F>(&self, on_frame: F) -> Result<()>
    where
        F: Fn(QrFrame) + Send + Sync + 'static,
    {
        let sink: FrameSink = Arc::new(on_frame);
        lock(&self.delivery).active = true;

        let delivery = self.delivery.clone();
        let callback_sink = sink.clone();
        let handler: CallbackHandler =
            Arc::new(move |src: String| deliver(&delivery, &callback_sink, src));
        self.page.expose_callback(&self.binding, handler).await?;

        self.page
            .wait_for_element(&self.container, WaitOptions::visible(self.wait_ms))
            .await
            .map_err(|e| match e {
                MessagesError::TimeoutExceeded { .. } => {
                    MessagesError::PreconditionNotFound(LocatorKey::QrCode.to_string())
                }
                other => other,
            })?;

        let installed = self
            .page
            .evaluate(
                &js_templates::qr_observer(),
                vec![
                    json!(self.container.expression()),
                    json!(self.binding),
                    json!(self.observer_slot()),
                ],
            )
            .await?;
        if installed == Value::Bool(false) {
            tracing::warn!("QR container vanished before the observer was installed");
        }

        // The code may have rendered before the observer existed.
        let images = self.page.query_all(&self.image).await?;
        for image in &images {
            if let Value::String(src) = self.page.read_property(image, "src").await?
                && !src.is_empty()
            {
                deliver(&self.delivery, &sink, src);
            }
        }
        self.page.release(&images).await;

        tracing::debug!("QR watcher attached");
        Ok(())
    }

    /// Stops delivery immediately, then disconnects the in-page observer.
    pub async fn detach(&self) -> Result<()> {
        {
            let mut delivery = lock(&self.delivery);
            if !delivery.active {
                return Ok(());
            }
            delivery.active = false;
        }

        self.page
            .evaluate(js_templates::DISCONNECT_OBSERVER, vec![json!(self.observer_slot())])
            .await?;
        tracing::debug!("QR watcher detached");
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.delivery).active
    }

    pub fn frames_delivered(&self) -> u64 {
        lock(&self.delivery).sequence
    }
}

fn lock(delivery: &Mutex<Delivery>) -> std::sync::MutexGuard<'_, Delivery> {
    delivery.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// The sink runs under the lock so frames leave in sequence order; it must not block.
fn deliver(delivery: &Mutex<Delivery>, sink: &FrameSink, src: String) {
    let mut state = lock(delivery);
    if !state.active || state.last_src.as_deref() == Some(src.as_str()) {
        return;
    }

    state.sequence += 1;
    state.last_src = Some(src.clone());
    tracing::debug!("QR frame #{}", state.sequence);
    sink(QrFrame {
        image_data: src,
        sequence: state.sequence,
        received_at: Utc::now(),
    });
}
