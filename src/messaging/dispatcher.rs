use super::inbox::{self, Conversation};
use super::{OutboundMessage, SendResult};
use crate::chrome::{ClickOptions, ElementRef, PageSurface, TypeOptions, WaitOptions, WaitPolicy};
use crate::config::Config;
use crate::locators::LocatorKey;
use crate::timeouts::ms;
use crate::{MessagesError, Result};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One send is tried at most this many times; the second attempt follows a reload.
const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStep {
    Compose,
    RecipientInput,
    ConfirmContact,
    MessageInput,
    SendButton,
    StatusMessage,
}

impl DispatchStep {
    /// Steps whose absence means the compose view had not settled yet.
    const RELOADABLE: [DispatchStep; 3] = [
        DispatchStep::RecipientInput,
        DispatchStep::ConfirmContact,
        DispatchStep::MessageInput,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStep::Compose => "compose",
            DispatchStep::RecipientInput => "recipient-input",
            DispatchStep::ConfirmContact => "confirm-contact",
            DispatchStep::MessageInput => "message-input",
            DispatchStep::SendButton => "send-button",
            DispatchStep::StatusMessage => "status-message",
        }
    }

    fn locator_key(&self) -> Option<LocatorKey> {
        match self {
            DispatchStep::Compose => None,
            DispatchStep::RecipientInput => Some(LocatorKey::ContactInput),
            DispatchStep::ConfirmContact => Some(LocatorKey::ContactConfirm),
            DispatchStep::MessageInput => Some(LocatorKey::MessageInput),
            DispatchStep::SendButton => Some(LocatorKey::SendButton),
            DispatchStep::StatusMessage => Some(LocatorKey::StatusMessage),
        }
    }

    fn missing(&self) -> MessagesError {
        MessagesError::ElementNotFound {
            step: self.as_str().to_string(),
        }
    }
}

impl fmt::Display for DispatchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_reloadable(err: &MessagesError) -> bool {
    match err {
        MessagesError::ElementNotFound { step } => {
            DispatchStep::RELOADABLE.iter().any(|s| s.as_str() == step)
        }
        _ => false,
    }
}

/// Sends messages through an authenticated tab.
///
/// Holds no state of its own between calls; everything it knows about a
/// send lives in the page.
#[derive(Clone)]
pub struct MessageDispatcher {
    page: Arc<dyn PageSurface>,
    config: Arc<Config>,
}

impl fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("compose_url", &self.config.urls.compose)
            .finish_non_exhaustive()
    }
}

impl MessageDispatcher {
    pub fn new(page: Arc<dyn PageSurface>, config: Arc<Config>) -> Self {
        Self { page, config }
    }

    pub fn page(&self) -> &Arc<dyn PageSurface> {
        &self.page
    }

    pub async fn send(&self, message: &OutboundMessage) -> Result<SendResult> {
        message.validate()?;

        let mut attempt = 1;
        loop {
            match self.attempt(message).await {
                Ok(result) => {
                    tracing::info!("Message sent to {} (attempt {})", message.recipient, attempt);
                    return Ok(result);
                }
                Err(e) if attempt < MAX_ATTEMPTS && is_reloadable(&e) => {
                    tracing::warn!("Send attempt {} failed: {}; reloading", attempt, e);
                    self.page.reload().await?;
                    attempt += 1;
                }
                Err(e) if attempt > 1 && e.is_missing_input() => {
                    return Err(MessagesError::SendFailed {
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self, message: &OutboundMessage) -> Result<SendResult> {
        let timeouts = &self.config.timeouts;
        let typing = TypeOptions {
            delay_ms: timeouts.type_delay_ms,
        };
        let clicking = ClickOptions {
            delay_ms: timeouts.click_delay_ms,
        };

        tracing::debug!("[{}] {}", DispatchStep::Compose, self.config.urls.compose);
        self.page
            .navigate(&self.config.urls.compose, WaitPolicy::DomContentLoaded)
            .await?;
        self.dismiss_dialog().await;

        let recipient = self.require(DispatchStep::RecipientInput).await?;
        self.page
            .type_text(&recipient, &message.recipient, typing)
            .await?;

        let confirm = self.require(DispatchStep::ConfirmContact).await?;
        self.page.click(&confirm, clicking).await?;

        let body = self.require(DispatchStep::MessageInput).await?;
        self.page.type_text(&body, &message.body, typing).await?;

        let send = self.interactable_send_button().await?;
        self.page.click(&send, clicking).await?;

        Ok(SendResult {
            status_message: self.probe_status().await,
        })
    }

    async fn require(&self, step: DispatchStep) -> Result<ElementRef> {
        let Some(key) = step.locator_key() else {
            return Err(step.missing());
        };
        tracing::debug!("[{}] waiting for {}", step, key);

        self.page
            .wait_for_element(
                &self.config.locators.get(key),
                WaitOptions::visible(self.config.timeouts.element_ms),
            )
            .await
            .map_err(|e| match e {
                MessagesError::TimeoutExceeded { .. } => step.missing(),
                other => other,
            })
    }

    /// The compose view may render several send buttons; only one is ever on screen.
    async fn interactable_send_button(&self) -> Result<ElementRef> {
        let locator = self.config.locators.get(LocatorKey::SendButton);
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(self.config.timeouts.element_ms);

        loop {
            let mut candidates = self.page.query_all(&locator).await?;
            let picked = self.first_interactable(&candidates).await;
            let picked = picked.map(|found| found.map(|index| candidates.swap_remove(index)));
            // Handles for buttons not clicked would otherwise pile up on every poll.
            self.page.release(&candidates).await;
            if let Some(button) = picked? {
                return Ok(button);
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(DispatchStep::SendButton.missing());
            }
            tokio::time::sleep(Duration::from_millis(ms::POLL_INTERVAL)).await;
        }
    }

    async fn first_interactable(&self, candidates: &[ElementRef]) -> Result<Option<usize>> {
        for (index, candidate) in candidates.iter().enumerate() {
            if self.page.is_interactable(candidate).await? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    async fn dismiss_dialog(&self) {
        let locator = self.config.locators.get(LocatorKey::DismissDialog);
        let wait = WaitOptions::visible(self.config.timeouts.dialog_probe_ms);

        if let Ok(button) = self.page.wait_for_element(&locator, wait).await {
            tracing::debug!("Dismissing dialog");
            if let Err(e) = self.page.click(&button, ClickOptions::default()).await {
                tracing::warn!("Could not dismiss dialog: {}", e);
            }
        }
    }

    async fn probe_status(&self) -> Option<String> {
        let locator = self.config.locators.get(LocatorKey::StatusMessage);
        let wait = WaitOptions::visible(self.config.timeouts.status_probe_ms);

        let element = match self.page.wait_for_element(&locator, wait).await {
            Ok(element) => element,
            Err(MessagesError::TimeoutExceeded { .. }) => {
                tracing::debug!("[{}] none shown", DispatchStep::StatusMessage);
                return None;
            }
            Err(e) => {
                tracing::warn!("[{}] probe failed: {}", DispatchStep::StatusMessage, e);
                return None;
            }
        };

        match self.page.read_property(&element, "innerText").await {
            Ok(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("[{}] unreadable: {}", DispatchStep::StatusMessage, e);
                None
            }
        }
    }

    pub async fn conversations(&self, limit: Option<usize>) -> Result<Vec<Conversation>> {
        inbox::list_conversations(self.page.as_ref(), &self.config, limit).await
    }
}
