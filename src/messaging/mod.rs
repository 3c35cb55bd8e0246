pub mod dispatcher;
pub mod inbox;

pub use dispatcher::{DispatchStep, MessageDispatcher};
pub use inbox::Conversation;

use crate::{MessagesError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub recipient: String,
    pub body: String,
}

impl OutboundMessage {
    pub fn new(recipient: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            body: body.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.recipient.trim().is_empty() {
            return Err(MessagesError::General("Recipient must not be empty".into()));
        }
        if self.body.is_empty() {
            return Err(MessagesError::General("Message body must not be empty".into()));
        }
        Ok(())
    }
}

/// Outcome of one send. The status text is whatever the UI showed under the
/// message shortly after sending, if anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub status_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_validation() {
        assert!(OutboundMessage::new("+15551234567", "hello").validate().is_ok());
        assert!(OutboundMessage::new("  ", "hello").validate().is_err());
        assert!(OutboundMessage::new("+15551234567", "").validate().is_err());
    }
}
