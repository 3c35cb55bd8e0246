use crate::chrome::{PageSurface, WaitOptions, WaitPolicy};
use crate::config::Config;
use crate::js_templates;
use crate::locators::LocatorKey;
use crate::{MessagesError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    pub id: u64,
    pub from: String,
    pub snippet: String,
    pub timestamp: String,
    pub unread: bool,
}

/// What the page script reports for one list item, before any cleanup.
#[derive(Debug, Deserialize)]
struct RawConversation {
    #[serde(default)]
    href: String,
    #[serde(default)]
    unread: bool,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    from: String,
    #[serde(default)]
    snippet: String,
}

/// `.../conversations/<digits>`; the compose view (`conversations/new`) has no id.
fn conversation_id(href: &str) -> Option<u64> {
    let (_, rest) = href.split_once("conversations/")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn clean_snippet(snippet: &str) -> String {
    let snippet = snippet.trim();
    snippet
        .strip_prefix("You:")
        .map(str::trim_start)
        .unwrap_or(snippet)
        .to_string()
}

impl RawConversation {
    fn into_conversation(self) -> Option<Conversation> {
        let Some(id) = conversation_id(&self.href) else {
            tracing::debug!("Skipping list item without a conversation link: {:?}", self.href);
            return None;
        };
        Some(Conversation {
            id,
            from: self.from.trim().to_string(),
            snippet: clean_snippet(&self.snippet),
            timestamp: self.timestamp.trim().to_string(),
            unread: self.unread,
        })
    }
}

/// Opens the conversation list and reads every entry, newest first as shown.
pub async fn list_conversations(
    page: &dyn PageSurface,
    config: &Config,
    limit: Option<usize>,
) -> Result<Vec<Conversation>> {
    page.navigate(&config.urls.conversations, WaitPolicy::DomContentLoaded)
        .await?;
    page.wait_for_element(
        &config.locators.get(LocatorKey::ConversationList),
        WaitOptions::visible(config.timeouts.element_ms),
    )
    .await
    .map_err(|e| match e {
        MessagesError::TimeoutExceeded { .. } => MessagesError::ElementNotFound {
            step: LocatorKey::ConversationList.to_string(),
        },
        other => other,
    })?;

    let item = config.locators.get(LocatorKey::ConversationListItem);
    let value = page
        .evaluate(
            &js_templates::conversation_snapshot(),
            vec![json!(item.expression())],
        )
        .await?;
    let raw: Vec<RawConversation> = serde_json::from_value(value)
        .map_err(|e| MessagesError::EvaluationError(format!("unexpected conversation list: {}", e)))?;

    let conversations = raw
        .into_iter()
        .filter_map(RawConversation::into_conversation)
        .take(limit.unwrap_or(usize::MAX))
        .collect::<Vec<_>>();

    tracing::debug!("Read {} conversations", conversations.len());
    Ok(conversations)
}
