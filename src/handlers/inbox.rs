use super::auth::{QrFileSink, open_authenticated};
use crate::config::Config;
use crate::messaging::Conversation;
use crate::output::{self, OutputFormatter, TableBuilder};
use crate::Result;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct InboxResult {
    pub conversations: Vec<Conversation>,
}

impl OutputFormatter for InboxResult {
    fn format_text(&self) -> String {
        use crate::output::text;

        if self.conversations.is_empty() {
            return text::info("No conversations");
        }

        let mut table = TableBuilder::new().headers(vec![
            "".to_string(),
            "From".to_string(),
            "When".to_string(),
            "Message".to_string(),
        ]);
        for conversation in &self.conversations {
            table = table.row(vec![
                if conversation.unread { "●" } else { " " }.to_string(),
                text::truncate(&conversation.from, 20),
                text::truncate(&conversation.timestamp, 20),
                text::truncate(&conversation.snippet, 60),
            ]);
        }

        format!(
            "{}\n{}",
            text::section(&format!("Conversations ({})", self.conversations.len())),
            table.build()
        )
    }

    fn format_json(&self, pretty: bool) -> Result<String> {
        output::to_json(&self.conversations, pretty)
    }
}

pub async fn handle_inbox(config: Arc<Config>, limit: Option<usize>) -> Result<InboxResult> {
    let mut qr_sink = QrFileSink::new(QrFileSink::default_path());
    let (client, outcome) = open_authenticated(config, false, &mut qr_sink).await?;

    let listed = outcome.dispatcher.conversations(limit).await;
    client.close().await.ok();

    Ok(InboxResult {
        conversations: listed?,
    })
}
