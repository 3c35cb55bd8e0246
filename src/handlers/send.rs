use super::auth::{QrFileSink, open_authenticated};
use crate::config::Config;
use crate::messaging::OutboundMessage;
use crate::output::{self, OutputFormatter};
use crate::Result;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct SendOutput {
    pub recipient: String,
    pub status_message: Option<String>,
    pub restored_session: bool,
}

impl OutputFormatter for SendOutput {
    fn format_text(&self) -> String {
        use crate::output::text;
        let mut lines = vec![text::success(&format!("Message sent to {}", self.recipient))];
        match self.status_message {
            Some(ref status) => lines.push(text::key_value("Status", status)),
            None => lines.push(text::key_value("Status", "(none shown)")),
        }
        lines.join("\n")
    }

    fn format_json(&self, pretty: bool) -> Result<String> {
        output::to_json(self, pretty)
    }
}

pub async fn handle_send(config: Arc<Config>, to: &str, body: &str) -> Result<SendOutput> {
    let message = OutboundMessage::new(to, body);
    message.validate()?;

    let mut qr_sink = QrFileSink::new(QrFileSink::default_path());
    let (client, outcome) = open_authenticated(config, false, &mut qr_sink).await?;

    let sent = outcome.dispatcher.send(&message).await;
    client.close().await.ok();
    let result = sent?;

    Ok(SendOutput {
        recipient: message.recipient,
        status_message: result.status_message,
        restored_session: outcome.restored,
    })
}
