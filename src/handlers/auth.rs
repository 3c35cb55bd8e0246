use crate::auth::{CredentialStore, QrFrame, Session};
use crate::client::{AuthOutcome, MessagesClient};
use crate::config::Config;
use crate::output::{self, OutputFormatter};
use crate::{MessagesError, Result};
use serde::Serialize;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct LoginResult {
    pub method: &'static str,
    pub credentials_path: String,
    pub cookies_count: usize,
    pub storage_entries: usize,
    pub qr_frames: u64,
}

impl OutputFormatter for LoginResult {
    fn format_text(&self) -> String {
        use crate::output::text;
        let mut lines = vec![text::success(&format!("Authenticated ({})", self.method))];
        lines.push(text::key_value("Credentials", &self.credentials_path));
        lines.push(text::key_value("Cookies", &self.cookies_count.to_string()));
        lines.push(text::key_value(
            "Storage entries",
            &self.storage_entries.to_string(),
        ));
        if self.qr_frames > 0 {
            lines.push(text::key_value("QR codes shown", &self.qr_frames.to_string()));
        }
        lines.join("\n")
    }

    fn format_json(&self, pretty: bool) -> Result<String> {
        output::to_json(self, pretty)
    }
}

/// Writes every QR frame to one PNG file, replacing the previous code.
pub struct QrFileSink {
    path: PathBuf,
    frames: u64,
}

impl QrFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frames: 0,
        }
    }

    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join("messages-web-qr.png")
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn write(&mut self, frame: &QrFrame) {
        match write_qr_png(&self.path, frame) {
            Ok(()) => {
                self.frames += 1;
                eprintln!(
                    "{}",
                    output::text::info(&format!(
                        "QR code #{} written to {}; scan it with Messages on your phone",
                        frame.sequence,
                        self.path.display()
                    ))
                );
            }
            Err(e) => tracing::warn!("Could not write QR code #{}: {}", frame.sequence, e),
        }
    }
}

fn write_qr_png(path: &Path, frame: &QrFrame) -> Result<()> {
    let (mime, bytes) = crate::utils::decode_data_url(&frame.image_data)?;
    if mime != "image/png" {
        tracing::debug!("QR image is {}, writing as-is", mime);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

pub fn credential_store(config: &Config) -> Result<CredentialStore> {
    Ok(CredentialStore::new(config.credentials.resolve_path()?))
}

/// Reads stored credentials. Unreadable ones are treated as absent when
/// pairing is an acceptable fallback.
pub fn load_session(store: &CredentialStore, config: &Config) -> Result<Option<Session>> {
    match store.load() {
        Ok(session) => Ok(session),
        Err(e @ MessagesError::MalformedCredentials(_)) if config.auth.fallback_to_pairing => {
            tracing::warn!("Ignoring {}: {}", store.path().display(), e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Launches a browser and authenticates it, saving the captured session.
pub async fn open_authenticated(
    config: Arc<Config>,
    force_pairing: bool,
    qr_sink: &mut QrFileSink,
) -> Result<(MessagesClient, AuthOutcome)> {
    let store = credential_store(&config)?;
    let existing = if force_pairing {
        store.clear()?;
        None
    } else {
        load_session(&store, &config)?
    };

    let client = MessagesClient::launch(config).await?;
    let result = client
        .authenticate(existing, |frame| qr_sink.write(frame))
        .await;
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            client.close().await.ok();
            return Err(e);
        }
    };

    let client = save_or_close(&store, &outcome.session, client, MessagesClient::close).await?;
    Ok((client, outcome))
}

/// Saves the captured session, handing `client` back. If the save fails the
/// client is closed before the error is returned.
async fn save_or_close<C, F, Fut>(
    store: &CredentialStore,
    session: &Session,
    client: C,
    close: F,
) -> Result<C>
where
    F: FnOnce(C) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    match store.save(session) {
        Ok(()) => Ok(client),
        Err(e) => {
            if let Err(close_err) = close(client).await {
                tracing::warn!("Failed to close browser: {}", close_err);
            }
            Err(e)
        }
    }
}

pub async fn handle_login(
    config: Arc<Config>,
    qr_output: Option<PathBuf>,
    force_pairing: bool,
) -> Result<LoginResult> {
    let credentials_path = config.credentials.resolve_path()?;
    let mut qr_sink = QrFileSink::new(qr_output.unwrap_or_else(QrFileSink::default_path));

    let (client, outcome) = open_authenticated(config, force_pairing, &mut qr_sink).await?;
    client.close().await?;

    let session = &outcome.session;
    Ok(LoginResult {
        method: if outcome.restored { "restored" } else { "paired" },
        credentials_path: credentials_path.display().to_string(),
        cookies_count: session.cookies().len(),
        storage_entries: session.local_storage().len() + session.session_storage().len(),
        qr_frames: qr_sink.frames(),
    })
}
