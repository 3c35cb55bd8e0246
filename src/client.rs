use crate::auth::{AuthenticationController, ClientEvent, QrFrame, Session};
use crate::chrome::{BrowserHandle, PageSurface};
use crate::config::Config;
use crate::messaging::MessageDispatcher;
use crate::{MessagesError, Result};
use std::sync::Arc;

/// A finished handshake.
#[derive(Debug)]
pub struct AuthOutcome {
    pub session: Session,
    pub dispatcher: MessageDispatcher,
    /// False when the stored session was rejected (or absent) and the tab was paired.
    pub restored: bool,
}

/// Authenticates `page`, restoring `existing` first when given.
///
/// A failed restore falls back to pairing on a fresh controller when
/// `auth.fallback_to_pairing` is set. QR frames are handed to `on_qr` as they
/// arrive.
pub async fn authenticate<F>(
    page: Arc<dyn PageSurface>,
    config: Arc<Config>,
    existing: Option<Session>,
    mut on_qr: F,
) -> Result<AuthOutcome>
where
    F: FnMut(&QrFrame),
{
    if let Some(session) = existing {
        match run_controller(page.clone(), config.clone(), Some(session), &mut on_qr).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if config.auth.fallback_to_pairing => {
                tracing::warn!("Stored session rejected ({}), pairing instead", e);
            }
            Err(e) => return Err(e),
        }
    }

    run_controller(page, config, None, &mut on_qr).await
}

async fn run_controller<F>(
    page: Arc<dyn PageSurface>,
    config: Arc<Config>,
    existing: Option<Session>,
    on_qr: &mut F,
) -> Result<AuthOutcome>
where
    F: FnMut(&QrFrame),
{
    let restored = existing.is_some();
    let (mut controller, mut events) = AuthenticationController::new(page, config);

    let mut session = None;
    let mut dispatcher = None;
    let mut handle = |event: ClientEvent| match event {
        ClientEvent::QrCode(frame) => on_qr(&frame),
        ClientEvent::Credentials(captured) => session = Some(captured),
        ClientEvent::Authenticated(ready) => dispatcher = Some(ready),
    };

    let result = {
        let begin = controller.begin(existing);
        tokio::pin!(begin);
        loop {
            tokio::select! {
                result = &mut begin => break result,
                Some(event) = events.recv() => handle(event),
            }
        }
    };
    while let Some(event) = events.try_recv() {
        handle(event);
    }
    drop(handle);
    result?;

    match (session, dispatcher) {
        (Some(session), Some(dispatcher)) => Ok(AuthOutcome {
            session,
            dispatcher,
            restored,
        }),
        _ => Err(MessagesError::InvalidState(format!(
            "controller finished in state {} without authenticating",
            controller.state()
        ))),
    }
}

/// Owns the browser for one CLI invocation.
pub struct MessagesClient {
    browser: BrowserHandle,
    config: Arc<Config>,
}

impl MessagesClient {
    pub async fn launch(config: Arc<Config>) -> Result<Self> {
        let browser = BrowserHandle::launch(&config).await?;
        Ok(Self { browser, config })
    }

    pub fn page(&self) -> Arc<dyn PageSurface> {
        self.browser.page()
    }

    pub async fn authenticate<F>(&self, existing: Option<Session>, on_qr: F) -> Result<AuthOutcome>
    where
        F: FnMut(&QrFrame),
    {
        authenticate(self.page(), self.config.clone(), existing, on_qr).await
    }

    pub async fn close(self) -> Result<()> {
        self.browser.close().await
    }
}
