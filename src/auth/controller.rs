use super::detector::{ArmedDetector, AuthSignalDetector};
use super::qr::{QrCodeWatcher, QrFrame};
use super::session::Session;
use crate::chrome::{PageSurface, StorageKind, WaitOptions, WaitPolicy};
use crate::config::Config;
use crate::locators::LocatorKey;
use crate::messaging::MessageDispatcher;
use crate::{MessagesError, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    PreconditionNotFound,
    RestoreTimeout,
    NavigationError,
    PairingTimeout,
    PageError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::PreconditionNotFound => "precondition-not-found",
            FailureReason::RestoreTimeout => "restore-timeout",
            FailureReason::NavigationError => "navigation-error",
            FailureReason::PairingTimeout => "pairing-timeout",
            FailureReason::PageError => "page-error",
        }
    }

    fn from_error(err: &MessagesError) -> Self {
        match err {
            MessagesError::PreconditionNotFound(_) => FailureReason::PreconditionNotFound,
            MessagesError::NavigationError(_) => FailureReason::NavigationError,
            _ => FailureReason::PageError,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    AwaitingPairing,
    RestoringSession,
    Authenticated,
    Failed(FailureReason),
}

impl AuthState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthState::Authenticated | AuthState::Failed(_))
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::Unauthenticated => f.write_str("unauthenticated"),
            AuthState::AwaitingPairing => f.write_str("awaiting-pairing"),
            AuthState::RestoringSession => f.write_str("restoring-session"),
            AuthState::Authenticated => f.write_str("authenticated"),
            AuthState::Failed(reason) => write!(f, "failed({})", reason),
        }
    }
}

/// Everything the controller tells its owner.
#[derive(Debug)]
pub enum ClientEvent {
    QrCode(QrFrame),
    Credentials(Session),
    Authenticated(MessageDispatcher),
}

/// Receiving half of a controller's events. Handed out together with the
/// controller so nothing can be emitted before someone is listening.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<ClientEvent>,
}

impl EventStream {
    /// `None` once the controller is gone and every event has been read.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ClientEvent> {
        self.rx.try_recv().ok()
    }
}

/// Drives one tab from unauthenticated to authenticated, once.
///
/// Without a session it pairs: the page shows a QR code, frames are
/// forwarded as [`ClientEvent::QrCode`], and a one-shot detector waits for
/// the page event that follows a successful scan. With a session it
/// restores: cookies and storage are replayed and the conversation list must
/// show up within the restore timeout. Either way success emits
/// [`ClientEvent::Credentials`] then [`ClientEvent::Authenticated`], exactly
/// once. Failure is terminal; a fresh controller is needed to try again.
pub struct AuthenticationController {
    page: Arc<dyn PageSurface>,
    config: Arc<Config>,
    state: AuthState,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl AuthenticationController {
    pub fn new(page: Arc<dyn PageSurface>, config: Arc<Config>) -> (Self, EventStream) {
        let (events, rx) = mpsc::unbounded_channel();
        let controller = Self {
            page,
            config,
            state: AuthState::Unauthenticated,
            events,
        };
        (controller, EventStream { rx })
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub async fn begin(&mut self, existing: Option<Session>) -> Result<()> {
        if self.state != AuthState::Unauthenticated {
            return Err(MessagesError::InvalidState(format!(
                "authentication already started (state: {})",
                self.state
            )));
        }

        match existing {
            Some(session) => self.restore(session).await,
            None => self.pair().await,
        }
    }

    fn transition(&mut self, next: AuthState) {
        if self.state.is_terminal() {
            tracing::warn!("Ignoring transition {} -> {}", self.state, next);
            return;
        }
        tracing::info!("Auth state: {} -> {}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, reason: FailureReason, err: MessagesError) -> Result<()> {
        tracing::warn!("Authentication failed ({}): {}", reason, err);
        self.transition(AuthState::Failed(reason));
        Err(err)
    }

    async fn pair(&mut self) -> Result<()> {
        self.transition(AuthState::AwaitingPairing);

        let detector = match AuthSignalDetector::from_config(&self.config.auth) {
            Ok(detector) => detector,
            Err(e) => return self.fail(FailureReason::PageError, e),
        };
        // Armed before the first navigation so an early signal is not lost.
        let mut armed = detector.arm(self.page.subscribe_signals());
        let watcher = QrCodeWatcher::new(self.page.clone(), &self.config);

        let pairing = await_pairing(
            self.page.as_ref(),
            &self.config,
            &watcher,
            &mut armed,
            self.events.clone(),
        );
        let outcome = match self.config.auth.pairing_timeout_secs {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), pairing).await {
                Ok(outcome) => outcome.map_err(|e| (FailureReason::from_error(&e), e)),
                Err(_) => Err((
                    FailureReason::PairingTimeout,
                    MessagesError::TimeoutExceeded {
                        what: "QR code pairing".into(),
                        ms: secs * 1000,
                    },
                )),
            },
            None => pairing
                .await
                .map_err(|e| (FailureReason::from_error(&e), e)),
        };

        armed.disarm();
        if let Err(e) = watcher.detach().await {
            tracing::warn!("Failed to disconnect QR observer: {}", e);
        }

        match outcome {
            Ok(url) => {
                tracing::debug!("Paired, page at {}", url);
                self.complete().await
            }
            Err((reason, err)) => self.fail(reason, err),
        }
    }

    async fn restore(&mut self, session: Session) -> Result<()> {
        self.transition(AuthState::RestoringSession);

        if let Err(e) = replay_session(self.page.as_ref(), &self.config, &session).await {
            return self.fail(FailureReason::from_error(&e), e);
        }

        let marker = self.config.locators.get(LocatorKey::ConversationList);
        let restore_ms = self.config.timeouts.restore_ms;
        let wait = self
            .page
            .wait_for_element(&marker, WaitOptions::visible(restore_ms));

        let outcome = tokio::time::timeout(Duration::from_millis(restore_ms), wait).await;
        match outcome {
            Ok(Ok(_)) => self.complete().await,
            Ok(Err(MessagesError::TimeoutExceeded { what, ms })) => {
                self.fail(
                    FailureReason::RestoreTimeout,
                    MessagesError::TimeoutExceeded { what, ms },
                )
            }
            Ok(Err(e)) => self.fail(FailureReason::from_error(&e), e),
            Err(_) => self.fail(
                FailureReason::RestoreTimeout,
                MessagesError::TimeoutExceeded {
                    what: marker.to_string(),
                    ms: restore_ms,
                },
            ),
        }
    }

    async fn complete(&mut self) -> Result<()> {
        let session = match capture_session(self.page.as_ref()).await {
            Ok(session) => session,
            Err(e) => return self.fail(FailureReason::PageError, e),
        };
        tracing::info!(
            "Captured session: {} cookies, {} local and {} session storage entries",
            session.cookies().len(),
            session.local_storage().len(),
            session.session_storage().len()
        );

        self.transition(AuthState::Authenticated);

        let dispatcher = MessageDispatcher::new(self.page.clone(), self.config.clone());
        // A dropped stream only means nobody is listening any more.
        self.events.send(ClientEvent::Credentials(session)).ok();
        self.events
            .send(ClientEvent::Authenticated(dispatcher))
            .ok();
        Ok(())
    }
}

/// Resolves with the URL of the authenticated signal. Setup (login view,
/// remember toggle, QR watcher) races the detector so a signal that arrives
/// mid-setup still counts.
async fn await_pairing(
    page: &dyn PageSurface,
    config: &Config,
    watcher: &QrCodeWatcher,
    armed: &mut ArmedDetector,
    events: mpsc::UnboundedSender<ClientEvent>,
) -> Result<String> {
    let setup = async {
        page.navigate(&config.urls.auth, WaitPolicy::Load).await?;
        ensure_remember_toggle(page, config).await?;
        watcher
            .attach(move |frame| {
                events.send(ClientEvent::QrCode(frame)).ok();
            })
            .await
    };

    tokio::select! {
        biased;
        url = armed.fired() => return url.ok_or(MessagesError::PageClosed),
        setup = setup => setup?,
    }

    tracing::info!("Waiting for the QR code to be scanned");
    armed.fired().await.ok_or(MessagesError::PageClosed)
}

async fn replay_session(page: &dyn PageSurface, config: &Config, session: &Session) -> Result<()> {
    page.navigate(&config.urls.auth, WaitPolicy::Load).await?;
    ensure_remember_toggle(page, config).await?;

    page.set_cookies(session.cookies()).await?;
    for (key, value) in session.local_storage() {
        page.set_storage_entry(StorageKind::Local, key, value).await?;
    }
    for (key, value) in session.session_storage() {
        page.set_storage_entry(StorageKind::Session, key, value).await?;
    }
    tracing::debug!("Replayed {} cookies", session.cookies().len());

    page.navigate(&config.urls.conversations, WaitPolicy::DomContentLoaded)
        .await
}

/// Turns the "remember this computer" switch on unless it already is.
async fn ensure_remember_toggle(page: &dyn PageSurface, config: &Config) -> Result<()> {
    let wait = WaitOptions::visible(config.timeouts.precondition_ms);
    let precondition = |key: LocatorKey| {
        move |e: MessagesError| match e {
            MessagesError::TimeoutExceeded { .. } => {
                MessagesError::PreconditionNotFound(key.to_string())
            }
            other => other,
        }
    };

    page.wait_for_element(&config.locators.get(LocatorKey::RememberToggle), wait)
        .await
        .map_err(precondition(LocatorKey::RememberToggle))?;
    let button = page
        .wait_for_element(
            &config.locators.get(LocatorKey::RememberToggleButton),
            WaitOptions::attached(config.timeouts.precondition_ms),
        )
        .await
        .map_err(precondition(LocatorKey::RememberToggleButton))?;

    let class_name = page.read_property(&button, "className").await?;
    if is_checked(class_name.as_str().unwrap_or_default()) {
        tracing::debug!("Remember toggle already on");
        return Ok(());
    }

    page.click(&button, Default::default()).await?;
    tracing::debug!("Remember toggle switched on");
    Ok(())
}

fn is_checked(class_name: &str) -> bool {
    class_name
        .split_whitespace()
        .any(|class| class.contains("checked") && !class.contains("unchecked"))
}

/// Cookies and both storage maps, read back to back from the authenticated page.
async fn capture_session(page: &dyn PageSurface) -> Result<Session> {
    let cookies = page.get_cookies().await?;
    let local = page.get_storage(StorageKind::Local).await?;
    let session = page.get_storage(StorageKind::Session).await?;
    Ok(Session::new(cookies, local, session))
}
