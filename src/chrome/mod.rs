pub mod browser;
pub mod page;

use crate::Result;
use crate::auth::CookieRecord;
use crate::locators::Locator;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;

pub use browser::BrowserHandle;
pub use page::ChromiumPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    #[default]
    Load,
    DomContentLoaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub visible: bool,
    pub timeout_ms: u64,
}

impl WaitOptions {
    pub fn visible(timeout_ms: u64) -> Self {
        Self {
            visible: true,
            timeout_ms,
        }
    }

    pub fn attached(timeout_ms: u64) -> Self {
        Self {
            visible: false,
            timeout_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Local,
    Session,
}

impl StorageKind {
    pub fn js_object(&self) -> &'static str {
        match self {
            StorageKind::Local => "localStorage",
            StorageKind::Session => "sessionStorage",
        }
    }
}

/// Opaque handle to an element resolved by a [`PageSurface`].
///
/// Only the surface that produced a handle can act on it. The label is the
/// locator expression the element was found with, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    handle: u64,
    label: String,
}

impl ElementRef {
    pub fn new(handle: u64, label: impl Into<String>) -> Self {
        Self {
            handle,
            label: label.into(),
        }
    }

    pub fn handle(&self) -> u64 {
        self.handle
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClickOptions {
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeOptions {
    pub delay_ms: u64,
}

/// Host-side function a page script can call with a string payload.
pub type CallbackHandler = Arc<dyn Fn(String) + Send + Sync>;

/// URL-bearing events observed on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSignal {
    Navigated(String),
    Request(String),
}

impl PageSignal {
    pub fn url(&self) -> &str {
        match self {
            PageSignal::Navigated(url) | PageSignal::Request(url) => url,
        }
    }
}

/// Everything the authentication and messaging layers need from one browser tab.
///
/// Calls must be issued from a single flow of control; implementations are
/// free to assume no two operations race on the same tab.
#[async_trait::async_trait]
pub trait PageSurface: Send + Sync {
    async fn navigate(&self, url: &str, wait: WaitPolicy) -> Result<()>;

    /// Resolves the first match, failing with `TimeoutExceeded` once
    /// `options.timeout_ms` has passed without one.
    async fn wait_for_element(&self, locator: &Locator, options: WaitOptions)
    -> Result<ElementRef>;

    /// Every current match, possibly none. Never waits.
    async fn query_all(&self, locator: &Locator) -> Result<Vec<ElementRef>>;

    /// Forgets handles the caller no longer needs. Unknown handles are ignored.
    async fn release(&self, elements: &[ElementRef]);

    /// Runs `script`, a function expression, with `args` as its arguments and
    /// returns its (awaited) result.
    async fn evaluate(&self, script: &str, args: Vec<Value>) -> Result<Value>;

    async fn expose_callback(&self, name: &str, handler: CallbackHandler) -> Result<()>;

    async fn get_cookies(&self) -> Result<Vec<CookieRecord>>;

    async fn set_cookies(&self, cookies: &[CookieRecord]) -> Result<()>;

    async fn get_storage(&self, kind: StorageKind) -> Result<BTreeMap<String, String>>;

    async fn set_storage_entry(&self, kind: StorageKind, key: &str, value: &str) -> Result<()>;

    async fn reload(&self) -> Result<()>;

    async fn click(&self, element: &ElementRef, options: ClickOptions) -> Result<()>;

    async fn type_text(&self, element: &ElementRef, text: &str, options: TypeOptions)
    -> Result<()>;

    async fn read_property(&self, element: &ElementRef, name: &str) -> Result<Value>;

    /// Visible and intersecting the viewport.
    async fn is_interactable(&self, element: &ElementRef) -> Result<bool>;

    /// Receivers see the channel close once the surface is closed.
    fn subscribe_signals(&self) -> broadcast::Receiver<PageSignal>;

    /// Fails every pending wait on this surface, signal waits included.
    async fn close(&self) -> Result<()>;
}
