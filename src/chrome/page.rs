use super::{
    CallbackHandler, ClickOptions, ElementRef, PageSignal, PageSurface, StorageKind, TypeOptions,
    WaitOptions, WaitPolicy,
};
use crate::auth::CookieRecord;
use crate::locators::Locator;
use crate::{
    MessagesError, Result, js_templates,
    timeouts::{ms, secs},
};
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{
    CookieSameSite, EnableParams as NetworkEnableParams, EventRequestWillBeSent, GetCookiesParams,
    SetCookieParams, TimeSinceEpoch,
};
use chromiumoxide::cdp::browser_protocol::page::{
    EventFrameNavigated, EventNavigatedWithinDocument, NavigateParams, ReloadParams,
};
use chromiumoxide::cdp::browser_protocol::target::CloseTargetParams;
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const SIGNAL_CAPACITY: usize = 256;

/// [`PageSurface`] over a single chromiumoxide tab.
pub struct ChromiumPage {
    page: Arc<Page>,
    navigation_timeout: Duration,
    /// Taken on close so every subscriber sees the channel end.
    signals: Mutex<Option<broadcast::Sender<PageSignal>>>,
    elements: Mutex<HashMap<u64, Arc<Element>>>,
    next_handle: AtomicU64,
    listeners: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl ChromiumPage {
    /// Wraps `page` and starts forwarding navigation and request URLs to
    /// [`PageSurface::subscribe_signals`] receivers.
    pub async fn attach(page: Page, navigation_timeout: Duration) -> Result<Self> {
        let page = Arc::new(page);

        page.execute(NetworkEnableParams::default())
            .await
            .map_err(|e| MessagesError::General(format!("Failed to enable Network domain: {}", e)))?;

        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        let mut listeners = Vec::with_capacity(3);

        let mut navigated = page
            .event_listener::<EventFrameNavigated>()
            .await
            .map_err(|e| MessagesError::General(format!("Failed to attach navigation listener: {}", e)))?;
        let tx = signals.clone();
        listeners.push(tokio::spawn(async move {
            while let Some(event) = navigated.next().await {
                if event.frame.parent_id.is_none() {
                    let _ = tx.send(PageSignal::Navigated(event.frame.url.clone()));
                }
            }
        }));

        let mut within_document = page
            .event_listener::<EventNavigatedWithinDocument>()
            .await
            .map_err(|e| MessagesError::General(format!("Failed to attach history listener: {}", e)))?;
        let tx = signals.clone();
        listeners.push(tokio::spawn(async move {
            while let Some(event) = within_document.next().await {
                let _ = tx.send(PageSignal::Navigated(event.url.clone()));
            }
        }));

        let mut requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| MessagesError::General(format!("Failed to attach request listener: {}", e)))?;
        let tx = signals.clone();
        listeners.push(tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                let _ = tx.send(PageSignal::Request(event.request.url.clone()));
            }
        }));

        Ok(Self {
            page,
            navigation_timeout,
            signals: Mutex::new(Some(signals)),
            elements: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            listeners: Mutex::new(listeners),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(MessagesError::PageClosed)
        } else {
            Ok(())
        }
    }

    fn register(&self, element: Element, label: &str) -> ElementRef {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut elements) = self.elements.lock() {
            elements.insert(handle, Arc::new(element));
        }
        ElementRef::new(handle, label)
    }

    fn resolve(&self, element: &ElementRef) -> Result<Arc<Element>> {
        self.elements
            .lock()
            .ok()
            .and_then(|elements| elements.get(&element.handle()).cloned())
            .ok_or_else(|| MessagesError::ElementNotFound {
                step: format!("stale handle for {}", element.label()),
            })
    }

    fn forget_elements(&self) {
        if let Ok(mut elements) = self.elements.lock() {
            elements.clear();
        }
    }

    /// Current matches. A protocol-level lookup failure (the document was
    /// swapped mid-query) counts as no match; a broken connection does not.
    async fn find_raw(&self, locator: &Locator) -> Result<Vec<Element>> {
        let found = match locator {
            Locator::Css(css) => self.page.find_elements(css.as_str()).await,
            Locator::XPath(xpath) => self.page.find_xpaths(xpath.as_str()).await,
        };
        match found {
            Ok(elements) => Ok(elements),
            Err(e) => transient_or_lost(e, locator.expression()).map(|_| Vec::new()),
        }
    }

    async fn element_flag(element: &Element, function: &str) -> Result<bool> {
        match element.call_js_fn(function, false).await {
            Ok(ret) => Ok(ret.result.value.and_then(|v| v.as_bool()).unwrap_or(false)),
            Err(e) => transient_or_lost(e, "element check").map(|_| false),
        }
    }

    async fn wait_for_ready_state(&self, policy: WaitPolicy) -> Result<()> {
        let accepted: &[&str] = match policy {
            WaitPolicy::Load => &["complete"],
            WaitPolicy::DomContentLoaded => &["interactive", "complete"],
        };
        let timeout = self.navigation_timeout;

        tokio::time::timeout(timeout, async {
            loop {
                if let Ok(Ok(result)) = tokio::time::timeout(
                    Duration::from_secs(secs::READY_STATE),
                    self.page.evaluate("document.readyState"),
                )
                .await
                    && let Ok(state) = result.into_value::<String>()
                    && accepted.contains(&state.as_str())
                {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(ms::POLL_INTERVAL)).await;
            }
        })
        .await
        .map_err(|_| {
            MessagesError::NavigationError(format!(
                "page did not reach {:?} within {}s",
                policy,
                timeout.as_secs()
            ))
        })
    }
}

/// `Ok` for errors Chrome itself reported about a node that went away,
/// `ConnectionLost` for anything that means the tab can no longer answer.
fn transient_or_lost(err: CdpError, what: &str) -> Result<()> {
    match err {
        CdpError::Chrome(_) | CdpError::NotFound | CdpError::JavascriptException(_) => {
            tracing::debug!("Lookup of {} failed, treating as absent: {}", what, err);
            Ok(())
        }
        other => {
            tracing::warn!("Lookup of {} failed: {}", what, other);
            Err(MessagesError::ConnectionLost)
        }
    }
}

fn same_site_from_str(value: &str) -> Option<CookieSameSite> {
    match value.to_ascii_lowercase().as_str() {
        "strict" => Some(CookieSameSite::Strict),
        "lax" => Some(CookieSameSite::Lax),
        "none" => Some(CookieSameSite::None),
        _ => None,
    }
}

fn same_site_to_string(value: &CookieSameSite) -> String {
    match value {
        CookieSameSite::Strict => "Strict",
        CookieSameSite::Lax => "Lax",
        CookieSameSite::None => "None",
    }
    .to_string()
}

#[async_trait::async_trait]
impl PageSurface for ChromiumPage {
    async fn navigate(&self, url: &str, wait: WaitPolicy) -> Result<()> {
        self.ensure_open()?;
        tracing::debug!("Navigating to {}", url);

        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| MessagesError::NavigationError(format!("Invalid navigate params: {}", e)))?;

        let response = tokio::time::timeout(self.navigation_timeout, self.page.execute(params))
            .await
            .map_err(|_| {
                MessagesError::NavigationError(format!(
                    "navigation to {} timed out after {}s",
                    url,
                    self.navigation_timeout.as_secs()
                ))
            })?
            .map_err(|e| MessagesError::NavigationError(e.to_string()))?;

        if let Some(ref error_text) = response.error_text {
            return Err(MessagesError::NavigationError(format!("{}: {}", url, error_text)));
        }

        self.forget_elements();
        self.wait_for_ready_state(wait).await
    }

    async fn wait_for_element(
        &self,
        locator: &Locator,
        options: WaitOptions,
    ) -> Result<ElementRef> {
        let start = tokio::time::Instant::now();
        let timeout = Duration::from_millis(options.timeout_ms);

        loop {
            self.ensure_open()?;

            for element in self.find_raw(locator).await? {
                if !options.visible
                    || Self::element_flag(&element, js_templates::ELEMENT_VISIBLE).await?
                {
                    return Ok(self.register(element, locator.expression()));
                }
            }

            if start.elapsed() >= timeout {
                return Err(MessagesError::TimeoutExceeded {
                    what: locator.to_string(),
                    ms: options.timeout_ms,
                });
            }

            tokio::time::sleep(Duration::from_millis(ms::POLL_INTERVAL)).await;
        }
    }

    async fn query_all(&self, locator: &Locator) -> Result<Vec<ElementRef>> {
        self.ensure_open()?;
        Ok(self
            .find_raw(locator)
            .await?
            .into_iter()
            .map(|element| self.register(element, locator.expression()))
            .collect())
    }

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.ensure_open()?;
        let expression = js_templates::invoke(script, &args);
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|e| MessagesError::EvaluationError(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn expose_callback(&self, name: &str, handler: CallbackHandler) -> Result<()> {
        self.ensure_open()?;

        let mut calls = self
            .page
            .event_listener::<EventBindingCalled>()
            .await
            .map_err(|e| MessagesError::General(format!("Failed to attach binding listener: {}", e)))?;

        self.page
            .execute(AddBindingParams::new(name))
            .await
            .map_err(|e| MessagesError::General(format!("Failed to add binding '{}': {}", name, e)))?;

        let binding = name.to_string();
        let task = tokio::spawn(async move {
            while let Some(call) = calls.next().await {
                if call.name == binding {
                    handler(call.payload.clone());
                }
            }
        });

        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(task);
        }
        Ok(())
    }

    async fn get_cookies(&self) -> Result<Vec<CookieRecord>> {
        self.ensure_open()?;
        let response = self
            .page
            .execute(GetCookiesParams::default())
            .await
            .map_err(|e| MessagesError::StorageError(format!("Failed to get cookies: {}", e)))?;

        Ok(response
            .cookies
            .iter()
            .map(|c| CookieRecord {
                name: c.name.clone(),
                value: c.value.clone(),
                domain: c.domain.clone(),
                path: c.path.clone(),
                // JSON cannot carry NaN or infinity; treat those as session cookies.
                expires: if c.expires.is_finite() { c.expires } else { -1.0 },
                http_only: c.http_only,
                secure: c.secure,
                same_site: c.same_site.as_ref().map(same_site_to_string),
            })
            .collect())
    }

    async fn set_cookies(&self, cookies: &[CookieRecord]) -> Result<()> {
        self.ensure_open()?;
        for cookie in cookies {
            let mut params = SetCookieParams::builder()
                .name(&cookie.name)
                .value(&cookie.value)
                .domain(&cookie.domain)
                .path(&cookie.path)
                .secure(cookie.secure)
                .http_only(cookie.http_only);

            if cookie.expires > 0.0 {
                params = params.expires(TimeSinceEpoch::new(cookie.expires));
            }
            if let Some(same_site) = cookie.same_site.as_deref().and_then(same_site_from_str) {
                params = params.same_site(same_site);
            }

            let built = params.build().map_err(|e| {
                MessagesError::StorageError(format!("Invalid cookie '{}': {}", cookie.name, e))
            })?;
            self.page.execute(built).await.map_err(|e| {
                MessagesError::StorageError(format!("Failed to set cookie '{}': {}", cookie.name, e))
            })?;
        }
        Ok(())
    }

    async fn get_storage(&self, kind: StorageKind) -> Result<BTreeMap<String, String>> {
        let value = self
            .evaluate(js_templates::STORAGE_SNAPSHOT, vec![Value::from(kind.js_object())])
            .await?;
        serde_json::from_value(value).map_err(|e| {
            MessagesError::StorageError(format!("Unexpected {} shape: {}", kind.js_object(), e))
        })
    }

    async fn set_storage_entry(&self, kind: StorageKind, key: &str, value: &str) -> Result<()> {
        self.evaluate(
            js_templates::STORAGE_SET,
            vec![
                Value::from(kind.js_object()),
                Value::from(key),
                Value::from(value),
            ],
        )
        .await
        .map(|_| ())
    }

    async fn reload(&self) -> Result<()> {
        self.ensure_open()?;
        tracing::debug!("Reloading page");
        self.page
            .execute(ReloadParams::builder().build())
            .await
            .map_err(|e| MessagesError::NavigationError(format!("Reload failed: {}", e)))?;
        self.forget_elements();
        tokio::time::sleep(Duration::from_millis(ms::PAGE_LOAD_SETTLE)).await;
        self.wait_for_ready_state(WaitPolicy::Load).await
    }

    async fn click(&self, element: &ElementRef, options: ClickOptions) -> Result<()> {
        self.ensure_open()?;
        let target = self.resolve(element)?;
        if options.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(options.delay_ms)).await;
        }
        target
            .click()
            .await
            .map_err(|e| MessagesError::General(format!("Click on {} failed: {}", element.label(), e)))?;
        Ok(())
    }

    async fn type_text(&self, element: &ElementRef, text: &str, options: TypeOptions) -> Result<()> {
        self.ensure_open()?;
        let target = self.resolve(element)?;

        target
            .click()
            .await
            .map_err(|e| MessagesError::General(format!("Focus failed: {}", e)))?;

        if options.delay_ms > 0 {
            for ch in text.chars() {
                target.type_str(ch.to_string()).await.map_err(|e| {
                    MessagesError::General(format!("Failed to type character: {}", e))
                })?;
                tokio::time::sleep(Duration::from_millis(options.delay_ms)).await;
            }
        } else {
            target
                .type_str(text)
                .await
                .map_err(|e| MessagesError::General(format!("Failed to type text: {}", e)))?;
        }
        Ok(())
    }

    async fn read_property(&self, element: &ElementRef, name: &str) -> Result<Value> {
        self.ensure_open()?;
        let target = self.resolve(element)?;
        let value = target
            .property(name)
            .await
            .map_err(|e| MessagesError::EvaluationError(format!("Failed to read '{}': {}", name, e)))?;
        Ok(value.unwrap_or(Value::Null))
    }

    async fn is_interactable(&self, element: &ElementRef) -> Result<bool> {
        self.ensure_open()?;
        let target = self.resolve(element)?;
        Self::element_flag(&target, js_templates::ELEMENT_INTERACTABLE).await
    }

    async fn release(&self, elements: &[ElementRef]) {
        if let Ok(mut registry) = self.elements.lock() {
            for element in elements {
                registry.remove(&element.handle());
            }
        }
    }

    fn subscribe_signals(&self) -> broadcast::Receiver<PageSignal> {
        match self.signals.lock().ok().and_then(|tx| tx.as_ref().map(|tx| tx.subscribe())) {
            Some(rx) => rx,
            None => broadcast::channel(1).1,
        }
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if let Ok(mut listeners) = self.listeners.lock() {
            for task in listeners.drain(..) {
                task.abort();
            }
        }
        if let Ok(mut signals) = self.signals.lock() {
            signals.take();
        }
        self.forget_elements();

        self.page
            .execute(CloseTargetParams::new(self.page.target_id().clone()))
            .await
            .map_err(|e| MessagesError::General(format!("Failed to close tab: {}", e)))?;
        Ok(())
    }
}
