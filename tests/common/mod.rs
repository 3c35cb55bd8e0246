#![allow(dead_code)]

//! A scripted in-memory `PageSurface`. Elements are keyed by locator
//! expression and can be made to appear after a navigation, a reload or a
//! click. Every interaction is recorded for assertions.

use async_trait::async_trait;
use messages_web::auth::CookieRecord;
use messages_web::chrome::{
    CallbackHandler, ClickOptions, ElementRef, PageSignal, PageSurface, StorageKind, TypeOptions,
    WaitOptions, WaitPolicy,
};
use messages_web::config::Config;
use messages_web::locators::{Locator, LocatorKey};
use messages_web::{MessagesError, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

pub const AUTH_URL: &str = "https://messages.google.com/web/authentication";
pub const CONVERSATIONS_URL: &str = "https://messages.google.com/web/conversations";
pub const QR_SRC: &str = "data:image/png;base64,iVBORw0KGgo=";

/// Locator expression for `key` under the default table.
pub fn loc(key: LocatorKey) -> String {
    Config::default().locators.get(key).expression().to_string()
}

/// Defaults with short waits so failing paths finish quickly.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.timeouts.element_ms = 500;
    config.timeouts.precondition_ms = 500;
    config.timeouts.restore_ms = 2_000;
    config.timeouts.status_probe_ms = 200;
    config.timeouts.dialog_probe_ms = 50;
    config.timeouts.type_delay_ms = 0;
    config.timeouts.click_delay_ms = 0;
    config
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub visible: bool,
    pub interactable: bool,
    pub properties: HashMap<String, Value>,
}

impl FakeElement {
    pub fn new() -> Self {
        Self {
            visible: true,
            interactable: true,
            properties: HashMap::new(),
        }
    }

    pub fn hidden() -> Self {
        Self {
            visible: false,
            interactable: false,
            properties: HashMap::new(),
        }
    }

    /// Rendered but scrolled out of the viewport.
    pub fn offscreen() -> Self {
        Self {
            visible: true,
            interactable: false,
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }
}

impl Default for FakeElement {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct State {
    elements: HashMap<String, Vec<FakeElement>>,
    on_navigate: Vec<(String, String, FakeElement)>,
    signal_on_navigate: Vec<(String, PageSignal)>,
    on_reload: Vec<(String, FakeElement)>,
    on_click: Vec<(String, String, FakeElement)>,
    failing_navigation: Vec<(String, String)>,
    evaluate_results: Vec<(String, Value)>,
    handles: HashMap<u64, (String, usize)>,
    next_handle: u64,
    navigations: Vec<String>,
    clicks: Vec<(String, usize)>,
    typed: Vec<(String, String)>,
    reloads: usize,
    scripts: Vec<String>,
    cookies: Vec<CookieRecord>,
    local: BTreeMap<String, String>,
    session: BTreeMap<String, String>,
    callbacks: HashMap<String, CallbackHandler>,
    closed: bool,
}

pub struct FakePage {
    state: Mutex<State>,
    signals: Mutex<Option<broadcast::Sender<PageSignal>>>,
}

impl FakePage {
    pub fn new() -> Self {
        let (signals, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(State::default()),
            signals: Mutex::new(Some(signals)),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn with_element(self, key: LocatorKey, element: FakeElement) -> Self {
        self.add_element(&loc(key), element);
        self
    }

    pub fn add_element(&self, expr: &str, element: FakeElement) {
        self.state()
            .elements
            .entry(expr.to_string())
            .or_default()
            .push(element);
    }

    /// `element` appears once a URL containing `url_part` has been loaded.
    pub fn reveal_on_navigate(self, url_part: &str, key: LocatorKey, element: FakeElement) -> Self {
        self.state()
            .on_navigate
            .push((url_part.to_string(), loc(key), element));
        self
    }

    pub fn signal_on_navigate(self, url_part: &str, signal: PageSignal) -> Self {
        self.state()
            .signal_on_navigate
            .push((url_part.to_string(), signal));
        self
    }

    pub fn reveal_on_reload(self, key: LocatorKey, element: FakeElement) -> Self {
        self.state().on_reload.push((loc(key), element));
        self
    }

    pub fn reveal_on_click(self, clicked: LocatorKey, key: LocatorKey, element: FakeElement) -> Self {
        self.state()
            .on_click
            .push((loc(clicked), loc(key), element));
        self
    }

    pub fn fail_navigation(self, url_part: &str, error: &str) -> Self {
        self.state()
            .failing_navigation
            .push((url_part.to_string(), error.to_string()));
        self
    }

    /// Scripts containing `needle` evaluate to `value`; anything else to `true`.
    pub fn evaluate_returning(self, needle: &str, value: Value) -> Self {
        self.state()
            .evaluate_results
            .push((needle.to_string(), value));
        self
    }

    pub fn with_cookie(self, cookie: CookieRecord) -> Self {
        self.state().cookies.push(cookie);
        self
    }

    pub fn with_storage(self, kind: StorageKind, key: &str, value: &str) -> Self {
        {
            let mut state = self.state();
            let map = match kind {
                StorageKind::Local => &mut state.local,
                StorageKind::Session => &mut state.session,
            };
            map.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn emit_signal(&self, signal: PageSignal) {
        if let Some(signals) = self.signals.lock().unwrap().as_ref() {
            signals.send(signal).ok();
        }
    }

    /// Calls a host callback the way page script would. False if none is exposed.
    pub fn invoke_callback(&self, name: &str, payload: &str) -> bool {
        let handler = self.state().callbacks.get(name).cloned();
        match handler {
            Some(handler) => {
                handler(payload.to_string());
                true
            }
            None => false,
        }
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state().navigations.clone()
    }

    pub fn clicks_on(&self, key: LocatorKey) -> usize {
        let expr = loc(key);
        self.state().clicks.iter().filter(|(e, _)| *e == expr).count()
    }

    pub fn clicked_indices(&self, key: LocatorKey) -> Vec<usize> {
        let expr = loc(key);
        self.state()
            .clicks
            .iter()
            .filter(|(e, _)| *e == expr)
            .map(|(_, i)| *i)
            .collect()
    }

    pub fn typed_into(&self, key: LocatorKey) -> Vec<String> {
        let expr = loc(key);
        self.state()
            .typed
            .iter()
            .filter(|(e, _)| *e == expr)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn reloads(&self) -> usize {
        self.state().reloads
    }

    pub fn scripts_containing(&self, needle: &str) -> usize {
        self.state()
            .scripts
            .iter()
            .filter(|s| s.contains(needle))
            .count()
    }

    pub fn cookies(&self) -> Vec<CookieRecord> {
        self.state().cookies.clone()
    }

    pub fn storage(&self, kind: StorageKind) -> BTreeMap<String, String> {
        let state = self.state();
        match kind {
            StorageKind::Local => state.local.clone(),
            StorageKind::Session => state.session.clone(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Element handles handed out and not yet released.
    pub fn live_handles(&self) -> usize {
        self.state().handles.len()
    }

    pub fn holds_handle(&self, element: &ElementRef) -> bool {
        self.state().handles.contains_key(&element.handle())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state().closed {
            Err(MessagesError::PageClosed)
        } else {
            Ok(())
        }
    }

    fn find(&self, locator: &Locator, visible_only: bool) -> Option<ElementRef> {
        let mut state = self.state();
        let expr = locator.expression().to_string();
        let index = state
            .elements
            .get(&expr)?
            .iter()
            .position(|el| !visible_only || el.visible)?;
        Some(register(&mut state, &expr, index))
    }

    fn element(&self, element: &ElementRef) -> Result<FakeElement> {
        let state = self.state();
        let (expr, index) = state
            .handles
            .get(&element.handle())
            .ok_or_else(|| MessagesError::General("unknown element handle".into()))?;
        state
            .elements
            .get(expr)
            .and_then(|list| list.get(*index))
            .cloned()
            .ok_or_else(|| MessagesError::General("element detached".into()))
    }
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

fn register(state: &mut State, expr: &str, index: usize) -> ElementRef {
    state.next_handle += 1;
    let handle = state.next_handle;
    state.handles.insert(handle, (expr.to_string(), index));
    ElementRef::new(handle, expr)
}

fn reveal(state: &mut State, expr: String, element: FakeElement) {
    state.elements.entry(expr).or_default().push(element);
}

#[async_trait]
impl PageSurface for FakePage {
    async fn navigate(&self, url: &str, _wait: WaitPolicy) -> Result<()> {
        self.ensure_open()?;
        let signals = {
            let mut state = self.state();
            if let Some((_, error)) = state
                .failing_navigation
                .iter()
                .find(|(part, _)| url.contains(part.as_str()))
            {
                return Err(MessagesError::NavigationError(format!("{}: {}", url, error)));
            }

            state.navigations.push(url.to_string());
            let revealed: Vec<_> = state
                .on_navigate
                .iter()
                .filter(|(part, _, _)| url.contains(part.as_str()))
                .map(|(_, expr, el)| (expr.clone(), el.clone()))
                .collect();
            state.on_navigate.retain(|(part, _, _)| !url.contains(part.as_str()));
            for (expr, element) in revealed {
                reveal(&mut state, expr, element);
            }

            state
                .signal_on_navigate
                .iter()
                .filter(|(part, _)| url.contains(part.as_str()))
                .map(|(_, signal)| signal.clone())
                .collect::<Vec<_>>()
        };

        self.emit_signal(PageSignal::Navigated(url.to_string()));
        for signal in signals {
            self.emit_signal(signal);
        }
        Ok(())
    }

    async fn wait_for_element(&self, locator: &Locator, options: WaitOptions) -> Result<ElementRef> {
        let start = tokio::time::Instant::now();
        let timeout = Duration::from_millis(options.timeout_ms);
        loop {
            self.ensure_open()?;
            if let Some(element) = self.find(locator, options.visible) {
                return Ok(element);
            }
            if start.elapsed() >= timeout {
                return Err(MessagesError::TimeoutExceeded {
                    what: locator.to_string(),
                    ms: options.timeout_ms,
                });
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn query_all(&self, locator: &Locator) -> Result<Vec<ElementRef>> {
        self.ensure_open()?;
        let mut state = self.state();
        let expr = locator.expression().to_string();
        let count = state.elements.get(&expr).map(Vec::len).unwrap_or(0);
        Ok((0..count).map(|i| register(&mut state, &expr, i)).collect())
    }

    async fn release(&self, elements: &[ElementRef]) {
        let mut state = self.state();
        for element in elements {
            state.handles.remove(&element.handle());
        }
    }

    async fn evaluate(&self, script: &str, _args: Vec<Value>) -> Result<Value> {
        self.ensure_open()?;
        let mut state = self.state();
        state.scripts.push(script.to_string());
        Ok(state
            .evaluate_results
            .iter()
            .find(|(needle, _)| script.contains(needle.as_str()))
            .map(|(_, value)| value.clone())
            .unwrap_or(Value::Bool(true)))
    }

    async fn expose_callback(&self, name: &str, handler: CallbackHandler) -> Result<()> {
        self.ensure_open()?;
        self.state().callbacks.insert(name.to_string(), handler);
        Ok(())
    }

    async fn get_cookies(&self) -> Result<Vec<CookieRecord>> {
        self.ensure_open()?;
        Ok(self.cookies())
    }

    async fn set_cookies(&self, cookies: &[CookieRecord]) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.state();
        for cookie in cookies {
            state
                .cookies
                .retain(|c| !(c.name == cookie.name && c.domain == cookie.domain));
            state.cookies.push(cookie.clone());
        }
        Ok(())
    }

    async fn get_storage(&self, kind: StorageKind) -> Result<BTreeMap<String, String>> {
        self.ensure_open()?;
        Ok(self.storage(kind))
    }

    async fn set_storage_entry(&self, kind: StorageKind, key: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.state();
        let map = match kind {
            StorageKind::Local => &mut state.local,
            StorageKind::Session => &mut state.session,
        };
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.state();
        state.reloads += 1;
        let pending = std::mem::take(&mut state.on_reload);
        for (expr, element) in pending {
            reveal(&mut state, expr, element);
        }
        Ok(())
    }

    async fn click(&self, element: &ElementRef, _options: ClickOptions) -> Result<()> {
        self.ensure_open()?;
        self.element(element)?;
        let mut state = self.state();
        let (expr, index) = state.handles[&element.handle()].clone();
        state.clicks.push((expr.clone(), index));

        let revealed: Vec<_> = state
            .on_click
            .iter()
            .filter(|(clicked, _, _)| *clicked == expr)
            .map(|(_, target, el)| (target.clone(), el.clone()))
            .collect();
        state.on_click.retain(|(clicked, _, _)| *clicked != expr);
        for (target, el) in revealed {
            reveal(&mut state, target, el);
        }
        Ok(())
    }

    async fn type_text(&self, element: &ElementRef, text: &str, _options: TypeOptions) -> Result<()> {
        self.ensure_open()?;
        self.element(element)?;
        self.state()
            .typed
            .push((element.label().to_string(), text.to_string()));
        Ok(())
    }

    async fn read_property(&self, element: &ElementRef, name: &str) -> Result<Value> {
        self.ensure_open()?;
        Ok(self
            .element(element)?
            .properties
            .get(name)
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn is_interactable(&self, element: &ElementRef) -> Result<bool> {
        self.ensure_open()?;
        let element = self.element(element)?;
        Ok(element.visible && element.interactable)
    }

    fn subscribe_signals(&self) -> broadcast::Receiver<PageSignal> {
        match self.signals.lock().unwrap().as_ref() {
            Some(signals) => signals.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    async fn close(&self) -> Result<()> {
        self.state().closed = true;
        self.signals.lock().unwrap().take();
        Ok(())
    }
}
