//! Named locators for every control the automation touches.
//!
//! The target UI is third-party markup that changes without notice, so no
//! selector is hard-coded at a call site. Callers look up a [`LocatorKey`] in a
//! [`LocatorTable`]; the table starts from built-in defaults and any entry can
//! be overridden from the `[locators]` config section.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKey {
    RememberToggle,
    RememberToggleButton,
    QrCode,
    QrImage,
    ConversationList,
    ConversationListItem,
    ContactInput,
    ContactConfirm,
    MessageInput,
    SendButton,
    StatusMessage,
    DismissDialog,
}

impl LocatorKey {
    pub const ALL: [LocatorKey; 12] = [
        LocatorKey::RememberToggle,
        LocatorKey::RememberToggleButton,
        LocatorKey::QrCode,
        LocatorKey::QrImage,
        LocatorKey::ConversationList,
        LocatorKey::ConversationListItem,
        LocatorKey::ContactInput,
        LocatorKey::ContactConfirm,
        LocatorKey::MessageInput,
        LocatorKey::SendButton,
        LocatorKey::StatusMessage,
        LocatorKey::DismissDialog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LocatorKey::RememberToggle => "remember_toggle",
            LocatorKey::RememberToggleButton => "remember_toggle_button",
            LocatorKey::QrCode => "qr_code",
            LocatorKey::QrImage => "qr_image",
            LocatorKey::ConversationList => "conversation_list",
            LocatorKey::ConversationListItem => "conversation_list_item",
            LocatorKey::ContactInput => "contact_input",
            LocatorKey::ContactConfirm => "contact_confirm",
            LocatorKey::MessageInput => "message_input",
            LocatorKey::SendButton => "send_button",
            LocatorKey::StatusMessage => "status_message",
            LocatorKey::DismissDialog => "dismiss_dialog",
        }
    }

    fn default_locator(&self) -> &'static str {
        match self {
            LocatorKey::RememberToggle => "//mat-slide-toggle",
            LocatorKey::RememberToggleButton => {
                "//button[contains(@class, 'checked') or contains(@class, 'unselected')]"
            }
            LocatorKey::QrCode => "//mw-qr-code",
            LocatorKey::QrImage => "//mw-qr-code//img",
            LocatorKey::ConversationList => "//mws-conversations-list",
            LocatorKey::ConversationListItem => "mws-conversation-list-item",
            LocatorKey::ContactInput => "//mw-contact-chips-input//input",
            LocatorKey::ContactConfirm => "//mw-contact-selector-button//button",
            LocatorKey::MessageInput => "//textarea",
            LocatorKey::SendButton => "//mws-message-send-button//button[not(@disabled)]",
            LocatorKey::StatusMessage => "//mws-message-status",
            LocatorKey::DismissDialog => "//mw-dont-show-again-dialog//button",
        }
    }
}

impl fmt::Display for LocatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    /// XPath when the expression starts with `/` or `(`, CSS otherwise.
    pub fn parse(expr: &str) -> Self {
        let trimmed = expr.trim();
        if trimmed.starts_with('/') || trimmed.starts_with('(') {
            Locator::XPath(trimmed.to_string())
        } else {
            Locator::Css(trimmed.to_string())
        }
    }

    pub fn expression(&self) -> &str {
        match self {
            Locator::Css(s) | Locator::XPath(s) => s,
        }
    }

    pub fn is_xpath(&self) -> bool {
        matches!(self, Locator::XPath(_))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.expression())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<LocatorKey, String>", into = "BTreeMap<LocatorKey, String>")]
pub struct LocatorTable {
    entries: BTreeMap<LocatorKey, Locator>,
}

impl LocatorTable {
    pub fn get(&self, key: LocatorKey) -> Locator {
        self.entries
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Locator::parse(key.default_locator()))
    }

    pub fn set(&mut self, key: LocatorKey, expr: &str) {
        self.entries.insert(key, Locator::parse(expr));
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<LocatorKey, String>) -> Self {
        for (key, expr) in overrides {
            self.set(key, &expr);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (LocatorKey, &Locator)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }
}

impl Default for LocatorTable {
    fn default() -> Self {
        let entries = LocatorKey::ALL
            .iter()
            .map(|key| (*key, Locator::parse(key.default_locator())))
            .collect();
        Self { entries }
    }
}

impl From<BTreeMap<LocatorKey, String>> for LocatorTable {
    fn from(overrides: BTreeMap<LocatorKey, String>) -> Self {
        LocatorTable::default().with_overrides(overrides)
    }
}

impl From<LocatorTable> for BTreeMap<LocatorKey, String> {
    fn from(table: LocatorTable) -> Self {
        table
            .entries
            .into_iter()
            .map(|(k, v)| (k, v.expression().to_string()))
            .collect()
    }
}
