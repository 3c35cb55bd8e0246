use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One browser cookie, carried through capture and restore without interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(default = "session_cookie_expiry")]
    pub expires: f64,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

fn session_cookie_expiry() -> f64 {
    -1.0
}

impl CookieRecord {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: path.into(),
            expires: session_cookie_expiry(),
            http_only: false,
            secure: false,
            same_site: None,
        }
    }
}

/// Authentication state captured from the page at the moment it became
/// authenticated. A session is never edited after capture; a later capture
/// produces a new value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    cookies: Vec<CookieRecord>,
    local_storage: BTreeMap<String, String>,
    session_storage: BTreeMap<String, String>,
}

impl Session {
    pub fn new(
        cookies: Vec<CookieRecord>,
        local_storage: BTreeMap<String, String>,
        session_storage: BTreeMap<String, String>,
    ) -> Self {
        Self {
            cookies,
            local_storage,
            session_storage,
        }
    }

    pub fn cookies(&self) -> &[CookieRecord] {
        &self.cookies
    }

    pub fn local_storage(&self) -> &BTreeMap<String, String> {
        &self.local_storage
    }

    pub fn session_storage(&self) -> &BTreeMap<String, String> {
        &self.session_storage
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.local_storage.is_empty() && self.session_storage.is_empty()
    }
}
