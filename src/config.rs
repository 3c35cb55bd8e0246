use crate::locators::{LocatorKey, LocatorTable};
use crate::{MessagesError, Result, timeouts};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub urls: UrlConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub locators: LocatorTable,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    pub chrome_path: Option<PathBuf>,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user_data_dir: Option<PathBuf>,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default)]
    pub disable_web_security: bool,
    #[serde(default)]
    pub no_sandbox: bool,
    /// Attach to a Chrome already listening on `port` instead of launching one.
    #[serde(default)]
    pub reuse_browser: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UrlConfig {
    #[serde(default = "default_auth_url")]
    pub auth: String,
    #[serde(default = "default_conversations_url")]
    pub conversations: String,
    #[serde(default = "default_compose_url")]
    pub compose: String,
}

/// Which page events may carry the authenticated-transition signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    #[default]
    Navigation,
    Request,
    Any,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub signal_source: SignalSource,
    /// Regex matched against signal URLs.
    #[serde(default = "default_signal_pattern")]
    pub signal_pattern: String,
    #[serde(default = "default_true")]
    pub fallback_to_pairing: bool,
    /// Unset means wait for the QR code to be scanned indefinitely.
    pub pairing_timeout_secs: Option<u64>,
    #[serde(default = "default_qr_binding")]
    pub qr_binding: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_navigation_secs")]
    pub navigation_secs: u64,
    #[serde(default = "default_element_ms")]
    pub element_ms: u64,
    #[serde(default = "default_precondition_ms")]
    pub precondition_ms: u64,
    #[serde(default = "default_restore_ms")]
    pub restore_ms: u64,
    #[serde(default = "default_status_probe_ms")]
    pub status_probe_ms: u64,
    #[serde(default = "default_dialog_probe_ms")]
    pub dialog_probe_ms: u64,
    #[serde(default = "default_type_delay_ms")]
    pub type_delay_ms: u64,
    #[serde(default = "default_click_delay_ms")]
    pub click_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CredentialsConfig {
    pub path: Option<PathBuf>,
}

impl CredentialsConfig {
    pub fn resolve_path(&self) -> Result<PathBuf> {
        match self.path {
            Some(ref path) => Ok(path.clone()),
            None => default_config_dir().map(|p| p.join("credentials.json")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub json_pretty: bool,
}

fn default_true() -> bool {
    true
}
fn default_headless() -> bool {
    true
}
fn default_port() -> u16 {
    9222
}
fn default_window_width() -> u32 {
    1920
}
fn default_window_height() -> u32 {
    1080
}
fn default_auth_url() -> String {
    "https://messages.google.com/web/authentication".to_string()
}
fn default_conversations_url() -> String {
    "https://messages.google.com/web/conversations".to_string()
}
fn default_compose_url() -> String {
    "https://messages.google.com/web/conversations/new".to_string()
}
fn default_signal_pattern() -> String {
    "/web/conversations".to_string()
}
fn default_qr_binding() -> String {
    "__mwOnQrCodeChange".to_string()
}
fn default_navigation_secs() -> u64 {
    timeouts::secs::NAVIGATION
}
fn default_element_ms() -> u64 {
    timeouts::ms::ELEMENT_WAIT
}
fn default_precondition_ms() -> u64 {
    timeouts::ms::PRECONDITION_WAIT
}
fn default_restore_ms() -> u64 {
    timeouts::ms::RESTORE_WAIT
}
fn default_status_probe_ms() -> u64 {
    timeouts::ms::STATUS_PROBE
}
fn default_dialog_probe_ms() -> u64 {
    timeouts::ms::DIALOG_PROBE
}
fn default_type_delay_ms() -> u64 {
    timeouts::ms::TYPE_DELAY
}
fn default_click_delay_ms() -> u64 {
    timeouts::ms::CLICK_DELAY
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: default_headless(),
            port: default_port(),
            user_data_dir: None,
            window_width: default_window_width(),
            window_height: default_window_height(),
            disable_web_security: false,
            no_sandbox: false,
            reuse_browser: false,
        }
    }
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            auth: default_auth_url(),
            conversations: default_conversations_url(),
            compose: default_compose_url(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signal_source: SignalSource::default(),
            signal_pattern: default_signal_pattern(),
            fallback_to_pairing: true,
            pairing_timeout_secs: None,
            qr_binding: default_qr_binding(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation_secs: default_navigation_secs(),
            element_ms: default_element_ms(),
            precondition_ms: default_precondition_ms(),
            restore_ms: default_restore_ms(),
            status_probe_ms: default_status_probe_ms(),
            dialog_probe_ms: default_dialog_probe_ms(),
            type_delay_ms: default_type_delay_ms(),
            click_delay_ms: default_click_delay_ms(),
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    default_config_dir().map(|p| p.join("config.toml"))
}

pub fn default_config_dir() -> Result<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .map(|p| p.join("messages-web"))
        .ok_or_else(|| MessagesError::ConfigError("Could not determine config directory".into()))
}

const PROJECT_CONFIG: &str = ".messages-web.toml";

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        let global_path = default_config_path()?;
        if global_path.exists() {
            let content = std::fs::read_to_string(&global_path)?;
            config = toml::from_str(&content)?;
        }

        let project_path = PathBuf::from(PROJECT_CONFIG);
        if project_path.exists() {
            let content = std::fs::read_to_string(&project_path)?;
            let project_config: Config = toml::from_str(&content)?;
            config = config.merge(project_config);
        }

        config.load_from_env();

        Ok(config)
    }

    pub fn load_with_overrides(&self, cli_overrides: ConfigOverrides) -> Self {
        let mut config = self.clone();

        if let Some(headless) = cli_overrides.headless {
            config.browser.headless = headless;
        }
        if let Some(port) = cli_overrides.port {
            config.browser.port = port;
        }
        if let Some(json) = cli_overrides.json {
            config.output.json_pretty = json;
        }
        if let Some(chrome_path) = cli_overrides.chrome_path {
            config.browser.chrome_path = Some(chrome_path);
        }
        if let Some(timeout) = cli_overrides.timeout {
            config.timeouts.navigation_secs = timeout;
        }
        if let Some(credentials) = cli_overrides.credentials {
            config.credentials.path = Some(credentials);
        }

        config
    }

    /// Project files only override what they set explicitly; locators are
    /// merged entry by entry.
    fn merge(mut self, other: Config) -> Self {
        let defaults = Config::default();

        if other.browser.chrome_path.is_some() {
            self.browser.chrome_path = other.browser.chrome_path;
        }
        if other.browser.user_data_dir.is_some() {
            self.browser.user_data_dir = other.browser.user_data_dir;
        }
        if other.credentials.path.is_some() {
            self.credentials.path = other.credentials.path;
        }
        if other.auth.signal_pattern != defaults.auth.signal_pattern {
            self.auth.signal_pattern = other.auth.signal_pattern;
        }
        if other.auth.signal_source != defaults.auth.signal_source {
            self.auth.signal_source = other.auth.signal_source;
        }
        if other.auth.pairing_timeout_secs.is_some() {
            self.auth.pairing_timeout_secs = other.auth.pairing_timeout_secs;
        }
        for key in LocatorKey::ALL {
            let theirs = other.locators.get(key);
            if theirs != defaults.locators.get(key) {
                self.locators.set(key, theirs.expression());
            }
        }
        self
    }

    fn load_from_env(&mut self) {
        if let Ok(headless) = std::env::var("MESSAGES_HEADLESS") {
            self.browser.headless = headless == "true" || headless == "1";
        }
        if let Ok(path) = std::env::var("CHROME_PATH") {
            self.browser.chrome_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("MESSAGES_CREDENTIALS") {
            self.credentials.path = Some(PathBuf::from(path));
        }
        if let Ok(timeout) = std::env::var("MESSAGES_TIMEOUT")
            && let Ok(timeout) = timeout.parse()
        {
            self.timeouts.navigation_secs = timeout;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.browser.port < 1024 {
            return Err(MessagesError::InvalidPort(self.browser.port));
        }

        let t = &self.timeouts;
        for (name, value) in [
            ("navigation_secs", t.navigation_secs),
            ("element_ms", t.element_ms),
            ("precondition_ms", t.precondition_ms),
            ("restore_ms", t.restore_ms),
            ("status_probe_ms", t.status_probe_ms),
        ] {
            if value == 0 {
                return Err(MessagesError::ConfigError(format!(
                    "timeouts.{} must be greater than 0",
                    name
                )));
            }
        }

        if self.auth.pairing_timeout_secs == Some(0) {
            return Err(MessagesError::ConfigError(
                "auth.pairing_timeout_secs must be greater than 0 when set".into(),
            ));
        }

        regex::Regex::new(&self.auth.signal_pattern).map_err(|e| {
            MessagesError::ConfigError(format!("auth.signal_pattern is not a valid regex: {}", e))
        })?;

        if self.auth.qr_binding.is_empty()
            || !self
                .auth
                .qr_binding
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        {
            return Err(MessagesError::ConfigError(format!(
                "auth.qr_binding '{}' is not a valid JavaScript identifier",
                self.auth.qr_binding
            )));
        }

        for (name, value) in [
            ("auth", &self.urls.auth),
            ("conversations", &self.urls.conversations),
            ("compose", &self.urls.compose),
        ] {
            url::Url::parse(value).map_err(|e| {
                MessagesError::ConfigError(format!("urls.{} is not a valid URL: {}", name, e))
            })?;
        }

        for (key, locator) in self.locators.iter() {
            if locator.expression().is_empty() {
                return Err(MessagesError::ConfigError(format!(
                    "locators.{} must not be empty",
                    key
                )));
            }
        }

        if let Some(ref path) = self.browser.chrome_path
            && !path.exists()
        {
            return Err(MessagesError::ConfigError(format!(
                "Chrome path does not exist: {}",
                path.display()
            )));
        }

        Ok(())
    }

    pub fn show(&self) -> String {
        let mut out = format!(
            r#"Browser:
  Chrome Path: {}
  Headless: {}
  Port: {}
  User Data Dir: {}
  Reuse Browser: {}

URLs:
  Auth: {}
  Conversations: {}
  Compose: {}

Auth:
  Signal: {:?} matching '{}'
  Fallback To Pairing: {}
  Pairing Timeout: {}

Timeouts:
  Navigation: {}s
  Element: {}ms
  Restore: {}ms
  Status Probe: {}ms

Credentials: {}

Locators:
"#,
            self.browser
                .chrome_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "auto-detect".into()),
            self.browser.headless,
            self.browser.port,
            self.browser
                .user_data_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "default".into()),
            self.browser.reuse_browser,
            self.urls.auth,
            self.urls.conversations,
            self.urls.compose,
            self.auth.signal_source,
            self.auth.signal_pattern,
            self.auth.fallback_to_pairing,
            self.auth
                .pairing_timeout_secs
                .map(|s| format!("{}s", s))
                .unwrap_or_else(|| "none".into()),
            self.timeouts.navigation_secs,
            self.timeouts.element_ms,
            self.timeouts.restore_ms,
            self.timeouts.status_probe_ms,
            self.credentials
                .resolve_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "unresolved".into()),
        );
        for (key, locator) in self.locators.iter() {
            out.push_str(&format!("  {}: {}\n", key, locator));
        }
        out
    }
}

#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub headless: Option<bool>,
    pub port: Option<u16>,
    pub json: Option<bool>,
    pub chrome_path: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub credentials: Option<PathBuf>,
}
