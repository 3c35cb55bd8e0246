use super::page::ChromiumPage;
use crate::{
    MessagesError, Result,
    config::Config,
    timeouts::{ms, secs},
};
use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const LAUNCH_ARGS: &[&str] = &[
    "--disable-features=IsolateOrigins,site-per-process",
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--no-first-run",
    "--no-default-browser-check",
];

/// A running (or attached) Chrome plus the one tab the automation drives.
pub struct BrowserHandle {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Arc<ChromiumPage>,
    owned: bool,
}

impl BrowserHandle {
    pub async fn launch(config: &Config) -> Result<Self> {
        let navigation_timeout = Duration::from_secs(config.timeouts.navigation_secs);

        let (browser, handler, owned) = if config.browser.reuse_browser {
            let (browser, handler) = connect_to_existing(config.browser.port).await?;
            (browser, handler, false)
        } else {
            let (browser, handler) = launch_browser(config).await?;
            (browser, handler, true)
        };

        let tab = browser
            .new_page("about:blank")
            .await
            .map_err(|e| MessagesError::LaunchFailed(format!("Failed to open tab: {}", e)))?;
        let page = Arc::new(ChromiumPage::attach(tab, navigation_timeout).await?);

        tracing::info!(
            "Browser ready ({})",
            if owned { "launched" } else { "attached" }
        );

        Ok(Self {
            browser,
            handler,
            page,
            owned,
        })
    }

    pub fn page(&self) -> Arc<ChromiumPage> {
        self.page.clone()
    }

    pub async fn close(mut self) -> Result<()> {
        use super::PageSurface;

        self.page.close().await.ok();

        if self.owned {
            self.browser
                .close()
                .await
                .map_err(|e| MessagesError::General(format!("Failed to close browser: {}", e)))?;
            self.browser.wait().await.ok();
        }

        self.handler.abort();
        Ok(())
    }
}

async fn launch_browser(config: &Config) -> Result<(Browser, JoinHandle<()>)> {
    let chrome_path = config
        .browser
        .chrome_path
        .clone()
        .map(Ok)
        .unwrap_or_else(crate::utils::find_chrome_executable)?;

    let user_data = config
        .browser
        .user_data_dir
        .clone()
        .unwrap_or_else(default_profile_dir);
    std::fs::create_dir_all(&user_data)?;

    // A crashed previous run leaves the profile locked.
    let lock_file = user_data.join("SingletonLock");
    if lock_file.exists() || lock_file.is_symlink() {
        std::fs::remove_file(&lock_file).ok();
    }

    let mut builder = BrowserConfig::builder()
        .chrome_executable(&chrome_path)
        .port(config.browser.port)
        .user_data_dir(&user_data)
        .window_size(config.browser.window_width, config.browser.window_height)
        .request_timeout(Duration::from_secs(secs::REQUEST))
        .args(LAUNCH_ARGS.iter().copied());

    if !config.browser.headless {
        builder = builder.with_head();
    }

    if config.browser.disable_web_security {
        builder = builder.arg("--disable-web-security");
    }

    if config.browser.no_sandbox {
        builder = builder.no_sandbox();
    }

    let browser_config = builder.build().map_err(MessagesError::LaunchFailed)?;

    tracing::debug!("Launching {}", chrome_path.display());
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .map_err(|e| MessagesError::LaunchFailed(e.to_string()))?;

    let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

    Ok((browser, handler))
}

async fn connect_to_existing(port: u16) -> Result<(Browser, JoinHandle<()>)> {
    let url = format!("http://127.0.0.1:{}/json/version", port);

    let mut last_error = MessagesError::ConnectionLost;
    for attempt in 1..=3 {
        match fetch_ws_url(&url).await {
            Ok(ws_url) => {
                let handler_config = HandlerConfig {
                    request_timeout: Duration::from_secs(secs::REQUEST),
                    ..Default::default()
                };

                let (browser, mut handler) =
                    Browser::connect_with_config(ws_url, handler_config)
                        .await
                        .map_err(|_| MessagesError::ConnectionLost)?;

                let handler =
                    tokio::spawn(async move { while handler.next().await.is_some() {} });
                return Ok((browser, handler));
            }
            Err(e) => {
                tracing::debug!("Connection attempt {} failed: {}", attempt, e);
                last_error = e;
                tokio::time::sleep(Duration::from_millis(ms::CONNECT_RETRY)).await;
            }
        }
    }

    Err(last_error)
}

async fn fetch_ws_url(url: &str) -> Result<String> {
    let response: serde_json::Value = reqwest::Client::new()
        .get(url)
        .send()
        .await
        .map_err(|_| MessagesError::ConnectionLost)?
        .json()
        .await
        .map_err(|_| MessagesError::ConnectionLost)?;

    response
        .get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or(MessagesError::ConnectionLost)
}

fn default_profile_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("messages-web")
        .join("chrome-profile")
}
