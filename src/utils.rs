use crate::{MessagesError, Result};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use std::path::PathBuf;

pub fn find_chrome_executable() -> Result<PathBuf> {
    if let Some(path) = chrome_candidates().into_iter().find(|p| p.exists()) {
        return Ok(path);
    }

    find_in_path().ok_or_else(|| {
        MessagesError::LaunchFailed(
            "Could not find Chrome/Chromium executable. Set [browser] chrome_path or CHROME_PATH"
                .into(),
        )
    })
}

#[cfg(target_os = "macos")]
fn chrome_candidates() -> Vec<PathBuf> {
    [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
        "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

#[cfg(target_os = "linux")]
fn chrome_candidates() -> Vec<PathBuf> {
    [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

#[cfg(target_os = "windows")]
fn chrome_candidates() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = [
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();

    if let Some(local) = dirs::data_local_dir() {
        paths.push(local.join(r"Google\Chrome\Application\chrome.exe"));
    }
    paths
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
fn chrome_candidates() -> Vec<PathBuf> {
    Vec::new()
}

fn find_in_path() -> Option<PathBuf> {
    let binaries: &[&str] = if cfg!(windows) {
        &["chrome.exe", "chromium.exe"]
    } else {
        &["google-chrome", "chromium", "chromium-browser", "chrome"]
    };

    binaries.iter().find_map(|binary| which::which(binary).ok())
}

/// Decodes a `data:<mime>;base64,<payload>` URL, as rendered in an `img` `src`.
/// Returns the MIME type and raw bytes.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| MessagesError::General("not a data URL".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| MessagesError::General("data URL has no payload".into()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| MessagesError::General("data URL is not base64 encoded".into()))?;

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| MessagesError::General(format!("invalid base64 payload: {}", e)))?;
    Ok((mime.to_string(), bytes))
}
