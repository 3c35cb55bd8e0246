use crate::config::{self, Config};
use crate::output::{self, OutputFormatter};
use crate::{MessagesError, Result};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
pub struct ConfigPaths {
    pub config_path: PathBuf,
    pub config_exists: bool,
    pub credentials_path: PathBuf,
    pub credentials_exist: bool,
}

impl ConfigPaths {
    fn resolve(config: &Config) -> Result<Self> {
        let config_path = config::default_config_path()?;
        let store = crate::handlers::auth::credential_store(config)?;
        Ok(Self {
            config_exists: config_path.exists(),
            credentials_exist: store.exists(),
            credentials_path: store.path().to_path_buf(),
            config_path,
        })
    }
}

impl OutputFormatter for ConfigPaths {
    fn format_text(&self) -> String {
        use crate::output::text;
        let mark = |exists: bool| if exists { "" } else { " (missing)" };
        [
            text::key_value(
                "Config",
                &format!("{}{}", self.config_path.display(), mark(self.config_exists)),
            ),
            text::key_value(
                "Credentials",
                &format!(
                    "{}{}",
                    self.credentials_path.display(),
                    mark(self.credentials_exist)
                ),
            ),
        ]
        .join("\n")
    }

    fn format_json(&self, pretty: bool) -> Result<String> {
        output::to_json(self, pretty)
    }
}

pub struct ConfigShowResult {
    config: Config,
}

impl OutputFormatter for ConfigShowResult {
    fn format_text(&self) -> String {
        self.config.show()
    }

    fn format_json(&self, pretty: bool) -> Result<String> {
        output::to_json(&self.config, pretty)
    }
}

/// Writes the built-in defaults, locator table included, as a starting point.
pub fn handle_config_init(config: &Config) -> Result<ConfigPaths> {
    let path = config::default_config_path()?;
    if path.exists() {
        return Err(MessagesError::ConfigError(format!(
            "Config file already exists at {}",
            path.display()
        )));
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    std::fs::write(&path, toml::to_string_pretty(&Config::default())?)?;
    tracing::debug!("Wrote default config to {}", path.display());

    ConfigPaths::resolve(config)
}

pub fn handle_config_show(config: &Config) -> ConfigShowResult {
    ConfigShowResult {
        config: config.clone(),
    }
}

pub fn handle_config_path(config: &Config) -> Result<ConfigPaths> {
    ConfigPaths::resolve(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_show_lists_locators() {
        let result = handle_config_show(&Config::default());
        let text = result.format_text();
        assert!(text.contains("qr_code: //mw-qr-code"));
        assert!(text.contains("Fallback To Pairing: true"));

        let json = result.format_json(false).unwrap();
        assert!(json.contains(r#""signal_pattern":"/web/conversations""#));
    }

    #[test]
    fn test_config_paths_text() {
        let paths = ConfigPaths {
            config_path: PathBuf::from("/tmp/messages-web/config.toml"),
            config_exists: true,
            credentials_path: PathBuf::from("/tmp/messages-web/credentials.json"),
            credentials_exist: false,
        };
        let text = paths.format_text();
        assert!(text.contains("/tmp/messages-web/config.toml"));
        assert!(text.contains("credentials.json (missing)"));
        assert!(!text.contains("config.toml (missing)"));
    }
}
