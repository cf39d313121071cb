use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub engine_url: String,
    pub model: String,
    pub session: String,
    pub working_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let engine_url = std::env::var("RUDDER_ENGINE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8787".to_string());
        let model = std::env::var("RUDDER_MODEL")
            .unwrap_or_else(|_| "gemini:gemini-3-flash-preview".to_string());
        let session = std::env::var("RUDDER_SESSION").unwrap_or_else(|_| "default".to_string());

        Ok(Self {
            engine_url,
            model,
            session,
            working_dir: std::env::current_dir()?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.engine_url.starts_with("http://") && !self.engine_url.starts_with("https://") {
            bail!(
                "Invalid RUDDER_ENGINE_URL '{}': expected http:// or https:// URL",
                self.engine_url
            );
        }

        validate_model_name(&self.model)?;

        if self.session.trim().is_empty() {
            bail!("Session id cannot be empty");
        }

        Ok(())
    }

}

pub fn validate_model_name(model: &str) -> Result<()> {
    match model.split_once(':') {
        Some((provider, name)) if !provider.trim().is_empty() && !name.trim().is_empty() => Ok(()),
        _ => bail!(
            "Invalid model name '{}': expected the provider:name form, e.g. gemini:gemini-3-flash-preview",
            model
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            engine_url: "http://127.0.0.1:8787".to_string(),
            model: "gemini:gemini-3-flash-preview".to_string(),
            session: "default".to_string(),
            working_dir: std::env::current_dir().expect("cwd"),
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_http_engine_url() {
        let mut config = base_config();
        config.engine_url = "ftp://127.0.0.1".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_model_without_provider() {
        let mut config = base_config();
        config.model = "gpt-4o".to_string();
        assert!(config.validate().is_err());

        config.model = ":name-only".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_session() {
        let mut config = base_config();
        config.session = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
