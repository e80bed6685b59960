use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const PROMPT_PLACEHOLDER: &str = "$job_title$";

#[derive(Debug, Default, Deserialize)]
struct RawServiceConfig {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
}

/// Connection settings for the chat-completions service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: Option<String>,
}

/// Reads `base_url`, `api_key` and optional `model` from a TOML file.
///
/// Files that are not valid TOML (typically unquoted values) are re-read as
/// plain `key = value` lines.
pub fn load_service_config(path: &Path) -> Result<ServiceConfig> {
    if !path.exists() {
        return Err(anyhow!("Config file not found: {}", path.display()));
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut raw = match toml::from_str::<RawServiceConfig>(&contents) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("TOML parse of {} failed: {}. Trying line-based parsing...", path.display(), e);
            RawServiceConfig::default()
        }
    };
    if non_empty(&raw.api_key).is_none() {
        raw = parse_key_values(&contents);
    }

    let api_key = non_empty(&raw.api_key)
        .ok_or_else(|| anyhow!("api_key not found in {}", path.display()))?
        .to_string();
    let base_url = non_empty(&raw.base_url)
        .unwrap_or(DEFAULT_BASE_URL)
        .trim_end_matches('/')
        .to_string();

    info!("Loaded config using API key: {}", mask_key(&api_key));

    Ok(ServiceConfig {
        base_url,
        api_key,
        model: non_empty(&raw.model).map(str::to_string),
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_key_values(contents: &str) -> RawServiceConfig {
    let mut raw = RawServiceConfig::default();
    for line in contents.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'').to_string();
        match key.trim() {
            "base_url" => raw.base_url = Some(value),
            "api_key" => raw.api_key = Some(value),
            "model" => raw.model = Some(value),
            _ => {}
        }
    }
    raw
}

/// First five characters of the key, for log lines.
pub fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(5).collect();
    format!("{}...", prefix)
}

/// A prompt with a `$job_title$` slot for the raw text.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!("Prompt file not found: {}", path.display()));
        }
        let template = fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;
        if !template.contains(PROMPT_PLACEHOLDER) {
            warn!("Prompt file {} has no {} placeholder", path.display(), PROMPT_PLACEHOLDER);
        }
        Ok(Self::new(template))
    }

    pub fn render(&self, text: &str) -> String {
        self.template.replace(PROMPT_PLACEHOLDER, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("env.toml");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reads_toml_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "base_url = \"https://llm.example.org/v1/\"\napi_key = \"sk-test-123\"\nmodel = \"gpt-4o-mini\"\n",
        );
        let config = load_service_config(&path).unwrap();
        assert_eq!(config.base_url, "https://llm.example.org/v1");
        assert_eq!(config.api_key, "sk-test-123");
        assert_eq!(config.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn falls_back_to_unquoted_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "# service\nbase_url = https://llm.example.org/v1\napi_key = sk-unquoted\n");
        let config = load_service_config(&path).unwrap();
        assert_eq!(config.base_url, "https://llm.example.org/v1");
        assert_eq!(config.api_key, "sk-unquoted");
        assert!(config.model.is_none());
    }

    #[test]
    fn default_base_url_when_absent() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "api_key = 'sk-x'\n");
        assert_eq!(load_service_config(&path).unwrap().base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn missing_file_or_key_is_fatal() {
        let dir = TempDir::new().unwrap();
        assert!(load_service_config(&dir.path().join("absent.toml")).is_err());
        let path = write_config(&dir, "base_url = \"https://llm.example.org/v1\"\n");
        assert!(load_service_config(&path).is_err());
    }

    #[test]
    fn masks_all_but_prefix() {
        assert_eq!(mask_key("sk-abcdef"), "sk-ab...");
        assert_eq!(mask_key("abc"), "abc...");
    }

    #[test]
    fn prompt_substitutes_every_placeholder() {
        let prompt = PromptTemplate::new("Extract from: $job_title$\nAgain: $job_title$");
        assert_eq!(prompt.render("教授"), "Extract from: 教授\nAgain: 教授");
    }

    #[test]
    fn missing_prompt_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        assert!(PromptTemplate::load(&dir.path().join("prompt.txt")).is_err());
    }
}
