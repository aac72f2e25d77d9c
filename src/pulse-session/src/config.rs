//! Session configuration.
//!
//! Sources, lowest precedence first: built-in defaults, the TOML config file,
//! environment variables, then whatever the caller overrides afterwards
//! (the CLI applies its flags last).

use std::path::{Path, PathBuf};
use std::time::Duration;

use pulse_client::{
    ClientOptions, DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT, HttpSettings,
    TrustPolicy,
};
use pulse_storage::{DEFAULT_CONVERSATION_KEY, PulsePaths};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::{Result, SessionError};

/// Diagnostic shown when no API key is available.
pub const MISSING_API_KEY: &str = "API key is not configured";

/// Diagnostic shown when the endpoint is not a URL.
pub const INVALID_ENDPOINT: &str = "Invalid API URL";

/// Chat session configuration.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Chat-completions endpoint URL.
    pub endpoint: String,

    /// Model identifier sent with every request.
    pub model: String,

    /// Bearer token. Never written back out; blank values count as unset.
    #[serde(skip_serializing, deserialize_with = "deserialize_api_key")]
    pub api_key: Option<SecretString>,

    /// Request server-sent events instead of a single payload.
    pub stream: bool,

    /// First message of every request.
    pub system_prompt: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Whole request/response timeout in seconds.
    pub request_timeout_secs: u64,

    /// Skip TLS certificate validation. Development only.
    pub accept_invalid_certs: bool,

    /// Storage key of the conversation.
    pub conversation_key: String,

    /// Data directory override.
    pub data_dir: Option<PathBuf>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            stream: true,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            connect_timeout_secs: 30,
            request_timeout_secs: 60,
            accept_invalid_certs: false,
            conversation_key: DEFAULT_CONVERSATION_KEY.to_string(),
            data_dir: None,
        }
    }
}

impl ChatConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| SessionError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = get("PULSE_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(model) = get("PULSE_MODEL") {
            self.model = model;
        }
        if let Some(key) = get("PULSE_API_KEY").or_else(|| get("OPENAI_API_KEY")) {
            self.api_key = Some(SecretString::from(key));
        }
        if let Some(stream) = get("PULSE_STREAM").and_then(|v| parse_flag(&v)) {
            self.stream = stream;
        }
        if let Some(accept) = get("PULSE_ACCEPT_INVALID_CERTS").and_then(|v| parse_flag(&v)) {
            self.accept_invalid_certs = accept;
        }
        if let Some(dir) = get("PULSE_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    /// Whether a non-blank API key is set.
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().trim().is_empty())
    }

    /// Check what must hold before a request may be sent.
    ///
    /// Returns the user-facing diagnostic on failure.
    pub fn validate(&self) -> std::result::Result<(), &'static str> {
        if !self.has_api_key() {
            return Err(MISSING_API_KEY);
        }
        if url::Url::parse(&self.endpoint).is_err() {
            return Err(INVALID_ENDPOINT);
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            connect_timeout: self.connect_timeout(),
            request_timeout: self.request_timeout(),
            trust: TrustPolicy::from_accept_invalid(self.accept_invalid_certs),
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            endpoint: self.endpoint.clone(),
            api_key: SecretString::from(
                self.api_key
                    .as_ref()
                    .map(|k| k.expose_secret().to_owned())
                    .unwrap_or_default(),
            ),
            http: self.http_settings(),
        }
    }

    /// Storage paths, honouring the data directory override.
    pub fn paths(&self) -> Result<PulsePaths> {
        match &self.data_dir {
            Some(dir) => Ok(PulsePaths::from_root(dir.clone())),
            None => Ok(PulsePaths::new()?),
        }
    }
}

fn deserialize_api_key<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let key = Option::<String>::deserialize(deserializer)?;
    Ok(key.filter(|k| !k.trim().is_empty()).map(SecretString::from))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use pretty_assertions::assert_eq;

    fn key_of(config: &ChatConfig) -> Option<&str> {
        config.api_key.as_ref().map(|k| k.expose_secret())
    }

    #[test]
    fn test_defaults() {
        let config = ChatConfig::default();
        assert_eq!(config.model, "gpt-4o-mini");
        assert!(config.stream);
        assert!(!config.accept_invalid_certs);
        assert_eq!(config.http_settings().trust, TrustPolicy::Verify);
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.validate(), Err(MISSING_API_KEY));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "model = \"gpt-4o\"\nstream = false\nrequest_timeout_secs = 5\n",
        )
        .unwrap();

        let config = ChatConfig::load(&path).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert!(!config.stream);
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChatConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = [").unwrap();
        assert!(matches!(
            ChatConfig::load(&path),
            Err(SessionError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = ChatConfig {
            model: "from-file".to_string(),
            ..ChatConfig::default()
        };
        let env: HashMap<&str, &str> = HashMap::from([
            ("PULSE_MODEL", "from-env"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("PULSE_STREAM", "off"),
            ("PULSE_ACCEPT_INVALID_CERTS", "yes"),
            ("PULSE_ENDPOINT", "  "),
        ]);
        config.apply_env_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.model, "from-env");
        assert_eq!(key_of(&config), Some("sk-openai"));
        assert!(!config.stream);
        assert!(config.accept_invalid_certs);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_pulse_key_wins_over_openai_key() {
        let mut config = ChatConfig::default();
        let env: HashMap<&str, &str> =
            HashMap::from([("PULSE_API_KEY", "sk-pulse"), ("OPENAI_API_KEY", "sk-openai")]);
        config.apply_env_from(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(key_of(&config), Some("sk-pulse"));
    }

    #[test]
    fn test_invalid_endpoint_fails_validation() {
        let config = ChatConfig {
            endpoint: "::not a url::".to_string(),
            api_key: Some(SecretString::from("sk".to_string())),
            ..ChatConfig::default()
        };
        assert_eq!(config.validate(), Err(INVALID_ENDPOINT));
    }

    #[test]
    fn test_api_key_is_redacted_and_not_serialized() {
        let config = ChatConfig {
            api_key: Some(SecretString::from("sk-secret".to_string())),
            ..ChatConfig::default()
        };
        assert!(!format!("{config:?}").contains("sk-secret"));
        assert!(!format!("{:?}", config.client_options()).contains("sk-secret"));
        assert!(!toml::to_string(&config).unwrap().contains("sk-secret"));
    }

    #[test]
    fn test_api_key_from_file_is_kept_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_key = \"sk-file\"\n").unwrap();

        let config = ChatConfig::load(&path).unwrap();
        assert_eq!(key_of(&config), Some("sk-file"));
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(
            config.client_options().api_key.expose_secret(),
            "sk-file"
        );
        assert!(!format!("{config:?}").contains("sk-file"));
    }

    #[test]
    fn test_blank_api_key_in_file_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_key = \"   \"\n").unwrap();

        let config = ChatConfig::load(&path).unwrap();
        assert!(!config.has_api_key());
        assert_eq!(config.validate(), Err(MISSING_API_KEY));
    }
}
