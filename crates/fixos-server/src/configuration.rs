use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Failed to parse socket address")
    }
}

/// Upstream for audio analysis. Without an API key the server still
/// starts, and `/analyze-audio` reports the missing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerSettings {
    #[serde(default = "default_analyzer_host")]
    pub host: String,
    #[serde(default = "default_analyzer_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            host: default_analyzer_host(),
            model: default_analyzer_model(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShopSettings {
    #[serde(default = "default_geocode_host")]
    pub geocode_host: String,
    #[serde(default = "default_overpass_host")]
    pub overpass_host: String,
}

impl Default for ShopSettings {
    fn default() -> Self {
        Self {
            geocode_host: default_geocode_host(),
            overpass_host: default_overpass_host(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuideSettings {
    #[serde(default = "default_guide_host")]
    pub host: String,
}

impl Default for GuideSettings {
    fn default() -> Self {
        Self {
            host: default_guide_host(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub analyzer: AnalyzerSettings,
    #[serde(default)]
    pub shops: ShopSettings,
    #[serde(default)]
    pub guide: GuideSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("analyzer.host", default_analyzer_host())?
            .set_default("analyzer.model", default_analyzer_model())?
            .set_default("shops.geocode_host", default_geocode_host())?
            .set_default("shops.overpass_host", default_overpass_host())?
            .set_default("guide.host", default_guide_host())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("FIXOS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        // Surface missing fields as the environment variable to set
        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else if let config::ConfigError::NotFound(field) = &err {
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_analyzer_host() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_analyzer_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

fn default_geocode_host() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_overpass_host() -> String {
    "https://overpass-api.de".to_string()
}

fn default_guide_host() -> String {
    "https://www.ifixit.com".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("FIXOS_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 3000);
        assert_eq!(
            settings.analyzer.host,
            "https://generativelanguage.googleapis.com"
        );
        assert_eq!(settings.analyzer.model, "gemini-2.5-flash-lite");
        assert_eq!(settings.analyzer.api_key, None);
        assert_eq!(settings.shops.geocode_host, "https://nominatim.openstreetmap.org");
        assert_eq!(settings.shops.overpass_host, "https://overpass-api.de");
        assert_eq!(settings.guide.host, "https://www.ifixit.com");
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("FIXOS_SERVER__PORT", "8080");
        env::set_var("FIXOS_ANALYZER__API_KEY", "test-key");
        env::set_var("FIXOS_ANALYZER__MODEL", "gemini-2.0-flash");
        env::set_var("FIXOS_GUIDE__HOST", "http://guides.local");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.analyzer.api_key.as_deref(), Some("test-key"));
        assert_eq!(settings.analyzer.model, "gemini-2.0-flash");
        assert_eq!(settings.guide.host, "http://guides.local");

        // Clean up
        env::remove_var("FIXOS_SERVER__PORT");
        env::remove_var("FIXOS_ANALYZER__API_KEY");
        env::remove_var("FIXOS_ANALYZER__MODEL");
        env::remove_var("FIXOS_GUIDE__HOST");
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let addr = server_settings.socket_addr();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");
    }
}
